//! Shared setup of the simple account demos
//!
//! Reads `RPC_URL`, `BUNDLER_URL` and `SEED_PHRASE` from the environment.

use ethers::providers::{Http, Middleware, Provider};
use keel_accounts::{AccountCore, EthClient, SimpleAccount};
use keel_client::{JsonRpcBundlerClient, SmartAccountClient};
use keel_primitives::{EntryPoint, Wallet};
use std::{env, sync::Arc, time::Duration};
use tracing_subscriber::EnvFilter;

pub struct Demo {
    pub client: SmartAccountClient<SimpleAccount>,
    pub bundler: Arc<JsonRpcBundlerClient>,
}

pub fn init_tracing() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
}

/// Simple account (entry point v0.7) of the first key derived from `SEED_PHRASE`
pub async fn simple_account_client() -> eyre::Result<Demo> {
    let rpc_url = env::var("RPC_URL")?;
    let bundler_url = env::var("BUNDLER_URL")?;
    let seed_phrase = env::var("SEED_PHRASE")?;

    let provider = Provider::<Http>::try_from(rpc_url.as_str())?.interval(Duration::from_millis(10u64));
    let chain_id = provider.get_chainid().await?.as_u64();
    let owner = Arc::new(Wallet::from_phrase(seed_phrase.as_str(), 0)?);

    let core = AccountCore::new(EntryPoint::v07(), chain_id)
        .client(Arc::new(EthClient::new(Arc::new(provider))));
    let bundler = Arc::new(JsonRpcBundlerClient::new(bundler_url)?);
    let client = SmartAccountClient::new(SimpleAccount::new(core, owner), bundler.clone());
    Ok(Demo { client, bundler })
}
