use demos_simple_account::{init_tracing, simple_account_client};
use ethers::types::{Address, U256};
use keel_accounts::SmartAccountApi;
use keel_client::{UserOperationRequest, WaitOutcome};
use keel_primitives::Call;
use std::env;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    init_tracing();
    let demo = simple_account_client().await?;

    let to = match env::var("TO") {
        Ok(to) => to.parse::<Address>()?,
        Err(_) => Address::zero(),
    };
    println!("Smart account address: {:?}", demo.client.account().address().await?);

    let request = UserOperationRequest::calls(vec![Call::new(to).value(U256::from(1))]);
    match demo.client.send_and_wait(request, None).await? {
        WaitOutcome::Included(receipt) => {
            println!("Included in {:?}", receipt.tx_receipt.transaction_hash)
        }
        WaitOutcome::Reverted(receipt) => println!("Reverted: {}", receipt.reason),
        WaitOutcome::Rejected { hash, status } => println!("User operation {hash} {status:?}"),
        WaitOutcome::Unresolved(hash) => println!("User operation {hash} still pending"),
    }
    Ok(())
}
