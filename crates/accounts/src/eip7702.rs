//! EOA delegating its code to a smart account implementation (EIP-7702)

use crate::{
    account::{ecdsa_stub_signature, AccountCore, SmartAccountApi},
    error::{AccountError, AccountResult},
};
use async_trait::async_trait;
use ethers::{
    abi::Token,
    types::{transaction::eip712::TypedData, Address, Bytes},
};
use keel_primitives::{
    authorization::{delegation_target, factory_marker},
    codec::abi,
    parse_address,
    signer::signature_bytes,
    Call, Eip7702Authorization, EntryPointVersion, SignedAuthorization, SmartAccountSigner,
    UserOperation,
};
use std::sync::Arc;
use tracing::debug;

/// `Simple7702Account` implementation
pub const DELEGATE: &str = "0xe6Cae83BdE06E4c305530e199D7217f42808555B";

const NAME: &str = "eip7702";

#[derive(Debug)]
pub struct Eip7702Account {
    core: AccountCore,
    owner: Arc<dyn SmartAccountSigner>,
    delegate: Address,
}

impl Eip7702Account {
    pub fn new(core: AccountCore, owner: Arc<dyn SmartAccountSigner>) -> AccountResult<Self> {
        if core.entry_point.version == EntryPointVersion::V06 {
            return Err(AccountError::unsupported_entry_point(NAME, core.entry_point.version));
        }
        Ok(Self { core, owner, delegate: parse_address(DELEGATE) })
    }

    pub fn delegate(mut self, delegate: Address) -> Self {
        self.delegate = delegate;
        self
    }

    /// Current delegation target of the EOA
    pub async fn delegation(&self) -> AccountResult<Option<Address>> {
        let code = self.core.public_client()?.get_code(self.owner.address()).await?;
        Ok(delegation_target(&code))
    }

    /// Whether the EOA delegates to the configured implementation
    pub async fn is_delegated(&self) -> AccountResult<bool> {
        let delegated = self.delegation().await? == Some(self.delegate);
        debug!("EOA {:?} delegated to {:?}: {delegated}", self.owner.address(), self.delegate);
        Ok(delegated)
    }
}

#[async_trait]
impl SmartAccountApi for Eip7702Account {
    fn name(&self) -> &'static str {
        NAME
    }

    fn core(&self) -> &AccountCore {
        &self.core
    }

    async fn address(&self) -> AccountResult<Address> {
        let address = self.owner.address();
        self.core.resolve_address(|| async move { Ok(address) }).await
    }

    async fn is_deployed(&self) -> AccountResult<bool> {
        self.is_delegated().await
    }

    /// The marker factory on entry point 0.8, nothing before
    async fn factory_args(&self) -> AccountResult<Option<(Address, Bytes)>> {
        Ok(match self.core.entry_point.version {
            EntryPointVersion::V08 => Some((factory_marker(), Bytes::default())),
            _ => None,
        })
    }

    fn encode_call(&self, call: &Call) -> AccountResult<Bytes> {
        Ok(abi::encode_function_call(
            "execute(address,uint256,bytes)",
            &[Token::Address(call.to), Token::Uint(call.value), Token::Bytes(call.data.to_vec())],
        ))
    }

    fn encode_calls(&self, calls: &[Call]) -> AccountResult<Bytes> {
        match calls {
            [] => Err(AccountError::EmptyBatch),
            [call] => self.encode_call(call),
            calls => Ok(abi::encode_function_call(
                "executeBatch((address,uint256,bytes)[])",
                &[Token::Array(calls.iter().map(Call::to_token).collect())],
            )),
        }
    }

    fn stub_signature(&self) -> Bytes {
        ecdsa_stub_signature()
    }

    fn eip7702_delegate(&self) -> Option<Address> {
        Some(self.delegate)
    }

    async fn eip7702_authorization(&self) -> AccountResult<Option<Eip7702Authorization>> {
        if self.is_delegated().await? {
            return Ok(None);
        }
        let nonce = self.core.public_client()?.get_transaction_count(self.owner.address()).await?;
        Ok(Some(Eip7702Authorization::new(self.core.chain_id, self.delegate, nonce)))
    }

    async fn sign_authorization(
        &self,
        authorization: Eip7702Authorization,
    ) -> AccountResult<SignedAuthorization> {
        Ok(authorization.sign(self.owner.as_ref()).await?)
    }

    async fn sign_user_operation(&self, op: &UserOperation) -> AccountResult<Bytes> {
        let hash = self.hash_user_operation(op)?;
        let signature = match self.core.entry_point.version {
            EntryPointVersion::V08 => self.owner.sign_hash(hash.into()).await?,
            _ => self.owner.sign_message(hash.as_bytes()).await?,
        };
        Ok(signature_bytes(&signature))
    }

    async fn sign_message(&self, message: &[u8]) -> AccountResult<Bytes> {
        Ok(signature_bytes(&self.owner.sign_message(message).await?))
    }

    async fn sign_typed_data(&self, data: &TypedData) -> AccountResult<Bytes> {
        Ok(signature_bytes(&self.owner.sign_typed_data(data).await?))
    }
}
