//! Capabilities shared by every smart account and the closed set of supported accounts

use crate::{
    address::AddressCell,
    client::PublicClient,
    diamond::DiamondAccount,
    eip7702::Eip7702Account,
    entry_point::{get_nonce, get_sender_address},
    error::{AccountError, AccountResult},
    nexus::NexusAccount,
    safe::{launchpad::Safe7579Account, SafeAccount},
    simple::SimpleAccount,
};
use async_trait::async_trait;
use educe::Educe;
use ethers::types::{transaction::eip712::TypedData, Address, Bytes, U256};
use keel_primitives::{
    codec::hex::from_hex, constants::signature::STUB_ECDSA, pack_init_code, Call,
    Eip7702Authorization, EntryPoint, SignedAuthorization, UserOperation, UserOperationHash,
};
use std::sync::Arc;
use tracing::debug;

/// State shared by every account: entry point, chain, node access and the resolved address
#[derive(Educe)]
#[educe(Debug)]
pub struct AccountCore {
    pub entry_point: EntryPoint,
    pub chain_id: u64,
    #[educe(Debug(ignore))]
    pub client: Option<Arc<dyn PublicClient>>,
    address: AddressCell,
}

impl AccountCore {
    pub fn new(entry_point: EntryPoint, chain_id: u64) -> Self {
        Self { entry_point, chain_id, client: None, address: AddressCell::new() }
    }

    pub fn client(mut self, client: Arc<dyn PublicClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Uses a precomputed account address instead of resolving it
    pub fn address(mut self, address: Address) -> Self {
        self.address = AddressCell::with_address(address);
        self
    }

    pub fn public_client(&self) -> AccountResult<&dyn PublicClient> {
        self.client.as_deref().ok_or(AccountError::AddressResolution { missing: "public client" })
    }

    /// Resolves the address once with `compute`
    pub async fn resolve_address<F, Fut>(&self, compute: F) -> AccountResult<Address>
    where
        F: FnOnce() -> Fut + Send,
        Fut: std::future::Future<Output = AccountResult<Address>> + Send,
    {
        self.address.get_or_resolve(compute).await
    }

    /// Resolves the address once through `EntryPoint.getSenderAddress(initCode)`
    pub async fn resolve_with_entry_point(&self, init_code: Bytes) -> AccountResult<Address> {
        self.address
            .get_or_resolve(|| async {
                let client = self.client.as_deref().ok_or(AccountError::AddressResolution {
                    missing: "public client or precomputed address",
                })?;
                get_sender_address(client, &self.entry_point, init_code).await
            })
            .await
    }

    /// Bytecode presence at `address`
    pub async fn is_deployed(&self, address: Address) -> AccountResult<bool> {
        let deployed = self.public_client()?.has_code(address).await?;
        debug!("Account {address:?} deployed: {deployed}");
        Ok(deployed)
    }
}

/// Stub ECDSA signature with a valid shape, used while estimating gas
pub fn ecdsa_stub_signature() -> Bytes {
    from_hex(STUB_ECDSA).unwrap_or_default()
}

/// Capabilities of a smart account
///
/// `encode_calls` with a single call must return exactly `encode_call` of that call, and fails
/// with [AccountError::EmptyBatch] for an empty list.
#[async_trait]
pub trait SmartAccountApi: Send + Sync {
    /// Name used in errors and logs
    fn name(&self) -> &'static str;

    fn core(&self) -> &AccountCore;

    fn entry_point(&self) -> &EntryPoint {
        &self.core().entry_point
    }

    fn chain_id(&self) -> u64 {
        self.core().chain_id
    }

    async fn address(&self) -> AccountResult<Address>;

    async fn is_deployed(&self) -> AccountResult<bool> {
        let address = self.address().await?;
        self.core().is_deployed(address).await
    }

    /// Factory and factory data deploying the account
    async fn factory_args(&self) -> AccountResult<Option<(Address, Bytes)>>;

    /// `factory ‖ factoryData`, empty for accounts without a factory
    async fn init_code(&self) -> AccountResult<Bytes> {
        Ok(self
            .factory_args()
            .await?
            .map(|(factory, data)| pack_init_code(Some(factory), &data))
            .unwrap_or_default())
    }

    /// Key of the 2D nonce, selects the validator on modular accounts
    fn nonce_key(&self) -> U256 {
        U256::zero()
    }

    async fn nonce(&self) -> AccountResult<U256> {
        let address = self.address().await?;
        get_nonce(self.core().public_client()?, self.entry_point(), address, self.nonce_key()).await
    }

    fn encode_call(&self, call: &Call) -> AccountResult<Bytes>;

    fn encode_calls(&self, calls: &[Call]) -> AccountResult<Bytes>;

    /// Call data of the operation deploying the account
    fn encode_deployment_calls(&self, calls: &[Call]) -> AccountResult<Bytes> {
        self.encode_calls(calls)
    }

    fn stub_signature(&self) -> Bytes;

    /// Contract an EIP-7702 account delegates to
    fn eip7702_delegate(&self) -> Option<Address> {
        None
    }

    /// Authorization to sign before the next operation, `None` when none is needed
    async fn eip7702_authorization(&self) -> AccountResult<Option<Eip7702Authorization>> {
        Ok(None)
    }

    async fn sign_authorization(
        &self,
        _authorization: Eip7702Authorization,
    ) -> AccountResult<SignedAuthorization> {
        Err(AccountError::UnsupportedOperation {
            account: self.name(),
            operation: "EIP-7702 authorization",
            alternative: "use an EIP-7702 account".into(),
        })
    }

    fn hash_user_operation(&self, op: &UserOperation) -> AccountResult<UserOperationHash> {
        Ok(op.hash(self.entry_point(), self.chain_id(), self.eip7702_delegate())?)
    }

    async fn sign_user_operation(&self, op: &UserOperation) -> AccountResult<Bytes>;

    /// ERC-1271 signature of a message
    async fn sign_message(&self, message: &[u8]) -> AccountResult<Bytes>;

    /// ERC-1271 signature of typed data
    async fn sign_typed_data(&self, data: &TypedData) -> AccountResult<Bytes>;
}

/// Supported smart accounts
#[derive(Debug)]
pub enum SmartAccount {
    Simple(SimpleAccount),
    Safe(SafeAccount),
    Safe7579(Safe7579Account),
    Nexus(NexusAccount),
    Diamond(DiamondAccount),
    Eip7702(Eip7702Account),
}

macro_rules! dispatch {
    ($self:ident, $account:ident => $body:expr) => {
        match $self {
            SmartAccount::Simple($account) => $body,
            SmartAccount::Safe($account) => $body,
            SmartAccount::Safe7579($account) => $body,
            SmartAccount::Nexus($account) => $body,
            SmartAccount::Diamond($account) => $body,
            SmartAccount::Eip7702($account) => $body,
        }
    };
}

#[async_trait]
impl SmartAccountApi for SmartAccount {
    fn name(&self) -> &'static str {
        dispatch!(self, account => account.name())
    }

    fn core(&self) -> &AccountCore {
        dispatch!(self, account => account.core())
    }

    async fn address(&self) -> AccountResult<Address> {
        dispatch!(self, account => account.address().await)
    }

    async fn is_deployed(&self) -> AccountResult<bool> {
        dispatch!(self, account => account.is_deployed().await)
    }

    async fn factory_args(&self) -> AccountResult<Option<(Address, Bytes)>> {
        dispatch!(self, account => account.factory_args().await)
    }

    fn nonce_key(&self) -> U256 {
        dispatch!(self, account => account.nonce_key())
    }

    fn encode_call(&self, call: &Call) -> AccountResult<Bytes> {
        dispatch!(self, account => account.encode_call(call))
    }

    fn encode_calls(&self, calls: &[Call]) -> AccountResult<Bytes> {
        dispatch!(self, account => account.encode_calls(calls))
    }

    fn encode_deployment_calls(&self, calls: &[Call]) -> AccountResult<Bytes> {
        dispatch!(self, account => account.encode_deployment_calls(calls))
    }

    fn stub_signature(&self) -> Bytes {
        dispatch!(self, account => account.stub_signature())
    }

    fn eip7702_delegate(&self) -> Option<Address> {
        dispatch!(self, account => account.eip7702_delegate())
    }

    async fn eip7702_authorization(&self) -> AccountResult<Option<Eip7702Authorization>> {
        dispatch!(self, account => account.eip7702_authorization().await)
    }

    async fn sign_authorization(
        &self,
        authorization: Eip7702Authorization,
    ) -> AccountResult<SignedAuthorization> {
        dispatch!(self, account => account.sign_authorization(authorization).await)
    }

    async fn sign_user_operation(&self, op: &UserOperation) -> AccountResult<Bytes> {
        dispatch!(self, account => account.sign_user_operation(op).await)
    }

    async fn sign_message(&self, message: &[u8]) -> AccountResult<Bytes> {
        dispatch!(self, account => account.sign_message(message).await)
    }

    async fn sign_typed_data(&self, data: &TypedData) -> AccountResult<Bytes> {
        dispatch!(self, account => account.sign_typed_data(data).await)
    }
}

macro_rules! impl_from_account {
    ($($variant:ident($account:ty)),*) => {
        $(impl From<$account> for SmartAccount {
            fn from(account: $account) -> Self {
                Self::$variant(account)
            }
        })*
    };
}

impl_from_account!(
    Simple(SimpleAccount),
    Safe(SafeAccount),
    Safe7579(Safe7579Account),
    Nexus(NexusAccount),
    Diamond(DiamondAccount),
    Eip7702(Eip7702Account)
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_signature_shape() {
        let stub = ecdsa_stub_signature();
        assert_eq!(stub.len(), 65);
        assert_eq!(stub[64], 0x1c);
    }

    #[tokio::test]
    async fn resolution_names_missing_collaborator() {
        let core = AccountCore::new(EntryPoint::v07(), 1);
        let err = core.resolve_with_entry_point(Bytes::default()).await.unwrap_err();
        assert_eq!(err, AccountError::AddressResolution { missing: "public client or precomputed address" });
        assert_eq!(
            core.is_deployed(Address::zero()).await.unwrap_err(),
            AccountError::AddressResolution { missing: "public client" }
        );

        let precomputed = AccountCore::new(EntryPoint::v07(), 1).address(Address::repeat_byte(1));
        assert_eq!(
            precomputed.resolve_with_entry_point(Bytes::default()).await.unwrap(),
            Address::repeat_byte(1)
        );
    }
}
