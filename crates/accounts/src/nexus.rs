//! ERC-7579 modular account validated by an external K1 (ECDSA) validator

use crate::{
    account::{ecdsa_stub_signature, AccountCore, SmartAccountApi},
    erc7579,
    error::{AccountError, AccountResult},
};
use async_trait::async_trait;
use ethers::{
    abi::Token,
    types::{transaction::eip712::TypedData, Address, Bytes, U256},
};
use keel_primitives::{
    codec::{abi, Packed},
    nonce::key_from_bytes,
    parse_address,
    signer::signature_bytes,
    Call, EntryPointVersion, SmartAccountSigner, UserOperation,
};
use std::sync::Arc;

pub const K1_VALIDATOR_FACTORY: &str = "0x00000bb19a3579F4D779215dEf97AFbd0e30DB55";
pub const K1_VALIDATOR: &str = "0x00000004171351c442B202678c48D8AB5B321E8f";

const NAME: &str = "nexus";

/// Validation mode byte of the nonce key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ValidationMode {
    Default = 0x00,
    Enable = 0x01,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NexusAddresses {
    pub factory: Address,
    pub validator: Address,
}

impl Default for NexusAddresses {
    fn default() -> Self {
        Self { factory: parse_address(K1_VALIDATOR_FACTORY), validator: parse_address(K1_VALIDATOR) }
    }
}

#[derive(Debug)]
pub struct NexusAccount {
    core: AccountCore,
    owner: Arc<dyn SmartAccountSigner>,
    index: U256,
    attesters: Vec<Address>,
    attesters_threshold: u8,
    addresses: NexusAddresses,
}

impl NexusAccount {
    pub fn new(core: AccountCore, owner: Arc<dyn SmartAccountSigner>) -> AccountResult<Self> {
        if core.entry_point.version != EntryPointVersion::V07 {
            return Err(AccountError::unsupported_entry_point(NAME, core.entry_point.version));
        }
        Ok(Self {
            core,
            owner,
            index: U256::zero(),
            attesters: Vec::new(),
            attesters_threshold: 0,
            addresses: NexusAddresses::default(),
        })
    }

    pub fn index(mut self, index: U256) -> Self {
        self.index = index;
        self
    }

    pub fn attesters(mut self, attesters: Vec<Address>, threshold: u8) -> Self {
        self.attesters = attesters;
        self.attesters_threshold = threshold;
        self
    }

    pub fn addresses(mut self, addresses: NexusAddresses) -> Self {
        self.addresses = addresses;
        self
    }

    /// `createAccount(eoaOwner, index, attesters, threshold)`
    pub fn factory_data(&self) -> Bytes {
        abi::encode_function_call(
            "createAccount(address,uint256,address[],uint8)",
            &[
                Token::Address(self.owner.address()),
                Token::Uint(self.index),
                Token::Array(self.attesters.iter().copied().map(Token::Address).collect()),
                Token::Uint(U256::from(self.attesters_threshold)),
            ],
        )
    }

    fn with_validator(&self, signature: Bytes) -> Bytes {
        Packed::new().address(self.addresses.validator).bytes(signature).finish()
    }
}

#[async_trait]
impl SmartAccountApi for NexusAccount {
    fn name(&self) -> &'static str {
        NAME
    }

    fn core(&self) -> &AccountCore {
        &self.core
    }

    async fn address(&self) -> AccountResult<Address> {
        let init_code = self.init_code().await?;
        self.core.resolve_with_entry_point(init_code).await
    }

    async fn factory_args(&self) -> AccountResult<Option<(Address, Bytes)>> {
        Ok(Some((self.addresses.factory, self.factory_data())))
    }

    /// `bytes3(0) ‖ mode ‖ validator`
    fn nonce_key(&self) -> U256 {
        key_from_bytes(
            &[&[0u8; 3][..], &[ValidationMode::Default as u8], self.addresses.validator.as_bytes()]
                .concat(),
        )
    }

    fn encode_call(&self, call: &Call) -> AccountResult<Bytes> {
        erc7579::encode_execute(std::slice::from_ref(call))
    }

    fn encode_calls(&self, calls: &[Call]) -> AccountResult<Bytes> {
        erc7579::encode_execute(calls)
    }

    fn stub_signature(&self) -> Bytes {
        ecdsa_stub_signature()
    }

    async fn sign_user_operation(&self, op: &UserOperation) -> AccountResult<Bytes> {
        let hash = self.hash_user_operation(op)?;
        Ok(signature_bytes(&self.owner.sign_message(hash.as_bytes()).await?))
    }

    /// Validator address followed by the owner signature
    async fn sign_message(&self, message: &[u8]) -> AccountResult<Bytes> {
        let signature = signature_bytes(&self.owner.sign_message(message).await?);
        Ok(self.with_validator(signature))
    }

    async fn sign_typed_data(&self, data: &TypedData) -> AccountResult<Bytes> {
        let signature = signature_bytes(&self.owner.sign_typed_data(data).await?);
        Ok(self.with_validator(signature))
    }
}
