//! Safe with the ERC-7579 adapter, deployed through the 7579 launchpad
//!
//! The proxy is created with the launchpad as singleton and `preValidationSetup(initHash, 0, "")`
//! as initializer. The first user operation calls `setupSafe(initData)`, which sets up the Safe,
//! installs the modules and then runs the user's calls; later operations use ERC-7579 `execute`.

use super::{
    create_proxy_data, proxy_address, safe_message_hash, safe_op_hash, validity_prefix,
    SafeAddresses, SafeOwners,
};
use crate::{
    account::{AccountCore, SmartAccountApi},
    erc7579,
    error::{AccountError, AccountResult},
};
use async_trait::async_trait;
use ethers::{
    abi::Token,
    types::{
        transaction::eip712::{Eip712, TypedData},
        Address, Bytes, H256, U256,
    },
};
use keel_primitives::{
    codec::abi, crypto::{eip191_hash, keccak}, nonce::key_from_bytes, parse_address, Call,
    EntryPointVersion, SignerError, UserOperation,
};

pub const LAUNCHPAD: &str = "0x7579011aB74c46090561ea277Ba79D510c6C00ff";
pub const ADAPTER: &str = "0x7579EE8307284F293B1927136486880611F20002";
pub const OWNABLE_VALIDATOR: &str = "0x2483DA3A338895199E5e538530213157e931Bf06";

const NAME: &str = "safe7579";

/// Module installed during setup, with its `onInstall` data
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleInit {
    pub module: Address,
    pub init_data: Bytes,
}

impl ModuleInit {
    pub fn new(module: Address, init_data: Bytes) -> Self {
        Self { module, init_data }
    }

    fn token(&self) -> Token {
        Token::Tuple(vec![Token::Address(self.module), Token::Bytes(self.init_data.to_vec())])
    }
}

fn module_tokens(modules: &[ModuleInit]) -> Token {
    Token::Array(modules.iter().map(ModuleInit::token).collect())
}

/// Modules and attestations configured at setup
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Safe7579Modules {
    pub validators: Vec<ModuleInit>,
    pub executors: Vec<ModuleInit>,
    pub fallbacks: Vec<ModuleInit>,
    pub hooks: Vec<ModuleInit>,
    pub attesters: Vec<Address>,
    pub attesters_threshold: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Safe7579Addresses {
    pub safe: SafeAddresses,
    pub launchpad: Address,
    pub adapter: Address,
}

impl Safe7579Addresses {
    pub fn new(safe: SafeAddresses) -> Self {
        Self { safe, launchpad: parse_address(LAUNCHPAD), adapter: parse_address(ADAPTER) }
    }
}

#[derive(Debug)]
pub struct Safe7579Account {
    core: AccountCore,
    owners: SafeOwners,
    salt_nonce: U256,
    valid_after: u64,
    valid_until: u64,
    modules: Safe7579Modules,
    /// Validator selected through the nonce key, zero for Safe owner signatures
    validator: Address,
    addresses: Safe7579Addresses,
}

impl Safe7579Account {
    pub fn new(core: AccountCore, owners: SafeOwners) -> AccountResult<Self> {
        if core.entry_point.version != EntryPointVersion::V07 {
            return Err(AccountError::unsupported_entry_point(NAME, core.entry_point.version));
        }
        let addresses = Safe7579Addresses::new(SafeAddresses::for_entry_point(&core.entry_point)?);
        Ok(Self {
            core,
            owners,
            salt_nonce: U256::zero(),
            valid_after: 0,
            valid_until: 0,
            modules: Safe7579Modules::default(),
            validator: Address::zero(),
            addresses,
        })
    }

    pub fn salt_nonce(mut self, salt_nonce: U256) -> Self {
        self.salt_nonce = salt_nonce;
        self
    }

    pub fn validity(mut self, valid_after: u64, valid_until: u64) -> Self {
        self.valid_after = valid_after;
        self.valid_until = valid_until;
        self
    }

    pub fn modules(mut self, modules: Safe7579Modules) -> Self {
        self.modules = modules;
        self
    }

    pub fn validator(mut self, validator: Address) -> Self {
        self.validator = validator;
        self
    }

    pub fn addresses(mut self, addresses: Safe7579Addresses) -> Self {
        self.addresses = addresses;
        self
    }

    /// `initSafe7579(adapter, executors, fallbacks, hooks, attesters, threshold)`, delegate-called
    /// on the launchpad by `setup`
    pub fn setup_data(&self) -> Bytes {
        abi::encode_function_call(
            "initSafe7579(address,(address,bytes)[],(address,bytes)[],(address,bytes)[],address[],uint8)",
            &[
                Token::Address(self.addresses.adapter),
                module_tokens(&self.modules.executors),
                module_tokens(&self.modules.fallbacks),
                module_tokens(&self.modules.hooks),
                Token::Array(self.modules.attesters.iter().copied().map(Token::Address).collect()),
                Token::Uint(U256::from(self.modules.attesters_threshold)),
            ],
        )
    }

    /// Leading `InitData` members, everything but the call data
    fn init_tokens(&self) -> Vec<Token> {
        vec![
            Token::Address(self.addresses.safe.singleton),
            self.owners.address_tokens(),
            Token::Uint(U256::from(self.owners.threshold())),
            Token::Address(self.addresses.launchpad),
            Token::Bytes(self.setup_data().to_vec()),
            Token::Address(self.addresses.adapter),
            module_tokens(&self.modules.validators),
        ]
    }

    /// Hash committed to at deployment, independent of the first operation's calls
    pub fn init_hash(&self) -> H256 {
        keccak(abi::encode(&self.init_tokens()))
    }

    /// `preValidationSetup(initHash, address(0), "")`
    pub fn initializer(&self) -> Bytes {
        abi::encode_function_call(
            "preValidationSetup(bytes32,address,bytes)",
            &[
                Token::FixedBytes(self.init_hash().as_bytes().to_vec()),
                Token::Address(Address::zero()),
                Token::Bytes(Vec::new()),
            ],
        )
    }

    pub fn counterfactual_address(&self) -> Address {
        proxy_address(
            &self.addresses.safe,
            self.addresses.launchpad,
            &self.initializer(),
            self.salt_nonce,
        )
    }

    pub fn safe_op_hash(&self, op: &UserOperation) -> AccountResult<H256> {
        safe_op_hash(
            op,
            &self.core.entry_point,
            self.core.chain_id,
            self.addresses.adapter,
            self.valid_after,
            self.valid_until,
        )
    }

    pub async fn sign_user_operation_with(
        &self,
        op: &UserOperation,
        supplied: &[(Address, Bytes)],
    ) -> AccountResult<Bytes> {
        let signatures = self.owners.sign(self.safe_op_hash(op)?, supplied).await?;
        Ok(validity_prefix(self.valid_after, self.valid_until).bytes(&signatures).finish())
    }

    async fn sign_safe_message(&self, message_hash: H256) -> AccountResult<Bytes> {
        let safe = self.address().await?;
        self.owners.sign(safe_message_hash(safe, self.core.chain_id, message_hash), &[]).await
    }
}

#[async_trait]
impl SmartAccountApi for Safe7579Account {
    fn name(&self) -> &'static str {
        NAME
    }

    fn core(&self) -> &AccountCore {
        &self.core
    }

    async fn address(&self) -> AccountResult<Address> {
        let address = self.counterfactual_address();
        self.core.resolve_address(|| async move { Ok(address) }).await
    }

    async fn factory_args(&self) -> AccountResult<Option<(Address, Bytes)>> {
        let data = create_proxy_data(self.addresses.launchpad, &self.initializer(), self.salt_nonce);
        Ok(Some((self.addresses.safe.proxy_factory, data)))
    }

    /// `validator ‖ bytes4(0)`
    fn nonce_key(&self) -> U256 {
        key_from_bytes(&[self.validator.as_bytes(), &[0u8; 4][..]].concat())
    }

    fn encode_call(&self, call: &Call) -> AccountResult<Bytes> {
        erc7579::encode_execute(std::slice::from_ref(call))
    }

    fn encode_calls(&self, calls: &[Call]) -> AccountResult<Bytes> {
        erc7579::encode_execute(calls)
    }

    /// `setupSafe(initData)` running `calls` once the Safe is set up
    fn encode_deployment_calls(&self, calls: &[Call]) -> AccountResult<Bytes> {
        let mut init_data = self.init_tokens();
        init_data.push(Token::Bytes(erc7579::encode_execute(calls)?.to_vec()));
        Ok(abi::encode_function_call(
            "setupSafe((address,address[],uint256,address,bytes,address,(address,bytes)[],bytes))",
            &[Token::Tuple(init_data)],
        ))
    }

    fn stub_signature(&self) -> Bytes {
        validity_prefix(self.valid_after, self.valid_until)
            .bytes(self.owners.stub_signatures())
            .finish()
    }

    async fn sign_user_operation(&self, op: &UserOperation) -> AccountResult<Bytes> {
        self.sign_user_operation_with(op, &[]).await
    }

    async fn sign_message(&self, message: &[u8]) -> AccountResult<Bytes> {
        self.sign_safe_message(eip191_hash(message)).await
    }

    async fn sign_typed_data(&self, data: &TypedData) -> AccountResult<Bytes> {
        let hash = data
            .encode_eip712()
            .map_err(|err| SignerError::TypedData { inner: err.to_string() })?;
        self.sign_safe_message(H256::from(hash)).await
    }
}
