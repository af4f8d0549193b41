//! Multi-owner threshold Safe operated through the Safe 4337 module

pub mod launchpad;

use crate::{
    account::{ecdsa_stub_signature, AccountCore, SmartAccountApi},
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
    codec::{abi, hex::from_hex, Packed},
    create2::{create2_address, initializer_salt},
    crypto::{chain_domain, domain_separator, eip191_hash, hash_typed_data, keccak, struct_hash, type_hash},
    parse_address,
    signer::signature_bytes,
    Call, EntryPoint, EntryPointVersion, SignerError, SmartAccountSigner, UserOperation,
};
use std::{collections::BTreeMap, sync::Arc};
use tracing::{debug, trace};

pub const PROXY_FACTORY: &str = "0x4e1DCf7AD4e460CfD30791CCC4F9c8a4f820ec67";
pub const SINGLETON: &str = "0x29fcB43b46531BcA003ddC8FCB67FFE91900C762";
pub const MODULE_V06: &str = "0xa581c4A4DB7175302464fF3C06380BC3270b4037";
pub const MODULE_V07: &str = "0x75cf11467937ce3F2f357CE24ffc3DBF8fD5c226";
/// `AddModulesLib`, enables the module during setup on entry point 0.6
pub const ADD_MODULES_LIB: &str = "0x8EcD4ec46D4D2a6B64fE960B3D64e8B94B2234eb";
/// `SafeModuleSetup`, enables the module during setup on entry point 0.7
pub const MODULE_SETUP: &str = "0x2dd68b007B46fBe91B9A7c3EDa5A7a1063cB5b47";
pub const MULTI_SEND: &str = "0x38869bf66a61cF6bDB996A6aE40D5853Fd43B526";
/// `SafeProxy` creation code of the proxy factory
pub const PROXY_CREATION_CODE: &str = "0x608060405234801561001057600080fd5b506040516101e63803806101e68339818101604052602081101561003357600080fd5b8101908080519060200190929190505050600073ffffffffffffffffffffffffffffffffffffffff168173ffffffffffffffffffffffffffffffffffffffff1614156100ca576040517f08c379a00000000000000000000000000000000000000000000000000000000081526004018080602001828103825260228152602001806101c46022913960400191505060405180910390fd5b806000806101000a81548173ffffffffffffffffffffffffffffffffffffffff021916908373ffffffffffffffffffffffffffffffffffffffff1602179055505060ab806101196000396000f3fe608060405273ffffffffffffffffffffffffffffffffffffffff600054167fa619486e0000000000000000000000000000000000000000000000000000000060003514156050578060005260206000f35b3660008037600080366000845af43d6000803e60008114156070573d6000fd5b3d6000f3fea264697066735822122003d1488ee65e08fa41e58e888a9865554c535f2c77126a82cb4c0f917f31441364736f6c63430007060033496e76616c69642073696e676c65746f6e20616464726573732070726f7669646564";

pub const SAFE_OP_TYPE_V06: &str = "SafeOp(address safe,uint256 nonce,bytes initCode,bytes callData,uint256 callGasLimit,uint256 verificationGasLimit,uint256 preVerificationGas,uint256 maxFeePerGas,uint256 maxPriorityFeePerGas,bytes paymasterAndData,uint48 validAfter,uint48 validUntil,address entryPoint)";
pub const SAFE_OP_TYPE_V07: &str = "SafeOp(address safe,uint256 nonce,bytes initCode,bytes callData,uint128 verificationGasLimit,uint128 callGasLimit,uint256 preVerificationGas,uint128 maxPriorityFeePerGas,uint128 maxFeePerGas,bytes paymasterAndData,uint48 validAfter,uint48 validUntil,address entryPoint)";
pub const SAFE_MESSAGE_TYPE: &str = "SafeMessage(bytes message)";

const NAME: &str = "safe";

/// `Enum.Operation` of Safe transactions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Operation {
    Call = 0,
    DelegateCall = 1,
}

/// Contracts of the account for one entry point
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SafeAddresses {
    pub proxy_factory: Address,
    pub singleton: Address,
    /// Safe 4337 module, also installed as fallback handler
    pub module: Address,
    /// Library delegate-called by `setup` to enable the module
    pub module_setup: Address,
    pub multi_send: Address,
    pub proxy_creation_code: Bytes,
}

impl SafeAddresses {
    pub fn for_entry_point(entry_point: &EntryPoint) -> AccountResult<Self> {
        let (module, module_setup) = match entry_point.version {
            EntryPointVersion::V06 => (MODULE_V06, ADD_MODULES_LIB),
            EntryPointVersion::V07 => (MODULE_V07, MODULE_SETUP),
            version => return Err(AccountError::unsupported_entry_point(NAME, version)),
        };
        Ok(Self {
            proxy_factory: parse_address(PROXY_FACTORY),
            singleton: parse_address(SINGLETON),
            module: parse_address(module),
            module_setup: parse_address(module_setup),
            multi_send: parse_address(MULTI_SEND),
            proxy_creation_code: from_hex(PROXY_CREATION_CODE)?,
        })
    }
}

/// Owner signing locally, or remotely with its signature supplied at signing time
#[derive(Clone, Debug)]
pub enum SafeOwner {
    Local(Arc<dyn SmartAccountSigner>),
    Remote(Address),
}

impl SafeOwner {
    pub fn address(&self) -> Address {
        match self {
            Self::Local(signer) => signer.address(),
            Self::Remote(address) => *address,
        }
    }
}

impl From<Arc<dyn SmartAccountSigner>> for SafeOwner {
    fn from(signer: Arc<dyn SmartAccountSigner>) -> Self {
        Self::Local(signer)
    }
}

/// Owner set with its signing threshold
#[derive(Clone, Debug)]
pub struct SafeOwners {
    owners: Vec<SafeOwner>,
    threshold: usize,
}

impl SafeOwners {
    /// Fails unless `1 <= threshold <= owners`
    pub fn new(owners: Vec<SafeOwner>, threshold: usize) -> AccountResult<Self> {
        if threshold == 0 || threshold > owners.len() {
            return Err(AccountError::InvalidThreshold { threshold, owners: owners.len() });
        }
        Ok(Self { owners, threshold })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Owner addresses in configuration order
    pub fn addresses(&self) -> Vec<Address> {
        self.owners.iter().map(SafeOwner::address).collect()
    }

    fn address_tokens(&self) -> Token {
        Token::Array(self.owners.iter().map(|owner| Token::Address(owner.address())).collect())
    }

    /// Concatenated owner signatures of `digest`, sorted by owner address
    ///
    /// Local owners sign, `supplied` signatures of remote owners are merged in; a supplied
    /// signature replaces the one of a local owner with the same address.
    pub async fn sign(&self, digest: H256, supplied: &[(Address, Bytes)]) -> AccountResult<Bytes> {
        let mut signatures = BTreeMap::new();
        for owner in &self.owners {
            if let SafeOwner::Local(signer) = owner {
                let signature = signer.sign_hash(digest).await?;
                signatures.insert(signer.address(), signature_bytes(&signature));
            }
        }
        let owners = self.addresses();
        for (owner, signature) in supplied {
            if !owners.contains(owner) {
                return Err(AccountError::UnknownOwner { owner: *owner });
            }
            signatures.insert(*owner, signature.clone());
        }
        if signatures.len() < self.threshold {
            return Err(AccountError::InsufficientSignatures {
                found: signatures.len(),
                threshold: self.threshold,
            });
        }
        trace!("Collected {} owner signatures for {digest:?}", signatures.len());
        Ok(signatures
            .into_values()
            .take(self.threshold)
            .flat_map(|signature| signature.to_vec())
            .collect::<Vec<u8>>()
            .into())
    }

    /// One stub signature per required owner
    pub fn stub_signatures(&self) -> Bytes {
        ecdsa_stub_signature().repeat(self.threshold).into()
    }
}

/// `uint48 validAfter ‖ uint48 validUntil` prefix of module signatures
pub fn validity_prefix(valid_after: u64, valid_until: u64) -> Packed {
    Packed::new().uint(U256::from(valid_after), 48).uint(U256::from(valid_until), 48)
}

/// EIP-712 digest of the `SafeOp` verified by `verifying_contract` (the 4337 module or adapter)
pub fn safe_op_hash(
    op: &UserOperation,
    entry_point: &EntryPoint,
    chain_id: u64,
    verifying_contract: Address,
    valid_after: u64,
    valid_until: u64,
) -> AccountResult<H256> {
    op.check_entry_point(entry_point)?;
    let validity = [Token::Uint(valid_after.into()), Token::Uint(valid_until.into())];
    let struct_hash = match op {
        UserOperation::V06(op) => struct_hash(
            type_hash(SAFE_OP_TYPE_V06),
            [
                vec![
                    Token::Address(op.sender),
                    Token::Uint(op.nonce),
                    bytes_hash(&op.init_code),
                    bytes_hash(&op.call_data),
                    Token::Uint(op.call_gas_limit),
                    Token::Uint(op.verification_gas_limit),
                    Token::Uint(op.pre_verification_gas),
                    Token::Uint(op.max_fee_per_gas),
                    Token::Uint(op.max_priority_fee_per_gas),
                    bytes_hash(&op.paymaster_and_data),
                ],
                validity.to_vec(),
                vec![Token::Address(entry_point.address)],
            ]
            .concat(),
        ),
        UserOperation::V07(op) => struct_hash(
            type_hash(SAFE_OP_TYPE_V07),
            [
                vec![
                    Token::Address(op.sender),
                    Token::Uint(op.nonce),
                    bytes_hash(&op.init_code()),
                    bytes_hash(&op.call_data),
                    Token::Uint(op.verification_gas_limit),
                    Token::Uint(op.call_gas_limit),
                    Token::Uint(op.pre_verification_gas),
                    Token::Uint(op.max_priority_fee_per_gas),
                    Token::Uint(op.max_fee_per_gas),
                    bytes_hash(&op.paymaster_and_data()),
                ],
                validity.to_vec(),
                vec![Token::Address(entry_point.address)],
            ]
            .concat(),
        ),
    };
    Ok(hash_typed_data(domain_separator(&chain_domain(chain_id, verifying_contract)), struct_hash))
}

fn bytes_hash(data: &[u8]) -> Token {
    Token::FixedBytes(keccak(data).as_bytes().to_vec())
}

/// Digest owners sign for `isValidSignature(hash)` on the Safe at `safe`
pub fn safe_message_hash(safe: Address, chain_id: u64, message_hash: H256) -> H256 {
    let message = struct_hash(
        type_hash(SAFE_MESSAGE_TYPE),
        vec![Token::FixedBytes(keccak(message_hash.as_bytes()).as_bytes().to_vec())],
    );
    hash_typed_data(domain_separator(&chain_domain(chain_id, safe)), message)
}

/// `createProxyWithNonce(singleton, initializer, saltNonce)`
pub fn create_proxy_data(singleton: Address, initializer: &Bytes, salt_nonce: U256) -> Bytes {
    abi::encode_function_call(
        "createProxyWithNonce(address,bytes,uint256)",
        &[Token::Address(singleton), Token::Bytes(initializer.to_vec()), Token::Uint(salt_nonce)],
    )
}

/// Address of the proxy deployed by `createProxyWithNonce`
pub fn proxy_address(
    addresses: &SafeAddresses,
    singleton: Address,
    initializer: &[u8],
    salt_nonce: U256,
) -> Address {
    let deployment_code =
        [&addresses.proxy_creation_code[..], &abi::encode_address(singleton)[..]].concat();
    create2_address(
        addresses.proxy_factory,
        initializer_salt(initializer, salt_nonce),
        keccak(deployment_code),
    )
}

/// `multiSend(transactions)` of packed `operation ‖ to ‖ value ‖ dataLength ‖ data` entries
pub fn encode_multi_send(calls: &[Call]) -> Bytes {
    let transactions = calls
        .iter()
        .fold(Packed::new(), |packed, call| {
            packed
                .uint(U256::from(Operation::Call as u8), 8)
                .address(call.to)
                .uint(call.value, 256)
                .uint(U256::from(call.data.len()), 256)
                .bytes(&call.data)
        })
        .finish();
    abi::encode_function_call("multiSend(bytes)", &[Token::Bytes(transactions.to_vec())])
}

#[derive(Debug)]
pub struct SafeAccount {
    core: AccountCore,
    owners: SafeOwners,
    salt_nonce: U256,
    valid_after: u64,
    valid_until: u64,
    addresses: SafeAddresses,
}

impl SafeAccount {
    pub fn new(core: AccountCore, owners: SafeOwners) -> AccountResult<Self> {
        let addresses = SafeAddresses::for_entry_point(&core.entry_point)?;
        Ok(Self { core, owners, salt_nonce: U256::zero(), valid_after: 0, valid_until: 0, addresses })
    }

    pub fn salt_nonce(mut self, salt_nonce: U256) -> Self {
        self.salt_nonce = salt_nonce;
        self
    }

    /// Validity window of signed operations, `0` means unbounded
    pub fn validity(mut self, valid_after: u64, valid_until: u64) -> Self {
        self.valid_after = valid_after;
        self.valid_until = valid_until;
        self
    }

    pub fn addresses(mut self, addresses: SafeAddresses) -> Self {
        self.addresses = addresses;
        self
    }

    pub fn owners(&self) -> &SafeOwners {
        &self.owners
    }

    /// `setup(owners, threshold, moduleSetup, enableModules([module]), module, 0, 0, 0)`
    pub fn initializer(&self) -> Bytes {
        let enable_modules = abi::encode_function_call(
            "enableModules(address[])",
            &[Token::Array(vec![Token::Address(self.addresses.module)])],
        );
        abi::encode_function_call(
            "setup(address[],uint256,address,bytes,address,address,uint256,address)",
            &[
                self.owners.address_tokens(),
                Token::Uint(self.owners.threshold().into()),
                Token::Address(self.addresses.module_setup),
                Token::Bytes(enable_modules.to_vec()),
                Token::Address(self.addresses.module),
                Token::Address(Address::zero()),
                Token::Uint(U256::zero()),
                Token::Address(Address::zero()),
            ],
        )
    }

    pub fn counterfactual_address(&self) -> Address {
        proxy_address(&self.addresses, self.addresses.singleton, &self.initializer(), self.salt_nonce)
    }

    /// `SafeOp` digest each owner signs
    pub fn safe_op_hash(&self, op: &UserOperation) -> AccountResult<H256> {
        safe_op_hash(
            op,
            &self.core.entry_point,
            self.core.chain_id,
            self.addresses.module,
            self.valid_after,
            self.valid_until,
        )
    }

    /// Signs with local owners and merges the signatures of remote owners
    pub async fn sign_user_operation_with(
        &self,
        op: &UserOperation,
        supplied: &[(Address, Bytes)],
    ) -> AccountResult<Bytes> {
        let digest = self.safe_op_hash(op)?;
        let signatures = self.owners.sign(digest, supplied).await?;
        Ok(validity_prefix(self.valid_after, self.valid_until).bytes(&signatures).finish())
    }

    async fn sign_safe_message(&self, message_hash: H256) -> AccountResult<Bytes> {
        let safe = self.address().await?;
        self.owners.sign(safe_message_hash(safe, self.core.chain_id, message_hash), &[]).await
    }

    fn execute(&self, to: Address, value: U256, data: &Bytes, operation: Operation) -> Bytes {
        abi::encode_function_call(
            "executeUserOpWithErrorString(address,uint256,bytes,uint8)",
            &[
                Token::Address(to),
                Token::Uint(value),
                Token::Bytes(data.to_vec()),
                Token::Uint(U256::from(operation as u8)),
            ],
        )
    }
}

#[async_trait]
impl SmartAccountApi for SafeAccount {
    fn name(&self) -> &'static str {
        NAME
    }

    fn core(&self) -> &AccountCore {
        &self.core
    }

    async fn address(&self) -> AccountResult<Address> {
        let address = self.counterfactual_address();
        self.core
            .resolve_address(|| async move {
                debug!("Derived safe address {address:?}");
                Ok(address)
            })
            .await
    }

    async fn factory_args(&self) -> AccountResult<Option<(Address, Bytes)>> {
        let data = create_proxy_data(self.addresses.singleton, &self.initializer(), self.salt_nonce);
        Ok(Some((self.addresses.proxy_factory, data)))
    }

    fn encode_call(&self, call: &Call) -> AccountResult<Bytes> {
        Ok(self.execute(call.to, call.value, &call.data, Operation::Call))
    }

    fn encode_calls(&self, calls: &[Call]) -> AccountResult<Bytes> {
        match calls {
            [] => Err(AccountError::EmptyBatch),
            [call] => self.encode_call(call),
            calls => Ok(self.execute(
                self.addresses.multi_send,
                U256::zero(),
                &encode_multi_send(calls),
                Operation::DelegateCall,
            )),
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::ParamType;
    use keel_primitives::{
        signer::{parse_signature, recover},
        GasEstimate, UserOperationFees, Wallet,
    };

    const KEY_A: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const KEY_B: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    fn signer(key: &str) -> Arc<dyn SmartAccountSigner> {
        Arc::new(Wallet::from_private_key(key).unwrap())
    }

    fn account(threshold: usize) -> SafeAccount {
        let owners = SafeOwners::new(vec![signer(KEY_A).into(), signer(KEY_B).into()], threshold).unwrap();
        SafeAccount::new(AccountCore::new(EntryPoint::v07(), 1), owners).unwrap()
    }

    #[test]
    fn threshold_validation() {
        let owners = || vec![SafeOwner::Remote(Address::repeat_byte(1))];
        assert_eq!(SafeOwners::new(owners(), 0).unwrap_err(), AccountError::InvalidThreshold { threshold: 0, owners: 1 });
        assert_eq!(SafeOwners::new(owners(), 2).unwrap_err(), AccountError::InvalidThreshold { threshold: 2, owners: 1 });
        assert!(SafeOwners::new(owners(), 1).is_ok());
    }

    #[test]
    fn unsupported_entry_point() {
        let owners = SafeOwners::new(vec![signer(KEY_A).into()], 1).unwrap();
        let err = SafeAccount::new(AccountCore::new(EntryPoint::v08(), 1), owners).unwrap_err();
        assert_eq!(err, AccountError::unsupported_entry_point("safe", EntryPointVersion::V08));
    }

    #[tokio::test]
    async fn address_is_deterministic_and_distinct() {
        let first = account(1).address().await.unwrap();
        assert_eq!(first, account(1).address().await.unwrap());
        assert_ne!(first, account(2).address().await.unwrap());
        assert_ne!(first, account(1).salt_nonce(U256::one()).address().await.unwrap());

        let v06 = SafeAccount::new(
            AccountCore::new(EntryPoint::v06(), 1),
            SafeOwners::new(vec![signer(KEY_A).into(), signer(KEY_B).into()], 1).unwrap(),
        )
        .unwrap();
        assert_ne!(first, v06.address().await.unwrap());
    }

    const OWNER_A: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const OWNER_B: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    fn remote(entry_point: EntryPoint, owners: &[&str]) -> SafeAccount {
        let owners = owners.iter().map(|owner| SafeOwner::Remote(parse_address(owner))).collect();
        SafeAccount::new(AccountCore::new(entry_point, 1), SafeOwners::new(owners, 1).unwrap()).unwrap()
    }

    #[test]
    fn counterfactual_addresses() {
        let cases = [
            (EntryPoint::v06(), vec![OWNER_A, OWNER_B], 0u64, "0x68e2b9be82bb2e65f6991d833c13b30e526a30df"),
            (EntryPoint::v06(), vec![OWNER_A], 7, "0x5ad41582a07b4a6fc4ab6ca258c273a689498c7d"),
            (EntryPoint::v07(), vec![OWNER_A, OWNER_B], 0, "0x8d5490dfa3742920a33d311eb89685e9f23e06ce"),
            (EntryPoint::v07(), vec![OWNER_A], 7, "0xc7af5c4087b6464901fd2defc2f2060758be40fd"),
        ];
        for (entry_point, owners, salt_nonce, expected) in cases {
            let account = remote(entry_point, &owners).salt_nonce(U256::from(salt_nonce));
            assert_eq!(account.counterfactual_address(), parse_address(expected), "{owners:?} salt {salt_nonce}");
        }
    }

    #[test]
    fn safe_op_hashes() {
        let op = |entry_point: &EntryPoint| {
            UserOperation::empty(entry_point, Address::repeat_byte(0x99))
                .with_nonce(U256::one())
                .with_call_data(vec![0xde, 0xad, 0xbe, 0xef].into())
                .with_gas_estimate(&GasEstimate {
                    pre_verification_gas: 50_000.into(),
                    verification_gas_limit: 200_000.into(),
                    call_gas_limit: 100_000.into(),
                    paymaster_verification_gas_limit: None,
                    paymaster_post_op_gas_limit: None,
                })
                .with_fees(UserOperationFees {
                    max_fee_per_gas: 2_000_000_000u64.into(),
                    max_priority_fee_per_gas: 1_000_000_000u64.into(),
                })
        };

        let v06 = remote(EntryPoint::v06(), &[OWNER_A]).validity(10, 20);
        assert_eq!(
            v06.safe_op_hash(&op(&EntryPoint::v06())).unwrap(),
            "0xf0c2583482ef17a565da97b2604c2b89a910e5ff87661497804d421a6e69289c".parse::<H256>().unwrap()
        );
        let v07 = remote(EntryPoint::v07(), &[OWNER_A]).validity(10, 20);
        assert_eq!(
            v07.safe_op_hash(&op(&EntryPoint::v07())).unwrap(),
            "0xddf4fc9cf085f279aa7d113634bc0b5c720c62047d40cc662bb5a615d92d6f67".parse::<H256>().unwrap()
        );
    }

    #[tokio::test]
    async fn factory_args() {
        let account = account(2);
        let (factory, data) = account.factory_args().await.unwrap().unwrap();
        assert_eq!(factory, parse_address(PROXY_FACTORY));
        // createProxyWithNonce(address,bytes,uint256) and setup(...)
        assert_eq!(&data[..4], &[0x16, 0x88, 0xf0, 0xb9]);
        assert_eq!(&account.initializer()[..4], &[0xb6, 0x3e, 0x80, 0x0d]);
        let tokens = abi::decode(&[ParamType::Address, ParamType::Bytes, ParamType::Uint(256)], &data[4..]).unwrap();
        assert_eq!(tokens[0], Token::Address(parse_address(SINGLETON)));
        assert_eq!(tokens[1], Token::Bytes(account.initializer().to_vec()));
        assert_eq!(&account.initializer()[..4], &abi::selector("setup(address[],uint256,address,bytes,address,address,uint256,address)"));
    }

    #[test]
    fn calls() {
        let account = account(1);
        let call = Call::new(Address::repeat_byte(1)).value(U256::one());
        assert_eq!(account.encode_calls(std::slice::from_ref(&call)).unwrap(), account.encode_call(&call).unwrap());
        assert_eq!(account.encode_calls(&[]), Err(AccountError::EmptyBatch));

        let batch = account.encode_calls(&[call.clone(), Call::new(Address::repeat_byte(2))]).unwrap();
        let tokens = abi::decode(
            &[ParamType::Address, ParamType::Uint(256), ParamType::Bytes, ParamType::Uint(8)],
            &batch[4..],
        )
        .unwrap();
        assert_eq!(tokens[0], Token::Address(parse_address(MULTI_SEND)));
        assert_eq!(tokens[3], Token::Uint(U256::one()));
        // two packed transactions of 1 + 20 + 32 + 32 bytes without data
        let multi_send = tokens[2].clone().into_bytes().unwrap();
        let transactions = abi::decode_bytes(&multi_send[4..]).unwrap();
        assert_eq!(transactions.len(), 2 * 85);
    }

    #[tokio::test]
    async fn signatures_are_sorted_and_prefixed() {
        let account = account(2).validity(10, 20);
        let op = UserOperation::empty(&EntryPoint::v07(), Address::repeat_byte(9));
        let signature = account.sign_user_operation(&op).await.unwrap();
        assert_eq!(signature.len(), 12 + 2 * 65);
        assert_eq!(&signature[..12], &[0, 0, 0, 0, 0, 10, 0, 0, 0, 0, 0, 20]);

        let digest = account.safe_op_hash(&op).unwrap();
        let first = recover(digest, &parse_signature(&signature[12..77]).unwrap()).unwrap();
        let second = recover(digest, &parse_signature(&signature[77..]).unwrap()).unwrap();
        assert!(first < second);
        assert_eq!(signature, account.sign_user_operation(&op).await.unwrap());
        assert_ne!(signature, account.sign_user_operation(&op.with_nonce(U256::one())).await.unwrap());
        assert_eq!(account.stub_signature().len(), signature.len());
    }

    #[tokio::test]
    async fn remote_owner_signatures_are_merged() {
        let remote = signer(KEY_B);
        let owners = SafeOwners::new(vec![signer(KEY_A).into(), SafeOwner::Remote(remote.address())], 2).unwrap();
        let account = SafeAccount::new(AccountCore::new(EntryPoint::v06(), 1), owners).unwrap();
        let op = UserOperation::empty(&EntryPoint::v06(), Address::repeat_byte(9));

        let err = account.sign_user_operation(&op).await.unwrap_err();
        assert_eq!(err, AccountError::InsufficientSignatures { found: 1, threshold: 2 });

        let digest = account.safe_op_hash(&op).unwrap();
        let remote_signature = signature_bytes(&remote.sign_hash(digest).await.unwrap());
        let signature = account
            .sign_user_operation_with(&op, &[(remote.address(), remote_signature.clone())])
            .await
            .unwrap();
        assert_eq!(signature.len(), 12 + 2 * 65);

        let stranger = (Address::repeat_byte(0xee), remote_signature);
        assert_eq!(
            account.sign_user_operation_with(&op, &[stranger]).await.unwrap_err(),
            AccountError::UnknownOwner { owner: Address::repeat_byte(0xee) }
        );
    }

    #[tokio::test]
    async fn message_signature_wraps_safe_message() {
        let account = account(1);
        let signature = account.sign_message(b"hello world").await.unwrap();
        assert_eq!(signature.len(), 65);
        let safe = account.address().await.unwrap();
        let digest = safe_message_hash(safe, 1, eip191_hash(b"hello world"));
        let owner = recover(digest, &parse_signature(&signature).unwrap()).unwrap();
        assert!(account.owners().addresses().contains(&owner));
    }
}
