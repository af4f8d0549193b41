//! User operation of the entry point v0.7 (also used by v0.8) and its packed on-chain form

use super::UserOperationHash;
use crate::{
    authorization::factory_marker,
    codec::abi,
    constants::{eip7702::FACTORY_MARKER_SHORT, entry_point as entry_point_constants},
    crypto::{hash_typed_data, keccak, struct_hash, type_hash},
    error::{CodecError, CodecResult, UserOperationError},
    utils::{
        as_checksum_addr, as_checksum_addr_opt, pack_init_code, pack_paymaster_and_data,
        pack_uint128, unpack_init_code, unpack_paymaster_and_data, unpack_uint128,
    },
};
use ethers::{
    abi::{ParamType, Token},
    types::{transaction::eip712::EIP712Domain, Address, Bytes, H256, U256},
    utils::to_checksum,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// User operation (entry point v0.7 and v0.8)
///
/// Factory and paymaster fields are optional and omitted from JSON when absent. The EIP-7702
/// factory marker serializes to its short form `0x7702`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationV07 {
    /// Sender of the user operation
    #[serde(serialize_with = "as_checksum_addr")]
    pub sender: Address,

    /// Nonce (192-bit key and 64-bit sequence)
    pub nonce: U256,

    /// Factory deploying the account (or the EIP-7702 marker)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_factory",
        deserialize_with = "deserialize_factory"
    )]
    pub factory: Option<Address>,

    /// Data passed to the factory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_data: Option<Bytes>,

    /// The data that is passed to the sender during the main execution call
    pub call_data: Bytes,

    /// The amount of gas to allocate for the main execution call
    pub call_gas_limit: U256,

    /// The amount of gas to allocate for the verification step
    pub verification_gas_limit: U256,

    /// The amount of gas to pay bundler to compensate for the pre-verification execution and
    /// calldata
    pub pre_verification_gas: U256,

    /// Maximum fee per gas (similar to EIP-1559)
    pub max_fee_per_gas: U256,

    /// Maximum priority fee per gas (similar to EIP-1559)
    pub max_priority_fee_per_gas: U256,

    /// Paymaster sponsoring the user operation
    #[serde(default, skip_serializing_if = "Option::is_none", serialize_with = "as_checksum_addr_opt")]
    pub paymaster: Option<Address>,

    /// Gas for the paymaster validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,

    /// Gas for the paymaster post-operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,

    /// Data passed to the paymaster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_data: Option<Bytes>,

    /// Data passed to the account along with the nonce during the verification step
    pub signature: Bytes,
}

fn serialize_factory<S>(val: &Option<Address>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match val {
        Some(addr) if *addr == factory_marker() => s.serialize_str(FACTORY_MARKER_SHORT),
        Some(addr) => s.serialize_str(&to_checksum(addr, None)),
        None => s.serialize_none(),
    }
}

fn deserialize_factory<'de, D>(d: D) -> Result<Option<Address>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(d)? {
        None => Ok(None),
        Some(value) if value.eq_ignore_ascii_case(FACTORY_MARKER_SHORT) => Ok(Some(factory_marker())),
        Some(value) => value.parse::<Address>().map(Some).map_err(serde::de::Error::custom),
    }
}

impl UserOperationV07 {
    /// `factory ‖ factoryData`, empty when the account is deployed
    pub fn init_code(&self) -> Bytes {
        pack_init_code(self.factory, self.factory_data.as_deref().unwrap_or_default())
    }

    /// `paymaster ‖ verificationGasLimit(16) ‖ postOpGasLimit(16) ‖ paymasterData`
    pub fn paymaster_and_data(&self) -> Bytes {
        pack_paymaster_and_data(
            self.paymaster,
            self.paymaster_verification_gas_limit.unwrap_or_default(),
            self.paymaster_post_op_gas_limit.unwrap_or_default(),
            self.paymaster_data.as_deref().unwrap_or_default(),
        )
    }

    /// `verificationGasLimit(16) ‖ callGasLimit(16)`
    pub fn account_gas_limits(&self) -> H256 {
        H256::from(pack_uint128(self.verification_gas_limit, self.call_gas_limit))
    }

    /// `maxPriorityFeePerGas(16) ‖ maxFeePerGas(16)`
    pub fn gas_fees(&self) -> H256 {
        H256::from(pack_uint128(self.max_priority_fee_per_gas, self.max_fee_per_gas))
    }

    /// Whether the factory is the EIP-7702 marker
    pub fn has_eip7702_marker(&self) -> bool {
        self.factory == Some(factory_marker())
    }

    /// Converts to the on-chain packed form
    pub fn to_packed(&self) -> PackedUserOperation {
        PackedUserOperation {
            sender: self.sender,
            nonce: self.nonce,
            init_code: self.init_code(),
            call_data: self.call_data.clone(),
            account_gas_limits: self.account_gas_limits(),
            pre_verification_gas: self.pre_verification_gas,
            gas_fees: self.gas_fees(),
            paymaster_and_data: self.paymaster_and_data(),
            signature: self.signature.clone(),
        }
    }

    /// Converts from the on-chain packed form
    pub fn from_packed(packed: &PackedUserOperation) -> Self {
        let (verification_gas_limit, call_gas_limit) =
            unpack_uint128(packed.account_gas_limits.as_bytes());
        let (max_priority_fee_per_gas, max_fee_per_gas) = unpack_uint128(packed.gas_fees.as_bytes());
        let (factory, factory_data) = match unpack_init_code(&packed.init_code) {
            Some((factory, data)) => (Some(factory), Some(data)),
            None => (None, None),
        };
        let paymaster = unpack_paymaster_and_data(&packed.paymaster_and_data);
        Self {
            sender: packed.sender,
            nonce: packed.nonce,
            factory,
            factory_data,
            call_data: packed.call_data.clone(),
            call_gas_limit,
            verification_gas_limit,
            pre_verification_gas: packed.pre_verification_gas,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            paymaster: paymaster.as_ref().map(|p| p.paymaster),
            paymaster_verification_gas_limit: paymaster.as_ref().map(|p| p.verification_gas_limit),
            paymaster_post_op_gas_limit: paymaster.as_ref().map(|p| p.post_op_gas_limit),
            paymaster_data: paymaster.map(|p| p.data),
            signature: packed.signature.clone(),
        }
    }

    /// Packs the user operation without signature to bytes (used for calculating the hash)
    pub fn pack_without_signature(&self) -> Bytes {
        abi::encode(&self.hashed_fields(keccak(self.init_code()))).into()
    }

    fn hashed_fields(&self, init_code_hash: H256) -> Vec<Token> {
        vec![
            Token::Address(self.sender),
            Token::Uint(self.nonce),
            Token::FixedBytes(init_code_hash.as_bytes().to_vec()),
            Token::FixedBytes(keccak(&self.call_data).as_bytes().to_vec()),
            Token::FixedBytes(self.account_gas_limits().as_bytes().to_vec()),
            Token::Uint(self.pre_verification_gas),
            Token::FixedBytes(self.gas_fees().as_bytes().to_vec()),
            Token::FixedBytes(keccak(self.paymaster_and_data()).as_bytes().to_vec()),
        ]
    }

    /// Calculates the hash of the user operation (entry point v0.7)
    pub fn hash(&self, entry_point: &Address, chain_id: u64) -> UserOperationHash {
        let inner = keccak(self.pack_without_signature());
        keccak(abi::encode(&[
            Token::FixedBytes(inner.as_bytes().to_vec()),
            Token::Address(*entry_point),
            Token::Uint(U256::from(chain_id)),
        ]))
        .into()
    }

    /// Init code hash as seen by the entry point v0.8
    ///
    /// When the init code starts with the EIP-7702 marker, the marker is replaced by the address
    /// the sender delegates to.
    pub fn eip712_init_code_hash(
        &self,
        eip7702_delegate: Option<Address>,
    ) -> Result<H256, UserOperationError> {
        if !self.has_eip7702_marker() {
            return Ok(keccak(self.init_code()));
        }
        let delegate = eip7702_delegate.ok_or(UserOperationError::MissingDelegate)?;
        let data = self.factory_data.as_deref().unwrap_or_default();
        Ok(keccak([delegate.as_bytes(), data].concat()))
    }

    /// EIP-712 struct hash of the `PackedUserOperation`
    pub fn eip712_struct_hash(
        &self,
        eip7702_delegate: Option<Address>,
    ) -> Result<H256, UserOperationError> {
        let fields = self.hashed_fields(self.eip712_init_code_hash(eip7702_delegate)?);
        Ok(struct_hash(type_hash(entry_point_constants::PACKED_USER_OPERATION_TYPE), fields))
    }

    /// Calculates the hash of the user operation (entry point v0.8, EIP-712)
    pub fn hash_eip712(
        &self,
        entry_point: &Address,
        chain_id: u64,
        eip7702_delegate: Option<Address>,
    ) -> Result<UserOperationHash, UserOperationError> {
        let domain = entry_point_domain(entry_point, chain_id);
        Ok(hash_typed_data(
            H256::from(domain.separator()),
            self.eip712_struct_hash(eip7702_delegate)?,
        )
        .into())
    }

    // Builder pattern helpers

    /// Sets the sender of the user operation
    pub fn sender(mut self, sender: Address) -> Self {
        self.sender = sender;
        self
    }

    /// Sets the nonce of the user operation
    pub fn nonce(mut self, nonce: U256) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the factory and factory data of the user operation
    pub fn factory(mut self, factory: Address, factory_data: Bytes) -> Self {
        self.factory = Some(factory);
        self.factory_data = Some(factory_data);
        self
    }

    /// Sets the call data of the user operation
    pub fn call_data(mut self, call_data: Bytes) -> Self {
        self.call_data = call_data;
        self
    }

    /// Sets the call gas limit of the user operation
    pub fn call_gas_limit(mut self, call_gas_limit: U256) -> Self {
        self.call_gas_limit = call_gas_limit;
        self
    }

    /// Sets the verification gas limit of the user operation
    pub fn verification_gas_limit(mut self, verification_gas_limit: U256) -> Self {
        self.verification_gas_limit = verification_gas_limit;
        self
    }

    /// Sets the pre-verification gas of the user operation
    pub fn pre_verification_gas(mut self, pre_verification_gas: U256) -> Self {
        self.pre_verification_gas = pre_verification_gas;
        self
    }

    /// Sets the max fee per gas of the user operation
    pub fn max_fee_per_gas(mut self, max_fee_per_gas: U256) -> Self {
        self.max_fee_per_gas = max_fee_per_gas;
        self
    }

    /// Sets the max priority fee per gas of the user operation
    pub fn max_priority_fee_per_gas(mut self, max_priority_fee_per_gas: U256) -> Self {
        self.max_priority_fee_per_gas = max_priority_fee_per_gas;
        self
    }

    /// Sets the paymaster fields of the user operation
    pub fn paymaster(
        mut self,
        paymaster: Address,
        verification_gas_limit: U256,
        post_op_gas_limit: U256,
        paymaster_data: Bytes,
    ) -> Self {
        self.paymaster = Some(paymaster);
        self.paymaster_verification_gas_limit = Some(verification_gas_limit);
        self.paymaster_post_op_gas_limit = Some(post_op_gas_limit);
        self.paymaster_data = Some(paymaster_data);
        self
    }

    /// Sets the signature of the user operation
    pub fn signature(mut self, signature: Bytes) -> Self {
        self.signature = signature;
        self
    }
}

/// EIP-712 domain of the entry point v0.8
pub fn entry_point_domain(entry_point: &Address, chain_id: u64) -> EIP712Domain {
    EIP712Domain {
        name: Some(entry_point_constants::EIP712_NAME.into()),
        version: Some(entry_point_constants::EIP712_VERSION.into()),
        chain_id: Some(U256::from(chain_id)),
        verifying_contract: Some(*entry_point),
        salt: None,
    }
}

/// User operation as passed to the entry point v0.7 contract
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackedUserOperation {
    #[serde(serialize_with = "as_checksum_addr")]
    pub sender: Address,
    pub nonce: U256,
    pub init_code: Bytes,
    pub call_data: Bytes,
    pub account_gas_limits: H256,
    pub pre_verification_gas: U256,
    pub gas_fees: H256,
    pub paymaster_and_data: Bytes,
    pub signature: Bytes,
}

impl PackedUserOperation {
    pub fn pack(&self) -> Bytes {
        abi::encode(&[
            Token::Address(self.sender),
            Token::Uint(self.nonce),
            Token::Bytes(self.init_code.to_vec()),
            Token::Bytes(self.call_data.to_vec()),
            Token::FixedBytes(self.account_gas_limits.as_bytes().to_vec()),
            Token::Uint(self.pre_verification_gas),
            Token::FixedBytes(self.gas_fees.as_bytes().to_vec()),
            Token::Bytes(self.paymaster_and_data.to_vec()),
            Token::Bytes(self.signature.to_vec()),
        ])
        .into()
    }

    pub fn unpack(data: &[u8]) -> CodecResult<Self> {
        let types = [
            ParamType::Address,
            ParamType::Uint(256),
            ParamType::Bytes,
            ParamType::Bytes,
            ParamType::FixedBytes(32),
            ParamType::Uint(256),
            ParamType::FixedBytes(32),
            ParamType::Bytes,
            ParamType::Bytes,
        ];
        let mut tokens = abi::decode(&types, data)?.into_iter();
        let mut next =
            || tokens.next().ok_or(CodecError::Abi { inner: "truncated user operation".into() });
        let invalid = |kind: &str| CodecError::Abi { inner: format!("expected {kind}") };
        let bytes = |token: Token| token.into_bytes().map(Bytes::from).ok_or(invalid("bytes"));
        let word = |token: Token| {
            token.into_fixed_bytes().map(|b| H256::from_slice(&b)).ok_or(invalid("bytes32"))
        };
        Ok(Self {
            sender: next()?.into_address().ok_or(invalid("address"))?,
            nonce: next()?.into_uint().ok_or(invalid("uint256"))?,
            init_code: bytes(next()?)?,
            call_data: bytes(next()?)?,
            account_gas_limits: word(next()?)?,
            pre_verification_gas: next()?.into_uint().ok_or(invalid("uint256"))?,
            gas_fees: word(next()?)?,
            paymaster_and_data: bytes(next()?)?,
            signature: bytes(next()?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> UserOperationV07 {
        UserOperationV07::default()
            .sender("0x9c5754De1443984659E1b3a8d1931D83475ba29C".parse().unwrap())
            .nonce(3.into())
            .factory(
                "0x91E60e0613810449d098b0b5Ec8b51A0FE8c8985".parse().unwrap(),
                "0x5fbfb9cf000000000000000000000000f39fd6e51aad88f6f4ce6ab8827279cfffb922660000000000000000000000000000000000000000000000000000000000000000".parse().unwrap(),
            )
            .call_data("0xb61d27f6".parse().unwrap())
            .call_gas_limit(100_000.into())
            .verification_gas_limit(500_000.into())
            .pre_verification_gas(50_000.into())
            .max_fee_per_gas(2_000_000_000u64.into())
            .max_priority_fee_per_gas(1_000_000_000.into())
    }

    #[test]
    fn gas_words() {
        let op = sample();
        let limits = op.account_gas_limits();
        assert_eq!(U256::from_big_endian(&limits[..16]), U256::from(500_000));
        assert_eq!(U256::from_big_endian(&limits[16..]), U256::from(100_000));
        let fees = op.gas_fees();
        assert_eq!(U256::from_big_endian(&fees[..16]), U256::from(1_000_000_000));
        assert_eq!(U256::from_big_endian(&fees[16..]), U256::from(2_000_000_000u64));
    }

    #[test]
    fn packed_round_trip() {
        let paymaster: Address = "0x0000000000000039cd5e8aE05257CE51C473ddd1".parse().unwrap();
        let op = sample().paymaster(paymaster, 60_000.into(), 30_000.into(), "0xabcd".parse().unwrap());
        let packed = op.to_packed();
        assert_eq!(packed.init_code.len(), 20 + 68);
        assert_eq!(packed.paymaster_and_data.len(), 52 + 2);
        assert_eq!(UserOperationV07::from_packed(&packed), op);
        assert_eq!(PackedUserOperation::unpack(&packed.pack()).unwrap(), packed);
    }

    #[test]
    fn hash_covers_fields() {
        let entry_point: Address = "0x0000000071727De22E5E9d8BAf0edAc6f37da032".parse().unwrap();
        let op = sample();
        let hash = op.hash(&entry_point, 1);
        assert_eq!(hash, op.clone().signature("0x1234".parse().unwrap()).hash(&entry_point, 1));
        assert_ne!(hash, op.clone().nonce(4.into()).hash(&entry_point, 1));
        assert_ne!(hash, op.clone().call_gas_limit(1.into()).hash(&entry_point, 1));
        assert_ne!(hash, op.hash(&entry_point, 137));
        assert_ne!(hash, op.hash(&Address::zero(), 1));
    }

    #[test]
    fn eip712_hash_differs_from_v07_hash() {
        let entry_point: Address = "0x4337084D9E255Ff0702461CF8895CE9E3b5Ff108".parse().unwrap();
        let op = sample();
        let v08 = op.hash_eip712(&entry_point, 1, None).unwrap();
        assert_ne!(v08, op.hash(&entry_point, 1));
        let domain = entry_point_domain(&entry_point, 1);
        let expected = hash_typed_data(
            H256::from(domain.separator()),
            op.eip712_struct_hash(None).unwrap(),
        );
        assert_eq!(v08, expected.into());
    }

    #[test]
    fn eip7702_marker_requires_delegate() {
        let entry_point: Address = "0x4337084D9E255Ff0702461CF8895CE9E3b5Ff108".parse().unwrap();
        let delegate: Address = "0xe6Cae83BdE06E4c305530e199D7217f42808555B".parse().unwrap();
        let op = sample().factory(factory_marker(), Bytes::default());
        assert!(op.has_eip7702_marker());
        assert_eq!(op.hash_eip712(&entry_point, 1, None), Err(UserOperationError::MissingDelegate));
        assert_eq!(op.eip712_init_code_hash(Some(delegate)).unwrap(), keccak(delegate.as_bytes()));
        assert_ne!(
            op.hash_eip712(&entry_point, 1, Some(delegate)).unwrap(),
            op.hash_eip712(&entry_point, 1, Some(Address::zero())).unwrap()
        );
    }

    #[test]
    fn json_shape() {
        let op = sample();
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["factory"], "0x91E60e0613810449d098b0b5Ec8b51A0FE8c8985");
        assert!(json.get("paymaster").is_none());
        assert!(json.get("paymasterData").is_none());
        assert_eq!(serde_json::from_value::<UserOperationV07>(json).unwrap(), op);

        let marked = UserOperationV07::default().factory(factory_marker(), Bytes::default());
        let json = serde_json::to_value(&marked).unwrap();
        assert_eq!(json["factory"], "0x7702");
        assert_eq!(json["factoryData"], "0x");
        assert_eq!(serde_json::from_value::<UserOperationV07>(json).unwrap(), marked);
    }
}
