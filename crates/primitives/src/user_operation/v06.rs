//! User operation of the entry point v0.6

use super::UserOperationHash;
use crate::{
    codec::abi,
    crypto::keccak,
    error::{CodecError, CodecResult},
    utils::{as_checksum_addr, get_address},
};
use ethers::{
    abi::{ParamType, Token},
    types::{Address, Bytes, H256, U256},
};
use serde::{Deserialize, Serialize};

/// User operation (entry point v0.6)
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationV06 {
    /// Sender of the user operation
    #[serde(serialize_with = "as_checksum_addr")]
    pub sender: Address,

    /// Nonce (anti replay protection)
    pub nonce: U256,

    /// Init code for the account (needed if account not yet deployed and needs to be created)
    pub init_code: Bytes,

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

    /// Address of paymaster sponsoring the user operation, followed by extra data to send to the
    /// paymaster (can be empty)
    pub paymaster_and_data: Bytes,

    /// Data passed to the account along with the nonce during the verification step
    pub signature: Bytes,
}

fn param_types() -> Vec<ParamType> {
    let mut types = vec![ParamType::Address, ParamType::Uint(256), ParamType::Bytes, ParamType::Bytes];
    types.extend(std::iter::repeat(ParamType::Uint(256)).take(5));
    types.extend([ParamType::Bytes, ParamType::Bytes]);
    types
}

impl UserOperationV06 {
    /// Packs the user operation into bytes
    pub fn pack(&self) -> Bytes {
        abi::encode(&[
            Token::Address(self.sender),
            Token::Uint(self.nonce),
            Token::Bytes(self.init_code.to_vec()),
            Token::Bytes(self.call_data.to_vec()),
            Token::Uint(self.call_gas_limit),
            Token::Uint(self.verification_gas_limit),
            Token::Uint(self.pre_verification_gas),
            Token::Uint(self.max_fee_per_gas),
            Token::Uint(self.max_priority_fee_per_gas),
            Token::Bytes(self.paymaster_and_data.to_vec()),
            Token::Bytes(self.signature.to_vec()),
        ])
        .into()
    }

    /// Unpacks a user operation packed by [pack](Self::pack)
    pub fn unpack(data: &[u8]) -> CodecResult<Self> {
        let mut tokens = abi::decode(&param_types(), data)?.into_iter();
        let mut next = || tokens.next().ok_or(CodecError::Abi { inner: "truncated user operation".into() });
        let uint = |token: Token| token.into_uint().ok_or(CodecError::Abi { inner: "expected uint256".into() });
        let bytes = |token: Token| {
            token.into_bytes().map(Bytes::from).ok_or(CodecError::Abi { inner: "expected bytes".into() })
        };
        Ok(Self {
            sender: next()?
                .into_address()
                .ok_or(CodecError::Abi { inner: "expected address".into() })?,
            nonce: uint(next()?)?,
            init_code: bytes(next()?)?,
            call_data: bytes(next()?)?,
            call_gas_limit: uint(next()?)?,
            verification_gas_limit: uint(next()?)?,
            pre_verification_gas: uint(next()?)?,
            max_fee_per_gas: uint(next()?)?,
            max_priority_fee_per_gas: uint(next()?)?,
            paymaster_and_data: bytes(next()?)?,
            signature: bytes(next()?)?,
        })
    }

    /// Packs the user operation without signature to bytes (used for calculating the hash)
    pub fn pack_without_signature(&self) -> Bytes {
        let hashed = |data: &Bytes| Token::FixedBytes(keccak(data).as_bytes().to_vec());
        abi::encode(&[
            Token::Address(self.sender),
            Token::Uint(self.nonce),
            hashed(&self.init_code),
            hashed(&self.call_data),
            Token::Uint(self.call_gas_limit),
            Token::Uint(self.verification_gas_limit),
            Token::Uint(self.pre_verification_gas),
            Token::Uint(self.max_fee_per_gas),
            Token::Uint(self.max_priority_fee_per_gas),
            hashed(&self.paymaster_and_data),
        ])
        .into()
    }

    /// Calculates the hash of the user operation
    pub fn hash(&self, entry_point: &Address, chain_id: u64) -> UserOperationHash {
        let inner: H256 = keccak(self.pack_without_signature());
        keccak(abi::encode(&[
            Token::FixedBytes(inner.as_bytes().to_vec()),
            Token::Address(*entry_point),
            Token::Uint(U256::from(chain_id)),
        ]))
        .into()
    }

    /// Factory address, if the user operation deploys the account
    pub fn factory(&self) -> Option<Address> {
        get_address(&self.init_code)
    }

    /// Paymaster address, if the user operation is sponsored
    pub fn paymaster(&self) -> Option<Address> {
        get_address(&self.paymaster_and_data)
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

    /// Sets the init code of the user operation
    pub fn init_code(mut self, init_code: Bytes) -> Self {
        self.init_code = init_code;
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

    /// Sets the paymaster and data of the user operation
    pub fn paymaster_and_data(mut self, paymaster_and_data: Bytes) -> Self {
        self.paymaster_and_data = paymaster_and_data;
        self
    }

    /// Sets the signature of the user operation
    pub fn signature(mut self, signature: Bytes) -> Self {
        self.signature = signature;
        self
    }
}
