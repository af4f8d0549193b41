//! Basic transaction type for account abstraction (ERC-4337)

mod hash;
mod v06;
mod v07;

use crate::{
    constants::entry_point::{ADDRESS_V06, ADDRESS_V07, ADDRESS_V08},
    error::UserOperationError,
    paymaster::PaymasterData,
    utils::{as_checksum_addr, parse_address, unpack_paymaster_and_data},
};
use ethers::{
    abi::Token,
    types::{Address, Bytes, Log, TransactionReceipt, U256},
};
pub use hash::UserOperationHash;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
pub use v06::UserOperationV06;
pub use v07::{entry_point_domain, PackedUserOperation, UserOperationV07};

/// Call executed by a smart account
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    #[serde(serialize_with = "as_checksum_addr")]
    pub to: Address,
    #[serde(default)]
    pub value: U256,
    #[serde(default)]
    pub data: Bytes,
}

impl Call {
    pub fn new(to: Address) -> Self {
        Self { to, value: U256::zero(), data: Bytes::default() }
    }

    /// Sets the value (in wei) sent along the call
    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Sets the call data
    pub fn data(mut self, data: Bytes) -> Self {
        self.data = data;
        self
    }

    /// `(address to, uint256 value, bytes data)` tuple
    pub fn to_token(&self) -> Token {
        Token::Tuple(vec![
            Token::Address(self.to),
            Token::Uint(self.value),
            Token::Bytes(self.data.to_vec()),
        ])
    }
}

/// Version of the entry point smart contract
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum EntryPointVersion {
    #[strum(to_string = "0.6")]
    #[serde(rename = "0.6")]
    V06,
    #[strum(to_string = "0.7")]
    #[serde(rename = "0.7")]
    V07,
    #[strum(to_string = "0.8")]
    #[serde(rename = "0.8")]
    V08,
}

impl EntryPointVersion {
    /// Canonical deployment address
    pub fn address(&self) -> Address {
        parse_address(match self {
            Self::V06 => ADDRESS_V06,
            Self::V07 => ADDRESS_V07,
            Self::V08 => ADDRESS_V08,
        })
    }

    /// Name of the user operation revision accepted by this version
    pub fn revision(&self) -> &'static str {
        match self {
            Self::V06 => "V06",
            Self::V07 | Self::V08 => "V07",
        }
    }
}

/// Entry point smart contract a user operation is sent to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryPoint {
    #[serde(serialize_with = "as_checksum_addr")]
    pub address: Address,
    pub version: EntryPointVersion,
}

impl EntryPoint {
    pub fn new(address: Address, version: EntryPointVersion) -> Self {
        Self { address, version }
    }

    pub fn v06() -> Self {
        Self::canonical(EntryPointVersion::V06)
    }

    pub fn v07() -> Self {
        Self::canonical(EntryPointVersion::V07)
    }

    pub fn v08() -> Self {
        Self::canonical(EntryPointVersion::V08)
    }

    /// Entry point at the canonical address of the version
    pub fn canonical(version: EntryPointVersion) -> Self {
        Self { address: version.address(), version }
    }
}

/// Gas limits returned by `eth_estimateUserOperationGas`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    pub pre_verification_gas: U256,
    pub verification_gas_limit: U256,
    pub call_gas_limit: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,
}

/// EIP-1559 fees of a user operation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationFees {
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
}

/// User operation of either wire revision
///
/// Every `with_*` method returns an updated copy, the original is never modified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserOperation {
    V06(UserOperationV06),
    V07(UserOperationV07),
}

impl From<UserOperationV06> for UserOperation {
    fn from(value: UserOperationV06) -> Self {
        Self::V06(value)
    }
}

impl From<UserOperationV07> for UserOperation {
    fn from(value: UserOperationV07) -> Self {
        Self::V07(value)
    }
}

impl UserOperation {
    /// Empty user operation of the revision accepted by the entry point
    pub fn empty(entry_point: &EntryPoint, sender: Address) -> Self {
        match entry_point.version {
            EntryPointVersion::V06 => Self::V06(UserOperationV06::default().sender(sender)),
            EntryPointVersion::V07 | EntryPointVersion::V08 => {
                Self::V07(UserOperationV07::default().sender(sender))
            }
        }
    }

    pub fn revision(&self) -> &'static str {
        match self {
            Self::V06(_) => "V06",
            Self::V07(_) => "V07",
        }
    }

    /// Fails when the revision does not match the entry point
    pub fn check_entry_point(&self, entry_point: &EntryPoint) -> Result<(), UserOperationError> {
        let expected = entry_point.version.revision();
        if self.revision() == expected {
            Ok(())
        } else {
            Err(UserOperationError::RevisionMismatch {
                entry_point: entry_point.version,
                found: self.revision(),
                alternative: expected,
            })
        }
    }

    pub fn sender(&self) -> Address {
        match self {
            Self::V06(op) => op.sender,
            Self::V07(op) => op.sender,
        }
    }

    pub fn nonce(&self) -> U256 {
        match self {
            Self::V06(op) => op.nonce,
            Self::V07(op) => op.nonce,
        }
    }

    pub fn call_data(&self) -> &Bytes {
        match self {
            Self::V06(op) => &op.call_data,
            Self::V07(op) => &op.call_data,
        }
    }

    pub fn signature(&self) -> &Bytes {
        match self {
            Self::V06(op) => &op.signature,
            Self::V07(op) => &op.signature,
        }
    }

    /// Init code (`factory ‖ factoryData`), empty when the account is deployed
    pub fn init_code(&self) -> Bytes {
        match self {
            Self::V06(op) => op.init_code.clone(),
            Self::V07(op) => op.init_code(),
        }
    }

    pub fn factory(&self) -> Option<Address> {
        match self {
            Self::V06(op) => op.factory(),
            Self::V07(op) => op.factory,
        }
    }

    pub fn paymaster(&self) -> Option<Address> {
        match self {
            Self::V06(op) => op.paymaster(),
            Self::V07(op) => op.paymaster,
        }
    }

    pub fn fees(&self) -> UserOperationFees {
        match self {
            Self::V06(op) => UserOperationFees {
                max_fee_per_gas: op.max_fee_per_gas,
                max_priority_fee_per_gas: op.max_priority_fee_per_gas,
            },
            Self::V07(op) => UserOperationFees {
                max_fee_per_gas: op.max_fee_per_gas,
                max_priority_fee_per_gas: op.max_priority_fee_per_gas,
            },
        }
    }

    /// Sum of every gas limit, including the paymaster ones
    pub fn total_gas_limit(&self) -> U256 {
        match self {
            Self::V06(op) => {
                // a v0.6 paymaster runs postOp with the verification gas limit
                let multiplier = if op.paymaster().is_some() { 3 } else { 1 };
                op.call_gas_limit +
                    op.verification_gas_limit * multiplier +
                    op.pre_verification_gas
            }
            Self::V07(op) => {
                op.call_gas_limit +
                    op.verification_gas_limit +
                    op.pre_verification_gas +
                    op.paymaster_verification_gas_limit.unwrap_or_default() +
                    op.paymaster_post_op_gas_limit.unwrap_or_default()
            }
        }
    }

    /// Hash signed by the account owner
    ///
    /// `eip7702_delegate` is only read for entry point v0.8 user operations carrying the EIP-7702
    /// factory marker.
    pub fn hash(
        &self,
        entry_point: &EntryPoint,
        chain_id: u64,
        eip7702_delegate: Option<Address>,
    ) -> Result<UserOperationHash, UserOperationError> {
        self.check_entry_point(entry_point)?;
        match (self, entry_point.version) {
            (Self::V06(op), _) => Ok(op.hash(&entry_point.address, chain_id)),
            (Self::V07(op), EntryPointVersion::V08) => {
                op.hash_eip712(&entry_point.address, chain_id, eip7702_delegate)
            }
            (Self::V07(op), _) => Ok(op.hash(&entry_point.address, chain_id)),
        }
    }

    pub fn with_sender(&self, sender: Address) -> Self {
        match self.clone() {
            Self::V06(op) => Self::V06(op.sender(sender)),
            Self::V07(op) => Self::V07(op.sender(sender)),
        }
    }

    pub fn with_nonce(&self, nonce: U256) -> Self {
        match self.clone() {
            Self::V06(op) => Self::V06(op.nonce(nonce)),
            Self::V07(op) => Self::V07(op.nonce(nonce)),
        }
    }

    pub fn with_call_data(&self, call_data: Bytes) -> Self {
        match self.clone() {
            Self::V06(op) => Self::V06(op.call_data(call_data)),
            Self::V07(op) => Self::V07(op.call_data(call_data)),
        }
    }

    pub fn with_signature(&self, signature: Bytes) -> Self {
        match self.clone() {
            Self::V06(op) => Self::V06(op.signature(signature)),
            Self::V07(op) => Self::V07(op.signature(signature)),
        }
    }

    /// Sets the deployment data; `None` clears it
    pub fn with_factory(&self, factory: Option<(Address, Bytes)>) -> Self {
        match self.clone() {
            Self::V06(op) => Self::V06(op.init_code(
                factory
                    .map(|(factory, data)| [factory.as_bytes(), &data[..]].concat().into())
                    .unwrap_or_default(),
            )),
            Self::V07(mut op) => {
                op.factory = factory.as_ref().map(|(factory, _)| *factory);
                op.factory_data = factory.map(|(_, data)| data);
                Self::V07(op)
            }
        }
    }

    pub fn with_fees(&self, fees: UserOperationFees) -> Self {
        match self.clone() {
            Self::V06(op) => Self::V06(
                op.max_fee_per_gas(fees.max_fee_per_gas)
                    .max_priority_fee_per_gas(fees.max_priority_fee_per_gas),
            ),
            Self::V07(op) => Self::V07(
                op.max_fee_per_gas(fees.max_fee_per_gas)
                    .max_priority_fee_per_gas(fees.max_priority_fee_per_gas),
            ),
        }
    }

    /// Applies estimated gas limits, paymaster limits are only overwritten when estimated
    pub fn with_gas_estimate(&self, estimate: &GasEstimate) -> Self {
        match self.clone() {
            Self::V06(op) => Self::V06(
                op.call_gas_limit(estimate.call_gas_limit)
                    .verification_gas_limit(estimate.verification_gas_limit)
                    .pre_verification_gas(estimate.pre_verification_gas),
            ),
            Self::V07(op) => {
                let mut op = op
                    .call_gas_limit(estimate.call_gas_limit)
                    .verification_gas_limit(estimate.verification_gas_limit)
                    .pre_verification_gas(estimate.pre_verification_gas);
                if estimate.paymaster_verification_gas_limit.is_some() {
                    op.paymaster_verification_gas_limit = estimate.paymaster_verification_gas_limit;
                }
                if estimate.paymaster_post_op_gas_limit.is_some() {
                    op.paymaster_post_op_gas_limit = estimate.paymaster_post_op_gas_limit;
                }
                Self::V07(op)
            }
        }
    }

    /// Applies paymaster fields, fields absent from `data` are kept
    pub fn with_paymaster_data(&self, data: &PaymasterData) -> Self {
        match self.clone() {
            Self::V06(op) => {
                let paymaster_and_data = match (&data.paymaster_and_data, data.paymaster) {
                    (Some(blob), _) => blob.clone(),
                    (None, Some(paymaster)) => [
                        paymaster.as_bytes(),
                        data.paymaster_data.as_deref().unwrap_or_default(),
                    ]
                    .concat()
                    .into(),
                    (None, None) => op.paymaster_and_data.clone(),
                };
                Self::V06(op.paymaster_and_data(paymaster_and_data))
            }
            Self::V07(mut op) => {
                // some paymasters answer with the packed v0.6 shape only
                let unpacked =
                    data.paymaster_and_data.as_deref().and_then(unpack_paymaster_and_data);
                if let Some(paymaster) = data.paymaster.or(unpacked.as_ref().map(|p| p.paymaster)) {
                    op.paymaster = Some(paymaster);
                }
                if let Some(paymaster_data) = data
                    .paymaster_data
                    .clone()
                    .or(unpacked.as_ref().map(|p| p.data.clone()))
                {
                    op.paymaster_data = Some(paymaster_data);
                }
                if let Some(limit) = data
                    .paymaster_verification_gas_limit
                    .or(unpacked.as_ref().map(|p| p.verification_gas_limit))
                {
                    op.paymaster_verification_gas_limit = Some(limit);
                }
                if let Some(limit) = data
                    .paymaster_post_op_gas_limit
                    .or(unpacked.as_ref().map(|p| p.post_op_gas_limit))
                {
                    op.paymaster_post_op_gas_limit = Some(limit);
                }
                Self::V07(op)
            }
        }
    }

    /// Entities (optionally if present) involved in the user operation
    pub fn get_entities(&self) -> (Address, Option<Address>, Option<Address>) {
        (self.sender(), self.factory(), self.paymaster())
    }
}

/// Receipt of the user operation (returned from the RPC endpoint eth_getUserOperationReceipt)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    #[serde(rename = "userOpHash")]
    pub user_operation_hash: UserOperationHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<Address>,
    #[serde(serialize_with = "as_checksum_addr")]
    pub sender: Address,
    pub nonce: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    pub actual_gas_cost: U256,
    pub actual_gas_used: U256,
    pub success: bool,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub logs: Vec<Log>,
    #[serde(rename = "receipt")]
    pub tx_receipt: TransactionReceipt,
}
