//! Paymaster (ERC-7677 and token quote) request and response types

use crate::utils::as_checksum_addr;
use ethers::types::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Context sent along paymaster requests
///
/// `token` selects ERC-20 gas payment, any other entry is forwarded to the paymaster untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymasterContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Address>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PaymasterContext {
    /// Context paying gas with an ERC-20 token
    pub fn token(token: Address) -> Self {
        Self { token: Some(token), extra: Map::new() }
    }
}

/// Paymaster fields returned by `pm_getPaymasterData`
///
/// Entry point v0.6 paymasters return `paymasterAndData`, later versions the split fields.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymasterData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_and_data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,
}

/// Sponsor information displayed by wallets
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sponsor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Response of `pm_getPaymasterStubData`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymasterStubData {
    #[serde(flatten)]
    pub data: PaymasterData,
    /// Whether the stub data can be submitted without a `pm_getPaymasterData` round
    #[serde(default)]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsor: Option<Sponsor>,
}

/// ERC-20 quote of a token paymaster
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenQuote {
    #[serde(serialize_with = "as_checksum_addr")]
    pub paymaster: Address,
    #[serde(serialize_with = "as_checksum_addr")]
    pub token: Address,
    /// Gas charged by the paymaster post-operation
    pub post_op_gas: U256,
    /// Token units per 10^18 wei
    pub exchange_rate: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_rate_native_to_usd: Option<U256>,
    /// Storage slot of the balance mapping, used to override balances during estimation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance_slot: Option<U256>,
    /// Storage slot of the allowance mapping, used to override allowances during estimation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowance_slot: Option<U256>,
}
