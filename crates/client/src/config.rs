//! Client configuration

use alloy_chains::NamedChain;
use ethers::types::Address;
use keel_primitives::{
    constants::{erc20::USDT_MAINNET, receipt},
    parse_address,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token whose allowance must be reset to zero before it can be changed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZeroResetToken {
    pub chain_id: u64,
    pub token: Address,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// Interval between two receipt requests (in milliseconds)
    pub polling_interval_ms: u64,
    /// Time after which waiting for a receipt gives up (in milliseconds)
    pub receipt_timeout_ms: u64,
    pub zero_reset_tokens: Vec<ZeroResetToken>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            polling_interval_ms: receipt::POLLING_INTERVAL_MS,
            receipt_timeout_ms: receipt::TIMEOUT_MS,
            zero_reset_tokens: vec![ZeroResetToken {
                chain_id: NamedChain::Mainnet as u64,
                token: parse_address(USDT_MAINNET),
            }],
        }
    }
}

impl ClientConfig {
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_millis(self.receipt_timeout_ms)
    }

    /// Whether `approve(spender, 0)` has to precede a non-zero approval of `token`
    pub fn requires_zero_reset(&self, chain_id: u64, token: Address) -> bool {
        self.zero_reset_tokens.iter().any(|entry| entry.chain_id == chain_id && entry.token == token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: ClientConfig =
            serde_json::from_value(serde_json::json!({ "pollingIntervalMs": 250 })).unwrap();
        assert_eq!(config.polling_interval(), Duration::from_millis(250));
        assert_eq!(config.receipt_timeout(), Duration::from_millis(receipt::TIMEOUT_MS));
        assert!(config.requires_zero_reset(1, parse_address(USDT_MAINNET)));
        assert!(!config.requires_zero_reset(10, parse_address(USDT_MAINNET)));
    }

    #[test]
    fn zero_reset_table_can_be_replaced() {
        let token = Address::repeat_byte(0x42);
        let config: ClientConfig = serde_json::from_value(serde_json::json!({
            "zeroResetTokens": [{ "chainId": 8453, "token": token }]
        }))
        .unwrap();
        assert!(config.requires_zero_reset(8453, token));
        assert!(!config.requires_zero_reset(1, parse_address(USDT_MAINNET)));
    }
}
