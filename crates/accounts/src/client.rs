//! Read access to the chain used by smart accounts

use async_trait::async_trait;
use ethers::{
    providers::{Middleware, MiddlewareError, RawCall},
    types::{
        spoof, transaction::eip2718::TypedTransaction, Address, Bytes, TransactionRequest, U256,
    },
};
use keel_primitives::{codec::abi, UserOperationFees};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr, sync::Arc};
use tracing::trace;

lazy_static! {
    static ref HEX_DATA: Regex = Regex::new(r"0x[0-9a-fA-F]+").expect("Regex rules valid");
    static ref VALIDATION_CODE: Regex = Regex::new(r"AA[0-9]{2}").expect("Regex rules valid");
}

/// JSON-RPC internal error code, used for failures without an error object
const INTERNAL_ERROR: i64 = -32603;

/// JSON-RPC error returned by a node, bundler or paymaster
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rpc error {}: {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, " ({data})")?;
        }
        Ok(())
    }
}

impl std::error::Error for RpcError {}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Error without a JSON-RPC error object (transport, decoding)
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }

    /// Bundler validation code (`AAxx`) found in the message
    pub fn validation_code(&self) -> Option<String> {
        VALIDATION_CODE.find(&self.message).map(|code| code.as_str().to_string())
    }

    /// Revert data carried by the error
    ///
    /// Nodes put it in `data` as a hex string, nest it in `data.data`, or only mention it in the
    /// message; the first hex blob found in that order is returned.
    pub fn revert_data(&self) -> Option<Bytes> {
        let nested = match &self.data {
            Some(Value::String(data)) => Some(data.as_str()),
            Some(Value::Object(object)) => object.get("data").and_then(Value::as_str),
            _ => None,
        };
        nested
            .and_then(find_hex)
            .or_else(|| find_hex(&self.message))
    }
}

fn find_hex(input: &str) -> Option<Bytes> {
    HEX_DATA.find(input).and_then(|hex| Bytes::from_str(hex.as_str()).ok())
}

impl From<ethers::providers::JsonRpcError> for RpcError {
    fn from(err: ethers::providers::JsonRpcError) -> Self {
        Self { code: err.code, message: err.message, data: err.data }
    }
}

/// Converts a middleware error, keeping the JSON-RPC error object when there is one
pub fn from_middleware_error<E: MiddlewareError>(err: E) -> RpcError {
    match err.as_error_response() {
        Some(response) => response.clone().into(),
        None => RpcError::internal(err.to_string()),
    }
}

/// Node access needed by smart accounts
#[async_trait]
pub trait PublicClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64, RpcError>;

    /// `eth_call` against the latest block
    async fn call(
        &self,
        to: Address,
        data: Bytes,
        state_override: Option<spoof::State>,
    ) -> Result<Bytes, RpcError>;

    async fn get_code(&self, address: Address) -> Result<Bytes, RpcError>;

    async fn get_transaction_count(&self, address: Address) -> Result<u64, RpcError>;

    /// EIP-1559 fee estimate of the node
    async fn estimate_fees(&self) -> Result<UserOperationFees, RpcError>;

    /// Whether the address has code (a deployed contract or a delegated EOA)
    async fn has_code(&self, address: Address) -> Result<bool, RpcError> {
        Ok(!self.get_code(address).await?.is_empty())
    }

    /// Reads `balanceOf(owner)` of an ERC-20 token
    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256, RpcError> {
        let data = abi::encode_function_call(
            "balanceOf(address)",
            &[ethers::abi::Token::Address(owner)],
        );
        let result = self.call(token, data, None).await?;
        abi::decode_uint(&result).map_err(|err| RpcError::internal(err.to_string()))
    }

    /// Reads `allowance(owner, spender)` of an ERC-20 token
    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, RpcError> {
        let data = abi::encode_function_call(
            "allowance(address,address)",
            &[ethers::abi::Token::Address(owner), ethers::abi::Token::Address(spender)],
        );
        let result = self.call(token, data, None).await?;
        abi::decode_uint(&result).map_err(|err| RpcError::internal(err.to_string()))
    }
}

/// [PublicClient] backed by an ethers middleware
#[derive(Debug)]
pub struct EthClient<M: Middleware> {
    pub eth: Arc<M>,
}

impl<M: Middleware> Clone for EthClient<M> {
    fn clone(&self) -> Self {
        Self { eth: self.eth.clone() }
    }
}

impl<M: Middleware> EthClient<M> {
    pub fn new(eth: Arc<M>) -> Self {
        Self { eth }
    }
}

#[async_trait]
impl<M: Middleware + 'static> PublicClient for EthClient<M> {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        let chain_id = self.eth.get_chainid().await.map_err(from_middleware_error)?;
        Ok(chain_id.as_u64())
    }

    async fn call(
        &self,
        to: Address,
        data: Bytes,
        state_override: Option<spoof::State>,
    ) -> Result<Bytes, RpcError> {
        trace!("eth_call to {to:?} with {} bytes", data.len());
        let tx: TypedTransaction = TransactionRequest::new().to(to).data(data).into();
        match state_override {
            Some(state) => self
                .eth
                .provider()
                .call_raw(&tx)
                .state(&state)
                .await
                .map_err(from_middleware_error),
            None => self.eth.call(&tx, None).await.map_err(from_middleware_error),
        }
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, RpcError> {
        self.eth.get_code(address, None).await.map_err(from_middleware_error)
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64, RpcError> {
        let count =
            self.eth.get_transaction_count(address, None).await.map_err(from_middleware_error)?;
        Ok(count.as_u64())
    }

    async fn estimate_fees(&self) -> Result<UserOperationFees, RpcError> {
        let (max_fee_per_gas, max_priority_fee_per_gas) =
            self.eth.estimate_eip1559_fees(None).await.map_err(from_middleware_error)?;
        Ok(UserOperationFees { max_fee_per_gas, max_priority_fee_per_gas })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validation_code() {
        let err = RpcError::new(-32500, "UserOperation reverted during simulation with reason: AA21 didn't pay prefund");
        assert_eq!(err.validation_code().as_deref(), Some("AA21"));
        assert_eq!(RpcError::new(-32602, "invalid params").validation_code(), None);
    }

    #[test]
    fn revert_data_locations() {
        let data = Bytes::from(vec![0x6c, 0xa7, 0xb8, 0x06]);

        let unwrapped = RpcError::new(3, "execution reverted").with_data(json!("0x6ca7b806"));
        assert_eq!(unwrapped.revert_data(), Some(data.clone()));

        let wrapped = RpcError::new(-32000, "execution reverted")
            .with_data(json!({ "message": "reverted", "data": "Reverted 0x6ca7b806" }));
        assert_eq!(wrapped.revert_data(), Some(data.clone()));

        let in_message = RpcError::new(-32000, "execution reverted: 0x6ca7b806");
        assert_eq!(in_message.revert_data(), Some(data));

        assert_eq!(RpcError::new(-32000, "execution reverted").revert_data(), None);
    }

    #[test]
    fn json_shape() {
        let err: RpcError = serde_json::from_value(json!({
            "code": -32521,
            "message": "execution reverted",
            "data": { "reason": "0x" }
        }))
        .unwrap();
        assert_eq!(err.code, -32521);
        assert!(err.to_string().starts_with("rpc error -32521: execution reverted"));
        assert_eq!(serde_json::to_value(RpcError::new(1, "x")).unwrap(), json!({"code": 1, "message": "x"}));
    }
}
