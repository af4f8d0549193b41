//! JSON-RPC bundler and paymaster client

use crate::{
    bundler::{BundlerClient, UserOperationGasPrice, UserOperationStatus, UserOperationStatusResponse},
    paymaster::PaymasterClient,
};
use async_trait::async_trait;
use ethers::types::{spoof, Address, U64};
use jsonrpsee::{
    core::{client::ClientT, params::ArrayParams, ClientError as JsonRpcClientError},
    http_client::{HttpClient, HttpClientBuilder},
};
use keel_accounts::RpcError;
use keel_primitives::{
    constants::rpc_error_codes::METHOD_NOT_FOUND, GasEstimate, PaymasterContext, PaymasterData,
    PaymasterStubData, RpcAuthorization, TokenQuote, UserOperation, UserOperationFees,
    UserOperationHash, UserOperationReceipt,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, trace};

/// Bundler (and paymaster) reached over HTTP JSON-RPC
///
/// The `pimlico_*` status and gas price endpoints are optional: a bundler answering "method not
/// found" gets the [BundlerClient] defaults.
#[derive(Clone, Debug)]
pub struct JsonRpcBundlerClient {
    client: HttpClient,
}

#[derive(Deserialize)]
struct TokenQuotes {
    quotes: Vec<TokenQuote>,
}

#[derive(Serialize)]
struct TokenQuotesRequest<'a> {
    tokens: &'a [Address],
}

impl JsonRpcBundlerClient {
    pub fn new(url: impl AsRef<str>) -> Result<Self, RpcError> {
        let client = HttpClientBuilder::default().build(url).map_err(into_rpc_error)?;
        Ok(Self { client })
    }

    pub fn from_client(client: HttpClient) -> Self {
        Self { client }
    }

    async fn request<R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Vec<Value>,
    ) -> Result<R, RpcError> {
        let mut array = ArrayParams::new();
        for param in params {
            array.insert(param).map_err(|err| RpcError::internal(err.to_string()))?;
        }
        trace!("Sending {method} request");
        self.client.request(method, array).await.map_err(into_rpc_error)
    }
}

/// Maps a client error, keeping the error object returned by the server
pub fn into_rpc_error(err: JsonRpcClientError) -> RpcError {
    match err {
        JsonRpcClientError::Call(err) => RpcError {
            code: err.code().into(),
            message: err.message().to_string(),
            data: err.data().and_then(|data| serde_json::from_str(data.get()).ok()),
        },
        err => RpcError::internal(err.to_string()),
    }
}

fn to_param<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|err| RpcError::internal(err.to_string()))
}

/// User operation JSON, carrying the authorization as `eip7702Auth`
pub fn user_operation_param(
    user_operation: &UserOperation,
    authorization: Option<&RpcAuthorization>,
) -> Result<Value, RpcError> {
    let mut value = to_param(user_operation)?;
    if let (Some(authorization), Value::Object(object)) = (authorization, &mut value) {
        object.insert("eip7702Auth".into(), to_param(authorization)?);
    }
    Ok(value)
}

fn chain_id_param(chain_id: u64) -> Value {
    json!(U64::from(chain_id))
}

#[async_trait]
impl BundlerClient for JsonRpcBundlerClient {
    async fn supported_entry_points(&self) -> Result<Vec<Address>, RpcError> {
        self.request("eth_supportedEntryPoints", vec![]).await
    }

    async fn chain_id(&self) -> Result<u64, RpcError> {
        let chain_id: U64 = self.request("eth_chainId", vec![]).await?;
        Ok(chain_id.as_u64())
    }

    async fn estimate_user_operation_gas(
        &self,
        user_operation: &UserOperation,
        entry_point: Address,
        authorization: Option<&RpcAuthorization>,
        state_override: Option<&spoof::State>,
    ) -> Result<GasEstimate, RpcError> {
        let mut params =
            vec![user_operation_param(user_operation, authorization)?, to_param(entry_point)?];
        if let Some(state) = state_override {
            params.push(to_param(state)?);
        }
        self.request("eth_estimateUserOperationGas", params).await
    }

    async fn send_user_operation(
        &self,
        user_operation: &UserOperation,
        entry_point: Address,
        authorization: Option<&RpcAuthorization>,
    ) -> Result<UserOperationHash, RpcError> {
        let hash: UserOperationHash = self
            .request(
                "eth_sendUserOperation",
                vec![user_operation_param(user_operation, authorization)?, to_param(entry_point)?],
            )
            .await?;
        debug!("User operation {hash} accepted by the bundler");
        Ok(hash)
    }

    async fn get_user_operation_receipt(
        &self,
        hash: UserOperationHash,
    ) -> Result<Option<UserOperationReceipt>, RpcError> {
        self.request("eth_getUserOperationReceipt", vec![to_param(hash)?]).await
    }

    async fn get_user_operation_status(
        &self,
        hash: UserOperationHash,
    ) -> Result<UserOperationStatus, RpcError> {
        match self
            .request::<UserOperationStatusResponse>(
                "pimlico_getUserOperationStatus",
                vec![to_param(hash)?],
            )
            .await
        {
            Ok(response) => Ok(response.status),
            Err(err) if err.code == METHOD_NOT_FOUND as i64 => Ok(UserOperationStatus::Unknown),
            Err(err) => Err(err),
        }
    }

    async fn get_user_operation_gas_price(&self) -> Result<Option<UserOperationFees>, RpcError> {
        match self.request::<UserOperationGasPrice>("pimlico_getUserOperationGasPrice", vec![]).await
        {
            Ok(price) => Ok(Some(price.fast)),
            Err(err) if err.code == METHOD_NOT_FOUND as i64 => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl PaymasterClient for JsonRpcBundlerClient {
    async fn get_paymaster_stub_data(
        &self,
        user_operation: &UserOperation,
        entry_point: Address,
        chain_id: u64,
        context: &PaymasterContext,
    ) -> Result<PaymasterStubData, RpcError> {
        self.request(
            "pm_getPaymasterStubData",
            vec![
                user_operation_param(user_operation, None)?,
                to_param(entry_point)?,
                chain_id_param(chain_id),
                to_param(context)?,
            ],
        )
        .await
    }

    async fn get_paymaster_data(
        &self,
        user_operation: &UserOperation,
        entry_point: Address,
        chain_id: u64,
        context: &PaymasterContext,
    ) -> Result<PaymasterData, RpcError> {
        self.request(
            "pm_getPaymasterData",
            vec![
                user_operation_param(user_operation, None)?,
                to_param(entry_point)?,
                chain_id_param(chain_id),
                to_param(context)?,
            ],
        )
        .await
    }

    async fn get_token_quotes(
        &self,
        tokens: &[Address],
        entry_point: Address,
        chain_id: u64,
    ) -> Result<Vec<TokenQuote>, RpcError> {
        let quotes: TokenQuotes = self
            .request(
                "pimlico_getTokenQuotes",
                vec![
                    to_param(TokenQuotesRequest { tokens })?,
                    to_param(entry_point)?,
                    chain_id_param(chain_id),
                ],
            )
            .await?;
        Ok(quotes.quotes)
    }
}
