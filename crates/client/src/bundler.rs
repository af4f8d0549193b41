//! Bundler (ERC-4337 `eth_*` namespace) interface

use async_trait::async_trait;
use ethers::types::{spoof, Address, H256};
use keel_accounts::RpcError;
use keel_primitives::{
    GasEstimate, RpcAuthorization, UserOperation, UserOperationFees, UserOperationHash,
    UserOperationReceipt,
};
use serde::{Deserialize, Serialize};

/// Status of a user operation as tracked by the bundler
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserOperationStatus {
    NotFound,
    NotSubmitted,
    Submitted,
    Rejected,
    Reverted,
    Included,
    Failed,
    Queued,
    /// Bundler without a status endpoint
    #[default]
    #[serde(other)]
    Unknown,
}

impl UserOperationStatus {
    /// Terminal failures without a receipt to wait for
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Rejected | Self::Failed)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationStatusResponse {
    pub status: UserOperationStatus,
    #[serde(default)]
    pub transaction_hash: Option<H256>,
}

/// Fee tiers of `pimlico_getUserOperationGasPrice`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserOperationGasPrice {
    pub slow: UserOperationFees,
    pub standard: UserOperationFees,
    pub fast: UserOperationFees,
}

/// Bundler the client submits user operations to
#[async_trait]
pub trait BundlerClient: Send + Sync {
    async fn supported_entry_points(&self) -> Result<Vec<Address>, RpcError>;

    async fn chain_id(&self) -> Result<u64, RpcError>;

    async fn estimate_user_operation_gas(
        &self,
        user_operation: &UserOperation,
        entry_point: Address,
        authorization: Option<&RpcAuthorization>,
        state_override: Option<&spoof::State>,
    ) -> Result<GasEstimate, RpcError>;

    async fn send_user_operation(
        &self,
        user_operation: &UserOperation,
        entry_point: Address,
        authorization: Option<&RpcAuthorization>,
    ) -> Result<UserOperationHash, RpcError>;

    async fn get_user_operation_receipt(
        &self,
        hash: UserOperationHash,
    ) -> Result<Option<UserOperationReceipt>, RpcError>;

    async fn get_user_operation_status(
        &self,
        _hash: UserOperationHash,
    ) -> Result<UserOperationStatus, RpcError> {
        Ok(UserOperationStatus::Unknown)
    }

    /// Fees recommended by the bundler, `None` when it has no opinion
    async fn get_user_operation_gas_price(&self) -> Result<Option<UserOperationFees>, RpcError> {
        Ok(None)
    }
}
