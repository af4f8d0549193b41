use ethers::types::Address;
use keel_accounts::{AccountError, RpcError};
use keel_primitives::{SignerError, UserOperationError};
use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

/// Errors of the user operation pipeline
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientError {
    /// Bundler or paymaster answered with an error object
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    UserOperation(#[from] UserOperationError),

    #[error("Paymaster returned no quote for token {token:?}")]
    TokenQuoteNotFound { token: Address },

    #[error("ERC-20 gas payment needs a paymaster client")]
    PaymasterNotConfigured,
}

impl ClientError {
    /// Bundler validation code (`AAxx`) of an RPC error
    pub fn validation_code(&self) -> Option<String> {
        match self {
            Self::Rpc(err) => err.validation_code(),
            Self::Account(AccountError::Rpc(err)) => err.validation_code(),
            _ => None,
        }
    }
}
