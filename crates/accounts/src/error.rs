//! Smart account errors

use crate::client::RpcError;
use keel_primitives::{CodecError, EntryPointVersion, SignerError, UserOperationError};
use thiserror::Error;

pub type AccountResult<T> = Result<T, AccountError>;

/// Errors raised while building or signing for a smart account
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AccountError {
    /// A batch needs at least one call
    #[error("empty batch: at least one call is required")]
    EmptyBatch,
    #[error("invalid threshold {threshold} for {owners} owners")]
    InvalidThreshold { threshold: usize, owners: usize },
    #[error("{owner:?} is not an owner of the account")]
    UnknownOwner { owner: ethers::types::Address },
    #[error("{found} signatures collected, {threshold} required")]
    InsufficientSignatures { found: usize, threshold: usize },
    #[error("{account} account does not support entry point {version}")]
    UnsupportedEntryPoint { account: &'static str, version: EntryPointVersion },
    /// Neither a client nor a precomputed value is available to resolve the address
    #[error("cannot resolve the account address: {missing} is missing")]
    AddressResolution { missing: &'static str },
    #[error("{operation} is not supported by the {account} account, {alternative}")]
    UnsupportedOperation { account: &'static str, operation: &'static str, alternative: String },
    #[error("sender address not found in getSenderAddress result: {inner}")]
    SenderAddress { inner: String },
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Signer(#[from] SignerError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    UserOperation(#[from] UserOperationError),
}

impl AccountError {
    pub fn unsupported_entry_point(account: &'static str, version: EntryPointVersion) -> Self {
        Self::UnsupportedEntryPoint { account, version }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(
            AccountError::AddressResolution { missing: "public client" }.to_string(),
            "cannot resolve the account address: public client is missing"
        );
        assert_eq!(
            AccountError::unsupported_entry_point("nexus", EntryPointVersion::V06).to_string(),
            "nexus account does not support entry point 0.6"
        );
        let err: AccountError = RpcError::new(-32500, "AA21 didn't pay prefund").into();
        assert!(err.to_string().contains("AA21"));
    }
}
