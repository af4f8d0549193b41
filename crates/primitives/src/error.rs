//! Errors of the primitive layer (codecs, signing, user operation revisions)

use crate::user_operation::EntryPointVersion;
use thiserror::Error;

pub type CodecResult<T> = Result<T, CodecError>;
pub type SignerResult<T> = Result<T, SignerError>;

/// Byte, hex and ABI codec errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid hex {input}: {inner}")]
    InvalidHex { input: String, inner: String },
    #[error("size of {size} bytes exceeds target size of {target} bytes")]
    SizeOverflow { size: usize, target: usize },
    #[error("slice [{start}..{end}] out of bounds for {size} bytes")]
    SliceOutOfBounds { start: usize, end: usize, size: usize },
    #[error("abi error: {inner}")]
    Abi { inner: String },
}

impl From<ethers::abi::Error> for CodecError {
    fn from(err: ethers::abi::Error) -> Self {
        Self::Abi { inner: err.to_string() }
    }
}

/// Signer errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("signing failed: {inner}")]
    Signing { inner: String },
    #[error("signature recovery failed: {inner}")]
    Recovery { inner: String },
    #[error("typed data encoding failed: {inner}")]
    TypedData { inner: String },
    #[error("invalid signer configuration: {inner}")]
    Configuration { inner: String },
}

/// Errors raised when a user operation does not fit the entry point it is used with
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UserOperationError {
    #[error("{found} user operation cannot be used with entry point {entry_point}, use {alternative} instead")]
    RevisionMismatch { entry_point: EntryPointVersion, found: &'static str, alternative: &'static str },
    #[error("user operation carries the EIP-7702 marker but no delegate address was provided")]
    MissingDelegate,
}
