//! Smart account client
//!
//! Turns calls into signed user operations: nonce and fee resolution, paymaster sponsorship (ERC-7677
//! and ERC-20 token paymasters), gas estimation, EIP-7702 authorizations, submission to a bundler
//! and receipt polling.

pub mod bundler;
pub mod client;
pub mod config;
pub mod erc20;
pub mod error;
pub mod paymaster;
pub mod request;
pub mod rpc;

pub use bundler::{BundlerClient, UserOperationStatus};
pub use client::{SmartAccountClient, WaitOutcome};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use paymaster::PaymasterClient;
pub use request::{
    FeeOverrides, GasOverrides, PreparedUserOperation, SignedUserOperation, UserOperationRequest,
};
pub use rpc::JsonRpcBundlerClient;
