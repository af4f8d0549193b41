//! Smart account (ERC-4337) encoders
//!
//! Every supported account derives its address and deployment data, encodes calls into account
//! call data, and signs user operations and ERC-1271 messages. [SmartAccount] is the closed set of
//! accounts dispatching [SmartAccountApi].

pub mod account;
pub mod address;
pub mod client;
pub mod diamond;
pub mod eip7702;
pub mod entry_point;
pub mod erc7579;
pub mod error;
pub mod nexus;
pub mod safe;
pub mod simple;

pub use account::{AccountCore, SmartAccount, SmartAccountApi};
pub use client::{EthClient, PublicClient, RpcError};
pub use diamond::DiamondAccount;
pub use eip7702::Eip7702Account;
pub use error::{AccountError, AccountResult};
pub use nexus::NexusAccount;
pub use safe::{launchpad::Safe7579Account, SafeAccount, SafeOwner, SafeOwners};
pub use simple::SimpleAccount;
