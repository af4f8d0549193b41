//! Account abstraction (ERC-4337) primitive types
//!
//! This crate contains the user operation types of every entry point revision, the codecs and
//! hashes they are built from, EIP-7702 authorizations and the signer abstraction used by smart
//! accounts.

pub mod authorization;
pub mod codec;
pub mod constants;
pub mod create2;
pub mod crypto;
pub mod error;
pub mod nonce;
pub mod paymaster;
pub mod signer;
mod user_operation;
mod utils;

pub use authorization::{Eip7702Authorization, RpcAuthorization, SignedAuthorization};
pub use error::{CodecError, CodecResult, SignerError, SignerResult, UserOperationError};
pub use paymaster::{PaymasterContext, PaymasterData, PaymasterStubData, TokenQuote};
pub use signer::{SmartAccountSigner, Wallet};
pub use user_operation::{
    entry_point_domain, Call, EntryPoint, EntryPointVersion, GasEstimate, PackedUserOperation,
    UserOperation, UserOperationFees, UserOperationHash, UserOperationReceipt, UserOperationV06,
    UserOperationV07,
};
pub use utils::{
    as_checksum_addr, as_checksum_addr_opt, get_address, pack_init_code, pack_paymaster_and_data,
    pack_uint128, parse_address, unpack_init_code, unpack_paymaster_and_data, unpack_uint128,
    PaymasterAndData,
};
