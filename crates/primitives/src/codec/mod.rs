//! Binary codecs: hex strings, Solidity ABI and RLP

pub mod abi;
pub mod hex;
pub mod rlp;

pub use abi::Packed;
