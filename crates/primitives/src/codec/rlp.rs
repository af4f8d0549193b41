//! Minimal RLP encoding for EIP-7702 authorization payloads

use ethers::{
    types::{Address, Bytes, U256},
    utils::rlp::RlpStream,
};

/// Item of a flat RLP list
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RlpItem {
    /// Unsigned integer, encoded without leading zeros
    Uint(U256),
    Address(Address),
    Bytes(Bytes),
}

/// RLP encodes a flat list of items
pub fn encode_list(items: &[RlpItem]) -> Bytes {
    let mut stream = RlpStream::new_list(items.len());
    for item in items {
        match item {
            RlpItem::Uint(value) => stream.append(value),
            RlpItem::Address(address) => stream.append(address),
            RlpItem::Bytes(bytes) => stream.append(&bytes.to_vec()),
        };
    }
    stream.out().freeze().into()
}
