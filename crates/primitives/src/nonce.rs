//! Two-dimensional nonces: `nonce = key(192) << 64 | sequence(64)`

use ethers::types::U256;

/// Composes a nonce from its key and sequence
pub fn compose_nonce(key: U256, sequence: u64) -> U256 {
    (key << 64usize) | U256::from(sequence)
}

/// 192-bit key of a nonce
pub fn nonce_key(nonce: U256) -> U256 {
    nonce >> 64usize
}

/// 64-bit sequence of a nonce
pub fn nonce_sequence(nonce: U256) -> u64 {
    nonce.low_u64()
}

/// Nonce key from up to 24 big-endian bytes (e.g. `validator ‖ 0x00000000`)
pub fn key_from_bytes(bytes: &[u8]) -> U256 {
    let bytes = if bytes.len() > 24 { &bytes[bytes.len() - 24..] } else { bytes };
    U256::from_big_endian(bytes)
}
