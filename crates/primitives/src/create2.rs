//! Counterfactual (CREATE2) addresses

use crate::crypto::keccak;
use ethers::{
    types::{Address, H256, U256},
    utils::get_create2_address_from_hash,
};

/// `last20(keccak256(0xff ‖ factory ‖ salt ‖ initCodeHash))`
pub fn create2_address(factory: Address, salt: H256, init_code_hash: H256) -> Address {
    get_create2_address_from_hash(factory, salt.as_bytes(), init_code_hash.as_bytes())
}

/// CREATE2 address from the full deployment code
pub fn create2_address_from_code(factory: Address, salt: H256, init_code: &[u8]) -> Address {
    create2_address(factory, salt, keccak(init_code))
}

/// Salt of proxy factories hashing the initializer: `keccak256(keccak256(initializer) ‖ saltNonce)`
pub fn initializer_salt(initializer: &[u8], salt_nonce: U256) -> H256 {
    let mut nonce = [0u8; 32];
    salt_nonce.to_big_endian(&mut nonce);
    keccak([keccak(initializer).as_bytes(), &nonce[..]].concat())
}
