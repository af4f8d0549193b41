//! Keccak, EIP-191 and EIP-712 hashing

use ethers::{
    abi::{self, Token},
    types::{transaction::eip712::EIP712Domain, Address, H256, U256},
    utils::{hash_message, keccak256},
};

pub fn keccak(data: impl AsRef<[u8]>) -> H256 {
    H256::from(keccak256(data))
}

/// EIP-191 personal message hash: `keccak256("\x19Ethereum Signed Message:\n" ‖ len ‖ message)`
pub fn eip191_hash(message: impl AsRef<[u8]>) -> H256 {
    hash_message(message)
}

/// EIP-712 domain separator
pub fn domain_separator(domain: &EIP712Domain) -> H256 {
    H256::from(domain.separator())
}

/// Domain with only `chainId` and `verifyingContract` set
pub fn chain_domain(chain_id: u64, verifying_contract: Address) -> EIP712Domain {
    EIP712Domain {
        name: None,
        version: None,
        chain_id: Some(U256::from(chain_id)),
        verifying_contract: Some(verifying_contract),
        salt: None,
    }
}

/// Hash of the type string, e.g. `SafeMessage(bytes message)`
pub fn type_hash(type_string: &str) -> H256 {
    keccak(type_string.as_bytes())
}

/// Struct hash: `keccak256(typeHash ‖ abi.encode(fields))`
///
/// Dynamic members (`bytes`, `string`) must already be hashed by the caller.
pub fn struct_hash(type_hash: H256, fields: Vec<Token>) -> H256 {
    let mut tokens = Vec::with_capacity(fields.len() + 1);
    tokens.push(Token::FixedBytes(type_hash.as_bytes().to_vec()));
    tokens.extend(fields);
    keccak(abi::encode(&tokens))
}

/// EIP-712 digest: `keccak256(0x1901 ‖ domainSeparator ‖ structHash)`
pub fn hash_typed_data(domain_separator: H256, struct_hash: H256) -> H256 {
    keccak([&[0x19u8, 0x01][..], domain_separator.as_bytes(), struct_hash.as_bytes()].concat())
}
