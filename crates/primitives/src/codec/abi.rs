//! Solidity ABI encoding helpers
//!
//! Standard (head/tail) encoding is delegated to `ethers::abi`; this module adds the pieces the
//! account encoders need on top of it: width-aware `uintN` values, `abi.encodePacked` and
//! function call assembly.

use crate::error::{CodecError, CodecResult};
use ethers::{
    abi::{self, ParamType, Token},
    types::{Address, Bytes, U256},
    utils::id,
};

/// 4-byte function selector of a canonical signature, e.g. `transfer(address,uint256)`
pub fn selector(signature: &str) -> [u8; 4] {
    id(signature)
}

/// Encodes an address as a left-padded 32-byte word
pub fn encode_address(address: Address) -> Vec<u8> {
    abi::encode(&[Token::Address(address)])
}

/// Encodes a `uintN` as a 32-byte word, the value is truncated to `bits`
pub fn encode_uint(value: U256, bits: usize) -> Vec<u8> {
    let mut word = [0u8; 32];
    let packed = packed_uint(value, bits);
    word[32 - packed.len()..].copy_from_slice(&packed);
    word.to_vec()
}

/// Encodes a dynamic `bytes` payload: length word followed by data right-padded to 32 bytes
pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    let padded_len = data.len().div_ceil(32) * 32;
    let mut out = encode_uint(U256::from(data.len()), 256);
    out.extend_from_slice(data);
    out.resize(32 + padded_len, 0);
    out
}

/// Encodes tokens as a tuple (head followed by tail)
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    abi::encode(tokens)
}

/// Encodes a function call: selector followed by the ABI encoded arguments
pub fn encode_function_call(signature: &str, args: &[Token]) -> Bytes {
    [selector(signature).to_vec(), abi::encode(args)].concat().into()
}

/// Decodes ABI encoded data into tokens
pub fn decode(types: &[ParamType], data: &[u8]) -> CodecResult<Vec<Token>> {
    Ok(abi::decode(types, data)?)
}

fn decode_single(kind: ParamType, data: &[u8]) -> CodecResult<Token> {
    let name = kind.to_string();
    decode(&[kind], data)?
        .into_iter()
        .next()
        .ok_or(CodecError::Abi { inner: format!("missing {name} value") })
}

/// Decodes a single `address` return value
pub fn decode_address(data: &[u8]) -> CodecResult<Address> {
    decode_single(ParamType::Address, data)?
        .into_address()
        .ok_or(CodecError::Abi { inner: "expected address".into() })
}

/// Decodes a single `uint256` return value
pub fn decode_uint(data: &[u8]) -> CodecResult<U256> {
    decode_single(ParamType::Uint(256), data)?
        .into_uint()
        .ok_or(CodecError::Abi { inner: "expected uint256".into() })
}

/// Decodes a single `bool` return value
pub fn decode_bool(data: &[u8]) -> CodecResult<bool> {
    decode_single(ParamType::Bool, data)?
        .into_bool()
        .ok_or(CodecError::Abi { inner: "expected bool".into() })
}

/// Decodes a single `bytes` return value
pub fn decode_bytes(data: &[u8]) -> CodecResult<Bytes> {
    decode_single(ParamType::Bytes, data)?
        .into_bytes()
        .map(Bytes::from)
        .ok_or(CodecError::Abi { inner: "expected bytes".into() })
}

/// Big-endian `uintN` occupying `ceil(bits / 8)` bytes
fn packed_uint(value: U256, bits: usize) -> Vec<u8> {
    let width = bits.div_ceil(8).clamp(1, 32);
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word[32 - width..].to_vec()
}

/// Builder for Solidity `abi.encodePacked`
#[derive(Clone, Debug, Default)]
pub struct Packed {
    buf: Vec<u8>,
}

impl Packed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a 20-byte address
    pub fn address(mut self, address: Address) -> Self {
        self.buf.extend_from_slice(address.as_bytes());
        self
    }

    /// Appends a `uintN` in `ceil(bits / 8)` bytes
    pub fn uint(mut self, value: U256, bits: usize) -> Self {
        self.buf.extend_from_slice(&packed_uint(value, bits));
        self
    }

    /// Appends raw bytes (`bytes`, `bytesN`)
    pub fn bytes(mut self, data: impl AsRef<[u8]>) -> Self {
        self.buf.extend_from_slice(data.as_ref());
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Bytes {
        self.buf.into()
    }
}
