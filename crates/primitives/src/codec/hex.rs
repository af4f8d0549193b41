//! Hex string and byte array helpers

use crate::error::{CodecError, CodecResult};
use ethers::{types::Bytes, utils::hex};

/// Encodes bytes as a `0x`-prefixed lowercase hex string
pub fn to_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes.as_ref()))
}

/// Decodes a hex string with or without the `0x` prefix
///
/// Odd-length input is treated as if it had a leading zero nibble.
pub fn from_hex(input: &str) -> CodecResult<Bytes> {
    let digits = input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")).unwrap_or(input);
    let digits =
        if digits.len() % 2 == 1 { format!("0{digits}") } else { digits.to_string() };
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|err| CodecError::InvalidHex { input: input.to_string(), inner: err.to_string() })
}

/// Whether the string is `0x`-prefixed and contains only hex digits
pub fn is_hex(input: &str) -> bool {
    input
        .strip_prefix("0x")
        .map(|digits| digits.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

/// Number of bytes
pub fn size(bytes: impl AsRef<[u8]>) -> usize {
    bytes.as_ref().len()
}

/// Left-pads bytes with zeros up to `target` bytes
pub fn pad_left(bytes: &[u8], target: usize) -> CodecResult<Vec<u8>> {
    if bytes.len() > target {
        return Err(CodecError::SizeOverflow { size: bytes.len(), target });
    }
    let mut out = vec![0u8; target - bytes.len()];
    out.extend_from_slice(bytes);
    Ok(out)
}

/// Right-pads bytes with zeros up to `target` bytes
pub fn pad_right(bytes: &[u8], target: usize) -> CodecResult<Vec<u8>> {
    if bytes.len() > target {
        return Err(CodecError::SizeOverflow { size: bytes.len(), target });
    }
    let mut out = bytes.to_vec();
    out.resize(target, 0);
    Ok(out)
}

/// Concatenates byte slices
pub fn concat<T: AsRef<[u8]>>(parts: &[T]) -> Bytes {
    parts.iter().flat_map(|part| part.as_ref().iter().copied()).collect::<Vec<u8>>().into()
}

/// Slices bytes in `[start, end)`, `end` defaults to the length of the input
pub fn slice(bytes: &[u8], start: usize, end: Option<usize>) -> CodecResult<Bytes> {
    let end = end.unwrap_or(bytes.len());
    if start > end || end > bytes.len() {
        return Err(CodecError::SliceOutOfBounds { start, end, size: bytes.len() });
    }
    Ok(Bytes::from(bytes[start..end].to_vec()))
}
