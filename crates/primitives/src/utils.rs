//! Misc utils

use ethers::{
    types::{Address, Bytes, U128, U256},
    utils::to_checksum,
};

/// Converts address to checksum address
pub fn as_checksum_addr<S>(val: &Address, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&to_checksum(val, None))
}

/// Converts Option address to checksum
pub fn as_checksum_addr_opt<S>(val: &Option<Address>, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    if let Some(addr) = val {
        s.serialize_str(&to_checksum(addr, None))
    } else {
        s.serialize_none()
    }
}

/// Parses a static address, falls back to the zero address
pub fn parse_address(address: &str) -> Address {
    address.parse().unwrap_or_default()
}

/// If possible, parses address from the first 20 bytes
pub fn get_address(buf: &[u8]) -> Option<Address> {
    if buf.len() >= 20 {
        Some(Address::from_slice(&buf[0..20]))
    } else {
        None
    }
}

/// Packs `paymaster ‖ paymasterVerificationGasLimit(16) ‖ paymasterPostOpGasLimit(16) ‖ data`
///
/// Empty when there is no paymaster.
pub fn pack_paymaster_and_data(
    paymaster: Option<Address>,
    paymaster_verification_gas_limit: U256,
    paymaster_post_op_gas_limit: U256,
    paymaster_data: &[u8],
) -> Bytes {
    match paymaster {
        Some(addr) if !addr.is_zero() => [
            addr.as_bytes(),
            &pack_uint128(paymaster_verification_gas_limit, paymaster_post_op_gas_limit),
            paymaster_data,
        ]
        .concat()
        .into(),
        _ => Bytes::default(),
    }
}

/// Paymaster fields of a v0.7 paymaster-and-data blob
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaymasterAndData {
    pub paymaster: Address,
    pub verification_gas_limit: U256,
    pub post_op_gas_limit: U256,
    pub data: Bytes,
}

/// Unpacks a v0.7 paymaster-and-data blob, `None` when the blob is too short
pub fn unpack_paymaster_and_data(buf: &[u8]) -> Option<PaymasterAndData> {
    if buf.len() < 52 {
        return None;
    }
    let (verification_gas_limit, post_op_gas_limit) = unpack_uint128(&buf[20..52]);
    Some(PaymasterAndData {
        paymaster: Address::from_slice(&buf[0..20]),
        verification_gas_limit,
        post_op_gas_limit,
        data: Bytes::from(buf[52..].to_vec()),
    })
}

/// Packs `factory ‖ factoryData`, empty when there is no factory
pub fn pack_init_code(factory: Option<Address>, factory_data: &[u8]) -> Bytes {
    match factory {
        Some(factory) if !factory.is_zero() => [factory.as_bytes(), factory_data].concat().into(),
        _ => Bytes::default(),
    }
}

/// Splits init code into factory and factory data, `None` for empty init code
pub fn unpack_init_code(init_code: &[u8]) -> Option<(Address, Bytes)> {
    get_address(init_code).map(|factory| (factory, Bytes::from(init_code[20..].to_vec())))
}

/// Packs two uint128
pub fn pack_uint128(a: U256, b: U256) -> [u8; 32] {
    let mut res = [0u8; 32];
    let a: U128 = {
        let mut tem = [0; 32];
        a.to_big_endian(&mut tem);
        U128::from_big_endian(&tem[16..32])
    };
    let b: U128 = {
        let mut tem = [0; 32];
        b.to_big_endian(&mut tem);
        U128::from_big_endian(&tem[16..32])
    };
    a.to_big_endian(&mut res[0..16]);
    b.to_big_endian(&mut res[16..32]);
    res
}

/// Unpacks two uint128 from bytes
pub fn unpack_uint128(buf: &[u8]) -> (U256, U256) {
    (U256::from_big_endian(&buf[0..16]), U256::from_big_endian(&buf[16..32]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_u128() {
        let a: U256 = 100.into();
        let b: U256 = 200.into();
        let packed = pack_uint128(a, b);
        assert_eq!(packed[15], 100);
        assert_eq!(packed[31], 200);
        let (new_a, new_b) = unpack_uint128(&packed);
        assert_eq!(a, new_a, "unpack a worked");
        assert_eq!(b, new_b, "unpack b worked");
    }

    #[test]
    fn init_code() {
        let addr: Address = "0x95222290DD7278Aa3Ddd389Cc1E1d165CC4BAfe5".parse().unwrap();
        let data: Bytes = "0x12345678".parse().unwrap();
        let packed = pack_init_code(Some(addr), &data);
        assert_eq!(packed.len(), 24);
        assert_eq!(unpack_init_code(&packed), Some((addr, data)));
        assert!(pack_init_code(None, &[1, 2]).is_empty());
        assert_eq!(unpack_init_code(&[]), None);
    }

    #[test]
    fn paymaster_and_data() {
        let paymaster: Address = "0x0000000000000039cd5e8aE05257CE51C473ddd1".parse().unwrap();
        let packed = pack_paymaster_and_data(
            Some(paymaster),
            U256::from(50_000),
            U256::from(20_000),
            &[0xab, 0xcd],
        );
        assert_eq!(packed.len(), 54);
        assert_eq!(
            unpack_paymaster_and_data(&packed),
            Some(PaymasterAndData {
                paymaster,
                verification_gas_limit: U256::from(50_000),
                post_op_gas_limit: U256::from(20_000),
                data: vec![0xab, 0xcd].into(),
            })
        );
        assert!(pack_paymaster_and_data(None, U256::one(), U256::one(), &[]).is_empty());
        assert_eq!(unpack_paymaster_and_data(&packed[..40]), None);
    }
}
