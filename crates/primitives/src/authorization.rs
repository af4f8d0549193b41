//! EIP-7702 authorizations: signing payload, signed tuple and the RPC object bundlers expect

use crate::{
    codec::rlp::{encode_list, RlpItem},
    constants::eip7702::{DELEGATION_PREFIX, FACTORY_MARKER, MAGIC},
    crypto::keccak,
    error::SignerResult,
    signer::{recover, SmartAccountSigner},
    utils::parse_address,
};
use ethers::types::{Address, Bytes, Signature, H256, U256, U64};
use serde::{Deserialize, Serialize};

/// Factory value marking a user operation whose sender must be EIP-7702 delegated
pub fn factory_marker() -> Address {
    parse_address(FACTORY_MARKER)
}

/// Code of an EOA delegating to `delegate`: `0xef0100 ‖ delegate`
pub fn delegation_code(delegate: Address) -> Bytes {
    [&DELEGATION_PREFIX[..], delegate.as_bytes()].concat().into()
}

/// Address an EOA delegates to, `None` when the code is not a delegation designator
pub fn delegation_target(code: &[u8]) -> Option<Address> {
    if code.len() == 23 && code.starts_with(&DELEGATION_PREFIX) {
        Some(Address::from_slice(&code[3..]))
    } else {
        None
    }
}

/// Unsigned EIP-7702 authorization tuple
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Eip7702Authorization {
    /// Chain the authorization is valid on (0 for every chain)
    pub chain_id: u64,
    /// Contract the EOA delegates to
    pub address: Address,
    /// Transaction count of the EOA
    pub nonce: u64,
}

impl Eip7702Authorization {
    pub fn new(chain_id: u64, address: Address, nonce: u64) -> Self {
        Self { chain_id, address, nonce }
    }

    /// Signing hash: `keccak256(0x05 ‖ rlp([chainId, address, nonce]))`
    pub fn signature_hash(&self) -> H256 {
        let payload = encode_list(&[
            RlpItem::Uint(U256::from(self.chain_id)),
            RlpItem::Address(self.address),
            RlpItem::Uint(U256::from(self.nonce)),
        ]);
        keccak([&[MAGIC][..], &payload[..]].concat())
    }

    /// Signs the authorization with the EOA key
    pub async fn sign(self, signer: &dyn SmartAccountSigner) -> SignerResult<SignedAuthorization> {
        let signature = signer.sign_hash(self.signature_hash()).await?;
        Ok(SignedAuthorization { authorization: self, signature })
    }
}

/// Signed EIP-7702 authorization
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignedAuthorization {
    pub authorization: Eip7702Authorization,
    pub signature: Signature,
}

impl SignedAuthorization {
    /// `yParity = v - 27` (signatures with `v` in {0, 1} are taken as is)
    pub fn y_parity(&self) -> u64 {
        if self.signature.v >= 27 {
            self.signature.v - 27
        } else {
            self.signature.v
        }
    }

    /// Address of the EOA that signed the authorization
    pub fn recover_authority(&self) -> SignerResult<Address> {
        let mut signature = self.signature;
        signature.v = self.y_parity() + 27;
        recover(self.authorization.signature_hash(), &signature)
    }

    pub fn to_rpc(&self) -> RpcAuthorization {
        RpcAuthorization {
            chain_id: U64::from(self.authorization.chain_id),
            address: self.authorization.address,
            nonce: U64::from(self.authorization.nonce),
            y_parity: U64::from(self.y_parity()),
            r: self.signature.r,
            s: self.signature.s,
        }
    }
}

/// Authorization object sent to bundlers as `eip7702Auth`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcAuthorization {
    pub chain_id: U64,
    pub address: Address,
    pub nonce: U64,
    pub y_parity: U64,
    pub r: U256,
    pub s: U256,
}

impl From<SignedAuthorization> for RpcAuthorization {
    fn from(value: SignedAuthorization) -> Self {
        value.to_rpc()
    }
}
