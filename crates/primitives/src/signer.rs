//! Signing capability used by smart accounts, and a `Wallet` backed by a local private key

use crate::{
    crypto::eip191_hash,
    error::{SignerError, SignerResult},
};
use async_trait::async_trait;
use ethers::{
    prelude::k256::ecdsa::SigningKey,
    signers::{coins_bip39::English, LocalWallet, MnemonicBuilder, Signer},
    types::{
        transaction::eip712::{Eip712, TypedData},
        Address, Bytes, RecoveryMessage, Signature, H256,
    },
};
use std::fmt::Debug;

/// Produces ECDSA signatures over 32-byte digests
///
/// Everything an account needs (user operation hashes, EIP-191 messages, EIP-712 typed data) is
/// reduced to a digest first, so a signer only has to implement [sign_hash](Self::sign_hash).
#[async_trait]
pub trait SmartAccountSigner: Debug + Send + Sync {
    /// Address of the signing key
    fn address(&self) -> Address;

    /// Signs a digest as-is, `v` is 27 or 28
    async fn sign_hash(&self, hash: H256) -> SignerResult<Signature>;

    /// Signs the EIP-191 personal message hash of `message`
    async fn sign_message(&self, message: &[u8]) -> SignerResult<Signature> {
        self.sign_hash(eip191_hash(message)).await
    }

    /// Signs the EIP-712 digest of `data`
    async fn sign_typed_data(&self, data: &TypedData) -> SignerResult<Signature> {
        let digest = data
            .encode_eip712()
            .map_err(|err| SignerError::TypedData { inner: err.to_string() })?;
        self.sign_hash(H256::from(digest)).await
    }
}

/// Wrapper around ethers wallet
#[derive(Clone, Debug)]
pub struct Wallet {
    /// Signing key of the wallet
    pub signer: ethers::signers::Wallet<SigningKey>,
}

impl Wallet {
    /// Creates a new wallet from a hex encoded private key
    pub fn from_private_key(key: &str) -> SignerResult<Self> {
        let signer = key
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|err| SignerError::Configuration { inner: err.to_string() })?;
        Ok(Self { signer })
    }

    /// Create a new wallet from the given mnemonic phrase and account index
    ///
    /// # Arguments
    /// * `phrase` - The mnemonic phrase
    /// * `index` - Index of the account in the `m/44'/60'/0'/0` derivation path
    ///
    /// # Returns
    /// * `Self` - A new `Wallet` instance
    pub fn from_phrase(phrase: &str, index: u32) -> SignerResult<Self> {
        let signer = MnemonicBuilder::<English>::default()
            .phrase(phrase)
            .index(index)
            .and_then(|builder| builder.build())
            .map_err(|err| SignerError::Configuration { inner: err.to_string() })?;
        Ok(Self { signer })
    }
}

impl From<LocalWallet> for Wallet {
    fn from(signer: LocalWallet) -> Self {
        Self { signer }
    }
}

#[async_trait]
impl SmartAccountSigner for Wallet {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn sign_hash(&self, hash: H256) -> SignerResult<Signature> {
        self.signer.sign_hash(hash).map_err(|err| SignerError::Signing { inner: err.to_string() })
    }
}

/// Signature as `r ‖ s ‖ v` bytes
pub fn signature_bytes(signature: &Signature) -> Bytes {
    signature.to_vec().into()
}

/// Recovers the address that signed `hash`
pub fn recover(hash: H256, signature: &Signature) -> SignerResult<Address> {
    signature
        .recover(RecoveryMessage::Hash(hash))
        .map_err(|err| SignerError::Recovery { inner: err.to_string() })
}

/// Parses a 65-byte `r ‖ s ‖ v` signature, `v` may be 0/1 or 27/28
pub fn parse_signature(bytes: &[u8]) -> SignerResult<Signature> {
    let mut signature = Signature::try_from(bytes)
        .map_err(|err| SignerError::Recovery { inner: err.to_string() })?;
    if signature.v < 27 {
        signature.v += 27;
    }
    Ok(signature)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    pub const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    pub fn test_wallet() -> Wallet {
        Wallet::from_private_key(TEST_KEY).unwrap()
    }

    #[test]
    fn wallet_from_key_and_phrase() {
        let wallet = test_wallet();
        assert_eq!(wallet.address(), TEST_ADDRESS.parse::<Address>().unwrap());
        let from_phrase = Wallet::from_phrase(
            "test test test test test test test test test test test junk",
            0,
        )
        .unwrap();
        assert_eq!(from_phrase.address(), wallet.address());
        assert!(Wallet::from_private_key("0x1234").is_err());
    }

    #[tokio::test]
    async fn sign_and_recover() {
        let wallet = test_wallet();
        let hash = crate::crypto::keccak(b"keel");
        let signature = wallet.sign_hash(hash).await.unwrap();
        assert!(signature.v == 27 || signature.v == 28);
        assert_eq!(recover(hash, &signature).unwrap(), wallet.address());
        assert_eq!(signature_bytes(&signature).len(), 65);
        // deterministic (RFC 6979)
        assert_eq!(wallet.sign_hash(hash).await.unwrap(), signature);
    }

    #[tokio::test]
    async fn personal_message_signature_recovers() {
        let wallet = test_wallet();
        let signature = wallet.sign_message(b"hello").await.unwrap();
        assert_eq!(signature.recover("hello").unwrap(), wallet.address());

        let mut raw = signature.to_vec();
        raw[64] -= 27;
        assert_eq!(parse_signature(&raw).unwrap(), signature);
    }
}
