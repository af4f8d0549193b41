//! Diamond-proxy account with a secp256k1 verification facet

use crate::{
    account::{ecdsa_stub_signature, AccountCore, SmartAccountApi},
    error::{AccountError, AccountResult},
};
use async_trait::async_trait;
use ethers::{
    abi::Token,
    types::{
        transaction::eip712::{Eip712, TypedData},
        Address, Bytes, H256, U256,
    },
};
use keel_primitives::{
    codec::abi,
    crypto::{chain_domain, domain_separator, eip191_hash, hash_typed_data, keccak, struct_hash, type_hash},
    parse_address,
    signer::signature_bytes,
    Call, EntryPointVersion, SignerError, SmartAccountSigner, UserOperation,
};
use std::sync::Arc;

pub const FACTORY: &str = "0x729c310186a57833f622630a16d13f710b83272a";
pub const K1_FACET: &str = "0x81b9E3689390C7e74cF526594A105Dea21a8cdD5";
pub const MESSAGE_TYPE: &str = "BarzMessage(bytes message)";

const NAME: &str = "diamond";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiamondAddresses {
    pub factory: Address,
    pub verification_facet: Address,
}

impl Default for DiamondAddresses {
    fn default() -> Self {
        Self { factory: parse_address(FACTORY), verification_facet: parse_address(K1_FACET) }
    }
}

#[derive(Debug)]
pub struct DiamondAccount {
    core: AccountCore,
    owner: Arc<dyn SmartAccountSigner>,
    /// Owner key material passed to the facet, the owner address unless overridden
    owner_key: Bytes,
    salt: U256,
    addresses: DiamondAddresses,
}

impl DiamondAccount {
    /// Account owned by `owner` on entry point 0.6
    ///
    /// The owner key handed to the verification facet defaults to the 20-byte owner address.
    /// Facets that verify against the 65-byte uncompressed secp256k1 public key (such as the
    /// default k1 facet of a stock deployment) need it through [owner_key](Self::owner_key),
    /// otherwise `createAccount` deploys an account the owner cannot sign for.
    pub fn new(core: AccountCore, owner: Arc<dyn SmartAccountSigner>) -> AccountResult<Self> {
        if core.entry_point.version != EntryPointVersion::V06 {
            return Err(AccountError::unsupported_entry_point(NAME, core.entry_point.version));
        }
        let owner_key = owner.address().as_bytes().to_vec().into();
        Ok(Self { core, owner, owner_key, salt: U256::zero(), addresses: DiamondAddresses::default() })
    }

    pub fn salt(mut self, salt: U256) -> Self {
        self.salt = salt;
        self
    }

    /// Facets expecting the uncompressed public key get it here
    pub fn owner_key(mut self, owner_key: Bytes) -> Self {
        self.owner_key = owner_key;
        self
    }

    pub fn addresses(mut self, addresses: DiamondAddresses) -> Self {
        self.addresses = addresses;
        self
    }

    /// `createAccount(verificationFacet, owner, salt)`
    pub fn factory_data(&self) -> Bytes {
        abi::encode_function_call(
            "createAccount(address,bytes,uint256)",
            &[
                Token::Address(self.addresses.verification_facet),
                Token::Bytes(self.owner_key.to_vec()),
                Token::Uint(self.salt),
            ],
        )
    }

    /// `BarzMessage` digest over the account domain
    async fn message_hash(&self, hash: H256) -> AccountResult<H256> {
        let account = self.address().await?;
        let message = struct_hash(
            type_hash(MESSAGE_TYPE),
            vec![Token::FixedBytes(keccak(hash.as_bytes()).as_bytes().to_vec())],
        );
        Ok(hash_typed_data(domain_separator(&chain_domain(self.core.chain_id, account)), message))
    }
}

#[async_trait]
impl SmartAccountApi for DiamondAccount {
    fn name(&self) -> &'static str {
        NAME
    }

    fn core(&self) -> &AccountCore {
        &self.core
    }

    async fn address(&self) -> AccountResult<Address> {
        let init_code = self.init_code().await?;
        self.core.resolve_with_entry_point(init_code).await
    }

    async fn factory_args(&self) -> AccountResult<Option<(Address, Bytes)>> {
        Ok(Some((self.addresses.factory, self.factory_data())))
    }

    fn encode_call(&self, call: &Call) -> AccountResult<Bytes> {
        Ok(abi::encode_function_call(
            "execute(address,uint256,bytes)",
            &[Token::Address(call.to), Token::Uint(call.value), Token::Bytes(call.data.to_vec())],
        ))
    }

    fn encode_calls(&self, calls: &[Call]) -> AccountResult<Bytes> {
        match calls {
            [] => Err(AccountError::EmptyBatch),
            [call] => self.encode_call(call),
            calls => Ok(abi::encode_function_call(
                "executeBatch(address[],uint256[],bytes[])",
                &[
                    Token::Array(calls.iter().map(|call| Token::Address(call.to)).collect()),
                    Token::Array(calls.iter().map(|call| Token::Uint(call.value)).collect()),
                    Token::Array(calls.iter().map(|call| Token::Bytes(call.data.to_vec())).collect()),
                ],
            )),
        }
    }

    fn stub_signature(&self) -> Bytes {
        ecdsa_stub_signature()
    }

    async fn sign_user_operation(&self, op: &UserOperation) -> AccountResult<Bytes> {
        let hash = self.hash_user_operation(op)?;
        Ok(signature_bytes(&self.owner.sign_message(hash.as_bytes()).await?))
    }

    async fn sign_message(&self, message: &[u8]) -> AccountResult<Bytes> {
        let digest = self.message_hash(eip191_hash(message)).await?;
        Ok(signature_bytes(&self.owner.sign_hash(digest).await?))
    }

    async fn sign_typed_data(&self, data: &TypedData) -> AccountResult<Bytes> {
        let hash = data
            .encode_eip712()
            .map_err(|err| SignerError::TypedData { inner: err.to_string() })?;
        let digest = self.message_hash(H256::from(hash)).await?;
        Ok(signature_bytes(&self.owner.sign_hash(digest).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::ParamType;
    use keel_primitives::{
        signer::{parse_signature, recover},
        EntryPoint, Wallet,
    };

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn account() -> DiamondAccount {
        let owner = Arc::new(Wallet::from_private_key(KEY).unwrap());
        DiamondAccount::new(AccountCore::new(EntryPoint::v06(), 1), owner).unwrap()
    }

    #[test]
    fn only_entry_point_v06() {
        let owner = Arc::new(Wallet::from_private_key(KEY).unwrap());
        let err = DiamondAccount::new(AccountCore::new(EntryPoint::v07(), 1), owner).unwrap_err();
        assert_eq!(err, AccountError::unsupported_entry_point(NAME, EntryPointVersion::V07));
    }

    #[test]
    fn execute_batch_arrays_have_equal_length() {
        let account = account();
        let calls: Vec<Call> = (1..=4u8)
            .map(|byte| Call::new(Address::repeat_byte(byte)).value(U256::from(byte)).data(vec![byte].into()))
            .collect();
        let encoded = account.encode_calls(&calls).unwrap();
        assert_eq!(&encoded[..4], &abi::selector("executeBatch(address[],uint256[],bytes[])"));
        let tokens = abi::decode(
            &[
                ParamType::Array(Box::new(ParamType::Address)),
                ParamType::Array(Box::new(ParamType::Uint(256))),
                ParamType::Array(Box::new(ParamType::Bytes)),
            ],
            &encoded[4..],
        )
        .unwrap();
        let lengths: Vec<usize> = tokens.into_iter().map(|token| token.into_array().unwrap().len()).collect();
        assert_eq!(lengths, vec![4, 4, 4]);

        assert_eq!(account.encode_calls(&calls[..1]).unwrap(), account.encode_call(&calls[0]).unwrap());
    }

    #[tokio::test]
    async fn message_signature_wraps_barz_message() {
        let diamond = Address::repeat_byte(0x0d);
        let owner = Arc::new(Wallet::from_private_key(KEY).unwrap());
        let account =
            DiamondAccount::new(AccountCore::new(EntryPoint::v06(), 1).address(diamond), owner.clone())
                .unwrap();

        let signature = account.sign_message(b"hello world").await.unwrap();
        assert_eq!(signature.len(), 65);
        let digest = hash_typed_data(
            domain_separator(&chain_domain(1, diamond)),
            struct_hash(
                type_hash(MESSAGE_TYPE),
                vec![Token::FixedBytes(keccak(eip191_hash(b"hello world").as_bytes()).as_bytes().to_vec())],
            ),
        );
        let signer = recover(digest, &parse_signature(&signature).unwrap()).unwrap();
        assert_eq!(signer, owner.address());
        // not a plain personal signature
        assert_ne!(signature, signature_bytes(&owner.sign_message(b"hello world").await.unwrap()));
    }

    #[test]
    fn factory_data_carries_facet_and_owner() {
        let data = account().salt(U256::from(3)).factory_data();
        let tokens = abi::decode(&[ParamType::Address, ParamType::Bytes, ParamType::Uint(256)], &data[4..]).unwrap();
        assert_eq!(tokens[0], Token::Address(parse_address(K1_FACET)));
        assert_eq!(
            tokens[1],
            Token::Bytes(parse_address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").as_bytes().to_vec())
        );
        assert_eq!(tokens[2], Token::Uint(U256::from(3)));
    }
}
