//! Standard single-owner account (`SimpleAccount` and `SimpleAccountFactory`)

use crate::{
    account::{ecdsa_stub_signature, AccountCore, SmartAccountApi},
    error::{AccountError, AccountResult},
};
use async_trait::async_trait;
use ethers::{
    abi::Token,
    types::{transaction::eip712::TypedData, Address, Bytes, H256, U256},
};
use keel_primitives::{
    codec::abi, create2::create2_address_from_code, parse_address, signer::signature_bytes, Call,
    EntryPoint, EntryPointVersion, SmartAccountSigner, UserOperation,
};
use std::sync::Arc;
use tracing::trace;

pub const FACTORY_V06: &str = "0x9406Cc6185a346906296840746125a0E44976454";
pub const FACTORY_V07: &str = "0x91E60e0613810449d098b0b5Ec8b51A0FE8c8985";
pub const FACTORY_V08: &str = "0x13E9ed32155810FDbd067D4522C492D6f68E5944";

const NAME: &str = "simple";

/// Contracts of the account for one entry point
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleAddresses {
    pub factory: Address,
    /// Account implementation behind the proxies deployed by the factory
    pub implementation: Option<Address>,
    /// `ERC1967Proxy` creation code; with `implementation` set, addresses are derived locally
    pub proxy_creation_code: Option<Bytes>,
}

impl SimpleAddresses {
    pub fn for_entry_point(entry_point: &EntryPoint) -> Self {
        let factory = match entry_point.version {
            EntryPointVersion::V06 => FACTORY_V06,
            EntryPointVersion::V07 => FACTORY_V07,
            EntryPointVersion::V08 => FACTORY_V08,
        };
        Self { factory: parse_address(factory), implementation: None, proxy_creation_code: None }
    }
}

#[derive(Debug)]
pub struct SimpleAccount {
    core: AccountCore,
    owner: Arc<dyn SmartAccountSigner>,
    salt: U256,
    addresses: SimpleAddresses,
}

impl SimpleAccount {
    pub fn new(core: AccountCore, owner: Arc<dyn SmartAccountSigner>) -> Self {
        let addresses = SimpleAddresses::for_entry_point(&core.entry_point);
        Self { core, owner, salt: U256::zero(), addresses }
    }

    pub fn salt(mut self, salt: U256) -> Self {
        self.salt = salt;
        self
    }

    pub fn addresses(mut self, addresses: SimpleAddresses) -> Self {
        self.addresses = addresses;
        self
    }

    /// `createAccount(owner, salt)`
    pub fn factory_data(&self) -> Bytes {
        abi::encode_function_call(
            "createAccount(address,uint256)",
            &[Token::Address(self.owner.address()), Token::Uint(self.salt)],
        )
    }

    /// Address derived without the node, when the proxy creation code is known
    pub fn counterfactual_address(&self) -> Option<Address> {
        let implementation = self.addresses.implementation?;
        let creation_code = self.addresses.proxy_creation_code.as_ref()?;
        let initialize = abi::encode_function_call(
            "initialize(address)",
            &[Token::Address(self.owner.address())],
        );
        let constructor_args =
            abi::encode(&[Token::Address(implementation), Token::Bytes(initialize.to_vec())]);
        let mut salt = [0u8; 32];
        self.salt.to_big_endian(&mut salt);
        Some(create2_address_from_code(
            self.addresses.factory,
            H256::from(salt),
            &[&creation_code[..], &constructor_args[..]].concat(),
        ))
    }

    fn encode_batch(&self, calls: &[Call]) -> AccountResult<Bytes> {
        let targets = Token::Array(calls.iter().map(|call| Token::Address(call.to)).collect());
        let values = Token::Array(calls.iter().map(|call| Token::Uint(call.value)).collect());
        let data = Token::Array(calls.iter().map(|call| Token::Bytes(call.data.to_vec())).collect());
        match self.core.entry_point.version {
            EntryPointVersion::V06 => {
                if calls.iter().any(|call| !call.value.is_zero()) {
                    return Err(AccountError::UnsupportedOperation {
                        account: NAME,
                        operation: "batch with value",
                        alternative: "send value transfers as single calls or use entry point 0.7"
                            .into(),
                    });
                }
                Ok(abi::encode_function_call("executeBatch(address[],bytes[])", &[targets, data]))
            }
            EntryPointVersion::V07 => Ok(abi::encode_function_call(
                "executeBatch(address[],uint256[],bytes[])",
                &[targets, values, data],
            )),
            EntryPointVersion::V08 => Ok(abi::encode_function_call(
                "executeBatch((address,uint256,bytes)[])",
                &[Token::Array(calls.iter().map(Call::to_token).collect())],
            )),
        }
    }
}

#[async_trait]
impl SmartAccountApi for SimpleAccount {
    fn name(&self) -> &'static str {
        NAME
    }

    fn core(&self) -> &AccountCore {
        &self.core
    }

    async fn address(&self) -> AccountResult<Address> {
        if let Some(address) = self.counterfactual_address() {
            return self.core.resolve_address(|| async move { Ok(address) }).await;
        }
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
            calls => self.encode_batch(calls),
        }
    }

    fn stub_signature(&self) -> Bytes {
        ecdsa_stub_signature()
    }

    async fn sign_user_operation(&self, op: &UserOperation) -> AccountResult<Bytes> {
        let hash = self.hash_user_operation(op)?;
        trace!("Signing user operation {hash}");
        let signature = match self.core.entry_point.version {
            // the v0.8 hash is already the EIP-712 digest
            EntryPointVersion::V08 => self.owner.sign_hash(hash.into()).await?,
            EntryPointVersion::V06 | EntryPointVersion::V07 => {
                self.owner.sign_message(hash.as_bytes()).await?
            }
        };
        Ok(signature_bytes(&signature))
    }

    async fn sign_message(&self, message: &[u8]) -> AccountResult<Bytes> {
        Ok(signature_bytes(&self.owner.sign_message(message).await?))
    }

    async fn sign_typed_data(&self, data: &TypedData) -> AccountResult<Bytes> {
        Ok(signature_bytes(&self.owner.sign_typed_data(data).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::ParamType;
    use keel_primitives::{crypto::eip191_hash, signer::recover, Wallet};

    const OWNER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn account(entry_point: EntryPoint) -> SimpleAccount {
        let owner = Wallet::from_private_key(OWNER_KEY).unwrap();
        SimpleAccount::new(AccountCore::new(entry_point, 1), Arc::new(owner))
    }

    fn calls() -> Vec<Call> {
        vec![
            Call::new(Address::repeat_byte(1)).data(vec![0xaau8].into()),
            Call::new(Address::repeat_byte(2)).value(U256::from(5)),
            Call::new(Address::repeat_byte(3)),
        ]
    }

    #[test]
    fn factory_data() {
        let account = account(EntryPoint::v07());
        let data = account.factory_data();
        assert_eq!(&data[..4], &abi::selector("createAccount(address,uint256)"));
        let tokens = abi::decode(&[ParamType::Address, ParamType::Uint(256)], &data[4..]).unwrap();
        assert_eq!(tokens[0], Token::Address("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap()));
        assert_eq!(tokens[1], Token::Uint(U256::zero()));
        assert_eq!(account.addresses.factory, parse_address(FACTORY_V07));
    }

    #[test]
    fn single_call_batch_is_execute() {
        for entry_point in [EntryPoint::v06(), EntryPoint::v07(), EntryPoint::v08()] {
            let account = account(entry_point);
            let call = &calls()[1];
            assert_eq!(account.encode_calls(std::slice::from_ref(call)).unwrap(), account.encode_call(call).unwrap());
            assert_eq!(account.encode_calls(&[]), Err(AccountError::EmptyBatch));
        }
    }

    #[test]
    fn batch_shape_per_entry_point() {
        let v07 = account(EntryPoint::v07()).encode_calls(&calls()).unwrap();
        let tokens = abi::decode(
            &[
                ParamType::Array(Box::new(ParamType::Address)),
                ParamType::Array(Box::new(ParamType::Uint(256))),
                ParamType::Array(Box::new(ParamType::Bytes)),
            ],
            &v07[4..],
        )
        .unwrap();
        for token in tokens {
            assert_eq!(token.into_array().unwrap().len(), 3);
        }

        let v08 = account(EntryPoint::v08()).encode_calls(&calls()).unwrap();
        assert_eq!(&v08[..4], &abi::selector("executeBatch((address,uint256,bytes)[])"));

        let v06 = account(EntryPoint::v06());
        assert!(matches!(v06.encode_calls(&calls()), Err(AccountError::UnsupportedOperation { .. })));
        let without_value = [calls()[0].clone(), calls()[2].clone()];
        let encoded = v06.encode_calls(&without_value).unwrap();
        assert_eq!(&encoded[..4], &abi::selector("executeBatch(address[],bytes[])"));
    }

    #[tokio::test]
    async fn deterministic_local_address() {
        let addresses = SimpleAddresses {
            implementation: Some(Address::repeat_byte(0x42)),
            proxy_creation_code: Some(vec![0x60u8, 0x80, 0x60, 0x40].into()),
            ..SimpleAddresses::for_entry_point(&EntryPoint::v07())
        };
        let first = account(EntryPoint::v07()).addresses(addresses.clone());
        let second = account(EntryPoint::v07()).addresses(addresses.clone());
        let salted = account(EntryPoint::v07()).addresses(addresses).salt(U256::one());
        assert_eq!(first.address().await.unwrap(), second.address().await.unwrap());
        assert_ne!(first.address().await.unwrap(), salted.address().await.unwrap());
    }

    #[tokio::test]
    async fn signatures() {
        let owner: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        let account = account(EntryPoint::v07()).salt(U256::zero());
        let op = UserOperation::empty(&EntryPoint::v07(), Address::repeat_byte(9));

        let signature = account.sign_user_operation(&op).await.unwrap();
        assert_eq!(signature, account.sign_user_operation(&op).await.unwrap());
        let hash = account.hash_user_operation(&op).unwrap();
        let parsed = keel_primitives::signer::parse_signature(&signature).unwrap();
        assert_eq!(recover(eip191_hash(hash.as_bytes()), &parsed).unwrap(), owner);

        let other = account.sign_user_operation(&op.with_nonce(U256::one())).await.unwrap();
        assert_ne!(signature, other);

        let v08 = self::account(EntryPoint::v08());
        let op = UserOperation::empty(&EntryPoint::v08(), Address::repeat_byte(9));
        let signature = v08.sign_user_operation(&op).await.unwrap();
        let parsed = keel_primitives::signer::parse_signature(&signature).unwrap();
        assert_eq!(recover(v08.hash_user_operation(&op).unwrap().into(), &parsed).unwrap(), owner);
    }
}
