//! Entry point reads: nonces and counterfactual sender addresses

use crate::{
    client::{PublicClient, RpcError},
    error::{AccountError, AccountResult},
};
use ethers::{
    abi::{ParamType, Token},
    types::{Address, Bytes, U256},
};
use keel_primitives::{codec::abi, EntryPoint};
use tracing::debug;

/// `SenderAddressResult(address)` selector
pub const SENDER_ADDRESS_RESULT: [u8; 4] = [0x6c, 0xa7, 0xb8, 0x06];

/// `Error(string)` selector
const ERROR_STRING: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Reads `EntryPoint.getNonce(sender, key)`
pub async fn get_nonce(
    client: &dyn PublicClient,
    entry_point: &EntryPoint,
    sender: Address,
    key: U256,
) -> AccountResult<U256> {
    let data = abi::encode_function_call(
        "getNonce(address,uint192)",
        &[Token::Address(sender), Token::Uint(key)],
    );
    let result = client.call(entry_point.address, data, None).await?;
    Ok(abi::decode_uint(&result)?)
}

/// Resolves the counterfactual sender address of `init_code` with `EntryPoint.getSenderAddress`
///
/// The entry point always reverts with `SenderAddressResult(address)`. Depending on the node the
/// revert data comes back wrapped in the error object, bare in its data field, or as the call
/// result; each is tried before failing.
pub async fn get_sender_address(
    client: &dyn PublicClient,
    entry_point: &EntryPoint,
    init_code: Bytes,
) -> AccountResult<Address> {
    let data = abi::encode_function_call("getSenderAddress(bytes)", &[Token::Bytes(init_code.to_vec())]);
    let revert_data = match client.call(entry_point.address, data, None).await {
        Ok(result) => result,
        Err(err) => match err.revert_data() {
            Some(data) => data,
            None => return Err(sender_address_error(&err)),
        },
    };

    if let Some(sender) = decode_sender_address_result(&revert_data) {
        debug!("Resolved sender address {sender:?} from entry point {:?}", entry_point.address);
        return Ok(sender);
    }

    Err(AccountError::SenderAddress {
        inner: decode_revert_string(&revert_data)
            .unwrap_or_else(|| format!("unexpected revert data {revert_data}")),
    })
}

fn sender_address_error(err: &RpcError) -> AccountError {
    AccountError::SenderAddress { inner: err.to_string() }
}

/// Decodes `SenderAddressResult(address)` revert data
pub fn decode_sender_address_result(data: &[u8]) -> Option<Address> {
    if data.len() < 36 || data[..4] != SENDER_ADDRESS_RESULT {
        return None;
    }
    abi::decode_address(&data[4..36]).ok()
}

/// Decodes an `Error(string)` revert reason
pub fn decode_revert_string(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != ERROR_STRING {
        return None;
    }
    match abi::decode(&[ParamType::String], &data[4..]).ok()?.pop()? {
        Token::String(reason) => Some(reason),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ethers::types::spoof;
    use keel_primitives::UserOperationFees;
    use serde_json::json;

    fn sender() -> Address {
        "0x9406Cc6185a346906296840746125a0E44976454".parse().unwrap()
    }

    fn sender_result() -> Bytes {
        [&SENDER_ADDRESS_RESULT[..], &abi::encode_address(sender())[..]].concat().into()
    }

    /// Answers every call with the same outcome
    struct Fixed(Result<Bytes, RpcError>);

    #[async_trait]
    impl PublicClient for Fixed {
        async fn chain_id(&self) -> Result<u64, RpcError> {
            Ok(1)
        }

        async fn call(
            &self,
            _to: Address,
            _data: Bytes,
            _state_override: Option<spoof::State>,
        ) -> Result<Bytes, RpcError> {
            self.0.clone()
        }

        async fn get_code(&self, _address: Address) -> Result<Bytes, RpcError> {
            Ok(Bytes::default())
        }

        async fn get_transaction_count(&self, _address: Address) -> Result<u64, RpcError> {
            Ok(0)
        }

        async fn estimate_fees(&self) -> Result<UserOperationFees, RpcError> {
            Ok(UserOperationFees::default())
        }
    }

    #[tokio::test]
    async fn sender_address_from_unwrapped_revert() {
        let client = Fixed(Err(RpcError::new(3, "execution reverted")
            .with_data(json!(sender_result().to_string()))));
        let address = get_sender_address(&client, &EntryPoint::v06(), Bytes::default()).await.unwrap();
        assert_eq!(address, sender());
    }

    #[tokio::test]
    async fn sender_address_from_wrapped_revert() {
        let client = Fixed(Err(RpcError::new(-32000, "execution reverted").with_data(json!({
            "message": "execution reverted",
            "data": sender_result().to_string(),
        }))));
        let address = get_sender_address(&client, &EntryPoint::v07(), Bytes::default()).await.unwrap();
        assert_eq!(address, sender());
    }

    #[tokio::test]
    async fn sender_address_from_call_result() {
        let client = Fixed(Ok(sender_result()));
        assert_eq!(get_sender_address(&client, &EntryPoint::v07(), Bytes::default()).await.unwrap(), sender());
    }

    #[tokio::test]
    async fn sender_address_errors_last() {
        let reason = abi::encode_function_call(
            "Error(string)",
            &[Token::String("AA13 initCode failed or OOG".into())],
        );
        let client = Fixed(Err(RpcError::new(3, "execution reverted").with_data(json!(reason.to_string()))));
        let err = get_sender_address(&client, &EntryPoint::v07(), Bytes::default()).await.unwrap_err();
        assert_eq!(err, AccountError::SenderAddress { inner: "AA13 initCode failed or OOG".into() });

        let client = Fixed(Err(RpcError::new(-32000, "header not found")));
        let err = get_sender_address(&client, &EntryPoint::v07(), Bytes::default()).await.unwrap_err();
        assert!(err.to_string().contains("header not found"));
    }

    #[tokio::test]
    async fn nonce() {
        let client = Fixed(Ok(abi::encode_uint(U256::from(7), 256).into()));
        let nonce = get_nonce(&client, &EntryPoint::v07(), sender(), U256::zero()).await.unwrap();
        assert_eq!(nonce, U256::from(7));
    }
}
