use async_trait::async_trait;
use ethers::types::{spoof, Address, Bytes};
use keel_accounts::{entry_point::SENDER_ADDRESS_RESULT, PublicClient, RpcError};
use keel_primitives::{codec::abi, crypto::keccak, unpack_init_code, UserOperationFees};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;

// Anvil default key
pub const OWNER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const OWNER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

/// Node double: `getSenderAddress` reverts with an address derived from the init code, code and
/// transaction counts come from in-memory maps, every call is recorded
#[derive(Debug, Default)]
pub struct MockPublicClient {
    pub calls: Mutex<Vec<(Address, Bytes)>>,
    pub code: Mutex<HashMap<Address, Bytes>>,
    pub transaction_count: u64,
}

impl MockPublicClient {
    /// Address the mock reports for an init code
    pub fn sender_for(init_code: &[u8]) -> Address {
        Address::from_slice(&keccak(init_code).as_bytes()[12..])
    }

    pub fn deploy(&self, address: Address, code: Bytes) {
        self.code.lock().insert(address, code);
    }
}

#[async_trait]
impl PublicClient for MockPublicClient {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        Ok(1)
    }

    async fn call(
        &self,
        to: Address,
        data: Bytes,
        _state_override: Option<spoof::State>,
    ) -> Result<Bytes, RpcError> {
        self.calls.lock().push((to, data.clone()));
        if data[..4] == abi::selector("getSenderAddress(bytes)") {
            let init_code = abi::decode_bytes(&data[4..]).map_err(|err| RpcError::internal(err.to_string()))?;
            if unpack_init_code(&init_code).is_none() {
                return Err(RpcError::new(3, "execution reverted: AA13 initCode failed or OOG"));
            }
            let revert: Bytes = [&SENDER_ADDRESS_RESULT[..], &abi::encode_address(Self::sender_for(&init_code))[..]]
                .concat()
                .into();
            return Err(RpcError::new(3, "execution reverted").with_data(json!(revert.to_string())));
        }
        if data[..4] == abi::selector("getNonce(address,uint192)") {
            return Ok(abi::encode_uint(3.into(), 256).into());
        }
        Ok(Bytes::default())
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, RpcError> {
        Ok(self.code.lock().get(&address).cloned().unwrap_or_default())
    }

    async fn get_transaction_count(&self, _address: Address) -> Result<u64, RpcError> {
        Ok(self.transaction_count)
    }

    async fn estimate_fees(&self) -> Result<UserOperationFees, RpcError> {
        Ok(UserOperationFees { max_fee_per_gas: 2_000_000_000u64.into(), max_priority_fee_per_gas: 1_000_000_000u64.into() })
    }
}
