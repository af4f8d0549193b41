use async_trait::async_trait;
use ethers::types::{spoof, Address, Bytes, TransactionReceipt, U256};
use keel_accounts::{entry_point::SENDER_ADDRESS_RESULT, PublicClient, RpcError};
use keel_client::{BundlerClient, PaymasterClient, UserOperationStatus};
use keel_primitives::{
    codec::abi, crypto::keccak, unpack_init_code, GasEstimate, PaymasterContext, PaymasterData,
    PaymasterStubData, RpcAuthorization, TokenQuote, UserOperation, UserOperationFees,
    UserOperationHash, UserOperationReceipt,
};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use tracing_subscriber::EnvFilter;

// Anvil default key
pub const OWNER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const OWNER: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

pub const HASH: [u8; 32] = [0x42; 32];

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn paymaster() -> Address {
    Address::repeat_byte(0xaa)
}

pub fn token() -> Address {
    Address::repeat_byte(0x70)
}

pub fn public_fees() -> UserOperationFees {
    UserOperationFees {
        max_fee_per_gas: U256::from(2_000_000_000u64),
        max_priority_fee_per_gas: U256::from(1_000_000_000u64),
    }
}

/// Node double: `getSenderAddress` reverts with an address derived from the init code, `getNonce`
/// returns 3 and `allowance` the configured amount. Every request is recorded by method name.
#[derive(Debug, Default)]
pub struct MockPublicClient {
    pub code: Mutex<HashMap<Address, Bytes>>,
    pub requests: Mutex<Vec<&'static str>>,
    pub transaction_count: u64,
    pub allowance: U256,
}

impl MockPublicClient {
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
        self.requests.lock().push("eth_chainId");
        Ok(1)
    }

    async fn call(
        &self,
        _to: Address,
        data: Bytes,
        _state_override: Option<spoof::State>,
    ) -> Result<Bytes, RpcError> {
        self.requests.lock().push("eth_call");
        let selector: [u8; 4] = data[..4].try_into().map_err(|_| RpcError::internal("short call"))?;
        if selector == abi::selector("getSenderAddress(bytes)") {
            let init_code =
                abi::decode_bytes(&data[4..]).map_err(|err| RpcError::internal(err.to_string()))?;
            if unpack_init_code(&init_code).is_none() {
                return Err(RpcError::new(3, "execution reverted: AA13 initCode failed or OOG"));
            }
            let revert: Bytes = [
                &SENDER_ADDRESS_RESULT[..],
                &abi::encode_address(Self::sender_for(&init_code))[..],
            ]
            .concat()
            .into();
            return Err(RpcError::new(3, "execution reverted").with_data(json!(revert.to_string())));
        }
        if selector == abi::selector("getNonce(address,uint192)") {
            return Ok(abi::encode_uint(U256::from(3), 256).into());
        }
        if selector == abi::selector("allowance(address,address)") {
            return Ok(abi::encode_uint(self.allowance, 256).into());
        }
        Ok(Bytes::default())
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, RpcError> {
        self.requests.lock().push("eth_getCode");
        Ok(self.code.lock().get(&address).cloned().unwrap_or_default())
    }

    async fn get_transaction_count(&self, _address: Address) -> Result<u64, RpcError> {
        self.requests.lock().push("eth_getTransactionCount");
        Ok(self.transaction_count)
    }

    async fn estimate_fees(&self) -> Result<UserOperationFees, RpcError> {
        self.requests.lock().push("eth_feeHistory");
        Ok(public_fees())
    }
}

pub type EstimateRequest = (UserOperation, Option<RpcAuthorization>, Option<spoof::State>);

/// Bundler double recording estimations and submissions
#[derive(Default)]
pub struct MockBundler {
    pub estimates: Mutex<Vec<EstimateRequest>>,
    pub sent: Mutex<Vec<(UserOperation, Option<RpcAuthorization>)>>,
    pub estimate: GasEstimate,
    pub estimate_error: Option<RpcError>,
    pub gas_price: Option<UserOperationFees>,
    /// Receipt polls answered with `null` before the receipt shows up, never when `None`
    pub receipt_after: Option<u32>,
    pub receipt_success: bool,
    pub status: UserOperationStatus,
    pub receipt_polls: Mutex<u32>,
}

impl MockBundler {
    pub fn new() -> Self {
        Self {
            estimate: GasEstimate {
                pre_verification_gas: U256::from(50_000),
                verification_gas_limit: U256::from(200_000),
                call_gas_limit: U256::from(100_000),
                paymaster_verification_gas_limit: None,
                paymaster_post_op_gas_limit: None,
            },
            receipt_after: Some(0),
            receipt_success: true,
            ..Default::default()
        }
    }
}

pub fn receipt(hash: UserOperationHash, sender: Address, success: bool) -> UserOperationReceipt {
    UserOperationReceipt {
        user_operation_hash: hash,
        entry_point: None,
        sender,
        nonce: U256::zero(),
        paymaster: None,
        actual_gas_cost: U256::zero(),
        actual_gas_used: U256::zero(),
        success,
        reason: String::new(),
        logs: Vec::new(),
        tx_receipt: TransactionReceipt::default(),
    }
}

#[async_trait]
impl BundlerClient for MockBundler {
    async fn supported_entry_points(&self) -> Result<Vec<Address>, RpcError> {
        Ok(Vec::new())
    }

    async fn chain_id(&self) -> Result<u64, RpcError> {
        Ok(1)
    }

    async fn estimate_user_operation_gas(
        &self,
        user_operation: &UserOperation,
        _entry_point: Address,
        authorization: Option<&RpcAuthorization>,
        state_override: Option<&spoof::State>,
    ) -> Result<GasEstimate, RpcError> {
        self.estimates.lock().push((
            user_operation.clone(),
            authorization.cloned(),
            state_override.cloned(),
        ));
        match &self.estimate_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.estimate.clone()),
        }
    }

    async fn send_user_operation(
        &self,
        user_operation: &UserOperation,
        _entry_point: Address,
        authorization: Option<&RpcAuthorization>,
    ) -> Result<UserOperationHash, RpcError> {
        self.sent.lock().push((user_operation.clone(), authorization.cloned()));
        Ok(HASH.into())
    }

    async fn get_user_operation_receipt(
        &self,
        hash: UserOperationHash,
    ) -> Result<Option<UserOperationReceipt>, RpcError> {
        let mut polls = self.receipt_polls.lock();
        *polls += 1;
        match self.receipt_after {
            Some(after) if *polls > after => {
                let sender = self.sent.lock().last().map(|(op, _)| op.sender()).unwrap_or_default();
                Ok(Some(receipt(hash, sender, self.receipt_success)))
            }
            _ => Ok(None),
        }
    }

    async fn get_user_operation_status(
        &self,
        _hash: UserOperationHash,
    ) -> Result<UserOperationStatus, RpcError> {
        Ok(self.status)
    }

    async fn get_user_operation_gas_price(&self) -> Result<Option<UserOperationFees>, RpcError> {
        Ok(self.gas_price)
    }
}

/// Paymaster double sponsoring everything with fixed data
#[derive(Default)]
pub struct MockPaymaster {
    pub is_final: bool,
    pub quotes: Vec<TokenQuote>,
    pub stub_requests: Mutex<Vec<(UserOperation, PaymasterContext)>>,
    pub data_requests: Mutex<Vec<(UserOperation, PaymasterContext)>>,
}

impl MockPaymaster {
    pub fn stub_data() -> PaymasterData {
        PaymasterData {
            paymaster: Some(paymaster()),
            paymaster_data: Some(vec![0x01u8].into()),
            paymaster_verification_gas_limit: Some(U256::from(40_000)),
            paymaster_post_op_gas_limit: Some(U256::from(10_000)),
            paymaster_and_data: None,
        }
    }

    pub fn final_data() -> PaymasterData {
        PaymasterData {
            paymaster: Some(paymaster()),
            paymaster_data: Some(vec![0x02u8].into()),
            ..Default::default()
        }
    }

    pub fn quote() -> TokenQuote {
        TokenQuote {
            paymaster: paymaster(),
            token: token(),
            post_op_gas: U256::from(50_000),
            exchange_rate: U256::from(1_500_000),
            exchange_rate_native_to_usd: None,
            balance_slot: Some(U256::from(9)),
            allowance_slot: Some(U256::from(10)),
        }
    }
}

#[async_trait]
impl PaymasterClient for MockPaymaster {
    async fn get_paymaster_stub_data(
        &self,
        user_operation: &UserOperation,
        _entry_point: Address,
        _chain_id: u64,
        context: &PaymasterContext,
    ) -> Result<PaymasterStubData, RpcError> {
        self.stub_requests.lock().push((user_operation.clone(), context.clone()));
        Ok(PaymasterStubData { data: Self::stub_data(), is_final: self.is_final, sponsor: None })
    }

    async fn get_paymaster_data(
        &self,
        user_operation: &UserOperation,
        _entry_point: Address,
        _chain_id: u64,
        context: &PaymasterContext,
    ) -> Result<PaymasterData, RpcError> {
        self.data_requests.lock().push((user_operation.clone(), context.clone()));
        Ok(Self::final_data())
    }

    async fn get_token_quotes(
        &self,
        tokens: &[Address],
        _entry_point: Address,
        _chain_id: u64,
    ) -> Result<Vec<TokenQuote>, RpcError> {
        Ok(self.quotes.iter().filter(|quote| tokens.contains(&quote.token)).cloned().collect())
    }
}
