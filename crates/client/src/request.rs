//! User operation requests and prepared operations

use ethers::types::{spoof, Bytes, U256};
use keel_primitives::{
    Call, Eip7702Authorization, GasEstimate, PaymasterContext, SignedAuthorization,
    UserOperation, UserOperationFees,
};

/// Fee fields fixed by the caller
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeeOverrides {
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}

impl FeeOverrides {
    /// Fees when both fields are fixed
    pub fn complete(&self) -> Option<UserOperationFees> {
        Some(UserOperationFees {
            max_fee_per_gas: self.max_fee_per_gas?,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas?,
        })
    }

    pub fn apply(&self, fees: UserOperationFees) -> UserOperationFees {
        UserOperationFees {
            max_fee_per_gas: self.max_fee_per_gas.unwrap_or(fees.max_fee_per_gas),
            max_priority_fee_per_gas: self
                .max_priority_fee_per_gas
                .unwrap_or(fees.max_priority_fee_per_gas),
        }
    }
}

/// Gas limits fixed by the caller, they take precedence over the bundler estimate
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GasOverrides {
    pub call_gas_limit: Option<U256>,
    pub verification_gas_limit: Option<U256>,
    pub pre_verification_gas: Option<U256>,
    pub paymaster_verification_gas_limit: Option<U256>,
    pub paymaster_post_op_gas_limit: Option<U256>,
}

impl GasOverrides {
    /// Estimate made of the overrides alone when every account gas limit is fixed
    pub fn complete(&self) -> Option<GasEstimate> {
        Some(GasEstimate {
            pre_verification_gas: self.pre_verification_gas?,
            verification_gas_limit: self.verification_gas_limit?,
            call_gas_limit: self.call_gas_limit?,
            paymaster_verification_gas_limit: self.paymaster_verification_gas_limit,
            paymaster_post_op_gas_limit: self.paymaster_post_op_gas_limit,
        })
    }

    pub fn apply(&self, estimate: GasEstimate) -> GasEstimate {
        GasEstimate {
            pre_verification_gas: self.pre_verification_gas.unwrap_or(estimate.pre_verification_gas),
            verification_gas_limit: self
                .verification_gas_limit
                .unwrap_or(estimate.verification_gas_limit),
            call_gas_limit: self.call_gas_limit.unwrap_or(estimate.call_gas_limit),
            paymaster_verification_gas_limit: self
                .paymaster_verification_gas_limit
                .or(estimate.paymaster_verification_gas_limit),
            paymaster_post_op_gas_limit: self
                .paymaster_post_op_gas_limit
                .or(estimate.paymaster_post_op_gas_limit),
        }
    }
}

/// What the caller wants executed, every other field is filled by the client
#[derive(Clone, Debug, Default)]
pub struct UserOperationRequest {
    pub calls: Vec<Call>,
    /// Pre-encoded call data, `calls` are ignored when set
    ///
    /// Raw call data bypasses the ERC-20 gas payment flow: the token context still reaches the
    /// paymaster but no `approve` is injected, the call data must approve the paymaster itself.
    pub call_data: Option<Bytes>,
    pub nonce: Option<U256>,
    /// Nonce key, the account default when unset
    pub nonce_key: Option<U256>,
    pub fees: FeeOverrides,
    pub gas: GasOverrides,
    /// Context of the paymaster request, overrides the client default
    pub paymaster_context: Option<PaymasterContext>,
    pub state_override: Option<spoof::State>,
}

impl UserOperationRequest {
    pub fn calls(calls: Vec<Call>) -> Self {
        Self { calls, ..Default::default() }
    }

    /// Sends `call_data` as is, bypassing the ERC-20 approval injection
    pub fn call_data(mut self, call_data: Bytes) -> Self {
        self.call_data = Some(call_data);
        self
    }

    pub fn nonce(mut self, nonce: U256) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn nonce_key(mut self, key: U256) -> Self {
        self.nonce_key = Some(key);
        self
    }

    pub fn fees(mut self, fees: FeeOverrides) -> Self {
        self.fees = fees;
        self
    }

    pub fn gas(mut self, gas: GasOverrides) -> Self {
        self.gas = gas;
        self
    }

    pub fn paymaster_context(mut self, context: PaymasterContext) -> Self {
        self.paymaster_context = Some(context);
        self
    }

    pub fn state_override(mut self, state: spoof::State) -> Self {
        self.state_override = Some(state);
        self
    }
}

/// Unsigned user operation ready to be signed
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedUserOperation {
    pub user_operation: UserOperation,
    /// Authorization the EOA still has to sign (EIP-7702 accounts only)
    pub authorization: Option<Eip7702Authorization>,
}

/// User operation ready for submission
#[derive(Clone, Debug, PartialEq)]
pub struct SignedUserOperation {
    pub user_operation: UserOperation,
    pub authorization: Option<SignedAuthorization>,
}
