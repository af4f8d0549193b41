//! Paying gas with an ERC-20 token through a token paymaster
//!
//! The sender approves the paymaster for the maximum token cost of the operation. Estimation runs
//! against the worst case (an unlimited approval and token balance), the approval finally sent is
//! sized to exactly the quoted cost and only injected when the current allowance falls short.

use ethers::{
    abi::Token,
    types::{spoof, Address, Bytes, H256, U256},
};
use keel_primitives::{
    codec::abi, constants::paymaster::EXCHANGE_RATE_DECIMALS, crypto::keccak, Call, TokenQuote,
    UserOperation,
};

pub const APPROVE: &str = "approve(address,uint256)";

/// `((totalGas * maxFee) + postOpGas * maxFee) * exchangeRate / 10^18`, truncating
pub fn max_cost_in_token(user_operation: &UserOperation, quote: &TokenQuote) -> U256 {
    let max_fee_per_gas = user_operation.fees().max_fee_per_gas;
    let native = user_operation.total_gas_limit() * max_fee_per_gas +
        quote.post_op_gas * max_fee_per_gas;
    native * quote.exchange_rate / U256::exp10(EXCHANGE_RATE_DECIMALS)
}

pub fn encode_approve(spender: Address, amount: U256) -> Bytes {
    abi::encode_function_call(APPROVE, &[Token::Address(spender), Token::Uint(amount)])
}

/// `approve(spender, amount)` on `token`, preceded by a reset to zero when the token requires it
pub fn approval_calls(token: Address, spender: Address, amount: U256, zero_reset: bool) -> Vec<Call> {
    let mut calls = Vec::with_capacity(2);
    if zero_reset {
        calls.push(Call::new(token).data(encode_approve(spender, U256::zero())));
    }
    calls.push(Call::new(token).data(encode_approve(spender, amount)));
    calls
}

/// Calls executed when the paymaster is approved for the largest possible amount
pub fn worst_case_calls(quote: &TokenQuote, zero_reset: bool, calls: &[Call]) -> Vec<Call> {
    let mut approvals = approval_calls(quote.token, quote.paymaster, U256::MAX, zero_reset);
    approvals.extend_from_slice(calls);
    approvals
}

/// Calls executed for a `cost`, unchanged when `allowance` already covers it
pub fn calls_with_approval(
    quote: &TokenQuote,
    zero_reset: bool,
    allowance: U256,
    cost: U256,
    calls: &[Call],
) -> Vec<Call> {
    if allowance >= cost {
        return calls.to_vec();
    }
    let mut approvals = approval_calls(quote.token, quote.paymaster, cost, zero_reset);
    approvals.extend_from_slice(calls);
    approvals
}

/// Storage slot of `balances[owner]` for a mapping at `slot`
pub fn balance_storage_slot(owner: Address, slot: U256) -> H256 {
    keccak(abi::encode(&[Token::Address(owner), Token::Uint(slot)]))
}

/// Storage slot of `allowances[owner][spender]` for a mapping at `slot`
pub fn allowance_storage_slot(owner: Address, spender: Address, slot: U256) -> H256 {
    let inner = balance_storage_slot(owner, slot);
    keccak(abi::encode(&[Token::Address(spender), Token::FixedBytes(inner.as_bytes().to_vec())]))
}

/// Gives `owner` an unlimited token balance and paymaster allowance, for the slots the quote knows
pub fn add_token_override(state: &mut spoof::State, quote: &TokenQuote, owner: Address) {
    let max = H256::repeat_byte(0xff);
    if let Some(slot) = quote.balance_slot {
        state.account(quote.token).store(balance_storage_slot(owner, slot), max);
    }
    if let Some(slot) = quote.allowance_slot {
        state.account(quote.token).store(allowance_storage_slot(owner, quote.paymaster, slot), max);
    }
}
