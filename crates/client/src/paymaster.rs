//! Paymaster (ERC-7677) interface

use async_trait::async_trait;
use ethers::types::Address;
use keel_accounts::RpcError;
use keel_primitives::{
    PaymasterContext, PaymasterData, PaymasterStubData, TokenQuote, UserOperation,
};
use tracing::debug;

/// Paymaster sponsoring user operations
#[async_trait]
pub trait PaymasterClient: Send + Sync {
    /// `pm_getPaymasterStubData`, data good enough for gas estimation
    async fn get_paymaster_stub_data(
        &self,
        user_operation: &UserOperation,
        entry_point: Address,
        chain_id: u64,
        context: &PaymasterContext,
    ) -> Result<PaymasterStubData, RpcError>;

    /// `pm_getPaymasterData`, data the paymaster signs off on
    async fn get_paymaster_data(
        &self,
        user_operation: &UserOperation,
        entry_point: Address,
        chain_id: u64,
        context: &PaymasterContext,
    ) -> Result<PaymasterData, RpcError>;

    /// ERC-20 quotes for the tokens the paymaster accepts
    async fn get_token_quotes(
        &self,
        _tokens: &[Address],
        _entry_point: Address,
        _chain_id: u64,
    ) -> Result<Vec<TokenQuote>, RpcError> {
        Ok(Vec::new())
    }
}

/// Merges stub data, the stub gas limits stay in place until estimation overrides them
pub fn merge_stub_data(user_operation: &UserOperation, stub: &PaymasterStubData) -> UserOperation {
    debug!(
        "Paymaster stub data from {:?} (final: {}, sponsor: {:?})",
        stub.data.paymaster,
        stub.is_final,
        stub.sponsor.as_ref().map(|sponsor| sponsor.name.as_str())
    );
    user_operation.with_paymaster_data(&stub.data)
}

/// Merges the final paymaster data, gas limits absent from the response are kept
pub fn merge_paymaster_data(user_operation: &UserOperation, data: &PaymasterData) -> UserOperation {
    user_operation.with_paymaster_data(data)
}

/// Quote of `token` among the paymaster quotes
pub fn find_quote(quotes: Vec<TokenQuote>, token: Address) -> Option<TokenQuote> {
    quotes.into_iter().find(|quote| quote.token == token)
}
