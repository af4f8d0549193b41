//! User operation pipeline of a smart account
//!
//! Preparation resolves the sender, its deployment data and nonce, requests paymaster stub data,
//! estimates gas and finalizes the paymaster data. The prepared operation is then signed, sent to
//! the bundler and its receipt polled until it lands, fails or the timeout elapses.

use crate::{
    bundler::{BundlerClient, UserOperationStatus},
    config::ClientConfig,
    erc20,
    error::{ClientError, ClientResult},
    paymaster::{find_quote, merge_paymaster_data, merge_stub_data, PaymasterClient},
    request::{
        FeeOverrides, GasOverrides, PreparedUserOperation, SignedUserOperation,
        UserOperationRequest,
    },
};
use ethers::types::{spoof, Address, Bytes};
use keel_accounts::{
    account::ecdsa_stub_signature, entry_point::get_nonce, AccountError, SmartAccountApi,
};
use keel_primitives::{
    signer::parse_signature, Call, Eip7702Authorization, PaymasterContext, RpcAuthorization,
    SignedAuthorization, TokenQuote, UserOperation, UserOperationFees, UserOperationHash,
    UserOperationReceipt,
};
use std::{sync::Arc, time::Duration};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, trace};

/// How waiting for a user operation ended
#[derive(Clone, Debug)]
pub enum WaitOutcome {
    /// Included and executed successfully
    Included(UserOperationReceipt),
    /// Included but the execution reverted
    Reverted(UserOperationReceipt),
    /// Dropped by the bundler before inclusion
    Rejected { hash: UserOperationHash, status: UserOperationStatus },
    /// No receipt within the timeout, the operation may still land
    Unresolved(UserOperationHash),
}

impl WaitOutcome {
    pub fn receipt(&self) -> Option<&UserOperationReceipt> {
        match self {
            Self::Included(receipt) | Self::Reverted(receipt) => Some(receipt),
            _ => None,
        }
    }
}

/// Sender state resolved at the start of a preparation
struct Sender {
    address: Address,
    deployed: bool,
}

/// Paymaster state carried through a preparation
struct Sponsorship<'a> {
    paymaster: &'a dyn PaymasterClient,
    context: PaymasterContext,
}

pub struct SmartAccountClient<A> {
    account: A,
    bundler: Arc<dyn BundlerClient>,
    paymaster: Option<Arc<dyn PaymasterClient>>,
    paymaster_context: PaymasterContext,
    config: ClientConfig,
}

impl<A: SmartAccountApi> SmartAccountClient<A> {
    pub fn new(account: A, bundler: Arc<dyn BundlerClient>) -> Self {
        Self {
            account,
            bundler,
            paymaster: None,
            paymaster_context: PaymasterContext::default(),
            config: ClientConfig::default(),
        }
    }

    /// Sponsors every user operation with `paymaster`, `context` is the default request context
    pub fn paymaster(mut self, paymaster: Arc<dyn PaymasterClient>, context: PaymasterContext) -> Self {
        self.paymaster = Some(paymaster);
        self.paymaster_context = context;
        self
    }

    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn account(&self) -> &A {
        &self.account
    }

    /// Builds an unsigned user operation with gas limits, fees and paymaster data filled in
    pub async fn prepare_user_operation(
        &self,
        request: UserOperationRequest,
    ) -> ClientResult<PreparedUserOperation> {
        if request.call_data.is_none() && request.calls.is_empty() {
            return Err(AccountError::EmptyBatch.into());
        }
        let entry_point = self.account.entry_point();
        let sender = Sender {
            address: self.account.address().await?,
            deployed: self.account.is_deployed().await?,
        };
        debug!(
            "Preparing user operation of {} account {:?} (deployed: {})",
            self.account.name(),
            sender.address,
            sender.deployed
        );

        let (factory, authorization) = if sender.deployed {
            (None, None)
        } else {
            (self.account.factory_args().await?, self.account.eip7702_authorization().await?)
        };
        let nonce = match request.nonce {
            Some(nonce) => nonce,
            None => {
                let key = request.nonce_key.unwrap_or_else(|| self.account.nonce_key());
                get_nonce(self.account.core().public_client()?, entry_point, sender.address, key)
                    .await?
            }
        };
        let fees = self.fees(&request.fees).await?;

        let user_operation = UserOperation::empty(entry_point, sender.address)
            .with_nonce(nonce)
            .with_factory(factory)
            .with_fees(fees)
            .with_signature(self.account.stub_signature());
        let stub_authorization = authorization.map(stub_authorization).transpose()?;

        let context = request.paymaster_context.clone().unwrap_or_else(|| self.paymaster_context.clone());
        let sponsorship = self
            .paymaster
            .as_deref()
            .map(|paymaster| Sponsorship { paymaster, context: context.clone() });

        // raw call data is sent as is, without an injected token approval
        let user_operation = match (context.token, &request.call_data) {
            (Some(token), None) => {
                let sponsorship = sponsorship.ok_or(ClientError::PaymasterNotConfigured)?;
                self.prepare_token_payment(
                    user_operation,
                    &sender,
                    &request,
                    token,
                    &sponsorship,
                    stub_authorization.as_ref(),
                )
                .await?
            }
            _ => {
                let call_data = match &request.call_data {
                    Some(call_data) => call_data.clone(),
                    None => self.encode_calls(&sender, &request.calls)?,
                };
                let (user_operation, is_final) = self
                    .sponsor_and_estimate(
                        user_operation.with_call_data(call_data),
                        sponsorship.as_ref(),
                        &request.gas,
                        stub_authorization.as_ref(),
                        request.state_override.as_ref(),
                    )
                    .await?;
                match sponsorship {
                    Some(sponsorship) if !is_final => {
                        self.finalize_paymaster_data(user_operation, &sponsorship).await?
                    }
                    _ => user_operation,
                }
            }
        };

        Ok(PreparedUserOperation { user_operation, authorization })
    }

    /// Signs the user operation and the pending EIP-7702 authorization
    pub async fn sign_user_operation(
        &self,
        prepared: PreparedUserOperation,
    ) -> ClientResult<SignedUserOperation> {
        let signature = self.account.sign_user_operation(&prepared.user_operation).await?;
        let authorization = match prepared.authorization {
            Some(authorization) => Some(self.account.sign_authorization(authorization).await?),
            None => None,
        };
        Ok(SignedUserOperation {
            user_operation: prepared.user_operation.with_signature(signature),
            authorization,
        })
    }

    pub async fn send_signed_user_operation(
        &self,
        signed: &SignedUserOperation,
    ) -> ClientResult<UserOperationHash> {
        let authorization = signed.authorization.as_ref().map(SignedAuthorization::to_rpc);
        let hash = self
            .bundler
            .send_user_operation(
                &signed.user_operation,
                self.account.entry_point().address,
                authorization.as_ref(),
            )
            .await?;
        info!("Sent user operation {hash} of {:?}", signed.user_operation.sender());
        Ok(hash)
    }

    /// Prepares, signs and sends a user operation
    pub async fn send_user_operation(
        &self,
        request: UserOperationRequest,
    ) -> ClientResult<UserOperationHash> {
        let prepared = self.prepare_user_operation(request).await?;
        let signed = self.sign_user_operation(prepared).await?;
        self.send_signed_user_operation(&signed).await
    }

    /// Polls the bundler for the receipt at the configured interval
    ///
    /// Gives up with [WaitOutcome::Unresolved] after `timeout` (the configured receipt timeout when
    /// `None`).
    pub async fn wait_for_user_operation_receipt(
        &self,
        hash: UserOperationHash,
        timeout: Option<Duration>,
    ) -> ClientResult<WaitOutcome> {
        let deadline = Instant::now() + timeout.unwrap_or_else(|| self.config.receipt_timeout());
        loop {
            if let Some(receipt) = self.bundler.get_user_operation_receipt(hash).await? {
                info!("User operation {hash} included (success: {})", receipt.success);
                return Ok(if receipt.success {
                    WaitOutcome::Included(receipt)
                } else {
                    WaitOutcome::Reverted(receipt)
                });
            }

            let status = self.bundler.get_user_operation_status(hash).await?;
            if status.is_failure() {
                info!("User operation {hash} dropped with status {status:?}");
                return Ok(WaitOutcome::Rejected { hash, status });
            }

            if Instant::now() >= deadline {
                debug!("No receipt for user operation {hash} before the timeout");
                return Ok(WaitOutcome::Unresolved(hash));
            }
            trace!("Waiting for user operation {hash} (status: {status:?})");
            sleep(self.config.polling_interval()).await;
        }
    }

    pub async fn send_and_wait(
        &self,
        request: UserOperationRequest,
        timeout: Option<Duration>,
    ) -> ClientResult<WaitOutcome> {
        let hash = self.send_user_operation(request).await?;
        self.wait_for_user_operation_receipt(hash, timeout).await
    }

    /// Request fees, then the bundler gas price, then the public client estimate
    async fn fees(&self, overrides: &FeeOverrides) -> ClientResult<UserOperationFees> {
        if let Some(fees) = overrides.complete() {
            return Ok(fees);
        }
        let fees = match self.bundler.get_user_operation_gas_price().await? {
            Some(fees) => fees,
            None => self.account.core().public_client()?.estimate_fees().await?,
        };
        Ok(overrides.apply(fees))
    }

    /// The first operation of an undeployed account may need a dedicated setup call
    fn encode_calls(&self, sender: &Sender, calls: &[Call]) -> ClientResult<Bytes> {
        Ok(if sender.deployed {
            self.account.encode_calls(calls)?
        } else {
            self.account.encode_deployment_calls(calls)?
        })
    }

    /// Merges paymaster stub data and the gas estimate, returns whether the stub data are final
    async fn sponsor_and_estimate(
        &self,
        user_operation: UserOperation,
        sponsorship: Option<&Sponsorship<'_>>,
        gas: &GasOverrides,
        authorization: Option<&RpcAuthorization>,
        state_override: Option<&spoof::State>,
    ) -> ClientResult<(UserOperation, bool)> {
        let entry_point = self.account.entry_point().address;
        let (user_operation, is_final) = match sponsorship {
            Some(sponsorship) => {
                let stub = sponsorship
                    .paymaster
                    .get_paymaster_stub_data(
                        &user_operation,
                        entry_point,
                        self.account.chain_id(),
                        &sponsorship.context,
                    )
                    .await?;
                (merge_stub_data(&user_operation, &stub), stub.is_final)
            }
            None => (user_operation, true),
        };

        let estimate = match gas.complete() {
            Some(estimate) => estimate,
            None => {
                let estimate = self
                    .bundler
                    .estimate_user_operation_gas(
                        &user_operation,
                        entry_point,
                        authorization,
                        state_override,
                    )
                    .await?;
                debug!("Gas estimate of {:?}: {estimate:?}", user_operation.sender());
                gas.apply(estimate)
            }
        };
        Ok((user_operation.with_gas_estimate(&estimate), is_final))
    }

    async fn finalize_paymaster_data(
        &self,
        user_operation: UserOperation,
        sponsorship: &Sponsorship<'_>,
    ) -> ClientResult<UserOperation> {
        let data = sponsorship
            .paymaster
            .get_paymaster_data(
                &user_operation,
                self.account.entry_point().address,
                self.account.chain_id(),
                &sponsorship.context,
            )
            .await?;
        debug!("Final paymaster data from {:?}", data.paymaster);
        Ok(merge_paymaster_data(&user_operation, &data))
    }

    /// Estimates against an unlimited approval, then approves the paymaster for the quoted cost
    /// when the current allowance falls short
    async fn prepare_token_payment(
        &self,
        user_operation: UserOperation,
        sender: &Sender,
        request: &UserOperationRequest,
        token: Address,
        sponsorship: &Sponsorship<'_>,
        authorization: Option<&RpcAuthorization>,
    ) -> ClientResult<UserOperation> {
        let chain_id = self.account.chain_id();
        let quote = self.token_quote(sponsorship.paymaster, token).await?;
        let zero_reset = self.config.requires_zero_reset(chain_id, token);

        let worst_case = erc20::worst_case_calls(&quote, zero_reset, &request.calls);
        let mut state = request.state_override.clone().unwrap_or_default();
        erc20::add_token_override(&mut state, &quote, sender.address);
        let (user_operation, _) = self
            .sponsor_and_estimate(
                user_operation.with_call_data(self.encode_calls(sender, &worst_case)?),
                Some(sponsorship),
                &request.gas,
                authorization,
                Some(&state),
            )
            .await?;

        let cost = erc20::max_cost_in_token(&user_operation, &quote);
        let allowance = self
            .account
            .core()
            .public_client()?
            .token_allowance(token, sender.address, quote.paymaster)
            .await?;
        debug!("Token cost {cost} for {token:?} (allowance: {allowance})");
        let calls = erc20::calls_with_approval(&quote, zero_reset, allowance, cost, &request.calls);
        let user_operation = user_operation.with_call_data(self.encode_calls(sender, &calls)?);

        self.finalize_paymaster_data(user_operation, sponsorship).await
    }

    async fn token_quote(&self, paymaster: &dyn PaymasterClient, token: Address) -> ClientResult<TokenQuote> {
        let quotes = paymaster
            .get_token_quotes(&[token], self.account.entry_point().address, self.account.chain_id())
            .await?;
        find_quote(quotes, token).ok_or(ClientError::TokenQuoteNotFound { token })
    }
}

/// Authorization with a stub signature, good enough for gas estimation
fn stub_authorization(authorization: Eip7702Authorization) -> ClientResult<RpcAuthorization> {
    let signature = parse_signature(&ecdsa_stub_signature())?;
    Ok(SignedAuthorization { authorization, signature }.to_rpc())
}
