use demos_simple_account::{init_tracing, simple_account_client};
use ethers::types::Address;
use keel_client::{UserOperationRequest, WaitOutcome};
use keel_primitives::{Call, PaymasterContext};
use std::env;

/// Sends a user operation sponsored by the bundler's paymaster, paying with `TOKEN` when set
#[tokio::main]
async fn main() -> eyre::Result<()> {
    init_tracing();
    let demo = simple_account_client().await?;

    let context = match env::var("TOKEN") {
        Ok(token) => PaymasterContext::token(token.parse::<Address>()?),
        Err(_) => PaymasterContext::default(),
    };
    let client = demo.client.paymaster(demo.bundler.clone(), context);

    let prepared =
        client.prepare_user_operation(UserOperationRequest::calls(vec![Call::new(Address::zero())])).await?;
    println!("Paymaster: {:?}", prepared.user_operation.paymaster());

    let signed = client.sign_user_operation(prepared).await?;
    let hash = client.send_signed_user_operation(&signed).await?;
    match client.wait_for_user_operation_receipt(hash, None).await? {
        WaitOutcome::Included(receipt) | WaitOutcome::Reverted(receipt) => {
            println!("User operation {hash} success: {}", receipt.success)
        }
        outcome => println!("User operation {hash}: {outcome:?}"),
    }
    Ok(())
}
