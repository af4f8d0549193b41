//! Set-once account address

use crate::error::AccountResult;
use ethers::types::Address;
use std::future::Future;
use tokio::sync::OnceCell;

/// Address of an account, resolved at most once
///
/// Concurrent resolutions wait on the first one; a failed resolution leaves the cell empty.
#[derive(Debug, Default)]
pub struct AddressCell(OnceCell<Address>);

impl AddressCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cell holding a precomputed address
    pub fn with_address(address: Address) -> Self {
        Self(OnceCell::new_with(Some(address)))
    }

    pub fn get(&self) -> Option<Address> {
        self.0.get().copied()
    }

    pub async fn get_or_resolve<F, Fut>(&self, resolve: F) -> AccountResult<Address>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AccountResult<Address>>,
    {
        self.0.get_or_try_init(resolve).await.copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AccountError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn resolves_once() {
        let cell = AddressCell::new();
        let calls = AtomicUsize::new(0);
        let address = Address::repeat_byte(0x11);
        for _ in 0..3 {
            let resolved = cell
                .get_or_resolve(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(address)
                })
                .await
                .unwrap();
            assert_eq!(resolved, address);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_leaves_cell_empty() {
        let cell = AddressCell::new();
        let err = cell
            .get_or_resolve(|| async { Err(AccountError::AddressResolution { missing: "public client" }) })
            .await;
        assert!(err.is_err());
        assert_eq!(cell.get(), None);

        let precomputed = AddressCell::with_address(Address::repeat_byte(0x22));
        let resolved = precomputed
            .get_or_resolve(|| async { Err(AccountError::EmptyBatch) })
            .await
            .unwrap();
        assert_eq!(resolved, Address::repeat_byte(0x22));
    }
}
