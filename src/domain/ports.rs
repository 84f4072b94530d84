use super::transaction::StoreUpdate;
use crate::error::{PlatformError, Result};
use async_trait::async_trait;

/// Push-style sequence of verified store updates.
#[async_trait]
pub trait TransactionFeed: Send {
    /// Waits for the next update. `None` means the feed is closed.
    async fn next(&mut self) -> Option<StoreUpdate>;
}

/// The storefront integration the engine sits on top of.
#[async_trait]
pub trait Storefront: Send + Sync {
    /// Opens the update stream for one connection.
    async fn transaction_updates(&self) -> Result<TransactionFeedBox>;

    /// Marks the transaction complete on the platform.
    async fn finish_on_platform(&self, transaction_id: &str) -> std::result::Result<(), PlatformError>;
}

pub type TransactionFeedBox = Box<dyn TransactionFeed>;
pub type StorefrontRef = std::sync::Arc<dyn Storefront>;
