use crate::domain::ports::{Storefront, TransactionFeed, TransactionFeedBox};
use crate::domain::transaction::StoreUpdate;
use crate::error::{PlatformError, ReconcileError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, mpsc};

/// A feed backed by a bounded tokio channel.
///
/// The feed closes once every sender has been dropped.
pub struct ChannelFeed {
    receiver: mpsc::Receiver<StoreUpdate>,
}

impl ChannelFeed {
    /// Creates a feed and the sender that pushes into it.
    pub fn new(capacity: usize) -> (Self, mpsc::Sender<StoreUpdate>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { receiver }, sender)
    }
}

#[async_trait]
impl TransactionFeed for ChannelFeed {
    async fn next(&mut self) -> Option<StoreUpdate> {
        self.receiver.recv().await
    }
}

/// An in-process storefront used for replay and testing.
///
/// Hands out a single channel-backed feed and records which transactions the
/// engine asked it to finish. Finishing can be made to fail per transaction id.
#[derive(Clone)]
pub struct InMemoryStorefront {
    feed: Arc<Mutex<Option<ChannelFeed>>>,
    finished: Arc<RwLock<Vec<String>>>,
    rejected: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryStorefront {
    /// Creates a storefront and the sender that publishes store updates to it.
    pub fn new(capacity: usize) -> (Self, mpsc::Sender<StoreUpdate>) {
        let (feed, sender) = ChannelFeed::new(capacity);
        let storefront = Self {
            feed: Arc::new(Mutex::new(Some(feed))),
            finished: Arc::default(),
            rejected: Arc::default(),
        };
        (storefront, sender)
    }

    /// Makes every finish request for `transaction_id` fail until allowed again.
    pub async fn reject_finish(&self, transaction_id: impl Into<String>) {
        self.rejected.write().await.insert(transaction_id.into());
    }

    pub async fn allow_finish(&self, transaction_id: &str) {
        self.rejected.write().await.remove(transaction_id);
    }

    /// Ids finished on the platform, in call order.
    pub async fn finished(&self) -> Vec<String> {
        self.finished.read().await.clone()
    }
}

#[async_trait]
impl Storefront for InMemoryStorefront {
    async fn transaction_updates(&self) -> Result<TransactionFeedBox> {
        let feed = self.feed.lock().await.take().ok_or_else(|| {
            ReconcileError::FeedUnavailable("in-memory feed was already taken".to_string())
        })?;
        Ok(Box::new(feed))
    }

    async fn finish_on_platform(&self, transaction_id: &str) -> std::result::Result<(), PlatformError> {
        if self.rejected.read().await.contains(transaction_id) {
            return Err(PlatformError::Rejected(format!(
                "finish refused for {transaction_id}"
            )));
        }
        self.finished.write().await.push(transaction_id.to_owned());
        Ok(())
    }
}
