use crate::application::engine::{EngineStats, FinishResult, ReconciliationEngine};
use crate::application::ingestion::{IngestionHandle, IngestionLoop, IngestionState};
use crate::domain::listener::{Listener, ListenerId, ListenerRegistry};
use crate::domain::ports::StorefrontRef;
use crate::domain::transaction::{PurchaseFailure, Transaction};
use crate::error::{ReconcileError, Result};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Outcome of finishing every pending transaction in one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinishSummary {
    pub finished: usize,
    pub not_pending: usize,
    /// Ids the platform refused to finish. They stay pending.
    pub failed: Vec<String>,
}

/// The application-facing entry point.
///
/// `StoreConnection` brackets one storefront connection: it owns the
/// reconciliation engine, the listener registry and the ingestion loop, and
/// forwards finish requests to the storefront.
pub struct StoreConnection {
    storefront: StorefrontRef,
    engine: Arc<ReconciliationEngine>,
    registry: Arc<ListenerRegistry>,
    ingestion: Mutex<Option<IngestionHandle>>,
}

impl StoreConnection {
    /// Creates a disconnected `StoreConnection`.
    ///
    /// # Arguments
    ///
    /// * `storefront` - The storefront that supplies updates and finishes transactions.
    pub fn new(storefront: StorefrontRef) -> Self {
        Self {
            storefront,
            engine: Arc::new(ReconciliationEngine::new()),
            registry: Arc::new(ListenerRegistry::new()),
            ingestion: Mutex::new(None),
        }
    }

    /// Initializes the engine and starts consuming the storefront feed.
    ///
    /// Calling it while already connected is a no-op.
    pub async fn init_connection(&self) -> Result<()> {
        let mut ingestion = self.ingestion.lock().await;
        if let Some(handle) = ingestion.as_ref()
            && handle.state() != IngestionState::Stopped
        {
            tracing::debug!("connection already initialized");
            return Ok(());
        }

        let was_initialized = self.engine.is_initialized();
        self.engine.initialize();
        let feed = match self.storefront.transaction_updates().await {
            Ok(feed) => feed,
            Err(e) => {
                if !was_initialized {
                    self.engine.reset();
                }
                return Err(e);
            }
        };

        *ingestion = Some(IngestionLoop::spawn(
            Arc::clone(&self.engine),
            Arc::clone(&self.registry),
            feed,
        ));
        tracing::info!("store connection initialized");
        Ok(())
    }

    /// Tears the connection down: clears all state, drops every listener and
    /// stops the ingestion loop.
    ///
    /// Unfinished transactions are abandoned, not finished.
    pub async fn end_connection(&self) {
        // Reset first so a loop mid-item stops before admitting anything else.
        self.engine.reset();
        self.registry.unregister_all();
        if let Some(handle) = self.ingestion.lock().await.take() {
            handle.stop().await;
        }
        tracing::info!("store connection ended");
    }

    pub fn is_connected(&self) -> bool {
        self.engine.is_initialized()
    }

    /// Waits until the storefront feed closes or the connection ends.
    pub async fn wait_for_feed_end(&self) {
        let state = self
            .ingestion
            .lock()
            .await
            .as_ref()
            .map(IngestionHandle::watch_state);
        if let Some(mut state) = state {
            let _ = state
                .wait_for(|state| *state == IngestionState::Stopped)
                .await;
        }
    }

    pub fn add_listener(&self, listener: Listener) -> ListenerId {
        self.registry.register(listener)
    }

    pub fn on_purchase_updated<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&Transaction) + Send + Sync + 'static,
    {
        self.add_listener(Listener::purchase_succeeded(callback))
    }

    pub fn on_purchase_error<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&PurchaseFailure) + Send + Sync + 'static,
    {
        self.add_listener(Listener::purchase_failed(callback))
    }

    pub fn on_promoted_product<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.add_listener(Listener::promoted_product(callback))
    }

    /// Safe to call from inside a listener, including the listener being removed.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.registry.unregister(id)
    }

    /// Finishes a delivered transaction on the platform, then drops it from the
    /// pending ledger.
    ///
    /// Ids that are not pending return [`FinishResult::NotPending`] without
    /// contacting the platform. Concurrent calls for the same pending id may
    /// each reach the platform; only one of them reports `Finished`.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::PlatformFinish`] when the platform call fails.
    /// The transaction stays pending so the call can be retried.
    pub async fn finish_transaction(&self, transaction_id: &str) -> Result<FinishResult> {
        if !self.engine.is_pending(transaction_id) {
            return Ok(FinishResult::NotPending);
        }

        if let Err(source) = self.storefront.finish_on_platform(transaction_id).await {
            tracing::error!(id = transaction_id, error = %source, "platform finish failed");
            return Err(ReconcileError::PlatformFinish {
                transaction_id: transaction_id.to_owned(),
                source,
            });
        }

        let result = self.engine.finish(transaction_id);
        tracing::debug!(id = transaction_id, ?result, "transaction finished");
        Ok(result)
    }

    /// Finishes every leftover pending transaction, continuing past failures.
    pub async fn finish_pending_transactions(&self) -> FinishSummary {
        let mut summary = FinishSummary::default();
        for tx in self.engine.pending_snapshot() {
            match self.finish_transaction(&tx.id).await {
                Ok(FinishResult::Finished) => summary.finished += 1,
                Ok(FinishResult::NotPending) => summary.not_pending += 1,
                Err(_) => summary.failed.push(tx.id),
            }
        }
        summary
    }

    pub fn get_pending_transactions(&self) -> Vec<Transaction> {
        self.engine.pending_snapshot()
    }

    pub fn stats(&self) -> EngineStats {
        self.engine.stats()
    }
}
