use crate::application::engine::{AdmissionDecision, ReconciliationEngine};
use crate::domain::listener::ListenerRegistry;
use crate::domain::ports::TransactionFeedBox;
use crate::domain::transaction::{StoreUpdate, Transaction};
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionState {
    Idle,
    Running,
    Stopped,
}

/// Single consumer of the storefront feed.
///
/// Items are handled strictly one at a time: a transaction is fully admitted
/// before any listener sees it, and the next item is not read until the
/// fanout for the current one has returned.
pub struct IngestionLoop {
    engine: Arc<ReconciliationEngine>,
    registry: Arc<ListenerRegistry>,
    state: watch::Sender<IngestionState>,
}

impl IngestionLoop {
    /// Spawns the loop on the current tokio runtime.
    pub fn spawn(
        engine: Arc<ReconciliationEngine>,
        registry: Arc<ListenerRegistry>,
        feed: TransactionFeedBox,
    ) -> IngestionHandle {
        let (state_tx, state_rx) = watch::channel(IngestionState::Idle);
        let (stop_tx, stop_rx) = oneshot::channel();

        let ingestion = Self {
            engine,
            registry,
            state: state_tx,
        };
        let task = tokio::spawn(ingestion.run(feed, stop_rx));

        IngestionHandle {
            state: state_rx,
            stop_tx: Some(stop_tx),
            task: Some(task),
        }
    }

    async fn run(self, mut feed: TransactionFeedBox, mut stop_rx: oneshot::Receiver<()>) {
        self.state.send_replace(IngestionState::Running);
        tracing::info!("ingestion loop running");

        loop {
            let update = tokio::select! {
                _ = &mut stop_rx => {
                    tracing::debug!("ingestion loop received stop signal");
                    break;
                }
                update = feed.next() => update,
            };

            let Some(update) = update else {
                tracing::info!("transaction feed closed");
                break;
            };

            // The connection may have been torn down while we were waiting.
            if !self.engine.is_initialized() {
                tracing::debug!("engine reset; dropping update and stopping");
                break;
            }

            if !self.handle(update) {
                tracing::debug!("engine reset mid-item; stopping");
                break;
            }
        }

        self.state.send_replace(IngestionState::Stopped);
    }

    /// Returns `false` when the engine was reset before the update could be
    /// admitted.
    fn handle(&self, update: StoreUpdate) -> bool {
        match update {
            StoreUpdate::Transaction(tx) => return self.handle_transaction(&tx),
            StoreUpdate::PurchaseFailed(failure) => {
                tracing::debug!(code = %failure.code, "dispatching purchase failure");
                self.registry.dispatch_failure(&failure);
            }
            StoreUpdate::PromotedProduct(product_id) => {
                tracing::debug!(%product_id, "dispatching promoted product");
                self.registry.dispatch_promoted(&product_id);
            }
        }
        true
    }

    fn handle_transaction(&self, tx: &Transaction) -> bool {
        // Flag check and admission share one lock so a concurrent reset
        // cannot slip in between them.
        let decision = match self.engine.admit_if_initialized(tx) {
            Ok(Some(decision)) => decision,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(error = %e, "rejecting transaction");
                return true;
            }
        };
        match decision {
            AdmissionDecision::Accept => {
                let delivered = self.registry.dispatch_purchase(tx);
                tracing::info!(id = %tx.id, product = %tx.product_id, delivered, "transaction delivered");
            }
            AdmissionDecision::SkipDuplicate => {
                tracing::debug!(id = %tx.id, "skipping duplicate transaction");
            }
            AdmissionDecision::SkipSuperseded => {
                tracing::debug!(
                    id = %tx.id,
                    group = tx.subscription_group_id.as_deref().unwrap_or_default(),
                    purchase_date = tx.purchase_date,
                    "skipping superseded transaction"
                );
            }
        }
        true
    }
}

/// Handle to a running ingestion loop.
pub struct IngestionHandle {
    state: watch::Receiver<IngestionState>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl IngestionHandle {
    pub fn state(&self) -> IngestionState {
        *self.state.borrow()
    }

    /// A receiver that observes state changes independently of this handle.
    pub fn watch_state(&self) -> watch::Receiver<IngestionState> {
        self.state.clone()
    }

    /// Waits until the loop has stopped, either because the feed closed or
    /// because it was told to stop.
    pub async fn wait_stopped(&mut self) {
        // An error means the loop task is gone, which also means stopped.
        let _ = self
            .state
            .wait_for(|state| *state == IngestionState::Stopped)
            .await;
    }

    /// Signals the loop to stop and waits for the task to exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::error!(error = %e, "ingestion task failed");
        }
    }
}

impl Drop for IngestionHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}
