use crate::domain::ledger::TransactionLedger;
use crate::domain::supersession::{Freshness, SupersessionTracker};
use crate::domain::transaction::Transaction;
use crate::error::{ReconcileError, Result};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Deliver to listeners. The transaction is now processed and pending.
    Accept,
    /// Already delivered once on this connection.
    SkipDuplicate,
    /// A later-dated transaction of the same subscription group was already accepted.
    SkipSuperseded,
}

impl AdmissionDecision {
    pub fn is_accept(self) -> bool {
        self == Self::Accept
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishResult {
    Finished,
    /// Already finished, never admitted, or finished concurrently. Not an error.
    NotPending,
}

/// Point-in-time counters for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStats {
    pub processed: usize,
    pub pending: usize,
    pub groups: usize,
    pub accepted: u64,
    pub duplicates: u64,
    pub superseded: u64,
}

#[derive(Debug, Default)]
struct EngineState {
    initialized: bool,
    ledger: TransactionLedger,
    groups: SupersessionTracker,
    accepted: u64,
    duplicates: u64,
    superseded: u64,
}

/// Sole owner of the connection's mutable purchase state.
///
/// Every operation takes the state lock for its whole duration and releases it
/// before returning, so operations are serialized in arrival order and no
/// guard ever outlives a call. Callers never hold the lock across an `.await`
/// or while listeners run, which lets a listener re-enter the engine.
#[derive(Debug, Default)]
pub struct ReconciliationEngine {
    state: Mutex<EngineState>,
}

impl ReconciliationEngine {
    /// Creates an engine with empty state. Call [`initialize`](Self::initialize)
    /// before ingestion starts.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks the engine ready. Calling it again has no effect.
    pub fn initialize(&self) {
        let mut state = self.lock();
        if !state.initialized {
            state.initialized = true;
            tracing::debug!("reconciliation engine initialized");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Drops all state and clears the initialized flag.
    ///
    /// Pending transactions are abandoned, not finished. They come back only if
    /// the storefront redelivers them.
    pub fn reset(&self) {
        let mut state = self.lock();
        let abandoned = state.ledger.pending_len();
        if abandoned > 0 {
            tracing::warn!(abandoned, "resetting with unfinished transactions");
        }
        *state = EngineState::default();
    }

    /// Decides whether `tx` should be delivered to listeners.
    ///
    /// The duplicate check runs first, then the subscription-group check.
    /// Only `Accept` mutates state.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::InvalidTransaction`] when the transaction has
    /// no identifier. State is left untouched.
    pub fn admit(&self, tx: &Transaction) -> Result<AdmissionDecision> {
        Self::validate(tx)?;
        Ok(Self::decide(&mut self.lock(), tx))
    }

    /// Like [`admit`](Self::admit), but checks the initialized flag under the
    /// same lock. Returns `None` once the engine has been reset, leaving the
    /// cleared state untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::InvalidTransaction`] when the transaction has
    /// no identifier.
    pub fn admit_if_initialized(&self, tx: &Transaction) -> Result<Option<AdmissionDecision>> {
        let mut state = self.lock();
        if !state.initialized {
            return Ok(None);
        }
        Self::validate(tx)?;
        Ok(Some(Self::decide(&mut state, tx)))
    }

    fn validate(tx: &Transaction) -> Result<()> {
        if tx.id.trim().is_empty() {
            return Err(ReconcileError::InvalidTransaction(format!(
                "transaction for product '{}' has no identifier",
                tx.product_id
            )));
        }
        Ok(())
    }

    fn decide(state: &mut EngineState, tx: &Transaction) -> AdmissionDecision {
        if state.ledger.is_processed(&tx.id) {
            state.duplicates += 1;
            return AdmissionDecision::SkipDuplicate;
        }

        if let Some(group_id) = &tx.subscription_group_id
            && state.groups.check_and_advance(group_id, tx.purchase_date) == Freshness::Stale
        {
            state.superseded += 1;
            return AdmissionDecision::SkipSuperseded;
        }

        state.ledger.mark_processed(&tx.id);
        state.ledger.insert_pending(tx.clone());
        state.accepted += 1;
        AdmissionDecision::Accept
    }

    /// Removes the transaction from the pending ledger.
    pub fn finish(&self, transaction_id: &str) -> FinishResult {
        match self.lock().ledger.remove_pending(transaction_id) {
            Some(_) => FinishResult::Finished,
            None => FinishResult::NotPending,
        }
    }

    /// Copy of the unfinished transactions in admission order.
    pub fn pending_snapshot(&self) -> Vec<Transaction> {
        self.lock().ledger.pending_snapshot()
    }

    pub fn is_processed(&self, transaction_id: &str) -> bool {
        self.lock().ledger.is_processed(transaction_id)
    }

    pub fn is_pending(&self, transaction_id: &str) -> bool {
        self.lock().ledger.is_pending(transaction_id)
    }

    /// Forgets that a transaction was delivered, so a redelivery is accepted
    /// again. Group watermarks are not rolled back.
    pub fn unmark(&self, transaction_id: &str) -> bool {
        self.lock().ledger.unmark(transaction_id)
    }

    pub fn group_watermark(&self, group_id: &str) -> Option<i64> {
        self.lock().groups.watermark(group_id)
    }

    pub fn stats(&self) -> EngineStats {
        let state = self.lock();
        EngineStats {
            processed: state.ledger.processed_len(),
            pending: state.ledger.pending_len(),
            groups: state.groups.len(),
            accepted: state.accepted,
            duplicates: state.duplicates,
            superseded: state.superseded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renewal(id: &str, group: &str, date: i64) -> Transaction {
        Transaction::new(id, "pro.monthly", date).in_group(group)
    }

    fn ready_engine() -> ReconciliationEngine {
        let engine = ReconciliationEngine::new();
        engine.initialize();
        engine
    }

    #[test]
    fn test_duplicate_id_is_skipped() {
        let engine = ready_engine();
        let tx = Transaction::new("T1", "coins.100", 10);

        assert_eq!(engine.admit(&tx).unwrap(), AdmissionDecision::Accept);
        assert_eq!(engine.admit(&tx).unwrap(), AdmissionDecision::SkipDuplicate);
    }

    #[test]
    fn test_in_order_renewals_are_both_accepted() {
        let engine = ready_engine();
        assert_eq!(engine.admit(&renewal("T1", "G1", 100)).unwrap(), AdmissionDecision::Accept);
        assert_eq!(engine.admit(&renewal("T2", "G1", 200)).unwrap(), AdmissionDecision::Accept);
        assert_eq!(engine.group_watermark("G1"), Some(200));
    }

    #[test]
    fn test_out_of_order_renewal_is_superseded() {
        let engine = ready_engine();
        assert_eq!(engine.admit(&renewal("T2", "G1", 200)).unwrap(), AdmissionDecision::Accept);
        assert_eq!(
            engine.admit(&renewal("T1", "G1", 100)).unwrap(),
            AdmissionDecision::SkipSuperseded
        );
        // A superseded transaction is never marked, so it is not pending either.
        assert!(!engine.is_processed("T1"));
        assert!(!engine.is_pending("T1"));
    }

    #[test]
    fn test_non_subscription_bypasses_watermark() {
        let engine = ready_engine();
        engine.admit(&Transaction::new("T1", "coins.100", 500)).unwrap();
        assert_eq!(
            engine.admit(&Transaction::new("T2", "coins.100", 1)).unwrap(),
            AdmissionDecision::Accept
        );
        assert_eq!(engine.stats().groups, 0);
    }

    #[test]
    fn test_missing_identifier_is_rejected_without_side_effects() {
        let engine = ready_engine();
        let result = engine.admit(&renewal("", "G1", 100));

        assert!(matches!(result, Err(ReconcileError::InvalidTransaction(_))));
        assert_eq!(engine.group_watermark("G1"), None);
        assert_eq!(engine.stats(), EngineStats::default());
    }

    #[test]
    fn test_finish_twice() {
        let engine = ready_engine();
        engine.admit(&Transaction::new("T1", "coins.100", 1)).unwrap();

        assert_eq!(engine.finish("T1"), FinishResult::Finished);
        assert_eq!(engine.finish("T1"), FinishResult::NotPending);
        assert!(engine.is_processed("T1"));
    }

    #[test]
    fn test_finish_unknown_is_not_pending() {
        let engine = ready_engine();
        assert_eq!(engine.finish("never-seen"), FinishResult::NotPending);
    }

    #[test]
    fn test_reset_clears_everything() {
        let engine = ready_engine();
        let tx = renewal("T1", "G1", 100);
        engine.admit(&tx).unwrap();

        engine.reset();
        assert!(!engine.is_initialized());
        assert_eq!(engine.stats(), EngineStats::default());
        assert!(engine.pending_snapshot().is_empty());

        assert_eq!(engine.admit(&tx).unwrap(), AdmissionDecision::Accept);
    }

    #[test]
    fn test_admit_if_initialized_refuses_after_reset() {
        let engine = ready_engine();
        let tx = Transaction::new("T1", "coins.100", 1);
        engine.reset();

        assert_eq!(engine.admit_if_initialized(&tx).unwrap(), None);
        assert_eq!(engine.stats(), EngineStats::default());

        engine.initialize();
        assert_eq!(
            engine.admit_if_initialized(&tx).unwrap(),
            Some(AdmissionDecision::Accept)
        );
    }

    #[test]
    fn test_unmark_allows_redelivery() {
        let engine = ready_engine();
        let tx = Transaction::new("T1", "coins.100", 1);
        engine.admit(&tx).unwrap();

        assert!(engine.unmark("T1"));
        assert!(!engine.is_pending("T1"));
        assert_eq!(engine.admit(&tx).unwrap(), AdmissionDecision::Accept);
    }

    #[test]
    fn test_stats_count_decisions() {
        let engine = ready_engine();
        engine.admit(&renewal("T2", "G1", 200)).unwrap();
        engine.admit(&renewal("T2", "G1", 200)).unwrap();
        engine.admit(&renewal("T1", "G1", 100)).unwrap();

        let stats = engine.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.superseded, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.processed, 1);
    }
}
