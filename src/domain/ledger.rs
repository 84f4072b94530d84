use super::transaction::Transaction;
use std::collections::{HashMap, HashSet};

/// Tracks which transactions were delivered and which are still awaiting finish.
///
/// Every pending id is also a processed id. `insert_pending` refuses ids that
/// were never marked, and `unmark` drops both entries together.
#[derive(Debug, Default)]
pub struct TransactionLedger {
    processed: HashSet<String>,
    pending: HashMap<String, PendingEntry>,
    next_seq: u64,
}

#[derive(Debug)]
struct PendingEntry {
    seq: u64,
    tx: Transaction,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the id was already processed.
    pub fn mark_processed(&mut self, id: &str) -> bool {
        self.processed.insert(id.to_owned())
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.processed.contains(id)
    }

    /// Forgets a processed id so it can be delivered again. Used for replay.
    pub fn unmark(&mut self, id: &str) -> bool {
        self.pending.remove(id);
        self.processed.remove(id)
    }

    /// Stores a delivered transaction until it is finished.
    ///
    /// Returns `false` without storing anything if the id was never processed.
    pub fn insert_pending(&mut self, tx: Transaction) -> bool {
        if !self.processed.contains(&tx.id) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(tx.id.clone(), PendingEntry { seq, tx });
        true
    }

    pub fn remove_pending(&mut self, id: &str) -> Option<Transaction> {
        self.pending.remove(id).map(|entry| entry.tx)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Pending transactions in the order they were admitted.
    pub fn pending_snapshot(&self) -> Vec<Transaction> {
        let mut entries: Vec<&PendingEntry> = self.pending.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| entry.tx.clone()).collect()
    }

    pub fn processed_len(&self) -> usize {
        self.processed.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.processed.clear();
        self.pending.clear();
        self.next_seq = 0;
    }
}
