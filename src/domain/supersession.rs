use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
}

/// Keeps the latest purchase date seen per subscription group.
///
/// The storefront reports a mid-cycle tier switch as two ordinary renewals in
/// the same group, so only the latest-dated transaction of a group is current.
/// Comparison uses the transaction's own date, not its arrival order, and
/// requires strictly greater: an equal date is stale.
#[derive(Debug, Default)]
pub struct SupersessionTracker {
    watermarks: HashMap<String, i64>,
}

impl SupersessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies `purchase_date` against the group's watermark, advancing the
    /// watermark when the date is fresh.
    pub fn check_and_advance(&mut self, group_id: &str, purchase_date: i64) -> Freshness {
        let freshness = self.check(group_id, purchase_date);
        if freshness == Freshness::Fresh {
            self.watermarks.insert(group_id.to_owned(), purchase_date);
        }
        freshness
    }

    /// Classifies without advancing.
    pub fn check(&self, group_id: &str, purchase_date: i64) -> Freshness {
        match self.watermarks.get(group_id) {
            Some(&watermark) if purchase_date <= watermark => Freshness::Stale,
            _ => Freshness::Fresh,
        }
    }

    pub fn watermark(&self, group_id: &str) -> Option<i64> {
        self.watermarks.get(group_id).copied()
    }

    pub fn len(&self) -> usize {
        self.watermarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watermarks.is_empty()
    }

    pub fn clear(&mut self) {
        self.watermarks.clear();
    }
}
