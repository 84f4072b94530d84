use super::transaction::{PurchaseFailure, Transaction};
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type PurchaseCallback = Arc<dyn Fn(&Transaction) + Send + Sync>;
pub type FailureCallback = Arc<dyn Fn(&PurchaseFailure) + Send + Sync>;
pub type PromotedCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    PurchaseSucceeded,
    PurchaseFailed,
    PromotedProduct,
}

/// Cancellation handle returned on registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// A registered callback. The variant decides which events it receives.
#[derive(Clone)]
pub enum Listener {
    PurchaseSucceeded(PurchaseCallback),
    PurchaseFailed(FailureCallback),
    PromotedProduct(PromotedCallback),
}

impl Listener {
    pub fn purchase_succeeded<F>(callback: F) -> Self
    where
        F: Fn(&Transaction) + Send + Sync + 'static,
    {
        Self::PurchaseSucceeded(Arc::new(callback))
    }

    pub fn purchase_failed<F>(callback: F) -> Self
    where
        F: Fn(&PurchaseFailure) + Send + Sync + 'static,
    {
        Self::PurchaseFailed(Arc::new(callback))
    }

    pub fn promoted_product<F>(callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self::PromotedProduct(Arc::new(callback))
    }

    pub fn kind(&self) -> ListenerKind {
        match self {
            Self::PurchaseSucceeded(_) => ListenerKind::PurchaseSucceeded,
            Self::PurchaseFailed(_) => ListenerKind::PurchaseFailed,
            Self::PromotedProduct(_) => ListenerKind::PromotedProduct,
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener").field(&self.kind()).finish()
    }
}

#[derive(Default)]
struct Registrations {
    next_id: u64,
    by_kind: HashMap<ListenerKind, Vec<(ListenerId, Listener)>>,
}

/// Callbacks grouped by event kind, in registration order.
///
/// Fanout always iterates a snapshot taken under the lock and invokes the
/// callbacks after releasing it, so a callback may register or unregister
/// listeners (itself included) without affecting the dispatch in flight.
#[derive(Default)]
pub struct ListenerRegistry {
    inner: Mutex<Registrations>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registrations> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, listener: Listener) -> ListenerId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = ListenerId(inner.next_id);
        inner
            .by_kind
            .entry(listener.kind())
            .or_default()
            .push((id, listener));
        id
    }

    /// Removes the listener wherever it is registered. Unknown ids are a no-op.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        for listeners in inner.by_kind.values_mut() {
            if let Some(pos) = listeners.iter().position(|(existing, _)| *existing == id) {
                listeners.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn unregister_all(&self) {
        self.lock().by_kind.clear();
    }

    pub fn snapshot(&self, kind: ListenerKind) -> Vec<Listener> {
        self.lock()
            .by_kind
            .get(&kind)
            .map(|listeners| listeners.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self, kind: ListenerKind) -> usize {
        self.lock().by_kind.get(&kind).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().by_kind.values().all(Vec::is_empty)
    }

    /// Invokes every purchase-succeeded listener. Returns how many returned normally.
    pub fn dispatch_purchase(&self, tx: &Transaction) -> usize {
        self.snapshot(ListenerKind::PurchaseSucceeded)
            .into_iter()
            .filter(|listener| match listener {
                Listener::PurchaseSucceeded(callback) => invoke(|| callback(tx)),
                _ => false,
            })
            .count()
    }

    pub fn dispatch_failure(&self, failure: &PurchaseFailure) -> usize {
        self.snapshot(ListenerKind::PurchaseFailed)
            .into_iter()
            .filter(|listener| match listener {
                Listener::PurchaseFailed(callback) => invoke(|| callback(failure)),
                _ => false,
            })
            .count()
    }

    pub fn dispatch_promoted(&self, product_id: &str) -> usize {
        self.snapshot(ListenerKind::PromotedProduct)
            .into_iter()
            .filter(|listener| match listener {
                Listener::PromotedProduct(callback) => invoke(|| callback(product_id)),
                _ => false,
            })
            .count()
    }
}

// A panicking listener must not stop the rest of the fanout.
fn invoke(call: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(()) => true,
        Err(_) => {
            tracing::error!("listener panicked during fanout");
            false
        }
    }
}
