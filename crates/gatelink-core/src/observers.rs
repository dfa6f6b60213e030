// Connected/disconnected notification fan-out.
//
// Handlers are keyed by a monotonically increasing handle. Notification
// snapshots the handler list before calling anything, so a handler may
// register or unregister (itself included) while being notified.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::trace;

/// Callback invoked with `true` on connect and `false` on disconnect.
pub type ConnectedChangedHandler = Arc<dyn Fn(bool) + Send + Sync>;

/// Opaque registration handle. Never reused within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared handler registry. Clones refer to the same registry.
#[derive(Clone, Default)]
pub struct ConnectionObservers {
    inner: Arc<ObserversInner>,
}

#[derive(Default)]
struct ObserversInner {
    handlers: DashMap<HandlerId, ConnectedChangedHandler>,
    next_id: AtomicU64,
}

impl ConnectionObservers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: impl Fn(bool) + Send + Sync + 'static) -> HandlerId {
        let id = HandlerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner.handlers.insert(id, Arc::new(handler));
        trace!(handle_id = %id, "registered connected-changed handler");
        id
    }

    /// Remove a handler. Unknown handles are ignored.
    pub fn unregister(&self, id: HandlerId) {
        if self.inner.handlers.remove(&id).is_some() {
            trace!(handle_id = %id, "unregistered connected-changed handler");
        }
    }

    pub fn len(&self) -> usize {
        self.inner.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.handlers.is_empty()
    }

    /// Call every handler registered at the moment of the call.
    pub fn notify(&self, connected: bool) {
        let snapshot: Vec<ConnectedChangedHandler> = self
            .inner
            .handlers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for handler in snapshot {
            handler(connected);
        }
    }
}

impl std::fmt::Debug for ConnectionObservers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionObservers")
            .field("handlers", &self.len())
            .finish()
    }
}
