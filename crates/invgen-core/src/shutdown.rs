//! Cooperative shutdown coordination.
//!
//! A [`ShutdownManager`] owns the right to request a shutdown; any number of
//! [`ShutdownNotifier`] handles observe it. Requests are idempotent: the first
//! reason wins and listeners are notified once per request that actually
//! changed the state. Managers can be chained so that a child shuts down
//! whenever its parent does, but never the other way round.

use crate::error::{GenerationError, GenerationResult};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use tracing::debug;

type Listener = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle returned by listener registration, used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Shared {
    reason: OnceLock<String>,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Shared {
            reason: OnceLock::new(),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
        }
    }

    fn request(&self, reason: String) {
        if self.reason.set(reason).is_err() {
            return;
        }
        let reason = self.reason.get().map(String::as_str).unwrap_or_default();
        debug!(reason, "shutdown requested");
        // Call outside the lock so listeners may register or request further shutdowns.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(reason);
        }
    }
}

#[derive(Clone)]
pub struct ShutdownManager {
    shared: Arc<Shared>,
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownManager {
    pub fn new() -> Self {
        ShutdownManager {
            shared: Arc::new(Shared::new()),
        }
    }

    /// Create a manager that is shut down whenever `parent` is.
    pub fn with_parent(parent: &ShutdownNotifier) -> Self {
        let child = ShutdownManager::new();
        let weak: Weak<Shared> = Arc::downgrade(&child.shared);
        parent.register_and_check_immediately(move |reason| {
            if let Some(shared) = weak.upgrade() {
                shared.request(reason.to_string());
            }
        });
        child
    }

    pub fn notifier(&self) -> ShutdownNotifier {
        ShutdownNotifier {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Request shutdown. Repeated requests are no-ops.
    pub fn request_shutdown(&self, reason: impl Into<String>) {
        self.shared.request(reason.into());
    }
}

impl fmt::Debug for ShutdownManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownManager")
            .field("reason", &self.shared.reason.get())
            .finish()
    }
}

#[derive(Clone)]
pub struct ShutdownNotifier {
    shared: Arc<Shared>,
}

impl ShutdownNotifier {
    pub fn should_shutdown(&self) -> bool {
        self.shared.reason.get().is_some()
    }

    pub fn reason(&self) -> Option<&str> {
        self.shared.reason.get().map(String::as_str)
    }

    /// Checkpoint: turn a pending shutdown into [`GenerationError::Cancelled`].
    pub fn shutdown_if_necessary(&self) -> GenerationResult<()> {
        match self.shared.reason.get() {
            Some(reason) => Err(GenerationError::cancelled(reason.clone())),
            None => Ok(()),
        }
    }

    /// Register a listener called on the first shutdown request.
    ///
    /// A listener registered after the request has been made is not called;
    /// use [`Self::register_and_check_immediately`] when that matters.
    pub fn register(&self, listener: impl Fn(&str) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.shared.next_listener.fetch_add(1, Ordering::Relaxed));
        self.shared
            .listeners
            .lock()
            .unwrap()
            .push((id, Arc::new(listener)));
        id
    }

    /// Register a listener and call it right away if shutdown was already
    /// requested. The listener may see the same request twice.
    pub fn register_and_check_immediately(
        &self,
        listener: impl Fn(&str) + Send + Sync + 'static,
    ) -> ListenerId {
        let listener: Listener = Arc::new(listener);
        let id = ListenerId(self.shared.next_listener.fetch_add(1, Ordering::Relaxed));
        self.shared
            .listeners
            .lock()
            .unwrap()
            .push((id, Arc::clone(&listener)));
        if let Some(reason) = self.shared.reason.get() {
            listener(reason);
        }
        id
    }

    pub fn unregister(&self, id: ListenerId) {
        self.shared
            .listeners
            .lock()
            .unwrap()
            .retain(|(other, _)| *other != id);
    }
}

impl fmt::Debug for ShutdownNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownNotifier")
            .field("reason", &self.shared.reason.get())
            .finish()
    }
}
