//! Execution primitives for generation rounds.
//!
//! A generation task runs either lazily on the first caller that asks for
//! its result ([`GenerationTask::lazy`]) or eagerly on a dedicated background
//! thread ([`GenerationTask::spawn`]). Either way the outcome is computed
//! once and every reader receives a clone of it.
//!
//! Intermediate results travel from the task that owns the round state to
//! readers through a [`snapshot_channel`]; readers never touch round state.

use crate::error::{GenerationError, GenerationResult};
use crate::snapshot::InvariantSnapshot;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread;
use tracing::{error, warn};

type Job<T> = Box<dyn FnOnce() -> GenerationResult<T> + Send + 'static>;

pub enum GenerationTask<T> {
    Lazy(LazyTask<T>),
    Background(BackgroundTask<T>),
}

impl<T: Clone + Send + 'static> GenerationTask<T> {
    /// Run `job` on the first call to [`Self::wait`].
    pub fn lazy(job: impl FnOnce() -> GenerationResult<T> + Send + 'static) -> Self {
        GenerationTask::Lazy(LazyTask::new(job))
    }

    /// Run `job` right away on a new named thread.
    pub fn spawn(name: &str, job: impl FnOnce() -> GenerationResult<T> + Send + 'static) -> Self {
        GenerationTask::Background(BackgroundTask::spawn(name, job))
    }

    pub fn is_done(&self) -> bool {
        match self {
            GenerationTask::Lazy(t) => t.is_done(),
            GenerationTask::Background(t) => t.is_done(),
        }
    }

    /// The outcome if the task has finished, without blocking.
    pub fn try_result(&self) -> Option<GenerationResult<T>> {
        match self {
            GenerationTask::Lazy(t) => t.try_result(),
            GenerationTask::Background(t) => t.try_result(),
        }
    }

    /// Block until the outcome is available. For lazy tasks the calling
    /// thread does the work.
    pub fn wait(&self) -> GenerationResult<T> {
        match self {
            GenerationTask::Lazy(t) => t.get(),
            GenerationTask::Background(t) => t.wait(),
        }
    }
}

fn run_guarded<T>(job: Job<T>) -> GenerationResult<T> {
    match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(message, "invariant generation task panicked");
            Err(GenerationError::TaskPanicked(message))
        }
    }
}

pub struct LazyTask<T> {
    job: Mutex<Option<Job<T>>>,
    result: OnceLock<GenerationResult<T>>,
}

impl<T: Clone> LazyTask<T> {
    pub fn new(job: impl FnOnce() -> GenerationResult<T> + Send + 'static) -> Self {
        LazyTask {
            job: Mutex::new(Some(Box::new(job))),
            result: OnceLock::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.result.get().is_some()
    }

    pub fn try_result(&self) -> Option<GenerationResult<T>> {
        self.result.get().cloned()
    }

    /// Concurrent callers block until the first one has finished the job.
    pub fn get(&self) -> GenerationResult<T> {
        self.result
            .get_or_init(|| {
                let job = self.job.lock().unwrap().take();
                match job {
                    Some(job) => run_guarded(job),
                    None => Err(GenerationError::TaskPanicked(
                        "lazy task was consumed without producing a result".into(),
                    )),
                }
            })
            .clone()
    }
}

struct Slot<T> {
    result: Mutex<Option<GenerationResult<T>>>,
    ready: Condvar,
}

pub struct BackgroundTask<T> {
    slot: Arc<Slot<T>>,
}

impl<T: Clone + Send + 'static> BackgroundTask<T> {
    pub fn spawn(name: &str, job: impl FnOnce() -> GenerationResult<T> + Send + 'static) -> Self {
        let slot = Arc::new(Slot {
            result: Mutex::new(None),
            ready: Condvar::new(),
        });
        let thread_slot = Arc::clone(&slot);
        let job: Job<T> = Box::new(job);
        let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
            let result = run_guarded(job);
            *thread_slot.result.lock().unwrap() = Some(result);
            thread_slot.ready.notify_all();
        });
        if let Err(e) = spawned {
            warn!(error = %e, "failed to spawn invariant generation thread");
            *slot.result.lock().unwrap() = Some(Err(GenerationError::Engine(format!(
                "could not spawn thread '{name}': {e}"
            ))));
        }
        BackgroundTask { slot }
    }

    pub fn is_done(&self) -> bool {
        self.slot.result.lock().unwrap().is_some()
    }

    pub fn try_result(&self) -> Option<GenerationResult<T>> {
        self.slot.result.lock().unwrap().clone()
    }

    pub fn wait(&self) -> GenerationResult<T> {
        let mut guard = self.slot.result.lock().unwrap();
        loop {
            if let Some(result) = guard.as_ref() {
                return result.clone();
            }
            guard = self.slot.ready.wait(guard).unwrap();
        }
    }
}

/// Create the two ends of a snapshot channel.
pub fn snapshot_channel() -> (SnapshotPublisher, LatestSnapshot) {
    let (tx, rx) = mpsc::channel();
    (
        SnapshotPublisher { tx },
        LatestSnapshot {
            inner: Mutex::new(Latest { rx, latest: None }),
        },
    )
}

/// Sending end, owned by whoever owns the round state.
pub struct SnapshotPublisher {
    tx: Sender<InvariantSnapshot>,
}

impl SnapshotPublisher {
    pub fn publish(&self, snapshot: InvariantSnapshot) {
        // Nobody listening any more is fine.
        let _ = self.tx.send(snapshot);
    }
}

struct Latest {
    rx: Receiver<InvariantSnapshot>,
    latest: Option<InvariantSnapshot>,
}

/// Receiving end: remembers the most recent snapshot published.
pub struct LatestSnapshot {
    inner: Mutex<Latest>,
}

impl LatestSnapshot {
    /// Most recent snapshot published so far. Never blocks on the publisher.
    pub fn latest(&self) -> Option<InvariantSnapshot> {
        let mut inner = self.inner.lock().unwrap();
        loop {
            match inner.rx.try_recv() {
                Ok(snapshot) => inner.latest = Some(snapshot),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        inner.latest.clone()
    }

    pub fn latest_or_trivial(&self) -> InvariantSnapshot {
        self.latest().unwrap_or_else(InvariantSnapshot::trivial)
    }
}
