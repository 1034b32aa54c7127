//! Background adjustment loop.

use crate::adjustable::AdjustableGenerator;
use invgen_core::{
    snapshot_channel, Adjustable, Assumption, GenerationError, GenerationResult, GenerationTask,
    GeneratorState, InvariantGenerator, InvariantSnapshot, LatestSnapshot, Lifecycle, Location,
    ShutdownManager, ShutdownNotifier, SnapshotPublisher, Statistics, StatisticsProvider,
};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, error, info};

const CANCEL_MESSAGE: &str = "Invariant generation cancel requested.";

/// Drives an [`AdjustableGenerator`] round after round on a background
/// thread until it refuses to adjust, proves the program safe, fails, or is
/// stopped.
///
/// Readers never wait: `snapshot` returns the result of the last completed
/// round, or the trivial snapshot before the first one. A failure of the
/// background loop is only reported by [`AutoAdjustingGenerator::wait`] and
/// [`InvariantGenerator::state`]; the last good snapshot stays available.
pub struct AutoAdjustingGenerator<G: Adjustable + 'static> {
    inner: Arc<AdjustableGenerator<G>>,
    // Raised by `cancel` and by the parent coordinator.
    stop: ShutdownManager,
    lifecycle: Lifecycle,
    task: OnceLock<GenerationTask<InvariantSnapshot>>,
    latest: LatestSnapshot,
    publisher: Mutex<Option<SnapshotPublisher>>,
}

impl<G: Adjustable + 'static> AutoAdjustingGenerator<G> {
    pub fn new(inner: AdjustableGenerator<G>, parent: &ShutdownNotifier) -> Self {
        let (publisher, latest) = snapshot_channel();
        AutoAdjustingGenerator {
            inner: Arc::new(inner),
            stop: ShutdownManager::with_parent(parent),
            lifecycle: Lifecycle::new(),
            task: OnceLock::new(),
            latest,
            publisher: Mutex::new(Some(publisher)),
        }
    }

    /// Wrap a plain adjustable generator.
    pub fn wrap(initial: G, parent: &ShutdownNotifier) -> Self {
        Self::new(AdjustableGenerator::new(initial), parent)
    }

    pub fn inner(&self) -> &AdjustableGenerator<G> {
        &self.inner
    }

    /// Block until the background loop has finished and return its final
    /// snapshot, or the error that ended it.
    pub fn wait(&self) -> GenerationResult<InvariantSnapshot> {
        self.task("wait").wait()
    }

    pub fn is_finished(&self) -> bool {
        self.task.get().is_some_and(GenerationTask::is_done)
    }

    fn task(&self, operation: &str) -> &GenerationTask<InvariantSnapshot> {
        match self.task.get() {
            Some(task) => task,
            None => panic!("{operation} called on an invariant generator that was never started"),
        }
    }
}

fn adjustment_loop<G: Adjustable>(
    inner: &AdjustableGenerator<G>,
    stop: &ShutdownNotifier,
    publisher: &SnapshotPublisher,
) -> GenerationResult<InvariantSnapshot> {
    loop {
        if let Some(reason) = stop.reason() {
            debug!(reason, "stopping invariant adjustment loop");
            inner.cancel();
            return Err(GenerationError::cancelled(reason));
        }
        if inner.is_program_safe() {
            info!(rounds = inner.rounds(), "program proved safe, no further adjustment");
            break;
        }
        match inner.adjust_and_continue() {
            Ok(adjusted) => {
                publisher.publish(inner.completed_snapshot());
                if !adjusted {
                    break;
                }
            }
            Err(e) if e.is_cancelled() => {
                debug!(rounds = inner.rounds(), "invariant adjustment round interrupted");
                return Err(e);
            }
            Err(e) => {
                error!(rounds = inner.rounds(), error = %e, "invariant adjustment loop failed");
                return Err(e);
            }
        }
    }
    Ok(inner.completed_snapshot())
}

impl<G: Adjustable + 'static> InvariantGenerator for AutoAdjustingGenerator<G> {
    fn start(&self, entry: Location) {
        self.lifecycle.mark_started(entry);
        self.inner.start(entry);

        let publisher = match self.publisher.lock().unwrap().take() {
            Some(publisher) => publisher,
            None => panic!("invariant generator started twice"),
        };
        let inner = Arc::clone(&self.inner);
        let stop = self.stop.notifier();
        let task = GenerationTask::spawn("auto-adjusting-invariant-generation", move || {
            adjustment_loop(&inner, &stop, &publisher)
        });
        if self.task.set(task).is_err() {
            panic!("invariant generator started twice");
        }
    }

    fn cancel(&self) {
        self.lifecycle.ensure_started("cancel");
        if self.lifecycle.mark_cancelled() {
            debug!("cancelling invariant adjustment loop");
        }
        self.stop.request_shutdown(CANCEL_MESSAGE);
        self.inner.cancel();
    }

    fn snapshot(&self) -> GenerationResult<InvariantSnapshot> {
        self.lifecycle.ensure_started("get");
        Ok(self.latest.latest_or_trivial())
    }

    fn is_program_safe(&self) -> bool {
        self.inner.is_program_safe()
    }

    fn inject_invariant(&self, location: Location, assumption: Assumption) -> GenerationResult<()> {
        self.inner.inject_invariant(location, assumption)
    }

    fn state(&self) -> GeneratorState {
        self.lifecycle
            .state(self.task.get().and_then(GenerationTask::try_result))
    }
}

impl<G: Adjustable + 'static> StatisticsProvider for AutoAdjustingGenerator<G> {
    fn collect_statistics(&self, out: &mut Vec<Statistics>) {
        self.inner.collect_statistics(out);
    }
}
