//! Re-running a generator with increasing precision.

use invgen_core::{
    Adjustable, Assumption, GenerationResult, GeneratorState, InvariantGenerator,
    InvariantSnapshot, Lifecycle, Location, Statistics, StatisticsProvider,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Runs an [`Adjustable`] generator, and on request replaces it with its
/// more precise successor.
///
/// Every completed round is a sound over-approximation, so the wrapper
/// reports the conjunction of all of them: replacing the inner generator
/// never loses information. Once any round proved the program safe, the
/// wrapper stays safe.
pub struct AdjustableGenerator<G: Adjustable> {
    current: Mutex<Arc<G>>,
    lifecycle: Lifecycle,
    completed: Mutex<InvariantSnapshot>,
    rounds: AtomicUsize,
    program_safe: AtomicBool,
}

impl<G: Adjustable> AdjustableGenerator<G> {
    pub fn new(initial: G) -> Self {
        AdjustableGenerator {
            current: Mutex::new(Arc::new(initial)),
            lifecycle: Lifecycle::new(),
            completed: Mutex::new(InvariantSnapshot::trivial()),
            rounds: AtomicUsize::new(0),
            program_safe: AtomicBool::new(false),
        }
    }

    /// The generator running the current round.
    pub fn current(&self) -> Arc<G> {
        Arc::clone(&self.current.lock().unwrap())
    }

    /// Number of rounds that ran to completion.
    pub fn rounds(&self) -> usize {
        self.rounds.load(Ordering::SeqCst)
    }

    /// Conjunction of the results of all completed rounds.
    pub fn completed_snapshot(&self) -> InvariantSnapshot {
        self.completed.lock().unwrap().clone()
    }

    /// Finish the current round, then try to adjust.
    ///
    /// Blocks until the current generator has a result. Returns `Ok(true)` if
    /// a more precise successor has been started, `Ok(false)` if the
    /// generator refused to adjust or the wrapper was cancelled.
    pub fn adjust_and_continue(&self) -> GenerationResult<bool> {
        let entry = self.lifecycle.ensure_started("adjust_and_continue");
        let current = self.current();

        let result = current.snapshot();
        if current.is_program_safe() && !self.program_safe.swap(true, Ordering::SeqCst) {
            info!(round = self.rounds() + 1, "invariant generation proved the program safe");
        }
        self.record(result?);

        let Some(next) = current.adjust() else {
            info!(
                rounds = self.rounds(),
                "invariant generator cannot be adjusted further"
            );
            return Ok(false);
        };
        let next = Arc::new(next);

        let mut slot = self.current.lock().unwrap();
        // Checked under the lock so that `cancel` reaches whatever runs next.
        if self.lifecycle.is_cancelled() {
            debug!("not starting adjusted invariant generator, cancelled");
            return Ok(false);
        }
        next.start(entry);
        *slot = next;
        debug!(round = self.rounds() + 1, "started adjusted invariant generator");
        Ok(true)
    }

    fn record(&self, snapshot: InvariantSnapshot) {
        let mut completed = self.completed.lock().unwrap();
        *completed = completed.conjoin(&snapshot);
        self.rounds.fetch_add(1, Ordering::SeqCst);
    }
}

impl<G: Adjustable> InvariantGenerator for AdjustableGenerator<G> {
    fn start(&self, entry: Location) {
        self.lifecycle.mark_started(entry);
        self.current().start(entry);
    }

    fn cancel(&self) {
        self.lifecycle.ensure_started("cancel");
        let current = {
            let slot = self.current.lock().unwrap();
            self.lifecycle.mark_cancelled();
            Arc::clone(&slot)
        };
        current.cancel();
    }

    /// Until the first round has completed this is the first round's result,
    /// and waits for it if the inner generator does. Afterwards it never
    /// blocks.
    fn snapshot(&self) -> GenerationResult<InvariantSnapshot> {
        self.lifecycle.ensure_started("get");
        if self.rounds() == 0 {
            let first = self.current().snapshot()?;
            return Ok(self.completed_snapshot().conjoin(&first));
        }
        Ok(self.completed_snapshot())
    }

    fn is_program_safe(&self) -> bool {
        self.program_safe.load(Ordering::SeqCst) || self.current().is_program_safe()
    }

    fn inject_invariant(&self, location: Location, assumption: Assumption) -> GenerationResult<()> {
        self.current().inject_invariant(location, assumption)
    }

    fn state(&self) -> GeneratorState {
        if !self.lifecycle.is_started() {
            return GeneratorState::Created;
        }
        if self.lifecycle.is_cancelled() {
            return GeneratorState::Cancelled;
        }
        match self.current().state() {
            GeneratorState::Completed(last) => {
                GeneratorState::Completed(self.completed_snapshot().conjoin(&last))
            }
            GeneratorState::Created => GeneratorState::Started,
            other => other,
        }
    }
}

impl<G: Adjustable> StatisticsProvider for AdjustableGenerator<G> {
    fn collect_statistics(&self, out: &mut Vec<Statistics>) {
        self.current().collect_statistics(out);
        let mut stats = Statistics::new("Adjustable invariant generation");
        stats
            .put("completed rounds", self.rounds())
            .put("program proved safe", self.is_program_safe());
        out.push(stats);
    }
}
