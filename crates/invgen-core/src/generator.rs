//! The generator contract shared by every invariant generator.

use crate::cfa::Assumption;
use crate::error::{GenerationError, GenerationResult};
use crate::location::Location;
use crate::snapshot::{ExpressionTreeSupplier, InvariantSnapshot, InvariantSupplier};
use crate::stats::StatisticsProvider;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Where a generator is in its lifetime.
#[derive(Debug, Clone)]
pub enum GeneratorState {
    Created,
    Started,
    Completed(InvariantSnapshot),
    Cancelled,
    Failed(GenerationError),
}

impl GeneratorState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GeneratorState::Completed(_) | GeneratorState::Cancelled | GeneratorState::Failed(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            GeneratorState::Created => "created",
            GeneratorState::Started => "started",
            GeneratorState::Completed(_) => "completed",
            GeneratorState::Cancelled => "cancelled",
            GeneratorState::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for GeneratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorState::Failed(e) => write!(f, "failed ({e})"),
            other => f.write_str(other.name()),
        }
    }
}

/// An invariant generator.
///
/// `start` must be called exactly once before anything else; calling it twice,
/// or querying/cancelling a generator that was never started, is a
/// programming error and panics.
pub trait InvariantGenerator: StatisticsProvider + Send + Sync {
    fn start(&self, entry: Location);

    /// Best-effort and idempotent.
    fn cancel(&self);

    /// The best snapshot available. Whether this blocks depends on the
    /// generator.
    fn snapshot(&self) -> GenerationResult<InvariantSnapshot>;

    fn get(&self) -> GenerationResult<Arc<dyn InvariantSupplier>> {
        Ok(self.snapshot()?.formulas())
    }

    fn get_as_expression_tree(&self) -> GenerationResult<Arc<dyn ExpressionTreeSupplier>> {
        Ok(self.snapshot()?.trees())
    }

    /// Monotonic: once `true`, stays `true`.
    fn is_program_safe(&self) -> bool;

    /// Fold an externally known fact into future rounds. Generators that
    /// cannot use it ignore it.
    fn inject_invariant(&self, _location: Location, _assumption: Assumption) -> GenerationResult<()> {
        Ok(())
    }

    fn state(&self) -> GeneratorState;
}

/// Generators that can replace themselves with a strictly more precise
/// version of themselves.
pub trait Adjustable: InvariantGenerator + Sized {
    /// `None` refuses further adjustment. The replacement is not started.
    fn adjust(&self) -> Option<Self>;
}

/// Start/cancel bookkeeping that every generator needs.
#[derive(Debug, Default)]
pub struct Lifecycle {
    entry: OnceLock<Location>,
    cancelled: AtomicBool,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_started(&self, entry: Location) {
        if self.entry.set(entry).is_err() {
            panic!("invariant generator started twice (second entry {entry})");
        }
    }

    pub fn is_started(&self) -> bool {
        self.entry.get().is_some()
    }

    pub fn entry(&self) -> Option<Location> {
        self.entry.get().copied()
    }

    /// Panics unless `start` has been called.
    pub fn ensure_started(&self, operation: &str) -> Location {
        match self.entry.get() {
            Some(entry) => *entry,
            None => panic!("{operation} called on an invariant generator that was never started"),
        }
    }

    /// Returns `true` the first time only.
    pub fn mark_cancelled(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Derive the externally visible state from the outcome of the
    /// generator's task, if it has one yet.
    pub fn state(&self, outcome: Option<GenerationResult<InvariantSnapshot>>) -> GeneratorState {
        if !self.is_started() {
            return GeneratorState::Created;
        }
        match outcome {
            Some(Ok(snapshot)) => GeneratorState::Completed(snapshot),
            Some(Err(e)) if e.is_cancelled() => GeneratorState::Cancelled,
            Some(Err(e)) => GeneratorState::Failed(e),
            None if self.is_cancelled() => GeneratorState::Cancelled,
            None => GeneratorState::Started,
        }
    }
}
