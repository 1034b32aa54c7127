//! What the generator needs from a reachability engine.

use crate::reached::ReachedSet;
use invgen_core::{
    Assumption, EngineResult, ExprTree, Formula, Location, ShutdownNotifier, Statistics,
};

/// An explored abstract state, as far as invariant extraction cares.
pub trait AbstractState: Send + Sync + 'static {
    /// Locations this state belongs to. Usually exactly one.
    fn locations(&self) -> Vec<Location>;

    fn is_target(&self) -> bool;

    /// Boolean-formula approximation of the state. `None` if the state
    /// reports nothing, which reads as `true`.
    fn formula_approximation(&self) -> Option<Formula>;

    /// Expression-tree approximation of the state at `location`. `None` if
    /// the state reports nothing.
    fn tree_approximation(&self, location: Location) -> Option<ExprTree>;

    /// Partial order of the abstract domain: `self` is covered by `other`.
    fn is_less_or_equal(&self, other: &Self) -> bool;
}

/// Outcome of one engine run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmStatus {
    /// `false` if the engine took shortcuts that make the reached set an
    /// unreliable over-approximation.
    pub sound: bool,
}

impl AlgorithmStatus {
    pub const SOUND: AlgorithmStatus = AlgorithmStatus { sound: true };
    pub const UNSOUND: AlgorithmStatus = AlgorithmStatus { sound: false };
}

pub trait ReachabilityEngine: Send + 'static {
    type State: AbstractState;
    type Precision: Send + 'static;

    fn initial_state(&mut self, location: Location) -> Self::State;

    fn initial_precision(&mut self, location: Location) -> Self::Precision;

    /// Explore from the waiting states of `reached`. May return before the
    /// waitlist is empty; the caller keeps calling until it is. Engines are
    /// expected to poll `shutdown` and return [`EngineError::Interrupted`]
    /// when it fires.
    ///
    /// [`EngineError::Interrupted`]: invgen_core::EngineError::Interrupted
    fn run(
        &mut self,
        reached: &mut ReachedSet<Self::State, Self::Precision>,
        shutdown: &ShutdownNotifier,
    ) -> EngineResult<AlgorithmStatus>;

    /// Make the next run strictly more precise. Returns `false` if the
    /// engine is already as precise as it gets.
    fn adjust_precision(&mut self) -> bool {
        false
    }

    /// Accept an externally known fact. Returns `false` if the engine has no
    /// use for it.
    fn inject_invariant(&mut self, _location: Location, _assumption: &Assumption) -> EngineResult<bool> {
        Ok(false)
    }

    fn statistics(&self) -> Option<Statistics> {
        None
    }
}
