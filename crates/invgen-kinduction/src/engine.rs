//! What the generator needs from a k-induction engine.

use crate::candidate::{CandidateId, CandidateInvariant};
use invgen_core::{EngineResult, Location, ShutdownNotifier, Statistics};
use std::collections::BTreeSet;

/// The engine's verdict for one round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Candidates that hold at all their locations (base case and inductive
    /// step both passed).
    pub confirmed: BTreeSet<CandidateId>,
    /// Concrete counterexamples: the candidate is false at the location.
    pub disproved_at: Vec<(CandidateId, Location)>,
    /// The engine cannot make further progress (e.g. maximal k reached).
    pub exhausted: bool,
}

pub trait KInductionEngine: Send + 'static {
    /// Run base case and inductive step for `candidates`, assuming that
    /// everything in `assumptions` holds. `round` starts at 1.
    ///
    /// Engines poll `shutdown` at their own checkpoints and return
    /// [`EngineError::Interrupted`] when it fires.
    ///
    /// [`EngineError::Interrupted`]: invgen_core::EngineError::Interrupted
    fn check_round(
        &mut self,
        round: usize,
        candidates: &[CandidateInvariant],
        assumptions: &[CandidateInvariant],
        shutdown: &ShutdownNotifier,
    ) -> EngineResult<RoundOutcome>;

    fn statistics(&self) -> Option<Statistics> {
        None
    }
}
