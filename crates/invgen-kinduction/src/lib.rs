//! k-induction based invariant generation.
//!
//! A pool of candidate invariants is seeded from the control-flow automaton
//! (negated branch conditions on the way to the error locations), from
//! externally supplied witness candidates, and from the safety property
//! itself. Each round hands the unresolved candidates to a k-induction
//! engine together with everything confirmed so far; refuted locations are
//! removed and confirmed candidates become assumptions for later rounds.

pub mod candidate;
pub mod config;
pub mod engine;
pub mod generator;
pub mod pool;
pub mod seed;

pub use candidate::{CandidateGroup, CandidateId, CandidateInvariant, CandidateKind, CandidateStatus};
pub use config::KInductionConfig;
pub use engine::{KInductionEngine, RoundOutcome};
pub use generator::KInductionInvariantGenerator;
pub use pool::{CandidatePool, RoundSummary};
pub use seed::{relevant_assume_edges, seed_pool, WitnessCandidate};
