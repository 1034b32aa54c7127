//! Reachability-based invariant generation.
//!
//! [`ReachabilityInvariantGenerator`] seeds a [`ReachedSet`] at the entry
//! location, lets an external [`ReachabilityEngine`] explore it to a
//! fixpoint, and reads invariants off the explored states: per location, the
//! disjunction of what every state reached there reports about itself.

pub mod config;
pub mod engine;
pub mod generator;
pub mod reached;
pub mod supplier;

pub use config::ReachabilityConfig;
pub use engine::{AbstractState, AlgorithmStatus, ReachabilityEngine};
pub use generator::ReachabilityInvariantGenerator;
pub use reached::ReachedSet;
pub use supplier::ReachedSetInvariants;
