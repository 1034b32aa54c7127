//! Invariant generation for software verification.
//!
//! Generators compute facts that hold at program locations so that a
//! verifier can prune error states it would otherwise have to explore.
//! [`reachability_generator`] and [`k_induction_generator`] build the
//! generators the way a verifier consumes them:
//!
//! * reachability wrapped in an [`AdjustableGenerator`], which re-runs it
//!   with ever finer precision on request;
//! * or, asynchronously, in an [`AutoAdjustingGenerator`], which does the
//!   re-running on a background thread and never blocks readers;
//! * k-induction on its own.

pub mod adjustable;
pub mod auto_adjusting;
pub mod config;
pub mod factory;

#[cfg(test)]
mod fake;

pub use adjustable::AdjustableGenerator;
pub use auto_adjusting::AutoAdjustingGenerator;
pub use config::InvariantGenerationConfig;
pub use factory::{k_induction_generator, reachability_generator};

pub use invgen_core::{
    Assumption, ControlFlow, ExprTree, ExpressionTreeSupplier, Formula, GenerationError,
    GenerationResult, GeneratorState, InvariantGenerator, InvariantSnapshot, InvariantSupplier,
    Location, ShutdownManager, ShutdownNotifier, Statistics, StatisticsProvider,
};
pub use invgen_kinduction::{KInductionConfig, WitnessCandidate};
pub use invgen_reach::ReachabilityConfig;
