//! Composing generators the way a verifier consumes them.

use crate::adjustable::AdjustableGenerator;
use crate::auto_adjusting::AutoAdjustingGenerator;
use crate::config::InvariantGenerationConfig;
use invgen_core::{
    ControlFlow, GenerationResult, InvariantGenerator, Location, ShutdownManager, ShutdownNotifier,
};
use invgen_kinduction::{
    KInductionConfig, KInductionEngine, KInductionInvariantGenerator, WitnessCandidate,
};
use invgen_reach::{ReachabilityEngine, ReachabilityInvariantGenerator};
use std::collections::BTreeSet;
use tracing::debug;

/// Reachability-based invariant generation.
///
/// The generator is always wrapped so that it can be adjusted; with
/// `run_async` the adjusting happens on a background thread. The returned
/// generator has not been started.
pub fn reachability_generator<E: ReachabilityEngine>(
    config: &InvariantGenerationConfig,
    engine: E,
    parent: &ShutdownNotifier,
    shutdown_on_safe: Option<ShutdownManager>,
) -> Box<dyn InvariantGenerator> {
    let initial =
        ReachabilityInvariantGenerator::new(engine, config.reachability(), parent, shutdown_on_safe);
    let adjustable = AdjustableGenerator::new(initial);
    debug!(
        run_async = config.run_async,
        adjust_conditions = config.adjust_conditions,
        "creating reachability invariant generator"
    );
    if config.run_async {
        Box::new(AutoAdjustingGenerator::new(adjustable, parent))
    } else {
        Box::new(adjustable)
    }
}

/// k-induction-based invariant generation, with candidates seeded from the
/// CFA, the witness and the target locations.
pub fn k_induction_generator<E: KInductionEngine>(
    config: &KInductionConfig,
    engine: E,
    cfa: &dyn ControlFlow,
    targets: &BTreeSet<Location>,
    witness: &[WitnessCandidate],
    parent: &ShutdownNotifier,
) -> GenerationResult<Box<dyn InvariantGenerator>> {
    config.validate()?;
    Ok(Box::new(KInductionInvariantGenerator::from_cfa(
        engine,
        cfa,
        targets,
        witness,
        config.clone(),
        parent,
    )))
}
