//! The k-induction invariant generator.

use crate::candidate::{CandidateInvariant, CandidateKind};
use crate::config::KInductionConfig;
use crate::engine::KInductionEngine;
use crate::pool::CandidatePool;
use crate::seed::{seed_pool, WitnessCandidate};
use invgen_core::{
    snapshot_channel, Assumption, ControlFlow, GenerationResult, GenerationTask, GeneratorState,
    InvariantGenerator, InvariantSnapshot, LatestSnapshot, Lifecycle, Location, ShutdownManager,
    ShutdownNotifier, SnapshotPublisher, Statistics, StatisticsProvider, Timer,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info, warn};

const CANCEL_MESSAGE: &str = "Invariant generation cancel requested.";

#[derive(Debug, Default)]
struct KInductionStats {
    timer: Timer,
    rounds: AtomicUsize,
    total_candidates: AtomicUsize,
    confirmed_candidates: AtomicUsize,
}

/// Confirms candidate invariants round by round with a k-induction engine.
///
/// In asynchronous mode the rounds run on a background thread started by
/// `start`, and `snapshot` returns whatever has been confirmed so far until
/// that thread finishes; from then on it returns the final result. In
/// synchronous mode the first `snapshot` call runs all rounds.
pub struct KInductionInvariantGenerator<E: KInductionEngine> {
    engine: Arc<Mutex<E>>,
    config: KInductionConfig,
    shutdown: ShutdownManager,
    lifecycle: Lifecycle,
    // Moved into the generation task by `start`.
    pending: Mutex<Option<RoundLoop<E>>>,
    task: OnceLock<GenerationTask<InvariantSnapshot>>,
    latest: LatestSnapshot,
    injections: Sender<(Location, Assumption)>,
    program_safe: Arc<AtomicBool>,
    stats: Arc<KInductionStats>,
}

impl<E: KInductionEngine> KInductionInvariantGenerator<E> {
    pub fn new(
        engine: E,
        pool: CandidatePool,
        config: KInductionConfig,
        parent: &ShutdownNotifier,
    ) -> Self {
        let shutdown = ShutdownManager::with_parent(parent);
        let (publisher, latest) = snapshot_channel();
        let (injections, injected) = mpsc::channel();
        let program_safe = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(KInductionStats::default());
        let engine = Arc::new(Mutex::new(engine));
        stats
            .total_candidates
            .store(pool.total_candidates(), Ordering::Relaxed);

        let round_loop = RoundLoop {
            engine: Arc::clone(&engine),
            pool,
            config: config.clone(),
            shutdown: shutdown.clone(),
            publisher,
            injected,
            program_safe: Arc::clone(&program_safe),
            stats: Arc::clone(&stats),
        };
        KInductionInvariantGenerator {
            engine,
            config,
            shutdown,
            lifecycle: Lifecycle::new(),
            pending: Mutex::new(Some(round_loop)),
            task: OnceLock::new(),
            latest,
            injections,
            program_safe,
            stats,
        }
    }

    /// Seed the candidate pool from the CFA, the error locations and the
    /// witness, then build the generator.
    pub fn from_cfa(
        engine: E,
        cfa: &dyn ControlFlow,
        targets: &BTreeSet<Location>,
        witness: &[WitnessCandidate],
        config: KInductionConfig,
        parent: &ShutdownNotifier,
    ) -> Self {
        let pool = seed_pool(cfa, targets, witness, &config);
        Self::new(engine, pool, config, parent)
    }

    pub fn config(&self) -> &KInductionConfig {
        &self.config
    }

    fn task(&self, operation: &str) -> &GenerationTask<InvariantSnapshot> {
        match self.task.get() {
            Some(task) => task,
            None => panic!("{operation} called on an invariant generator that was never started"),
        }
    }
}

/// Owns the round state. Lives inside the generation task.
struct RoundLoop<E: KInductionEngine> {
    engine: Arc<Mutex<E>>,
    pool: CandidatePool,
    config: KInductionConfig,
    shutdown: ShutdownManager,
    publisher: SnapshotPublisher,
    injected: Receiver<(Location, Assumption)>,
    program_safe: Arc<AtomicBool>,
    stats: Arc<KInductionStats>,
}

impl<E: KInductionEngine> RoundLoop<E> {
    fn run(mut self) -> GenerationResult<InvariantSnapshot> {
        let notifier = self.shutdown.notifier();
        notifier.shutdown_if_necessary()?;
        info!(
            candidates = self.pool.total_candidates(),
            "starting k-induction invariant generation"
        );

        let mut round = 0;
        loop {
            notifier.shutdown_if_necessary()?;
            self.take_injections();
            if !self.pool.has_proposed() {
                info!(round, "all candidate invariants resolved");
                break;
            }
            if round >= self.config.max_rounds {
                info!(round, "round limit reached, stopping k-induction");
                break;
            }
            round += 1;

            let candidates: Vec<CandidateInvariant> = self.pool.proposed().cloned().collect();
            let assumptions: Vec<CandidateInvariant> = self.pool.confirmed().cloned().collect();
            let outcome = self.engine.lock().unwrap().check_round(
                round,
                &candidates,
                &assumptions,
                &notifier,
            )?;
            let summary = self.pool.apply_round(&outcome);

            self.stats.rounds.fetch_add(1, Ordering::Relaxed);
            self.stats
                .confirmed_candidates
                .store(self.pool.confirmed_candidates(), Ordering::Relaxed);
            debug!(
                round,
                checked = candidates.len(),
                confirmed = summary.confirmed.len(),
                disproved = summary.disproved.len(),
                removed_locations = summary.removed_locations,
                "k-induction round finished"
            );
            if !summary.confirmed.is_empty() {
                self.publisher.publish(self.pool.snapshot());
            }

            if summary.safety_confirmed {
                info!(round, "k-induction proved the safety property");
                self.program_safe.store(true, Ordering::SeqCst);
            }
            if self.config.terminate_on_counterexample {
                for group in &summary.exhausted_groups {
                    info!(group, "witness invariant refuted at every location");
                    self.shutdown
                        .request_shutdown(format!("Incorrect invariant: {group}"));
                }
            }
            if summary.safety_confirmed {
                break;
            }
            if outcome.exhausted {
                info!(round, "k-induction engine cannot make further progress");
                break;
            }
        }

        let snapshot = self.pool.snapshot();
        self.publisher.publish(snapshot.clone());
        Ok(snapshot)
    }

    fn take_injections(&mut self) {
        while let Ok((location, assumption)) = self.injected.try_recv() {
            let id = self.pool.propose(
                assumption.as_tree(),
                [location],
                None,
                CandidateKind::Injected,
            );
            debug!(%id, %location, %assumption, "injected invariant proposed as candidate");
            self.stats
                .total_candidates
                .store(self.pool.total_candidates(), Ordering::Relaxed);
        }
    }
}

impl<E: KInductionEngine> InvariantGenerator for KInductionInvariantGenerator<E> {
    fn start(&self, entry: Location) {
        self.lifecycle.mark_started(entry);
        let round_loop = match self.pending.lock().unwrap().take() {
            Some(round_loop) => round_loop,
            None => panic!("invariant generator started twice"),
        };
        let stats = Arc::clone(&self.stats);
        let job = move || stats.timer.time(|| round_loop.run());
        let task = if self.config.run_async {
            GenerationTask::spawn("kinduction-invariant-generation", job)
        } else {
            GenerationTask::lazy(job)
        };
        if self.task.set(task).is_err() {
            panic!("invariant generator started twice");
        }
    }

    fn cancel(&self) {
        self.lifecycle.ensure_started("cancel");
        self.shutdown.request_shutdown(CANCEL_MESSAGE);
        if self.lifecycle.mark_cancelled() {
            debug!("cancelling k-induction invariant generation");
        }
    }

    fn snapshot(&self) -> GenerationResult<InvariantSnapshot> {
        let task = self.task("get");
        if self.lifecycle.is_cancelled() || (self.config.run_async && !task.is_done()) {
            return Ok(self.latest.latest_or_trivial());
        }
        let result = task.wait();
        if let Err(e) = &result {
            if !e.is_cancelled() {
                warn!(error = %e, "k-induction invariant generation failed");
            }
        }
        result
    }

    fn is_program_safe(&self) -> bool {
        self.program_safe.load(Ordering::SeqCst)
    }

    /// Becomes a proposed candidate at the start of the next round. Ignored
    /// once the rounds are over.
    fn inject_invariant(&self, location: Location, assumption: Assumption) -> GenerationResult<()> {
        if self.injections.send((location, assumption)).is_err() {
            debug!(%location, "k-induction already finished, injected invariant dropped");
        }
        Ok(())
    }

    fn state(&self) -> GeneratorState {
        self.lifecycle
            .state(self.task.get().and_then(GenerationTask::try_result))
    }
}

impl<E: KInductionEngine> StatisticsProvider for KInductionInvariantGenerator<E> {
    fn collect_statistics(&self, out: &mut Vec<Statistics>) {
        // Skipped while a round holds the engine.
        if let Ok(engine) = self.engine.try_lock() {
            out.extend(engine.statistics());
        }
        let mut stats = Statistics::new("k-Induction-based invariant generator");
        stats
            .put(
                "Time for invariant generation",
                format!("{:.3}s", self.stats.timer.total().as_secs_f64()),
            )
            .put("Number of rounds", self.stats.rounds.load(Ordering::Relaxed))
            .put(
                "Total number of candidates",
                self.stats.total_candidates.load(Ordering::Relaxed),
            )
            .put(
                "Number of confirmed candidates",
                self.stats.confirmed_candidates.load(Ordering::Relaxed),
            );
        out.push(stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::CandidateId;
    use crate::engine::RoundOutcome;
    use invgen_core::{EngineError, EngineResult, ExprTree};
    use std::collections::VecDeque;

    /// Replays one prepared outcome per round; confirms nothing afterwards.
    struct Replay {
        rounds: VecDeque<EngineResult<RoundOutcome>>,
        calls: Arc<AtomicUsize>,
        seen_assumptions: Arc<Mutex<Vec<usize>>>,
    }

    impl Replay {
        fn new(rounds: Vec<EngineResult<RoundOutcome>>) -> Self {
            Replay {
                rounds: rounds.into(),
                calls: Arc::new(AtomicUsize::new(0)),
                seen_assumptions: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl KInductionEngine for Replay {
        fn check_round(
            &mut self,
            _round: usize,
            _candidates: &[CandidateInvariant],
            assumptions: &[CandidateInvariant],
            _shutdown: &ShutdownNotifier,
        ) -> EngineResult<RoundOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_assumptions.lock().unwrap().push(assumptions.len());
            self.rounds.pop_front().unwrap_or_else(|| {
                Ok(RoundOutcome {
                    exhausted: true,
                    ..RoundOutcome::default()
                })
            })
        }
    }

    const L1: Location = Location::new(1);
    const L2: Location = Location::new(2);
    const ERR: Location = Location::new(9);

    fn sync_config() -> KInductionConfig {
        KInductionConfig {
            run_async: false,
            ..KInductionConfig::default()
        }
    }

    fn pool() -> (CandidatePool, CandidateId, CandidateId) {
        let mut pool = CandidatePool::new();
        let x = pool.propose(
            ExprTree::leaf("x >= 0", true),
            [L1, L2],
            None,
            CandidateKind::Witness,
        );
        let safety = pool.propose_safety_property([ERR]);
        (pool, x, safety)
    }

    fn confirm(ids: &[CandidateId]) -> EngineResult<RoundOutcome> {
        Ok(RoundOutcome {
            confirmed: ids.iter().copied().collect(),
            ..RoundOutcome::default()
        })
    }

    #[test]
    fn sync_mode_runs_on_first_query() {
        let (pool, x, safety) = pool();
        let engine = Replay::new(vec![confirm(&[x]), confirm(&[safety])]);
        let calls = Arc::clone(&engine.calls);
        let seen = Arc::clone(&engine.seen_assumptions);
        let g = KInductionInvariantGenerator::new(
            engine,
            pool,
            sync_config(),
            &ShutdownManager::new().notifier(),
        );
        g.start(Location::new(0));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let snapshot = g.snapshot().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(g.is_program_safe());
        assert_eq!(snapshot.tree_at(L1), ExprTree::leaf("x >= 0", true));
        assert!(snapshot.tree_at(ERR).is_false());
        // The second round assumed what the first one confirmed.
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
        assert!(matches!(g.state(), GeneratorState::Completed(_)));
    }

    #[test]
    fn refuted_location_keeps_candidate_alive() {
        let (pool, x, _) = pool();
        let engine = Replay::new(vec![Ok(RoundOutcome {
            confirmed: [x].into_iter().collect(),
            disproved_at: vec![(x, L2)],
            exhausted: true,
        })]);
        let g = KInductionInvariantGenerator::new(
            engine,
            pool,
            sync_config(),
            &ShutdownManager::new().notifier(),
        );
        g.start(Location::new(0));
        let snapshot = g.snapshot().unwrap();
        assert!(snapshot.is_trivial());
        assert!(!g.is_program_safe());
    }

    #[test]
    fn engine_failure_is_fatal() {
        let (pool, _, _) = pool();
        let engine = Replay::new(vec![Err(EngineError::Solver("unknown result".into()))]);
        let g = KInductionInvariantGenerator::new(
            engine,
            pool,
            sync_config(),
            &ShutdownManager::new().notifier(),
        );
        g.start(Location::new(0));
        assert!(g.snapshot().is_err());
        assert!(g.snapshot().is_err());
        assert!(matches!(g.state(), GeneratorState::Failed(_)));
    }

    #[test]
    fn round_limit_stops_generation() {
        let (pool, _, _) = pool();
        let engine = Replay::new(vec![confirm(&[]), confirm(&[]), confirm(&[])]);
        let calls = Arc::clone(&engine.calls);
        let config = KInductionConfig {
            max_rounds: 2,
            ..sync_config()
        };
        let g = KInductionInvariantGenerator::new(
            engine,
            pool,
            config,
            &ShutdownManager::new().notifier(),
        );
        g.start(Location::new(0));
        g.snapshot().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn emptied_witness_group_shuts_down_in_validation_mode() {
        let mut pool = CandidatePool::new();
        let w = pool.propose(
            ExprTree::leaf("x >= 0", true),
            [L1],
            Some("q0".into()),
            CandidateKind::Witness,
        );
        pool.propose_safety_property([ERR]);
        let engine = Replay::new(vec![Ok(RoundOutcome {
            disproved_at: vec![(w, L1)],
            ..RoundOutcome::default()
        })]);
        let calls = Arc::clone(&engine.calls);
        let config = KInductionConfig {
            terminate_on_counterexample: true,
            ..sync_config()
        };
        let g = KInductionInvariantGenerator::new(
            engine,
            pool,
            config,
            &ShutdownManager::new().notifier(),
        );
        g.start(Location::new(0));
        match g.snapshot() {
            Err(e) => assert!(e.to_string().contains("Incorrect invariant: q0")),
            Ok(_) => panic!("expected shutdown"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn injected_invariants_become_candidates() {
        let mut pool = CandidatePool::new();
        pool.propose_safety_property([ERR]);
        let engine = Replay::new(vec![confirm(&[CandidateId(1)])]);
        let g = KInductionInvariantGenerator::new(
            engine,
            pool,
            sync_config(),
            &ShutdownManager::new().notifier(),
        );
        g.inject_invariant(L2, Assumption::new("y == 1", true)).unwrap();
        g.start(Location::new(0));
        let snapshot = g.snapshot().unwrap();
        assert_eq!(snapshot.tree_at(L2), ExprTree::leaf("y == 1", true));

        let mut stats = Vec::new();
        g.collect_statistics(&mut stats);
        let ours = stats.last().unwrap();
        assert_eq!(ours.get("Total number of candidates"), Some("1"));
        assert_eq!(ours.get("Number of confirmed candidates"), Some("1"));
    }

    #[test]
    fn cancelled_sync_generator_never_runs() {
        let (pool, _, _) = pool();
        let engine = Replay::new(vec![]);
        let calls = Arc::clone(&engine.calls);
        let g = KInductionInvariantGenerator::new(
            engine,
            pool,
            sync_config(),
            &ShutdownManager::new().notifier(),
        );
        g.start(Location::new(0));
        g.cancel();
        assert!(g.snapshot().unwrap().is_trivial());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn async_mode_returns_final_result_once_done() {
        let (pool, x, safety) = pool();
        let engine = Replay::new(vec![confirm(&[x, safety])]);
        let g = KInductionInvariantGenerator::new(
            engine,
            pool,
            KInductionConfig::default(),
            &ShutdownManager::new().notifier(),
        );
        g.start(Location::new(0));
        g.task("wait").wait().unwrap();
        let first = g.snapshot().unwrap();
        let second = g.snapshot().unwrap();
        assert_eq!(first.tree_at(L1), ExprTree::leaf("x >= 0", true));
        assert_eq!(second.tree_at(L1), first.tree_at(L1));
        assert!(g.is_program_safe());
    }
}
