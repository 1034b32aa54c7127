//! The reachability invariant generator.

use crate::config::ReachabilityConfig;
use crate::engine::ReachabilityEngine;
use crate::reached::ReachedSet;
use crate::supplier::ReachedSetInvariants;
use dashmap::DashMap;
use invgen_core::{
    Adjustable, Assumption, GenerationResult, GenerationTask, GeneratorState, InvariantGenerator,
    InvariantSnapshot, Lifecycle, Location, ShutdownManager, ShutdownNotifier, Statistics,
    StatisticsProvider, Timer,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info, warn};

const SAFE_MESSAGE: &str =
    "Invariant generation with abstract interpretation proved the program safe.";
const CANCEL_MESSAGE: &str = "Invariant generation cancel requested.";

type InjectionQueue = DashMap<Location, Vec<Assumption>>;

/// Runs a reachability engine once from the entry location and exposes the
/// reached set as invariants.
///
/// The run is lazy: `start` only prepares it and the first `snapshot` call
/// performs it on the calling thread, blocking until a fixpoint is reached.
/// Later calls return the same result.
pub struct ReachabilityInvariantGenerator<E: ReachabilityEngine> {
    // Shared with every adjusted successor.
    engine: Arc<Mutex<E>>,
    shutdown: ShutdownManager,
    shutdown_on_safe: Option<ShutdownManager>,
    injected: Arc<InjectionQueue>,
    timer: Arc<Timer>,
    config: ReachabilityConfig,
    iteration: u32,

    lifecycle: Lifecycle,
    task: OnceLock<GenerationTask<InvariantSnapshot>>,
    program_safe: Arc<AtomicBool>,
}

impl<E: ReachabilityEngine> ReachabilityInvariantGenerator<E> {
    /// `parent` stops this generator; cancelling this generator does not stop
    /// `parent`. If the program is proved safe, `shutdown_on_safe` is asked to
    /// shut down so that siblings can stop early.
    pub fn new(
        engine: E,
        config: ReachabilityConfig,
        parent: &ShutdownNotifier,
        shutdown_on_safe: Option<ShutdownManager>,
    ) -> Self {
        ReachabilityInvariantGenerator {
            engine: Arc::new(Mutex::new(engine)),
            shutdown: ShutdownManager::with_parent(parent),
            shutdown_on_safe,
            injected: Arc::new(DashMap::new()),
            timer: Arc::new(Timer::new()),
            config,
            iteration: 1,
            lifecycle: Lifecycle::new(),
            task: OnceLock::new(),
            program_safe: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn config(&self) -> &ReachabilityConfig {
        &self.config
    }

    /// Assumptions injected but not yet handed to the engine.
    pub fn pending_injections(&self) -> usize {
        self.injected.iter().map(|e| e.value().len()).sum()
    }

    fn task(&self, operation: &str) -> &GenerationTask<InvariantSnapshot> {
        match self.task.get() {
            Some(task) => task,
            None => panic!("{operation} called on an invariant generator that was never started"),
        }
    }
}

/// One reachability round, run inside the generation task.
struct Round<E: ReachabilityEngine> {
    engine: Arc<Mutex<E>>,
    shutdown: ShutdownNotifier,
    shutdown_on_safe: Option<ShutdownManager>,
    injected: Arc<InjectionQueue>,
    program_safe: Arc<AtomicBool>,
    iteration: u32,
    entry: Location,
}

impl<E: ReachabilityEngine> Round<E> {
    fn run(self) -> GenerationResult<InvariantSnapshot> {
        self.shutdown.shutdown_if_necessary()?;
        info!(
            iteration = self.iteration,
            entry = %self.entry,
            "starting iteration of invariant generation with abstract interpretation"
        );

        let mut engine = self.engine.lock().unwrap();
        self.hand_over_injections(&mut engine)?;

        let mut reached = ReachedSet::new();
        let state = engine.initial_state(self.entry);
        let precision = engine.initial_precision(self.entry);
        reached.add(state, precision);

        while reached.has_waiting_state() {
            self.shutdown.shutdown_if_necessary()?;
            let status = engine.run(&mut reached, &self.shutdown)?;
            if !status.sound {
                info!(
                    iteration = self.iteration,
                    "reachability run was unsound, ignoring its result"
                );
                return Ok(InvariantSnapshot::trivial());
            }
        }
        drop(engine);

        debug!(
            iteration = self.iteration,
            states = reached.len(),
            "reachability run reached a fixpoint"
        );

        if !reached.contains_target() {
            info!(iteration = self.iteration, "{SAFE_MESSAGE}");
            self.program_safe.store(true, Ordering::SeqCst);
            if let Some(on_safe) = &self.shutdown_on_safe {
                on_safe.request_shutdown(SAFE_MESSAGE);
            }
        }

        let invariants = Arc::new(ReachedSetInvariants::new(reached.into_states()));
        Ok(InvariantSnapshot::new(invariants.clone(), invariants))
    }

    fn hand_over_injections(&self, engine: &mut E) -> GenerationResult<()> {
        let mut locations: Vec<Location> = self.injected.iter().map(|e| *e.key()).collect();
        locations.sort();
        for location in locations {
            let Some((_, assumptions)) = self.injected.remove(&location) else {
                continue;
            };
            for assumption in &assumptions {
                if !engine.inject_invariant(location, assumption)? {
                    debug!(%location, %assumption, "engine ignored injected invariant");
                }
            }
        }
        Ok(())
    }
}

impl<E: ReachabilityEngine> InvariantGenerator for ReachabilityInvariantGenerator<E> {
    fn start(&self, entry: Location) {
        self.lifecycle.mark_started(entry);
        let round = Round {
            engine: Arc::clone(&self.engine),
            shutdown: self.shutdown.notifier(),
            shutdown_on_safe: self.shutdown_on_safe.clone(),
            injected: Arc::clone(&self.injected),
            program_safe: Arc::clone(&self.program_safe),
            iteration: self.iteration,
            entry,
        };
        let timer = Arc::clone(&self.timer);
        let task = GenerationTask::lazy(move || timer.time(|| round.run()));
        if self.task.set(task).is_err() {
            panic!("invariant generator started twice");
        }
    }

    fn cancel(&self) {
        self.lifecycle.ensure_started("cancel");
        if self.lifecycle.mark_cancelled() {
            debug!(iteration = self.iteration, "cancelling reachability invariant generation");
        }
        self.shutdown.request_shutdown(CANCEL_MESSAGE);
    }

    fn snapshot(&self) -> GenerationResult<InvariantSnapshot> {
        let result = self.task("get").wait();
        if let Err(e) = &result {
            if !e.is_cancelled() {
                warn!(iteration = self.iteration, error = %e, "reachability invariant generation failed");
            }
        }
        result
    }

    fn is_program_safe(&self) -> bool {
        self.program_safe.load(Ordering::SeqCst)
    }

    fn inject_invariant(&self, location: Location, assumption: Assumption) -> GenerationResult<()> {
        debug!(%location, %assumption, "queueing injected invariant");
        self.injected.entry(location).or_default().push(assumption);
        Ok(())
    }

    fn state(&self) -> GeneratorState {
        self.lifecycle
            .state(self.task.get().and_then(GenerationTask::try_result))
    }
}

impl<E: ReachabilityEngine> Adjustable for ReachabilityInvariantGenerator<E> {
    fn adjust(&self) -> Option<Self> {
        if !self.config.adjust_conditions {
            return None;
        }
        if !self.engine.lock().unwrap().adjust_precision() {
            info!(
                iteration = self.iteration,
                "engine could not adjust precision, stopping invariant generation"
            );
            return None;
        }
        info!(
            iteration = self.iteration + 1,
            "adjusted precision for invariant generation"
        );
        Some(ReachabilityInvariantGenerator {
            engine: Arc::clone(&self.engine),
            shutdown: self.shutdown.clone(),
            shutdown_on_safe: self.shutdown_on_safe.clone(),
            injected: Arc::clone(&self.injected),
            timer: Arc::clone(&self.timer),
            config: self.config.clone(),
            iteration: self.iteration + 1,
            lifecycle: Lifecycle::new(),
            task: OnceLock::new(),
            program_safe: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl<E: ReachabilityEngine> StatisticsProvider for ReachabilityInvariantGenerator<E> {
    fn collect_statistics(&self, out: &mut Vec<Statistics>) {
        if let Ok(engine) = self.engine.try_lock() {
            out.extend(engine.statistics());
        }
        let mut stats = Statistics::new("Invariant generation (reachability)");
        stats
            .put("iteration", self.iteration)
            .put("runs", self.timer.intervals())
            .put("time", format!("{:.3}s", self.timer.total().as_secs_f64()))
            .put("program proved safe", self.is_program_safe());
        out.push(stats);
    }
}
