//! Scripted engines for exercising the invariant generators.
//!
//! The engines here do no analysis. They replay a script, count how often
//! they are invoked, and can be held at a [`Gate`] so that tests can observe
//! a generator while a round is still running.

use invgen_core::{
    Assumption, EngineError, EngineResult, ExprTree, Formula, Location, ShutdownNotifier,
    Statistics,
};
use invgen_kinduction::{CandidateInvariant, KInductionEngine, RoundOutcome};
use invgen_reach::{AbstractState, AlgorithmStatus, ReachabilityEngine, ReachedSet};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Route `tracing` output of a test run to the test harness, filtered by
/// `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// Holds engine runs until opened. Waiting runs still notice shutdown.
#[derive(Debug)]
pub struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    pub fn opened() -> Self {
        Gate {
            open: Mutex::new(true),
            changed: Condvar::new(),
        }
    }

    pub fn closed() -> Self {
        Gate {
            open: Mutex::new(false),
            changed: Condvar::new(),
        }
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.changed.notify_all();
    }

    fn pass(&self, shutdown: &ShutdownNotifier) -> EngineResult<()> {
        let mut open = self.open.lock().unwrap();
        loop {
            if let Some(reason) = shutdown.reason() {
                return Err(EngineError::Interrupted(reason.to_string()));
            }
            if *open {
                return Ok(());
            }
            open = self
                .changed
                .wait_timeout(open, Duration::from_millis(5))
                .unwrap()
                .0;
        }
    }
}

/// What one precision level of [`ScriptedReachability`] reaches.
#[derive(Debug, Clone)]
pub struct ReachRound {
    pub sound: bool,
    /// One explored state per entry.
    pub states: Vec<(Location, ExprTree)>,
    pub target: Option<Location>,
}

impl ReachRound {
    pub fn safe(states: Vec<(Location, ExprTree)>) -> Self {
        ReachRound {
            sound: true,
            states,
            target: None,
        }
    }

    pub fn reaching_target(states: Vec<(Location, ExprTree)>, target: Location) -> Self {
        ReachRound {
            sound: true,
            states,
            target: Some(target),
        }
    }

    pub fn unsound(mut self) -> Self {
        self.sound = false;
        self
    }
}

/// A state of [`ScriptedReachability`]. `None` is the top element of its
/// location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedState {
    pub location: Location,
    pub tree: Option<ExprTree>,
    pub target: bool,
}

impl AbstractState for ScriptedState {
    fn locations(&self) -> Vec<Location> {
        vec![self.location]
    }

    fn is_target(&self) -> bool {
        self.target
    }

    fn formula_approximation(&self) -> Option<Formula> {
        self.tree.as_ref().map(ExprTree::to_formula)
    }

    fn tree_approximation(&self, _location: Location) -> Option<ExprTree> {
        self.tree.clone()
    }

    fn is_less_or_equal(&self, other: &Self) -> bool {
        self.location == other.location && (other.tree.is_none() || self.tree == other.tree)
    }
}

/// Counters shared between a scripted engine and the test observing it.
#[derive(Debug)]
pub struct Probe {
    pub runs: AtomicUsize,
    pub adjustments: AtomicUsize,
    pub injected: Mutex<Vec<(Location, Assumption)>>,
    /// Number of assumptions handed to each k-induction round.
    pub assumptions: Mutex<Vec<usize>>,
    pub gate: Gate,
}

impl Probe {
    fn new(gate: Gate) -> Arc<Self> {
        Arc::new(Probe {
            runs: AtomicUsize::new(0),
            adjustments: AtomicUsize::new(0),
            injected: Mutex::new(Vec::new()),
            assumptions: Mutex::new(Vec::new()),
            gate,
        })
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn adjustments(&self) -> usize {
        self.adjustments.load(Ordering::SeqCst)
    }
}

/// Reachability engine replaying one [`ReachRound`] per precision level.
/// Adjusting moves to the next level until the script runs out.
pub struct ScriptedReachability {
    levels: Vec<ReachRound>,
    level: usize,
    probe: Arc<Probe>,
}

impl ScriptedReachability {
    pub fn new(levels: Vec<ReachRound>) -> Self {
        assert!(!levels.is_empty(), "a script needs at least one level");
        ScriptedReachability {
            levels,
            level: 0,
            probe: Probe::new(Gate::opened()),
        }
    }

    /// Every run waits at a closed gate until the test opens it.
    pub fn gated(mut self) -> Self {
        self.probe = Probe::new(Gate::closed());
        self
    }

    pub fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }
}

impl ReachabilityEngine for ScriptedReachability {
    type State = ScriptedState;
    type Precision = usize;

    fn initial_state(&mut self, location: Location) -> ScriptedState {
        ScriptedState {
            location,
            tree: None,
            target: false,
        }
    }

    fn initial_precision(&mut self, _location: Location) -> usize {
        self.level
    }

    fn run(
        &mut self,
        reached: &mut ReachedSet<ScriptedState, usize>,
        shutdown: &ShutdownNotifier,
    ) -> EngineResult<AlgorithmStatus> {
        self.probe.runs.fetch_add(1, Ordering::SeqCst);
        self.probe.gate.pass(shutdown)?;

        let round = &self.levels[self.level];
        for (location, tree) in &round.states {
            let state = ScriptedState {
                location: *location,
                tree: Some(tree.clone()),
                target: false,
            };
            if !reached.covers(&state) {
                reached.add(state, self.level);
            }
        }
        if let Some(location) = round.target {
            let state = ScriptedState {
                location,
                tree: None,
                target: true,
            };
            reached.add(state, self.level);
        }
        while reached.pop_waiting().is_some() {}

        Ok(if round.sound {
            AlgorithmStatus::SOUND
        } else {
            AlgorithmStatus::UNSOUND
        })
    }

    fn adjust_precision(&mut self) -> bool {
        if self.level + 1 >= self.levels.len() {
            return false;
        }
        self.level += 1;
        self.probe.adjustments.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn inject_invariant(&mut self, location: Location, assumption: &Assumption) -> EngineResult<bool> {
        self.probe
            .injected
            .lock()
            .unwrap()
            .push((location, assumption.clone()));
        Ok(true)
    }

    fn statistics(&self) -> Option<Statistics> {
        let mut stats = Statistics::new("Scripted reachability");
        stats.put("precision level", self.level);
        Some(stats)
    }
}

/// k-induction engine with a fixed notion of truth.
///
/// A candidate is refuted at every location listed for its expression in
/// `false_at`; otherwise it is confirmed from the round listed in
/// `provable`. The safety property is confirmed from `safe_from` on.
pub struct ScriptedKInduction {
    provable: BTreeMap<String, usize>,
    false_at: BTreeSet<(String, Location)>,
    safe_from: Option<usize>,
    failing_round: Option<usize>,
    probe: Arc<Probe>,
}

impl Default for ScriptedKInduction {
    fn default() -> Self {
        ScriptedKInduction {
            provable: BTreeMap::new(),
            false_at: BTreeSet::new(),
            safe_from: None,
            failing_round: None,
            probe: Probe::new(Gate::opened()),
        }
    }
}

impl ScriptedKInduction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provable(mut self, expression: &ExprTree, from_round: usize) -> Self {
        self.provable.insert(expression.to_string(), from_round);
        self
    }

    pub fn false_at(mut self, expression: &ExprTree, location: Location) -> Self {
        self.false_at.insert((expression.to_string(), location));
        self
    }

    pub fn safe_from(mut self, round: usize) -> Self {
        self.safe_from = Some(round);
        self
    }

    pub fn failing_in(mut self, round: usize) -> Self {
        self.failing_round = Some(round);
        self
    }

    pub fn gated(mut self) -> Self {
        self.probe = Probe::new(Gate::closed());
        self
    }

    pub fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }

    fn provable_from(&self, candidate: &CandidateInvariant) -> Option<usize> {
        if candidate.is_safety_property() {
            self.safe_from
        } else {
            self.provable.get(&candidate.expression.to_string()).copied()
        }
    }
}

impl KInductionEngine for ScriptedKInduction {
    fn check_round(
        &mut self,
        round: usize,
        candidates: &[CandidateInvariant],
        assumptions: &[CandidateInvariant],
        shutdown: &ShutdownNotifier,
    ) -> EngineResult<RoundOutcome> {
        self.probe.runs.fetch_add(1, Ordering::SeqCst);
        self.probe.assumptions.lock().unwrap().push(assumptions.len());
        self.probe.gate.pass(shutdown)?;
        if self.failing_round == Some(round) {
            return Err(EngineError::Solver(format!("solver gave up in round {round}")));
        }

        let mut outcome = RoundOutcome::default();
        let mut pending = false;
        for candidate in candidates {
            let expression = candidate.expression.to_string();
            let refuted: Vec<Location> = candidate
                .locations
                .iter()
                .copied()
                .filter(|location| self.false_at.contains(&(expression.clone(), *location)))
                .collect();
            if !refuted.is_empty() && !candidate.is_safety_property() {
                outcome
                    .disproved_at
                    .extend(refuted.into_iter().map(|location| (candidate.id, location)));
                continue;
            }
            match self.provable_from(candidate) {
                Some(from) if round >= from => {
                    outcome.confirmed.insert(candidate.id);
                }
                Some(_) => pending = true,
                None => {}
            }
        }
        outcome.exhausted =
            !pending && outcome.confirmed.is_empty() && outcome.disproved_at.is_empty();
        Ok(outcome)
    }

    fn statistics(&self) -> Option<Statistics> {
        let mut stats = Statistics::new("Scripted k-induction");
        stats.put("rounds checked", self.probe.runs());
        Some(stats)
    }
}

/// `x <= bound` as a leaf.
pub fn at_most(variable: &str, bound: i64) -> ExprTree {
    ExprTree::leaf(format!("{variable} <= {bound}"), true)
}
