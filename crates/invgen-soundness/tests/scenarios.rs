//! End-to-end scenarios over the generator compositions.

use invgen::{
    k_induction_generator, reachability_generator, AutoAdjustingGenerator, GeneratorState,
    InvariantGenerationConfig, InvariantGenerator, StatisticsProvider, WitnessCandidate,
};
use invgen_core::{
    Assumption, CfaEdge, EdgeKind, EdgeListCfa, ExprTree, Location, ShutdownManager,
};
use invgen_kinduction::{
    CandidateKind, CandidatePool, CandidateStatus, KInductionConfig, KInductionEngine,
    KInductionInvariantGenerator,
};
use invgen_reach::{ReachabilityConfig, ReachabilityInvariantGenerator};
use invgen_soundness::{at_most, init_tracing, ReachRound, ScriptedKInduction, ScriptedReachability};
use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

const L0: Location = Location::new(0);
const L1: Location = Location::new(1);
const L2: Location = Location::new(2);
const ERROR: Location = Location::new(9);

fn x_nonneg() -> ExprTree {
    ExprTree::leaf("x >= 0", true)
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..2_000 {
        if condition() {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("condition not reached in time");
}

#[test]
fn candidate_refuted_at_one_of_two_locations() {
    init_tracing();
    let mut pool = CandidatePool::new();
    let id = pool.propose(x_nonneg(), [L1, L2], None, CandidateKind::Witness);
    pool.propose_safety_property([ERROR]);

    let mut engine = ScriptedKInduction::new()
        .provable(&x_nonneg(), 1)
        .false_at(&x_nonneg(), L2);
    let proposed: Vec<_> = pool.proposed().cloned().collect();
    let outcome = engine
        .check_round(1, &proposed, &[], &ShutdownManager::new().notifier())
        .unwrap();
    let summary = pool.apply_round(&outcome);

    let candidate = pool.get(id).unwrap();
    assert_eq!(candidate.locations, [L1].into_iter().collect());
    assert_eq!(candidate.status, CandidateStatus::Proposed);
    assert!(summary.disproved.is_empty());
    assert!(summary.confirmed.is_empty());

    // Next round: nothing left to refute, so it is confirmed at L1.
    let proposed: Vec<_> = pool.proposed().cloned().collect();
    let outcome = engine
        .check_round(2, &proposed, &[], &ShutdownManager::new().notifier())
        .unwrap();
    pool.apply_round(&outcome);
    assert!(pool.get(id).unwrap().is_confirmed());
    assert_eq!(pool.snapshot().tree_at(L1), x_nonneg());
}

#[test]
fn auto_adjusting_from_coarse_to_safe() {
    init_tracing();
    // P0 explores coarsely and reaches the error location; P1 proves it unreachable.
    let engine = ScriptedReachability::new(vec![
        ReachRound::reaching_target(vec![(L1, ExprTree::True)], ERROR),
        ReachRound::safe(vec![(L1, at_most("x", 10))]),
    ])
    .gated();
    let probe = engine.probe();
    let parent = ShutdownManager::new();
    let g = AutoAdjustingGenerator::wrap(
        ReachabilityInvariantGenerator::new(
            engine,
            ReachabilityConfig {
                adjust_conditions: true,
            },
            &parent.notifier(),
            None,
        ),
        &parent.notifier(),
    );
    g.start(L0);

    let first = g.snapshot().unwrap();
    assert!(first.is_trivial());
    assert!(first.formula_at(L1).is_true());
    assert!(!g.is_program_safe());

    probe.gate.open();
    g.wait().unwrap();
    assert!(g.is_program_safe());
    assert_eq!(g.snapshot().unwrap().tree_at(L1), at_most("x", 10));
    assert_eq!(g.inner().rounds(), 2);
    assert_eq!(probe.adjustments(), 1);
    assert!(matches!(g.state(), GeneratorState::Completed(_)));
}

#[test]
fn cancel_before_first_round_never_runs_the_engine() {
    init_tracing();
    let engine = ScriptedReachability::new(vec![ReachRound::safe(vec![(L1, at_most("x", 1))])]);
    let probe = engine.probe();
    let parent = ShutdownManager::new();
    let g = AutoAdjustingGenerator::wrap(
        ReachabilityInvariantGenerator::new(
            engine,
            ReachabilityConfig::default(),
            &parent.notifier(),
            None,
        ),
        &parent.notifier(),
    );
    // The verifier finished before invariant generation got going.
    parent.request_shutdown("verification finished");
    g.start(L0);

    assert!(g.wait().unwrap_err().is_cancelled());
    assert_eq!(probe.runs(), 0);
    assert!(g.snapshot().unwrap().is_trivial());
    assert!(matches!(g.state(), GeneratorState::Cancelled));
}

#[test]
fn cancel_interrupts_a_running_round() {
    init_tracing();
    let engine = ScriptedReachability::new(vec![ReachRound::safe(vec![(L1, at_most("x", 1))])]).gated();
    let probe = engine.probe();
    let g = AutoAdjustingGenerator::wrap(
        ReachabilityInvariantGenerator::new(
            engine,
            ReachabilityConfig::default(),
            &ShutdownManager::new().notifier(),
            None,
        ),
        &ShutdownManager::new().notifier(),
    );
    g.start(L0);
    wait_until(|| probe.runs() == 1);
    g.cancel();
    g.cancel();

    assert!(g.wait().unwrap_err().is_cancelled());
    assert!(g.snapshot().unwrap().is_trivial());
    assert!(!g.is_program_safe());
}

#[test]
fn proof_of_safety_stops_siblings() {
    init_tracing();
    let verifier = ShutdownManager::new();
    let siblings = ShutdownManager::new();
    let config = InvariantGenerationConfig::default();
    let engine = ScriptedReachability::new(vec![ReachRound::safe(vec![(L1, at_most("x", 3))])]);
    let g = reachability_generator(&config, engine, &verifier.notifier(), Some(siblings.clone()));
    g.start(L0);

    let snapshot = g.snapshot().unwrap();
    assert_eq!(snapshot.tree_at(L1), at_most("x", 3));
    assert!(snapshot.tree_at(L2).is_false());
    assert!(g.is_program_safe());
    assert!(siblings.notifier().should_shutdown());
    assert!(!verifier.notifier().should_shutdown());
}

#[test]
fn injected_invariants_reach_the_next_round() {
    init_tracing();
    let engine = ScriptedReachability::new(vec![
        ReachRound::reaching_target(vec![(L1, ExprTree::True)], ERROR),
        ReachRound::safe(vec![(L1, at_most("x", 5))]),
    ]);
    let probe = engine.probe();
    let config = InvariantGenerationConfig::from_json_str(r#"{"adjust_conditions": true}"#).unwrap();
    let g = invgen::AdjustableGenerator::new(ReachabilityInvariantGenerator::new(
        engine,
        config.reachability(),
        &ShutdownManager::new().notifier(),
        None,
    ));
    g.start(L0);
    g.snapshot().unwrap();
    g.inject_invariant(L1, Assumption::new("x >= 0", true)).unwrap();
    assert_eq!(g.current().pending_injections(), 1);

    assert!(g.adjust_and_continue().unwrap());
    g.snapshot().unwrap();
    assert!(!g.adjust_and_continue().unwrap());
    assert_eq!(
        probe.injected.lock().unwrap().as_slice(),
        &[(L1, Assumption::new("x >= 0", true))]
    );
    assert_eq!(g.current().iteration(), 2);
    assert!(g.is_program_safe());
}

#[test]
fn k_induction_confirms_guessed_candidates_in_the_background() {
    init_tracing();
    // 0 -x=0-> 1 (loop head), 1 -[x<10]-> 2 -x++-> 1, 1 -[!(x<10)]-> 3 -[x>10]-> 9
    let cfa = EdgeListCfa::new(
        vec![
            CfaEdge::new(L0, L1, EdgeKind::Statement("x = 0".into())),
            CfaEdge::new(L1, L2, EdgeKind::Assume(Assumption::new("x < 10", true))),
            CfaEdge::new(L2, L1, EdgeKind::Statement("x++".into())),
            CfaEdge::new(L1, Location::new(3), EdgeKind::Assume(Assumption::new("x < 10", false))),
            CfaEdge::new(Location::new(3), ERROR, EdgeKind::Assume(Assumption::new("x > 10", true))),
        ],
        [L1],
    );
    let guess = ExprTree::leaf("x > 10", false);
    let engine = ScriptedKInduction::new().provable(&guess, 1).safe_from(2).gated();
    let probe = engine.probe();
    let g = k_induction_generator(
        &KInductionConfig::default(),
        engine,
        &cfa,
        &[ERROR].into_iter().collect(),
        &[],
        &ShutdownManager::new().notifier(),
    )
    .unwrap();
    g.start(L0);

    // Still held at the gate: nothing confirmed yet, and reading does not block.
    assert!(g.snapshot().unwrap().tree_at(L1).is_true());
    probe.gate.open();
    wait_until(|| g.state().is_terminal());

    assert!(g.is_program_safe());
    assert_eq!(g.snapshot().unwrap().tree_at(L1), guess);
    // The guess confirmed in round 1 is assumed in round 2.
    assert_eq!(probe.assumptions.lock().unwrap().as_slice(), &[0, 1]);

    let mut stats = Vec::new();
    g.collect_statistics(&mut stats);
    let own = stats
        .iter()
        .find(|s| s.name == "k-Induction-based invariant generator")
        .unwrap();
    assert_eq!(own.get("Total number of candidates"), Some("1"));
    assert_eq!(own.get("Number of confirmed candidates"), Some("1"));
}

#[test]
fn refuted_witness_stops_validation() {
    init_tracing();
    let cfa = EdgeListCfa::new(Vec::new(), []);
    let claim = ExprTree::leaf("y == 1", true);
    let witness = vec![
        WitnessCandidate {
            group: "q7".into(),
            location: L1,
            expression: claim.clone(),
        },
        WitnessCandidate {
            group: "q7".into(),
            location: L2,
            expression: claim.clone(),
        },
    ];
    let engine = ScriptedKInduction::new()
        .false_at(&claim, L1)
        .false_at(&claim, L2)
        .safe_from(5);
    let config = KInductionConfig {
        guess_candidates_from_cfa: false,
        terminate_on_counterexample: true,
        run_async: false,
        ..KInductionConfig::default()
    };
    let parent = ShutdownManager::new();
    let g = KInductionInvariantGenerator::from_cfa(
        engine,
        &cfa,
        &[ERROR].into_iter().collect(),
        &witness,
        config,
        &parent.notifier(),
    );
    g.start(L0);

    let err = g.snapshot().unwrap_err();
    assert!(err.to_string().contains("Incorrect invariant: q7"), "{err}");
    assert!(!g.is_program_safe());
    assert!(!parent.notifier().should_shutdown());
}

#[test]
fn k_induction_solver_failure_is_reported() {
    init_tracing();
    let engine = ScriptedKInduction::new().failing_in(1);
    let config = KInductionConfig {
        run_async: false,
        ..KInductionConfig::default()
    };
    let mut pool = CandidatePool::new();
    pool.propose_safety_property([ERROR]);
    let g = KInductionInvariantGenerator::new(engine, pool, config, &ShutdownManager::new().notifier());
    g.start(L0);
    assert!(matches!(g.snapshot(), Err(invgen::GenerationError::Solver(_))));
    assert!(matches!(g.state(), GeneratorState::Failed(_)));
}

#[test]
fn configured_composition() {
    init_tracing();
    let config = InvariantGenerationConfig::from_json_str(r#"{"async": true}"#).unwrap();
    let engine = ScriptedReachability::new(vec![ReachRound::safe(vec![(L1, at_most("x", 2))])]);
    let g = reachability_generator(&config, engine, &ShutdownManager::new().notifier(), None);
    g.start(L0);
    wait_until(|| g.state().is_terminal());
    assert_eq!(g.snapshot().unwrap().tree_at(L1), at_most("x", 2));

    let mut stats = Vec::new();
    g.collect_statistics(&mut stats);
    let names: BTreeSet<&str> = stats.iter().map(|s| s.name.as_str()).collect();
    assert!(names.contains("Invariant generation (reachability)"));
    assert!(names.contains("Adjustable invariant generation"));
}
