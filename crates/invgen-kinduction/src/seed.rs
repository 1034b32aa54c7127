//! Seeding the candidate pool.

use crate::candidate::CandidateKind;
use crate::config::KInductionConfig;
use crate::pool::CandidatePool;
use invgen_core::{CfaEdge, ControlFlow, EdgeKind, ExprTree, Location};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use tracing::{debug, info};

/// One candidate taken from a correctness witness: `expression` is claimed
/// at `location` by the witness state `group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessCandidate {
    pub group: String,
    pub location: Location,
    pub expression: ExprTree,
}

/// Branch edges on some path into `targets`.
///
/// Walks entering edges backwards from the targets. Every assume edge met is
/// collected and not walked through; all other edges are followed. The result
/// is in discovery order without duplicates.
pub fn relevant_assume_edges(cfa: &dyn ControlFlow, targets: &BTreeSet<Location>) -> Vec<CfaEdge> {
    let mut edges: Vec<CfaEdge> = Vec::new();
    let mut visited: BTreeSet<Location> = targets.clone();
    let mut waitlist: VecDeque<Location> = targets.iter().copied().collect();

    while let Some(current) = waitlist.pop_front() {
        for edge in cfa.entering_edges(current) {
            if let EdgeKind::Assume(_) = edge.kind {
                if !edges.contains(&edge) {
                    edges.push(edge);
                }
            } else if visited.insert(edge.predecessor) {
                waitlist.push_back(edge.predecessor);
            }
        }
    }
    edges
}

/// Build the initial candidate pool.
///
/// * with `guess_candidates_from_cfa`, the negation of every relevant branch
///   condition, asserted at all loop heads;
/// * the witness candidates, conjoined per group and asserted at each
///   location of the group;
/// * the safety property over `targets`.
pub fn seed_pool(
    cfa: &dyn ControlFlow,
    targets: &BTreeSet<Location>,
    witness: &[WitnessCandidate],
    config: &KInductionConfig,
) -> CandidatePool {
    let mut pool = CandidatePool::new();

    if config.guess_candidates_from_cfa {
        let loop_heads = cfa.loop_heads();
        if loop_heads.is_empty() {
            debug!("no loop heads, not guessing candidates from the CFA");
        } else {
            let mut seen: BTreeSet<ExprTree> = BTreeSet::new();
            for edge in relevant_assume_edges(cfa, targets) {
                let Some(assumption) = edge.assumption() else {
                    continue;
                };
                let negation = assumption.negated().as_tree();
                if !seen.insert(negation.clone()) {
                    continue;
                }
                debug!(%edge, candidate = %negation, "guessed candidate from branch");
                pool.propose(
                    negation,
                    loop_heads.iter().copied(),
                    None,
                    CandidateKind::BranchNegation { edge },
                );
            }
        }
    }

    seed_witness(&mut pool, cfa, witness);

    pool.propose_safety_property(targets.iter().copied());
    info!(
        candidates = pool.total_candidates(),
        targets = targets.len(),
        "seeded candidate invariants"
    );
    pool
}

fn seed_witness(pool: &mut CandidatePool, cfa: &dyn ControlFlow, witness: &[WitnessCandidate]) {
    // group -> (conjoined expression, locations with a claim)
    let mut groups: BTreeMap<&str, (ExprTree, BTreeSet<Location>)> = BTreeMap::new();
    let mut visited: BTreeSet<Location> = BTreeSet::new();

    for w in witness {
        visited.insert(w.location);
        pool.extend_group(&w.group, [w.location]);
        let (expression, locations) = groups
            .entry(w.group.as_str())
            .or_insert_with(|| (ExprTree::True, BTreeSet::new()));
        if w.expression.is_true() {
            continue;
        }
        *expression = ExprTree::and(std::mem::replace(expression, ExprTree::True), w.expression.clone());
        locations.insert(w.location);
    }

    // A claim right before a function return also holds right after it,
    // unless the witness says something about that location itself.
    for (group, (_, locations)) in groups.iter_mut() {
        let mut extra = BTreeSet::new();
        for &location in locations.iter() {
            for edge in cfa.leaving_edges(location) {
                if edge.kind == EdgeKind::FunctionReturn && !visited.contains(&edge.successor) {
                    extra.insert(edge.successor);
                }
            }
        }
        if !extra.is_empty() {
            debug!(group, locations = extra.len(), "extending witness group past function returns");
            pool.extend_group(group, extra.iter().copied());
            locations.extend(extra);
        }
    }

    for (group, (expression, locations)) in groups {
        for location in locations {
            pool.propose(
                expression.clone(),
                [location],
                Some(group.to_string()),
                CandidateKind::Witness,
            );
        }
    }
}
