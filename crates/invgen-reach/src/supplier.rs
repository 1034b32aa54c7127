//! Invariants read off a finished reached set.

use crate::engine::AbstractState;
use invgen_core::{ExprTree, ExpressionTreeSupplier, Formula, InvariantSupplier, Location};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::trace;

/// Answers invariant queries from the states of a completed, sound
/// exploration. A location without any reached state is unreachable, so its
/// invariant is `false`.
pub struct ReachedSetInvariants<S> {
    states: Vec<S>,
    // Built on the first query; most locations are never asked about.
    by_location: OnceLock<BTreeMap<Location, Vec<usize>>>,
}

impl<S: AbstractState> ReachedSetInvariants<S> {
    pub fn new(states: Vec<S>) -> Self {
        ReachedSetInvariants {
            states,
            by_location: OnceLock::new(),
        }
    }

    fn states_at(&self, location: Location) -> impl Iterator<Item = &S> {
        let index = self.by_location.get_or_init(|| {
            let mut index: BTreeMap<Location, Vec<usize>> = BTreeMap::new();
            for (idx, state) in self.states.iter().enumerate() {
                for loc in state.locations() {
                    index.entry(loc).or_default().push(idx);
                }
            }
            index
        });
        index
            .get(&location)
            .into_iter()
            .flatten()
            .map(|&idx| &self.states[idx])
    }
}

impl<S: AbstractState> InvariantSupplier for ReachedSetInvariants<S> {
    fn invariant_at(&self, location: Location) -> Formula {
        let invariant = Formula::or_all(
            self.states_at(location)
                .map(|s| s.formula_approximation().unwrap_or_else(Formula::tt)),
        );
        trace!(%location, %invariant, "formula invariant");
        invariant
    }
}

impl<S: AbstractState> ExpressionTreeSupplier for ReachedSetInvariants<S> {
    fn invariant_at(&self, location: Location) -> ExprTree {
        // States not covered by an earlier state at this location.
        let mut kept: Vec<(&S, ExprTree)> = Vec::new();
        for state in self.states_at(location) {
            let Some(tree) = state.tree_approximation(location) else {
                trace!(%location, "state reports no expression tree, invariant is true");
                return ExprTree::True;
            };
            if kept.iter().any(|(other, _)| state.is_less_or_equal(other)) {
                continue;
            }
            kept.push((state, tree));
        }

        // A kept state can still be covered by one kept after it.
        let kept: Vec<ExprTree> = kept
            .iter()
            .enumerate()
            .filter(|(i, (a, _))| {
                !kept
                    .iter()
                    .enumerate()
                    .any(|(j, (b, _))| *i != j && a.is_less_or_equal(b))
            })
            .map(|(_, (_, tree))| tree.clone())
            .collect();

        let invariant = ExprTree::or_all(kept);
        trace!(%location, %invariant, "expression tree invariant");
        invariant
    }
}
