//! Invariant snapshots: immutable, queryable views of what is known.

use crate::expr::ExprTree;
use crate::formula::Formula;
use crate::location::Location;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Boolean-formula view of location invariants.
///
/// Implementations answer from already-computed information only; a query
/// never starts new analysis work.
pub trait InvariantSupplier: Send + Sync {
    fn invariant_at(&self, location: Location) -> Formula;
}

/// Expression-tree view of location invariants.
pub trait ExpressionTreeSupplier: Send + Sync {
    fn invariant_at(&self, location: Location) -> ExprTree;
}

/// Knows nothing: `true` everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrivialSupplier;

impl InvariantSupplier for TrivialSupplier {
    fn invariant_at(&self, _location: Location) -> Formula {
        Formula::tt()
    }
}

impl ExpressionTreeSupplier for TrivialSupplier {
    fn invariant_at(&self, _location: Location) -> ExprTree {
        ExprTree::True
    }
}

/// An explicit table of invariants. Locations missing from the table are
/// unconstrained.
#[derive(Debug, Clone, Default)]
pub struct LocationInvariants {
    invariants: BTreeMap<Location, ExprTree>,
}

impl LocationInvariants {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conjoin `invariant` to whatever is already known at `location`.
    pub fn strengthen(&mut self, location: Location, invariant: ExprTree) {
        let entry = self.invariants.entry(location).or_insert(ExprTree::True);
        *entry = ExprTree::and(std::mem::replace(entry, ExprTree::True), invariant);
    }

    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Location, &ExprTree)> {
        self.invariants.iter()
    }

    pub fn into_snapshot(self) -> InvariantSnapshot {
        if self.invariants.is_empty() {
            return InvariantSnapshot::trivial();
        }
        let shared = Arc::new(self);
        InvariantSnapshot::new(shared.clone(), shared)
    }
}

impl InvariantSupplier for LocationInvariants {
    fn invariant_at(&self, location: Location) -> Formula {
        self.invariants
            .get(&location)
            .map(ExprTree::to_formula)
            .unwrap_or_else(Formula::tt)
    }
}

impl ExpressionTreeSupplier for LocationInvariants {
    fn invariant_at(&self, location: Location) -> ExprTree {
        self.invariants
            .get(&location)
            .cloned()
            .unwrap_or(ExprTree::True)
    }
}

/// A pair of invariant views as known at one point in time.
///
/// Cheap to clone; the views themselves are shared and immutable.
#[derive(Clone)]
pub struct InvariantSnapshot {
    formulas: Arc<dyn InvariantSupplier>,
    trees: Arc<dyn ExpressionTreeSupplier>,
    trivial: bool,
}

impl InvariantSnapshot {
    pub fn new(
        formulas: Arc<dyn InvariantSupplier>,
        trees: Arc<dyn ExpressionTreeSupplier>,
    ) -> Self {
        InvariantSnapshot {
            formulas,
            trees,
            trivial: false,
        }
    }

    /// The uninformative snapshot.
    pub fn trivial() -> Self {
        InvariantSnapshot {
            formulas: Arc::new(TrivialSupplier),
            trees: Arc::new(TrivialSupplier),
            trivial: true,
        }
    }

    pub fn is_trivial(&self) -> bool {
        self.trivial
    }

    pub fn formula_at(&self, location: Location) -> Formula {
        self.formulas.invariant_at(location)
    }

    pub fn tree_at(&self, location: Location) -> ExprTree {
        self.trees.invariant_at(location)
    }

    pub fn formulas(&self) -> Arc<dyn InvariantSupplier> {
        Arc::clone(&self.formulas)
    }

    pub fn trees(&self) -> Arc<dyn ExpressionTreeSupplier> {
        Arc::clone(&self.trees)
    }

    /// Both snapshots are over-approximations of the reachable states, so
    /// their conjunction is one too, and it knows at least as much as either.
    pub fn conjoin(&self, other: &InvariantSnapshot) -> InvariantSnapshot {
        if other.trivial {
            return self.clone();
        }
        if self.trivial {
            return other.clone();
        }
        let both = Arc::new(Conjunction {
            parts: vec![self.clone(), other.clone()],
        });
        InvariantSnapshot::new(both.clone(), both)
    }
}

impl fmt::Debug for InvariantSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvariantSnapshot")
            .field("trivial", &self.trivial)
            .finish_non_exhaustive()
    }
}

impl InvariantSupplier for InvariantSnapshot {
    fn invariant_at(&self, location: Location) -> Formula {
        self.formula_at(location)
    }
}

impl ExpressionTreeSupplier for InvariantSnapshot {
    fn invariant_at(&self, location: Location) -> ExprTree {
        self.tree_at(location)
    }
}

struct Conjunction {
    parts: Vec<InvariantSnapshot>,
}

impl InvariantSupplier for Conjunction {
    fn invariant_at(&self, location: Location) -> Formula {
        Formula::and_all(self.parts.iter().map(|p| p.formula_at(location)))
    }
}

impl ExpressionTreeSupplier for Conjunction {
    fn invariant_at(&self, location: Location) -> ExprTree {
        ExprTree::and_all(self.parts.iter().map(|p| p.tree_at(location)))
    }
}
