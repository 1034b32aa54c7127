//! Candidate invariants and candidate groups.

use invgen_core::{CfaEdge, ExprTree, Location};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Stable index of a candidate in its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateId(pub(crate) u32);

impl CandidateId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Where a candidate came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateKind {
    /// The negation of a branch condition on some path to an error location.
    BranchNegation { edge: CfaEdge },
    /// Taken from a correctness witness.
    Witness,
    /// Error locations are unreachable.
    SafetyProperty,
    /// Handed in from outside while generation was running.
    Injected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateStatus {
    Proposed,
    Confirmed,
    Disproved,
}

/// A proposition asserted at a set of locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateInvariant {
    pub id: CandidateId,
    pub expression: ExprTree,
    /// Locations where the candidate has not been refuted yet.
    pub locations: BTreeSet<Location>,
    pub group: Option<String>,
    pub kind: CandidateKind,
    pub status: CandidateStatus,
}

impl CandidateInvariant {
    pub fn is_safety_property(&self) -> bool {
        self.kind == CandidateKind::SafetyProperty
    }

    pub fn is_proposed(&self) -> bool {
        self.status == CandidateStatus::Proposed
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == CandidateStatus::Confirmed
    }
}

impl fmt::Display for CandidateInvariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} at {{", self.id, self.expression)?;
        for (i, location) in self.locations.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{location}")?;
        }
        f.write_str("}")?;
        if let Some(group) = &self.group {
            write!(f, " [{group}]")?;
        }
        Ok(())
    }
}

/// Candidates that stem from the same external source, e.g. one state of a
/// witness automaton. The group is refuted once it has no location left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateGroup {
    pub id: String,
    pub remaining: BTreeSet<Location>,
    pub members: Vec<CandidateId>,
}

impl CandidateGroup {
    pub fn is_refuted(&self) -> bool {
        self.remaining.is_empty()
    }
}
