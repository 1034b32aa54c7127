//! Read-only view of the control-flow automaton.
//!
//! Building the CFA is someone else's job. Generators only need to walk
//! edges backwards from target locations and to know the loop heads, which
//! is what [`ControlFlow`] provides.

use crate::expr::ExprTree;
use crate::location::Location;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A branch condition together with the branch outcome it assumes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Assumption {
    pub condition: String,
    pub truth: bool,
}

impl Assumption {
    pub fn new(condition: impl Into<String>, truth: bool) -> Self {
        Assumption {
            condition: condition.into(),
            truth,
        }
    }

    /// The assumption taken by the opposite branch.
    pub fn negated(&self) -> Assumption {
        Assumption {
            condition: self.condition.clone(),
            truth: !self.truth,
        }
    }

    pub fn as_tree(&self) -> ExprTree {
        ExprTree::leaf(self.condition.clone(), self.truth)
    }
}

impl fmt::Display for Assumption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.truth {
            write!(f, "[{}]", self.condition)
        } else {
            write!(f, "[!({})]", self.condition)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Branch edge, taken when the assumption holds.
    Assume(Assumption),
    Statement(String),
    FunctionCall,
    FunctionReturn,
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CfaEdge {
    pub predecessor: Location,
    pub successor: Location,
    pub kind: EdgeKind,
}

impl CfaEdge {
    pub fn new(predecessor: Location, successor: Location, kind: EdgeKind) -> Self {
        CfaEdge {
            predecessor,
            successor,
            kind,
        }
    }

    pub fn assumption(&self) -> Option<&Assumption> {
        match &self.kind {
            EdgeKind::Assume(a) => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for CfaEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EdgeKind::Assume(a) => write!(f, "{} -{}-> {}", self.predecessor, a, self.successor),
            EdgeKind::Statement(s) => write!(f, "{} -{{{}}}-> {}", self.predecessor, s, self.successor),
            _ => write!(f, "{} --> {}", self.predecessor, self.successor),
        }
    }
}

pub trait ControlFlow: Send + Sync {
    fn entering_edges(&self, location: Location) -> Vec<CfaEdge>;

    fn leaving_edges(&self, location: Location) -> Vec<CfaEdge>;

    fn loop_heads(&self) -> BTreeSet<Location>;
}

/// A CFA stored as a plain edge list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EdgeListCfa {
    pub edges: Vec<CfaEdge>,
    pub loop_heads: BTreeSet<Location>,
}

impl EdgeListCfa {
    pub fn new(edges: Vec<CfaEdge>, loop_heads: impl IntoIterator<Item = Location>) -> Self {
        EdgeListCfa {
            edges,
            loop_heads: loop_heads.into_iter().collect(),
        }
    }
}

impl ControlFlow for EdgeListCfa {
    fn entering_edges(&self, location: Location) -> Vec<CfaEdge> {
        self.edges
            .iter()
            .filter(|e| e.successor == location)
            .cloned()
            .collect()
    }

    fn leaving_edges(&self, location: Location) -> Vec<CfaEdge> {
        self.edges
            .iter()
            .filter(|e| e.predecessor == location)
            .cloned()
            .collect()
    }

    fn loop_heads(&self) -> BTreeSet<Location> {
        self.loop_heads.clone()
    }
}
