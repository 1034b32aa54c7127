//! Structural invariants: expression trees over source-level conditions.
//!
//! Leaves are source expressions (e.g. `x >= 0`) together with the truth
//! value they are assumed to have. Inner nodes are n-ary conjunctions and
//! disjunctions. The smart constructors [`ExprTree::and`] and [`ExprTree::or`]
//! keep trees flat and free of neutral elements, so structurally equal
//! invariants compare equal.

use crate::formula::Formula;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExprTree {
    True,
    False,
    Leaf {
        expression: String,
        assume_truth: bool,
    },
    And(Vec<ExprTree>),
    Or(Vec<ExprTree>),
}

impl ExprTree {
    pub fn leaf(expression: impl Into<String>, assume_truth: bool) -> Self {
        ExprTree::Leaf {
            expression: expression.into(),
            assume_truth,
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, ExprTree::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(self, ExprTree::False)
    }

    /// Conjunction of two trees.
    pub fn and(a: ExprTree, b: ExprTree) -> ExprTree {
        Self::and_all([a, b])
    }

    /// Disjunction of two trees.
    pub fn or(a: ExprTree, b: ExprTree) -> ExprTree {
        Self::or_all([a, b])
    }

    /// Conjunction of any number of trees. The empty conjunction is `True`.
    pub fn and_all(operands: impl IntoIterator<Item = ExprTree>) -> ExprTree {
        let mut flat: Vec<ExprTree> = Vec::new();
        for operand in operands {
            match operand {
                ExprTree::True => {}
                ExprTree::False => return ExprTree::False,
                ExprTree::And(inner) => {
                    for e in inner {
                        if !flat.contains(&e) {
                            flat.push(e);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        match flat.len() {
            0 => ExprTree::True,
            1 => flat.pop().unwrap_or(ExprTree::True),
            _ => ExprTree::And(flat),
        }
    }

    /// Disjunction of any number of trees. The empty disjunction is `False`.
    pub fn or_all(operands: impl IntoIterator<Item = ExprTree>) -> ExprTree {
        let mut flat: Vec<ExprTree> = Vec::new();
        for operand in operands {
            match operand {
                ExprTree::False => {}
                ExprTree::True => return ExprTree::True,
                ExprTree::Or(inner) => {
                    for e in inner {
                        if !flat.contains(&e) {
                            flat.push(e);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        match flat.len() {
            0 => ExprTree::False,
            1 => flat.pop().unwrap_or(ExprTree::False),
            _ => ExprTree::Or(flat),
        }
    }

    /// Logical negation, pushed down to the leaves.
    pub fn negate(&self) -> ExprTree {
        match self {
            ExprTree::True => ExprTree::False,
            ExprTree::False => ExprTree::True,
            ExprTree::Leaf {
                expression,
                assume_truth,
            } => ExprTree::leaf(expression.clone(), !assume_truth),
            ExprTree::And(ops) => ExprTree::or_all(ops.iter().map(ExprTree::negate)),
            ExprTree::Or(ops) => ExprTree::and_all(ops.iter().map(ExprTree::negate)),
        }
    }

    /// Translate into the boolean-formula view. Each distinct source
    /// expression becomes one atom.
    pub fn to_formula(&self) -> Formula {
        match self {
            ExprTree::True => Formula::tt(),
            ExprTree::False => Formula::ff(),
            ExprTree::Leaf {
                expression,
                assume_truth: true,
            } => Formula::atom(expression.clone()),
            ExprTree::Leaf {
                expression,
                assume_truth: false,
            } => Formula::not(Formula::atom(expression.clone())),
            ExprTree::And(ops) => Formula::and_all(ops.iter().map(ExprTree::to_formula)),
            ExprTree::Or(ops) => Formula::or_all(ops.iter().map(ExprTree::to_formula)),
        }
    }
}

impl fmt::Display for ExprTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprTree::True => write!(f, "1"),
            ExprTree::False => write!(f, "0"),
            ExprTree::Leaf {
                expression,
                assume_truth: true,
            } => write!(f, "{expression}"),
            ExprTree::Leaf {
                expression,
                assume_truth: false,
            } => write!(f, "!({expression})"),
            ExprTree::And(ops) => write_joined(f, ops, " && "),
            ExprTree::Or(ops) => write_joined(f, ops, " || "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, ops: &[ExprTree], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, op) in ops.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{op}")?;
    }
    write!(f, ")")
}
