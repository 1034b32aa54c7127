//! Boolean-formula view of invariants.
//!
//! A solver-independent propositional formula over named atoms. Downstream
//! verifiers translate atoms into their own solver terms; this crate only
//! builds and combines formulas.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Formula {
    Const(bool),
    Atom(String),
    Not(Box<Formula>),
    And(Vec<Formula>),
    Or(Vec<Formula>),
}

impl Formula {
    pub fn tt() -> Formula {
        Formula::Const(true)
    }

    pub fn ff() -> Formula {
        Formula::Const(false)
    }

    pub fn atom(name: impl Into<String>) -> Formula {
        Formula::Atom(name.into())
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Formula::Const(true))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Formula::Const(false))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(f: Formula) -> Formula {
        match f {
            Formula::Const(b) => Formula::Const(!b),
            Formula::Not(inner) => *inner,
            other => Formula::Not(Box::new(other)),
        }
    }

    pub fn and(a: Formula, b: Formula) -> Formula {
        Self::and_all([a, b])
    }

    pub fn or(a: Formula, b: Formula) -> Formula {
        Self::or_all([a, b])
    }

    pub fn and_all(operands: impl IntoIterator<Item = Formula>) -> Formula {
        let mut flat = Vec::new();
        for operand in operands {
            match operand {
                Formula::Const(true) => {}
                Formula::Const(false) => return Formula::ff(),
                Formula::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        dedup(&mut flat);
        match flat.len() {
            0 => Formula::tt(),
            1 => flat.pop().unwrap_or_else(Formula::tt),
            _ => Formula::And(flat),
        }
    }

    pub fn or_all(operands: impl IntoIterator<Item = Formula>) -> Formula {
        let mut flat = Vec::new();
        for operand in operands {
            match operand {
                Formula::Const(false) => {}
                Formula::Const(true) => return Formula::tt(),
                Formula::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        dedup(&mut flat);
        match flat.len() {
            0 => Formula::ff(),
            1 => flat.pop().unwrap_or_else(Formula::ff),
            _ => Formula::Or(flat),
        }
    }

    /// Evaluate under an assignment of the atoms.
    pub fn evaluate(&self, assignment: &dyn Fn(&str) -> bool) -> bool {
        match self {
            Formula::Const(b) => *b,
            Formula::Atom(name) => assignment(name),
            Formula::Not(inner) => !inner.evaluate(assignment),
            Formula::And(ops) => ops.iter().all(|op| op.evaluate(assignment)),
            Formula::Or(ops) => ops.iter().any(|op| op.evaluate(assignment)),
        }
    }

    /// All atoms occurring in the formula, in first-occurrence order.
    pub fn atoms(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Formula::Const(_) => {}
            Formula::Atom(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            Formula::Not(inner) => inner.collect_atoms(out),
            Formula::And(ops) | Formula::Or(ops) => {
                for op in ops {
                    op.collect_atoms(out);
                }
            }
        }
    }
}

fn dedup(formulas: &mut Vec<Formula>) {
    let mut seen: Vec<Formula> = Vec::with_capacity(formulas.len());
    formulas.retain(|f| {
        if seen.contains(f) {
            false
        } else {
            seen.push(f.clone());
            true
        }
    });
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Const(b) => write!(f, "{b}"),
            Formula::Atom(name) => write!(f, "|{name}|"),
            Formula::Not(inner) => write!(f, "(not {inner})"),
            Formula::And(ops) => {
                write!(f, "(and")?;
                for op in ops {
                    write!(f, " {op}")?;
                }
                write!(f, ")")
            }
            Formula::Or(ops) => {
                write!(f, "(or")?;
                for op in ops {
                    write!(f, " {op}")?;
                }
                write!(f, ")")
            }
        }
    }
}
