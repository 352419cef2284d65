//! Typed linear-model representation and LP-format writer.
//!
//! The model builder assembles constraints against this small IR instead of
//! concatenating strings; the IR then renders deterministically to standard
//! LP format (the model artifact any MILP solver can consume) and feeds the
//! in-process solve in [`crate::solver::driver`].
//!
//! Constraint labels are assigned sequentially (`c1`, `c2`, ...) in emission
//! order, and comment entries interleave with constraints so the rendered
//! file keeps one section banner per constraint family.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use crate::error::{PlanError, Result};

/// Index of a variable within an [`LpModel`].
pub type VarId = usize;

/// Variable domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    /// 0/1 decision variable, listed in the `Binary` section.
    Binary,
    /// Continuous variable with the LP-default bounds `[0, +inf)`.
    Continuous,
}

/// A model variable.
#[derive(Debug, Clone)]
pub struct LpVar {
    /// Variable name as it appears in the rendered file.
    pub name: String,
    /// Domain.
    pub kind: VarKind,
}

/// Constraint comparison sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `=`
    Eq,
}

impl Sense {
    fn symbol(self) -> &'static str {
        match self {
            Sense::Le => "<=",
            Sense::Ge => ">=",
            Sense::Eq => "=",
        }
    }
}

/// A labeled linear constraint `terms sense rhs`.
#[derive(Debug, Clone)]
pub struct LpConstraint {
    /// Unique label, `c<n>`.
    pub label: String,
    /// Left-hand side: `(coefficient, variable)` terms.
    pub terms: Vec<(f64, VarId)>,
    /// Comparison sense.
    pub sense: Sense,
    /// Right-hand side constant.
    pub rhs: f64,
}

#[derive(Debug, Clone)]
enum LpEntry {
    Comment(String),
    Constraint(LpConstraint),
}

/// A minimization MILP: variables, objective and ordered constraints.
#[derive(Debug, Clone, Default)]
pub struct LpModel {
    vars: Vec<LpVar>,
    index: HashMap<String, VarId>,
    objective: Vec<(f64, VarId)>,
    entries: Vec<LpEntry>,
    constraint_count: usize,
}

impl LpModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a binary variable. Names must be unique.
    pub fn add_binary(&mut self, name: impl Into<String>) -> VarId {
        self.add_var(name.into(), VarKind::Binary)
    }

    /// Adds a nonnegative continuous variable. Names must be unique.
    pub fn add_continuous(&mut self, name: impl Into<String>) -> VarId {
        self.add_var(name.into(), VarKind::Continuous)
    }

    fn add_var(&mut self, name: String, kind: VarKind) -> VarId {
        debug_assert!(!self.index.contains_key(&name), "duplicate variable {name}");
        let id = self.vars.len();
        self.index.insert(name.clone(), id);
        self.vars.push(LpVar { name, kind });
        id
    }

    /// Variable id by name.
    pub fn var_id(&self, name: &str) -> Option<VarId> {
        self.index.get(name).copied()
    }

    /// Variable name by id.
    pub fn var_name(&self, id: VarId) -> &str {
        &self.vars[id].name
    }

    /// All variables in creation order.
    pub fn vars(&self) -> impl Iterator<Item = (VarId, &LpVar)> {
        self.vars.iter().enumerate()
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    /// Appends a term to the minimization objective.
    pub fn objective_term(&mut self, coefficient: f64, var: VarId) {
        self.objective.push((coefficient, var));
    }

    /// The objective terms in emission order.
    pub fn objective(&self) -> &[(f64, VarId)] {
        &self.objective
    }

    /// Inserts a comment line before the next constraint.
    pub fn comment(&mut self, text: impl Into<String>) {
        self.entries.push(LpEntry::Comment(text.into()));
    }

    /// Adds a constraint and returns its assigned label.
    pub fn constrain(&mut self, terms: Vec<(f64, VarId)>, sense: Sense, rhs: f64) -> String {
        debug_assert!(!terms.is_empty(), "constraint with no terms");
        self.constraint_count += 1;
        let label = format!("c{}", self.constraint_count);
        self.entries.push(LpEntry::Constraint(LpConstraint {
            label: label.clone(),
            terms,
            sense,
            rhs,
        }));
        label
    }

    /// All constraints in emission order.
    pub fn constraints(&self) -> impl Iterator<Item = &LpConstraint> {
        self.entries.iter().filter_map(|e| match e {
            LpEntry::Constraint(c) => Some(c),
            LpEntry::Comment(_) => None,
        })
    }

    /// Number of constraints.
    pub fn num_constraints(&self) -> usize {
        self.constraint_count
    }

    /// Renders the model in standard LP format.
    pub fn to_lp_string(&self) -> String {
        let mut out = String::new();
        out.push_str("Minimize\n");
        out.push_str("obj: ");
        self.push_terms(&mut out, &self.objective);
        out.push('\n');
        out.push_str("Subject To\n");
        for entry in &self.entries {
            match entry {
                LpEntry::Comment(text) => {
                    let _ = writeln!(out, "\\ {text}");
                }
                LpEntry::Constraint(c) => {
                    let _ = write!(out, "{}: ", c.label);
                    self.push_terms(&mut out, &c.terms);
                    let _ = writeln!(out, " {} {}", c.sense.symbol(), fmt_num(c.rhs));
                }
            }
        }
        out.push_str("Binary\n");
        let binaries: Vec<&str> = self
            .vars
            .iter()
            .filter(|v| v.kind == VarKind::Binary)
            .map(|v| v.name.as_str())
            .collect();
        for chunk in binaries.chunks(8) {
            out.push_str(&chunk.join(" "));
            out.push('\n');
        }
        out.push_str("End\n");
        out
    }

    /// Writes the rendered model to disk (the model artifact).
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_lp_string())
            .map_err(|e| PlanError::io(path.display().to_string(), e))
    }

    fn push_terms(&self, out: &mut String, terms: &[(f64, VarId)]) {
        for (k, &(coefficient, var)) in terms.iter().enumerate() {
            let name = &self.vars[var].name;
            if k == 0 {
                let _ = write!(out, "{} {}", fmt_num(coefficient), name);
            } else if coefficient < 0.0 {
                let _ = write!(out, " - {} {}", fmt_num(-coefficient), name);
            } else {
                let _ = write!(out, " + {} {}", fmt_num(coefficient), name);
            }
        }
    }
}

/// Formats a coefficient: integral values print without a decimal point.
fn fmt_num(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e12 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
