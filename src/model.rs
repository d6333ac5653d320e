use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::ir::Equation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    /// Spatially varying unknown, backed by a full-size matrix.
    Field,
    /// Scalar unknown, backed by a 1x1 matrix.
    Real,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
}

/// The mutable aggregate the parser populates and the emitter consumes:
/// variables and equations in registration order, plus the parameter map
/// (name to external C++ type, last write wins, emitted in name order).
#[derive(Debug, Default)]
pub struct SolverModel {
    vars: Vec<Variable>,
    eqs: Vec<Equation>,
    params: BTreeMap<String, String>,
}

impl SolverModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variable. Re-registering a name leaves the model unchanged
    /// and reports `DuplicateVariable`; the caller decides whether that stops
    /// the build.
    pub fn add_var(&mut self, name: impl Into<String>, kind: VarKind) -> Result<()> {
        let name = name.into();
        if self.vars.iter().any(|v| v.name == name) {
            return Err(Error::DuplicateVariable(name));
        }
        self.vars.push(Variable { name, kind });
        Ok(())
    }

    pub fn add_param(&mut self, name: impl Into<String>, ty: impl Into<String>) {
        self.params.insert(name.into(), ty.into());
    }

    pub fn add_eq(&mut self, eq: Equation) {
        self.eqs.push(eq);
    }

    pub fn vars(&self) -> &[Variable] {
        &self.vars
    }

    pub fn eqs(&self) -> &[Equation] {
        &self.eqs
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn is_var(&self, name: &str) -> bool {
        self.vars.iter().any(|v| v.name == name)
    }

    pub fn is_param(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }
}

/// Model summary printed by the driver under `-v`.
impl fmt::Display for SolverModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Solver:")?;
        writeln!(f, "  - Variables:")?;
        for v in &self.vars {
            let kind = match v.kind {
                VarKind::Field => "field",
                VarKind::Real => "real",
            };
            writeln!(f, "        - {} ({})", v.name, kind)?;
        }
        writeln!(f, "  - Equations:")?;
        for eq in &self.eqs {
            writeln!(f, "        - {} (BCs: {})", eq.name, eq.bcs.len())?;
        }
        Ok(())
    }
}
