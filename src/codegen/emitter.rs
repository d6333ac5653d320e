//! Lowers a [`SolverModel`] to C++ source that assembles a numerical solver.
//!
//! Equations containing a field value anywhere in their sides constrain a
//! single boundary row directly: they are linearised here with the
//! functional-derivative engine and emitted as per-variable boundary
//! contributions. Every other equation is handed to the solver library as a
//! symbolic operator expression and linearised downstream.
//!
//! Emission is fail-fast and unbuffered: the first semantic error aborts and
//! whatever was already written stays on the output stream.

use std::io::Write;

use itertools::Itertools;

use crate::derivative::functional_derivative;
use crate::error::{Error, Result};
use crate::ir::expr::{self, op_prec, Expr};
use crate::ir::{BcLoc, Equation};
use crate::model::SolverModel;

/// The two renderings of one expression: `Symbolic` references the solver's
/// symbolic handles (`sym_<name>`) for Jacobian assembly, `Value` references
/// the raw backing matrices for residual evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Symbolic,
    Value,
}

pub struct Emitter<'m> {
    model: &'m SolverModel,
}

impl<'m> Emitter<'m> {
    pub fn new(model: &'m SolverModel) -> Self {
        Self { model }
    }

    /// Emit the complete translation unit: include directive, mapping
    /// template, `extern` parameter and variable declarations, and the
    /// `create_solver()` factory.
    pub fn emit_code<W: Write>(&self, template: &str, out: &mut W) -> Result<()> {
        writeln!(out, "#include <ester.h>")?;
        writeln!(out)?;
        for line in template.lines() {
            writeln!(out, "{}", line)?;
        }
        writeln!(out)?;
        for (name, ty) in self.model.params() {
            writeln!(out, "extern {} {};", ty, name)?;
        }
        self.emit_solver(out)
    }

    fn emit_solver<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out, "// definition of matrices used to store variables value")?;
        for var in self.model.vars() {
            writeln!(out, "extern matrix {};", var.name)?;
        }

        writeln!(out, "solver *create_solver() {{")?;
        writeln!(out, "    mapping map;")?;
        writeln!(out, "    symbolic S;")?;
        writeln!(out, "    solver *op = new solver();")?;
        writeln!(out, "    op->init(1, {}, \"full\");", self.model.vars().len())?;
        writeln!(out, "    create_map(map);")?;
        writeln!(out, "    S.set_map(map);")?;
        writeln!(out, "    op->set_nr(map.npts);")?;
        for var in self.model.vars() {
            writeln!(out, "    sym sym_{} = S.regvar(\"{}\");", var.name, var.name)?;
            writeln!(out, "    op->regvar(\"{}\");", var.name)?;
            writeln!(out, "    S.set_value(\"{}\", {});", var.name, var.name)?;
        }
        for eq in self.model.eqs() {
            if eq.lhs.has_field_value() || eq.rhs.has_field_value() {
                self.emit_boundary_equation(out, eq)?;
            } else {
                self.emit_regular_equation(out, eq)?;
            }
        }
        writeln!(out, "    return op;")?;
        writeln!(out, "}}")?;
        Ok(())
    }

    /// Equation discretised through the solver's symbolic operators:
    /// build the symbolic residual, register it against every variable it
    /// references, attach boundary-condition rows, set the RHS vector.
    fn emit_regular_equation<W: Write>(&self, out: &mut W, eq: &Equation) -> Result<()> {
        write!(out, "\n    sym eq_{} = ", eq.name)?;
        self.render_residual(out, eq)?;
        writeln!(out, ";")?;

        let mut referenced = Vec::new();
        collect_identifiers(&eq.lhs, &mut referenced);
        collect_identifiers(&eq.rhs, &mut referenced);
        for name in referenced
            .into_iter()
            .filter(|name| self.model.is_var(name))
            .unique()
        {
            writeln!(out, "    eq_{}.add(op, \"{}\", \"{}\");", eq.name, eq.name, name)?;
        }

        writeln!(out, "\n    // Boundary conditions")?;
        let zero = expr::value(0.0);
        for bc in &eq.bcs {
            if bc.cond.lhs != zero {
                self.emit_bc_contribution(out, &eq.name, bc.loc, &bc.cond.lhs)?;
            }
            if bc.cond.rhs != zero {
                let negated = -&bc.cond.rhs;
                self.emit_bc_contribution(out, &eq.name, bc.loc, &negated)?;
            }
        }

        writeln!(out, "\n    // RHS")?;
        self.emit_rhs(out, eq)
    }

    /// Symbolic residual `lhs - rhs`; a right-hand side that is already a
    /// unary minus folds into an addition.
    fn render_residual<W: Write>(&self, out: &mut W, eq: &Equation) -> Result<()> {
        if let Expr::Unary { op: '-', operand } = &eq.rhs {
            let sum = &eq.lhs + operand.as_ref();
            return self.render_expr(out, &sum, Mode::Symbolic);
        }
        let residual = &eq.lhs - &eq.rhs;
        self.render_expr(out, &residual, Mode::Symbolic)
    }

    fn emit_rhs<W: Write>(&self, out: &mut W, eq: &Equation) -> Result<()> {
        writeln!(out, "    matrix rhs = -eq_{}.eval();", eq.name)?;

        // boundary conditions overwrite the first/last row of the residual
        let zero = expr::value(0.0);
        let mut n_top_bc = 0;
        let mut n_bot_bc = 0;
        for bc in &eq.bcs {
            let row = if bc.loc.is_bottom() {
                n_bot_bc += 1;
                "0"
            } else {
                n_top_bc += 1;
                "-1"
            };
            write!(out, "    rhs({}) = -(", row)?;
            if bc.cond.rhs == zero {
                self.render_expr(out, &bc.cond.lhs, Mode::Value)?;
            } else {
                let residual = &bc.cond.lhs - &bc.cond.rhs;
                self.render_expr(out, &residual, Mode::Value)?;
            }
            writeln!(out, ")({});", row)?;
        }
        if n_top_bc > 1 || n_bot_bc > 1 {
            return Err(Error::TooManyBoundaryConditions(eq.name.clone()));
        }

        writeln!(out, "    op->set_rhs(\"{}\", rhs);", eq.name)?;
        Ok(())
    }

    /// Boundary contribution of one regular-equation condition: a bare
    /// variable is a Dirichlet row, a radial derivative of a variable is a
    /// Neumann row through the mapping's differentiation operator, and sums
    /// of those decompose recursively.
    fn emit_bc_contribution<W: Write>(
        &self,
        out: &mut W,
        eq_name: &str,
        loc: BcLoc,
        e: &Expr,
    ) -> Result<()> {
        match e {
            Expr::Diff { operand, wrt } => {
                let name = operand.as_identifier().ok_or_else(|| {
                    Error::NotImplemented(format!("boundary derivative of {}", operand))
                })?;
                if wrt != "r" {
                    return Err(Error::DifferentiationVariable(wrt.clone()));
                }
                match loc {
                    BcLoc::Center => writeln!(
                        out,
                        "    op->bc_bot2_add_l(0, \"{}\", \"{}\", ones(1, 1), map.D.block(0).row(0));",
                        eq_name, name
                    )?,
                    BcLoc::Surface => writeln!(
                        out,
                        "    op->bc_top1_add_l(0, \"{}\", \"{}\", ones(1, 1), map.D.block(-1).row(-1));",
                        eq_name, name
                    )?,
                    BcLoc::Top | BcLoc::Bottom => {
                        return Err(Error::NotImplemented(format!(
                            "derivative boundary condition at {}",
                            loc
                        )))
                    }
                }
                Ok(())
            }
            Expr::Binary { op: '+', lhs, rhs } => {
                self.emit_bc_contribution(out, eq_name, loc, lhs)?;
                self.emit_bc_contribution(out, eq_name, loc, rhs)
            }
            Expr::Identifier(name) | Expr::Delta(name) | Expr::FieldValue { name, .. } => {
                if !self.model.is_var(name) {
                    return Err(Error::OnlyVariablesInBoundary(name.clone()));
                }
                match loc {
                    BcLoc::Center => writeln!(
                        out,
                        "    op->bc_bot2_add_d(0, \"{}\", \"{}\", ones(1, 1));",
                        eq_name, name
                    )?,
                    BcLoc::Surface => writeln!(
                        out,
                        "    op->bc_top1_add_d(0, \"{}\", \"{}\", ones(1, 1));",
                        eq_name, name
                    )?,
                    BcLoc::Top | BcLoc::Bottom => {
                        return Err(Error::NotImplemented(format!(
                            "direct boundary condition at {}",
                            loc
                        )))
                    }
                }
                Ok(())
            }
            other => Err(Error::NotImplemented(format!(
                "boundary condition shape {}",
                other
            ))),
        }
    }

    /// Equation constraining a single boundary row: linearise `lhs - rhs`
    /// with the functional derivative, resolve which end it belongs to from
    /// the field-value indices, emit one delta contribution per isolated
    /// perturbation and the evaluated residual as RHS.
    fn emit_boundary_equation<W: Write>(&self, out: &mut W, eq: &Equation) -> Result<()> {
        let residual = &eq.lhs - &eq.rhs;
        let derivative = functional_derivative(&residual)?;
        let loc = self
            .boundary_location(&residual, &eq.name)?
            .ok_or_else(|| Error::NoBoundaryContext(eq.name.clone()))?;

        let end = if loc.is_bottom() { "bottom" } else { "top" };
        writeln!(out, "\n    // have to set equation {} in {} BC", eq.name, end)?;
        self.emit_delta_contributions(out, &eq.name, loc, &derivative, false)?;

        writeln!(out, "\n    // RHS")?;
        write!(out, "    op->set_rhs(\"{}\", -(", eq.name)?;
        self.render_expr(out, &residual, Mode::Value)?;
        let row = if loc.is_bottom() { "0" } else { "-1" };
        writeln!(out, ")({})*ones(1, 1));", row)?;
        Ok(())
    }

    /// Boundary end implied by the field-value indices of `e`: index 0 is
    /// the bottom row, index 1 the top row. `None` means no field value in
    /// this subtree; two different ends in one equation are fatal.
    fn boundary_location(&self, e: &Expr, eq_name: &str) -> Result<Option<BcLoc>> {
        match e {
            Expr::FieldValue { index, .. } => match index.as_ref() {
                Expr::Value(v) if *v == 0.0 => Ok(Some(BcLoc::Bottom)),
                Expr::Value(v) if *v == 1.0 => Ok(Some(BcLoc::Top)),
                other => Err(Error::NotImplemented(format!(
                    "field value index {}",
                    other
                ))),
            },
            Expr::Binary { lhs, rhs, .. } => {
                let left = self.boundary_location(lhs, eq_name)?;
                let right = self.boundary_location(rhs, eq_name)?;
                match (left, right) {
                    (None, loc) => Ok(loc),
                    (loc, None) => Ok(loc),
                    (Some(a), Some(b)) if a == b => Ok(Some(a)),
                    _ => Err(Error::AmbiguousBoundary(eq_name.to_string())),
                }
            }
            Expr::Identifier(_) | Expr::Delta(_) | Expr::Value(_) => Ok(None),
            other => Err(Error::NotImplemented(format!(
                "boundary location of {}",
                other
            ))),
        }
    }

    /// Structurally decompose a functional derivative over `+`, `-` and `*`
    /// until each `Delta` factor is isolated, emitting one contribution per
    /// delta with its accumulated, sign-tracked coefficient.
    fn emit_delta_contributions<W: Write>(
        &self,
        out: &mut W,
        eq_name: &str,
        loc: BcLoc,
        e: &Expr,
        neg: bool,
    ) -> Result<()> {
        let (bc_fn, row) = if loc.is_top() {
            ("bc_top1_add_d", "-1")
        } else {
            ("bc_bot2_add_d", "0")
        };
        match e {
            Expr::Delta(name) => {
                let factor = if neg { "-ones(1, 1)" } else { "ones(1, 1)" };
                writeln!(out, "    op->{}(0, \"{}\", \"{}\", {});", bc_fn, eq_name, name, factor)?;
                Ok(())
            }
            Expr::Binary { op, lhs, rhs } => match op {
                '+' => {
                    self.emit_delta_contributions(out, eq_name, loc, lhs, neg)?;
                    self.emit_delta_contributions(out, eq_name, loc, rhs, neg)
                }
                '-' => {
                    self.emit_delta_contributions(out, eq_name, loc, lhs, neg)?;
                    self.emit_delta_contributions(out, eq_name, loc, rhs, !neg)
                }
                '*' => {
                    if let Expr::Delta(name) = lhs.as_ref() {
                        self.emit_delta_coefficient(out, bc_fn, row, eq_name, name, rhs, neg)
                    } else if let Expr::Delta(name) = rhs.as_ref() {
                        self.emit_delta_coefficient(out, bc_fn, row, eq_name, name, lhs, neg)
                    } else if let Expr::Binary {
                        op: inner_op,
                        lhs: inner_lhs,
                        rhs: inner_rhs,
                    } = rhs.as_ref()
                    {
                        // distribute the left factor over the sum on the
                        // right until a delta surfaces
                        match inner_op {
                            '+' => {
                                let first = lhs.as_ref() * inner_lhs.as_ref();
                                let second = lhs.as_ref() * inner_rhs.as_ref();
                                self.emit_delta_contributions(out, eq_name, loc, &first, neg)?;
                                self.emit_delta_contributions(out, eq_name, loc, &second, neg)
                            }
                            '-' => {
                                let first = lhs.as_ref() * inner_lhs.as_ref();
                                let second = lhs.as_ref() * inner_rhs.as_ref();
                                self.emit_delta_contributions(out, eq_name, loc, &first, neg)?;
                                self.emit_delta_contributions(out, eq_name, loc, &second, !neg)
                            }
                            _ => Err(Error::NotImplemented(format!(
                                "jacobian decomposition over {}",
                                inner_op
                            ))),
                        }
                    } else {
                        Err(Error::NotImplemented(format!("jacobian factor {}", rhs)))
                    }
                }
                _ => Err(Error::NotImplemented(format!(
                    "jacobian decomposition over {}",
                    op
                ))),
            },
            other => Err(Error::NotImplemented(format!("jacobian term {}", other))),
        }
    }

    fn emit_delta_coefficient<W: Write>(
        &self,
        out: &mut W,
        bc_fn: &str,
        row: &str,
        eq_name: &str,
        delta_name: &str,
        coeff: &Expr,
        neg: bool,
    ) -> Result<()> {
        write!(out, "    op->{}(0, \"{}\", \"{}\", (", bc_fn, eq_name, delta_name)?;
        if neg {
            let negated = -coeff;
            self.render_expr(out, &negated, Mode::Value)?;
        } else {
            self.render_expr(out, coeff, Mode::Value)?;
        }
        writeln!(out, ")({})*ones(1, 1));", row)?;
        Ok(())
    }

    /// Recursive expression printer shared by both emission modes, with
    /// minimal parenthesization: a left child is parenthesized only when it
    /// is a strictly-lower-precedence binary, a right child also when it is
    /// a unary (a right-associativity hazard).
    pub fn render_expr<W: Write>(&self, out: &mut W, e: &Expr, mode: Mode) -> Result<()> {
        match e {
            Expr::Binary { op, lhs, rhs } => {
                let prec = op_prec(*op).ok_or(Error::UnknownOperator(*op))?;
                let lhs_parens = match lhs.as_ref() {
                    Expr::Binary { op: lhs_op, .. } => {
                        op_prec(*lhs_op).ok_or(Error::UnknownOperator(*lhs_op))? < prec
                    }
                    _ => false,
                };
                if lhs_parens {
                    write!(out, "(")?;
                }
                self.render_expr(out, lhs, mode)?;
                if lhs_parens {
                    write!(out, ")")?;
                }
                write!(out, "{}", op)?;
                let rhs_parens = match rhs.as_ref() {
                    Expr::Binary { op: rhs_op, .. } => {
                        op_prec(*rhs_op).ok_or(Error::UnknownOperator(*rhs_op))? < prec
                    }
                    Expr::Unary { .. } => true,
                    _ => false,
                };
                if rhs_parens {
                    write!(out, "(")?;
                }
                self.render_expr(out, rhs, mode)?;
                if rhs_parens {
                    write!(out, ")")?;
                }
                Ok(())
            }
            Expr::Unary { op, operand } => {
                write!(out, "{}", op)?;
                let parens = matches!(
                    operand.as_ref(),
                    Expr::Binary { .. } | Expr::Unary { .. }
                );
                if parens {
                    write!(out, "(")?;
                }
                self.render_expr(out, operand, mode)?;
                if parens {
                    write!(out, ")")?;
                }
                Ok(())
            }
            Expr::Value(v) => {
                write!(out, "{}", v)?;
                Ok(())
            }
            Expr::Identifier(name) | Expr::Delta(name) | Expr::FieldValue { name, .. } => {
                if mode == Mode::Symbolic && self.model.is_var(name) {
                    write!(out, "sym_{}", name)?;
                } else if self.model.is_param(name) || self.model.is_var(name) {
                    write!(out, "{}", name)?;
                } else {
                    return Err(Error::UndefinedIdentifier(name.clone()));
                }
                Ok(())
            }
            Expr::Lap(operand) => {
                write!(out, "lap(")?;
                self.render_expr(out, operand, mode)?;
                write!(out, ")")?;
                Ok(())
            }
            Expr::Func { name, args } => {
                if name != "sin" && name != "cos" && name != "pow" {
                    return Err(Error::UnsupportedFunction(name.clone()));
                }
                write!(out, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(out, ", ")?;
                    }
                    self.render_expr(out, arg, mode)?;
                }
                write!(out, ")")?;
                Ok(())
            }
            Expr::Diff { operand, wrt } => {
                if wrt != "r" {
                    return Err(Error::DifferentiationVariable(wrt.clone()));
                }
                write!(out, "(map.D, ")?;
                self.render_expr(out, operand, mode)?;
                write!(out, ")")?;
                Ok(())
            }
            other @ (Expr::Div(_) | Expr::Grad(_)) => Err(Error::NotImplemented(format!(
                "emission of {}",
                other
            ))),
        }
    }
}

/// Identifier-like names in tree order, duplicates included; callers filter
/// and dedup. Walks the generic children list so names inside operators and
/// function arguments are seen too.
fn collect_identifiers<'e>(e: &'e Expr, acc: &mut Vec<&'e str>) {
    if let Some(name) = e.as_identifier() {
        acc.push(name);
    }
    for child in e.children() {
        collect_identifiers(child, acc);
    }
}
