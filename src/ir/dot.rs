//! GraphViz rendering of IR trees, for diagnostics only.
//!
//! Walks the expression/equation structure through the generic `children`
//! accessors and writes a `dot` digraph, one node per IR node labeled with
//! its short debug tag. Shared subtrees keep a single node in the graph.

use std::io::{self, Write};

use super::equation::Equation;
use super::expr::Expr;

fn node_id(e: &Expr) -> usize {
    e as *const Expr as usize
}

fn write_expr_nodes<W: Write>(out: &mut W, e: &Expr) -> io::Result<()> {
    writeln!(out, "{} [label=\"{}\"]", node_id(e), e)?;
    for child in e.children() {
        writeln!(out, "{} -> {}", node_id(e), node_id(child))?;
    }
    for child in e.children() {
        write_expr_nodes(out, child)?;
    }
    Ok(())
}

fn write_header<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out, "digraph ir {{")?;
    if !title.is_empty() {
        writeln!(out, "graph [label=\"{}\", labelloc=t, fontsize=20];", title)?;
    }
    writeln!(out, "node [shape = Mrecord]")
}

/// Render a single expression tree.
pub fn write_expr_dot<W: Write>(out: &mut W, e: &Expr, title: &str) -> io::Result<()> {
    write_header(out, title)?;
    write_expr_nodes(out, e)?;
    writeln!(out, "}}")
}

/// Render an equation with its boundary conditions.
pub fn write_equation_dot<W: Write>(out: &mut W, eq: &Equation, title: &str) -> io::Result<()> {
    write_header(out, title)?;
    write_equation_nodes(out, eq)?;
    writeln!(out, "}}")
}

fn write_equation_nodes<W: Write>(out: &mut W, eq: &Equation) -> io::Result<()> {
    let eq_id = eq as *const Equation as usize;
    writeln!(out, "{} [label=\"{}\"]", eq_id, eq)?;
    writeln!(out, "{} -> {}", eq_id, node_id(&eq.lhs))?;
    writeln!(out, "{} -> {}", eq_id, node_id(&eq.rhs))?;
    write_expr_nodes(out, &eq.lhs)?;
    write_expr_nodes(out, &eq.rhs)?;
    for bc in &eq.bcs {
        let bc_id = bc as *const _ as usize;
        writeln!(out, "{} [label=\"{}\"]", bc_id, bc)?;
        writeln!(out, "{} -> {}", eq_id, bc_id)?;
        let cond_id = &bc.cond as *const Equation as usize;
        writeln!(out, "{} -> {}", bc_id, cond_id)?;
        write_equation_nodes(out, &bc.cond)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::equation::{BcLoc, BoundaryCondition};
    use crate::ir::expr::{ident, lap, value};

    #[test]
    fn expr_graph_lists_every_node() {
        let e = lap(&ident("Phi")) - ident("rho");
        let mut buf = Vec::new();
        write_expr_dot(&mut buf, &e, "residual").unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("digraph ir {"));
        assert!(text.contains("label=\"residual\""));
        assert!(text.contains("BE: -"));
        assert!(text.contains("LAP"));
        assert!(text.contains("ID: Phi"));
        assert!(text.contains("ID: rho"));
        // one label line per node
        assert_eq!(text.matches("label=\"").count(), 1 + e.node_count());
    }

    #[test]
    fn equation_graph_includes_boundary_conditions() {
        let mut eq = Equation::new("poisson", lap(&ident("Phi")), ident("rho"));
        eq.add_boundary_condition(BoundaryCondition::new(
            BcLoc::Center,
            Equation::new("poisson_center", ident("Phi"), value(0.0)),
        ));
        let mut buf = Vec::new();
        write_equation_dot(&mut buf, &eq, "").unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("EQ: poisson"));
        assert!(text.contains("BC at CENTER"));
        assert!(text.contains("EQ: poisson_center"));
        assert!(!text.contains("graph [label"));
    }
}
