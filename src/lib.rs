//! pdesl is a compiler for a small domain-specific language describing
//! symbolic partial differential equations: fields, differential operators
//! and boundary conditions. It emits C++ source code that registers the
//! unknowns with a numerical solver library, builds the symbolic residuals
//! for Newton iteration and constrains the boundary rows.
//!
//! The pipeline is a single pass: [`parser::parse_string`] populates a
//! [`model::SolverModel`] from the DSL text, and
//! [`codegen::Emitter::emit_code`] lowers it onto an output stream.
//! Equations whose sides sample a field at a boundary index (`Phi[0]`,
//! `Phi[1]`) bypass the symbolic route: they are linearised by the
//! functional-derivative engine ([`derivative::functional_derivative`]) and
//! written as direct boundary-row contributions.

pub mod codegen;
pub mod derivative;
pub mod error;
pub mod ir;
pub mod model;
pub mod parser;

pub use codegen::{Emitter, MAPPING_TEMPLATE};
pub use error::{Error, Result};
pub use model::SolverModel;

use std::io::Write;

/// Parse a model description and emit solver code in one step.
pub fn compile<W: Write>(text: &str, template: &str, out: &mut W) -> Result<()> {
    let model = parser::parse_string(text)?;
    Emitter::new(&model).emit_code(template, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLY1D: &str = include_str!("../samples/poly1d.pde");

    #[test]
    fn compile_poly1d_end_to_end() {
        let mut buf = Vec::new();
        compile(POLY1D, MAPPING_TEMPLATE, &mut buf).unwrap();
        let code = String::from_utf8(buf).unwrap();

        // preamble: include, mapping template, externs for the parameter
        // and every variable backing store
        assert!(code.starts_with("#include <ester.h>\n"));
        assert!(code.contains("void create_map(mapping& map)"));
        assert!(code.contains("extern double n;"));
        assert!(code.contains("extern matrix Phi;"));
        assert!(code.contains("extern matrix Phi0;"));
        assert!(code.contains("extern matrix Lambda;"));

        // factory body registers all three unknowns
        assert!(code.contains("op->init(1, 3, \"full\");"));
        for var in ["Phi", "Phi0", "Lambda"] {
            assert!(code.contains(&format!("op->regvar(\"{}\");", var)));
            assert!(code.contains(&format!("S.set_value(\"{}\", {});", var, var)));
        }

        // the interior equation goes through the symbolic route
        assert!(code.contains(
            "sym eq_poisson = lap(sym_Phi)-sym_Lambda*pow(sym_Phi0-sym_Phi, n);"
        ));
        assert!(code.contains("eq_poisson.add(op, \"poisson\", \"Phi\");"));
        assert!(code.contains("eq_poisson.add(op, \"poisson\", \"Lambda\");"));
        assert!(code.contains("eq_poisson.add(op, \"poisson\", \"Phi0\");"));
        assert!(code.contains("op->bc_bot2_add_d(0, \"poisson\", \"Phi\", ones(1, 1));"));
        assert!(code.contains(
            "op->bc_top1_add_l(0, \"poisson\", \"Phi\", ones(1, 1), map.D.block(-1).row(-1));"
        ));
        assert!(code.contains("matrix rhs = -eq_poisson.eval();"));
        assert!(code.contains("rhs(-1) = -((map.D, Phi)+Phi)(-1);"));

        // the field-value equations constrain boundary rows directly
        assert!(code.contains("op->bc_bot2_add_d(0, \"center_value\", \"Phi\", ones(1, 1));"));
        assert!(code.contains("op->bc_bot2_add_d(0, \"center_value\", \"Phi0\", -ones(1, 1));"));
        assert!(code.contains("op->bc_top1_add_d(0, \"normalization\", \"Phi\", ones(1, 1));"));
        assert!(code.contains("op->set_rhs(\"normalization\", -(Phi-1-0)(-1)*ones(1, 1));"));

        assert!(code.trim_end().ends_with("return op;\n}"));
    }

    #[test]
    fn compile_reports_semantic_errors() {
        let err = compile(
            "field Phi; eq bad: lap(Phi) = undeclared;",
            MAPPING_TEMPLATE,
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UndefinedIdentifier(ref name) if name == "undeclared"));
    }
}
