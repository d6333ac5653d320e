//! Functional (variational) derivative of an expression with respect to
//! perturbations of its identifiers.
//!
//! Used to linearise pure boundary-point equations for the Newton solve:
//! every identifier-like leaf is treated as an implicitly perturbable field
//! and replaced by its delta placeholder. Only the algebra that shows up in
//! first-order field equations is covered (`+`, `-`, `*`, values and
//! identifiers); interior-domain equations are linearised by the solver
//! library itself and never pass through here.

use crate::error::{Error, Result};
use crate::ir::expr::{self, Expr};

/// Compute the functional derivative of `e`.
///
/// Zero terms arising from constant operands are elided on the fly: the
/// derivative of `a + c` with constant `c` is the derivative of `a`, not a
/// sum with a trailing zero.
pub fn functional_derivative(e: &Expr) -> Result<Expr> {
    match e {
        Expr::Binary { op, lhs, rhs } => {
            let zero = expr::value(0.0);
            match op {
                '+' => {
                    let dlhs = functional_derivative(lhs)?;
                    let drhs = functional_derivative(rhs)?;
                    if drhs == zero {
                        return Ok(dlhs);
                    }
                    if dlhs == zero {
                        return Ok(drhs);
                    }
                    Ok(dlhs + drhs)
                }
                '-' => {
                    let dlhs = functional_derivative(lhs)?;
                    let drhs = functional_derivative(rhs)?;
                    if drhs == zero {
                        return Ok(dlhs);
                    }
                    if dlhs == zero {
                        return Ok(-drhs);
                    }
                    Ok(dlhs - drhs)
                }
                '*' => {
                    let dlhs = functional_derivative(lhs)?;
                    let drhs = functional_derivative(rhs)?;
                    let rhs = rhs.as_ref().clone();
                    let lhs = lhs.as_ref().clone();
                    Ok(dlhs * rhs + lhs * drhs)
                }
                _ => Err(Error::NotImplemented(format!(
                    "functional derivative of operator {}",
                    op
                ))),
            }
        }
        // field values and deltas are identifier-like: perturbing `Phi[1]`
        // perturbs the field `Phi`
        Expr::Identifier(name) | Expr::Delta(name) | Expr::FieldValue { name, .. } => {
            Ok(expr::delta(name.clone()))
        }
        Expr::Value(_) => Ok(expr::value(0.0)),
        other => Err(Error::NotImplemented(format!(
            "functional derivative of {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::expr::{delta, diff, field_value, grad, ident, lap, sin, unary, value};

    #[test]
    fn derivative_of_a_value_is_zero() {
        assert_eq!(functional_derivative(&value(5.0)).unwrap(), value(0.0));
    }

    #[test]
    fn derivative_of_an_identifier_is_its_delta() {
        assert_eq!(functional_derivative(&ident("T")).unwrap(), delta("T"));
    }

    #[test]
    fn derivative_of_a_field_value_perturbs_the_field() {
        let e = field_value("Phi", value(1.0)) - value(1.0);
        assert_eq!(functional_derivative(&e).unwrap(), delta("Phi"));
    }

    #[test]
    fn product_rule() {
        let e = ident("a") * ident("b");
        let expected = delta("a") * ident("b") + ident("a") * delta("b");
        assert_eq!(functional_derivative(&e).unwrap(), expected);
    }

    #[test]
    fn zero_terms_are_elided() {
        let e = ident("a") + value(2.0);
        assert_eq!(functional_derivative(&e).unwrap(), delta("a"));

        let e = value(2.0) + ident("a");
        assert_eq!(functional_derivative(&e).unwrap(), delta("a"));

        // leading constant in a difference flips the sign of the rest
        let e = value(1.0) - ident("a");
        assert_eq!(
            functional_derivative(&e).unwrap(),
            unary('-', delta("a"))
        );

        let e = ident("a") - ident("b");
        assert_eq!(
            functional_derivative(&e).unwrap(),
            delta("a") - delta("b")
        );
    }

    #[test]
    fn unsupported_constructs_are_reported() {
        for e in [
            lap(&ident("Phi")),
            grad(&ident("Phi")),
            sin(&ident("x")),
            diff(&ident("Phi"), "r"),
            ident("a") / ident("b"),
            unary('-', ident("a")),
        ] {
            assert!(matches!(
                functional_derivative(&e),
                Err(Error::NotImplemented(_))
            ));
        }
    }
}
