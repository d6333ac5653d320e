use pest::iterators::Pair;
use pest::Parser as _;
use pest_derive::Parser;

use crate::error::{Error, Result};
use crate::ir::equation::{BcLoc, BoundaryCondition, Equation};
use crate::ir::expr::{self, Expr};
use crate::model::{SolverModel, VarKind};

#[derive(Parser)]
#[grammar = "parser/pde_grammar.pest"] // relative to src
pub struct PdeParser;

//sign       = @{ "-" | "+" }
//term_op    = @{ "-" | "+" }
//factor_op  = @{ "*" | "/" }
fn parse_op(pair: Pair<Rule>) -> char {
    pair.as_str().chars().next().unwrap()
}

fn parse_expression(pair: Pair<Rule>) -> Result<Expr> {
    match pair.as_rule() {
        //expression = { sign? ~ term ~ (term_op ~ term)* }
        Rule::expression => {
            let mut inner = pair.into_inner();
            let sign = if inner.peek().unwrap().as_rule() == Rule::sign {
                Some(parse_op(inner.next().unwrap()))
            } else {
                None
            };
            let mut head = parse_expression(inner.next().unwrap())?;
            if sign == Some('-') {
                head = expr::unary('-', head);
            }
            while inner.peek().is_some() {
                let op = parse_op(inner.next().unwrap());
                let rhs = parse_expression(inner.next().unwrap())?;
                head = expr::binary(head, op, rhs);
            }
            Ok(head)
        }

        //term       = { factor ~ (factor_op ~ factor)* }
        Rule::term => {
            let mut inner = pair.into_inner();
            let mut head = parse_expression(inner.next().unwrap())?;
            while inner.peek().is_some() {
                let op = parse_op(inner.next().unwrap());
                let rhs = parse_expression(inner.next().unwrap())?;
                head = expr::binary(head, op, rhs);
            }
            Ok(head)
        }

        // factor     = { call | field_value | name | real | integer | "(" ~ expression ~ ")" }
        Rule::factor => parse_expression(pair.into_inner().next().unwrap()),

        //call       = { name ~ "(" ~ expression ~ ("," ~ expression)* ~ ")" }
        Rule::call => {
            let mut inner = pair.into_inner();
            let name = inner.next().unwrap().as_str();
            let args = inner.map(parse_expression).collect::<Result<Vec<_>>>()?;
            build_call(name, args)
        }

        //field_value = { name ~ "[" ~ expression ~ "]" }
        Rule::field_value => {
            let mut inner = pair.into_inner();
            let name = inner.next().unwrap().as_str();
            let index = parse_expression(inner.next().unwrap())?;
            Ok(expr::field_value(name, index))
        }

        // name       = @{ ('a'..'z' | 'A'..'Z') ~ ("_" | 'a'..'z' | 'A'..'Z' | '0'..'9')* }
        Rule::name => Ok(expr::ident(pair.as_str())),

        // integer    = @{ ('0'..'9')+ }
        // real       = @{ ... }
        Rule::real | Rule::integer => Ok(expr::value(pair.as_str().parse().unwrap())),

        _ => unreachable!("{:?}", pair.to_string()),
    }
}

/// Calls named after the differential operators build the dedicated nodes;
/// everything else stays a plain function application for the emitter to
/// accept or reject.
fn build_call(name: &str, mut args: Vec<Expr>) -> Result<Expr> {
    match (name, args.len()) {
        ("div", 1) => Ok(expr::div(&args.pop().unwrap())),
        ("grad", 1) => Ok(expr::grad(&args.pop().unwrap())),
        ("lap", 1) => Ok(expr::lap(&args.pop().unwrap())),
        ("diff", 2) => {
            let wrt = args.pop().unwrap();
            let operand = args.pop().unwrap();
            match wrt {
                Expr::Identifier(id) => Ok(expr::diff(&operand, id)),
                other => Err(Error::Parse(format!(
                    "diff expects an identifier as its second argument, got {}",
                    other
                ))),
            }
        }
        _ => Ok(expr::func(name, args)),
    }
}

//bc         = { bc_loc ~ ":" ~ expression ~ "=" ~ expression ~ ";" }
fn parse_bc(pair: Pair<Rule>, eq_name: &str) -> Result<BoundaryCondition> {
    let mut inner = pair.into_inner();
    let loc_pair = inner.next().unwrap();
    let loc_name = loc_pair.as_str();
    let loc = match loc_name {
        "center" => BcLoc::Center,
        "surface" => BcLoc::Surface,
        "top" => BcLoc::Top,
        "bottom" => BcLoc::Bottom,
        _ => unreachable!(),
    };
    let lhs = parse_expression(inner.next().unwrap())?;
    let rhs = parse_expression(inner.next().unwrap())?;
    let cond = Equation::new(format!("{}_{}", eq_name, loc_name), lhs, rhs);
    Ok(BoundaryCondition::new(loc, cond))
}

//equation   = { "eq" ~ name ~ ":" ~ expression ~ "=" ~ expression ~ (bc_block | ";") }
fn parse_equation(pair: Pair<Rule>) -> Result<Equation> {
    let mut inner = pair.into_inner();
    let name = inner.next().unwrap().as_str().to_string();
    let lhs = parse_expression(inner.next().unwrap())?;
    let rhs = parse_expression(inner.next().unwrap())?;
    let mut eq = Equation::new(name.clone(), lhs, rhs);
    if let Some(block) = inner.next() {
        //bc_block   = { "{" ~ bc* ~ "}" }
        for bc_pair in block.into_inner() {
            eq.add_boundary_condition(parse_bc(bc_pair, &name)?);
        }
    }
    Ok(eq)
}

/// Parse a complete model description into a populated [`SolverModel`].
///
/// Duplicate variable registration is a non-fatal model error, but this
/// front end stops at the first one.
pub fn parse_string(text: &str) -> Result<SolverModel> {
    let main = PdeParser::parse(Rule::main, text)
        .map_err(|e| Error::Parse(e.to_string()))?
        .next()
        .unwrap();
    let mut model = SolverModel::new();
    for pair in main.into_inner() {
        match pair.as_rule() {
            //param_decl = { "param" ~ name ~ name ~ ";" }
            Rule::param_decl => {
                let mut inner = pair.into_inner();
                let name = inner.next().unwrap().as_str();
                let ty = inner.next().unwrap().as_str();
                model.add_param(name, ty);
            }
            //var_decl   = { var_kind ~ name ~ ";" }
            Rule::var_decl => {
                let mut inner = pair.into_inner();
                let kind = match inner.next().unwrap().as_str() {
                    "field" => VarKind::Field,
                    "real" => VarKind::Real,
                    _ => unreachable!(),
                };
                model.add_var(inner.next().unwrap().as_str(), kind)?;
            }
            Rule::equation => {
                let eq = parse_equation(pair)?;
                model.add_eq(eq);
            }
            Rule::EOI => {}
            _ => unreachable!("{:?}", pair.to_string()),
        }
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::expr::{diff, field_value, ident, lap, unary, value};

    const POLY1D: &str = include_str!("../../samples/poly1d.pde");

    #[test]
    fn parse_poly1d_sample() {
        let model = parse_string(POLY1D).unwrap();
        assert_eq!(model.vars().len(), 3);
        assert_eq!(model.vars()[0].name, "Phi");
        assert_eq!(model.vars()[0].kind, VarKind::Field);
        assert_eq!(model.vars()[1].kind, VarKind::Real);
        assert_eq!(model.params().get("n").map(String::as_str), Some("double"));
        assert_eq!(model.eqs().len(), 3);

        let poisson = &model.eqs()[0];
        assert_eq!(poisson.name, "poisson");
        assert_eq!(poisson.lhs, lap(&ident("Phi")));
        assert_eq!(
            poisson.rhs,
            ident("Lambda")
                * crate::ir::expr::func("pow", vec![ident("Phi0") - ident("Phi"), ident("n")])
        );
        assert_eq!(poisson.bcs.len(), 2);
        assert_eq!(poisson.bcs[0].loc, BcLoc::Center);
        assert_eq!(poisson.bcs[0].cond.name, "poisson_center");
        assert_eq!(
            poisson.bcs[1].cond.lhs,
            diff(&ident("Phi"), "r") + ident("Phi")
        );

        let normalization = &model.eqs()[2];
        assert_eq!(
            normalization.lhs,
            field_value("Phi", value(1.0)) - value(1.0)
        );
        assert!(normalization.lhs.has_field_value());
        assert!(!poisson.lhs.has_field_value());
    }

    #[test]
    fn leading_sign_wraps_the_first_term_only() {
        let model = parse_string("field a; field b; eq e: -a + b = 0;").unwrap();
        let expected = unary('-', ident("a")) + ident("b");
        assert_eq!(model.eqs()[0].lhs, expected);
    }

    #[test]
    fn precedence_groups_factors_before_terms() {
        let model = parse_string("field a; eq e: a + 2*a = 3.5;").unwrap();
        let expected = ident("a") + value(2.0) * ident("a");
        assert_eq!(model.eqs()[0].lhs, expected);
        assert_eq!(model.eqs()[0].rhs, value(3.5));
    }

    #[test]
    fn parenthesized_groups_override_precedence() {
        let model = parse_string("field a; field b; eq e: (a + b)*a = 0;").unwrap();
        let expected = (ident("a") + ident("b")) * ident("a");
        assert_eq!(model.eqs()[0].lhs, expected);
    }

    #[test]
    fn duplicate_variable_halts_the_parse() {
        let err = parse_string("field Phi; real Phi;").unwrap_err();
        assert!(matches!(err, Error::DuplicateVariable(ref name) if name == "Phi"));
    }

    #[test]
    fn syntax_errors_are_reported() {
        assert!(matches!(
            parse_string("field ;"),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            parse_string("eq e: = 0;"),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn diff_needs_an_identifier() {
        let err = parse_string("field Phi; eq e: diff(Phi, 2) = 0;").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn unknown_calls_stay_plain_functions() {
        let model = parse_string("field a; eq e: tanh(a) = 0;").unwrap();
        assert_eq!(
            model.eqs()[0].lhs,
            crate::ir::expr::func("tanh", vec![ident("a")])
        );
    }
}
