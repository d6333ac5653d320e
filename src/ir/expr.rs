use std::fmt;
use std::ops;
use std::rc::Rc;

/// Symbolic expression tree.
///
/// Nodes are immutable once constructed and share subtrees through `Rc`, so
/// an expression can appear under several parents without copying. Composing
/// expressions (constructors, `+ - * /`, unary `-`) clones the operand
/// handles; [`Expr::deep_copy`] produces a tree sharing nothing with the
/// original.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Numeric literal.
    Value(f64),
    /// Named scalar or field reference.
    Identifier(String),
    /// Functional-derivative placeholder for the identifier `name`.
    Delta(String),
    /// Value of field `name` sampled at a boundary index expression.
    FieldValue { name: String, index: Rc<Expr> },
    Binary {
        op: char,
        lhs: Rc<Expr>,
        rhs: Rc<Expr>,
    },
    Unary {
        op: char,
        operand: Rc<Expr>,
    },
    /// Named function application, e.g. `sin`, `cos`, `pow`.
    Func { name: String, args: Vec<Rc<Expr>> },
    Div(Rc<Expr>),
    Grad(Rc<Expr>),
    Lap(Rc<Expr>),
    /// Derivative of `operand` with respect to the identifier named `wrt`.
    Diff { operand: Rc<Expr>, wrt: String },
}

/// Precedence of a binary/unary operator, `None` for anything outside `+ - * /`.
pub fn op_prec(op: char) -> Option<i32> {
    match op {
        '+' | '-' => Some(1),
        '*' | '/' => Some(2),
        _ => None,
    }
}

impl Expr {
    /// Name carried by identifier-like nodes: identifiers, deltas and field
    /// values all answer to a plain name.
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Expr::Identifier(name) | Expr::Delta(name) | Expr::FieldValue { name, .. } => {
                Some(name)
            }
            _ => None,
        }
    }

    /// True iff a `FieldValue` occurs anywhere in the subtree. Decides
    /// whether an equation is discretised symbolically or constrains a
    /// boundary row directly.
    pub fn has_field_value(&self) -> bool {
        matches!(self, Expr::FieldValue { .. })
            || self.children().iter().any(|c| c.has_field_value())
    }

    /// Child nodes in construction order, for generic tree walks
    /// (diagnostics, node counting). The core algorithms match on the
    /// variants directly.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Value(_) | Expr::Identifier(_) | Expr::Delta(_) => vec![],
            Expr::FieldValue { index, .. } => vec![index.as_ref()],
            Expr::Binary { lhs, rhs, .. } => vec![lhs.as_ref(), rhs.as_ref()],
            Expr::Unary { operand, .. } => vec![operand.as_ref()],
            Expr::Func { args, .. } => args.iter().map(|a| a.as_ref()).collect(),
            Expr::Div(e) | Expr::Grad(e) | Expr::Lap(e) => vec![e.as_ref()],
            Expr::Diff { operand, .. } => vec![operand.as_ref()],
        }
    }

    /// Number of nodes in the subtree, this node included.
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Structurally identical clone sharing no node with `self`.
    pub fn deep_copy(&self) -> Expr {
        match self {
            Expr::Value(v) => Expr::Value(*v),
            Expr::Identifier(name) => Expr::Identifier(name.clone()),
            Expr::Delta(name) => Expr::Delta(name.clone()),
            Expr::FieldValue { name, index } => Expr::FieldValue {
                name: name.clone(),
                index: Rc::new(index.deep_copy()),
            },
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                lhs: Rc::new(lhs.deep_copy()),
                rhs: Rc::new(rhs.deep_copy()),
            },
            Expr::Unary { op, operand } => Expr::Unary {
                op: *op,
                operand: Rc::new(operand.deep_copy()),
            },
            Expr::Func { name, args } => Expr::Func {
                name: name.clone(),
                args: args.iter().map(|a| Rc::new(a.deep_copy())).collect(),
            },
            Expr::Div(e) => Expr::Div(Rc::new(e.deep_copy())),
            Expr::Grad(e) => Expr::Grad(Rc::new(e.deep_copy())),
            Expr::Lap(e) => Expr::Lap(Rc::new(e.deep_copy())),
            Expr::Diff { operand, wrt } => Expr::Diff {
                operand: Rc::new(operand.deep_copy()),
                wrt: wrt.clone(),
            },
        }
    }
}

/// Structural equality: same kind, same key fields, children compared
/// recursively. No algebraic normalisation, so `a + b != b + a` unless the
/// operands already line up. A `Delta` compares equal to an `Identifier` of
/// the same name (it stands in for that identifier's perturbation); a
/// `FieldValue` is only equal to another `FieldValue` with the same name and
/// index.
impl PartialEq for Expr {
    fn eq(&self, other: &Expr) -> bool {
        match (self, other) {
            (Expr::Value(a), Expr::Value(b)) => a == b,
            (
                Expr::FieldValue { name: a, index: i },
                Expr::FieldValue { name: b, index: j },
            ) => a == b && i == j,
            (
                Expr::Identifier(a) | Expr::Delta(a),
                Expr::Identifier(b) | Expr::Delta(b),
            ) => a == b,
            (
                Expr::Binary {
                    op: op_a,
                    lhs: lhs_a,
                    rhs: rhs_a,
                },
                Expr::Binary {
                    op: op_b,
                    lhs: lhs_b,
                    rhs: rhs_b,
                },
            ) => op_a == op_b && lhs_a == lhs_b && rhs_a == rhs_b,
            (
                Expr::Unary {
                    op: op_a,
                    operand: a,
                },
                Expr::Unary {
                    op: op_b,
                    operand: b,
                },
            ) => op_a == op_b && a == b,
            (
                Expr::Func {
                    name: name_a,
                    args: args_a,
                },
                Expr::Func {
                    name: name_b,
                    args: args_b,
                },
            ) => name_a == name_b && args_a == args_b,
            (Expr::Div(a), Expr::Div(b)) => a == b,
            (Expr::Grad(a), Expr::Grad(b)) => a == b,
            (Expr::Lap(a), Expr::Lap(b)) => a == b,
            (
                Expr::Diff {
                    operand: a,
                    wrt: wrt_a,
                },
                Expr::Diff {
                    operand: b,
                    wrt: wrt_b,
                },
            ) => a == b && wrt_a == wrt_b,
            _ => false,
        }
    }
}

/// Short debug tag (kind + key fields). Full rendering of an expression is
/// the emitter's job.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Value(v) => write!(f, "VAL: {}", v),
            Expr::Identifier(name) => write!(f, "ID: {}", name),
            Expr::Delta(name) => write!(f, "delta: {}", name),
            Expr::FieldValue { name, .. } => write!(f, "FV: {}[]", name),
            Expr::Binary { op, .. } => write!(f, "BE: {}", op),
            Expr::Unary { op, .. } => write!(f, "UE: {}", op),
            Expr::Func { name, .. } => write!(f, "FUNC: {}", name),
            Expr::Div(_) => write!(f, "DIV"),
            Expr::Grad(_) => write!(f, "GRAD"),
            Expr::Lap(_) => write!(f, "LAP"),
            Expr::Diff { wrt, .. } => write!(f, "DIFF: d/d{}", wrt),
        }
    }
}

pub fn value(v: f64) -> Expr {
    Expr::Value(v)
}

pub fn ident(name: impl Into<String>) -> Expr {
    Expr::Identifier(name.into())
}

pub fn delta(name: impl Into<String>) -> Expr {
    Expr::Delta(name.into())
}

pub fn field_value(name: impl Into<String>, index: Expr) -> Expr {
    Expr::FieldValue {
        name: name.into(),
        index: Rc::new(index),
    }
}

pub fn binary(lhs: Expr, op: char, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Rc::new(lhs),
        rhs: Rc::new(rhs),
    }
}

pub fn unary(op: char, operand: Expr) -> Expr {
    Expr::Unary {
        op,
        operand: Rc::new(operand),
    }
}

pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::Func {
        name: name.into(),
        args: args.into_iter().map(Rc::new).collect(),
    }
}

pub fn sin(e: &Expr) -> Expr {
    func("sin", vec![e.clone()])
}

pub fn cos(e: &Expr) -> Expr {
    func("cos", vec![e.clone()])
}

/// `pow(e, p)` is sugar for `Func("pow", [e, Value(p)])`.
pub fn pow(e: &Expr, p: i32) -> Expr {
    func("pow", vec![e.clone(), value(p as f64)])
}

pub fn div(e: &Expr) -> Expr {
    Expr::Div(Rc::new(e.clone()))
}

pub fn grad(e: &Expr) -> Expr {
    Expr::Grad(Rc::new(e.clone()))
}

pub fn lap(e: &Expr) -> Expr {
    Expr::Lap(Rc::new(e.clone()))
}

pub fn diff(e: &Expr, wrt: impl Into<String>) -> Expr {
    Expr::Diff {
        operand: Rc::new(e.clone()),
        wrt: wrt.into(),
    }
}

impl ops::Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        binary(self, '+', rhs)
    }
}

impl ops::Add for &Expr {
    type Output = Expr;
    fn add(self, rhs: &Expr) -> Expr {
        binary(self.clone(), '+', rhs.clone())
    }
}

impl ops::Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        binary(self, '-', rhs)
    }
}

impl ops::Sub for &Expr {
    type Output = Expr;
    fn sub(self, rhs: &Expr) -> Expr {
        binary(self.clone(), '-', rhs.clone())
    }
}

impl ops::Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        binary(self, '*', rhs)
    }
}

impl ops::Mul for &Expr {
    type Output = Expr;
    fn mul(self, rhs: &Expr) -> Expr {
        binary(self.clone(), '*', rhs.clone())
    }
}

impl ops::Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        binary(self, '/', rhs)
    }
}

impl ops::Div for &Expr {
    type Output = Expr;
    fn div(self, rhs: &Expr) -> Expr {
        binary(self.clone(), '/', rhs.clone())
    }
}

impl ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        unary('-', self)
    }
}

impl ops::Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        unary('-', self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_copy_is_equal_and_disjoint() {
        let e = (ident("a") + ident("b")) * lap(&ident("Phi"));
        let copy = e.deep_copy();
        assert_eq!(e, copy);
        // no owned child is shared between the two trees
        if let (Expr::Binary { lhs: l1, rhs: r1, .. }, Expr::Binary { lhs: l2, rhs: r2, .. }) =
            (&e, &copy)
        {
            assert!(!Rc::ptr_eq(l1, l2));
            assert!(!Rc::ptr_eq(r1, r2));
        } else {
            panic!("expected binary nodes");
        }
        assert_eq!(e.node_count(), copy.node_count());
    }

    #[test]
    fn equality_is_structural_not_commutative() {
        let ab = ident("a") + ident("b");
        let ba = ident("b") + ident("a");
        assert_ne!(ab, ba);
        assert_eq!(ab, ident("a") + ident("b"));
        assert_ne!(ident("a") + ident("b"), ident("a") - ident("b"));
    }

    #[test]
    fn delta_compares_as_identifier() {
        assert_eq!(delta("T"), delta("T"));
        assert_eq!(delta("T"), ident("T"));
        assert_ne!(delta("T"), delta("S"));
        // a field value is not a bare identifier
        assert_ne!(field_value("T", value(0.0)), ident("T"));
    }

    #[test]
    fn func_equality_needs_all_arguments_equal() {
        let f = func("pow", vec![ident("x"), value(2.0)]);
        let g = func("pow", vec![ident("x"), value(3.0)]);
        assert_ne!(f, g);
        assert_eq!(f, func("pow", vec![ident("x"), value(2.0)]));
        assert_ne!(f, func("sin", vec![ident("x"), value(2.0)]));
        assert_ne!(f, func("pow", vec![ident("x")]));
    }

    #[test]
    fn field_value_detection() {
        let e = ident("a") * (field_value("Phi", value(0.0)) - ident("b"));
        assert!(e.has_field_value());
        assert!(!(ident("a") + value(1.0)).has_field_value());
        assert!(lap(&field_value("Phi", value(1.0))).has_field_value());
    }

    #[test]
    fn composition_shares_subtrees() {
        let inner = ident("x") + ident("y");
        let e = &inner * &inner;
        if let Expr::Binary { lhs, rhs, .. } = &e {
            assert_eq!(lhs.as_ref(), rhs.as_ref());
            // shallow clones of `inner` alias its immutable children
            if let (
                Expr::Binary { lhs: a, .. },
                Expr::Binary { lhs: b, .. },
            ) = (lhs.as_ref(), rhs.as_ref())
            {
                assert!(Rc::ptr_eq(a, b));
            } else {
                panic!("expected binary nodes");
            }
        } else {
            panic!("expected binary node");
        }
        assert_eq!(e.node_count(), 7);
    }

    #[test]
    fn display_is_a_short_tag() {
        assert_eq!(format!("{}", value(5.0)), "VAL: 5");
        assert_eq!(format!("{}", ident("Phi")), "ID: Phi");
        assert_eq!(format!("{}", delta("Phi")), "delta: Phi");
        assert_eq!(format!("{}", field_value("Phi", value(0.0))), "FV: Phi[]");
        assert_eq!(format!("{}", ident("a") + ident("b")), "BE: +");
        assert_eq!(format!("{}", diff(&ident("Phi"), "r")), "DIFF: d/dr");
    }
}
