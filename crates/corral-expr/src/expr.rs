//! Predicate expression tree: construction, evaluation, decomposition.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BinOp {
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Arithmetic
    Add,
    Sub,
    Mul,
}

impl BinOp {
    /// Whether this operator yields a truth value.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }
}

/// N-ary logical operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NaryOp {
    And,
    Or,
}

/// A predicate expression over integer state variables.
///
/// Truth values follow integer semantics: zero is false, anything else
/// is true. The canonical constants are `Int(0)` and `Int(1)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Expr {
    /// Integer literal.
    Int(i64),
    /// State variable reference by index.
    Var(usize),
    /// Binary operation.
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Flat n-ary conjunction or disjunction.
    Nary { op: NaryOp, args: Vec<Expr> },
    /// Logical negation.
    Not(Box<Expr>),
}

impl Expr {
    /// The canonical `true` predicate.
    pub fn truth() -> Expr {
        Expr::Int(1)
    }

    /// The canonical `false` predicate.
    pub fn falsity() -> Expr {
        Expr::Int(0)
    }

    pub fn var(idx: usize) -> Expr {
        Expr::Var(idx)
    }

    pub fn int(v: i64) -> Expr {
        Expr::Int(v)
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn eq(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinOp::Eq, left, right)
    }

    pub fn ge(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinOp::Ge, left, right)
    }

    pub fn le(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinOp::Le, left, right)
    }

    pub fn and(args: Vec<Expr>) -> Expr {
        Expr::Nary {
            op: NaryOp::And,
            args,
        }
    }

    pub fn or(args: Vec<Expr>) -> Expr {
        Expr::Nary {
            op: NaryOp::Or,
            args,
        }
    }

    pub fn not(inner: Expr) -> Expr {
        Expr::Not(Box::new(inner))
    }

    /// Point predicate `x_0 = v_0 ∧ ... ∧ x_n = v_n` for a state vector.
    pub fn point(values: &[i64]) -> Expr {
        Expr::and(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| Expr::eq(Expr::Var(i), Expr::Int(*v)))
                .collect(),
        )
    }

    /// Box predicate `⋀_i lb_i ≤ x_i ≤ ub_i` over the given variable
    /// indices and per-index bounds.
    pub fn rectangle(indices: &[usize], lower: &[i64], upper: &[i64]) -> Expr {
        let mut args = Vec::with_capacity(indices.len() * 2);
        for (k, &idx) in indices.iter().enumerate() {
            args.push(Expr::ge(Expr::Var(idx), Expr::Int(lower[k])));
            args.push(Expr::le(Expr::Var(idx), Expr::Int(upper[k])));
        }
        Expr::and(args)
    }

    /// Evaluate over a state vector. Comparisons and logical operators
    /// yield 0 or 1; arithmetic yields the computed value.
    pub fn evaluate(&self, state: &[i64]) -> i64 {
        match self {
            Expr::Int(v) => *v,
            Expr::Var(idx) => state[*idx],
            Expr::Binary { op, left, right } => {
                let l = left.evaluate(state);
                let r = right.evaluate(state);
                match op {
                    BinOp::Eq => (l == r) as i64,
                    BinOp::Ne => (l != r) as i64,
                    BinOp::Lt => (l < r) as i64,
                    BinOp::Le => (l <= r) as i64,
                    BinOp::Gt => (l > r) as i64,
                    BinOp::Ge => (l >= r) as i64,
                    BinOp::Add => l + r,
                    BinOp::Sub => l - r,
                    BinOp::Mul => l * r,
                }
            }
            Expr::Nary { op, args } => match op {
                NaryOp::And => args.iter().all(|a| a.evaluate(state) != 0) as i64,
                NaryOp::Or => args.iter().any(|a| a.evaluate(state) != 0) as i64,
            },
            Expr::Not(inner) => (inner.evaluate(state) == 0) as i64,
        }
    }

    /// Evaluate as a truth value.
    pub fn holds(&self, state: &[i64]) -> bool {
        self.evaluate(state) != 0
    }

    /// Split a top-level conjunction into its conjuncts.
    /// Non-conjunction expressions yield a singleton list.
    pub fn split_conjunction(&self) -> Vec<Expr> {
        match self {
            Expr::Nary {
                op: NaryOp::And,
                args,
            } => args.clone(),
            other => vec![other.clone()],
        }
    }

    /// Split a top-level disjunction into its disjuncts.
    pub fn split_disjunction(&self) -> Vec<Expr> {
        match self {
            Expr::Nary {
                op: NaryOp::Or,
                args,
            } => args.clone(),
            other => vec![other.clone()],
        }
    }

    /// Reassemble conjuncts. Empty lists yield `true`.
    pub fn construct_conjunction(mut args: Vec<Expr>) -> Expr {
        match args.len() {
            0 => Expr::truth(),
            1 => args.pop().unwrap(),
            _ => Expr::and(args),
        }
    }

    /// Reassemble disjuncts. Empty lists yield `false`.
    pub fn construct_disjunction(mut args: Vec<Expr>) -> Expr {
        match args.len() {
            0 => Expr::falsity(),
            1 => args.pop().unwrap(),
            _ => Expr::or(args),
        }
    }

    /// Largest variable index referenced, if any variable occurs.
    pub fn max_var(&self) -> Option<usize> {
        match self {
            Expr::Int(_) => None,
            Expr::Var(idx) => Some(*idx),
            Expr::Binary { left, right, .. } => match (left.max_var(), right.max_var()) {
                (Some(l), Some(r)) => Some(l.max(r)),
                (l, r) => l.or(r),
            },
            Expr::Nary { args, .. } => args.iter().filter_map(|a| a.max_var()).max(),
            Expr::Not(inner) => inner.max_var(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(v) => write!(f, "{}", v),
            Expr::Var(idx) => write!(f, "x{}", idx),
            Expr::Binary { op, left, right } => {
                let sym = match op {
                    BinOp::Eq => "=",
                    BinOp::Ne => "!=",
                    BinOp::Lt => "<",
                    BinOp::Le => "<=",
                    BinOp::Gt => ">",
                    BinOp::Ge => ">=",
                    BinOp::Add => "+",
                    BinOp::Sub => "-",
                    BinOp::Mul => "*",
                };
                write!(f, "({} {} {})", left, sym, right)
            }
            Expr::Nary { op, args } => {
                if args.is_empty() {
                    return match op {
                        NaryOp::And => write!(f, "true"),
                        NaryOp::Or => write!(f, "false"),
                    };
                }
                let sym = match op {
                    NaryOp::And => " & ",
                    NaryOp::Or => " | ",
                };
                write!(f, "(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, "{}", sym)?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ")")
            }
            Expr::Not(inner) => write!(f, "!{}", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_comparison() {
        let e = Expr::eq(Expr::Var(0), Expr::Int(3));
        assert_eq!(e.evaluate(&[3]), 1);
        assert_eq!(e.evaluate(&[4]), 0);
    }

    #[test]
    fn test_evaluate_arithmetic() {
        let e = Expr::binary(
            BinOp::Add,
            Expr::Var(0),
            Expr::binary(BinOp::Mul, Expr::Var(1), Expr::Int(2)),
        );
        assert_eq!(e.evaluate(&[1, 3]), 7);
    }

    #[test]
    fn test_evaluate_nary() {
        let e = Expr::and(vec![
            Expr::ge(Expr::Var(0), Expr::Int(0)),
            Expr::le(Expr::Var(0), Expr::Int(5)),
        ]);
        assert!(e.holds(&[3]));
        assert!(!e.holds(&[7]));
        assert!(Expr::and(vec![]).holds(&[0]));
        assert!(!Expr::or(vec![]).holds(&[0]));
    }

    #[test]
    fn test_point_predicate() {
        let p = Expr::point(&[0, 2, 5]);
        assert!(p.holds(&[0, 2, 5]));
        assert!(!p.holds(&[0, 2, 4]));
        assert!(!p.holds(&[1, 2, 5]));
    }

    #[test]
    fn test_split_and_construct() {
        let e = Expr::and(vec![Expr::Var(0), Expr::Var(1)]);
        let parts = e.split_conjunction();
        assert_eq!(parts.len(), 2);
        assert_eq!(Expr::construct_conjunction(parts), e);

        let single = Expr::eq(Expr::Var(0), Expr::Int(1));
        assert_eq!(single.split_conjunction(), vec![single.clone()]);
        assert_eq!(Expr::construct_conjunction(vec![]), Expr::truth());
        assert_eq!(Expr::construct_disjunction(vec![]), Expr::falsity());
    }

    #[test]
    fn test_display() {
        let e = Expr::and(vec![
            Expr::ge(Expr::Var(1), Expr::Int(0)),
            Expr::not(Expr::eq(Expr::Var(2), Expr::Int(3))),
        ]);
        assert_eq!(e.to_string(), "((x1 >= 0) & !(x2 = 3))");
    }
}
