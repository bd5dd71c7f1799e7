//! Normal-form rewriting: negation pushing, flattening, simplification.
//!
//! `normalize` pushes negations down to the leaves (de-Morgan, with
//! comparison flipping) and flattens nested n-ary nodes. `specialize`
//! folds constants and applies elementary logical simplifications.
//! Both are deterministic and preserve logical equivalence, and both
//! are fixed points on their own output.

use crate::expr::{BinOp, Expr, NaryOp};

/// Push negations to the leaves and flatten nested n-ary operators.
pub fn normalize(expr: &Expr) -> Expr {
    match expr {
        Expr::Int(_) | Expr::Var(_) => expr.clone(),
        Expr::Binary { op, left, right } => {
            Expr::binary(*op, normalize(left), normalize(right))
        }
        Expr::Nary { op, args } => {
            let mut flat = Vec::with_capacity(args.len());
            for arg in args {
                match normalize(arg) {
                    Expr::Nary {
                        op: child_op,
                        args: child_args,
                    } if child_op == *op => flat.extend(child_args),
                    other => flat.push(other),
                }
            }
            Expr::Nary { op: *op, args: flat }
        }
        Expr::Not(inner) => negate(inner),
    }
}

/// Normalized negation of a predicate.
///
/// Comparisons flip (`¬(a ≤ b) → a > b`), n-ary operators dualize via
/// de-Morgan, double negations cancel. A negation survives only on
/// atoms that cannot be flipped (bare variables, arithmetic).
pub fn negate(expr: &Expr) -> Expr {
    match expr {
        Expr::Int(v) => Expr::Int((*v == 0) as i64),
        Expr::Binary { op, left, right } if op.is_comparison() => {
            let flipped = match op {
                BinOp::Eq => BinOp::Ne,
                BinOp::Ne => BinOp::Eq,
                BinOp::Lt => BinOp::Ge,
                BinOp::Le => BinOp::Gt,
                BinOp::Gt => BinOp::Le,
                BinOp::Ge => BinOp::Lt,
                _ => unreachable!(),
            };
            Expr::binary(flipped, normalize(left), normalize(right))
        }
        Expr::Nary { op, args } => {
            let dual = match op {
                NaryOp::And => NaryOp::Or,
                NaryOp::Or => NaryOp::And,
            };
            let mut flat = Vec::with_capacity(args.len());
            for arg in args {
                match negate(arg) {
                    Expr::Nary {
                        op: child_op,
                        args: child_args,
                    } if child_op == dual => flat.extend(child_args),
                    other => flat.push(other),
                }
            }
            Expr::Nary {
                op: dual,
                args: flat,
            }
        }
        Expr::Not(inner) => normalize(inner),
        // Bare variable or arithmetic in a truth position.
        other => Expr::not(normalize(other)),
    }
}

/// Constant folding and elementary simplification: literal folding,
/// unit/absorbing elements, idempotence, absorption. Shape-preserving
/// up to logical equivalence.
pub fn specialize(expr: &Expr) -> Expr {
    match expr {
        Expr::Int(_) | Expr::Var(_) => expr.clone(),
        Expr::Binary { op, left, right } => {
            let l = specialize(left);
            let r = specialize(right);
            if let (Expr::Int(lv), Expr::Int(rv)) = (&l, &r) {
                return Expr::Int(match op {
                    BinOp::Eq => (lv == rv) as i64,
                    BinOp::Ne => (lv != rv) as i64,
                    BinOp::Lt => (lv < rv) as i64,
                    BinOp::Le => (lv <= rv) as i64,
                    BinOp::Gt => (lv > rv) as i64,
                    BinOp::Ge => (lv >= rv) as i64,
                    BinOp::Add => lv + rv,
                    BinOp::Sub => lv - rv,
                    BinOp::Mul => lv * rv,
                });
            }
            Expr::binary(*op, l, r)
        }
        Expr::Nary { op, args } => specialize_nary(*op, args),
        Expr::Not(inner) => match specialize(inner) {
            Expr::Int(v) => Expr::Int((v == 0) as i64),
            other => Expr::not(other),
        },
    }
}

fn specialize_nary(op: NaryOp, args: &[Expr]) -> Expr {
    // Truth-value constants: the unit element is dropped, the
    // absorbing element collapses the whole node.
    let (unit, absorbing) = match op {
        NaryOp::And => (true, false),
        NaryOp::Or => (false, true),
    };

    let mut kept: Vec<Expr> = Vec::with_capacity(args.len());
    for arg in args {
        let s = specialize(arg);
        if let Expr::Int(v) = s {
            let truth = v != 0;
            if truth == absorbing {
                return Expr::Int(absorbing as i64);
            }
            debug_assert_eq!(truth, unit);
            continue;
        }
        // Idempotence: drop duplicate children.
        if !kept.contains(&s) {
            kept.push(s);
        }
    }

    // Absorption: a ∧ (a ∨ b) = a, and dually a ∨ (a ∧ b) = a.
    let dual = match op {
        NaryOp::And => NaryOp::Or,
        NaryOp::Or => NaryOp::And,
    };
    let atoms: Vec<Expr> = kept
        .iter()
        .filter(|e| !matches!(e, Expr::Nary { op: o, .. } if *o == dual))
        .cloned()
        .collect();
    kept.retain(|e| match e {
        Expr::Nary { op: o, args } if *o == dual => !args.iter().any(|a| atoms.contains(a)),
        _ => true,
    });

    match kept.len() {
        0 => Expr::Int(unit as i64),
        1 => kept.pop().unwrap(),
        _ => Expr::Nary { op, args: kept },
    }
}
