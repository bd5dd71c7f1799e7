//! Predicate encoder: translates predicate trees to Z3 over
//! step-indexed integer variables.

use corral_expr::{BinOp, Expr, NaryOp};
use corral_model::Model;
use z3::ast::{Bool, Int};
use z3::Solver;

/// Create one Z3 integer per model variable for the given step.
pub fn create_step_vars(model: &Model, step: usize) -> Vec<Int> {
    model
        .vars()
        .iter()
        .map(|var| Int::new_const(format!("{}_s{}", var.name, step)))
        .collect()
}

/// Assert the model's domain bounds for every variable at a step.
pub fn assert_domains(solver: &Solver, model: &Model, vars: &[Int]) {
    for (decl, var) in model.vars().iter().zip(vars) {
        solver.assert(&var.ge(&Int::from_i64(decl.lower)));
        solver.assert(&var.le(&Int::from_i64(decl.upper)));
    }
}

/// Encode a predicate as a Z3 Bool over the given step variables.
///
/// Integer semantics carry over: a numeric expression in a truth
/// position means "not equal to zero".
pub fn encode_bool(expr: &Expr, vars: &[Int]) -> Bool {
    match expr {
        Expr::Int(v) => Bool::from_bool(*v != 0),
        Expr::Var(_) => encode_int(expr, vars).eq(&Int::from_i64(0)).not(),
        Expr::Binary { op, left, right } => {
            if op.is_comparison() {
                let l = encode_int(left, vars);
                let r = encode_int(right, vars);
                match op {
                    BinOp::Eq => l.eq(&r),
                    BinOp::Ne => l.eq(&r).not(),
                    BinOp::Lt => l.lt(&r),
                    BinOp::Le => l.le(&r),
                    BinOp::Gt => l.gt(&r),
                    BinOp::Ge => l.ge(&r),
                    _ => unreachable!(),
                }
            } else {
                encode_int(expr, vars).eq(&Int::from_i64(0)).not()
            }
        }
        Expr::Nary { op, args } => {
            // Empty conjunction is true, empty disjunction is false.
            if args.is_empty() {
                return Bool::from_bool(matches!(op, NaryOp::And));
            }
            let encoded: Vec<Bool> = args.iter().map(|a| encode_bool(a, vars)).collect();
            match op {
                NaryOp::And => Bool::and(&encoded),
                NaryOp::Or => Bool::or(&encoded),
            }
        }
        Expr::Not(inner) => encode_bool(inner, vars).not(),
    }
}

/// Encode an expression as a Z3 Int over the given step variables.
/// Truth-valued subexpressions become 0/1 via if-then-else.
pub fn encode_int(expr: &Expr, vars: &[Int]) -> Int {
    match expr {
        Expr::Int(v) => Int::from_i64(*v),
        Expr::Var(idx) => vars[*idx].clone(),
        Expr::Binary { op, left, right } if !op.is_comparison() => {
            let l = encode_int(left, vars);
            let r = encode_int(right, vars);
            match op {
                BinOp::Add => Int::add(&[l, r]),
                BinOp::Sub => Int::sub(&[l, r]),
                BinOp::Mul => Int::mul(&[l, r]),
                _ => unreachable!(),
            }
        }
        // Comparison, conjunction, or negation used as a number.
        _ => encode_bool(expr, vars).ite(&Int::from_i64(1), &Int::from_i64(0)),
    }
}
