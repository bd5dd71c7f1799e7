//! Action-update encoding between two adjacent steps.

use crate::encoder::{encode_bool, encode_int};
use corral_model::{ActionLabel, Model};
use z3::ast::{Bool, Int};

/// Encode one update operation of one action as a constraint from
/// `pre` to `post`: the guard holds at `pre`, assigned variables take
/// their update expressions, and every other variable is framed.
pub fn encode_action_update(
    model: &Model,
    label: ActionLabel,
    update_idx: usize,
    pre: &[Int],
    post: &[Int],
) -> Bool {
    let action = model.action(label);
    let update = &action.updates[update_idx];

    let mut parts = Vec::with_capacity(model.num_vars() + 1);
    parts.push(encode_bool(&action.guard, pre));

    let mut assigned = vec![false; model.num_vars()];
    for (idx, expr) in &update.assigns {
        parts.push(post[*idx].eq(&encode_int(expr, pre)));
        assigned[*idx] = true;
    }
    for (idx, was_assigned) in assigned.iter().enumerate() {
        if !was_assigned {
            parts.push(post[idx].eq(&pre[idx]));
        }
    }
    Bool::and(&parts)
}

/// The full transition relation: disjunction over every update
/// operation of every action.
pub fn encode_transition_relation(model: &Model, pre: &[Int], post: &[Int]) -> Bool {
    let mut branches = Vec::new();
    for label in 0..model.num_actions() {
        for update_idx in 0..model.action(label).updates.len() {
            branches.push(encode_action_update(model, label, update_idx, pre, post));
        }
    }
    if branches.is_empty() {
        // A model without actions has no transitions.
        return Bool::from_bool(false);
    }
    Bool::or(&branches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{assert_domains, create_step_vars};
    use corral_expr::{BinOp, Expr};
    use corral_model::{ActionDecl, Model, Property, UpdateOp, VarDecl};
    use z3::{SatResult, Solver};

    fn counter_model() -> Model {
        Model::new(
            "step".into(),
            vec![
                VarDecl {
                    name: "loc".into(),
                    lower: 0,
                    upper: 0,
                },
                VarDecl {
                    name: "x".into(),
                    lower: 0,
                    upper: 10,
                },
            ],
            vec![ActionDecl {
                name: "inc".into(),
                guard: Expr::binary(BinOp::Lt, Expr::Var(1), Expr::Int(10)),
                updates: vec![UpdateOp {
                    weight: 1,
                    assigns: vec![(
                        1,
                        Expr::binary(BinOp::Add, Expr::Var(1), Expr::Int(1)),
                    )],
                }],
                learned: false,
            }],
            Property {
                start: Expr::truth(),
                unsafety: Expr::falsity(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_update_steps_and_frames() {
        let model = counter_model();
        let solver = Solver::new();
        let pre = create_step_vars(&model, 0);
        let post = create_step_vars(&model, 1);
        assert_domains(&solver, &model, &pre);
        assert_domains(&solver, &model, &post);
        solver.assert(&encode_action_update(&model, 0, 0, &pre, &post));

        // x steps from 3 to 4, loc is framed.
        solver.push();
        solver.assert(&pre[1].eq(&Int::from_i64(3)));
        solver.assert(&post[1].eq(&Int::from_i64(4)));
        solver.assert(&post[0].eq(&pre[0]));
        assert_eq!(solver.check(), SatResult::Sat);
        solver.pop(1);

        // x cannot step from 3 to 5.
        solver.push();
        solver.assert(&pre[1].eq(&Int::from_i64(3)));
        solver.assert(&post[1].eq(&Int::from_i64(5)));
        assert_eq!(solver.check(), SatResult::Unsat);
        solver.pop(1);

        // The guard blocks stepping out of the domain.
        solver.push();
        solver.assert(&pre[1].eq(&Int::from_i64(10)));
        assert_eq!(solver.check(), SatResult::Unsat);
        solver.pop(1);
    }
}
