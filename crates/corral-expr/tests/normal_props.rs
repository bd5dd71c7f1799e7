//! Property tests for normal-form rewriting.
//!
//! Random predicate trees are evaluated over random states to check
//! that rewriting preserves (or, for negation, inverts) truth, and
//! that the rewrites are fixed points on their own output.

use corral_expr::{negate, normalize, specialize, BinOp, Expr};
use proptest::prelude::*;

const NUM_VARS: usize = 3;

fn arb_expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        (-4i64..5).prop_map(Expr::Int),
        (0usize..NUM_VARS).prop_map(Expr::Var),
    ];
    leaf.prop_recursive(4, 24, 3, |inner| {
        prop_oneof![
            (any::<u8>(), inner.clone(), inner.clone()).prop_map(|(op, l, r)| {
                let op = match op % 9 {
                    0 => BinOp::Eq,
                    1 => BinOp::Ne,
                    2 => BinOp::Lt,
                    3 => BinOp::Le,
                    4 => BinOp::Gt,
                    5 => BinOp::Ge,
                    6 => BinOp::Add,
                    7 => BinOp::Sub,
                    _ => BinOp::Mul,
                };
                Expr::binary(op, l, r)
            }),
            prop::collection::vec(inner.clone(), 0..3).prop_map(Expr::and),
            prop::collection::vec(inner.clone(), 0..3).prop_map(Expr::or),
            inner.prop_map(Expr::not),
        ]
    })
}

fn arb_state() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(-4i64..5, NUM_VARS)
}

proptest! {
    #[test]
    fn normalize_is_fixed_point(e in arb_expr()) {
        let once = normalize(&e);
        prop_assert_eq!(normalize(&once), once);
    }

    #[test]
    fn specialize_is_fixed_point(e in arb_expr()) {
        let once = specialize(&normalize(&e));
        prop_assert_eq!(specialize(&once), once);
    }

    #[test]
    fn normalize_preserves_truth(e in arb_expr(), s in arb_state()) {
        prop_assert_eq!(normalize(&e).holds(&s), e.holds(&s));
    }

    #[test]
    fn specialize_preserves_truth(e in arb_expr(), s in arb_state()) {
        prop_assert_eq!(specialize(&e).holds(&s), e.holds(&s));
    }

    #[test]
    fn negate_inverts_truth(e in arb_expr(), s in arb_state()) {
        prop_assert_eq!(negate(&e).holds(&s), !e.holds(&s));
    }
}
