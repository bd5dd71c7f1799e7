//! Symbolic predicate trees over integer state variables.
//!
//! Predicates are closed sum-type trees evaluated over integer state
//! vectors. Refinement code never mutates a tree in place: every
//! rewrite ([`normalize`], [`specialize`], [`negate`]) produces a fresh
//! tree, so predicate generations never share mutable structure.

pub mod expr;
pub mod normal;

pub use expr::{BinOp, Expr, NaryOp};
pub use normal::{negate, normalize, specialize};
