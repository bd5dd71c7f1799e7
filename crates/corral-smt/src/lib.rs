//! Z3 adapters for the safe-start generator.
//!
//! Wraps the symbolic side behind small, focused pieces: a predicate
//! encoder over step-indexed integer variables, an action-update
//! transition encoder, scoped solver frames, a start-state enumerator,
//! a symbolic distance function, a ReLU-network policy encoding, and a
//! bounded-reachability oracle.

pub mod distance;
pub mod encoder;
pub mod enumerate;
pub mod network;
pub mod reach;
pub mod solver;
pub mod transition;

pub use distance::DistanceFunction;
pub use encoder::{assert_domains, create_step_vars, encode_bool, encode_int};
pub use enumerate::StartStateEnumerator;
pub use network::{assert_network, PolicyEncoding};
pub use reach::{BoundedReachability, ReachOutcome, ReachabilityOracle};
pub use solver::{extract_values, Frame};
pub use transition::{encode_action_update, encode_transition_relation};

use thiserror::Error;

/// SMT layer error.
#[derive(Debug, Error)]
pub enum SmtError {
    #[error("solver returned unknown: {0}")]
    Unknown(String),

    #[error("satisfiable check produced no model")]
    NoModel,

    #[error("model valuation incomplete at variable index {0}")]
    IncompleteValuation(usize),
}

pub type SmtResult<T> = Result<T, SmtError>;
