//! Safe-start generation by counterexample-guided refinement.
//!
//! Given a non-deterministic transition model, a control policy, and an
//! unsafety predicate, the generator refines a symbolic start condition
//! until every satisfying valuation is guaranteed never to reach an
//! unsafe state under the policy. Refinement alternates a stochastic
//! tester (policy rollouts biased towards unsafety) with a symbolic
//! verifier; counterexamples from either oracle strengthen the
//! condition pair until the verifier certifies emptiness, at which
//! point the start region is either non-empty (solved) or empty
//! (finished).

pub mod approx;
pub mod config;
pub mod driver;
pub mod identifier;
pub mod sampler;
pub mod stats;
pub mod strengthen;
pub mod timer;
pub mod verify;

pub use approx::{bounded_box, bounding_box, BoxApproximation};
pub use config::{ApproximatePhase, ApproximationKind, GenConfig, VerificationMethod};
pub use driver::{Outcome, SafeStartGenerator};
pub use identifier::{TestingReport, TransitionCache, UnsafePathIdentifier, PATH_LENGTH_LIMIT};
pub use sampler::{PolicyRunSampler, SampledRun};
pub use stats::{IterationStats, RunStats};
pub use strengthen::{Refinement, StrengtheningStrategy};
pub use timer::Timer;
pub use verify::VerificationOracle;

use corral_smt::SmtError;
use thiserror::Error;

/// Generator error.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Smt(#[from] SmtError),

    #[error("abstraction engine terminated without solving: {0}")]
    Oracle(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type GenResult<T> = Result<T, GenError>;
