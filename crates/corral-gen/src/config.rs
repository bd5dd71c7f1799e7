//! Generator configuration.

use crate::{GenError, GenResult};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Which strengthening strategy and verifier pair to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationMethod {
    /// Maintain complementary start/unsafety predicates and verify
    /// one-step closure of the invariant.
    InvariantStrengthening,
    /// Shrink the start condition only, verified by the abstraction
    /// engine.
    StartConditionStrengthening,
}

impl FromStr for VerificationMethod {
    type Err = GenError;

    fn from_str(s: &str) -> GenResult<Self> {
        match s {
            "inv_str" => Ok(VerificationMethod::InvariantStrengthening),
            "scs" => Ok(VerificationMethod::StartConditionStrengthening),
            other => Err(GenError::Config(format!(
                "unknown verification method '{}' (expected 'inv_str' or 'scs')",
                other
            ))),
        }
    }
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationMethod::InvariantStrengthening => write!(f, "inv_str"),
            VerificationMethod::StartConditionStrengthening => write!(f, "scs"),
        }
    }
}

/// Box approximator used when counterexample sets are large.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproximationKind {
    Over,
    Under,
    None,
}

impl FromStr for ApproximationKind {
    type Err = GenError;

    fn from_str(s: &str) -> GenResult<Self> {
        match s {
            "over" => Ok(ApproximationKind::Over),
            "under" => Ok(ApproximationKind::Under),
            "none" => Ok(ApproximationKind::None),
            other => Err(GenError::Config(format!(
                "unknown approximation type '{}' (expected 'over', 'under', or 'none')",
                other
            ))),
        }
    }
}

/// Which phases box their counterexamples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproximatePhase {
    Testing,
    Both,
}

impl FromStr for ApproximatePhase {
    type Err = GenError;

    fn from_str(s: &str) -> GenResult<Self> {
        match s {
            "testing" => Ok(ApproximatePhase::Testing),
            "both" => Ok(ApproximatePhase::Both),
            other => Err(GenError::Config(format!(
                "unknown approximate phase '{}' (expected 'testing' or 'both')",
                other
            ))),
        }
    }
}

/// Full generator configuration. Validated at driver construction.
#[derive(Debug, Clone)]
pub struct GenConfig {
    pub method: VerificationMethod,
    /// Alternate testing and verification after a refining step.
    pub alternate: bool,
    pub use_testing: bool,
    /// End a rollout when a transition repeats.
    pub terminate_on_cycles: bool,
    pub policy_run_sampling: bool,
    /// Softmax leaf selection instead of greedy.
    pub probabilistic_sampling: bool,
    /// Probability of invoking the policy-run sampler per choice point.
    pub sampling_probability: f64,
    /// Hard cap on expansion depth inside the sampler.
    pub max_run_length: usize,
    /// Budget per testing invocation.
    pub testing_time: Duration,
    pub approximation: ApproximationKind,
    pub approximate_phase: ApproximatePhase,
    /// Per-iteration CSV output path.
    pub iteration_stats: Option<PathBuf>,
    /// Log each rollout transition.
    pub log_path: bool,
    pub seed: u64,
    /// Unroll depth of the bounded-reachability engine.
    pub reach_depth: usize,
}

impl Default for GenConfig {
    fn default() -> Self {
        GenConfig {
            method: VerificationMethod::InvariantStrengthening,
            alternate: false,
            use_testing: false,
            terminate_on_cycles: false,
            policy_run_sampling: false,
            probabilistic_sampling: false,
            sampling_probability: 0.5,
            max_run_length: 100,
            testing_time: Duration::from_secs(10),
            approximation: ApproximationKind::None,
            approximate_phase: ApproximatePhase::Testing,
            iteration_stats: None,
            log_path: false,
            seed: 0,
            reach_depth: 50,
        }
    }
}

impl GenConfig {
    pub fn validate(&self) -> GenResult<()> {
        if !(0.0..=1.0).contains(&self.sampling_probability) {
            return Err(GenError::Config(format!(
                "sampling_probability {} outside [0, 1]",
                self.sampling_probability
            )));
        }
        if self.max_run_length < 1 {
            return Err(GenError::Config("max_run_length must be at least 1".into()));
        }
        if self.reach_depth < 1 {
            return Err(GenError::Config("reach_depth must be at least 1".into()));
        }
        if self.policy_run_sampling && !self.use_testing {
            return Err(GenError::Config(
                "policy_run_sampling requires use_testing".into(),
            ));
        }
        Ok(())
    }

    /// Whether testing-phase counterexamples are boxed.
    pub fn approximate_testing(&self) -> bool {
        self.approximation != ApproximationKind::None
    }

    /// Whether verification-phase counterexamples are boxed.
    pub fn approximate_verification(&self) -> bool {
        self.approximation != ApproximationKind::None
            && self.approximate_phase == ApproximatePhase::Both
    }
}
