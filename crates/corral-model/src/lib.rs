//! Transition model, simulation environment, and control policies.
//!
//! The model is an immutable description of an integer-state transition
//! system: variable domains, guarded actions with weighted update
//! operations, and a safety property. The simulation environment owns
//! the state pool and mints stable [`StateId`]s; policies choose one
//! action label per state at non-deterministic choice points.

pub mod load;
pub mod model;
pub mod policy;
pub mod sim;
pub mod state;

pub use load::{load_model, LoadedModel};
pub use model::{ActionDecl, ActionLabel, Model, Property, UpdateOp, VarDecl};
pub use policy::{DenseLayer, NetworkPolicy, Policy, PolicySpec, TablePolicy};
pub use sim::SimulationEnvironment;
pub use state::{StateId, StateSet, StateValues};

use thiserror::Error;

/// Model construction and loading error.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model has no variables")]
    NoVariables,

    #[error("variable '{name}': empty domain [{lb}, {ub}]")]
    EmptyDomain { name: String, lb: i64, ub: i64 },

    #[error("action '{name}': {message}")]
    BadAction { name: String, message: String },

    #[error("expression references variable index {index}, model has {count} variables")]
    VarOutOfRange { index: usize, count: usize },

    #[error("network policy: {0}")]
    BadNetwork(String),

    #[error("failed to read model file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse model file: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type ModelResult<T> = Result<T, ModelError>;
