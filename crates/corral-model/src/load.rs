//! Model file loading.
//!
//! The model arrives as data (JSON), not as a surface syntax: variable
//! declarations, guarded actions with weighted updates, the safety
//! property, and an optional policy (rule table or network weights).

use crate::model::{ActionDecl, ActionLabel, Model, Property, UpdateOp, VarDecl};
use crate::policy::{DenseLayer, NetworkPolicy, PolicySpec, TablePolicy};
use crate::ModelResult;
use corral_expr::Expr;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct ModelFile {
    name: String,
    variables: Vec<VarFile>,
    actions: Vec<ActionFile>,
    property: PropertyFile,
    #[serde(default)]
    policy: Option<PolicyFile>,
}

#[derive(Debug, Deserialize)]
struct VarFile {
    name: String,
    lower: i64,
    upper: i64,
}

#[derive(Debug, Deserialize)]
struct ActionFile {
    name: String,
    guard: Expr,
    updates: Vec<UpdateFile>,
    #[serde(default)]
    learned: bool,
}

#[derive(Debug, Deserialize)]
struct UpdateFile {
    #[serde(default = "default_weight")]
    weight: u32,
    assigns: Vec<AssignFile>,
}

fn default_weight() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct AssignFile {
    var: usize,
    expr: Expr,
}

#[derive(Debug, Deserialize)]
struct PropertyFile {
    start: Expr,
    unsafety: Expr,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PolicyFile {
    Table {
        rules: Vec<RuleFile>,
        default: ActionLabel,
    },
    Network {
        layers: Vec<LayerFile>,
        outputs: Vec<ActionLabel>,
    },
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    when: Expr,
    action: ActionLabel,
}

#[derive(Debug, Deserialize)]
struct LayerFile {
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
}

/// A model together with the policy its file declared.
pub struct LoadedModel {
    pub model: Model,
    pub policy: PolicySpec,
}

/// Load a model (and its policy) from a JSON file.
pub fn load_model(path: &Path) -> ModelResult<LoadedModel> {
    let text = std::fs::read_to_string(path)?;
    let file: ModelFile = serde_json::from_str(&text)?;
    build(file)
}

fn build(file: ModelFile) -> ModelResult<LoadedModel> {
    let vars = file
        .variables
        .into_iter()
        .map(|v| VarDecl {
            name: v.name,
            lower: v.lower,
            upper: v.upper,
        })
        .collect();
    let actions = file
        .actions
        .into_iter()
        .map(|a| ActionDecl {
            name: a.name,
            guard: a.guard,
            updates: a
                .updates
                .into_iter()
                .map(|u| UpdateOp {
                    weight: u.weight,
                    assigns: u.assigns.into_iter().map(|s| (s.var, s.expr)).collect(),
                })
                .collect(),
            learned: a.learned,
        })
        .collect();
    let property = Property {
        start: file.property.start,
        unsafety: file.property.unsafety,
    };
    let model = Model::new(file.name, vars, actions, property)?;

    let policy = match file.policy {
        Some(PolicyFile::Table { rules, default }) => PolicySpec::Table(TablePolicy::new(
            rules.into_iter().map(|r| (r.when, r.action)).collect(),
            default,
        )),
        Some(PolicyFile::Network { layers, outputs }) => {
            let layers = layers
                .into_iter()
                .map(|l| DenseLayer {
                    weights: l.weights,
                    biases: l.biases,
                })
                .collect();
            PolicySpec::Network(NetworkPolicy::new(layers, outputs)?)
        }
        None => {
            // Degenerate policy: always the first learned action.
            let default = model.learned_labels().first().copied().unwrap_or(0);
            PolicySpec::Table(TablePolicy::new(Vec::new(), default))
        }
    };

    info!(
        model = %model.name,
        vars = model.num_vars(),
        actions = model.num_actions(),
        "model loaded"
    );
    Ok(LoadedModel { model, policy })
}
