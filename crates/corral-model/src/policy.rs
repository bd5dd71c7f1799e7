//! Control policies: table-driven and feedforward network.

use crate::model::ActionLabel;
use crate::state::StateValues;
use crate::{ModelError, ModelResult};
use corral_expr::Expr;

/// A control policy: one action label per state.
///
/// The chosen label is not guaranteed to be applicable in the state;
/// callers treat an inapplicable choice as a dead end.
pub trait Policy {
    fn evaluate(&self, state: &StateValues) -> ActionLabel;
}

/// Guarded rule table: the first rule whose predicate holds wins.
#[derive(Debug, Clone)]
pub struct TablePolicy {
    rules: Vec<(Expr, ActionLabel)>,
    default: ActionLabel,
}

impl TablePolicy {
    pub fn new(rules: Vec<(Expr, ActionLabel)>, default: ActionLabel) -> Self {
        TablePolicy { rules, default }
    }
}

impl Policy for TablePolicy {
    fn evaluate(&self, state: &StateValues) -> ActionLabel {
        self.rules
            .iter()
            .find(|(guard, _)| guard.holds(state.as_slice()))
            .map(|(_, label)| *label)
            .unwrap_or(self.default)
    }
}

/// One dense layer: `out_j = Σ_i weights[j][i] · in_i + biases[j]`.
#[derive(Debug, Clone)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
}

impl DenseLayer {
    pub fn output_dim(&self) -> usize {
        self.biases.len()
    }

    pub fn input_dim(&self) -> usize {
        self.weights.first().map(|row| row.len()).unwrap_or(0)
    }
}

/// Feedforward ReLU network over the full state vector.
///
/// ReLU is applied between layers; the final layer is linear. The
/// output at position k scores the learned action `outputs[k]`; the
/// policy decision is the argmax, ties broken towards the lowest
/// output index.
#[derive(Debug, Clone)]
pub struct NetworkPolicy {
    layers: Vec<DenseLayer>,
    outputs: Vec<ActionLabel>,
}

impl NetworkPolicy {
    pub fn new(layers: Vec<DenseLayer>, outputs: Vec<ActionLabel>) -> ModelResult<Self> {
        if layers.is_empty() {
            return Err(ModelError::BadNetwork("no layers".into()));
        }
        for (i, layer) in layers.iter().enumerate() {
            if layer.biases.len() != layer.weights.len() {
                return Err(ModelError::BadNetwork(format!(
                    "layer {}: {} weight rows but {} biases",
                    i,
                    layer.weights.len(),
                    layer.biases.len()
                )));
            }
            if layer.weights.iter().any(|row| row.len() != layer.input_dim()) {
                return Err(ModelError::BadNetwork(format!(
                    "layer {}: ragged weight rows",
                    i
                )));
            }
            if i > 0 && layer.input_dim() != layers[i - 1].output_dim() {
                return Err(ModelError::BadNetwork(format!(
                    "layer {}: input dim {} does not match previous output dim {}",
                    i,
                    layer.input_dim(),
                    layers[i - 1].output_dim()
                )));
            }
        }
        let last = layers.last().unwrap();
        if last.output_dim() != outputs.len() {
            return Err(ModelError::BadNetwork(format!(
                "final layer has {} outputs but {} labels are mapped",
                last.output_dim(),
                outputs.len()
            )));
        }
        Ok(NetworkPolicy { layers, outputs })
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub fn output_labels(&self) -> &[ActionLabel] {
        &self.outputs
    }

    pub fn input_dim(&self) -> usize {
        self.layers[0].input_dim()
    }

    /// Forward pass: ReLU between layers, linear final layer.
    pub fn forward(&self, inputs: &[f64]) -> Vec<f64> {
        debug_assert_eq!(inputs.len(), self.input_dim());
        let last = self.layers.len() - 1;
        let mut acts = inputs.to_vec();
        for (i, layer) in self.layers.iter().enumerate() {
            let mut next = Vec::with_capacity(layer.output_dim());
            for (row, bias) in layer.weights.iter().zip(&layer.biases) {
                let z: f64 = row.iter().zip(&acts).map(|(w, a)| w * a).sum::<f64>() + bias;
                next.push(if i < last { z.max(0.0) } else { z });
            }
            acts = next;
        }
        acts
    }

    /// Raw output scores for a state.
    pub fn scores(&self, state: &StateValues) -> Vec<f64> {
        let inputs: Vec<f64> = state.as_slice().iter().map(|&v| v as f64).collect();
        self.forward(&inputs)
    }
}

impl Policy for NetworkPolicy {
    fn evaluate(&self, state: &StateValues) -> ActionLabel {
        let scores = self.scores(state);
        let mut best = 0;
        for (k, &s) in scores.iter().enumerate() {
            if s > scores[best] {
                best = k;
            }
        }
        self.outputs[best]
    }
}

/// The concrete policy wired by the model file: either a rule table or
/// a network. The network variant also exposes the network itself so
/// the verifier can encode it symbolically.
#[derive(Debug, Clone)]
pub enum PolicySpec {
    Table(TablePolicy),
    Network(NetworkPolicy),
}

impl PolicySpec {
    pub fn network(&self) -> Option<&NetworkPolicy> {
        match self {
            PolicySpec::Network(net) => Some(net),
            PolicySpec::Table(_) => None,
        }
    }
}

impl Policy for PolicySpec {
    fn evaluate(&self, state: &StateValues) -> ActionLabel {
        match self {
            PolicySpec::Table(t) => t.evaluate(state),
            PolicySpec::Network(n) => n.evaluate(state),
        }
    }
}
