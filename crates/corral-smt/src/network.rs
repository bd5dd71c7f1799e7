//! ReLU network policy encoding over solver variables.
//!
//! The policy network is asserted once per solver: each neuron becomes
//! a named Real constrained to its layer equation, with ReLU expressed
//! as if-then-else. The resulting output scores support an exact
//! argmax constraint matching the concrete forward pass, including its
//! lowest-index tie-break.

use corral_model::{ActionLabel, NetworkPolicy};
use z3::ast::{Bool, Int, Real};
use z3::Solver;

/// Granularity for rationalizing floating-point weights.
const WEIGHT_DENOMINATOR: i32 = 1_000_000;

fn rational(w: f64) -> Real {
    let num = (w * f64::from(WEIGHT_DENOMINATOR)).round() as i32;
    Real::from_real(num, WEIGHT_DENOMINATOR)
}

/// The asserted network: output scores plus their action labels.
pub struct PolicyEncoding {
    scores: Vec<Real>,
    outputs: Vec<ActionLabel>,
}

/// Assert the network over the given step variables as inputs.
/// `prefix` namespaces the neuron constants within the solver.
pub fn assert_network(
    solver: &Solver,
    net: &NetworkPolicy,
    inputs: &[Int],
    prefix: &str,
) -> PolicyEncoding {
    debug_assert_eq!(inputs.len(), net.input_dim());
    let zero = Real::from_real(0, 1);
    let last = net.layers().len() - 1;

    let mut acts: Vec<Real> = inputs.iter().map(|v| v.to_real()).collect();
    for (layer_idx, layer) in net.layers().iter().enumerate() {
        let mut next = Vec::with_capacity(layer.output_dim());
        for (neuron_idx, (row, bias)) in layer.weights.iter().zip(&layer.biases).enumerate() {
            let mut terms = Vec::with_capacity(row.len() + 1);
            terms.push(rational(*bias));
            for (w, a) in row.iter().zip(&acts) {
                terms.push(Real::mul(&[rational(*w), a.clone()]));
            }
            let pre_activation = Real::add(&terms);
            let neuron = Real::new_const(format!("{}_l{}_n{}", prefix, layer_idx, neuron_idx));
            if layer_idx < last {
                let relu = pre_activation
                    .ge(&zero)
                    .ite(&pre_activation, &zero);
                solver.assert(&neuron.eq(&relu));
            } else {
                solver.assert(&neuron.eq(&pre_activation));
            }
            next.push(neuron);
        }
        acts = next;
    }

    PolicyEncoding {
        scores: acts,
        outputs: net.output_labels().to_vec(),
    }
}

impl PolicyEncoding {
    /// Constraint that the network's decision is exactly `label`:
    /// strictly beats every earlier output, at least ties every later
    /// one. `None` when no output maps to the label.
    pub fn decision_is(&self, label: ActionLabel) -> Option<Bool> {
        let winner = self.outputs.iter().position(|&l| l == label)?;
        if self.scores.len() == 1 {
            // A single output always wins.
            return Some(Bool::from_bool(true));
        }
        let mut parts = Vec::with_capacity(self.scores.len() - 1);
        for (k, score) in self.scores.iter().enumerate() {
            if k < winner {
                parts.push(self.scores[winner].gt(score));
            } else if k > winner {
                parts.push(self.scores[winner].ge(score));
            }
        }
        Some(Bool::and(&parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corral_model::{DenseLayer, Policy, StateValues};
    use z3::SatResult;

    fn small_net() -> NetworkPolicy {
        NetworkPolicy::new(
            vec![
                DenseLayer {
                    weights: vec![vec![1.0, -1.0], vec![-1.0, 1.0]],
                    biases: vec![0.0, 0.5],
                },
                DenseLayer {
                    weights: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
                    biases: vec![0.0, 0.0],
                },
            ],
            vec![0, 1],
        )
        .unwrap()
    }

    /// The symbolic encoding agrees with the concrete forward pass on
    /// the decision, across the whole (small) input grid.
    #[test]
    fn test_encoding_matches_forward_pass() {
        let net = small_net();
        for a in 0..4i64 {
            for b in 0..4i64 {
                let state = StateValues::new(vec![a, b]);
                let concrete = net.evaluate(&state);

                let solver = Solver::new();
                let inputs = vec![
                    Int::new_const(format!("in_a_{}_{}", a, b)),
                    Int::new_const(format!("in_b_{}_{}", a, b)),
                ];
                solver.assert(&inputs[0].eq(&Int::from_i64(a)));
                solver.assert(&inputs[1].eq(&Int::from_i64(b)));
                let encoding = assert_network(&solver, &net, &inputs, "nn");

                solver.assert(&encoding.decision_is(concrete).unwrap());
                assert_eq!(
                    solver.check(),
                    SatResult::Sat,
                    "decision mismatch at ({}, {})",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_decisions_are_exclusive() {
        let net = small_net();
        let solver = Solver::new();
        let inputs = vec![Int::new_const("ex_a"), Int::new_const("ex_b")];
        let encoding = assert_network(&solver, &net, &inputs, "nn");

        // Both decisions cannot hold at once.
        solver.assert(&encoding.decision_is(0).unwrap());
        solver.assert(&encoding.decision_is(1).unwrap());
        assert_eq!(solver.check(), SatResult::Unsat);
    }

    #[test]
    fn test_unknown_label_has_no_constraint() {
        let net = small_net();
        let solver = Solver::new();
        let inputs = vec![Int::new_const("uk_a"), Int::new_const("uk_b")];
        let encoding = assert_network(&solver, &net, &inputs, "nn");
        assert!(encoding.decision_is(7).is_none());
    }
}
