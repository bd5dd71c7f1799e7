//! Strengthening strategies: turn counterexamples into refined
//! predicate pairs.

use crate::approx::{bounded_box, bounding_box, BoxApproximation};
use crate::config::{ApproximationKind, VerificationMethod};
use corral_expr::{negate, normalize, specialize, Expr};
use corral_model::{Model, StateSet};
use std::rc::Rc;
use tracing::{debug, info};

/// Result of one strengthening step. Ownership of the refined
/// predicates transfers to the caller; the inputs are never mutated.
#[derive(Debug)]
pub struct Refinement {
    pub start: Expr,
    pub unsafety: Expr,
    /// Volume of the box used, when the step approximated.
    pub box_volume: Option<f64>,
    /// Number of counterexamples that actually fed the refinement.
    pub refined_with: usize,
}

/// Produces the next `(start, unsafety)` pair from a set of
/// counterexample states.
pub struct StrengtheningStrategy {
    method: VerificationMethod,
    approx: ApproximationKind,
    model: Rc<Model>,
}

impl StrengtheningStrategy {
    pub fn new(method: VerificationMethod, approx: ApproximationKind, model: Rc<Model>) -> Self {
        StrengtheningStrategy {
            method,
            approx,
            model,
        }
    }

    /// Refine the predicate pair with a batch of counterexamples.
    ///
    /// Under invariant strengthening the pair stays complementary:
    /// excluded states move from the start side to the unsafety side.
    /// Under start-condition strengthening only the start condition
    /// shrinks, and only counterexamples inside it count.
    pub fn update_conditions(
        &self,
        start: &Expr,
        unsafety: &Expr,
        approximate: bool,
        counterexamples: StateSet,
    ) -> Refinement {
        debug!(count = counterexamples.len(), "updating conditions");
        match self.method {
            VerificationMethod::InvariantStrengthening => {
                self.update_invariant(start, unsafety, approximate, counterexamples)
            }
            VerificationMethod::StartConditionStrengthening => {
                self.update_start_only(start, unsafety, approximate, counterexamples)
            }
        }
    }

    fn update_invariant(
        &self,
        start: &Expr,
        unsafety: &Expr,
        approximate: bool,
        counterexamples: StateSet,
    ) -> Refinement {
        let mut conjuncts = start.split_conjunction();
        let mut disjuncts = unsafety.split_disjunction();
        let refined_with = counterexamples.len();

        let box_volume = if approximate && self.approx != ApproximationKind::None {
            self.exclude_box(&counterexamples, &mut conjuncts, Some(&mut disjuncts))
        } else {
            for state in &counterexamples {
                let condition = state.to_condition();
                conjuncts.push(negate(&condition));
                disjuncts.push(condition);
            }
            None
        };

        Refinement {
            start: specialize(&normalize(&Expr::construct_conjunction(conjuncts))),
            unsafety: specialize(&normalize(&Expr::construct_disjunction(disjuncts))),
            box_volume,
            refined_with,
        }
    }

    fn update_start_only(
        &self,
        start: &Expr,
        unsafety: &Expr,
        approximate: bool,
        counterexamples: StateSet,
    ) -> Refinement {
        let mut conjuncts = start.split_conjunction();

        // Only counterexamples currently inside the start condition
        // feed the refinement; the unsafety condition never changes.
        let unsafe_starts: StateSet = counterexamples
            .into_iter()
            .filter(|s| start.holds(s.as_slice()))
            .collect();
        let refined_with = unsafe_starts.len();

        let box_volume = if approximate && self.approx != ApproximationKind::None {
            self.exclude_box(&unsafe_starts, &mut conjuncts, None)
        } else {
            for state in &unsafe_starts {
                conjuncts.push(negate(&state.to_condition()));
            }
            None
        };

        Refinement {
            start: specialize(&normalize(&Expr::construct_conjunction(conjuncts))),
            unsafety: unsafety.clone(),
            box_volume,
            refined_with,
        }
    }

    /// Box the states, append the negated box to the conjuncts and
    /// (when given) the box itself to the disjuncts.
    fn exclude_box(
        &self,
        states: &StateSet,
        conjuncts: &mut Vec<Expr>,
        disjuncts: Option<&mut Vec<Expr>>,
    ) -> Option<f64> {
        if states.is_empty() {
            return None;
        }
        let BoxApproximation { volume, predicate } = match self.approx {
            ApproximationKind::Over => {
                info!("over-approximating counterexamples");
                bounding_box(states, &self.model)
            }
            ApproximationKind::Under => {
                info!("under-approximating counterexamples");
                bounded_box(states, &self.model)
            }
            ApproximationKind::None => unreachable!(),
        };
        conjuncts.push(negate(&predicate));
        if let Some(disjuncts) = disjuncts {
            disjuncts.push(predicate);
        }
        Some(volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corral_model::{Property, StateValues, VarDecl};

    fn line_model() -> Rc<Model> {
        Rc::new(
            Model::new(
                "line".into(),
                vec![
                    VarDecl {
                        name: "loc".into(),
                        lower: 0,
                        upper: 0,
                    },
                    VarDecl {
                        name: "x".into(),
                        lower: 0,
                        upper: 7,
                    },
                ],
                vec![],
                Property {
                    start: Expr::truth(),
                    unsafety: Expr::falsity(),
                },
            )
            .unwrap(),
        )
    }

    fn all_states() -> Vec<Vec<i64>> {
        (0..=7).map(|x| vec![0, x]).collect()
    }

    #[test]
    fn test_invariant_strengthening_keeps_complement() {
        let model = line_model();
        let strategy = StrengtheningStrategy::new(
            VerificationMethod::InvariantStrengthening,
            ApproximationKind::None,
            model,
        );
        let unsafety = Expr::eq(Expr::Var(1), Expr::Int(5));
        let start = specialize(&negate(&unsafety));

        let mut cexs = StateSet::new();
        cexs.insert(StateValues::new(vec![0, 4]));
        let refinement = strategy.update_conditions(&start, &unsafety, false, cexs);

        for state in all_states() {
            let in_start = refinement.start.holds(&state);
            let in_unsafety = refinement.unsafety.holds(&state);
            // Complementary over the whole domain.
            assert_ne!(in_start, in_unsafety, "state {:?}", state);
        }
        // The counterexample left the start region.
        assert!(!refinement.start.holds(&[0, 4]));
        assert!(refinement.unsafety.holds(&[0, 4]));
        assert_eq!(refinement.refined_with, 1);
    }

    #[test]
    fn test_start_condition_strengthening_keeps_unsafety() {
        let model = line_model();
        let strategy = StrengtheningStrategy::new(
            VerificationMethod::StartConditionStrengthening,
            ApproximationKind::None,
            model,
        );
        let unsafety = Expr::eq(Expr::Var(1), Expr::Int(5));
        let start = Expr::le(Expr::Var(1), Expr::Int(3));

        let mut cexs = StateSet::new();
        cexs.insert(StateValues::new(vec![0, 2])); // inside start
        cexs.insert(StateValues::new(vec![0, 6])); // outside start
        let refinement = strategy.update_conditions(&start, &unsafety, false, cexs);

        // Unsafety is bit-identical.
        assert_eq!(refinement.unsafety, unsafety);
        // Only the unsafe start state fed the refinement.
        assert_eq!(refinement.refined_with, 1);
        assert!(!refinement.start.holds(&[0, 2]));
        assert!(refinement.start.holds(&[0, 3]));
    }

    #[test]
    fn test_empty_counterexamples_is_identity() {
        let model = line_model();
        let strategy = StrengtheningStrategy::new(
            VerificationMethod::InvariantStrengthening,
            ApproximationKind::Over,
            model,
        );
        let unsafety = Expr::ge(Expr::Var(1), Expr::Int(6));
        let start = specialize(&negate(&unsafety));

        let refinement =
            strategy.update_conditions(&start, &unsafety, true, StateSet::new());
        assert!(refinement.box_volume.is_none());
        for state in all_states() {
            assert_eq!(refinement.start.holds(&state), start.holds(&state));
            assert_eq!(refinement.unsafety.holds(&state), unsafety.holds(&state));
        }
    }

    #[test]
    fn test_approximate_refinement_boxes_the_batch() {
        let model = line_model();
        let strategy = StrengtheningStrategy::new(
            VerificationMethod::InvariantStrengthening,
            ApproximationKind::Over,
            model,
        );
        let unsafety = Expr::eq(Expr::Var(1), Expr::Int(7));
        let start = specialize(&negate(&unsafety));

        let mut cexs = StateSet::new();
        cexs.insert(StateValues::new(vec![0, 4]));
        cexs.insert(StateValues::new(vec![0, 6]));
        let refinement = strategy.update_conditions(&start, &unsafety, true, cexs);

        assert!(refinement.box_volume.is_some());
        // The whole interval [4, 6] moved, including the gap state 5.
        for x in 4..=6 {
            assert!(!refinement.start.holds(&[0, x]));
            assert!(refinement.unsafety.holds(&[0, x]));
        }
        assert!(refinement.start.holds(&[0, 3]));
    }

    #[test]
    fn test_refinement_excludes_every_counterexample() {
        let model = line_model();
        let strategy = StrengtheningStrategy::new(
            VerificationMethod::InvariantStrengthening,
            ApproximationKind::None,
            model,
        );
        let unsafety = Expr::eq(Expr::Var(1), Expr::Int(0));
        let start = specialize(&negate(&unsafety));

        let mut cexs = StateSet::new();
        for x in [2, 3, 7] {
            cexs.insert(StateValues::new(vec![0, x]));
        }
        let refinement = strategy.update_conditions(&start, &unsafety, false, cexs.clone());
        for cex in &cexs {
            assert!(!refinement.start.holds(cex.as_slice()));
        }
    }
}
