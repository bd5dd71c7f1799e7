//! Verification oracles behind a uniform contract: an empty result
//! certifies that no counterexample exists under the current
//! predicates.

use crate::config::VerificationMethod;
use crate::{GenError, GenResult};
use corral_expr::Expr;
use corral_model::{Model, NetworkPolicy, StateSet, StateValues};
use corral_smt::{
    assert_domains, assert_network, create_step_vars, encode_action_update, encode_bool,
    extract_values, BoundedReachability, Frame, PolicyEncoding, ReachOutcome, ReachabilityOracle,
    SmtError,
};
use std::rc::Rc;
use tracing::{error, info};
use z3::ast::Int;
use z3::{SatResult, Solver};

/// The verifier paired with the active strengthening strategy.
pub enum VerificationOracle {
    Invariant(InvariantVerifier),
    StartCondition(ScsVerifier),
}

impl VerificationOracle {
    pub fn new(
        method: VerificationMethod,
        model: Rc<Model>,
        network: Option<&NetworkPolicy>,
        reach_depth: usize,
    ) -> Self {
        match method {
            VerificationMethod::InvariantStrengthening => {
                VerificationOracle::Invariant(InvariantVerifier::new(model, network))
            }
            VerificationMethod::StartConditionStrengthening => VerificationOracle::StartCondition(
                ScsVerifier::new(Box::new(BoundedReachability::new(model, reach_depth))),
            ),
        }
    }

    /// Run the verifier. Each returned state witnesses a transition
    /// from `start` into `unsafety`; an empty set certifies none
    /// exists.
    pub fn run(&mut self, start: &Expr, unsafety: &Expr) -> GenResult<StateSet> {
        match self {
            VerificationOracle::Invariant(v) => v.run(start, unsafety),
            VerificationOracle::StartCondition(v) => v.run(start, unsafety),
        }
    }
}

/// Checks one-step closure of the invariant: for every action update,
/// is there a `start` state with a transition into `unsafety`?
///
/// Solvers are created once and reused; per-iteration predicates and
/// per-update formulas live in scoped frames.
pub struct InvariantVerifier {
    model: Rc<Model>,
    solver: Solver,
    pre: Vec<Int>,
    post: Vec<Int>,
    nn: Option<NnSolver>,
}

/// Second solver with the policy network installed over the step-0
/// variables, used to confirm that violating transitions are actually
/// chosen by the policy.
struct NnSolver {
    solver: Solver,
    pre: Vec<Int>,
    post: Vec<Int>,
    encoding: PolicyEncoding,
}

impl InvariantVerifier {
    pub fn new(model: Rc<Model>, network: Option<&NetworkPolicy>) -> Self {
        let solver = Solver::new();
        let pre = create_step_vars(&model, 0);
        let post = create_step_vars(&model, 1);
        assert_domains(&solver, &model, &pre);
        assert_domains(&solver, &model, &post);

        let nn = network.filter(|_| model.has_learned_actions()).map(|net| {
            let solver = Solver::new();
            let pre = create_step_vars(&model, 0);
            let post = create_step_vars(&model, 1);
            assert_domains(&solver, &model, &pre);
            assert_domains(&solver, &model, &post);
            let encoding = assert_network(&solver, net, &pre, "policy");
            NnSolver {
                solver,
                pre,
                post,
                encoding,
            }
        });

        InvariantVerifier {
            model,
            solver,
            pre,
            post,
            nn,
        }
    }

    pub fn run(&mut self, start: &Expr, unsafety: &Expr) -> GenResult<StateSet> {
        info!("verifying one-step closure");
        let mut unsafe_states = StateSet::new();
        let mut violation_found = false;

        let _outer = Frame::push(&self.solver);
        self.solver.assert(&encode_bool(start, &self.pre));
        self.solver.assert(&encode_bool(unsafety, &self.post));
        let _nn_outer = self.nn.as_ref().map(|nn| {
            let frame = Frame::push(&nn.solver);
            nn.solver.assert(&encode_bool(start, &nn.pre));
            nn.solver.assert(&encode_bool(unsafety, &nn.post));
            frame
        });

        for label in 0..self.model.num_actions() {
            for update_idx in 0..self.model.action(label).updates.len() {
                // Any transition at all, policy aside?
                let Some(witness) = self.check_transition(label, update_idx)? else {
                    continue;
                };

                // With a network policy, the transition must also be
                // one the policy actually takes.
                let witness = if self.nn.is_some() {
                    match self.check_policy_transition(label, update_idx)? {
                        Some(w) => w,
                        None => continue,
                    }
                } else {
                    witness
                };

                violation_found = true;
                unsafe_states.insert(StateValues::new(witness));
            }
        }

        // Empty iff no violation was found.
        assert_eq!(
            unsafe_states.is_empty(),
            !violation_found,
            "verifier result set disagrees with violation flag"
        );
        info!(count = unsafe_states.len(), "verification finished");
        Ok(unsafe_states)
    }

    /// Pure check without policy constraints. Returns the step-0
    /// valuation when a violating transition exists.
    fn check_transition(&self, label: usize, update_idx: usize) -> GenResult<Option<Vec<i64>>> {
        let _frame = Frame::push(&self.solver);
        self.solver.assert(&encode_action_update(
            &self.model,
            label,
            update_idx,
            &self.pre,
            &self.post,
        ));
        sat_witness(&self.solver, &self.pre, "transition check")
    }

    /// Network-aware check: the same transition with the policy output
    /// constrained to this action for learned labels.
    fn check_policy_transition(
        &self,
        label: usize,
        update_idx: usize,
    ) -> GenResult<Option<Vec<i64>>> {
        let nn = self.nn.as_ref().unwrap();
        let _frame = Frame::push(&nn.solver);
        nn.solver.assert(&encode_action_update(
            &self.model,
            label,
            update_idx,
            &nn.pre,
            &nn.post,
        ));
        if self.model.is_learned(label) {
            match nn.encoding.decision_is(label) {
                Some(constraint) => nn.solver.assert(&constraint),
                // The network can never choose this label.
                None => return Ok(None),
            }
        }
        sat_witness(&nn.solver, &nn.pre, "policy transition check")
    }
}

fn sat_witness(solver: &Solver, vars: &[Int], what: &str) -> GenResult<Option<Vec<i64>>> {
    match solver.check() {
        SatResult::Sat => {
            let model = solver.get_model().ok_or(SmtError::NoModel)?;
            Ok(Some(extract_values(&model, vars)?))
        }
        SatResult::Unsat => Ok(None),
        SatResult::Unknown => Err(SmtError::Unknown(what.into()).into()),
    }
}

/// Delegates to the abstraction engine with the current start
/// condition as the hypothesis. A non-answer from the engine is fatal.
pub struct ScsVerifier {
    oracle: Box<dyn ReachabilityOracle>,
}

impl ScsVerifier {
    pub fn new(oracle: Box<dyn ReachabilityOracle>) -> Self {
        ScsVerifier { oracle }
    }

    pub fn run(&mut self, start: &Expr, unsafety: &Expr) -> GenResult<StateSet> {
        match self.oracle.search(start, unsafety)? {
            ReachOutcome::Safe => Ok(StateSet::new()),
            ReachOutcome::UnsafePath(path) => {
                info!(length = path.len(), "extracting unsafe path");
                Ok(path.into_iter().collect())
            }
            ReachOutcome::Inconclusive(reason) => {
                error!(reason = %reason, "abstraction engine terminated without solving");
                Err(GenError::Oracle(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corral_expr::{negate, specialize, BinOp};
    use corral_model::{ActionDecl, DenseLayer, Property, UpdateOp, VarDecl};

    /// x in [0, 10]; "inc" adds one below 10, "dec" subtracts one
    /// above 0. Both learned.
    fn two_action_model() -> Rc<Model> {
        Rc::new(
            Model::new(
                "two".into(),
                vec![
                    VarDecl {
                        name: "loc".into(),
                        lower: 0,
                        upper: 0,
                    },
                    VarDecl {
                        name: "x".into(),
                        lower: 0,
                        upper: 10,
                    },
                ],
                vec![
                    ActionDecl {
                        name: "inc".into(),
                        guard: Expr::binary(BinOp::Lt, Expr::Var(1), Expr::Int(10)),
                        updates: vec![UpdateOp {
                            weight: 1,
                            assigns: vec![(
                                1,
                                Expr::binary(BinOp::Add, Expr::Var(1), Expr::Int(1)),
                            )],
                        }],
                        learned: true,
                    },
                    ActionDecl {
                        name: "dec".into(),
                        guard: Expr::binary(BinOp::Gt, Expr::Var(1), Expr::Int(0)),
                        updates: vec![UpdateOp {
                            weight: 1,
                            assigns: vec![(
                                1,
                                Expr::binary(BinOp::Sub, Expr::Var(1), Expr::Int(1)),
                            )],
                        }],
                        learned: true,
                    },
                ],
                Property {
                    start: Expr::truth(),
                    unsafety: Expr::eq(Expr::Var(1), Expr::Int(5)),
                },
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_counterexamples_witness_transitions_into_unsafety() {
        let model = two_action_model();
        let unsafety = Expr::eq(Expr::Var(1), Expr::Int(5));
        let start = specialize(&negate(&unsafety));

        let mut verifier = InvariantVerifier::new(model, None);
        let cexs = verifier.run(&start, &unsafety).unwrap();

        // x = 4 (inc) and x = 6 (dec) both step into x = 5.
        assert!(!cexs.is_empty());
        for cex in &cexs {
            let x = cex.get(1);
            assert!(x == 4 || x == 6, "unexpected witness x = {}", x);
            assert!(start.holds(cex.as_slice()));
        }
    }

    /// Emptiness-correspondence regression: a safe pair yields an
    /// empty set and no assertion fires.
    #[test]
    fn test_safe_pair_yields_empty_set() {
        let model = two_action_model();
        // Unreachable region: nothing inside the domain is unsafe.
        let unsafety = Expr::ge(Expr::Var(1), Expr::Int(50));
        let start = specialize(&negate(&unsafety));

        let mut verifier = InvariantVerifier::new(model, None);
        let cexs = verifier.run(&start, &unsafety).unwrap();
        assert!(cexs.is_empty());
    }

    /// A network that always picks "dec" restricts the counterexamples
    /// to transitions the policy takes: only the non-learned-free
    /// witness x = 6 survives; x = 4 needs "inc", which the policy
    /// never chooses.
    #[test]
    fn test_network_policy_prunes_unchosen_actions() {
        let model = two_action_model();
        // One linear layer over (loc, x): score(inc) = 0, score(dec) = 1.
        let network = NetworkPolicy::new(
            vec![DenseLayer {
                weights: vec![vec![0.0, 0.0], vec![0.0, 0.0]],
                biases: vec![0.0, 1.0],
            }],
            vec![0, 1],
        )
        .unwrap();
        let unsafety = Expr::eq(Expr::Var(1), Expr::Int(5));
        let start = specialize(&negate(&unsafety));

        let mut verifier = InvariantVerifier::new(model, Some(&network));
        let cexs = verifier.run(&start, &unsafety).unwrap();

        assert_eq!(cexs.len(), 1);
        assert_eq!(cexs.iter().next().unwrap().get(1), 6);
    }

    #[test]
    fn test_scs_verifier_maps_outcomes() {
        struct Fixed(Option<ReachOutcome>);
        impl ReachabilityOracle for Fixed {
            fn search(
                &mut self,
                _start: &Expr,
                _unsafety: &Expr,
            ) -> corral_smt::SmtResult<ReachOutcome> {
                Ok(self.0.take().unwrap())
            }
        }

        let mut safe = ScsVerifier::new(Box::new(Fixed(Some(ReachOutcome::Safe))));
        assert!(safe.run(&Expr::truth(), &Expr::falsity()).unwrap().is_empty());

        let path = vec![
            StateValues::new(vec![0, 1]),
            StateValues::new(vec![0, 2]),
        ];
        let mut unsafe_path =
            ScsVerifier::new(Box::new(Fixed(Some(ReachOutcome::UnsafePath(path)))));
        let cexs = unsafe_path.run(&Expr::truth(), &Expr::falsity()).unwrap();
        assert_eq!(cexs.len(), 2);

        let mut fatal = ScsVerifier::new(Box::new(Fixed(Some(ReachOutcome::Inconclusive(
            "gave up".into(),
        )))));
        assert!(matches!(
            fatal.run(&Expr::truth(), &Expr::falsity()),
            Err(GenError::Oracle(_))
        ));
    }
}
