//! Reachability oracle: can the start region reach unsafety?

use crate::encoder::{assert_domains, create_step_vars, encode_bool};
use crate::solver::{extract_values, Frame};
use crate::transition::encode_transition_relation;
use crate::{SmtError, SmtResult};
use corral_expr::Expr;
use corral_model::{Model, StateValues};
use std::rc::Rc;
use tracing::{debug, info};
use z3::ast::Int;
use z3::{SatResult, Solver};

/// Outcome of a reachability query.
#[derive(Debug)]
pub enum ReachOutcome {
    /// No path from the start region into unsafety was found.
    Safe,
    /// A concrete path from a start state into unsafety, in step order.
    UnsafePath(Vec<StateValues>),
    /// The engine could not decide; callers treat this as fatal.
    Inconclusive(String),
}

/// Narrow contract for the abstraction engine backing start-condition
/// strengthening. Implementations answer whether the current start
/// region can reach unsafety, producing a concrete path when it can.
pub trait ReachabilityOracle {
    fn search(&mut self, start: &Expr, unsafety: &Expr) -> SmtResult<ReachOutcome>;
}

/// Bounded-reachability engine: unrolls the full transition relation
/// step by step and checks unsafety at each depth.
pub struct BoundedReachability {
    model: Rc<Model>,
    max_depth: usize,
}

impl BoundedReachability {
    pub fn new(model: Rc<Model>, max_depth: usize) -> Self {
        BoundedReachability { model, max_depth }
    }
}

impl ReachabilityOracle for BoundedReachability {
    fn search(&mut self, start: &Expr, unsafety: &Expr) -> SmtResult<ReachOutcome> {
        debug!(depth = self.max_depth, "starting reachability search");
        let solver = Solver::new();

        let mut steps: Vec<Vec<Int>> = Vec::with_capacity(self.max_depth + 1);
        for k in 0..=self.max_depth {
            let vars = create_step_vars(&self.model, k);
            assert_domains(&solver, &self.model, &vars);
            steps.push(vars);
        }
        solver.assert(&encode_bool(start, &steps[0]));

        for k in 0..=self.max_depth {
            if k > 0 {
                solver.assert(&encode_transition_relation(
                    &self.model,
                    &steps[k - 1],
                    &steps[k],
                ));
            }

            let _frame = Frame::push(&solver);
            solver.assert(&encode_bool(unsafety, &steps[k]));
            match solver.check() {
                SatResult::Sat => {
                    let z3_model = solver.get_model().ok_or(SmtError::NoModel)?;
                    let path = steps[..=k]
                        .iter()
                        .map(|vars| extract_values(&z3_model, vars).map(StateValues::new))
                        .collect::<SmtResult<Vec<_>>>()?;
                    info!(depth = k, "unsafe path found");
                    return Ok(ReachOutcome::UnsafePath(path));
                }
                SatResult::Unsat => {}
                SatResult::Unknown => {
                    return Ok(ReachOutcome::Inconclusive(format!(
                        "solver returned unknown at depth {}",
                        k
                    )));
                }
            }
        }
        Ok(ReachOutcome::Safe)
    }
}
