//! Symbolic distance from a state to the unsafety region.

use crate::encoder::{assert_domains, create_step_vars, encode_bool};
use crate::solver::Frame;
use crate::{SmtError, SmtResult};
use corral_expr::Expr;
use corral_model::{Model, StateValues};
use z3::ast::Int;
use z3::{SatResult, Solver};

/// Maps a state to a non-negative integer distance to the unsafety
/// condition: the smallest L1 radius within which an unsafe state
/// exists inside the model domain. Only the total order matters to
/// callers. When unsafety is unreachable inside the domain, every
/// state maps to the same sentinel beyond the largest real distance.
pub struct DistanceFunction {
    solver: Solver,
    vars: Vec<Int>,
    max_distance: i64,
}

impl DistanceFunction {
    pub fn new(model: &Model, unsafety: &Expr) -> Self {
        let solver = Solver::new();
        let vars = create_step_vars(model, 0);
        assert_domains(&solver, model, &vars);
        solver.assert(&encode_bool(unsafety, &vars));
        let max_distance = model.vars().iter().map(|v| v.upper - v.lower).sum();
        DistanceFunction {
            solver,
            vars,
            max_distance,
        }
    }

    /// Minimal L1 distance from `state` to any unsafe in-domain state,
    /// found by binary search on the radius.
    pub fn evaluate(&self, state: &StateValues) -> SmtResult<i64> {
        let terms: Vec<Int> = self
            .vars
            .iter()
            .zip(state.as_slice())
            .map(|(var, &v)| {
                let point = Int::from_i64(v);
                let above = Int::sub(&[var.clone(), point.clone()]);
                let below = Int::sub(&[point.clone(), var.clone()]);
                var.ge(&point).ite(&above, &below)
            })
            .collect();
        let total = Int::add(&terms);

        if !self.reachable_within(&total, self.max_distance)? {
            return Ok(self.max_distance + 1);
        }
        let mut lo = 0;
        let mut hi = self.max_distance;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.reachable_within(&total, mid)? {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        Ok(lo)
    }

    fn reachable_within(&self, total: &Int, radius: i64) -> SmtResult<bool> {
        let _frame = Frame::push(&self.solver);
        self.solver.assert(&total.le(&Int::from_i64(radius)));
        match self.solver.check() {
            SatResult::Sat => Ok(true),
            SatResult::Unsat => Ok(false),
            SatResult::Unknown => Err(SmtError::Unknown("distance radius check".into())),
        }
    }
}
