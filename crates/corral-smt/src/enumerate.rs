//! Start-state enumeration by repeated solving with blocking clauses.

use crate::encoder::{assert_domains, create_step_vars, encode_bool};
use crate::solver::extract_values;
use crate::{SmtError, SmtResult};
use corral_expr::Expr;
use corral_model::{Model, StateValues};
use std::rc::Rc;
use tracing::debug;
use z3::ast::{Bool, Int};
use z3::{SatResult, Solver};

/// Samples states satisfying the current start condition.
///
/// Each sampled state is blocked so later calls yield fresh states;
/// repriming with a new start condition resets the blocking set.
/// Exhaustion (UNSAT) is a normal outcome, not an error.
pub struct StartStateEnumerator {
    model: Rc<Model>,
    solver: Solver,
    vars: Vec<Int>,
}

impl StartStateEnumerator {
    pub fn new(model: Rc<Model>, start: &Expr) -> Self {
        let mut enumerator = StartStateEnumerator {
            model,
            solver: Solver::new(),
            vars: Vec::new(),
        };
        enumerator.update_start_condition(start);
        enumerator
    }

    /// Replace the start condition, dropping all blocking clauses.
    pub fn update_start_condition(&mut self, start: &Expr) {
        self.solver = Solver::new();
        self.vars = create_step_vars(&self.model, 0);
        assert_domains(&self.solver, &self.model, &self.vars);
        self.solver.assert(&encode_bool(start, &self.vars));
    }

    /// Sample a fresh state satisfying the start condition, or `None`
    /// when the (remaining) start region is empty.
    pub fn sample_state(&mut self) -> SmtResult<Option<StateValues>> {
        match self.solver.check() {
            SatResult::Sat => {
                let z3_model = self.solver.get_model().ok_or(SmtError::NoModel)?;
                let values = extract_values(&z3_model, &self.vars)?;
                let differs: Vec<Bool> = self
                    .vars
                    .iter()
                    .zip(&values)
                    .map(|(var, &v)| var.eq(&Int::from_i64(v)).not())
                    .collect();
                self.solver.assert(&Bool::or(&differs));
                debug!(state = %StateValues::new(values.clone()), "start state sampled");
                Ok(Some(StateValues::new(values)))
            }
            SatResult::Unsat => Ok(None),
            SatResult::Unknown => Err(SmtError::Unknown("start-state enumeration".into())),
        }
    }
}
