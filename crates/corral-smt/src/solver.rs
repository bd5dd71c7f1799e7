//! Scoped solver frames and model extraction.

use crate::{SmtError, SmtResult};
use z3::ast::Int;
use z3::Solver;

/// A pushed solver scope that pops itself on every exit path.
///
/// Solver push/pop stacks must stay balanced; an imbalance is a fatal
/// invariant violation, so the release is tied to scope exit rather
/// than left to call sites.
pub struct Frame<'a> {
    solver: &'a Solver,
}

impl<'a> Frame<'a> {
    pub fn push(solver: &'a Solver) -> Self {
        solver.push();
        Frame { solver }
    }
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        self.solver.pop(1);
    }
}

/// Read a complete integer valuation for `vars` out of a Z3 model.
pub fn extract_values(model: &z3::Model, vars: &[Int]) -> SmtResult<Vec<i64>> {
    vars.iter()
        .enumerate()
        .map(|(idx, var)| {
            model
                .eval(var, true)
                .and_then(|v| v.as_i64())
                .ok_or(SmtError::IncompleteValuation(idx))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use z3::SatResult;

    #[test]
    fn test_frame_releases_on_drop() {
        let solver = Solver::new();
        let x = Int::new_const("frame_x");
        {
            let _frame = Frame::push(&solver);
            solver.assert(&x.eq(&Int::from_i64(1)));
            solver.assert(&x.eq(&Int::from_i64(2)));
            assert_eq!(solver.check(), SatResult::Unsat);
        }
        // The contradictory assertions left with the frame.
        assert_eq!(solver.check(), SatResult::Sat);
    }

    #[test]
    fn test_extract_values() {
        let solver = Solver::new();
        let x = Int::new_const("extract_x");
        let y = Int::new_const("extract_y");
        solver.assert(&x.eq(&Int::from_i64(4)));
        solver.assert(&y.eq(&Int::from_i64(-3)));
        assert_eq!(solver.check(), SatResult::Sat);
        let model = solver.get_model().unwrap();
        let values = extract_values(&model, &[x, y]).unwrap();
        assert_eq!(values, vec![4, -3]);
    }
}
