//! Simulation environment: state pool and successor computation.

use crate::model::{ActionLabel, Model, UpdateOp};
use crate::state::{StateId, StateValues};
use ahash::AHashMap;
use rand::rngs::StdRng;
use rand::Rng;
use std::cell::RefCell;
use std::rc::Rc;

/// Owns the state pool and answers successor queries.
///
/// States are interned: value-identical states share one [`StateId`],
/// and ids stay stable for the lifetime of the environment. The pool
/// is behind a `RefCell` so that callers hold the environment by
/// shared reference; execution is single-threaded.
pub struct SimulationEnvironment {
    model: Rc<Model>,
    pool: RefCell<Pool>,
    rng: Rc<RefCell<StdRng>>,
}

#[derive(Default)]
struct Pool {
    states: Vec<StateValues>,
    index: AHashMap<StateValues, StateId>,
}

impl Pool {
    fn intern(&mut self, values: StateValues) -> StateId {
        if let Some(&id) = self.index.get(&values) {
            return id;
        }
        let id = StateId::from_index(self.states.len());
        self.states.push(values.clone());
        self.index.insert(values, id);
        id
    }
}

impl SimulationEnvironment {
    pub fn new(model: Rc<Model>, rng: Rc<RefCell<StdRng>>) -> Self {
        SimulationEnvironment {
            model,
            pool: RefCell::new(Pool::default()),
            rng,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Intern a state, minting an id if it is new.
    pub fn intern(&self, values: StateValues) -> StateId {
        assert!(
            self.model.in_domain(values.as_slice()),
            "state {} outside model domain",
            values
        );
        self.pool.borrow_mut().intern(values)
    }

    /// Resolve an id to its state values.
    pub fn get_state(&self, id: StateId) -> StateValues {
        self.pool.borrow().states[id.index()].clone()
    }

    /// Number of distinct states seen so far.
    pub fn num_states(&self) -> usize {
        self.pool.borrow().states.len()
    }

    /// All distinct successor states of `state` under the given action,
    /// one per update operation, in operation order. Empty when the
    /// guard does not hold.
    pub fn compute_successors(&self, state: &StateValues, label: ActionLabel) -> Vec<StateId> {
        let action = self.model.action(label);
        if !action.guard.holds(state.as_slice()) {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(action.updates.len());
        for update in &action.updates {
            if update.weight == 0 {
                continue;
            }
            let id = self.intern(apply_update(state, update));
            if !out.contains(&id) {
                out.push(id);
            }
        }
        out
    }

    /// Sample one successor according to the update-operation weights.
    /// `None` when the guard does not hold.
    pub fn compute_successor_if_applicable(
        &self,
        state: &StateValues,
        label: ActionLabel,
    ) -> Option<StateValues> {
        let action = self.model.action(label);
        if !action.guard.holds(state.as_slice()) {
            return None;
        }
        let total: u32 = action.updates.iter().map(|u| u.weight).sum();
        let mut pick = self.rng.borrow_mut().gen_range(0..total);
        for update in &action.updates {
            if pick < update.weight {
                let values = apply_update(state, update);
                self.intern(values.clone());
                return Some(values);
            }
            pick -= update.weight;
        }
        unreachable!("weights sum to {total} but no branch was selected");
    }

    /// Labels of all actions whose guard holds in `state`.
    pub fn extract_applicable_actions(&self, state: &StateValues) -> Vec<ActionLabel> {
        (0..self.model.num_actions())
            .filter(|&label| self.model.action(label).guard.holds(state.as_slice()))
            .collect()
    }
}

fn apply_update(state: &StateValues, update: &UpdateOp) -> StateValues {
    let mut values = state.as_slice().to_vec();
    for (idx, expr) in &update.assigns {
        values[*idx] = expr.evaluate(state.as_slice());
    }
    StateValues::new(values)
}
