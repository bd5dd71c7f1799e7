//! Policy-run sampling: bias-sample a leaf of the policy-induced
//! forward tree using a symbolic distance heuristic.

use crate::timer::Timer;
use crate::GenResult;
use corral_expr::Expr;
use corral_model::{Policy, SimulationEnvironment, StateId, StateValues};
use corral_smt::DistanceFunction;
use rand::rngs::StdRng;
use rand::Rng;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use tracing::trace;

/// A sampled leaf together with the ids along the route back to the
/// originating successor. Unsafe leaves are excluded from the route.
#[derive(Debug)]
pub struct SampledRun {
    pub leaf: StateValues,
    pub path: Vec<StateId>,
}

/// Explores policy-induced runs from a set of probabilistic successors
/// one step at a time, pruning the frontier to states closest to the
/// unsafety condition, and samples a leaf among the closest ones.
pub struct PolicyRunSampler<'a> {
    sim: &'a SimulationEnvironment,
    policy: &'a dyn Policy,
    distance: DistanceFunction,
    unsafety: &'a Expr,
    timer: &'a Timer,
    rng: Rc<RefCell<StdRng>>,
    probabilistic: bool,
    max_run_length: usize,
    dead_ends: usize,
    time_limit_hits: usize,
}

impl<'a> PolicyRunSampler<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sim: &'a SimulationEnvironment,
        policy: &'a dyn Policy,
        distance: DistanceFunction,
        unsafety: &'a Expr,
        timer: &'a Timer,
        rng: Rc<RefCell<StdRng>>,
        probabilistic: bool,
        max_run_length: usize,
    ) -> Self {
        PolicyRunSampler {
            sim,
            policy,
            distance,
            unsafety,
            timer,
            rng,
            probabilistic,
            max_run_length,
            dead_ends: 0,
            time_limit_hits: 0,
        }
    }

    pub fn dead_ends(&self) -> usize {
        self.dead_ends
    }

    pub fn time_limit_hits(&self) -> usize {
        self.time_limit_hits
    }

    /// Sample a leaf of the policy-induced tree rooted at the given
    /// successors, preferring minimal distance to unsafety. Returns the
    /// leaf plus the route back to the frontier for path splicing, or
    /// `None` when there is nothing to sample from.
    pub fn sample_run(&mut self, successor_ids: &[StateId]) -> GenResult<Option<SampledRun>> {
        if successor_ids.is_empty() {
            return Ok(None);
        }

        // Back-pointer forest: one node per state, parent None for the
        // initial successors. The frontier is the only forward
        // structure.
        let mut tree: BTreeMap<StateId, Option<StateId>> = BTreeMap::new();
        let mut frontier: BTreeSet<StateId> = BTreeSet::new();
        for &id in successor_ids {
            frontier.insert(id);
            tree.insert(id, None);
        }

        let mut minima: Vec<(StateId, i64)> = Vec::new();
        let mut num_steps = 0;

        while self.check_timer() {
            let mut min_distance = i64::MAX;
            let mut distances = Vec::with_capacity(frontier.len());
            for &id in &frontier {
                let d = self.distance.evaluate(&self.sim.get_state(id))?;
                min_distance = min_distance.min(d);
                distances.push((id, d));
            }
            minima = distances
                .into_iter()
                .filter(|&(_, d)| d == min_distance)
                .collect();

            // A unique minimum discriminates the frontier.
            if minima.len() == 1 {
                break;
            }

            let frontier_ids: Vec<StateId> = frontier.iter().copied().collect();
            if frontier_ids.iter().all(|&id| self.is_terminal(id)) {
                break;
            }

            let mut new_frontier: BTreeSet<StateId> = BTreeSet::new();
            for &id in &frontier_ids {
                let state = self.sim.get_state(id);
                if self.unsafety.holds(state.as_slice()) {
                    let path = reconstruct_path(&tree, id, true);
                    trace!(leaf = %id, "unsafe leaf reached during expansion");
                    return Ok(Some(SampledRun { leaf: state, path }));
                }
                let label = self.policy.evaluate(&state);
                for child in self.sim.compute_successors(&state, label) {
                    if tree.contains_key(&child) || frontier.contains(&child) {
                        continue;
                    }
                    new_frontier.insert(child);
                    tree.insert(child, Some(id));
                }
            }
            if new_frontier.is_empty() {
                break;
            }
            frontier = new_frontier;
            num_steps += 1;
            if num_steps == self.max_run_length {
                break;
            }
        }

        if minima.is_empty() {
            // The timer expired before the first distance sweep; fall
            // back to a uniform pick over whatever frontier exists.
            minima = frontier.iter().map(|&id| (id, 0)).collect();
        }
        if minima.is_empty() {
            return Ok(None);
        }

        let selected = if self.probabilistic {
            self.softmax_selection(&minima)
        } else {
            self.greedy_selection(&minima)
        };
        let leaf = self.sim.get_state(selected);
        let unsafe_leaf = self.unsafety.holds(leaf.as_slice());
        let path = reconstruct_path(&tree, selected, unsafe_leaf);
        Ok(Some(SampledRun { leaf, path }))
    }

    /// Uniformly random among the minimal-distance leaves.
    fn greedy_selection(&self, minima: &[(StateId, i64)]) -> StateId {
        if minima.len() > 1 {
            let pick = self.rng.borrow_mut().gen_range(0..minima.len());
            return minima[pick].0;
        }
        minima[0].0
    }

    /// Softmax over negated distances (α = 1) followed by
    /// inverse-transform sampling. Equal distances reduce to a uniform
    /// draw.
    fn softmax_selection(&self, minima: &[(StateId, i64)]) -> StateId {
        let uniform = 1.0 / minima.len() as f64;
        let all_equal = minima.windows(2).all(|w| w[0].1 == w[1].1);

        let probabilities: Vec<f64> = if all_equal {
            vec![uniform; minima.len()]
        } else {
            let exps: Vec<f64> = minima.iter().map(|&(_, d)| (-(d as f64)).exp()).collect();
            let sum: f64 = exps.iter().sum();
            if sum > 0.0 {
                exps.into_iter().map(|e| e / sum).collect()
            } else {
                vec![uniform; minima.len()]
            }
        };

        let p: f64 = self.rng.borrow_mut().gen();
        let mut cumulative = 0.0;
        for (k, prob) in probabilities.iter().enumerate() {
            cumulative += prob;
            if p <= cumulative {
                return minima[k].0;
            }
        }
        minima.last().unwrap().0
    }

    fn is_terminal(&mut self, id: StateId) -> bool {
        let state = self.sim.get_state(id);
        let dead_end = self.sim.extract_applicable_actions(&state).is_empty();
        if dead_end {
            self.dead_ends += 1;
        }
        dead_end
    }

    fn check_timer(&mut self) -> bool {
        if !self.timer.is_expired() {
            return true;
        }
        self.time_limit_hits += 1;
        false
    }
}

/// Walk the back-pointer forest from a leaf to its root. The leaf is
/// included unless it is unsafe; unsafe states never enter path caches.
fn reconstruct_path(
    tree: &BTreeMap<StateId, Option<StateId>>,
    leaf: StateId,
    unsafe_leaf: bool,
) -> Vec<StateId> {
    let mut path = Vec::new();
    if !unsafe_leaf {
        path.push(leaf);
    }
    let mut current = tree.get(&leaf).copied().flatten();
    while let Some(id) = current {
        path.push(id);
        current = tree.get(&id).copied().flatten();
    }
    path
}
