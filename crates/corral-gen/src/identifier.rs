//! Unsafe-path identification: policy rollouts from sampled start
//! states within a time budget.

use crate::sampler::PolicyRunSampler;
use crate::timer::Timer;
use crate::GenResult;
use ahash::AHashSet;
use corral_expr::Expr;
use corral_model::{ActionLabel, Policy, SimulationEnvironment, StateId, StateValues};
use corral_smt::StartStateEnumerator;
use rand::rngs::StdRng;
use rand::Rng;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Hard cap on rollout length.
pub const PATH_LENGTH_LIMIT: usize = 1000;

/// Deduplicating set of traversed transitions, used for cycle
/// detection within one identification run.
#[derive(Debug, Default)]
pub struct TransitionCache {
    seen: AHashSet<(StateId, ActionLabel, StateId)>,
    cycles: usize,
}

impl TransitionCache {
    pub fn new() -> Self {
        TransitionCache::default()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.cycles = 0;
    }

    /// Record a transition. Returns false when it was already present,
    /// counting the cycle.
    pub fn insert(&mut self, src: StateId, label: ActionLabel, dst: StateId) -> bool {
        let inserted = self.seen.insert((src, label, dst));
        if !inserted {
            self.cycles += 1;
        }
        inserted
    }

    pub fn cycles(&self) -> usize {
        self.cycles
    }
}

/// Counters and timings accumulated over one identification run.
#[derive(Debug, Default)]
pub struct TestingReport {
    pub start_states: usize,
    pub unsafe_paths: usize,
    pub dead_ends: usize,
    pub cycles: usize,
    pub unsafety_eval: Duration,
    pub sampling_time_limit_hits: usize,
}

/// Explores the policy envelope for unsafe paths.
///
/// Start states are drawn from the enumerator; each seeds a rollout
/// that alternates deterministic simulation with policy choices. Paths
/// that reach unsafety contribute their state ids (excluding the
/// terminal unsafe states) to the result.
pub struct UnsafePathIdentifier<'a> {
    sim: &'a SimulationEnvironment,
    policy: &'a dyn Policy,
    enumerator: &'a mut StartStateEnumerator,
    unsafety: &'a Expr,
    timer: &'a Timer,
    sampler: Option<PolicyRunSampler<'a>>,
    sampling_probability: f64,
    terminate_on_cycles: bool,
    log_path: bool,
    rng: Rc<RefCell<StdRng>>,

    unsafe_state_ids: BTreeSet<StateId>,
    path_cache: BTreeSet<StateId>,
    transition_cache: TransitionCache,
    source: Option<StateId>,
    target: Option<StateId>,
    report: TestingReport,
}

impl<'a> UnsafePathIdentifier<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sim: &'a SimulationEnvironment,
        policy: &'a dyn Policy,
        enumerator: &'a mut StartStateEnumerator,
        unsafety: &'a Expr,
        timer: &'a Timer,
        sampler: Option<PolicyRunSampler<'a>>,
        sampling_probability: f64,
        terminate_on_cycles: bool,
        log_path: bool,
        rng: Rc<RefCell<StdRng>>,
    ) -> Self {
        UnsafePathIdentifier {
            sim,
            policy,
            enumerator,
            unsafety,
            timer,
            sampler,
            sampling_probability,
            terminate_on_cycles,
            log_path,
            rng,
            unsafe_state_ids: BTreeSet::new(),
            path_cache: BTreeSet::new(),
            transition_cache: TransitionCache::new(),
            source: None,
            target: None,
            report: TestingReport::default(),
        }
    }

    /// Search the policy envelope for unsafe paths until the timer
    /// expires or the start-state enumerator runs dry.
    ///
    /// Returns the ids of states along all unsafe paths found,
    /// excluding the terminal unsafe states, plus the run's counters.
    pub fn identify_unsafe_paths(mut self) -> GenResult<(BTreeSet<StateId>, TestingReport)> {
        self.transition_cache.clear();
        while !self.timer.is_expired() {
            let Some(start_values) = self.enumerator.sample_state()? else {
                debug!("stopping: no start state found");
                break;
            };
            let start_id = self.sim.intern(start_values.clone());
            self.report.start_states += 1;

            self.path_cache.insert(start_id);
            self.set_current_state(start_id);

            if self.execute_policy(start_values)? {
                self.report.unsafe_paths += 1;
                let path = std::mem::take(&mut self.path_cache);
                self.unsafe_state_ids.extend(path);
            } else {
                self.path_cache.clear();
            }
        }

        let mut report = self.report;
        report.cycles = self.transition_cache.cycles();
        if let Some(sampler) = &self.sampler {
            report.dead_ends += sampler.dead_ends();
            report.sampling_time_limit_hits = sampler.time_limit_hits();
        }
        Ok((self.unsafe_state_ids, report))
    }

    /// Run the policy from a start state until a terminal condition.
    /// Returns true when an unsafe state is reached.
    fn execute_policy(&mut self, start: StateValues) -> GenResult<bool> {
        let mut current = start;
        if self.log_path {
            debug!("====== EXECUTION START ======");
            debug!(state = %current);
        }

        while !self.is_terminal(&current) {
            let Some(next) = self.simulate_until_choice(&current)? else {
                return Ok(false);
            };
            current = next;
            self.set_current_state(self.sim.intern(current.clone()));
            if self.is_unsafe(&current) {
                if self.log_path {
                    debug!("====== UNSAFE ======");
                }
                return Ok(true);
            }

            let label = self.policy.evaluate(&current);
            let Some(next) = self.sample_successor(&current, label)? else {
                return Ok(false);
            };
            current = next;
            if self.log_path {
                debug!(action = label, state = %current);
            }

            let id = self.sim.intern(current.clone());
            self.set_next_state(id);
            if !self.cache_and_check_cycle(label) && self.terminate_on_cycles {
                if self.log_path {
                    debug!("====== CYCLE ======");
                }
                return Ok(false);
            }
            if self.is_unsafe(&current) {
                if self.log_path {
                    debug!("====== UNSAFE ======");
                }
                return Ok(true);
            }

            self.path_cache.insert(id);
            self.set_next_to_current_state();
            if self.path_cache.len() >= PATH_LENGTH_LIMIT {
                return Ok(false);
            }
        }
        Ok(false)
    }

    /// Step deterministically while exactly one action applies. Stops
    /// at a choice point (two or more applicable actions), a dead end,
    /// a cycle under `terminate_on_cycles`, the path-length limit, or
    /// an unsafe state (returned for the caller to detect).
    fn simulate_until_choice(&mut self, state: &StateValues) -> GenResult<Option<StateValues>> {
        let mut current = state.clone();
        let mut applicable = self.sim.extract_applicable_actions(&current);
        while applicable.len() <= 1 {
            if applicable.is_empty() {
                if self.log_path {
                    debug!("====== DEAD END ======");
                }
                return Ok(None);
            }

            let label = applicable[0];
            let Some(next) = self.sample_successor(&current, label)? else {
                return Ok(None);
            };
            current = next;
            if self.log_path {
                debug!(action = label, state = %current);
            }

            let id = self.sim.intern(current.clone());
            self.set_next_state(id);
            if !self.cache_and_check_cycle(label) && self.terminate_on_cycles {
                if self.log_path {
                    debug!("====== CYCLE ======");
                }
                return Ok(None);
            }
            if self.is_unsafe(&current) {
                if self.log_path {
                    debug!("====== UNSAFE ======");
                }
                return Ok(Some(current));
            }

            self.path_cache.insert(id);
            applicable = self.sim.extract_applicable_actions(&current);
            self.set_next_to_current_state();
            if self.path_cache.len() >= PATH_LENGTH_LIMIT {
                return Ok(None);
            }
        }
        Ok(Some(current))
    }

    /// Sample the next state for an action. With multiple successors
    /// the policy-run sampler takes over with the configured
    /// probability (unless the budget is nearly spent); otherwise the
    /// transition distribution decides.
    fn sample_successor(
        &mut self,
        state: &StateValues,
        label: ActionLabel,
    ) -> GenResult<Option<StateValues>> {
        let p: f64 = self.rng.borrow_mut().gen();
        let successors = self.sim.compute_successors(state, label);
        if successors.len() > 1
            && p < self.sampling_probability
            && !self.timer.is_almost_expired(Duration::from_secs(1))
        {
            if let Some(sampler) = self.sampler.as_mut() {
                if let Some(run) = sampler.sample_run(&successors)? {
                    self.path_cache.extend(run.path);
                    return Ok(Some(run.leaf));
                }
            }
        }
        Ok(self.sim.compute_successor_if_applicable(state, label))
    }

    fn is_terminal(&mut self, state: &StateValues) -> bool {
        let dead_end = self.sim.extract_applicable_actions(state).is_empty();
        if dead_end {
            self.report.dead_ends += 1;
            if self.log_path {
                debug!("====== DEAD END ======");
            }
        }
        dead_end
    }

    fn is_unsafe(&mut self, state: &StateValues) -> bool {
        let started = Instant::now();
        let result = self.unsafety.holds(state.as_slice());
        self.report.unsafety_eval += started.elapsed();
        result
    }

    // Cycle bookkeeping. Source and target must be set in lockstep
    // with the rollout; an unset id here is a programming bug.

    fn set_current_state(&mut self, id: StateId) {
        self.source = Some(id);
        self.target = None;
    }

    fn set_next_state(&mut self, id: StateId) {
        self.target = Some(id);
    }

    fn set_next_to_current_state(&mut self) {
        let target = self.target.expect("cycle tracking: target unset");
        self.source = Some(target);
        self.target = None;
    }

    fn cache_and_check_cycle(&mut self, label: ActionLabel) -> bool {
        let source = self.source.expect("cycle tracking: source unset");
        let target = self.target.expect("cycle tracking: target unset");
        self.transition_cache.insert(source, label, target)
    }
}
