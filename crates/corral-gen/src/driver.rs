//! The refinement driver: alternates testing, verification, and the
//! final emptiness check over the evolving predicate pair.

use crate::config::{GenConfig, VerificationMethod};
use crate::identifier::UnsafePathIdentifier;
use crate::sampler::PolicyRunSampler;
use crate::stats::{IterationStats, RunStats};
use crate::strengthen::{Refinement, StrengtheningStrategy};
use crate::timer::Timer;
use crate::verify::VerificationOracle;
use crate::GenResult;
use corral_expr::{negate, specialize, Expr};
use corral_model::{Model, PolicySpec, SimulationEnvironment, StateSet};
use corral_smt::{DistanceFunction, StartStateEnumerator};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;
use tracing::info;

/// Final answer of a generation run.
#[derive(Debug)]
pub enum Outcome {
    /// A non-empty safe start region was found.
    Solved { start_condition: Expr },
    /// The start region was refined to empty.
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Testing,
    Verification,
    CheckStart,
}

/// Owns the predicate pair and all long-lived components, and runs the
/// iterative refinement to completion.
pub struct SafeStartGenerator {
    model: Rc<Model>,
    config: GenConfig,
    start_condition: Expr,
    unsafety_condition: Expr,
    sim: SimulationEnvironment,
    policy: PolicySpec,
    enumerator: StartStateEnumerator,
    strategy: StrengtheningStrategy,
    verifier: VerificationOracle,
    rng: Rc<RefCell<StdRng>>,
    mode: Mode,
    stats: RunStats,
    iter_stats: Option<IterationStats>,
}

impl SafeStartGenerator {
    pub fn new(model: Model, policy: PolicySpec, config: GenConfig) -> GenResult<Self> {
        config.validate()?;
        let model = Rc::new(model);
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(config.seed)));

        let unsafety_condition = model.property().unsafety.clone();
        let start_condition = match config.method {
            VerificationMethod::InvariantStrengthening => {
                info!("start condition set to negation of unsafety");
                specialize(&negate(&unsafety_condition))
            }
            VerificationMethod::StartConditionStrengthening => model.property().start.clone(),
        };

        let sim = SimulationEnvironment::new(model.clone(), rng.clone());
        let enumerator = StartStateEnumerator::new(model.clone(), &start_condition);
        let strategy =
            StrengtheningStrategy::new(config.method, config.approximation, model.clone());
        let verifier = VerificationOracle::new(
            config.method,
            model.clone(),
            policy.network(),
            config.reach_depth,
        );
        let iter_stats = config
            .iteration_stats
            .as_deref()
            .map(IterationStats::create)
            .transpose()?;
        let mode = if config.use_testing {
            Mode::Testing
        } else {
            Mode::Verification
        };

        Ok(SafeStartGenerator {
            model,
            config,
            start_condition,
            unsafety_condition,
            sim,
            policy,
            enumerator,
            strategy,
            verifier,
            rng,
            mode,
            stats: RunStats::new(),
            iter_stats,
        })
    }

    /// Refine until the verifier certifies emptiness and the final
    /// start check answers.
    pub fn run(&mut self) -> GenResult<Outcome> {
        loop {
            if let Some(outcome) = self.step()? {
                self.stats.log_summary();
                return Ok(outcome);
            }
        }
    }

    /// One step of the mode machine. Returns the final outcome when
    /// the start check has run.
    pub fn step(&mut self) -> GenResult<Option<Outcome>> {
        match self.mode {
            Mode::Testing => self.mode = self.run_testing()?,
            Mode::Verification => self.mode = self.run_verification()?,
            Mode::CheckStart => return self.check_start_condition().map(Some),
        }

        self.stats.iterations += 1;
        self.flush_iteration_row()?;
        // Reprime the enumerator with the (possibly refined) start.
        self.enumerator.update_start_condition(&self.start_condition);
        Ok(None)
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn start_condition(&self) -> &Expr {
        &self.start_condition
    }

    pub fn unsafety_condition(&self) -> &Expr {
        &self.unsafety_condition
    }

    fn run_testing(&mut self) -> GenResult<Mode> {
        info!("identifying unsafe paths");
        if let Some(iter) = &mut self.iter_stats {
            iter.testing_iteration();
        }

        let timer = Timer::new(self.config.testing_time);
        let searching = Instant::now();

        let distance = self
            .config
            .policy_run_sampling
            .then(|| DistanceFunction::new(&self.model, &self.unsafety_condition));
        let sampler = distance.map(|distance| {
            PolicyRunSampler::new(
                &self.sim,
                &self.policy,
                distance,
                &self.unsafety_condition,
                &timer,
                self.rng.clone(),
                self.config.probabilistic_sampling,
                self.config.max_run_length,
            )
        });
        let identifier = UnsafePathIdentifier::new(
            &self.sim,
            &self.policy,
            &mut self.enumerator,
            &self.unsafety_condition,
            &timer,
            sampler,
            self.config.sampling_probability,
            self.config.terminate_on_cycles,
            self.config.log_path,
            self.rng.clone(),
        );
        let (unsafe_ids, report) = identifier.identify_unsafe_paths()?;

        let search_time = searching.elapsed();
        self.stats.total_testing_time += search_time;
        self.stats.start_states += report.start_states;
        self.stats.unsafe_paths += report.unsafe_paths;
        self.stats.dead_ends += report.dead_ends;
        self.stats.cycles += report.cycles;
        if let Some(iter) = &mut self.iter_stats {
            iter.set_search_time(search_time);
            iter.set_unsafety_eval(report.unsafety_eval);
            iter.set_sampling_time_limit_reached(report.sampling_time_limit_hits);
        }

        info!(count = unsafe_ids.len(), "unsafe states found");
        if unsafe_ids.is_empty() {
            return Ok(Mode::Verification);
        }
        self.stats.unsafe_states_tested += unsafe_ids.len();

        let counterexamples: StateSet = unsafe_ids
            .iter()
            .map(|&id| self.sim.get_state(id))
            .collect();
        self.refine(counterexamples, self.config.approximate_testing());

        Ok(if self.config.alternate {
            Mode::Verification
        } else {
            Mode::Testing
        })
    }

    fn run_verification(&mut self) -> GenResult<Mode> {
        info!("running verification");
        if let Some(iter) = &mut self.iter_stats {
            iter.verification_iteration();
        }

        let searching = Instant::now();
        let counterexamples = self
            .verifier
            .run(&self.start_condition, &self.unsafety_condition)?;
        let search_time = searching.elapsed();
        self.stats.total_verification_time += search_time;
        if let Some(iter) = &mut self.iter_stats {
            iter.set_search_time(search_time);
        }

        if counterexamples.is_empty() {
            return Ok(Mode::CheckStart);
        }
        self.stats.unsafe_states_verified += counterexamples.len();
        self.refine(counterexamples, self.config.approximate_verification());

        Ok(if self.config.use_testing || self.config.alternate {
            Mode::Testing
        } else {
            Mode::Verification
        })
    }

    /// Sample from the refined start condition: a state means a
    /// non-empty safe region (SOLVED), none means the region is empty
    /// (FINISHED).
    fn check_start_condition(&mut self) -> GenResult<Outcome> {
        info!("checking start condition");
        let start_state = self.enumerator.sample_state()?;
        let found = start_state.is_some();
        if let Some(iter) = &mut self.iter_stats {
            iter.set_start_condition_status(found);
        }
        self.flush_iteration_row()?;

        if found {
            info!(start = %self.start_condition, "start condition is safe");
            Ok(Outcome::Solved {
                start_condition: self.start_condition.clone(),
            })
        } else {
            info!("start condition is empty");
            Ok(Outcome::Finished)
        }
    }

    fn refine(&mut self, counterexamples: StateSet, approximate: bool) {
        let refining = Instant::now();
        let Refinement {
            start,
            unsafety,
            box_volume,
            refined_with,
        } = self.strategy.update_conditions(
            &self.start_condition,
            &self.unsafety_condition,
            approximate,
            counterexamples,
        );
        let refine_time = refining.elapsed();
        self.stats.total_refining_time += refine_time;

        if let Some(iter) = &mut self.iter_stats {
            iter.set_refining_time(refine_time);
            iter.set_unsafe_states(refined_with);
            if let Some(volume) = box_volume {
                iter.set_box_size(volume);
            }
        }

        // Replaced atomically at the end of the iteration; the old
        // trees are dropped here.
        self.start_condition = start;
        self.unsafety_condition = unsafety;
    }

    fn flush_iteration_row(&mut self) -> GenResult<()> {
        if let Some(iter) = &mut self.iter_stats {
            iter.flush_row()?;
        }
        Ok(())
    }
}
