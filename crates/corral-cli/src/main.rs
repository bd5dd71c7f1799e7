//! Command-line interface for the corral safe-start generator.

use clap::{Parser, Subcommand};
use corral_gen::{
    ApproximatePhase, ApproximationKind, GenConfig, GenError, Outcome, SafeStartGenerator,
    VerificationMethod,
};
use corral_model::{load_model, ModelError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Exit code for a refined-to-empty start region: distinct from
/// failure, distinct from success.
const EXIT_EMPTY_START: i32 = 2;

#[derive(Debug, Error)]
enum CliError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("{0}")]
    Gen(#[from] GenError),
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "corral", version)]
#[command(about = "Safe-start region generation for policy-controlled models", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a safe start condition for a model
    Generate {
        /// Model file (JSON)
        #[arg(value_name = "MODEL")]
        model: PathBuf,

        /// Verification method: inv_str or scs
        #[arg(long, default_value = "inv_str")]
        method: String,

        /// RNG seed
        #[arg(long, default_value = "0")]
        seed: u64,

        // -- Testing options --
        /// Enable the stochastic testing phase
        #[arg(long, help_heading = "Testing")]
        testing: bool,

        /// Alternate testing and verification after refining steps
        #[arg(long, help_heading = "Testing")]
        alternate: bool,

        /// Seconds per testing invocation
        #[arg(long, default_value = "10", help_heading = "Testing")]
        testing_time: u64,

        /// End a rollout when a transition repeats
        #[arg(long, help_heading = "Testing")]
        terminate_on_cycles: bool,

        /// Log each rollout transition
        #[arg(long, help_heading = "Testing")]
        log_path: bool,

        // -- Policy-run sampling --
        /// Enable distance-biased policy-run sampling
        #[arg(long, help_heading = "Policy-Run Sampling")]
        policy_run_sampling: bool,

        /// Softmax leaf selection instead of greedy
        #[arg(long, help_heading = "Policy-Run Sampling")]
        probabilistic_sampling: bool,

        /// Probability of invoking the sampler per choice point
        #[arg(long, default_value = "0.5", help_heading = "Policy-Run Sampling")]
        sampling_probability: f64,

        /// Expansion depth cap inside the sampler
        #[arg(long, default_value = "100", help_heading = "Policy-Run Sampling")]
        max_run_length: usize,

        // -- Approximation --
        /// Box approximator: over, under, or none
        #[arg(long, default_value = "none", help_heading = "Approximation")]
        approximation: String,

        /// Which phases box counterexamples: testing or both
        #[arg(long, default_value = "testing", help_heading = "Approximation")]
        approximate: String,

        // -- Verification --
        /// Unroll depth of the bounded-reachability engine (scs)
        #[arg(long, default_value = "50", help_heading = "Verification")]
        reach_depth: usize,

        // -- Output --
        /// Write per-iteration statistics to a CSV file
        #[arg(long, value_name = "PATH", help_heading = "Output")]
        iteration_stats: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show a summary of a model file
    Info {
        /// Model file (JSON)
        #[arg(value_name = "MODEL")]
        model: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if matches!(&cli.command, Commands::Generate { verbose: true, .. }) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let result = match cli.command {
        command @ Commands::Generate { .. } => cmd_generate(command),
        Commands::Info { model } => cmd_info(&model),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_generate(command: Commands) -> CliResult<i32> {
    let Commands::Generate {
        model,
        method,
        seed,
        testing,
        alternate,
        testing_time,
        terminate_on_cycles,
        log_path,
        policy_run_sampling,
        probabilistic_sampling,
        sampling_probability,
        max_run_length,
        approximation,
        approximate,
        reach_depth,
        iteration_stats,
        verbose: _,
    } = command
    else {
        unreachable!("cmd_generate called with a non-generate command");
    };

    let config = GenConfig {
        method: method.parse::<VerificationMethod>()?,
        alternate,
        use_testing: testing,
        terminate_on_cycles,
        policy_run_sampling,
        probabilistic_sampling,
        sampling_probability,
        max_run_length,
        testing_time: Duration::from_secs(testing_time),
        approximation: approximation.parse::<ApproximationKind>()?,
        approximate_phase: approximate.parse::<ApproximatePhase>()?,
        iteration_stats,
        log_path,
        seed,
        reach_depth,
    };

    let loaded = load_model(&model)?;
    let mut generator = SafeStartGenerator::new(loaded.model, loaded.policy, config)?;

    match generator.run()? {
        Outcome::Solved { start_condition } => {
            println!("Result: SOLVED");
            println!("Safe start condition: {}", start_condition);
            Ok(0)
        }
        Outcome::Finished => {
            println!("Result: FINISHED (start region is empty)");
            Ok(EXIT_EMPTY_START)
        }
    }
}

fn cmd_info(path: &PathBuf) -> CliResult<i32> {
    let loaded = load_model(path)?;
    let model = &loaded.model;

    println!("Model: {}", model.name);
    println!("  Variables ({}):", model.num_vars());
    for (idx, var) in model.vars().iter().enumerate() {
        println!("    x{}: {} in [{}, {}]", idx, var.name, var.lower, var.upper);
    }
    println!("  Actions ({}):", model.num_actions());
    for label in 0..model.num_actions() {
        let action = model.action(label);
        println!(
            "    {}: {}{} update op(s)",
            action.name,
            if action.learned { "learned, " } else { "" },
            action.updates.len()
        );
    }
    println!("  Start: {}", model.property().start);
    println!("  Unsafety: {}", model.property().unsafety);
    if loaded.policy.network().is_some() {
        println!("  Policy: feedforward network");
    } else {
        println!("  Policy: rule table");
    }
    info!("model summary printed");
    Ok(0)
}
