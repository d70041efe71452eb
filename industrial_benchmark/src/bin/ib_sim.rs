// src/bin/ib_sim.rs
//
// Run the industrial benchmark under a fixed policy and optionally record the
// trajectory as JSON Lines.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use industrial_benchmark::config::ENV_PREFIX;
use industrial_benchmark::logging::init_tracing;
use industrial_benchmark::{
    Action, IndustrialBenchmarkDynamics, Properties, TrajectoryRecord, TrajectoryWriter,
};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PolicyArg {
    /// Hold all controls.
    Zero,
    /// Uniform delta actions in [-1, 1].
    Random,
}

#[derive(Debug, Parser)]
#[command(
    name = "ib_sim",
    about = "Industrial benchmark simulator",
    version
)]
struct Args {
    /// Properties file (built-in benchmark configuration when omitted).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of steps after the bootstrap step.
    #[arg(long, default_value_t = 1000)]
    steps: u64,

    /// Overrides SEED from the configuration.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = PolicyArg::Zero)]
    policy: PolicyArg,

    /// Write one JSON record per step to this file.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Verbosity: -v, -vv
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn load_properties(args: &Args) -> Result<Properties> {
    let mut props = match &args.config {
        Some(path) => Properties::from_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => Properties::benchmark_defaults(),
    };
    props.apply_env_overrides(ENV_PREFIX);
    if let Some(seed) = args.seed {
        props.set("SEED", seed);
    }
    Ok(props)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let props = load_properties(&args)?;
    let mut engine =
        IndustrialBenchmarkDynamics::new(props).context("building benchmark dynamics")?;
    let seed = engine.config().seed;

    println!(
        "ib_sim | steps={} | policy={:?} | seed={} | history_len={}",
        args.steps,
        args.policy,
        seed.map_or_else(|| "wall-clock".to_string(), |s| s.to_string()),
        engine.operational_costs_history_len(),
    );

    let mut writer = match &args.out {
        Some(path) => Some(
            TrajectoryWriter::create(path)
                .with_context(|| format!("creating {}", path.display()))?,
        ),
        None => None,
    };

    // Policy noise is independent of the plant's stream.
    let mut policy_rng = ChaCha8Rng::seed_from_u64(seed.unwrap_or(0) ^ 0x9e37_79b9_7f4a_7c15);
    let mut total_reward = 0.0;

    for step in 0..args.steps {
        let action = match args.policy {
            PolicyArg::Zero => Action::zero(),
            PolicyArg::Random => Action::delta(
                policy_rng.gen_range(-1.0..=1.0),
                policy_rng.gen_range(-1.0..=1.0),
                policy_rng.gen_range(-1.0..=1.0),
            ),
        };
        let reward = engine.step(&action)?;
        total_reward += reward;

        if let Some(w) = writer.as_mut() {
            w.write(&TrajectoryRecord {
                step,
                action,
                observation: engine.observable_state(),
                reward,
            })?;
        }
    }

    if let Some(w) = writer {
        let records = w.records_written();
        w.into_inner()?;
        info!(records, "trajectory written");
    }

    let mean_reward = if args.steps > 0 {
        total_reward / args.steps as f64
    } else {
        0.0
    };
    let obs = engine.observable_state();
    println!("mean_reward={mean_reward:.4}");
    println!(
        "final | setpoint={:.3} velocity={:.3} gain={:.3} shift={:.3} fatigue={:.4} consumption={:.4} reward={:.4}",
        obs.set_point,
        obs.velocity,
        obs.gain,
        obs.shift,
        obs.fatigue,
        obs.consumption,
        obs.reward_total,
    );
    Ok(())
}
