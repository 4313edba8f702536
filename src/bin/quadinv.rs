//! Command line driver for quadrilateral invariance experiments.
//!
//! Provides:
//! - Synthetic dataset generation
//! - Freshly initialised replicate checkpoints
//! - Evaluation of trained replicates into a TSV summary
//! - A rotation-invariance check for any architecture

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use quad_invariance::core::{
    evaluate, max_rotation_deviation, save_checkpoint, write_results_tsv, Architecture,
    CheckpointTag, EvalConfig, RunSpec,
};
use quad_invariance::nn::{
    seed_for_path, AreaDataset, Head, PointInsideDataset, QuadPairDataset, QuadRegressor,
};
use quad_invariance::{QuadSampler, Result};
use rand::{rngs::StdRng, SeedableRng};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "quadinv")]
#[command(about = "Cyclic-invariant networks for quadrilaterals", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Task {
    /// Quadrilateral and its area
    Area,
    /// Quadrilateral, point and whether the point is inside
    PointInside,
    /// Two quadrilaterals and whether the second is inside the first
    QuadPair,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a synthetic dataset split as JSON
    Generate {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Kind of samples
        #[arg(short, long, value_enum, default_value = "area")]
        task: Task,

        /// Number of samples
        #[arg(short = 'n', long, default_value = "10000")]
        samples: usize,

        /// Half-width of the random translation
        #[arg(long, default_value = "0.0")]
        shift: f32,

        /// Random seed; derived from the output path when omitted
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Write freshly initialised checkpoints for the replicates of a run
    Init {
        /// Run name, e.g. my_inv_conv or avg_fc
        #[arg(short, long)]
        run: String,

        /// Directory holding the replicate directories
        #[arg(short, long, default_value = "./working_dir/area")]
        working_dir: PathBuf,

        /// Width of the last hidden layer
        #[arg(short = 'n', long, default_value = "32")]
        num_features: usize,

        /// Number of replicates
        #[arg(long, default_value = "9")]
        replicas: usize,

        /// Random seed of the first replicate
        #[arg(short, long, default_value = "444")]
        seed: u64,
    },

    /// Evaluate trained replicates and write the TSV summary
    Eval {
        /// JSON evaluation config
        #[arg(short, long)]
        config: PathBuf,

        /// Override the output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Report how far an architecture's output moves under vertex relabelling
    Check {
        /// Run name, e.g. message_passing
        #[arg(short, long)]
        run: String,

        /// Width of the last hidden layer
        #[arg(short = 'n', long, default_value = "32")]
        num_features: usize,

        /// Number of random quadrilaterals
        #[arg(long, default_value = "256")]
        samples: usize,

        /// Random seed
        #[arg(short, long, default_value = "444")]
        seed: u64,
    },
}

fn generate(output: PathBuf, task: Task, samples: usize, shift: f32, seed: Option<u64>) -> Result<()> {
    let seed = seed.unwrap_or_else(|| seed_for_path(&output));
    let sampler = QuadSampler::default().with_shift(shift);
    match task {
        Task::Area => AreaDataset::generate(samples, &sampler, seed)?.save(&output)?,
        Task::PointInside => PointInsideDataset::generate(samples, &sampler, seed)?.save(&output)?,
        Task::QuadPair => QuadPairDataset::generate(samples, &sampler, seed)?.save(&output)?,
    }
    info!("wrote {} samples to {} (seed {})", samples, output.display(), seed);
    Ok(())
}

fn init(run: &str, working_dir: PathBuf, num_features: usize, replicas: usize, seed: u64) -> Result<()> {
    let run_spec = RunSpec::from_name(run, num_features)?;
    let base = working_dir.join(&run_spec.name);
    for replicate in 1..=replicas {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add(replicate as u64));
        let model = run_spec.architecture.build(Head::Regression, &mut rng)?;
        for tag in [CheckpointTag::Best, CheckpointTag::Last] {
            let path = save_checkpoint(&model, &base, replicate, tag, 0)?;
            info!("wrote {}", path.display());
        }
    }
    Ok(())
}

fn eval(config: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let mut config = EvalConfig::from_file(&config)?;
    if let Some(output) = output {
        config.output = output;
    }
    let results = evaluate(&config)?;
    write_results_tsv(&results, &config.output)?;
    info!("wrote {} rows to {}", results.len(), config.output.display());
    Ok(())
}

fn check(run: &str, num_features: usize, samples: usize, seed: u64) -> Result<()> {
    let architecture = Architecture::from_run_name(run, num_features)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let model = architecture.build(Head::Regression, &mut rng)?;
    let sampler = QuadSampler::default();
    let quads: Vec<_> = (0..samples).map(|_| sampler.sample(&mut rng)).collect();

    let deviation = max_rotation_deviation(&model, &quads)?;
    println!(
        "{}\t{}\tinvariant by construction: {}\tmax deviation: {:.3e}",
        run,
        model.architecture().kind(),
        architecture.is_cyclic_invariant(),
        deviation
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            output,
            task,
            samples,
            shift,
            seed,
        } => generate(output, task, samples, shift, seed),
        Commands::Init {
            run,
            working_dir,
            num_features,
            replicas,
            seed,
        } => init(&run, working_dir, num_features, replicas, seed),
        Commands::Eval { config, output } => eval(config, output),
        Commands::Check {
            run,
            num_features,
            samples,
            seed,
        } => check(&run, num_features, samples, seed),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
