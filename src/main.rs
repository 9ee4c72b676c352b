#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Instant;

use kinship::dosage::SkipReason;
use kinship::{
    GenotypeProbabilities, KinshipConfig, KinshipError, KinshipObserver, LogObserver,
    RankUpdateKernel, Strategy, VariantId, VariantStream, WorkerKind, compute_kinship,
};

#[derive(Parser)]
#[command(
    name = "kinship",
    about = "Block-parallel kinship matrix accumulation",
    long_about = "Streams genotype probabilities variant by variant and accumulates the \
                 sample-by-sample kinship matrix across a pool of worker threads."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Accumulate kinship over a simulated cohort and report timing and summary statistics
    Simulate(SimulateArgs),

    /// Write the default configuration as TOML
    InitConfig {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

#[derive(Args)]
struct SimulateArgs {
    /// Number of samples in the simulated cohort
    #[arg(long, default_value = "500")]
    samples: usize,

    /// Number of variants to stream
    #[arg(long, default_value = "2000")]
    variants: usize,

    /// Seed for the cohort generator
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Probability that a genotype is uncertain and falls below the call threshold
    #[arg(long, default_value = "0.01")]
    missing_rate: f64,

    /// TOML configuration file; command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    strategy: Option<Strategy>,

    #[arg(long, value_enum)]
    kernel: Option<RankUpdateKernel>,

    #[arg(long, value_enum)]
    worker: Option<WorkerKind>,

    /// Worker threads; 0 runs every task inline
    #[arg(long)]
    threads: Option<usize>,

    /// Target number of blocks for the blockwise strategy
    #[arg(long)]
    block_target: Option<usize>,
}

impl SimulateArgs {
    fn resolve_config(&self) -> Result<KinshipConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => KinshipConfig::load(path)?,
            None => KinshipConfig::default(),
        };
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(kernel) = self.kernel {
            config.kernel = kernel;
        }
        if let Some(kind) = self.worker {
            config.worker.kind = kind;
        }
        if let Some(threads) = self.threads {
            config.worker.threads = threads;
        }
        if self.block_target.is_some() {
            config.block_target = self.block_target;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Unrelated samples under Hardy-Weinberg proportions, with a fraction of genotypes made
/// uncertain.
struct SimulatedCohort {
    rng: StdRng,
    seed: u64,
    n_samples: usize,
    n_variants: usize,
    missing_rate: f64,
    emitted: usize,
}

impl SimulatedCohort {
    fn new(seed: u64, n_samples: usize, n_variants: usize, missing_rate: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
            n_samples,
            n_variants,
            missing_rate: missing_rate.clamp(0.0, 1.0),
            emitted: 0,
        }
    }
}

impl VariantStream for SimulatedCohort {
    type Error = KinshipError;

    fn number_of_samples(&self) -> usize {
        self.n_samples
    }

    fn number_of_variants(&self) -> Option<usize> {
        Some(self.n_variants)
    }

    fn reset(&mut self) -> Result<(), Self::Error> {
        self.rng = StdRng::seed_from_u64(self.seed);
        self.emitted = 0;
        Ok(())
    }

    fn next_variant(&mut self) -> Result<Option<(VariantId, GenotypeProbabilities)>, Self::Error> {
        if self.emitted >= self.n_variants {
            return Ok(None);
        }
        self.emitted += 1;
        let frequency: f64 = self.rng.gen_range(0.005..0.5);
        let mut probabilities = Array2::<f64>::zeros((self.n_samples, 3));
        for mut row in probabilities.rows_mut() {
            let genotype = usize::from(self.rng.gen_bool(frequency))
                + usize::from(self.rng.gen_bool(frequency));
            if self.rng.gen_bool(self.missing_rate) {
                row.fill(1.0 / 3.0);
            } else {
                row.fill(0.01);
                row[genotype] = 0.98;
            }
        }
        let position = self.emitted as u64;
        let id = VariantId::new("1", position, format!("sim{position}"));
        Ok(Some((id, GenotypeProbabilities::from_array(probabilities)?)))
    }
}

fn create_progress_bar(len: u64, message: &str) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };
    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    pb.set_style(
        ProgressStyle::with_template(
            "\n> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )?
        .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    pb.set_message(message.to_string());
    Ok(pb)
}

/// Drives a progress bar from the engine thread and forwards everything else to the log.
struct ProgressObserver {
    bar: ProgressBar,
    log: LogObserver,
}

impl KinshipObserver for ProgressObserver {
    fn on_begin(&self, strategy: Strategy, n_samples: usize, partitions: usize) {
        self.log.on_begin(strategy, n_samples, partitions);
    }

    fn on_variant_received(&self, variant: &VariantId, received: usize) {
        let _ = variant;
        self.bar.set_position(received as u64);
    }

    fn on_variant_skipped(&self, variant: &VariantId, reason: SkipReason) {
        self.log.on_variant_skipped(variant, reason);
    }

    fn on_finish(&self, variants_included: usize, variants_skipped: usize) {
        self.bar.finish_with_message("done");
        self.log.on_finish(variants_included, variants_skipped);
    }
}

fn run_simulate(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.resolve_config()?;
    let worker = config.worker.spawn()?;
    let mut cohort = SimulatedCohort::new(args.seed, args.samples, args.variants, args.missing_rate);
    let observer = Arc::new(ProgressObserver {
        bar: create_progress_bar(args.variants as u64, "Accumulating kinship")?,
        log: LogObserver,
    });

    log::info!(
        "Simulating {} samples x {} variants (seed {}), strategy {:?}, kernel {:?}, {} worker thread(s)",
        args.samples,
        args.variants,
        args.seed,
        config.strategy,
        config.kernel,
        worker.number_of_worker_threads()
    );

    let started = Instant::now();
    let matrix = compute_kinship(&config, Arc::clone(&worker), &mut cohort, observer)?;
    let elapsed = started.elapsed();

    log::info!("Accumulation took {:.3}s", elapsed.as_secs_f64());
    log::info!("{}", matrix.summary());
    log::debug!("{}", worker.summary_of_work_so_far().trim_end());
    println!("{}", matrix.description());
    println!("{}", matrix.summary());
    Ok(())
}

fn run_init_config(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    KinshipConfig::default().save(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Simulate(args)) => run_simulate(args),
        Some(Commands::InitConfig { path }) => run_init_config(path),
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
