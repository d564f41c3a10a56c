use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use handprint::{
    BatchStats, FileSource, FingerFactory, Handprint, HandprintConfig, MatchModel, Polynomial,
    PolynomialFingerprint, RabinFingerprint, TableFingerprint,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "handprint", about = "Rabin fingerprinting and near-duplicate file detection")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Commands,
}

/// Parameters that change fingerprint values; echoed with every result.
#[derive(Args, Debug)]
struct Settings {
    /// Fingerprint modulus as a hex bit pattern (default: built-in degree-53 polynomial).
    #[arg(long, global = true)]
    modulus: Option<Polynomial>,
    /// Rolling window of the boundary detector in bytes.
    #[arg(long, global = true, default_value_t = 8)]
    window: usize,
    /// Boundary bit-mask (hex).
    #[arg(long, global = true, default_value = "0xfff", value_parser = parse_hex_u64)]
    mask: u64,
    /// Boundary target pattern (hex).
    #[arg(long, global = true, default_value = "0xabc", value_parser = parse_hex_u64)]
    pattern: u64,
    /// Fingers kept per hand.
    #[arg(long, global = true, default_value_t = 10)]
    hand_size: usize,
    /// Worker threads for `compare` (default: available parallelism).
    #[arg(long, global = true)]
    workers: Option<usize>,
    /// Fingerprint engine.
    #[arg(long, global = true, value_enum, default_value_t = Strategy::Table)]
    strategy: Strategy,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Strategy {
    /// Polynomial arithmetic, any degree.
    Reference,
    /// Lookup tables, degree 8 to 54.
    Table,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a random irreducible polynomial.
    Irreducible {
        /// Degree of the polynomial.
        #[arg(long, default_value_t = 53)]
        degree: usize,
        /// Seed for reproducible output.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the whole-file fingerprint of each file.
    Palm {
        /// Files to fingerprint.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print every content-defined chunk of a file.
    Chunk {
        /// File to chunk.
        file: PathBuf,
    },
    /// Print the hand of a file.
    Hand {
        /// File to sketch.
        file: PathBuf,
    },
    /// Hand similarity of two files.
    Similarity {
        /// First file.
        a: PathBuf,
        /// Second file.
        b: PathBuf,
    },
    /// Classify the files of two directories as exact, partial or non-matches.
    Compare {
        /// First corpus (top-level files only).
        dir_a: PathBuf,
        /// Second corpus (top-level files only).
        dir_b: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("handprint=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.settings.to_config();
    match cli.settings.strategy {
        Strategy::Reference => run::<PolynomialFingerprint>(&config, cli.command),
        Strategy::Table => run::<TableFingerprint>(&config, cli.command),
    }
}

impl Settings {
    fn to_config(&self) -> HandprintConfig {
        let mut config = HandprintConfig {
            window_size: self.window,
            boundary_mask: self.mask,
            boundary_pattern: self.pattern,
            hand_size: self.hand_size,
            ..HandprintConfig::default()
        };
        if let Some(modulus) = &self.modulus {
            config.modulus = modulus.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config
    }
}

fn run<F: RabinFingerprint>(config: &HandprintConfig, command: Commands) -> Result<()> {
    match command {
        Commands::Irreducible { degree, seed } => run_irreducible(degree, seed)?,
        Commands::Palm { files } => {
            let factory = engines::<F>(config)?;
            let sources: Vec<FileSource> = files.into_iter().map(FileSource::new).collect();
            let batch = factory.palms(&sources);
            for (label, palm) in &batch.palms {
                println!("{palm:#016x}\t{label}");
            }
            report_exclusions(&batch.stats);
        }
        Commands::Chunk { file } => {
            let chunks = engines::<F>(config)?
                .chunker()
                .chunk(&FileSource::new(&file))
                .with_context(|| format!("failed to chunk {}", file.display()))?;
            for chunk in &chunks {
                println!("{}\t{}\t{:#016x}", chunk.start, chunk.end, chunk.fingerprint);
            }
            println!("# {} chunks", chunks.len());
        }
        Commands::Hand { file } => {
            let factory = engines::<F>(config)?;
            let handprint = Handprint::new(FileSource::new(&file), factory);
            let hand = handprint
                .hand()
                .with_context(|| format!("failed to handprint {}", file.display()))?;
            for finger in hand {
                println!("{:#016x}\t[{}, {})", finger.fingerprint, finger.start, finger.end);
            }
        }
        Commands::Similarity { a, b } => {
            let factory = engines::<F>(config)?;
            let first = Handprint::new(FileSource::new(&a), Arc::clone(&factory));
            let second = Handprint::new(FileSource::new(&b), factory);
            let score = handprint::similarity(&first, &second).with_context(|| {
                format!("failed to compare {} and {}", a.display(), b.display())
            })?;
            println!("{score:.4}");
        }
        Commands::Compare { dir_a, dir_b } => {
            let factory = engines::<F>(config)?;
            let corpus_a = load_corpus(&dir_a, &factory)?;
            let corpus_b = load_corpus(&dir_b, &factory)?;
            let model = MatchModel::new(config.workers).context("failed to start worker pool")?;
            let report = model.classify(&corpus_a, &corpus_b);

            for m in report.iter() {
                println!("{m}");
            }
            report_exclusions(&report.stats);
        }
    }

    Ok(())
}

/// Validated settings turned into engines; the settings line is printed first
/// so every result can be reproduced.
fn engines<F: RabinFingerprint>(config: &HandprintConfig) -> Result<Arc<FingerFactory<F>>> {
    let factory = FingerFactory::<F>::new(config).context("failed to initialize fingerprint engines")?;
    print_settings(config);
    Ok(Arc::new(factory))
}

fn report_exclusions(stats: &BatchStats) {
    for exclusion in &stats.excluded {
        eprintln!("excluded {}: {}", exclusion.label, exclusion.error);
    }
    println!("# processed {} excluded {}", stats.processed, stats.excluded.len());
}

fn run_irreducible(degree: usize, seed: Option<u64>) -> Result<()> {
    if degree == 0 {
        bail!("irreducible polynomials have degree >= 1");
    }
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let polynomial = Polynomial::random_irreducible(degree, &mut rng);
    println!("{polynomial:#x}");
    println!("{polynomial}");
    Ok(())
}

fn print_settings(config: &HandprintConfig) {
    println!(
        "# modulus={:#x} degree={} window={} mask={:#x} pattern={:#x} hand={}",
        config.modulus,
        config.modulus.degree(),
        config.window_size,
        config.boundary_mask,
        config.boundary_pattern,
        config.hand_size
    );
}

fn load_corpus<F: RabinFingerprint>(
    dir: &Path,
    factory: &Arc<FingerFactory<F>>,
) -> Result<Vec<Arc<Handprint<F>>>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths
        .into_iter()
        .map(|path| Arc::new(Handprint::new(FileSource::new(path), Arc::clone(factory))))
        .collect())
}

fn parse_hex_u64(text: &str) -> Result<u64, String> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).map_err(|err| format!("invalid hex value '{text}': {err}"))
}
