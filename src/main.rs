use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, Level};

use track_matcher::{config::Config, pipeline::MashupEngine};

#[derive(Parser)]
#[command(
    name = "track-matcher",
    version,
    about = "Find the best-matching track in a pool and mix it with a reference",
    long_about = "Track-Matcher scores every track in a pool against a reference by timbre, harmony and tempo, then time-stretches the best one to the reference tempo, lines up the first beats and writes the mix."
)]
struct Cli {
    /// Directory containing candidate tracks
    #[arg(short, long)]
    pool: Option<PathBuf>,

    /// Reference track (WAV, MP3, FLAC, OGG, M4A)
    #[arg(short, long)]
    reference: Option<PathBuf>,

    /// Output WAV file path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Largest tempo change allowed, as a fraction (0.15 = ±15%)
    #[arg(long)]
    max_stretch: Option<f32>,

    /// Number of ranked candidates to report
    #[arg(long)]
    top_n: Option<usize>,

    /// Scan the pool on a single thread
    #[arg(long)]
    sequential: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Command-line flags take precedence over the file
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(pool) = &self.pool {
            config.pool_dir = pool.clone();
        }
        if let Some(reference) = &self.reference {
            config.track_a = reference.clone();
        }
        if let Some(output) = &self.output {
            config.out_path = output.clone();
        }
        if let Some(max_stretch) = self.max_stretch {
            config.matching.max_stretch = max_stretch;
        }
        if let Some(top_n) = self.top_n {
            config.matching.top_n = top_n;
        }
        if self.sequential {
            config.matching.parallel_scan = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .init();

    info!("Starting Track-Matcher v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    cli.apply_overrides(&mut config);
    config.validate()?;

    let engine = MashupEngine::new(config);
    let result = match engine.run().await {
        Ok(result) => result,
        Err(e) => {
            error!("{}", e.user_message());
            return Err(e.into());
        }
    };

    println!();
    print!("{}", result.report);
    println!();
    println!("✅  Exported synced mix → {}", result.report.output.display());

    Ok(())
}
