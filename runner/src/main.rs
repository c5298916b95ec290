use bloomstat_analysis::Aggregation;
use bloomstat_runner::{
    config::{ConfigErrors, PipelineConfig},
    pipeline,
};
use clap::Parser;
use rayon::ThreadPoolBuilder;
use std::{path::PathBuf, process::ExitCode};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// Aggregate hierarchical bloom filter benchmark results into a YAML report
#[derive(Parser, Debug)]
#[command(name = "bloomstat", version)]
struct Cli {
    /// Directories or files to search for result files, replaces collector.paths
    paths: Vec<PathBuf>,

    /// YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File name glob selecting result files
    #[arg(short, long)]
    glob: Option<String>,

    /// Size of the loader worker pool
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Report destination, stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Database size used for the cross-configuration comparison
    #[arg(long)]
    focus_records: Option<u64>,

    /// How colliding pivot cells are combined (first, mean)
    #[arg(long)]
    aggregation: Option<Aggregation>,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    /// CLI values win over the config file
    fn apply(self, config: &mut PipelineConfig) {
        if !self.paths.is_empty() {
            config.collector.paths = self.paths;
        }
        if let Some(glob) = self.glob {
            config.collector.glob = glob;
        }
        if let Some(threads) = self.threads {
            config.ingest.threads = Some(threads);
        }
        if let Some(output) = self.output {
            config.output.path = Some(output);
        }
        if let Some(focus_records) = self.focus_records {
            config.analysis.focus_records = focus_records;
        }
        if let Some(aggregation) = self.aggregation {
            config.analysis.aggregation = aggregation;
        }
    }
}

fn run(cli: Cli) -> Result<(), ConfigErrors> {
    let mut config = match cli.config {
        Some(ref path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    cli.apply(&mut config);

    if config.preflight_checks() {
        return Err(ConfigErrors::FailedPreflight);
    }

    if let Some(threads) = config.ingest.threads {
        debug!("Starting thread pool with {threads} threads");

        ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    let report = pipeline::run(&config)?;

    pipeline::write_report(&report, config.output.path.as_deref())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // the report may go to stdout, logs always go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error}");
            ExitCode::FAILURE
        }
    }
}
