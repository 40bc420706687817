//! Command-line interface for the replication toolkit.

use mimic::config::ReplicationFileConfig;
use mimic::data::{load_attributes, load_benchmark, load_caps, load_returns, DataConfig};
use mimic::engine::ReplicationEngine;
use mimic::error::{ReplicationError, Result};
use mimic::export::{
    export_combined_csv, export_correlations_csv, export_result_json, ExportConfig,
};
use mimic::marketcap::{CachedCapProvider, CapProvider, LiveCapProvider};
use mimic::report::ResultFormatter;
use mimic::solver::AmplRunner;
use mimic::strategies::{AttributeStrategy, MaxCorrStrategy, RandomStrategy};
use mimic::strategy::Strategy;

use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Mimic - an index-replication backtesting toolkit.
#[derive(Parser)]
#[command(name = "mimic")]
#[command(author = "Johan")]
#[command(version = "0.1.0")]
#[command(about = "Backtest sparse index-tracking portfolios against a reference index")]
#[command(long_about = None)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a replication backtest over a (q, m) grid
    Run {
        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Wide returns CSV (overrides the config file)
        #[arg(short, long)]
        returns: Option<PathBuf>,

        /// Benchmark returns CSV (overrides the config file)
        #[arg(short, long)]
        benchmark: Option<PathBuf>,

        /// Ticker attribute CSV (needed by the attribute strategy)
        #[arg(short, long)]
        attributes: Option<PathBuf>,

        /// Cached market caps CSV
        #[arg(long)]
        caps: Option<PathBuf>,

        /// Strategy to use
        #[arg(short = 'S', long, value_enum, default_value = "max-corr")]
        strategy: StrategyType,

        /// Comma-separated list of q values (overrides the config file)
        #[arg(short, long)]
        q: Option<String>,

        /// Comma-separated list of m values (overrides the config file)
        #[arg(short, long)]
        m: Option<String>,

        /// Seed for the random baseline
        #[arg(long)]
        seed: Option<u64>,

        /// Write the combined return-series table to this CSV
        #[arg(long)]
        export_combined: Option<PathBuf>,

        /// Write per-configuration correlations to this CSV
        #[arg(long)]
        export_correlations: Option<PathBuf>,

        /// Write the full result to this JSON file
        #[arg(long)]
        export_json: Option<PathBuf>,
    },

    /// Validate a returns data file
    Validate {
        /// Path to a wide returns CSV
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Generate an example configuration file
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = "replication.toml")]
        output: PathBuf,
    },

    /// Fetch live market caps for the universe and cache them to CSV
    FetchCaps {
        /// Wide returns CSV defining the ticker universe
        #[arg(short, long)]
        returns: PathBuf,

        /// Output CSV path
        #[arg(short, long, default_value = "market_caps.csv")]
        output: PathBuf,

        /// Override the provider base URL
        #[arg(long)]
        base_url: Option<String>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Csv,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    MaxCorr,
    Attribute,
    Random,
}

impl Cli {
    /// Initialize logging based on verbosity level.
    pub fn init_logging(&self) {
        let level = match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };

        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
    }
}

/// Parse a comma-separated list of positive integers.
fn parse_list(s: &str) -> Result<Vec<usize>> {
    s.split(',')
        .map(|tok| {
            tok.trim().parse::<usize>().map_err(|_| {
                ReplicationError::InvalidInput(format!("Bad list entry '{}'", tok.trim()))
            })
        })
        .collect()
}

/// Run the CLI application.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    cli.init_logging();

    match &cli.command {
        Commands::Run {
            config,
            returns,
            benchmark,
            attributes,
            caps,
            strategy,
            q,
            m,
            seed,
            export_combined,
            export_correlations,
            export_json,
        } => run_backtest(
            &cli,
            config.as_deref(),
            returns.as_deref(),
            benchmark.as_deref(),
            attributes.as_deref(),
            caps.as_deref(),
            *strategy,
            q.as_deref(),
            m.as_deref(),
            *seed,
            export_combined.as_deref(),
            export_correlations.as_deref(),
            export_json.as_deref(),
        ),
        Commands::Validate { data } => validate_data(data),
        Commands::Init { output } => init_config(output),
        Commands::FetchCaps {
            returns,
            output,
            base_url,
        } => fetch_caps(returns, output, base_url.clone()),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_backtest(
    cli: &Cli,
    config_path: Option<&std::path::Path>,
    returns_path: Option<&std::path::Path>,
    benchmark_path: Option<&std::path::Path>,
    attributes_path: Option<&std::path::Path>,
    caps_path: Option<&std::path::Path>,
    strategy_type: StrategyType,
    q_list: Option<&str>,
    m_list: Option<&str>,
    seed: Option<u64>,
    export_combined: Option<&std::path::Path>,
    export_correlations: Option<&std::path::Path>,
    export_json_path: Option<&std::path::Path>,
) -> Result<()> {
    let mut file_config = match config_path {
        Some(path) => ReplicationFileConfig::load(path)?,
        None => ReplicationFileConfig::default(),
    };

    // CLI flags override the config file.
    if let Some(p) = returns_path {
        file_config.data.returns = Some(p.display().to_string());
    }
    if let Some(p) = benchmark_path {
        file_config.data.benchmark = Some(p.display().to_string());
    }
    if let Some(p) = attributes_path {
        file_config.data.attributes = Some(p.display().to_string());
    }
    if let Some(p) = caps_path {
        file_config.caps.path = Some(p.display().to_string());
    }
    if let Some(qs) = q_list {
        file_config.grid.qs = parse_list(qs)?;
    }
    if let Some(ms) = m_list {
        file_config.grid.ms = parse_list(ms)?;
    }
    if let Some(s) = seed {
        file_config.engine.seed = s;
    }
    file_config.validate()?;

    let data_config = DataConfig {
        date_format: file_config.data.date_format.clone(),
        ..Default::default()
    };

    let returns_file = file_config.data.returns.clone().ok_or_else(|| {
        ReplicationError::ConfigError("No returns file given (flag or config)".to_string())
    })?;
    let benchmark_file = file_config.data.benchmark.clone().ok_or_else(|| {
        ReplicationError::ConfigError("No benchmark file given (flag or config)".to_string())
    })?;

    let table = load_returns(&returns_file, &data_config)?;
    let bench = load_benchmark(
        &benchmark_file,
        &file_config.data.benchmark_column,
        &file_config.data.benchmark_label,
        &data_config,
    )?;

    let cap_provider: Box<dyn CapProvider> = match file_config.caps.provider.as_str() {
        "live" => {
            let provider = match &file_config.caps.base_url {
                Some(url) => LiveCapProvider::new_with_base_url(url.clone())?,
                None => LiveCapProvider::new()?,
            };
            Box::new(provider)
        }
        _ => {
            let path = file_config.caps.path.clone().ok_or_else(|| {
                ReplicationError::ConfigError(
                    "Cached cap provider needs caps.path (or --caps)".to_string(),
                )
            })?;
            Box::new(CachedCapProvider::new(load_caps(&path, &data_config)?))
        }
    };

    let mut engine = ReplicationEngine::new(
        file_config.engine_config(),
        table,
        bench,
        cap_provider,
    );

    if let Some(path) = &file_config.data.attributes {
        engine = engine.with_attributes(load_attributes(path, &data_config)?);
    }

    let runner = AmplRunner::new(file_config.solver_config());
    let mut strategy: Box<dyn Strategy> = match strategy_type {
        StrategyType::MaxCorr => Box::new(MaxCorrStrategy::new(runner)),
        StrategyType::Attribute => {
            Box::new(AttributeStrategy::new(runner, file_config.targets.clone()))
        }
        StrategyType::Random => Box::new(RandomStrategy::new(file_config.engine.seed)),
    };

    let grid = file_config.grid.points();
    info!("Sweeping {} grid points", grid.len());

    let result = engine.run(strategy.as_mut(), &grid)?;

    match cli.output {
        OutputFormat::Text => ResultFormatter::print_report(&result),
        OutputFormat::Json => println!("{}", ResultFormatter::to_json(&result)),
        OutputFormat::Csv => print!("{}", ResultFormatter::to_csv(&result)),
    }

    let export_config = ExportConfig::default();
    if let Some(path) = export_combined {
        export_combined_csv(&result.combined, path, &export_config)?;
    }
    if let Some(path) = export_correlations {
        export_correlations_csv(&result, path, &export_config)?;
    }
    if let Some(path) = export_json_path {
        export_result_json(&result, path)?;
    }

    Ok(())
}

fn validate_data(data_path: &PathBuf) -> Result<()> {
    println!("Validating data file: {}", data_path.display());

    let table = load_returns(data_path, &DataConfig::default())?;

    println!("\nData Summary:");
    println!("  Rows: {}", table.n_rows());
    println!("  Tickers: {}", table.n_tickers());
    println!("  Start: {}", table.dates().first().unwrap());
    println!("  End: {}", table.dates().last().unwrap());

    let mut nan_cells = 0usize;
    for i in 0..table.n_rows() {
        nan_cells += table.row(i).iter().filter(|v| !v.is_finite()).count();
    }
    let total_cells = table.n_rows() * table.n_tickers();
    println!(
        "  Missing cells: {} of {} ({:.2}%)",
        nan_cells,
        total_cells,
        100.0 * nan_cells as f64 / total_cells.max(1) as f64
    );

    println!("\nValidation: PASSED");
    Ok(())
}

fn init_config(output: &PathBuf) -> Result<()> {
    let config = ReplicationFileConfig::example();
    config.save(output)?;
    println!("Wrote example configuration to {}", output.display());
    println!("Edit the data paths, then run:");
    println!("  mimic run --config {}", output.display());
    Ok(())
}

fn fetch_caps(returns: &PathBuf, output: &PathBuf, base_url: Option<String>) -> Result<()> {
    let table = load_returns(returns, &DataConfig::default())?;
    let universe = table.tickers().to_vec();
    println!("Fetching market caps for {} tickers...", universe.len());

    let provider = match base_url {
        Some(url) => LiveCapProvider::new_with_base_url(url)?,
        None => LiveCapProvider::new()?,
    };
    let caps = provider.caps_for(&universe);

    let file = File::create(output)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "Ticker,MarketCap")?;
    for ticker in &universe {
        writeln!(writer, "{},{}", ticker, caps.get(ticker).copied().unwrap_or(0.0))?;
    }
    writer.flush()?;

    let resolved = caps.values().filter(|c| **c > 0.0).count();
    println!(
        "Wrote {} caps ({} resolved, {} missing) to {}",
        universe.len(),
        resolved,
        universe.len() - resolved,
        output.display()
    );
    Ok(())
}
