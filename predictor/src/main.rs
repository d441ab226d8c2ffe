//! Headroom daemon entry point
//!
//! Samples the current process on a fixed period and logs a risk report on
//! every tick, or runs a single evaluation on demand.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::signal;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use headroom_predictor::{
    report, MetricsSource, PredictionEngine, PredictionMetrics, PredictorConfig, PredictorError, SamplingScheduler,
    SysinfoSource, SystemClock,
};

/// Delay between a priming sample and the measured one, so CPU load is known
const CPU_PRIMING_DELAY: Duration = Duration::from_millis(250);

/// Headroom command line interface
#[derive(Parser)]
#[command(name = "headroom")]
#[command(about = "Predicts resource exhaustion of the running process before it happens")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (overrides the configuration file)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Run the sampling scheduler until SIGINT/SIGTERM
    Run,

    /// Evaluate once and print the prediction
    Predict {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = PredictFormat::Json)]
        format: PredictFormat,
    },

    /// Print a compact health summary
    Health,

    /// Print the throttling recommendation
    Throttle,

    /// Validate configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Show thresholds as flat keys
        #[arg(long)]
        flat: bool,
    },

    /// Sample a few times and export metrics
    Metrics {
        /// Number of evaluations
        #[arg(short, long, default_value_t = 3)]
        samples: u32,

        /// Output format (prometheus, json)
        #[arg(short, long, default_value = "prometheus")]
        format: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PredictFormat {
    Json,
    Report,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            process::exit(1);
        }
    };

    if let Err(e) = initialize_logging(&cli, &config) {
        eprintln!("Failed to initialize logging: {:#}", e);
        process::exit(1);
    }

    let result = match cli.command {
        Some(Commands::Run) | None => run(config).await,
        Some(Commands::Predict { format }) => predict(config, format).await,
        Some(Commands::Health) => health(config).await,
        Some(Commands::Throttle) => throttle(config).await,
        Some(Commands::Config { show, flat }) => handle_config(&config, show, flat),
        Some(Commands::Metrics { samples, format }) => export_metrics(config, samples, &format).await,
    };

    if let Err(e) = result {
        match e.downcast_ref::<PredictorError>() {
            Some(predictor_error) => error!(
                category = predictor_error.category(),
                recoverable = predictor_error.is_recoverable(),
                "Command failed: {:#}",
                e
            ),
            None => error!("Command failed: {:#}", e),
        }
        process::exit(1);
    }
}

/// Initialize logging from the command line, falling back to the configuration
fn initialize_logging(cli: &Cli, config: &PredictorConfig) -> Result<()> {
    let requested = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let log_level = match requested.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("headroom_predictor={}", log_level).parse()?)
        .add_directive(format!("headroom={}", log_level).parse()?)
        .add_directive("tokio=warn".parse()?);

    if cli.json_logs || config.logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }

    Ok(())
}

/// Defaults, then the config file (explicit or default location), then `HEADROOM_*` variables
fn load_configuration(cli: &Cli) -> Result<PredictorConfig> {
    let path = match &cli.config {
        Some(path) => {
            if !path.exists() {
                bail!("Configuration file not found: {}", path.display());
            }
            Some(path.clone())
        }
        None => PredictorConfig::default_config_path().ok(),
    };

    PredictorConfig::load_with_fallback(path).context("invalid configuration")
}

fn build_engine(config: &PredictorConfig) -> headroom_predictor::Result<(Arc<SysinfoSource>, Arc<PredictionEngine>)> {
    let source = Arc::new(SysinfoSource::new(config.source)?);
    let mut engine = PredictionEngine::new(config, source.clone(), Arc::new(SystemClock));

    if config.metrics.enabled {
        let metrics = PredictionMetrics::new(&config.metrics)?;
        engine = engine.with_metrics(Arc::new(metrics));
    }

    Ok((source, Arc::new(engine)))
}

/// Build an engine whose source has already taken one sample
async fn primed_engine(config: &PredictorConfig) -> headroom_predictor::Result<Arc<PredictionEngine>> {
    let (source, engine) = build_engine(config)?;
    if source.collect().is_ok() {
        tokio::time::sleep(CPU_PRIMING_DELAY).await;
    }
    Ok(engine)
}

async fn run(config: PredictorConfig) -> Result<()> {
    info!("Starting Headroom predictor");

    let (_, engine) = build_engine(&config)?;
    let scheduler = SamplingScheduler::from_config(engine.clone(), &config.sampling);
    scheduler.start().map_err(PredictorError::from)?;

    wait_for_shutdown().await?;

    info!("Initiating graceful shutdown");
    scheduler.stop().await.map_err(PredictorError::from)?;

    if let Some(metrics) = engine.metrics() {
        let stats = metrics.stats();
        info!(
            evaluations = stats.evaluations,
            unavailable = stats.unavailable_samples,
            failed_ticks = stats.failed_ticks,
            throttling = stats.throttling_verdicts,
            "Headroom predictor stopped"
        );
    }

    Ok(())
}

async fn predict(config: PredictorConfig, format: PredictFormat) -> Result<()> {
    let engine = primed_engine(&config).await?;
    let prediction = engine.evaluate();

    match format {
        PredictFormat::Json => println!("{}", serde_json::to_string_pretty(&prediction)?),
        PredictFormat::Report => match &prediction.current_metrics {
            Some(snapshot) => {
                println!("{}", report::build_report(snapshot, &prediction));
                for warning in &prediction.warnings {
                    println!("WARNING: {}", warning);
                }
                for issue in &prediction.critical_issues {
                    println!("CRITICAL: {}", issue);
                }
            }
            None => println!("Metrics unavailable, prediction level {}", prediction.level),
        },
    }

    Ok(())
}

async fn health(config: PredictorConfig) -> Result<()> {
    let engine = primed_engine(&config).await?;
    let summary = engine.evaluate().health_summary();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn throttle(config: PredictorConfig) -> Result<()> {
    let engine = primed_engine(&config).await?;
    let signal = engine.evaluate().throttle_signal();
    println!("{}", serde_json::to_string_pretty(&signal)?);
    Ok(())
}

fn handle_config(config: &PredictorConfig, show: bool, flat: bool) -> Result<()> {
    config.validate()?;

    if show {
        println!("Effective configuration:");
        println!("{}", toml::to_string_pretty(config)?);
    }
    if flat {
        for (key, value) in config.to_flat_map() {
            println!("{} = {}", key, value);
        }
    }
    if !show && !flat {
        println!("Configuration is valid");
    }

    Ok(())
}

async fn export_metrics(mut config: PredictorConfig, samples: u32, format: &str) -> Result<()> {
    config.metrics.enabled = true;
    let engine = primed_engine(&config).await?;

    for i in 0..samples.max(1) {
        if i > 0 {
            tokio::time::sleep(CPU_PRIMING_DELAY).await;
        }
        engine.evaluate();
    }

    let metrics = engine
        .metrics()
        .ok_or_else(|| PredictorError::Generic("metrics registry missing".to_string()))?;
    println!("{}", metrics.export(format).map_err(PredictorError::from)?);
    Ok(())
}

/// Handle shutdown signals
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, initiating graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl-C, initiating graceful shutdown");
    }

    Ok(())
}
