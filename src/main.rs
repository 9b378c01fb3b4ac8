use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use sunrise::config::{Config, DEFAULT_CONFIG_PATH};
use sunrise::monitor::FaultCategory;
use sunrise::supervisor::Supervisor;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "sunrise")]
#[command(about = "Keeps a streaming host alive by watching its log", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Validate the configuration, print a summary and exit
    #[arg(long)]
    check: bool,
}

fn main() {
    let cli = Cli::parse();
    initialize_logging(&cli.log_level);

    if let Err(e) = run(cli) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn initialize_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)
        .with_context(|| format!("cannot start with config {}", cli.config.display()))?;

    if cli.check {
        print_summary(&cli.config, &config);
        return Ok(());
    }

    ctrlc::set_handler(|| {
        info!("shutdown signal received; exiting");
        std::process::exit(0);
    })
    .context("failed to install signal handler")?;

    info!(
        config = %cli.config.display(),
        log = %config.sunshine_log_path.display(),
        interval_secs = config.sunrise_check_seconds,
        monitor_patterns = ?config.patterns(FaultCategory::MonitorSleep).iter().collect::<Vec<_>>(),
        encoder_patterns = ?config.patterns(FaultCategory::EncoderFailure).iter().collect::<Vec<_>>(),
        restart_on_encoder_failure = config.restart_on_encoder_failure,
        "starting sunrise"
    );

    Supervisor::new(Arc::new(config))
        .run()
        .context("supervisor stopped")
}

fn print_summary(path: &std::path::Path, config: &Config) {
    println!("Configuration OK: {}", path.display());
    println!("  log file:             {}", config.sunshine_log_path.display());
    println!("  check interval:       {}s", config.sunrise_check_seconds);
    println!("  service / process:    {} / {}", config.service_name, config.process_name);
    println!("  ready marker:         {}", config.ready_log_line);
    for pattern in config.patterns(FaultCategory::MonitorSleep).iter() {
        println!("  monitor-sleep line:   {pattern}");
    }
    for pattern in config.patterns(FaultCategory::EncoderFailure).iter() {
        println!("  encoder-failure line: {pattern}");
    }
    println!("  restart on encoder:   {}", config.restart_on_encoder_failure);
    println!("  restart after wake:   {}", config.enable_sunshine_restart);
    println!("  wake cooldown:        {}s", config.wake_cooldown_seconds);
}
