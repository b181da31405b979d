//! weather-cluster - weather API served by a supervised worker pool

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use owo_colors::{OwoColorize, Stream::Stderr};

use weather_cluster::cli::{Cli, Commands, ServeArgs};
use weather_cluster::cluster::{self, ProcessLauncher, ProcessRole, worker_id_from_env};
use weather_cluster::config::{AppConfig, load_dotenv};
use weather_cluster::error;
use weather_cluster::logging::{self, LogConfig};
use weather_cluster::server::{ServerConfig, run_server};

fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        owo_colors::set_override(false);
    }

    let result = match &cli.command {
        Commands::Serve(args) => cmd_serve(&cli, args),
    };

    if let Err(e) = result {
        eprintln!(
            "{}: {}",
            "error"
                .if_supports_color(Stderr, |text| text.red())
                .if_supports_color(Stderr, |text| text.bold()),
            e
        );
        for cause in e.chain().skip(1) {
            eprintln!(
                "  {}: {}",
                "caused by".if_supports_color(Stderr, |text| text.yellow()),
                cause
            );
        }
        std::process::exit(1);
    }
}

/// Command line values override the environment.
fn resolve_config(args: &ServeArgs) -> AppConfig {
    let mut config = AppConfig::from_env();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(ref host) = args.host {
        config.host = host.clone();
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(ms) = args.restart_delay_ms {
        config.restart_delay = Duration::from_millis(ms);
    }
    if let Some(ref origin) = args.cors_origin {
        config.cors_origin = origin.clone();
    }
    if let Some(ref url) = args.weather_api_url {
        config.weather_api_url = url.clone();
    }
    config
}

fn init_logging(cli: &Cli) {
    let mut log_config = LogConfig::for_verbosity(cli.verbose, cli.quiet)
        .with_ansi(!cli.no_color)
        .with_env_overrides();
    if let Some(format) = cli.log_format {
        log_config = log_config.with_format(format);
    }
    logging::init(log_config);
}

fn cmd_serve(cli: &Cli, args: &ServeArgs) -> Result<()> {
    // `.env` may carry WEATHER_LOG* settings; config fallbacks log at debug.
    let dotenv = load_dotenv();
    init_logging(cli);
    if let Some(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }
    let config = resolve_config(args);
    tracing::debug!(
        addr = %config.bind_addr(),
        environment = %config.environment,
        workers = config.workers,
        restart_delay_ms = config.restart_delay.as_millis() as u64,
        "Resolved configuration"
    );

    if args.single {
        tracing::info!(pid = std::process::id(), "Starting in single-process mode");
        return Ok(run_http(&config, false, None)?);
    }

    let role = ProcessRole::detect(args.internal_worker);
    tracing::debug!(%role, pid = std::process::id(), "Process role detected");

    let mut forwarded = args.forwarded_args();
    forwarded.extend(cli.forwarded_global_args());

    cluster::initialize(
        role,
        config.pool_config(),
        || ProcessLauncher::current_exe(forwarded),
        || run_http(&config, true, worker_id_from_env()),
    )?;

    Ok(())
}

/// Worker entry point: serve HTTP on a fresh runtime until signalled.
fn run_http(config: &AppConfig, reuse_port: bool, worker_id: Option<usize>) -> error::Result<()> {
    let server_config = ServerConfig::from_app_config(config, reuse_port, worker_id);
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_server(server_config))
}
