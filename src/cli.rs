//! Command-line interface definitions using clap.

use clap::{Parser, Subcommand};

use crate::logging::LogFormat;

/// Multi-process weather API server.
#[derive(Parser, Debug)]
#[command(name = "weather-cluster")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    pub quiet: bool,

    /// Log output format: pretty, compact, json.
    #[arg(long, value_parser = parse_log_format, global = true)]
    pub log_format: Option<LogFormat>,

    /// Disable colored output.
    #[arg(long, env = "NO_COLOR", global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the weather API (primary plus worker pool).
    Serve(ServeArgs),
}

/// Arguments for the serve command.
///
/// Every option falls back to its environment variable, then to the
/// built-in default.
#[derive(Parser, Debug, Default, Clone, PartialEq)]
pub struct ServeArgs {
    /// Port to listen on [env: PORT, default: 5000].
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host address to bind to [env: HOST, default: 0.0.0.0].
    #[arg(long)]
    pub host: Option<String>,

    /// Number of worker processes; 0 uses one per CPU [env: WORKERS].
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Delay before a dead worker is replaced [env: RESTART_DELAY_MS, default: 1000].
    #[arg(long, value_name = "MS")]
    pub restart_delay_ms: Option<u64>,

    /// Origin allowed by CORS [env: CORS_ORIGIN, default: http://localhost:5173].
    #[arg(long)]
    pub cors_origin: Option<String>,

    /// Base URL of the weather provider [env: WEATHER_API_URL, default: https://wttr.in].
    #[arg(long)]
    pub weather_api_url: Option<String>,

    /// Serve from this process without spawning workers.
    #[arg(long, conflicts_with = "workers")]
    pub single: bool,

    /// Run as a pool worker (set by the primary when re-executing itself).
    #[arg(long, hide = true)]
    pub internal_worker: bool,
}

impl ServeArgs {
    /// Arguments a primary passes on to the workers it spawns, so command
    /// line overrides reach every process.
    pub fn forwarded_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(port) = self.port {
            args.extend(["--port".to_string(), port.to_string()]);
        }
        if let Some(ref host) = self.host {
            args.extend(["--host".to_string(), host.clone()]);
        }
        if let Some(ref origin) = self.cors_origin {
            args.extend(["--cors-origin".to_string(), origin.clone()]);
        }
        if let Some(ref url) = self.weather_api_url {
            args.extend(["--weather-api-url".to_string(), url.clone()]);
        }
        args
    }
}

impl Cli {
    /// Global flags to pass through to worker processes.
    pub fn forwarded_global_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.verbose > 0 {
            args.push(format!("-{}", "v".repeat(self.verbose as usize)));
        }
        if self.quiet {
            args.push("--quiet".to_string());
        }
        if let Some(format) = self.log_format {
            args.extend(["--log-format".to_string(), format.to_string()]);
        }
        if self.no_color {
            args.push("--no-color".to_string());
        }
        args
    }
}

fn parse_log_format(s: &str) -> Result<LogFormat, String> {
    s.parse()
}
