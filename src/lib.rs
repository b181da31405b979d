//! weather-cluster - current-weather HTTP API served by a supervised pool
//! of worker processes.
//!
//! The binary starts as a primary ([`cluster::Supervisor`]), which re-executes
//! itself once per worker slot. Each worker runs [`server::run_server`] on the
//! shared port and proxies lookups to a wttr.in-compatible provider through
//! [`weather::WeatherClient`].

pub mod cli;
pub mod cluster;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod shutdown;
pub mod version;
pub mod weather;
