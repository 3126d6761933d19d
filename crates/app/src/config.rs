//! Configuration
//!
//! Every setting is a `clap` argument with an environment fallback. `.env` is loaded by the
//! binary before parsing.

use std::time::Duration;

use clap::Args;

use crate::sweeper::SweeperSettings;

/// Log output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(
        long,
        env = "LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Compact,
        global = true
    )]
    pub log_format: LogFormat,
}

/// Database connection settings.
#[derive(Debug, Clone, Args)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,
}

/// Unpaid-order sweeper settings.
#[derive(Debug, Clone, Args)]
pub struct SweeperConfig {
    /// Seconds between sweeps
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 180)]
    pub sweep_interval_secs: u64,

    /// Seconds an order may stay unpaid before it is deleted
    #[arg(long, env = "UNPAID_ORDER_LIFETIME_SECS", default_value_t = 1200)]
    pub unpaid_order_lifetime_secs: u64,
}

impl SweeperConfig {
    #[must_use]
    pub fn settings(&self) -> SweeperSettings {
        SweeperSettings {
            interval: Duration::from_secs(self.sweep_interval_secs),
            order_lifetime: Duration::from_secs(self.unpaid_order_lifetime_secs),
        }
    }
}
