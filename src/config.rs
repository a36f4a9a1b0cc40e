//! Runtime configuration: CLI flags with environment-variable fallbacks.

use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "loyaltyd", version, about = "Loyalty-points backend")]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(
        short = 'a',
        long = "address",
        env = "RUN_ADDRESS",
        default_value = "localhost:8081"
    )]
    pub run_addr: String,

    /// Postgres connection string
    #[arg(short = 'd', long = "database-uri", env = "DATABASE_URI")]
    pub database_uri: String,

    /// Base URL of the external accrual service
    #[arg(
        short = 'r',
        long = "accrual-address",
        env = "ACCRUAL_SYSTEM_ADDRESS",
        default_value = "http://localhost:8080"
    )]
    pub accrual_addr: String,

    /// Log level filter (RUST_LOG overrides)
    #[arg(short = 'l', long = "log-level", default_value = "debug")]
    pub log_level: String,

    /// Directory for a rolling log file; stdout only when unset
    #[arg(long = "log-dir")]
    pub log_dir: Option<String>,

    /// Secret used to sign session tokens.
    /// When unset a random per-process secret is generated, so sessions do
    /// not survive a restart.
    #[arg(long = "token-secret", env = "TOKEN_SECRET")]
    pub token_secret: Option<String>,

    /// Session token lifetime, hours
    #[arg(long = "token-ttl-hours", default_value_t = 24)]
    pub token_ttl_hours: u64,

    /// Accrual poll worker pool size
    #[arg(long = "workers", env = "WORKER_POOL_SIZE", default_value_t = 10)]
    pub workers: usize,

    /// Database connection pool size
    #[arg(long = "db-pool-size", env = "DATABASE_POOL_SIZE", default_value_t = 10)]
    pub db_pool_size: u32,

    /// Dispatcher discovery tick, milliseconds
    #[arg(long = "ping-interval-ms", default_value_t = 500)]
    pub ping_interval_ms: u64,

    /// Per-call store deadline, seconds
    #[arg(long = "db-timeout-secs", default_value_t = 15)]
    pub db_timeout_secs: u64,

    /// HTTP graceful-shutdown budget, seconds
    #[arg(long = "shutdown-grace-secs", default_value_t = 5)]
    pub shutdown_grace_secs: u64,

    /// Hard ceiling for the whole shutdown, seconds
    #[arg(long = "shutdown-ceiling-secs", default_value_t = 10)]
    pub shutdown_ceiling_secs: u64,
}

impl Config {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn db_timeout(&self) -> Duration {
        Duration::from_secs(self.db_timeout_secs)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_hours * 3600)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn shutdown_ceiling(&self) -> Duration {
        Duration::from_secs(self.shutdown_ceiling_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_flags() {
        let cfg = Config::try_parse_from([
            "loyaltyd",
            "-a",
            "0.0.0.0:9090",
            "-d",
            "postgres://localhost/loyalty",
            "-r",
            "http://accrual:8080",
            "-l",
            "info",
        ])
        .unwrap();

        assert_eq!(cfg.run_addr, "0.0.0.0:9090");
        assert_eq!(cfg.database_uri, "postgres://localhost/loyalty");
        assert_eq!(cfg.accrual_addr, "http://accrual:8080");
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn defaults_cover_pipeline_knobs() {
        let cfg =
            Config::try_parse_from(["loyaltyd", "-d", "postgres://localhost/loyalty"]).unwrap();

        assert_eq!(cfg.workers, 10);
        assert_eq!(cfg.db_pool_size, 10);
        assert_eq!(cfg.ping_interval(), Duration::from_millis(500));
        assert_eq!(cfg.db_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.token_ttl(), Duration::from_secs(24 * 3600));
        assert_eq!(cfg.shutdown_ceiling(), Duration::from_secs(10));
        assert!(cfg.token_secret.is_none());
    }
}
