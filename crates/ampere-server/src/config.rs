//! Configuration management for the Ampere server
//!
//! Sources, lowest precedence first:
//! 1. the YAML file (`conf/application.yml` unless `--config` says otherwise)
//! 2. `AMPERE__`-prefixed environment variables, `__` separating key segments
//!    (`AMPERE__DB__URL` sets `ampere.db.url`)
//! 3. command line flags

use std::time::Duration;

use ampere_notify::RetryPolicy;
use anyhow::Context;
use clap::Parser;
use config::{Config, ConfigError, Environment};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use crate::startup::LoggingConfig;

pub const DEFAULT_CONFIG_FILE: &str = "conf/application.yml";
pub const DEFAULT_SERVER_PORT: u16 = 8090;

const SERVER_ADDRESS: &str = "ampere.server.address";
const SERVER_PORT: &str = "ampere.server.port";
const DB_URL: &str = "ampere.db.url";
const DB_MAX_CONNECTIONS: &str = "ampere.db.max_connections";
const DB_INIT_SCHEMA: &str = "ampere.db.init_schema";
const DB_TOKEN_URL: &str = "ampere.db.token_url";
const DB_TOKEN_REFRESH_SECS: &str = "ampere.db.token_refresh_secs";
const NOTIFICATION_WORKERS: &str = "ampere.notification.workers";
const NOTIFICATION_QUEUE_CAPACITY: &str = "ampere.notification.queue_capacity";
const NOTIFICATION_TIMEOUT_MS: &str = "ampere.notification.timeout_ms";
const NOTIFICATION_DRAIN_TIMEOUT_MS: &str = "ampere.notification.drain_timeout_ms";
const METRICS_ENABLED: &str = "ampere.metrics.enabled";

/// Command line arguments for the server
#[derive(Debug, Parser)]
#[command(name = "ampere-server", version)]
pub struct Cli {
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,
    #[arg(long = "db-url", env = "DATABASE_URL")]
    pub database_url: Option<String>,
    #[arg(short = 'w', long = "workers")]
    pub workers: Option<u32>,
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(args: Cli) -> Result<Self, ConfigError> {
        let mut config_builder = Config::builder()
            .add_source(config::File::with_name(&args.config).required(false))
            .add_source(
                Environment::with_prefix("AMPERE")
                    .prefix_separator("__")
                    .separator("__")
                    .keep_prefix(true)
                    .try_parsing(true),
            );

        if let Some(v) = args.database_url {
            config_builder = config_builder.set_override(DB_URL, v)?;
        }
        if let Some(v) = args.workers {
            config_builder = config_builder.set_override(NOTIFICATION_WORKERS, i64::from(v))?;
        }

        Ok(Configuration {
            config: config_builder.build()?,
        })
    }

    // ========================================================================
    // Server
    // ========================================================================

    pub fn server_address(&self) -> String {
        self.config
            .get_string(SERVER_ADDRESS)
            .unwrap_or("0.0.0.0".to_string())
    }

    /// Listen port; values outside `u16` fall back to the default
    pub fn server_port(&self) -> u16 {
        self.config
            .get_int(SERVER_PORT)
            .ok()
            .and_then(|port| u16::try_from(port).ok())
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn metrics_enabled(&self) -> bool {
        self.config.get_bool(METRICS_ENABLED).unwrap_or(true)
    }

    // ========================================================================
    // Database
    // ========================================================================

    pub fn db_url(&self) -> Result<String, ConfigError> {
        self.config.get_string(DB_URL)
    }

    pub fn db_max_connections(&self) -> u32 {
        self.config.get_int(DB_MAX_CONNECTIONS).unwrap_or(10).max(1) as u32
    }

    /// Create the tracked, archive and subscription tables at start-up
    pub fn db_init_schema(&self) -> bool {
        self.config.get_bool(DB_INIT_SCHEMA).unwrap_or(false)
    }

    /// Endpoint issuing short-lived database credentials, if any
    pub fn db_token_url(&self) -> Option<String> {
        self.config
            .get_string(DB_TOKEN_URL)
            .ok()
            .filter(|url| !url.is_empty())
    }

    pub fn db_token_refresh(&self) -> Duration {
        Duration::from_secs(
            self.config
                .get_int(DB_TOKEN_REFRESH_SECS)
                .unwrap_or(300)
                .max(1) as u64,
        )
    }

    /// Connection URL with `token` substituted as the password
    pub fn connection_url(&self, token: Option<&str>) -> anyhow::Result<String> {
        let url = self.db_url().context("ampere.db.url is not configured")?;
        let Some(token) = token else {
            return Ok(url);
        };

        let mut parsed = url::Url::parse(&url).context("ampere.db.url is not a valid URL")?;
        parsed
            .set_password(Some(token))
            .map_err(|_| anyhow::anyhow!("ampere.db.url cannot carry a password"))?;
        Ok(parsed.to_string())
    }

    pub async fn database_connection(
        &self,
        token: Option<&str>,
    ) -> anyhow::Result<DatabaseConnection> {
        let max_connections = self.db_max_connections();
        let url = self.connection_url(token)?;

        let mut opt = ConnectOptions::new(url);
        opt.max_connections(max_connections)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(30))
            .acquire_timeout(Duration::from_secs(8))
            .idle_timeout(Duration::from_secs(10))
            .max_lifetime(Duration::from_secs(1800))
            .sqlx_logging(false);

        tracing::info!(
            max_connections,
            token_auth = token.is_some(),
            "Database connection pool configured"
        );

        Ok(Database::connect(opt).await?)
    }

    // ========================================================================
    // Notification pipeline
    // ========================================================================

    pub fn notification_workers(&self) -> usize {
        self.config.get_int(NOTIFICATION_WORKERS).unwrap_or(4).max(1) as usize
    }

    pub fn notification_queue_capacity(&self) -> usize {
        self.config
            .get_int(NOTIFICATION_QUEUE_CAPACITY)
            .unwrap_or(10_000)
            .max(1) as usize
    }

    /// Per-call delivery timeout
    pub fn notification_timeout(&self) -> Duration {
        Duration::from_millis(
            self.config
                .get_int(NOTIFICATION_TIMEOUT_MS)
                .unwrap_or(30_000)
                .max(1) as u64,
        )
    }

    /// How long shutdown waits for queued notifications to go out
    pub fn notification_drain_timeout(&self) -> Duration {
        Duration::from_millis(
            self.config
                .get_int(NOTIFICATION_DRAIN_TIMEOUT_MS)
                .unwrap_or(30_000)
                .max(0) as u64,
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        let prefix = "ampere.notification.retry";
        RetryPolicy {
            max_attempts: self
                .config
                .get_int(&format!("{}.max_attempts", prefix))
                .map(|v| v.max(1) as u32)
                .unwrap_or(defaults.max_attempts),
            initial_delay_ms: self
                .config
                .get_int(&format!("{}.initial_delay_ms", prefix))
                .map(|v| v.max(0) as u64)
                .unwrap_or(defaults.initial_delay_ms),
            max_delay_ms: self
                .config
                .get_int(&format!("{}.max_delay_ms", prefix))
                .map(|v| v.max(0) as u64)
                .unwrap_or(defaults.max_delay_ms),
            multiplier: self
                .config
                .get_float(&format!("{}.multiplier", prefix))
                .unwrap_or(defaults.multiplier),
            jitter: self
                .config
                .get_float(&format!("{}.jitter", prefix))
                .map(|v| v.clamp(0.0, 1.0))
                .unwrap_or(defaults.jitter),
        }
    }

    // ========================================================================
    // Logging
    // ========================================================================

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::from_config(
            self.config.get_string("ampere.logs.path").ok(),
            self.config.get_bool("ampere.logs.console").unwrap_or(true),
            self.config.get_bool("ampere.logs.file").unwrap_or(true),
            self.config
                .get_string("ampere.logs.level")
                .unwrap_or("info".to_string()),
        )
        .with_env_overrides()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load(yaml: &str, database_url: Option<&str>, workers: Option<u32>) -> Configuration {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        Configuration::from_cli(Cli {
            config: file.path().to_string_lossy().into_owned(),
            database_url: database_url.map(str::to_string),
            workers,
        })
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = load("ampere: {}\n", None, None);

        assert_eq!(config.server_address(), "0.0.0.0");
        assert_eq!(config.server_port(), 8090);
        assert!(config.db_url().is_err());
        assert_eq!(config.db_max_connections(), 10);
        assert!(config.db_token_url().is_none());
        assert_eq!(config.db_token_refresh(), Duration::from_secs(300));
        assert_eq!(config.notification_workers(), 4);
        assert_eq!(config.notification_queue_capacity(), 10_000);
        assert_eq!(config.notification_timeout(), Duration::from_secs(30));
        assert_eq!(config.notification_drain_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert!(config.metrics_enabled());
    }

    #[test]
    fn test_file_values() {
        let config = load(
            r#"
ampere:
  server:
    port: 9100
  db:
    url: "postgres://ampere@db:5432/ampere"
    token_url: "http://169.254.169.254/token"
  notification:
    workers: 2
    timeout_ms: 1500
    drain_timeout_ms: 0
    retry:
      max_attempts: 3
      initial_delay_ms: 250
      jitter: 0
"#,
            None,
            None,
        );

        assert_eq!(config.server_port(), 9100);
        assert_eq!(config.db_url().unwrap(), "postgres://ampere@db:5432/ampere");
        assert_eq!(
            config.db_token_url().as_deref(),
            Some("http://169.254.169.254/token")
        );
        assert_eq!(config.notification_workers(), 2);
        assert_eq!(config.notification_timeout(), Duration::from_millis(1500));
        assert_eq!(config.notification_drain_timeout(), Duration::ZERO);

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay_ms, 250);
        assert_eq!(policy.jitter, 0.0);
        assert_eq!(policy.max_delay_ms, RetryPolicy::default().max_delay_ms);
    }

    #[test]
    fn test_out_of_range_port_falls_back_to_default() {
        let config = load("ampere:\n  server:\n    port: 70000\n", None, None);
        assert_eq!(config.server_port(), DEFAULT_SERVER_PORT);

        let config = load("ampere:\n  server:\n    port: -1\n", None, None);
        assert_eq!(config.server_port(), DEFAULT_SERVER_PORT);
    }

    #[test]
    fn test_cli_overrides_file() {
        let config = load(
            "ampere:\n  db:\n    url: \"postgres://file\"\n  notification:\n    workers: 2\n",
            Some("postgres://cli"),
            Some(16),
        );

        assert_eq!(config.db_url().unwrap(), "postgres://cli");
        assert_eq!(config.notification_workers(), 16);
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let config = Configuration::from_cli(Cli {
            config: "/nonexistent/ampere.yml".to_string(),
            database_url: Some("sqlite::memory:".to_string()),
            workers: None,
        })
        .unwrap();
        assert_eq!(config.db_url().unwrap(), "sqlite::memory:");
    }

    #[test]
    fn test_connection_url_with_token() {
        let config = load(
            "ampere:\n  db:\n    url: \"postgres://ampere:static@db:5432/ampere\"\n",
            None,
            None,
        );

        assert_eq!(
            config.connection_url(None).unwrap(),
            "postgres://ampere:static@db:5432/ampere"
        );
        assert_eq!(
            config.connection_url(Some("tok3n")).unwrap(),
            "postgres://ampere:tok3n@db:5432/ampere"
        );
    }

    #[test]
    fn test_connection_url_requires_db_url() {
        let config = load("ampere: {}\n", None, None);
        assert!(config.connection_url(Some("tok3n")).is_err());
    }

    #[test]
    fn test_logging_config() {
        let config = load(
            "ampere:\n  logs:\n    path: /tmp/ampere-test-logs\n    level: debug\n    console: false\n",
            None,
            None,
        );
        let logging = config.logging_config();
        assert_eq!(
            logging.log_dir,
            std::path::PathBuf::from("/tmp/ampere-test-logs")
        );
        assert_eq!(logging.file_level, tracing::Level::DEBUG);
        assert!(!logging.console_output);
    }
}
