//! Multi-file logging.
//!
//! Every event goes to the console (optional) and to the root `ampere.log`.
//! Component files additionally receive the events whose `tracing` target
//! starts with one of their prefixes:
//!
//! | Log File          | Component                          | Target Prefixes      |
//! |-------------------|------------------------------------|----------------------|
//! | ampere.log        | Root logger (all components)       | (all)                |
//! | notify.log        | Matching, building and delivery    | ampere_notify        |
//! | persistence.log   | Archive resolution and batch lookup | ampere_persistence   |
//! | server.log        | Start-up, HTTP surface, shutdown   | ampere_server        |
//!
//! Log files are stored in `~/ampere/logs` by default.
//! Override with `AMPERE_LOG_DIR` or `ampere.logs.path`.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

struct ComponentLogDef {
    file_name: &'static str,
    targets: &'static [&'static str],
}

const ROOT_LOG_FILE: &str = "ampere.log";

const COMPONENT_LOGS: &[ComponentLogDef] = &[
    ComponentLogDef {
        file_name: "notify.log",
        targets: &["ampere_notify"],
    },
    ComponentLogDef {
        file_name: "persistence.log",
        targets: &["ampere_persistence"],
    },
    ComponentLogDef {
        file_name: "server.log",
        targets: &["ampere_server"],
    },
];

fn default_log_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(format!("{}/ampere/logs", home))
}

/// Log rotation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

impl std::str::FromStr for LogRotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(LogRotation::Daily),
            "hourly" => Ok(LogRotation::Hourly),
            "never" => Ok(LogRotation::Never),
            other => Err(format!("unknown log rotation: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub console_output: bool,
    pub console_level: Level,
    pub file_logging: bool,
    pub file_level: Level,
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            console_output: true,
            console_level: Level::INFO,
            file_logging: true,
            file_level: Level::INFO,
            rotation: LogRotation::Daily,
        }
    }
}

impl LoggingConfig {
    /// Create from application configuration.
    pub fn from_config(
        log_dir: Option<String>,
        console_output: bool,
        file_logging: bool,
        level: String,
    ) -> Self {
        let level = level.parse().unwrap_or(Level::INFO);

        Self {
            log_dir: log_dir.map(PathBuf::from).unwrap_or_else(default_log_dir),
            console_output,
            console_level: level,
            file_logging,
            file_level: level,
            rotation: LogRotation::Daily,
        }
    }

    /// Apply `AMPERE_LOG_*` environment variables on top of this config.
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup("AMPERE_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Some(v) = lookup("AMPERE_LOG_CONSOLE") {
            self.console_output = v.to_lowercase() != "false" && v != "0";
        }
        if let Some(v) = lookup("AMPERE_LOG_FILE") {
            self.file_logging = v.to_lowercase() == "true" || v == "1";
        }
        if let Some(level) = lookup("AMPERE_LOG_LEVEL").and_then(|v| v.parse().ok()) {
            self.console_level = level;
            self.file_level = level;
        }
        if let Some(level) = lookup("AMPERE_LOG_FILE_LEVEL").and_then(|v| v.parse().ok()) {
            self.file_level = level;
        }
        if let Some(rotation) = lookup("AMPERE_LOG_ROTATION").and_then(|v| v.parse().ok()) {
            self.rotation = rotation;
        }
        self
    }
}

/// Keeps the non-blocking file writers alive. Buffered output is flushed on drop.
pub struct LoggingGuard {
    _file_guards: Vec<WorkerGuard>,
}

/// Install the global subscriber.
///
/// The console and the root file filter with `RUST_LOG` when set, falling
/// back to the configured level. Component files use a [`Targets`] filter at
/// TRACE so they capture everything their targets emit.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, Box<dyn std::error::Error>> {
    if config.file_logging {
        std::fs::create_dir_all(&config.log_dir)?;
    }

    let mut guards: Vec<WorkerGuard> = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console_output {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.console_level.to_string()));
        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_filter(filter);
        layers.push(Box::new(console_layer));
    }

    if config.file_logging {
        let root_appender =
            RollingFileAppender::new(config.rotation.into(), &config.log_dir, ROOT_LOG_FILE);
        let (root_nb, root_guard) = tracing_appender::non_blocking(root_appender);
        guards.push(root_guard);

        let root_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.file_level.to_string()));
        let root_layer = fmt::layer()
            .with_writer(root_nb)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_filter(root_filter);
        layers.push(Box::new(root_layer));

        for component in COMPONENT_LOGS {
            let appender = RollingFileAppender::new(
                config.rotation.into(),
                &config.log_dir,
                component.file_name,
            );
            let (nb, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);

            let mut targets = Targets::new();
            for target in component.targets {
                targets = targets.with_target(*target, LevelFilter::TRACE);
            }

            let layer = fmt::layer()
                .with_writer(nb)
                .with_target(true)
                .with_thread_names(true)
                .with_ansi(false)
                .with_filter(targets);
            layers.push(Box::new(layer));
        }
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| format!("Failed to initialize logging: {}", e))?;

    if config.file_logging {
        tracing::info!(
            log_dir = %config.log_dir.display(),
            component_files = COMPONENT_LOGS.len(),
            "File logging initialized"
        );
    }

    Ok(LoggingGuard {
        _file_guards: guards,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(config.console_output);
        assert!(config.file_logging);
        assert_eq!(config.console_level, Level::INFO);
        assert!(config.log_dir.ends_with("ampere/logs"));
    }

    #[test]
    fn test_logging_config_from_config() {
        let config = LoggingConfig::from_config(
            Some("/tmp/ampere-logs".to_string()),
            false,
            true,
            "debug".to_string(),
        );
        assert_eq!(config.log_dir, PathBuf::from("/tmp/ampere-logs"));
        assert!(!config.console_output);
        assert_eq!(config.file_level, Level::DEBUG);

        let fallback = LoggingConfig::from_config(None, true, true, "loud".to_string());
        assert_eq!(fallback.console_level, Level::INFO);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("AMPERE_LOG_DIR", "/var/log/ampere"),
            ("AMPERE_LOG_CONSOLE", "false"),
            ("AMPERE_LOG_LEVEL", "warn"),
            ("AMPERE_LOG_FILE_LEVEL", "trace"),
            ("AMPERE_LOG_ROTATION", "hourly"),
        ]);
        let config = LoggingConfig::default()
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.log_dir, PathBuf::from("/var/log/ampere"));
        assert!(!config.console_output);
        assert!(config.file_logging);
        assert_eq!(config.console_level, Level::WARN);
        assert_eq!(config.file_level, Level::TRACE);
        assert_eq!(config.rotation, LogRotation::Hourly);
    }

    #[test]
    fn test_log_rotation_conversion() {
        assert!(matches!(Rotation::from(LogRotation::Daily), Rotation::DAILY));
        assert!(matches!(Rotation::from(LogRotation::Never), Rotation::NEVER));
        assert!("weekly".parse::<LogRotation>().is_err());
    }

    #[test]
    fn test_component_log_definitions() {
        for component in COMPONENT_LOGS {
            assert!(component.file_name.ends_with(".log"));
            assert_ne!(component.file_name, ROOT_LOG_FILE);
            assert!(!component.targets.is_empty());
        }
    }
}
