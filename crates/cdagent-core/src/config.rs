//! Agent configuration: TOML file values with command-line overrides.
//!
//! ```toml
//! host = "collectd.example.net"
//! port = 25826
//! interval = 60
//! hostname = "web-01"
//! log_file = "/var/log/cdagent.log"
//! log_level = "notice"
//! ```

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::transport::DEFAULT_PORT;

/// `log_file` value selecting the console.
pub const CONSOLE: &str = "-";

/// Minimum severity written to the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    /// Normal but significant; logged at INFO.
    Notice,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl LogLevel {
    /// The `tracing` level this maps onto.
    pub fn as_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info | LogLevel::Notice => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Notice => "notice",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "notice" => Ok(LogLevel::Notice),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!(
                "invalid log level '{}', expected debug, info, notice, warning or error",
                other
            )),
        }
    }
}

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    Console,
    File(PathBuf),
}

impl LogDestination {
    pub fn parse(value: &str) -> Self {
        if value == CONSOLE {
            LogDestination::Console
        } else {
            LogDestination::File(PathBuf::from(value))
        }
    }
}

/// Error type for configuration problems.
#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, message: String },
    MissingHost,
    ZeroInterval,
    ZeroPort,
    Hostname(io::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "cannot read {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, message } => {
                write!(f, "invalid config {}: {}", path.display(), message)
            }
            ConfigError::MissingHost => write!(f, "no collectd host configured"),
            ConfigError::ZeroInterval => write!(f, "interval must be at least one second"),
            ConfigError::ZeroPort => write!(f, "port must not be zero"),
            ConfigError::Hostname(e) => write!(f, "cannot determine hostname: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Hostname(e) => Some(e),
            _ => None,
        }
    }
}

/// Values given on the command line; `Some` wins over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub interval: Option<u64>,
    pub hostname: Option<String>,
    pub log_file: Option<String>,
    pub log_level: Option<LogLevel>,
    pub proc_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// collectd server address.
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds between sweeps.
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Name reported as the host part; defaults to the OS hostname.
    #[serde(default)]
    pub hostname: Option<String>,
    /// Log file path, or `-` for the console.
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default = "default_proc_path")]
    pub proc_path: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_interval() -> u64 {
    60
}

fn default_log_file() -> String {
    CONSOLE.to_string()
}

fn default_proc_path() -> String {
    "/proc".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            interval: default_interval(),
            hostname: None,
            log_file: default_log_file(),
            log_level: LogLevel::default(),
            proc_path: default_proc_path(),
        }
    }
}

impl AgentConfig {
    /// Reads a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Applies command-line values on top of the file values.
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(interval) = overrides.interval {
            self.interval = interval;
        }
        if overrides.hostname.is_some() {
            self.hostname = overrides.hostname;
        }
        if let Some(log_file) = overrides.log_file {
            self.log_file = log_file;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        if let Some(proc_path) = overrides.proc_path {
            self.proc_path = proc_path;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        self.validate_sampling()
    }

    /// Checks only what sampling needs; the destination is not consulted.
    pub fn validate_sampling(&self) -> Result<(), ConfigError> {
        if self.interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }

    pub fn log_destination(&self) -> LogDestination {
        LogDestination::parse(&self.log_file)
    }

    /// Host name to report: the configured one, or the OS hostname.
    /// Always lowercase.
    pub fn resolve_hostname(&self) -> Result<String, ConfigError> {
        let name = match &self.hostname {
            Some(name) => name.clone(),
            None => hostname::get()
                .map_err(ConfigError::Hostname)?
                .to_string_lossy()
                .into_owned(),
        };
        Ok(name.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.port, 25826);
        assert_eq!(config.interval, 60);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.log_destination(), LogDestination::Console);
        assert_eq!(config.proc_path, "/proc");
        assert!(matches!(config.validate(), Err(ConfigError::MissingHost)));
    }

    #[test]
    fn test_load_full_file() {
        let file = write_config(
            r#"
host = "collectd.example.net"
port = 25000
interval = 30
hostname = "Web-01"
log_file = "/var/log/cdagent.log"
log_level = "notice"
"#,
        );
        let config = AgentConfig::load(file.path()).unwrap();

        assert_eq!(config.host, "collectd.example.net");
        assert_eq!(config.port, 25000);
        assert_eq!(config.interval, 30);
        assert_eq!(config.log_level, LogLevel::Notice);
        assert_eq!(
            config.log_destination(),
            LogDestination::File(PathBuf::from("/var/log/cdagent.log"))
        );
        assert_eq!(config.resolve_hostname().unwrap(), "web-01");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_minimal_file_uses_defaults() {
        let file = write_config("host = \"10.0.0.1\"\n");
        let config = AgentConfig::load(file.path()).unwrap();
        assert_eq!(
            config,
            AgentConfig {
                host: "10.0.0.1".into(),
                ..AgentConfig::default()
            }
        );
    }

    #[test]
    fn test_load_rejects_unknown_keys() {
        let file = write_config("host = \"h\"\nintervall = 5\n");
        assert!(matches!(
            AgentConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = AgentConfig::load(Path::new("/nonexistent/cdagent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/cdagent.toml"));
    }

    #[test]
    fn test_overrides_win() {
        let file = write_config("host = \"file-host\"\ninterval = 30\nlog_level = \"error\"\n");
        let mut config = AgentConfig::load(file.path()).unwrap();
        config.apply(Overrides {
            host: Some("cli-host".into()),
            log_level: Some(LogLevel::Debug),
            ..Overrides::default()
        });

        assert_eq!(config.host, "cli-host");
        assert_eq!(config.interval, 30);
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_validate() {
        let mut config = AgentConfig {
            host: "h".into(),
            ..AgentConfig::default()
        };
        assert!(config.validate().is_ok());

        config.interval = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroInterval)));

        config.interval = 60;
        config.port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroPort)));
    }

    #[test]
    fn test_validate_sampling_ignores_destination() {
        let mut config = AgentConfig::default();
        assert!(config.validate_sampling().is_ok());

        config.interval = 0;
        assert!(matches!(
            config.validate_sampling(),
            Err(ConfigError::ZeroInterval)
        ));
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert!("verbose".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Notice.as_tracing(), tracing::Level::INFO);
        assert_eq!(LogLevel::Warning.to_string(), "warning");
    }

    #[test]
    fn test_resolve_os_hostname_is_lowercase() {
        let config = AgentConfig::default();
        let name = config.resolve_hostname().unwrap();
        assert!(!name.is_empty());
        assert_eq!(name, name.to_lowercase());
    }
}
