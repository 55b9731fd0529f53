//! Configuration module for the resp-loop server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

/// Command-line arguments for the server
#[derive(Parser, Debug, Default)]
#[command(name = "resp-loop")]
#[command(version)]
#[command(about = "A single-threaded RESP ping/echo server", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:3000)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Maximum number of simultaneous client connections
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Largest request, in bytes, a client may leave partially sent
    #[arg(long)]
    pub max_frame_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Connections beyond this are accepted and immediately dropped
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_connections: default_max_connections(),
        }
    }
}

/// Event loop configuration
#[derive(Debug, Deserialize)]
pub struct RuntimeConfig {
    /// Readiness events handled per poll call
    #[serde(default = "default_events_capacity")]
    pub events_capacity: usize,
    /// Size of the scratch buffer used for each socket read
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    /// Largest incomplete request held in a connection's inbox
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            events_capacity: default_events_capacity(),
            read_buffer_size: default_read_buffer_size(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_max_connections() -> usize {
    10_000
}

fn default_events_capacity() -> usize {
    1024
}

fn default_read_buffer_size() -> usize {
    64 * 1024 // 64 KB
}

fn default_max_frame_size() -> usize {
    64 * 1024 * 1024 // 64 MB
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: SocketAddr,
    pub max_connections: usize,
    pub events_capacity: usize,
    pub read_buffer_size: usize,
    pub max_frame_size: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let runtime = RuntimeConfig::default();
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_connections: default_max_connections(),
            events_capacity: runtime.events_capacity,
            read_buffer_size: runtime.read_buffer_size,
            max_frame_size: runtime.max_frame_size,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Resolve already-parsed CLI arguments, reading the TOML file they name.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence) and validate.
    pub fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let listen = cli.listen.unwrap_or(toml_config.server.listen);
        let listen: SocketAddr = listen
            .parse()
            .map_err(|e| ConfigError::InvalidListen(listen.clone(), e))?;

        let config = Config {
            listen,
            max_connections: cli
                .max_connections
                .unwrap_or(toml_config.server.max_connections),
            events_capacity: toml_config.runtime.events_capacity,
            read_buffer_size: toml_config.runtime.read_buffer_size,
            max_frame_size: cli
                .max_frame_size
                .unwrap_or(toml_config.runtime.max_frame_size),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            ("max_connections", self.max_connections),
            ("events_capacity", self.events_capacity),
            ("read_buffer_size", self.read_buffer_size),
            ("max_frame_size", self.max_frame_size),
        ];

        match sizes.into_iter().find(|&(_, value)| value == 0) {
            Some((field, _)) => Err(ConfigError::Zero(field)),
            None => Ok(()),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {1}", .0.display())]
    FileRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse config file '{}': {1}", .0.display())]
    TomlParse(PathBuf, #[source] toml::de::Error),
    #[error("Invalid listen address '{0}': {1}")]
    InvalidListen(String, #[source] AddrParseError),
    #[error("'{0}' must be greater than zero")]
    Zero(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.max_connections, 10_000);
        assert_eq!(config.events_capacity, 1024);
        assert_eq!(config.read_buffer_size, 64 * 1024);
        assert_eq!(config.max_frame_size, 64 * 1024 * 1024);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_defaults_agree_with_empty_toml() {
        let config = Config::merge(CliArgs::default(), TomlConfig::default()).unwrap();
        let default = Config::default();
        assert_eq!(config.listen, default.listen);
        assert_eq!(config.max_connections, default.max_connections);
        assert_eq!(config.max_frame_size, default.max_frame_size);
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [server]
            listen = "127.0.0.1:6380"
            max_connections = 16

            [runtime]
            events_capacity = 64
            read_buffer_size = 4096
            max_frame_size = 1048576

            [logging]
            level = "debug"
        "#;

        let toml_config: TomlConfig = toml::from_str(toml_str).unwrap();
        let config = Config::merge(CliArgs::default(), toml_config).unwrap();
        assert_eq!(config.listen.port(), 6380);
        assert_eq!(config.max_connections, 16);
        assert_eq!(config.events_capacity, 64);
        assert_eq!(config.read_buffer_size, 4096);
        assert_eq!(config.max_frame_size, 1_048_576);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_config: TomlConfig = toml::from_str("[runtime]\nevents_capacity = 8\n").unwrap();
        let config = Config::merge(CliArgs::default(), toml_config).unwrap();
        assert_eq!(config.events_capacity, 8);
        assert_eq!(config.listen.port(), 3000);
        assert_eq!(config.read_buffer_size, 64 * 1024);
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml_config: TomlConfig = toml::from_str(
            "[server]\nlisten = \"127.0.0.1:1\"\n[logging]\nlevel = \"warn\"\n",
        )
        .unwrap();
        let cli = CliArgs::try_parse_from([
            "resp-loop",
            "--listen",
            "127.0.0.1:7000",
            "--max-frame-size",
            "512",
            "--log-level",
            "trace",
        ])
        .unwrap();

        let config = Config::merge(cli, toml_config).unwrap();
        assert_eq!(config.listen.port(), 7000);
        assert_eq!(config.max_frame_size, 512);
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_invalid_listen() {
        let cli = CliArgs {
            listen: Some("not-an-address".to_string()),
            ..CliArgs::default()
        };
        match Config::merge(cli, TomlConfig::default()) {
            Err(ConfigError::InvalidListen(addr, _)) => assert_eq!(addr, "not-an-address"),
            other => panic!("Expected invalid listen error, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let cli = CliArgs {
            max_frame_size: Some(0),
            ..CliArgs::default()
        };
        match Config::merge(cli, TomlConfig::default()) {
            Err(ConfigError::Zero("max_frame_size")) => {}
            other => panic!("Expected zero-size error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_config_file() {
        let cli = CliArgs {
            config: Some(PathBuf::from("/nonexistent/resp-loop.toml")),
            ..CliArgs::default()
        };
        match Config::from_args(cli) {
            Err(ConfigError::FileRead(path, _)) => {
                assert_eq!(path, PathBuf::from("/nonexistent/resp-loop.toml"))
            }
            other => panic!("Expected file read error, got {other:?}"),
        }
    }
}
