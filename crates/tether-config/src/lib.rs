//! Process configuration surface shared by the tether binaries.
//!
//! Everything the daemon can be told from the outside lives on [`Config`]:
//! the bind endpoint, the per-read receive chunk size, the optional
//! port-discovery file, and the logging knobs. None of it is wire-visible.

pub mod defaults;
mod logging;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;

pub use logging::{LogFormat, LogFormatParseError};

/// Configuration for the tether daemon.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tetherd",
    about = "Remote-control daemon for an interactive runtime",
    version
)]
pub struct Config {
    /// Host address the listener binds.
    #[arg(long, default_value = defaults::DEFAULT_HOST)]
    pub host: String,

    /// Port the listener binds; 0 requests an OS-assigned ephemeral port.
    #[arg(long, default_value_t = defaults::DEFAULT_PORT)]
    pub port: u16,

    /// Bytes requested per socket read on each connection.
    #[arg(long, default_value_t = defaults::DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// File the bound port number is written to once the listener is ready,
    /// for external discovery.
    #[arg(long)]
    pub port_file: Option<Utf8PathBuf>,

    /// Log filter expression (tracing `EnvFilter` syntax).
    #[arg(long, default_value = defaults::DEFAULT_LOG_FILTER)]
    pub log_filter: String,

    /// Log output format.
    #[arg(long, default_value_t = defaults::default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: defaults::DEFAULT_HOST.to_owned(),
            port: defaults::DEFAULT_PORT,
            chunk_size: defaults::DEFAULT_CHUNK_SIZE,
            port_file: None,
            log_filter: defaults::DEFAULT_LOG_FILTER.to_owned(),
            log_format: defaults::default_log_format(),
        }
    }
}

impl Config {
    /// Parses configuration from the process arguments and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a parsed value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints clap cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroChunkSize`] when the receive chunk size
    /// is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        Ok(())
    }

    /// Renders the listener bind address as `host:port`.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Errors raised while validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Receive chunk size must be non-zero.
    #[error("chunk size must be at least 1 byte")]
    ZeroChunkSize,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_apply_without_flags() {
        let config = Config::try_parse_from(["tetherd"]).expect("parse default flags");
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 0);
        assert_eq!(config.chunk_size, 8192);
        assert_eq!(config.port_file, None);
        assert_eq!(config.log_filter, "info");
        assert_eq!(config.log_format, LogFormat::Compact);
        config.validate().expect("defaults validate");
    }

    #[test]
    fn flags_override_every_default() {
        let config = Config::try_parse_from([
            "tetherd",
            "--host",
            "0.0.0.0",
            "--port",
            "7888",
            "--chunk-size",
            "16",
            "--port-file",
            "/tmp/tether.port",
            "--log-filter",
            "debug",
            "--log-format",
            "json",
        ])
        .expect("parse full flags");
        assert_eq!(config.bind_addr(), "0.0.0.0:7888");
        assert_eq!(config.chunk_size, 16);
        assert_eq!(config.port_file, Some(Utf8PathBuf::from("/tmp/tether.port")));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let config = Config::try_parse_from(["tetherd", "--chunk-size", "0"]).expect("parse");
        assert!(matches!(config.validate(), Err(ConfigError::ZeroChunkSize)));
    }

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("JSON", LogFormat::Json)]
    #[case("compact", LogFormat::Compact)]
    fn log_format_parses_case_insensitively(#[case] input: &str, #[case] expected: LogFormat) {
        let parsed: LogFormat = input.parse().expect("parse log format");
        assert_eq!(parsed, expected);
    }
}
