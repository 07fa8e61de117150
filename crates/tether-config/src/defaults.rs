use crate::logging::LogFormat;

/// Default bind host for the listener.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port; 0 asks the operating system for an ephemeral port.
pub const DEFAULT_PORT: u16 = 0;

/// Default number of bytes requested per socket read.
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default logging format for the binaries.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}
