use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Tracing target for startup messages.
pub const INIT: &str = "init";
/// Tracing target for lines coming from the proxy child process.
pub const HAPROXY: &str = "haproxy";
/// Tracing target for discovery, mapping and reconcile messages.
pub const EASYHAPROXY: &str = "easyhaproxy";
/// Tracing target for the ACME client and certificate manager.
pub const CERTBOT: &str = "certbot";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses a level name, falling back to `default` for anything unknown.
    pub fn parse_or(value: &str, default: LogLevel) -> LogLevel {
        value.parse().unwrap_or(default)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown log level '{0}'")]
pub struct UnknownLogLevel(pub String);

impl FromStr for LogLevel {
    type Err = UnknownLogLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" | "CRITICAL" | "FATAL" => Ok(LogLevel::Error),
            _ => Err(UnknownLogLevel(s.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_directive())
    }
}

/// Level per log sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLevels {
    pub easyhaproxy: LogLevel,
    pub haproxy: LogLevel,
    pub certbot: LogLevel,
}

impl Default for LogLevels {
    fn default() -> Self {
        Self {
            easyhaproxy: LogLevel::Debug,
            haproxy: LogLevel::Info,
            certbot: LogLevel::Debug,
        }
    }
}

impl LogLevels {
    /// Builds the `EnvFilter` directive string for all sinks.
    pub fn directives(&self) -> String {
        format!(
            "warn,{INIT}=info,{EASYHAPROXY}={},easyhaproxy_core={},{HAPROXY}={},{CERTBOT}={}",
            self.easyhaproxy, self.easyhaproxy, self.haproxy, self.certbot
        )
    }

    /// The ACME client runs verbose only when its sink is at debug or finer.
    pub fn certbot_verbose(&self) -> bool {
        self.certbot <= LogLevel::Debug
    }
}

/// Collapses a multi-line message into a single log line.
pub fn single_line(message: &str) -> String {
    message
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Initialize the logging system with JSON formatting and per-sink filtering.
///
/// `RUST_LOG` takes precedence over the computed per-sink directives when set.
pub fn init_logging(levels: &LogLevels) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(levels.directives()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .flatten_event(true)
        .init();
}
