use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CertError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid certificate {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: openssl::error::ErrorStack,
    },

    /// Startup readiness failure; the message is shown to operators as is.
    #[error("{reason}")]
    NotReady { reason: String },
}

impl CertError {
    pub fn spawn(program: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, source: openssl::error::ErrorStack) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    pub fn not_ready(reason: impl Into<String>) -> Self {
        Self::NotReady {
            reason: reason.into(),
        }
    }
}
