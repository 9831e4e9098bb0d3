use crate::conf::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("docker API call '{operation}' failed: {source}")]
    Docker {
        operation: String,
        #[source]
        source: bollard::errors::Error,
    },

    #[error("kubernetes API call '{operation}' failed: {source}")]
    Kube {
        operation: String,
        #[source]
        source: kube::Error,
    },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DiscoveryError {
    pub fn docker(operation: impl Into<String>, source: bollard::errors::Error) -> Self {
        Self::Docker {
            operation: operation.into(),
            source,
        }
    }

    pub fn kube(operation: impl Into<String>, source: kube::Error) -> Self {
        Self::Kube {
            operation: operation.into(),
            source,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}
