use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config check rejected the generated file; `output` is what the proxy printed.
    #[error("HAProxy configuration validation failed: {output}")]
    Validation { output: String },

    #[error("HAProxy configuration validation timed out")]
    ValidationTimeout,

    #[error("HAProxy exited during startup")]
    Exited { pid: Option<u32> },

    #[error("failed to remove stale pid file {path}: {source}")]
    PidFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to signal pid {pid}: {source}")]
    Signal {
        pid: i32,
        #[source]
        source: nix::Error,
    },
}

impl SupervisorError {
    pub fn spawn(program: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    pub fn validation(output: impl Into<String>) -> Self {
        Self::Validation {
            output: output.into(),
        }
    }

    pub fn pid_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PidFile {
            path: path.into(),
            source,
        }
    }

    pub fn signal(pid: i32, source: nix::Error) -> Self {
        Self::Signal { pid, source }
    }
}
