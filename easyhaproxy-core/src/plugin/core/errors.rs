use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("failed to load plugin from {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("failed to configure plugin '{name}': {reason}")]
    Configure { name: String, reason: String },

    #[error("plugin '{name}' failed{}: {reason}", domain_suffix(.domain))]
    Execute {
        name: String,
        domain: Option<String>,
        reason: String,
    },

    #[error("plugin '{name}' initialization failed for {path}: {source}")]
    Resource {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PluginError {
    pub fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn configure(name: impl Into<String>, reason: impl ToString) -> Self {
        Self::Configure {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn execute(name: impl Into<String>, domain: Option<&str>, reason: impl ToString) -> Self {
        Self::Execute {
            name: name.into(),
            domain: domain.map(String::from),
            reason: reason.to_string(),
        }
    }

    pub fn resource(name: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Resource {
            name: name.into(),
            path: path.into(),
            source,
        }
    }
}

fn domain_suffix(domain: &Option<String>) -> String {
    domain
        .as_deref()
        .map(|d| format!(" for domain '{d}'"))
        .unwrap_or_default()
}
