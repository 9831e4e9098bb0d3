use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Output of one `process` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginResult {
    /// Snippet for the current scope: the backend block for per-route
    /// plugins, the global section for global plugins.
    pub haproxy_config: String,
    pub global_configs: Vec<String>,
    pub defaults_configs: Vec<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Files the host writes on the plugin's behalf.
    pub resources: Vec<ResourceRequest>,
}

impl PluginResult {
    pub fn snippet(haproxy_config: impl Into<String>) -> Self {
        Self {
            haproxy_config: haproxy_config.into(),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Filesystem resource a plugin asks the host to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResourceRequest {
    Directory {
        path: PathBuf,
    },
    File {
        path: PathBuf,
        #[serde(default)]
        content: String,
        #[serde(default)]
        overwrite: bool,
    },
}

impl ResourceRequest {
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Directory { path } | Self::File { path, .. } => path,
        }
    }

    /// Creates the directory (recursively) or writes the file when absent or
    /// when `overwrite` is set. Parent directories of files are created too.
    pub fn apply(&self) -> std::io::Result<bool> {
        match self {
            Self::Directory { path } => {
                std::fs::create_dir_all(path)?;
                Ok(true)
            }
            Self::File {
                path,
                content,
                overwrite,
            } => {
                if path.exists() && !overwrite {
                    return Ok(false);
                }
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, content)?;
                Ok(true)
            }
        }
    }
}
