use super::config_bool;
use crate::conf::{PluginConfig, split_list};
use crate::logging::EASYHAPROXY;
use crate::plugin::core::errors::PluginError;
use crate::plugin::core::result::PluginResult;
use crate::plugin::core::{Plugin, PluginContext, PluginKind};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const TEMP_FILE_GLOB: &str = "easyhaproxy_*";

/// Removes stale `easyhaproxy_*` temp files. Produces no configuration.
pub struct CleanupPlugin {
    enabled: bool,
    max_idle_time: Duration,
    cleanup_temp_files: bool,
    temp_dirs: Vec<PathBuf>,
}

impl Default for CleanupPlugin {
    fn default() -> Self {
        Self {
            enabled: true,
            max_idle_time: Duration::from_secs(300),
            cleanup_temp_files: true,
            temp_dirs: vec![PathBuf::from("/tmp"), PathBuf::from("/var/tmp")],
        }
    }
}

impl CleanupPlugin {
    fn sweep(&self, dir: &Path, now: SystemTime) -> Vec<String> {
        let files = match crate::conf::discover(dir, TEMP_FILE_GLOB) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(target: EASYHAPROXY, dir = %dir.display(), error = %e, "cleanup: failed to scan");
                return Vec::new();
            }
        };

        let mut removed = Vec::new();
        for path in files {
            let age = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|mtime| now.duration_since(mtime).ok())
                .unwrap_or_default();
            if age <= self.max_idle_time {
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(target: EASYHAPROXY, path = %path.display(), "cleanup: removed temp file");
                    removed.push(path.display().to_string());
                }
                Err(e) => {
                    tracing::warn!(target: EASYHAPROXY, path = %path.display(), error = %e, "cleanup: failed to remove temp file")
                }
            }
        }
        removed
    }
}

impl Plugin for CleanupPlugin {
    fn name(&self) -> &str {
        "cleanup"
    }

    fn kind(&self) -> PluginKind {
        PluginKind::Global
    }

    fn configure(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        *self = Self::default();
        self.enabled = config_bool(config, "enabled", true);
        self.cleanup_temp_files = config_bool(config, "cleanup_temp_files", true);
        if let Some(raw) = config.get("max_idle_time") {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.max_idle_time = Duration::from_secs(secs),
                Err(_) => {
                    tracing::warn!(target: EASYHAPROXY, value = %raw, "cleanup: invalid max_idle_time, using default")
                }
            }
        }
        if let Some(raw) = config.get("temp_dirs") {
            self.temp_dirs = split_list(raw).into_iter().map(PathBuf::from).collect();
        }
        Ok(())
    }

    fn process(&mut self, _ctx: &PluginContext<'_>) -> Result<PluginResult, PluginError> {
        if !self.enabled {
            return Ok(PluginResult::default());
        }

        let mut actions = Vec::new();
        if self.cleanup_temp_files {
            let now = SystemTime::now();
            for dir in self.temp_dirs.iter().filter(|d| d.is_dir()) {
                actions.extend(self.sweep(dir, now));
            }
        }

        if !actions.is_empty() {
            tracing::info!(target: EASYHAPROXY, count = actions.len(), "cleanup: removed stale temp files");
        }

        Ok(PluginResult::default()
            .with_metadata("actions_performed", actions.len())
            .with_metadata("actions", actions))
    }
}
