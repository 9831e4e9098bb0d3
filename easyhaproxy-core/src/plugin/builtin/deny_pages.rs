use super::{DEFAULT_DENY_STATUS, config_bool, config_list, config_status};
use crate::conf::PluginConfig;
use crate::plugin::core::errors::PluginError;
use crate::plugin::core::result::PluginResult;
use crate::plugin::core::{Plugin, PluginContext, PluginKind};

/// Blocks a list of path prefixes on one route.
pub struct DenyPagesPlugin {
    enabled: bool,
    paths: Vec<String>,
    status_code: u16,
}

impl Default for DenyPagesPlugin {
    fn default() -> Self {
        Self {
            enabled: true,
            paths: Vec::new(),
            status_code: DEFAULT_DENY_STATUS,
        }
    }
}

impl Plugin for DenyPagesPlugin {
    fn name(&self) -> &str {
        "deny_pages"
    }

    fn kind(&self) -> PluginKind {
        PluginKind::Route
    }

    fn configure(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        self.enabled = config_bool(config, "enabled", true);
        self.paths = config_list(config, "paths");
        self.status_code = config_status(config);
        Ok(())
    }

    fn process(&mut self, ctx: &PluginContext<'_>) -> Result<PluginResult, PluginError> {
        if !self.enabled || self.paths.is_empty() {
            return Ok(PluginResult::default());
        }

        let snippet = format!(
            "# Deny Pages - Block specific paths\n    acl denied_path path_beg {}\n    http-request deny deny_status {} if denied_path",
            self.paths.join(" "),
            self.status_code
        );

        Ok(PluginResult::snippet(snippet)
            .with_metadata("domain", ctx.domain)
            .with_metadata("blocked_paths", self.paths.clone())
            .with_metadata("status_code", self.status_code))
    }
}
