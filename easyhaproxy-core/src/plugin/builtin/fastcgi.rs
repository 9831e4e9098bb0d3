use super::config_bool;
use crate::conf::PluginConfig;
use crate::plugin::core::errors::PluginError;
use crate::plugin::core::result::PluginResult;
use crate::plugin::core::{Plugin, PluginContext, PluginKind};

const DEFAULT_SCRIPT_FILENAME: &str = "%[path]";

/// Attaches a `fcgi-app` section to the route's backend.
pub struct FastcgiPlugin {
    enabled: bool,
    document_root: String,
    script_filename: String,
    index_file: String,
    path_info: bool,
    custom_params: Vec<(String, String)>,
}

impl Default for FastcgiPlugin {
    fn default() -> Self {
        Self {
            enabled: true,
            document_root: "/var/www/html".to_string(),
            script_filename: DEFAULT_SCRIPT_FILENAME.to_string(),
            index_file: "index.php".to_string(),
            path_info: true,
            custom_params: Vec::new(),
        }
    }
}

/// `k=v,k2=v2` in declaration order; entries without `=` are ignored.
fn parse_params(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

impl Plugin for FastcgiPlugin {
    fn name(&self) -> &str {
        "fastcgi"
    }

    fn kind(&self) -> PluginKind {
        PluginKind::Route
    }

    fn configure(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        *self = Self::default();
        self.enabled = config_bool(config, "enabled", true);
        self.path_info = config_bool(config, "path_info", true);
        if let Some(v) = config.get("document_root") {
            self.document_root = v.clone();
        }
        if let Some(v) = config.get("script_filename") {
            self.script_filename = v.clone();
        }
        if let Some(v) = config.get("index_file") {
            self.index_file = v.clone();
        }
        if let Some(v) = config.get("custom_params") {
            self.custom_params = parse_params(v);
        }
        Ok(())
    }

    fn process(&mut self, ctx: &PluginContext<'_>) -> Result<PluginResult, PluginError> {
        if !self.enabled {
            return Ok(PluginResult::default());
        }

        let app = format!("fcgi_{}", ctx.domain_safe());

        let mut lines = vec![
            format!("fcgi-app {app}"),
            format!("    docroot {}", self.document_root),
            format!("    index {}", self.index_file),
        ];
        if self.path_info {
            lines.push(r"    path-info ^(/.+\.php)(/.*)?$".to_string());
        }
        if !self.script_filename.is_empty() && self.script_filename != DEFAULT_SCRIPT_FILENAME {
            lines.push(format!("    set-param SCRIPT_FILENAME {}", self.script_filename));
        }
        for (name, value) in &self.custom_params {
            lines.push(format!("    set-param {} {}", name.to_uppercase(), value));
        }

        let mut result = PluginResult::snippet(format!("use-fcgi-app {app}"))
            .with_metadata("domain", ctx.domain)
            .with_metadata("fcgi_app_name", app.as_str())
            .with_metadata("document_root", self.document_root.as_str())
            .with_metadata("index_file", self.index_file.as_str())
            .with_metadata("path_info", self.path_info)
            .with_metadata("custom_params_count", self.custom_params.len());
        result.global_configs.push(lines.join("\n"));

        Ok(result)
    }
}
