use crate::conf::error::ConfigError;
use crate::conf::options::{Options, StatsOptions, split_list};
use crate::labels::parse_bool;
use crate::logging::LogLevel;
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// The `config.yml` file used by static discovery.
///
/// Besides the container records, the file may carry option blocks that
/// override CLI and environment values.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    pub containers: BTreeMap<String, StaticContainer>,
    pub customerrors: Option<Value>,
    pub ssl_mode: Option<Value>,
    pub stats: BTreeMap<String, Value>,
    #[serde(rename = "logLevel")]
    pub log_level: BTreeMap<String, Value>,
    pub certbot: BTreeMap<String, Value>,
    pub plugins: StaticPlugins,
}

/// One `host:port` record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StaticContainer {
    pub ip: Option<Vec<String>>,
    pub redirect: Option<Value>,
    pub plugins: Option<Value>,
    pub plugin: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(flatten)]
    pub options: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StaticPlugins {
    pub enabled: Option<Value>,
    pub abort_on_error: Option<Value>,
    pub config: BTreeMap<String, BTreeMap<String, Value>>,
}

impl StaticConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::parse(path, &raw)
    }

    pub fn parse(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(raw).map_err(|e| ConfigError::parse(path, e))
    }
}

impl StaticPlugins {
    /// Globally enabled names; accepts a YAML list or a comma string.
    pub fn enabled_names(&self) -> Vec<String> {
        match &self.enabled {
            None => Vec::new(),
            Some(value) => value_list(value),
        }
    }
}

impl StaticContainer {
    /// Host-level plugin list, or `None` when the record does not set one.
    pub fn plugin_names(&self) -> Option<Vec<String>> {
        self.plugins.as_ref().map(value_list)
    }
}

/// Renders a YAML scalar the way labels expect it.
///
/// Booleans become `true`/`false`, sequences are comma-joined and null is empty.
pub fn yaml_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(items) => items
            .iter()
            .map(yaml_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Mapping(_) => serde_json::to_string(value).unwrap_or_default(),
        Value::Tagged(tagged) => yaml_to_string(&tagged.value),
    }
}

fn value_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items
            .iter()
            .map(yaml_to_string)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        other => split_list(&yaml_to_string(other)),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        other => parse_bool(&yaml_to_string(other)),
    }
}

impl Options {
    /// Applies the option blocks of a static file on top of these options.
    pub fn merge_static(mut self, file: &StaticConfig) -> Result<Options, ConfigError> {
        if let Some(value) = &file.customerrors {
            self.custom_errors = truthy(value);
        }

        if let Some(value) = &file.ssl_mode {
            self.ssl_mode = yaml_to_string(value).parse()?;
        }

        self.merge_stats(&file.stats)?;
        self.merge_log_levels(&file.log_level);
        self.merge_certbot(&file.certbot)?;

        if file.plugins.enabled.is_some() {
            self.plugins.enabled = file.plugins.enabled_names();
        }
        if let Some(value) = &file.plugins.abort_on_error {
            self.plugins.abort_on_error = truthy(value);
        }
        for (name, settings) in &file.plugins.config {
            let entry = self.plugins.config.entry(name.to_ascii_lowercase()).or_default();
            for (key, value) in settings {
                entry.insert(key.to_ascii_lowercase(), yaml_to_string(value));
            }
        }

        Ok(self)
    }

    fn merge_stats(&mut self, stats: &BTreeMap<String, Value>) -> Result<(), ConfigError> {
        if stats.is_empty() {
            return Ok(());
        }

        let mut merged = self.stats.clone().unwrap_or_else(|| StatsOptions::new(""));
        for (key, value) in stats {
            let value = yaml_to_string(value);
            match key.as_str() {
                "username" => merged.username = value,
                "password" => merged.password = value,
                "cors_origin" => merged.cors_origin = value,
                "port" => {
                    merged.port = value
                        .parse()
                        .map_err(|_| ConfigError::invalid_value("stats.port", value.as_str()))?
                }
                _ => {}
            }
        }

        self.stats = (!merged.password.is_empty()).then_some(merged);
        Ok(())
    }

    fn merge_log_levels(&mut self, levels: &BTreeMap<String, Value>) {
        for (sink, value) in levels {
            let value = yaml_to_string(value);
            let slot = match sink.to_ascii_lowercase().as_str() {
                "easyhaproxy" => &mut self.log_levels.easyhaproxy,
                "haproxy" => &mut self.log_levels.haproxy,
                "certbot" => &mut self.log_levels.certbot,
                _ => continue,
            };
            *slot = LogLevel::parse_or(&value, *slot);
        }
    }

    fn merge_certbot(&mut self, certbot: &BTreeMap<String, Value>) -> Result<(), ConfigError> {
        for (key, value) in certbot {
            let value = yaml_to_string(value);
            match key.to_ascii_lowercase().as_str() {
                "email" => self.certbot.email = value,
                "autoconfig" => self.certbot.autoconfig = value,
                "server" => self.certbot.server = value,
                "eab_kid" => self.certbot.eab_kid = value,
                "eab_hmac_key" => self.certbot.eab_hmac_key = value,
                "preferred_challenges" => self.certbot.preferred_challenges = value,
                "manual_auth_hook" => {
                    self.certbot.manual_auth_hook = (!value.is_empty()).then_some(value)
                }
                "retry_count" => {
                    self.certbot.retry_count = value.parse().map_err(|_| {
                        ConfigError::invalid_value("certbot.retry_count", value.as_str())
                    })?
                }
                _ => {}
            }
        }
        Ok(())
    }
}
