use super::{Discover, DiscoveryError, EntityMap, Labels};
use crate::conf::{StaticConfig, StaticContainer, yaml_to_string};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Record options copied verbatim into definition labels.
const PASSTHROUGH_KEYS: [&str; 8] = [
    "mode",
    "certbot",
    "redirect_ssl",
    "ssl",
    "balance",
    "proto",
    "ssl-check",
    "clone_to_ssl",
];

/// Reads `config.yml` on every refresh and turns its records into entities.
pub struct StaticDiscovery {
    path: PathBuf,
    prefix: String,
}

impl StaticDiscovery {
    pub fn new(path: PathBuf, prefix: String) -> Self {
        Self { path, prefix }
    }
}

#[async_trait]
impl Discover for StaticDiscovery {
    async fn refresh(&mut self) -> Result<EntityMap, DiscoveryError> {
        let file = StaticConfig::load(&self.path)?;
        Ok(static_entities(&file, &self.prefix))
    }
}

/// Converts static records into the labels a container would publish.
///
/// Each `host:port` record becomes definition `<host with . as _>_<port>` on
/// every address in its `ip` list. A record with `redirect` and no `ip` is
/// published on the synthetic address `redirect-<host>-<port>`.
pub fn static_entities(file: &StaticConfig, prefix: &str) -> EntityMap {
    let mut entities = EntityMap::new();
    let global_enabled = file.plugins.enabled_names();

    for (key, record) in &file.containers {
        let (hostname, port) = key.rsplit_once(':').unwrap_or((key.as_str(), "80"));
        let definition = format!("{}_{port}", hostname.replace('.', "_"));
        let label = |attr: &str| format!("{prefix}.{definition}.{attr}");

        if let (Some(redirect), None) = (&record.redirect, &record.ip) {
            let target = serde_json::json!({ hostname: yaml_to_string(redirect) });
            let labels = entities
                .entry(format!("redirect-{hostname}-{port}"))
                .or_default();
            labels.insert(label("host"), hostname.to_string());
            labels.insert(label("port"), port.to_string());
            labels.insert(label("redirect"), target.to_string());
            labels.insert(label("redirect_only"), "true".to_string());
            continue;
        }

        let mut shared = Labels::new();
        for attr in PASSTHROUGH_KEYS {
            if let Some(value) = record.options.get(attr) {
                shared.insert(label(attr), yaml_to_string(value));
            }
        }

        let plugins = record.plugin_names().unwrap_or_else(|| global_enabled.clone());
        if !plugins.is_empty() {
            shared.insert(label("plugins"), plugins.join(","));
            for name in &plugins {
                for (setting, value) in plugin_settings(file, record, name) {
                    shared.insert(label(&format!("plugin.{name}.{setting}")), value);
                }
            }
        }

        let addresses = record
            .ip
            .clone()
            .unwrap_or_else(|| vec![hostname.to_string()]);
        for spec in addresses {
            let (address, localport) = spec.rsplit_once(':').unwrap_or((spec.as_str(), "80"));

            let labels = entities.entry(address.to_string()).or_default();
            labels.insert(label("host"), hostname.to_string());
            labels.insert(label("port"), port.to_string());
            labels.insert(label("localport"), localport.to_string());
            labels.extend(shared.clone());
        }
    }

    entities
}

/// Global `plugins.config[name]` with the record's `plugin[name]` on top.
fn plugin_settings(file: &StaticConfig, record: &StaticContainer, name: &str) -> BTreeMap<String, String> {
    let mut settings = BTreeMap::new();
    for source in [file.plugins.config.get(name), record.plugin.get(name)]
        .into_iter()
        .flatten()
    {
        for (key, value) in source {
            settings.insert(key.clone(), yaml_to_string(value));
        }
    }
    settings
}
