use crate::conf::error::ConfigError;
use crate::logging::LogLevels;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Per-plugin key/value settings.
pub type PluginConfig = BTreeMap<String, String>;

pub const DEFAULT_LABEL_PREFIX: &str = "easyhaproxy";
pub const DEFAULT_DASHBOARD_PORT: u16 = 9190;
pub const DEFAULT_STATS_PORT: u16 = 1936;
pub const DEFAULT_REFRESH_SECS: u64 = 10;

//-----------------------------------------------------------------------------
// Enumerations
//-----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoverMode {
    Static,
    Docker,
    Swarm,
    Kubernetes,
}

impl FromStr for DiscoverMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "docker" => Ok(Self::Docker),
            "swarm" => Ok(Self::Swarm),
            "kubernetes" => Ok(Self::Kubernetes),
            other => Err(ConfigError::invalid_value("discover", other)),
        }
    }
}

impl fmt::Display for DiscoverMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Static => "static",
            Self::Docker => "docker",
            Self::Swarm => "swarm",
            Self::Kubernetes => "kubernetes",
        })
    }
}

/// TLS policy applied to every `bind ... ssl` directive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    Strict,
    #[default]
    Default,
    Loose,
}

impl FromStr for SslMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "default" | "" => Ok(Self::Default),
            "loose" => Ok(Self::Loose),
            other => Err(ConfigError::invalid_value("ssl_mode", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    #[default]
    Auto,
    DaemonSet,
    NodePort,
    ClusterIp,
}

impl FromStr for DeploymentMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "daemonset" => Ok(Self::DaemonSet),
            "nodeport" => Ok(Self::NodePort),
            "clusterip" => Ok(Self::ClusterIp),
            other => Err(ConfigError::invalid_value("deployment_mode", other)),
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::DaemonSet => "daemonset",
            Self::NodePort => "nodeport",
            Self::ClusterIp => "clusterip",
        })
    }
}

//-----------------------------------------------------------------------------
// Option groups
//-----------------------------------------------------------------------------

/// Stats listener; only present when a password is configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsOptions {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub cors_origin: String,
}

impl StatsOptions {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            username: "admin".to_string(),
            password: password.into(),
            port: DEFAULT_STATS_PORT,
            cors_origin: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertbotOptions {
    pub autoconfig: String,
    pub email: String,
    pub server: String,
    pub eab_kid: String,
    pub eab_hmac_key: String,
    pub retry_count: u32,
    pub preferred_challenges: String,
    pub manual_auth_hook: Option<String>,
}

impl Default for CertbotOptions {
    fn default() -> Self {
        Self {
            autoconfig: String::new(),
            email: String::new(),
            server: String::new(),
            eab_kid: String::new(),
            eab_hmac_key: String::new(),
            retry_count: 60,
            preferred_challenges: "http".to_string(),
            manual_auth_hook: None,
        }
    }
}

impl CertbotOptions {
    pub fn email_configured(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginOptions {
    pub enabled: Vec<String>,
    pub abort_on_error: bool,
    pub dir: Option<PathBuf>,
    pub config: BTreeMap<String, PluginConfig>,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            enabled: Vec::new(),
            abort_on_error: false,
            dir: None,
            config: BTreeMap::new(),
        }
    }
}

impl PluginOptions {
    /// Globally enabled plugin names; blank entries are dropped so `[""]` means none.
    pub fn enabled_list(&self) -> Vec<String> {
        split_list(&self.enabled.join(","))
    }

    pub fn plugins_dir(&self, base: &Path) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| base.join("plugins"))
    }

    /// Collects `EASYHAPROXY_PLUGIN_<NAME>_<KEY>` variables into per-plugin settings.
    ///
    /// The plugin name is the third underscore-separated token and the key is
    /// everything after it; both are lowercased.
    pub fn config_from_env<I>(vars: I) -> BTreeMap<String, PluginConfig>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config: BTreeMap<String, PluginConfig> = BTreeMap::new();

        for (key, value) in vars {
            let Some(rest) = key.strip_prefix("EASYHAPROXY_PLUGIN_") else {
                continue;
            };
            let Some((name, setting)) = rest.split_once('_') else {
                continue;
            };
            if name.is_empty() || setting.is_empty() {
                continue;
            }

            config
                .entry(name.to_ascii_lowercase())
                .or_default()
                .insert(setting.to_ascii_lowercase(), value);
        }

        config
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KubernetesOptions {
    pub update_ingress_status: bool,
    pub deployment_mode: DeploymentMode,
    pub external_hostname: String,
    pub status_update_interval: Duration,
    pub pod_namespace: String,
}

impl Default for KubernetesOptions {
    fn default() -> Self {
        Self {
            update_ingress_status: true,
            deployment_mode: DeploymentMode::Auto,
            external_hostname: String::new(),
            status_update_interval: Duration::from_secs(30),
            pod_namespace: "easyhaproxy".to_string(),
        }
    }
}

//-----------------------------------------------------------------------------
// Options
//-----------------------------------------------------------------------------

/// Process-level configuration, built once at startup and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Options {
    pub discover: DiscoverMode,
    pub label_prefix: String,
    pub ssl_mode: SslMode,
    pub refresh_interval: Duration,
    pub custom_errors: bool,
    pub stats: Option<StatsOptions>,
    pub certbot: CertbotOptions,
    pub plugins: PluginOptions,
    pub kubernetes: KubernetesOptions,
    pub log_levels: LogLevels,
    pub dashboard_port: u16,
    pub haproxy_bin: PathBuf,
    pub certbot_bin: PathBuf,
}

impl Options {
    pub fn new(discover: DiscoverMode) -> Self {
        Self {
            discover,
            label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
            ssl_mode: SslMode::Default,
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_SECS),
            custom_errors: false,
            stats: None,
            certbot: CertbotOptions::default(),
            plugins: PluginOptions::default(),
            kubernetes: KubernetesOptions::default(),
            log_levels: LogLevels::default(),
            dashboard_port: DEFAULT_DASHBOARD_PORT,
            haproxy_bin: PathBuf::from("/usr/sbin/haproxy"),
            certbot_bin: PathBuf::from("/usr/bin/certbot"),
        }
    }

    /// JSON view handed to plugins as their environment.
    pub fn to_plugin_env(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Splits a comma list, trimming entries and dropping blanks.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Locates `name` on `PATH`, falling back to `fallback`.
pub fn find_binary(name: &str, fallback: &str) -> PathBuf {
    std::env::var_os("PATH")
        .and_then(|path| {
            std::env::split_paths(&path)
                .map(|dir| dir.join(name))
                .find(|candidate| candidate.is_file())
        })
        .unwrap_or_else(|| PathBuf::from(fallback))
}
