pub mod logs;
pub mod render;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result, anyhow};
use clap::Args;
use easyhaproxy_core::conf::{
    DEFAULT_DASHBOARD_PORT, DEFAULT_LABEL_PREFIX, DEFAULT_STATS_PORT, Options, PluginOptions,
    StatsOptions, find_binary, split_list,
};
use easyhaproxy_core::labels::parse_bool;
use easyhaproxy_core::logging::{LogLevel, LogLevels};
use easyhaproxy_core::paths::{DEFAULT_ADMIN_SOCKET, DEFAULT_PID_FILE, Paths};
use std::path::PathBuf;
use std::time::Duration;

/// Driver settings; every flag can also come from its environment variable.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Service discovery mode
    #[arg(long, env = "EASYHAPROXY_DISCOVER", value_parser = ["static", "docker", "swarm", "kubernetes"])]
    pub discover: Option<String>,

    /// Base directory for every generated and managed file
    #[arg(long, env = "EASYHAPROXY_BASE_PATH")]
    pub base_path: Option<PathBuf>,

    /// Prefix of the labels and annotations that describe routes
    #[arg(long, env = "EASYHAPROXY_LABEL_PREFIX", default_value = DEFAULT_LABEL_PREFIX)]
    pub label_prefix: String,

    /// TLS policy: strict, default or loose
    #[arg(long, env = "EASYHAPROXY_SSL_MODE", default_value = "default")]
    pub ssl_mode: String,

    /// Seconds between reconcile passes
    #[arg(long, env = "EASYHAPROXY_REFRESH_CONF", default_value_t = 10)]
    pub refresh_conf: u64,

    /// Serve the curated HAProxy error pages
    #[arg(long, env = "HAPROXY_CUSTOMERRORS", default_value = "false")]
    pub customer_errors: String,

    #[arg(long, env = "HAPROXY_USERNAME", default_value = "admin")]
    pub haproxy_username: String,

    /// Enables the stats listener
    #[arg(long, env = "HAPROXY_PASSWORD")]
    pub haproxy_password: Option<String>,

    #[arg(long, env = "HAPROXY_STATS_PORT", default_value_t = DEFAULT_STATS_PORT)]
    pub haproxy_stats_port: u16,

    #[arg(long, env = "HAPROXY_STATS_CORS_ORIGIN", default_value = "")]
    pub haproxy_stats_cors_origin: String,

    /// ACME contact email; certificate management is off without it
    #[arg(long, env = "EASYHAPROXY_CERTBOT_EMAIL", default_value = "")]
    pub certbot_email: String,

    /// Well-known CA name expanded into a directory URL
    #[arg(long, env = "EASYHAPROXY_CERTBOT_AUTOCONFIG", default_value = "")]
    pub certbot_autoconfig: String,

    #[arg(long, env = "EASYHAPROXY_CERTBOT_SERVER", default_value = "")]
    pub certbot_server: String,

    #[arg(long, env = "EASYHAPROXY_CERTBOT_EAB_KID", default_value = "")]
    pub certbot_eab_kid: String,

    #[arg(long, env = "EASYHAPROXY_CERTBOT_EAB_HMAC_KEY", default_value = "")]
    pub certbot_eab_hmac_key: String,

    /// Passes to wait before retrying a host whose issuance failed
    #[arg(long, env = "EASYHAPROXY_CERTBOT_RETRY_COUNT", default_value_t = 60)]
    pub certbot_retry_count: u32,

    #[arg(long, env = "EASYHAPROXY_CERTBOT_PREFERRED_CHALLENGES", default_value = "http")]
    pub certbot_preferred_challenges: String,

    #[arg(long, env = "EASYHAPROXY_CERTBOT_MANUAL_AUTH_HOOK")]
    pub certbot_manual_auth_hook: Option<String>,

    /// Comma list of globally enabled plugins
    #[arg(long, env = "EASYHAPROXY_PLUGINS_ENABLED", default_value = "")]
    pub plugins_enabled: String,

    #[arg(long, env = "EASYHAPROXY_PLUGINS_ABORT_ON_ERROR", default_value = "false")]
    pub plugins_abort_on_error: String,

    /// Directory scanned for `*.wasm` plugins
    #[arg(long, env = "EASYHAPROXY_PLUGINS_DIR")]
    pub plugins_dir: Option<PathBuf>,

    #[arg(long, env = "EASYHAPROXY_UPDATE_INGRESS_STATUS", default_value = "true")]
    pub update_ingress_status: String,

    /// auto, daemonset, nodeport or clusterip
    #[arg(long, env = "EASYHAPROXY_DEPLOYMENT_MODE", default_value = "auto")]
    pub deployment_mode: String,

    #[arg(long, env = "EASYHAPROXY_EXTERNAL_HOSTNAME", default_value = "")]
    pub external_hostname: String,

    /// Seconds the ingress status addresses are cached
    #[arg(long, env = "EASYHAPROXY_STATUS_UPDATE_INTERVAL", default_value_t = 30)]
    pub ingress_status_update_interval: u64,

    #[arg(long, env = "POD_NAMESPACE", default_value = "easyhaproxy")]
    pub pod_namespace: String,

    #[arg(long, env = "EASYHAPROXY_DASHBOARD_PORT", default_value_t = DEFAULT_DASHBOARD_PORT)]
    pub dashboard_port: u16,

    #[arg(long, env = "HAPROXY_BIN")]
    pub haproxy_bin: Option<PathBuf>,

    #[arg(long, env = "CERTBOT_BIN")]
    pub certbot_bin: Option<PathBuf>,

    #[arg(long, env = "EASYHAPROXY_LOG_LEVEL", default_value = "DEBUG")]
    pub log_level: String,

    #[arg(long, env = "HAPROXY_LOG_LEVEL", default_value = "INFO")]
    pub haproxy_log_level: String,

    #[arg(long, env = "CERTBOT_LOG_LEVEL", default_value = "DEBUG")]
    pub certbot_log_level: String,

    #[arg(long, env = "HAPROXY_PID_FILE", default_value = DEFAULT_PID_FILE)]
    pub haproxy_pid_file: PathBuf,

    #[arg(long, env = "HAPROXY_ADMIN_SOCKET", default_value = DEFAULT_ADMIN_SOCKET)]
    pub haproxy_admin_socket: PathBuf,
}

impl RunArgs {
    /// Builds the process options and file layout.
    pub fn resolve(&self) -> Result<(Options, Paths)> {
        let discover = self
            .discover
            .as_deref()
            .ok_or_else(|| anyhow!("--discover (EASYHAPROXY_DISCOVER) is required"))?
            .parse()?;

        let mut options = Options::new(discover);
        options.label_prefix = self.label_prefix.clone();
        options.ssl_mode = self.ssl_mode.parse().context("invalid --ssl-mode")?;
        options.refresh_interval = Duration::from_secs(self.refresh_conf.max(1));
        options.custom_errors = parse_bool(&self.customer_errors);
        options.dashboard_port = self.dashboard_port;

        options.stats = self
            .haproxy_password
            .as_deref()
            .filter(|password| !password.is_empty())
            .map(|password| StatsOptions {
                username: self.haproxy_username.clone(),
                port: self.haproxy_stats_port,
                cors_origin: self.haproxy_stats_cors_origin.clone(),
                ..StatsOptions::new(password)
            });

        let certbot = &mut options.certbot;
        certbot.email = self.certbot_email.trim().to_string();
        certbot.autoconfig = self.certbot_autoconfig.trim().to_string();
        certbot.server = self.certbot_server.trim().to_string();
        certbot.eab_kid = self.certbot_eab_kid.clone();
        certbot.eab_hmac_key = self.certbot_eab_hmac_key.clone();
        certbot.retry_count = self.certbot_retry_count;
        certbot.preferred_challenges = self.certbot_preferred_challenges.clone();
        certbot.manual_auth_hook = self
            .certbot_manual_auth_hook
            .clone()
            .filter(|hook| !hook.is_empty());

        options.plugins = PluginOptions {
            enabled: split_list(&self.plugins_enabled),
            abort_on_error: parse_bool(&self.plugins_abort_on_error),
            dir: self.plugins_dir.clone(),
            config: PluginOptions::config_from_env(std::env::vars()),
        };

        let kubernetes = &mut options.kubernetes;
        kubernetes.update_ingress_status = parse_bool(&self.update_ingress_status);
        kubernetes.deployment_mode = self
            .deployment_mode
            .parse()
            .context("invalid --deployment-mode")?;
        kubernetes.external_hostname = self.external_hostname.trim().to_string();
        kubernetes.status_update_interval = Duration::from_secs(self.ingress_status_update_interval);
        kubernetes.pod_namespace = self.pod_namespace.clone();

        options.log_levels = self.log_levels();
        options.haproxy_bin = self
            .haproxy_bin
            .clone()
            .unwrap_or_else(|| find_binary("haproxy", "/usr/sbin/haproxy"));
        options.certbot_bin = self
            .certbot_bin
            .clone()
            .unwrap_or_else(|| find_binary("certbot", "/usr/bin/certbot"));

        let base = self.base_path.clone().unwrap_or_else(Paths::default_base);
        let paths = Paths::new(base)
            .with_pid_file(&self.haproxy_pid_file)
            .with_admin_socket(&self.haproxy_admin_socket);

        Ok((options, paths))
    }

    fn log_levels(&self) -> LogLevels {
        let defaults = LogLevels::default();
        LogLevels {
            easyhaproxy: LogLevel::parse_or(&self.log_level, defaults.easyhaproxy),
            haproxy: LogLevel::parse_or(&self.haproxy_log_level, defaults.haproxy),
            certbot: LogLevel::parse_or(&self.certbot_log_level, defaults.certbot),
        }
    }
}
