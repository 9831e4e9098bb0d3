pub mod cleanup;
pub mod cloudflare;
pub mod deny_pages;
pub mod fastcgi;
pub mod ip_whitelist;
pub mod jwt_validator;

use crate::conf::PluginConfig;
use crate::labels::parse_bool;

const DEFAULT_DENY_STATUS: u16 = 403;

fn config_bool(config: &PluginConfig, key: &str, default: bool) -> bool {
    config.get(key).map(|v| parse_bool(v)).unwrap_or(default)
}

fn config_list(config: &PluginConfig, key: &str) -> Vec<String> {
    config
        .get(key)
        .map(|v| crate::conf::split_list(v))
        .unwrap_or_default()
}

/// Unparseable status codes fall back to 403.
fn config_status(config: &PluginConfig) -> u16 {
    config
        .get("status_code")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(DEFAULT_DENY_STATUS)
}
