use super::{DEFAULT_DENY_STATUS, config_bool, config_list, config_status};
use crate::conf::PluginConfig;
use crate::logging::EASYHAPROXY;
use crate::plugin::core::errors::PluginError;
use crate::plugin::core::result::PluginResult;
use crate::plugin::core::{Plugin, PluginContext, PluginKind};
use ipnet::IpNet;
use std::net::IpAddr;

/// Denies every client outside the allowed addresses and networks.
pub struct IpWhitelistPlugin {
    enabled: bool,
    allowed_ips: Vec<String>,
    status_code: u16,
}

impl Default for IpWhitelistPlugin {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_ips: Vec::new(),
            status_code: DEFAULT_DENY_STATUS,
        }
    }
}

fn is_valid_source(entry: &str) -> bool {
    entry.parse::<IpNet>().is_ok() || entry.parse::<IpAddr>().is_ok()
}

impl Plugin for IpWhitelistPlugin {
    fn name(&self) -> &str {
        "ip_whitelist"
    }

    fn kind(&self) -> PluginKind {
        PluginKind::Route
    }

    fn configure(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        self.enabled = config_bool(config, "enabled", true);
        self.status_code = config_status(config);
        self.allowed_ips = config_list(config, "allowed_ips")
            .into_iter()
            .filter(|entry| {
                let valid = is_valid_source(entry);
                if !valid {
                    tracing::warn!(target: EASYHAPROXY, entry = %entry, "ip_whitelist: dropping invalid address");
                }
                valid
            })
            .collect();
        Ok(())
    }

    fn process(&mut self, ctx: &PluginContext<'_>) -> Result<PluginResult, PluginError> {
        if !self.enabled || self.allowed_ips.is_empty() {
            return Ok(PluginResult::default());
        }

        let snippet = format!(
            "# IP Whitelist - Only allow specific IPs\n\
             acl whitelisted_ip src {}\n\
             http-request deny deny_status {} if !whitelisted_ip",
            self.allowed_ips.join(" "),
            self.status_code
        );

        Ok(PluginResult::snippet(snippet)
            .with_metadata("domain", ctx.domain)
            .with_metadata("allowed_ips", self.allowed_ips.clone())
            .with_metadata("status_code", self.status_code))
    }
}
