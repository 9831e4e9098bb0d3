use super::config_bool;
use crate::conf::PluginConfig;
use crate::plugin::core::errors::PluginError;
use crate::plugin::core::result::PluginResult;
use crate::plugin::core::{Plugin, PluginContext, PluginKind};

const DEFAULT_IP_LIST_PATH: &str = "/etc/haproxy/cloudflare_ips.lst";

/// Restores the visitor address from `CF-Connecting-IP` for requests arriving
/// from Cloudflare ranges.
pub struct CloudflarePlugin {
    enabled: bool,
    ip_list_path: String,
}

impl Default for CloudflarePlugin {
    fn default() -> Self {
        Self {
            enabled: true,
            ip_list_path: DEFAULT_IP_LIST_PATH.to_string(),
        }
    }
}

impl Plugin for CloudflarePlugin {
    fn name(&self) -> &str {
        "cloudflare"
    }

    fn kind(&self) -> PluginKind {
        PluginKind::Route
    }

    fn configure(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        *self = Self::default();
        self.enabled = config_bool(config, "enabled", true);
        if let Some(path) = config.get("ip_list_path") {
            self.ip_list_path = path.clone();
        }
        Ok(())
    }

    fn process(&mut self, ctx: &PluginContext<'_>) -> Result<PluginResult, PluginError> {
        if !self.enabled {
            return Ok(PluginResult::default());
        }

        let snippet = format!(
            "# Cloudflare - Restore original visitor IP\n\
             acl from_cloudflare src -f {}\n\
             http-request set-header X-Forwarded-For %[req.hdr(CF-Connecting-IP)] if from_cloudflare",
            self.ip_list_path
        );

        Ok(PluginResult::snippet(snippet)
            .with_metadata("domain", ctx.domain)
            .with_metadata("ip_list_path", self.ip_list_path.as_str()))
    }
}
