use super::config_bool;
use crate::conf::PluginConfig;
use crate::logging::EASYHAPROXY;
use crate::plugin::core::errors::PluginError;
use crate::plugin::core::result::{PluginResult, ResourceRequest};
use crate::plugin::core::{Plugin, PluginContext, PluginKind};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::PathBuf;

pub const JWT_KEYS_DIR: &str = "/etc/haproxy/jwt_keys";

/// Validates bearer tokens (algorithm, issuer, audience, signature, expiry).
pub struct JwtValidatorPlugin {
    enabled: bool,
    algorithm: String,
    issuer: Option<String>,
    audience: Option<String>,
    pubkey_path: Option<String>,
    pubkey: Option<String>,
}

impl Default for JwtValidatorPlugin {
    fn default() -> Self {
        Self {
            enabled: true,
            algorithm: "RS256".to_string(),
            issuer: None,
            audience: None,
            pubkey_path: None,
            pubkey: None,
        }
    }
}

fn non_empty(config: &PluginConfig, key: &str) -> Option<String> {
    config
        .get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl JwtValidatorPlugin {
    /// Inline keys may be raw PEM or base64-encoded PEM.
    fn decode_pubkey(&self, domain: Option<&str>, raw: &str) -> Result<String, PluginError> {
        if raw.trim_start().starts_with("-----BEGIN") {
            return Ok(raw.to_string());
        }

        let bytes = STANDARD
            .decode(raw.trim())
            .map_err(|e| PluginError::execute(self.name(), domain, format!("invalid base64 pubkey: {e}")))?;
        String::from_utf8(bytes)
            .map_err(|e| PluginError::execute(self.name(), domain, format!("pubkey is not UTF-8: {e}")))
    }
}

impl Plugin for JwtValidatorPlugin {
    fn name(&self) -> &str {
        "jwt_validator"
    }

    fn kind(&self) -> PluginKind {
        PluginKind::Route
    }

    fn configure(&mut self, config: &PluginConfig) -> Result<(), PluginError> {
        *self = Self::default();
        self.enabled = config_bool(config, "enabled", true);
        if let Some(algorithm) = non_empty(config, "algorithm") {
            self.algorithm = algorithm;
        }
        self.issuer = non_empty(config, "issuer");
        self.audience = non_empty(config, "audience");
        self.pubkey_path = non_empty(config, "pubkey_path");
        self.pubkey = non_empty(config, "pubkey");
        Ok(())
    }

    fn process(&mut self, ctx: &PluginContext<'_>) -> Result<PluginResult, PluginError> {
        if !self.enabled {
            return Ok(PluginResult::default());
        }

        let mut resources = Vec::new();
        let pubkey_file = match (&self.pubkey_path, &self.pubkey) {
            (Some(path), _) => path.clone(),
            (None, Some(inline)) => {
                let path = PathBuf::from(JWT_KEYS_DIR).join(format!("{}_pubkey.pem", ctx.domain_safe()));
                resources.push(ResourceRequest::File {
                    path: path.clone(),
                    content: self.decode_pubkey(ctx.domain, inline)?,
                    overwrite: true,
                });
                path.to_string_lossy().into_owned()
            }
            (None, None) => {
                tracing::warn!(target: EASYHAPROXY, domain = ctx.domain, "jwt_validator: no pubkey or pubkey_path configured");
                return Ok(PluginResult::default());
            }
        };

        let deny = "http-request deny content-type 'text/html' string";
        let mut lines = vec![
            "# JWT Validator - Validate JWT tokens".to_string(),
            format!("{deny} 'Missing Authorization HTTP header' unless {{ req.hdr(authorization) -m found }}"),
            String::new(),
            "# Extract JWT header and payload".to_string(),
            "http-request set-var(txn.alg) http_auth_bearer,jwt_header_query('$.alg')".to_string(),
            "http-request set-var(txn.iss) http_auth_bearer,jwt_payload_query('$.iss')".to_string(),
            "http-request set-var(txn.aud) http_auth_bearer,jwt_payload_query('$.aud')".to_string(),
            "http-request set-var(txn.exp) http_auth_bearer,jwt_payload_query('$.exp','int')".to_string(),
            String::new(),
            "# Validate JWT".to_string(),
            format!(
                "{deny} 'Unsupported JWT signing algorithm' unless {{ var(txn.alg) -m str {} }}",
                self.algorithm
            ),
        ];
        if let Some(issuer) = &self.issuer {
            lines.push(format!("{deny} 'Invalid JWT issuer' unless {{ var(txn.iss) -m str {issuer} }}"));
        }
        if let Some(audience) = &self.audience {
            lines.push(format!("{deny} 'Invalid JWT audience' unless {{ var(txn.aud) -m str {audience} }}"));
        }
        lines.push(format!(
            "{deny} 'Invalid JWT signature' unless {{ http_auth_bearer,jwt_verify(txn.alg,\"{pubkey_file}\") -m int 1 }}"
        ));
        lines.push(String::new());
        lines.push("# Validate expiration".to_string());
        lines.push("http-request set-var(txn.now) date()".to_string());
        lines.push(format!("{deny} 'JWT has expired' if {{ var(txn.exp),sub(txn.now) -m int lt 0 }}"));

        let mut result = PluginResult::snippet(lines.join("\n"))
            .with_metadata("domain", ctx.domain)
            .with_metadata("algorithm", self.algorithm.as_str())
            .with_metadata("pubkey_file", pubkey_file.as_str())
            .with_metadata("validates_issuer", self.issuer.is_some())
            .with_metadata("validates_audience", self.audience.is_some());
        result.resources = resources;

        Ok(result)
    }
}
