use crate::conf::error::ConfigError;
use crate::conf::options::CertbotOptions;
use crate::logging::CERTBOT;
use serde::Deserialize;

pub const ZEROSSL_EAB_ENDPOINT: &str = "https://api.zerossl.com/acme/eab-credentials-email";
pub const ZEROSSL_DIRECTORY: &str = "https://acme.zerossl.com/v2/DV90";

/// ACME directory URL for a well-known CA name.
pub fn well_known_directory(name: &str) -> Option<&'static str> {
    match name {
        "letsencrypt" => Some("https://acme-v02.api.letsencrypt.org/directory"),
        "letsencrypt_test" => Some("https://acme-staging-v02.api.letsencrypt.org/directory"),
        "buypass" => Some("https://api.buypass.com/acme/directory"),
        "buypass_test" => Some("https://api.test4.buypass.no/acme/directory"),
        "sslcom_rca" => Some("https://acme.ssl.com/sslcom-dv-rsa"),
        "sslcom_ecc" => Some("https://acme.ssl.com/sslcom-dv-ecc"),
        "google" => Some("https://dv.acme-v02.api.pki.goog/directory"),
        "google_test" => Some("https://dv.acme-v02.test-api.pki.goog/directory"),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct ZeroSslResponse {
    #[serde(default)]
    success: bool,
    eab_kid: Option<String>,
    eab_hmac_key: Option<String>,
    error: Option<ZeroSslError>,
}

#[derive(Debug, Deserialize)]
struct ZeroSslError {
    #[serde(rename = "type", default)]
    kind: String,
}

/// Expands `certbot.autoconfig` into a directory URL (and EAB credentials for ZeroSSL).
pub async fn apply_autoconfig(certbot: &mut CertbotOptions) {
    apply_autoconfig_with(certbot, ZEROSSL_EAB_ENDPOINT).await
}

pub async fn apply_autoconfig_with(certbot: &mut CertbotOptions, zerossl_endpoint: &str) {
    let name = certbot.autoconfig.trim().to_string();
    if name.is_empty() || !certbot.server.is_empty() || !certbot.email_configured() {
        return;
    }

    if let Some(url) = well_known_directory(&name) {
        tracing::info!(target: CERTBOT, autoconfig = %name, server = url, "ACME server from autoconfig");
        certbot.server = url.to_string();
        return;
    }

    if name != "zerossl" {
        tracing::warn!(target: CERTBOT, autoconfig = %name, "unknown ACME autoconfig name ignored");
        return;
    }

    match request_zerossl(zerossl_endpoint, &certbot.email).await {
        Ok(resp) if resp.success => {
            certbot.server = ZEROSSL_DIRECTORY.to_string();
            certbot.eab_kid = resp.eab_kid.unwrap_or_default();
            certbot.eab_hmac_key = resp.eab_hmac_key.unwrap_or_default();
            tracing::info!(target: CERTBOT, server = ZEROSSL_DIRECTORY, "obtained ZeroSSL EAB credentials");
        }
        Ok(resp) => {
            let kind = resp.error.map(|e| e.kind).unwrap_or_default();
            certbot.email.clear();
            tracing::error!(target: CERTBOT, "Could not obtain ZeroSSL credentials {kind}");
        }
        Err(e) => {
            certbot.email.clear();
            tracing::error!(target: CERTBOT, error = %e, "Could not obtain ZeroSSL credentials");
        }
    }
}

async fn request_zerossl(endpoint: &str, email: &str) -> Result<ZeroSslResponse, ConfigError> {
    let client = reqwest::Client::new();
    client
        .post(endpoint)
        .form(&[("email", email)])
        .send()
        .await
        .map_err(|e| ConfigError::http(endpoint, e))?
        .json::<ZeroSslResponse>()
        .await
        .map_err(|e| ConfigError::http(endpoint, e))
}
