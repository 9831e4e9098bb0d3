use super::command::server_args;
use super::error::CertError;
use crate::conf::CertbotOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// PEM bundle trusted in addition to the system roots.
pub const CA_BUNDLE_ENV: &str = "REQUESTS_CA_BUNDLE";

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Startup check that ACME issuance can work at all.
pub async fn check_acme_ready(settings: &CertbotOptions) -> Result<(), CertError> {
    let bundle = std::env::var_os(CA_BUNDLE_ENV).map(PathBuf::from);
    check_acme_ready_with(settings, bundle.as_deref()).await
}

/// The email must be set, and a server URL must serve an ACME directory.
///
/// Without a URL certbot talks to its default CA or to staging; neither is
/// probed.
pub async fn check_acme_ready_with(settings: &CertbotOptions, ca_bundle: Option<&Path>) -> Result<(), CertError> {
    if !settings.email_configured() {
        return Err(CertError::not_ready(
            "ACME email not configured (EASYHAPROXY_CERTBOT_EMAIL)",
        ));
    }

    let args = server_args(&settings.server);
    let [_, url] = args.as_slice() else {
        return Ok(());
    };

    let client = client(ca_bundle).map_err(|e| CertError::not_ready(format!("ACME server validation failed: {e}")))?;
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| CertError::not_ready(format!("ACME server {url} not reachable: {e}")))?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        return Err(CertError::not_ready(format!(
            "ACME server {url} returned HTTP {}",
            status.as_u16()
        )));
    }

    let directory = response.json::<serde_json::Value>().await.ok();
    if directory.as_ref().and_then(|d| d.get("newAccount")).is_none() {
        return Err(CertError::not_ready(format!(
            "ACME server {url} returned invalid ACME directory"
        )));
    }

    Ok(())
}

fn client(ca_bundle: Option<&Path>) -> Result<reqwest::Client, String> {
    let mut builder = reqwest::Client::builder().timeout(PROBE_TIMEOUT);

    if let Some(path) = ca_bundle {
        let pem = std::fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
        let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| e.to_string())?;
        builder = builder.add_root_certificate(cert);
    }

    builder.build().map_err(|e| e.to_string())
}
