use super::error::CertError;
use crate::logging::CERTBOT;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Runs the external ACME client.
#[async_trait]
pub trait AcmeClient: Send + Sync {
    /// Runs one invocation; `Ok(true)` when it exited successfully.
    async fn run(&self, args: &[String]) -> Result<bool, CertError>;
}

/// The `certbot` binary, output forwarded to the certbot log target.
pub struct CertbotProcess {
    bin: PathBuf,
}

impl CertbotProcess {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl AcmeClient for CertbotProcess {
    async fn run(&self, args: &[String]) -> Result<bool, CertError> {
        tracing::debug!(target: CERTBOT, program = %self.bin.display(), args = %args.join(" "), "running ACME client");

        let output = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CertError::spawn(&self.bin, e))?;

        for line in String::from_utf8_lossy(&output.stdout).lines().filter(|l| !l.trim().is_empty()) {
            tracing::info!(target: CERTBOT, "{line}");
        }
        for line in String::from_utf8_lossy(&output.stderr).lines().filter(|l| !l.trim().is_empty()) {
            tracing::warn!(target: CERTBOT, "{line}");
        }

        if !output.status.success() {
            tracing::error!(target: CERTBOT, status = %output.status, "ACME client failed");
        }
        Ok(output.status.success())
    }
}
