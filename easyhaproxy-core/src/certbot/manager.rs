use super::client::AcmeClient;
use super::command::{certonly_args, renew_args};
use super::error::CertError;
use super::status::{CertStatus, certificate_status};
use crate::conf::CertbotOptions;
use crate::logging::CERTBOT;
use crate::paths::Paths;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Keeps ACME certificates present and fresh for the hosts that ask for them.
///
/// A host whose issuance failed is frozen for `retry_count` ticks before it
/// is tried again.
pub struct CertificateManager {
    settings: CertbotOptions,
    paths: Paths,
    client: Box<dyn AcmeClient>,
    freeze: BTreeMap<String, u32>,
    verbose: bool,
}

impl CertificateManager {
    pub fn new(settings: CertbotOptions, paths: Paths, client: Box<dyn AcmeClient>) -> Self {
        Self {
            settings,
            paths,
            client,
            freeze: BTreeMap::new(),
            verbose: false,
        }
    }

    /// Passes `-v` to the client.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn enabled(&self) -> bool {
        self.settings.email_configured()
    }

    /// Remaining frozen ticks for `host`.
    pub fn frozen(&self, host: &str) -> Option<u32> {
        self.freeze.get(host).copied()
    }

    /// Requests missing or expired certificates and renews expiring ones.
    ///
    /// Returns true when the ACME client was invoked, so the caller reloads
    /// the proxy even if routes did not change.
    pub async fn check_certificates(&mut self, hosts: &[String]) -> bool {
        self.check_certificates_at(hosts, Utc::now()).await
    }

    pub async fn check_certificates_at(&mut self, hosts: &[String], now: DateTime<Utc>) -> bool {
        if !self.enabled() || hosts.is_empty() {
            return false;
        }

        let mut request = Vec::new();
        let mut renew = Vec::new();

        for host in hosts {
            let status = certificate_status(&self.paths.haproxy_cert(host), now);
            if matches!(status, CertStatus::Ok | CertStatus::Error) {
                continue;
            }

            if let Some(remaining) = self.freeze.get_mut(host) {
                tracing::debug!(target: CERTBOT, host = %host, remaining = *remaining, "waiting freeze period after previous errors");
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    self.freeze.remove(host);
                }
                continue;
            }

            match status {
                CertStatus::NotFound | CertStatus::Expired => {
                    tracing::debug!(target: CERTBOT, host = %host, status = %status, "requesting new certificate");
                    request.push(host.clone());
                }
                CertStatus::Expiring => {
                    tracing::debug!(target: CERTBOT, host = %host, status = %status, "renewing certificate");
                    renew.push(host.clone());
                }
                CertStatus::Ok | CertStatus::Error => {}
            }
        }

        let mut acted = false;
        let mut issued = true;
        let mut renewed = true;

        if !request.is_empty() {
            let args = certonly_args(&self.settings, &self.paths, &request, self.verbose);
            issued = self.invoke(&args).await;
            acted = true;
        }

        if !renew.is_empty() {
            renewed = self.invoke(&renew_args(&self.paths)).await;
            acted = true;
        }

        if acted {
            self.merge_live();
        }
        if !issued {
            self.freeze_failed(&request, now);
        }
        if !renewed {
            self.freeze_failed(&renew, now);
        }

        acted
    }

    async fn invoke(&self, args: &[String]) -> bool {
        match self.client.run(args).await {
            Ok(success) => success,
            Err(e) => {
                tracing::error!(target: CERTBOT, error = %e, "ACME client could not be run");
                false
            }
        }
    }

    fn freeze_failed(&mut self, hosts: &[String], now: DateTime<Utc>) {
        for host in hosts {
            let status = certificate_status(&self.paths.haproxy_cert(host), now);
            if status == CertStatus::Ok {
                continue;
            }

            tracing::debug!(target: CERTBOT, host = %host, status = %status, retry_count = self.settings.retry_count, "freezing certificate issuance after failure");
            if self.settings.retry_count > 0 {
                self.freeze.insert(host.clone(), self.settings.retry_count);
            }
        }
    }

    /// Writes `cert.pem` + `privkey.pem` of every live ACME directory into the
    /// proxy certificate directory. Returns how many files were written.
    pub fn merge_live(&self) -> usize {
        let live = self.paths.acme_live_dir();
        let Ok(entries) = fs::read_dir(&live) else {
            return 0;
        };

        let mut merged = 0;
        for entry in entries.flatten() {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();

            match merge_one(&dir, &self.paths.haproxy_cert(&name)) {
                Ok(()) => merged += 1,
                Err(e) => tracing::warn!(target: CERTBOT, dir = %dir.display(), error = %e, "skipping live certificate"),
            }
        }
        merged
    }
}

fn merge_one(dir: &Path, target: &Path) -> Result<(), CertError> {
    let read = |file: &str| {
        let path = dir.join(file);
        fs::read(&path).map_err(|e| CertError::read(path, e))
    };

    let mut pem = read("cert.pem")?;
    pem.extend(read("privkey.pem")?);

    fs::write(target, pem).map_err(|e| CertError::write(target, e))
}
