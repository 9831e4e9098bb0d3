use super::error::CertError;
use crate::logging::CERTBOT;
use chrono::{DateTime, Utc};
use openssl::asn1::Asn1Time;
use openssl::x509::X509;
use std::fmt;
use std::fs;
use std::path::Path;

/// A certificate with this many whole days left is renewed.
pub const EXPIRING_DAYS: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertStatus {
    NotFound,
    Expired,
    Expiring,
    Ok,
    Error,
}

impl fmt::Display for CertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::Expiring => "expiring",
            Self::Ok => "ok",
            Self::Error => "error",
        })
    }
}

/// Status of the PEM at `path` relative to `now`.
pub fn certificate_status(path: &Path, now: DateTime<Utc>) -> CertStatus {
    if !path.exists() {
        return CertStatus::NotFound;
    }

    let not_after = match not_after(path) {
        Ok(time) => time,
        Err(e) => {
            tracing::error!(target: CERTBOT, error = %e, "certificate error");
            return CertStatus::Error;
        }
    };

    if now >= not_after {
        CertStatus::Expired
    } else if (not_after - now).num_days() <= EXPIRING_DAYS {
        CertStatus::Expiring
    } else {
        CertStatus::Ok
    }
}

fn not_after(path: &Path) -> Result<DateTime<Utc>, CertError> {
    let pem = fs::read(path).map_err(|e| CertError::read(path, e))?;
    let cert = X509::from_pem(&pem).map_err(|e| CertError::parse(path, e))?;

    let epoch = Asn1Time::from_unix(0).map_err(|e| CertError::parse(path, e))?;
    let since_epoch = epoch
        .diff(cert.not_after())
        .map_err(|e| CertError::parse(path, e))?;
    let seconds = i64::from(since_epoch.days) * 86_400 + i64::from(since_epoch.secs);

    Ok(DateTime::from_timestamp(seconds, 0).unwrap_or(DateTime::UNIX_EPOCH))
}
