mod client;
mod command;
mod error;
mod manager;
mod probe;
mod status;

#[cfg(test)]
mod tests;

pub use client::{AcmeClient, CertbotProcess};
pub use command::{certonly_args, renew_args, server_args};
pub use error::CertError;
pub use manager::CertificateManager;
pub use probe::{CA_BUNDLE_ENV, check_acme_ready, check_acme_ready_with};
pub use status::{CertStatus, EXPIRING_DAYS, certificate_status};
