use crate::certbot::check_acme_ready;
use crate::conf::{CertbotOptions, ConfigError, DiscoverMode, Options, StaticConfig, apply_autoconfig};
use crate::logging::{CERTBOT, single_line};
use crate::paths::Paths;

/// Applies the option blocks of the static file in static mode.
///
/// Runs before logging is installed, so a failure is handed back with the
/// unmodified options for the caller to log later.
pub fn load_static_options(options: Options, paths: &Paths) -> (Options, Option<ConfigError>) {
    if options.discover != DiscoverMode::Static || !paths.static_config.exists() {
        return (options, None);
    }

    let merged = StaticConfig::load(&paths.static_config)
        .and_then(|file| options.clone().merge_static(&file));
    match merged {
        Ok(merged) => (merged, None),
        Err(e) => (options, Some(e)),
    }
}

/// Expands autoconfig and probes the ACME server once.
///
/// A failed probe is only reported; certificate management stays on and
/// each issuance reports its own failures.
pub async fn prepare_acme(certbot: &mut CertbotOptions) {
    if !certbot.email_configured() {
        return;
    }

    apply_autoconfig(certbot).await;
    if !certbot.email_configured() {
        return;
    }

    match check_acme_ready(certbot).await {
        Ok(()) => {
            tracing::info!(target: CERTBOT, server = %certbot.server, "ACME server ready");
        }
        Err(e) => {
            tracing::warn!(target: CERTBOT, reason = %single_line(&e.to_string()), "ACME server not ready, certificate auto-renewal may fail");
        }
    }
}
