use crate::conf::CertbotOptions;
use crate::paths::Paths;
use crate::render::CERTBOT_CHALLENGE_PORT;

/// `--server <url>` for a URL, `--staging` for the literal word, nothing otherwise.
pub fn server_args(server: &str) -> Vec<String> {
    let server = server.trim();
    if server.eq_ignore_ascii_case("staging") {
        vec!["--staging".to_string()]
    } else if server.to_ascii_lowercase().starts_with("http") {
        vec!["--server".to_string(), server.to_string()]
    } else {
        Vec::new()
    }
}

fn dir_args(paths: &Paths) -> Vec<String> {
    vec![
        "--config-dir".to_string(),
        paths.certs_certbot.display().to_string(),
        "--work-dir".to_string(),
        paths.acme_work_dir().display().to_string(),
        "--logs-dir".to_string(),
        paths.acme_logs_dir().display().to_string(),
    ]
}

/// Arguments of one `certonly` call issuing a certificate for every host.
pub fn certonly_args(settings: &CertbotOptions, paths: &Paths, hosts: &[String], verbose: bool) -> Vec<String> {
    let mut args = vec!["certonly".to_string()];
    args.extend(server_args(&settings.server));
    args.extend(dir_args(paths));
    args.extend(
        [
            "--preferred-challenges",
            settings.preferred_challenges.as_str(),
            "--agree-tos",
            "--issuance-timeout",
            "90",
            "--no-eff-email",
            "--non-interactive",
            "--max-log-backups=0",
        ]
        .map(String::from),
    );

    if !settings.eab_kid.is_empty() {
        args.extend(["--eab-kid".to_string(), settings.eab_kid.clone()]);
    }
    if !settings.eab_hmac_key.is_empty() {
        args.extend(["--eab-hmac-key".to_string(), settings.eab_hmac_key.clone()]);
    }

    for host in hosts {
        args.extend(["-d".to_string(), host.clone()]);
    }
    args.extend(["--email".to_string(), settings.email.clone()]);

    if settings.preferred_challenges.contains("http") {
        args.extend([
            "--http-01-port".to_string(),
            CERTBOT_CHALLENGE_PORT.to_string(),
            "--standalone".to_string(),
        ]);
    }

    if let Some(hook) = &settings.manual_auth_hook {
        args.extend([
            "--manual".to_string(),
            "--manual-auth-hook".to_string(),
            hook.clone(),
        ]);
    }

    if verbose {
        args.push("-v".to_string());
    }

    args
}

/// Arguments of the `renew` call; renews every certificate the client manages.
pub fn renew_args(paths: &Paths) -> Vec<String> {
    let mut args = vec!["renew".to_string()];
    args.extend(dir_args(paths));
    args
}
