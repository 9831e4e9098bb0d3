use crate::conf::SslMode;

const TLS13_SUITES: &str = "TLS_AES_128_GCM_SHA256:TLS_AES_256_GCM_SHA384:TLS_CHACHA20_POLY1305_SHA256";

const MODERN_CIPHERS: &str = "ECDHE-ECDSA-AES128-GCM-SHA256:ECDHE-RSA-AES128-GCM-SHA256:\
ECDHE-ECDSA-AES256-GCM-SHA384:ECDHE-RSA-AES256-GCM-SHA384:\
ECDHE-ECDSA-CHACHA20-POLY1305:ECDHE-RSA-CHACHA20-POLY1305:\
DHE-RSA-AES128-GCM-SHA256:DHE-RSA-AES256-GCM-SHA384";

/// `ssl-default-bind-*` directives for the global section.
pub(crate) fn bind_directives(mode: SslMode) -> Vec<String> {
    match mode {
        SslMode::Strict => vec![
            format!("ssl-default-bind-ciphersuites {TLS13_SUITES}"),
            "ssl-default-bind-options ssl-min-ver TLSv1.3 no-tls-tickets".to_string(),
        ],
        SslMode::Default => vec![
            format!("ssl-default-bind-ciphers {MODERN_CIPHERS}"),
            format!("ssl-default-bind-ciphersuites {TLS13_SUITES}"),
            "ssl-default-bind-options ssl-min-ver TLSv1.2 no-tls-tickets".to_string(),
        ],
        SslMode::Loose => vec![
            "ssl-default-bind-ciphers ALL:@SECLEVEL=0".to_string(),
            format!("ssl-default-bind-ciphersuites {TLS13_SUITES}"),
            "ssl-default-bind-options ssl-min-ver TLSv1.0".to_string(),
        ],
    }
}
