use super::api::ClusterApi;
use crate::logging::EASYHAPROXY;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::BTreeMap;

pub(crate) const PLUGIN_ANNOTATION: &str = "easyhaproxy.plugin.";
const SECRET_MARKER: &str = ".k8s_secret.";

/// Alternative data keys probed when a secret reference names no key.
pub(crate) fn synonyms(key: &str) -> &'static [&'static str] {
    match key {
        "pubkey" => &["public-key", "jwt.pub", "tls.crt"],
        "password" => &["pass", "pwd"],
        "api_key" => &["apikey", "api-key", "key"],
        _ => &[],
    }
}

/// Plugin annotations of one ingress with `k8s_secret` references resolved.
///
/// `easyhaproxy.plugin.X.k8s_secret.KEY: secret[/data_key]` becomes
/// `easyhaproxy.plugin.X.KEY: <base64 of the secret value>`, unless an
/// explicit `easyhaproxy.plugin.X.KEY` annotation is present.
pub(crate) async fn plugin_annotations(
    api: &dyn ClusterApi,
    namespace: &str,
    ingress: &str,
    annotations: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut resolved = BTreeMap::new();
    let mut explicit = BTreeMap::new();

    for (key, value) in annotations.range(PLUGIN_ANNOTATION.to_string()..) {
        if !key.starts_with(PLUGIN_ANNOTATION) {
            break;
        }
        let Some((prefix, config_key)) = key.split_once(SECRET_MARKER) else {
            explicit.insert(key.clone(), value.clone());
            continue;
        };

        let target = format!("{prefix}.{config_key}");
        if let Some(content) = read_secret_value(api, namespace, ingress, config_key, value).await {
            tracing::info!(target: EASYHAPROXY, ingress, key = config_key, annotation = %target, "loaded plugin setting from secret");
            resolved.insert(target, content);
        }
    }

    for (key, value) in resolved {
        if explicit.contains_key(&key) {
            tracing::debug!(target: EASYHAPROXY, ingress, annotation = %key, "explicit annotation wins over secret reference");
            continue;
        }
        explicit.insert(key, value);
    }

    explicit
}

async fn read_secret_value(
    api: &dyn ClusterApi,
    namespace: &str,
    ingress: &str,
    config_key: &str,
    reference: &str,
) -> Option<String> {
    let (secret_name, candidates): (&str, Vec<&str>) = match reference.split_once('/') {
        Some((name, data_key)) => (name, vec![data_key]),
        None => {
            let mut keys = vec![config_key];
            keys.extend_from_slice(synonyms(config_key));
            (reference, keys)
        }
    };

    let secret = match api.secret(namespace, secret_name).await {
        Ok(Some(secret)) => secret,
        Ok(None) => {
            tracing::warn!(target: EASYHAPROXY, ingress, secret = secret_name, "referenced secret not found");
            return None;
        }
        Err(e) => {
            tracing::warn!(target: EASYHAPROXY, ingress, secret = secret_name, error = %e, "failed to read referenced secret");
            return None;
        }
    };

    let data = secret.data.unwrap_or_default();
    match candidates.iter().find_map(|k| data.get(*k)) {
        Some(bytes) => Some(STANDARD.encode(&bytes.0)),
        None => {
            tracing::warn!(target: EASYHAPROXY, ingress, secret = secret_name, tried = %candidates.join(", "), "secret has no matching key");
            None
        }
    }
}
