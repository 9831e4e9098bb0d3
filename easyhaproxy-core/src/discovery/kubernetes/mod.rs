mod api;
mod secrets;
mod status;

pub use api::{ClusterApi, FIELD_MANAGER, KubeClusterApi};

use super::{Discover, DiscoveryError, EntityMap, Labels};
use crate::conf::{DeploymentMode, KubernetesOptions, Options};
use crate::logging::EASYHAPROXY;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::{Ingress, IngressLoadBalancerIngress};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tokio::time::Instant;

pub const INGRESS_CLASS: &str = "easyhaproxy";
pub const LEGACY_CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";
pub const LEGACY_INGRESS_CLASS: &str = "easyhaproxy-ingress";

/// Ingress adapter: every accepted rule becomes a definition on the backend
/// service's cluster IP.
pub struct KubernetesDiscovery {
    api: Box<dyn ClusterApi>,
    prefix: String,
    certs_dir: PathBuf,
    hostname: String,
    settings: KubernetesOptions,
    cert_cache: HashMap<String, Vec<u8>>,
    mode: Option<(DeploymentMode, Option<Service>)>,
    addresses: Option<(Instant, Vec<IngressLoadBalancerIngress>)>,
}

impl KubernetesDiscovery {
    pub fn new(api: Box<dyn ClusterApi>, options: &Options, certs_dir: PathBuf, hostname: String) -> Self {
        Self {
            api,
            prefix: options.label_prefix.clone(),
            certs_dir,
            hostname,
            settings: options.kubernetes.clone(),
            cert_cache: HashMap::new(),
            mode: None,
            addresses: None,
        }
    }

    /// Writes the TLS secret as `<certs>/<secret>.pem`, crt then key.
    ///
    /// The file is rewritten only when the secret content changed. Returns
    /// false when the secret is missing or incomplete.
    async fn load_tls(&mut self, namespace: &str, ingress: &str, secret_name: &str) -> bool {
        let secret = match self.api.secret(namespace, secret_name).await {
            Ok(Some(secret)) => secret,
            Ok(None) => {
                tracing::warn!(target: EASYHAPROXY, ingress, secret = secret_name, "tls secret not found");
                return false;
            }
            Err(e) => {
                tracing::warn!(target: EASYHAPROXY, ingress, secret = secret_name, error = %e, "get secret failed");
                return false;
            }
        };

        let data = secret.data.unwrap_or_default();
        let (Some(crt), Some(key)) = (data.get("tls.crt"), data.get("tls.key")) else {
            return false;
        };

        let mut pem = crt.0.clone();
        pem.push(b'\n');
        pem.extend_from_slice(&key.0);

        if self.cert_cache.get(secret_name) != Some(&pem) {
            let path = self.certs_dir.join(format!("{secret_name}.pem"));
            if let Err(e) = fs::write(&path, &pem) {
                let e = DiscoveryError::write(&path, e);
                tracing::warn!(target: EASYHAPROXY, ingress, error = %e, "failed to write tls certificate");
                return false;
            }
            tracing::info!(target: EASYHAPROXY, ingress, path = %path.display(), "wrote tls certificate");
            self.cert_cache.insert(secret_name.to_string(), pem);
        }

        true
    }
}

/// Ingress class check: `spec.ingressClassName` when set, else the legacy annotation.
pub fn is_accepted(ingress: &Ingress) -> bool {
    let class_name = ingress.spec.as_ref().and_then(|s| s.ingress_class_name.as_deref());
    if let Some(class_name) = class_name {
        return class_name == INGRESS_CLASS;
    }

    ingress
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(LEGACY_CLASS_ANNOTATION))
        .is_some_and(|class| class == LEGACY_INGRESS_CLASS)
}

/// Label value of an API timestamp in its RFC 3339 wire form.
fn timestamp_label<T: serde::Serialize>(time: &T) -> String {
    match serde_json::to_value(time) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}

#[async_trait]
impl Discover for KubernetesDiscovery {
    async fn refresh(&mut self) -> Result<EntityMap, DiscoveryError> {
        let ingresses = self.api.list_ingresses().await?;

        let addresses = if self.settings.update_ingress_status {
            self.ingress_addresses().await
        } else {
            Vec::new()
        };

        let mut entities = EntityMap::new();
        for ingress in ingresses.iter().filter(|i| is_accepted(i)) {
            self.convert(ingress, &mut entities).await;

            if self.settings.update_ingress_status {
                self.update_status(ingress, &addresses).await;
            }
        }

        Ok(entities)
    }
}

impl KubernetesDiscovery {
    async fn convert(&mut self, ingress: &Ingress, entities: &mut EntityMap) {
        let meta = &ingress.metadata;
        let namespace = meta.namespace.clone().unwrap_or_default();
        let ingress_name = format!("{namespace}/{}", meta.name.as_deref().unwrap_or_default());
        let annotations = meta.annotations.clone().unwrap_or_default();
        let annotation = |key: &str| annotations.get(&format!("easyhaproxy.{key}")).cloned();

        let plugin_annotations =
            secrets::plugin_annotations(self.api.as_ref(), &namespace, &ingress_name, &annotations).await;

        let mut base = Labels::new();
        base.insert(
            "creation_timestamp".to_string(),
            meta.creation_timestamp.as_ref().map(timestamp_label).unwrap_or_default(),
        );
        base.insert(
            "resource_version".to_string(),
            meta.resource_version.clone().unwrap_or_default(),
        );
        base.insert("namespace".to_string(), namespace.clone());

        let Some(spec) = &ingress.spec else {
            return;
        };

        let mut ssl_hosts = Vec::new();
        for tls in spec.tls.iter().flatten() {
            let Some(secret_name) = &tls.secret_name else {
                continue;
            };
            if self.load_tls(&namespace, &ingress_name, secret_name).await {
                ssl_hosts.extend(tls.hosts.iter().flatten().cloned());
            }
        }
        tracing::debug!(target: EASYHAPROXY, ingress = %ingress_name, ssl_hosts = ?ssl_hosts, "ssl hosts found");

        let listen_port = annotation("listen_port").unwrap_or_else(|| "80".to_string());
        let balance = annotation("balance").unwrap_or_else(|| "roundrobin".to_string());

        for rule in spec.rules.iter().flatten() {
            let Some(host) = &rule.host else {
                continue;
            };
            let Some(backend) = rule
                .http
                .as_ref()
                .and_then(|http| http.paths.first())
                .and_then(|path| path.backend.service.as_ref())
            else {
                tracing::warn!(target: EASYHAPROXY, ingress = %ingress_name, host = %host, "rule has no service backend");
                continue;
            };
            let port_number = backend.port.as_ref().and_then(|p| p.number).unwrap_or(80);

            let definition = format!("{}.{}_{port_number}", self.prefix, host.replace('.', "-"));
            let key = |attr: &str| format!("{definition}.{attr}");

            let mut rule_labels = Labels::new();
            rule_labels.insert(key("host"), host.clone());
            rule_labels.insert(key("port"), listen_port.clone());
            rule_labels.insert(key("localport"), port_number.to_string());
            if ssl_hosts.contains(host) {
                rule_labels.insert(key("clone_to_ssl"), "true".to_string());
            }
            for attr in ["redirect_ssl", "certbot", "redirect", "mode"] {
                if let Some(value) = annotation(attr) {
                    rule_labels.insert(key(attr), value);
                }
            }
            rule_labels.insert(key("balance"), balance.clone());
            if let Some(plugins) = annotation("plugins") {
                rule_labels.insert(key("plugins"), plugins);
            }
            for (annotation_key, value) in &plugin_annotations {
                if let Some(rest) = annotation_key.strip_prefix(secrets::PLUGIN_ANNOTATION) {
                    rule_labels.insert(key(&format!("plugin.{rest}")), value.clone());
                }
            }

            let cluster_ip = match self.api.service(&namespace, &backend.name).await {
                Ok(Some(service)) => service.spec.and_then(|s| s.cluster_ip),
                Ok(None) => {
                    tracing::warn!(target: EASYHAPROXY, ingress = %ingress_name, service = %backend.name, "service not found");
                    None
                }
                Err(e) => {
                    tracing::warn!(target: EASYHAPROXY, ingress = %ingress_name, service = %backend.name, error = %e, "failed to read service");
                    None
                }
            };

            if let Some(cluster_ip) = cluster_ip {
                entities
                    .entry(cluster_ip)
                    .or_insert_with(|| base.clone())
                    .extend(rule_labels);
            }
        }
    }
}
