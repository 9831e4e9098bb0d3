use crate::conf::{DeploymentMode, DiscoverMode, Options};
use crate::discovery::kubernetes::is_accepted;
use crate::discovery::{ClusterApi, Discover, DiscoveryError, KubernetesDiscovery};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use k8s_openapi::api::core::v1::{Node, Pod, Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fs;
use std::sync::{Arc, Mutex};
use tempfile::{TempDir, tempdir};

//-----------------------------------------------------------------------------
// Fake cluster
//-----------------------------------------------------------------------------

type Patches = Arc<Mutex<Vec<(String, String, Value)>>>;

#[derive(Default)]
struct FakeCluster {
    ingresses: Vec<Ingress>,
    secrets: BTreeMap<String, Secret>,
    services: BTreeMap<String, Service>,
    pods: Vec<Pod>,
    nodes: Vec<Node>,
    patches: Patches,
}

fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

impl FakeCluster {
    fn ingress(mut self, value: Value) -> Self {
        self.ingresses.push(serde_json::from_value(value).unwrap());
        self
    }

    fn secret(mut self, namespace: &str, name: &str, data: &[(&str, &str)]) -> Self {
        let data: BTreeMap<_, _> = data
            .iter()
            .map(|(k, v)| (k.to_string(), STANDARD.encode(v)))
            .collect();
        let secret = json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": { "name": name, "namespace": namespace },
            "data": data,
        });
        self.secrets
            .insert(key(namespace, name), serde_json::from_value(secret).unwrap());
        self
    }

    fn service(mut self, namespace: &str, name: &str, spec: Value) -> Self {
        let service = json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": { "name": name, "namespace": namespace },
            "spec": spec,
        });
        self.services
            .insert(key(namespace, name), serde_json::from_value(service).unwrap());
        self
    }

    fn pod(mut self, value: Value) -> Self {
        self.pods.push(serde_json::from_value(value).unwrap());
        self
    }

    fn node(mut self, name: &str, addresses: &[(&str, &str)]) -> Self {
        let addresses: Vec<Value> = addresses
            .iter()
            .map(|(kind, address)| json!({ "type": kind, "address": address }))
            .collect();
        let node = json!({
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": { "name": name },
            "status": { "addresses": addresses },
        });
        self.nodes.push(serde_json::from_value(node).unwrap());
        self
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_ingresses(&self) -> Result<Vec<Ingress>, DiscoveryError> {
        Ok(self.ingresses.clone())
    }

    async fn secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, DiscoveryError> {
        Ok(self.secrets.get(&key(namespace, name)).cloned())
    }

    async fn service(&self, namespace: &str, name: &str) -> Result<Option<Service>, DiscoveryError> {
        Ok(self.services.get(&key(namespace, name)).cloned())
    }

    async fn pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, DiscoveryError> {
        Ok(self
            .pods
            .iter()
            .find(|p| {
                p.metadata.namespace.as_deref() == Some(namespace) && p.metadata.name.as_deref() == Some(name)
            })
            .cloned())
    }

    async fn pods(&self, namespace: &str, _label_selector: &str) -> Result<Vec<Pod>, DiscoveryError> {
        Ok(self
            .pods
            .iter()
            .filter(|p| p.metadata.namespace.as_deref() == Some(namespace))
            .cloned()
            .collect())
    }

    async fn node(&self, name: &str) -> Result<Option<Node>, DiscoveryError> {
        Ok(self
            .nodes
            .iter()
            .find(|n| n.metadata.name.as_deref() == Some(name))
            .cloned())
    }

    async fn nodes(&self) -> Result<Vec<Node>, DiscoveryError> {
        Ok(self.nodes.clone())
    }

    async fn patch_ingress_status(
        &self,
        namespace: &str,
        name: &str,
        status: &Value,
    ) -> Result<(), DiscoveryError> {
        self.patches
            .lock()
            .unwrap()
            .push((namespace.to_string(), name.to_string(), status.clone()));
        Ok(())
    }
}

//-----------------------------------------------------------------------------
// Fixtures
//-----------------------------------------------------------------------------

fn ingress(name: &str, annotations: Value, spec: Value) -> Value {
    json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "Ingress",
        "metadata": {
            "name": name,
            "namespace": "default",
            "resourceVersion": "4711",
            "creationTimestamp": "2024-01-02T03:04:05Z",
            "annotations": annotations,
        },
        "spec": spec,
    })
}

fn rule(host: &str, service: &str, port: u16) -> Value {
    json!({
        "host": host,
        "http": { "paths": [{
            "path": "/",
            "pathType": "Prefix",
            "backend": { "service": { "name": service, "port": { "number": port } } },
        }]},
    })
}

fn class_spec(rules: Vec<Value>) -> Value {
    json!({ "ingressClassName": "easyhaproxy", "rules": rules })
}

fn options(update_status: bool) -> Options {
    let mut options = Options::new(DiscoverMode::Kubernetes);
    options.kubernetes.update_ingress_status = update_status;
    options
}

fn discovery(cluster: FakeCluster, options: &Options) -> (KubernetesDiscovery, TempDir) {
    let certs = tempdir().unwrap();
    let discovery = KubernetesDiscovery::new(
        Box::new(cluster),
        options,
        certs.path().to_path_buf(),
        "easyhaproxy-7d9f-abcde".to_string(),
    );
    (discovery, certs)
}

fn web_service(cluster: FakeCluster) -> FakeCluster {
    cluster.service("default", "web", json!({ "clusterIP": "10.96.0.10" }))
}

//-----------------------------------------------------------------------------
// Ingress conversion
//-----------------------------------------------------------------------------

#[tokio::test]
async fn rule_becomes_definition_on_cluster_ip() {
    // Arrange
    let cluster = web_service(FakeCluster::default()).ingress(ingress(
        "web",
        json!({ "easyhaproxy.certbot": "true", "easyhaproxy.redirect_ssl": "true" }),
        class_spec(vec![rule("www.example.com", "web", 8080)]),
    ));
    let (mut discovery, _certs) = discovery(cluster, &options(false));

    // Act
    let entities = discovery.refresh().await.unwrap();

    // Assert
    let labels = &entities["10.96.0.10"];
    let def = "easyhaproxy.www-example-com_8080";
    assert_eq!(labels[&format!("{def}.host")], "www.example.com");
    assert_eq!(labels[&format!("{def}.port")], "80");
    assert_eq!(labels[&format!("{def}.localport")], "8080");
    assert_eq!(labels[&format!("{def}.certbot")], "true");
    assert_eq!(labels[&format!("{def}.redirect_ssl")], "true");
    assert_eq!(labels[&format!("{def}.balance")], "roundrobin");
    assert!(!labels.contains_key(&format!("{def}.clone_to_ssl")));
    assert!(!labels.contains_key(&format!("{def}.mode")));
    assert_eq!(labels["namespace"], "default");
    assert_eq!(labels["resource_version"], "4711");
    assert!(labels["creation_timestamp"].starts_with("2024-01-02T03:04:05"));
}

#[tokio::test]
async fn listen_port_and_balance_annotations_apply_to_every_rule() {
    // Arrange
    let cluster = web_service(FakeCluster::default())
        .service("default", "api", json!({ "clusterIP": "10.96.0.20" }))
        .ingress(ingress(
            "multi",
            json!({ "easyhaproxy.listen_port": "8081", "easyhaproxy.balance": "leastconn" }),
            class_spec(vec![rule("a.example.com", "web", 80), rule("b.example.com", "api", 3000)]),
        ));
    let (mut discovery, _certs) = discovery(cluster, &options(false));

    // Act
    let entities = discovery.refresh().await.unwrap();

    // Assert
    assert_eq!(entities["10.96.0.10"]["easyhaproxy.a-example-com_80.port"], "8081");
    assert_eq!(entities["10.96.0.20"]["easyhaproxy.b-example-com_3000.port"], "8081");
    assert_eq!(entities["10.96.0.20"]["easyhaproxy.b-example-com_3000.balance"], "leastconn");
}

#[tokio::test]
async fn rules_sharing_a_service_merge_into_one_entity() {
    // Arrange
    let cluster = web_service(FakeCluster::default())
        .ingress(ingress("one", json!({}), class_spec(vec![rule("a.example.com", "web", 80)])))
        .ingress(ingress("two", json!({}), class_spec(vec![rule("b.example.com", "web", 80)])));
    let (mut discovery, _certs) = discovery(cluster, &options(false));

    // Act
    let entities = discovery.refresh().await.unwrap();

    // Assert
    let labels = &entities["10.96.0.10"];
    assert!(labels.contains_key("easyhaproxy.a-example-com_80.host"));
    assert!(labels.contains_key("easyhaproxy.b-example-com_80.host"));
    assert_eq!(entities.len(), 1);
}

#[tokio::test]
async fn ingress_of_another_class_is_ignored() {
    // Arrange
    let cluster = web_service(FakeCluster::default()).ingress(ingress(
        "nginx",
        json!({}),
        json!({ "ingressClassName": "nginx", "rules": [rule("a.example.com", "web", 80)] }),
    ));
    let (mut discovery, _certs) = discovery(cluster, &options(false));

    // Act
    let entities = discovery.refresh().await.unwrap();

    // Assert
    assert!(entities.is_empty());
}

#[tokio::test]
async fn legacy_class_annotation_is_still_accepted() {
    // Arrange
    let cluster = web_service(FakeCluster::default()).ingress(ingress(
        "legacy",
        json!({ "kubernetes.io/ingress.class": "easyhaproxy-ingress" }),
        json!({ "rules": [rule("old.example.com", "web", 80)] }),
    ));
    let (mut discovery, _certs) = discovery(cluster, &options(false));

    // Act
    let entities = discovery.refresh().await.unwrap();

    // Assert
    assert_eq!(entities["10.96.0.10"]["easyhaproxy.old-example-com_80.host"], "old.example.com");
}

#[test]
fn class_name_takes_precedence_over_legacy_annotation() {
    // Arrange
    let ingress: Ingress = serde_json::from_value(ingress(
        "mixed",
        json!({ "kubernetes.io/ingress.class": "easyhaproxy-ingress" }),
        json!({ "ingressClassName": "nginx" }),
    ))
    .unwrap();

    // Act / Assert
    assert!(!is_accepted(&ingress));
}

#[tokio::test]
async fn rule_with_missing_service_is_skipped() {
    // Arrange
    let cluster = FakeCluster::default().ingress(ingress(
        "orphan",
        json!({}),
        class_spec(vec![rule("a.example.com", "gone", 80)]),
    ));
    let (mut discovery, _certs) = discovery(cluster, &options(false));

    // Act
    let entities = discovery.refresh().await.unwrap();

    // Assert
    assert!(entities.is_empty());
}

//-----------------------------------------------------------------------------
// Plugin annotations and secrets
//-----------------------------------------------------------------------------

#[tokio::test]
async fn plugin_annotations_become_route_plugin_config() {
    // Arrange
    let cluster = web_service(FakeCluster::default()).ingress(ingress(
        "web",
        json!({
            "easyhaproxy.plugins": "deny_pages",
            "easyhaproxy.plugin.deny_pages.paths": "/admin",
        }),
        class_spec(vec![rule("www.example.com", "web", 80)]),
    ));
    let (mut discovery, _certs) = discovery(cluster, &options(false));

    // Act
    let entities = discovery.refresh().await.unwrap();

    // Assert
    let labels = &entities["10.96.0.10"];
    assert_eq!(labels["easyhaproxy.www-example-com_80.plugins"], "deny_pages");
    assert_eq!(labels["easyhaproxy.www-example-com_80.plugin.deny_pages.paths"], "/admin");
}

#[tokio::test]
async fn secret_reference_resolves_through_synonyms() {
    // Arrange
    let cluster = web_service(FakeCluster::default())
        .secret("default", "secret-a", &[("public-key", "-----BEGIN PUBLIC KEY-----")])
        .ingress(ingress(
            "api",
            json!({ "easyhaproxy.plugin.jwt_validator.k8s_secret.pubkey": "secret-a" }),
            class_spec(vec![rule("api.example.com", "web", 80)]),
        ));
    let (mut discovery, _certs) = discovery(cluster, &options(false));

    // Act
    let entities = discovery.refresh().await.unwrap();

    // Assert
    let labels = &entities["10.96.0.10"];
    assert_eq!(
        labels["easyhaproxy.api-example-com_80.plugin.jwt_validator.pubkey"],
        STANDARD.encode("-----BEGIN PUBLIC KEY-----")
    );
    assert!(!labels.keys().any(|k| k.contains("k8s_secret")));
}

#[tokio::test]
async fn explicit_annotation_wins_over_secret_reference() {
    // Arrange
    let cluster = web_service(FakeCluster::default())
        .secret("default", "secret-a", &[("public-key", "from-secret")])
        .ingress(ingress(
            "api",
            json!({
                "easyhaproxy.plugin.jwt_validator.k8s_secret.pubkey": "secret-a",
                "easyhaproxy.plugin.jwt_validator.pubkey": "explicit",
            }),
            class_spec(vec![rule("api.example.com", "web", 80)]),
        ));
    let (mut discovery, _certs) = discovery(cluster, &options(false));

    // Act
    let entities = discovery.refresh().await.unwrap();

    // Assert
    assert_eq!(
        entities["10.96.0.10"]["easyhaproxy.api-example-com_80.plugin.jwt_validator.pubkey"],
        "explicit"
    );
}

#[tokio::test]
async fn explicit_secret_key_is_the_only_key_tried() {
    // Arrange
    let cluster = web_service(FakeCluster::default())
        .secret("default", "creds", &[("token", "abc"), ("api_key", "wrong")])
        .ingress(ingress(
            "api",
            json!({
                "easyhaproxy.plugin.auth.k8s_secret.api_key": "creds/token",
                "easyhaproxy.plugin.auth.k8s_secret.password": "creds/missing",
            }),
            class_spec(vec![rule("api.example.com", "web", 80)]),
        ));
    let (mut discovery, _certs) = discovery(cluster, &options(false));

    // Act
    let entities = discovery.refresh().await.unwrap();

    // Assert
    let labels = &entities["10.96.0.10"];
    assert_eq!(labels["easyhaproxy.api-example-com_80.plugin.auth.api_key"], STANDARD.encode("abc"));
    assert!(!labels.contains_key("easyhaproxy.api-example-com_80.plugin.auth.password"));
}

//-----------------------------------------------------------------------------
// TLS
//-----------------------------------------------------------------------------

#[tokio::test]
async fn tls_secret_is_written_once_and_marks_hosts() {
    // Arrange
    let cluster = web_service(FakeCluster::default())
        .secret("default", "www-tls", &[("tls.crt", "CERT"), ("tls.key", "KEY")])
        .ingress(ingress(
            "web",
            json!({}),
            json!({
                "ingressClassName": "easyhaproxy",
                "tls": [{ "hosts": ["www.example.com"], "secretName": "www-tls" }],
                "rules": [rule("www.example.com", "web", 80), rule("plain.example.com", "web", 80)],
            }),
        ));
    let (mut discovery, certs) = discovery(cluster, &options(false));
    let pem = certs.path().join("www-tls.pem");

    // Act
    let entities = discovery.refresh().await.unwrap();
    let written = fs::read_to_string(&pem).unwrap();
    fs::remove_file(&pem).unwrap();
    discovery.refresh().await.unwrap();

    // Assert
    assert_eq!(written, "CERT\nKEY");
    assert!(!pem.exists(), "unchanged secret must not be rewritten");

    let labels = &entities["10.96.0.10"];
    assert_eq!(labels["easyhaproxy.www-example-com_80.clone_to_ssl"], "true");
    assert!(!labels.contains_key("easyhaproxy.plain-example-com_80.clone_to_ssl"));
}

#[tokio::test]
async fn incomplete_tls_secret_is_ignored() {
    // Arrange
    let cluster = web_service(FakeCluster::default())
        .secret("default", "half", &[("tls.crt", "CERT")])
        .ingress(ingress(
            "web",
            json!({}),
            json!({
                "ingressClassName": "easyhaproxy",
                "tls": [{ "hosts": ["www.example.com"], "secretName": "half" }],
                "rules": [rule("www.example.com", "web", 80)],
            }),
        ));
    let (mut discovery, certs) = discovery(cluster, &options(false));

    // Act
    let entities = discovery.refresh().await.unwrap();

    // Assert
    assert!(!certs.path().join("half.pem").exists());
    assert!(!entities["10.96.0.10"].contains_key("easyhaproxy.www-example-com_80.clone_to_ssl"));
}

//-----------------------------------------------------------------------------
// Ingress status
//-----------------------------------------------------------------------------

fn status_of(addresses: Value) -> Value {
    json!({ "status": { "loadBalancer": { "ingress": addresses } } })
}

#[tokio::test]
async fn nodeport_mode_publishes_every_node() {
    // Arrange
    let cluster = web_service(FakeCluster::default())
        .node("n1", &[("InternalIP", "10.1.0.1"), ("ExternalIP", "203.0.113.1")])
        .node("n2", &[("InternalIP", "10.1.0.2")])
        .ingress(ingress("web", json!({}), class_spec(vec![rule("a.example.com", "web", 80)])));
    let patches = cluster.patches.clone();
    let mut options = options(true);
    options.kubernetes.deployment_mode = DeploymentMode::NodePort;
    let (mut discovery, _certs) = discovery(cluster, &options);

    // Act
    discovery.refresh().await.unwrap();

    // Assert
    let patches = patches.lock().unwrap();
    assert_eq!(
        *patches,
        vec![(
            "default".to_string(),
            "web".to_string(),
            status_of(json!([{ "ip": "203.0.113.1" }, { "ip": "10.1.0.2" }]))
        )]
    );
}

#[tokio::test]
async fn daemonset_is_detected_from_pod_owner() {
    // Arrange
    let owned_pod = |name: &str, node: &str| {
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": name,
                "namespace": "easyhaproxy",
                "ownerReferences": [{ "apiVersion": "apps/v1", "kind": "DaemonSet", "name": "easyhaproxy", "uid": "u-1" }],
            },
            "spec": { "nodeName": node, "containers": [{ "name": "haproxy" }] },
        })
    };
    let cluster = web_service(FakeCluster::default())
        .pod(owned_pod("easyhaproxy-7d9f-abcde", "n1"))
        .pod(owned_pod("easyhaproxy-other", "n1"))
        .node("n1", &[("InternalIP", "10.1.0.1")])
        .node("n2", &[("ExternalIP", "203.0.113.2")])
        .ingress(ingress("web", json!({}), class_spec(vec![rule("a.example.com", "web", 80)])));
    let patches = cluster.patches.clone();
    let (mut discovery, _certs) = discovery(cluster, &options(true));

    // Act
    discovery.refresh().await.unwrap();

    // Assert
    let patches = patches.lock().unwrap();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].2, status_of(json!([{ "ip": "10.1.0.1" }])));
}

#[tokio::test]
async fn clusterip_mode_falls_back_to_external_hostname() {
    // Arrange
    let cluster = web_service(FakeCluster::default())
        .service("easyhaproxy", "easyhaproxy", json!({ "type": "ClusterIP", "clusterIP": "10.96.1.1" }))
        .ingress(ingress("web", json!({}), class_spec(vec![rule("a.example.com", "web", 80)])));
    let patches = cluster.patches.clone();
    let mut options = options(true);
    options.kubernetes.deployment_mode = DeploymentMode::ClusterIp;
    options.kubernetes.external_hostname = "lb.example.com".to_string();
    let (mut discovery, _certs) = discovery(cluster, &options);

    // Act
    discovery.refresh().await.unwrap();

    // Assert
    let patches = patches.lock().unwrap();
    assert_eq!(patches[0].2, status_of(json!([{ "hostname": "lb.example.com" }])));
}

#[tokio::test]
async fn clusterip_mode_without_override_uses_service_ip() {
    // Arrange
    let cluster = web_service(FakeCluster::default())
        .service("easyhaproxy", "ingress-easyhaproxy", json!({ "type": "ClusterIP", "clusterIP": "10.96.1.1" }))
        .ingress(ingress("web", json!({}), class_spec(vec![rule("a.example.com", "web", 80)])));
    let patches = cluster.patches.clone();
    let mut options = options(true);
    options.kubernetes.deployment_mode = DeploymentMode::ClusterIp;
    let (mut discovery, _certs) = discovery(cluster, &options);

    // Act
    discovery.refresh().await.unwrap();

    // Assert
    let patches = patches.lock().unwrap();
    assert_eq!(patches[0].2, status_of(json!([{ "ip": "10.96.1.1" }])));
}

#[tokio::test]
async fn status_is_not_patched_when_disabled() {
    // Arrange
    let cluster = web_service(FakeCluster::default())
        .node("n1", &[("ExternalIP", "203.0.113.1")])
        .ingress(ingress("web", json!({}), class_spec(vec![rule("a.example.com", "web", 80)])));
    let patches = cluster.patches.clone();
    let mut options = options(false);
    options.kubernetes.deployment_mode = DeploymentMode::NodePort;
    let (mut discovery, _certs) = discovery(cluster, &options);

    // Act
    discovery.refresh().await.unwrap();

    // Assert
    assert!(patches.lock().unwrap().is_empty());
}
