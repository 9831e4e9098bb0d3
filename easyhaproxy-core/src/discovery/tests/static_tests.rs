use crate::conf::StaticConfig;
use crate::discovery::{Discover, EntityMap, StaticDiscovery, static_entities};

use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn entities(raw: &str) -> EntityMap {
    let file = StaticConfig::parse(Path::new("config.yml"), raw).unwrap();
    static_entities(&file, "easyhaproxy")
}

fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn record_is_published_on_every_ip() {
    // Arrange
    let raw = r#"
containers:
  "host1.local:80":
    ip: ["10.0.0.1:8080", "10.0.0.2"]
    certbot: true
    balance: leastconn
"#;

    // Act
    let entities = entities(raw);

    // Assert
    assert_eq!(
        entities["10.0.0.1"],
        labels(&[
            ("easyhaproxy.host1_local_80.balance", "leastconn"),
            ("easyhaproxy.host1_local_80.certbot", "true"),
            ("easyhaproxy.host1_local_80.host", "host1.local"),
            ("easyhaproxy.host1_local_80.localport", "8080"),
            ("easyhaproxy.host1_local_80.port", "80"),
        ])
    );
    assert_eq!(entities["10.0.0.2"]["easyhaproxy.host1_local_80.localport"], "80");
    assert_eq!(entities.len(), 2);
}

#[test]
fn redirect_only_record_gets_synthetic_address() {
    // Arrange
    let raw = r#"
containers:
  "old.local:80":
    redirect: https://new.local
"#;

    // Act
    let entities = entities(raw);

    // Assert
    assert_eq!(
        entities["redirect-old.local-80"],
        labels(&[
            ("easyhaproxy.old_local_80.host", "old.local"),
            ("easyhaproxy.old_local_80.port", "80"),
            ("easyhaproxy.old_local_80.redirect", r#"{"old.local":"https://new.local"}"#),
            ("easyhaproxy.old_local_80.redirect_only", "true"),
        ])
    );
}

#[test]
fn record_without_ip_uses_its_hostname() {
    // Arrange
    let raw = r#"
containers:
  "api.internal:8443":
    ssl: true
"#;

    // Act
    let entities = entities(raw);

    // Assert
    let labels = &entities["api.internal"];
    assert_eq!(labels["easyhaproxy.api_internal_8443.port"], "8443");
    assert_eq!(labels["easyhaproxy.api_internal_8443.localport"], "80");
    assert_eq!(labels["easyhaproxy.api_internal_8443.ssl"], "true");
}

#[test]
fn plugins_inherit_global_list_and_merge_config() {
    // Arrange
    let raw = r#"
plugins:
  enabled: [deny_pages]
  config:
    deny_pages:
      paths: [/admin, /private]
      status_code: 404
containers:
  "a.local:80":
    ip: ["10.0.0.1:80"]
    plugin:
      deny_pages:
        status_code: 403
  "b.local:80":
    ip: ["10.0.0.2:80"]
    plugins: cloudflare
"#;

    // Act
    let entities = entities(raw);

    // Assert
    let a = &entities["10.0.0.1"];
    assert_eq!(a["easyhaproxy.a_local_80.plugins"], "deny_pages");
    assert_eq!(a["easyhaproxy.a_local_80.plugin.deny_pages.paths"], "/admin,/private");
    assert_eq!(a["easyhaproxy.a_local_80.plugin.deny_pages.status_code"], "403");

    let b = &entities["10.0.0.2"];
    assert_eq!(b["easyhaproxy.b_local_80.plugins"], "cloudflare");
    assert!(!b.keys().any(|k| k.contains(".plugin.deny_pages.")));
}

#[test]
fn custom_prefix_is_used_for_labels() {
    // Arrange
    let file = StaticConfig::parse(
        Path::new("config.yml"),
        "containers:\n  \"x.local:80\":\n    ip: [\"10.0.0.9:81\"]\n",
    )
    .unwrap();

    // Act
    let entities = static_entities(&file, "proxy");

    // Assert
    assert_eq!(entities["10.0.0.9"]["proxy.x_local_80.host"], "x.local");
}

#[tokio::test]
async fn refresh_reads_the_file_each_time() {
    // Arrange
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.yml");
    fs::write(&path, "containers:\n  \"a.local:80\":\n    ip: [\"10.0.0.1:80\"]\n").unwrap();
    let mut discovery = StaticDiscovery::new(path.clone(), "easyhaproxy".to_string());

    // Act
    let first = discovery.refresh().await.unwrap();
    fs::write(&path, "containers:\n  \"b.local:80\":\n    ip: [\"10.0.0.2:80\"]\n").unwrap();
    let second = discovery.refresh().await.unwrap();

    // Assert
    assert!(first.contains_key("10.0.0.1"));
    assert!(second.contains_key("10.0.0.2"));
    assert!(!second.contains_key("10.0.0.1"));
}

#[tokio::test]
async fn refresh_fails_on_missing_file() {
    // Arrange
    let dir = tempdir().unwrap();
    let mut discovery = StaticDiscovery::new(dir.path().join("absent.yml"), "easyhaproxy".to_string());

    // Act
    let result = discovery.refresh().await;

    // Assert
    assert!(result.is_err());
}
