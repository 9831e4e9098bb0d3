mod startup_tests;

use crate::certbot::{AcmeClient, CertError};
use crate::conf::{DiscoverMode, Options};
use crate::discovery::{Discover, DiscoveryError, EntityMap, Labels};
use crate::paths::Paths;
use crate::plugin::PluginHost;
use crate::reconcile::Reconciler;
use async_trait::async_trait;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Fake proxy binary. A launch logs its argv, then exits at once when a
/// `crash` marker exists; otherwise it writes its pid where `-p` would put
/// it and sleeps until signalled.
const FAKE_HAPROXY: &str = r#"#!/bin/sh
here=$(dirname "$0")
echo "$*" >> "$here/calls.log"
if [ "$1" = "-c" ]; then
  if [ -f "$here/invalid" ]; then echo "[ALERT] invalid" >&2; exit 1; fi
  exit 0
fi
if [ -f "$here/crash" ]; then echo "[ALERT] cannot bind socket" >&2; exit 3; fi
echo $$ > "$here/haproxy.pid"
exec sleep 30
"#;

/// Discovery whose next answer is set by the test.
#[derive(Clone)]
pub(super) struct FakeDiscovery {
    next: Arc<Mutex<Result<EntityMap, String>>>,
}

impl Default for FakeDiscovery {
    fn default() -> Self {
        Self {
            next: Arc::new(Mutex::new(Ok(EntityMap::new()))),
        }
    }
}

impl FakeDiscovery {
    pub(super) fn set(&self, snapshot: EntityMap) {
        *self.next.lock().unwrap() = Ok(snapshot);
    }

    pub(super) fn fail(&self, reason: &str) {
        *self.next.lock().unwrap() = Err(reason.to_string());
    }
}

#[async_trait]
impl Discover for FakeDiscovery {
    async fn refresh(&mut self) -> Result<EntityMap, DiscoveryError> {
        self.next
            .lock()
            .unwrap()
            .clone()
            .map_err(DiscoveryError::not_found)
    }
}

/// ACME client that always fails and counts its calls.
#[derive(Clone, Default)]
pub(super) struct FailingAcme {
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl FailingAcme {
    pub(super) fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AcmeClient for FailingAcme {
    async fn run(&self, args: &[String]) -> Result<bool, CertError> {
        self.calls.lock().unwrap().push(args.to_vec());
        Ok(false)
    }
}

pub(super) struct Harness {
    pub reconciler: Reconciler,
    pub discovery: FakeDiscovery,
    pub acme: FailingAcme,
    pub paths: Paths,
    pub dir: TempDir,
}

impl Harness {
    pub(super) fn new(configure: impl FnOnce(&mut Options)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("haproxy");
        fs::write(&bin, FAKE_HAPROXY).unwrap();
        fs::set_permissions(&bin, fs::Permissions::from_mode(0o755)).unwrap();

        let paths = Paths::new(dir.path().join("base"))
            .with_pid_file(dir.path().join("haproxy.pid"))
            .with_admin_socket(dir.path().join("haproxy.sock"));
        paths.ensure().unwrap();

        let mut options = Options::new(DiscoverMode::Static);
        options.haproxy_bin = bin;
        configure(&mut options);

        let discovery = FakeDiscovery::default();
        discovery.set(EntityMap::new());
        let acme = FailingAcme::default();
        let plugins = PluginHost::new(&options.plugins);

        let reconciler = Reconciler::new(
            options,
            paths.clone(),
            Box::new(discovery.clone()),
            plugins,
            Box::new(acme.clone()),
        );

        Self {
            reconciler,
            discovery,
            acme,
            paths,
            dir,
        }
    }

    pub(super) fn calls(&self) -> Vec<String> {
        recorded_calls(self.dir.path())
    }

    /// Waits until the fake binary has logged `count` invocations.
    pub(super) async fn wait_for_calls(&self, count: usize) -> Vec<String> {
        wait_for_calls(self.dir.path(), count).await
    }

    /// Creates or removes a marker file the fake binary reacts to.
    pub(super) fn mark(&self, name: &str, on: bool) {
        let marker = self.dir.path().join(name);
        if on {
            fs::write(marker, "").unwrap();
        } else {
            let _ = fs::remove_file(marker);
        }
    }

    pub(super) fn config(&self) -> String {
        fs::read_to_string(&self.paths.haproxy_config).unwrap()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.reconciler.shutdown();
    }
}

async fn wait_for_calls(dir: &Path, count: usize) -> Vec<String> {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let calls = recorded_calls(dir);
        if calls.len() >= count {
            return calls;
        }
        assert!(Instant::now() < deadline, "expected {count} calls, got {calls:?}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn recorded_calls(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(String::from)
        .collect()
}

/// One entity publishing `host` on port 80.
pub(super) fn web_entity(address: &str, host: &str, extra: &[(&str, &str)]) -> EntityMap {
    let mut labels = Labels::new();
    labels.insert("easyhaproxy.web.host".to_string(), host.to_string());
    labels.insert("easyhaproxy.web.localport".to_string(), "8080".to_string());
    for (key, value) in extra {
        labels.insert(format!("easyhaproxy.web.{key}"), value.to_string());
    }

    let mut snapshot = EntityMap::new();
    snapshot.insert(address.to_string(), labels);
    snapshot
}
