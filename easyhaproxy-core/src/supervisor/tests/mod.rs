mod snippets_tests;

use crate::supervisor::ProxyLayout;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::{Duration, Instant};

/// Fake proxy binary.
///
/// Every invocation appends its argv to `calls.log`. `-c` fails when a file
/// named `invalid` sits next to the script and hangs when `slow` does; any
/// other invocation exits at once when `crash` exists, otherwise prints a
/// line and sleeps until signalled.
pub(super) const FAKE_HAPROXY: &str = r#"#!/bin/sh
here=$(dirname "$0")
echo "$*" >> "$here/calls.log"
if [ "$1" = "-c" ]; then
  if [ -f "$here/slow" ]; then exec sleep 30; fi
  if [ -f "$here/invalid" ]; then
    echo "[ALERT] parsing [haproxy.cfg:3] : unknown keyword" >&2
    echo "[ALERT] fatal errors found" >&2
    exit 1
  fi
  echo "Configuration file is valid"
  exit 0
fi
if [ -f "$here/crash" ]; then echo "[ALERT] cannot bind socket" >&2; exit 3; fi
echo "master started"
exec sleep 30
"#;

pub(super) fn layout(dir: &Path) -> ProxyLayout {
    let bin = dir.join("haproxy");
    fs::write(&bin, FAKE_HAPROXY).unwrap();
    fs::set_permissions(&bin, fs::Permissions::from_mode(0o755)).unwrap();

    let custom_dir = dir.join("conf.d");
    fs::create_dir_all(&custom_dir).unwrap();

    ProxyLayout {
        bin,
        config: dir.join("haproxy.cfg"),
        custom_dir,
        pid_file: dir.join("haproxy.pid"),
        admin_socket: dir.join("haproxy.sock"),
        validation_timeout: Duration::from_secs(10),
        startup_grace: Duration::from_millis(200),
    }
}

/// Waits until the fake binary has logged `count` invocations.
pub(super) async fn wait_for_calls(dir: &Path, count: usize) -> Vec<String> {
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

pub(super) fn recorded_calls(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(String::from)
        .collect()
}
