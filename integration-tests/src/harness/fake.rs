use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Stand-in for `haproxy`. Validation (`-c`) fails when an `invalid` marker
/// exists; a launch writes its pid file, logs its argv, prints a notice
/// and sleeps.
const HAPROXY: &str = r#"#!/bin/sh
here=$(dirname "$0")
if [ "$1" != "-c" ]; then echo $$ > "$here/haproxy.pid"; fi
echo "$*" >> "$here/haproxy.log"
if [ "$1" = "-c" ]; then
  if [ -f "$here/invalid" ]; then echo "[ALERT] parsing error" >&2; exit 1; fi
  exit 0
fi
echo "[NOTICE] master started"
exec sleep 30
"#;

/// Stand-in for `certbot`. `certonly` copies the seed certificate into the
/// live directory of every `-d` host, or fails when a `certbot-fail` marker
/// exists.
const CERTBOT: &str = r#"#!/bin/sh
here=$(dirname "$0")
echo "$*" >> "$here/certbot.log"
[ "$1" = "certonly" ] || exit 0
if [ -f "$here/certbot-fail" ]; then echo "challenge failed" >&2; exit 1; fi
config=""
hosts=""
while [ $# -gt 0 ]; do
  case "$1" in
    --config-dir) config="$2"; shift ;;
    -d) hosts="$hosts $2"; shift ;;
  esac
  shift
done
for host in $hosts; do
  mkdir -p "$config/live/$host"
  cp "$here/seed/cert.pem" "$config/live/$host/cert.pem"
  cp "$here/seed/privkey.pem" "$config/live/$host/privkey.pem"
done
echo "issued:$hosts"
"#;

pub struct FakeBinaries {
    pub haproxy: PathBuf,
    pub certbot: PathBuf,
    dir: PathBuf,
}

impl FakeBinaries {
    pub fn install(dir: &Path) -> Self {
        Self {
            haproxy: write_script(dir, "haproxy", HAPROXY),
            certbot: write_script(dir, "certbot", CERTBOT),
            dir: dir.to_path_buf(),
        }
    }

    pub fn haproxy_calls(&self) -> Vec<String> {
        read_lines(&self.dir.join("haproxy.log"))
    }

    pub fn certbot_calls(&self) -> Vec<String> {
        read_lines(&self.dir.join("certbot.log"))
    }

    /// Waits until the fake proxy has logged `count` invocations.
    pub async fn wait_for_haproxy_calls(&self, count: usize) -> Vec<String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let calls = self.haproxy_calls();
            if calls.len() >= count {
                return calls;
            }
            assert!(Instant::now() < deadline, "expected {count} haproxy calls, got {calls:?}");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub fn reject_configs(&self, reject: bool) {
        toggle(&self.dir.join("invalid"), reject);
    }

    pub fn fail_certbot(&self, fail: bool) {
        toggle(&self.dir.join("certbot-fail"), fail);
    }

    /// Certificate and key the fake `certbot` hands out.
    pub fn seed_certificate(&self, cert: &[u8], key: &[u8]) {
        let seed = self.dir.join("seed");
        fs::create_dir_all(&seed).unwrap();
        fs::write(seed.join("cert.pem"), cert).unwrap();
        fs::write(seed.join("privkey.pem"), key).unwrap();
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(String::from)
        .collect()
}

fn toggle(marker: &Path, on: bool) {
    if on {
        fs::write(marker, b"").unwrap();
    } else {
        let _ = fs::remove_file(marker);
    }
}
