use anyhow::{Context, Result};
use nix::unistd::Uid;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PID_FILE: &str = "/run/haproxy.pid";
pub const DEFAULT_ADMIN_SOCKET: &str = "/var/run/haproxy.sock";

/// Every file location the driver reads or writes, derived once from a base path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paths {
    pub base: PathBuf,
    pub static_config: PathBuf,
    pub haproxy_config: PathBuf,
    pub custom_config_dir: PathBuf,
    pub certs_certbot: PathBuf,
    pub certs_haproxy: PathBuf,
    pub www: PathBuf,
    pub plugins: PathBuf,
    pub pid_file: PathBuf,
    pub admin_socket: PathBuf,
}

impl Paths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            static_config: base.join("static").join("config.yml"),
            haproxy_config: base.join("haproxy").join("haproxy.cfg"),
            custom_config_dir: base.join("haproxy").join("conf.d"),
            certs_certbot: base.join("certs").join("certbot"),
            certs_haproxy: base.join("certs").join("haproxy"),
            www: base.join("www"),
            plugins: base.join("plugins"),
            pid_file: PathBuf::from(DEFAULT_PID_FILE),
            admin_socket: PathBuf::from(DEFAULT_ADMIN_SOCKET),
            base,
        }
    }

    pub fn with_pid_file(mut self, pid_file: impl Into<PathBuf>) -> Self {
        self.pid_file = pid_file.into();
        self
    }

    pub fn with_admin_socket(mut self, admin_socket: impl Into<PathBuf>) -> Self {
        self.admin_socket = admin_socket.into();
        self
    }

    /// `/etc/easyhaproxy` for root, `$HOME/easyhaproxy` otherwise.
    pub fn default_base() -> PathBuf {
        if Uid::effective().is_root() {
            return PathBuf::from("/etc/easyhaproxy");
        }

        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("easyhaproxy")
    }

    pub fn acme_work_dir(&self) -> PathBuf {
        self.certs_certbot.join("work")
    }

    pub fn acme_logs_dir(&self) -> PathBuf {
        self.certs_certbot.join("logs")
    }

    pub fn acme_live_dir(&self) -> PathBuf {
        self.certs_certbot.join("live")
    }

    pub fn dashboard_asset(&self) -> PathBuf {
        self.www.join("dashboard.html")
    }

    /// Certificate file served by the proxy for `name`.
    pub fn haproxy_cert(&self, name: &str) -> PathBuf {
        self.certs_haproxy.join(format!("{name}.pem"))
    }

    /// Create every directory the driver owns. Safe to call repeatedly.
    pub fn ensure(&self) -> Result<()> {
        let dirs: [&Path; 6] = [
            self.static_config.parent().unwrap_or(&self.base),
            &self.custom_config_dir,
            &self.certs_certbot,
            &self.certs_haproxy,
            &self.www,
            &self.plugins,
        ];

        for dir in dirs {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }

        Ok(())
    }
}
