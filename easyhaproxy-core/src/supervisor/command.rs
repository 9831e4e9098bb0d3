use super::error::SupervisorError;
use super::pidfile::{pid_alive, read_pid, remove_pid};
use super::snippets::SnippetMap;
use crate::conf::Options;
use crate::logging::HAPROXY;
use crate::paths::Paths;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound for one `haproxy -c` run.
pub const VALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a freshly launched proxy must stay up before it replaces the old one.
pub const STARTUP_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Reload,
}

/// Files and binary the proxy is run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyLayout {
    pub bin: PathBuf,
    pub config: PathBuf,
    pub custom_dir: PathBuf,
    pub pid_file: PathBuf,
    pub admin_socket: PathBuf,
    pub validation_timeout: Duration,
    pub startup_grace: Duration,
}

/// A resolved command line and the pid it takes the listeners from, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launch {
    pub args: Vec<String>,
    pub replaces: Option<i32>,
}

impl ProxyLayout {
    pub fn new(options: &Options, paths: &Paths) -> Self {
        Self {
            bin: options.haproxy_bin.clone(),
            config: paths.haproxy_config.clone(),
            custom_dir: paths.custom_config_dir.clone(),
            pid_file: paths.pid_file.clone(),
            admin_socket: paths.admin_socket.clone(),
            validation_timeout: VALIDATION_TIMEOUT,
            startup_grace: STARTUP_GRACE,
        }
    }

    pub fn with_validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }

    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    /// `-W -f <config> [-f <custom_dir>] -p <pidfile> -S <admin_sock>`
    pub fn start_args(&self, snippets: &SnippetMap) -> Vec<String> {
        let mut args = vec!["-W".to_string(), "-f".to_string(), display(&self.config)];
        if !snippets.is_empty() {
            args.push("-f".to_string());
            args.push(display(&self.custom_dir));
        }
        args.extend([
            "-p".to_string(),
            display(&self.pid_file),
            "-S".to_string(),
            display(&self.admin_socket),
        ]);
        args
    }

    /// Start arguments plus the socket and PID that hand the listeners over.
    pub fn reload_args(&self, snippets: &SnippetMap, pid: i32) -> Vec<String> {
        let mut args = self.start_args(snippets);
        args.extend([
            "-x".to_string(),
            display(&self.admin_socket),
            "-sf".to_string(),
            pid.to_string(),
        ]);
        args
    }

    /// `-c -f <config> [-f <snippet>]...`
    pub fn validate_args(&self, snippets: &SnippetMap) -> Vec<String> {
        let mut args = vec!["-c".to_string(), "-f".to_string(), display(&self.config)];
        for path in snippets.keys() {
            args.push("-f".to_string());
            args.push(display(path));
        }
        args
    }

    /// Resolves an action into a command line.
    ///
    /// A reload needs a pid file naming a live process; otherwise the stale
    /// file is removed and the proxy is started fresh.
    pub fn plan(&self, action: Action, snippets: &SnippetMap) -> Result<Launch, SupervisorError> {
        if action == Action::Reload {
            match read_pid(&self.pid_file) {
                Some(pid) if pid_alive(pid) => {
                    return Ok(Launch {
                        args: self.reload_args(snippets, pid),
                        replaces: Some(pid),
                    });
                }
                Some(pid) => {
                    tracing::warn!(target: HAPROXY, pid, pid_file = %self.pid_file.display(), "stale pid file, starting fresh");
                    remove_pid(&self.pid_file)?;
                }
                None => {
                    tracing::debug!(target: HAPROXY, pid_file = %self.pid_file.display(), "no pid file, starting fresh");
                }
            }
        }

        Ok(Launch {
            args: self.start_args(snippets),
            replaces: None,
        })
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
