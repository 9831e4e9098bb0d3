use super::command::{Action, ProxyLayout};
use super::error::SupervisorError;
use super::snippets::{SnippetMap, custom_snippets};
use crate::logging::{HAPROXY, single_line};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, watch};

/// One running proxy process.
///
/// The child is owned by a watcher task; this handle only observes it and
/// can ask for it to stop.
pub struct Supervisor {
    pid: Option<u32>,
    running: watch::Receiver<bool>,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl Supervisor {
    /// Validates the configuration, launches the proxy and waits out the
    /// startup grace.
    ///
    /// A child that exits within the grace is reported as an error, so a
    /// caller can keep the process it meant to replace.
    pub async fn start(layout: &ProxyLayout, action: Action) -> Result<Self, SupervisorError> {
        let snippets = custom_snippets(&layout.custom_dir);
        let launch = layout.plan(action, &snippets)?;

        validate(layout, &snippets).await?;

        tracing::info!(target: HAPROXY, ?action, replaces = ?launch.replaces, args = %launch.args.join(" "), "launching proxy");
        let supervisor = Self::spawn(layout, &launch.args)?;
        supervisor.settle(layout.startup_grace).await?;
        Ok(supervisor)
    }

    async fn settle(&self, grace: Duration) -> Result<(), SupervisorError> {
        if tokio::time::timeout(grace, self.wait()).await.is_err() {
            return Ok(());
        }
        tracing::error!(target: HAPROXY, pid = self.pid, "proxy exited during startup");
        Err(SupervisorError::Exited { pid: self.pid })
    }

    fn spawn(layout: &ProxyLayout, args: &[String]) -> Result<Self, SupervisorError> {
        let mut child = Command::new(&layout.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SupervisorError::spawn(&layout.bin, e))?;

        let pid = child.id();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, true));
        }

        let (running_tx, running) = watch::channel(true);
        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(watch_child(child, running_tx, kill_rx));

        tracing::info!(target: HAPROXY, pid, "proxy started");
        Ok(Self {
            pid,
            running,
            kill_tx: Some(kill_tx),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn alive(&self) -> bool {
        *self.running.borrow()
    }

    /// Sends SIGTERM. A process that is already gone is not an error.
    pub fn terminate(&self) -> Result<(), SupervisorError> {
        let Some(pid) = self.pid.and_then(|p| i32::try_from(p).ok()) else {
            return Ok(());
        };
        if !self.alive() {
            return Ok(());
        }

        tracing::info!(target: HAPROXY, pid, "terminating proxy");
        match kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(SupervisorError::signal(pid, e)),
        }
    }

    /// Hard stop through the watcher task.
    pub fn kill(&mut self) {
        if let Some(tx) = self.kill_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Resolves once the process has exited.
    pub async fn wait(&self) {
        let mut running = self.running.clone();
        let _ = running.wait_for(|running| !running).await;
    }

    /// Current drop-in snippet map for the layout.
    pub fn custom_snippets(layout: &ProxyLayout) -> SnippetMap {
        custom_snippets(&layout.custom_dir)
    }
}

async fn validate(layout: &ProxyLayout, snippets: &SnippetMap) -> Result<(), SupervisorError> {
    let args = layout.validate_args(snippets);
    tracing::debug!(target: HAPROXY, args = %args.join(" "), "validating configuration");

    let check = Command::new(&layout.bin)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(layout.validation_timeout, check).await {
        Ok(result) => result.map_err(|e| SupervisorError::spawn(&layout.bin, e))?,
        Err(_) => return Err(SupervisorError::ValidationTimeout),
    };

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout).into_owned()
    } else {
        stderr.into_owned()
    };
    Err(SupervisorError::validation(single_line(&message)))
}

async fn forward_lines<R>(reader: R, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if is_stderr {
            tracing::warn!(target: HAPROXY, "{line}");
        } else {
            tracing::info!(target: HAPROXY, "{line}");
        }
    }
}

async fn watch_child(mut child: Child, running: watch::Sender<bool>, kill_rx: oneshot::Receiver<()>) {
    let exited = tokio::select! {
        status = child.wait() => status,
        Ok(()) = kill_rx => {
            if let Err(e) = child.start_kill() {
                tracing::warn!(target: HAPROXY, error = %e, "failed to kill proxy");
            }
            child.wait().await
        }
    };

    match exited {
        Ok(status) => tracing::info!(target: HAPROXY, %status, "proxy exited"),
        Err(e) => tracing::warn!(target: HAPROXY, error = %e, "failed to wait for proxy"),
    }
    let _ = running.send(false);
}
