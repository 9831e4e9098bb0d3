//! The periodic driver: discovery, certificates, render and reload.

mod render;
mod startup;

#[cfg(test)]
mod tests;

pub use render::{Rendered, render_snapshot};
pub use startup::{load_static_options, prepare_acme};

use crate::certbot::{AcmeClient, CertbotProcess, CertificateManager};
use crate::conf::Options;
use crate::discovery::{Discover, Discovery, EntityMap};
use crate::logging::{EASYHAPROXY, single_line};
use crate::paths::Paths;
use crate::plugin::PluginHost;
use crate::supervisor::{Action, ProxyLayout, SnippetMap, Supervisor, custom_snippets};
use anyhow::{Context, Result};
use std::fs;
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Unchanged,
    Reloaded,
}

/// What the last successful tick acted on.
#[derive(Debug, Default)]
struct Previous {
    snapshot: Option<EntityMap>,
    snippets: SnippetMap,
    certbot_hosts: Vec<String>,
}

pub struct Reconciler {
    options: Options,
    paths: Paths,
    layout: ProxyLayout,
    discovery: Box<dyn Discover>,
    plugins: PluginHost,
    certs: CertificateManager,
    previous: Previous,
    supervisor: Option<Supervisor>,
}

impl Reconciler {
    pub fn new(
        options: Options,
        paths: Paths,
        discovery: Box<dyn Discover>,
        plugins: PluginHost,
        acme: Box<dyn AcmeClient>,
    ) -> Self {
        let certs = CertificateManager::new(options.certbot.clone(), paths.clone(), acme)
            .verbose(options.log_levels.certbot_verbose());

        Self {
            layout: ProxyLayout::new(&options, &paths),
            options,
            paths,
            discovery,
            plugins,
            certs,
            previous: Previous::default(),
            supervisor: None,
        }
    }

    /// Wires the real collaborators for `options`.
    ///
    /// Creates the directories, loads and initializes plugins, connects the
    /// discovery adapter and checks the ACME server. An unreachable ACME
    /// server is only reported.
    pub async fn prepare(mut options: Options, paths: Paths) -> Result<Self> {
        paths.ensure()?;

        let plugins_dir = options.plugins.plugins_dir(&paths.base);
        let mut plugins = PluginHost::load(&options.plugins, &plugins_dir)
            .context("failed to load plugins")?;
        plugins
            .initialize()
            .context("failed to initialize plugins")?;

        prepare_acme(&mut options.certbot).await;

        let discovery = Discovery::connect(&options, &paths)
            .await
            .with_context(|| format!("failed to start {} discovery", options.discover))?;
        let acme = CertbotProcess::new(&options.certbot_bin);

        Ok(Self::new(options, paths, Box::new(discovery), plugins, Box::new(acme)))
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn supervisor(&self) -> Option<&Supervisor> {
        self.supervisor.as_ref()
    }

    /// One pass of the loop.
    ///
    /// Work is only done when the snapshot, the drop-in snippets or the
    /// certificates changed, or the proxy is not running. State is committed
    /// after a successful reload, so a failed tick is retried on the next one.
    ///
    /// A failed discovery reuses the last committed snapshot; with none yet,
    /// the tick fails.
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        tracing::debug!(target: EASYHAPROXY, "Heartbeat");

        let snapshot = match self.discovery.refresh().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let Some(previous) = self.previous.snapshot.clone() else {
                    return Err(e).context("discovery failed");
                };
                tracing::error!(target: EASYHAPROXY, error = %single_line(&e.to_string()), "discovery failed, keeping previous routes");
                previous
            }
        };
        let snippets = custom_snippets(&self.layout.custom_dir);
        let acted = self.certs.check_certificates(&self.previous.certbot_hosts).await;
        let alive = self.supervisor.as_ref().is_some_and(Supervisor::alive);

        let changed = self.previous.snapshot.as_ref() != Some(&snapshot);
        let snippets_changed = snippets != self.previous.snippets;
        if !(acted || changed || snippets_changed || !alive) {
            return Ok(TickOutcome::Unchanged);
        }

        tracing::info!(target: EASYHAPROXY, acted, changed, snippets_changed, alive, "configuration is dirty");

        let rendered = render_snapshot(&self.options, &self.paths, &snapshot, &mut self.plugins)
            .context("failed to build configuration")?;
        tracing::info!(target: EASYHAPROXY, hosts = %rendered.build.serving_hosts.join(", "), "found hosts");
        self.write(&rendered)?;
        self.handoff().await?;

        self.previous = Previous {
            snapshot: Some(snapshot),
            snippets,
            certbot_hosts: rendered.build.certbot_hosts,
        };
        Ok(TickOutcome::Reloaded)
    }

    fn write(&self, rendered: &Rendered) -> Result<()> {
        let config = &self.paths.haproxy_config;
        fs::write(config, &rendered.config)
            .with_context(|| format!("failed to write {}", config.display()))?;

        for (name, pem) in &rendered.build.certs {
            let path = self.paths.certs_haproxy.join(name);
            fs::write(&path, pem).with_context(|| format!("failed to write {}", path.display()))?;
        }

        for resource in &rendered.build.fragments.resources {
            match resource.apply() {
                Ok(true) => {
                    tracing::debug!(target: EASYHAPROXY, path = %resource.path().display(), "plugin resource written")
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(target: EASYHAPROXY, path = %resource.path().display(), error = %e, "failed to write plugin resource")
                }
            }
        }

        Ok(())
    }

    /// Starts the next proxy, then stops the previous one.
    ///
    /// The previous one is only replaced once the next one passed the config
    /// check and survived its startup grace; otherwise it keeps serving.
    async fn handoff(&mut self) -> Result<()> {
        let action = match self.supervisor {
            Some(_) => Action::Reload,
            None => Action::Start,
        };

        let next = Supervisor::start(&self.layout, action)
            .await
            .with_context(|| format!("proxy {action:?} failed"))?;

        if let Some(old) = self.supervisor.replace(next) {
            if let Err(e) = old.terminate() {
                tracing::warn!(target: EASYHAPROXY, error = %e, "failed to stop previous proxy");
            }
        }
        Ok(())
    }

    /// Runs until SIGTERM or Ctrl-C.
    ///
    /// The first tick must bring the proxy up; its failure is returned.
    /// Later failures are logged and the previous proxy keeps running.
    pub async fn run(mut self) -> Result<()> {
        self.tick().await.context("initial proxy start failed")?;

        let mut terminate = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        let mut interval = tokio::time::interval(self.options.refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(target: EASYHAPROXY, error = %single_line(&format!("{e:#}")), "tick failed");
                    }
                }
                _ = terminate.recv() => {
                    tracing::info!(target: EASYHAPROXY, "SIGTERM received");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!(target: EASYHAPROXY, "interrupt received");
                    break;
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    pub fn shutdown(&mut self) {
        if let Some(supervisor) = self.supervisor.take() {
            if let Err(e) = supervisor.terminate() {
                tracing::warn!(target: EASYHAPROXY, error = %e, "failed to stop proxy");
            }
        }
    }
}
