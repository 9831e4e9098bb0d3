use super::fake::FakeBinaries;
use easyhaproxy_core::certbot::CertbotProcess;
use easyhaproxy_core::conf::{DiscoverMode, Options};
use easyhaproxy_core::discovery::StaticDiscovery;
use easyhaproxy_core::paths::Paths;
use easyhaproxy_core::plugin::PluginHost;
use easyhaproxy_core::reconcile::{Reconciler, TickOutcome};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// A static-mode driver running against fake binaries in a scratch directory.
///
/// Everything except the proxy and ACME processes is real: the static file
/// is read from disk, built-in plugins run, and the config is written under
/// `<dir>/base`.
pub struct Deployment {
    pub reconciler: Reconciler,
    pub paths: Paths,
    pub bins: FakeBinaries,
    pub dir: TempDir,
}

impl Deployment {
    pub fn new(static_config: &str) -> Self {
        Self::with_options(static_config, |_| {})
    }

    pub fn with_options(static_config: &str, configure: impl FnOnce(&mut Options)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bins = FakeBinaries::install(dir.path());

        let paths = Paths::new(dir.path().join("base"))
            .with_pid_file(dir.path().join("haproxy.pid"))
            .with_admin_socket(dir.path().join("haproxy.sock"));
        paths.ensure().unwrap();
        fs::write(&paths.static_config, static_config).unwrap();

        let mut options = Options::new(DiscoverMode::Static);
        options.haproxy_bin = bins.haproxy.clone();
        options.certbot_bin = bins.certbot.clone();
        configure(&mut options);

        let mut plugins = PluginHost::load(&options.plugins, &paths.plugins).unwrap();
        plugins.initialize().unwrap();

        let discovery = StaticDiscovery::new(paths.static_config.clone(), options.label_prefix.clone());
        let acme = CertbotProcess::new(&options.certbot_bin);

        let reconciler = Reconciler::new(
            options,
            paths.clone(),
            Box::new(discovery),
            plugins,
            Box::new(acme),
        );

        Self {
            reconciler,
            paths,
            bins,
            dir,
        }
    }

    pub async fn tick(&mut self) -> TickOutcome {
        self.reconciler.tick().await.unwrap()
    }

    pub fn edit_static(&self, static_config: &str) {
        fs::write(&self.paths.static_config, static_config).unwrap();
    }

    pub fn add_snippet(&self, name: &str, body: &str) -> PathBuf {
        let path = self.paths.custom_config_dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    pub fn config(&self) -> String {
        fs::read_to_string(&self.paths.haproxy_config).unwrap()
    }

    pub fn proxy_pid(&self) -> u32 {
        self.reconciler
            .supervisor()
            .and_then(|s| s.pid())
            .expect("proxy is not running")
    }
}

impl Drop for Deployment {
    fn drop(&mut self) {
        self.reconciler.shutdown();
    }
}
