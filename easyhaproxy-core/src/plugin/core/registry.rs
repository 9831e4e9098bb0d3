use super::collector::FragmentCollector;
use super::errors::PluginError;
use super::{Plugin, PluginContext, PluginKind};
use crate::conf::{PluginConfig, PluginOptions, discover};
use crate::logging::EASYHAPROXY;
use crate::plugin::builtin::cleanup::CleanupPlugin;
use crate::plugin::builtin::cloudflare::CloudflarePlugin;
use crate::plugin::builtin::deny_pages::DenyPagesPlugin;
use crate::plugin::builtin::fastcgi::FastcgiPlugin;
use crate::plugin::builtin::ip_whitelist::IpWhitelistPlugin;
use crate::plugin::builtin::jwt_validator::JwtValidatorPlugin;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

type BuiltinBuilder = fn() -> Box<dyn Plugin>;

fn build_cleanup() -> Box<dyn Plugin> {
    Box::new(CleanupPlugin::default())
}

fn build_cloudflare() -> Box<dyn Plugin> {
    Box::new(CloudflarePlugin::default())
}

fn build_deny_pages() -> Box<dyn Plugin> {
    Box::new(DenyPagesPlugin::default())
}

fn build_fastcgi() -> Box<dyn Plugin> {
    Box::new(FastcgiPlugin::default())
}

fn build_ip_whitelist() -> Box<dyn Plugin> {
    Box::new(IpWhitelistPlugin::default())
}

fn build_jwt_validator() -> Box<dyn Plugin> {
    Box::new(JwtValidatorPlugin::default())
}

pub fn builtin_builders() -> HashMap<&'static str, BuiltinBuilder> {
    let mut map = HashMap::new();

    map.insert("cleanup", build_cleanup as BuiltinBuilder);
    map.insert("cloudflare", build_cloudflare as BuiltinBuilder);
    map.insert("deny_pages", build_deny_pages as BuiltinBuilder);
    map.insert("fastcgi", build_fastcgi as BuiltinBuilder);
    map.insert("ip_whitelist", build_ip_whitelist as BuiltinBuilder);
    map.insert("jwt_validator", build_jwt_validator as BuiltinBuilder);

    map
}

/// Owns every loaded plugin and applies the error policy around them.
pub struct PluginHost {
    plugins: Vec<Box<dyn Plugin>>,
    abort_on_error: bool,
    global_config: BTreeMap<String, PluginConfig>,
}

impl PluginHost {
    pub fn new(options: &PluginOptions) -> Self {
        Self {
            plugins: Vec::new(),
            abort_on_error: options.abort_on_error,
            global_config: options.config.clone(),
        }
    }

    /// Built-ins first, then `<plugins_dir>/*.wasm`; every plugin is then
    /// configured with its global settings.
    pub fn load(options: &PluginOptions, plugins_dir: &Path) -> Result<Self, PluginError> {
        let mut host = Self::new(options);

        let builders = builtin_builders();
        let mut names: Vec<_> = builders.keys().copied().collect();
        names.sort_unstable();
        for name in names {
            host.register(builders[name]());
            tracing::debug!(target: EASYHAPROXY, plugin = name, source = "builtin", "loaded plugin");
        }

        host.load_external(plugins_dir)?;
        host.configure_all()?;

        Ok(host)
    }

    /// Adds a plugin; a plugin with the same name is replaced in place.
    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        match self.plugins.iter_mut().find(|p| p.name() == plugin.name()) {
            Some(slot) => *slot = plugin,
            None => self.plugins.push(plugin),
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn kind_of(&self, name: &str) -> Option<PluginKind> {
        self.plugins.iter().find(|p| p.name() == name).map(|p| p.kind())
    }

    fn load_external(&mut self, dir: &Path) -> Result<(), PluginError> {
        if !dir.is_dir() {
            tracing::debug!(target: EASYHAPROXY, dir = %dir.display(), "plugin directory does not exist, skipping external plugins");
            return Ok(());
        }

        let files = discover(dir, "*.wasm").map_err(|e| PluginError::load(dir, e))?;
        for path in files {
            match load_wasm_plugin(&path) {
                Ok(plugin) => {
                    tracing::debug!(target: EASYHAPROXY, plugin = plugin.name(), source = "external", "loaded plugin");
                    self.register(plugin);
                }
                Err(e) => contain(self.abort_on_error, e)?,
            }
        }

        Ok(())
    }

    pub fn configure_all(&mut self) -> Result<(), PluginError> {
        for plugin in self.plugins.iter_mut() {
            let config = self
                .global_config
                .get(plugin.name())
                .cloned()
                .unwrap_or_default();

            if let Err(e) = plugin.configure(&config) {
                contain(self.abort_on_error, e)?;
            }
        }
        Ok(())
    }

    /// Applies every plugin's resource requests. Runs once at startup.
    pub fn initialize(&mut self) -> Result<(), PluginError> {
        for plugin in self.plugins.iter_mut() {
            for resource in plugin.initialize() {
                match resource.apply() {
                    Ok(true) => {
                        tracing::debug!(target: EASYHAPROXY, plugin = plugin.name(), path = %resource.path().display(), "plugin resource created")
                    }
                    Ok(false) => {}
                    Err(e) => contain(
                        self.abort_on_error,
                        PluginError::resource(plugin.name(), resource.path(), e),
                    )?,
                }
            }
        }
        Ok(())
    }

    /// Runs the enabled per-route plugins for one route, in load order.
    ///
    /// Each plugin is configured with its global settings overlaid by the
    /// route's own `plugin.NAME.*` labels. Returns the backend snippets.
    pub fn run_route(
        &mut self,
        ctx: &PluginContext<'_>,
        enabled: &[String],
        route_config: &BTreeMap<String, PluginConfig>,
        collector: &mut FragmentCollector,
    ) -> Result<Vec<String>, PluginError> {
        let mut fragments = Vec::new();

        for plugin in self.plugins.iter_mut() {
            if plugin.kind() != PluginKind::Route || !is_enabled(enabled, plugin.name()) {
                continue;
            }

            let mut config = self
                .global_config
                .get(plugin.name())
                .cloned()
                .unwrap_or_default();
            if let Some(overrides) = route_config.get(plugin.name()) {
                config.extend(overrides.clone());
            }

            tracing::debug!(target: EASYHAPROXY, plugin = plugin.name(), domain = ctx.domain, "executing route plugin");
            match plugin.configure(&config).and_then(|_| plugin.process(ctx)) {
                Ok(result) => {
                    log_metadata(plugin.name(), &result.metadata);
                    let snippet = collector.absorb(result);
                    if !snippet.is_empty() {
                        fragments.push(snippet);
                    }
                }
                Err(e) => contain(self.abort_on_error, e)?,
            }
        }

        Ok(fragments)
    }

    /// Runs the enabled global plugins once.
    pub fn run_global(
        &mut self,
        ctx: &PluginContext<'_>,
        enabled: &[String],
        collector: &mut FragmentCollector,
    ) -> Result<(), PluginError> {
        for plugin in self.plugins.iter_mut() {
            if plugin.kind() != PluginKind::Global || !is_enabled(enabled, plugin.name()) {
                continue;
            }

            tracing::debug!(target: EASYHAPROXY, plugin = plugin.name(), "executing global plugin");
            match plugin.process(ctx) {
                Ok(mut result) => {
                    log_metadata(plugin.name(), &result.metadata);
                    collector.push_global(std::mem::take(&mut result.haproxy_config));
                    collector.absorb(result);
                }
                Err(e) => contain(self.abort_on_error, e)?,
            }
        }
        Ok(())
    }
}

fn is_enabled(enabled: &[String], name: &str) -> bool {
    enabled.iter().any(|n| n == name)
}

fn log_metadata(name: &str, metadata: &BTreeMap<String, serde_json::Value>) {
    if !metadata.is_empty() {
        tracing::debug!(target: EASYHAPROXY, plugin = name, metadata = ?metadata, "plugin metadata");
    }
}

/// Applies the `abort_on_error` policy to one plugin failure.
fn contain(abort_on_error: bool, err: PluginError) -> Result<(), PluginError> {
    if abort_on_error {
        tracing::error!(target: EASYHAPROXY, error = %err, "plugin failure");
        return Err(err);
    }

    tracing::warn!(target: EASYHAPROXY, error = %err, "plugin failure ignored");
    Ok(())
}

#[cfg(feature = "wasm")]
fn load_wasm_plugin(path: &Path) -> Result<Box<dyn Plugin>, PluginError> {
    let plugin = crate::plugin::wasm::wasm_plugin::WasmPlugin::load(path)?;
    Ok(Box::new(plugin))
}

#[cfg(not(feature = "wasm"))]
fn load_wasm_plugin(path: &Path) -> Result<Box<dyn Plugin>, PluginError> {
    Err(PluginError::load(
        path,
        "WASM plugins are disabled. Rebuild with --features wasm",
    ))
}
