use super::route::{Backend, HTTPS_PORT, HostDef, RouteTable};
use crate::conf::{Options, PluginConfig, split_list};
use crate::discovery::EntityMap;
use crate::labels::LabelStore;
use crate::logging::EASYHAPROXY;
use crate::plugin::{FragmentCollector, PluginContext, PluginError, PluginHost};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::BTreeMap;

/// Result of mapping one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildOutput {
    pub routes: RouteTable,
    /// Hosts that need an ACME certificate, unique, in encounter order.
    pub certbot_hosts: Vec<String>,
    /// `host:port` for every served route, in encounter order.
    pub serving_hosts: Vec<String>,
    /// Inline certificates: file name to PEM text.
    pub certs: BTreeMap<String, String>,
    pub fragments: FragmentCollector,
}

/// Converts discovered label maps into a route table.
pub struct RouteBuilder<'a> {
    options: &'a Options,
    labels: LabelStore,
}

/// Attributes of one definition that apply to every hostname it lists.
struct Definition {
    port: u16,
    backend: Backend,
    proto: String,
    balance: String,
    certbot: bool,
    clone_to_ssl: bool,
    redirect_ssl: bool,
    redirect: BTreeMap<String, String>,
    plugins: Vec<String>,
    plugin_config: BTreeMap<String, PluginConfig>,
}

impl<'a> RouteBuilder<'a> {
    pub fn new(options: &'a Options) -> Self {
        Self {
            options,
            labels: LabelStore::new(options.label_prefix.clone()),
        }
    }

    /// Maps every entity in `snapshot`, runs per-route plugins as routes are
    /// created and the enabled global plugins at the end.
    pub fn build(
        &mut self,
        snapshot: &EntityMap,
        plugins: &mut PluginHost,
    ) -> Result<BuildOutput, PluginError> {
        let mut out = BuildOutput::default();

        for (address, tags) in snapshot {
            self.labels.set_data(tags.clone());

            for def in self.labels.definitions() {
                self.add_definition(address, &def, snapshot, plugins, &mut out)?;
            }
        }

        let ctx = PluginContext::global(snapshot, &out.routes, self.options);
        plugins.run_global(&ctx, &self.options.plugins.enabled_list(), &mut out.fragments)?;

        Ok(out)
    }

    fn key(&self, def: &str, attr: &str) -> String {
        self.labels.create(&[def, attr])
    }

    fn add_definition(
        &self,
        address: &str,
        def: &str,
        snapshot: &EntityMap,
        plugins: &mut PluginHost,
        out: &mut BuildOutput,
    ) -> Result<(), PluginError> {
        let host_key = self.key(def, "host");
        if !self.labels.has(&host_key) {
            return Ok(());
        }

        let Some(port) = self.port_label(def, "port") else {
            return Ok(());
        };
        let mode = self.labels.get(&self.key(def, "mode"), "http");
        let listen = out.routes.listen_mut(port, &mode);

        if self.labels.get_bool(&self.key(def, "redirect_only"), false) {
            let redirect: BTreeMap<String, String> =
                self.labels.get_json(&self.key(def, "redirect"), BTreeMap::new());
            listen.redirect.extend(redirect);
            return Ok(());
        }

        let Some(localport) = self.port_label(def, "localport") else {
            return Ok(());
        };
        listen.ssl_check = self.labels.get(&self.key(def, "ssl-check"), "");

        let definition = self.definition(address, def, port, localport);

        let mut hostnames = split_list(&self.labels.get(&host_key, ""));
        hostnames.sort();

        for hostname in &hostnames {
            self.add_host(hostname, &definition, snapshot, plugins, out)?;
        }

        if hostnames.is_empty() {
            return Ok(());
        }

        let ssl_cert_key = self.key(def, "sslcert");
        if self.labels.has(&ssl_cert_key) {
            let filename = format!("{}.pem", self.labels.get(&host_key, ""));
            match decode_cert(&self.labels.get(&ssl_cert_key, "")) {
                Ok(pem) => {
                    out.certs.insert(filename, pem);
                }
                Err(reason) => {
                    tracing::warn!(target: EASYHAPROXY, file = %filename, reason = %reason, "skipping inline certificate")
                }
            }
            mark_ssl(out, port, definition.clone_to_ssl);
        }

        if self.labels.get_bool(&self.key(def, "ssl"), false) {
            mark_ssl(out, port, definition.clone_to_ssl);
        }

        Ok(())
    }

    fn definition(&self, address: &str, def: &str, port: u16, localport: u16) -> Definition {
        let socket = self.labels.get(&self.key(def, "socket"), "");
        let backend = if socket.is_empty() {
            Backend::Inet {
                host: address.to_string(),
                port: localport,
            }
        } else {
            Backend::Socket(socket)
        };

        let plugins_key = self.key(def, "plugins");
        let plugins = if self.labels.has(&plugins_key) {
            split_list(&self.labels.get(&plugins_key, ""))
        } else {
            Vec::new()
        };
        let plugin_config = plugins
            .iter()
            .map(|name| {
                let prefix = self.labels.create(&[def, "plugin", name.as_str()]);
                (name.clone(), self.labels.prefixed(&prefix))
            })
            .collect();

        Definition {
            port,
            backend,
            proto: self.labels.get(&self.key(def, "proto"), ""),
            balance: self.labels.get(&self.key(def, "balance"), "roundrobin"),
            certbot: self.labels.get_bool(&self.key(def, "certbot"), false)
                && self.options.certbot.email_configured(),
            clone_to_ssl: self.labels.get_bool(&self.key(def, "clone_to_ssl"), false),
            redirect_ssl: self.labels.get_bool(&self.key(def, "redirect_ssl"), false),
            redirect: self.labels.get_json(&self.key(def, "redirect"), BTreeMap::new()),
            plugins,
            plugin_config,
        }
    }

    fn add_host(
        &self,
        hostname: &str,
        def: &Definition,
        snapshot: &EntityMap,
        plugins: &mut PluginHost,
        out: &mut BuildOutput,
    ) -> Result<(), PluginError> {
        let port = def.port;
        out.serving_hosts.push(format!("{hostname}:{port}"));

        {
            let listen = out.routes.listen_mut(port, "http");
            let host = listen
                .hosts
                .entry(hostname.to_string())
                .or_insert_with(|| HostDef::new(def.proto.clone()));
            host.backends.insert(def.backend.clone());
            host.certbot = def.certbot;
            host.redirect_ssl = def.redirect_ssl;
            host.balance = def.balance.clone();

            // Every served host replaces the port's redirect map; only
            // redirect-only definitions accumulate into it.
            listen.redirect = def.redirect.clone();
        }

        let ctx = PluginContext {
            snapshot,
            routes: &out.routes,
            options: self.options,
            domain: Some(hostname),
            port: Some(port),
            host_config: out.routes.host(port, hostname),
        };
        let fragments = plugins.run_route(&ctx, &def.plugins, &def.plugin_config, &mut out.fragments)?;

        let listen = out.routes.listen_mut(port, "http");
        let Some(host) = listen.hosts.get_mut(hostname) else {
            return Ok(());
        };
        host.plugin_fragments = fragments;

        if def.certbot || def.clone_to_ssl {
            let mut mirror = host.clone();
            mirror.certbot = false;
            mirror.redirect_ssl = false;

            let created = out.routes.get(HTTPS_PORT).is_none();
            let https = out.routes.listen_mut(HTTPS_PORT, "http");
            if created {
                https.ssl_check = "ssl".to_string();
            }
            https.ssl = true;
            https.hosts.insert(hostname.to_string(), mirror);

            if def.certbot && !out.certbot_hosts.iter().any(|h| h == hostname) {
                out.certbot_hosts.push(hostname.to_string());
            }
        }

        Ok(())
    }

    fn port_label(&self, def: &str, attr: &str) -> Option<u16> {
        let raw = self.labels.get(&self.key(def, attr), "80");
        match raw.trim().parse::<u16>() {
            Ok(port) => Some(port),
            Err(_) => {
                tracing::warn!(target: EASYHAPROXY, definition = def, attribute = attr, value = %raw, "skipping definition with invalid port");
                None
            }
        }
    }
}

fn mark_ssl(out: &mut BuildOutput, port: u16, clone_to_ssl: bool) {
    if let Some(listen) = out.routes.get_mut(port) {
        listen.ssl = !clone_to_ssl;
    }
}

fn decode_cert(raw: &str) -> Result<String, String> {
    let bytes = STANDARD.decode(raw.trim()).map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}
