pub mod collector;
pub mod errors;
pub mod registry;
pub mod result;

use self::errors::PluginError;
use self::result::{PluginResult, ResourceRequest};
use crate::conf::{Options, PluginConfig};
use crate::discovery::EntityMap;
use crate::mapping::{HostDef, RouteTable};
use serde::{Deserialize, Serialize};

/// Scope a plugin runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    /// Once per tick.
    Global,
    /// Once per `(port, hostname)` route.
    Route,
}

/// A unit that contributes HAProxy configuration fragments.
///
/// Plugin instances live for the whole process. The host calls `configure`
/// before every per-route `process` with the merged settings for that route,
/// so implementations must reset to their defaults on each call.
pub trait Plugin: Send {
    fn name(&self) -> &str;

    fn kind(&self) -> PluginKind;

    /// Absorbs settings. Called many times over the plugin's lifetime.
    fn configure(&mut self, config: &PluginConfig) -> Result<(), PluginError>;

    /// Directories or seed files the plugin needs; applied once at startup.
    fn initialize(&mut self) -> Vec<ResourceRequest> {
        Vec::new()
    }

    fn process(&mut self, ctx: &PluginContext<'_>) -> Result<PluginResult, PluginError>;
}

/// Everything a plugin may inspect while producing its output.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PluginContext<'a> {
    pub snapshot: &'a EntityMap,
    pub routes: &'a RouteTable,
    pub options: &'a Options,
    pub domain: Option<&'a str>,
    pub port: Option<u16>,
    pub host_config: Option<&'a HostDef>,
}

impl<'a> PluginContext<'a> {
    pub fn global(snapshot: &'a EntityMap, routes: &'a RouteTable, options: &'a Options) -> Self {
        Self {
            snapshot,
            routes,
            options,
            domain: None,
            port: None,
            host_config: None,
        }
    }

    /// Domain with dots and colons replaced, usable as an HAProxy identifier.
    pub fn domain_safe(&self) -> String {
        self.domain
            .unwrap_or_default()
            .replace(['.', ':'], "_")
    }
}
