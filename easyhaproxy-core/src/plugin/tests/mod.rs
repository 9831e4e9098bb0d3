
use crate::conf::{DiscoverMode, Options};
use crate::discovery::EntityMap;
use crate::mapping::RouteTable;
use crate::plugin::PluginContext;

/// Owned inputs for building plugin contexts in tests.
struct Fixture {
    snapshot: EntityMap,
    routes: RouteTable,
    options: Options,
}

impl Fixture {
    fn new() -> Self {
        Self {
            snapshot: EntityMap::new(),
            routes: RouteTable::new(),
            options: Options::new(DiscoverMode::Static),
        }
    }

    fn global(&self) -> PluginContext<'_> {
        PluginContext::global(&self.snapshot, &self.routes, &self.options)
    }

    fn route<'a>(&'a self, domain: &'a str) -> PluginContext<'a> {
        PluginContext {
            domain: Some(domain),
            port: Some(80),
            ..self.global()
        }
    }
}

fn config(pairs: &[(&str, &str)]) -> crate::conf::PluginConfig {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
