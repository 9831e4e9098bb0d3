use super::result::{PluginResult, ResourceRequest};

/// Fragments gathered across every plugin call of one build.
///
/// Global and defaults snippets are deduplicated, keeping first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentCollector {
    pub global: Vec<String>,
    pub defaults: Vec<String>,
    pub resources: Vec<ResourceRequest>,
}

impl FragmentCollector {
    /// Takes the out-of-scope parts of a result; returns the scoped snippet.
    pub fn absorb(&mut self, result: PluginResult) -> String {
        for snippet in result.global_configs {
            push_unique(&mut self.global, snippet);
        }
        for snippet in result.defaults_configs {
            push_unique(&mut self.defaults, snippet);
        }
        for resource in result.resources {
            if !self.resources.contains(&resource) {
                self.resources.push(resource);
            }
        }
        result.haproxy_config
    }

    /// Adds a global plugin's own snippet; these are not deduplicated.
    pub fn push_global(&mut self, snippet: String) {
        if !snippet.is_empty() {
            self.global.push(snippet);
        }
    }
}

fn push_unique(list: &mut Vec<String>, snippet: String) {
    if !snippet.is_empty() && !list.contains(&snippet) {
        list.push(snippet);
    }
}
