use crate::logging::EASYHAPROXY;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};


/// Tag map published by one discovered entity.
pub type Labels = BTreeMap<String, String>;

/// In-memory view of one entity's labels with prefix-aware lookups.
///
/// Lookups never fail: missing keys yield the caller's default and malformed
/// typed values are logged and treated as absent.
#[derive(Debug, Clone, Default)]
pub struct LabelStore {
    prefix: String,
    data: Labels,
}

impl LabelStore {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            data: Labels::new(),
        }
    }

    pub fn lookup_label(&self) -> &str {
        &self.prefix
    }

    pub fn set_data(&mut self, data: Labels) {
        self.data = data;
    }

    pub fn data(&self) -> &Labels {
        &self.data
    }

    /// Builds a `prefix.a.b.c` key.
    pub fn create<S: AsRef<str>>(&self, parts: &[S]) -> String {
        let mut key = self.prefix.clone();
        for part in parts {
            key.push('.');
            key.push_str(part.as_ref());
        }
        key
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn get(&self, key: &str, default: &str) -> String {
        self.data
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.data.get(key) {
            Some(value) => parse_bool(value),
            None => default,
        }
    }

    /// Parses the value as JSON. Malformed input is logged and yields `default`.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Some(raw) = self.data.get(key) else {
            return default;
        };

        if raw.trim().is_empty() {
            return default;
        }

        match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(target: EASYHAPROXY, label = key, error = %e, "invalid JSON in label");
                default
            }
        }
    }

    /// All keys below `key_prefix.`, with that prefix stripped.
    pub fn prefixed(&self, key_prefix: &str) -> BTreeMap<String, String> {
        let lead = format!("{key_prefix}.");
        self.data
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&lead).map(|rest| (rest.to_string(), v.clone())))
            .filter(|(k, _)| !k.is_empty())
            .collect()
    }

    /// Definition tokens: every `def` for which a key `prefix.def.attr` exists.
    pub fn definitions(&self) -> BTreeSet<String> {
        let lead = format!("{}.", self.prefix);
        self.data
            .keys()
            .filter_map(|k| k.strip_prefix(&lead))
            .filter_map(|rest| rest.split_once('.'))
            .filter(|(def, attr)| !def.is_empty() && !attr.is_empty())
            .map(|(def, _)| def.to_string())
            .collect()
    }
}

/// `true`, `1` and `yes` are truthy, case-insensitively.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}
