use crate::conf::discover;
use crate::logging::EASYHAPROXY;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Drop-in snippet files keyed by path, valued by modification time.
pub type SnippetMap = BTreeMap<PathBuf, SystemTime>;

/// Scans `<dir>/*.cfg`. Any difference between two scans is a reload trigger.
pub fn custom_snippets(dir: &Path) -> SnippetMap {
    let files = match discover(dir, "*.cfg") {
        Ok(files) => files,
        Err(e) => {
            tracing::warn!(target: EASYHAPROXY, error = %e, "failed to scan custom config directory");
            return SnippetMap::new();
        }
    };

    files
        .into_iter()
        .filter_map(|path| {
            let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
            Some((path, modified))
        })
        .collect()
}
