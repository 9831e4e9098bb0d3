use crate::conf::{ConfigError, discover, resolve_glob};

use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[test]
fn discover_returns_sorted_snippets() {
    // Arrange
    let dir = tempdir().unwrap();
    let root = dir.path();

    fs::write(root.join("20-rates.cfg"), "").unwrap();
    fs::write(root.join("10-acl.cfg"), "").unwrap();
    fs::write(root.join("notes.txt"), "").unwrap();

    // Act
    let result = discover(root, "*.cfg").unwrap();

    // Assert
    assert_eq!(result, vec![root.join("10-acl.cfg"), root.join("20-rates.cfg")]);
}

#[test]
fn discover_returns_empty_vec_for_missing_root() {
    // Arrange
    let dir = tempdir().unwrap();
    let root = dir.path().join("conf.d");

    // Act
    let result = discover(&root, "*.cfg").unwrap();

    // Assert
    assert!(result.is_empty());
}

#[test]
fn discover_filters_out_directories() {
    // Arrange
    let dir = tempdir().unwrap();
    let root = dir.path();

    fs::create_dir(root.join("global.cfg")).unwrap();

    // Act
    let result = discover(root, "*.cfg").unwrap();

    // Assert
    assert!(result.is_empty());
}

#[test]
fn discover_returns_error_for_invalid_glob() {
    // Arrange
    let dir = tempdir().unwrap();

    // Act
    let err = discover(dir.path(), "[").unwrap_err();

    // Assert
    match err {
        ConfigError::Glob { pattern, .. } => assert!(pattern.contains('[')),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn resolve_glob_joins_root_and_pattern() {
    // Arrange
    let root = Path::new("/etc/easyhaproxy/plugins");

    // Act
    let resolved = resolve_glob(root, "*.wasm");

    // Assert
    assert_eq!(resolved, "/etc/easyhaproxy/plugins/*.wasm");
}
