use crate::supervisor::custom_snippets;
use pretty_assertions::assert_eq;
use std::fs::{self, File};
use std::time::{Duration, SystemTime};
use tempfile::tempdir;

#[test]
fn only_cfg_files_in_name_order() {
    // Arrange
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("b.cfg"), "# b").unwrap();
    fs::write(dir.path().join("a.cfg"), "# a").unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
    fs::create_dir(dir.path().join("nested.cfg")).unwrap();

    // Act
    let snippets = custom_snippets(dir.path());

    // Assert
    let names: Vec<_> = snippets
        .keys()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.cfg", "b.cfg"]);
}

#[test]
fn missing_directory_is_empty() {
    let dir = tempdir().unwrap();

    assert!(custom_snippets(&dir.path().join("absent")).is_empty());
}

#[test]
fn addition_modification_and_removal_change_the_map() {
    // Arrange
    let dir = tempdir().unwrap();
    let first = dir.path().join("a.cfg");
    fs::write(&first, "# a").unwrap();
    let before = custom_snippets(dir.path());

    // Act: added
    fs::write(dir.path().join("b.cfg"), "# b").unwrap();
    let added = custom_snippets(dir.path());

    // Act: modified
    let file = File::options().write(true).open(&first).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(60)).unwrap();
    let modified = custom_snippets(dir.path());

    // Act: removed
    fs::remove_file(dir.path().join("b.cfg")).unwrap();
    let removed = custom_snippets(dir.path());

    // Assert
    assert_ne!(before, added);
    assert_ne!(added, modified);
    assert_ne!(modified, removed);
    assert_eq!(removed.len(), 1);
}
