use crate::conf::{DiscoverMode, Options, SslMode};
use crate::paths::Paths;
use crate::plugin::PluginHost;
use crate::reconcile::{load_static_options, prepare_acme, render_snapshot};
use crate::discovery::EntityMap;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::tempdir;

#[test]
fn static_option_blocks_override_flags() {
    // Arrange
    let dir = tempdir().unwrap();
    let paths = Paths::new(dir.path());
    paths.ensure().unwrap();
    fs::write(
        &paths.static_config,
        "ssl_mode: strict\ncertbot:\n  email: ops@example.com\ncontainers: {}\n",
    )
    .unwrap();

    // Act
    let (options, error) = load_static_options(Options::new(DiscoverMode::Static), &paths);

    // Assert
    assert!(error.is_none());
    assert_eq!(options.ssl_mode, SslMode::Strict);
    assert_eq!(options.certbot.email, "ops@example.com");
}

#[test]
fn other_modes_ignore_the_static_file() {
    // Arrange
    let dir = tempdir().unwrap();
    let paths = Paths::new(dir.path());
    paths.ensure().unwrap();
    fs::write(&paths.static_config, "ssl_mode: strict\n").unwrap();

    // Act
    let (options, error) = load_static_options(Options::new(DiscoverMode::Docker), &paths);

    // Assert
    assert!(error.is_none());
    assert_eq!(options.ssl_mode, SslMode::Default);
}

#[test]
fn broken_static_file_keeps_flags_and_reports() {
    // Arrange
    let dir = tempdir().unwrap();
    let paths = Paths::new(dir.path());
    paths.ensure().unwrap();
    fs::write(&paths.static_config, "ssl_mode: [unterminated\n").unwrap();
    let flags = Options::new(DiscoverMode::Static);

    // Act
    let (options, error) = load_static_options(flags.clone(), &paths);

    // Assert
    assert!(error.is_some());
    assert_eq!(options, flags);
}

#[tokio::test]
async fn email_alone_keeps_acme_enabled() {
    // Arrange
    let mut options = Options::new(DiscoverMode::Static);
    options.certbot.email = "ops@example.com".to_string();

    // Act
    prepare_acme(&mut options.certbot).await;

    // Assert
    assert!(options.certbot.email_configured());
    assert_eq!(options.certbot.server, "");
}

#[tokio::test]
async fn unreachable_acme_server_keeps_acme_enabled() {
    // Arrange
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/directory", listener.local_addr().unwrap());
    drop(listener);
    let mut options = Options::new(DiscoverMode::Static);
    options.certbot.email = "ops@example.com".to_string();
    options.certbot.server = url.clone();

    // Act
    prepare_acme(&mut options.certbot).await;

    // Assert
    assert!(options.certbot.email_configured());
    assert_eq!(options.certbot.server, url);
}

#[tokio::test]
async fn acme_without_email_is_left_alone() {
    // Arrange
    let mut options = Options::new(DiscoverMode::Static);
    options.certbot.server = "staging".to_string();

    // Act
    prepare_acme(&mut options.certbot).await;

    // Assert
    assert_eq!(options.certbot.server, "staging");
    assert!(!options.certbot.email_configured());
}

#[tokio::test]
async fn staging_server_skips_the_probe() {
    // Arrange
    let mut options = Options::new(DiscoverMode::Static);
    options.certbot.email = "ops@example.com".to_string();
    options.certbot.server = "staging".to_string();

    // Act
    prepare_acme(&mut options.certbot).await;

    // Assert
    assert!(options.certbot.email_configured());
}

#[test]
fn empty_snapshot_renders_the_fixed_sections() {
    // Arrange
    let options = Options::new(DiscoverMode::Static);
    let paths = Paths::new("/etc/easyhaproxy");
    let mut plugins = PluginHost::new(&options.plugins);

    // Act
    let rendered = render_snapshot(&options, &paths, &EntityMap::new(), &mut plugins).unwrap();

    // Assert
    assert!(rendered.config.contains("backend certbot_backend"));
    assert!(rendered.config.contains("server certbot 127.0.0.1:2080"));
    assert!(rendered.build.certbot_hosts.is_empty());
}
