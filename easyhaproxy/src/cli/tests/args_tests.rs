use crate::cli::RunArgs;
use clap::Parser;
use easyhaproxy_core::conf::{DeploymentMode, DiscoverMode, SslMode};
use easyhaproxy_core::logging::LogLevel;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
struct TestCli {
    #[command(flatten)]
    run: RunArgs,
}

fn parse(args: &[&str]) -> RunArgs {
    let mut argv = vec!["easyhaproxy"];
    argv.extend_from_slice(args);
    TestCli::try_parse_from(argv).unwrap().run
}

#[test]
fn defaults_resolve_to_documented_values() {
    // Arrange
    let args = parse(&["--discover", "static", "--base-path", "/srv/ehp"]);

    // Act
    let (options, paths) = args.resolve().unwrap();

    // Assert
    assert_eq!(options.discover, DiscoverMode::Static);
    assert_eq!(options.label_prefix, "easyhaproxy");
    assert_eq!(options.ssl_mode, SslMode::Default);
    assert_eq!(options.refresh_interval, Duration::from_secs(10));
    assert_eq!(options.stats, None);
    assert_eq!(options.certbot.retry_count, 60);
    assert_eq!(options.certbot.preferred_challenges, "http");
    assert_eq!(options.kubernetes.deployment_mode, DeploymentMode::Auto);
    assert_eq!(options.dashboard_port, 9190);
    assert_eq!(paths.haproxy_config, PathBuf::from("/srv/ehp/haproxy/haproxy.cfg"));
    assert_eq!(paths.pid_file, PathBuf::from("/run/haproxy.pid"));
}

#[test]
fn password_enables_stats() {
    // Arrange
    let args = parse(&[
        "--discover",
        "docker",
        "--haproxy-password",
        "secret",
        "--haproxy-stats-port",
        "2000",
    ]);

    // Act
    let (options, _) = args.resolve().unwrap();

    // Assert
    let stats = options.stats.unwrap();
    assert_eq!(stats.username, "admin");
    assert_eq!(stats.password, "secret");
    assert_eq!(stats.port, 2000);
}

#[test]
fn unknown_discover_mode_is_rejected_by_the_parser() {
    let result = TestCli::try_parse_from(["easyhaproxy", "--discover", "nomad"]);

    assert!(result.is_err());
}

#[test]
fn ssl_mode_is_case_insensitive_and_validated() {
    let (options, _) = parse(&["--discover", "static", "--ssl-mode", "STRICT"])
        .resolve()
        .unwrap();
    assert_eq!(options.ssl_mode, SslMode::Strict);

    assert!(
        parse(&["--discover", "static", "--ssl-mode", "paranoid"])
            .resolve()
            .is_err()
    );
}

#[test]
fn log_levels_fall_back_per_sink() {
    // Arrange
    let args = parse(&[
        "--discover",
        "static",
        "--log-level",
        "warning",
        "--haproxy-log-level",
        "loud",
        "--certbot-log-level",
        "FATAL",
    ]);

    // Act
    let (options, _) = args.resolve().unwrap();

    // Assert
    assert_eq!(options.log_levels.easyhaproxy, LogLevel::Warn);
    assert_eq!(options.log_levels.haproxy, LogLevel::Info);
    assert_eq!(options.log_levels.certbot, LogLevel::Error);
}

#[test]
fn plugin_flags_are_split_and_parsed() {
    // Arrange
    let args = parse(&[
        "--discover",
        "static",
        "--plugins-enabled",
        "cleanup, ,cloudflare",
        "--plugins-abort-on-error",
        "true",
    ]);

    // Act
    let (options, _) = args.resolve().unwrap();

    // Assert
    assert_eq!(options.plugins.enabled, vec!["cleanup", "cloudflare"]);
    assert!(options.plugins.abort_on_error);
}
