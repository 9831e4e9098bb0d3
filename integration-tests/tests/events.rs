use easyhaproxy_core::logging::{EASYHAPROXY, HAPROXY};
use integration_tests::harness::{Deployment, events_with, init_test_tracing};
use std::time::{Duration, Instant};

const SITE: &str = r#"
containers:
  "events.local:80":
    ip: ["10.0.0.11:8080"]
"#;

#[tokio::test]
async fn tick_reports_on_the_easyhaproxy_target() {
    // Arrange
    init_test_tracing();
    let mut d = Deployment::new(SITE);

    // Act
    d.tick().await;

    // Assert
    assert!(!events_with(EASYHAPROXY, "Heartbeat").is_empty());
    assert!(!events_with(EASYHAPROXY, "configuration is dirty").is_empty());
    let found = events_with(EASYHAPROXY, "found hosts");
    assert!(
        found
            .iter()
            .any(|e| e.field("hosts").is_some_and(|h| h.contains("events.local")))
    );
}

#[tokio::test]
async fn proxy_output_is_forwarded() {
    // Arrange
    init_test_tracing();
    let mut d = Deployment::new(SITE);

    // Act
    d.tick().await;

    // Assert
    let launches = events_with(HAPROXY, "launching proxy");
    let pid_file = d.paths.pid_file.display().to_string();
    assert!(
        launches
            .iter()
            .any(|e| e.field("args").is_some_and(|a| a.contains(&pid_file)))
    );

    let deadline = Instant::now() + Duration::from_secs(5);
    while events_with(HAPROXY, "[NOTICE] master started").is_empty() {
        assert!(Instant::now() < deadline, "proxy stdout was not forwarded");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
