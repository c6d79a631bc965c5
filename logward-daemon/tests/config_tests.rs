//! Configuration loading tests for the daemon's startup path.
//!
//! The daemon loads `logward.toml`, applies CLI overrides and validates
//! before anything starts. These tests exercise the file-based path the
//! binary actually takes.

use logward_core::config::{LogwardConfig, SourceConfig};
use logward_core::error::LogwardError;

#[tokio::test]
async fn loads_full_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logward.toml");
    std::fs::write(
        &path,
        r#"
[general]
log_level = "debug"
log_format = "pretty"

[collector]
poll_interval_secs = 3

[[sources]]
type = "file"
name = "app-logs"
path = "/var/log/app"
patterns = ["*.log"]

[[sources]]
type = "mysql"
name = "db"
host = "localhost"
user = "monitor"
database = "shop"

[[sources]]
type = "mongodb"
name = "docs"
uri = "mongodb://localhost:27017"
database = "shop"
collection = "events"
"#,
    )
    .unwrap();

    let config = LogwardConfig::from_file(&path).await.unwrap();
    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.collector.poll_interval_secs, 3);
    assert_eq!(config.sources.len(), 3);
    assert!(matches!(config.sources[0], SourceConfig::File(_)));
    assert!(matches!(config.sources[1], SourceConfig::Mysql(_)));
    assert!(matches!(config.sources[2], SourceConfig::Mongodb(_)));
}

#[tokio::test]
async fn missing_file_is_a_clear_error() {
    let err = LogwardConfig::from_file("/nonexistent/logward.toml")
        .await
        .unwrap_err();
    assert!(matches!(err, LogwardError::Config(_)));
    assert!(err.to_string().contains("logward.toml"));
}

#[tokio::test]
async fn unknown_source_type_is_rejected_at_parse() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logward.toml");
    std::fs::write(
        &path,
        r#"
[[sources]]
type = "kafka"
name = "stream"
"#,
    )
    .unwrap();

    let err = LogwardConfig::from_file(&path).await.unwrap_err();
    assert!(matches!(err, LogwardError::Config(_)));
}

#[tokio::test]
async fn duplicate_source_names_fail_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logward.toml");
    std::fs::write(
        &path,
        r#"
[[sources]]
type = "file"
name = "same"
path = "/var/log/a"

[[sources]]
type = "file"
name = "same"
path = "/var/log/b"
"#,
    )
    .unwrap();

    let err = LogwardConfig::from_file(&path).await.unwrap_err();
    assert!(err.to_string().contains("duplicate"));
}
