//! Tests for config functionality.

use crate::config::StoreConfig;
use crate::error::MapError;
use crate::map::BackendKind;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = StoreConfig::default();

    assert_eq!(config.name, "jobs");
    assert_eq!(config.backend, BackendKind::File);
    assert_eq!(config.path, ".mapq/jobs");
    assert_eq!(config.redis_url, "redis://127.0.0.1/");
    assert_eq!(config.lock_timeout_ms, 10_000);
    assert_eq!(config.poll_interval_ms, 50);
    assert_eq!(config.lock_stale_minutes, 120);
    assert_eq!(config.compression_level, 3);
    config.validate().unwrap();
}

#[test]
fn test_parse_minimal_yaml() {
    let config = StoreConfig::from_yaml("").unwrap();

    // Should use all defaults
    assert_eq!(config.name, "jobs");
    assert_eq!(config.backend, BackendKind::File);
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
name: results
backend: text
"#;
    let config = StoreConfig::from_yaml(yaml).unwrap();

    assert_eq!(config.name, "results");
    assert_eq!(config.backend, BackendKind::Text);

    // Unspecified values should use defaults
    assert_eq!(config.path, ".mapq/jobs");
    assert_eq!(config.lock_timeout_ms, 10_000);
}

#[test]
fn test_parse_full_yaml() {
    let yaml = r#"
name: builds
backend: compressed
path: /var/lib/mapq/builds
redis_url: redis://cache:6379/2
lock_timeout_ms: 2500
poll_interval_ms: 25
lock_stale_minutes: 0
compression_level: 19
"#;
    let config = StoreConfig::from_yaml(yaml).unwrap();

    assert_eq!(config.name, "builds");
    assert_eq!(config.backend, BackendKind::Compressed);
    assert_eq!(config.path, "/var/lib/mapq/builds");
    assert_eq!(config.redis_url, "redis://cache:6379/2");
    assert_eq!(config.compression_level, 19);

    let settings = config.lock_settings();
    assert_eq!(settings.timeout, Duration::from_millis(2500));
    assert_eq!(settings.poll_interval, Duration::from_millis(25));
    assert_eq!(settings.stale_after, None);
}

#[test]
fn test_unknown_fields_ignored() {
    let yaml = r#"
name: jobs
future_option: true
nested:
  thing: 1
"#;
    let config = StoreConfig::from_yaml(yaml).unwrap();
    assert_eq!(config.name, "jobs");
}

#[test]
fn test_unknown_backend_rejected() {
    let err = StoreConfig::from_yaml("backend: sqlite").unwrap_err();
    assert!(matches!(err, MapError::UserError(_)));
    assert!(err.to_string().contains("failed to parse config YAML"));
}

#[test]
fn test_validation_rules() {
    let cases = [
        ("name: ''", "name must be non-empty"),
        ("name: 'two words'", "whitespace"),
        ("lock_timeout_ms: 0", "lock_timeout_ms must be greater than 0"),
        ("poll_interval_ms: 0", "poll_interval_ms must be greater than 0"),
        ("lock_timeout_ms: 10\npoll_interval_ms: 20", "must not exceed"),
        ("compression_level: 0", "compression_level"),
        ("compression_level: 23", "compression_level"),
        ("backend: text\npath: ''", "path is required"),
    ];

    for (yaml, expected) in cases {
        let err = StoreConfig::from_yaml(yaml).unwrap_err();
        assert!(
            err.to_string().contains(expected),
            "yaml {:?} gave {:?}",
            yaml,
            err.to_string()
        );
    }
}

#[test]
fn test_empty_path_allowed_for_non_file_backends() {
    StoreConfig::from_yaml("backend: memory\npath: ''").unwrap();
    StoreConfig::from_yaml("backend: redis\npath: ''").unwrap();
}

#[test]
fn test_stale_minutes_become_duration() {
    let config = StoreConfig::from_yaml("lock_stale_minutes: 5").unwrap();
    assert_eq!(
        config.lock_settings().stale_after,
        Some(Duration::from_secs(300))
    );
}

#[test]
fn test_yaml_round_trip() {
    let original = StoreConfig::from_yaml("name: q2\nbackend: redis").unwrap();
    let reparsed = StoreConfig::from_yaml(&original.to_yaml().unwrap()).unwrap();

    assert_eq!(reparsed.name, "q2");
    assert_eq!(reparsed.backend, BackendKind::Redis);
    assert!(!original.to_yaml().unwrap().contains("base_dir"));
}

#[test]
fn test_load_resolves_relative_path() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("mapq.yaml");
    std::fs::write(&config_path, "path: data/jobs\n").unwrap();

    let config = StoreConfig::load(&config_path).unwrap();
    assert_eq!(config.store_dir(), temp_dir.path().join("data/jobs"));

    let absolute = StoreConfig {
        path: "/abs/jobs".to_string(),
        ..config
    };
    assert_eq!(absolute.store_dir(), PathBuf::from("/abs/jobs"));
}

#[test]
fn test_load_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let err = StoreConfig::load(temp_dir.path().join("absent.yaml")).unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}

#[test]
fn test_open_queue_uses_configured_backend() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig {
        backend: BackendKind::Text,
        path: "q".to_string(),
        base_dir: Some(temp_dir.path().to_path_buf()),
        ..StoreConfig::default()
    };

    let queue = config.open_queue(Some("tester")).unwrap();
    queue.push(&1, "first").unwrap();

    assert_eq!(queue.map().owner(), "tester");
    assert_eq!(queue.map().backend().kind(), BackendKind::Text);
    assert!(temp_dir.path().join("q").join("table.tsv").exists());
    assert_eq!(queue.map().settings().timeout, Duration::from_millis(10_000));
}

#[test]
fn test_open_backend_for_every_kind() {
    for kind in [
        BackendKind::Memory,
        BackendKind::File,
        BackendKind::Compressed,
        BackendKind::Text,
        BackendKind::Redis,
    ] {
        let config = StoreConfig {
            backend: kind,
            ..StoreConfig::default()
        };
        assert_eq!(config.open_backend().unwrap().kind(), kind);
    }
}
