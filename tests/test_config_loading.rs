use forge_mirror::config::MirrorConfig;

#[test]
fn test_load_example_config() {
    let config = MirrorConfig::from_file("mirror.yaml");
    assert!(config.is_ok(), "Failed to load example config: {:?}", config.err());

    let config = config.unwrap();
    assert_eq!(config.listen_address, "0.0.0.0:8080");
    assert_eq!(config.allowed_hosts.len(), 4);
    assert_eq!(config.primary_host(), "github.com");
    assert_eq!(config.max_retries, 2);
    assert_eq!(config.retry_delay_ms, 500);
    assert_eq!(config.request_timeout_ms, 30000);
    assert_eq!(config.swr_seconds, 86400);
    assert_eq!(config.dynamic_edge_ttl, 3600);
    assert_eq!(config.dynamic_browser_ttl, 300);
    assert_eq!(config.versioned_edge_ttl, 2592000);
    assert_eq!(config.versioned_browser_ttl, 86400);
    assert_eq!(config.default_edge_ttl, 86400);
    assert_eq!(config.default_browser_ttl, 3600);
    assert!(config.store_max_bytes.is_none());
}

#[test]
fn test_load_minimal_config() {
    // A single overridden field; everything else falls back to defaults
    let minimal_yaml = r#"
max_retries: 5
"#;

    std::fs::write("test_minimal.yaml", minimal_yaml).unwrap();

    let config = MirrorConfig::from_file("test_minimal.yaml");
    assert!(config.is_ok());

    let config = config.unwrap();
    assert_eq!(config.max_retries, 5);
    // Check defaults are applied
    assert_eq!(config.listen_address, "0.0.0.0:8080");
    assert_eq!(config.primary_host(), "github.com");
    assert_eq!(config.request_timeout_ms, 30000);

    // Cleanup
    std::fs::remove_file("test_minimal.yaml").unwrap();
}

#[test]
fn test_load_invalid_config() {
    // Hosts must be bare hostnames, not URLs
    let invalid_yaml = r#"
allowed_hosts:
  - https://github.com
"#;

    std::fs::write("test_invalid.yaml", invalid_yaml).unwrap();

    let config = MirrorConfig::from_file("test_invalid.yaml");
    assert!(config.is_err(), "Should fail validation for URL-shaped host entry");

    // Cleanup
    std::fs::remove_file("test_invalid.yaml").unwrap();
}

#[test]
fn test_load_empty_allow_list() {
    let invalid_yaml = r#"
allowed_hosts: []
"#;

    std::fs::write("test_empty_hosts.yaml", invalid_yaml).unwrap();

    let config = MirrorConfig::from_file("test_empty_hosts.yaml");
    assert!(config.is_err(), "Should fail validation for empty allow-list");

    std::fs::remove_file("test_empty_hosts.yaml").unwrap();
}

#[test]
fn test_load_zero_ttl_config() {
    let invalid_yaml = r#"
versioned_edge_ttl: 0
"#;

    std::fs::write("test_zero_ttl.yaml", invalid_yaml).unwrap();

    let config = MirrorConfig::from_file("test_zero_ttl.yaml");
    assert!(config.is_err(), "Should fail validation for zero TTL");

    std::fs::remove_file("test_zero_ttl.yaml").unwrap();
}

#[test]
fn test_load_nonexistent_file() {
    let config = MirrorConfig::from_file("nonexistent.yaml");
    assert!(config.is_err(), "Should fail when file doesn't exist");
}
