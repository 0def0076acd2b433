//! Configuration management for the mirror proxy

use crate::error::{MirrorError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Configuration for the mirror proxy
///
/// Built once at startup, validated, and shared immutably (`Arc`) with the
/// orchestrator. Nothing mutates it at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Address the inbound HTTP surface binds to (default: "0.0.0.0:8080")
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Source hosts this mirror is permitted to proxy. The first entry is
    /// the primary host used for bare paths (default: the code forge and its
    /// raw-content/gist sub-hosts).
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,

    /// Maximum number of retries for transient upstream failures (default: 2)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Base retry delay in milliseconds; attempt N waits N times this
    /// (default: 500)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-attempt upstream timeout in milliseconds (default: 30000)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Stale-while-revalidate window in seconds (default: 86400 = 1 day)
    #[serde(default = "default_swr_seconds")]
    pub swr_seconds: u64,

    /// Edge TTL for dynamic paths in seconds (default: 3600 = 1 hour)
    #[serde(default = "default_dynamic_edge_ttl")]
    pub dynamic_edge_ttl: u64,

    /// Browser TTL for dynamic paths in seconds (default: 300 = 5 minutes)
    #[serde(default = "default_dynamic_browser_ttl")]
    pub dynamic_browser_ttl: u64,

    /// Edge TTL for versioned paths in seconds (default: 2592000 = 30 days)
    #[serde(default = "default_versioned_edge_ttl")]
    pub versioned_edge_ttl: u64,

    /// Browser TTL for versioned paths in seconds (default: 86400 = 1 day)
    #[serde(default = "default_versioned_browser_ttl")]
    pub versioned_browser_ttl: u64,

    /// Edge TTL for everything else in seconds (default: 86400 = 1 day)
    #[serde(default = "default_default_edge_ttl")]
    pub default_edge_ttl: u64,

    /// Browser TTL for everything else in seconds (default: 3600 = 1 hour)
    #[serde(default = "default_default_browser_ttl")]
    pub default_browser_ttl: u64,

    /// Optional byte cap for the in-memory response store; entries are
    /// evicted LRU when exceeded (default: none)
    #[serde(default)]
    pub store_max_bytes: Option<usize>,
}

// Default value functions for serde
fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_allowed_hosts() -> Vec<String> {
    vec![
        "github.com".to_string(),
        "raw.githubusercontent.com".to_string(),
        "gist.github.com".to_string(),
        "gist.githubusercontent.com".to_string(),
    ]
}

fn default_max_retries() -> usize {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_swr_seconds() -> u64 {
    86_400
}

fn default_dynamic_edge_ttl() -> u64 {
    3_600
}

fn default_dynamic_browser_ttl() -> u64 {
    300
}

fn default_versioned_edge_ttl() -> u64 {
    2_592_000
}

fn default_versioned_browser_ttl() -> u64 {
    86_400
}

fn default_default_edge_ttl() -> u64 {
    86_400
}

fn default_default_browser_ttl() -> u64 {
    3_600
}

impl Default for MirrorConfig {
    fn default() -> Self {
        MirrorConfig {
            listen_address: default_listen_address(),
            allowed_hosts: default_allowed_hosts(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            swr_seconds: default_swr_seconds(),
            dynamic_edge_ttl: default_dynamic_edge_ttl(),
            dynamic_browser_ttl: default_dynamic_browser_ttl(),
            versioned_edge_ttl: default_versioned_edge_ttl(),
            versioned_browser_ttl: default_versioned_browser_ttl(),
            default_edge_ttl: default_default_edge_ttl(),
            default_browser_ttl: default_default_browser_ttl(),
            store_max_bytes: None,
        }
    }
}

impl MirrorConfig {
    /// Load configuration from a YAML file
    ///
    /// # Arguments
    /// * `path` - Path to the YAML configuration file
    ///
    /// # Returns
    /// * `Ok(MirrorConfig)` if loading and validation succeed
    /// * `Err(MirrorError)` if file cannot be read or config is invalid
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| MirrorError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: MirrorConfig = serde_yaml::from_str(&content)
            .map_err(|e| MirrorError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Validation Rules
    /// - allowed_hosts must be non-empty, entries must be bare hostnames
    /// - request_timeout_ms must be > 0
    /// - all TTLs and the stale-while-revalidate window must be > 0
    pub fn validate(&self) -> Result<()> {
        if self.allowed_hosts.is_empty() {
            return Err(MirrorError::ConfigError(
                "allowed_hosts must contain at least one host".to_string(),
            ));
        }

        for host in &self.allowed_hosts {
            if host.is_empty() || host.contains('/') || host.contains("://") {
                return Err(MirrorError::ConfigError(format!(
                    "allowed_hosts entries must be bare hostnames, got '{}'",
                    host
                )));
            }
        }

        if self.request_timeout_ms == 0 {
            return Err(MirrorError::ConfigError(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }

        let ttls = [
            ("swr_seconds", self.swr_seconds),
            ("dynamic_edge_ttl", self.dynamic_edge_ttl),
            ("dynamic_browser_ttl", self.dynamic_browser_ttl),
            ("versioned_edge_ttl", self.versioned_edge_ttl),
            ("versioned_browser_ttl", self.versioned_browser_ttl),
            ("default_edge_ttl", self.default_edge_ttl),
            ("default_browser_ttl", self.default_browser_ttl),
        ];
        for (name, value) in ttls {
            if value == 0 {
                return Err(MirrorError::ConfigError(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        Ok(())
    }

    /// The primary source host, used for bare inbound paths
    pub fn primary_host(&self) -> &str {
        &self.allowed_hosts[0]
    }

    /// Check whether a hostname is in the allow-list
    pub fn is_allowed_host(&self, host: &str) -> bool {
        self.allowed_hosts.iter().any(|h| h == host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MirrorConfig::default();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_delay_ms, 500);
        assert_eq!(config.request_timeout_ms, 30_000);
        assert_eq!(config.allowed_hosts.len(), 4);
        assert_eq!(config.primary_host(), "github.com");
        assert_eq!(config.dynamic_edge_ttl, 3_600);
        assert_eq!(config.versioned_edge_ttl, 2_592_000);
        assert_eq!(config.default_edge_ttl, 86_400);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = MirrorConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_allow_list() {
        let config = MirrorConfig {
            allowed_hosts: Vec::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_host_with_scheme() {
        let config = MirrorConfig {
            allowed_hosts: vec!["https://github.com".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = MirrorConfig {
            request_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_ttl() {
        let config = MirrorConfig {
            versioned_edge_ttl: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_is_allowed_host() {
        let config = MirrorConfig::default();
        assert!(config.is_allowed_host("github.com"));
        assert!(config.is_allowed_host("raw.githubusercontent.com"));
        assert!(!config.is_allowed_host("example.com"));
        assert!(!config.is_allowed_host("github.com.evil.example"));
    }
}
