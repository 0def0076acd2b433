//! Inbound path resolution against the source-host allow-list
//!
//! Turns a request path into an upstream target. Three path forms are
//! accepted, checked in priority order:
//!
//! 1. `/https://github.com/user/repo/...` (full URL embedded in the path)
//! 2. `/raw.githubusercontent.com/user/repo/...` (host-prefixed path)
//! 3. `/user/repo/...` (bare path, defaults to the primary source host)
//!
//! Resolution is purely syntactic; no network access happens here.

use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use url::Url;

/// A resolved upstream target
///
/// Invariant: `host` is always a member of the configured allow-list;
/// construction fails otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTarget {
    /// Upstream hostname, member of the allow-list
    pub host: String,
    /// Upstream path (plus query and fragment for the embedded-URL form)
    pub path: String,
    /// Composed `https://{host}{path}` URL
    pub full_url: String,
}

/// Resolve an inbound request path into a `SourceTarget`
///
/// # Arguments
/// * `pathname` - The raw request path (query string excluded)
/// * `config` - Mirror configuration holding the host allow-list
///
/// # Errors
/// * `InvalidPath` for an empty path or a malformed embedded URL
/// * `UnsupportedHost` for an embedded URL targeting a host outside the
///   allow-list
///
/// Malformed embedded URLs fail outright rather than silently falling back
/// to the bare-path form, to avoid proxying to unintended hosts.
pub fn resolve(pathname: &str, config: &MirrorConfig) -> Result<SourceTarget> {
    let clean = pathname.trim_matches('/');

    if clean.is_empty() {
        return Err(MirrorError::InvalidPath("empty path".to_string()));
    }

    // Form 1: full URL embedded in the path
    if clean.starts_with("https://") || clean.starts_with("http://") {
        let target = Url::parse(clean)
            .map_err(|e| MirrorError::InvalidPath(format!("malformed embedded URL: {}", e)))?;

        let host = target
            .host_str()
            .ok_or_else(|| MirrorError::InvalidPath("embedded URL has no host".to_string()))?;

        if !config.is_allowed_host(host) {
            return Err(MirrorError::UnsupportedHost(host.to_string()));
        }

        // Path, query, and fragment of the embedded URL are used verbatim
        let mut path = target.path().to_string();
        if let Some(query) = target.query() {
            path.push('?');
            path.push_str(query);
        }
        if let Some(fragment) = target.fragment() {
            path.push('#');
            path.push_str(fragment);
        }

        return Ok(SourceTarget {
            host: host.to_string(),
            path,
            full_url: target.to_string(),
        });
    }

    // Forms 2 and 3: host-prefixed or bare path
    let (host, path) = match clean.split_once('/') {
        Some((first, rest)) if config.is_allowed_host(first) => {
            (first.to_string(), format!("/{}", rest))
        }
        None if config.is_allowed_host(clean) => (clean.to_string(), "/".to_string()),
        _ => (config.primary_host().to_string(), format!("/{}", clean)),
    };

    let full_url = format!("https://{}{}", host, path);

    Ok(SourceTarget { host, path, full_url })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_primary(primary: &str) -> MirrorConfig {
        let mut config = MirrorConfig::default();
        config
            .allowed_hosts
            .retain(|h| h != primary);
        config.allowed_hosts.insert(0, primary.to_string());
        config
    }

    #[test]
    fn test_bare_path_defaults_to_primary_host() {
        let config = MirrorConfig::default();
        let target = resolve("/octocat/Hello-World/main/README.md", &config).unwrap();

        assert_eq!(target.host, "github.com");
        assert_eq!(target.path, "/octocat/Hello-World/main/README.md");
        assert_eq!(
            target.full_url,
            "https://github.com/octocat/Hello-World/main/README.md"
        );
    }

    #[test]
    fn test_host_prefixed_path() {
        let config = MirrorConfig::default();
        let target =
            resolve("/raw.githubusercontent.com/octocat/Hello-World/main/README.md", &config)
                .unwrap();

        assert_eq!(target.host, "raw.githubusercontent.com");
        assert_eq!(target.path, "/octocat/Hello-World/main/README.md");
        assert_eq!(
            target.full_url,
            "https://raw.githubusercontent.com/octocat/Hello-World/main/README.md"
        );
    }

    #[test]
    fn test_embedded_url() {
        let config = MirrorConfig::default();
        let target = resolve("/https://github.com/octocat/Hello-World", &config).unwrap();

        assert_eq!(target.host, "github.com");
        assert_eq!(target.path, "/octocat/Hello-World");
        assert_eq!(target.full_url, "https://github.com/octocat/Hello-World");
    }

    #[test]
    fn test_embedded_url_keeps_query_and_fragment() {
        let config = MirrorConfig::default();
        let target =
            resolve("/https://github.com/octocat/Hello-World?tab=readme#install", &config)
                .unwrap();

        assert_eq!(target.path, "/octocat/Hello-World?tab=readme#install");
    }

    #[test]
    fn test_embedded_url_http_scheme_accepted() {
        let config = MirrorConfig::default();
        let target = resolve("/http://github.com/octocat/Hello-World", &config).unwrap();
        assert_eq!(target.host, "github.com");
    }

    #[test]
    fn test_embedded_url_unsupported_host() {
        let config = MirrorConfig::default();
        let result = resolve("/https://evil.example/payload", &config);
        assert!(matches!(result, Err(MirrorError::UnsupportedHost(_))));
    }

    #[test]
    fn test_embedded_url_malformed_fails_not_falls_back() {
        let config = MirrorConfig::default();
        let result = resolve("/https://", &config);
        assert!(matches!(result, Err(MirrorError::InvalidPath(_))));
    }

    #[test]
    fn test_empty_path_rejected() {
        let config = MirrorConfig::default();
        assert!(matches!(resolve("/", &config), Err(MirrorError::InvalidPath(_))));
        assert!(matches!(resolve("///", &config), Err(MirrorError::InvalidPath(_))));
        assert!(matches!(resolve("", &config), Err(MirrorError::InvalidPath(_))));
    }

    #[test]
    fn test_leading_and_trailing_slashes_stripped() {
        let config = MirrorConfig::default();
        let a = resolve("//octocat/Hello-World//", &config).unwrap();
        let b = resolve("/octocat/Hello-World", &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_host_prefixed_and_bare_forms_agree() {
        // For every allow-listed host H and path P, resolving /H/P must equal
        // resolving /P against a config whose primary host is H.
        let hosts = MirrorConfig::default().allowed_hosts;
        let path = "octocat/Hello-World/main/README.md";

        for host in &hosts {
            let default_config = MirrorConfig::default();
            let prefixed = resolve(&format!("/{}/{}", host, path), &default_config).unwrap();

            let primary_config = config_with_primary(host);
            let bare = resolve(&format!("/{}", path), &primary_config).unwrap();

            assert_eq!(prefixed, bare, "mismatch for host {}", host);
        }
    }

    #[test]
    fn test_lookalike_host_is_treated_as_path() {
        let config = MirrorConfig::default();
        let target = resolve("/github.com.evil.example/payload", &config).unwrap();

        // Not in the allow-list, so the whole string is a path on the primary
        assert_eq!(target.host, "github.com");
        assert_eq!(target.path, "/github.com.evil.example/payload");
    }

    #[test]
    fn test_host_only_path() {
        let config = MirrorConfig::default();
        let target = resolve("/gist.github.com", &config).unwrap();
        assert_eq!(target.host, "gist.github.com");
        assert_eq!(target.path, "/");
        assert_eq!(target.full_url, "https://gist.github.com/");
    }
}
