//! Startup configuration of the gateway.
//!
//! The [`ProxyConfig`] is built once at startup, validated, and then shared
//! read-only by the dialer and the forwarding handler for the lifetime of
//! the process. Nothing in the request path looks configuration up from the
//! environment.

use std::{fmt, time::Duration};

/// Environment variable holding the `host:port` of the SOCKS5 proxy.
pub const ENV_SOCKS5_PROXY: &str = "SOCKS5_PROXY";

/// Environment variable holding the base url of the upstream service.
pub const ENV_TARGET_BASE_URL: &str = "TARGET_BASE_URL";

/// Port the gateway listens on by default.
pub const DEFAULT_PORT: u16 = 11434;

/// Default upper bound for the tls handshake with an `https` upstream.
pub const DEFAULT_TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable gateway configuration.
///
/// Both fields are guaranteed to be non-empty.
pub struct ProxyConfig {
    socks_address: String,
    target_base_url: String,
}

impl ProxyConfig {
    /// Create a new [`ProxyConfig`], failing when either value is empty.
    pub fn new(
        socks_address: impl Into<String>,
        target_base_url: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Self::try_from_parts(Some(socks_address.into()), Some(target_base_url.into()))
    }

    /// Create a new [`ProxyConfig`] from optional values,
    /// as they come from the command line or the environment.
    ///
    /// Missing and empty values are treated alike.
    pub fn try_from_parts(
        socks_address: Option<String>,
        target_base_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        let socks_address = socks_address.filter(|s| !s.trim().is_empty());
        let target_base_url = target_base_url.filter(|s| !s.trim().is_empty());

        match (socks_address, target_base_url) {
            (Some(socks_address), Some(target_base_url)) => Ok(Self {
                socks_address,
                target_base_url,
            }),
            (socks_address, target_base_url) => Err(ConfigError {
                missing_socks_address: socks_address.is_none(),
                missing_target_base_url: target_base_url.is_none(),
            }),
        }
    }

    /// `host:port` of the SOCKS5 proxy all upstream connections are tunneled through.
    #[must_use]
    pub fn socks_address(&self) -> &str {
        &self.socks_address
    }

    /// Url prefix every inbound path is appended to.
    #[must_use]
    pub fn target_base_url(&self) -> &str {
        &self.target_base_url
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Required configuration is missing or empty.
pub struct ConfigError {
    missing_socks_address: bool,
    missing_target_base_url: bool,
}

impl ConfigError {
    /// The SOCKS5 proxy address is missing.
    #[must_use]
    pub fn missing_socks_address(&self) -> bool {
        self.missing_socks_address
    }

    /// The target base url is missing.
    #[must_use]
    pub fn missing_target_base_url(&self) -> bool {
        self.missing_target_base_url
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "please set both the {ENV_SOCKS5_PROXY} and {ENV_TARGET_BASE_URL} environment variables"
        )?;
        match (self.missing_socks_address, self.missing_target_base_url) {
            (true, true) => write!(f, " (both missing)"),
            (true, false) => write!(f, " ({ENV_SOCKS5_PROXY} missing)"),
            (false, true) => write!(f, " ({ENV_TARGET_BASE_URL} missing)"),
            (false, false) => Ok(()),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_config_valid() {
        let config = ProxyConfig::new("127.0.0.1:1080", "https://api.example.com").unwrap();
        assert_eq!(config.socks_address(), "127.0.0.1:1080");
        assert_eq!(config.target_base_url(), "https://api.example.com");
    }

    #[test]
    fn test_proxy_config_missing_values() {
        for (socks_address, target_base_url, expect_socks, expect_target) in [
            (None, None, true, true),
            (Some(""), Some("http://example.com"), true, false),
            (Some("127.0.0.1:1080"), None, false, true),
            (Some("  "), Some(""), true, true),
        ] {
            let err = ProxyConfig::try_from_parts(
                socks_address.map(ToOwned::to_owned),
                target_base_url.map(ToOwned::to_owned),
            )
            .unwrap_err();
            assert_eq!(
                err.missing_socks_address(),
                expect_socks,
                "{socks_address:?} {target_base_url:?}"
            );
            assert_eq!(
                err.missing_target_base_url(),
                expect_target,
                "{socks_address:?} {target_base_url:?}"
            );
        }
    }

    #[test]
    fn test_config_error_names_both_variables() {
        let err = ProxyConfig::try_from_parts(None, Some("http://example.com".to_owned()))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(ENV_SOCKS5_PROXY), "{msg}");
        assert!(msg.contains(ENV_TARGET_BASE_URL), "{msg}");
        assert!(msg.ends_with("(SOCKS5_PROXY missing)"), "{msg}");
    }
}
