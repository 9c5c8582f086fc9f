use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::Deserialize;

/// Proxy pool configuration, loaded from the `Proxy` section of the run
/// configuration.
///
/// Mirrors `scraper/scraper/web/proxy.py::ProxyConfig`'s fields one-to-one;
/// the HTTP scheme/auth validation that Pydantic performed at field level is
/// instead enforced by [`ProxyPool::format_proxy_url`] and the builder's
/// `validate_config`.
#[derive(Debug, Clone, Deserialize, Builder)]
#[builder(
    name = "ProxyConfigBuilder",
    pattern = "owned",
    setter(into, strip_option, prefix = "with"),
    build_fn(validate = "Self::validate_config")
)]
pub struct ProxyConfig {
    /// Path to the file containing one proxy endpoint per line.
    pub input_file: PathBuf,

    /// URL probed during validation; must start with `http://` or `https://`.
    pub test_url: String,

    /// Maximum navigations a single proxy may serve before eviction.
    pub usage_limit: u32,

    /// Whether to liveness-test proxies on load/reload.
    #[builder(default = "true")]
    #[serde(default = "default_validation")]
    pub validation: bool,

    /// One of `HTTP`, `HTTPS`, `SOCKS4`, `SOCKS5`.
    pub proxy_type: String,

    /// Optional basic-auth credentials applied to every formatted proxy URL.
    #[builder(default = "None")]
    #[serde(default)]
    pub authentication: Option<ProxyAuthentication>,

    /// Timeout applied to each validation probe.
    #[builder(default = "Duration::from_secs(5)")]
    #[serde(default = "default_probe_timeout", with = "duration_secs")]
    pub probe_timeout: Duration,

    /// Maximum number of concurrent validation probes.
    #[builder(default = "10")]
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,
}

fn default_validation() -> bool {
    true
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_concurrent_probes() -> usize {
    10
}

mod duration_secs {
    use super::Duration;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProxyAuthentication {
    pub username: String,
    pub password: String,
}

impl ProxyConfigBuilder {
    fn validate_config(&self) -> Result<(), String> {
        if let Some(test_url) = &self.test_url {
            if !(test_url.starts_with("http://") || test_url.starts_with("https://")) {
                return Err("test_url must start with http:// or https://".to_string());
            }
        }

        if let Some(usage_limit) = &self.usage_limit {
            if *usage_limit == 0 {
                return Err("usage_limit must be greater than 0".to_string());
            }
        }

        if let Some(proxy_type) = &self.proxy_type {
            let upper = proxy_type.to_uppercase();
            if !matches!(upper.as_str(), "HTTP" | "HTTPS" | "SOCKS4" | "SOCKS5") {
                return Err(format!("unsupported proxy_type '{proxy_type}'"));
            }
        }

        Ok(())
    }
}

impl ProxyConfig {
    pub fn builder() -> ProxyConfigBuilder {
        ProxyConfigBuilder::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_bad_test_url() {
        let result = ProxyConfig::builder()
            .with_input_file(PathBuf::from("proxies.txt"))
            .with_test_url("ftp://example.com")
            .with_usage_limit(5_u32)
            .with_proxy_type("HTTP")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_rejects_zero_usage_limit() {
        let result = ProxyConfig::builder()
            .with_input_file(PathBuf::from("proxies.txt"))
            .with_test_url("https://example.com")
            .with_usage_limit(0_u32)
            .with_proxy_type("HTTP")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn builder_accepts_valid_config() {
        let cfg = ProxyConfig::builder()
            .with_input_file(PathBuf::from("proxies.txt"))
            .with_test_url("https://example.com")
            .with_usage_limit(5_u32)
            .with_proxy_type("HTTP")
            .build()
            .unwrap();
        assert_eq!(cfg.usage_limit, 5);
        assert!(cfg.validation);
    }
}
