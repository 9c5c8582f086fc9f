use serde::Deserialize;

/// WebDriver session configuration, loaded from the `Driver` section of the
/// run configuration.
///
/// Mirrors `scraper/scraper/web/driver.py::DriverConfig` one-to-one.
#[derive(Debug, Clone, Deserialize)]
pub struct DriverConfig {
    /// WebDriver server base URL, e.g. `http://localhost`. The connection's
    /// port and `/wd/hub` are appended at session-creation time.
    pub host_network: String,

    /// Extra Chromium command-line switches applied before proxy/user-agent.
    #[serde(default)]
    pub option_args: Vec<String>,

    /// Whether to wire the connection's proxy via `--proxy-server=`.
    #[serde(default = "default_proxy_enabled")]
    pub proxy: bool,

    /// Session-creation retry attempts before giving up.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Seconds to wait between session-creation retries.
    #[serde(default = "default_retry_interval")]
    pub retry_interval: u64,

    /// Optional `--user-agent=` override.
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_proxy_enabled() -> bool {
    true
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_interval() -> u64 {
    2
}
