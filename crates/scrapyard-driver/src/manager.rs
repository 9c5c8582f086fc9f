use std::time::Duration;

use scrapyard_core::{Error, ErrorKind, Result};
use thirtyfour::{ChromiumLikeCapabilities, DesiredCapabilities, WebDriver};
use tracing::{info, warn};

use crate::config::DriverConfig;

/// Creates and tears down WebDriver sessions against a single worker
/// endpoint, grounded on `scraper/scraper/web/driver.py::DriverManager`.
pub struct DriverManager;

impl DriverManager {
    /// Builds Chromium capabilities and opens a session against
    /// `{cfg.host_network}:{port}/wd/hub`, retrying `cfg.retry_attempts`
    /// times with a fixed `cfg.retry_interval`-second delay between
    /// attempts. `proxy` is the connection's currently-lent endpoint,
    /// applied as `--proxy-server=` when `cfg.proxy` is enabled.
    pub async fn create_driver(cfg: &DriverConfig, port: u16, proxy: Option<&str>) -> Result<WebDriver> {
        let mut caps = DesiredCapabilities::chrome();

        for arg in &cfg.option_args {
            caps.add_arg(arg)
                .map_err(|e| Error::with_source(ErrorKind::Resource, "invalid chrome option arg", Box::new(e)))?;
        }

        if cfg.proxy {
            if let Some(proxy) = proxy {
                caps.add_arg(&format!("--proxy-server={proxy}"))
                    .map_err(|e| Error::with_source(ErrorKind::Resource, "invalid proxy arg", Box::new(e)))?;
            }
        }

        if let Some(user_agent) = &cfg.user_agent {
            caps.add_arg(&format!("--user-agent={user_agent}"))
                .map_err(|e| Error::with_source(ErrorKind::Resource, "invalid user-agent arg", Box::new(e)))?;
        }

        let session_url = format!("{}:{port}/wd/hub", cfg.host_network);
        let attempts = cfg.retry_attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match WebDriver::new(&session_url, caps.clone()).await {
                Ok(driver) => {
                    info!(attempt, host = %session_url, "webdriver session created");
                    return Ok(driver);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "failed to create webdriver session");
                    last_err = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_secs(cfg.retry_interval)).await;
                    }
                }
            }
        }

        Err(Error::with_source(
            ErrorKind::Resource,
            format!("failed to create webdriver session after {attempts} attempts"),
            Box::new(last_err.expect("loop ran at least once")),
        ))
    }

    /// Ends a WebDriver session, swallowing quit errors (mirrors the
    /// original's best-effort `quit_driver`).
    pub async fn quit_driver(driver: WebDriver) {
        if let Err(e) = driver.quit().await {
            warn!(error = %e, "error while quitting webdriver session");
        }
    }
}
