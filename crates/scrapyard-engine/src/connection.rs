use std::ops::Deref;

use thirtyfour::WebDriver;

/// One logical scraping slot: a host port, a borrowed proxy endpoint, a
/// running container, and the driver session opened against it.
///
/// Grounded on `scraper/scraper/utils/connection.py::ConnectionData`, with
/// the `Deref<Target = WebDriver>` ergonomics borrowed from
/// `spire-thirtyfour`'s `BrowserConnection`: callers that only need to drive
/// the browser can use a `Connection` directly wherever a `&WebDriver` is
/// expected, while the controller reaches through to `port`/`proxy`/
/// `container_id` for lifecycle management.
pub struct Connection {
    pub name: String,
    pub port: u16,
    pub proxy: Option<String>,
    pub container_id: Option<String>,
    pub driver: Option<WebDriver>,
}

impl Connection {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
            proxy: None,
            container_id: None,
            driver: None,
        }
    }

    /// Whether all four resources (proxy, container, driver) are live.
    pub fn is_ready(&self) -> bool {
        self.proxy.is_some() && self.container_id.is_some() && self.driver.is_some()
    }
}

impl Deref for Connection {
    type Target = WebDriver;

    /// Panics if called before a driver has been attached; callers that
    /// might see a not-ready connection should check [`Connection::is_ready`]
    /// or match on `driver` directly instead.
    fn deref(&self) -> &Self::Target {
        self.driver
            .as_ref()
            .expect("Connection::deref called before a driver was attached")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_connection_is_not_ready() {
        let conn = Connection::new("alpha", 4444);
        assert!(!conn.is_ready());
        assert_eq!(conn.port, 4444);
    }
}
