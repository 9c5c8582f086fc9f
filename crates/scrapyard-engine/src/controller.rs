use std::collections::{HashMap, VecDeque};

use scrapyard_container::{ContainerConfig, ContainerManager};
use scrapyard_core::{Error, ErrorKind, Result};
use scrapyard_driver::{DriverConfig, DriverManager};
use scrapyard_proxy::ProxyPool;
use thirtyfour::WebDriver;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::connection::Connection;
use crate::target::TargetPlan;

/// Composition root: owns every [`Connection`] for a run and wires the
/// three leaf managers together, grounded on
/// `scraper/scraper/web/controller.py::WebController`.
pub struct WebController {
    proxy_pool: ProxyPool,
    container_manager: ContainerManager,
    container_cfg: ContainerConfig,
    driver_cfg: DriverConfig,
    connections: Mutex<HashMap<String, Connection>>,
}

impl WebController {
    pub fn new(
        proxy_pool: ProxyPool,
        container_manager: ContainerManager,
        container_cfg: ContainerConfig,
        driver_cfg: DriverConfig,
    ) -> Self {
        Self {
            proxy_pool,
            container_manager,
            container_cfg,
            driver_cfg,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Scoped acquisition: builds a connection per target (plus a
    /// `<name>_composite` connection for composite targets), attempts to
    /// connect every resource, runs `body`, then releases everything
    /// regardless of how `body` returns.
    ///
    /// Per the design notes, this is an explicit scope function rather than
    /// a `Drop` impl, since release is async and fallible.
    pub async fn run<F, Fut, T>(mut self, plans: &[TargetPlan], body: F) -> T
    where
        F: FnOnce(WebController) -> Fut,
        Fut: std::future::Future<Output = (WebController, T)>,
    {
        self.create_connections(plans).await;
        self.connect().await;
        let (controller, result) = body(self).await;
        controller.disconnect().await;
        result
    }

    async fn create_connections(&mut self, plans: &[TargetPlan]) {
        let assignments = assign_ports(plans, &self.container_cfg.ports);
        let mut connections = self.connections.lock().await;
        for (name, port) in assignments {
            connections.insert(name.clone(), Connection::new(name, port));
        }
    }

    /// Attempts to connect every registered connection's resources.
    pub async fn connect(&self) {
        let names: Vec<String> = self.connections.lock().await.keys().cloned().collect();
        for name in names {
            if !self.connect_resources(&name).await {
                error!(connection = %name, "failed to fully establish resources");
            }
        }
    }

    /// Borrows a proxy, starts a container, and opens a driver for the named
    /// connection, in that order. Each step's failure is logged; a
    /// connection left not-ready does not abort the run.
    async fn connect_resources(&self, name: &str) -> bool {
        let mut successful = true;

        let proxy = match self.proxy_pool.acquire().await {
            Ok(proxy) => Some(proxy),
            Err(e) => {
                warn!(connection = name, error = %e, "failed to assign proxy");
                successful = false;
                None
            }
        };

        let port = {
            let connections = self.connections.lock().await;
            connections.get(name).map(|c| c.port)
        };
        let Some(port) = port else {
            return false;
        };

        let container_id = match self
            .container_manager
            .create_container(&self.container_cfg, name, port)
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(connection = name, error = %e, "failed to start container");
                successful = false;
                None
            }
        };

        let driver = match DriverManager::create_driver(&self.driver_cfg, port, proxy.as_deref()).await {
            Ok(driver) => Some(driver),
            Err(e) => {
                warn!(connection = name, error = %e, "failed to create driver");
                successful = false;
                None
            }
        };

        let mut connections = self.connections.lock().await;
        if let Some(conn) = connections.get_mut(name) {
            conn.proxy = proxy;
            conn.container_id = container_id;
            conn.driver = driver;
        }
        successful
    }

    /// Best-effort release of every connection's resources: `quit(driver)`
    /// then `cleanup(container)` then `release(proxy)`, swallowing and
    /// logging errors so one failure never blocks another's release.
    pub async fn disconnect(&self) {
        let names: Vec<String> = self.connections.lock().await.keys().cloned().collect();
        for name in names {
            self.release_resources(&name).await;
        }
    }

    async fn release_resources(&self, name: &str) {
        let (driver, container_id, proxy) = {
            let mut connections = self.connections.lock().await;
            let Some(conn) = connections.get_mut(name) else {
                return;
            };
            (conn.driver.take(), conn.container_id.take(), conn.proxy.take())
        };

        if let Some(driver) = driver {
            DriverManager::quit_driver(driver).await;
        }

        if let Some(container_id) = container_id {
            if let Err(e) = self.container_manager.cleanup(&container_id, &self.container_cfg).await {
                warn!(connection = name, error = %e, "error cleaning up container");
            }
        }

        if let Some(proxy) = proxy {
            self.proxy_pool.release(&proxy).await;
        }
    }

    /// Returns a clone of the named connection's driver handle, if attached.
    /// `WebDriver` is a cheap `Arc`-backed handle, so callers can drive the
    /// browser without holding the connections lock.
    pub async fn driver(&self, name: &str) -> Option<WebDriver> {
        let connections = self.connections.lock().await;
        connections.get(name).and_then(|c| c.driver.clone())
    }

    /// Navigates `name`'s driver to `url`, incrementing the connection's
    /// proxy use count on success. Retries transient navigation failures up
    /// to twice more with progressive backoff (2s, 4s). `UsageError`-kind
    /// failures (proxy limit reached) are re-raised immediately so the
    /// target engine can rotate.
    pub async fn fetch(&self, name: &str, url: &str) -> Result<()> {
        const MAX_RETRIES: u32 = 2;

        for attempt in 0..=MAX_RETRIES {
            let (driver, proxy) = {
                let connections = self.connections.lock().await;
                let Some(conn) = connections.get(name) else {
                    return Err(Error::new(ErrorKind::Resource, format!("no connection named '{name}'")));
                };
                let Some(driver) = conn.driver.clone() else {
                    return Err(Error::new(ErrorKind::Resource, format!("connection '{name}' has no driver")));
                };
                (driver, conn.proxy.clone())
            };

            let navigate_result = driver.goto(url).await;

            match navigate_result {
                Ok(()) => {
                    if let Some(proxy) = proxy {
                        self.proxy_pool.increment(&proxy).await?;
                    }
                    return Ok(());
                }
                Err(e) if attempt < MAX_RETRIES => {
                    warn!(url, attempt, error = %e, "navigation timed out, retrying");
                    tokio::time::sleep(std::time::Duration::from_secs(2 * (attempt as u64 + 1))).await;
                }
                Err(e) => {
                    return Err(Error::with_source(
                        ErrorKind::Network,
                        format!("navigation to '{url}' failed after {} attempts", MAX_RETRIES + 1),
                        Box::new(e),
                    ));
                }
            }
        }

        unreachable!("loop always returns or errors")
    }

    /// Acquires a fresh proxy, quits the current driver, and opens a new one
    /// against the same container/port. Logs and continues on partial
    /// failure rather than propagating.
    pub async fn rotate_proxy(&self, name: &str) {
        let new_proxy = match self.proxy_pool.acquire().await {
            Ok(proxy) => Some(proxy),
            Err(e) => {
                warn!(connection = name, error = %e, "failed to rotate proxy");
                None
            }
        };

        let (port, old_driver) = {
            let mut connections = self.connections.lock().await;
            let Some(conn) = connections.get_mut(name) else {
                return;
            };
            if new_proxy.is_some() {
                conn.proxy = new_proxy.clone();
            }
            (conn.port, conn.driver.take())
        };

        if let Some(driver) = old_driver {
            DriverManager::quit_driver(driver).await;
        }

        match DriverManager::create_driver(&self.driver_cfg, port, new_proxy.as_deref()).await {
            Ok(driver) => {
                let mut connections = self.connections.lock().await;
                if let Some(conn) = connections.get_mut(name) {
                    conn.driver = Some(driver);
                }
                info!(connection = name, "rotated proxy");
            }
            Err(e) => {
                warn!(connection = name, error = %e, "failed to assign new driver after rotation");
            }
        }
    }
}

/// Assigns one port per plan, and a second to `<name>_composite` for
/// composite plans, consuming `ports` in order. Plans left without an
/// available port are dropped (logged by the caller).
fn assign_ports(plans: &[TargetPlan], ports: &[u16]) -> Vec<(String, u16)> {
    let mut available: VecDeque<u16> = ports.iter().copied().collect();
    let mut assignments = Vec::new();

    for plan in plans {
        let Some(port) = available.pop_front() else {
            error!(target = %plan.name, "no ports remain to assign a connection");
            continue;
        };
        assignments.push((plan.name.clone(), port));

        if plan.composite {
            let composite_name = format!("{}_composite", plan.name);
            let Some(port) = available.pop_front() else {
                error!(target = %plan.name, "no ports remain for composite connection");
                continue;
            };
            assignments.push((composite_name, port));
        }
    }

    assignments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(name: &str, composite: bool) -> TargetPlan {
        TargetPlan {
            name: name.to_string(),
            domain: "https://example.com".to_string(),
            composite,
            input_file: std::path::PathBuf::from("/dev/null"),
            startup: Vec::new(),
            interactions: Vec::new(),
            extractions: Vec::new(),
        }
    }

    #[test]
    fn assigns_one_port_per_plan_in_order() {
        let plans = vec![plan("emma", false), plan("edgar", false)];
        let assignments = assign_ports(&plans, &[9001, 9002]);
        assert_eq!(
            assignments,
            vec![("emma".to_string(), 9001), ("edgar".to_string(), 9002)]
        );
    }

    #[test]
    fn composite_plan_consumes_two_ports() {
        let plans = vec![plan("emma", true)];
        let assignments = assign_ports(&plans, &[9001, 9002]);
        assert_eq!(
            assignments,
            vec![
                ("emma".to_string(), 9001),
                ("emma_composite".to_string(), 9002),
            ]
        );
    }

    #[test]
    fn drops_plans_once_ports_are_exhausted() {
        let plans = vec![plan("emma", false), plan("edgar", false)];
        let assignments = assign_ports(&plans, &[9001]);
        assert_eq!(assignments, vec![("emma".to_string(), 9001)]);
    }
}
