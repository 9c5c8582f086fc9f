use std::collections::HashMap;
use std::time::Duration;

use bollard::container::{
    Config as BollardContainerConfig, CreateContainerOptions, KillContainerOptions,
    RemoveContainerOptions, StopContainerOptions,
};
use bollard::models::{HostConfig, PortBinding};
use bollard::Docker;
use scrapyard_core::{Error, ErrorKind, Result};
use tracing::{info, warn};

use crate::config::ContainerConfig;

/// Internal automation port every worker image listens on.
const CONTAINER_AUTOMATION_PORT: u16 = 4444;

const STOP_RETRIES: u32 = 3;
const STOP_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Creates, stops, and removes the worker container that a driver connects
/// to, grounded on `scraper/scraper/web/docker.py::DockerManager`.
pub struct ContainerManager {
    docker: Docker,
}

impl ContainerManager {
    /// Connects to the local Docker daemon using the ambient environment
    /// (`DOCKER_HOST`, TLS certs, etc).
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(|e| {
            Error::with_source(ErrorKind::Resource, "failed to connect to docker daemon", Box::new(e))
        })?;
        Ok(Self { docker })
    }

    /// Creates and starts a container from `cfg`, publishing the container's
    /// internal automation port on `host_port`, and returns the container id.
    pub async fn create_container(&self, cfg: &ContainerConfig, name: &str, host_port: u16) -> Result<String> {
        let memory_bytes = cfg
            .resource_limits
            .memory_mb
            .saturating_mul(1024)
            .saturating_mul(1024);
        let nano_cpus = (cfg.resource_limits.cpu_cores * 1_000_000_000.0) as i64;

        let key = format!("{CONTAINER_AUTOMATION_PORT}/tcp");
        let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
        exposed_ports.insert(key.clone(), HashMap::new());
        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        port_bindings.insert(
            key,
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(host_port.to_string()),
            }]),
        );

        let host_config = HostConfig {
            port_bindings: Some(port_bindings),
            shm_size: Some(parse_shm_size(&cfg.container_shm_size)),
            network_mode: Some(cfg.network_mode.clone()),
            memory: Some(memory_bytes),
            nano_cpus: Some(nano_cpus),
            ..Default::default()
        };

        let env: Vec<String> = cfg
            .environment
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        let container_config = BollardContainerConfig {
            image: Some(cfg.container_image.clone()),
            env: Some(env),
            exposed_ports: Some(exposed_ports),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: name.to_string(),
            platform: None,
        };

        let created = self
            .docker
            .create_container(Some(options), container_config)
            .await
            .map_err(|e| {
                Error::with_source(ErrorKind::Resource, "failed to create container", Box::new(e))
            })?;

        self.docker
            .start_container(&created.id, None::<bollard::container::StartContainerOptions<String>>)
            .await
            .map_err(|e| {
                Error::with_source(ErrorKind::Resource, "failed to start container", Box::new(e))
            })?;

        info!(container_id = %created.id, "created and started container");
        Ok(created.id)
    }

    /// Stops a container gracefully, retrying `STOP_RETRIES` times, then
    /// force-kills it if it is still running.
    pub async fn stop_container(&self, container_id: &str) -> Result<()> {
        for attempt in 1..=STOP_RETRIES {
            let options = StopContainerOptions { t: 10 };
            match self.docker.stop_container(container_id, Some(options)).await {
                Ok(()) => {
                    info!(container_id, attempt, "stopped container");
                    return Ok(());
                }
                Err(e) => {
                    warn!(container_id, attempt, error = %e, "stop_container attempt failed");
                    if attempt < STOP_RETRIES {
                        tokio::time::sleep(STOP_RETRY_INTERVAL).await;
                    }
                }
            }
        }

        warn!(container_id, "stop_container exhausted retries, killing container");
        self.kill_container(container_id).await
    }

    /// Sends `SIGKILL` to the container's main process.
    pub async fn kill_container(&self, container_id: &str) -> Result<()> {
        self.docker
            .kill_container(container_id, None::<KillContainerOptions<String>>)
            .await
            .map_err(|e| {
                Error::with_source(ErrorKind::Resource, "failed to kill container", Box::new(e))
            })
    }

    /// Removes a container. Tolerates "already gone" (404) responses.
    pub async fn remove_container(&self, container_id: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_container(container_id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(()),
            Err(e) => Err(Error::with_source(
                ErrorKind::Resource,
                "failed to remove container",
                Box::new(e),
            )),
        }
    }

    /// Stops (and, if `remove_on_cleanup` is set, removes) the container.
    /// Removal runs regardless of whether the stop succeeded, so a container
    /// stuck mid-stop is never leaked.
    pub async fn cleanup(&self, container_id: &str, cfg: &ContainerConfig) -> Result<()> {
        if let Err(e) = self.stop_container(container_id).await {
            warn!(container_id, error = %e, "stop_container failed during cleanup, removing anyway");
        }
        if cfg.remove_on_cleanup {
            self.remove_container(container_id).await?;
        }
        Ok(())
    }
}

/// Parses docker shm-size strings like `"2g"`/`"512m"` into bytes.
fn parse_shm_size(raw: &str) -> i64 {
    let lower = raw.trim().to_lowercase();
    let (digits, multiplier) = if let Some(stripped) = lower.strip_suffix('g') {
        (stripped, 1024 * 1024 * 1024)
    } else if let Some(stripped) = lower.strip_suffix('m') {
        (stripped, 1024 * 1024)
    } else if let Some(stripped) = lower.strip_suffix('k') {
        (stripped, 1024)
    } else {
        (lower.as_str(), 1)
    };
    digits.parse::<i64>().unwrap_or(64 * 1024 * 1024) * multiplier
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gigabyte_shm_size() {
        assert_eq!(parse_shm_size("2g"), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn parses_megabyte_shm_size() {
        assert_eq!(parse_shm_size("512m"), 512 * 1024 * 1024);
    }

    #[test]
    fn falls_back_on_unparseable_input() {
        assert_eq!(parse_shm_size("bogus"), 64 * 1024 * 1024);
    }
}
