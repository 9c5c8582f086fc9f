use std::collections::HashMap;

use serde::Deserialize;

/// Per-container resource caps applied via the Docker host config.
///
/// Mirrors `scraper/scraper/web/docker.py::DockerConfig.resource_limits`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceLimits {
    /// Memory limit in megabytes.
    #[serde(default = "default_memory_mb")]
    pub memory_mb: i64,

    /// CPU share, in whole cores.
    #[serde(default = "default_cpu_cores")]
    pub cpu_cores: f64,
}

fn default_memory_mb() -> i64 {
    2048
}

fn default_cpu_cores() -> f64 {
    1.0
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_mb: default_memory_mb(),
            cpu_cores: default_cpu_cores(),
        }
    }
}

/// Container lifecycle configuration, loaded from the `Docker` section of the
/// run configuration.
///
/// Mirrors `scraper/scraper/web/docker.py::DockerConfig` one-to-one.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerConfig {
    /// Image reference to run, e.g. `selenium/standalone-chrome:latest`.
    pub container_image: String,

    /// Host ports available for connections, consumed in order at
    /// connection-creation time (one per connection, two for a composite
    /// target). Each is published against the container's internal
    /// automation port.
    pub ports: Vec<u16>,

    /// Size of the container's `/dev/shm` mount, e.g. `"2g"`.
    #[serde(default = "default_shm_size")]
    pub container_shm_size: String,

    /// Whether to remove the container once the run completes.
    #[serde(default = "default_remove_on_cleanup")]
    pub remove_on_cleanup: bool,

    /// Environment variables injected into the container.
    #[serde(default)]
    pub environment: HashMap<String, String>,

    /// Docker network mode, e.g. `"bridge"` or `"host"`.
    #[serde(default = "default_network_mode")]
    pub network_mode: String,

    #[serde(default)]
    pub resource_limits: ResourceLimits,
}

fn default_shm_size() -> String {
    "2g".to_string()
}

fn default_remove_on_cleanup() -> bool {
    true
}

fn default_network_mode() -> String {
    "bridge".to_string()
}
