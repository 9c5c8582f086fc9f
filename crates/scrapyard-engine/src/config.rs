use std::path::{Path, PathBuf};

use scrapyard_container::ContainerConfig;
use scrapyard_core::{Error, ErrorKind, Result};
use scrapyard_driver::DriverConfig;
use scrapyard_proxy::ProxyConfig;
use sysinfo::{Disks, System};

use crate::cli::ConfigFormat;
use crate::target::TargetPlan;

/// Log-file rotation/location settings, the `Logging` config section.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Approximate byte size at which a log file is rotated.
    #[serde(default = "default_log_max_size")]
    pub log_max_size: u64,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_max_size() -> u64 {
    10 * 1024 * 1024
}

/// Top-level run configuration, assembled from the `Docker`, `Logging`,
/// `Proxy`, `Driver`, and `Target` sections of `files/configs/<target-type>.<fmt>`.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RunConfig {
    pub docker: ContainerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub proxy: ProxyConfig,
    pub driver: DriverConfig,
    pub target: Vec<TargetPlan>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: default_log_dir(),
            log_max_size: default_log_max_size(),
        }
    }
}

/// Parses a run configuration from `path`, dispatching on `format`.
pub fn load_config(path: &Path, format: ConfigFormat) -> Result<RunConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::with_source(
            ErrorKind::Configuration,
            format!("failed to read config file '{}'", path.display()),
            Box::new(e),
        )
    })?;

    match format {
        ConfigFormat::Yaml => serde_yaml::from_str(&contents).map_err(|e| {
            Error::with_source(ErrorKind::Configuration, "failed to parse YAML config", Box::new(e))
        }),
        ConfigFormat::Json => serde_json::from_str(&contents).map_err(|e| {
            Error::with_source(ErrorKind::Configuration, "failed to parse JSON config", Box::new(e))
        }),
        ConfigFormat::Toml => toml::from_str(&contents).map_err(|e| {
            Error::with_source(ErrorKind::Configuration, "failed to parse TOML config", Box::new(e))
        }),
    }
}

const MIN_FREE_DISK_BYTES: u64 = 1024 * 1024 * 1024;
const MAX_UTILIZATION_PERCENT: f32 = 90.0;
const NETWORK_CHECK_URL: &str = "https://www.google.com";

/// Ordered sequence of fallible startup probes, run before any resource is
/// allocated. The first failing probe aborts the run with a
/// `Configuration`-kind error, mirroring
/// `scraper/scraper/config/validator.py::load_config`'s check ordering.
pub async fn run_preflight_checks(cfg: &RunConfig) -> Result<()> {
    check_docker_environment(&cfg.docker.container_image).await?;
    check_network_connectivity().await?;
    check_disk_space()?;
    check_cpu_and_memory()?;
    check_log_dir_writable(&cfg.logging.log_dir)?;
    Ok(())
}

async fn check_docker_environment(container_image: &str) -> Result<()> {
    check_docker_image_configured_name(container_image)?;

    let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
        Error::with_source(ErrorKind::Configuration, "docker daemon is not reachable", Box::new(e))
    })?;
    docker.ping().await.map_err(|e| {
        Error::with_source(ErrorKind::Configuration, "docker daemon did not respond to ping", Box::new(e))
    })?;

    match docker.inspect_image(container_image).await {
        Ok(_) => Ok(()),
        Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Err(Error::new(
            ErrorKind::Configuration,
            format!("docker image '{container_image}' is not present locally"),
        )),
        Err(e) => Err(Error::with_source(
            ErrorKind::Configuration,
            format!("failed to inspect docker image '{container_image}'"),
            Box::new(e),
        )),
    }
}

async fn check_network_connectivity() -> Result<()> {
    let response = reqwest::get(NETWORK_CHECK_URL).await.map_err(|e| {
        Error::with_source(
            ErrorKind::Configuration,
            format!("network connectivity check failed reaching '{NETWORK_CHECK_URL}'"),
            Box::new(e),
        )
    })?;
    if response.status().as_u16() != 200 {
        return Err(Error::new(
            ErrorKind::Configuration,
            format!("network connectivity check got status {}", response.status()),
        ));
    }
    Ok(())
}

fn check_disk_space() -> Result<()> {
    let disks = Disks::new_with_refreshed_list();
    let available = disks.list().iter().map(|d| d.available_space()).max().unwrap_or(0);
    if available < MIN_FREE_DISK_BYTES {
        return Err(Error::new(
            ErrorKind::Configuration,
            format!("insufficient free disk space: {available} bytes available, need at least {MIN_FREE_DISK_BYTES}"),
        ));
    }
    Ok(())
}

fn check_cpu_and_memory() -> Result<()> {
    let mut system = System::new_all();
    system.refresh_all();

    let cpu_usage = system.global_cpu_usage();
    if cpu_usage > MAX_UTILIZATION_PERCENT {
        return Err(Error::new(
            ErrorKind::Configuration,
            format!("CPU utilization too high to start a run: {cpu_usage:.1}%"),
        ));
    }

    let memory_percent = if system.total_memory() == 0 {
        0.0
    } else {
        (system.used_memory() as f64 / system.total_memory() as f64) * 100.0
    };
    if memory_percent > MAX_UTILIZATION_PERCENT as f64 {
        return Err(Error::new(
            ErrorKind::Configuration,
            format!("memory utilization too high to start a run: {memory_percent:.1}%"),
        ));
    }

    Ok(())
}

fn check_docker_image_configured_name(container_image: &str) -> Result<()> {
    if container_image.trim().is_empty() {
        return Err(Error::new(ErrorKind::Configuration, "docker.container_image must not be empty"));
    }
    Ok(())
}

fn check_log_dir_writable(log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir).map_err(|e| {
        Error::with_source(
            ErrorKind::Configuration,
            format!("log directory '{}' is not writable", log_dir.display()),
            Box::new(e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_dir_is_logs() {
        assert_eq!(LoggingConfig::default().log_dir, PathBuf::from("logs"));
    }

    #[test]
    fn rejects_empty_docker_image() {
        assert!(check_docker_image_configured_name("").is_err());
        assert!(check_docker_image_configured_name("selenium/standalone-chrome").is_ok());
    }
}
