use clap::Parser;

/// Selects which `serde` deserializer loads the target-type config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[clap(rename_all = "lowercase")]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl Default for ConfigFormat {
    fn default() -> Self {
        Self::Yaml
    }
}

/// Command-line surface for the scrape coordinator binary.
#[derive(Debug, Parser)]
#[command(name = "scrapyard", version, about = "Config-driven web-scrape coordinator.")]
pub struct Cli {
    /// Selects `files/configs/<target-type>.<fmt>` as the run configuration.
    #[arg(long)]
    pub target_type: String,

    /// Format of the selected config file.
    #[arg(long, value_enum, default_value_t = ConfigFormat::Yaml)]
    pub config_format: ConfigFormat,

    /// Raises the log level to debug across the whole crate tree.
    #[arg(long)]
    pub debug: bool,

    /// Emits a runtime profile into the log directory.
    #[arg(long)]
    pub profiling: bool,
}

impl Cli {
    /// Resolves the configuration file path for the selected target type and
    /// format, rooted at `files/configs/`.
    pub fn config_path(&self) -> std::path::PathBuf {
        let ext = match self.config_format {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Json => "json",
            ConfigFormat::Toml => "toml",
        };
        std::path::PathBuf::from("files/configs").join(format!("{}.{ext}", self.target_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_uses_target_type_and_format_extension() {
        let cli = Cli {
            target_type: "emma".to_string(),
            config_format: ConfigFormat::Toml,
            debug: false,
            profiling: false,
        };
        assert_eq!(cli.config_path(), std::path::PathBuf::from("files/configs/emma.toml"));
    }

    #[test]
    fn default_config_format_is_yaml() {
        assert_eq!(ConfigFormat::default(), ConfigFormat::Yaml);
    }
}
