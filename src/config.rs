use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::verification::{StageCatalog, StageType};

/// Main configuration structure for Stagegate
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StageGateConfig {
    /// Stage catalog definition
    pub catalog: CatalogConfig,
    /// Local stage store settings
    pub store: StoreConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Stage types in custody order
    pub stages: Vec<StageType>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON document holding every stage record
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or filter directive
    pub log_level: String,
    /// Emit logs as JSON lines
    pub json_logs: bool,
    /// Log engine metrics on shutdown
    pub metrics_enabled: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            stages: StageType::ALL.to_vec(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".stagegate/stages.json"),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            json_logs: false,
            metrics_enabled: false,
        }
    }
}

impl StageGateConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (stagegate.toml, .stagegate-rc)
    /// 3. Environment variables (prefixed with STAGEGATE_)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new("stagegate.toml").exists() {
            builder = builder.add_source(File::with_name("stagegate"));
        }

        if Path::new(".stagegate-rc").exists() {
            builder = builder.add_source(
                File::with_name(".stagegate-rc").format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("STAGEGATE")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("catalog.stages")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let stagegate_config: StageGateConfig = config.try_deserialize()?;
        stagegate_config.stage_catalog()?;

        Ok(stagegate_config)
    }

    /// Build the stage catalog, rejecting empty or duplicated stage lists
    pub fn stage_catalog(&self) -> Result<StageCatalog> {
        StageCatalog::new(self.catalog.stages.clone()).context("Invalid [catalog] configuration")
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::debug!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<StageGateConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = StageGateConfig::load_env_file();
        StageGateConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static StageGateConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {:#}", e))
}
