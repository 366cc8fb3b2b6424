use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::workflows::engine::DEFAULT_MAX_CONFLICT_RETRIES;
use crate::workflows::PricingPolicy;

/// Main configuration structure for the shop workflow
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShopConfig {
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Workflow engine tuning
    pub workflow: WorkflowConfig,
    /// Price list used for cart line items
    pub pricing: PricingPolicy,
    /// Who counts as staff
    pub identity: IdentityConfig,
    /// File-backed storage location
    pub storage: StorageConfig,
    /// Database settings (optional, needs the `database` feature)
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level or EnvFilter directive
    pub log_level: String,
    /// Emit JSON lines instead of human-readable logs
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Reloads allowed when a request changes between read and commit
    pub max_conflict_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentityConfig {
    /// Staff user ids; everyone else with an e-mail address is a customer
    pub staff: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding requests.json and cart.jsonl
    pub state_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            observability: ObservabilityConfig {
                log_level: "warn".to_string(),
                json_logs: false,
            },
            workflow: WorkflowConfig {
                max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            },
            pricing: PricingPolicy::default(),
            identity: IdentityConfig { staff: Vec::new() },
            storage: StorageConfig {
                state_dir: PathBuf::from(".shop-workflow"),
            },
            database: None,
        }
    }
}

impl ShopConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (shop-workflow.toml, .shop-workflow-rc)
    /// 3. Environment variables (prefixed with SHOP_WORKFLOW, `__` between sections)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&ShopConfig::default())?);

        if Path::new("shop-workflow.toml").exists() {
            builder = builder.add_source(File::with_name("shop-workflow"));
        }

        if Path::new(".shop-workflow-rc").exists() {
            builder = builder.add_source(File::with_name(".shop-workflow-rc").format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("SHOP_WORKFLOW")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("identity.staff")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let shop_config: ShopConfig = config.try_deserialize()?;
        Ok(shop_config)
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
static CONFIG: std::sync::LazyLock<Result<ShopConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = ShopConfig::load_env_file();
        ShopConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static ShopConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}
