use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "database_url must not be empty"))]
    pub database_url: String,

    /// Runtime environment: "development", "test" or "production"
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Log level directive for the tracing subscriber
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable lines
    #[serde(default)]
    pub log_json: bool,

    /// Apply pending migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl AppConfig {
    /// Convenience constructor used by tests and tooling.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

/// Loads configuration from the `config/` directory (when present) layered
/// with `APP__`-prefixed environment variables.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting the config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder().set_default("environment", run_env.clone())?;

    if Path::new(CONFIG_DIR).exists() {
        builder = builder
            .add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false))
            .add_source(File::with_name(&format!("{CONFIG_DIR}/{run_env}")).required(false));
    } else {
        info!(
            "Config directory '{}' not found; relying on defaults and environment variables",
            CONFIG_DIR
        );
    }

    let cfg = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()
        .map_err(|e| ConfigError::Message(e.to_string()))?;
    Ok(app)
}

/// Initializes the global tracing subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("serigraf_api={level}");
    let directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        let _ = registry.with(fmt::layer().json()).try_init();
    } else {
        let _ = registry.with(fmt::layer()).try_init();
    }
}
