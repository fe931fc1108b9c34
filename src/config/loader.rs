//! Configuration loader with environment variable expansion

use super::{
    expand_env_vars, CloudinaryConfig, Config, ConfigError, MetricsConfig, MongoConfig,
    ServerConfig, UploadConfig,
};
use std::path::Path;
use std::str::FromStr;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, expanding `${VAR}` placeholders first
    pub fn from_yaml(content: &str) -> Result<Config, ConfigError> {
        let expanded = expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from the process environment
    ///
    /// Only `MONGODB_URI` is required. Empty values count as unset.
    pub fn from_env() -> Result<Config, ConfigError> {
        let server_defaults = ServerConfig::default();
        let cloudinary_defaults = CloudinaryConfig::default();
        let upload_defaults = UploadConfig::default();
        let metrics_defaults = MetricsConfig::default();

        let config = Config {
            server: ServerConfig {
                host: var("HOST").unwrap_or(server_defaults.host),
                port: parsed_var("PORT")?.unwrap_or(server_defaults.port),
            },
            mongodb: MongoConfig {
                uri: var("MONGODB_URI").ok_or(ConfigError::MissingVar("MONGODB_URI"))?,
                database: var("MONGODB_DATABASE"),
                collection: var("MONGODB_COLLECTION").unwrap_or_else(|| "images".to_string()),
            },
            cloudinary: CloudinaryConfig {
                cloud_name: var("CLOUDINARY_CLOUD_NAME"),
                api_key: var("CLOUDINARY_API_KEY"),
                api_secret: var("CLOUDINARY_API_SECRET"),
                folder: var("CLOUDINARY_FOLDER"),
                api_base: var("CLOUDINARY_API_BASE").unwrap_or(cloudinary_defaults.api_base),
            },
            upload: UploadConfig {
                cleanup_orphans: bool_var("CLEANUP_ORPHANED_ASSETS")?
                    .unwrap_or(upload_defaults.cleanup_orphans),
                ..upload_defaults
            },
            metrics: MetricsConfig {
                enabled: bool_var("METRICS_ENABLED")?.unwrap_or(metrics_defaults.enabled),
                port: parsed_var("METRICS_PORT")?.unwrap_or(metrics_defaults.port),
            },
        };

        config.validate()?;
        Ok(config)
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match var(name) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar { name, value }),
        None => Ok(None),
    }
}

fn bool_var(name: &'static str) -> Result<Option<bool>, ConfigError> {
    match var(name) {
        Some(value) => match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidVar { name, value }),
        },
        None => Ok(None),
    }
}
