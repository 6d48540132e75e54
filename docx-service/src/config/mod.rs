use crate::package::PackageLimits;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct DocxConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    /// Reported by `GET /`.
    pub environment: String,
    pub storage: StorageConfig,
    pub templates_dir: PathBuf,
    pub max_request_bytes: usize,
    /// Inflated size cap for a single part of an uploaded document.
    pub max_part_bytes: u64,
    /// Inflated size cap for all parts of an uploaded document together.
    pub max_package_bytes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub local_path: PathBuf,
    /// `0` keeps documents forever.
    pub retention_hours: u64,
}

impl StorageConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours * 3600)
    }
}

impl DocxConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "unknown".to_string());
        let is_prod = environment == "prod";

        Ok(DocxConfig {
            common: common_config,
            environment,
            storage: StorageConfig {
                local_path: get_env("STORAGE_LOCAL_PATH", Some("ArchivosWord"), is_prod)?.into(),
                retention_hours: parse_env("STORAGE_RETENTION_HOURS", "72", is_prod)?,
            },
            templates_dir: get_env("TEMPLATES_DIR", Some("wwwroot/Plantillas"), is_prod)?.into(),
            max_request_bytes: parse_env("MAX_REQUEST_BYTES", "52428800", is_prod)?,
            max_part_bytes: parse_env("MAX_PART_BYTES", "67108864", is_prod)?,
            max_package_bytes: parse_env("MAX_PACKAGE_BYTES", "268435456", is_prod)?,
        })
    }

    pub fn package_limits(&self) -> PackageLimits {
        PackageLimits {
            max_part_bytes: self.max_part_bytes,
            max_total_bytes: self.max_package_bytes,
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, Some(default), is_prod)?;
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value {:?}: {}", key, raw, e))
    })
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}
