use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::cms::CmsAuth;

pub const DEFAULT_ORIGIN_HOST: &str = "www.example.edu";
pub const DEFAULT_EXPORT_DIR: &str = "source-exports";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_DB_PATH: &str = ".migratool/migration.db";
pub const LOG_STREAM_FILENAME: &str = "migration-log.jsonl";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct MigrationConfig {
    #[serde(default)]
    pub site: SiteSection,
    #[serde(default)]
    pub cms: CmsSection,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub batch: BatchSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SiteSection {
    pub origin_host: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct CmsSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct PathsSection {
    pub export_dir: Option<String>,
    pub asset_table: Option<String>,
    pub log_dir: Option<String>,
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct BatchSection {
    pub rate_limit_ms: Option<u64>,
}

impl MigrationConfig {
    /// Resolve the origin host: env MIGRATE_ORIGIN_HOST > config > default.
    pub fn origin_host(&self) -> String {
        if let Some(value) = env_value("MIGRATE_ORIGIN_HOST") {
            return value;
        }
        self.site
            .origin_host
            .clone()
            .unwrap_or_else(|| DEFAULT_ORIGIN_HOST.to_string())
    }

    /// Resolve the CMS base URL: env MIGRATE_CMS_BASE_URL > config.
    pub fn cms_base_url(&self) -> Result<String> {
        if let Some(value) = env_value("MIGRATE_CMS_BASE_URL") {
            return Ok(value);
        }
        self.cms
            .base_url
            .clone()
            .context("no CMS base URL configured (set [cms] base_url or MIGRATE_CMS_BASE_URL)")
    }

    /// Resolve credentials: an API key wins over username/password; env
    /// values win over the config file.
    pub fn cms_auth(&self) -> Result<CmsAuth> {
        if let Some(key) = env_value("MIGRATE_CMS_API_KEY").or_else(|| self.cms.api_key.clone()) {
            return Ok(CmsAuth::ApiKey(key));
        }
        let username = env_value("MIGRATE_CMS_USERNAME").or_else(|| self.cms.username.clone());
        let password = env_value("MIGRATE_CMS_PASSWORD").or_else(|| self.cms.password.clone());
        match (username, password) {
            (Some(username), Some(password)) => Ok(CmsAuth::Basic { username, password }),
            _ => bail!(
                "no CMS credentials configured (set [cms] api_key or username/password, \
or the MIGRATE_CMS_* environment variables)"
            ),
        }
    }

    pub fn rate_limit_ms(&self) -> u64 {
        env_value("MIGRATE_RATE_LIMIT_MS")
            .and_then(|value| value.parse::<u64>().ok())
            .or(self.batch.rate_limit_ms)
            .unwrap_or(0)
    }

    pub fn resolve_paths(&self, project_root: &Path) -> ResolvedPaths {
        let export_dir = self.paths.export_dir.as_deref().unwrap_or(DEFAULT_EXPORT_DIR);
        let log_dir = self.paths.log_dir.as_deref().unwrap_or(DEFAULT_LOG_DIR);
        let db_path = self.paths.db_path.as_deref().unwrap_or(DEFAULT_DB_PATH);
        ResolvedPaths {
            export_dir: project_root.join(export_dir),
            asset_table: self
                .paths
                .asset_table
                .as_deref()
                .map(|value| project_root.join(value)),
            log_stream: project_root.join(log_dir).join(LOG_STREAM_FILENAME),
            db_path: project_root.join(db_path),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub export_dir: PathBuf,
    pub asset_table: Option<PathBuf>,
    pub log_stream: PathBuf,
    pub db_path: PathBuf,
}

/// Load and parse the config file. Returns defaults if the file is absent.
pub fn load_config(config_path: &Path) -> Result<MigrationConfig> {
    if !config_path.exists() {
        return Ok(MigrationConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: MigrationConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

fn env_value(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
