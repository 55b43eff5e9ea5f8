use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::document::sibling_path;

pub const DEFAULT_SPEC_PATH: &str = "specs/00_Overview.md";
pub const DEFAULT_PROMPTS_DIR: &str = "prompts";
pub const DEFAULT_AUDIT_DIR: &str = "logs";
pub const DEFAULT_AUTO_TURNS: usize = 4;

pub const ENV_API_URL: &str = "SPECWRIGHT_API_URL";
pub const ENV_API_KEY: &str = "SPECWRIGHT_API_KEY";
pub const ENV_MODEL: &str = "SPECWRIGHT_MODEL";
pub const ENV_MAX_TOKENS: &str = "SPECWRIGHT_MAX_TOKENS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write {}: {}", .path.display(), .source)]
    Write { path: PathBuf, source: io::Error },
    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}

/// Connection settings for the text generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    16192
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl ApiConfig {
    /// Overlay `SPECWRIGHT_*` variables, looked up through `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_url = url;
        }
        if let Some(key) = lookup(ENV_API_KEY) {
            self.api_key = key;
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.model = model;
        }
        if let Some(value) = lookup(ENV_MAX_TOKENS) {
            self.max_tokens = value
                .trim()
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidNumber {
                    name: ENV_MAX_TOKENS,
                    value,
                })?;
        }
        Ok(())
    }
}

pub fn default_api_config_path() -> PathBuf {
    let Some(dirs) = ProjectDirs::from("com", "specwright", "specwright") else {
        return Path::new("specwright-api.json").to_path_buf();
    };
    dirs.config_dir().join("api.json")
}

pub fn load_api_config(path: &Path) -> ApiConfig {
    let Ok(bytes) = fs::read(path) else {
        debug!(path = %path.display(), "no api config file, using defaults");
        return ApiConfig::default();
    };
    serde_json::from_slice::<ApiConfig>(&bytes).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "ignoring unreadable api config");
        ApiConfig::default()
    })
}

pub fn save_api_config(path: &Path, cfg: &ApiConfig) -> Result<(), ConfigError> {
    let json = serde_json::to_vec_pretty(cfg)?;
    let to_write_error = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(to_write_error)?;
    }
    fs::write(path, json).map_err(to_write_error)
}

/// Load `.specwright/.env` when present, otherwise the nearest `.env`.
pub fn load_dotenv() {
    let local = Path::new(".specwright").join(".env");
    let loaded = if local.exists() {
        dotenvy::from_path(&local).map(|_| local)
    } else {
        dotenvy::dotenv()
    };
    match loaded {
        Ok(path) => debug!(path = %path.display(), "loaded environment file"),
        Err(e) => debug!(error = %e, "no environment file loaded"),
    }
}

/// Values given on the command line; `None` keeps the lower layer's value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub spec_path: Option<PathBuf>,
    pub auto_turns: Option<usize>,
    pub prompts_dir: Option<PathBuf>,
    pub audit_dir: Option<PathBuf>,
    pub no_audit: bool,
    pub config_path: Option<PathBuf>,
}

/// Settings for one run, fixed at start-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub spec_path: PathBuf,
    pub scratch_path: PathBuf,
    pub prompts_dir: PathBuf,
    /// `None` disables the audit log
    pub audit_dir: Option<PathBuf>,
    pub auto_turns: usize,
    pub api: ApiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::with_overrides(&ConfigOverrides::default(), ApiConfig::default())
    }
}

impl AppConfig {
    /// Full resolution: api config file, then environment, then overrides.
    pub fn resolve(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let api_path = overrides
            .config_path
            .clone()
            .unwrap_or_else(default_api_config_path);
        let mut api = load_api_config(&api_path);
        load_dotenv();
        api.apply_env_with(|name| env::var(name).ok())?;
        Ok(Self::with_overrides(overrides, api))
    }

    pub fn with_overrides(overrides: &ConfigOverrides, api: ApiConfig) -> Self {
        let spec_path = overrides
            .spec_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SPEC_PATH));
        let audit_dir = if overrides.no_audit {
            None
        } else {
            Some(
                overrides
                    .audit_dir
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIT_DIR)),
            )
        };
        Self {
            scratch_path: sibling_path(&spec_path, "tmp"),
            spec_path,
            prompts_dir: overrides
                .prompts_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROMPTS_DIR)),
            audit_dir,
            auto_turns: overrides.auto_turns.unwrap_or(DEFAULT_AUTO_TURNS),
            api,
        }
    }
}
