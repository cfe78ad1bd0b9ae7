//! Configuration loading and root folder resolution
//!
//! Each setting resolves in priority order:
//! 1. Environment variable (highest priority)
//! 2. TOML config file
//! 3. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file location.
pub const CONFIG_PATH_ENV: &str = "SMOGWATCH_CONFIG";

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory holding the database and the capture folder
    pub root_folder: PathBuf,
    /// HTTP bind address, e.g. "127.0.0.1:8600"
    pub bind_addr: String,
    /// Secret used to sign access tokens
    pub jwt_secret: String,
    /// Access token lifetime in seconds
    pub token_ttl_seconds: i64,
    /// Username seeded on first start when the users table is empty
    pub admin_username: String,
    /// Password for the seeded admin account
    pub admin_password: String,
    /// Base URL of the local classifier inference sidecar
    pub inference_url: String,
    /// Vision service API key; enrichment is disabled when unset
    pub openai_api_key: Option<String>,
    /// Vision service endpoint
    pub openai_api_url: String,
    /// Vision model name
    pub openai_model: String,
    /// Public base URL used when building capture image links
    pub public_base_url: String,
}

/// Raw TOML file contents; every field optional
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    root_folder: Option<String>,
    bind_addr: Option<String>,
    jwt_secret: Option<String>,
    token_ttl_seconds: Option<i64>,
    admin_username: Option<String>,
    admin_password: Option<String>,
    inference_url: Option<String>,
    openai_api_key: Option<String>,
    openai_api_url: Option<String>,
    openai_model: Option<String>,
    public_base_url: Option<String>,
}

impl Config {
    /// Load configuration from the default file locations plus environment overrides.
    pub fn load() -> Result<Self> {
        let file = match config_file_path() {
            Some(path) => read_config_file(&path)?,
            None => FileConfig::default(),
        };
        Ok(Self::from_parts(file))
    }

    /// Load configuration from an explicit TOML file plus environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let file = read_config_file(path)?;
        Ok(Self::from_parts(file))
    }

    fn from_parts(file: FileConfig) -> Self {
        let root_folder = env_var("SMOGWATCH_ROOT")
            .map(PathBuf::from)
            .or_else(|| file.root_folder.map(PathBuf::from))
            .unwrap_or_else(default_root_folder);

        let bind_addr = env_var("SMOGWATCH_BIND")
            .or(file.bind_addr)
            .unwrap_or_else(|| "127.0.0.1:8600".to_string());

        let jwt_secret = env_var("SMOGWATCH_JWT_SECRET")
            .or(file.jwt_secret)
            .unwrap_or_else(|| {
                tracing::warn!("SMOGWATCH_JWT_SECRET not set, using insecure default");
                "insecure-development-secret".to_string()
            });

        let token_ttl_seconds = env_var("SMOGWATCH_TOKEN_TTL")
            .and_then(|v| v.parse().ok())
            .or(file.token_ttl_seconds)
            .unwrap_or(8 * 3600);

        let public_base_url = env_var("SMOGWATCH_PUBLIC_URL")
            .or(file.public_base_url)
            .unwrap_or_else(|| format!("http://{}", bind_addr));

        Self {
            root_folder,
            jwt_secret,
            token_ttl_seconds,
            admin_username: env_var("SMOGWATCH_ADMIN_USER")
                .or(file.admin_username)
                .unwrap_or_else(|| "admin".to_string()),
            admin_password: env_var("SMOGWATCH_ADMIN_PASSWORD")
                .or(file.admin_password)
                .unwrap_or_else(|| "admin".to_string()),
            inference_url: env_var("SMOGWATCH_INFERENCE_URL")
                .or(file.inference_url)
                .unwrap_or_else(|| "http://127.0.0.1:8601".to_string()),
            openai_api_key: env_var("OPENAI_API_KEY").or(file.openai_api_key),
            openai_api_url: env_var("OPENAI_API_URL")
                .or(file.openai_api_url)
                .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string()),
            openai_model: env_var("OPENAI_MODEL")
                .or(file.openai_model)
                .unwrap_or_else(|| "gpt-4o".to_string()),
            public_base_url,
            bind_addr,
        }
    }

    /// Path of the SQLite database inside the root folder
    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join("smogwatch.db")
    }

    /// Directory the camera writes captured images into
    pub fn captures_dir(&self) -> PathBuf {
        self.root_folder.join("captures")
    }

    /// Create the root folder and capture directory if missing
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.captures_dir())?;
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_config_file(path: &Path) -> Result<FileConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&contents).map_err(|e| Error::Config(format!("invalid config file: {}", e)))
}

/// Locate the config file: $SMOGWATCH_CONFIG, then the user config
/// directory, then /etc/smogwatch/config.toml.
fn config_file_path() -> Option<PathBuf> {
    if let Some(path) = env_var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    if let Some(dir) = dirs::config_dir() {
        let path = dir.join("smogwatch").join("config.toml");
        if path.exists() {
            return Some(path);
        }
    }

    let system = PathBuf::from("/etc/smogwatch/config.toml");
    if system.exists() {
        return Some(system);
    }

    None
}

/// OS-dependent default data directory
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("smogwatch"))
        .unwrap_or_else(|| PathBuf::from("./smogwatch_data"))
}
