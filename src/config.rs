use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_DIR_NAME: &str = "fandian";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub server: ServerConfig,
    pub user: UserConfig,
}

/// Where the local list document lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory (empty = platform data dir)
    pub data_dir: Option<String>,
    /// Storage key: file stem of the single document holding every list
    pub storage_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            storage_key: "restaurant-lists".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
            _ => Ok(dirs::data_dir()
                .context("Failed to get data directory")?
                .join(APP_DIR_NAME)),
        }
    }
}

/// Client-side sync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Push/poll against the sync server at all
    pub enabled: bool,
    /// Base URL of the sync server
    pub server_url: String,
    /// Web client address that invitation links point at
    pub share_base_url: String,
    /// Poll interval while a list is selected, in milliseconds
    pub interval_ms: u64,
    /// Upper bound for a single remote request, in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server_url: "http://127.0.0.1:3001".to_string(),
            share_base_url: "http://localhost:3000".to_string(),
            interval_ms: 2000,
            request_timeout_ms: 5000,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }
}

/// Which durable store backs the sync server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One JSON document keyed by list id
    File,
    /// redb key-value database, one record per list
    Kv,
    /// Process-lifetime in-memory map
    Memory,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::File => write!(f, "file"),
            BackendKind::Kv => write!(f, "kv"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" | "json" => Ok(BackendKind::File),
            "kv" | "redb" => Ok(BackendKind::Kv),
            "memory" | "mem" => Ok(BackendKind::Memory),
            _ => Err(anyhow::anyhow!("Unknown storage backend: {}", s)),
        }
    }
}

/// Sync server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub backend: BackendKind,
    /// Backend file (empty = `server-db.json` / `server-db.redb` in the data dir)
    pub data_file: Option<String>,
    /// CORS preflight cache lifetime
    pub cors_max_age_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            backend: BackendKind::File,
            data_file: None,
            cors_max_age_secs: 60 * 60,
        }
    }
}

impl ServerConfig {
    /// Apply `FANDIAN_PORT`, `FANDIAN_BACKEND` and `FANDIAN_DATA_FILE` on top of the file config.
    pub fn apply_env(&mut self) {
        if let Some(port) = env_override("FANDIAN_PORT") {
            self.port = port;
        }
        if let Some(backend) = env_override("FANDIAN_BACKEND") {
            self.backend = backend;
        }
        if let Ok(path) = std::env::var("FANDIAN_DATA_FILE") {
            if !path.is_empty() {
                self.data_file = Some(path);
            }
        }
    }

    pub fn resolve_data_file(&self, storage: &StorageConfig) -> Result<PathBuf> {
        match &self.data_file {
            Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
            _ => {
                let file_name = match self.backend {
                    BackendKind::Kv => "server-db.redb",
                    _ => "server-db.json",
                };
                Ok(storage.resolve_data_dir()?.join(file_name))
            }
        }
    }
}

fn env_override<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => {
            tracing::info!("{key} set, overriding config");
            Some(value)
        }
        Err(e) => {
            tracing::warn!("Invalid {key} value {raw:?}: {e}");
            None
        }
    }
}

/// Identity used when joining shared lists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Stable member id (generated on first load when empty)
    pub id: String,
    /// Display name (empty = hostname)
    pub name: String,
}

impl UserConfig {
    pub fn display_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "guest".to_string())
    }
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join(APP_DIR_NAME);

        fs::create_dir_all(&config_dir)
            .context("Failed to create config directory")?;

        Ok(config_dir.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from the default path, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, or create a default one there.
    ///
    /// A missing user id is generated and written back so the same id is
    /// used on every later run.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .context("Failed to read config file")?;

            toml::from_str::<Config>(&contents)
                .context("Failed to parse config file")?
        } else {
            Config::default()
        };

        if config.user.id.is_empty() || !path.exists() {
            if config.user.id.is_empty() {
                config.user.id = crate::ids::new_id();
            }
            config.save_to(path)?;
        }

        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Generate example config content for documentation
    pub fn example_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}
