use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub connector: ConnectorConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorConfig {
    /// `multimap:<name>[?operation=<op>]`
    #[serde(default)]
    pub endpoint: String,
    /// Where responses go: `stdout` or `none`.
    #[serde(default = "default_output")]
    pub output: String,
    /// Maximum number of messages processed concurrently.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self { endpoint: String::new(), output: default_output(), workers: default_workers() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// `memory` or `file`.
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// `set` drops duplicate values under one key, `list` keeps them.
    #[serde(default = "default_value_collection")]
    pub value_collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { backend: default_backend(), data_dir: default_data_dir(), value_collection: default_value_collection() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_admin_addr")]
    pub addr: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self { enabled: true, addr: default_admin_addr() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `compact` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { format: default_log_format() }
    }
}

fn default_output() -> String { "stdout".into() }
fn default_workers() -> usize { 4 }
fn default_backend() -> String { "memory".into() }
fn default_data_dir() -> String { "data".into() }
fn default_value_collection() -> String { "set".into() }
fn default_true() -> bool { true }
fn default_admin_addr() -> String { "127.0.0.1:9190".into() }
fn default_log_format() -> String { "compact".into() }

pub fn config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string())
}

pub fn load_default() -> Result<AppConfig> {
    load_from_file(&config_path())
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        // endpoint may come from MULTIMAP_ENDPOINT when the file leaves it out
        self.connector.normalize_from_env();
        self.connector.validate()?;
        self.store.normalize();
        self.store.validate()?;
        self.admin.validate()?;
        self.logging.normalize();
        Ok(())
    }
}

impl ConnectorConfig {
    pub fn normalize_from_env(&mut self) {
        if self.endpoint.trim().is_empty() {
            if let Ok(endpoint) = std::env::var("MULTIMAP_ENDPOINT") {
                self.endpoint = endpoint;
            }
        }
        self.endpoint = self.endpoint.trim().to_string();
        self.output = self.output.trim().to_lowercase();
        if self.workers == 0 {
            self.workers = default_workers();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(anyhow!("connector.endpoint is empty; set it in config.toml or MULTIMAP_ENDPOINT"));
        }
        if !self.endpoint.starts_with("multimap:") {
            return Err(anyhow!("connector.endpoint must start with multimap:"));
        }
        match self.output.as_str() {
            "stdout" | "none" => Ok(()),
            other => Err(anyhow!("connector.output must be stdout or none, got {other}")),
        }
    }
}

impl StoreConfig {
    fn normalize(&mut self) {
        self.backend = self.backend.trim().to_lowercase();
        self.value_collection = self.value_collection.trim().to_lowercase();
        if self.data_dir.trim().is_empty() {
            self.data_dir = default_data_dir();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.backend.as_str(), "memory" | "file") {
            return Err(anyhow!("store.backend must be memory or file, got {}", self.backend));
        }
        if !matches!(self.value_collection.as_str(), "set" | "list") {
            return Err(anyhow!("store.value_collection must be set or list, got {}", self.value_collection));
        }
        Ok(())
    }

    pub fn uses_files(&self) -> bool { self.backend == "file" }
}

impl AdminConfig {
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.addr.trim().is_empty() {
            return Err(anyhow!("admin.addr is empty while admin.enabled = true"));
        }
        Ok(())
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if !self.format.eq_ignore_ascii_case("json") {
            self.format = default_log_format();
        }
    }
}
