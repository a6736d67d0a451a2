use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
#[cfg(unix)]
use tokio::fs::File;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const CONFIG_FILE_NAME: &str = "config.toml";
const SUPPORTED_STORAGE_BACKENDS: &[&str] = &["sqlite", "memory"];

/// Default cap on request bodies, also used to bound buffered stream lines.
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 64 * 1024;

// ── Top-level config ──────────────────────────────────────────────

/// Top-level GuessMaster configuration, loaded from `config.toml`.
///
/// Resolution order: `--config-dir` → `GUESSMASTER_CONFIG_DIR` → `~/.guessmaster/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Inference backend (`[ollama]`).
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// HTTP server (`[gateway]`).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Session persistence (`[storage]`).
    #[serde(default)]
    pub storage: StorageConfig,
}

// ── Ollama ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Server root or full `/api/generate` endpoint.
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
    /// Sampling temperature (0.0–2.0). Default: `0.7`.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    /// Upper bound on generated tokens per answer.
    #[serde(default = "default_num_predict")]
    pub num_predict: u32,
    /// Per-request timeout for answers (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Timeout for the connectivity probe (default: 10).
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

fn default_ollama_url() -> String {
    "http://localhost:11434/api/generate".into()
}

fn default_ollama_model() -> String {
    "llama3.2".into()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.9
}

fn default_num_predict() -> u32 {
    150
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_probe_timeout_secs() -> u64 {
    10
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_ollama_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            num_predict: default_num_predict(),
            timeout_secs: default_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
        }
    }
}

// ── Gateway ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway port (default: 8000)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Cookie carrying the session id.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Maximum accepted request body size.
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_cookie_name() -> String {
    "guessmaster_session".into()
}

fn default_body_limit_bytes() -> usize {
    DEFAULT_BODY_LIMIT_BYTES
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            host: default_gateway_host(),
            cookie_name: default_cookie_name(),
            body_limit_bytes: default_body_limit_bytes(),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `"sqlite"` or `"memory"`.
    #[serde(default = "default_storage_backend")]
    pub backend: String,
    /// SQLite database file. Relative paths resolve against the config directory.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

fn default_storage_backend() -> String {
    "sqlite".into()
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("sessions.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: default_storage_path(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────

fn default_config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".guessmaster"))
}

fn resolve_config_dir(config_dir_override: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = config_dir_override {
        return Ok(dir.to_path_buf());
    }
    if let Ok(dir) = std::env::var("GUESSMASTER_CONFIG_DIR") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir.trim()));
        }
    }
    default_config_dir()
}

fn first_non_empty(lookup: &impl Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn is_bind_address(host: &str) -> bool {
    host.eq_ignore_ascii_case("localhost") || host.parse::<std::net::IpAddr>().is_ok()
}

impl Config {
    pub async fn load_or_init(config_dir_override: Option<&Path>) -> Result<Self> {
        let config_dir = resolve_config_dir(config_dir_override)?;
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        fs::create_dir_all(&config_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let initialized = !config_path.exists();
        let mut config = if initialized {
            let config = Config {
                config_path: config_path.clone(),
                ..Config::default()
            };
            config.save().await?;
            config
        } else {
            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path = config_path.clone();
            config
        };

        config.apply_env_overrides();
        config.resolve_relative_paths(&config_dir);
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            storage = %config.storage.backend,
            initialized,
            "Config loaded"
        );
        Ok(config)
    }

    fn resolve_relative_paths(&mut self, config_dir: &Path) {
        if self.storage.path.is_relative() {
            self.storage.path = config_dir.join(&self.storage.path);
        }
    }

    /// Validate configuration values that would cause runtime failures.
    pub fn validate(&self) -> Result<()> {
        // Ollama
        if self.ollama.model.trim().is_empty() {
            anyhow::bail!("ollama.model must not be empty");
        }
        let url = reqwest::Url::parse(self.ollama.url.trim())
            .with_context(|| format!("ollama.url is not a valid URL: {}", self.ollama.url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("ollama.url must use http or https, got {}", url.scheme());
        }
        if !(0.0..=2.0).contains(&self.ollama.temperature) {
            anyhow::bail!(
                "ollama.temperature must be between 0.0 and 2.0, got {}",
                self.ollama.temperature
            );
        }
        if self.ollama.timeout_secs == 0 {
            anyhow::bail!("ollama.timeout_secs must be greater than 0");
        }
        if self.ollama.probe_timeout_secs == 0 {
            anyhow::bail!("ollama.probe_timeout_secs must be greater than 0");
        }

        // Gateway
        if self.gateway.host.trim().is_empty() {
            anyhow::bail!("gateway.host must not be empty");
        }
        if self.gateway.cookie_name.trim().is_empty() {
            anyhow::bail!("gateway.cookie_name must not be empty");
        }

        // Storage
        let backend = self.storage.backend.trim().to_ascii_lowercase();
        if !SUPPORTED_STORAGE_BACKENDS.contains(&backend.as_str()) {
            anyhow::bail!(
                "storage.backend must be one of {SUPPORTED_STORAGE_BACKENDS:?}, got {:?}",
                self.storage.backend
            );
        }

        Ok(())
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Ollama endpoint: GUESSMASTER_OLLAMA_URL or OLLAMA_URL
        if let Some(url) = first_non_empty(&lookup, &["GUESSMASTER_OLLAMA_URL", "OLLAMA_URL"]) {
            self.ollama.url = url;
        }

        // Model: GUESSMASTER_OLLAMA_MODEL or OLLAMA_MODEL
        if let Some(model) =
            first_non_empty(&lookup, &["GUESSMASTER_OLLAMA_MODEL", "OLLAMA_MODEL"])
        {
            self.ollama.model = model;
        }

        // Gateway port: GUESSMASTER_PORT or PORT
        if let Some(port_str) = first_non_empty(&lookup, &["GUESSMASTER_PORT", "PORT"]) {
            match port_str.parse::<u16>() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!(port = %port_str, "Ignoring invalid port override"),
            }
        }

        // Gateway host: GUESSMASTER_HOST, or HOST when it is a bind address
        if let Some(host) = first_non_empty(&lookup, &["GUESSMASTER_HOST"]) {
            self.gateway.host = host;
        } else if let Some(host) = first_non_empty(&lookup, &["HOST"]) {
            if is_bind_address(&host) {
                self.gateway.host = host;
            } else {
                tracing::debug!(host = %host, "Ignoring HOST, not an IP address");
            }
        }

        // Storage backend: GUESSMASTER_STORAGE
        if let Some(backend) = first_non_empty(&lookup, &["GUESSMASTER_STORAGE"]) {
            self.storage.backend = backend;
        }
    }

    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;

        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or(CONFIG_FILE_NAME);
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        if let Err(e) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            anyhow::bail!("Failed to atomically replace config file: {e}");
        }

        sync_directory(parent_dir).await
    }
}

async fn sync_directory(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let dir = File::open(path)
            .await
            .with_context(|| format!("Failed to open directory for fsync: {}", path.display()))?;
        dir.sync_all()
            .await
            .with_context(|| format!("Failed to fsync directory metadata: {}", path.display()))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}
