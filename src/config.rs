/// Configuration module for AbiaCS Assistant.
///
/// Handles loading the JSON config file, layering environment overrides on
/// top, and validating the result.
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Origin the bundled web frontend is served from during development.
pub const LOCAL_FRONTEND_URL: &str = "http://localhost:3000";

// ── Default value functions ──────────────────────────────────────────

fn default_claude_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    1500
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_frontend_url() -> String {
    LOCAL_FRONTEND_URL.to_string()
}

fn default_rate_limit() -> String {
    "20/minute".to_string()
}

fn default_ingest_rate_limit() -> String {
    "2/minute".to_string()
}

fn default_documents_dir() -> String {
    "./documents".to_string()
}

fn default_db_path() -> String {
    "./vectors.db".to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_top_k_results() -> usize {
    5
}

fn default_max_message_chars() -> usize {
    2000
}

fn default_max_context_chars() -> usize {
    12_000
}

fn default_model_name() -> String {
    "all-MiniLM-L6-v2".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_model_dir() -> String {
    "models/all-MiniLM-L6-v2".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8000
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub anthropic_api_key: String,

    #[serde(default = "default_claude_model")]
    pub claude_model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    /// Per-client limit on `/api/chat`, e.g. `20/minute`.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: String,

    /// Per-client limit on `/api/ingest`.
    #[serde(default = "default_ingest_rate_limit")]
    pub ingest_rate_limit: String,

    #[serde(default = "default_documents_dir")]
    pub documents_dir: String,

    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_top_k_results")]
    pub top_k_results: usize,

    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Upper bound on the retrieved context interpolated into the prompt.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_model_dir")]
    pub dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            anthropic_api_key: String::new(),
            claude_model: default_claude_model(),
            max_tokens: default_max_tokens(),
            anthropic_base_url: default_anthropic_base_url(),
            host: default_host(),
            port: default_port(),
            frontend_url: default_frontend_url(),
            rate_limit: default_rate_limit(),
            ingest_rate_limit: default_ingest_rate_limit(),
            documents_dir: default_documents_dir(),
            db_path: default_db_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k_results: default_top_k_results(),
            max_message_chars: default_max_message_chars(),
            max_context_chars: default_max_context_chars(),
            model: ModelConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            dimensions: default_dimensions(),
            dir: default_model_dir(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and optionally
    /// generates a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            // Generate template only for the default path
            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Override file values with process environment variables.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Override file values using `lookup` as the variable source.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, slot: &mut String| {
            if let Some(v) = lookup(key) {
                *slot = v;
            }
        };
        text("ANTHROPIC_API_KEY", &mut self.anthropic_api_key);
        text("CLAUDE_MODEL", &mut self.claude_model);
        text("HOST", &mut self.host);
        text("FRONTEND_URL", &mut self.frontend_url);
        text("RATE_LIMIT", &mut self.rate_limit);
        text("DOCUMENTS_DIR", &mut self.documents_dir);
        text("DB_PATH", &mut self.db_path);
        text("EMBEDDING_MODEL", &mut self.model.name);

        parse_env(&lookup, "MAX_TOKENS", &mut self.max_tokens);
        parse_env(&lookup, "PORT", &mut self.port);
        parse_env(&lookup, "CHUNK_SIZE", &mut self.chunk_size);
        parse_env(&lookup, "CHUNK_OVERLAP", &mut self.chunk_overlap);
        parse_env(&lookup, "TOP_K_RESULTS", &mut self.top_k_results);
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(
            self.chunk_overlap < self.chunk_size,
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            self.chunk_overlap,
            self.chunk_size
        );
        anyhow::ensure!(self.top_k_results > 0, "top_k_results must be positive");
        anyhow::ensure!(self.max_tokens > 0, "max_tokens must be positive");
        anyhow::ensure!(
            self.max_message_chars > 0,
            "max_message_chars must be positive"
        );
        anyhow::ensure!(
            self.max_context_chars > 0,
            "max_context_chars must be positive"
        );
        anyhow::ensure!(
            self.model.dimensions > 0,
            "model.dimensions must be positive"
        );
        self.rate_limit
            .parse::<RateLimit>()
            .context("invalid rate_limit")?;
        self.ingest_rate_limit
            .parse::<RateLimit>()
            .context("invalid ingest_rate_limit")?;
        Ok(())
    }

    /// Origins allowed by CORS. The local frontend is always allowed.
    #[must_use]
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = vec![self.frontend_url.clone()];
        if self.frontend_url != LOCAL_FRONTEND_URL {
            origins.push(LOCAL_FRONTEND_URL.to_string());
        }
        origins
    }

    #[must_use]
    pub fn documents_path(&self) -> PathBuf {
        PathBuf::from(&self.documents_dir)
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(v) => *slot = v,
            Err(_) => warn!("Ignoring {key}={raw}: not a valid number"),
        }
    }
}

// ── Rate limits ──────────────────────────────────────────────────────

/// A request budget such as `20/minute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub requests: u32,
    pub period: Duration,
}

impl FromStr for RateLimit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (count, unit) = s
            .split_once('/')
            .with_context(|| format!("expected <count>/<unit>, got {s:?}"))?;

        let requests: u32 = count
            .trim()
            .parse()
            .with_context(|| format!("invalid request count in {s:?}"))?;
        anyhow::ensure!(requests > 0, "request count must be positive in {s:?}");

        let secs = match unit.trim().to_ascii_lowercase().as_str() {
            "second" | "seconds" | "s" => 1,
            "minute" | "minutes" | "m" => 60,
            "hour" | "hours" | "h" => 60 * 60,
            "day" | "days" | "d" => 24 * 60 * 60,
            other => anyhow::bail!("unknown rate limit unit {other:?}"),
        };

        Ok(Self {
            requests,
            period: Duration::from_secs(secs),
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────
