use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub path: PathBuf,
    /// Persist recipe embeddings next to the corpus file.
    #[serde(default = "default_true")]
    pub embedding_cache: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct MatchingConfig {
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
        }
    }
}

fn default_strategy() -> String {
    "auto".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_embedding_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_embedding_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Where matching attempts run.
#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_backend_kind")]
    pub kind: String,
    /// Worker executable for `kind = "command"`.
    #[serde(default)]
    pub program: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            program: None,
            args: Vec::new(),
        }
    }
}

fn default_backend_kind() -> String {
    "in_process".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
        }
    }
}

fn default_max_retries() -> u32 {
    2
}
fn default_base_delay_ms() -> u64 {
    1000
}
fn default_backoff_multiplier() -> u32 {
    2
}
// Generous: the first embedding attempt may have to download and load a model.
fn default_attempt_timeout_secs() -> u64 {
    300
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

impl Config {
    /// Defaults around a corpus path, for runs without a config file.
    pub fn minimal(corpus_path: impl Into<PathBuf>) -> Self {
        Self {
            corpus: CorpusConfig {
                path: corpus_path.into(),
                embedding_cache: true,
            },
            matching: MatchingConfig::default(),
            embedding: EmbeddingConfig::default(),
            backend: BackendConfig::default(),
            retry: RetryConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Relative corpus paths resolve against the config file's directory.
    if config.corpus.path.is_relative() {
        if let Some(dir) = path.parent() {
            config.corpus.path = dir.join(&config.corpus.path);
        }
    }

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    match config.matching.strategy.as_str() {
        "lexical" | "auto" => {}
        "embedding" => {
            if !config.embedding.is_enabled() {
                anyhow::bail!(
                    "matching.strategy = 'embedding' requires an [embedding] provider"
                );
            }
        }
        other => anyhow::bail!(
            "Unknown matching strategy: '{}'. Must be lexical, embedding, or auto.",
            other
        ),
    }

    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    match config.backend.kind.as_str() {
        "in_process" => {}
        "command" => {
            if config.backend.program.is_none() {
                anyhow::bail!("backend.program must be set when backend.kind is 'command'");
            }
        }
        other => anyhow::bail!(
            "Unknown backend kind: '{}'. Must be in_process or command.",
            other
        ),
    }

    if config.retry.backoff_multiplier < 1 {
        anyhow::bail!("retry.backoff_multiplier must be >= 1");
    }
    if config.retry.attempt_timeout_secs == 0 {
        anyhow::bail!("retry.attempt_timeout_secs must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("pantry.toml");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_fill_in() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[corpus]\npath = \"recipes.json\"\n");
        let config = load_config(&path).unwrap();

        assert_eq!(config.corpus.path, tmp.path().join("recipes.json"));
        assert_eq!(config.matching.strategy, "auto");
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.base_delay(), Duration::from_secs(1));
        assert_eq!(config.retry.backoff_multiplier, 2);
        assert_eq!(config.backend.kind, "in_process");
        assert!(!config.embedding.is_enabled());
    }

    #[test]
    fn test_embedding_strategy_requires_provider() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "[corpus]\npath = \"r.json\"\n[matching]\nstrategy = \"embedding\"\n",
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("requires an [embedding] provider"));
    }

    #[test]
    fn test_command_backend_requires_program() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "[corpus]\npath = \"r.json\"\n[backend]\nkind = \"command\"\n",
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("backend.program"));
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "[corpus]\npath = \"r.json\"\n[matching]\nstrategy = \"fuzzy\"\n",
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Unknown matching strategy"));
    }

    #[test]
    fn test_openai_requires_model_and_dims() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "[corpus]\npath = \"r.json\"\n[embedding]\nprovider = \"openai\"\n",
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));
    }

    #[test]
    fn test_absolute_corpus_path_kept() {
        let tmp = TempDir::new().unwrap();
        let abs = tmp.path().join("data").join("recipes.json");
        let path = write_config(
            &tmp,
            &format!("[corpus]\npath = {:?}\n", abs.display().to_string()),
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.corpus.path, abs);
    }
}
