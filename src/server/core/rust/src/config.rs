/* src/server/core/rust/src/config.rs */

use std::path::Path;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Io { path: String, source: std::io::Error },
  #[error("failed to parse {path}: {source}")]
  Parse { path: String, source: toml::de::Error },
  #[error("invalid config: {0}")]
  Invalid(String),
}

/// Contents of `vessel.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
  pub trailing_slash: bool,
  pub dev: bool,
  pub address: String,
  /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
  pub log: String,
  pub markdown: MarkdownConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      trailing_slash: false,
      dev: false,
      address: "0.0.0.0:3000".to_string(),
      log: "info".to_string(),
      markdown: MarkdownConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MarkdownConfig {
  /// Parsed documents kept in the LRU cache.
  pub cache_capacity: usize,
  /// Files tracked by the file -> cache-key index.
  pub index_capacity: usize,
  /// Site origin; links to other origins open in a new tab.
  pub base_url: Option<String>,
}

impl Default for MarkdownConfig {
  fn default() -> Self {
    Self { cache_capacity: 1024, index_capacity: 1024, base_url: None }
  }
}

pub fn parse_config(content: &str, path: &str) -> Result<ServerConfig, ConfigError> {
  let config: ServerConfig = toml::from_str(content)
    .map_err(|source| ConfigError::Parse { path: path.to_string(), source })?;
  validate(&config)?;
  Ok(config)
}

pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
  let display = path.display().to_string();
  let content = std::fs::read_to_string(path)
    .map_err(|source| ConfigError::Io { path: display.clone(), source })?;
  parse_config(&content, &display)
}

fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
  if config.markdown.cache_capacity == 0 {
    return Err(ConfigError::Invalid("markdown.cache_capacity must be greater than 0".into()));
  }
  if config.markdown.index_capacity == 0 {
    return Err(ConfigError::Invalid("markdown.index_capacity must be greater than 0".into()));
  }
  if let Some(base) = &config.markdown.base_url {
    url::Url::parse(base)
      .map_err(|e| ConfigError::Invalid(format!("markdown.base_url '{base}': {e}")))?;
  }
  Ok(())
}
