use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable overriding `[llm] api-key`
pub const LLM_API_KEY_ENV: &str = "LLM_API_KEY";

/// Loads and parses a configuration file from the given path
///
/// Missing sections and keys fall back to their defaults. The LLM API key is
/// taken from `LLM_API_KEY` when that variable is set.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use safarnama::config::load_config;
///
/// let config = load_config(Path::new("safarnama.toml")).unwrap();
/// println!("Max depth: {}", config.crawler.max_depth);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config, std::env::var(LLM_API_KEY_ENV).ok());
    validate(&config)?;
    Ok(config)
}

/// Parses TOML content into a configuration without touching the environment
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, api_key: Option<String>) {
    if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
        config.llm.api_key = Some(key);
    }
}

/// Renders the default configuration as TOML
pub fn render_default_config() -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(&Config::default())?)
}

/// Writes the default configuration to `path`
///
/// Refuses to overwrite an existing file unless `force` is set.
pub fn write_default_config(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path.display().to_string()));
    }
    std::fs::write(path, render_default_config()?)?;
    Ok(())
}

impl Config {
    /// Hex-encoded SHA-256 of the canonical TOML rendering
    ///
    /// Recorded with every crawl run so runs under different settings can be
    /// told apart. The API key is excluded.
    pub fn fingerprint(&self) -> Result<String, ConfigError> {
        let mut canonical = self.clone();
        canonical.llm.api_key = None;
        let rendered = toml::to_string(&canonical)?;
        let mut hasher = Sha256::new();
        hasher.update(rendered.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}
