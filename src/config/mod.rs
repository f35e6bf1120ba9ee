//! Configuration module for Safarnama
//!
//! This module handles loading, parsing, validating and generating TOML
//! configuration files. Every key has a default, so a partial file is valid.
//!
//! # Example
//!
//! ```no_run
//! use safarnama::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("safarnama.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CleanerConfig, Config, CrawlerConfig, DepthOverride, FilterConfig, LlmConfig, OutputConfig,
    Rotation, SearchConfig, SettingsOverride, ThrottleScope, UrlOverride, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    load_config, parse_config, render_default_config, write_default_config, LLM_API_KEY_ENV,
};
pub use validation::validate;
