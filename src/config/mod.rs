//! Configuration module for Ripple-Ingest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use ripple_ingest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("ingest.toml")).unwrap();
//! println!("Ingesting from: {}", config.job.start_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    CategoriesConfig, Config, CrawlerConfig, JobConfig, LlmConfig, ModeConfig, OutputConfig,
    ResilienceConfig, StoreConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
