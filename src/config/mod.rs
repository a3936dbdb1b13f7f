//! Configuration module for Listing-Trawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so an empty file is a valid configuration.
//!
//! # Example
//!
//! ```no_run
//! use listing_trawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("trawl.toml")).unwrap();
//! println!("Discovery stops after {} listings", config.pipeline.target_jobs);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, FetchConfig, FieldLabels, LoggingConfig, OutputConfig, PipelineConfig,
    RenderProxyConfig, SiteConfig, StatusConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
