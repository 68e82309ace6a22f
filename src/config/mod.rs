//! Configuration module for the scanner
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional; missing values fall back to the defaults the
//! scanner ships with.
//!
//! # Example
//!
//! ```no_run
//! use brokenlink_scanner::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("scanner.toml")).unwrap();
//! println!("Scan budget: {}", config.scanner.max_findings);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{BrowserConfig, Config, ScannerConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{apply_env_overrides, default_config, load_config, parse_config};
pub use validation::validate;
