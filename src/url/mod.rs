//! URL handling module
//!
//! This module canonicalizes discovered references and decides whether they
//! belong to the crawl. A scan never leaves the origin of its start URL.

mod normalize;
mod scope;

// Re-export main functions
pub use normalize::normalize;
pub use scope::{extract_host, in_scope, origin_string};
