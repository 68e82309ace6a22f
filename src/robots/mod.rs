//! Robots.txt handling module
//!
//! This module fetches, parses and caches robots.txt per origin, and gates
//! every page of a scan against the crawler's declared identity.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::ParsedRobots;
