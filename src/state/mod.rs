//! State module for scan results and session lifecycle
//!
//! # Components
//!
//! - `Finding`: the outcome of auditing one page or asset
//! - `Reason`: semantic classification attached to unhealthy findings
//! - `SessionState`: lifecycle of one scan invocation

mod finding;
mod reason;
mod session_state;

// Re-export main types
pub use finding::{is_broken, Finding, SourceType};
pub use reason::{classify_status, classify_status_reason, NetworkErrorKind, Reason};
pub use session_state::SessionState;
