//! Output module for scan results
//!
//! This module handles:
//! - Serializing findings and error payloads as JSON
//! - Aggregating findings into summary statistics

mod response;
pub mod stats;

pub use response::ErrorResponse;
pub use stats::{format_summary, summarize, ScanSummary};

use crate::state::Finding;
use crate::ScanError;
use serde::Serialize;
use std::io::Write;

/// Writes findings as a JSON array followed by a newline
///
/// # Arguments
///
/// * `writer` - Destination, typically stdout
/// * `findings` - Findings in discovery order
/// * `pretty` - Indent the output
pub fn write_findings_json<W: Write>(
    writer: W,
    findings: &[Finding],
    pretty: bool,
) -> serde_json::Result<()> {
    write_json(writer, &findings, pretty)
}

/// Writes the [`ErrorResponse`] for `err` as JSON followed by a newline
pub fn write_error_json<W: Write>(writer: W, err: &ScanError, pretty: bool) -> serde_json::Result<()> {
    write_json(writer, &ErrorResponse::from(err), pretty)
}

fn write_json<W: Write, T: Serialize + ?Sized>(
    mut writer: W,
    value: &T,
    pretty: bool,
) -> serde_json::Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut writer, value)?;
    } else {
        serde_json::to_writer(&mut writer, value)?;
    }
    writer.write_all(b"\n").map_err(serde_json::Error::io)
}
