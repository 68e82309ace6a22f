//! Statistics over scan findings
//!
//! This module aggregates a finding list into counts for display.

use crate::state::Finding;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Scan statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub total: usize,

    pub broken: usize,

    /// Broken findings grouped by reason (`unknown` when none was recorded)
    pub broken_by_reason: BTreeMap<String, usize>,

    /// All findings grouped by the fetch strategy that produced them
    pub by_source: BTreeMap<String, usize>,

    /// Sum of request time over all findings
    pub total_time_ms: u64,
}

impl ScanSummary {
    /// Share of findings that are not broken, in percent
    pub fn health_rate(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.total - self.broken) as f64 / self.total as f64 * 100.0
    }
}

/// Aggregates findings into a [`ScanSummary`]
pub fn summarize(findings: &[Finding]) -> ScanSummary {
    let mut summary = ScanSummary {
        total: findings.len(),
        ..Default::default()
    };

    for finding in findings {
        *summary
            .by_source
            .entry(finding.source_type.to_string())
            .or_insert(0) += 1;
        summary.total_time_ms = summary.total_time_ms.saturating_add(finding.time_taken_ms);

        if finding.broken {
            summary.broken += 1;
            let reason = finding
                .reason
                .map_or_else(|| "unknown".to_string(), |r| r.to_string());
            *summary.broken_by_reason.entry(reason).or_insert(0) += 1;
        }
    }

    summary
}

/// Renders statistics as human-readable text
///
/// # Arguments
///
/// * `summary` - The statistics to display
pub fn format_summary(summary: &ScanSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Scan Summary ===\n");
    let _ = writeln!(out, "  Findings: {}", summary.total);
    let _ = writeln!(out, "  Broken: {}", summary.broken);
    let _ = writeln!(out, "  Total request time: {}ms", summary.total_time_ms);

    if !summary.broken_by_reason.is_empty() {
        let _ = writeln!(out, "\nBroken by Reason:");
        // Sort by count (descending)
        let mut reasons: Vec<_> = summary.broken_by_reason.iter().collect();
        reasons.sort_by(|a, b| b.1.cmp(a.1));
        for (reason, count) in reasons {
            let _ = writeln!(out, "  {}: {}", reason, count);
        }
    }

    if !summary.by_source.is_empty() {
        let _ = writeln!(out, "\nBy Source:");
        for (source, count) in &summary.by_source {
            let _ = writeln!(out, "  {}: {}", source, count);
        }
    }

    let _ = writeln!(
        out,
        "\nHealth Rate: {:.1}% ({} / {} findings healthy)",
        summary.health_rate(),
        summary.total - summary.broken,
        summary.total
    );
    out
}
