//! Serializable payload for a failed scan

use crate::state::Finding;
use crate::{ErrorKind, ScanError};
use serde::Serialize;

/// Error payload returned to callers instead of a finding list
///
/// `kind` is the discriminant; `partialFindings` is present only for errors
/// that stop a scan after it produced results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
    pub status: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_findings: Option<Vec<Finding>>,
}

impl From<&ScanError> for ErrorResponse {
    fn from(err: &ScanError) -> Self {
        Self {
            error: err.to_string(),
            kind: err.kind(),
            status: err.status_code(),
            reason: err.reason().map(str::to_string),
            partial_findings: err.partial_findings().map(<[Finding]>::to_vec),
        }
    }
}
