use crate::facts::{CollectionResult, ErrorKind, FetchError};
use serde::Serialize;
use strum::Display;

/// Final status of a collection request, as reported to its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReportStatus {
    Success,
    Partial,
    Failed,
    Cancelled,
}

/// Outcome summary returned to the requester.
///
/// Carries only the kind of failure, never retry counts or provider bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub username: String,
    pub status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repositories: Option<usize>,
}

impl RunReport {
    #[must_use]
    pub fn from_outcome(username: &str, outcome: &Result<CollectionResult, FetchError>) -> Self {
        match outcome {
            Ok(result) => Self {
                username: username.to_owned(),
                status: if result.is_partial() {
                    ReportStatus::Partial
                } else {
                    ReportStatus::Success
                },
                error_kind: result.partial.as_ref().map(|p| p.kind),
                repositories: Some(result.repositories.len()),
            },
            Err(FetchError::Cancelled) => Self {
                username: username.to_owned(),
                status: ReportStatus::Cancelled,
                error_kind: Some(ErrorKind::Cancelled),
                repositories: None,
            },
            Err(e) => Self {
                username: username.to_owned(),
                status: ReportStatus::Failed,
                error_kind: Some(e.kind()),
                repositories: None,
            },
        }
    }

    /// Process exit code for this outcome.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self.status {
            ReportStatus::Success | ReportStatus::Partial => 0,
            ReportStatus::Failed | ReportStatus::Cancelled => 1,
        }
    }
}
