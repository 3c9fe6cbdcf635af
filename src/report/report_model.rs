use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::host::routine::AssignmentOutcome;

// ============================================================================
// Execution report: per-selector ledger of one apply call
// ============================================================================

/// Outcome of the file upload path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReport {
    /// File controls that received the resource, as `query[index]`
    pub attached: Vec<String>,

    /// File controls whose attach attempt failed, as `query[index]`
    pub failed: Vec<String>,

    /// Set when the resource itself could not be fetched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<String>,
}

impl UploadReport {
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty() && self.failed.is_empty() && self.fetch_error.is_none()
    }
}

/// Success/failure ledger built by the execution adapter.
///
/// Partial failure is normal: a selector that could not be resolved lands
/// in `failed` without affecting the others. File controls met on the
/// value path land in `skipped`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub success: BTreeSet<String>,
    pub failed: BTreeSet<String>,
    pub skipped: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "UploadReport::is_empty")]
    pub uploads: UploadReport,

    /// The call was cancelled; every set is empty.
    #[serde(default)]
    pub cancelled: bool,
}

impl ExecutionReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The inert report every stage resolves to once the token fires.
    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Self::default()
        }
    }

    /// Fold the in-page routine's outcome into this report.
    pub fn absorb(&mut self, outcome: AssignmentOutcome) {
        self.success.extend(outcome.success);
        self.failed.extend(outcome.failed);
        self.skipped.extend(outcome.skipped);
    }

    pub fn all_succeeded(&self) -> bool {
        !self.cancelled && self.failed.is_empty() && self.uploads.failed.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.success.is_empty()
            && self.failed.is_empty()
            && self.skipped.is_empty()
            && self.uploads.is_empty()
    }
}
