use std::collections::BTreeMap;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{AutofillError, FieldError};
use crate::host::capability::{PageExecutor, PageHandle};
use crate::host::routine::{AssignmentOutcome, PageRoutine};
use crate::mapping::assignment::{AssignmentMap, AssignmentValue, validate_selector};
use crate::report::report_model::ExecutionReport;
use crate::scan::locate::DEFAULT_CUSTOM_QUESTION_PREFIX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Selectors starting with this prefix and carrying `[` or `]` are
    /// looked up by raw id, never parsed as CSS. Empty disables the rule.
    pub custom_question_prefix: String,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            custom_question_prefix: DEFAULT_CUSTOM_QUESTION_PREFIX.to_string(),
        }
    }
}

/// Write every text assignment into the live page in a single injection.
///
/// Keys that fail validation go straight to `failed` and file markers to
/// `skipped`; neither reaches the page. A cancelled token yields
/// [`ExecutionReport::cancelled`] without touching the page, or discards
/// the page's answer if it fires mid-flight.
pub async fn apply_assignments(
    executor: &dyn PageExecutor,
    page: &PageHandle,
    token: &CancellationToken,
    map: &AssignmentMap,
    options: &ApplyOptions,
) -> Result<ExecutionReport, AutofillError> {
    let mut report = ExecutionReport::new();
    let mut assignments = BTreeMap::new();

    for (selector, value) in map.iter() {
        if let Err(e) = validate_selector(selector) {
            warn!(error = %e, "rejecting assignment");
            report.failed.insert(selector.clone());
            continue;
        }
        match value {
            AssignmentValue::Text(text) => {
                assignments.insert(selector.clone(), text.clone());
            }
            AssignmentValue::File(marker) => {
                info!(selector = %selector, file = %marker.file, "file marker left to the upload path");
                report.skipped.insert(selector.clone());
            }
        }
    }

    if token.is_cancelled() {
        return Ok(ExecutionReport::cancelled());
    }

    if !assignments.is_empty() {
        let routine = PageRoutine::ApplyAssignments {
            assignments,
            custom_question_prefix: options.custom_question_prefix.clone(),
        };
        let value = executor.run(page, &routine).await?;

        if token.is_cancelled() {
            return Ok(ExecutionReport::cancelled());
        }

        let outcome = parse_outcome(value)?;
        for selector in &outcome.failed {
            let e = FieldError::ElementNotFound {
                selector: selector.clone(),
            };
            warn!("{}", e);
        }
        report.absorb(outcome);
    }

    info!(
        success = report.success.len(),
        failed = report.failed.len(),
        skipped = report.skipped.len(),
        "assignments applied"
    );

    Ok(report)
}

fn parse_outcome(value: Value) -> Result<AssignmentOutcome, AutofillError> {
    serde_json::from_value(value)
        .map_err(|e| AutofillError::HostExecution(format!("unexpected apply result: {}", e)))
}
