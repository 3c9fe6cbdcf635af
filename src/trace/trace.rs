use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::report::report_model::ExecutionReport;
use crate::scan::field_model::FieldModel;

/// Pipeline step a trace line was written at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStage {
    Snapshot,
    Extract,
    Map,
    Upload,
    Apply,
    Cancelled,
}

#[derive(Debug, Serialize)]
pub struct TraceEvent {
    pub timestamp_ms: u128,
    pub stage: TraceStage,

    pub page: Option<String>,

    /// Number of controls in the extracted model.
    pub fields: Option<usize>,
    pub fingerprint: Option<String>,

    pub success: Vec<String>,
    pub failed: Vec<String>,

    pub detail: Option<String>,
}

impl TraceEvent {
    pub fn now(stage: TraceStage) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default(),
            stage,
            page: None,
            fields: None,
            fingerprint: None,
            success: vec![],
            failed: vec![],
            detail: None,
        }
    }

    pub fn with_page(mut self, page: impl ToString) -> Self {
        self.page = Some(page.to_string());
        self
    }

    pub fn with_model(mut self, model: &FieldModel) -> Self {
        self.fields = Some(model.len());
        self.fingerprint = Some(model.fingerprint());
        self
    }

    pub fn with_report(mut self, report: &ExecutionReport) -> Self {
        self.success = report.success.iter().cloned().collect();
        self.failed = report.failed.iter().cloned().collect();
        self
    }

    pub fn with_detail(mut self, detail: impl ToString) -> Self {
        self.detail = Some(detail.to_string());
        self
    }
}
