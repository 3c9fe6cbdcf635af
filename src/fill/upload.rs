use scraper::{Html, Selector};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::AutofillError;
use crate::fill::resource::{ResourceFetcher, ResourceReference};
use crate::host::capability::{InjectionMode, PageExecutor, PageHandle};
use crate::host::routine::{AttachOutcome, FilePayload, PageRoutine};
use crate::report::report_model::UploadReport;

pub const FILE_INPUT_QUERY: &str = r#"input[type="file"]"#;

/// Fallback for pages that hide the file input's type but advertise
/// document types in `accept`.
pub const DOCUMENT_ACCEPT_QUERY: &str =
    r#"input[accept*="pdf"], input[accept*="doc"], input[accept*="word"]"#;

/// The `index`-th element matching `query` in the live page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTarget {
    pub query: String,
    pub index: usize,
}

impl FileTarget {
    pub fn describe(&self) -> String {
        format!("{}[{}]", self.query, self.index)
    }
}

/// Find the file controls to attach to, broadening the query when the
/// strict one finds nothing.
pub async fn detect_file_targets(
    executor: &dyn PageExecutor,
    page: &PageHandle,
) -> Result<Vec<FileTarget>, AutofillError> {
    for query in [FILE_INPUT_QUERY, DOCUMENT_ACCEPT_QUERY] {
        let count = count_controls(executor, page, query).await?;
        if count > 0 {
            return Ok((0..count)
                .map(|index| FileTarget {
                    query: query.to_string(),
                    index,
                })
                .collect());
        }
    }
    Ok(vec![])
}

/// Structured hosts count in the page; legacy hosts count in a fresh snapshot.
async fn count_controls(
    executor: &dyn PageExecutor,
    page: &PageHandle,
    query: &str,
) -> Result<usize, AutofillError> {
    match executor.mode() {
        InjectionMode::Structured => {
            let routine = PageRoutine::CountControls {
                query: query.to_string(),
            };
            let value = executor.run(page, &routine).await?;
            Ok(value.as_u64().unwrap_or(0) as usize)
        }
        InjectionMode::Legacy => {
            let value = executor.run(page, &PageRoutine::CaptureMarkup).await?;
            Ok(value.as_str().map(|m| count_in_markup(m, query)).unwrap_or(0))
        }
    }
}

pub fn count_in_markup(markup: &str, query: &str) -> usize {
    let doc = Html::parse_document(markup);
    Selector::parse(query)
        .map(|sel| doc.select(&sel).count())
        .unwrap_or(0)
}

/// Attach `resource` to every detected file control, one at a time.
///
/// Nothing here is fatal to the caller: detection or fetch failures are
/// logged and recorded, and each control's attach attempt is independent.
/// Returns an empty report once `token` is cancelled.
pub async fn upload_resource(
    executor: &dyn PageExecutor,
    page: &PageHandle,
    token: &CancellationToken,
    fetcher: &dyn ResourceFetcher,
    resource: &ResourceReference,
) -> UploadReport {
    let mut report = UploadReport::default();
    if token.is_cancelled() {
        return report;
    }

    let targets = match detect_file_targets(executor, page).await {
        Ok(targets) => targets,
        Err(e) => {
            warn!(error = %e, "file control detection failed");
            return report;
        }
    };
    if token.is_cancelled() {
        return UploadReport::default();
    }
    if targets.is_empty() {
        info!("no file controls detected, skipping upload");
        return report;
    }

    let bytes = match fetcher.fetch(resource).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "resource fetch failed");
            report.fetch_error = Some(e.to_string());
            return report;
        }
    };
    if token.is_cancelled() {
        return UploadReport::default();
    }

    let payload = FilePayload::from_bytes(&resource.name(), resource.mime_type(), &bytes);

    for target in targets {
        let routine = PageRoutine::AttachFile {
            query: target.query.clone(),
            index: target.index,
            file: payload.clone(),
        };

        let result = executor.run(page, &routine).await.and_then(parse_attach);
        if token.is_cancelled() {
            return UploadReport::default();
        }

        match result {
            Ok(AttachOutcome { ok: true, .. }) => {
                info!(target = %target.describe(), file = %payload.name, "attached resource");
                report.attached.push(target.describe());
            }
            Ok(AttachOutcome { error, .. }) => {
                warn!(target = %target.describe(), error = ?error, "attach rejected by page");
                report.failed.push(target.describe());
            }
            Err(e) => {
                warn!(target = %target.describe(), error = %e, "attach failed");
                report.failed.push(target.describe());
            }
        }
    }

    report
}

fn parse_attach(value: Value) -> Result<AttachOutcome, AutofillError> {
    serde_json::from_value(value).map_err(|e| AutofillError::JsonParse {
        context: "attach_file result".into(),
        source: e,
    })
}
