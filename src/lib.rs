use serde_json::Value;
use tracing::{debug, info};

use crate::{
    error::AutofillError,
    fill::{
        apply::{ApplyOptions, apply_assignments},
        resource::{DefaultFetcher, ResourceFetcher, ResourceReference},
        upload::upload_resource,
    },
    host::{
        capability::{ExecutionHost, PageHandle, select_executor},
        routine::PageRoutine,
    },
    mapping::{assignment::AssignmentMap, collaborator::MappingCollaborator},
    report::report_model::ExecutionReport,
    scan::field_model::FieldModel,
    trace::{
        logger::TraceLogger,
        trace::{TraceEvent, TraceStage},
    },
};

pub mod cli;
pub mod error;
pub mod fill;
pub mod host;
pub mod mapping;
pub mod report;
pub mod scan;
pub mod trace;

pub use tokio_util::sync::CancellationToken;

/// Scan a serialized page into its field model. Never fails; unusable
/// markup yields an empty model.
pub fn extract(snapshot: &str) -> FieldModel {
    scan::scanner::scan(snapshot)
}

/// Drives one page through snapshot, mapping, upload and assignment.
///
/// Every async step checks the caller's token after it resumes; once the
/// token fires the remaining steps are skipped and the caller receives
/// [`ExecutionReport::cancelled`] (or `None` from [`Autofiller::snapshot`]).
/// Concurrent `apply` calls on one instance run one after the other.
pub struct Autofiller<'a> {
    host: &'a dyn ExecutionHost,
    fetcher: Box<dyn ResourceFetcher>,
    options: ApplyOptions,
    tracer: Option<TraceLogger>,
    in_flight: tokio::sync::Mutex<()>,
}

impl<'a> Autofiller<'a> {
    pub fn new(host: &'a dyn ExecutionHost) -> Self {
        Self {
            host,
            fetcher: Box::new(DefaultFetcher::default()),
            options: ApplyOptions::default(),
            tracer: None,
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Box<dyn ResourceFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_options(mut self, options: ApplyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_tracer(mut self, tracer: TraceLogger) -> Self {
        self.tracer = Some(tracer);
        self
    }

    fn trace(&self, event: TraceEvent) {
        if let Some(tracer) = &self.tracer {
            tracer.log(&event);
        }
    }

    /// `Ok(None)` when the token fired during the lookup, whatever the
    /// host answered.
    async fn page(&self, token: &CancellationToken) -> Result<Option<PageHandle>, AutofillError> {
        let page = self.host.active_page().await;
        if token.is_cancelled() {
            return Ok(None);
        }
        page?.ok_or(AutofillError::NoActivePage).map(Some)
    }

    /// Serialized markup of the active page, or `None` once cancelled.
    pub async fn snapshot(&self, token: &CancellationToken) -> Result<Option<String>, AutofillError> {
        if token.is_cancelled() {
            return Ok(None);
        }
        let Some(page) = self.page(token).await? else {
            return Ok(None);
        };

        let executor = select_executor(self.host)?;
        let value = executor.run(&page, &PageRoutine::CaptureMarkup).await?;
        if token.is_cancelled() {
            return Ok(None);
        }

        let markup = value
            .as_str()
            .ok_or_else(|| AutofillError::HostExecution("page snapshot was not a string".into()))?
            .to_string();

        debug!(page = %page, bytes = markup.len(), "captured page snapshot");
        self.trace(
            TraceEvent::now(TraceStage::Snapshot)
                .with_page(&page)
                .with_detail(format!("{} bytes", markup.len())),
        );
        Ok(Some(markup))
    }

    /// Upload `resource` to the page's file controls (when given), then
    /// write every text assignment.
    pub async fn apply(
        &self,
        token: &CancellationToken,
        assignments: &AssignmentMap,
        resource: Option<&ResourceReference>,
    ) -> Result<ExecutionReport, AutofillError> {
        let _guard = self.in_flight.lock().await;

        if token.is_cancelled() {
            return Ok(self.cancelled());
        }
        let Some(page) = self.page(token).await? else {
            return Ok(self.cancelled());
        };
        let executor = select_executor(self.host)?;

        let uploads = match resource {
            Some(resource) => {
                let uploads =
                    upload_resource(executor.as_ref(), &page, token, self.fetcher.as_ref(), resource)
                        .await;
                if token.is_cancelled() {
                    return Ok(self.cancelled());
                }
                self.trace(
                    TraceEvent::now(TraceStage::Upload)
                        .with_page(&page)
                        .with_detail(format!(
                            "{} attached, {} failed",
                            uploads.attached.len(),
                            uploads.failed.len()
                        )),
                );
                uploads
            }
            None => Default::default(),
        };

        let mut report =
            apply_assignments(executor.as_ref(), &page, token, assignments, &self.options).await?;
        if report.cancelled {
            return Ok(self.cancelled());
        }
        report.uploads = uploads;

        self.trace(
            TraceEvent::now(TraceStage::Apply)
                .with_page(&page)
                .with_report(&report),
        );
        Ok(report)
    }

    /// Full pipeline: snapshot, extract, ask `mapper` for assignments, apply.
    ///
    /// A page without fillable controls ends with
    /// [`AutofillError::NoFieldsDetected`] before the mapper is consulted.
    pub async fn run(
        &self,
        token: &CancellationToken,
        mapper: &dyn MappingCollaborator,
        resume: &Value,
        resource: Option<&ResourceReference>,
    ) -> Result<ExecutionReport, AutofillError> {
        let Some(markup) = self.snapshot(token).await? else {
            return Ok(self.cancelled());
        };

        let model = extract(&markup);
        self.trace(TraceEvent::now(TraceStage::Extract).with_model(&model));
        if model.is_empty() {
            return Err(AutofillError::NoFieldsDetected);
        }
        info!(fields = model.len(), "page scanned");

        if token.is_cancelled() {
            return Ok(self.cancelled());
        }
        let assignments = mapper.map(resume, &model.autofill_map).await?;
        if token.is_cancelled() {
            return Ok(self.cancelled());
        }
        self.trace(
            TraceEvent::now(TraceStage::Map)
                .with_detail(format!("{} assignments", assignments.len())),
        );

        self.apply(token, &assignments, resource).await
    }

    fn cancelled(&self) -> ExecutionReport {
        info!("autofill cancelled");
        self.trace(TraceEvent::now(TraceStage::Cancelled));
        ExecutionReport::cancelled()
    }
}
