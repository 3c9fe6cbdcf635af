use serde_json::Value;
use tracing::{info, warn};

use crate::error::AutofillError;
use crate::fill::apply::ApplyOptions;
use crate::fill::resource::ResourceReference;
use crate::host::memory::MemoryPage;
use crate::host::session::HostSession;
use crate::mapping::assignment::AssignmentMap;
use crate::mapping::collaborator::HttpMapper;
use crate::report::console::{format_console_report, format_field_model};
use crate::report::report_model::ExecutionReport;
use crate::trace::logger::TraceLogger;
use crate::{Autofiller, CancellationToken, extract};

// ============================================================================
// extract subcommand
// ============================================================================

/// Render the field model of a saved page as `json` or `console` text.
pub fn cmd_extract(html_path: &str, format: &str) -> Result<String, Box<dyn std::error::Error>> {
    let markup = std::fs::read_to_string(html_path)?;
    let model = extract(&markup);
    info!(path = html_path, fields = model.len(), "extracted field model");

    let output = match format {
        "console" => format_field_model(&model),
        _ => serde_json::to_string_pretty(&model)?,
    };
    Ok(output)
}

// ============================================================================
// apply subcommand
// ============================================================================

/// Apply an assignment file to an in-process copy of a saved page.
pub async fn cmd_apply(
    html_path: &str,
    assignments_path: &str,
    attach: Option<&str>,
    options: ApplyOptions,
    tracer: Option<TraceLogger>,
) -> Result<ExecutionReport, Box<dyn std::error::Error>> {
    let markup = std::fs::read_to_string(html_path)?;
    let assignments = load_assignments(assignments_path)?;
    let resource = attach.map(ResourceReference::new);

    let page = MemoryPage::new(&markup);
    let filler = with_tracer(Autofiller::new(&page).with_options(options), tracer);

    let token = CancellationToken::new();
    let report = filler.apply(&token, &assignments, resource.as_ref()).await?;
    Ok(report)
}

// ============================================================================
// fill subcommand
// ============================================================================

/// Where the assignments for a live fill come from.
pub enum FillSource<'a> {
    /// A ready-made assignment file.
    Assignments(&'a str),
    /// A resume file handed to the mapping service with the page's fields.
    Resume { path: &'a str, endpoint: &'a str },
}

/// Fill the active page of a live browser. Ctrl-C cancels the run.
pub async fn cmd_fill(
    source: FillSource<'_>,
    host_script: &str,
    attach: Option<&str>,
    options: ApplyOptions,
    tracer: Option<TraceLogger>,
) -> Result<ExecutionReport, Box<dyn std::error::Error>> {
    let resource = attach.map(ResourceReference::new);
    let session = HostSession::launch(host_script).await?;
    let filler = with_tracer(Autofiller::new(&session).with_options(options), tracer);

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling autofill");
            interrupt.cancel();
        }
    });

    let result: Result<ExecutionReport, Box<dyn std::error::Error>> = match source {
        FillSource::Assignments(path) => match load_assignments(path) {
            Ok(assignments) => filler
                .apply(&token, &assignments, resource.as_ref())
                .await
                .map_err(Into::into),
            Err(e) => Err(e),
        },
        FillSource::Resume { path, endpoint } => match load_resume(path) {
            Ok(resume) => {
                let mapper = HttpMapper::new(endpoint);
                filler
                    .run(&token, &mapper, &resume, resource.as_ref())
                    .await
                    .map_err(Into::into)
            }
            Err(e) => Err(e),
        },
    };

    session.quit().await?;
    result
}

// ============================================================================
// Shared helpers
// ============================================================================

pub fn print_report(report: &ExecutionReport) {
    print!("{}", format_console_report(report));
}

fn with_tracer<'a>(filler: Autofiller<'a>, tracer: Option<TraceLogger>) -> Autofiller<'a> {
    match tracer {
        Some(tracer) => filler.with_tracer(tracer),
        None => filler,
    }
}

pub fn load_assignments(path: &str) -> Result<AssignmentMap, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    Ok(AssignmentMap::from_json_str(&content)?)
}

pub fn load_resume(path: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        AutofillError::JsonParse {
            context: format!("resume {}", path),
            source: e,
        }
        .into()
    })
}
