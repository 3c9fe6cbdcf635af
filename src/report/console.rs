use crate::report::report_model::ExecutionReport;
use crate::scan::field_model::FieldModel;

// ============================================================================
// Console reporter: formatted terminal output
// ============================================================================

/// Format an execution report for terminal output.
///
/// Produces output like:
/// ```text
/// === Autofill Report ===
///
/// ✓ FILLED   input[name="firstName"]
/// ✗ FAILED   #missing
/// - SKIPPED  #resume
///
/// Uploads: 1 attached, 0 failed
///
/// === Results: 1 filled, 1 failed, 1 skipped ===
/// ```
pub fn format_console_report(report: &ExecutionReport) -> String {
    let mut out = String::new();

    out.push_str("=== Autofill Report ===\n\n");

    if report.cancelled {
        out.push_str("(cancelled, nothing applied)\n");
    }

    for selector in &report.success {
        out.push_str(&format!("\u{2713} FILLED   {}\n", selector));
    }
    for selector in &report.failed {
        out.push_str(&format!("\u{2717} FAILED   {}\n", selector));
    }
    for selector in &report.skipped {
        out.push_str(&format!("- SKIPPED  {}\n", selector));
    }

    if !report.uploads.is_empty() {
        out.push_str(&format!(
            "\nUploads: {} attached, {} failed\n",
            report.uploads.attached.len(),
            report.uploads.failed.len()
        ));
        if let Some(ref error) = report.uploads.fetch_error {
            out.push_str(&format!("    [ERROR] {}\n", error));
        }
    }

    out.push_str(&format!(
        "\n=== Results: {} filled, {} failed, {} skipped ===\n",
        report.success.len(),
        report.failed.len(),
        report.skipped.len()
    ));

    out
}

/// One line per scanned control: kind, selector, and label.
pub fn format_field_model(model: &FieldModel) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "=== Fields: {} inputs, {} selects, {} textareas ({} forms) ===\n\n",
        model.inputs.len(),
        model.selects.len(),
        model.textareas.len(),
        model.forms.len()
    ));

    for field in model.fields() {
        let label = if field.label.is_empty() {
            "(no label)"
        } else {
            &field.label
        };
        out.push_str(&format!(
            "[{:<8}] {:<40} {}\n",
            field.control_type, field.selector, label
        ));
    }

    out
}
