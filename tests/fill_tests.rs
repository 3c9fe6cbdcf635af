use async_trait::async_trait;
use serde_json::{Value, json};

use page_autofill::{
    Autofiller, CancellationToken, extract,
    error::AutofillError,
    fill::{
        apply::{ApplyOptions, apply_assignments},
        resource::{DefaultFetcher, ResourceFetcher, ResourceReference, mime_for},
        upload::{DOCUMENT_ACCEPT_QUERY, FILE_INPUT_QUERY, count_in_markup, detect_file_targets},
    },
    host::{
        capability::{ExecutionHost, PageHandle, select_executor},
        memory::MemoryPage,
    },
    mapping::{
        assignment::AssignmentMap,
        collaborator::{MappingCollaborator, StaticMapper},
    },
    scan::field_model::AutofillMap,
};

use crate::common::utils::{FailingFetcher, RecordingHost, StaticFetcher, fixture, page};

mod common;

// =========================================================================
// Helpers
// =========================================================================

fn application_page() -> MemoryPage {
    MemoryPage::new(&fixture("application_form.html"))
}

fn scenario_map() -> AssignmentMap {
    [("#firstName", "Ada"), ("#countryId", "us")]
        .into_iter()
        .collect()
}

/// Cancels the shared token while "thinking", then answers.
struct CancellingMapper {
    token: CancellationToken,
    answer: AssignmentMap,
}

#[async_trait]
impl MappingCollaborator for CancellingMapper {
    async fn map(&self, _resume: &Value, _fields: &AutofillMap) -> Result<AssignmentMap, AutofillError> {
        self.token.cancel();
        Ok(self.answer.clone())
    }
}

/// Fails the test if it is ever consulted.
struct UnreachableMapper;

#[async_trait]
impl MappingCollaborator for UnreachableMapper {
    async fn map(&self, _resume: &Value, _fields: &AutofillMap) -> Result<AssignmentMap, AutofillError> {
        panic!("mapper must not be called");
    }
}

/// Records the field summary it was given.
struct InspectingMapper {
    seen: std::sync::Mutex<Option<AutofillMap>>,
    answer: AssignmentMap,
}

#[async_trait]
impl MappingCollaborator for InspectingMapper {
    async fn map(&self, _resume: &Value, fields: &AutofillMap) -> Result<AssignmentMap, AutofillError> {
        *self.seen.lock().unwrap() = Some(fields.clone());
        Ok(self.answer.clone())
    }
}

/// Host whose page lookup either fails with a diagnostic or, after
/// cancelling the caller's token, reports no page.
struct LookupHost {
    failure: Option<String>,
    cancel: Option<CancellationToken>,
}

#[async_trait]
impl ExecutionHost for LookupHost {
    async fn active_page(&self) -> Result<Option<PageHandle>, AutofillError> {
        if let Some(token) = &self.cancel {
            token.cancel();
        }
        match &self.failure {
            Some(message) => Err(AutofillError::HostExecution(message.clone())),
            None => Ok(None),
        }
    }
}

// =========================================================================
// End-to-end scenario
// =========================================================================

#[tokio::test]
async fn test_first_name_and_country_are_filled() {
    let page = application_page();
    let filler = Autofiller::new(&page);
    let token = CancellationToken::new();

    let report = filler.apply(&token, &scenario_map(), None).await.unwrap();

    assert_eq!(
        report.success.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["#countryId", "#firstName"]
    );
    assert!(report.failed.is_empty());
    assert!(report.skipped.is_empty());
    assert!(report.all_succeeded());

    assert_eq!(page.value_of("#firstName").as_deref(), Some("Ada"));
    assert_eq!(page.value_of("#countryId").as_deref(), Some("us"));
    assert_eq!(page.selected_option("#countryId").as_deref(), Some("us"));

    let country_events: Vec<&str> = page
        .events()
        .iter()
        .filter(|e| e.selector == "#countryId")
        .map(|e| e.event)
        .collect();
    assert_eq!(country_events, vec!["input", "change"]);
}

#[tokio::test]
async fn test_name_form_selectors_fill_input_and_select() {
    let markup = r#"<form>
        <input name="firstName">
        <select name="countryId"><option value="US">United States</option></select>
    </form>"#;
    let page = MemoryPage::new(markup);
    let filler = Autofiller::new(&page);
    let token = CancellationToken::new();

    let map: AssignmentMap = [
        (r#"input[name="firstName"]"#, "John"),
        (r#"select[name="countryId"]"#, "US"),
    ]
    .into_iter()
    .collect();
    let report = filler.apply(&token, &map, None).await.unwrap();

    assert_eq!(
        report.success.iter().map(String::as_str).collect::<Vec<_>>(),
        vec![r#"input[name="firstName"]"#, r#"select[name="countryId"]"#]
    );
    assert!(report.failed.is_empty());
    assert!(report.skipped.is_empty());

    assert_eq!(
        page.value_of(r#"input[name="firstName"]"#).as_deref(),
        Some("John")
    );
    assert_eq!(
        page.selected_option(r#"select[name="countryId"]"#).as_deref(),
        Some("US")
    );

    // The synthesized selectors are exactly the ones the map used.
    let model = extract(markup);
    assert!(model.autofill_map.contains_key(r#"input[name="firstName"]"#));
    assert!(model.autofill_map.contains_key(r#"select[name="countryId"]"#));
}

#[tokio::test]
async fn test_run_chains_snapshot_mapping_and_apply() {
    let page = application_page();
    let filler = Autofiller::new(&page);
    let token = CancellationToken::new();
    let mapper = InspectingMapper {
        seen: std::sync::Mutex::new(None),
        answer: scenario_map(),
    };
    let resume = json!({"firstName": "Ada", "country": "United States"});

    let report = filler.run(&token, &mapper, &resume, None).await.unwrap();

    assert_eq!(report.success.len(), 2);
    let seen = mapper.seen.lock().unwrap().clone().unwrap();
    assert!(seen.contains_key("#firstName"));
    assert!(seen.contains_key("#countryId"));
    assert_eq!(seen.len(), 13);
}

#[tokio::test]
async fn test_unchanged_page_fails_the_same_way_twice() {
    let page = application_page();
    let filler = Autofiller::new(&page);
    let token = CancellationToken::new();

    let mut map = scenario_map();
    map.insert_text("#doesNotExist", "x");
    map.insert_text("form#application > div > input:nth-of-type(7)", "y");

    let first = filler.apply(&token, &map, None).await.unwrap();
    let second = filler.apply(&token, &map, None).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.failed.len(), 2);
    assert!(first.failed.contains("#doesNotExist"));
    assert_eq!(first.success.len(), 2);
    assert_eq!(page.value_of("#firstName").as_deref(), Some("Ada"));
}

// =========================================================================
// Value path rules
// =========================================================================

#[tokio::test]
async fn test_file_controls_never_take_text_values() {
    let page = application_page();
    let filler = Autofiller::new(&page);
    let token = CancellationToken::new();

    let mut map = AssignmentMap::new();
    map.insert_text("#resume", "C:\\fakepath\\cv.pdf");
    map.insert_file("#resumeUpload", "cv.pdf");

    let report = filler.apply(&token, &map, None).await.unwrap();

    assert!(report.success.is_empty());
    assert!(report.failed.is_empty());
    assert!(report.skipped.contains("#resume"));
    assert!(report.skipped.contains("#resumeUpload"));
    assert_eq!(page.mutation_count(), 0);
}

#[tokio::test]
async fn test_invalid_keys_fail_without_reaching_the_page() {
    let host = RecordingHost::new(&fixture("application_form.html"), true, false);
    let filler = Autofiller::new(&host);
    let token = CancellationToken::new();

    let mut map = AssignmentMap::new();
    map.insert_text("", "empty");
    map.insert_text("input[[[", "broken");
    map.insert_text("#first\nName", "control char");
    map.insert_text("#".repeat(3000), "too long");

    let report = filler.apply(&token, &map, None).await.unwrap();

    assert_eq!(report.failed.len(), 4);
    assert!(report.success.is_empty());
    assert!(host.structured_calls().is_empty());
}

#[tokio::test]
async fn test_custom_question_ids_resolve_by_raw_identifier() {
    let page = application_page();
    let filler = Autofiller::new(&page);
    let token = CancellationToken::new();

    let map: AssignmentMap = [("#question_123[answer]", "Because")].into_iter().collect();
    let report = filler.apply(&token, &map, None).await.unwrap();

    assert!(report.success.contains("#question_123[answer]"));
    assert_eq!(page.value_of("#question_123[answer]").as_deref(), Some("Because"));
}

#[tokio::test]
async fn test_custom_question_prefix_is_configurable() {
    let page = MemoryPage::new(r#"<form><input id="custom_9[x]"></form>"#);
    let filler = Autofiller::new(&page).with_options(ApplyOptions {
        custom_question_prefix: "#custom_".into(),
    });
    let token = CancellationToken::new();

    let map: AssignmentMap = [("#custom_9[x]", "yes")].into_iter().collect();
    let report = filler.apply(&token, &map, None).await.unwrap();

    assert!(report.success.contains("#custom_9[x]"));
}

#[tokio::test]
async fn test_identifier_form_falls_back_to_attribute_lookup() {
    let page = MemoryPage::new(&fixture("odd_ids.html"));
    let filler = Autofiller::new(&page);
    let token = CancellationToken::new();

    let map: AssignmentMap = [("#1st-name", "Grace")].into_iter().collect();
    let report = filler.apply(&token, &map, None).await.unwrap();

    assert!(report.success.contains("#1st-name"));
    assert_eq!(page.value_of("#1st-name").as_deref(), Some("Grace"));
}

#[tokio::test]
async fn test_escaped_dotted_id_does_not_hit_lookalike_control() {
    let page = MemoryPage::new(&fixture("odd_ids.html"));
    let filler = Autofiller::new(&page);
    let token = CancellationToken::new();

    let model = extract(&fixture("odd_ids.html"));
    let email = model
        .fields()
        .find(|f| f.control_type == "email")
        .map(|f| f.selector.clone())
        .unwrap();
    let anchored = model
        .fields()
        .find(|f| f.selector.starts_with("div#"))
        .map(|f| f.selector.clone())
        .unwrap();

    let map: AssignmentMap = [(email.as_str(), "g@example.com"), (anchored.as_str(), "deep")]
        .into_iter()
        .collect();
    let report = filler.apply(&token, &map, None).await.unwrap();

    assert!(report.failed.is_empty(), "{:?}", report.failed);
    assert_eq!(report.success.len(), 2);
    assert_eq!(page.value_of(r"#user\.email").as_deref(), Some("g@example.com"));
    assert_eq!(page.value_of(r"div#main\:content input").as_deref(), Some("deep"));
    assert_eq!(page.value_of("#user").as_deref(), Some(""));
}

#[tokio::test]
async fn test_select_value_without_matching_option_still_succeeds() {
    let page = application_page();
    let filler = Autofiller::new(&page);
    let token = CancellationToken::new();

    let map: AssignmentMap = [("#countryId", "fr")].into_iter().collect();
    let report = filler.apply(&token, &map, None).await.unwrap();

    assert!(report.success.contains("#countryId"));
    assert_eq!(page.selected_option("#countryId"), None);
}

#[tokio::test]
async fn test_apply_function_reports_through_executor() {
    let page = application_page();
    let executor = select_executor(&page).unwrap();
    let handle = page.active_page().await.unwrap().unwrap();
    let token = CancellationToken::new();

    let report = apply_assignments(
        executor.as_ref(),
        &handle,
        &token,
        &scenario_map(),
        &ApplyOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(report.success.len(), 2);
    assert!(report.uploads.is_empty());
}

// =========================================================================
// Cancellation
// =========================================================================

#[tokio::test]
async fn test_cancel_before_start_is_inert() {
    let page = application_page();
    let filler = Autofiller::new(&page);
    let token = CancellationToken::new();
    token.cancel();

    let report = filler
        .run(&token, &UnreachableMapper, &json!({}), None)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(report.is_empty());
    assert_eq!(page.mutation_count(), 0);
    assert!(filler.snapshot(&token).await.unwrap().is_none());
}

#[tokio::test]
async fn test_cancel_during_mapping_skips_apply() {
    let page = application_page();
    let filler = Autofiller::new(&page);
    let token = CancellationToken::new();
    let mapper = CancellingMapper {
        token: token.clone(),
        answer: scenario_map(),
    };

    let report = filler
        .run(&token, &mapper, &json!({}), Some(&ResourceReference::new("cv.pdf")))
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(report.success.is_empty());
    assert!(report.uploads.is_empty());
    assert_eq!(page.mutation_count(), 0);
    assert!(page.events().is_empty());
}

#[tokio::test]
async fn test_cancelled_apply_touches_nothing() {
    let page = application_page();
    let filler = Autofiller::new(&page).with_fetcher(Box::new(StaticFetcher::new(b"%PDF")));
    let token = CancellationToken::new();
    token.cancel();

    let report = filler
        .apply(&token, &scenario_map(), Some(&ResourceReference::new("cv.pdf")))
        .await
        .unwrap();

    assert_eq!(report, page_autofill::report::report_model::ExecutionReport::cancelled());
    assert_eq!(page.mutation_count(), 0);
}

// =========================================================================
// Adapter-level errors
// =========================================================================

#[tokio::test]
async fn test_no_active_page_is_fatal() {
    let page = MemoryPage::without_active_page(&fixture("application_form.html"));
    let filler = Autofiller::new(&page);
    let token = CancellationToken::new();

    let err = filler.apply(&token, &scenario_map(), None).await.unwrap_err();
    assert!(matches!(err, AutofillError::NoActivePage));
    assert!(err.is_fatal());
    assert_eq!(err.to_string(), "No active page context found");
}

#[tokio::test]
async fn test_failed_page_lookup_keeps_host_diagnostic() {
    let host = LookupHost {
        failure: Some("browser connection lost".into()),
        cancel: None,
    };
    let filler = Autofiller::new(&host);
    let token = CancellationToken::new();

    let err = filler.apply(&token, &scenario_map(), None).await.unwrap_err();
    assert!(matches!(err, AutofillError::HostExecution(ref m) if m == "browser connection lost"));
    assert!(err.is_fatal());

    let err = filler.snapshot(&token).await.unwrap_err();
    assert!(matches!(err, AutofillError::HostExecution(_)));
}

#[tokio::test]
async fn test_cancel_during_page_lookup_wins_over_missing_page() {
    let token = CancellationToken::new();
    let host = LookupHost {
        failure: None,
        cancel: Some(token.clone()),
    };
    let filler = Autofiller::new(&host);

    let report = filler.apply(&token, &scenario_map(), None).await.unwrap();
    assert!(report.cancelled);
    assert!(report.is_empty());
}

#[tokio::test]
async fn test_host_without_capabilities_fails_apply() {
    let host = RecordingHost::new(&fixture("application_form.html"), false, false);
    let filler = Autofiller::new(&host);
    let token = CancellationToken::new();

    let err = filler.apply(&token, &scenario_map(), None).await.unwrap_err();
    assert!(matches!(err, AutofillError::HostExecution(_)));
}

#[tokio::test]
async fn test_page_without_fields_never_reaches_mapper() {
    let page = MemoryPage::new(&fixture("no_fields.html"));
    let filler = Autofiller::new(&page);
    let token = CancellationToken::new();

    let err = filler
        .run(&token, &UnreachableMapper, &json!({}), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AutofillError::NoFieldsDetected));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_garbled_legacy_result_is_a_host_error() {
    let host = RecordingHost::new(&fixture("application_form.html"), false, true)
        .respond("apply_assignments", json!("not an outcome"));
    let filler = Autofiller::new(&host);
    let token = CancellationToken::new();

    let err = filler.apply(&token, &scenario_map(), None).await.unwrap_err();
    assert!(matches!(err, AutofillError::HostExecution(_)));
}

#[tokio::test]
async fn test_legacy_host_report_is_passed_through() {
    let host = RecordingHost::new(&fixture("application_form.html"), false, true).respond(
        "apply_assignments",
        json!({"success": ["#firstName"], "failed": ["#countryId"], "skipped": []}),
    );
    let filler = Autofiller::new(&host);
    let token = CancellationToken::new();

    let report = filler.apply(&token, &scenario_map(), None).await.unwrap();

    assert!(report.success.contains("#firstName"));
    assert!(report.failed.contains("#countryId"));
    let sources = host.legacy_sources();
    assert_eq!(sources.len(), 1);
    assert!(sources[0].contains(r##""#firstName":"Ada""##));
}

// =========================================================================
// File upload
// =========================================================================

#[test]
fn test_mime_types_by_extension() {
    assert_eq!(mime_for("cv.pdf"), "application/pdf");
    assert_eq!(mime_for("CV.PDF"), "application/pdf");
    assert_eq!(
        mime_for("cv.docx"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    );
    assert_eq!(mime_for("cv.doc"), "application/msword");
    assert_eq!(mime_for("cv.txt"), "application/octet-stream");
    assert_eq!(mime_for("cv"), "application/octet-stream");
}

#[test]
fn test_resource_names() {
    assert_eq!(ResourceReference::new("https://cdn.example.com/u/7/cv.pdf?sig=abc").name(), "cv.pdf");
    assert_eq!(ResourceReference::new("/home/ada/resume.docx").name(), "resume.docx");
    assert_eq!(ResourceReference::new("https://example.com/").name(), "example.com");
    assert_eq!(ResourceReference::new("").name(), "document");
    assert_eq!(
        ResourceReference::new("https://x/blob/123").with_name("Ada.pdf").mime_type(),
        "application/pdf"
    );
}

#[tokio::test]
async fn test_resume_is_attached_before_values() {
    let page = application_page();
    let fetcher = StaticFetcher::new(b"%PDF-1.4 body");
    let filler = Autofiller::new(&page).with_fetcher(Box::new(fetcher));
    let token = CancellationToken::new();

    let resource = ResourceReference::new("https://files.example.com/ada/cv.pdf");
    let report = filler.apply(&token, &scenario_map(), Some(&resource)).await.unwrap();

    assert_eq!(report.uploads.attached, vec![format!("{}[0]", FILE_INPUT_QUERY)]);
    assert!(report.uploads.failed.is_empty());
    assert_eq!(report.success.len(), 2);

    let files = page.files_of("#resume");
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "cv.pdf");
    assert_eq!(files[0].mime_type, "application/pdf");
    assert_eq!(files[0].bytes, b"%PDF-1.4 body");

    let first_event = &page.events()[0];
    assert_eq!(first_event.event, "change");
    assert!(first_event.selector.starts_with(FILE_INPUT_QUERY));
}

#[tokio::test]
async fn test_detection_broadens_to_accept_attribute() {
    let page = MemoryPage::new(&fixture("accept_only.html"));
    let filler = Autofiller::new(&page).with_fetcher(Box::new(StaticFetcher::new(b"doc")));
    let token = CancellationToken::new();

    let report = filler
        .apply(&token, &AssignmentMap::new(), Some(&ResourceReference::new("cv.doc")))
        .await
        .unwrap();

    assert_eq!(report.uploads.attached, vec![format!("{}[0]", DOCUMENT_ACCEPT_QUERY)]);
    let files = page.files_of(r#"input[name="cv"]"#);
    assert_eq!(files[0].mime_type, "application/msword");
    assert!(page.files_of(r#"input[name="city"]"#).is_empty());
}

#[tokio::test]
async fn test_no_file_controls_skips_the_fetch() {
    let page = MemoryPage::new(r#"<form><input name="city"></form>"#);
    let filler = Autofiller::new(&page).with_fetcher(Box::new(FailingFetcher));
    let token = CancellationToken::new();

    let map: AssignmentMap = [(r#"input[name="city"]"#, "Berlin")].into_iter().collect();
    let report = filler
        .apply(&token, &map, Some(&ResourceReference::new("cv.pdf")))
        .await
        .unwrap();

    assert!(report.uploads.is_empty());
    assert_eq!(report.success.len(), 1);
}

#[tokio::test]
async fn test_fetch_failure_is_absorbed() {
    let page = application_page();
    let filler = Autofiller::new(&page).with_fetcher(Box::new(FailingFetcher));
    let token = CancellationToken::new();

    let report = filler
        .apply(&token, &scenario_map(), Some(&ResourceReference::new("https://down.example.com/cv.pdf")))
        .await
        .unwrap();

    let error = report.uploads.fetch_error.as_deref().unwrap();
    assert!(error.contains("connection refused"));
    assert!(report.uploads.attached.is_empty());
    assert!(page.files_of("#resume").is_empty());
    assert_eq!(report.success.len(), 2);
}

#[tokio::test]
async fn test_legacy_detection_counts_in_snapshot() {
    let host = RecordingHost::new(&fixture("application_form.html"), false, true)
        .respond("attach_file", json!({"ok": true}))
        .respond("apply_assignments", json!({"success": [], "failed": [], "skipped": []}));
    let executor = select_executor(&host).unwrap();
    let handle = host.active_page().await.unwrap().unwrap();

    let targets = detect_file_targets(executor.as_ref(), &handle).await.unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].query, FILE_INPUT_QUERY);
    assert_eq!(targets[0].index, 0);

    let names: Vec<String> = host
        .legacy_sources()
        .iter()
        .map(|s| common::utils::legacy_routine_name(s))
        .collect();
    assert_eq!(names, vec!["capture_markup"]);
}

#[tokio::test]
async fn test_rejected_attach_is_recorded_as_failed() {
    let host = RecordingHost::new(&fixture("application_form.html"), false, true)
        .respond("attach_file", json!({"ok": false, "error": "DataTransfer unsupported"}))
        .respond("apply_assignments", json!({"success": ["#firstName"], "failed": [], "skipped": []}));
    let filler = Autofiller::new(&host).with_fetcher(Box::new(StaticFetcher::new(b"%PDF")));
    let token = CancellationToken::new();

    let report = filler
        .apply(&token, &scenario_map(), Some(&ResourceReference::new("cv.pdf")))
        .await
        .unwrap();

    assert!(report.uploads.attached.is_empty());
    assert_eq!(report.uploads.failed.len(), 1);
    assert!(report.success.contains("#firstName"));
    assert!(!report.all_succeeded());
}

#[test]
fn test_count_in_markup() {
    let markup = fixture("application_form.html");
    assert_eq!(count_in_markup(&markup, FILE_INPUT_QUERY), 1);
    assert_eq!(count_in_markup(&markup, DOCUMENT_ACCEPT_QUERY), 1);
    assert_eq!(count_in_markup(&markup, "input[[["), 0);
}

#[tokio::test]
async fn test_default_fetcher_reads_file_urls_and_paths() {
    let fetcher = DefaultFetcher::default();

    let from_url = fetcher
        .fetch(&ResourceReference::new(&page("resume.pdf")))
        .await
        .unwrap();
    assert!(from_url.starts_with(b"%PDF"));

    let path = common::utils::fixture_path("resume.pdf");
    let from_path = fetcher
        .fetch(&ResourceReference::new(&path.display().to_string()))
        .await
        .unwrap();
    assert_eq!(from_url, from_path);

    let missing = fetcher
        .fetch(&ResourceReference::new("/definitely/not/here.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(missing, AutofillError::ResourceFetch { .. }));
    assert!(!missing.is_fatal());
}

#[tokio::test]
async fn test_static_mapper_round_trip() {
    let page = application_page();
    let filler = Autofiller::new(&page);
    let token = CancellationToken::new();

    let mapper = StaticMapper::new(AssignmentMap::from_json_str(&fixture("assignments.json")).unwrap());
    let report = filler.run(&token, &mapper, &json!({}), None).await.unwrap();

    assert_eq!(report.success.len(), 2);
    assert!(report.skipped.contains("#resume"));
    assert!(report.failed.contains("#missing"));
}
