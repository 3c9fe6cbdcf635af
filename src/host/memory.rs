use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Value, json};

use crate::error::AutofillError;
use crate::host::capability::{ExecutionHost, PageHandle, StructuredInjection};
use crate::host::routine::{AssignmentOutcome, AttachOutcome, FilePayload, PageRoutine};
use crate::scan::locate::{element_ordinal, locate};

/// An event the page would have seen dispatched on a control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedEvent {
    pub selector: String,
    pub event: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct PageState {
    values: HashMap<usize, String>,
    selected_options: HashMap<usize, String>,
    files: HashMap<usize, Vec<AttachedFile>>,
    events: Vec<DispatchedEvent>,
    mutations: usize,
}

/// An in-process stand-in for a live page.
///
/// Holds the page markup and a table of control state keyed by element
/// position. Routines are interpreted natively against a fresh parse of the
/// markup, following the same resolution rules as the injected scripts.
/// Offers the structured capability only.
pub struct MemoryPage {
    markup: String,
    handle: Option<PageHandle>,
    state: Mutex<PageState>,
}

impl MemoryPage {
    pub fn new(markup: &str) -> Self {
        Self {
            markup: markup.to_string(),
            handle: Some(PageHandle("memory:1".into())),
            state: Mutex::new(PageState::default()),
        }
    }

    /// A host with no page in focus.
    pub fn without_active_page(markup: &str) -> Self {
        Self {
            handle: None,
            ..Self::new(markup)
        }
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// Current value of the control `selector` resolves to, falling back to
    /// what the markup declares when nothing assigned it yet.
    pub fn value_of(&self, selector: &str) -> Option<String> {
        let doc = Html::parse_document(&self.markup);
        let (el, _) = locate(&doc, selector, "")?;
        let ordinal = element_ordinal(&doc, el)?;
        let state = self.lock();
        if let Some(value) = state.values.get(&ordinal) {
            return Some(value.clone());
        }
        Some(initial_value(el))
    }

    pub fn selected_option(&self, selector: &str) -> Option<String> {
        let doc = Html::parse_document(&self.markup);
        let (el, _) = locate(&doc, selector, "")?;
        let ordinal = element_ordinal(&doc, el)?;
        self.lock().selected_options.get(&ordinal).cloned()
    }

    pub fn files_of(&self, selector: &str) -> Vec<AttachedFile> {
        let doc = Html::parse_document(&self.markup);
        let Some((el, _)) = locate(&doc, selector, "") else {
            return vec![];
        };
        let Some(ordinal) = element_ordinal(&doc, el) else {
            return vec![];
        };
        self.lock().files.get(&ordinal).cloned().unwrap_or_default()
    }

    pub fn events(&self) -> Vec<DispatchedEvent> {
        self.lock().events.clone()
    }

    /// Number of control mutations (value or file assignments) so far.
    pub fn mutation_count(&self) -> usize {
        self.lock().mutations
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn run(&self, routine: &PageRoutine) -> Result<Value, AutofillError> {
        match routine {
            PageRoutine::CaptureMarkup => Ok(Value::String(self.markup.clone())),
            PageRoutine::ApplyAssignments {
                assignments,
                custom_question_prefix,
            } => {
                let outcome = self.apply(assignments, custom_question_prefix);
                serde_json::to_value(outcome).map_err(|e| AutofillError::JsonParse {
                    context: "apply_assignments outcome".into(),
                    source: e,
                })
            }
            PageRoutine::CountControls { query } => {
                let doc = Html::parse_document(&self.markup);
                let count = Selector::parse(query)
                    .map(|sel| doc.select(&sel).count())
                    .unwrap_or(0);
                Ok(json!(count))
            }
            PageRoutine::AttachFile { query, index, file } => {
                let outcome = self.attach(query, *index, file);
                serde_json::to_value(outcome).map_err(|e| AutofillError::JsonParse {
                    context: "attach_file outcome".into(),
                    source: e,
                })
            }
        }
    }

    fn apply<'m>(
        &self,
        assignments: impl IntoIterator<Item = (&'m String, &'m String)>,
        custom_question_prefix: &str,
    ) -> AssignmentOutcome {
        let doc = Html::parse_document(&self.markup);
        let mut outcome = AssignmentOutcome::default();
        let mut state = self.lock();

        for (selector, value) in assignments {
            let Some((el, _)) = locate(&doc, selector, custom_question_prefix) else {
                outcome.failed.push(selector.clone());
                continue;
            };
            let Some(ordinal) = element_ordinal(&doc, el) else {
                outcome.failed.push(selector.clone());
                continue;
            };

            if runtime_type(el) == "file" {
                outcome.skipped.push(selector.clone());
                continue;
            }

            state.values.insert(ordinal, value.clone());
            state.mutations += 1;
            if el.value().name() == "select" && has_option_value(el, value) {
                state.selected_options.insert(ordinal, value.clone());
            }
            for event in ["input", "change"] {
                state.events.push(DispatchedEvent {
                    selector: selector.clone(),
                    event,
                });
            }
            outcome.success.push(selector.clone());
        }

        outcome
    }

    fn attach(&self, query: &str, index: usize, file: &FilePayload) -> AttachOutcome {
        let doc = Html::parse_document(&self.markup);
        let target = Selector::parse(query)
            .ok()
            .and_then(|sel| doc.select(&sel).nth(index))
            .and_then(|el| element_ordinal(&doc, el));

        let Some(ordinal) = target else {
            return AttachOutcome {
                ok: false,
                error: Some("file control not found".into()),
            };
        };

        let bytes = match file.decode() {
            Ok(bytes) => bytes,
            Err(e) => {
                return AttachOutcome {
                    ok: false,
                    error: Some(format!("invalid file payload: {}", e)),
                };
            }
        };

        let mut state = self.lock();
        state.files.insert(
            ordinal,
            vec![AttachedFile {
                name: file.name.clone(),
                mime_type: file.mime_type.clone(),
                bytes,
            }],
        );
        state.mutations += 1;
        state.events.push(DispatchedEvent {
            selector: format!("{}[{}]", query, index),
            event: "change",
        });

        AttachOutcome { ok: true, error: None }
    }
}

#[async_trait]
impl StructuredInjection for MemoryPage {
    async fn inject(&self, page: &PageHandle, routine: &PageRoutine) -> Result<Value, AutofillError> {
        if self.handle.as_ref() != Some(page) {
            return Err(AutofillError::HostExecution(format!(
                "no page with handle {}",
                page
            )));
        }
        self.run(routine)
    }
}

#[async_trait]
impl ExecutionHost for MemoryPage {
    async fn active_page(&self) -> Result<Option<PageHandle>, AutofillError> {
        Ok(self.handle.clone())
    }

    fn structured(&self) -> Option<&dyn StructuredInjection> {
        Some(self)
    }
}

/// The element's `type` property as the page would report it.
fn runtime_type(el: ElementRef<'_>) -> String {
    match el.value().name() {
        "input" => el
            .value()
            .attr("type")
            .filter(|t| !t.is_empty())
            .unwrap_or("text")
            .to_ascii_lowercase(),
        "select" if el.value().attr("multiple").is_some() => "select-multiple".into(),
        "select" => "select-one".into(),
        "textarea" => "textarea".into(),
        _ => String::new(),
    }
}

fn initial_value(el: ElementRef<'_>) -> String {
    match el.value().name() {
        "textarea" => el.text().collect(),
        "select" => el
            .descendants()
            .filter_map(ElementRef::wrap)
            .filter(|o| o.value().name() == "option")
            .find(|o| o.value().attr("selected").is_some())
            .map(option_value)
            .unwrap_or_default(),
        _ => el.value().attr("value").unwrap_or_default().to_string(),
    }
}

fn has_option_value(select: ElementRef<'_>, value: &str) -> bool {
    select
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|o| o.value().name() == "option")
        .any(|o| option_value(o) == value)
}

fn option_value(option: ElementRef<'_>) -> String {
    option
        .value()
        .attr("value")
        .map(str::to_string)
        .unwrap_or_else(|| {
            let text: String = option.text().collect();
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        })
}
