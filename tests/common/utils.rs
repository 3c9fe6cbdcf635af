#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use page_autofill::error::AutofillError;
use page_autofill::fill::resource::{ResourceFetcher, ResourceReference};
use page_autofill::host::capability::{CodeInjection, ExecutionHost, PageHandle, StructuredInjection};
use page_autofill::host::memory::MemoryPage;
use page_autofill::host::routine::PageRoutine;

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).unwrap()
}

pub fn page(name: &str) -> String {
    format!("file://{}", fixture_path(name).display())
}

// =========================================================================
// Fetchers
// =========================================================================

/// Hands back fixed bytes and counts how often it was asked.
pub struct StaticFetcher {
    pub bytes: Vec<u8>,
    pub calls: Mutex<usize>,
}

impl StaticFetcher {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ResourceFetcher for StaticFetcher {
    async fn fetch(&self, _resource: &ResourceReference) -> Result<Vec<u8>, AutofillError> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.bytes.clone())
    }
}

pub struct FailingFetcher;

#[async_trait]
impl ResourceFetcher for FailingFetcher {
    async fn fetch(&self, resource: &ResourceReference) -> Result<Vec<u8>, AutofillError> {
        Err(AutofillError::ResourceFetch {
            resource: resource.location.clone(),
            reason: "connection refused".into(),
        })
    }
}

// =========================================================================
// Recording host
// =========================================================================

/// A host with a configurable capability set.
///
/// Structured calls are served by an inner `MemoryPage`. Legacy programs
/// are recorded verbatim; `capture_markup` answers with the page markup and
/// every other routine with the canned response registered for it.
pub struct RecordingHost {
    pub page: MemoryPage,
    structured: bool,
    legacy: bool,
    legacy_responses: HashMap<String, Value>,
    structured_calls: Mutex<Vec<String>>,
    legacy_sources: Mutex<Vec<String>>,
}

impl RecordingHost {
    pub fn new(markup: &str, structured: bool, legacy: bool) -> Self {
        Self {
            page: MemoryPage::new(markup),
            structured,
            legacy,
            legacy_responses: HashMap::new(),
            structured_calls: Mutex::new(vec![]),
            legacy_sources: Mutex::new(vec![]),
        }
    }

    pub fn respond(mut self, routine: &str, value: Value) -> Self {
        self.legacy_responses.insert(routine.to_string(), value);
        self
    }

    pub fn structured_calls(&self) -> Vec<String> {
        self.structured_calls.lock().unwrap().clone()
    }

    pub fn legacy_sources(&self) -> Vec<String> {
        self.legacy_sources.lock().unwrap().clone()
    }
}

/// Routine name from a legacy template header.
pub fn legacy_routine_name(source: &str) -> String {
    let header = source.lines().next().unwrap_or_default();
    header
        .split(": ")
        .nth(1)
        .unwrap_or_default()
        .trim_end_matches(" */")
        .to_string()
}

#[async_trait]
impl StructuredInjection for RecordingHost {
    async fn inject(&self, page: &PageHandle, routine: &PageRoutine) -> Result<Value, AutofillError> {
        self.structured_calls
            .lock()
            .unwrap()
            .push(routine.name().to_string());
        self.page.inject(page, routine).await
    }
}

#[async_trait]
impl CodeInjection for RecordingHost {
    async fn inject_code(&self, _page: &PageHandle, source: &str) -> Result<Value, AutofillError> {
        self.legacy_sources.lock().unwrap().push(source.to_string());
        let name = legacy_routine_name(source);
        if name == "capture_markup" {
            return Ok(Value::String(self.page.markup().to_string()));
        }
        self.legacy_responses
            .get(&name)
            .cloned()
            .ok_or_else(|| AutofillError::HostExecution(format!("no canned response for {}", name)))
    }
}

#[async_trait]
impl ExecutionHost for RecordingHost {
    async fn active_page(&self) -> Result<Option<PageHandle>, AutofillError> {
        self.page.active_page().await
    }

    fn structured(&self) -> Option<&dyn StructuredInjection> {
        if self.structured { Some(self) } else { None }
    }

    fn legacy(&self) -> Option<&dyn CodeInjection> {
        if self.legacy { Some(self) } else { None }
    }
}
