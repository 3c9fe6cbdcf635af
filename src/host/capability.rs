use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::AutofillError;
use crate::host::legacy;
use crate::host::routine::PageRoutine;

/// Opaque handle naming the page (tab) the host will run code in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageHandle(pub String);

impl std::fmt::Display for PageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Host capabilities
// ============================================================================

/// Runs a function with JSON arguments inside the page.
#[async_trait]
pub trait StructuredInjection: Send + Sync {
    async fn inject(&self, page: &PageHandle, routine: &PageRoutine) -> Result<Value, AutofillError>;
}

/// Runs a program given as source text inside the page.
#[async_trait]
pub trait CodeInjection: Send + Sync {
    async fn inject_code(&self, page: &PageHandle, source: &str) -> Result<Value, AutofillError>;
}

/// The platform facility that owns the live page.
///
/// A host exposes at least one of the two injection capabilities; which ones
/// it has is probed at call time through `structured()` and `legacy()`.
#[async_trait]
pub trait ExecutionHost: Send + Sync {
    /// `Ok(None)` when the host answered but has no focused page; a failed
    /// lookup carries the host's diagnostic.
    async fn active_page(&self) -> Result<Option<PageHandle>, AutofillError>;

    fn structured(&self) -> Option<&dyn StructuredInjection> {
        None
    }

    fn legacy(&self) -> Option<&dyn CodeInjection> {
        None
    }
}

// ============================================================================
// Executors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionMode {
    Structured,
    Legacy,
}

/// Runs page routines through whichever capability the host offered.
#[async_trait]
pub trait PageExecutor: Send + Sync {
    fn mode(&self) -> InjectionMode;

    async fn run(&self, page: &PageHandle, routine: &PageRoutine) -> Result<Value, AutofillError>;
}

pub struct StructuredExecutor<'h> {
    host: &'h dyn StructuredInjection,
}

#[async_trait]
impl<'h> PageExecutor for StructuredExecutor<'h> {
    fn mode(&self) -> InjectionMode {
        InjectionMode::Structured
    }

    async fn run(&self, page: &PageHandle, routine: &PageRoutine) -> Result<Value, AutofillError> {
        debug!(page = %page, routine = routine.name(), "structured injection");
        self.host.inject(page, routine).await
    }
}

pub struct LegacyExecutor<'h> {
    host: &'h dyn CodeInjection,
}

#[async_trait]
impl<'h> PageExecutor for LegacyExecutor<'h> {
    fn mode(&self) -> InjectionMode {
        InjectionMode::Legacy
    }

    async fn run(&self, page: &PageHandle, routine: &PageRoutine) -> Result<Value, AutofillError> {
        let source = legacy::render(routine);
        debug!(page = %page, routine = routine.name(), bytes = source.len(), "legacy injection");
        self.host.inject_code(page, &source).await
    }
}

/// Pick the structured capability when the host has it, else the legacy one.
pub fn select_executor(host: &dyn ExecutionHost) -> Result<Box<dyn PageExecutor + '_>, AutofillError> {
    if let Some(structured) = host.structured() {
        return Ok(Box::new(StructuredExecutor { host: structured }));
    }

    if let Some(legacy) = host.legacy() {
        return Ok(Box::new(LegacyExecutor { host: legacy }));
    }

    Err(AutofillError::HostExecution(
        "host exposes no script injection capability".into(),
    ))
}
