use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::AutofillError;
use crate::mapping::assignment::AssignmentMap;
use crate::scan::field_model::AutofillMap;

/// The external service that decides which value goes into which field.
#[async_trait]
pub trait MappingCollaborator: Send + Sync {
    async fn map(&self, resume: &Value, fields: &AutofillMap) -> Result<AssignmentMap, AutofillError>;
}

// ============================================================================
// HTTP backend
// ============================================================================

pub const DEFAULT_MAPPING_ENDPOINT: &str = "http://localhost:5005/autofill";

pub struct HttpMapper {
    pub endpoint: String,
    client: reqwest::Client,
}

impl Default for HttpMapper {
    fn default() -> Self {
        Self::new(DEFAULT_MAPPING_ENDPOINT)
    }
}

#[derive(Serialize)]
struct MappingRequest<'a> {
    resume: &'a Value,
    fields: &'a AutofillMap,
}

impl HttpMapper {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Accepts the assignment object either bare or wrapped as
    /// `{"assignments": {...}}`.
    pub fn parse_response(body: &Value) -> Result<AssignmentMap, AutofillError> {
        match body.get("assignments") {
            Some(inner) if inner.is_object() => AssignmentMap::from_json(inner),
            _ => AssignmentMap::from_json(body),
        }
    }
}

#[async_trait]
impl MappingCollaborator for HttpMapper {
    async fn map(&self, resume: &Value, fields: &AutofillMap) -> Result<AssignmentMap, AutofillError> {
        debug!(endpoint = %self.endpoint, fields = fields.len(), "requesting field mapping");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&MappingRequest { resume, fields })
            .send()
            .await
            .map_err(|e| AutofillError::Mapping(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AutofillError::Mapping(format!(
                "{} answered {}",
                self.endpoint, status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AutofillError::Mapping(format!("invalid response body: {}", e)))?;

        let assignments = Self::parse_response(&body)?;
        info!(assignments = assignments.len(), "mapping received");
        Ok(assignments)
    }
}

// ============================================================================
// Static backend (fixed map, for dry runs and tests)
// ============================================================================

pub struct StaticMapper {
    pub assignments: AssignmentMap,
}

impl StaticMapper {
    pub fn new(assignments: AssignmentMap) -> Self {
        Self { assignments }
    }
}

#[async_trait]
impl MappingCollaborator for StaticMapper {
    async fn map(&self, _resume: &Value, _fields: &AutofillMap) -> Result<AssignmentMap, AutofillError> {
        Ok(self.assignments.clone())
    }
}
