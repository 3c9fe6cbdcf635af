use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutofillError {
    /// The host could not name an active page to work on.
    #[error("No active page context found")]
    NoActivePage,

    /// The injection capability itself failed; carries the host's diagnostic.
    #[error("Host execution failed: {0}")]
    HostExecution(String),

    /// The binary resource for the upload path could not be retrieved.
    #[error("Failed to fetch resource '{resource}': {reason}")]
    ResourceFetch { resource: String, reason: String },

    /// The snapshot had no fillable controls; nothing was sent for mapping.
    #[error("No fillable fields detected on the page")]
    NoFieldsDetected,

    /// The mapping collaborator was unreachable or answered garbage.
    #[error("Mapping collaborator failed: {0}")]
    Mapping(String),

    #[error("JSON parse error ({context}): {source}")]
    JsonParse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Host helper subprocess failed to spawn
    #[error("Failed to spawn {script} (is Node.js installed?): {source}")]
    SubprocessSpawn {
        script: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Host session I/O error: {0}")]
    SessionIO(String),
}

impl AutofillError {
    /// Whether the caller should surface this as a failed autofill.
    ///
    /// `NoFieldsDetected` is a no-op for the user and `ResourceFetch` only
    /// ever ends the upload path.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AutofillError::NoFieldsDetected | AutofillError::ResourceFetch { .. }
        )
    }
}

/// Per-selector failure. Recorded in the report's `failed` set and logged,
/// never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Element '{selector}' not found on the page")]
    ElementNotFound { selector: String },

    #[error("Selector '{selector}' rejected: {reason}")]
    InvalidSelector { selector: String, reason: String },
}
