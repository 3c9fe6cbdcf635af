use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const CAPTURE_MARKUP_JS: &str = include_str!("js/capture_markup.js");
const APPLY_ASSIGNMENTS_JS: &str = include_str!("js/apply_assignments.js");
const COUNT_CONTROLS_JS: &str = include_str!("js/count_controls.js");
const ATTACH_FILE_JS: &str = include_str!("js/attach_file.js");

/// A file rebuilt inside the page from base64 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePayload {
    pub name: String,
    pub mime_type: String,
    pub data: String,
}

impl FilePayload {
    pub fn from_bytes(name: &str, mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.data)
    }
}

/// A unit of work that runs inside the live page.
///
/// Each routine is a JavaScript function plus JSON arguments. Structured
/// hosts receive both separately; legacy hosts get them spliced into one
/// program by [`crate::host::legacy::render`].
#[derive(Debug, Clone, PartialEq)]
pub enum PageRoutine {
    /// Returns `document.documentElement.outerHTML`.
    CaptureMarkup,
    /// Returns an [`AssignmentOutcome`].
    ApplyAssignments {
        assignments: BTreeMap<String, String>,
        custom_question_prefix: String,
    },
    /// Returns the number of elements matching `query`.
    CountControls { query: String },
    /// Returns an [`AttachOutcome`].
    AttachFile {
        query: String,
        index: usize,
        file: FilePayload,
    },
}

impl PageRoutine {
    pub fn name(&self) -> &'static str {
        match self {
            PageRoutine::CaptureMarkup => "capture_markup",
            PageRoutine::ApplyAssignments { .. } => "apply_assignments",
            PageRoutine::CountControls { .. } => "count_controls",
            PageRoutine::AttachFile { .. } => "attach_file",
        }
    }

    pub fn function_source(&self) -> &'static str {
        let source = match self {
            PageRoutine::CaptureMarkup => CAPTURE_MARKUP_JS,
            PageRoutine::ApplyAssignments { .. } => APPLY_ASSIGNMENTS_JS,
            PageRoutine::CountControls { .. } => COUNT_CONTROLS_JS,
            PageRoutine::AttachFile { .. } => ATTACH_FILE_JS,
        };
        source.trim()
    }

    /// Positional arguments, in the order the function declares them.
    pub fn args(&self) -> Vec<Value> {
        match self {
            PageRoutine::CaptureMarkup => vec![],
            PageRoutine::ApplyAssignments {
                assignments,
                custom_question_prefix,
            } => vec![json!(assignments), json!(custom_question_prefix)],
            PageRoutine::CountControls { query } => vec![json!(query)],
            PageRoutine::AttachFile { query, index, file } => {
                vec![json!(query), json!(index), json!(file)]
            }
        }
    }

    /// Whether running this routine can change the page.
    pub fn mutates_page(&self) -> bool {
        matches!(
            self,
            PageRoutine::ApplyAssignments { .. } | PageRoutine::AttachFile { .. }
        )
    }
}

/// What the assignment routine reports back from the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    #[serde(default)]
    pub success: Vec<String>,
    #[serde(default)]
    pub failed: Vec<String>,
    #[serde(default)]
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachOutcome {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
