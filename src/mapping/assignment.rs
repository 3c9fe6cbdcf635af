use std::collections::BTreeMap;

use scraper::Selector;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{AutofillError, FieldError};
use crate::scan::locate::is_identifier_form;

pub const MAX_SELECTOR_LEN: usize = 2048;

/// Marks a selector as the target of the binary resource rather than text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMarker {
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AssignmentValue {
    Text(String),
    File(FileMarker),
}

/// Selector -> value instructions from the mapping collaborator.
///
/// Parsing is lenient about values (numbers and booleans become text, other
/// shapes are dropped) but strict about the top level, which must be an
/// object. Keys are only checked later, one by one, by [`validate_selector`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AssignmentMap {
    entries: BTreeMap<String, AssignmentValue>,
}

impl AssignmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_text(&mut self, selector: impl Into<String>, value: impl Into<String>) {
        self.entries
            .insert(selector.into(), AssignmentValue::Text(value.into()));
    }

    pub fn insert_file(&mut self, selector: impl Into<String>, file: impl Into<String>) {
        self.entries.insert(
            selector.into(),
            AssignmentValue::File(FileMarker { file: file.into() }),
        );
    }

    pub fn from_json(value: &Value) -> Result<Self, AutofillError> {
        let object = value.as_object().ok_or_else(|| {
            AutofillError::Mapping(format!("expected an object of assignments, got {}", kind_of(value)))
        })?;

        let mut map = Self::new();
        for (selector, raw) in object {
            match coerce(raw) {
                Some(value) => {
                    map.entries.insert(selector.clone(), value);
                }
                None => warn!(selector = %selector, kind = kind_of(raw), "dropping unusable assignment value"),
            }
        }
        Ok(map)
    }

    pub fn from_json_str(text: &str) -> Result<Self, AutofillError> {
        let value: Value = serde_json::from_str(text).map_err(|e| AutofillError::JsonParse {
            context: "assignment map".into(),
            source: e,
        })?;
        Self::from_json(&value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, selector: &str) -> Option<&AssignmentValue> {
        self.entries.get(selector)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AssignmentValue)> {
        self.entries.iter()
    }

    pub fn has_file_markers(&self) -> bool {
        self.entries
            .values()
            .any(|v| matches!(v, AssignmentValue::File(_)))
    }
}

impl<'de> Deserialize<'de> for AssignmentMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(&value).map_err(serde::de::Error::custom)
    }
}

impl<S: Into<String>, V: Into<String>> FromIterator<(S, V)> for AssignmentMap {
    fn from_iter<I: IntoIterator<Item = (S, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (selector, value) in iter {
            map.insert_text(selector, value);
        }
        map
    }
}

fn coerce(raw: &Value) -> Option<AssignmentValue> {
    match raw {
        Value::String(s) => Some(AssignmentValue::Text(s.clone())),
        Value::Number(n) => Some(AssignmentValue::Text(n.to_string())),
        Value::Bool(b) => Some(AssignmentValue::Text(b.to_string())),
        Value::Object(obj) => obj
            .get("file")
            .and_then(Value::as_str)
            .map(|file| AssignmentValue::File(FileMarker { file: file.to_string() })),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Structural check of an untrusted selector key.
///
/// Identifier-form keys (`#...`) are accepted as-is because the page
/// resolves them by raw id when they are not valid CSS. Everything else has
/// to parse as a selector.
pub fn validate_selector(selector: &str) -> Result<(), FieldError> {
    let reject = |reason: &str| FieldError::InvalidSelector {
        selector: selector.to_string(),
        reason: reason.to_string(),
    };

    if selector.trim().is_empty() {
        return Err(reject("empty selector"));
    }
    if selector.len() > MAX_SELECTOR_LEN {
        return Err(reject("selector too long"));
    }
    if selector.chars().any(char::is_control) {
        return Err(reject("control characters in selector"));
    }
    if is_identifier_form(selector) {
        return Ok(());
    }

    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| reject(&format!("not a CSS selector ({:?})", e)))
}
