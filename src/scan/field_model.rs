use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Input,
    Select,
    Textarea,
}

impl ControlKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ControlKind::Input => "input",
            ControlKind::Select => "select",
            ControlKind::Textarea => "textarea",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    pub text: String,
    pub selected: bool,
}

/// Numeric, date and length limits read from the control's attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<String>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self.min.is_none()
            && self.max.is_none()
            && self.step.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
    }
}

/// Kind-specific payload of a scanned control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ControlDetails {
    Input {
        /// Only recorded for radio and checkbox controls.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checked: Option<bool>,
    },
    Select {
        multiple: bool,
        options: Vec<SelectOption>,
    },
    Textarea {
        rows: String,
        cols: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub control_type: String,
    pub id: String,
    pub name: String,
    pub current_value: String,
    pub placeholder: String,
    pub class_name: String,
    pub required: bool,
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Constraints::is_empty")]
    pub constraints: Constraints,
    pub containing_form_id: String,
    pub selector: String,
    pub label: String,
    #[serde(flatten)]
    pub details: ControlDetails,
}

impl FieldDescriptor {
    pub fn kind(&self) -> ControlKind {
        match self.details {
            ControlDetails::Input { .. } => ControlKind::Input,
            ControlDetails::Select { .. } => ControlKind::Select,
            ControlDetails::Textarea { .. } => ControlKind::Textarea,
        }
    }

    pub fn options(&self) -> Option<&[SelectOption]> {
        match &self.details {
            ControlDetails::Select { options, .. } => Some(options),
            _ => None,
        }
    }

    pub fn checked(&self) -> Option<bool> {
        match self.details {
            ControlDetails::Input { checked } => checked,
            _ => None,
        }
    }
}

/// Structural metadata for a `form` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormInfo {
    pub id: String,
    pub action: String,
    pub method: String,
    pub name: String,
}

/// Flattened per-selector entry handed to the mapping collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSummary {
    #[serde(rename = "type")]
    pub control_type: String,
    pub name: String,
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<SelectOption>>,
    pub field_type: ControlKind,
}

pub type AutofillMap = BTreeMap<String, FieldSummary>;

/// Everything one extraction found on a page.
///
/// Built once per snapshot by [`crate::scan::registry::assemble`] and never
/// mutated or merged afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldModel {
    pub inputs: Vec<FieldDescriptor>,
    pub selects: Vec<FieldDescriptor>,
    pub textareas: Vec<FieldDescriptor>,
    pub forms: Vec<FormInfo>,
    pub autofill_map: AutofillMap,
}

impl FieldModel {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inputs.len() + self.selects.len() + self.textareas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All descriptors in category order: inputs, selects, textareas.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.inputs
            .iter()
            .chain(self.selects.iter())
            .chain(self.textareas.iter())
    }

    pub fn find(&self, selector: &str) -> Option<&FieldDescriptor> {
        self.fields().find(|f| f.selector == selector)
    }

    /// Stable digest of the selector set, used to tell snapshots apart in traces.
    pub fn fingerprint(&self) -> String {
        use sha1::{Digest, Sha1};

        let mut hasher = Sha1::new();
        for selector in self.autofill_map.keys() {
            hasher.update(selector.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }
}
