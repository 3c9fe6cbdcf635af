use crate::scan::field_model::{
    AutofillMap, ControlDetails, FieldDescriptor, FieldModel, FieldSummary, FormInfo,
};

/// Merge the scanned categories into a `FieldModel` and derive its
/// selector-indexed summary.
pub fn assemble(
    forms: Vec<FormInfo>,
    inputs: Vec<FieldDescriptor>,
    selects: Vec<FieldDescriptor>,
    textareas: Vec<FieldDescriptor>,
) -> FieldModel {
    let autofill_map = build_autofill_map(inputs.iter().chain(&selects).chain(&textareas));

    FieldModel {
        inputs,
        selects,
        textareas,
        forms,
        autofill_map,
    }
}

/// Later descriptors with an already-seen selector overwrite earlier ones.
pub fn build_autofill_map<'a>(fields: impl IntoIterator<Item = &'a FieldDescriptor>) -> AutofillMap {
    let mut map = AutofillMap::new();

    for field in fields {
        if field.selector.is_empty() {
            continue;
        }
        map.insert(field.selector.clone(), summarize(field));
    }

    map
}

pub fn summarize(field: &FieldDescriptor) -> FieldSummary {
    let (value, options) = match &field.details {
        ControlDetails::Select { options, .. } => (None, Some(options.clone())),
        _ => (Some(field.current_value.clone()), None),
    };

    FieldSummary {
        control_type: field.control_type.clone(),
        name: field.name.clone(),
        id: field.id.clone(),
        label: field.label.clone(),
        value,
        options,
        field_type: field.kind(),
    }
}
