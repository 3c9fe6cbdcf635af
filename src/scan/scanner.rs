use scraper::{ElementRef, Html};
use tracing::debug;

use crate::scan::field_model::{
    Constraints, ControlDetails, FieldDescriptor, FieldModel, FormInfo, SelectOption,
};
use crate::scan::label::resolve_label;
use crate::scan::registry::assemble;
use crate::scan::selector::synthesize;

/// Parse a markup snapshot and build its field model.
///
/// Never fails: html5ever recovers from malformed markup, and an empty
/// snapshot simply yields an empty model.
pub fn scan(markup: &str) -> FieldModel {
    if markup.trim().is_empty() {
        return FieldModel::empty();
    }

    let doc = Html::parse_document(markup);
    scan_document(&doc)
}

pub fn scan_document(doc: &Html) -> FieldModel {
    let forms: Vec<FormInfo> = elements_named(doc, "form")
        .enumerate()
        .map(|(index, form)| FormInfo {
            id: form
                .value()
                .id()
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("form-{}", index)),
            action: attr(form, "action"),
            method: attr(form, "method"),
            name: attr(form, "name"),
        })
        .collect();

    let inputs: Vec<FieldDescriptor> = elements_named(doc, "input")
        .map(|el| describe_input(doc, el))
        .collect();
    let selects: Vec<FieldDescriptor> = elements_named(doc, "select")
        .map(|el| describe_select(doc, el))
        .collect();
    let textareas: Vec<FieldDescriptor> = elements_named(doc, "textarea")
        .map(|el| describe_textarea(doc, el))
        .collect();

    debug!(
        inputs = inputs.len(),
        selects = selects.len(),
        textareas = textareas.len(),
        forms = forms.len(),
        "scanned snapshot"
    );

    assemble(forms, inputs, selects, textareas)
}

fn describe_input(doc: &Html, el: ElementRef<'_>) -> FieldDescriptor {
    let control_type = el
        .value()
        .attr("type")
        .filter(|t| !t.is_empty())
        .unwrap_or("text")
        .to_string();
    let lowered = control_type.to_ascii_lowercase();

    let mut constraints = length_constraints(el);
    let mut checked = None;
    match lowered.as_str() {
        "radio" | "checkbox" => checked = Some(has_attr(el, "checked")),
        "number" | "range" => {
            constraints.min = opt_attr(el, "min");
            constraints.max = opt_attr(el, "max");
            constraints.step = opt_attr(el, "step");
        }
        "date" | "datetime-local" => {
            constraints.min = opt_attr(el, "min");
            constraints.max = opt_attr(el, "max");
        }
        _ => {}
    }

    FieldDescriptor {
        control_type,
        current_value: attr(el, "value"),
        placeholder: attr(el, "placeholder"),
        constraints,
        details: ControlDetails::Input { checked },
        ..common(doc, el)
    }
}

fn describe_select(doc: &Html, el: ElementRef<'_>) -> FieldDescriptor {
    let multiple = has_attr(el, "multiple");
    let options = select_options(el, multiple);
    let current_value = options
        .iter()
        .find(|o| o.selected)
        .map(|o| o.value.clone())
        .unwrap_or_default();

    FieldDescriptor {
        control_type: "select".to_string(),
        current_value,
        details: ControlDetails::Select { multiple, options },
        ..common(doc, el)
    }
}

fn describe_textarea(doc: &Html, el: ElementRef<'_>) -> FieldDescriptor {
    FieldDescriptor {
        control_type: "textarea".to_string(),
        current_value: el.text().collect(),
        placeholder: attr(el, "placeholder"),
        constraints: length_constraints(el),
        details: ControlDetails::Textarea {
            rows: attr(el, "rows"),
            cols: attr(el, "cols"),
        },
        ..common(doc, el)
    }
}

/// Fields shared by every control kind; callers override the rest.
fn common(doc: &Html, el: ElementRef<'_>) -> FieldDescriptor {
    FieldDescriptor {
        control_type: String::new(),
        id: attr(el, "id"),
        name: attr(el, "name"),
        current_value: String::new(),
        placeholder: String::new(),
        class_name: attr(el, "class"),
        required: has_attr(el, "required"),
        disabled: has_attr(el, "disabled"),
        constraints: Constraints::default(),
        containing_form_id: containing_form_id(el),
        selector: synthesize(el),
        label: resolve_label(doc, el),
        details: ControlDetails::Input { checked: None },
    }
}

/// Options with the browser's selectedness rules applied: a single-select
/// keeps only its last `selected` option, and falls back to its first
/// enabled option when none is marked.
fn select_options(select: ElementRef<'_>, multiple: bool) -> Vec<SelectOption> {
    let option_elements: Vec<ElementRef<'_>> = select
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "option")
        .collect();

    let mut options: Vec<SelectOption> = option_elements
        .iter()
        .map(|opt| {
            let text: String = opt.text().collect();
            let value = opt
                .value()
                .attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| collapse_whitespace(&text));
            SelectOption {
                value,
                text,
                selected: has_attr(*opt, "selected"),
            }
        })
        .collect();

    if !multiple {
        match options.iter().rposition(|o| o.selected) {
            Some(last) => {
                for (i, o) in options.iter_mut().enumerate() {
                    o.selected = i == last;
                }
            }
            None => {
                let first_enabled = option_elements
                    .iter()
                    .position(|opt| !has_attr(*opt, "disabled"));
                if let Some(i) = first_enabled {
                    options[i].selected = true;
                }
            }
        }
    }

    options
}

fn containing_form_id(el: ElementRef<'_>) -> String {
    if let Some(form) = el.value().attr("form").filter(|f| !f.is_empty()) {
        return form.to_string();
    }

    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "form")
        .map(|form| attr(form, "id"))
        .unwrap_or_default()
}

fn length_constraints(el: ElementRef<'_>) -> Constraints {
    Constraints {
        min_length: opt_attr(el, "minlength"),
        max_length: opt_attr(el, "maxlength"),
        ..Constraints::default()
    }
}

fn elements_named<'a>(doc: &'a Html, tag: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == tag)
}

fn attr(el: ElementRef<'_>, name: &str) -> String {
    el.value().attr(name).unwrap_or_default().to_string()
}

fn opt_attr(el: ElementRef<'_>, name: &str) -> Option<String> {
    el.value()
        .attr(name)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn has_attr(el: ElementRef<'_>, name: &str) -> bool {
    el.value().attr(name).is_some()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
