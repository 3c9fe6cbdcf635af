use scraper::{ElementRef, Html, Node};

const CONTROL_TAGS: [&str; 3] = ["input", "select", "textarea"];

/// Find the human-readable label for a control.
///
/// An explicit `label[for=id]` wins; otherwise the nearest enclosing `label`
/// is used with every nested control stripped out. Returns an empty string
/// when neither exists.
pub fn resolve_label(doc: &Html, element: ElementRef<'_>) -> String {
    if let Some(id) = element.value().id().filter(|id| !id.is_empty()) {
        let explicit = doc
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "label" && el.value().attr("for") == Some(id));

        if let Some(label) = explicit {
            return label.text().collect::<String>().trim().to_string();
        }
    }

    let enclosing = element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "label");

    match enclosing {
        Some(label) => {
            let mut text = String::new();
            collect_text_without_controls(label, &mut text);
            text.trim().to_string()
        }
        None => String::new(),
    }
}

fn collect_text_without_controls(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if CONTROL_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text_without_controls(child_el, out);
                }
            }
            _ => {}
        }
    }
}
