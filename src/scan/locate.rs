use scraper::{ElementRef, Html, Selector};

use crate::scan::selector::unescape_identifier;

/// Identifier prefix reserved for custom-question controls whose ids carry
/// bracket characters (`#question_1234[answer]`).
pub const DEFAULT_CUSTOM_QUESTION_PREFIX: &str = "#question_";

/// Which lookup rule found the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    RawIdentifier,
    Structural,
    AttributeEquality,
}

/// Resolve `selector` against a parsed document with the same rules the
/// in-page assignment routine uses.
pub fn locate<'a>(
    doc: &'a Html,
    selector: &str,
    custom_question_prefix: &str,
) -> Option<(ElementRef<'a>, Resolution)> {
    if is_custom_question(selector, custom_question_prefix) {
        return by_raw_id(doc, &raw_identifier(selector))
            .map(|el| (el, Resolution::RawIdentifier));
    }

    if let Ok(parsed) = Selector::parse(selector) {
        if let Some(el) = doc.select(&parsed).next() {
            return Some((el, Resolution::Structural));
        }
    }

    if is_identifier_form(selector) {
        return by_raw_id(doc, &raw_identifier(selector))
            .map(|el| (el, Resolution::AttributeEquality));
    }

    None
}

pub fn is_custom_question(selector: &str, prefix: &str) -> bool {
    !prefix.is_empty()
        && selector.starts_with(prefix)
        && (selector.contains('[') || selector.contains(']'))
}

pub fn is_identifier_form(selector: &str) -> bool {
    selector.len() > 1 && selector.starts_with('#')
}

/// The id an identifier-form selector names, with CSS escapes undone.
pub fn raw_identifier(selector: &str) -> String {
    unescape_identifier(selector.strip_prefix('#').unwrap_or(selector))
}

fn by_raw_id<'a>(doc: &'a Html, raw: &str) -> Option<ElementRef<'a>> {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().id() == Some(raw))
}

/// Every element in document order; the position of an element in this
/// sequence identifies it across re-parses of the same markup.
pub fn element_ordinal(doc: &Html, element: ElementRef<'_>) -> Option<usize> {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .position(|el| el.id() == element.id())
}
