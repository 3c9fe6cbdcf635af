use scraper::ElementRef;

/// Derive a selector that locates `element` again in the same document.
///
/// Priority: `#id` (CSS-escaped), then `tag[name="..."]`, then `tag[type="..."]`, then a
/// structural `nth-of-type` path anchored at the nearest ancestor with an id
/// (or at `body` when there is none).
pub fn synthesize(element: ElementRef<'_>) -> String {
    let tag = element.value().name();

    if let Some(id) = non_empty_attr(element, "id") {
        return format!("#{}", escape_identifier(id));
    }

    if let Some(name) = non_empty_attr(element, "name") {
        return format!("{}[name=\"{}\"]", tag, escape_attr(name));
    }

    if let Some(input_type) = non_empty_attr(element, "type") {
        return format!("{}[type=\"{}\"]", tag, escape_attr(input_type));
    }

    structural_path(element)
}

/// Root-to-leaf `>`-joined path of `tag:nth-of-type(k)` segments.
pub fn structural_path(element: ElementRef<'_>) -> String {
    let mut segments: Vec<String> = Vec::new();
    let mut current = Some(element);

    while let Some(el) = current {
        let tag = el.value().name();
        if tag == "html" {
            break;
        }

        if let Some(id) = non_empty_attr(el, "id") {
            segments.push(format!("{}#{}", tag, escape_identifier(id)));
            break;
        }

        let preceding = el
            .prev_siblings()
            .filter_map(ElementRef::wrap)
            .filter(|sibling| sibling.value().name() == tag)
            .count();

        if preceding == 0 {
            segments.push(tag.to_string());
        } else {
            segments.push(format!("{}:nth-of-type({})", tag, preceding + 1));
        }

        current = el.parent().and_then(ElementRef::wrap);
    }

    segments.reverse();
    segments.join(" > ")
}

fn non_empty_attr<'a>(element: ElementRef<'a>, name: &str) -> Option<&'a str> {
    element.value().attr(name).filter(|v| !v.is_empty())
}

/// Escape a value for use inside a double-quoted attribute selector.
pub fn escape_attr(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Serialize `value` as a CSS identifier (CSSOM "serialize an identifier"),
/// so ids like `main:content` or `user.email` stay a single id selector.
pub fn escape_identifier(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());

    for (i, &c) in chars.iter().enumerate() {
        let leading_digit = c.is_ascii_digit() && (i == 0 || (i == 1 && chars[0] == '-'));
        match c {
            '\0' => out.push('\u{FFFD}'),
            '\u{1}'..='\u{1f}' | '\u{7f}' => out.push_str(&format!("\\{:x} ", c as u32)),
            _ if leading_digit => out.push_str(&format!("\\{:x} ", c as u32)),
            '-' if i == 0 && chars.len() == 1 => out.push_str("\\-"),
            _ if c as u32 >= 0x80 || c == '-' || c == '_' || c.is_ascii_alphanumeric() => {
                out.push(c)
            }
            _ => {
                out.push('\\');
                out.push(c);
            }
        }
    }

    out
}

/// Undo CSS escapes: `\` + 1-6 hex digits (plus one optional whitespace)
/// is a code point, `\` + anything else is that character.
pub fn unescape_identifier(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let mut hex = String::new();
        while hex.len() < 6 {
            match chars.peek() {
                Some(h) if h.is_ascii_hexdigit() => {
                    hex.push(*h);
                    chars.next();
                }
                _ => break,
            }
        }

        if hex.is_empty() {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push('\\'),
            }
            continue;
        }

        if matches!(chars.peek(), Some(' ' | '\t' | '\n' | '\r' | '\u{c}')) {
            chars.next();
        }
        let code = u32::from_str_radix(&hex, 16).unwrap_or(0);
        let decoded = match code {
            0 => '\u{FFFD}',
            _ => char::from_u32(code).unwrap_or('\u{FFFD}'),
        };
        out.push(decoded);
    }

    out
}
