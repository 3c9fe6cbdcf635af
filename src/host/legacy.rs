use serde_json::Value;

use crate::host::routine::PageRoutine;

/// Bumped whenever the shape of the generated program changes.
pub const TEMPLATE_VERSION: u32 = 1;

/// Render a routine as a self-contained program for string-code injection.
///
/// The output is a header comment naming the template version and routine,
/// followed by the routine's function expression immediately invoked with
/// its JSON-serialized arguments. The value of that final expression is what
/// the host hands back.
pub fn render(routine: &PageRoutine) -> String {
    let args = routine
        .args()
        .iter()
        .map(js_literal)
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "/* page-autofill legacy template v{}: {} */\n({})({});\n",
        TEMPLATE_VERSION,
        routine.name(),
        routine.function_source(),
        args
    )
}

/// JSON is a JavaScript expression except for the two line separators,
/// which older engines reject inside string literals.
pub fn js_literal(value: &Value) -> String {
    value
        .to_string()
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}
