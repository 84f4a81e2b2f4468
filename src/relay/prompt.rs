//! Instruction template and post-processing of generated text.

/// Start of the instruction, used to spot a model echoing the prompt back.
const ECHO_MARKER: &str = "Only give a **single, kind compliment** to";

/// Full instruction sent upstream for `name`.
pub fn instruction(name: &str) -> String {
    format!(
        "{ECHO_MARKER} {name}. Do not include anything else—no explanations, context, \
         or additional text. The response should consist of **nothing but the compliment**."
    )
}

/// Compliment used when the model returns nothing usable.
pub fn fallback(name: &str) -> String {
    format!("You're awesome, {name}!")
}

/// Remove an echoed instruction from the start of `text`.
///
/// Only text starting with the instruction for this `name` is touched: the
/// first copy of the full instruction is removed and the rest trimmed. Other
/// text is returned unchanged.
pub fn strip_echo(text: &str, name: &str) -> String {
    let marker = format!("{ECHO_MARKER} {name}");
    if text.starts_with(&marker) {
        text.replacen(&instruction(name), "", 1).trim().to_string()
    } else {
        text.to_string()
    }
}

/// Final compliment for `name` from the generated text, if any.
///
/// A response that was nothing but the echoed instruction gets the fallback
/// instead of the empty remainder, so an empty compliment is never returned
/// or cached.
pub fn finalize(generated: Option<String>, name: &str) -> String {
    match generated {
        Some(text) => {
            let cleaned = strip_echo(&text, name);
            if cleaned.is_empty() {
                fallback(name)
            } else {
                cleaned
            }
        }
        None => fallback(name),
    }
}
