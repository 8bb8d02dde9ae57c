//! Escape-sequence text for the control units a line terminal cares about.
//!
//! Used in both directions: typed input such as `reset\r\n` is decoded into
//! real control units before sending, and received control units can be shown
//! as their escape text when diagnosing line endings.

/// Control unit ⇄ escape text.
pub const CONTROL_TABLE: [(char, &str); 5] = [
    ('\n', "\\n"),
    ('\r', "\\r"),
    ('\t', "\\t"),
    ('\u{8}', "\\b"),
    ('\u{b}', "\\v"),
];

pub fn is_control_unit(unit: char) -> bool {
    escape_for(unit).is_some()
}

/// Escape text for one of the five control units.
pub fn escape_for(unit: char) -> Option<&'static str> {
    CONTROL_TABLE
        .iter()
        .find(|(control, _)| *control == unit)
        .map(|(_, escape)| *escape)
}

fn unit_for(letter: char) -> Option<char> {
    CONTROL_TABLE
        .iter()
        .find(|(_, escape)| escape.ends_with(letter))
        .map(|(control, _)| *control)
}

/// Replace control units with their escape text.
pub fn encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for unit in text.chars() {
        match escape_for(unit) {
            Some(escape) => out.push_str(escape),
            None => out.push(unit),
        }
    }
    out
}

/// Replace escape text with literal control units.
///
/// A backslash not followed by one of `n r t b v` is kept as typed.
pub fn decode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(unit) = chars.next() {
        if unit == '\\' {
            if let Some(control) = chars.peek().copied().and_then(unit_for) {
                chars.next();
                out.push(control);
                continue;
            }
        }
        out.push(unit);
    }
    out
}
