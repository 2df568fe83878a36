//! Normalization and syntactic screening of raw model output.
//!
//! The screen is shallow: it rejects output that is not a single
//! expression or that names process-level primitives. Whether the expression
//! only uses permitted table operations is decided later by the executor's
//! whitelist.

use crate::error::{Result, SynthesisError};

/// Names rejected wherever they appear as identifiers.
const FORBIDDEN_NAMES: &[&str] = &["import", "lambda", "subprocess", "socket", "urllib"];

/// Rejected when called as free functions (`open(...)`, not `df.open(...)`).
const FORBIDDEN_CALLS: &[&str] = &["open", "exec", "eval", "compile"];

/// Rejected when used as a module path (`os.system`).
const FORBIDDEN_MODULES: &[&str] = &["os", "sys", "requests"];

/// Trims the output, then removes one surrounding code fence and a leading
/// `Expression:` label.
pub fn normalize(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(fenced) = text.strip_prefix("```") {
        // The opening fence may carry a language tag.
        let body = match fenced.split_once('\n') {
            Some((_, body)) => body,
            None => fenced,
        };
        text = body.trim_end().strip_suffix("```").unwrap_or(body).trim();
    }

    let labelled = text
        .get(.."expression:".len())
        .is_some_and(|head| head.eq_ignore_ascii_case("expression:"));
    if labelled {
        text = text["expression:".len()..].trim();
    }

    text.to_string()
}

/// Accepts exactly one expression free of statements and environment access.
pub fn check_expression(expression: &str) -> Result<()> {
    if expression.trim().is_empty() {
        return Err(invalid("the model returned no expression"));
    }
    let lines = expression.lines().filter(|line| !line.trim().is_empty()).count();
    if lines > 1 {
        return Err(invalid("expected a single line, found several statements"));
    }

    let code = blank_strings(expression);
    if code.contains(';') {
        return Err(invalid("expected a single expression, found ';'"));
    }
    if let Some(offset) = assignment(&code) {
        return Err(invalid(format!("assignment at offset {offset}")));
    }
    check_identifiers(&code)
}

fn invalid(message: impl Into<String>) -> SynthesisError {
    SynthesisError::InvalidExpression(message.into())
}

/// Replaces the contents of string literals with spaces so that quoted text
/// is never mistaken for code. Offsets are preserved.
fn blank_strings(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for ch in source.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                    out.push(ch);
                    continue;
                }
                for _ in 0..ch.len_utf8() {
                    out.push(' ');
                }
            }
            None => {
                if ch == '\'' || ch == '"' {
                    quote = Some(ch);
                }
                out.push(ch);
            }
        }
    }
    out
}

/// Offset of an `=` that binds something: a walrus anywhere, or a plain
/// `=` that is neither part of a comparison nor a call's keyword argument.
fn assignment(code: &str) -> Option<usize> {
    let bytes = code.as_bytes();
    // Open brackets; `c` marks a parenthesis that starts a call.
    let mut open: Vec<u8> = Vec::new();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'(' if ends_callable(trim_end(&bytes[..i])) => open.push(b'c'),
            b'(' | b'[' | b'{' => open.push(b),
            b')' | b']' | b'}' => {
                open.pop();
            }
            b'=' => {
                let prev = i.checked_sub(1).map(|p| bytes[p]);
                let next = bytes.get(i + 1).copied();
                if prev == Some(b':') {
                    return Some(i);
                }
                let comparison =
                    matches!(prev, Some(b'=' | b'!' | b'<' | b'>')) || next == Some(b'=');
                let keyword = open.last() == Some(&b'c') && is_keyword_argument(bytes, i);
                if !comparison && !keyword {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn trim_end(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |p| p + 1);
    &bytes[..end]
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || !b.is_ascii()
}

fn ends_callable(before: &[u8]) -> bool {
    matches!(before.last(), Some(&b) if is_name_byte(b) || b == b')' || b == b']')
}

/// `(name=` or `, name=`.
fn is_keyword_argument(bytes: &[u8], eq: usize) -> bool {
    let before = trim_end(&bytes[..eq]);
    let start = before
        .iter()
        .rposition(|&b| !is_name_byte(b))
        .map_or(0, |p| p + 1);
    let name = &before[start..];
    if name.first().map_or(true, u8::is_ascii_digit) {
        return false;
    }
    matches!(trim_end(&before[..start]).last(), Some(b'(' | b','))
}

fn check_identifiers(code: &str) -> Result<()> {
    let chars: Vec<char> = code.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if !is_ident_start(chars[i]) {
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && is_ident_char(chars[i]) {
            i += 1;
        }
        let ident: String = chars[start..i].iter().collect();
        let prev = chars[..start].iter().rev().find(|c| !c.is_whitespace()).copied();
        let next = chars[i..].iter().find(|c| !c.is_whitespace()).copied();
        let free_standing = prev != Some('.');

        if ident.starts_with("__") {
            return Err(invalid(format!("dunder name '{ident}' is not allowed")));
        }
        if FORBIDDEN_NAMES.contains(&ident.as_str()) {
            return Err(invalid(format!("'{ident}' is not allowed")));
        }
        if free_standing && next == Some('(') && FORBIDDEN_CALLS.contains(&ident.as_str()) {
            return Err(invalid(format!("call to '{ident}' is not allowed")));
        }
        if free_standing && next == Some('.') && FORBIDDEN_MODULES.contains(&ident.as_str()) {
            return Err(invalid(format!("module '{ident}' is not allowed")));
        }
    }
    Ok(())
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
