//! PostgreSQL array literal codec
//!
//! Renders lists as `{"a","b"}` for binding and parses the server's text
//! output (`{a,"b c",NULL}`) back into elements. One dimension only.

use crate::error::{ManagerError, ManagerResult};

/// Render elements as a brace-delimited literal. Every element is quoted;
/// `None` becomes the bare `NULL` token.
pub fn render<I, S>(items: I) -> String
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    let mut out = String::from("{");
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        match item {
            Some(text) => quote_into(&mut out, text.as_ref()),
            None => out.push_str("NULL"),
        }
    }
    out.push('}');
    out
}

fn quote_into(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

/// Parse a one-dimensional array literal into its elements
pub fn parse(text: &str) -> ManagerResult<Vec<Option<String>>> {
    let malformed = || ManagerError::conversion(format!("Malformed array literal: {}", text));

    let inner = text
        .trim()
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .ok_or_else(malformed)?;

    let mut items = Vec::new();
    if inner.trim().is_empty() {
        return Ok(items);
    }

    let mut chars = inner.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let item = if chars.peek() == Some(&'"') {
            chars.next();
            let mut buf = String::new();
            loop {
                match chars.next() {
                    Some('\\') => buf.push(chars.next().ok_or_else(malformed)?),
                    Some('"') => break,
                    Some(c) => buf.push(c),
                    None => return Err(malformed()),
                }
            }
            while chars.peek().is_some_and(|c| c.is_whitespace()) {
                chars.next();
            }
            Some(buf)
        } else {
            let mut buf = String::new();
            while let Some(&c) = chars.peek() {
                match c {
                    ',' => break,
                    '{' | '}' | '"' => return Err(malformed()),
                    '\\' => {
                        chars.next();
                        buf.push(chars.next().ok_or_else(malformed)?);
                    }
                    _ => {
                        buf.push(c);
                        chars.next();
                    }
                }
            }
            let trimmed = buf.trim();
            if trimmed.eq_ignore_ascii_case("NULL") {
                None
            } else {
                Some(trimmed.to_string())
            }
        };
        items.push(item);

        match chars.next() {
            Some(',') => continue,
            None => break,
            Some(_) => return Err(malformed()),
        }
    }

    Ok(items)
}
