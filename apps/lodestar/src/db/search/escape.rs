//! Search string escaping helpers.
//!
//! Components are separated by `&`; a value writes a literal ampersand as
//! `\&`, the same form `regex::escape` produces. Other backslash escapes
//! (`\.`, `\(`) are left for the `like` pattern to interpret.

/// Split `input` on every `sep` not preceded by a backslash.
pub(crate) fn split_unescaped(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (idx, c) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            parts.push(&input[start..idx]);
            start = idx + c.len_utf8();
        }
    }
    parts.push(&input[start..]);
    parts
}

pub(crate) fn unescape_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('&') => {
                out.push('&');
                chars.next();
            }
            _ => out.push('\\'),
        }
    }
    out
}
