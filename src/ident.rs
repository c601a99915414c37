//! Identifier normalization for emitted Python names.

/// Turns a user-supplied name into a bare Python identifier.
///
/// Every character outside `[A-Za-z0-9_]` becomes `_`, and a leading digit
/// gets a `_` prefix. Missing or empty names fall back to `var{index + 1}`.
/// The result is stable under repeated application with the same index.
pub fn sanitize(raw: Option<&str>, fallback_index: usize) -> String {
    let Some(raw) = raw.filter(|s| !s.is_empty()) else {
        return fallback_name(fallback_index);
    };
    let mut out = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    if out.is_empty() {
        return fallback_name(fallback_index);
    }
    out
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn fallback_name(index: usize) -> String {
    format!("var{}", index + 1)
}
