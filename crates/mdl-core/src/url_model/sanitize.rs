//! Linux-safe filename sanitization.

/// Linux NAME_MAX in bytes.
const NAME_MAX: usize = 255;

fn is_forbidden(c: char) -> bool {
    matches!(c, '\0' | '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*') || c.is_control()
}

/// Sanitizes a candidate filename for safe use on Linux.
///
/// - Replaces NUL, path separators, `<>:"|?*` and control characters with `_`
/// - Collapses consecutive underscores
/// - Trims leading/trailing whitespace, dots and underscores
/// - Limits length to 255 bytes without splitting a character
pub fn sanitize_filename_for_linux(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if is_forbidden(c) { '_' } else { c };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches(|c: char| c.is_whitespace() || c == '.' || c == '_');

    let mut take = trimmed.len().min(NAME_MAX);
    while !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}
