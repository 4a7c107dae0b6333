//! URL modeling and base-name derivation.
//!
//! Turns a job's requested name or source URL into a safe base file name,
//! sanitized for Linux filesystems.

mod path;
mod sanitize;

pub use path::filename_from_url_path;
pub use sanitize::sanitize_filename_for_linux;

/// Default filename when neither a requested name nor the URL path yields anything usable.
pub const DEFAULT_FILENAME: &str = "download.bin";

/// Derives the base file name for a download.
///
/// A non-empty `requested_name` wins; otherwise the last path segment of
/// `url` is used. Either way the result is sanitized (no `/`, NUL or control
/// chars; no leading/trailing dots or spaces). Falls back to `download.bin`.
///
/// # Examples
///
/// - `derive_base_name(None, "https://example.com/archive.zip")` → `"archive.zip"`
/// - `derive_base_name(Some("renamed.bin"), "https://example.com/a.bin")` → `"renamed.bin"`
/// - `derive_base_name(None, "https://example.com/")` → `"download.bin"`
pub fn derive_base_name(requested_name: Option<&str>, url: &str) -> String {
    let candidate = requested_name
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| filename_from_url_path(url));

    let raw = match candidate {
        Some(c) => c,
        None => return DEFAULT_FILENAME.to_string(),
    };

    let sanitized = sanitize_filename_for_linux(&raw);
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        DEFAULT_FILENAME.to_string()
    } else {
        sanitized
    }
}

/// Label shown in progress rows and failure messages: requested name, else the URL's last segment.
pub fn display_name(requested_name: Option<&str>, url: &str) -> String {
    requested_name
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| filename_from_url_path(url))
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_from_url_path() {
        assert_eq!(
            derive_base_name(None, "https://example.com/archive.zip"),
            "archive.zip"
        );
        assert_eq!(
            derive_base_name(None, "https://cdn.example.com/path/to/debian-12.iso"),
            "debian-12.iso"
        );
    }

    #[test]
    fn requested_name_overrides_url() {
        assert_eq!(
            derive_base_name(Some("renamed.bin"), "https://host/a.bin"),
            "renamed.bin"
        );
        assert_eq!(derive_base_name(Some(""), "https://host/a.bin"), "a.bin");
        assert_eq!(derive_base_name(Some("   "), "https://host/a.bin"), "a.bin");
    }

    #[test]
    fn requested_name_is_sanitized() {
        assert_eq!(
            derive_base_name(Some("../etc/passwd"), "https://host/a.bin"),
            "etc_passwd"
        );
    }

    #[test]
    fn empty_url_path_fallback() {
        assert_eq!(derive_base_name(None, "https://example.com/"), "download.bin");
        assert_eq!(derive_base_name(None, "https://example.com"), "download.bin");
        assert_eq!(derive_base_name(None, "not a url"), "download.bin");
    }

    #[test]
    fn reserved_names_fallback() {
        assert_eq!(derive_base_name(None, "https://example.com/."), "download.bin");
        assert_eq!(derive_base_name(Some(".."), "https://example.com/"), "download.bin");
    }

    #[test]
    fn display_name_prefers_requested() {
        assert_eq!(display_name(Some("x.iso"), "https://h/a.bin"), "x.iso");
        assert_eq!(display_name(None, "https://h/dir/a.bin"), "a.bin");
        assert_eq!(display_name(None, "https://h/"), "https://h/");
    }
}
