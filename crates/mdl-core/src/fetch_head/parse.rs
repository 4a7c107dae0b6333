//! Parse HTTP response header lines into HeadResult.

use super::HeadResult;
use crate::http;

/// Parse collected header lines into HeadResult.
///
/// With redirects the lines of several responses arrive back to back; each
/// status line starts a new response, so only the final one counts.
pub(crate) fn parse_headers(lines: &[String]) -> HeadResult {
    let mut status = 0;
    let mut content_length = None;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(s) = http::parse_status_line(line) {
            status = s.code;
            content_length = None;
            continue;
        }
        if let Some(n) = http::content_length(line) {
            content_length = Some(n);
        }
    }

    HeadResult {
        status,
        content_length,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_headers_content_length() {
        let r = parse_headers(&lines(&["HTTP/1.1 200 OK", "Content-Length: 12345"]));
        assert_eq!(r.status, 200);
        assert_eq!(r.content_length, Some(12345));
    }

    #[test]
    fn parse_headers_missing_length() {
        let r = parse_headers(&lines(&["HTTP/1.1 200 OK", "Content-Type: text/html"]));
        assert_eq!(r.content_length, None);
    }

    #[test]
    fn parse_headers_redirect_uses_final_response() {
        let r = parse_headers(&lines(&[
            "HTTP/1.1 301 Moved Permanently",
            "Content-Length: 178",
            "Location: https://mirror/file.iso",
            "",
            "HTTP/1.1 200 OK",
            "Content-Length: 4096",
        ]));
        assert_eq!(r.status, 200);
        assert_eq!(r.content_length, Some(4096));

        let r = parse_headers(&lines(&[
            "HTTP/1.1 302 Found",
            "Content-Length: 10",
            "",
            "HTTP/1.1 200 OK",
        ]));
        assert_eq!(r.content_length, None);
    }
}
