//! Small HTTP helpers shared by the size probe and the transfer unit.

use curl::easy::List;

/// Parsed `HTTP/x.y CODE reason` status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub code: u32,
    pub reason: String,
}

impl StatusLine {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

impl std::fmt::Display for StatusLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.reason)
        }
    }
}

/// Parses a status line such as `HTTP/1.1 404 Not Found` (HTTP/2 lines carry no reason).
pub fn parse_status_line(line: &str) -> Option<StatusLine> {
    let line = line.trim_end();
    if !line.starts_with("HTTP/") {
        return None;
    }
    let mut parts = line.splitn(3, ' ');
    let _version = parts.next()?;
    let code = parts.next()?.trim().parse::<u32>().ok()?;
    let reason = parts.next().unwrap_or("").trim().to_string();
    Some(StatusLine { code, reason })
}

/// Splits a `Name: value` header line; `None` for status lines and blanks.
pub fn split_header(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    Some((name.trim(), value.trim()))
}

/// Parses a `Content-Length` header line into a byte count.
pub fn content_length(line: &str) -> Option<u64> {
    let (name, value) = split_header(line)?;
    if !name.eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.parse::<u64>().ok()
}

/// Request headers many servers expect from a browser-like client.
pub fn browser_headers() -> Result<List, curl::Error> {
    let mut list = List::new();
    list.append("Accept: */*")?;
    list.append("Accept-Language: en-US,en;q=0.9")?;
    Ok(list)
}
