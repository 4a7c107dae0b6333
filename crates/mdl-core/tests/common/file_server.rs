//! Minimal HTTP/1.1 file server for integration tests.
//!
//! Serves a fixed set of named bodies. Unknown paths get 404. HEAD answers
//! with Content-Length only; GET streams the body, optionally in small
//! delayed chunks to simulate a slow link, or cut off part way through.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct FileServerOptions {
    /// If false, HEAD returns 405 (simulates servers that block HEAD).
    pub head_allowed: bool,
    /// If false, GET omits Content-Length and ends the body by closing the connection.
    pub send_length: bool,
    /// Bytes per write and the pause between writes; `None` sends in one go.
    pub throttle: Option<(usize, Duration)>,
    /// `(path, n)`: GET for `path` advertises the full length, sends only the
    /// first `n` bytes, then closes the connection.
    pub cut_off: Option<(&'static str, usize)>,
}

impl Default for FileServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            send_length: true,
            throttle: None,
            cut_off: None,
        }
    }
}

/// Starts a server in a background thread serving `files` (path without the
/// leading slash → body). Returns the base URL, e.g. "http://127.0.0.1:12345/".
pub fn start(files: Vec<(&str, Vec<u8>)>) -> String {
    start_with_options(files, FileServerOptions::default())
}

pub fn start_with_options(files: Vec<(&str, Vec<u8>)>, opts: FileServerOptions) -> String {
    let files: HashMap<String, Vec<u8>> = files
        .into_iter()
        .map(|(path, body)| (path.to_string(), body))
        .collect();
    let files = Arc::new(files);
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let files = Arc::clone(&files);
            thread::spawn(move || handle(stream, &files, opts));
        }
    });
    format!("http://127.0.0.1:{}/", port)
}

fn handle(mut stream: TcpStream, files: &HashMap<String, Vec<u8>>, opts: FileServerOptions) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let (method, path) = parse_request_line(request);

    let Some(body) = files.get(path.trim_start_matches('/')) else {
        let msg = b"not found";
        let head = format!(
            "HTTP/1.1 404 Not Found\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            msg.len()
        );
        let _ = stream.write_all(head.as_bytes());
        if method.eq_ignore_ascii_case("GET") {
            let _ = stream.write_all(msg);
        }
        return;
    };

    if method.eq_ignore_ascii_case("HEAD") {
        if !opts.head_allowed {
            let _ = stream
                .write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            return;
        }
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        let _ = stream.write_all(head.as_bytes());
        return;
    }

    if method.eq_ignore_ascii_case("GET") {
        let length = if opts.send_length {
            format!("Content-Length: {}\r\n", body.len())
        } else {
            String::new()
        };
        let head = format!("HTTP/1.1 200 OK\r\n{}Connection: close\r\n\r\n", length);
        if stream.write_all(head.as_bytes()).is_err() {
            return;
        }
        let body = match opts.cut_off {
            Some((cut_path, n)) if cut_path == path.trim_start_matches('/') => {
                &body[..n.min(body.len())]
            }
            _ => &body[..],
        };
        match opts.throttle {
            Some((chunk, pause)) => {
                for part in body.chunks(chunk.max(1)) {
                    if stream.write_all(part).is_err() {
                        return;
                    }
                    let _ = stream.flush();
                    thread::sleep(pause);
                }
            }
            None => {
                let _ = stream.write_all(body);
            }
        }
        return;
    }

    let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
}

/// Returns (method, path) from the request line.
fn parse_request_line(request: &str) -> (&str, &str) {
    let line = request.lines().next().unwrap_or("");
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("/");
    (method, path)
}
