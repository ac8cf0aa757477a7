//! Minimal HTTP/1.1 archive server for integration tests.
//!
//! Serves a fixed set of files by path. Supports HEAD, GET and single-range
//! GET, optionally behind HTTP basic auth. Every response closes the
//! connection. Requests are recorded so tests can check what was fetched.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    /// If false, HEAD returns 405 (simulates servers that block HEAD).
    pub head_allowed: bool,
    /// If false, GET ignores Range and `Accept-Ranges` is not sent.
    pub support_ranges: bool,
    /// Expected base64 `user:password`; requests without it get 401.
    pub basic_auth: Option<&'static str>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            support_ranges: true,
            basic_auth: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub range: Option<(u64, u64)>,
}

pub struct ArchiveServer {
    pub base_url: String,
    log: Arc<Mutex<Vec<Request>>>,
    body_bytes: Arc<Mutex<u64>>,
}

impl ArchiveServer {
    pub fn requests(&self) -> Vec<Request> {
        self.log.lock().unwrap().clone()
    }

    /// Body bytes sent so far, over all requests.
    pub fn body_bytes(&self) -> u64 {
        *self.body_bytes.lock().unwrap()
    }

    pub fn gets(&self) -> usize {
        self.requests().iter().filter(|r| r.method == "GET").count()
    }
}

/// Starts a server in a background thread serving `files` (path without the
/// leading slash -> body). The server runs until the process exits.
pub fn start(files: Vec<(String, Vec<u8>)>, opts: ServerOptions) -> ArchiveServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let files: Arc<HashMap<String, Vec<u8>>> = Arc::new(files.into_iter().collect());
    let log = Arc::new(Mutex::new(Vec::new()));
    let body_bytes = Arc::new(Mutex::new(0u64));
    let (log_srv, bytes_srv) = (Arc::clone(&log), Arc::clone(&body_bytes));
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let files = Arc::clone(&files);
            let log = Arc::clone(&log_srv);
            let bytes = Arc::clone(&bytes_srv);
            thread::spawn(move || handle(stream, &files, opts, &log, &bytes));
        }
    });
    ArchiveServer {
        base_url: format!("http://127.0.0.1:{}/", port),
        log,
        body_bytes,
    }
}

fn handle(
    mut stream: TcpStream,
    files: &HashMap<String, Vec<u8>>,
    opts: ServerOptions,
    log: &Mutex<Vec<Request>>,
    sent: &Mutex<u64>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(text) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let (req, auth) = parse_request(text);
    log.lock().unwrap().push(req.clone());

    if let Some(expected) = opts.basic_auth {
        if auth.as_deref() != Some(expected) {
            respond(&mut stream, "401 Unauthorized", "WWW-Authenticate: Basic realm=\"desi\"\r\n", b"");
            return;
        }
    }
    let method = req.method.as_str();
    if method == "HEAD" && !opts.head_allowed {
        respond(&mut stream, "405 Method Not Allowed", "", b"");
        return;
    }
    if method != "HEAD" && method != "GET" {
        respond(&mut stream, "405 Method Not Allowed", "", b"");
        return;
    }
    let Some(body) = files.get(req.path.trim_start_matches('/')) else {
        respond(&mut stream, "404 Not Found", "", b"not found");
        return;
    };
    let total = body.len() as u64;
    let accept = if opts.support_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };

    if method == "HEAD" {
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
            total, accept
        );
        let _ = stream.write_all(head.as_bytes());
        return;
    }

    let (status, extra, slice) = match req.range.filter(|_| opts.support_ranges) {
        Some((start, end_incl)) => {
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start > end_incl {
                (
                    "416 Range Not Satisfiable",
                    format!("Content-Range: bytes */{}\r\n", total),
                    &body[0..0],
                )
            } else {
                (
                    "206 Partial Content",
                    format!("Content-Range: bytes {}-{}/{}\r\n{}", start, end_incl, total, accept),
                    &body[start as usize..=end_incl as usize],
                )
            }
        }
        None => ("200 OK", accept.to_string(), &body[..]),
    };
    *sent.lock().unwrap() += slice.len() as u64;
    respond(&mut stream, status, &extra, slice);
}

fn respond(stream: &mut TcpStream, status: &str, headers: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
        status,
        body.len(),
        headers
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

/// Request line, `Range: bytes=X-Y` and the basic-auth token.
fn parse_request(request: &str) -> (Request, Option<String>) {
    let mut lines = request.lines();
    let mut first = lines.next().unwrap_or("").split_whitespace();
    let method = first.next().unwrap_or("").to_string();
    let path = first.next().unwrap_or("/").to_string();
    let mut range = None;
    let mut auth = None;
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if name.trim().eq_ignore_ascii_case("range") {
            if let Some((a, b)) = value.strip_prefix("bytes=").and_then(|r| r.split_once('-')) {
                let start = a.trim().parse::<u64>().unwrap_or(0);
                let end = b.trim().parse::<u64>().unwrap_or(u64::MAX);
                range = Some((start, end));
            }
        } else if name.trim().eq_ignore_ascii_case("authorization") {
            auth = value.strip_prefix("Basic ").map(str::to_string);
        }
    }
    (Request { method, path, range }, auth)
}
