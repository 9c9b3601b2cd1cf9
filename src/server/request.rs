use crate::ids::RequestId;
use may_minihttp::Request;
use std::io::Read;
use tracing::{debug, warn};

/// Parsed HTTP request data used by `AppService`.
#[derive(Debug, PartialEq)]
pub struct ParsedRequest {
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request path without the query string
    pub path: String,
    /// Raw query string (without `?`), possibly empty
    pub query: String,
    /// Taken from `X-Request-Id` when it carries a valid ULID, generated otherwise
    pub request_id: RequestId,
    pub body: Vec<u8>,
    /// Set when the body could not be read in full
    pub body_error: Option<String>,
}

/// Split a request target into path and raw query.
#[must_use]
pub fn split_target(target: &str) -> (&str, &str) {
    match target.split_once('?') {
        Some((path, query)) => (if path.is_empty() { "/" } else { path }, query),
        None => (if target.is_empty() { "/" } else { target }, ""),
    }
}

/// Strip the API prefix from `path`. Returns `None` when the path lies outside the prefix;
/// the prefix itself maps to `/`.
#[must_use]
pub fn strip_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Extract method, path, query, request id and body from a `may_minihttp::Request`.
pub fn parse_request(req: Request) -> ParsedRequest {
    let method = req.method().to_string();
    let (path, query) = split_target(req.path());
    let (path, query) = (path.to_string(), query.to_string());

    let header_id = req
        .headers()
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("x-request-id"))
        .and_then(|h| std::str::from_utf8(h.value).ok())
        .map(str::to_string);
    let request_id = RequestId::from_header_or_new(header_id.as_deref());

    let mut body = Vec::new();
    let body_error = match req.body().read_to_end(&mut body) {
        Ok(_) => None,
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "Failed to read request body");
            body.clear();
            Some(e.to_string())
        }
    };

    debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        query = %query,
        body_size_bytes = body.len(),
        "HTTP request parsed"
    );

    ParsedRequest {
        method,
        path,
        query,
        request_id,
        body,
        body_error,
    }
}
