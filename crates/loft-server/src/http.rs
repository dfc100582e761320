//! Request/response shapes and small HTTP helpers.
//!
//! The dispatcher speaks HTTP-shaped values, not sockets: the bridge that
//! ferries real requests (service worker, in-memory calls) is an external
//! collaborator.

/// A dispatcher response.
#[derive(Debug, Clone)]
pub struct Response {
    /// Numeric status code
    pub status: u16,
    /// Status message
    pub status_text: String,
    /// Response headers, in insertion order
    pub headers: Vec<(String, String)>,
    /// Body bytes
    pub body: Vec<u8>,
}

impl Response {
    /// Build a response with a content type.
    pub fn new(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: status_text(status).to_string(),
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body: body.into(),
        }
    }

    /// HTML response.
    pub fn html(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self::new(status, "text/html; charset=utf-8", body)
    }

    /// JavaScript response.
    pub fn js(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self::new(status, "application/javascript", body)
    }

    /// JSON response from a serializable value.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, "application/json", value.to_string())
    }

    /// Add a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// First header value with the given name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body interpreted as UTF-8 (lossy), for assertions and logging.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Streaming response callbacks. For a given response, `on_start` is
/// invoked exactly once before any chunk, and `on_end` exactly once after
/// the last chunk.
pub struct StreamingCallbacks<'a> {
    /// Receives status, status text, and headers
    pub on_start: Box<dyn FnMut(u16, &str, &[(String, String)]) + Send + 'a>,
    /// Receives each body chunk in order
    pub on_chunk: Box<dyn FnMut(&[u8]) + Send + 'a>,
    /// Signals completion
    pub on_end: Box<dyn FnMut() + Send + 'a>,
}

/// Canonical reason phrase for the statuses the dispatcher emits.
pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "",
    }
}

/// Split a request URL into path and raw query. Absolute URLs lose their
/// scheme and authority.
pub fn split_url(url: &str) -> (String, Option<String>) {
    let without_origin = if let Some(scheme_end) = url.find("://") {
        let after = &url[scheme_end + 3..];
        match after.find('/') {
            Some(idx) => &after[idx..],
            None => "/",
        }
    } else {
        url
    };
    match without_origin.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (without_origin.to_string(), None),
    }
}

/// Parse an `application/x-www-form-urlencoded` query string.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (percent_decode(k), percent_decode(v)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

/// Parse a `Cookie` header value.
pub fn parse_cookies(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|part| {
            let (k, v) = part.split_once('=')?;
            Some((k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match u8::from_str_radix(&input[i + 1..i + 3], 16) {
                    Ok(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    Err(_) => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Content type for a served file, by extension.
pub fn content_type_for(path: &str) -> &'static str {
    match loft_fs::path::extension(path).unwrap_or("") {
        "html" => "text/html; charset=utf-8",
        "js" | "mjs" | "jsx" | "ts" | "tsx" => "application/javascript",
        "json" | "map" => "application/json",
        "css" => "text/css",
        "wasm" => "application/wasm",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "txt" => "text/plain; charset=utf-8",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => "application/octet-stream",
    }
}
