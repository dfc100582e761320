//! Handler execution runtime.
//!
//! The dispatcher executes user request handlers (transformed to CJS)
//! through this capability trait: it owns the contract — whitelisted
//! `require`, full `process.env`, fresh `module.exports`, ordered
//! response records — while the mechanism belongs to the implementation.
//! The default implementation embeds the Boa JavaScript engine.

pub mod boa;

pub use boa::BoaHandlerRuntime;

use crate::error::ServerResult;
use crate::http;

/// Everything a handler invocation needs, pre-parsed on the Rust side.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// HTTP method as received
    pub method: String,
    /// Request URL including search, origin-qualified
    pub url: String,
    /// Request headers
    pub headers: Vec<(String, String)>,
    /// UTF-8 body, when present
    pub body: Option<String>,
    /// Parsed query pairs
    pub query: Vec<(String, String)>,
    /// Parsed `Cookie` header
    pub cookies: Vec<(String, String)>,
    /// Route params from the resolver, as a JSON object
    pub params: serde_json::Value,
    /// Full environment (handlers see everything, unlike HTML)
    pub env: Vec<(String, String)>,
}

impl PreparedRequest {
    /// JSON literal handed to the execution harness as `__req`.
    ///
    /// The body appears twice: raw (`body`, for the web Request) and
    /// JSON-parsed when possible (`parsedBody`, for the legacy mock
    /// `req`). U+2028/U+2029 are escaped so the literal stays a valid JS
    /// expression.
    pub(crate) fn to_harness_json(&self) -> crate::error::ServerResult<String> {
        fn to_object(pairs: &[(String, String)]) -> serde_json::Value {
            let mut map = serde_json::Map::new();
            for (k, v) in pairs {
                map.insert(k.clone(), serde_json::Value::String(v.clone()));
            }
            serde_json::Value::Object(map)
        }

        let parsed_body = match &self.body {
            Some(raw) => serde_json::from_str::<serde_json::Value>(raw)
                .unwrap_or_else(|_| serde_json::Value::String(raw.clone())),
            None => serde_json::Value::Null,
        };

        let value = serde_json::json!({
            "method": self.method,
            "url": self.url,
            "headers": to_object(&self.headers),
            "body": self.body,
            "parsedBody": parsed_body,
            "query": to_object(&self.query),
            "cookies": to_object(&self.cookies),
            "params": self.params,
            "env": to_object(&self.env),
        });
        let text = serde_json::to_string(&value)?;
        Ok(text.replace('\u{2028}', "\\u2028").replace('\u{2029}', "\\u2029"))
    }
}

/// Recorded response of a handler run: ordered headers-then-chunks, so
/// streaming callbacks can be replayed with `on_start` strictly before
/// the first chunk.
#[derive(Debug, Clone)]
pub struct HandlerResponse {
    /// Status code
    pub status: u16,
    /// Status message
    pub status_text: String,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Body chunks in write order
    pub chunks: Vec<Vec<u8>>,
    /// Whether the handler ended the response
    pub ended: bool,
}

impl HandlerResponse {
    /// Concatenated body for unary responses.
    pub fn body(&self) -> Vec<u8> {
        self.chunks.concat()
    }
}

impl Default for HandlerResponse {
    fn default() -> Self {
        Self {
            status: 200,
            status_text: http::status_text(200).to_string(),
            headers: Vec::new(),
            chunks: Vec::new(),
            ended: false,
        }
    }
}

/// What a handler run produced.
#[derive(Debug, Clone)]
pub enum HandlerOutcome {
    /// The handler ran; response state recorded (possibly un-ended)
    Response(HandlerResponse),
    /// App-router module exports no function for the request method
    MethodNotAllowed,
    /// Legacy module's default export is not callable
    NotCallable,
}

/// Executes transformed CJS handler modules in-process.
pub trait HandlerRuntime: Send + Sync {
    /// Run an app-router (web-style) handler: the export named after the
    /// HTTP method is called with `(request, { params })`.
    fn run_route_handler(
        &self,
        code: &str,
        request: &PreparedRequest,
    ) -> ServerResult<HandlerOutcome>;

    /// Run a legacy (`/api/`) handler: the unwrapped default export is
    /// called with mock `(req, res)`.
    fn run_api_handler(&self, code: &str, request: &PreparedRequest)
        -> ServerResult<HandlerOutcome>;
}
