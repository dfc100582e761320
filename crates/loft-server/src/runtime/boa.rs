//! Boa-backed handler runtime.
//!
//! Each run builds one script: the sandbox harness, a fresh module
//! context (`module`/`exports`/`require`/`process.env`), the user's
//! transformed CJS text, and a driver that invokes the right export and
//! records the response. The script is evaluated in a fresh Boa context,
//! pending promise jobs are drained, and the recorded state is read back
//! out of globals as JSON.

use super::{HandlerOutcome, HandlerResponse, HandlerRuntime, PreparedRequest};
use crate::error::{ServerError, ServerResult};
use crate::http;
use boa_engine::{Context, JsString, Source};
use serde::Deserialize;

const HARNESS: &str = include_str!("harness.js");

const ROUTE_DRIVER: &str = r#"
const __method = __req.method.toUpperCase();
let __handler = module.exports[__method];
if (typeof __handler !== "function") {
  __handler = module.exports[__req.method.toLowerCase()];
}
if (typeof __handler !== "function") {
  globalThis.__loft_outcome = "method-not-allowed";
} else {
  const __request = new Request({
    __prepared: true,
    url: __req.url,
    method: __req.method,
    headers: __req.headers,
    body: __req.body,
  });
  const __context = { params: Promise.resolve(__req.params) };
  Promise.resolve()
    .then(function () { return __handler(__request, __context); })
    .then(function (result) {
      if (result instanceof Response) {
        __state.status = result.status;
        __state.statusText = result.statusText;
        __state.headers = result.headers.toObject();
        __state.chunks = [result.bodyText()];
      } else if (result !== null && result !== undefined && typeof result === "object") {
        __state.status = 200;
        __state.headers["content-type"] = "application/json";
        __state.chunks = [JSON.stringify(result)];
      } else {
        __state.status = 200;
        __state.chunks = [String(result)];
      }
      __state.ended = true;
      __sync();
      globalThis.__loft_outcome = "done";
    })
    .catch(function (err) {
      globalThis.__loft_error = String(err && err.message ? err.message : err);
    });
}
"#;

const API_DRIVER: &str = r#"
let __handler = module.exports.default;
if (__handler && typeof __handler === "object" && typeof __handler.default === "function") {
  __handler = __handler.default;
}
if (typeof __handler !== "function" && typeof module.exports === "function") {
  __handler = module.exports;
}
if (typeof __handler !== "function") {
  globalThis.__loft_outcome = "not-callable";
} else {
  const req = {
    method: __req.method,
    url: __req.url,
    headers: __req.headers,
    query: __req.query,
    cookies: __req.cookies,
    body: __req.parsedBody,
  };
  const res = {
    statusCode: 200,
    headersSent: false,
    isEnded: false,
    status(code) {
      this.statusCode = code;
      __state.status = code;
      __sync();
      return this;
    },
    setHeader(name, value) {
      __state.headers[String(name)] = String(value);
      __sync();
      return this;
    },
    getHeader(name) {
      return __state.headers[String(name)];
    },
    write(chunk) {
      this.headersSent = true;
      __state.chunks.push(String(chunk));
      __sync();
      return true;
    },
    json(value) {
      this.setHeader("Content-Type", "application/json");
      this.headersSent = true;
      __state.chunks.push(JSON.stringify(value));
      this.end();
    },
    send(value) {
      this.headersSent = true;
      __state.chunks.push(typeof value === "string" ? value : JSON.stringify(value));
      this.end();
    },
    end(chunk) {
      if (chunk !== undefined && chunk !== null) {
        __state.chunks.push(String(chunk));
      }
      this.headersSent = true;
      this.isEnded = true;
      __state.ended = true;
      __sync();
    },
    redirect(statusOrUrl, maybeUrl) {
      let status = 302;
      let url = statusOrUrl;
      if (typeof statusOrUrl === "number") {
        status = statusOrUrl;
        url = maybeUrl;
      }
      __state.status = status;
      __state.headers["Location"] = String(url);
      this.end();
    },
    waitForEnd() {
      return __state.ended;
    },
  };
  Promise.resolve()
    .then(function () { return __handler(req, res); })
    .then(function () {
      __sync();
      globalThis.__loft_outcome = "done";
    })
    .catch(function (err) {
      globalThis.__loft_error = String(err && err.message ? err.message : err);
    });
}
"#;

/// Default [`HandlerRuntime`] embedding the Boa engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoaHandlerRuntime;

impl BoaHandlerRuntime {
    /// Create a runtime.
    pub fn new() -> Self {
        Self
    }

    fn run(&self, code: &str, request: &PreparedRequest, driver: &str) -> ServerResult<HandlerOutcome> {
        let script = assemble_script(code, request, driver)?;

        let mut context = Context::default();
        if let Err(err) = context.eval(Source::from_bytes(script.as_bytes())) {
            return Err(ServerError::Handler(err.to_string()));
        }
        let _ = context.run_jobs();

        if let Some(message) = global_string(&mut context, "__loft_error") {
            return Err(ServerError::Handler(message));
        }

        match global_string(&mut context, "__loft_outcome").as_deref() {
            Some("method-not-allowed") => return Ok(HandlerOutcome::MethodNotAllowed),
            Some("not-callable") => return Ok(HandlerOutcome::NotCallable),
            _ => {}
        }

        let state = global_string(&mut context, "__loft_state")
            .ok_or_else(|| ServerError::Runtime("handler state missing".to_string()))?;
        let recorded: RecordedState = serde_json::from_str(&state)?;
        Ok(HandlerOutcome::Response(recorded.into_response()))
    }
}

impl HandlerRuntime for BoaHandlerRuntime {
    fn run_route_handler(
        &self,
        code: &str,
        request: &PreparedRequest,
    ) -> ServerResult<HandlerOutcome> {
        self.run(code, request, ROUTE_DRIVER)
    }

    fn run_api_handler(
        &self,
        code: &str,
        request: &PreparedRequest,
    ) -> ServerResult<HandlerOutcome> {
        self.run(code, request, API_DRIVER)
    }
}

#[derive(Deserialize)]
struct RecordedState {
    status: u16,
    #[serde(default, rename = "statusText")]
    status_text: String,
    #[serde(default)]
    headers: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    chunks: Vec<String>,
    #[serde(default)]
    ended: bool,
}

impl RecordedState {
    fn into_response(self) -> HandlerResponse {
        let status_text = if self.status_text.is_empty() {
            http::status_text(self.status).to_string()
        } else {
            self.status_text
        };
        HandlerResponse {
            status: self.status,
            status_text,
            headers: self
                .headers
                .into_iter()
                .map(|(k, v)| {
                    let value = match v {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (k, value)
                })
                .collect(),
            chunks: self.chunks.into_iter().map(String::into_bytes).collect(),
            ended: self.ended,
        }
    }
}

fn assemble_script(code: &str, request: &PreparedRequest, driver: &str) -> ServerResult<String> {
    let req_json = request.to_harness_json()?;
    Ok(format!(
        "(function() {{\n\
         \"use strict\";\n\
         const __req = {req_json};\n\
         {HARNESS}\n\
         const module = {{ exports: {{}} }};\n\
         const exports = module.exports;\n\
         const process = {{ env: __req.env }};\n\
         // ---- handler module ----\n\
         {code}\n\
         // ---- driver ----\n\
         {driver}\n\
         }})();"
    ))
}

fn global_string(context: &mut Context, name: &str) -> Option<String> {
    let value = context
        .global_object()
        .get(JsString::from(name), context)
        .ok()?;
    if value.is_undefined() || value.is_null() {
        return None;
    }
    let s = value.to_string(context).ok()?;
    Some(s.to_std_string_escaped())
}
