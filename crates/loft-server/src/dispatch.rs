//! Request dispatch.
//!
//! The top-level entry point of the dev server: classifies each
//! HTTP-shaped request against the reserved roots, static assets, request
//! handlers, and page routes, in a fixed decision order. Every exit path
//! returns a well-formed response; nothing escapes.

use crate::config::{FrameworkConfig, ServerOptions};
use crate::error::ServerError;
use crate::hmr::HmrNotifier;
use crate::http::{self, Response, StreamingCallbacks};
use crate::routes::{self, RouteMatch, RouterMode};
use crate::runtime::{
    BoaHandlerRuntime, HandlerOutcome, HandlerResponse, HandlerRuntime, PreparedRequest,
};
use crate::shell;
use crate::shims;
use loft_fs::{path, SharedVfs};
use loft_transform::{ModuleTransformer, TransformBackend, TransformerOptions};
use std::sync::Arc;
use std::time::Duration;

const TRANSFORM_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs"];
const EXTENSIONLESS_PROBES: &[&str] = &["tsx", "ts", "jsx", "js"];

/// Default wait for a handler that has not ended its response.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// The browser-resident dev server core.
pub struct DevServer {
    vfs: SharedVfs,
    config: Arc<FrameworkConfig>,
    transformer: ModuleTransformer,
    runtime: Arc<dyn HandlerRuntime>,
    hmr: HmrNotifier,
    handler_timeout: Duration,
}

impl DevServer {
    /// Create a server over `vfs` with no transform backend (non-JSX
    /// modules still flow; see the transformer crate).
    pub fn new(vfs: SharedVfs, options: ServerOptions) -> Self {
        Self::with_backend(vfs, options, None)
    }

    /// Create a server with a JSX/TS transform backend.
    pub fn with_backend(
        vfs: SharedVfs,
        options: ServerOptions,
        backend: Option<Arc<dyn TransformBackend>>,
    ) -> Self {
        let config = Arc::new(FrameworkConfig::load(vfs.as_ref(), options));
        let transformer = ModuleTransformer::new(
            Arc::clone(&vfs),
            backend,
            TransformerOptions {
                aliases: config.aliases.clone(),
                url_prefix: config.virtual_prefix.clone(),
                ..TransformerOptions::default()
            },
        );
        let hmr = HmrNotifier::start(
            &vfs,
            &[
                config.pages_dir.as_str(),
                config.app_dir.as_str(),
                config.public_dir.as_str(),
            ],
        );
        Self {
            vfs,
            config,
            transformer,
            runtime: Arc::new(BoaHandlerRuntime::new()),
            hmr,
            handler_timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }

    /// Replace the handler runtime.
    pub fn with_runtime(mut self, runtime: Arc<dyn HandlerRuntime>) -> Self {
        self.runtime = runtime;
        self
    }

    /// Configure how long a handler may leave its response un-ended.
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Resolved configuration (env mutation goes through here).
    pub fn config(&self) -> &FrameworkConfig {
        &self.config
    }

    /// The HMR notifier, for subscriptions and port registration.
    pub fn hmr(&self) -> &HmrNotifier {
        &self.hmr
    }

    /// Active routing paradigm.
    pub fn mode(&self) -> RouterMode {
        if routes::app_mode(
            self.vfs.as_ref(),
            &self.config.app_dir,
            self.config.prefer_app_router,
        ) {
            RouterMode::App
        } else {
            RouterMode::Pages
        }
    }

    /// Unary entry point. Never fails: errors become responses.
    pub async fn handle_request(
        &self,
        method: &str,
        url: &str,
        headers: &[(String, String)],
        body: Option<&[u8]>,
    ) -> Response {
        let (raw_path, query) = http::split_url(url);
        let pathname = self.strip_prefixes(&raw_path);
        tracing::debug!(method, %pathname, "dispatch");
        self.dispatch(method, &pathname, query.as_deref(), headers, body)
            .await
    }

    /// Streaming entry point. `on_start` fires exactly once before the
    /// first chunk; `on_end` exactly once after the last.
    pub async fn handle_streaming_request(
        &self,
        method: &str,
        url: &str,
        headers: &[(String, String)],
        body: Option<&[u8]>,
        mut callbacks: StreamingCallbacks<'_>,
    ) {
        let (raw_path, query) = http::split_url(url);
        let pathname = self.strip_prefixes(&raw_path);

        // Legacy handlers stream chunk-by-chunk; everything else replays
        // the unary response as a single chunk.
        if self.is_api_path(&pathname) {
            if let Some(route) = routes::resolve_page(self.vfs.as_ref(), &self.config.pages_dir, &pathname)
            {
                let outcome = self
                    .run_api(&route, method, &pathname, query.as_deref(), headers, body)
                    .await;
                match outcome {
                    Ok(resp) => {
                        (callbacks.on_start)(resp.status, &resp.status_text, &resp.headers);
                        for chunk in &resp.chunks {
                            (callbacks.on_chunk)(chunk);
                        }
                        (callbacks.on_end)();
                    }
                    Err(resp) => {
                        (callbacks.on_start)(resp.status, &resp.status_text, &resp.headers);
                        if !resp.body.is_empty() {
                            (callbacks.on_chunk)(&resp.body);
                        }
                        (callbacks.on_end)();
                    }
                }
                return;
            }
        }

        let response = self
            .dispatch(method, &pathname, query.as_deref(), headers, body)
            .await;
        (callbacks.on_start)(response.status, &response.status_text, &response.headers);
        if !response.body.is_empty() {
            (callbacks.on_chunk)(&response.body);
        }
        (callbacks.on_end)();
    }

    /// Steps 1–3 of the decision order: virtual prefix, asset prefix,
    /// base path. Tolerates the `//` that prefix concatenation produces.
    fn strip_prefixes(&self, raw: &str) -> String {
        let mut p = raw.to_string();

        if let Some(rest) = p.strip_prefix("/__virtual__/") {
            match rest.find('/') {
                Some(idx) if rest[..idx].chars().all(|c| c.is_ascii_digit()) && idx > 0 => {
                    p = rest[idx..].to_string();
                }
                None if !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()) => {
                    p = "/".to_string();
                }
                _ => {}
            }
        }

        for prefix in [
            self.config.asset_prefix.as_str(),
            self.config.base_path.as_str(),
        ] {
            if prefix.is_empty() {
                continue;
            }
            if p == prefix {
                p = "/".to_string();
            } else if let Some(rest) = p.strip_prefix(prefix) {
                if rest.starts_with('/') {
                    let mut stripped = rest.to_string();
                    while stripped.starts_with("//") {
                        stripped.remove(0);
                    }
                    p = stripped;
                }
            }
        }

        if p.is_empty() {
            "/".to_string()
        } else {
            p
        }
    }

    async fn dispatch(
        &self,
        method: &str,
        pathname: &str,
        query: Option<&str>,
        headers: &[(String, String)],
        body: Option<&[u8]>,
    ) -> Response {
        // 4. Framework shims
        if let Some(name) = pathname.strip_prefix("/_next/shims/") {
            return match shims::shim_source(name) {
                Some(source) => Response::js(200, source).with_header("Cache-Control", "no-cache"),
                None => Response::json(404, &serde_json::json!({ "error": "Unknown shim" })),
            };
        }

        // 5. Route-info lookup
        if pathname == "/_next/route-info" {
            return self.route_info(query);
        }

        // 6. Pages lazy-load root
        if let Some(rest) = pathname.strip_prefix("/_next/pages") {
            let logical = rest.strip_suffix(".js").unwrap_or(rest);
            let logical = if logical.is_empty() { "/" } else { logical };
            return match routes::resolve_page(self.vfs.as_ref(), &self.config.pages_dir, logical) {
                Some(route) => self.serve_transformed(&route.file).await,
                None => Response::json(404, &serde_json::json!({ "error": "Page not found" })),
            };
        }

        // 6b. App lazy-load root
        if let Some(rest) = pathname.strip_prefix("/_next/app") {
            return match self.resolve_app_module(rest) {
                Some(file) => self.serve_transformed(&file).await,
                None => Response::json(404, &serde_json::json!({ "error": "Module not found" })),
            };
        }

        // 7. Static passthrough
        if let Some(rest) = pathname.strip_prefix("/_next/static") {
            let file = path::normalize(rest);
            if self.is_file(&file) {
                return self.serve_raw(&file);
            }
            return Response::json(404, &serde_json::json!({ "error": "Not found" }));
        }

        // 8. App-router request handlers
        if self.mode() == RouterMode::App {
            if let Some(route) =
                routes::resolve_app_handler(self.vfs.as_ref(), &self.config.app_dir, pathname)
            {
                return self
                    .run_route(&route, method, pathname, query, headers, body)
                    .await;
            }
        }

        // 9. Legacy API handlers
        if self.is_api_path(pathname) {
            return match routes::resolve_page(self.vfs.as_ref(), &self.config.pages_dir, pathname) {
                Some(route) => {
                    match self
                        .run_api(&route, method, pathname, query, headers, body)
                        .await
                    {
                        Ok(resp) => handler_to_response(resp),
                        Err(resp) => resp,
                    }
                }
                None => Response::json(404, &serde_json::json!({ "error": "Not found" })),
            };
        }

        // 10. Public assets
        let public_candidate = path::normalize(&format!("{}{}", self.config.public_dir, pathname));
        if self.is_file(&public_candidate) {
            return self.serve_raw(&public_candidate);
        }

        // 11. Transformable source files requested directly
        if let Some(ext) = path::extension(pathname) {
            if TRANSFORM_EXTENSIONS.contains(&ext) && self.is_file(pathname) {
                return self.serve_transformed(pathname).await;
            }
        }

        // 12. Extensionless module probing
        if path::extension(pathname).is_none() && pathname != "/" {
            for ext in EXTENSIONLESS_PROBES {
                let candidate = format!("{pathname}.{ext}");
                if self.is_file(&candidate) {
                    return self.serve_transformed(&candidate).await;
                }
            }
            for ext in EXTENSIONLESS_PROBES {
                let candidate = format!("{pathname}/index.{ext}");
                if self.is_file(&candidate) {
                    return self.serve_transformed(&candidate).await;
                }
            }
        }

        // 13. Raw files
        if self.is_file(pathname) {
            return self.serve_raw(pathname);
        }

        // 14. Page routes
        self.render_page(pathname).await
    }

    fn route_info(&self, query: Option<&str>) -> Response {
        let pairs = query.map(http::parse_query).unwrap_or_default();
        let pathname = pairs
            .iter()
            .find(|(k, _)| k == "pathname")
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| "/".to_string());
        let prefix = self.config.virtual_prefix.as_str();

        let (found, params, page, layouts) = match self.mode() {
            RouterMode::App => {
                match routes::resolve_app_page(self.vfs.as_ref(), &self.config.app_dir, &pathname) {
                    Some(route) => (
                        true,
                        route.params_json(),
                        Some(shell::app_module_url(prefix, &route.file)),
                        route
                            .layouts
                            .iter()
                            .map(|l| shell::app_module_url(prefix, l))
                            .collect(),
                    ),
                    None => (false, serde_json::json!({}), None, Vec::new()),
                }
            }
            RouterMode::Pages => {
                match routes::resolve_page(self.vfs.as_ref(), &self.config.pages_dir, &pathname) {
                    Some(route) => (
                        true,
                        route.params_json(),
                        Some(shell::pages_module_url(prefix, &pathname)),
                        Vec::new(),
                    ),
                    None => (false, serde_json::json!({}), None, Vec::new()),
                }
            }
        };

        Response::json(
            200,
            &serde_json::json!({
                "params": params,
                "found": found,
                "page": page,
                "layouts": layouts,
            }),
        )
    }

    /// Resolve `/_next/app/<file-path>.js` to a source file: the literal
    /// path, extension swaps, then full app-router resolution for URLs
    /// the client built from a concrete pathname (dynamic segments).
    fn resolve_app_module(&self, rest: &str) -> Option<String> {
        let literal = path::normalize(rest);
        if self.is_file(&literal) {
            return Some(literal);
        }
        let stem = path::strip_extension(&literal).to_string();
        for ext in routes::APP_EXTENSIONS {
            let candidate = format!("{stem}.{ext}");
            if self.is_file(&candidate) {
                return Some(candidate);
            }
        }
        let app_dir = self.config.app_dir.as_str();
        if let Some(without_page) = stem.strip_suffix("/page") {
            if path::starts_with_dir(&literal, app_dir) || without_page == app_dir {
                let pathname = if without_page.len() <= app_dir.len() {
                    "/".to_string()
                } else {
                    without_page[app_dir.len()..].to_string()
                };
                return routes::resolve_app_page(self.vfs.as_ref(), app_dir, &pathname)
                    .map(|route| route.file);
            }
        }
        None
    }

    async fn serve_transformed(&self, file: &str) -> Response {
        match self.transformer.transform_esm(file).await {
            Ok(module) => {
                let mut response =
                    Response::js(200, module.code).with_header("Cache-Control", "no-cache");
                if module.cache_hit {
                    response = response.with_header("X-Cache", "hit");
                }
                response
            }
            Err(err) => {
                tracing::warn!(file, %err, "transform failed");
                let message = serde_json::Value::String(format!(
                    "[loft] Transform error in {file}: {err}"
                ));
                Response::js(200, format!("console.error({message});"))
                    .with_header("X-Transform-Error", "true")
                    .with_header("Cache-Control", "no-cache")
            }
        }
    }

    fn serve_raw(&self, file: &str) -> Response {
        match self.vfs.read(file) {
            Ok(bytes) => Response::new(200, http::content_type_for(file), bytes)
                .with_header("Cache-Control", "no-cache"),
            Err(err) => {
                tracing::warn!(file, %err, "raw read failed");
                Response::json(404, &serde_json::json!({ "error": "Not found" }))
            }
        }
    }

    fn is_file(&self, p: &str) -> bool {
        self.vfs.exists(p) && !self.vfs.is_dir(p)
    }

    fn is_api_path(&self, pathname: &str) -> bool {
        pathname == "/api" || pathname.starts_with("/api/")
    }

    fn prepare_request(
        &self,
        route: &RouteMatch,
        method: &str,
        pathname: &str,
        query: Option<&str>,
        headers: &[(String, String)],
        body: Option<&[u8]>,
    ) -> PreparedRequest {
        let url = match query {
            Some(q) if !q.is_empty() => format!("http://localhost{pathname}?{q}"),
            _ => format!("http://localhost{pathname}"),
        };
        let cookies = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("cookie"))
            .map(|(_, v)| http::parse_cookies(v))
            .unwrap_or_default();
        PreparedRequest {
            method: method.to_string(),
            url,
            headers: headers.to_vec(),
            body: body.map(|b| String::from_utf8_lossy(b).into_owned()),
            query: query.map(http::parse_query).unwrap_or_default(),
            cookies,
            params: route.params_json(),
            env: self.config.env_all(),
        }
    }

    /// App-router (web-style) handler execution.
    async fn run_route(
        &self,
        route: &RouteMatch,
        method: &str,
        pathname: &str,
        query: Option<&str>,
        headers: &[(String, String)],
        body: Option<&[u8]>,
    ) -> Response {
        let code = match self.transformer.transform_cjs(&route.file).await {
            Ok(module) => module.code,
            Err(err) => {
                return Response::json(
                    500,
                    &serde_json::json!({ "error": format!("Transform failed: {err}") }),
                )
            }
        };
        let request = self.prepare_request(route, method, pathname, query, headers, body);

        match self.runtime.run_route_handler(&code, &request) {
            Ok(HandlerOutcome::Response(resp)) => self.finish_handler(resp).await.unwrap_or_else(|r| r),
            Ok(HandlerOutcome::MethodNotAllowed) => Response::json(
                405,
                &serde_json::json!({ "error": format!("Method {method} not allowed") }),
            ),
            Ok(HandlerOutcome::NotCallable) => Response::json(
                500,
                &serde_json::json!({ "error": "Route handler export is not a function" }),
            ),
            Err(err) => handler_error_response(err),
        }
    }

    /// Legacy API handler execution. `Err` carries the error response so
    /// the streaming path can distinguish replay-able successes.
    async fn run_api(
        &self,
        route: &RouteMatch,
        method: &str,
        pathname: &str,
        query: Option<&str>,
        headers: &[(String, String)],
        body: Option<&[u8]>,
    ) -> Result<HandlerResponse, Response> {
        let code = match self.transformer.transform_cjs(&route.file).await {
            Ok(module) => module.code,
            Err(err) => {
                return Err(Response::json(
                    500,
                    &serde_json::json!({ "error": format!("Transform failed: {err}") }),
                ))
            }
        };
        let request = self.prepare_request(route, method, pathname, query, headers, body);

        match self.runtime.run_api_handler(&code, &request) {
            Ok(HandlerOutcome::Response(resp)) => {
                if resp.ended {
                    Ok(with_default_content_type(resp))
                } else {
                    // Wait out the configured grace period; nothing can
                    // end the response once execution has drained.
                    tokio::time::sleep(self.handler_timeout).await;
                    Err(handler_error_response(ServerError::HandlerTimeout(
                        self.handler_timeout.as_millis() as u64,
                    )))
                }
            }
            Ok(HandlerOutcome::NotCallable) => Err(Response::json(
                500,
                &serde_json::json!({ "error": "API handler default export is not a function" }),
            )),
            Ok(HandlerOutcome::MethodNotAllowed) => Err(Response::json(
                405,
                &serde_json::json!({ "error": format!("Method {method} not allowed") }),
            )),
            Err(err) => Err(handler_error_response(err)),
        }
    }

    /// Translate a finished handler response, enforcing the un-ended
    /// timeout for web-style handlers too.
    async fn finish_handler(&self, resp: HandlerResponse) -> Result<Response, Response> {
        if !resp.ended {
            tokio::time::sleep(self.handler_timeout).await;
            return Err(handler_error_response(ServerError::HandlerTimeout(
                self.handler_timeout.as_millis() as u64,
            )));
        }
        Ok(handler_to_response(with_default_content_type(resp)))
    }

    /// Step 14: page-route rendering with not-found fallbacks.
    async fn render_page(&self, pathname: &str) -> Response {
        match self.mode() {
            RouterMode::App => {
                if let Some(route) =
                    routes::resolve_app_page(self.vfs.as_ref(), &self.config.app_dir, pathname)
                {
                    let html = shell::render_shell(
                        self.vfs.as_ref(),
                        &self.config,
                        RouterMode::App,
                        pathname,
                        &route,
                    );
                    return Response::html(200, html).with_header("Cache-Control", "no-cache");
                }
                if let Some(not_found) = routes::find_not_found(self.vfs.as_ref(), &self.config.app_dir)
                {
                    let html = shell::render_shell(
                        self.vfs.as_ref(),
                        &self.config,
                        RouterMode::App,
                        pathname,
                        &not_found,
                    );
                    return Response::html(404, html).with_header("Cache-Control", "no-cache");
                }
            }
            RouterMode::Pages => {
                if let Some(route) =
                    routes::resolve_page(self.vfs.as_ref(), &self.config.pages_dir, pathname)
                {
                    let html = shell::render_shell(
                        self.vfs.as_ref(),
                        &self.config,
                        RouterMode::Pages,
                        pathname,
                        &route,
                    );
                    return Response::html(200, html).with_header("Cache-Control", "no-cache");
                }
                if let Some(route) =
                    routes::resolve_page(self.vfs.as_ref(), &self.config.pages_dir, "/404")
                {
                    let html = shell::render_shell(
                        self.vfs.as_ref(),
                        &self.config,
                        RouterMode::Pages,
                        "/404",
                        &route,
                    );
                    return Response::html(404, html).with_header("Cache-Control", "no-cache");
                }
            }
        }
        Response::html(404, shell::builtin_404(pathname))
    }
}

fn handler_to_response(resp: HandlerResponse) -> Response {
    Response {
        status: resp.status,
        status_text: resp.status_text.clone(),
        headers: resp.headers.clone(),
        body: resp.body(),
    }
}

fn handler_error_response(err: ServerError) -> Response {
    let status = 500;
    tracing::warn!(%err, "handler failed");
    Response::json(status, &serde_json::json!({ "error": err.to_string() }))
}

fn with_default_content_type(mut resp: HandlerResponse) -> HandlerResponse {
    let has_content_type = resp
        .headers
        .iter()
        .any(|(k, _)| k.eq_ignore_ascii_case("content-type"));
    if !has_content_type {
        resp.headers.push((
            "Content-Type".to_string(),
            "text/plain; charset=utf-8".to_string(),
        ));
    }
    resp
}
