//! End-to-end dispatcher tests over an in-memory project.

use loft_fs::{MemoryFs, SharedVfs};
use loft_server::{DevServer, Response, ServerOptions, StreamingCallbacks};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn server_with(files: &[(&str, &str)], options: ServerOptions) -> (Arc<MemoryFs>, DevServer) {
    let fs = Arc::new(MemoryFs::with_files(files.iter().copied()));
    let server = DevServer::new(Arc::clone(&fs) as SharedVfs, options);
    (fs, server)
}

async fn get(server: &DevServer, url: &str) -> Response {
    server.handle_request("GET", url, &[], None).await
}

#[tokio::test]
async fn pages_index_serves_html_shell() {
    let (_fs, server) = server_with(
        &[("/pages/index.jsx", "export default function Home() { return null; }")],
        ServerOptions::default(),
    );

    let response = get(&server, "/").await;
    assert_eq!(response.status, 200);
    assert_eq!(
        response.header("content-type"),
        Some("text/html; charset=utf-8")
    );
    let body = response.body_text();
    assert!(body.contains("<div id=\"__next\">"));
    assert!(body.contains("/_next/pages"));
    assert!(body.contains("importmap"));
}

#[tokio::test]
async fn dynamic_page_route_and_lazy_load() {
    let (_fs, server) = server_with(
        &[("/pages/users/[id].jsx", "export default function User() { return null; }")],
        ServerOptions::default(),
    );

    let page = get(&server, "/users/42").await;
    assert_eq!(page.status, 200);
    assert!(page.body_text().contains("/_next/pages/users/42.js"));

    // Lazy-load of the same route serves the `[id]` module; first
    // transform is not a cache hit.
    let module = get(&server, "/_next/pages/users/42.js").await;
    assert_eq!(module.status, 200);
    assert_eq!(module.header("content-type"), Some("application/javascript"));
    assert_eq!(module.header("x-cache"), None);
}

#[tokio::test]
async fn route_info_reports_params_in_app_mode() {
    let (_fs, server) = server_with(
        &[("/app/users/[id]/page.tsx", "export default function User() { return null; }")],
        ServerOptions::default(),
    );

    let response = get(&server, "/_next/route-info?pathname=/users/42").await;
    assert_eq!(response.status, 200);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["found"], true);
    assert_eq!(body["params"], serde_json::json!({ "id": "42" }));
}

#[tokio::test]
async fn transform_cache_marks_second_response() {
    let (fs, server) = server_with(
        &[("/pages/index.jsx", "export default function Home() { return null; }")],
        ServerOptions::default(),
    );

    let first = get(&server, "/pages/index.jsx").await;
    assert_eq!(first.status, 200);
    assert_eq!(first.header("x-cache"), None);

    let second = get(&server, "/pages/index.jsx").await;
    assert_eq!(second.header("x-cache"), Some("hit"));

    fs.write("/pages/index.jsx", "export default function Home() { return 1; }");

    let after_edit = get(&server, "/pages/index.jsx").await;
    assert_eq!(after_edit.header("x-cache"), None);

    let recached = get(&server, "/pages/index.jsx").await;
    assert_eq!(recached.header("x-cache"), Some("hit"));
}

#[tokio::test]
async fn env_isolation_in_html() {
    let (_fs, server) = server_with(
        &[("/pages/index.jsx", "export default function Home() { return null; }")],
        ServerOptions {
            env: vec![
                ("NEXT_PUBLIC_A".to_string(), "x".to_string()),
                ("SECRET".to_string(), "s".to_string()),
            ],
            ..ServerOptions::default()
        },
    );

    let body = get(&server, "/").await.body_text();
    assert!(body.contains("\"NEXT_PUBLIC_A\":\"x\""));
    assert!(!body.contains("SECRET"));
}

#[tokio::test]
async fn asset_prefix_double_slash_serves_public_file() {
    let (_fs, server) = server_with(
        &[
            ("/pages/index.jsx", "export default function Home() { return null; }"),
            ("/public/images/x.png", "png-bytes"),
        ],
        ServerOptions {
            asset_prefix: Some("/m".to_string()),
            ..ServerOptions::default()
        },
    );

    let response = get(&server, "/m//images/x.png").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("image/png"));
    assert_eq!(response.body, b"png-bytes");
}

#[tokio::test]
async fn prefix_stripping_is_resolution_neutral() {
    let files = [(
        "/pages/users/[id].jsx",
        "export default function User() { return null; }",
    )];
    let (_fs, plain) = server_with(&files, ServerOptions::default());
    let (_fs2, prefixed) = server_with(
        &files,
        ServerOptions {
            base_path: Some("/docs".to_string()),
            ..ServerOptions::default()
        },
    );

    let direct = get(&plain, "/users/42").await;
    let through_base = get(&prefixed, "/docs/users/42").await;
    let through_virtual = get(&prefixed, "/__virtual__/3000/docs/users/42").await;

    assert_eq!(direct.status, 200);
    assert_eq!(through_base.status, direct.status);
    assert_eq!(through_virtual.status, direct.status);
}

#[tokio::test]
async fn app_handler_method_not_allowed() {
    let (_fs, server) = server_with(
        &[
            ("/app/page.tsx", "export default function Home() { return null; }"),
            (
                "/app/api/items/route.ts",
                "module.exports.GET = () => ({ items: [] });",
            ),
        ],
        ServerOptions::default(),
    );

    let ok = get(&server, "/api/items").await;
    assert_eq!(ok.status, 200);
    assert_eq!(ok.body, b"{\"items\":[]}");

    let post = server.handle_request("POST", "/api/items", &[], None).await;
    assert_eq!(post.status, 405);
    let body: serde_json::Value = serde_json::from_slice(&post.body).unwrap();
    assert_eq!(body["error"], "Method POST not allowed");
}

#[tokio::test]
async fn legacy_api_handler_json() {
    let (_fs, server) = server_with(
        &[
            ("/pages/index.jsx", "export default function Home() { return null; }"),
            (
                "/pages/api/hello.js",
                "module.exports.default = (req, res) => { res.status(200).json({ hello: req.query.name }); };",
            ),
        ],
        ServerOptions::default(),
    );

    let response = get(&server, "/api/hello?name=ada").await;
    assert_eq!(response.status, 200);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body, serde_json::json!({ "hello": "ada" }));
}

#[tokio::test]
async fn legacy_handler_streams_in_order() {
    let (_fs, server) = server_with(
        &[
            ("/pages/index.jsx", "export default function Home() { return null; }"),
            (
                "/pages/api/stream.js",
                "module.exports.default = (req, res) => { res.write('A'); res.write('B'); res.end('C'); };",
            ),
        ],
        ServerOptions::default(),
    );

    let events: Arc<Mutex<Vec<String>>> = Arc::default();
    let starts = Arc::clone(&events);
    let chunks = Arc::clone(&events);
    let ends = Arc::clone(&events);

    server
        .handle_streaming_request(
            "GET",
            "/api/stream",
            &[],
            None,
            StreamingCallbacks {
                on_start: Box::new(move |status, text, _headers| {
                    starts.lock().push(format!("start:{status}:{text}"));
                }),
                on_chunk: Box::new(move |chunk| {
                    chunks
                        .lock()
                        .push(format!("chunk:{}", String::from_utf8_lossy(chunk)));
                }),
                on_end: Box::new(move || {
                    ends.lock().push("end".to_string());
                }),
            },
        )
        .await;

    assert_eq!(
        *events.lock(),
        vec![
            "start:200:OK".to_string(),
            "chunk:A".to_string(),
            "chunk:B".to_string(),
            "chunk:C".to_string(),
            "end".to_string(),
        ]
    );
}

#[tokio::test]
async fn handler_timeout_fails_with_500() {
    let (_fs, server) = server_with(
        &[
            ("/pages/index.jsx", "export default function Home() { return null; }"),
            (
                "/pages/api/hang.js",
                "module.exports.default = (req, res) => { res.write('never ends'); };",
            ),
        ],
        ServerOptions::default(),
    );
    let server = server.with_handler_timeout(Duration::from_millis(50));

    let response = get(&server, "/api/hang").await;
    assert_eq!(response.status, 500);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert!(body["error"].as_str().unwrap().contains("timed out"));
}

#[tokio::test]
async fn unknown_page_gets_builtin_404() {
    let (_fs, server) = server_with(
        &[("/pages/index.jsx", "export default function Home() { return null; }")],
        ServerOptions::default(),
    );

    let response = get(&server, "/definitely/missing").await;
    assert_eq!(response.status, 404);
    assert!(response.body_text().contains("404"));
    assert_eq!(
        response.header("content-type"),
        Some("text/html; charset=utf-8")
    );
}

#[tokio::test]
async fn custom_404_page_is_used_in_pages_mode() {
    let (_fs, server) = server_with(
        &[
            ("/pages/index.jsx", "export default function Home() { return null; }"),
            ("/pages/404.jsx", "export default function Missing() { return null; }"),
        ],
        ServerOptions::default(),
    );

    let response = get(&server, "/missing").await;
    assert_eq!(response.status, 404);
    assert!(response.body_text().contains("/_next/pages/404.js"));
}

#[tokio::test]
async fn app_not_found_convention_is_used() {
    let (_fs, server) = server_with(
        &[
            ("/app/layout.tsx", "export default function Root({ children }) { return children; }"),
            ("/app/page.tsx", "export default function Home() { return null; }"),
            ("/app/not-found.tsx", "export default function Missing() { return null; }"),
        ],
        ServerOptions::default(),
    );

    let response = get(&server, "/missing").await;
    assert_eq!(response.status, 404);
    assert!(response.body_text().contains("/_next/app/app/not-found.js"));
}

#[tokio::test]
async fn shims_are_served() {
    let (_fs, server) = server_with(
        &[("/pages/index.jsx", "export default function Home() { return null; }")],
        ServerOptions::default(),
    );

    let link = get(&server, "/_next/shims/link").await;
    assert_eq!(link.status, 200);
    assert_eq!(link.header("content-type"), Some("application/javascript"));
    assert!(link.body_text().contains("export default function Link"));

    let unknown = get(&server, "/_next/shims/nope").await;
    assert_eq!(unknown.status, 404);
}

#[tokio::test]
async fn app_lazy_load_resolves_dynamic_segments() {
    let (_fs, server) = server_with(
        &[(
            "/app/users/[id]/page.tsx",
            "export default function User() { return null; }",
        )],
        ServerOptions::default(),
    );

    // Literal file path with extension swap.
    let by_file = get(&server, "/_next/app/app/users/[id]/page.js").await;
    assert_eq!(by_file.status, 200);

    // Client-constructed URL from a concrete pathname.
    let by_pathname = get(&server, "/_next/app/app/users/42/page.js").await;
    assert_eq!(by_pathname.status, 200);
    assert_eq!(by_file.body, by_pathname.body);
}

#[tokio::test]
async fn public_asset_without_prefix() {
    let (_fs, server) = server_with(
        &[
            ("/pages/index.jsx", "export default function Home() { return null; }"),
            ("/public/robots.txt", "User-agent: *\n"),
        ],
        ServerOptions::default(),
    );

    let response = get(&server, "/robots.txt").await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"User-agent: *\n");
}

#[tokio::test]
async fn extensionless_module_probing() {
    let (_fs, server) = server_with(
        &[
            ("/pages/index.jsx", "export default function Home() { return null; }"),
            ("/lib/util.ts", "export const n = 1;"),
            ("/components/index.tsx", "export default function C() { return null; }"),
        ],
        ServerOptions::default(),
    );

    let direct = get(&server, "/lib/util").await;
    assert_eq!(direct.status, 200);
    assert_eq!(direct.header("content-type"), Some("application/javascript"));

    let index = get(&server, "/components").await;
    assert_eq!(index.status, 200);
}

#[tokio::test]
async fn handler_error_becomes_500_json() {
    let (_fs, server) = server_with(
        &[
            ("/pages/index.jsx", "export default function Home() { return null; }"),
            (
                "/pages/api/boom.js",
                "module.exports.default = () => { throw new Error('exploded'); };",
            ),
        ],
        ServerOptions::default(),
    );

    let response = get(&server, "/api/boom").await;
    assert_eq!(response.status, 500);
    assert!(response.body_text().contains("exploded"));
}

#[tokio::test]
async fn missing_api_route_is_404_json() {
    let (_fs, server) = server_with(
        &[("/pages/index.jsx", "export default function Home() { return null; }")],
        ServerOptions::default(),
    );

    let response = get(&server, "/api/nothing").await;
    assert_eq!(response.status, 404);
    assert_eq!(response.header("content-type"), Some("application/json"));
}
