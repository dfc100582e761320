//! HTML shell synthesis.
//!
//! One bootstrap document per page-route request, in a fixed order: base
//! tag, public-env injection, optional Tailwind wiring, CORS-proxy
//! helpers, global stylesheet links, the React Refresh preamble (which
//! must run before any app module), the import map, the HMR client, and
//! the mount script that boots the client-side router.

use crate::config::FrameworkConfig;
use crate::routes::{RouteMatch, RouterMode};
use loft_fs::{path, Vfs};

const HMR_CLIENT: &str = include_str!("../assets/hmr-client.js");
const ROUTER_CLIENT: &str = include_str!("../assets/router.js");

/// Channel tag on HMR postMessage payloads.
pub const HMR_CHANNEL: &str = "loft-hmr";

/// CDN serving the framework runtime (React) and bare npm imports.
pub const RUNTIME_CDN: &str = "https://esm.sh/";

const GLOBAL_STYLESHEETS: &[&str] = &[
    "/styles/globals.css",
    "/styles/global.css",
    "/app/globals.css",
    "/styles.css",
    "/global.css",
];

const TAILWIND_CONFIGS: &[&str] = &["/tailwind.config.js", "/tailwind.config.ts"];

/// Lazy-load URL for a pages-router pathname.
pub fn pages_module_url(prefix: &str, pathname: &str) -> String {
    let logical = if pathname == "/" { "/index" } else { pathname };
    format!("{prefix}/_next/pages{logical}.js")
}

/// Lazy-load URL for an app-router module file.
pub fn app_module_url(prefix: &str, file: &str) -> String {
    format!("{prefix}/_next/app{}.js", path::strip_extension(file))
}

/// Synthesize the bootstrap document for a resolved page route.
pub fn render_shell(
    vfs: &dyn Vfs,
    config: &FrameworkConfig,
    mode: RouterMode,
    pathname: &str,
    route: &RouteMatch,
) -> String {
    let prefix = config.virtual_prefix.as_str();

    let page_url = match mode {
        RouterMode::Pages => pages_module_url(prefix, pathname),
        RouterMode::App => app_module_url(prefix, &route.file),
    };
    let layout_urls: Vec<String> = route
        .layouts
        .iter()
        .map(|layout| app_module_url(prefix, layout))
        .collect();

    let boot = serde_json::json!({
        "prefix": prefix,
        "basePath": config.base_path,
        "channel": HMR_CHANNEL,
        "mode": match mode {
            RouterMode::Pages => "pages",
            RouterMode::App => "app",
        },
        "pathname": pathname,
        "pageUrl": page_url,
        "layoutUrls": layout_urls,
        "params": route.params_json(),
        "conventions": {
            "loading": route.loading.as_deref().map(|f| app_module_url(prefix, f)),
            "error": route.error.as_deref().map(|f| app_module_url(prefix, f)),
            "notFound": route.not_found.as_deref().map(|f| app_module_url(prefix, f)),
        },
    });

    let env_json = {
        let mut map = serde_json::Map::new();
        for (key, value) in config.env_public() {
            map.insert(key, serde_json::Value::String(value));
        }
        serde_json::Value::Object(map).to_string()
    };
    let base_path_json = serde_json::Value::String(config.base_path.clone()).to_string();

    let mut head = String::new();

    // 1. Base tag rooted at the virtual prefix.
    head.push_str(&format!("  <base href=\"{prefix}/\">\n"));

    // 2. Environment injection: public variables only.
    head.push_str(&format!(
        "  <script>\n\
         \x20   window.process = window.process || {{}};\n\
         \x20   window.process.env = {env_json};\n\
         \x20   window.__NEXT_BASE_PATH__ = {base_path_json};\n\
         \x20   window.__LOFT_BOOT__ = {boot};\n\
         \x20 </script>\n"
    ));

    // 3. Tailwind CDN + user config, when the project carries one.
    if let Some(tailwind) = tailwind_config(vfs) {
        head.push_str("  <script src=\"https://cdn.tailwindcss.com\"></script>\n");
        head.push_str(&format!("  <script>\n{tailwind}\n  </script>\n"));
    }

    // 4. CORS-proxy helpers.
    head.push_str(
        "  <script>\n\
         \x20   window.__loftProxyUrl = function (url) {\n\
         \x20     return \"https://corsproxy.io/?url=\" + encodeURIComponent(url);\n\
         \x20   };\n\
         \x20   window.__loftProxyFetch = function (url, init) {\n\
         \x20     return fetch(window.__loftProxyUrl(url), init);\n\
         \x20   };\n\
         \x20 </script>\n",
    );

    // 5. Global stylesheets discovered in the VFS.
    for stylesheet in GLOBAL_STYLESHEETS {
        if vfs.exists(stylesheet) && !vfs.is_dir(stylesheet) {
            head.push_str(&format!(
                "  <link rel=\"stylesheet\" href=\"{prefix}{stylesheet}\">\n"
            ));
        }
    }

    // 6. React Refresh preamble: installed before any app module runs.
    head.push_str(
        "  <script>\n\
         \x20   window.__loftRefreshRegistry = {};\n\
         \x20   window.$RefreshReg$ = function (type, id) {\n\
         \x20     if (type) window.__loftRefreshRegistry[id] = type;\n\
         \x20   };\n\
         \x20   window.$RefreshSig$ = function () { return function (type) { return type; }; };\n\
         \x20   window.$RefreshRuntime$ = {\n\
         \x20     performReactRefresh: function () {\n\
         \x20       if (window.__loftRerender) window.__loftRerender();\n\
         \x20     }\n\
         \x20   };\n\
         \x20 </script>\n",
    );

    // 7. Import map: framework shims + runtime CDN.
    head.push_str(&format!(
        "  <script type=\"importmap\">\n{}\n  </script>\n",
        import_map(prefix)
    ));

    // 8. HMR client.
    head.push_str(&format!("  <script>\n{HMR_CLIENT}\n  </script>\n"));

    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         \x20 <meta charset=\"utf-8\">\n\
         \x20 <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         {head}\
         </head>\n\
         <body>\n\
         \x20 <div id=\"__next\"></div>\n\
         \x20 <script type=\"module\">\n{ROUTER_CLIENT}\n  </script>\n\
         \x20 <script>window.__LOFT_READY_AT__ = Date.now();</script>\n\
         </body>\n\
         </html>\n"
    )
}

/// Built-in 404 document used when no user-supplied page exists.
pub fn builtin_404(pathname: &str) -> String {
    format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head><meta charset=\"utf-8\"><title>404: This page could not be found</title></head>\n\
         <body style=\"font-family: system-ui, sans-serif; text-align: center; padding-top: 20vh;\">\n\
         \x20 <h1>404</h1>\n\
         \x20 <p>This page could not be found: <code>{pathname}</code></p>\n\
         </body>\n\
         </html>\n"
    )
}

fn import_map(prefix: &str) -> String {
    let mut imports = serde_json::Map::new();
    for (specifier, shim) in [
        ("next/link", "link"),
        ("next/router", "router"),
        ("next/head", "head"),
        ("next/navigation", "navigation"),
        ("next/image", "image"),
        ("next/dynamic", "dynamic"),
        ("next/script", "script"),
        ("next/font/google", "font-google"),
        ("next/font/local", "font-local"),
    ] {
        imports.insert(
            specifier.to_string(),
            serde_json::Value::String(format!("{prefix}/_next/shims/{shim}")),
        );
    }
    for (specifier, target) in [
        ("react", format!("{RUNTIME_CDN}react@18")),
        ("react/jsx-runtime", format!("{RUNTIME_CDN}react@18/jsx-runtime")),
        (
            "react/jsx-dev-runtime",
            format!("{RUNTIME_CDN}react@18/jsx-dev-runtime"),
        ),
        ("react-dom", format!("{RUNTIME_CDN}react-dom@18")),
        ("react-dom/client", format!("{RUNTIME_CDN}react-dom@18/client")),
    ] {
        imports.insert(specifier.to_string(), serde_json::Value::String(target));
    }
    let map = serde_json::json!({ "imports": imports });
    serde_json::to_string_pretty(&map).unwrap_or_else(|_| "{\"imports\":{}}".to_string())
}

fn tailwind_config(vfs: &dyn Vfs) -> Option<String> {
    for file in TAILWIND_CONFIGS {
        if vfs.exists(file) && !vfs.is_dir(file) {
            return vfs.read_to_string(file).ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerOptions;
    use loft_fs::MemoryFs;

    fn shell_for(files: &[(&str, &str)], options: ServerOptions, mode: RouterMode) -> String {
        let fs = MemoryFs::with_files(files.iter().copied());
        let config = FrameworkConfig::load(&fs, options);
        let route = RouteMatch {
            file: "/app/page.tsx".to_string(),
            layouts: vec!["/app/layout.tsx".to_string()],
            ..RouteMatch::default()
        };
        render_shell(&fs, &config, mode, "/", &route)
    }

    #[test]
    fn shell_contains_mount_point_import_map_and_hmr() {
        let html = shell_for(&[], ServerOptions::default(), RouterMode::Pages);
        assert!(html.contains("<div id=\"__next\"></div>"));
        assert!(html.contains("\"react\""));
        assert!(html.contains("importmap"));
        assert!(html.contains("next/link"));
        assert!(html.contains("/_next/shims/link"));
        assert!(html.contains("addEventListener(\"message\""));
        assert!(html.contains("__LOFT_READY_AT__"));
    }

    #[test]
    fn pages_mode_boot_points_at_pages_lazy_root() {
        let html = shell_for(&[], ServerOptions::default(), RouterMode::Pages);
        assert!(html.contains("/_next/pages/index.js"));
    }

    #[test]
    fn app_mode_boot_points_at_app_lazy_root_with_layouts() {
        let html = shell_for(&[], ServerOptions::default(), RouterMode::App);
        assert!(html.contains("/_next/app/app/page.js"));
        assert!(html.contains("/_next/app/app/layout.js"));
    }

    #[test]
    fn only_public_env_is_injected() {
        let html = shell_for(
            &[],
            ServerOptions {
                env: vec![
                    ("NEXT_PUBLIC_A".to_string(), "x".to_string()),
                    ("SECRET".to_string(), "s".to_string()),
                ],
                ..ServerOptions::default()
            },
            RouterMode::Pages,
        );
        assert!(html.contains("\"NEXT_PUBLIC_A\":\"x\""));
        assert!(!html.contains("SECRET"));
    }

    #[test]
    fn global_css_and_tailwind_discovery() {
        let html = shell_for(
            &[
                ("/styles/globals.css", "body { margin: 0 }"),
                ("/tailwind.config.js", "tailwind.config = { theme: {} };"),
            ],
            ServerOptions::default(),
            RouterMode::Pages,
        );
        assert!(html.contains("<link rel=\"stylesheet\" href=\"/styles/globals.css\">"));
        assert!(html.contains("cdn.tailwindcss.com"));
        assert!(html.contains("tailwind.config = { theme: {} };"));
    }

    #[test]
    fn virtual_prefix_flows_into_urls() {
        let html = shell_for(
            &[("/styles.css", "")],
            ServerOptions {
                virtual_prefix: Some("/__virtual__/3000".to_string()),
                ..ServerOptions::default()
            },
            RouterMode::Pages,
        );
        assert!(html.contains("<base href=\"/__virtual__/3000/\">"));
        assert!(html.contains("/__virtual__/3000/_next/shims/router"));
        assert!(html.contains("/__virtual__/3000/styles.css"));
    }

    #[test]
    fn refresh_preamble_precedes_router_module() {
        let html = shell_for(&[], ServerOptions::default(), RouterMode::Pages);
        let preamble = html.find("$RefreshReg$").unwrap();
        let mount = html.find("createRoot").unwrap();
        assert!(preamble < mount);
    }
}
