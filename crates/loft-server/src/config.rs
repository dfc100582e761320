//! Framework configuration discovery.
//!
//! At construction the server scans the virtual filesystem for the
//! emulated framework's config files: `next.config.{js,mjs,ts}` for
//! `basePath`/`assetPrefix` (extracted as quoted string values — the
//! config is user JS we do not execute), and `tsconfig.json`/
//! `jsconfig.json` for path aliases. Malformed files are treated as
//! absent. Explicit options always beat discovered values.

use loft_fs::{path, Vfs};
use parking_lot::RwLock;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::sync::OnceLock;

/// Prefix marking env vars as safe to expose in HTML.
pub const PUBLIC_ENV_PREFIX: &str = "NEXT_PUBLIC_";

const FRAMEWORK_CONFIG_FILES: &[&str] = &["/next.config.js", "/next.config.mjs", "/next.config.ts"];
const PATHS_CONFIG_FILES: &[&str] = &["/tsconfig.json", "/jsconfig.json"];

/// Explicit options supplied by the embedder; unset fields fall back to
/// discovery, then defaults.
#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Pages-router directory (default `/pages`)
    pub pages_dir: Option<String>,
    /// App-router directory (default `/app`)
    pub app_dir: Option<String>,
    /// Public static assets directory (default `/public`)
    pub public_dir: Option<String>,
    /// Force app router on/off; `None` auto-detects
    pub prefer_app_router: Option<bool>,
    /// URL prefix stripped from every request
    pub base_path: Option<String>,
    /// Additional URL prefix for static assets
    pub asset_prefix: Option<String>,
    /// Virtual-origin prefix used in generated URLs (e.g. `/__virtual__/3000`)
    pub virtual_prefix: Option<String>,
    /// Initial environment variables
    pub env: Vec<(String, String)>,
}

/// Resolved configuration, shared across the dispatcher.
pub struct FrameworkConfig {
    /// Pages-router directory
    pub pages_dir: String,
    /// App-router directory
    pub app_dir: String,
    /// Public assets directory
    pub public_dir: String,
    /// Tri-state router preference
    pub prefer_app_router: Option<bool>,
    /// Normalized base path, or empty
    pub base_path: String,
    /// Normalized asset prefix, or empty
    pub asset_prefix: String,
    /// Virtual-origin prefix used when emitting URLs, or empty
    pub virtual_prefix: String,
    /// Alias prefix mappings, longest prefix first
    pub aliases: Vec<(String, String)>,
    env: RwLock<FxHashMap<String, String>>,
}

impl FrameworkConfig {
    /// Load configuration from the VFS, layered under `options`.
    pub fn load(vfs: &dyn Vfs, options: ServerOptions) -> Self {
        let discovered = discover_framework_config(vfs);
        let base_path = options
            .base_path
            .map(|p| normalize_prefix(&p))
            .unwrap_or(discovered.base_path);
        let asset_prefix = options
            .asset_prefix
            .map(|p| normalize_prefix(&p))
            .unwrap_or(discovered.asset_prefix);

        Self {
            pages_dir: options.pages_dir.unwrap_or_else(|| "/pages".to_string()),
            app_dir: options.app_dir.unwrap_or_else(|| "/app".to_string()),
            public_dir: options.public_dir.unwrap_or_else(|| "/public".to_string()),
            prefer_app_router: options.prefer_app_router,
            base_path,
            asset_prefix,
            virtual_prefix: options.virtual_prefix.unwrap_or_default(),
            aliases: discover_aliases(vfs),
            env: RwLock::new(options.env.into_iter().collect()),
        }
    }

    /// Set one environment variable.
    pub fn set_env(&self, name: &str, value: &str) {
        self.env.write().insert(name.to_string(), value.to_string());
    }

    /// Read one environment variable.
    pub fn env(&self, name: &str) -> Option<String> {
        self.env.read().get(name).cloned()
    }

    /// All environment variables, sorted by name. Handlers see everything.
    pub fn env_all(&self) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = self
            .env
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        vars.sort();
        vars
    }

    /// Only the variables safe to write into HTML.
    pub fn env_public(&self) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = self
            .env
            .read()
            .iter()
            .filter(|(k, _)| k.starts_with(PUBLIC_ENV_PREFIX))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        vars.sort();
        vars
    }
}

struct DiscoveredPrefixes {
    base_path: String,
    asset_prefix: String,
}

fn discover_framework_config(vfs: &dyn Vfs) -> DiscoveredPrefixes {
    static BASE_RE: OnceLock<Regex> = OnceLock::new();
    static ASSET_RE: OnceLock<Regex> = OnceLock::new();
    let base_re = BASE_RE
        .get_or_init(|| Regex::new(r#"basePath\s*:\s*["']([^"']*)["']"#).expect("valid regex"));
    let asset_re = ASSET_RE
        .get_or_init(|| Regex::new(r#"assetPrefix\s*:\s*["']([^"']*)["']"#).expect("valid regex"));

    for file in FRAMEWORK_CONFIG_FILES {
        if !vfs.exists(file) {
            continue;
        }
        let Ok(source) = vfs.read_to_string(file) else {
            continue;
        };
        let base_path = base_re
            .captures(&source)
            .map(|c| normalize_prefix(&c[1]))
            .unwrap_or_default();
        let asset_prefix = asset_re
            .captures(&source)
            .map(|c| normalize_prefix(&c[1]))
            .unwrap_or_default();
        return DiscoveredPrefixes {
            base_path,
            asset_prefix,
        };
    }
    DiscoveredPrefixes {
        base_path: String::new(),
        asset_prefix: String::new(),
    }
}

/// Force a leading `/`, drop trailing `/`. Empty stays empty.
fn normalize_prefix(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "/" {
        return String::new();
    }
    let mut out = String::with_capacity(trimmed.len() + 1);
    if !trimmed.starts_with('/') {
        out.push('/');
    }
    out.push_str(trimmed.trim_end_matches('/'));
    out
}

/// Read `compilerOptions.paths` from the TypeScript-style config. Only
/// star patterns register prefix mappings; the first target wins.
fn discover_aliases(vfs: &dyn Vfs) -> Vec<(String, String)> {
    for file in PATHS_CONFIG_FILES {
        if !vfs.exists(file) {
            continue;
        }
        let Ok(source) = vfs.read_to_string(file) else {
            continue;
        };
        let Ok(json) = serde_json::from_str::<serde_json::Value>(&strip_line_comments(&source))
        else {
            tracing::debug!(file, "ignoring malformed paths config");
            continue;
        };
        let Some(compiler) = json.get("compilerOptions") else {
            continue;
        };
        let base_url = compiler.get("baseUrl").and_then(|v| v.as_str()).unwrap_or(".");
        let Some(paths) = compiler.get("paths").and_then(|v| v.as_object()) else {
            continue;
        };

        let mut aliases = Vec::new();
        for (pattern, targets) in paths {
            let Some(alias) = pattern.strip_suffix('*') else {
                continue;
            };
            let Some(first) = targets
                .as_array()
                .and_then(|arr| arr.first())
                .and_then(|v| v.as_str())
            else {
                continue;
            };
            let Some(target) = first.strip_suffix('*') else {
                continue;
            };
            aliases.push((alias.to_string(), resolve_against_base(base_url, target)));
        }
        // Longest prefix first so `@/components/` beats `@/`.
        aliases.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        if !aliases.is_empty() {
            return aliases;
        }
    }
    Vec::new()
}

fn resolve_against_base(base_url: &str, target: &str) -> String {
    let base = path::normalize(base_url.trim_start_matches('.'));
    let joined = if base == "/" {
        format!("/{}", target.trim_start_matches("./").trim_start_matches('/'))
    } else {
        format!("{base}/{}", target.trim_start_matches("./").trim_start_matches('/'))
    };
    // Alias targets keep a trailing slash when the pattern had one.
    if target.ends_with('/') {
        format!("{}/", path::normalize(&joined))
    } else {
        path::normalize(&joined)
    }
}

/// Drop `//` line comments so hand-written tsconfig files parse as JSON.
fn strip_line_comments(source: &str) -> String {
    source
        .lines()
        .map(|line| {
            if line.trim_start().starts_with("//") {
                ""
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
