//! File-based route resolution.
//!
//! Two routing paradigms over the virtual filesystem: the pages router
//! (`/pages/users/[id].jsx`) and the app router
//! (`/app/users/[id]/page.tsx` with nested layouts, route groups, and
//! convention files). Resolution is stateless and never fails loudly —
//! an unmatched path is `None`, and dispatcher policy decides what a 404
//! looks like.

pub mod app;
pub mod pages;

pub use app::{resolve_app_handler, resolve_app_page};
pub use pages::resolve_page;

use loft_fs::{path, Vfs};

/// Which routing paradigm serves this project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterMode {
    /// `/pages` file routing
    Pages,
    /// `/app` directory routing with layouts
    App,
}

/// Extension probe order for pages-router files.
pub const PAGE_EXTENSIONS: &[&str] = &["jsx", "tsx", "js", "ts"];

/// Extension probe order for app-router convention files.
pub const APP_EXTENSIONS: &[&str] = &["tsx", "ts", "jsx", "js"];

/// Value bound to a dynamic segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// `[name]` — exactly one URL segment
    Single(String),
    /// `[...name]` / `[[...name]]` — a tail of segments
    Many(Vec<String>),
}

impl ParamValue {
    fn to_json(&self) -> serde_json::Value {
        match self {
            ParamValue::Single(s) => serde_json::Value::String(s.clone()),
            ParamValue::Many(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|s| serde_json::Value::String(s.clone()))
                    .collect(),
            ),
        }
    }
}

/// A resolved route.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteMatch {
    /// Page or handler module
    pub file: String,
    /// Enclosing layouts, outermost first (app router only)
    pub layouts: Vec<String>,
    /// Dynamic-segment bindings in the order they were crossed
    pub params: Vec<(String, ParamValue)>,
    /// Nearest `loading` convention file
    pub loading: Option<String>,
    /// Nearest `error` convention file
    pub error: Option<String>,
    /// Nearest `not-found` convention file
    pub not_found: Option<String>,
}

impl RouteMatch {
    /// Params as a JSON object, the shape served by the route-info
    /// endpoint and handed to handlers.
    pub fn params_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (name, value) in &self.params {
            map.insert(name.clone(), value.to_json());
        }
        serde_json::Value::Object(map)
    }
}

/// Whether the app router should serve this project: forced by
/// preference, else detected from a root `page.*` or `layout.*` under the
/// app directory.
pub fn app_mode(vfs: &dyn Vfs, app_dir: &str, prefer_app_router: Option<bool>) -> bool {
    match prefer_app_router {
        Some(forced) => forced,
        None => {
            find_file(vfs, app_dir, "page", APP_EXTENSIONS).is_some()
                || find_file(vfs, app_dir, "layout", APP_EXTENSIONS).is_some()
        }
    }
}

/// Root `not-found` convention as a renderable route, wrapped in the root
/// layout when one exists. Used when no page matches.
pub fn find_not_found(vfs: &dyn Vfs, app_dir: &str) -> Option<RouteMatch> {
    let file = find_file(vfs, app_dir, "not-found", APP_EXTENSIONS)?;
    let layouts = find_file(vfs, app_dir, "layout", APP_EXTENSIONS)
        .into_iter()
        .collect();
    Some(RouteMatch {
        file,
        layouts,
        ..RouteMatch::default()
    })
}

/// `true` when `p` names an existing file (not a directory).
pub(crate) fn is_file(vfs: &dyn Vfs, p: &str) -> bool {
    vfs.exists(p) && !vfs.is_dir(p)
}

/// First `<dir>/<stem>.<ext>` that exists, probing `extensions` in order.
pub(crate) fn find_file(
    vfs: &dyn Vfs,
    dir: &str,
    stem: &str,
    extensions: &[&str],
) -> Option<String> {
    for ext in extensions {
        let candidate = path::join(dir, &format!("{stem}.{ext}"));
        if is_file(vfs, &candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Sorted child names of a directory; empty when unreadable.
pub(crate) fn children(vfs: &dyn Vfs, dir: &str) -> Vec<String> {
    let mut names = vfs.read_dir(dir).unwrap_or_default();
    names.sort();
    names
}

/// Route group: `(marketing)`.
pub(crate) fn group_name(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
}

/// Single dynamic segment: `[id]` (but not `[...]` or `[[...]]` forms).
pub(crate) fn single_dynamic_name(segment: &str) -> Option<&str> {
    let inner = segment.strip_prefix('[')?.strip_suffix(']')?;
    if inner.starts_with("...") || inner.starts_with('[') || inner.is_empty() {
        return None;
    }
    Some(inner)
}

/// Catch-all segment: `[...slug]`.
pub(crate) fn catch_all_name(segment: &str) -> Option<&str> {
    let inner = segment.strip_prefix("[...")?.strip_suffix(']')?;
    if inner.is_empty() || inner.ends_with(']') {
        return None;
    }
    Some(inner)
}

/// Optional catch-all segment: `[[...slug]]`.
pub(crate) fn optional_catch_all_name(segment: &str) -> Option<&str> {
    let inner = segment.strip_prefix("[[...")?.strip_suffix("]]")?;
    if inner.is_empty() {
        return None;
    }
    Some(inner)
}
