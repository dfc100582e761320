//! Helpers for virtual paths.
//!
//! A virtual path is an absolute, `/`-rooted string. These helpers never
//! touch `std::path` — virtual paths are not OS paths and must behave the
//! same on every host.

/// Normalize a path to `/`-rooted form with no trailing slash and no empty
/// segments. `""` and `"/"` both normalize to `"/"`.
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Join a directory and a child name.
pub fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Parent directory of a path, or `"/"` at the root.
pub fn parent(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

/// Final component of a path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Extension without the dot, if any.
pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => Some(&name[idx + 1..]),
        _ => None,
    }
}

/// Path without its extension.
pub fn strip_extension(path: &str) -> &str {
    match extension(path) {
        Some(ext) => &path[..path.len() - ext.len() - 1],
        None => path,
    }
}

/// Non-empty segments of a normalized path.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Whether `path` is inside `dir` (or equal to it).
pub fn starts_with_dir(path: &str, dir: &str) -> bool {
    if dir == "/" {
        return true;
    }
    path == dir || path.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_segments() {
        assert_eq!(normalize("/a//b/./c/"), "/a/b/c");
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("a/b"), "/a/b");
    }

    #[test]
    fn join_handles_root() {
        assert_eq!(join("/", "pages"), "/pages");
        assert_eq!(join("/app", "page.tsx"), "/app/page.tsx");
    }

    #[test]
    fn parent_walks_up() {
        assert_eq!(parent("/a/b/c"), "/a/b");
        assert_eq!(parent("/a"), "/");
        assert_eq!(parent("/"), "/");
    }

    #[test]
    fn extension_extraction() {
        assert_eq!(extension("/pages/index.jsx"), Some("jsx"));
        assert_eq!(extension("/pages/.env"), None);
        assert_eq!(extension("/pages/readme"), None);
        assert_eq!(strip_extension("/pages/index.jsx"), "/pages/index");
    }

    #[test]
    fn dir_prefix_check() {
        assert!(starts_with_dir("/pages/a.jsx", "/pages"));
        assert!(!starts_with_dir("/pages-extra/a.jsx", "/pages"));
        assert!(starts_with_dir("/anything", "/"));
    }
}
