//! Pages-router resolution.
//!
//! `/users/42` finds `/pages/users/42.jsx`, `/pages/users/42/index.jsx`,
//! or walks the tree binding `[id]`-style dynamic segments. Probe order
//! at each level: exact child, dynamic directory, dynamic file, catch-all
//! file.

use super::{
    catch_all_name, children, find_file, is_file, single_dynamic_name, ParamValue, RouteMatch,
    PAGE_EXTENSIONS,
};
use loft_fs::{path, Vfs};

/// Resolve a pathname against the pages directory.
pub fn resolve_page(vfs: &dyn Vfs, pages_dir: &str, pathname: &str) -> Option<RouteMatch> {
    let logical = if pathname == "/" { "/index" } else { pathname };

    // Direct file: <pagesDir>/<P>.<ext>
    for ext in PAGE_EXTENSIONS {
        let candidate = format!("{pages_dir}{logical}.{ext}");
        if is_file(vfs, &candidate) {
            return Some(RouteMatch {
                file: candidate,
                ..RouteMatch::default()
            });
        }
    }

    // Directory index: <pagesDir>/<P>/index.<ext>
    let dir = format!("{pages_dir}{logical}");
    if let Some(file) = find_file(vfs, &dir, "index", PAGE_EXTENSIONS) {
        return Some(RouteMatch {
            file,
            ..RouteMatch::default()
        });
    }

    // Dynamic resolution
    let segments = path::segments(logical);
    walk(vfs, pages_dir, &segments, Vec::new())
}

fn walk(
    vfs: &dyn Vfs,
    dir: &str,
    segments: &[&str],
    params: Vec<(String, ParamValue)>,
) -> Option<RouteMatch> {
    let Some((segment, rest)) = segments.split_first() else {
        // Ran out of URL inside a directory: only an index file matches.
        let file = find_file(vfs, dir, "index", PAGE_EXTENSIONS)?;
        return Some(RouteMatch {
            file,
            params,
            ..RouteMatch::default()
        });
    };

    // Exact-named child directory
    let exact_dir = path::join(dir, segment);
    if vfs.is_dir(&exact_dir) {
        if let Some(found) = walk(vfs, &exact_dir, rest, params.clone()) {
            return Some(found);
        }
    }

    // Exact-named child file (terminal only)
    if rest.is_empty() {
        if let Some(file) = find_file(vfs, dir, segment, PAGE_EXTENSIONS) {
            return Some(RouteMatch {
                file,
                params,
                ..RouteMatch::default()
            });
        }
    }

    let names = children(vfs, dir);

    // Dynamic single-segment directory: [name]/
    for name in &names {
        let child = path::join(dir, name);
        if !vfs.is_dir(&child) {
            continue;
        }
        if let Some(param) = single_dynamic_name(name) {
            let mut bound = params.clone();
            bound.push((param.to_string(), ParamValue::Single(segment.to_string())));
            if let Some(found) = walk(vfs, &child, rest, bound) {
                return Some(found);
            }
        }
    }

    // Dynamic single-segment file: [name].<ext> (terminal only)
    if rest.is_empty() {
        for name in &names {
            let child = path::join(dir, name);
            if vfs.is_dir(&child) {
                continue;
            }
            let stem = path::strip_extension(name);
            let ext = path::extension(name).unwrap_or("");
            if !PAGE_EXTENSIONS.contains(&ext) {
                continue;
            }
            if let Some(param) = single_dynamic_name(stem) {
                let mut bound = params;
                bound.push((param.to_string(), ParamValue::Single(segment.to_string())));
                return Some(RouteMatch {
                    file: child,
                    params: bound,
                    ..RouteMatch::default()
                });
            }
        }
    }

    // Catch-all file: [...name].<ext> binds the whole remainder
    for name in &names {
        let child = path::join(dir, name);
        if vfs.is_dir(&child) {
            continue;
        }
        let stem = path::strip_extension(name);
        let ext = path::extension(name).unwrap_or("");
        if !PAGE_EXTENSIONS.contains(&ext) {
            continue;
        }
        if let Some(param) = catch_all_name(stem) {
            let mut tail = vec![segment.to_string()];
            tail.extend(rest.iter().map(|s| s.to_string()));
            let mut bound = params;
            bound.push((param.to_string(), ParamValue::Many(tail)));
            return Some(RouteMatch {
                file: child,
                params: bound,
                ..RouteMatch::default()
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use loft_fs::MemoryFs;

    fn fs() -> MemoryFs {
        MemoryFs::with_files([
            ("/pages/index.jsx", ""),
            ("/pages/about.tsx", ""),
            ("/pages/blog/index.js", ""),
            ("/pages/users/[id].jsx", ""),
            ("/pages/users/[id]/posts.jsx", ""),
            ("/pages/docs/[...path].tsx", ""),
            ("/pages/api/hello.js", ""),
        ])
    }

    fn resolve(pathname: &str) -> Option<RouteMatch> {
        resolve_page(&fs(), "/pages", pathname)
    }

    #[test]
    fn root_maps_to_index() {
        assert_eq!(resolve("/").unwrap().file, "/pages/index.jsx");
    }

    #[test]
    fn direct_file_first_extension_wins() {
        assert_eq!(resolve("/about").unwrap().file, "/pages/about.tsx");
    }

    #[test]
    fn directory_index_fallback() {
        assert_eq!(resolve("/blog").unwrap().file, "/pages/blog/index.js");
    }

    #[test]
    fn dynamic_file_binds_param() {
        let route = resolve("/users/42").unwrap();
        assert_eq!(route.file, "/pages/users/[id].jsx");
        assert_eq!(
            route.params,
            vec![("id".to_string(), ParamValue::Single("42".to_string()))]
        );
    }

    #[test]
    fn dynamic_directory_then_exact_file() {
        let route = resolve("/users/42/posts").unwrap();
        assert_eq!(route.file, "/pages/users/[id]/posts.jsx");
        assert_eq!(
            route.params,
            vec![("id".to_string(), ParamValue::Single("42".to_string()))]
        );
    }

    #[test]
    fn catch_all_binds_tail() {
        let route = resolve("/docs/guide/install/linux").unwrap();
        assert_eq!(route.file, "/pages/docs/[...path].tsx");
        assert_eq!(
            route.params,
            vec![(
                "path".to_string(),
                ParamValue::Many(vec![
                    "guide".to_string(),
                    "install".to_string(),
                    "linux".to_string()
                ])
            )]
        );
    }

    #[test]
    fn exact_beats_dynamic() {
        let fs = MemoryFs::with_files([
            ("/pages/users/new.jsx", ""),
            ("/pages/users/[id].jsx", ""),
        ]);
        assert_eq!(
            resolve_page(&fs, "/pages", "/users/new").unwrap().file,
            "/pages/users/new.jsx"
        );
        assert_eq!(
            resolve_page(&fs, "/pages", "/users/7").unwrap().file,
            "/pages/users/[id].jsx"
        );
    }

    #[test]
    fn unmatched_is_none() {
        assert!(resolve("/missing/deeply").is_none());
        assert!(resolve("/users").is_none());
    }
}
