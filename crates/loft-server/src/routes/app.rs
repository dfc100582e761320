//! App-router resolution.
//!
//! Walks the app directory segment by segment, collecting `layout.*`
//! files along the way (outermost first). Route groups — `(name)`
//! directories — are transparent in the URL but may contribute layouts.
//! Per-segment tie-break: exact child, group traversal, `[name]`,
//! `[...name]`, `[[...name]]`. After the page is found, the nearest
//! `loading`/`error`/`not-found` ancestors become the route's convention
//! files.

use super::{
    catch_all_name, children, find_file, group_name, optional_catch_all_name, single_dynamic_name,
    ParamValue, RouteMatch, APP_EXTENSIONS,
};
use loft_fs::{path, Vfs};

/// What the walk is looking for in a terminal directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    /// `page.*` — collects layouts and conventions
    Page,
    /// `route.*` — request handlers; no layouts, no conventions
    Route,
}

impl Target {
    fn stem(self) -> &'static str {
        match self {
            Target::Page => "page",
            Target::Route => "route",
        }
    }
}

/// Resolve a pathname to an app-router page with its layout chain and
/// convention files.
pub fn resolve_app_page(vfs: &dyn Vfs, app_dir: &str, pathname: &str) -> Option<RouteMatch> {
    let segments = path::segments(pathname);
    let mut route = walk(vfs, app_dir, &segments, Vec::new(), Vec::new(), Target::Page)?;

    let page_dir = path::parent(&route.file);
    route.loading = nearest_convention(vfs, &page_dir, app_dir, "loading");
    route.error = nearest_convention(vfs, &page_dir, app_dir, "error");
    route.not_found = nearest_convention(vfs, &page_dir, app_dir, "not-found");
    Some(route)
}

/// Resolve a pathname to an app-router request handler (`route.*`).
pub fn resolve_app_handler(vfs: &dyn Vfs, app_dir: &str, pathname: &str) -> Option<RouteMatch> {
    let segments = path::segments(pathname);
    walk(vfs, app_dir, &segments, Vec::new(), Vec::new(), Target::Route)
}

fn walk(
    vfs: &dyn Vfs,
    dir: &str,
    segments: &[&str],
    mut layouts: Vec<String>,
    params: Vec<(String, ParamValue)>,
    target: Target,
) -> Option<RouteMatch> {
    if target == Target::Page {
        if let Some(layout) = find_file(vfs, dir, "layout", APP_EXTENSIONS) {
            if !layouts.contains(&layout) {
                layouts.push(layout);
            }
        }
    }

    let Some((segment, rest)) = segments.split_first() else {
        return finish(vfs, dir, layouts, params, target);
    };

    let names = children(vfs, dir);

    // 1. Exact-named child
    let exact = path::join(dir, segment);
    if vfs.is_dir(&exact) {
        if let Some(found) = walk(vfs, &exact, rest, layouts.clone(), params.clone(), target) {
            return Some(found);
        }
    }

    // 2. Route-group child: retry the same segment inside it
    for name in &names {
        if group_name(name).is_none() {
            continue;
        }
        let group_dir = path::join(dir, name);
        if !vfs.is_dir(&group_dir) {
            continue;
        }
        if let Some(found) = walk(vfs, &group_dir, segments, layouts.clone(), params.clone(), target)
        {
            return Some(found);
        }
    }

    // 3. Single dynamic child: [name]
    for name in &names {
        let child = path::join(dir, name);
        if !vfs.is_dir(&child) {
            continue;
        }
        if let Some(param) = single_dynamic_name(name) {
            let mut bound = params.clone();
            bound.push((param.to_string(), ParamValue::Single(segment.to_string())));
            if let Some(found) = walk(vfs, &child, rest, layouts.clone(), bound, target) {
                return Some(found);
            }
        }
    }

    // 4. Catch-all child: [...name] consumes the remainder
    for name in &names {
        let child = path::join(dir, name);
        if !vfs.is_dir(&child) {
            continue;
        }
        if let Some(param) = catch_all_name(name) {
            let mut tail = vec![segment.to_string()];
            tail.extend(rest.iter().map(|s| s.to_string()));
            let mut bound = params.clone();
            bound.push((param.to_string(), ParamValue::Many(tail)));
            if let Some(found) = walk(vfs, &child, &[], layouts.clone(), bound, target) {
                return Some(found);
            }
        }
    }

    // 5. Optional catch-all child: [[...name]]
    for name in &names {
        let child = path::join(dir, name);
        if !vfs.is_dir(&child) {
            continue;
        }
        if let Some(param) = optional_catch_all_name(name) {
            let mut tail = vec![segment.to_string()];
            tail.extend(rest.iter().map(|s| s.to_string()));
            let mut bound = params.clone();
            bound.push((param.to_string(), ParamValue::Many(tail)));
            if let Some(found) = walk(vfs, &child, &[], layouts.clone(), bound, target) {
                return Some(found);
            }
        }
    }

    None
}

/// Segments exhausted: look for the target file here, then inside route
/// groups, then in an optional catch-all matching the empty remainder.
fn finish(
    vfs: &dyn Vfs,
    dir: &str,
    layouts: Vec<String>,
    params: Vec<(String, ParamValue)>,
    target: Target,
) -> Option<RouteMatch> {
    if let Some(file) = find_file(vfs, dir, target.stem(), APP_EXTENSIONS) {
        return Some(RouteMatch {
            file,
            layouts,
            params,
            ..RouteMatch::default()
        });
    }

    for name in children(vfs, dir) {
        let child = path::join(dir, &name);
        if !vfs.is_dir(&child) {
            continue;
        }
        if group_name(&name).is_some() {
            if let Some(found) = walk(vfs, &child, &[], layouts.clone(), params.clone(), target) {
                return Some(found);
            }
        } else if let Some(param) = optional_catch_all_name(&name) {
            let mut bound = params.clone();
            bound.push((param.to_string(), ParamValue::Many(Vec::new())));
            if let Some(found) = walk(vfs, &child, &[], layouts.clone(), bound, target) {
                return Some(found);
            }
        }
    }

    None
}

/// Nearest convention file, walking from `start_dir` up to the app root.
fn nearest_convention(vfs: &dyn Vfs, start_dir: &str, app_dir: &str, stem: &str) -> Option<String> {
    let mut dir = start_dir.to_string();
    loop {
        if let Some(file) = find_file(vfs, &dir, stem, APP_EXTENSIONS) {
            return Some(file);
        }
        if dir == app_dir || !path::starts_with_dir(&dir, app_dir) {
            return None;
        }
        dir = path::parent(&dir);
    }
}
