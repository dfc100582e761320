//! Framework shim modules.
//!
//! The import map points framework-internal specifiers (`next/link`,
//! `next/router`, ...) at `/_next/shims/<name>`, where the dispatcher
//! serves these synthetic ES modules: browser-compatible subsets of the
//! emulated framework's runtime surface. They lean on two globals wired
//! up by the HTML shell: `__NEXT_BASE_PATH__` and `__loftNavigate`.

/// Resolve a shim name to its module source.
pub fn shim_source(name: &str) -> Option<&'static str> {
    match name {
        "link" => Some(LINK),
        "router" => Some(ROUTER),
        "head" => Some(HEAD),
        "navigation" => Some(NAVIGATION),
        "image" => Some(IMAGE),
        "dynamic" => Some(DYNAMIC),
        "script" => Some(SCRIPT),
        "font-google" => Some(FONT_GOOGLE),
        "font-local" => Some(FONT_LOCAL),
        _ => None,
    }
}

/// Names served under the shim root, in import-map order.
pub const SHIM_NAMES: &[&str] = &[
    "link",
    "router",
    "head",
    "navigation",
    "image",
    "dynamic",
    "script",
    "font-google",
    "font-local",
];

const LINK: &str = r#"import React from "react";

function withBasePath(href) {
  const base = window.__NEXT_BASE_PATH__ || "";
  if (typeof href !== "string" || href.startsWith("http") || href.startsWith(base + "/")) {
    return href;
  }
  return base + href;
}

export default function Link(props) {
  const { href, children, ...rest } = props;
  delete rest.prefetch;
  delete rest.scroll;
  delete rest.replace;
  const onClick = (event) => {
    if (event.defaultPrevented || event.metaKey || event.ctrlKey || event.shiftKey) return;
    if (typeof href !== "string" || href.startsWith("http")) return;
    event.preventDefault();
    if (window.__loftNavigate) {
      window.__loftNavigate(href);
    } else {
      window.location.href = withBasePath(href);
    }
    if (props.onClick) props.onClick(event);
  };
  return React.createElement("a", { href: withBasePath(href), onClick, ...rest }, children);
}
"#;

const ROUTER: &str = r#"import React from "react";

function currentPathname() {
  const base = window.__NEXT_BASE_PATH__ || "";
  let pathname = window.location.pathname;
  if (base && pathname.startsWith(base)) pathname = pathname.slice(base.length) || "/";
  return pathname;
}

function currentQuery() {
  const query = {};
  new URLSearchParams(window.location.search).forEach((value, key) => {
    query[key] = value;
  });
  return Object.assign(query, window.__LOFT_ROUTE_PARAMS__ || {});
}

export function useRouter() {
  const [, forceUpdate] = React.useState(0);
  React.useEffect(() => {
    const onPop = () => forceUpdate((n) => n + 1);
    window.addEventListener("popstate", onPop);
    return () => window.removeEventListener("popstate", onPop);
  }, []);
  return {
    pathname: currentPathname(),
    asPath: currentPathname() + window.location.search,
    query: currentQuery(),
    push(href) { if (window.__loftNavigate) window.__loftNavigate(href); },
    replace(href) { if (window.__loftNavigate) window.__loftNavigate(href, { replace: true }); },
    back() { window.history.back(); },
    reload() { window.location.reload(); },
    prefetch() { return Promise.resolve(); },
  };
}

export function withRouter(Component) {
  return function WithRouter(props) {
    const router = useRouter();
    return React.createElement(Component, { ...props, router });
  };
}

export default { useRouter, withRouter };
"#;

const HEAD: &str = r#"import React from "react";

// Hoists <title> and <meta> children into document.head on mount.
export default function Head({ children }) {
  React.useEffect(() => {
    const nodes = React.Children.toArray(children);
    const added = [];
    for (const node of nodes) {
      if (!node || !node.type) continue;
      if (node.type === "title") {
        document.title = node.props.children;
      } else if (node.type === "meta" || node.type === "link") {
        const el = document.createElement(node.type);
        for (const [key, value] of Object.entries(node.props || {})) {
          if (key !== "children") el.setAttribute(key, value);
        }
        document.head.appendChild(el);
        added.push(el);
      }
    }
    return () => { for (const el of added) el.remove(); };
  }, [children]);
  return null;
}
"#;

const NAVIGATION: &str = r#"import React from "react";

export const NOT_FOUND_DIGEST = "NEXT_NOT_FOUND";
export const REDIRECT_DIGEST = "NEXT_REDIRECT";

export function notFound() {
  const error = new Error(NOT_FOUND_DIGEST);
  error.digest = NOT_FOUND_DIGEST;
  throw error;
}

export function redirect(url) {
  const error = new Error(REDIRECT_DIGEST + ";" + url);
  error.digest = REDIRECT_DIGEST;
  error.url = url;
  throw error;
}

function strippedPathname() {
  const base = window.__NEXT_BASE_PATH__ || "";
  let pathname = window.location.pathname;
  if (base && pathname.startsWith(base)) pathname = pathname.slice(base.length) || "/";
  return pathname;
}

export function usePathname() {
  const [pathname, setPathname] = React.useState(strippedPathname());
  React.useEffect(() => {
    const onPop = () => setPathname(strippedPathname());
    window.addEventListener("popstate", onPop);
    return () => window.removeEventListener("popstate", onPop);
  }, []);
  return pathname;
}

export function useSearchParams() {
  return new URLSearchParams(window.location.search);
}

export function useParams() {
  return window.__LOFT_ROUTE_PARAMS__ || {};
}

export function useRouter() {
  return {
    push(href) { if (window.__loftNavigate) window.__loftNavigate(href); },
    replace(href) { if (window.__loftNavigate) window.__loftNavigate(href, { replace: true }); },
    back() { window.history.back(); },
    forward() { window.history.forward(); },
    refresh() { if (window.__loftRerender) window.__loftRerender(); },
  };
}
"#;

const IMAGE: &str = r#"import React from "react";

export default function Image(props) {
  const { src, alt, fill, loader, placeholder, blurDataURL, priority, quality, ...rest } = props;
  const base = window.__NEXT_BASE_PATH__ || "";
  const resolved = typeof src === "string" && src.startsWith("/") ? base + src : src;
  const style = fill
    ? { position: "absolute", inset: 0, width: "100%", height: "100%", objectFit: "cover", ...rest.style }
    : rest.style;
  return React.createElement("img", { ...rest, src: resolved, alt: alt || "", style });
}
"#;

const DYNAMIC: &str = r#"import React from "react";

export default function dynamic(loader, options) {
  options = options || {};
  const Lazy = React.lazy(() =>
    Promise.resolve()
      .then(loader)
      .then((mod) => (mod && mod.default ? mod : { default: mod }))
  );
  const fallback = options.loading ? React.createElement(options.loading) : null;
  return function DynamicComponent(props) {
    return React.createElement(
      React.Suspense,
      { fallback },
      React.createElement(Lazy, props)
    );
  };
}
"#;

const SCRIPT: &str = r#"import React from "react";

export default function Script(props) {
  const { src, children, strategy, onLoad, ...rest } = props;
  React.useEffect(() => {
    const el = document.createElement("script");
    if (src) el.src = src;
    if (children) el.textContent = Array.isArray(children) ? children.join("") : String(children);
    for (const [key, value] of Object.entries(rest)) {
      if (key !== "dangerouslySetInnerHTML") el.setAttribute(key, value);
    }
    if (onLoad) el.addEventListener("load", onLoad);
    document.body.appendChild(el);
    return () => el.remove();
  }, [src]);
  return null;
}
"#;

const FONT_GOOGLE: &str = r#"function loadStylesheet(family) {
  const id = "loft-font-" + family.replace(/\s+/g, "-").toLowerCase();
  if (!document.getElementById(id)) {
    const link = document.createElement("link");
    link.id = id;
    link.rel = "stylesheet";
    link.href = "https://fonts.googleapis.com/css2?family=" + family.replace(/\s+/g, "+") + ":wght@400;500;600;700&display=swap";
    document.head.appendChild(link);
  }
}

function makeFont(family) {
  return function (options) {
    loadStylesheet(family);
    const variable = options && options.variable;
    if (variable) {
      document.documentElement.style.setProperty(variable, family);
    }
    return {
      className: "",
      variable: variable || "",
      style: { fontFamily: '"' + family + '", sans-serif' },
    };
  };
}

export const Inter = makeFont("Inter");
export const Roboto = makeFont("Roboto");
export const Open_Sans = makeFont("Open Sans");
export const Lato = makeFont("Lato");
export const Montserrat = makeFont("Montserrat");
export const Poppins = makeFont("Poppins");
export const Geist = makeFont("Geist");
export const Geist_Mono = makeFont("Geist Mono");
"#;

const FONT_LOCAL: &str = r#"export default function localFont(options) {
  options = options || {};
  const src = Array.isArray(options.src) ? options.src : [{ path: options.src }];
  const family = options.variable || "loft-local-font";
  const base = window.__NEXT_BASE_PATH__ || "";
  const faces = src
    .filter((entry) => entry && entry.path)
    .map((entry) => {
      const url = entry.path.startsWith("/") ? base + entry.path : entry.path;
      return "@font-face { font-family: \"" + family + "\"; src: url(\"" + url + "\"); " +
        (entry.weight ? "font-weight: " + entry.weight + "; " : "") +
        (entry.style ? "font-style: " + entry.style + "; " : "") + "}";
    })
    .join("\n");
  const id = "loft-local-font-" + family.replace(/[^a-z0-9-]/gi, "");
  if (!document.getElementById(id)) {
    const style = document.createElement("style");
    style.id = id;
    style.textContent = faces;
    document.head.appendChild(style);
  }
  return {
    className: "",
    variable: options.variable || "",
    style: { fontFamily: '"' + family + '"' },
  };
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_shim_resolves() {
        for name in SHIM_NAMES {
            assert!(shim_source(name).is_some(), "missing shim: {name}");
        }
        assert!(shim_source("document").is_none());
    }

    #[test]
    fn shims_reference_the_navigation_globals() {
        assert!(shim_source("link").unwrap().contains("__loftNavigate"));
        assert!(shim_source("router").unwrap().contains("__NEXT_BASE_PATH__"));
        assert!(shim_source("navigation").unwrap().contains("NEXT_NOT_FOUND"));
    }
}
