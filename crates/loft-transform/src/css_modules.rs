//! CSS-module compilation.
//!
//! A `*.module.css` import becomes a synthesized JS fragment: an object
//! literal mapping original class names to scoped names
//! (`<name>__<hash8>`, hash derived from the file path) plus a `<style>`
//! injection that installs the scoped rules when the module evaluates.
//! Class extraction uses lightningcss; when the stylesheet does not parse,
//! a regex scan over selector-looking positions is the fallback.

use lightningcss::stylesheet::{ParserOptions, StyleSheet};
use lightningcss::visit_types;
use lightningcss::visitor::{Visit, VisitTypes, Visitor};
use regex::Regex;
use std::sync::OnceLock;

/// Compiled form of one CSS module.
#[derive(Debug, Clone)]
pub struct CssModule {
    /// `(original, scoped)` class-name pairs, in first-seen order
    pub classes: Vec<(String, String)>,
    /// Stylesheet text with class selectors renamed to their scoped form
    pub scoped_css: String,
    /// Short path fingerprint used in scoped names and the style-tag id
    pub scope: String,
}

impl CssModule {
    /// JS fragment replacing the import statement: binds `local` to the
    /// class map and injects the scoped rules into the document once.
    pub fn to_js(&self, local: &str) -> String {
        let mut map = serde_json::Map::new();
        for (orig, scoped) in &self.classes {
            map.insert(orig.clone(), serde_json::Value::String(scoped.clone()));
        }
        let literal = serde_json::Value::Object(map).to_string();
        let css = serde_json::Value::String(self.scoped_css.clone()).to_string();
        format!(
            "const {local} = {literal};\n\
             if (typeof document !== \"undefined\" && !document.getElementById(\"loft-css-{scope}\")) {{\n\
             \x20 const __style = document.createElement(\"style\");\n\
             \x20 __style.id = \"loft-css-{scope}\";\n\
             \x20 __style.textContent = {css};\n\
             \x20 document.head.appendChild(__style);\n\
             }}",
            local = local,
            literal = literal,
            css = css,
            scope = self.scope,
        )
    }
}

/// Compile the stylesheet at `path` into a [`CssModule`].
pub fn compile(path: &str, css: &str) -> CssModule {
    let scope = scope_hash(path);
    let classes = match extract_classes_parsed(path, css) {
        Some(classes) => classes,
        None => {
            tracing::warn!(file = path, "CSS parse failed, extracting classes by regex");
            extract_classes_regex(css)
        }
    };

    let mut pairs: Vec<(String, String)> = classes
        .into_iter()
        .map(|name| {
            let scoped = format!("{name}__{scope}");
            (name, scoped)
        })
        .collect();
    // Longest first so `.button-primary` is not clobbered by `.button`.
    pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut scoped_css = css.to_string();
    for (orig, scoped) in &pairs {
        // Boundary is captured rather than looked ahead; the regex crate
        // has no lookaround.
        let pattern = format!(r"\.{}([^\w-]|$)", regex::escape(orig));
        if let Ok(re) = Regex::new(&pattern) {
            scoped_css = re
                .replace_all(&scoped_css, format!(".{scoped}${{1}}").as_str())
                .into_owned();
        }
    }

    // Restore declaration order for the exported map.
    pairs.sort_by_key(|(orig, _)| css.find(&format!(".{orig}")).unwrap_or(usize::MAX));

    CssModule {
        classes: pairs,
        scoped_css,
        scope,
    }
}

/// Short fingerprint of a file path, used to scope class names.
pub fn scope_hash(path: &str) -> String {
    blake3::hash(path.as_bytes()).to_hex()[..8].to_string()
}

struct ClassCollector {
    classes: Vec<String>,
}

impl<'i> Visitor<'i> for ClassCollector {
    type Error = std::convert::Infallible;

    fn visit_types(&self) -> VisitTypes {
        visit_types!(SELECTORS)
    }

    fn visit_selector(
        &mut self,
        selector: &mut lightningcss::selector::Selector<'i>,
    ) -> Result<(), Self::Error> {
        use lightningcss::selector::Component;
        for component in selector.iter_raw_match_order() {
            if let Component::Class(name) = component {
                let name: &str = &name.0;
                if !self.classes.iter().any(|c| c == name) {
                    self.classes.push(name.to_string());
                }
            }
        }
        Ok(())
    }
}

fn extract_classes_parsed(path: &str, css: &str) -> Option<Vec<String>> {
    let mut stylesheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: path.to_string(),
            ..ParserOptions::default()
        },
    )
    .ok()?;

    let mut collector = ClassCollector { classes: Vec::new() };
    stylesheet.visit(&mut collector).ok()?;
    Some(collector.classes)
}

fn extract_classes_regex(css: &str) -> Vec<String> {
    static CLASS_RE: OnceLock<Regex> = OnceLock::new();
    let re = CLASS_RE
        .get_or_init(|| Regex::new(r"\.(-?[A-Za-z_][A-Za-z0-9_-]*)").expect("valid class regex"));

    let mut classes = Vec::new();
    for cap in re.captures_iter(css) {
        let name = cap[1].to_string();
        if !classes.contains(&name) {
            classes.push(name);
        }
    }
    classes
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = ".btn { color: red; }\n.btn-primary:hover { color: blue; }\n";

    #[test]
    fn extracts_and_scopes_classes() {
        let module = compile("/components/Button.module.css", SHEET);
        let names: Vec<&str> = module.classes.iter().map(|(o, _)| o.as_str()).collect();
        assert_eq!(names, vec!["btn", "btn-primary"]);

        for (orig, scoped) in &module.classes {
            assert_eq!(scoped, &format!("{orig}__{}", module.scope));
        }
        assert!(module.scoped_css.contains(&format!(".btn__{}", module.scope)));
        assert!(module
            .scoped_css
            .contains(&format!(".btn-primary__{}:hover", module.scope)));
        // `.btn` must not have eaten the prefix of `.btn-primary`.
        assert!(!module
            .scoped_css
            .contains(&format!(".btn__{}-primary", module.scope)));
    }

    #[test]
    fn scope_is_stable_per_path() {
        let a = compile("/a.module.css", SHEET);
        let b = compile("/a.module.css", SHEET);
        let c = compile("/b.module.css", SHEET);
        assert_eq!(a.scope, b.scope);
        assert_ne!(a.scope, c.scope);
        assert_eq!(a.scope.len(), 8);
    }

    #[test]
    fn js_fragment_binds_local_and_injects_style() {
        let module = compile("/x.module.css", ".title { font-weight: bold; }");
        let js = module.to_js("styles");
        assert!(js.starts_with("const styles = {"));
        assert!(js.contains(&format!("\"title\":\"title__{}\"", module.scope)));
        assert!(js.contains("document.createElement(\"style\")"));
        assert!(js.contains(&format!("loft-css-{}", module.scope)));
    }

    #[test]
    fn regex_fallback_on_unparseable_css() {
        // Unbalanced brace defeats the parser; the regex path still finds
        // the class names.
        let classes = extract_classes_regex(".a { color: red; .b { }");
        assert_eq!(classes, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn ignores_non_class_selectors() {
        let module = compile("/x.module.css", "body { margin: 0; } #app { padding: 0; }");
        assert!(module.classes.is_empty());
        assert_eq!(module.scoped_css, "body { margin: 0; } #app { padding: 0; }");
    }
}
