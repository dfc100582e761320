//! Import-specifier rewriting over a real JS parse.
//!
//! All rewrites here are span-based text splices: the module is parsed
//! with oxc, specifier string literals are located by span, and only those
//! byte ranges are replaced. Comments and ordinary strings can never be
//! touched. When a module does not parse, rewrites are skipped and the
//! text passes through unchanged.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Expression, ExportAllDeclaration, ExportNamedDeclaration, ImportDeclaration,
    ImportDeclarationSpecifier, ImportExpression,
};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::SourceType;

/// Specifiers the engine never redirects to the CDN: relative and absolute
/// paths, the framework-internal family (handled by the import map), and
/// already-absolute URLs.
const RESERVED_PREFIXES: &[&str] = &[".", "/", "next/", "http://", "https://"];

/// One module-specifier string literal, located by byte span (quotes
/// included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecifierRef {
    /// Byte offset of the opening quote
    pub start: usize,
    /// Byte offset one past the closing quote
    pub end: usize,
    /// Unquoted specifier value
    pub value: String,
}

/// A static `import` declaration, with enough shape to synthesize a
/// replacement for the whole statement (CSS-module handling needs the
/// default binding name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportInfo {
    /// Byte span of the entire declaration
    pub start: usize,
    /// One past the end of the declaration
    pub end: usize,
    /// Unquoted specifier value
    pub specifier: String,
    /// Local name of the default binding, if one exists
    pub default_local: Option<String>,
}

#[derive(Default)]
struct SpecifierCollector {
    specifiers: Vec<SpecifierRef>,
}

impl SpecifierCollector {
    fn push(&mut self, span: oxc_span::Span, value: &str) {
        self.specifiers.push(SpecifierRef {
            start: span.start as usize,
            end: span.end as usize,
            value: value.to_string(),
        });
    }
}

impl<'a> Visit<'a> for SpecifierCollector {
    fn visit_import_declaration(&mut self, decl: &ImportDeclaration<'a>) {
        self.push(decl.source.span, decl.source.value.as_str());
        walk::walk_import_declaration(self, decl);
    }

    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        if let Some(source) = &decl.source {
            self.push(source.span, source.value.as_str());
        }
        walk::walk_export_named_declaration(self, decl);
    }

    fn visit_export_all_declaration(&mut self, decl: &ExportAllDeclaration<'a>) {
        self.push(decl.source.span, decl.source.value.as_str());
        walk::walk_export_all_declaration(self, decl);
    }

    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        if let Expression::StringLiteral(lit) = &expr.source {
            self.push(lit.span, lit.value.as_str());
        }
        walk::walk_import_expression(self, expr);
    }
}

/// Source type for parsing a module at `path`; JSX-capable fallback keeps
/// pre-transform sources parseable.
pub fn source_type_for(path: &str) -> SourceType {
    SourceType::from_path(path).unwrap_or_else(|_| SourceType::jsx())
}

/// Collect every module-specifier literal (static imports, export-from,
/// export-all, dynamic imports). Returns `None` when the code does not
/// parse.
pub fn collect_specifiers(code: &str, source_type: SourceType) -> Option<Vec<SpecifierRef>> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, source_type).parse();
    if !ret.errors.is_empty() {
        return None;
    }
    let mut collector = SpecifierCollector::default();
    collector.visit_program(&ret.program);
    collector.specifiers.sort_by_key(|s| s.start);
    Some(collector.specifiers)
}

/// Collect top-level static import declarations with their default
/// bindings. Returns `None` when the code does not parse.
pub fn collect_imports(code: &str, source_type: SourceType) -> Option<Vec<ImportInfo>> {
    use oxc_ast::ast::Statement;

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, source_type).parse();
    if !ret.errors.is_empty() {
        return None;
    }

    let mut imports = Vec::new();
    for stmt in &ret.program.body {
        let Statement::ImportDeclaration(decl) = stmt else {
            continue;
        };
        let default_local = decl.specifiers.as_ref().and_then(|specs| {
            specs.iter().find_map(|spec| match spec {
                ImportDeclarationSpecifier::ImportDefaultSpecifier(default) => {
                    Some(default.local.name.to_string())
                }
                _ => None,
            })
        });
        imports.push(ImportInfo {
            start: decl.span.start as usize,
            end: decl.span.end as usize,
            specifier: decl.source.value.to_string(),
            default_local,
        });
    }
    Some(imports)
}

/// Replace byte ranges in `code`. Ranges must be non-overlapping;
/// processed in ascending order.
pub fn splice(code: &str, mut replacements: Vec<(usize, usize, String)>) -> String {
    replacements.sort_by_key(|(start, _, _)| *start);
    let mut out = String::with_capacity(code.len());
    let mut cursor = 0;
    for (start, end, text) in replacements {
        debug_assert!(start >= cursor && end <= code.len());
        out.push_str(&code[cursor..start]);
        out.push_str(&text);
        cursor = end;
    }
    out.push_str(&code[cursor..]);
    out
}

/// Rewrite every specifier matching a configured alias prefix to an
/// absolute URL: `url_prefix + target + remainder`. Aliases must be
/// ordered longest-prefix-first; the first match wins.
pub fn apply_aliases(
    code: &str,
    source_type: SourceType,
    aliases: &[(String, String)],
    url_prefix: &str,
) -> String {
    if aliases.is_empty() {
        return code.to_string();
    }
    let Some(specifiers) = collect_specifiers(code, source_type) else {
        return code.to_string();
    };

    let replacements: Vec<(usize, usize, String)> = specifiers
        .into_iter()
        .filter_map(|spec| {
            let (alias, target) = aliases
                .iter()
                .find(|(alias, _)| spec.value.starts_with(alias.as_str()))?;
            let rest = &spec.value[alias.len()..];
            let rewritten = format!("{url_prefix}{target}{rest}");
            Some((spec.start, spec.end, format!("\"{rewritten}\"")))
        })
        .collect();

    splice(code, replacements)
}

/// Redirect bare specifiers (npm package ids) to the CDN. Relative,
/// absolute, framework-internal, and URL specifiers are left alone.
pub fn redirect_bare_imports(code: &str, source_type: SourceType, cdn_base: &str) -> String {
    let Some(specifiers) = collect_specifiers(code, source_type) else {
        return code.to_string();
    };

    let replacements: Vec<(usize, usize, String)> = specifiers
        .into_iter()
        .filter_map(|spec| {
            if is_reserved(&spec.value) {
                return None;
            }
            let rewritten = format!("{cdn_base}{}", spec.value);
            Some((spec.start, spec.end, format!("\"{rewritten}\"")))
        })
        .collect();

    splice(code, replacements)
}

fn is_reserved(specifier: &str) -> bool {
    specifier == "next"
        || RESERVED_PREFIXES
            .iter()
            .any(|prefix| specifier.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CDN: &str = "https://esm.sh/";

    #[test]
    fn collects_all_specifier_positions() {
        let code = r#"
import React from "react";
export { thing } from "./local";
export * from "side";
const mod = await import("dyn-pkg");
const s = "import(\"not-a-real-import\")";
"#;
        let specs = collect_specifiers(code, SourceType::mjs()).unwrap();
        let values: Vec<&str> = specs.iter().map(|s| s.value.as_str()).collect();
        assert_eq!(values, vec!["react", "./local", "side", "dyn-pkg"]);
    }

    #[test]
    fn bare_imports_redirect_but_reserved_stay() {
        let code = "import React from \"react\";\n\
                    import Link from \"next/link\";\n\
                    import util from \"./util\";\n\
                    import abs from \"/lib/abs.js\";\n";
        let out = redirect_bare_imports(code, SourceType::mjs(), CDN);
        assert!(out.contains("\"https://esm.sh/react\""));
        assert!(out.contains("\"next/link\""));
        assert!(out.contains("\"./util\""));
        assert!(out.contains("\"/lib/abs.js\""));
    }

    #[test]
    fn dynamic_import_redirects_ordinary_string_survives() {
        let code = "const lodash = import(\"lodash\");\nconst label = \"lodash\";\n// import \"lodash\"\n";
        let out = redirect_bare_imports(code, SourceType::mjs(), CDN);
        assert!(out.contains("import(\"https://esm.sh/lodash\")"));
        assert!(out.contains("const label = \"lodash\";"));
        assert!(out.contains("// import \"lodash\""));
    }

    #[test]
    fn alias_rewrite_uses_longest_prefix() {
        let aliases = vec![
            ("@/components/".to_string(), "/src/ui/".to_string()),
            ("@/".to_string(), "/src/".to_string()),
        ];
        let code = "import Button from \"@/components/Button\";\nimport util from \"@/util\";\n";
        let out = apply_aliases(code, SourceType::mjs(), &aliases, "/__virtual__/3000");
        assert!(out.contains("\"/__virtual__/3000/src/ui/Button\""));
        assert!(out.contains("\"/__virtual__/3000/src/util\""));
    }

    #[test]
    fn unparseable_code_passes_through() {
        let code = "import from from from;";
        assert_eq!(redirect_bare_imports(code, SourceType::mjs(), CDN), code);
    }

    #[test]
    fn collect_imports_reports_default_binding() {
        let code = "import styles from \"./Button.module.css\";\nimport \"./globals.css\";\n";
        let imports = collect_imports(code, SourceType::mjs()).unwrap();
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].specifier, "./Button.module.css");
        assert_eq!(imports[0].default_local.as_deref(), Some("styles"));
        assert_eq!(imports[1].specifier, "./globals.css");
        assert_eq!(imports[1].default_local, None);
    }
}
