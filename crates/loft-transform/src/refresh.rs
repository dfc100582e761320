//! React Refresh registration.
//!
//! After a JSX/TSX module is lowered, every top-level function or `const`
//! binding whose name starts with an uppercase letter is treated as a
//! component and registered with the Refresh runtime, followed by a
//! refresh call so edits re-render in place.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingPatternKind, Declaration, ExportDefaultDeclarationKind, Statement, VariableDeclaration,
};
use oxc_parser::Parser;
use oxc_span::SourceType;

/// Detect component bindings in the emitted module. Returns names in
/// declaration order, deduped. `None` when the code does not parse.
pub fn detect_components(code: &str, source_type: SourceType) -> Option<Vec<String>> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, source_type).parse();
    if !ret.errors.is_empty() {
        return None;
    }

    let mut names: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if is_component_name(name) && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    };

    for stmt in &ret.program.body {
        match stmt {
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    push(id.name.as_str());
                }
            }
            Statement::VariableDeclaration(decl) => {
                collect_const_bindings(decl, &mut push);
            }
            Statement::ExportNamedDeclaration(export) => match &export.declaration {
                Some(Declaration::FunctionDeclaration(func)) => {
                    if let Some(id) = &func.id {
                        push(id.name.as_str());
                    }
                }
                Some(Declaration::VariableDeclaration(decl)) => {
                    collect_const_bindings(decl, &mut push);
                }
                _ => {}
            },
            Statement::ExportDefaultDeclaration(export) => {
                if let ExportDefaultDeclarationKind::FunctionDeclaration(func) = &export.declaration
                {
                    if let Some(id) = &func.id {
                        push(id.name.as_str());
                    }
                }
            }
            _ => {}
        }
    }
    Some(names)
}

/// Append Refresh registration for each detected component. Code that does
/// not parse, or contains no components, is returned unchanged.
pub fn inject(code: &str, source_type: SourceType, file: &str) -> String {
    let Some(components) = detect_components(code, source_type) else {
        return code.to_string();
    };
    if components.is_empty() {
        return code.to_string();
    }

    let mut out = String::with_capacity(code.len() + components.len() * 160);
    out.push_str(code);
    out.push_str("\nif (typeof window !== \"undefined\" && window.$RefreshReg$) {\n");
    for name in &components {
        out.push_str(&format!(
            "  window.$RefreshReg$({name}, \"{name}@{file}\");\n"
        ));
    }
    out.push_str(
        "  if (window.$RefreshRuntime$) { window.$RefreshRuntime$.performReactRefresh(); }\n}\n",
    );
    out
}

fn collect_const_bindings(decl: &VariableDeclaration, push: &mut impl FnMut(&str)) {
    for declarator in &decl.declarations {
        if let BindingPatternKind::BindingIdentifier(ident) = &declarator.id.kind {
            push(ident.name.as_str());
        }
    }
}

fn is_component_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}
