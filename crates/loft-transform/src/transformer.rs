//! The module-transform pipeline.
//!
//! Browser ESM path: cache probe, CSS-import handling, alias resolution,
//! backend lowering, bare-import CDN redirect, React Refresh injection,
//! cache store. Handler CJS path: alias resolution + backend lowering
//! only. Both are keyed separately in the cache.

use crate::backend::{BackendOptions, Loader, ModuleFormat, TransformBackend};
use crate::cache::TransformCache;
use crate::css_modules;
use crate::error::TransformResult;
use crate::refresh;
use crate::rewrite;
use loft_fs::{path, SharedVfs};
use oxc_span::SourceType;
use std::sync::Arc;

/// Default CDN used for bare npm specifiers.
pub const DEFAULT_CDN_BASE: &str = "https://esm.sh/";

/// Static configuration for a transformer instance.
#[derive(Debug, Clone)]
pub struct TransformerOptions {
    /// Alias prefix mappings, longest prefix first
    pub aliases: Vec<(String, String)>,
    /// URL prefix prepended to alias-resolved absolute paths
    pub url_prefix: String,
    /// CDN base for bare-import redirection
    pub cdn_base: String,
}

impl Default for TransformerOptions {
    fn default() -> Self {
        Self {
            aliases: Vec::new(),
            url_prefix: String::new(),
            cdn_base: DEFAULT_CDN_BASE.to_string(),
        }
    }
}

/// Result of one transform.
#[derive(Debug, Clone)]
pub struct TransformedModule {
    /// Browser-ready (or CJS) module text
    pub code: String,
    /// Whether the output came from the cache unchanged
    pub cache_hit: bool,
}

/// Transforms project modules on demand, caching by content hash.
pub struct ModuleTransformer {
    vfs: SharedVfs,
    backend: Option<Arc<dyn TransformBackend>>,
    cache: TransformCache,
    options: TransformerOptions,
}

impl ModuleTransformer {
    /// Create a transformer over `vfs`. `backend` may be `None` in hosts
    /// that cannot load one; JSX/TS lowering is then skipped and modules
    /// pass through with CSS stripping and alias resolution applied.
    pub fn new(
        vfs: SharedVfs,
        backend: Option<Arc<dyn TransformBackend>>,
        options: TransformerOptions,
    ) -> Self {
        Self {
            vfs,
            backend,
            cache: TransformCache::new(),
            options,
        }
    }

    /// Transform a module for the browser (ESM).
    pub async fn transform_esm(&self, file: &str) -> TransformResult<TransformedModule> {
        let source = self.vfs.read_to_string(file)?;
        let source_hash = blake3::hash(source.as_bytes());

        if let Some(code) = self.cache.lookup(file, ModuleFormat::Esm, &source_hash) {
            tracing::debug!(file, "transform cache hit (esm)");
            return Ok(TransformedModule {
                code,
                cache_hit: true,
            });
        }

        let loader = Loader::from_path(file);
        let source_type = rewrite::source_type_for(file);

        let mut code = self.replace_css_imports(file, &source, source_type);
        code = rewrite::apply_aliases(
            &code,
            source_type,
            &self.options.aliases,
            &self.options.url_prefix,
        );

        if let Some(backend) = &self.backend {
            let emitted = backend
                .transform(
                    &code,
                    &BackendOptions {
                        loader,
                        format: ModuleFormat::Esm,
                        sourcefile: file.to_string(),
                    },
                )
                .await?;
            // The backend emits plain JS; later passes parse it as a module.
            let emitted_type = SourceType::mjs();
            code = rewrite::redirect_bare_imports(&emitted, emitted_type, &self.options.cdn_base);
            if loader.is_jsx() {
                code = refresh::inject(&code, emitted_type, file);
            }
        }

        self.cache
            .store(file, ModuleFormat::Esm, source_hash, &code);
        Ok(TransformedModule {
            code,
            cache_hit: false,
        })
    }

    /// Transform a module for in-process handler execution (CJS). No CDN
    /// redirect and no Refresh injection: the execution environment
    /// provides `require` for a fixed whitelist of built-ins.
    pub async fn transform_cjs(&self, file: &str) -> TransformResult<TransformedModule> {
        let source = self.vfs.read_to_string(file)?;
        let source_hash = blake3::hash(source.as_bytes());

        if let Some(code) = self.cache.lookup(file, ModuleFormat::Cjs, &source_hash) {
            tracing::debug!(file, "transform cache hit (cjs)");
            return Ok(TransformedModule {
                code,
                cache_hit: true,
            });
        }

        let source_type = rewrite::source_type_for(file);
        let mut code = rewrite::apply_aliases(
            &source,
            source_type,
            &self.options.aliases,
            &self.options.url_prefix,
        );

        if let Some(backend) = &self.backend {
            code = backend
                .transform(
                    &code,
                    &BackendOptions {
                        loader: Loader::from_path(file),
                        format: ModuleFormat::Cjs,
                        sourcefile: file.to_string(),
                    },
                )
                .await?;
        }

        self.cache
            .store(file, ModuleFormat::Cjs, source_hash, &code);
        Ok(TransformedModule {
            code,
            cache_hit: false,
        })
    }

    /// Replace `*.module.css` imports with synthesized class-map modules
    /// and strip plain `*.css` imports (globals arrive via `<link>` tags).
    fn replace_css_imports(&self, file: &str, source: &str, source_type: SourceType) -> String {
        let Some(imports) = rewrite::collect_imports(source, source_type) else {
            return source.to_string();
        };

        let mut replacements: Vec<(usize, usize, String)> = Vec::new();
        for import in imports {
            if !import.specifier.ends_with(".css") {
                continue;
            }
            if import.specifier.ends_with(".module.css") {
                let css_path = self.resolve_import_path(file, &import.specifier);
                let local = import.default_local.as_deref().unwrap_or("__cssModule");
                match self.vfs.read_to_string(&css_path) {
                    Ok(css) => {
                        let module = css_modules::compile(&css_path, &css);
                        replacements.push((import.start, import.end, module.to_js(local)));
                    }
                    Err(err) => {
                        tracing::warn!(file, css = %css_path, %err, "CSS module missing, stripping import");
                        replacements.push((import.start, import.end, String::new()));
                    }
                }
            } else {
                replacements.push((import.start, import.end, String::new()));
            }
        }
        rewrite::splice(source, replacements)
    }

    /// Resolve an import specifier to a virtual path: relative against the
    /// importer's directory, aliases against their targets, absolute as-is.
    fn resolve_import_path(&self, importer: &str, specifier: &str) -> String {
        if let Some((alias, target)) = self
            .options
            .aliases
            .iter()
            .find(|(alias, _)| specifier.starts_with(alias.as_str()))
        {
            return path::normalize(&format!("{target}{}", &specifier[alias.len()..]));
        }
        if specifier.starts_with('/') {
            return path::normalize(specifier);
        }
        let mut dir = path::parent(importer);
        let mut rest = specifier;
        loop {
            if let Some(stripped) = rest.strip_prefix("./") {
                rest = stripped;
            } else if let Some(stripped) = rest.strip_prefix("../") {
                rest = stripped;
                dir = path::parent(&dir);
            } else {
                break;
            }
        }
        path::normalize(&path::join(&dir, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;
    use async_trait::async_trait;
    use loft_fs::MemoryFs;

    /// Backend standing in for the real lowering step: passes code
    /// through with a marker so tests can see it ran.
    struct MarkerBackend;

    #[async_trait]
    impl TransformBackend for MarkerBackend {
        async fn transform(&self, code: &str, opts: &BackendOptions) -> TransformResult<String> {
            Ok(format!(
                "// loader={} format={}\n{code}",
                opts.loader.as_str(),
                opts.format.as_str()
            ))
        }
    }

    struct FailingBackend;

    #[async_trait]
    impl TransformBackend for FailingBackend {
        async fn transform(&self, _code: &str, opts: &BackendOptions) -> TransformResult<String> {
            Err(TransformError::Backend {
                file: opts.sourcefile.clone(),
                message: "boom".to_string(),
            })
        }
    }

    fn transformer_with(
        files: &[(&str, &str)],
        backend: Option<Arc<dyn TransformBackend>>,
    ) -> ModuleTransformer {
        let vfs = Arc::new(MemoryFs::with_files(files.iter().copied()));
        ModuleTransformer::new(vfs, backend, TransformerOptions::default())
    }

    #[tokio::test]
    async fn second_transform_is_a_cache_hit() {
        let t = transformer_with(
            &[("/lib/a.js", "export const a = 1;\n")],
            Some(Arc::new(MarkerBackend)),
        );

        let first = t.transform_esm("/lib/a.js").await.unwrap();
        assert!(!first.cache_hit);
        let second = t.transform_esm("/lib/a.js").await.unwrap();
        assert!(second.cache_hit);
        assert_eq!(first.code, second.code);
    }

    #[tokio::test]
    async fn edit_invalidates_then_recaches() {
        let vfs = Arc::new(MemoryFs::with_files([("/lib/a.js", "export const a = 1;\n")]));
        let t = ModuleTransformer::new(
            Arc::clone(&vfs) as SharedVfs,
            Some(Arc::new(MarkerBackend)),
            TransformerOptions::default(),
        );

        t.transform_esm("/lib/a.js").await.unwrap();
        vfs.write("/lib/a.js", "export const a = 2;\n");

        let after_edit = t.transform_esm("/lib/a.js").await.unwrap();
        assert!(!after_edit.cache_hit);
        let again = t.transform_esm("/lib/a.js").await.unwrap();
        assert!(again.cache_hit);
    }

    #[tokio::test]
    async fn esm_and_cjs_cache_independently() {
        let t = transformer_with(
            &[("/api/hello.js", "module.exports.default = () => {};\n")],
            Some(Arc::new(MarkerBackend)),
        );

        let esm = t.transform_esm("/api/hello.js").await.unwrap();
        assert!(esm.code.contains("format=esm"));
        let cjs = t.transform_cjs("/api/hello.js").await.unwrap();
        assert!(cjs.code.contains("format=cjs"));
        assert!(!cjs.cache_hit);
    }

    #[tokio::test]
    async fn css_module_import_becomes_class_map() {
        let t = transformer_with(
            &[
                (
                    "/components/Button.jsx",
                    "import styles from \"./Button.module.css\";\nexport const Button = () => null;\n",
                ),
                ("/components/Button.module.css", ".btn { color: red; }\n"),
            ],
            None,
        );

        let out = t.transform_esm("/components/Button.jsx").await.unwrap();
        assert!(!out.code.contains("Button.module.css"));
        assert!(out.code.contains("const styles = {"));
        assert!(out.code.contains("btn__"));
        assert!(out.code.contains("document.head.appendChild"));
    }

    #[tokio::test]
    async fn plain_css_import_is_stripped() {
        let t = transformer_with(
            &[(
                "/pages/_app.jsx",
                "import \"../styles/globals.css\";\nexport default function App() { return null; }\n",
            )],
            None,
        );

        let out = t.transform_esm("/pages/_app.jsx").await.unwrap();
        assert!(!out.code.contains("globals.css"));
        assert!(out.code.contains("export default function App"));
    }

    #[tokio::test]
    async fn without_backend_non_jsx_flows_verbatim() {
        let source = "export const n = 40 + 2;\n";
        let t = transformer_with(&[("/lib/n.js", source)], None);
        let out = t.transform_esm("/lib/n.js").await.unwrap();
        assert_eq!(out.code, source);
    }

    #[tokio::test]
    async fn backend_output_gets_cdn_redirect_and_refresh() {
        let t = transformer_with(
            &[(
                "/pages/index.jsx",
                "import React from \"react\";\nexport default function Home() { return null; }\n",
            )],
            Some(Arc::new(MarkerBackend)),
        );

        let out = t.transform_esm("/pages/index.jsx").await.unwrap();
        assert!(out.code.contains("https://esm.sh/react"));
        assert!(out.code.contains("$RefreshReg$(Home"));
    }

    #[tokio::test]
    async fn backend_error_propagates() {
        let t = transformer_with(
            &[("/pages/broken.jsx", "export default 1;\n")],
            Some(Arc::new(FailingBackend)),
        );
        let err = t.transform_esm("/pages/broken.jsx").await.unwrap_err();
        assert!(matches!(err, TransformError::Backend { .. }));
    }

    #[test]
    fn import_path_resolution() {
        let t = ModuleTransformer::new(
            Arc::new(MemoryFs::new()),
            None,
            TransformerOptions {
                aliases: vec![("@/".to_string(), "/src/".to_string())],
                ..TransformerOptions::default()
            },
        );

        assert_eq!(
            t.resolve_import_path("/components/Button.jsx", "./Button.module.css"),
            "/components/Button.module.css"
        );
        assert_eq!(
            t.resolve_import_path("/pages/users/list.jsx", "../../styles/x.css"),
            "/styles/x.css"
        );
        assert_eq!(
            t.resolve_import_path("/pages/a.jsx", "@/theme.module.css"),
            "/src/theme.module.css"
        );
        assert_eq!(t.resolve_import_path("/pages/a.jsx", "/abs.css"), "/abs.css");
    }
}
