//! Pluggable transform backend.
//!
//! The backend is the opaque JSX/TS lowering step: everything else in the
//! pipeline wraps it. Hosts that cannot load one (no WASM transformer, no
//! subprocess) simply pass `None` to the transformer — non-JSX modules
//! still flow through CSS stripping and alias resolution.

use crate::error::TransformResult;
use async_trait::async_trait;

/// Source language of the module being transformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Loader {
    /// Plain JavaScript
    Js,
    /// JavaScript with JSX
    Jsx,
    /// TypeScript
    Ts,
    /// TypeScript with JSX
    Tsx,
}

impl Loader {
    /// Pick a loader from a file extension. Unknown extensions load as
    /// plain JavaScript.
    pub fn from_path(path: &str) -> Self {
        match loft_fs::path::extension(path) {
            Some("jsx") => Loader::Jsx,
            Some("tsx") => Loader::Tsx,
            Some("ts") => Loader::Ts,
            _ => Loader::Js,
        }
    }

    /// Whether this loader admits JSX syntax.
    pub fn is_jsx(&self) -> bool {
        matches!(self, Loader::Jsx | Loader::Tsx)
    }

    /// Backend-facing loader name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Loader::Js => "js",
            Loader::Jsx => "jsx",
            Loader::Ts => "ts",
            Loader::Tsx => "tsx",
        }
    }
}

/// Output module format requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleFormat {
    /// Browser ES module
    Esm,
    /// CommonJS, for in-process handler execution
    Cjs,
}

impl ModuleFormat {
    /// Backend-facing format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleFormat::Esm => "esm",
            ModuleFormat::Cjs => "cjs",
        }
    }
}

/// Options handed to the backend for one transform.
///
/// JSX is always lowered with the automatic runtime and `react` as the
/// import source; that is a fixed property of the framework being
/// emulated, not a knob.
#[derive(Debug, Clone)]
pub struct BackendOptions {
    /// Source language
    pub loader: Loader,
    /// Requested output format
    pub format: ModuleFormat,
    /// Virtual path of the file, for diagnostics and source names
    pub sourcefile: String,
}

/// The opaque JSX/TS → JS lowering step.
#[async_trait]
pub trait TransformBackend: Send + Sync {
    /// Transform `code` according to `opts`, returning the emitted module
    /// text.
    async fn transform(&self, code: &str, opts: &BackendOptions) -> TransformResult<String>;
}
