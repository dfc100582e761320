//! Browser-resident dev server emulating a file-based React
//! meta-framework.
//!
//! The core is a pipeline over a virtual filesystem: a config resolver, a
//! layered route resolver (pages and app paradigms), an on-demand module
//! transformer, an HTML shell synthesizer wired for client-side
//! navigation and hot updates, a request dispatcher, and an HMR notifier.
//! Requests arrive HTTP-shaped (the service-worker bridge that carries
//! them is an external collaborator) and every dispatch returns a
//! well-formed response.
//!
//! ```no_run
//! use loft_fs::MemoryFs;
//! use loft_server::{DevServer, ServerOptions};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let fs = Arc::new(MemoryFs::with_files([
//!     ("/pages/index.jsx", "export default function Home() { return <h1>hi</h1>; }"),
//! ]));
//! let server = DevServer::new(fs, ServerOptions::default());
//! let response = server.handle_request("GET", "/", &[], None).await;
//! assert_eq!(response.status, 200);
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod hmr;
pub mod http;
pub mod routes;
pub mod runtime;
pub mod shell;
pub mod shims;

#[cfg(feature = "logging")]
pub mod logging;

pub use config::{FrameworkConfig, ServerOptions, PUBLIC_ENV_PREFIX};
pub use dispatch::{DevServer, DEFAULT_HANDLER_TIMEOUT};
pub use error::{ServerError, ServerResult};
pub use hmr::{HmrEvent, HmrEventKind, HmrNotifier, MessagePort};
pub use http::{Response, StreamingCallbacks};
pub use routes::{ParamValue, RouteMatch, RouterMode};
pub use runtime::{BoaHandlerRuntime, HandlerOutcome, HandlerRuntime, PreparedRequest};
