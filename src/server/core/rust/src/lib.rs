/* src/server/core/rust/src/lib.rs */

pub mod config;
pub mod errors;
pub mod event;
pub mod handler;
pub mod manifest;
pub mod middleware;
pub mod module;
pub mod order;
pub mod outcome;
pub mod pattern;
pub mod response;
pub mod server;

// Re-exports for ergonomic use
pub use config::{ConfigError, MarkdownConfig, ServerConfig, load_config, parse_config};
pub use errors::HttpError;
pub use event::{Fetcher, RequestEvent};
pub use handler::document::{DocumentContext, DocumentRenderer, RouteData, ShellRenderer};
pub use handler::error::handle_http_error;
pub use handler::{RequestHandler, create_request_handler, dispatch};
pub use manifest::{AppRoute, Hooks, HttpRoute, Routes, ServerManifest};
pub use middleware::{Middleware, Next, with_middleware};
pub use module::{
  BoxFuture, ComponentModule, ComponentType, Handler, HttpModule, ModuleLoader, lazy, ready,
};
pub use order::{SortCache, compare_ordered_paths};
pub use outcome::{Failure, HandlerOutput, HandlerResult, Interrupt};
pub use pattern::{Params, PatternError, RouteMatcher, RoutePattern};
pub use response::{Request, Response};
pub use server::VesselServer;
