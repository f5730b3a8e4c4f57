/* src/server/core/rust/src/server.rs */

use std::cmp::Ordering;
use std::sync::Arc;

use url::Url;

use crate::config::ServerConfig;
use crate::handler::document::DocumentRenderer;
use crate::handler::{RequestHandler, create_request_handler};
use crate::manifest::{AppRoute, Hooks, HttpRoute, Routes, ServerManifest};
use crate::order::{SortCache, compare_ordered_paths};
use crate::pattern::RouteMatcher;

/// Builder for a [`ServerManifest`].
///
/// Routes are ranked once here so that request-time matching can take the
/// first hit: static segments before params, params before optional, optional
/// before rest, then the ordered-path comparator.
pub struct VesselServer {
  http: Vec<HttpRoute>,
  app: Vec<AppRoute>,
  trailing_slash: bool,
  dev: bool,
  hooks: Hooks,
  renderer: Option<Arc<dyn DocumentRenderer>>,
  sort_cache: Arc<SortCache>,
}

impl VesselServer {
  pub fn new() -> Self {
    Self {
      http: Vec::new(),
      app: Vec::new(),
      trailing_slash: false,
      dev: false,
      hooks: Hooks::default(),
      renderer: None,
      sort_cache: Arc::new(SortCache::default()),
    }
  }

  pub fn http(mut self, route: HttpRoute) -> Self {
    self.http.push(route);
    self
  }

  pub fn app(mut self, route: AppRoute) -> Self {
    self.app.push(route);
    self
  }

  pub fn trailing_slash(mut self, enabled: bool) -> Self {
    self.trailing_slash = enabled;
    self
  }

  pub fn dev(mut self, enabled: bool) -> Self {
    self.dev = enabled;
    self
  }

  /// Apply the policies of a loaded `vessel.toml`.
  pub fn config(self, config: &ServerConfig) -> Self {
    self.trailing_slash(config.trailing_slash).dev(config.dev)
  }

  pub fn renderer(mut self, renderer: impl DocumentRenderer + 'static) -> Self {
    self.renderer = Some(Arc::new(renderer));
    self
  }

  pub fn on_unexpected_http_error(
    mut self,
    hook: impl Fn(&Url, &anyhow::Error) + Send + Sync + 'static,
  ) -> Self {
    self.hooks.on_unexpected_http_error = Some(Arc::new(hook));
    self
  }

  /// Share a comparison cache across several manifests (e.g. dev rebuilds).
  pub fn sort_cache(mut self, cache: Arc<SortCache>) -> Self {
    self.sort_cache = cache;
    self
  }

  pub fn into_manifest(self) -> Arc<ServerManifest> {
    let mut http = self.http;
    let mut app = self.app;
    let cache = &self.sort_cache;
    http.sort_by(|a, b| rank(&a.matcher, &b.matcher, cache));
    app.sort_by(|a, b| rank(&a.matcher, &b.matcher, cache));
    tracing::debug!(http = http.len(), app = app.len(), dev = self.dev, "route manifest built");

    Arc::new(ServerManifest {
      routes: Routes { http, app },
      trailing_slash: self.trailing_slash,
      dev: self.dev,
      hooks: self.hooks,
      renderer: self.renderer,
    })
  }

  pub fn into_handler(self) -> RequestHandler {
    create_request_handler(self.into_manifest())
  }
}

impl Default for VesselServer {
  fn default() -> Self {
    Self::new()
  }
}

fn rank(a: &RouteMatcher, b: &RouteMatcher, cache: &SortCache) -> Ordering {
  let by_shape = match (a.pattern(), b.pattern()) {
    (Some(pa), Some(pb)) => pa.rank(pb),
    // Routes with broken patterns never match; park them at the end.
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => Ordering::Equal,
  };
  by_shape.then_with(|| compare_ordered_paths(a.pathname(), b.pathname(), cache))
}
