/* src/server/core/rust/src/manifest.rs */

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use http::Method;
use url::Url;

use crate::handler::document::DocumentRenderer;
use crate::module::{ComponentModule, ComponentType, HttpModule, ModuleLoader};
use crate::pattern::{Params, RouteMatcher};

/// A standalone HTTP endpoint route (`routes.http`).
pub struct HttpRoute {
  pub id: String,
  pub matcher: RouteMatcher,
  /// Allow-list of methods; `None` accepts any method the module handles.
  pub methods: Option<Vec<Method>>,
  pub loader: ModuleLoader<HttpModule>,
}

impl HttpRoute {
  pub fn new(
    id: impl Into<String>,
    pathname: impl Into<String>,
    loader: ModuleLoader<HttpModule>,
  ) -> Self {
    Self { id: id.into(), matcher: RouteMatcher::new(pathname), methods: None, loader }
  }

  pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
    self.methods = Some(methods.into_iter().collect());
    self
  }

  pub fn pathname(&self) -> &str {
    self.matcher.pathname()
  }
}

impl fmt::Debug for HttpRoute {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HttpRoute")
      .field("id", &self.id)
      .field("pathname", &self.pathname())
      .field("methods", &self.methods)
      .finish_non_exhaustive()
  }
}

/// A route of the app tree (`routes.app`): page, layout and error components
/// each with their own module loader.
pub struct AppRoute {
  pub id: String,
  pub matcher: RouteMatcher,
  pub components: BTreeMap<ComponentType, ModuleLoader<ComponentModule>>,
  /// Ids of the app routes whose `layout` wraps this page, outer to inner.
  pub layouts: Vec<String>,
}

impl AppRoute {
  pub fn new(id: impl Into<String>, pathname: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      matcher: RouteMatcher::new(pathname),
      components: BTreeMap::new(),
      layouts: Vec::new(),
    }
  }

  pub fn component(mut self, ty: ComponentType, loader: ModuleLoader<ComponentModule>) -> Self {
    self.components.insert(ty, loader);
    self
  }

  pub fn page(self, loader: ModuleLoader<ComponentModule>) -> Self {
    self.component(ComponentType::Page, loader)
  }

  pub fn layout(self, loader: ModuleLoader<ComponentModule>) -> Self {
    self.component(ComponentType::Layout, loader)
  }

  pub fn error_boundary(self, loader: ModuleLoader<ComponentModule>) -> Self {
    self.component(ComponentType::ErrorBoundary, loader)
  }

  pub fn layouts(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
    self.layouts = ids.into_iter().map(Into::into).collect();
    self
  }

  pub fn has(&self, ty: ComponentType) -> bool {
    self.components.contains_key(&ty)
  }

  pub fn pathname(&self) -> &str {
    self.matcher.pathname()
  }

  pub(crate) async fn load(
    &self,
    ty: ComponentType,
  ) -> anyhow::Result<Option<Arc<ComponentModule>>> {
    match self.components.get(&ty) {
      Some(loader) => loader().await.map(Some),
      None => Ok(None),
    }
  }
}

impl fmt::Debug for AppRoute {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AppRoute")
      .field("id", &self.id)
      .field("pathname", &self.pathname())
      .field("components", &self.components.keys().collect::<Vec<_>>())
      .field("layouts", &self.layouts)
      .finish()
  }
}

#[derive(Debug, Default)]
pub struct Routes {
  pub http: Vec<HttpRoute>,
  pub app: Vec<AppRoute>,
}

pub type UnexpectedErrorHook = Arc<dyn Fn(&Url, &anyhow::Error) + Send + Sync>;

#[derive(Default, Clone)]
pub struct Hooks {
  pub on_unexpected_http_error: Option<UnexpectedErrorHook>,
}

/// Process-wide route table and policies. Read-only once built; the only
/// mutation is each route's lazy pattern compilation.
pub struct ServerManifest {
  pub routes: Routes,
  pub trailing_slash: bool,
  pub dev: bool,
  pub hooks: Hooks,
  pub renderer: Option<Arc<dyn DocumentRenderer>>,
}

impl ServerManifest {
  /// First HTTP route whose pattern matches the URL path.
  pub fn match_http(&self, url: &Url) -> Option<&HttpRoute> {
    self.routes.http.iter().find(|r| r.matcher.exec(url.path(), self.dev).is_some())
  }

  /// First app route with a page component matching the URL path.
  pub fn match_page(&self, url: &Url) -> Option<(&AppRoute, Params)> {
    self
      .routes
      .app
      .iter()
      .filter(|r| r.has(ComponentType::Page))
      .find_map(|r| r.matcher.exec(url.path(), self.dev).map(|params| (r, params)))
  }

  pub fn app_route(&self, id: &str) -> Option<&AppRoute> {
    self.routes.app.iter().find(|r| r.id == id)
  }
}

impl fmt::Debug for ServerManifest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ServerManifest")
      .field("routes", &self.routes)
      .field("trailing_slash", &self.trailing_slash)
      .field("dev", &self.dev)
      .field("renderer", &self.renderer.is_some())
      .finish_non_exhaustive()
  }
}
