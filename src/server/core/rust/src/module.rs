/* src/server/core/rust/src/module.rs */

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::Method;

use crate::event::RequestEvent;
use crate::middleware::Middleware;
use crate::outcome::{HandlerOutput, HandlerResult, Interrupt};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

pub type HandlerFn =
  Arc<dyn Fn(RequestEvent) -> BoxFuture<HandlerResult<HandlerOutput>> + Send + Sync>;

/// An HTTP endpoint handler or a server loader, with its own middleware.
#[derive(Clone)]
pub struct Handler {
  pub(crate) func: HandlerFn,
  pub(crate) middleware: Vec<Arc<dyn Middleware>>,
}

impl Handler {
  pub fn new<F, Fut, O>(f: F) -> Self
  where
    F: Fn(RequestEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<O>> + Send + 'static,
    O: Into<HandlerOutput> + 'static,
  {
    let f = Arc::new(f);
    Self {
      func: Arc::new(move |event| {
        let fut = f(event);
        Box::pin(async move {
          let out: HandlerOutput = fut.await?.into();
          Ok::<_, Interrupt>(out)
        })
      }),
      middleware: Vec::new(),
    }
  }

  pub fn middleware(mut self, mw: impl Middleware + 'static) -> Self {
    self.middleware.push(Arc::new(mw));
    self
  }
}

impl fmt::Debug for Handler {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Handler").field("middleware", &self.middleware.len()).finish()
  }
}

/// Method handlers exported by an HTTP route module.
#[derive(Default, Clone, Debug)]
pub struct HttpModule {
  handlers: Vec<(Method, Handler)>,
  any: Option<Handler>,
}

impl HttpModule {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn method(mut self, method: Method, handler: Handler) -> Self {
    self.handlers.retain(|(m, _)| *m != method);
    self.handlers.push((method, handler));
    self
  }

  pub fn get(self, handler: Handler) -> Self {
    self.method(Method::GET, handler)
  }

  pub fn head(self, handler: Handler) -> Self {
    self.method(Method::HEAD, handler)
  }

  pub fn post(self, handler: Handler) -> Self {
    self.method(Method::POST, handler)
  }

  pub fn put(self, handler: Handler) -> Self {
    self.method(Method::PUT, handler)
  }

  pub fn patch(self, handler: Handler) -> Self {
    self.method(Method::PATCH, handler)
  }

  pub fn delete(self, handler: Handler) -> Self {
    self.method(Method::DELETE, handler)
  }

  pub fn options(self, handler: Handler) -> Self {
    self.method(Method::OPTIONS, handler)
  }

  /// Fallback for every method without an exact handler.
  pub fn any(mut self, handler: Handler) -> Self {
    self.any = Some(handler);
    self
  }

  /// Exact method, then HEAD falling back to GET, then `ANY`.
  pub fn find(&self, method: &Method) -> Option<&Handler> {
    let exact = |m: &Method| self.handlers.iter().find(|(k, _)| k == m).map(|(_, h)| h);
    exact(method)
      .or_else(|| if *method == Method::HEAD { exact(&Method::GET) } else { None })
      .or(self.any.as_ref())
  }

  /// Defined method names in declaration order, for the `Allow` header.
  pub fn methods(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self.handlers.iter().map(|(m, _)| m.as_str()).collect();
    if self.any.is_some() {
      names.push("ANY");
    }
    names
  }
}

/// A page, layout or error component module as seen by the server.
#[derive(Default, Clone, Debug)]
pub struct ComponentModule {
  pub server_loader: Option<Handler>,
}

impl ComponentModule {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_loader(loader: Handler) -> Self {
    Self { server_loader: Some(loader) }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentType {
  Page,
  Layout,
  ErrorBoundary,
}

impl ComponentType {
  pub fn parse(value: &str) -> Option<Self> {
    match value {
      "page" => Some(Self::Page),
      "layout" => Some(Self::Layout),
      "errorBoundary" => Some(Self::ErrorBoundary),
      _ => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Page => "page",
      Self::Layout => "layout",
      Self::ErrorBoundary => "errorBoundary",
    }
  }
}

/// Lazily loads a route module. Called on every request that needs it;
/// implementations decide whether to memoise.
pub type ModuleLoader<T> = Arc<dyn Fn() -> BoxFuture<anyhow::Result<Arc<T>>> + Send + Sync>;

/// A loader over a module that is already in memory.
pub fn ready<T: Send + Sync + 'static>(module: T) -> ModuleLoader<T> {
  let module = Arc::new(module);
  Arc::new(move || {
    let module = Arc::clone(&module);
    Box::pin(async move { Ok::<_, anyhow::Error>(module) })
  })
}

/// A loader backed by an async factory.
pub fn lazy<T, F, Fut>(factory: F) -> ModuleLoader<T>
where
  T: Send + Sync + 'static,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
  Arc::new(move || {
    let fut = factory();
    Box::pin(async move { fut.await.map(Arc::new) })
  })
}
