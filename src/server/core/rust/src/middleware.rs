/* src/server/core/rust/src/middleware.rs */

use std::future::Future;
use std::sync::Arc;

use crate::event::RequestEvent;
use crate::module::BoxFuture;
use crate::outcome::HandlerResult;

/// The rest of the chain, ending in the core handler.
pub type Next = Box<dyn FnOnce(RequestEvent) -> BoxFuture<HandlerResult> + Send>;

/// An interceptor around a handler or loader.
///
/// May rewrite the event before calling `next` and the response after it.
/// Errors from `next` must be returned, not swallowed; only the handler
/// boundary turns them into a response.
pub trait Middleware: Send + Sync {
  fn handle(&self, event: RequestEvent, next: Next) -> BoxFuture<HandlerResult>;
}

impl<F, Fut> Middleware for F
where
  F: Fn(RequestEvent, Next) -> Fut + Send + Sync,
  Fut: Future<Output = HandlerResult> + Send + 'static,
{
  fn handle(&self, event: RequestEvent, next: Next) -> BoxFuture<HandlerResult> {
    Box::pin(self(event, next))
  }
}

/// Run `core` wrapped by `middleware`; the first entry is the outermost.
pub fn with_middleware(
  event: RequestEvent,
  core: Next,
  middleware: &[Arc<dyn Middleware>],
) -> BoxFuture<HandlerResult> {
  let mut next = core;
  for mw in middleware.iter().rev() {
    let mw = Arc::clone(mw);
    let inner = next;
    next = Box::new(move |event| mw.handle(event, inner));
  }
  next(event)
}
