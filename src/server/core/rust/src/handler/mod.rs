/* src/server/core/rust/src/handler/mod.rs */

pub mod data;
pub mod document;
pub mod error;
pub mod http;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use ::http::{Method, StatusCode};
use url::Url;

use crate::errors::HttpError;
use crate::event::RequestEvent;
use crate::manifest::ServerManifest;
use crate::middleware::{Next, with_middleware};
use crate::module::{BoxFuture, Handler};
use crate::outcome::{HandlerOutput, HandlerResult, Interrupt};
use crate::response::{self, Request, Response, X_VESSEL_ERROR, YES, request_url, strip_body};

use self::data::handle_data_request;
use self::document::handle_document_request;
use self::error::expected_error;
use self::http::handle_http_request;

/// The single entry point a transport adapter calls. Never fails: every
/// outcome is already a response.
pub type RequestHandler = Arc<dyn Fn(Request) -> BoxFuture<Response> + Send + Sync>;

pub fn create_request_handler(manifest: Arc<ServerManifest>) -> RequestHandler {
  Arc::new(move |req| {
    let manifest = Arc::clone(&manifest);
    Box::pin(async move { dispatch(&manifest, req).await })
  })
}

/// Normalize the path, classify the request and hand it to the HTTP, data
/// or document handler.
pub async fn dispatch(manifest: &Arc<ServerManifest>, req: Request) -> Response {
  let url = match request_url(&req) {
    Ok(url) => url,
    Err(e) => {
      tracing::warn!(uri = %req.uri(), error = %e, "unparseable request url");
      let mut res = expected_error(&HttpError::bad_request("malformed request url"));
      res.headers_mut().insert(X_VESSEL_ERROR, YES);
      return res;
    }
  };

  if let Some(location) = normalize_trailing_slash(&url, manifest.trailing_slash) {
    tracing::debug!(from = %url.path(), to = %location, "trailing slash redirect");
    return response::redirect(&location, StatusCode::PERMANENT_REDIRECT);
  }

  let is_head = req.method() == Method::HEAD;
  let res = if let Some(route) = manifest.match_http(&url) {
    handle_http_request(url, req, route, Some(manifest)).await
  } else if is_data_request(&url) {
    handle_data_request(url, req, manifest).await
  } else {
    handle_document_request(url, req, manifest).await
  };

  if is_head { strip_body(res) } else { res }
}

/// Redirect target for a path that breaks the trailing-slash policy, query
/// string preserved. `/` is never redirected.
pub fn normalize_trailing_slash(url: &Url, trailing_slash: bool) -> Option<String> {
  let path = url.path();
  if path == "/" {
    return None;
  }

  let target = if let Some(stripped) = path.strip_suffix("/index.html") {
    if trailing_slash || stripped.is_empty() {
      format!("{stripped}/")
    } else {
      stripped.to_string()
    }
  } else if !trailing_slash && path.ends_with('/') {
    let stripped = path.trim_end_matches('/');
    if stripped.is_empty() { "/".to_string() } else { stripped.to_string() }
  } else if trailing_slash && !path.ends_with('/') {
    format!("{path}/")
  } else {
    return None;
  };

  Some(match url.query() {
    Some(query) => format!("{target}?{query}"),
    None => target,
  })
}

fn is_data_request(url: &Url) -> bool {
  url.query_pairs().any(|(key, _)| key == "_data")
}

pub(crate) fn query_value(url: &Url, name: &str) -> Option<String> {
  url.query_pairs().find(|(key, _)| key == name).map(|(_, value)| value.into_owned())
}

/// Run a handler or loader through its middleware, coerce its output and
/// merge the event's headers and cookies into the result. Redirects get the
/// cookies too so a login can set its session before navigating away.
pub(crate) async fn run_handler(event: RequestEvent, handler: &Handler) -> HandlerResult {
  let bag = event.response_handle();
  let func = Arc::clone(&handler.func);
  let core: Next =
    Box::new(move |event| Box::pin(async move { func(event).await.map(HandlerOutput::into_response) }));

  match with_middleware(event, core, &handler.middleware).await {
    Ok(res) => Ok(bag.apply(res)),
    Err(Interrupt::Redirect(res)) => Err(Interrupt::Redirect(bag.apply(res))),
    Err(failure) => Err(failure),
  }
}

/// Shallow copy for handing the same request to several loaders. Extensions
/// are not carried over.
pub(crate) fn clone_request(req: &Request) -> Request {
  let mut copy = Request::new(req.body().clone());
  *copy.method_mut() = req.method().clone();
  *copy.uri_mut() = req.uri().clone();
  *copy.version_mut() = req.version();
  *copy.headers_mut() = req.headers().clone();
  copy
}
