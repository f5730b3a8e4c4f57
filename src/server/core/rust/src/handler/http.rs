/* src/server/core/rust/src/handler/http.rs */

use std::convert::Infallible;
use std::sync::Arc;

use ::http::header::{ALLOW, CONTENT_TYPE};
use ::http::{HeaderValue, Method};
use url::Url;

use super::error::handle_http_error;
use super::run_handler;
use crate::errors::HttpError;
use crate::event::RequestEvent;
use crate::manifest::{HttpRoute, ServerManifest};
use crate::outcome::{HandlerResult, Interrupt};
use crate::response::{Request, Response};

/// Serve one request against a standalone HTTP route.
pub async fn handle_http_request(
  url: Url,
  request: Request,
  route: &HttpRoute,
  manifest: Option<&Arc<ServerManifest>>,
) -> Response {
  match run(url.clone(), request, route, manifest).await {
    Ok(res) => res,
    Err(Interrupt::Redirect(res)) => res,
    Err(Interrupt::Failure(failure)) => {
      handle_http_error(failure, &url, manifest.map(|m| m.as_ref()))
    }
  }
}

async fn run(
  url: Url,
  mut request: Request,
  route: &HttpRoute,
  manifest: Option<&Arc<ServerManifest>>,
) -> HandlerResult {
  let dev = manifest.is_some_and(|m| m.dev);
  let method = effective_method(&request).await;

  // A disallowed method reads as a missing route.
  if let Some(allowed) = &route.methods {
    let head_via_get = method == Method::HEAD && allowed.contains(&Method::GET);
    if !allowed.contains(&method) && !head_via_get {
      return Err(HttpError::not_found("not found").into());
    }
  }

  let Some(params) = route.matcher.exec(url.path(), dev) else {
    return Err(HttpError::not_found("not found").into());
  };

  let module = (route.loader)().await?;
  let Some(handler) = module.find(&method) else {
    let allow = module.methods().join(", ");
    let mut err = HttpError::method_not_allowed("method not allowed");
    if let Ok(value) = HeaderValue::from_str(&allow) {
      err = err.header(ALLOW, value);
    }
    return Err(err.into());
  };

  tracing::debug!(route = %route.id, method = %method, "http route");
  *request.method_mut() = method;
  let event = RequestEvent::new(url, params, request, manifest.cloned());
  run_handler(event, handler).await
}

/// `POST` bodies may carry a `_method` form field naming the method to use.
async fn effective_method(request: &Request) -> Method {
  let method = request.method().clone();
  if method != Method::POST {
    return method;
  }
  match method_override(request).await {
    Ok(Some(value)) => value,
    Ok(None) => method,
    Err(e) => {
      tracing::debug!(error = %e, "unreadable form body, keeping POST");
      method
    }
  }
}

async fn method_override(request: &Request) -> anyhow::Result<Option<Method>> {
  let content_type =
    request.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or_default();

  let value = if content_type.starts_with("application/x-www-form-urlencoded") {
    url::form_urlencoded::parse(request.body())
      .find(|(key, _)| key == "_method")
      .map(|(_, value)| value.into_owned())
  } else if content_type.starts_with("multipart/form-data") {
    multipart_field(request, content_type, "_method").await?
  } else {
    None
  };

  Ok(value.and_then(|v| Method::from_bytes(v.trim().to_ascii_uppercase().as_bytes()).ok()))
}

/// First text field with the given name; file parts never count.
async fn multipart_field(
  request: &Request,
  content_type: &str,
  name: &str,
) -> anyhow::Result<Option<String>> {
  let boundary = multer::parse_boundary(content_type)?;
  let body = request.body().clone();
  let stream = futures_util::stream::once(async move { Ok::<_, Infallible>(body) });
  let mut multipart = multer::Multipart::new(stream, boundary);
  while let Some(field) = multipart.next_field().await? {
    if field.name() == Some(name) && field.file_name().is_none() {
      return Ok(Some(field.text().await?));
    }
  }
  Ok(None)
}
