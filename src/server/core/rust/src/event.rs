/* src/server/core/rust/src/event.rs */

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use cookie::{Cookie, CookieJar};
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::errors::HttpError;
use crate::handler::error::handle_http_error;
use crate::handler::http::handle_http_request;
use crate::manifest::ServerManifest;
use crate::module::BoxFuture;
use crate::outcome::Failure;
use crate::pattern::Params;
use crate::response::{Request, Response};

/// Headers and cookies accumulated by handlers, loaders and middleware while
/// one request is in flight.
#[derive(Debug, Default)]
pub struct ResponseBag {
  pub headers: HeaderMap,
  pub cookies: CookieJar,
}

/// Shared view of one request's [`ResponseBag`]. Never crosses requests.
#[derive(Clone, Default)]
pub(crate) struct ResponseHandle(Arc<Mutex<ResponseBag>>);

impl ResponseHandle {
  pub(crate) fn for_request(req: &Request) -> Self {
    let mut bag = ResponseBag::default();
    for value in req.headers().get_all(COOKIE) {
      let Ok(raw) = value.to_str() else { continue };
      for cookie in Cookie::split_parse_encoded(raw).flatten() {
        bag.cookies.add_original(cookie.into_owned());
      }
    }
    Self(Arc::new(Mutex::new(bag)))
  }

  fn lock(&self) -> MutexGuard<'_, ResponseBag> {
    self.0.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Merge accumulated headers (the response's own values win) and emit a
  /// `Set-Cookie` for every cookie changed during the request.
  pub(crate) fn apply(&self, mut res: Response) -> Response {
    let bag = self.lock();
    for name in bag.headers.keys() {
      if res.headers().contains_key(name) {
        continue;
      }
      for value in bag.headers.get_all(name) {
        res.headers_mut().append(name.clone(), value.clone());
      }
    }
    for cookie in bag.cookies.delta() {
      match HeaderValue::from_str(&cookie.encoded().to_string()) {
        Ok(value) => {
          res.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => tracing::warn!(cookie = cookie.name(), error = %e, "dropping unencodable cookie"),
      }
    }
    res
  }
}

/// Per-request context handed to handlers, loaders and middleware.
pub struct RequestEvent {
  url: Url,
  params: Params,
  request: Request,
  response: ResponseHandle,
  fetcher: Option<Fetcher>,
}

impl RequestEvent {
  /// A fetcher is only attached when a manifest is available to route through.
  pub fn new(
    url: Url,
    params: Params,
    request: Request,
    manifest: Option<Arc<ServerManifest>>,
  ) -> Self {
    let response = ResponseHandle::for_request(&request);
    Self::with_response(url, params, request, manifest, response)
  }

  pub(crate) fn with_response(
    url: Url,
    params: Params,
    request: Request,
    manifest: Option<Arc<ServerManifest>>,
    response: ResponseHandle,
  ) -> Self {
    let fetcher = manifest.map(|m| Fetcher::new(&url, m));
    Self { url, params, request, response, fetcher }
  }

  pub fn url(&self) -> &Url {
    &self.url
  }

  pub fn params(&self) -> &Params {
    &self.params
  }

  pub fn param(&self, name: &str) -> Option<&str> {
    self.params.get(name)
  }

  pub fn request(&self) -> &Request {
    &self.request
  }

  pub fn request_mut(&mut self) -> &mut Request {
    &mut self.request
  }

  pub fn set_header(&self, name: HeaderName, value: HeaderValue) {
    self.response.lock().headers.insert(name, value);
  }

  pub fn append_header(&self, name: HeaderName, value: HeaderValue) {
    self.response.lock().headers.append(name, value);
  }

  /// Current value of a cookie, including ones set earlier in this request.
  pub fn cookie(&self, name: &str) -> Option<String> {
    self.response.lock().cookies.get(name).map(|c| c.value().to_string())
  }

  pub fn set_cookie(&self, cookie: Cookie<'static>) {
    self.response.lock().cookies.add(cookie);
  }

  pub fn remove_cookie(&self, name: impl Into<String>) {
    self.response.lock().cookies.remove(Cookie::from(name.into()));
  }

  pub fn fetcher(&self) -> Option<&Fetcher> {
    self.fetcher.as_ref()
  }

  pub(crate) fn response_handle(&self) -> ResponseHandle {
    self.response.clone()
  }
}

/// Same-origin request dispatcher bound to a manifest.
///
/// Requests for this origin that hit an HTTP route re-enter the HTTP route
/// handler with a fresh event; other origins go over the network.
#[derive(Clone)]
pub struct Fetcher {
  base: Url,
  manifest: Arc<ServerManifest>,
}

impl Fetcher {
  pub(crate) fn new(base: &Url, manifest: Arc<ServerManifest>) -> Self {
    Self { base: base.clone(), manifest }
  }

  pub fn fetch(&self, request: Request) -> BoxFuture<anyhow::Result<Response>> {
    let this = self.clone();
    Box::pin(async move {
      let target = this.base.join(&request.uri().to_string())?;
      if target.origin() != this.base.origin() {
        return external_fetch(target, request).await;
      }
      tracing::debug!(url = %target, "in-process fetch");
      let res = match this.manifest.match_http(&target) {
        Some(route) => handle_http_request(target, request, route, Some(&this.manifest)).await,
        None => handle_http_error(
          Failure::Http(HttpError::not_found("not found")),
          &target,
          Some(&this.manifest),
        ),
      };
      Ok(res)
    })
  }
}

async fn external_fetch(target: Url, request: Request) -> anyhow::Result<Response> {
  let client = reqwest::Client::builder().build()?;
  let (parts, body) = request.into_parts();
  let upstream = client
    .request(parts.method, target)
    .headers(parts.headers)
    .body(body)
    .send()
    .await?;

  let mut res = Response::new(Bytes::new());
  *res.status_mut() = upstream.status();
  *res.headers_mut() = upstream.headers().clone();
  *res.body_mut() = upstream.bytes().await?;
  Ok(res)
}
