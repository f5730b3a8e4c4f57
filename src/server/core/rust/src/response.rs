/* src/server/core/rust/src/response.rs */

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, LOCATION};
use http::{HeaderName, HeaderValue, StatusCode};
use url::Url;

pub type Request = http::Request<Bytes>;
pub type Response = http::Response<Bytes>;

pub const X_VESSEL_DATA: HeaderName = HeaderName::from_static("x-vessel-data");
pub const X_VESSEL_ERROR: HeaderName = HeaderName::from_static("x-vessel-error");
pub const X_VESSEL_EXPECTED: HeaderName = HeaderName::from_static("x-vessel-expected");
pub const X_VESSEL_REDIRECT: HeaderName = HeaderName::from_static("x-vessel-redirect");

pub(crate) const YES: HeaderValue = HeaderValue::from_static("yes");
pub(crate) const NO: HeaderValue = HeaderValue::from_static("no");

const JSON_TYPE: HeaderValue = HeaderValue::from_static("application/json");
const TEXT_TYPE: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
const HTML_TYPE: HeaderValue = HeaderValue::from_static("text/html; charset=utf-8");

fn with_type(status: StatusCode, content_type: HeaderValue, body: Bytes) -> Response {
  let mut res = Response::new(body);
  *res.status_mut() = status;
  res.headers_mut().insert(CONTENT_TYPE, content_type);
  res
}

/// JSON response. Serialization of a `Value` cannot fail, so the body is always valid.
pub fn json(status: StatusCode, value: &serde_json::Value) -> Response {
  with_type(status, JSON_TYPE, Bytes::from(value.to_string()))
}

pub fn text(status: StatusCode, body: impl Into<String>) -> Response {
  with_type(status, TEXT_TYPE, Bytes::from(body.into()))
}

pub fn html(body: impl Into<String>) -> Response {
  with_type(StatusCode::OK, HTML_TYPE, Bytes::from(body.into()))
}

pub fn empty(status: StatusCode) -> Response {
  let mut res = Response::new(Bytes::new());
  *res.status_mut() = status;
  res
}

fn location_value(location: &str) -> HeaderValue {
  HeaderValue::from_str(location).unwrap_or_else(|_| HeaderValue::from_static("/"))
}

/// Raw HTTP redirect. Use it as a value or raise it with `Interrupt::Redirect`.
pub fn redirect(location: &str, status: StatusCode) -> Response {
  let mut res = empty(status);
  res.headers_mut().insert(LOCATION, location_value(location));
  res
}

/// Redirect form for data requests: a 200 JSON payload the client router
/// navigates to itself instead of letting the browser follow a `Location`.
pub fn client_redirect(location: &str, status: StatusCode) -> Response {
  let body = serde_json::json!({ "redirect": { "path": location, "status": status.as_u16() } });
  let mut res = json(StatusCode::OK, &body);
  res.headers_mut().insert(X_VESSEL_REDIRECT, location_value(location));
  res
}

pub fn is_redirect(res: &Response) -> bool {
  res.status().is_redirection() && res.headers().contains_key(LOCATION)
}

pub(crate) fn location_of(res: &Response) -> &str {
  res.headers().get(LOCATION).and_then(|v| v.to_str().ok()).unwrap_or("/")
}

/// Reconstruct the absolute URL of a request. Adapters usually hand over
/// origin-form URIs, so the authority comes from the `Host` header.
pub fn request_url(req: &Request) -> Result<Url, url::ParseError> {
  let uri = req.uri();
  if uri.scheme().is_some() && uri.authority().is_some() {
    return Url::parse(&uri.to_string());
  }
  let host = req.headers().get(HOST).and_then(|v| v.to_str().ok()).unwrap_or("localhost");
  let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
  Url::parse(&format!("http://{host}{path}"))
}

/// Same status and headers, no body.
pub(crate) fn strip_body(res: Response) -> Response {
  let (parts, _) = res.into_parts();
  Response::from_parts(parts, Bytes::new())
}
