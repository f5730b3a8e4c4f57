/* src/server/core/rust/src/errors.rs */

use std::fmt;

use http::{HeaderMap, StatusCode};

/// An application error raised on purpose by a handler or loader.
///
/// Reaches the client with its exact status and a structured JSON body
/// (`{"error": {"message", "data"}}`), tagged `X-Vessel-Expected: yes`.
#[derive(Debug, Clone)]
pub struct HttpError {
  status: StatusCode,
  message: String,
  data: Option<serde_json::Value>,
  headers: HeaderMap,
}

impl HttpError {
  pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
    Self { status, message: message.into(), data: None, headers: HeaderMap::new() }
  }

  /// Build from a raw status code; invalid codes fall back to 500.
  pub fn with_status(status: u16, message: impl Into<String>) -> Self {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Self::new(status, message)
  }

  pub fn bad_request(msg: impl Into<String>) -> Self {
    Self::new(StatusCode::BAD_REQUEST, msg)
  }

  pub fn unauthorized(msg: impl Into<String>) -> Self {
    Self::new(StatusCode::UNAUTHORIZED, msg)
  }

  pub fn forbidden(msg: impl Into<String>) -> Self {
    Self::new(StatusCode::FORBIDDEN, msg)
  }

  pub fn not_found(msg: impl Into<String>) -> Self {
    Self::new(StatusCode::NOT_FOUND, msg)
  }

  pub fn method_not_allowed(msg: impl Into<String>) -> Self {
    Self::new(StatusCode::METHOD_NOT_ALLOWED, msg)
  }

  pub fn internal(msg: impl Into<String>) -> Self {
    Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
  }

  /// Attach a structured payload that is echoed back under `error.data`.
  pub fn data(mut self, data: serde_json::Value) -> Self {
    self.data = Some(data);
    self
  }

  /// Extra headers copied onto the error response.
  pub fn header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
    self.headers.append(name, value);
    self
  }

  pub fn status(&self) -> StatusCode {
    self.status
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn payload(&self) -> Option<&serde_json::Value> {
    self.data.as_ref()
  }

  pub fn headers(&self) -> &HeaderMap {
    &self.headers
  }
}

impl fmt::Display for HttpError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.status.as_u16(), self.message)
  }
}

impl std::error::Error for HttpError {}
