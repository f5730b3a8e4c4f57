/* src/server/core/rust/src/outcome.rs */

use bytes::Bytes;
use http::StatusCode;

use crate::errors::HttpError;
use crate::response::{self, Response};

/// Why a handler did not produce its own response.
///
/// Redirects are a separate variant so that no layer between the handler and
/// the request boundary can mistake them for failures.
#[derive(Debug)]
pub enum Interrupt {
  Redirect(Response),
  Failure(Failure),
}

#[derive(Debug)]
pub enum Failure {
  /// Raised on purpose by application code.
  Http(HttpError),
  /// Anything else. Its detail never leaves the server in production.
  Unexpected(anyhow::Error),
}

pub type HandlerResult<T = Response> = Result<T, Interrupt>;

impl Interrupt {
  pub fn redirect(location: &str, status: StatusCode) -> Self {
    Self::Redirect(response::redirect(location, status))
  }
}

impl From<HttpError> for Interrupt {
  fn from(err: HttpError) -> Self {
    Self::Failure(Failure::Http(err))
  }
}

impl From<anyhow::Error> for Interrupt {
  fn from(err: anyhow::Error) -> Self {
    Self::Failure(Failure::Unexpected(err))
  }
}

impl From<Failure> for Interrupt {
  fn from(failure: Failure) -> Self {
    Self::Failure(failure)
  }
}

/// Whatever a handler or loader hands back before coercion into a `Response`.
#[derive(Debug)]
pub enum HandlerOutput {
  Response(Response),
  Text(String),
  Json(serde_json::Value),
  /// Nothing to send; becomes an empty 204 when coerced.
  Empty,
}

impl HandlerOutput {
  /// Responses pass through, strings become `text/plain`, anything else is JSON-encoded.
  pub fn into_response(self) -> Response {
    match self {
      Self::Response(res) => res,
      Self::Text(body) => response::text(StatusCode::OK, body),
      Self::Json(value) => response::json(StatusCode::OK, &value),
      Self::Empty => response::empty(StatusCode::NO_CONTENT),
    }
  }

  /// Loader data as a JSON value, for embedding into a rendered document.
  pub fn into_value(self) -> serde_json::Value {
    match self {
      Self::Json(value) => value,
      Self::Text(body) => serde_json::Value::String(body),
      Self::Empty => serde_json::Value::Null,
      Self::Response(res) => body_value(res.into_body()),
    }
  }
}

fn body_value(body: Bytes) -> serde_json::Value {
  if body.is_empty() {
    return serde_json::Value::Null;
  }
  serde_json::from_slice(&body)
    .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(&body).into_owned()))
}

impl From<Response> for HandlerOutput {
  fn from(res: Response) -> Self {
    Self::Response(res)
  }
}

impl From<String> for HandlerOutput {
  fn from(body: String) -> Self {
    Self::Text(body)
  }
}

impl From<&'static str> for HandlerOutput {
  fn from(body: &'static str) -> Self {
    Self::Text(body.to_string())
  }
}

impl From<serde_json::Value> for HandlerOutput {
  fn from(value: serde_json::Value) -> Self {
    Self::Json(value)
  }
}

impl From<()> for HandlerOutput {
  fn from((): ()) -> Self {
    Self::Empty
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use http::header::CONTENT_TYPE;

  fn content_type(res: &Response) -> &str {
    res.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("")
  }

  #[test]
  fn text_output_is_plain() {
    let res = HandlerOutput::from("hi").into_response();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(content_type(&res).starts_with("text/plain"));
    assert_eq!(res.body().as_ref(), b"hi");
  }

  #[test]
  fn json_output_is_encoded() {
    let res = HandlerOutput::from(serde_json::json!({"a": 1})).into_response();
    assert_eq!(content_type(&res), "application/json");
    assert_eq!(res.body().as_ref(), br#"{"a":1}"#);
  }

  #[test]
  fn response_output_passes_through() {
    let res = HandlerOutput::from(response::empty(StatusCode::ACCEPTED)).into_response();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
  }

  #[test]
  fn into_value_reads_json_bodies() {
    let out = HandlerOutput::from(response::json(StatusCode::OK, &serde_json::json!([1, 2])));
    assert_eq!(out.into_value(), serde_json::json!([1, 2]));
    let out = HandlerOutput::from(response::text(StatusCode::OK, "plain"));
    assert_eq!(out.into_value(), serde_json::json!("plain"));
  }

  #[test]
  fn question_mark_lifts_errors() {
    fn fails() -> HandlerResult<()> {
      Err(HttpError::forbidden("nope"))?
    }
    assert!(matches!(fails(), Err(Interrupt::Failure(Failure::Http(_)))));

    fn breaks() -> HandlerResult<()> {
      Err(anyhow::anyhow!("boom"))?
    }
    assert!(matches!(breaks(), Err(Interrupt::Failure(Failure::Unexpected(_)))));
  }
}
