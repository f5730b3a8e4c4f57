/* src/server/core/rust/src/handler/error.rs */

use http::StatusCode;
use serde_json::{Map, Value, json};
use url::Url;

use crate::errors::HttpError;
use crate::manifest::ServerManifest;
use crate::outcome::Failure;
use crate::response::{self, Response, X_VESSEL_ERROR, X_VESSEL_EXPECTED, YES};

const INTERNAL_MESSAGE: &str = "internal server error";

/// Turn a failure into its final response. Every branch is tagged
/// `X-Vessel-Error: yes`; only application errors carry `X-Vessel-Expected`.
pub fn handle_http_error(
  failure: Failure,
  url: &Url,
  manifest: Option<&ServerManifest>,
) -> Response {
  let mut res = match failure {
    Failure::Http(err) => expected_error(&err),
    Failure::Unexpected(err) => unexpected_error(&err, url, manifest),
  };
  res.headers_mut().insert(X_VESSEL_ERROR, YES);
  res
}

pub(crate) fn expected_error(err: &HttpError) -> Response {
  let mut body = Map::new();
  body.insert("message".into(), Value::String(err.message().to_string()));
  if let Some(data) = err.payload() {
    body.insert("data".into(), data.clone());
  }
  let mut res = response::json(err.status(), &json!({ "error": body }));
  for (name, value) in err.headers() {
    res.headers_mut().append(name.clone(), value.clone());
  }
  res.headers_mut().insert(X_VESSEL_EXPECTED, YES);
  res
}

fn unexpected_error(err: &anyhow::Error, url: &Url, manifest: Option<&ServerManifest>) -> Response {
  let Some(manifest) = manifest.filter(|m| m.dev) else {
    tracing::error!(url = %url, error = %err, "unexpected error");
    return response::json(
      StatusCode::INTERNAL_SERVER_ERROR,
      &json!({ "error": { "message": INTERNAL_MESSAGE } }),
    );
  };

  if let Some(hook) = &manifest.hooks.on_unexpected_http_error {
    hook(url, err);
  }
  let message = err.to_string();
  let stack = format!("{err:?}");
  tracing::error!(url = %url, message = %message, stack = %stack, "unexpected error");
  response::json(
    StatusCode::INTERNAL_SERVER_ERROR,
    &json!({ "error": { "message": message, "stack": stack } }),
  )
}
