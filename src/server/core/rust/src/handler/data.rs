/* src/server/core/rust/src/handler/data.rs */

use std::sync::Arc;

use ::http::StatusCode;
use ::http::header::SET_COOKIE;
use url::Url;

use super::error::handle_http_error;
use super::{query_value, run_handler};
use crate::errors::HttpError;
use crate::event::RequestEvent;
use crate::manifest::{AppRoute, ServerManifest};
use crate::module::ComponentType;
use crate::outcome::{HandlerResult, Interrupt};
use crate::pattern::Params;
use crate::response::{self, NO, Request, Response, X_VESSEL_DATA, YES, location_of};

/// Serve a client-side data refetch: `?_data&route_id=<id>&route_type=<type>`.
pub async fn handle_data_request(
  url: Url,
  request: Request,
  manifest: &Arc<ServerManifest>,
) -> Response {
  match run(&url, request, manifest).await {
    Ok(res) => res,
    Err(Interrupt::Redirect(res)) => {
      let mut out = response::client_redirect(location_of(&res), res.status());
      for cookie in res.headers().get_all(SET_COOKIE) {
        out.headers_mut().append(SET_COOKIE, cookie.clone());
      }
      out
    }
    Err(Interrupt::Failure(failure)) => handle_http_error(failure, &url, Some(manifest)),
  }
}

async fn run(url: &Url, request: Request, manifest: &Arc<ServerManifest>) -> HandlerResult {
  let not_found = || Interrupt::from(HttpError::not_found("not found"));

  let ty = query_value(url, "route_type").and_then(|t| ComponentType::parse(&t));
  let id = query_value(url, "route_id");
  let (Some(ty), Some(id)) = (ty, id) else {
    return Err(not_found());
  };
  let route = manifest.app_route(&id).filter(|r| r.has(ty)).ok_or_else(not_found)?;
  let params = route_params(route, ty, url, manifest).ok_or_else(not_found)?;

  let module = route.load(ty).await?.ok_or_else(not_found)?;
  let Some(loader) = &module.server_loader else {
    let mut res = response::empty(StatusCode::OK);
    res.headers_mut().insert(X_VESSEL_DATA, NO);
    return Ok(res);
  };

  tracing::debug!(route = %route.id, component = ty.as_str(), "data request");
  let event = RequestEvent::new(url.clone(), params, request, Some(Arc::clone(manifest)));
  let mut res = run_handler(event, loader).await?;
  res.headers_mut().insert(X_VESSEL_DATA, YES);
  Ok(res)
}

/// Params from the route's own pattern. A layout sits above the page being
/// viewed, so when its pattern does not cover the URL the params come from
/// the page route that lists it in its layout chain.
fn route_params(
  route: &AppRoute,
  ty: ComponentType,
  url: &Url,
  manifest: &ServerManifest,
) -> Option<Params> {
  if let Some(params) = route.matcher.exec(url.path(), manifest.dev) {
    return Some(params);
  }
  if ty != ComponentType::Layout {
    return None;
  }
  manifest
    .match_page(url)
    .filter(|(page, _)| page.layouts.iter().any(|l| *l == route.id))
    .map(|(_, params)| params)
}
