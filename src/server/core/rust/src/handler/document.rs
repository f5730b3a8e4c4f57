/* src/server/core/rust/src/handler/document.rs */

use std::sync::Arc;

use serde_json::{Map, Value};
use url::Url;

use super::error::handle_http_error;
use super::{clone_request, run_handler};
use crate::errors::HttpError;
use crate::event::{RequestEvent, ResponseHandle};
use crate::manifest::{AppRoute, ServerManifest};
use crate::module::ComponentType;
use crate::outcome::{HandlerOutput, HandlerResult, Interrupt};
use crate::pattern::Params;
use crate::response::{self, Request, Response};

pub const DATA_SCRIPT_ID: &str = "__VESSEL_DATA__";

/// Server loader output of one component in the page's chain.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteData {
  pub route_id: String,
  pub component: ComponentType,
  /// `None` when the component has no server loader.
  pub data: Option<Value>,
}

/// Everything a renderer needs to produce a page.
pub struct DocumentContext<'a> {
  pub url: &'a Url,
  pub route: &'a AppRoute,
  pub params: &'a Params,
  /// Layouts outer to inner, then the page.
  pub data: Vec<RouteData>,
}

impl DocumentContext<'_> {
  pub fn page_data(&self) -> Option<&Value> {
    self.data.last().filter(|d| d.component == ComponentType::Page).and_then(|d| d.data.as_ref())
  }

  /// Client hydration payload: page data at the top level, layout data
  /// grouped under `_layouts` by route id.
  pub fn script_data(&self) -> Value {
    let mut out = Map::new();
    out.insert("route".into(), Value::String(self.route.id.clone()));
    out.insert("params".into(), self.params.to_json());
    out.insert("page".into(), self.page_data().cloned().unwrap_or(Value::Null));

    let mut layouts = Map::new();
    for entry in &self.data {
      if entry.component != ComponentType::Layout {
        continue;
      }
      if let Some(data) = &entry.data {
        layouts.insert(entry.route_id.clone(), data.clone());
      }
    }
    if !layouts.is_empty() {
      out.insert("_layouts".into(), Value::Object(layouts));
    }
    Value::Object(out)
  }
}

/// Turns a matched page and its loader data into a document.
///
/// `Text` output is sent as HTML; a `Response` is sent untouched.
pub trait DocumentRenderer: Send + Sync {
  fn render(&self, ctx: &DocumentContext<'_>) -> HandlerResult<HandlerOutput>;
}

impl<F> DocumentRenderer for F
where
  F: Fn(&DocumentContext<'_>) -> HandlerResult<HandlerOutput> + Send + Sync,
{
  fn render(&self, ctx: &DocumentContext<'_>) -> HandlerResult<HandlerOutput> {
    self(ctx)
  }
}

/// Fallback renderer: an empty app shell carrying the loader data for the
/// client to hydrate from.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRenderer;

impl DocumentRenderer for ShellRenderer {
  fn render(&self, ctx: &DocumentContext<'_>) -> HandlerResult<HandlerOutput> {
    let mut html = String::from(
      "<!DOCTYPE html><html><head><meta charset=\"utf-8\"></head><body><div id=\"app\"></div>",
    );
    html.push_str(&data_script(&ctx.script_data()));
    html.push_str("</body></html>");
    Ok(HandlerOutput::Text(html))
  }
}

/// `<script type="application/json">` tag holding `data`.
pub fn data_script(data: &Value) -> String {
  format!(
    r#"<script id="{DATA_SCRIPT_ID}" type="application/json">{}</script>"#,
    script_safe_json(&data.to_string())
  )
}

/// Escape characters that could end the surrounding `<script>` element or
/// break it as a JS string literal. Only ever appear inside JSON strings, so
/// `\uXXXX` keeps the value intact.
fn script_safe_json(json: &str) -> String {
  let mut out = String::with_capacity(json.len());
  for ch in json.chars() {
    match ch {
      '<' => out.push_str("\\u003c"),
      '>' => out.push_str("\\u003e"),
      '&' => out.push_str("\\u0026"),
      '\u{2028}' => out.push_str("\\u2028"),
      '\u{2029}' => out.push_str("\\u2029"),
      _ => out.push(ch),
    }
  }
  out
}

/// Render the page matching the URL, running the layout chain's loaders
/// outer to inner and then the page loader.
pub async fn handle_document_request(
  url: Url,
  request: Request,
  manifest: &Arc<ServerManifest>,
) -> Response {
  match run(&url, request, manifest).await {
    Ok(res) => res,
    Err(Interrupt::Redirect(res)) => res,
    Err(Interrupt::Failure(failure)) => handle_http_error(failure, &url, Some(manifest)),
  }
}

async fn run(url: &Url, request: Request, manifest: &Arc<ServerManifest>) -> HandlerResult {
  let Some((route, params)) = manifest.match_page(url) else {
    return Err(HttpError::not_found("not found").into());
  };

  let bag = ResponseHandle::for_request(&request);
  let loader = ChainLoader { url, params: &params, request: &request, manifest, bag: &bag };

  let mut data = Vec::with_capacity(route.layouts.len() + 1);
  for id in &route.layouts {
    let Some(layout) = manifest.app_route(id) else {
      tracing::warn!(route = %route.id, layout = %id, "layout missing from manifest");
      continue;
    };
    data.push(loader.load(layout, ComponentType::Layout).await?);
  }
  data.push(loader.load(route, ComponentType::Page).await?);

  tracing::debug!(route = %route.id, loaders = data.len(), "document request");
  let ctx = DocumentContext { url, route, params: &params, data };
  let output = match &manifest.renderer {
    Some(renderer) => renderer.render(&ctx)?,
    None => ShellRenderer.render(&ctx)?,
  };
  let res = match output {
    HandlerOutput::Text(body) => response::html(body),
    other => other.into_response(),
  };
  Ok(bag.apply(res))
}

/// Shared inputs for every loader of one document request. All loaders write
/// into the same response bag.
struct ChainLoader<'a> {
  url: &'a Url,
  params: &'a Params,
  request: &'a Request,
  manifest: &'a Arc<ServerManifest>,
  bag: &'a ResponseHandle,
}

impl ChainLoader<'_> {
  async fn load(&self, route: &AppRoute, ty: ComponentType) -> HandlerResult<RouteData> {
    let mut entry = RouteData { route_id: route.id.clone(), component: ty, data: None };
    let Some(module) = route.load(ty).await? else {
      return Ok(entry);
    };
    let Some(loader) = &module.server_loader else {
      return Ok(entry);
    };

    let event = RequestEvent::with_response(
      self.url.clone(),
      self.params.clone(),
      clone_request(self.request),
      Some(Arc::clone(self.manifest)),
      self.bag.clone(),
    );
    let res = run_handler(event, loader).await?;
    entry.data = Some(HandlerOutput::Response(res).into_value());
    Ok(entry)
  }
}
