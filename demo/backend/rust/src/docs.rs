/* demo/backend/rust/src/docs.rs */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Value, json};
use vessel_markdoc::{FileRoutes, MarkdocContext, ParseOptions};
use vessel_server::handler::document::data_script;
use vessel_server::{
  AppRoute, ComponentModule, DocumentContext, Handler, HandlerOutput, HandlerResult, HttpError,
  HttpModule, HttpRoute, Interrupt, MarkdownConfig, RequestEvent, ready,
};

/// Pages are served under this prefix; rewritten links must point at it.
const MOUNT: &str = "/docs";

/// Markdoc context for `root` with internal links routed under [`MOUNT`].
pub fn context(root: &Path, config: &MarkdownConfig) -> anyhow::Result<MarkdocContext> {
  let mut markdoc = MarkdocContext::new(root)
    .cache(config.cache_capacity, config.index_capacity)
    .routes(FileRoutes::at(MOUNT));
  if let Some(base) = &config.base_url {
    markdoc = markdoc.base_url(url::Url::parse(base)?);
  }
  Ok(markdoc)
}

/// Markdown pages under the content root, served at `/docs/...`.
pub fn route(markdoc: Arc<MarkdocContext>) -> AppRoute {
  let loader = Handler::new(move |event: RequestEvent| {
    let markdoc = Arc::clone(&markdoc);
    async move {
      let slug = event.param("slug").unwrap_or_default().to_string();
      let file = find_file(markdoc.root(), &slug)
        .ok_or_else(|| HttpError::not_found(format!("no page at {MOUNT}/{slug}")))?;
      let parsed =
        markdoc.parse_file(&file, &ParseOptions::default()).map_err(anyhow::Error::from)?;
      Ok::<_, Interrupt>(json!({ "html": parsed.output, "meta": parsed.meta }))
    }
  });
  AppRoute::new("docs", format!("{MOUNT}/:slug*")).page(ready(ComponentModule::with_loader(loader)))
}

/// `DELETE /api/markdown-cache[?file=...]` drops cached parses.
pub fn cache_route(markdoc: Arc<MarkdocContext>) -> HttpRoute {
  let delete = Handler::new(move |event: RequestEvent| {
    let markdoc = Arc::clone(&markdoc);
    async move {
      let file = event
        .url()
        .query_pairs()
        .find(|(k, _)| k == "file")
        .map(|(_, v)| markdoc.root().join(&*v));
      markdoc.clear_markdown_cache(file.as_deref());
      Ok::<_, Interrupt>(json!({ "cached": markdoc.cached() }))
    }
  });
  HttpRoute::new("markdown-cache", "/api/markdown-cache", ready(HttpModule::new().delete(delete)))
}

pub fn render(ctx: &DocumentContext<'_>) -> HandlerResult<HandlerOutput> {
  let page = ctx.page_data().cloned().unwrap_or(Value::Null);
  let title = page["meta"]["title"].as_str().unwrap_or("Vessel");
  let body = page["html"].as_str().unwrap_or_default();
  let mut html = format!(
    "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title></head><body>{body}",
    escape(title)
  );
  html.push_str(&data_script(&ctx.script_data()));
  html.push_str("</body></html>");
  Ok(HandlerOutput::Text(html))
}

fn escape(s: &str) -> String {
  s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// `guide/intro` -> `<root>/guide/[1]intro.md` or `<root>/guide/intro/index.md`.
/// Segments are matched against directory entries with `[N]` order prefixes
/// ignored, so nothing outside `root` is reachable.
fn find_file(root: &Path, slug: &str) -> Option<PathBuf> {
  let mut dir = root.to_path_buf();
  let segments: Vec<&str> = slug.split('/').filter(|s| !s.is_empty()).collect();
  for (i, segment) in segments.iter().enumerate() {
    let last = i + 1 == segments.len();
    let entry = std::fs::read_dir(&dir).ok()?.filter_map(Result::ok).find(|entry| {
      let name = entry.file_name().to_string_lossy().into_owned();
      let name = strip_order(&name);
      name == *segment || (last && name.strip_suffix(".md") == Some(*segment))
    })?;
    dir = entry.path();
  }
  if dir.is_dir() {
    dir = dir.join("index.md");
  }
  dir.is_file().then_some(dir)
}

fn strip_order(name: &str) -> &str {
  name
    .strip_prefix('[')
    .and_then(|rest| rest.split_once(']'))
    .filter(|(n, _)| n.chars().all(|c| c.is_ascii_digit()))
    .map_or(name, |(_, rest)| rest)
}
