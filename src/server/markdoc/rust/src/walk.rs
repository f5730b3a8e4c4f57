/* src/server/markdoc/rust/src/walk.rs */

//! Depth-first, pre-order pass over the renderable tree. Built-in visits
//! are chosen by [`TagKind`]; registered [`TagVisitor`]s run after them.
//! Everything the pass learns is collected into [`Stuff`].

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;
use url::Url;

use crate::render::escape;
use crate::tree::{RenderNode, Tag};

static PRE_OPEN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\s*<pre\b([^>]*)>").unwrap_or_else(|_| unreachable!("static pattern")));
static HTML_ATTR: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)="([^"]*)""#).unwrap_or_else(|_| unreachable!("static pattern"))
});
static CONTENT_REF: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^(?P<path>[^#?]*(?:/|\.md))(?P<hash>#.*)?$").unwrap_or_else(|_| unreachable!("static pattern"))
});
static NUMERIC_SUFFIX: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"-\d+$").unwrap_or_else(|_| unreachable!("static pattern")));
static ORDER_PREFIX: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\[\d+\]").unwrap_or_else(|_| unreachable!("static pattern")));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
  pub level: u8,
  pub title: String,
  pub id: String,
}

/// Side-channel collected while walking one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stuff {
  /// Import statements, in document order.
  pub imports: Vec<String>,
  /// Content files referenced by internal links.
  pub links: BTreeSet<PathBuf>,
  pub headings: Vec<Heading>,
  /// Number of headings seen before the `slot` tag.
  pub slot: Option<usize>,
  ids: Vec<String>,
}

impl Stuff {
  /// Next unique heading id for `title`.
  ///
  /// Ids are compared with a trailing `-<digits>` removed, so an authored
  /// "Step 1" counts against "Step".
  pub fn unique_id(&mut self, title: &str) -> String {
    let base = slugify(title);
    let root = NUMERIC_SUFFIX.replace(&base, "").into_owned();
    let seen = self.ids.iter().filter(|id| NUMERIC_SUFFIX.replace(id, "") == root).count();
    let id = if seen == 0 { base } else { format!("{base}-{seen}") };
    self.ids.push(id.clone());
    id
  }
}

/// Heading text to an anchor id.
pub fn slugify(title: &str) -> String {
  let mut slug = String::with_capacity(title.len());
  let mut gap = false;
  for c in title.nfkd().filter(|c| !is_combining_mark(*c) && !c.is_control()) {
    if c.is_alphanumeric() {
      if gap && !slug.is_empty() {
        slug.push('-');
      }
      gap = false;
      slug.extend(c.to_lowercase());
    } else {
      gap = true;
    }
  }
  if slug.starts_with(|c: char| c.is_ascii_digit()) {
    slug.insert(0, '_');
  }
  slug
}

/// Source highlighting for fenced code. Output is an HTML fragment,
/// usually wrapped in `<pre ...>`.
pub trait Highlighter: Send + Sync {
  fn highlight(&self, code: &str, language: Option<&str>) -> String;
}

/// Escapes the code and wraps it without any coloring.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainHighlighter;

impl Highlighter for PlainHighlighter {
  fn highlight(&self, code: &str, language: Option<&str>) -> String {
    match language {
      Some(lang) => format!(
        "<pre class=\"highlight\" data-language=\"{}\"><code>{}</code></pre>",
        escape(lang),
        escape(code)
      ),
      None => format!("<pre class=\"highlight\"><code>{}</code></pre>", escape(code)),
    }
  }
}

/// Maps a content file to its public route.
pub trait RouteResolver: Send + Sync {
  fn route(&self, root: &Path, file: &Path) -> Option<String>;
}

/// `root/docs/[2]setup.md` -> `/docs/setup`, `root/docs/index.md` -> `/docs`.
/// With a mount point the routes are nested under it.
#[derive(Debug, Clone, Default)]
pub struct FileRoutes {
  mount: String,
}

impl FileRoutes {
  /// Content served under `mount`, e.g. `FileRoutes::at("/docs")`.
  pub fn at(mount: impl Into<String>) -> Self {
    let mount = mount.into();
    Self { mount: mount.trim_end_matches('/').to_string() }
  }
}

impl RouteResolver for FileRoutes {
  fn route(&self, root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let mut segments: Vec<String> = relative
      .components()
      .filter_map(|c| match c {
        Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
        _ => None,
      })
      .collect();
    if let Some(last) = segments.last_mut() {
      if let Some(stem) = last.strip_suffix(".md") {
        *last = stem.to_string();
      }
    }
    let mut segments: Vec<String> =
      segments.into_iter().map(|s| ORDER_PREFIX.replace(&s, "").into_owned()).collect();
    if segments.last().is_some_and(|s| s == "index") {
      segments.pop();
    }
    let path = segments.join("/");
    match (self.mount.as_str(), path.as_str()) {
      ("", path) => Some(format!("/{path}")),
      (mount, "") => Some(mount.to_string()),
      (mount, path) => Some(format!("{mount}/{path}")),
    }
  }
}

/// Runs after the built-in visit of every tag.
pub trait TagVisitor: Send + Sync {
  fn visit(&self, tag: &mut Tag, stuff: &mut Stuff);
}

impl<F> TagVisitor for F
where
  F: Fn(&mut Tag, &mut Stuff) + Send + Sync,
{
  fn visit(&self, tag: &mut Tag, stuff: &mut Stuff) {
    self(tag, stuff)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
  Code,
  Fence,
  Heading(u8),
  Link,
  Import,
  Slot,
  Other,
}

impl TagKind {
  pub fn of(tag: &Tag) -> Self {
    match tag.name() {
      Some("code" | "Code") => TagKind::Code,
      Some("pre" | "Fence") => TagKind::Fence,
      Some("Heading") => {
        let level = tag.attributes.get("level").and_then(Value::as_u64).unwrap_or(1);
        TagKind::Heading(u8::try_from(level).unwrap_or(1))
      }
      Some(name) => match name.as_bytes() {
        [b'h', level @ b'1'..=b'6'] => TagKind::Heading(level - b'0'),
        _ => match name {
          "a" | "link" | "Link" => TagKind::Link,
          "import" => TagKind::Import,
          "slot" => TagKind::Slot,
          _ => TagKind::Other,
        },
      },
      None => TagKind::Other,
    }
  }
}

pub struct Walker<'a> {
  pub file: &'a Path,
  pub root: &'a Path,
  pub base_url: Option<&'a Url>,
  pub highlighter: &'a dyn Highlighter,
  pub routes: &'a dyn RouteResolver,
  pub visitors: &'a [Arc<dyn TagVisitor>],
}

impl Walker<'_> {
  pub fn walk(&self, node: &mut RenderNode, stuff: &mut Stuff) {
    let RenderNode::Tag(tag) = node else { return };
    match TagKind::of(tag) {
      TagKind::Code => code(tag),
      TagKind::Fence => self.fence(tag),
      TagKind::Heading(level) => heading(tag, level, stuff),
      TagKind::Link => self.link(tag, stuff),
      TagKind::Import => import(tag, stuff),
      TagKind::Slot => stuff.slot = Some(stuff.headings.len()),
      TagKind::Other => {}
    }
    for visitor in self.visitors {
      visitor.visit(tag, stuff);
    }
    for child in &mut tag.children {
      self.walk(child, stuff);
    }
  }

  fn fence(&self, tag: &mut Tag) {
    let code = tag.text();
    let language = tag
      .attributes
      .get("data-language")
      .or_else(|| tag.attributes.get("language"))
      .and_then(Value::as_str)
      .map(str::to_string);
    let html = self.highlighter.highlight(&code, language.as_deref());

    let inner = match PRE_OPEN.captures(&html) {
      Some(caps) => {
        for attr in HTML_ATTR.captures_iter(caps.get(1).map_or("", |m| m.as_str())) {
          tag.attributes.insert(attr[1].to_string(), Value::String(unescape(&attr[2])));
        }
        let end = caps.get(0).map_or(0, |m| m.end());
        let rest = html[end..].trim_end();
        rest.strip_suffix("</pre>").unwrap_or(rest).to_string()
      }
      None => html,
    };

    tag.children.clear();
    if tag.name() == Some("pre") {
      tag.children.push(RenderNode::Raw(inner));
    } else {
      tag.attributes.insert("highlightedCode".to_string(), Value::String(inner));
    }
  }

  fn link(&self, tag: &mut Tag, stuff: &mut Stuff) {
    let Some(href) = tag.attributes.get("href").and_then(Value::as_str).map(str::to_string) else {
      return;
    };

    if self.is_external(&href) {
      tag.attributes.insert("target".to_string(), Value::String("_blank".to_string()));
      tag.attributes.insert("rel".to_string(), Value::String("noopener noreferrer".to_string()));
      return;
    }
    if has_scheme(&href) {
      return;
    }

    let Some(caps) = CONTENT_REF.captures(&href) else { return };
    let path = &caps["path"];
    let hash = caps.name("hash").map_or("", |m| m.as_str());
    let target = self.resolve_file(path);
    if let Some(route) = self.routes.route(self.root, &target) {
      tracing::debug!(file = %self.file.display(), href = %href, route = %route, "internal link");
      tag.attributes.insert("href".to_string(), Value::String(format!("{route}{hash}")));
      tag.attributes.insert("data-prefetch".to_string(), Value::Bool(true));
    }
    stuff.links.insert(target);
  }

  fn is_external(&self, href: &str) -> bool {
    let absolute = match href.strip_prefix("//") {
      Some(rest) => Url::parse(&format!("https://{rest}")),
      None => Url::parse(href),
    };
    let Ok(url) = absolute else { return false };
    if !matches!(url.scheme(), "http" | "https") {
      return false;
    }
    match self.base_url {
      Some(base) => url.origin() != base.origin(),
      None => true,
    }
  }

  /// Root-relative (`/docs/a.md`) or file-relative (`../a.md`) reference to
  /// a content file. Directory references point at their `index.md`.
  fn resolve_file(&self, path: &str) -> PathBuf {
    let joined = match path.strip_prefix('/') {
      Some(rooted) => self.root.join(rooted),
      None => self.file.parent().unwrap_or(self.root).join(path),
    };
    let joined = if path.ends_with('/') { joined.join("index.md") } else { joined };
    normalize(&joined)
  }
}

fn code(tag: &mut Tag) {
  let code = escape(&tag.text());
  tag.children.clear();
  if tag.name() == Some("code") {
    tag.children.push(RenderNode::Raw(code));
  } else {
    tag.attributes.insert("code".to_string(), Value::String(code));
  }
}

fn heading(tag: &mut Tag, level: u8, stuff: &mut Stuff) {
  let title = tag.text();
  let id = match tag.attributes.get("id").and_then(Value::as_str) {
    Some(id) => {
      stuff.ids.push(id.to_string());
      id.to_string()
    }
    None => stuff.unique_id(&title),
  };
  tag.attributes.insert("id".to_string(), Value::String(id.clone()));
  stuff.headings.push(Heading { level, title, id });
}

fn has_scheme(href: &str) -> bool {
  Url::parse(href).is_ok() || href.starts_with("//")
}

fn import(tag: &mut Tag, stuff: &mut Stuff) {
  tag.name = None;
  let Some(source) = tag.attributes.get("primary").and_then(Value::as_str) else {
    tracing::warn!("import tag without a source");
    return;
  };
  let statement = match tag.attributes.get("as").and_then(Value::as_str) {
    Some(binding) => format!("import {binding} from {};", Value::String(source.to_string())),
    None => format!("import {};", Value::String(source.to_string())),
  };
  if !stuff.imports.contains(&statement) {
    stuff.imports.push(statement);
  }
}

/// Highlighter output is HTML. Tag attributes hold raw values and are
/// escaped by the renderer.
fn unescape(value: &str) -> String {
  value
    .replace("&lt;", "<")
    .replace("&gt;", ">")
    .replace("&quot;", "\"")
    .replace("&#39;", "'")
    .replace("&amp;", "&")
}

fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir => {
        out.pop();
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::render::{HtmlRenderer, Renderer};

  static ROUTES: FileRoutes = FileRoutes { mount: String::new() };

  fn walker<'a>(base: Option<&'a Url>, visitors: &'a [Arc<dyn TagVisitor>]) -> Walker<'a> {
    Walker {
      file: Path::new("/site/docs/guide/intro.md"),
      root: Path::new("/site"),
      base_url: base,
      highlighter: &PlainHighlighter,
      routes: &ROUTES,
      visitors,
    }
  }

  fn text(s: &str) -> RenderNode {
    RenderNode::Text(s.to_string())
  }

  fn walk(tag: Tag, walker: &Walker<'_>) -> (Tag, Stuff) {
    let mut node = RenderNode::Tag(tag);
    let mut stuff = Stuff::default();
    walker.walk(&mut node, &mut stuff);
    match node {
      RenderNode::Tag(tag) => (tag, stuff),
      other => panic!("expected tag, got {other:?}"),
    }
  }

  #[test]
  fn slugs() {
    assert_eq!(slugify("Getting Started!"), "getting-started");
    assert_eq!(slugify("  Crème brûlée -- à la carte "), "creme-brulee-a-la-carte");
    assert_eq!(slugify("2024 Roadmap"), "_2024-roadmap");
    assert_eq!(slugify("tab\there"), "tabhere");
    assert_eq!(slugify("?!"), "");
  }

  #[test]
  fn duplicate_ids() {
    let mut stuff = Stuff::default();
    assert_eq!(stuff.unique_id("Getting Started!"), "getting-started");
    assert_eq!(stuff.unique_id("Getting Started"), "getting-started-1");
    assert_eq!(stuff.unique_id("Getting started"), "getting-started-2");
  }

  #[test]
  fn authored_numeric_suffix_counts_against_its_root() {
    let mut stuff = Stuff::default();
    assert_eq!(stuff.unique_id("Step"), "step");
    assert_eq!(stuff.unique_id("Step 1"), "step-1-1");

    let mut stuff = Stuff::default();
    assert_eq!(stuff.unique_id("Step 1"), "step-1");
    assert_eq!(stuff.unique_id("Step"), "step-1");
  }

  #[test]
  fn headings_and_slot() {
    let doc = Tag::new("article")
      .child(Tag::new("h1").child(text("Intro")).into())
      .child(Tag::new("slot").into())
      .child(Tag::new("Heading").attr("level", json!(3)).child(text("Intro")).into())
      .child(Tag::new("h2").attr("id", json!("custom")).child(text("Kept")).into());
    let (doc, stuff) = walk(doc, &walker(None, &[]));
    assert_eq!(
      stuff.headings,
      vec![
        Heading { level: 1, title: "Intro".into(), id: "intro".into() },
        Heading { level: 3, title: "Intro".into(), id: "intro-1".into() },
        Heading { level: 2, title: "Kept".into(), id: "custom".into() },
      ]
    );
    assert_eq!(stuff.slot, Some(1));
    assert_eq!(doc.children[2].as_tag().unwrap().attributes["id"], json!("intro-1"));
  }

  #[test]
  fn code_and_fence() {
    let doc = Tag::new("p")
      .child(Tag::new("code").child(text("<b>")).into())
      .child(Tag::new("Code").child(text("a&b")).into())
      .child(Tag::new("pre").attr("data-language", json!("rs")).child(text("x < y\n")).into())
      .child(Tag::new("Fence").attr("language", json!("js")).child(text("1")).into());
    let (doc, _) = walk(doc, &walker(None, &[]));
    let kids: Vec<&Tag> = doc.children.iter().filter_map(RenderNode::as_tag).collect();

    assert_eq!(kids[0].children, vec![RenderNode::Raw("&lt;b&gt;".into())]);
    assert_eq!(kids[1].attributes["code"], json!("a&amp;b"));
    assert!(kids[1].children.is_empty());

    assert_eq!(kids[2].attributes["class"], json!("highlight"));
    assert_eq!(kids[2].children, vec![RenderNode::Raw("<code>x &lt; y\n</code>".into())]);
    assert_eq!(kids[3].attributes["highlightedCode"], json!("<code>1</code>"));
    assert_eq!(kids[3].attributes["data-language"], json!("js"));
  }

  #[test]
  fn authored_ids_are_reserved() {
    let doc = Tag::new("article")
      .child(Tag::new("h2").attr("id", json!("intro")).child(text("Overview")).into())
      .child(Tag::new("h2").child(text("Intro")).into());
    let (_, stuff) = walk(doc, &walker(None, &[]));
    let ids: Vec<&str> = stuff.headings.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["intro", "intro-1"]);
  }

  #[test]
  fn highlighter_attributes_escaped_once() {
    let doc = Tag::new("pre").attr("data-language", json!("c&d")).child(text("x"));
    let (doc, _) = walk(doc, &walker(None, &[]));
    assert_eq!(doc.attributes["data-language"], json!("c&d"));
    let html = HtmlRenderer::default().render(&RenderNode::Tag(doc));
    assert!(html.starts_with(r#"<pre class="highlight" data-language="c&amp;d">"#), "{html}");
  }

  #[test]
  fn links() {
    let base = Url::parse("https://vessel.dev").unwrap();
    let doc = Tag::new("p")
      .child(Tag::new("a").attr("href", json!("https://github.com/x")).into())
      .child(Tag::new("a").attr("href", json!("https://vessel.dev/blog")).into())
      .child(Tag::new("Link").attr("href", json!("./setup.md#install")).into())
      .child(Tag::new("a").attr("href", json!("/docs/[2]api/")).into())
      .child(Tag::new("a").attr("href", json!("../../index.md")).into())
      .child(Tag::new("a").attr("href", json!("mailto:a@b.c")).into())
      .child(Tag::new("a").attr("href", json!("#local")).into());
    let (doc, stuff) = walk(doc, &walker(Some(&base), &[]));
    let attrs: Vec<_> = doc.children.iter().filter_map(RenderNode::as_tag).map(|t| &t.attributes).collect();

    assert_eq!(attrs[0]["target"], json!("_blank"));
    assert_eq!(attrs[0]["rel"], json!("noopener noreferrer"));
    assert!(!attrs[1].contains_key("target"));
    assert_eq!(attrs[2]["href"], json!("/docs/guide/setup#install"));
    assert_eq!(attrs[2]["data-prefetch"], json!(true));
    assert_eq!(attrs[3]["href"], json!("/docs/api"));
    assert_eq!(attrs[4]["href"], json!("/"));
    assert_eq!(attrs[5]["href"], json!("mailto:a@b.c"));
    assert_eq!(attrs[6].len(), 1);

    let links: Vec<&Path> = stuff.links.iter().map(PathBuf::as_path).collect();
    assert_eq!(
      links,
      vec![
        Path::new("/site/docs/[2]api/index.md"),
        Path::new("/site/docs/guide/setup.md"),
        Path::new("/site/index.md"),
      ]
    );
  }

  #[test]
  fn imports_and_visitors() {
    let visitors: Vec<Arc<dyn TagVisitor>> = vec![Arc::new(|tag: &mut Tag, stuff: &mut Stuff| {
      if tag.name() == Some("Chart") {
        tag.attributes.insert("headings".into(), json!(stuff.headings.len()));
      }
    })];
    let doc = Tag::new("article")
      .child(Tag::new("import").attr("primary", json!("./Chart.svelte")).attr("as", json!("Chart")).into())
      .child(Tag::new("import").attr("primary", json!("./Chart.svelte")).attr("as", json!("Chart")).into())
      .child(Tag::new("import").attr("primary", json!("./global.css")).into())
      .child(Tag::new("h2").child(text("Data")).into())
      .child(Tag::new("Chart").into());
    let (doc, stuff) = walk(doc, &walker(None, &visitors));
    assert_eq!(stuff.imports, vec![r#"import Chart from "./Chart.svelte";"#, r#"import "./global.css";"#]);
    assert_eq!(doc.children[0].as_tag().unwrap().name, None);
    assert_eq!(doc.children[4].as_tag().unwrap().attributes["headings"], json!(1));
  }

  #[test]
  fn file_routes() {
    let root = Path::new("/site");
    let routes = FileRoutes::default();
    assert_eq!(routes.route(root, Path::new("/site/index.md")).as_deref(), Some("/"));
    assert_eq!(routes.route(root, Path::new("/site/[1]docs/[3]intro.md")).as_deref(), Some("/docs/intro"));
    assert_eq!(routes.route(root, Path::new("/other/a.md")), None);
  }

  #[test]
  fn mounted_file_routes() {
    let root = Path::new("/site");
    let routes = FileRoutes::at("/docs/");
    assert_eq!(routes.route(root, Path::new("/site/index.md")).as_deref(), Some("/docs"));
    assert_eq!(routes.route(root, Path::new("/site/guide/[1]install.md")).as_deref(), Some("/docs/guide/install"));
  }
}
