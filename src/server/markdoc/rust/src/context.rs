/* src/server/markdoc/rust/src/context.rs */

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use crate::MarkdocError;
use crate::ast::Node;
use crate::cache::MarkdownCache;
use crate::config::{ConfigResolver, DirectoryConfig};
use crate::frontmatter::{self, FrontmatterError};
use crate::layout;
use crate::parser;
use crate::render::{HtmlRenderer, Renderer};
use crate::transform::transform;
use crate::tree::RenderNode;
use crate::walk::{FileRoutes, Heading, Highlighter, PlainHighlighter, RouteResolver, Stuff, TagVisitor, Walker};

pub type AstTransformer = Arc<dyn Fn(&mut Node) + Send + Sync>;
pub type ContentTransformer = Arc<dyn Fn(&mut RenderNode) + Send + Sync>;
pub type OutputTransformer = Arc<dyn Fn(String) -> String + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkdownMeta {
  pub title: Option<String>,
  pub headings: Vec<Heading>,
  pub frontmatter: Map<String, Value>,
  /// Milliseconds since the Unix epoch.
  pub last_modified: Option<u64>,
  #[serde(skip)]
  pub slot: Option<usize>,
}

#[derive(Debug)]
pub struct ParsedMarkdown {
  pub meta: MarkdownMeta,
  pub ast: Node,
  pub content: RenderNode,
  pub output: String,
  pub stuff: Stuff,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
  pub ignore_cache: bool,
  /// Overrides the file's modification time.
  pub last_modified: Option<u64>,
}

/// Everything one site needs to turn Markdoc files into output: content
/// root, config resolution, highlighting, routes, renderer, transformer
/// hooks and the parse cache.
pub struct MarkdocContext {
  root: PathBuf,
  cache: MarkdownCache,
  config: Arc<dyn ConfigResolver>,
  highlighter: Arc<dyn Highlighter>,
  routes: Arc<dyn RouteResolver>,
  renderer: Arc<dyn Renderer>,
  base_url: Option<Url>,
  ast_transformers: Vec<AstTransformer>,
  content_transformers: Vec<ContentTransformer>,
  tag_visitors: Vec<Arc<dyn TagVisitor>>,
  output_transformers: Vec<OutputTransformer>,
}

impl MarkdocContext {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      cache: MarkdownCache::default(),
      config: Arc::new(DirectoryConfig::default()),
      highlighter: Arc::new(PlainHighlighter),
      routes: Arc::new(FileRoutes::default()),
      renderer: Arc::new(HtmlRenderer::default()),
      base_url: None,
      ast_transformers: Vec::new(),
      content_transformers: Vec::new(),
      tag_visitors: Vec::new(),
      output_transformers: Vec::new(),
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn cache(mut self, entries: usize, files: usize) -> Self {
    self.cache = MarkdownCache::new(entries, files);
    self
  }

  pub fn config(mut self, resolver: impl ConfigResolver + 'static) -> Self {
    self.config = Arc::new(resolver);
    self
  }

  pub fn highlighter(mut self, highlighter: impl Highlighter + 'static) -> Self {
    self.highlighter = Arc::new(highlighter);
    self
  }

  pub fn routes(mut self, routes: impl RouteResolver + 'static) -> Self {
    self.routes = Arc::new(routes);
    self
  }

  pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
    self.renderer = Arc::new(renderer);
    self
  }

  pub fn base_url(mut self, url: Url) -> Self {
    self.base_url = Some(url);
    self
  }

  pub fn ast_transformer(mut self, f: impl Fn(&mut Node) + Send + Sync + 'static) -> Self {
    self.ast_transformers.push(Arc::new(f));
    self
  }

  pub fn content_transformer(mut self, f: impl Fn(&mut RenderNode) + Send + Sync + 'static) -> Self {
    self.content_transformers.push(Arc::new(f));
    self
  }

  pub fn tag_visitor(mut self, visitor: impl TagVisitor + 'static) -> Self {
    self.tag_visitors.push(Arc::new(visitor));
    self
  }

  pub fn output_transformer(mut self, f: impl Fn(String) -> String + Send + Sync + 'static) -> Self {
    self.output_transformers.push(Arc::new(f));
    self
  }

  /// Read `file` from disk and parse it.
  pub fn parse_file(&self, file: &Path, options: &ParseOptions) -> Result<Arc<ParsedMarkdown>, MarkdocError> {
    let source = read(file)?;
    self.parse_markdown(file, &source, options)
  }

  pub fn parse_markdown(
    &self,
    file: &Path,
    source: &str,
    options: &ParseOptions,
  ) -> Result<Arc<ParsedMarkdown>, MarkdocError> {
    if !options.ignore_cache {
      if let Some(hit) = self.cache.get(file, source) {
        tracing::debug!(file = %file.display(), "markdown cache hit");
        return Ok(hit);
      }
    }

    let (yaml, body) = frontmatter::split(source);
    let frontmatter = match yaml {
      Some(yaml) => frontmatter::parse(yaml).map_err(|e| match e {
        FrontmatterError::Yaml(source) => MarkdocError::Frontmatter { path: file.to_path_buf(), source },
        FrontmatterError::NotAMapping => MarkdocError::FrontmatterShape { path: file.to_path_buf() },
      })?,
      None => Map::new(),
    };

    let mut ast = parser::parse(body);
    for f in &self.ast_transformers {
      f(&mut ast);
    }

    let config = self.config.resolve(file);
    let mut content = transform(&ast, &config, &frontmatter);
    for f in &self.content_transformers {
      f(&mut content);
    }

    let walker = Walker {
      file,
      root: &self.root,
      base_url: self.base_url.as_ref(),
      highlighter: self.highlighter.as_ref(),
      routes: self.routes.as_ref(),
      visitors: &self.tag_visitors,
    };
    let mut stuff = Stuff::default();
    walker.walk(&mut content, &mut stuff);

    let title = stuff.headings.iter().find(|h| h.level == 1).map(|h| h.title.clone());
    let mut meta = MarkdownMeta {
      title,
      headings: stuff.headings.clone(),
      frontmatter,
      last_modified: options.last_modified.or_else(|| modified(file)),
      slot: stuff.slot,
    };

    if !layout::is_layout(file) {
      let mut parsed = Vec::new();
      for path in layout::find_layouts(&self.root, file) {
        let layout_options = ParseOptions { ignore_cache: options.ignore_cache, last_modified: None };
        parsed.push(self.parse_file(&path, &layout_options)?);
      }
      let metas: Vec<&MarkdownMeta> = parsed.iter().map(|p| &p.meta).collect();
      layout::merge(&mut meta, &metas);
    }

    let mut output = self.renderer.render(&content);
    for f in &self.output_transformers {
      output = f(output);
    }

    let parsed = Arc::new(ParsedMarkdown { meta, ast, content, output, stuff });
    self.cache.insert(file, source, parsed.clone());
    tracing::debug!(file = %file.display(), "markdown parsed");
    Ok(parsed)
  }

  /// Drop cached parses of `file`, or of every file when `None`.
  pub fn clear_markdown_cache(&self, file: Option<&Path>) {
    self.cache.clear(file);
  }

  pub fn cached(&self) -> usize {
    self.cache.len()
  }
}

fn read(file: &Path) -> Result<String, MarkdocError> {
  std::fs::read_to_string(file).map_err(|source| MarkdocError::Io { path: file.to_path_buf(), source })
}

fn modified(file: &Path) -> Option<u64> {
  let time = std::fs::metadata(file).and_then(|m| m.modified()).ok()?;
  let millis = time.duration_since(UNIX_EPOCH).ok()?.as_millis();
  u64::try_from(millis).ok()
}
