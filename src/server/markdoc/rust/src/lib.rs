/* src/server/markdoc/rust/src/lib.rs */

//! Markdoc content pipeline: Markdown with `{% %}` tags parsed into an AST,
//! transformed with per-directory config, walked for headings, links and
//! imports, rendered to a string and cached per file.

use std::path::PathBuf;

pub mod ast;
pub mod cache;
pub mod config;
pub mod context;
pub mod frontmatter;
pub mod layout;
pub mod parser;
pub mod render;
mod syntax;
pub mod transform;
pub mod tree;
pub mod walk;

pub use ast::{Expr, Node, NodeKind};
pub use cache::MarkdownCache;
pub use config::{ConfigResolver, DirectoryConfig, MarkdocConfig, MarkdocFunction, TagConfig};
pub use context::{MarkdocContext, MarkdownMeta, ParseOptions, ParsedMarkdown};
pub use layout::{LAYOUT_FILE, find_layouts};
pub use render::{AttributeFormatter, BoundAttributes, HtmlAttributes, HtmlRenderer, Renderer};
pub use tree::{RenderNode, Tag};
pub use walk::{
  FileRoutes, Heading, Highlighter, PlainHighlighter, RouteResolver, Stuff, TagKind, TagVisitor,
  slugify,
};

#[derive(Debug, thiserror::Error)]
pub enum MarkdocError {
  #[error("failed to read {}: {source}", path.display())]
  Io { path: PathBuf, source: std::io::Error },
  #[error("invalid frontmatter in {}: {source}", path.display())]
  Frontmatter { path: PathBuf, source: serde_yaml::Error },
  #[error("frontmatter in {} must be a mapping", path.display())]
  FrontmatterShape { path: PathBuf },
}
