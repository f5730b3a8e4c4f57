/* src/server/markdoc/rust/src/ast.rs */

use serde_json::Value;

/// A value expression inside a tag: attribute values, `{% $var %}`
/// interpolations and function arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Value(Value),
  /// `$a.b.c`, stored as `["a", "b", "c"]`.
  Variable(Vec<String>),
  Call { name: String, args: Vec<Expr> },
  Array(Vec<Expr>),
  Object(Vec<(String, Expr)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
  Document,
  Paragraph,
  Heading(u8),
  Blockquote,
  Fence { lang: Option<String>, content: String },
  List { ordered: bool, start: Option<u64> },
  Item,
  Emphasis,
  Strong,
  Strike,
  Link { href: String, title: String },
  Image { src: String, title: String },
  Table,
  TableHead,
  TableRow,
  TableCell,
  /// Container without markup of its own.
  Fragment,
  Text(String),
  Code(String),
  Html(String),
  Softbreak,
  Hardbreak,
  Hr,
  /// `{% name attrs %}…{% /name %}` or `{% name /%}`.
  Tag { name: String, attributes: Vec<(String, Expr)> },
  /// `{% $var %}` or `{% fn(…) %}`.
  Interpolation(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
  pub kind: NodeKind,
  pub children: Vec<Node>,
}

impl Node {
  pub fn new(kind: NodeKind) -> Self {
    Self { kind, children: Vec::new() }
  }

  pub fn with_children(kind: NodeKind, children: Vec<Node>) -> Self {
    Self { kind, children }
  }

  /// Concatenated text of every descendant text and inline-code node.
  pub fn text(&self) -> String {
    let mut out = String::new();
    self.collect_text(&mut out);
    out
  }

  fn collect_text(&self, out: &mut String) {
    match &self.kind {
      NodeKind::Text(text) | NodeKind::Code(text) => out.push_str(text),
      _ => self.children.iter().for_each(|c| c.collect_text(out)),
    }
  }

  /// Depth-first, pre-order visit of this node and its descendants.
  pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut Node)) {
    f(self);
    for child in &mut self.children {
      child.visit_mut(f);
    }
  }
}
