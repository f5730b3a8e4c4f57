/* src/server/markdoc/rust/src/parser.rs */

//! Markdown + Markdoc tags to [`Node`].
//!
//! Tags are cut out of the source first and replaced by private-use
//! placeholders that CommonMark passes through as text. After the Markdown
//! pass, placeholders are split back out of text runs and open/close pairs
//! are nested around the siblings between them.

use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

use crate::ast::{Node, NodeKind};
use crate::syntax::{TagToken, parse_tag};

const OPEN: char = '\u{E000}';
const CLOSE: char = '\u{E001}';

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new("\u{E000}([0-9]+)\u{E001}").unwrap_or_else(|_| unreachable!("static pattern"))
});

struct Token {
  raw: String,
  tag: TagToken,
}

/// Parse a document body (frontmatter already removed).
pub fn parse(body: &str) -> Node {
  let (source, tokens) = tokenize(body);
  let mut builder = Builder { tokens: &tokens, stack: vec![Draft::new(NodeKind::Document)], text: String::new() };

  let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
  for event in Parser::new_ext(&source, options) {
    builder.event(event);
  }
  builder.flush_text();

  let mut stack = builder.stack;
  while stack.len() > 1 {
    if let Some(draft) = stack.pop() {
      push_item(&mut stack, Item::Draft(draft));
    }
  }
  let root = stack.pop().unwrap_or_else(|| Draft::new(NodeKind::Document));
  Node::with_children(root.kind, nest(root.children, &tokens))
}

fn placeholder(index: usize) -> String {
  format!("{OPEN}{index}{CLOSE}")
}

/// Replace every valid tag with a placeholder. A line holding only an
/// open/close tag is isolated in its own block so it nests at block level.
fn tokenize(body: &str) -> (String, Vec<Token>) {
  let mut out = String::with_capacity(body.len());
  let mut tokens = Vec::new();
  let mut fence: Option<&str> = None;

  for line in body.lines() {
    let trimmed = line.trim_start();
    if let Some(marker) = fence {
      if trimmed.starts_with(marker) {
        fence = None;
      }
      out.push_str(line);
      out.push('\n');
      continue;
    }
    if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
      fence = Some(&trimmed[..3]);
      out.push_str(line);
      out.push('\n');
      continue;
    }

    let before = tokens.len();
    let replaced = replace_tags(line, &mut tokens);
    let lone_block_tag = tokens.len() == before + 1
      && replaced.trim() == placeholder(before)
      && !matches!(tokens[before].tag, TagToken::Interpolation(_));
    if lone_block_tag {
      let indent = &line[..line.len() - trimmed.len()];
      out.push('\n');
      out.push_str(indent);
      out.push_str(&placeholder(before));
      out.push_str("\n\n");
    } else {
      out.push_str(&replaced);
      out.push('\n');
    }
  }
  (out, tokens)
}

fn replace_tags(line: &str, tokens: &mut Vec<Token>) -> String {
  let mut out = String::with_capacity(line.len());
  let mut rest = line;
  while let Some(start) = rest.find("{%") {
    let Some(len) = rest[start + 2..].find("%}") else { break };
    let end = start + 2 + len + 2;
    let raw = &rest[start..end];
    out.push_str(&rest[..start]);
    match parse_tag(&raw[2..raw.len() - 2]) {
      Ok(tag) => {
        out.push_str(&placeholder(tokens.len()));
        tokens.push(Token { raw: raw.to_string(), tag });
      }
      Err(error) => {
        tracing::warn!(tag = raw, error = %error, "invalid markdoc tag left as text");
        out.push_str(raw);
      }
    }
    rest = &rest[end..];
  }
  out.push_str(rest);
  out
}

/// Put the original tag text back, for code where tags are literal.
fn restore(text: &str, tokens: &[Token]) -> String {
  PLACEHOLDER
    .replace_all(text, |caps: &regex::Captures<'_>| {
      caps[1]
        .parse::<usize>()
        .ok()
        .and_then(|i| tokens.get(i))
        .map_or_else(|| caps[0].to_string(), |t| t.raw.clone())
    })
    .into_owned()
}

struct Draft {
  kind: NodeKind,
  children: Vec<Item>,
}

impl Draft {
  fn new(kind: NodeKind) -> Self {
    Self { kind, children: Vec::new() }
  }
}

enum Item {
  Draft(Draft),
  Token(usize),
}

fn push_item(stack: &mut [Draft], item: Item) {
  if let Some(top) = stack.last_mut() {
    top.children.push(item);
  }
}

struct Builder<'t> {
  tokens: &'t [Token],
  stack: Vec<Draft>,
  text: String,
}

impl Builder<'_> {
  fn open(&mut self, kind: NodeKind) {
    self.stack.push(Draft::new(kind));
  }

  fn close(&mut self) {
    if self.stack.len() < 2 {
      return;
    }
    if let Some(draft) = self.stack.pop() {
      push_item(&mut self.stack, Item::Draft(draft));
    }
  }

  fn leaf(&mut self, kind: NodeKind) {
    push_item(&mut self.stack, Item::Draft(Draft::new(kind)));
  }

  fn in_fence(&mut self) -> Option<&mut String> {
    match self.stack.last_mut().map(|d| &mut d.kind) {
      Some(NodeKind::Fence { content, .. }) => Some(content),
      _ => None,
    }
  }

  /// Split buffered text around placeholders.
  fn flush_text(&mut self) {
    if self.text.is_empty() {
      return;
    }
    let text = std::mem::take(&mut self.text);
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(&text) {
      let Some(whole) = caps.get(0) else { continue };
      let index = caps[1].parse::<usize>().ok().filter(|i| *i < self.tokens.len());
      let Some(index) = index else { continue };
      if whole.start() > last {
        self.leaf(NodeKind::Text(text[last..whole.start()].to_string()));
      }
      push_item(&mut self.stack, Item::Token(index));
      last = whole.end();
    }
    if last < text.len() {
      self.leaf(NodeKind::Text(text[last..].to_string()));
    }
  }

  fn event(&mut self, event: Event<'_>) {
    if let Event::Text(text) = &event {
      if self.in_fence().is_some() {
        let code = restore(text, self.tokens);
        if let Some(content) = self.in_fence() {
          content.push_str(&code);
        }
      } else {
        self.text.push_str(text);
      }
      return;
    }
    self.flush_text();

    match event {
      Event::Start(tag) => self.start(tag),
      Event::End(TagEnd::HtmlBlock) => {}
      Event::End(_) => self.close(),
      Event::Code(code) => self.leaf(NodeKind::Code(restore(&code, self.tokens))),
      Event::Html(html) | Event::InlineHtml(html) => self.leaf(NodeKind::Html(html.into_string())),
      Event::SoftBreak => self.leaf(NodeKind::Softbreak),
      Event::HardBreak => self.leaf(NodeKind::Hardbreak),
      Event::Rule => self.leaf(NodeKind::Hr),
      Event::InlineMath(text) | Event::DisplayMath(text) | Event::FootnoteReference(text) => {
        self.leaf(NodeKind::Text(text.into_string()));
      }
      _ => {}
    }
  }

  fn start(&mut self, tag: Tag<'_>) {
    let kind = match tag {
      Tag::Paragraph => NodeKind::Paragraph,
      Tag::Heading { level, .. } => NodeKind::Heading(level as u8),
      Tag::BlockQuote(_) => NodeKind::Blockquote,
      Tag::CodeBlock(kind) => {
        let lang = match kind {
          CodeBlockKind::Fenced(info) => {
            info.split_whitespace().next().map(str::to_string).filter(|l| !l.is_empty())
          }
          CodeBlockKind::Indented => None,
        };
        NodeKind::Fence { lang, content: String::new() }
      }
      // Html events inside are kept as leaves.
      Tag::HtmlBlock => return,
      Tag::List(start) => NodeKind::List { ordered: start.is_some(), start },
      Tag::Item => NodeKind::Item,
      Tag::Emphasis => NodeKind::Emphasis,
      Tag::Strong => NodeKind::Strong,
      Tag::Strikethrough => NodeKind::Strike,
      Tag::Link { dest_url, title, .. } => {
        NodeKind::Link { href: dest_url.into_string(), title: title.into_string() }
      }
      Tag::Image { dest_url, title, .. } => {
        NodeKind::Image { src: dest_url.into_string(), title: title.into_string() }
      }
      Tag::Table(_) => NodeKind::Table,
      Tag::TableHead => NodeKind::TableHead,
      Tag::TableRow => NodeKind::TableRow,
      Tag::TableCell => NodeKind::TableCell,
      _ => NodeKind::Fragment,
    };
    self.open(kind);
  }
}

struct Frame {
  name: String,
  attributes: Vec<(String, crate::ast::Expr)>,
  children: Vec<Node>,
}

/// Resolve placeholders into tag nodes, nesting open/close pairs over the
/// siblings between them.
fn nest(items: Vec<Item>, tokens: &[Token]) -> Vec<Node> {
  let mut root: Vec<Node> = Vec::new();
  let mut frames: Vec<Frame> = Vec::new();

  fn target<'a>(root: &'a mut Vec<Node>, frames: &'a mut [Frame]) -> &'a mut Vec<Node> {
    match frames.last_mut() {
      Some(frame) => &mut frame.children,
      None => root,
    }
  }

  fn finish(frame: Frame) -> Node {
    Node::with_children(
      NodeKind::Tag { name: frame.name, attributes: frame.attributes },
      frame.children,
    )
  }

  for item in items {
    let item = hoist(item, tokens);
    match item {
      Item::Draft(draft) => {
        let node = Node::with_children(draft.kind, nest(draft.children, tokens));
        target(&mut root, &mut frames).push(node);
      }
      Item::Token(index) => match &tokens[index].tag {
        TagToken::Interpolation(expr) => {
          target(&mut root, &mut frames).push(Node::new(NodeKind::Interpolation(expr.clone())));
        }
        TagToken::Open { name, attributes, self_closing: true } => {
          let node =
            Node::new(NodeKind::Tag { name: name.clone(), attributes: attributes.clone() });
          target(&mut root, &mut frames).push(node);
        }
        TagToken::Open { name, attributes, self_closing: false } => frames.push(Frame {
          name: name.clone(),
          attributes: attributes.clone(),
          children: Vec::new(),
        }),
        TagToken::Close { name } => {
          let Some(depth) = frames.iter().rposition(|f| f.name == *name) else {
            tracing::warn!(tag = %name, "closing tag without opening tag");
            continue;
          };
          while frames.len() > depth {
            let Some(frame) = frames.pop() else { break };
            if frame.name != *name {
              tracing::warn!(tag = %frame.name, "tag closed implicitly");
            }
            let node = finish(frame);
            target(&mut root, &mut frames).push(node);
          }
        }
      },
    }
  }

  while let Some(frame) = frames.pop() {
    tracing::warn!(tag = %frame.name, "unclosed tag");
    let node = finish(frame);
    target(&mut root, &mut frames).push(node);
  }
  root
}

/// A paragraph holding nothing but one open/close tag is that tag.
fn hoist(item: Item, tokens: &[Token]) -> Item {
  match item {
    Item::Draft(draft)
      if draft.kind == NodeKind::Paragraph
        && draft.children.len() == 1
        && matches!(
          &draft.children[0],
          Item::Token(i) if !matches!(tokens[*i].tag, TagToken::Interpolation(_))
        ) =>
    {
      draft.children.into_iter().next().unwrap_or(Item::Draft(Draft::new(NodeKind::Fragment)))
    }
    other => other,
  }
}
