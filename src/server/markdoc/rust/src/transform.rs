/* src/server/markdoc/rust/src/transform.rs */

//! AST to renderable tree: element names, attribute evaluation, variables,
//! functions and the `if`/`else` tag.

use serde_json::{Map, Value};

use crate::ast::{Expr, Node, NodeKind};
use crate::config::MarkdocConfig;
use crate::tree::{RenderNode, Tag};

/// Transform `ast` with `config`. `frontmatter` is visible as `$frontmatter`.
pub fn transform(ast: &Node, config: &MarkdocConfig, frontmatter: &Map<String, Value>) -> RenderNode {
  let mut variables = config.variables.clone();
  variables.insert("frontmatter".to_string(), Value::Object(frontmatter.clone()));
  let transformer = Transformer { config, variables: &variables };
  let children = transformer.children(&ast.children, false);
  Tag::new(transformer.node_name("document", "article")).with_children(children).into()
}

pub fn truthy(value: &Value) -> bool {
  !matches!(value, Value::Null | Value::Bool(false))
}

/// `null` renders as nothing, strings as themselves, anything else as JSON.
pub fn display(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

struct Transformer<'a> {
  config: &'a MarkdocConfig,
  variables: &'a Map<String, Value>,
}

impl Transformer<'_> {
  fn node_name(&self, key: &str, default: &str) -> String {
    self.config.nodes.get(key).cloned().unwrap_or_else(|| default.to_string())
  }

  fn overridden(&self, key: &str) -> bool {
    self.config.nodes.contains_key(key)
  }

  fn children(&self, nodes: &[Node], in_head: bool) -> Vec<RenderNode> {
    nodes.iter().flat_map(|n| self.node(n, in_head)).collect()
  }

  fn element(&self, key: &str, default: &str, node: &Node, in_head: bool) -> Tag {
    Tag::new(self.node_name(key, default)).with_children(self.children(&node.children, in_head))
  }

  fn node(&self, node: &Node, in_head: bool) -> Vec<RenderNode> {
    let tag = match &node.kind {
      NodeKind::Document | NodeKind::Fragment => return self.children(&node.children, in_head),
      NodeKind::Text(text) => return vec![RenderNode::Text(text.clone())],
      NodeKind::Softbreak => return vec![RenderNode::Text("\n".to_string())],
      NodeKind::Html(html) => return vec![RenderNode::Raw(html.clone())],
      NodeKind::Interpolation(expr) => {
        let text = display(&self.eval(expr));
        return if text.is_empty() { vec![] } else { vec![RenderNode::Text(text)] };
      }
      NodeKind::Tag { name, attributes } => return self.tag(name, attributes, &node.children, in_head),

      NodeKind::Paragraph => self.element("paragraph", "p", node, in_head),
      NodeKind::Heading(level) => {
        let tag = self.element("heading", &format!("h{level}"), node, in_head);
        if self.overridden("heading") { tag.attr("level", Value::from(*level)) } else { tag }
      }
      NodeKind::Blockquote => self.element("blockquote", "blockquote", node, in_head),
      NodeKind::Fence { lang, content } => {
        let tag = Tag::new(self.node_name("fence", "pre")).child(RenderNode::Text(content.clone()));
        let key = if self.overridden("fence") { "language" } else { "data-language" };
        match lang {
          Some(lang) => tag.attr(key, Value::String(lang.clone())),
          None => tag,
        }
      }
      NodeKind::List { ordered, start } => {
        let tag = if *ordered {
          self.element("list", "ol", node, in_head)
        } else {
          self.element("list", "ul", node, in_head)
        };
        let tag = if self.overridden("list") { tag.attr("ordered", Value::Bool(*ordered)) } else { tag };
        match start {
          Some(n) if *ordered && *n != 1 => tag.attr("start", Value::from(*n)),
          _ => tag,
        }
      }
      NodeKind::Item => self.element("item", "li", node, in_head),
      NodeKind::Emphasis => self.element("em", "em", node, in_head),
      NodeKind::Strong => self.element("strong", "strong", node, in_head),
      NodeKind::Strike => self.element("s", "s", node, in_head),
      NodeKind::Link { href, title } => {
        let tag = self.element("link", "a", node, in_head).attr("href", Value::String(href.clone()));
        if title.is_empty() { tag } else { tag.attr("title", Value::String(title.clone())) }
      }
      NodeKind::Image { src, title } => {
        let tag = Tag::new(self.node_name("image", "img"))
          .attr("src", Value::String(src.clone()))
          .attr("alt", Value::String(node.text()));
        if title.is_empty() { tag } else { tag.attr("title", Value::String(title.clone())) }
      }
      NodeKind::Table => self.element("table", "table", node, in_head),
      NodeKind::TableHead => {
        let cells = self.children(&node.children, true);
        // The header cells come without a row of their own.
        let row = Tag::new("tr").with_children(cells);
        Tag::new(self.node_name("thead", "thead")).child(row.into())
      }
      NodeKind::TableRow => self.element("tr", "tr", node, in_head),
      NodeKind::TableCell => {
        if in_head {
          self.element("th", "th", node, in_head)
        } else {
          self.element("td", "td", node, in_head)
        }
      }
      NodeKind::Code(code) => {
        Tag::new(self.node_name("code", "code")).child(RenderNode::Text(code.clone()))
      }
      NodeKind::Hardbreak => Tag::new(self.node_name("hardbreak", "br")),
      NodeKind::Hr => Tag::new(self.node_name("hr", "hr")),
    };
    vec![tag.into()]
  }

  fn tag(
    &self,
    name: &str,
    attributes: &[(String, Expr)],
    children: &[Node],
    in_head: bool,
  ) -> Vec<RenderNode> {
    if name == "if" {
      return self.conditional(attributes, children, in_head);
    }
    if name == "else" {
      // Only meaningful as a direct child of `if`.
      return vec![];
    }

    let render = self.config.tags.get(name).and_then(|t| t.render.clone());
    let mut tag = Tag::new(render.unwrap_or_else(|| name.to_string()));
    for (key, expr) in attributes {
      tag.attributes.insert(key.clone(), self.eval(expr));
    }
    vec![tag.with_children(self.children(children, in_head)).into()]
  }

  /// `{% if cond %}a{% else other /%}b{% else /%}c{% /if %}`
  fn conditional(&self, attributes: &[(String, Expr)], children: &[Node], in_head: bool) -> Vec<RenderNode> {
    let mut branches: Vec<(Option<&Expr>, Vec<Node>)> = vec![(primary(attributes), Vec::new())];
    for child in children {
      match &child.kind {
        NodeKind::Tag { name, attributes } if name == "else" => {
          // A bare `else` always matches.
          branches.push((primary(attributes), Vec::new()));
        }
        _ => {
          if let Some((_, nodes)) = branches.last_mut() {
            nodes.push(child.clone());
          }
        }
      }
    }

    for (index, (condition, nodes)) in branches.iter().enumerate() {
      let matched = match condition {
        Some(expr) => truthy(&self.eval(expr)),
        None => index > 0,
      };
      if matched {
        return self.children(nodes, in_head);
      }
    }
    vec![]
  }

  fn eval(&self, expr: &Expr) -> Value {
    match expr {
      Expr::Value(value) => value.clone(),
      Expr::Variable(path) => lookup(self.variables, path),
      Expr::Array(items) => Value::Array(items.iter().map(|e| self.eval(e)).collect()),
      Expr::Object(entries) => {
        Value::Object(entries.iter().map(|(k, e)| (k.clone(), self.eval(e))).collect())
      }
      Expr::Call { name, args } => {
        let args: Vec<Value> = args.iter().map(|e| self.eval(e)).collect();
        if let Some(f) = self.config.functions.get(name) {
          return f(&args);
        }
        builtin(name, &args).unwrap_or_else(|| {
          tracing::warn!(function = %name, "unknown markdoc function");
          Value::Null
        })
      }
    }
  }
}

fn primary(attributes: &[(String, Expr)]) -> Option<&Expr> {
  attributes.iter().find(|(k, _)| k == "primary").map(|(_, e)| e)
}

fn lookup(variables: &Map<String, Value>, path: &[String]) -> Value {
  let Some((first, rest)) = path.split_first() else { return Value::Null };
  let mut current = match variables.get(first) {
    Some(value) => value,
    None => return Value::Null,
  };
  for segment in rest {
    let next = match current {
      Value::Object(map) => map.get(segment),
      Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
      _ => None,
    };
    match next {
      Some(value) => current = value,
      None => return Value::Null,
    }
  }
  current.clone()
}

fn builtin(name: &str, args: &[Value]) -> Option<Value> {
  let value = match name {
    "equals" => Value::Bool(args.windows(2).all(|w| w[0] == w[1])),
    "and" => Value::Bool(args.iter().all(truthy)),
    "or" => Value::Bool(args.iter().any(truthy)),
    "not" => Value::Bool(!args.first().is_some_and(truthy)),
    "default" => match args {
      [Value::Null, fallback, ..] => fallback.clone(),
      [value, ..] => value.clone(),
      [] => Value::Null,
    },
    _ => return None,
  };
  Some(value)
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::parser::parse;

  fn run(source: &str, config: &MarkdocConfig, frontmatter: Value) -> Tag {
    let Value::Object(frontmatter) = frontmatter else { panic!("frontmatter must be an object") };
    match transform(&parse(source), config, &frontmatter) {
      RenderNode::Tag(tag) => tag,
      other => panic!("expected root tag, got {other:?}"),
    }
  }

  fn names(tag: &Tag) -> Vec<&str> {
    tag.children.iter().filter_map(|c| c.as_tag()).filter_map(Tag::name).collect()
  }

  #[test]
  fn default_elements() {
    let root = run("# Hi\n\n- a\n- b\n\n```rust\nfn x() {}\n```\n", &MarkdocConfig::default(), json!({}));
    assert_eq!(root.name(), Some("article"));
    assert_eq!(names(&root), vec!["h1", "ul", "pre"]);
    let pre = root.children[2].as_tag().unwrap();
    assert_eq!(pre.attributes["data-language"], json!("rust"));
    assert_eq!(pre.text(), "fn x() {}\n");
  }

  #[test]
  fn node_overrides() {
    let config = MarkdocConfig::default().node("heading", "Heading").node("fence", "Fence");
    let root = run("## Two\n\n```js\n1\n```\n", &config, json!({}));
    let heading = root.children[0].as_tag().unwrap();
    assert_eq!(heading.name(), Some("Heading"));
    assert_eq!(heading.attributes["level"], json!(2));
    let fence = root.children[1].as_tag().unwrap();
    assert_eq!(fence.name(), Some("Fence"));
    assert_eq!(fence.attributes["language"], json!("js"));
  }

  #[test]
  fn variables_and_functions() {
    let config = MarkdocConfig::default()
      .variable("site", json!({"name": "Vessel"}))
      .function("shout", |args| json!(display(&args[0]).to_uppercase()));
    let root = run(
      "{% $site.name %} / {% $frontmatter.title %} / {% shout($site.name) %} / {% default($missing, \"none\") %}\n",
      &config,
      json!({"title": "Intro"}),
    );
    assert_eq!(root.text(), "Vessel / Intro / VESSEL / none");
  }

  #[test]
  fn if_else() {
    let source = "{% if equals($frontmatter.kind, \"guide\") %}\nGuide\n{% else $frontmatter.draft /%}\nDraft\n{% else /%}\nOther\n{% /if %}\n";
    let text = |fm| run(source, &MarkdocConfig::default(), fm).text();
    assert_eq!(text(json!({"kind": "guide"})), "Guide");
    assert_eq!(text(json!({"draft": true})), "Draft");
    assert_eq!(text(json!({})), "Other");
  }

  #[test]
  fn custom_tags() {
    let config = MarkdocConfig::default().tag("callout", "Callout");
    let root = run("{% callout type=\"warning\" %}\nCareful\n{% /callout %}\n\n{% widget #w1 /%}\n", &config, json!({}));
    let callout = root.children[0].as_tag().unwrap();
    assert_eq!(callout.name(), Some("Callout"));
    assert_eq!(callout.attributes["type"], json!("warning"));
    assert_eq!(callout.text(), "Careful");
    let widget = root.children[1].as_tag().unwrap();
    assert_eq!(widget.name(), Some("widget"));
    assert_eq!(widget.attributes["id"], json!("w1"));
  }

  #[test]
  fn tables_and_images() {
    let root = run("| A | B |\n|---|---|\n| 1 | 2 |\n\n![Alt text](/a.png)\n", &MarkdocConfig::default(), json!({}));
    let table = root.children[0].as_tag().unwrap();
    assert_eq!(names(table), vec!["thead", "tr"]);
    let head_row = table.children[0].as_tag().unwrap().children[0].as_tag().unwrap();
    assert_eq!(names(head_row), vec!["th", "th"]);
    let img = root.children[1].as_tag().unwrap().children[0].as_tag().unwrap();
    assert_eq!(img.attributes["alt"], json!("Alt text"));
    assert!(img.children.is_empty());
  }
}
