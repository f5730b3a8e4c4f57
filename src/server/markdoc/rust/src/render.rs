/* src/server/markdoc/rust/src/render.rs */

use serde_json::Value;

use crate::tree::{RenderNode, Tag};

const VOID_ELEMENTS: &[&str] = &[
  "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
  "wbr",
];

pub(crate) fn escape(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      _ => out.push(c),
    }
  }
  out
}

/// Turns the walked tree into the final output string.
pub trait Renderer: Send + Sync {
  fn render(&self, node: &RenderNode) -> String;
}

/// How one attribute is written inside a start tag. Returns `None` to omit it.
pub trait AttributeFormatter: Send + Sync {
  fn format(&self, name: &str, value: &Value) -> Option<String>;
}

/// `name="value"`; `true` is a bare name, `false` and `null` are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlAttributes;

impl AttributeFormatter for HtmlAttributes {
  fn format(&self, name: &str, value: &Value) -> Option<String> {
    match value {
      Value::Null | Value::Bool(false) => None,
      Value::Bool(true) => Some(name.to_string()),
      Value::String(s) => Some(format!("{name}=\"{}\"", escape(s))),
      other => Some(format!("{name}=\"{}\"", escape(&other.to_string()))),
    }
  }
}

/// `name={json}` for component templates that bind expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundAttributes;

impl AttributeFormatter for BoundAttributes {
  fn format(&self, name: &str, value: &Value) -> Option<String> {
    Some(format!("{name}={{{value}}}"))
  }
}

/// Recursive serializer. Void elements get no closing tag.
pub struct HtmlRenderer {
  attributes: Box<dyn AttributeFormatter>,
}

impl Default for HtmlRenderer {
  fn default() -> Self {
    Self::new(HtmlAttributes)
  }
}

impl HtmlRenderer {
  pub fn new(attributes: impl AttributeFormatter + 'static) -> Self {
    Self { attributes: Box::new(attributes) }
  }

  fn node(&self, node: &RenderNode, out: &mut String) {
    match node {
      RenderNode::Text(text) => out.push_str(&escape(text)),
      RenderNode::Raw(raw) => out.push_str(raw),
      RenderNode::Tag(tag) => self.tag(tag, out),
    }
  }

  fn tag(&self, tag: &Tag, out: &mut String) {
    let Some(name) = tag.name() else {
      tag.children.iter().for_each(|c| self.node(c, out));
      return;
    };
    out.push('<');
    out.push_str(name);
    for (key, value) in &tag.attributes {
      if let Some(attr) = self.attributes.format(key, value) {
        out.push(' ');
        out.push_str(&attr);
      }
    }
    out.push('>');
    if VOID_ELEMENTS.contains(&name) {
      return;
    }
    tag.children.iter().for_each(|c| self.node(c, out));
    out.push_str("</");
    out.push_str(name);
    out.push('>');
  }
}

impl Renderer for HtmlRenderer {
  fn render(&self, node: &RenderNode) -> String {
    let mut out = String::new();
    self.node(node, &mut out);
    out
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn sample() -> RenderNode {
    Tag::new("p")
      .attr("class", json!("lead"))
      .attr("hidden", json!(false))
      .attr("open", json!(true))
      .child(RenderNode::Text("a < b".into()))
      .child(Tag::new("br").into())
      .child(Tag { name: None, children: vec![RenderNode::Raw("<i>x</i>".into())], ..Tag::default() }.into())
      .child(Tag::new("img").attr("src", json!("/a.png")).attr("width", json!(10)).into())
      .into()
  }

  #[test]
  fn html_attributes() {
    assert_eq!(
      HtmlRenderer::default().render(&sample()),
      r#"<p class="lead" open>a &lt; b<br><i>x</i><img src="/a.png" width="10"></p>"#
    );
  }

  #[test]
  fn bound_attributes() {
    let out = HtmlRenderer::new(BoundAttributes).render(&sample());
    assert!(out.starts_with(r#"<p class={"lead"} hidden={false} open={true}>"#));
    assert!(out.contains(r#"<img src={"/a.png"} width={10}>"#));
  }

  #[test]
  fn escapes_quotes() {
    assert_eq!(escape(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
  }
}
