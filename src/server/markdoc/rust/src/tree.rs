/* src/server/markdoc/rust/src/tree.rs */

use std::collections::BTreeMap;

use serde_json::Value;

/// The renderable tree produced by the transform step.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderNode {
  /// Escaped on output.
  Text(String),
  /// Emitted verbatim.
  Raw(String),
  Tag(Tag),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tag {
  /// `None` renders only the children.
  pub name: Option<String>,
  pub attributes: BTreeMap<String, Value>,
  pub children: Vec<RenderNode>,
}

impl Tag {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: Some(name.into()), ..Self::default() }
  }

  pub fn attr(mut self, key: impl Into<String>, value: Value) -> Self {
    self.attributes.insert(key.into(), value);
    self
  }

  pub fn child(mut self, child: RenderNode) -> Self {
    self.children.push(child);
    self
  }

  pub fn with_children(mut self, children: Vec<RenderNode>) -> Self {
    self.children = children;
    self
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub fn text(&self) -> String {
    let mut out = String::new();
    for child in &self.children {
      child.collect_text(&mut out);
    }
    out
  }
}

impl RenderNode {
  pub fn as_tag(&self) -> Option<&Tag> {
    match self {
      RenderNode::Tag(tag) => Some(tag),
      _ => None,
    }
  }

  fn collect_text(&self, out: &mut String) {
    match self {
      RenderNode::Text(text) => out.push_str(text),
      RenderNode::Raw(_) => {}
      RenderNode::Tag(tag) => tag.children.iter().for_each(|c| c.collect_text(out)),
    }
  }
}

impl From<Tag> for RenderNode {
  fn from(tag: Tag) -> Self {
    RenderNode::Tag(tag)
  }
}
