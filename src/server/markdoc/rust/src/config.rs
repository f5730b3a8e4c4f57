/* src/server/markdoc/rust/src/config.rs */

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

pub type MarkdocFunction = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagConfig {
  /// Element (or component) name to render as. `None` keeps the tag name.
  pub render: Option<String>,
}

/// Variables, tags, node overrides and functions in effect for one file.
#[derive(Clone, Default)]
pub struct MarkdocConfig {
  pub variables: Map<String, Value>,
  pub tags: HashMap<String, TagConfig>,
  /// Node name (`heading`, `fence`, `link`, ...) to render name.
  pub nodes: HashMap<String, String>,
  pub functions: HashMap<String, MarkdocFunction>,
}

impl fmt::Debug for MarkdocConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut functions: Vec<&String> = self.functions.keys().collect();
    functions.sort();
    f.debug_struct("MarkdocConfig")
      .field("variables", &self.variables)
      .field("tags", &self.tags)
      .field("nodes", &self.nodes)
      .field("functions", &functions)
      .finish()
  }
}

impl MarkdocConfig {
  pub fn variable(mut self, name: impl Into<String>, value: Value) -> Self {
    self.variables.insert(name.into(), value);
    self
  }

  pub fn tag(mut self, name: impl Into<String>, render: impl Into<String>) -> Self {
    self.tags.insert(name.into(), TagConfig { render: Some(render.into()) });
    self
  }

  pub fn node(mut self, name: impl Into<String>, render: impl Into<String>) -> Self {
    self.nodes.insert(name.into(), render.into());
    self
  }

  pub fn function(
    mut self,
    name: impl Into<String>,
    f: impl Fn(&[Value]) -> Value + Send + Sync + 'static,
  ) -> Self {
    self.functions.insert(name.into(), Arc::new(f));
    self
  }

  /// Overlay `other` on top of `self`; `other` wins per key.
  pub fn merge(&mut self, other: &MarkdocConfig) {
    for (k, v) in &other.variables {
      self.variables.insert(k.clone(), v.clone());
    }
    for (k, v) in &other.tags {
      self.tags.insert(k.clone(), v.clone());
    }
    for (k, v) in &other.nodes {
      self.nodes.insert(k.clone(), v.clone());
    }
    for (k, v) in &other.functions {
      self.functions.insert(k.clone(), v.clone());
    }
  }
}

/// Maps a content file to the config that applies to it.
pub trait ConfigResolver: Send + Sync {
  fn resolve(&self, file: &Path) -> MarkdocConfig;
}

/// Directory-scoped configs. A file sees the merge of every registered
/// ancestor directory, the nearest directory winning.
#[derive(Debug, Clone, Default)]
pub struct DirectoryConfig {
  dirs: Vec<(PathBuf, MarkdocConfig)>,
}

impl DirectoryConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(mut self, dir: impl Into<PathBuf>, config: MarkdocConfig) -> Self {
    self.dirs.push((dir.into(), config));
    self
  }
}

impl ConfigResolver for DirectoryConfig {
  fn resolve(&self, file: &Path) -> MarkdocConfig {
    let mut matching: Vec<&(PathBuf, MarkdocConfig)> =
      self.dirs.iter().filter(|(dir, _)| file.starts_with(dir)).collect();
    matching.sort_by_key(|(dir, _)| dir.components().count());

    let mut config = MarkdocConfig::default();
    for (_, dir_config) in matching {
      config.merge(dir_config);
    }
    config
  }
}
