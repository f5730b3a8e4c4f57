/* src/server/markdoc/rust/src/frontmatter.rs */

use serde_json::{Map, Value};

/// Split a leading `---` YAML block off `source`.
/// Returns `(yaml, body)`; `yaml` is `None` when the file has no block.
pub fn split(source: &str) -> (Option<&str>, &str) {
  let source = source.strip_prefix('\u{feff}').unwrap_or(source);
  let Some(rest) = source.strip_prefix("---") else { return (None, source) };
  let Some(rest) = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")) else {
    return (None, source);
  };

  let mut offset = 0;
  for line in rest.split_inclusive('\n') {
    if line.trim_end() == "---" {
      let body = &rest[offset + line.len()..];
      return (Some(&rest[..offset]), body);
    }
    offset += line.len();
  }
  (None, source)
}

#[derive(Debug)]
pub enum FrontmatterError {
  Yaml(serde_yaml::Error),
  NotAMapping,
}

/// Parse the YAML block into a JSON object. An empty block is `{}`.
pub fn parse(yaml: &str) -> Result<Map<String, Value>, FrontmatterError> {
  if yaml.trim().is_empty() {
    return Ok(Map::new());
  }
  let value: Value = serde_yaml::from_str(yaml).map_err(FrontmatterError::Yaml)?;
  match value {
    Value::Null => Ok(Map::new()),
    Value::Object(map) => Ok(map),
    _ => Err(FrontmatterError::NotAMapping),
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn splits_block() {
    let (yaml, body) = split("---\ntitle: Hi\ntags: [a, b]\n---\n# Body\n");
    assert_eq!(yaml, Some("title: Hi\ntags: [a, b]\n"));
    assert_eq!(body, "# Body\n");
    let map = parse(yaml.unwrap()).unwrap();
    assert_eq!(Value::Object(map), json!({"title": "Hi", "tags": ["a", "b"]}));
  }

  #[test]
  fn no_block() {
    assert_eq!(split("# Title\n---\n"), (None, "# Title\n---\n"));
    assert_eq!(split("---\nunterminated: true\n"), (None, "---\nunterminated: true\n"));
  }

  #[test]
  fn empty_and_invalid() {
    let (yaml, body) = split("---\n---\nText");
    assert_eq!(yaml, Some(""));
    assert_eq!(body, "Text");
    assert!(parse("").unwrap().is_empty());
    assert!(matches!(parse("- a\n- b\n"), Err(FrontmatterError::NotAMapping)));
    assert!(matches!(parse("key: [unclosed"), Err(FrontmatterError::Yaml(_))));
  }
}
