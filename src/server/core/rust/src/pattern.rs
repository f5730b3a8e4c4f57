/* src/server/core/rust/src/pattern.rs */

use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;

/// Path parameters in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
  pub fn get(&self, name: &str) -> Option<&str> {
    self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn to_json(&self) -> serde_json::Value {
    let map = self.0.iter().map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone()))).collect();
    serde_json::Value::Object(map)
  }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PatternError {
  #[error("invalid parameter name '{name}' in '{pathname}'")]
  InvalidParam { pathname: String, name: String },
  #[error("rest parameter '{name}' must be the last segment of '{pathname}'")]
  RestNotLast { pathname: String, name: String },
  #[error("pattern '{pathname}' failed to compile: {reason}")]
  Regex { pathname: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
  Static(String),
  Param(String),
  Optional(String),
  Rest(String),
}

impl Segment {
  fn weight(&self) -> u8 {
    match self {
      Self::Static(_) => 4,
      Self::Param(_) => 3,
      Self::Optional(_) => 1,
      Self::Rest(_) => 0,
    }
  }
}

/// Weight of a pattern that has run out of segments. Optional and rest
/// segments also match the shorter path, so they rank below its end.
const END_OF_PATH: u8 = 2;

fn valid_name(name: &str) -> bool {
  let mut chars = name.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_segments(pathname: &str) -> Result<Vec<Segment>, PatternError> {
  let raw: Vec<&str> = pathname.split('/').filter(|s| !s.is_empty()).collect();
  let mut segments = Vec::with_capacity(raw.len());
  for (i, part) in raw.iter().enumerate() {
    let Some(token) = part.strip_prefix(':') else {
      segments.push(Segment::Static((*part).to_string()));
      continue;
    };
    let (name, segment) = if let Some(name) = token.strip_suffix('*') {
      if i + 1 != raw.len() {
        return Err(PatternError::RestNotLast {
          pathname: pathname.to_string(),
          name: name.to_string(),
        });
      }
      (name, Segment::Rest(name.to_string()))
    } else if let Some(name) = token.strip_suffix('?') {
      (name, Segment::Optional(name.to_string()))
    } else {
      (token, Segment::Param(token.to_string()))
    };
    if !valid_name(name) {
      return Err(PatternError::InvalidParam {
        pathname: pathname.to_string(),
        name: name.to_string(),
      });
    }
    segments.push(segment);
  }
  Ok(segments)
}

/// A compiled route pathname such as `/blog/:slug` or `/docs/:path*`.
#[derive(Debug, Clone)]
pub struct RoutePattern {
  pathname: String,
  segments: Vec<Segment>,
  regex: Regex,
}

impl RoutePattern {
  pub fn compile(pathname: &str) -> Result<Self, PatternError> {
    let segments = parse_segments(pathname)?;
    let mut source = String::from("^");
    for segment in &segments {
      match segment {
        Segment::Static(text) => {
          source.push('/');
          source.push_str(&regex::escape(text));
        }
        Segment::Param(_) => source.push_str("/([^/]+)"),
        Segment::Optional(_) => source.push_str("(?:/([^/]+))?"),
        Segment::Rest(_) => source.push_str("(?:/(.+?))?"),
      }
    }
    source.push_str("/?$");
    let regex = Regex::new(&source).map_err(|e| PatternError::Regex {
      pathname: pathname.to_string(),
      reason: e.to_string(),
    })?;
    Ok(Self { pathname: pathname.to_string(), segments, regex })
  }

  pub fn pathname(&self) -> &str {
    &self.pathname
  }

  /// Match a URL path, extracting percent-decoded params in declaration order.
  pub fn exec(&self, path: &str) -> Option<Params> {
    let caps = self.regex.captures(path)?;
    let names = self.segments.iter().filter_map(|s| match s {
      Segment::Static(_) => None,
      Segment::Param(n) | Segment::Optional(n) | Segment::Rest(n) => Some(n),
    });
    let mut params = Vec::new();
    for (i, name) in names.enumerate() {
      if let Some(m) = caps.get(i + 1) {
        let value = urlencoding::decode(m.as_str())
          .map(|v| v.into_owned())
          .unwrap_or_else(|_| m.as_str().to_string());
        params.push((name.clone(), value));
      }
    }
    Some(Params(params))
  }

  /// Specificity order: static > param > end of path > optional > rest,
  /// segment by segment. `Less` means `self` should be tried first.
  pub fn rank(&self, other: &Self) -> Ordering {
    let weight = |segments: &[Segment], i: usize| segments.get(i).map_or(END_OF_PATH, Segment::weight);
    let len = self.segments.len().max(other.segments.len());
    (0..len)
      .map(|i| weight(other.segments.as_slice(), i).cmp(&weight(self.segments.as_slice(), i)))
      .find(|o| o.is_ne())
      .unwrap_or(Ordering::Equal)
  }
}

/// A route's pathname with its lazily compiled pattern.
///
/// Production builds the pattern once per route for the life of the process.
/// Dev mode recompiles on each call so edited routes take effect immediately.
#[derive(Debug)]
pub struct RouteMatcher {
  pathname: String,
  compiled: OnceLock<Option<RoutePattern>>,
}

impl RouteMatcher {
  pub fn new(pathname: impl Into<String>) -> Self {
    Self { pathname: pathname.into(), compiled: OnceLock::new() }
  }

  pub fn pathname(&self) -> &str {
    &self.pathname
  }

  fn compile(&self) -> Option<RoutePattern> {
    RoutePattern::compile(&self.pathname)
      .map_err(|e| tracing::error!(error = %e, "route pattern rejected"))
      .ok()
  }

  pub(crate) fn pattern(&self) -> Option<&RoutePattern> {
    self.compiled.get_or_init(|| self.compile()).as_ref()
  }

  pub fn exec(&self, path: &str, dev: bool) -> Option<Params> {
    if dev {
      return self.compile()?.exec(path);
    }
    self.pattern()?.exec(path)
  }

  pub fn is_compiled(&self) -> bool {
    self.compiled.get().is_some()
  }
}
