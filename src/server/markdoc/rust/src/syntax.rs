/* src/server/markdoc/rust/src/syntax.rs */

//! The inside of a `{% … %}` tag.

use serde_json::{Number, Value};

use crate::ast::Expr;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TagToken {
  Open { name: String, attributes: Vec<(String, Expr)>, self_closing: bool },
  Close { name: String },
  Interpolation(Expr),
}

pub(crate) fn parse_tag(inner: &str) -> Result<TagToken, String> {
  let trimmed = inner.trim();
  let (body, self_closing) = match trimmed.strip_suffix('/') {
    Some(body) => (body.trim_end(), true),
    None => (trimmed, false),
  };

  if let Some(name) = body.strip_prefix('/') {
    let name = name.trim();
    let mut cur = Cursor::new(name);
    return match cur.ident() {
      Some(ident) if cur.done() => Ok(TagToken::Close { name: ident }),
      _ => Err(format!("invalid closing tag '{name}'")),
    };
  }

  let mut cur = Cursor::new(body);
  if body.starts_with('$') {
    return interpolation(&mut cur);
  }
  let name = cur.ident().ok_or_else(|| format!("expected a tag name in '{body}'"))?;
  if cur.peek() == Some('(') {
    return interpolation(&mut Cursor::new(body));
  }

  let mut attributes = Vec::new();
  let mut classes = Vec::new();
  let mut has_primary = false;
  loop {
    cur.skip_ws();
    let Some(c) = cur.peek() else { break };
    match c {
      '#' => {
        cur.bump();
        let id = cur.word().ok_or("expected an id after '#'")?;
        attributes.push(("id".to_string(), Expr::Value(Value::String(id))));
      }
      '.' => {
        cur.bump();
        classes.push(cur.word().ok_or("expected a class after '.'")?);
      }
      _ => {
        let start = cur.pos;
        if let Some(key) = cur.ident() {
          if cur.eat('=') {
            attributes.push((key, cur.expr()?));
            continue;
          }
        }
        cur.pos = start;
        if has_primary || !attributes.is_empty() {
          return Err(format!("unexpected '{}' in tag '{name}'", cur.rest()));
        }
        attributes.push(("primary".to_string(), cur.expr()?));
        has_primary = true;
      }
    }
  }
  if !classes.is_empty() {
    attributes.push(("class".to_string(), Expr::Value(Value::String(classes.join(" ")))));
  }
  Ok(TagToken::Open { name, attributes, self_closing })
}

fn interpolation(cur: &mut Cursor<'_>) -> Result<TagToken, String> {
  let expr = cur.expr()?;
  cur.skip_ws();
  if !cur.done() {
    return Err(format!("unexpected '{}' after expression", cur.rest()));
  }
  Ok(TagToken::Interpolation(expr))
}

struct Cursor<'a> {
  src: &'a str,
  pos: usize,
}

impl<'a> Cursor<'a> {
  fn new(src: &'a str) -> Self {
    Self { src, pos: 0 }
  }

  fn rest(&self) -> &'a str {
    &self.src[self.pos..]
  }

  fn done(&self) -> bool {
    self.pos >= self.src.len()
  }

  fn peek(&self) -> Option<char> {
    self.rest().chars().next()
  }

  fn bump(&mut self) -> Option<char> {
    let c = self.peek()?;
    self.pos += c.len_utf8();
    Some(c)
  }

  fn eat(&mut self, c: char) -> bool {
    if self.peek() == Some(c) {
      self.pos += c.len_utf8();
      true
    } else {
      false
    }
  }

  fn skip_ws(&mut self) {
    while self.peek().is_some_and(char::is_whitespace) {
      self.bump();
    }
  }

  fn take_while(&mut self, f: impl Fn(char) -> bool) -> &'a str {
    let start = self.pos;
    while self.peek().is_some_and(&f) {
      self.bump();
    }
    &self.src[start..self.pos]
  }

  /// `[A-Za-z0-9_-]+`
  fn word(&mut self) -> Option<String> {
    let word = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    (!word.is_empty()).then(|| word.to_string())
  }

  /// A word that does not start with a digit or dash.
  fn ident(&mut self) -> Option<String> {
    if !self.peek().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') {
      return None;
    }
    self.word()
  }

  fn expr(&mut self) -> Result<Expr, String> {
    self.skip_ws();
    match self.peek() {
      Some('"' | '\'') => self.string().map(|s| Expr::Value(Value::String(s))),
      Some('$') => {
        self.bump();
        let mut path = vec![self.word().ok_or("expected a variable name after '$'")?];
        while self.eat('.') {
          path.push(self.word().ok_or("expected a path segment after '.'")?);
        }
        Ok(Expr::Variable(path))
      }
      Some('[') => {
        self.bump();
        let mut items = Vec::new();
        loop {
          self.skip_ws();
          if self.eat(']') {
            break;
          }
          items.push(self.expr()?);
          self.skip_ws();
          if !self.eat(',') && self.peek() != Some(']') {
            return Err("expected ',' or ']' in array".into());
          }
        }
        Ok(Expr::Array(items))
      }
      Some('{') => {
        self.bump();
        let mut entries = Vec::new();
        loop {
          self.skip_ws();
          if self.eat('}') {
            break;
          }
          let key = match self.peek() {
            Some('"' | '\'') => self.string()?,
            _ => self.word().ok_or("expected an object key")?,
          };
          self.skip_ws();
          if !self.eat(':') {
            return Err(format!("expected ':' after key '{key}'"));
          }
          entries.push((key, self.expr()?));
          self.skip_ws();
          if !self.eat(',') && self.peek() != Some('}') {
            return Err("expected ',' or '}' in object".into());
          }
        }
        Ok(Expr::Object(entries))
      }
      Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
      Some(_) => {
        let name = self.ident().ok_or_else(|| format!("unexpected '{}'", self.rest()))?;
        match name.as_str() {
          "true" => return Ok(Expr::Value(Value::Bool(true))),
          "false" => return Ok(Expr::Value(Value::Bool(false))),
          "null" => return Ok(Expr::Value(Value::Null)),
          _ => {}
        }
        if !self.eat('(') {
          return Err(format!("unexpected bare word '{name}'"));
        }
        let mut args = Vec::new();
        loop {
          self.skip_ws();
          if self.eat(')') {
            break;
          }
          args.push(self.expr()?);
          self.skip_ws();
          if !self.eat(',') && self.peek() != Some(')') {
            return Err(format!("expected ',' or ')' in call to '{name}'"));
          }
        }
        Ok(Expr::Call { name, args })
      }
      None => Err("expected a value".into()),
    }
  }

  fn string(&mut self) -> Result<String, String> {
    let quote = self.bump().ok_or("expected a string")?;
    let mut out = String::new();
    loop {
      match self.bump() {
        None => return Err("unterminated string".into()),
        Some(c) if c == quote => return Ok(out),
        Some('\\') => match self.bump() {
          Some('n') => out.push('\n'),
          Some('t') => out.push('\t'),
          Some(c) => out.push(c),
          None => return Err("unterminated string".into()),
        },
        Some(c) => out.push(c),
      }
    }
  }

  fn number(&mut self) -> Result<Expr, String> {
    let text = self.take_while(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'));
    let number = match text.parse::<i64>() {
      Ok(n) => Number::from(n),
      Err(_) => text
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| format!("invalid number '{text}'"))?,
    };
    Ok(Expr::Value(Value::Number(number)))
  }
}
