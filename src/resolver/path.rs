//! Variable paths - `@output.items[0]["display name"]`

use super::RenderError;
use crate::core::context::ExecutionContext;
use serde_json::Value;
use std::fmt;

/// One step into a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A parsed variable path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarPath {
    head: String,
    segments: Vec<Segment>,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '-'
}

impl VarPath {
    /// Parse a path. `?.` is accepted as a plain `.`.
    pub fn parse(path: &str) -> Result<Self, RenderError> {
        let malformed = |reason: &str| RenderError::MalformedPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = path.trim();
        let chars: Vec<char> = trimmed.chars().collect();
        let mut pos = 0;

        let mut head = String::new();
        if chars.first() == Some(&'@') {
            head.push('@');
            pos += 1;
        }
        while pos < chars.len() && is_ident_char(chars[pos]) {
            head.push(chars[pos]);
            pos += 1;
        }
        if head.is_empty() || head == "@" {
            return Err(malformed("expected a variable name"));
        }

        let mut segments = Vec::new();
        while pos < chars.len() {
            match chars[pos] {
                '?' if chars.get(pos + 1) == Some(&'.') => {
                    pos += 2;
                    // `?.[0]` is optional chaining into an index
                    if chars.get(pos) == Some(&'[') {
                        continue;
                    }
                    let start = pos;
                    while pos < chars.len() && is_ident_char(chars[pos]) {
                        pos += 1;
                    }
                    if start == pos {
                        return Err(malformed("expected a property name after '?.'"));
                    }
                    segments.push(Segment::Key(chars[start..pos].iter().collect()));
                }
                '.' => {
                    pos += 1;
                    let start = pos;
                    while pos < chars.len() && is_ident_char(chars[pos]) {
                        pos += 1;
                    }
                    if start == pos {
                        return Err(malformed("expected a property name after '.'"));
                    }
                    segments.push(Segment::Key(chars[start..pos].iter().collect()));
                }
                '[' => {
                    pos += 1;
                    match chars.get(pos) {
                        Some(&quote) if quote == '"' || quote == '\'' => {
                            pos += 1;
                            let start = pos;
                            while pos < chars.len() && chars[pos] != quote {
                                pos += 1;
                            }
                            if pos >= chars.len() {
                                return Err(malformed("unterminated string in brackets"));
                            }
                            let key: String = chars[start..pos].iter().collect();
                            pos += 1;
                            if chars.get(pos) != Some(&']') {
                                return Err(malformed("expected ']'"));
                            }
                            pos += 1;
                            segments.push(Segment::Key(key));
                        }
                        _ => {
                            let start = pos;
                            while pos < chars.len() && chars[pos].is_ascii_digit() {
                                pos += 1;
                            }
                            if start == pos {
                                return Err(malformed("expected an index or quoted key in brackets"));
                            }
                            if chars.get(pos) != Some(&']') {
                                return Err(malformed("expected ']'"));
                            }
                            let digits: String = chars[start..pos].iter().collect();
                            let index = digits
                                .parse::<usize>()
                                .map_err(|_| malformed("index out of range"))?;
                            pos += 1;
                            segments.push(Segment::Index(index));
                        }
                    }
                }
                other => {
                    return Err(malformed(&format!("unexpected character '{}'", other)));
                }
            }
        }

        Ok(Self { head, segments })
    }

    pub fn head(&self) -> &str {
        &self.head
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Look the path up in a context. Missing values yield `None`.
    ///
    /// A bare head (`input`) falls back to its `@`-prefixed binding.
    pub fn lookup(&self, ctx: &ExecutionContext) -> Option<Value> {
        let root = match ctx.get(&self.head) {
            Some(value) => value,
            None if !self.head.starts_with('@') => ctx.get(&format!("@{}", self.head))?,
            None => return None,
        };
        self.get_in(root).cloned()
    }

    fn get_in<'v>(&self, root: &'v Value) -> Option<&'v Value> {
        self.segments
            .iter()
            .try_fold(root, |current, segment| match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get(key),
                (Segment::Key(key), Value::Array(items)) => {
                    key.parse::<usize>().ok().and_then(|i| items.get(i))
                }
                (Segment::Index(index), Value::Array(items)) => items.get(*index),
                (Segment::Index(index), Value::Object(map)) => map.get(&index.to_string()),
                _ => None,
            })
    }
}

impl fmt::Display for VarPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.head)?;
        for segment in &self.segments {
            match segment {
                Segment::Key(key) if key.chars().all(is_ident_char) && !key.is_empty() => {
                    write!(f, ".{}", key)?
                }
                Segment::Key(key) => write!(f, "[{:?}]", key)?,
                Segment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}
