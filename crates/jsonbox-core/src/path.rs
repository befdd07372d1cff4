//! Path expressions over JSON documents.
//!
//! A path is a left-to-right chain of selectors:
//! - `.name` / `['name']` : object field
//! - `[3]` / `[-1]`       : array index (negative counts from the end)
//! - `[*]` / `.*`         : every element of an array (or value of an object)
//!
//! Accepted spellings: `{.items[*].v}`, `$.items[*].v`, `.items[*].v`,
//! `items[*].v`. An empty path (or `$`, `@`, `{}`) selects the node itself.
//!
//! Evaluation never fails: a missing field, an out-of-range index, or a
//! selector applied to the wrong JSON type simply contributes no nodes.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{ProbeError, Result};

/// One selector step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index(i64),
    Wildcard,
}

impl Segment {
    fn select<'a>(&self, node: &'a Value, out: &mut Vec<&'a Value>) {
        match (self, node) {
            (Segment::Field(name), Value::Object(map)) => {
                if let Some(v) = map.get(name) {
                    out.push(v);
                }
            }
            (Segment::Index(i), Value::Array(items)) => {
                let len = items.len() as i64;
                let idx = if *i < 0 { len + *i } else { *i };
                if (0..len).contains(&idx) {
                    if let Some(v) = items.get(idx as usize) {
                        out.push(v);
                    }
                }
            }
            (Segment::Wildcard, Value::Array(items)) => out.extend(items.iter()),
            (Segment::Wildcard, Value::Object(map)) => out.extend(map.values()),
            _ => {}
        }
    }
}

/// Compiled path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    source: String,
    segments: Vec<Segment>,
}

impl Path {
    /// Parse a path expression.
    pub fn parse(src: &str) -> Result<Self> {
        let segments = parse_segments(src)
            .map_err(|reason| ProbeError::Config(format!("invalid path {src:?}: {reason}")))?;
        Ok(Self { source: src.to_string(), segments })
    }

    /// The expression as written in config.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Evaluate against `root`, returning matched nodes in document order.
    pub fn evaluate<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![root];
        for seg in &self.segments {
            let mut next = Vec::with_capacity(current.len());
            for node in current {
                seg.select(node, &mut next);
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }

    /// First matched node, if any.
    pub fn first<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.evaluate(root).into_iter().next()
    }
}

impl FromStr for Path {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_segments(src: &str) -> std::result::Result<Vec<Segment>, String> {
    let mut s = src.trim();
    if let Some(inner) = s.strip_prefix('{') {
        s = inner
            .strip_suffix('}')
            .ok_or_else(|| "unterminated '{'".to_string())?
            .trim();
    }
    // `$`/`@` mark the root only when a selector (or nothing) follows;
    // otherwise they start a field name such as `@timestamp`.
    if let Some(rest) = s.strip_prefix('$').or_else(|| s.strip_prefix('@')) {
        if rest.is_empty() || rest.starts_with(['.', '[']) {
            s = rest;
        }
    }

    let chars: Vec<char> = s.chars().collect();
    let mut segments = Vec::new();
    let mut i = 0;

    // A bare leading identifier (`items[*]`) is a field selector.
    if let Some(c) = chars.first() {
        if *c != '.' && *c != '[' {
            let (name, next) = read_ident(&chars, 0);
            segments.push(Segment::Field(name));
            i = next;
        }
    }

    while i < chars.len() {
        match chars[i] {
            '.' => {
                i += 1;
                match chars.get(i) {
                    // Trailing dot, `$.` alone, or `.[0]`.
                    None if segments.is_empty() => {}
                    None => return Err("trailing '.'".into()),
                    Some('[') => {}
                    Some('*') => {
                        segments.push(Segment::Wildcard);
                        i += 1;
                    }
                    Some('.') => return Err(format!("empty field name at offset {i}")),
                    Some(_) => {
                        let (name, next) = read_ident(&chars, i);
                        segments.push(Segment::Field(name));
                        i = next;
                    }
                }
            }
            '[' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|c| *c == ']')
                    .map(|p| p + i + 1)
                    .ok_or_else(|| format!("unterminated '[' at offset {i}"))?;
                let inner: String = chars[i + 1..close].iter().collect();
                segments.push(parse_bracket(inner.trim())?);
                i = close + 1;
            }
            c => return Err(format!("unexpected {c:?} at offset {i}")),
        }
    }

    Ok(segments)
}

fn read_ident(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && !matches!(chars[end], '.' | '[' | ']') {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

fn parse_bracket(inner: &str) -> std::result::Result<Segment, String> {
    if inner == "*" {
        return Ok(Segment::Wildcard);
    }
    for quote in ['\'', '"'] {
        if let Some(name) = inner.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
            return Ok(Segment::Field(name.to_string()));
        }
    }
    inner
        .parse::<i64>()
        .map(Segment::Index)
        .map_err(|_| format!("invalid selector [{inner}]"))
}
