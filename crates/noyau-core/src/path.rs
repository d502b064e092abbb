//! Dot-path accessor for extracting a sub-value out of a JSON payload.
//!
//! Grammar: `segment ( '.' key | '[' index ']' )*`, e.g. `result.items[0].name`.
//! A numeric key applied to an array indexes it, so `items.0` and `items[0]`
//! are equivalent. Built on `winnow` 0.7.

use crate::error::CanvasError;
use serde_json::Value;
use winnow::ascii::digit1;
use winnow::combinator::{alt, delimited, preceded, repeat};
use winnow::prelude::*;
use winnow::token::take_while;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// A parsed data path. The empty path resolves to the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataPath {
    segments: Vec<PathSegment>,
}

impl DataPath {
    pub fn parse(source: &str) -> Result<Self, CanvasError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        let segments = parse_segments
            .parse(trimmed)
            .map_err(|e| CanvasError::InvalidPath {
                path: source.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Walk `value` along the path. `None` when any segment is missing.
    pub fn resolve<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        let mut current = value;
        for segment in &self.segments {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
                (PathSegment::Key(key), Value::Array(items)) => {
                    items.get(key.parse::<usize>().ok()?)?
                }
                (PathSegment::Index(i), Value::Array(items)) => items.get(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// Parse `path` and extract from `value`; a missing segment yields `Null`.
pub fn extract_path(value: &Value, path: &str) -> Result<Value, CanvasError> {
    let path = DataPath::parse(path)?;
    Ok(path.resolve(value).cloned().unwrap_or(Value::Null))
}

// ─── Parsers ─────────────────────────────────────────────────────────────

fn parse_segments(input: &mut &str) -> ModalResult<Vec<PathSegment>> {
    let first = alt((parse_key, parse_index)).parse_next(input)?;
    let rest: Vec<PathSegment> =
        repeat(0.., alt((preceded('.', parse_key), parse_index))).parse_next(input)?;
    let mut segments = Vec::with_capacity(rest.len() + 1);
    segments.push(first);
    segments.extend(rest);
    Ok(segments)
}

fn parse_key(input: &mut &str) -> ModalResult<PathSegment> {
    take_while(1.., |c: char| c != '.' && c != '[' && c != ']')
        .map(|s: &str| PathSegment::Key(s.to_string()))
        .parse_next(input)
}

fn parse_index(input: &mut &str) -> ModalResult<PathSegment> {
    delimited('[', digit1.try_map(str::parse::<usize>), ']')
        .map(PathSegment::Index)
        .parse_next(input)
}
