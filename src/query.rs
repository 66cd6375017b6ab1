//! Minimal path query engine over normalized responses.
//!
//! Paths start at the root marker `$` and chain dotted field names and
//! bracketed numeric indices: `$.a.b[1].c`. Absence is a normal, queryable
//! outcome — a missing field, an out-of-range index, or a dereference of a
//! non-container all yield `None` rather than an error.

use std::fmt;

use serde_json::Value as JsonValue;

/// One step of a parsed path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PathSegment {
    /// Object field access.
    Field(String),
    /// Array index access.
    Index(usize),
}

/// Malformed path syntax. Distinct from a path that merely fails to resolve.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathError {
    /// The offending path.
    pub path: String,
    /// What made it unparseable.
    pub reason: String,
}

impl PathError {
    fn new(path: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid path '{}': {}", self.path, self.reason)
    }
}

impl std::error::Error for PathError {}

/// Parses a `$`-rooted path into segments.
pub fn parse_path(path: &str) -> Result<Vec<PathSegment>, PathError> {
    let rest = path
        .strip_prefix('$')
        .ok_or_else(|| PathError::new(path, "must start with '$'"))?;

    let mut segments = Vec::new();
    let mut chars = rest.char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        match c {
            '.' => {
                let field: String = {
                    let mut field = String::new();
                    while let Some((_, next)) = chars.peek() {
                        if *next == '.' || *next == '[' {
                            break;
                        }
                        field.push(*next);
                        chars.next();
                    }
                    field
                };
                if field.is_empty() {
                    return Err(PathError::new(path, format!("empty field at offset {offset}")));
                }
                segments.push(PathSegment::Field(field));
            }
            '[' => {
                let mut digits = String::new();
                let mut closed = false;
                for (_, next) in chars.by_ref() {
                    if next == ']' {
                        closed = true;
                        break;
                    }
                    digits.push(next);
                }
                if !closed {
                    return Err(PathError::new(path, "unterminated '['"));
                }
                let index: usize = digits
                    .parse()
                    .map_err(|_| PathError::new(path, format!("non-numeric index '{digits}'")))?;
                segments.push(PathSegment::Index(index));
            }
            other => {
                return Err(PathError::new(
                    path,
                    format!("unexpected character '{other}' at offset {offset}"),
                ));
            }
        }
    }
    Ok(segments)
}

/// Follows parsed segments through a value; `None` when any step is absent.
pub fn resolve_segments<'a>(root: &'a JsonValue, segments: &[PathSegment]) -> Option<&'a JsonValue> {
    let mut current = root;
    for segment in segments {
        current = match segment {
            PathSegment::Field(name) => current.as_object()?.get(name)?,
            PathSegment::Index(index) => current.as_array()?.get(*index)?,
        };
    }
    Some(current)
}

/// Evaluates `path` against `root`. The root path alone returns the whole
/// value; missing paths return `Ok(None)`; only malformed syntax errors.
pub fn query_path<'a>(root: &'a JsonValue, path: &str) -> Result<Option<&'a JsonValue>, PathError> {
    let segments = parse_path(path)?;
    Ok(resolve_segments(root, &segments))
}
