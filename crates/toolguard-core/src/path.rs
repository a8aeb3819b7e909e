//! Path parsing and cursor resolution for the deterministic constraint
//! engine.
//!
//! A path is split into segments on `.` and bracket groups. `[*]` is the
//! wildcard segment, `[n]` an index segment. Resolution walks a working
//! list of cursors one segment at a time so that a wildcard can fan out
//! into many cursors mid-walk.

use crate::value::Value;

/// Depth bound: paths deeper than this resolve to a single
/// not-found cursor rather than being walked.
pub const MAX_PATH_DEPTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index(usize),
    Wildcard,
}

/// Why a cursor failed to resolve, distinguished so the
/// constraint engine can choose the right error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    /// The field/index does not exist on its parent.
    Missing,
    /// `[*]` was applied to a non-array value.
    WildcardOnNonArray,
    /// `[n]` indexed past the end of an array.
    ArrayBounds,
}

/// One point reached while walking a path.
///
/// `found == true` always means the property exists, even when `value` is
/// [`Value::Null`]; existence and value-presence are distinct.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub value: Value,
    pub resolved_path: String,
    pub found: bool,
    pub not_found_reason: Option<NotFoundReason>,
}

impl Cursor {
    fn root(value: Value) -> Self {
        Self {
            value,
            resolved_path: String::new(),
            found: true,
            not_found_reason: None,
        }
    }

    fn not_found(resolved_path: String, reason: NotFoundReason) -> Self {
        Self {
            value: Value::Null,
            resolved_path,
            found: false,
            not_found_reason: Some(reason),
        }
    }
}

fn join_field(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

fn join_index(prefix: &str, idx: usize) -> String {
    format!("{prefix}[{idx}]")
}

fn join_wildcard(prefix: &str) -> String {
    format!("{prefix}[*]")
}

/// Parse a dotted/bracketed path string into segments.
///
/// Edge case: if a `[` is never closed by a `]`
/// within the current dot-separated part, the remainder (including the
/// unmatched `[`) is kept as a literal final field segment.
pub fn parse_path(path: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    for part in path.split('.') {
        parse_part(part, &mut out);
    }
    out
}

fn parse_part(part: &str, out: &mut Vec<Segment>) {
    let mut field_start = 0usize;
    let mut i = 0usize;
    let bytes = part.as_bytes();
    while i < part.len() {
        if bytes[i] == b'[' {
            if let Some(rel_close) = part[i + 1..].find(']') {
                let field_name = &part[field_start..i];
                if !field_name.is_empty() {
                    out.push(Segment::Field(field_name.to_string()));
                }
                let inner = &part[i + 1..i + 1 + rel_close];
                if inner == "*" {
                    out.push(Segment::Wildcard);
                } else if let Ok(idx) = inner.parse::<usize>() {
                    out.push(Segment::Index(idx));
                } else {
                    // Malformed bracket contents: treat the rest of this
                    // dot-part as one literal field segment.
                    out.push(Segment::Field(part[field_start..].to_string()));
                    return;
                }
                i = i + 1 + rel_close + 1;
                field_start = i;
            } else {
                // Unclosed bracket: remainder is a literal field segment.
                out.push(Segment::Field(part[field_start..].to_string()));
                return;
            }
        } else {
            i += 1;
        }
    }
    if field_start < part.len() {
        out.push(Segment::Field(part[field_start..].to_string()));
    }
}

pub fn has_wildcard(segments: &[Segment]) -> bool {
    segments.iter().any(|s| matches!(s, Segment::Wildcard))
}

/// Walk `segments` against `root`, returning the resolved cursor list.
///
/// Paths deeper than [`MAX_PATH_DEPTH`] collapse to a single not-found
/// cursor without being walked.
pub fn resolve(root: &Value, segments: &[Segment]) -> Vec<Cursor> {
    if segments.len() > MAX_PATH_DEPTH {
        return vec![Cursor::not_found(String::new(), NotFoundReason::Missing)];
    }

    let mut cursors = vec![Cursor::root(root.clone())];
    for segment in segments {
        let mut next = Vec::with_capacity(cursors.len());
        for cursor in cursors {
            match segment {
                Segment::Field(name) => {
                    if !cursor.found {
                        let reason = cursor.not_found_reason.unwrap_or(NotFoundReason::Missing);
                        next.push(Cursor::not_found(
                            join_field(&cursor.resolved_path, name),
                            reason,
                        ));
                        continue;
                    }
                    match &cursor.value {
                        Value::Object(map) => match map.get(name) {
                            Some(v) => next.push(Cursor {
                                value: v.clone(),
                                resolved_path: join_field(&cursor.resolved_path, name),
                                found: true,
                                not_found_reason: None,
                            }),
                            None => next.push(Cursor::not_found(
                                join_field(&cursor.resolved_path, name),
                                NotFoundReason::Missing,
                            )),
                        },
                        _ => next.push(Cursor::not_found(
                            join_field(&cursor.resolved_path, name),
                            NotFoundReason::Missing,
                        )),
                    }
                }
                Segment::Index(idx) => {
                    if !cursor.found {
                        let reason = cursor.not_found_reason.unwrap_or(NotFoundReason::Missing);
                        next.push(Cursor::not_found(
                            join_index(&cursor.resolved_path, *idx),
                            reason,
                        ));
                        continue;
                    }
                    match &cursor.value {
                        Value::Array(arr) => match arr.get(*idx) {
                            Some(v) => next.push(Cursor {
                                value: v.clone(),
                                resolved_path: join_index(&cursor.resolved_path, *idx),
                                found: true,
                                not_found_reason: None,
                            }),
                            None => next.push(Cursor::not_found(
                                join_index(&cursor.resolved_path, *idx),
                                NotFoundReason::ArrayBounds,
                            )),
                        },
                        _ => next.push(Cursor::not_found(
                            join_index(&cursor.resolved_path, *idx),
                            NotFoundReason::Missing,
                        )),
                    }
                }
                Segment::Wildcard => {
                    if !cursor.found {
                        let reason = cursor.not_found_reason.unwrap_or(NotFoundReason::Missing);
                        next.push(Cursor::not_found(
                            join_wildcard(&cursor.resolved_path),
                            reason,
                        ));
                        continue;
                    }
                    match &cursor.value {
                        Value::Array(arr) => {
                            // Empty array: zero cursors (vacuous for for-all).
                            for (i, v) in arr.iter().enumerate() {
                                next.push(Cursor {
                                    value: v.clone(),
                                    resolved_path: join_index(&cursor.resolved_path, i),
                                    found: true,
                                    not_found_reason: None,
                                });
                            }
                        }
                        _ => next.push(Cursor::not_found(
                            join_wildcard(&cursor.resolved_path),
                            NotFoundReason::WildcardOnNonArray,
                        )),
                    }
                }
            }
        }
        cursors = next;
    }
    cursors
}
