//! Flattened view of a nested document: dotted path -> leaf value.
//!
//! Example:
//! compiler: { gcc: { path: /usr/bin/gcc } }  =>  "compiler.gcc.path" -> "/usr/bin/gcc"
//!
//! Entries keep document order, so misses and fan-out writes are reported in
//! the order they appear in the input.

use crate::value::scalar_text;
use serde_yaml::{Mapping, Value};
use std::fmt;
use tracing::warn;

pub type FlatView = Vec<(String, Value)>;

/// Flatten `doc`, prefixing every path with `prefix` (unless it is empty).
///
/// Sequences, scalars and empty mappings are leaves.
///
/// Segments are joined with `.` and not escaped, so a key that itself
/// contains a dot (`{"a.b": 1}`) is indistinguishable from a nested one and
/// comes back nested after `unflatten`. Such keys are logged.
pub fn flatten(doc: &Value, prefix: &str) -> FlatView {
    let mut out = FlatView::new();
    flatten_into(doc, prefix, &mut out);
    out
}

fn flatten_into(node: &Value, prefix: &str, out: &mut FlatView) {
    match node {
        Value::Mapping(map) if !map.is_empty() || prefix.is_empty() => {
            for (k, child) in map {
                let seg = key_text(k);
                if seg.contains('.') {
                    warn!(key = %seg, parent = prefix, "dotted key will be split into segments");
                }
                let path = if prefix.is_empty() {
                    seg
                } else {
                    format!("{}.{}", prefix, seg)
                };
                flatten_into(child, &path, out);
            }
        }
        leaf => out.push((prefix.to_string(), leaf.clone())),
    }
}

fn key_text(k: &Value) -> String {
    match scalar_text(k) {
        Some(s) => s,
        None => serde_yaml::to_string(k)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionKind {
    /// The same leaf path was written twice.
    Overwritten,
    /// A leaf was replaced by an intermediate mapping.
    LeafReplaced,
    /// A whole subtree was replaced by a leaf.
    SubtreeReplaced,
}

/// A write that clobbered something already present in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub path: String,
    pub kind: CollisionKind,
}

impl fmt::Display for Collision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            CollisionKind::Overwritten => "value overwritten",
            CollisionKind::LeafReplaced => "leaf replaced by a mapping",
            CollisionKind::SubtreeReplaced => "mapping replaced by a leaf",
        };
        write!(f, "{}: {}", self.path, what)
    }
}

/// Rebuild a nested document from a flattened view.
pub fn unflatten(flat: &[(String, Value)]) -> (Value, Vec<Collision>) {
    let mut root = Value::Mapping(Mapping::new());
    let mut collisions = Vec::new();
    for (path, value) in flat {
        if let Some(c) = set_with(&mut root, path, value.clone(), false) {
            collisions.push(c);
        }
    }
    (root, collisions)
}

/// Assign `value` at dotted `path`, creating intermediate mappings.
///
/// With `append`, the value is pushed onto a sequence at `path` instead
/// (sequence values are spliced in item by item); an existing scalar there
/// becomes the first item.
///
/// Returns the first collision caused by this write, if any. The write is
/// performed regardless (last write wins).
pub fn set_with(root: &mut Value, path: &str, value: Value, append: bool) -> Option<Collision> {
    let segments: Vec<&str> = path.split('.').collect();
    let (last, parents) = segments.split_last()?;

    let mut collision = None;
    let mut node = root;
    for (depth, seg) in parents.iter().enumerate() {
        if !node.is_mapping() && !node.is_null() {
            collision.get_or_insert(Collision {
                path: segments[..depth].join("."),
                kind: CollisionKind::LeafReplaced,
            });
            *node = Value::Null;
        }
        // Null turns into an empty mapping, missing keys are inserted as null.
        node = &mut node[*seg];
    }

    if !node.is_mapping() {
        if !node.is_null() {
            collision.get_or_insert(Collision {
                path: parents.join("."),
                kind: CollisionKind::LeafReplaced,
            });
        }
        *node = Value::Mapping(Mapping::new());
    }
    let Value::Mapping(map) = node else {
        return collision;
    };

    match map.get_mut(*last) {
        None => {
            let fresh = if append {
                append_to(Value::Sequence(Vec::new()), value)
            } else {
                value
            };
            map.insert(Value::String(last.to_string()), fresh);
        }
        Some(slot) if append && !slot.is_mapping() => {
            let current = std::mem::replace(slot, Value::Null);
            *slot = append_to(current, value);
        }
        Some(slot) => {
            collision.get_or_insert(Collision {
                path: path.to_string(),
                kind: if slot.is_mapping() {
                    CollisionKind::SubtreeReplaced
                } else {
                    CollisionKind::Overwritten
                },
            });
            *slot = if append {
                append_to(Value::Sequence(Vec::new()), value)
            } else {
                value
            };
        }
    }
    collision
}

fn append_to(current: Value, value: Value) -> Value {
    let mut items = match current {
        Value::Sequence(items) => items,
        Value::Null => Vec::new(),
        scalar => vec![scalar],
    };
    match value {
        Value::Sequence(more) => items.extend(more),
        one => items.push(one),
    }
    Value::Sequence(items)
}
