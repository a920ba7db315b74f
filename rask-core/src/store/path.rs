//! Store paths and signal keys.

use std::fmt::{self, Display, Write as _};

use serde_json::Value;
use smallvec::SmallVec;

/// One step into a store value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    /// A key of an object.
    Key(String),
    /// A position in an array.
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Location of a value inside a store, root first.
pub type Path = SmallVec<[PathSegment; 4]>;

/// Render a path as `user.tags[2]`; the root renders as `$`.
pub(crate) fn display(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return "$".to_string();
    }
    let mut out = String::new();
    for (i, segment) in path.iter().enumerate() {
        match segment {
            PathSegment::Key(key) if i == 0 => out.push_str(key),
            PathSegment::Key(key) => {
                out.push('.');
                out.push_str(key);
            }
            PathSegment::Index(index) => {
                let _ = write!(out, "[{index}]");
            }
        }
    }
    out
}

pub(crate) fn child(path: &[PathSegment], segment: PathSegment) -> Path {
    let mut out = Path::from(path);
    out.push(segment);
    out
}

pub(crate) fn lookup<'a>(root: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
    path.iter().try_fold(root, |value, segment| match (value, segment) {
        (Value::Object(map), PathSegment::Key(key)) => map.get(key),
        (Value::Array(items), PathSegment::Index(index)) => items.get(*index),
        _ => None,
    })
}

pub(crate) fn lookup_mut<'a>(root: &'a mut Value, path: &[PathSegment]) -> Option<&'a mut Value> {
    path.iter().try_fold(root, |value, segment| match (value, segment) {
        (Value::Object(map), PathSegment::Key(key)) => map.get_mut(key),
        (Value::Array(items), PathSegment::Index(index)) => items.get_mut(*index),
        _ => None,
    })
}

/// What a signal in the store stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum SignalKind {
    /// The value at a path.
    Value,
    /// The structure of the container at a path: its length or key set.
    Shape,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct SignalKey {
    pub(crate) path: Path,
    pub(crate) kind: SignalKind,
}

impl SignalKey {
    pub(crate) fn value(path: &[PathSegment]) -> Self {
        Self {
            path: Path::from(path),
            kind: SignalKind::Value,
        }
    }

    pub(crate) fn shape(path: &[PathSegment]) -> Self {
        Self {
            path: Path::from(path),
            kind: SignalKind::Shape,
        }
    }
}

impl Display for SignalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SignalKind::Value => write!(f, "{}", display(&self.path)),
            SignalKind::Shape => write!(f, "{}#shape", display(&self.path)),
        }
    }
}

/// Keys of every direct child whose value differs between `old` and `new`.
pub(crate) fn changed_children(path: &[PathSegment], old: &Value, new: &Value) -> Vec<SignalKey> {
    let mut keys = Vec::new();
    match (old, new) {
        (Value::Object(old), Value::Object(new)) => {
            for key in old.keys().chain(new.keys().filter(|k| !old.contains_key(*k))) {
                if old.get(key) != new.get(key) {
                    keys.push(SignalKey::value(&child(path, PathSegment::Key(key.clone()))));
                }
            }
        }
        (Value::Array(old), Value::Array(new)) => {
            for index in 0..old.len().max(new.len()) {
                if old.get(index) != new.get(index) {
                    keys.push(SignalKey::value(&child(path, PathSegment::Index(index))));
                }
            }
        }
        (old, new) => {
            for key in direct_children(path, old).into_iter().chain(direct_children(path, new)) {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
    }
    keys
}

fn direct_children(path: &[PathSegment], value: &Value) -> Vec<SignalKey> {
    match value {
        Value::Object(map) => map
            .keys()
            .map(|key| SignalKey::value(&child(path, PathSegment::Key(key.clone()))))
            .collect(),
        Value::Array(items) => (0..items.len())
            .map(|index| SignalKey::value(&child(path, PathSegment::Index(index))))
            .collect(),
        _ => Vec::new(),
    }
}
