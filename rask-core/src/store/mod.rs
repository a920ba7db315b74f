//! Reactive Store
//!
//! A store wraps a plain JSON-like value (records and arrays, nested to any
//! depth) and instruments reads and writes:
//!
//! - Reading a path while an observer is tracking subscribes the observer to
//!   the signal for each step of that path, creating signals lazily.
//! - Writing a path stores the value and, if it differs from the old one,
//!   notifies that path's signal.
//! - Every container also has a *shape* signal, which readers of its length
//!   or key set depend on and which structural writes always notify.
//!
//! Because each step of a path has its own signal, writing `user.name` does
//! not disturb an observer that only read `user.email`, while replacing
//! `user` wholesale reaches both.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = create_store(json!({ "count": 0, "items": [] }));
//!
//! let frame = observer.observe();
//! let count: i64 = store.field("count").get_as()?;
//! let len = store.field("items").len();
//! frame.end();
//!
//! store.field("items").push("x")?; // notifies `observer` (length changed)
//! store.field("other").set(true)?;  // does not
//! ```

mod path;

pub use path::{Path, PathSegment};

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::error::StoreError;
use crate::reactive::{ReactiveContext, Signal};
use path::{changed_children, child, display, lookup, lookup_mut, SignalKey};

/// Create a reactive store around `initial`.
pub fn create_store(initial: Value) -> Store {
    Store::new(initial)
}

struct StoreInner {
    root: RefCell<Value>,
    signals: RefCell<HashMap<SignalKey, Signal>>,
}

/// A reactive view over one value tree.
///
/// Cloning a `Store` yields another handle to the same tree and signals.
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl Store {
    pub fn new(initial: Value) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                root: RefCell::new(initial),
                signals: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Create a store from any serializable value.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, StoreError> {
        Ok(Self::new(serde_json::to_value(value)?))
    }

    /// Cursor at the root value.
    pub fn root(&self) -> Cursor {
        Cursor {
            store: self.clone(),
            path: Path::new(),
        }
    }

    /// Cursor at a top-level key.
    pub fn field(&self, key: impl Into<String>) -> Cursor {
        self.root().field(key)
    }

    /// Cursor at a top-level index, for stores wrapping an array.
    pub fn index(&self, index: usize) -> Cursor {
        self.root().index(index)
    }

    /// Cursor at an arbitrary path.
    pub fn at<I, S>(&self, path: I) -> Cursor
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        Cursor {
            store: self.clone(),
            path: path.into_iter().map(Into::into).collect(),
        }
    }

    /// The whole tree, without tracking.
    pub fn snapshot(&self) -> Value {
        self.inner.root.borrow().clone()
    }

    /// Number of signals created so far.
    pub fn signal_count(&self) -> usize {
        self.inner.signals.borrow().len()
    }

    fn signal(&self, key: SignalKey) -> Signal {
        self.inner
            .signals
            .borrow_mut()
            .entry(key)
            .or_insert_with_key(|key| {
                trace!(%key, "store signal created");
                Signal::new()
            })
            .clone()
    }

    fn track(&self, key: SignalKey) {
        if ReactiveContext::is_active() {
            let signal = self.signal(key);
            ReactiveContext::track(&signal);
        }
    }

    /// Track the value signal of every step down to `path`.
    fn track_path(&self, path: &[PathSegment]) {
        if !ReactiveContext::is_active() {
            return;
        }
        for end in 1..=path.len() {
            self.track(SignalKey::value(&path[..end]));
        }
    }

    /// Track everything inside a container value handed out as a snapshot.
    fn track_deep(&self, path: &[PathSegment], value: &Value) {
        match value {
            Value::Object(map) => {
                self.track(SignalKey::shape(path));
                for (key, item) in map {
                    let item_path = child(path, PathSegment::Key(key.clone()));
                    self.track(SignalKey::value(&item_path));
                    self.track_deep(&item_path, item);
                }
            }
            Value::Array(items) => {
                self.track(SignalKey::shape(path));
                for (index, item) in items.iter().enumerate() {
                    let item_path = child(path, PathSegment::Index(index));
                    self.track(SignalKey::value(&item_path));
                    self.track_deep(&item_path, item);
                }
            }
            _ => {}
        }
    }

    /// Notify the signals behind `keys` that exist. A signal that was never
    /// created has never been read, so it has nobody to tell.
    fn notify(&self, keys: Vec<SignalKey>) {
        let signals: Vec<Signal> = {
            let registry = self.inner.signals.borrow();
            keys.iter().filter_map(|key| registry.get(key).cloned()).collect()
        };
        for signal in signals {
            signal.notify();
        }
    }

    fn replace_root(&self, value: Value) -> bool {
        let old = {
            let mut root = self.inner.root.borrow_mut();
            if *root == value {
                return false;
            }
            std::mem::replace(&mut *root, value)
        };
        let mut keys = changed_children(&[], &old, &self.inner.root.borrow());
        keys.push(SignalKey::shape(&[]));
        self.notify(keys);
        true
    }

    fn with_array<R, F>(&self, path: &[PathSegment], f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Vec<Value>) -> Result<(R, Vec<SignalKey>), StoreError>,
    {
        let (result, keys) = {
            let mut root = self.inner.root.borrow_mut();
            let target = lookup_mut(&mut root, path).ok_or_else(|| StoreError::MissingPath {
                path: display(path),
            })?;
            let items = target.as_array_mut().ok_or_else(|| StoreError::NotAnArray {
                path: display(path),
            })?;
            f(items)?
        };
        self.notify(keys);
        Ok(result)
    }
}

impl Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("value", &*self.inner.root.borrow())
            .field("signal_count", &self.signal_count())
            .finish()
    }
}

/// A position inside a store. Reads and writes through a cursor are
/// instrumented; navigating with [`field`](Cursor::field) and
/// [`index`](Cursor::index) is not a read.
#[derive(Clone)]
pub struct Cursor {
    store: Store,
    path: Path,
}

impl Cursor {
    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn field(&self, key: impl Into<String>) -> Cursor {
        Cursor {
            store: self.store.clone(),
            path: child(&self.path, PathSegment::Key(key.into())),
        }
    }

    pub fn index(&self, index: usize) -> Cursor {
        Cursor {
            store: self.store.clone(),
            path: child(&self.path, PathSegment::Index(index)),
        }
    }

    fn value_untracked(&self) -> Option<Value> {
        lookup(&self.store.inner.root.borrow(), &self.path).cloned()
    }

    fn missing(&self) -> StoreError {
        StoreError::MissingPath {
            path: display(&self.path),
        }
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// The value here, or `None` if the path does not exist.
    ///
    /// Tracks every step of the path. A container comes back as a snapshot,
    /// so everything inside it is tracked as well.
    pub fn get(&self) -> Option<Value> {
        let value = self.value_untracked();
        self.store.track_path(&self.path);
        if let Some(value) = &value {
            if ReactiveContext::is_active() {
                self.store.track_deep(&self.path, value);
            }
        }
        value
    }

    /// The value here, deserialized.
    pub fn get_as<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let value = self.get().ok_or_else(|| self.missing())?;
        Ok(serde_json::from_value(value)?)
    }

    /// The value here, without tracking.
    pub fn get_untracked(&self) -> Option<Value> {
        self.value_untracked()
    }

    /// Whether a value exists here. Tracks the path, not the value's content.
    pub fn exists(&self) -> bool {
        self.store.track_path(&self.path);
        self.value_untracked().is_some()
    }

    /// Number of items (arrays) or keys (objects); 0 for anything else.
    pub fn len(&self) -> usize {
        self.store.track_path(&self.path);
        self.store.track(SignalKey::shape(&self.path));
        match lookup(&self.store.inner.root.borrow(), &self.path) {
            Some(Value::Array(items)) => items.len(),
            Some(Value::Object(map)) => map.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of the object here, in the tree's order.
    pub fn keys(&self) -> Vec<String> {
        self.store.track_path(&self.path);
        self.store.track(SignalKey::shape(&self.path));
        match lookup(&self.store.inner.root.borrow(), &self.path) {
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Whether the object here has `key`. Tracks that key, present or not.
    pub fn contains_key(&self, key: &str) -> bool {
        let key_path = child(&self.path, PathSegment::Key(key.to_string()));
        self.store.track_path(&key_path);
        matches!(
            lookup(&self.store.inner.root.borrow(), &self.path),
            Some(Value::Object(map)) if map.contains_key(key)
        )
    }

    /// A cursor per item of the array (or key of the object) here.
    ///
    /// Tracks the container's shape, so adding or removing items notifies
    /// the reader; each item is tracked once it is read through its cursor.
    pub fn items(&self) -> Vec<Cursor> {
        self.store.track_path(&self.path);
        self.store.track(SignalKey::shape(&self.path));
        let segments: Vec<PathSegment> = match lookup(&self.store.inner.root.borrow(), &self.path) {
            Some(Value::Array(items)) => (0..items.len()).map(PathSegment::Index).collect(),
            Some(Value::Object(map)) => map.keys().cloned().map(PathSegment::Key).collect(),
            _ => Vec::new(),
        };
        segments
            .into_iter()
            .map(|segment| Cursor {
                store: self.store.clone(),
                path: child(&self.path, segment),
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Store `value` here. Returns whether anything changed.
    ///
    /// The parent container must exist. Setting a missing object key adds
    /// it; setting index `len` of an array appends.
    pub fn set<T: Serialize>(&self, value: T) -> Result<bool, StoreError> {
        self.set_value(serde_json::to_value(value)?)
    }

    /// [`set`](Cursor::set) for an already built value.
    pub fn set_value(&self, value: Value) -> Result<bool, StoreError> {
        let Some((last, parent_path)) = self.path.split_last() else {
            return Ok(self.store.replace_root(value));
        };

        let keys = {
            let mut root = self.store.inner.root.borrow_mut();
            let parent = lookup_mut(&mut root, parent_path).ok_or_else(|| StoreError::MissingPath {
                path: display(parent_path),
            })?;

            match (parent, last) {
                (Value::Object(map), PathSegment::Key(key)) => match map.get_mut(key) {
                    Some(slot) if *slot == value => return Ok(false),
                    Some(slot) => {
                        *slot = value;
                        vec![SignalKey::value(&self.path)]
                    }
                    None => {
                        map.insert(key.clone(), value);
                        vec![SignalKey::value(&self.path), SignalKey::shape(parent_path)]
                    }
                },
                (Value::Array(items), PathSegment::Index(index)) => {
                    let len = items.len();
                    if *index < len {
                        if items[*index] == value {
                            return Ok(false);
                        }
                        items[*index] = value;
                    } else if *index == len {
                        items.push(value);
                    } else {
                        return Err(StoreError::IndexOutOfBounds {
                            path: display(parent_path),
                            index: *index,
                            len,
                        });
                    }
                    vec![SignalKey::value(&self.path), SignalKey::shape(parent_path)]
                }
                (Value::Object(_), PathSegment::Index(_)) => {
                    return Err(StoreError::NotAnArray {
                        path: display(parent_path),
                    })
                }
                (Value::Array(_), PathSegment::Key(_)) => {
                    return Err(StoreError::NotAnObject {
                        path: display(parent_path),
                    })
                }
                _ => {
                    return Err(StoreError::NotAContainer {
                        path: display(parent_path),
                    })
                }
            }
        };

        let path = display(&self.path);
        trace!(%path, "store write");
        self.store.notify(keys);
        Ok(true)
    }

    /// Modify a copy of the value here and store the result.
    ///
    /// A missing value starts out as `null`.
    pub fn update<F>(&self, f: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Value),
    {
        let mut value = self.value_untracked().unwrap_or(Value::Null);
        f(&mut value);
        self.set_value(value)
    }

    /// Remove `key` from the object here. Returns the removed value.
    pub fn remove_key(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let removed = {
            let mut root = self.store.inner.root.borrow_mut();
            let target = lookup_mut(&mut root, &self.path).ok_or_else(|| self.missing())?;
            let map = target.as_object_mut().ok_or_else(|| StoreError::NotAnObject {
                path: display(&self.path),
            })?;
            map.remove(key)
        };

        if removed.is_some() {
            self.store.notify(vec![
                SignalKey::value(&child(&self.path, PathSegment::Key(key.to_string()))),
                SignalKey::shape(&self.path),
            ]);
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Sequence operations
    // ------------------------------------------------------------------

    fn index_keys(&self, indices: impl IntoIterator<Item = usize>) -> Vec<SignalKey> {
        let mut keys: Vec<SignalKey> = indices
            .into_iter()
            .map(|index| SignalKey::value(&child(&self.path, PathSegment::Index(index))))
            .collect();
        keys.push(SignalKey::shape(&self.path));
        keys
    }

    /// Append to the array here.
    pub fn push<T: Serialize>(&self, value: T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value)?;
        self.store.with_array(&self.path, |items| {
            items.push(value);
            Ok(((), self.index_keys([items.len() - 1])))
        })
    }

    /// Remove and return the last item of the array here.
    pub fn pop(&self) -> Result<Option<Value>, StoreError> {
        self.store.with_array(&self.path, |items| match items.pop() {
            Some(value) => Ok((Some(value), self.index_keys([items.len()]))),
            None => Ok((None, Vec::new())),
        })
    }

    /// Insert at `index`, shifting later items up.
    pub fn insert<T: Serialize>(&self, index: usize, value: T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value)?;
        self.store.with_array(&self.path, |items| {
            let len = items.len();
            if index > len {
                return Err(self.out_of_bounds(index, len));
            }
            items.insert(index, value);
            Ok(((), self.index_keys(index..items.len())))
        })
    }

    /// Remove and return the item at `index`, shifting later items down.
    pub fn remove(&self, index: usize) -> Result<Value, StoreError> {
        self.store.with_array(&self.path, |items| {
            let len = items.len();
            if index >= len {
                return Err(self.out_of_bounds(index, len));
            }
            let removed = items.remove(index);
            Ok((removed, self.index_keys(index..len)))
        })
    }

    /// Swap two items.
    pub fn swap(&self, a: usize, b: usize) -> Result<(), StoreError> {
        self.store.with_array(&self.path, |items| {
            let len = items.len();
            if let Some(bad) = [a, b].into_iter().find(|&i| i >= len) {
                return Err(self.out_of_bounds(bad, len));
            }
            items.swap(a, b);
            Ok(((), self.index_keys([a, b])))
        })
    }

    /// Shorten the array to `len` items. No effect if already shorter.
    pub fn truncate(&self, len: usize) -> Result<(), StoreError> {
        self.store.with_array(&self.path, |items| {
            let old_len = items.len();
            if len >= old_len {
                return Ok(((), Vec::new()));
            }
            items.truncate(len);
            Ok(((), self.index_keys(len..old_len)))
        })
    }

    /// Remove every item.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.truncate(0)
    }

    /// Keep only items for which `keep` returns true.
    ///
    /// `keep` sees a copy of the items, so it may read the store.
    pub fn retain<F>(&self, mut keep: F) -> Result<(), StoreError>
    where
        F: FnMut(&Value) -> bool,
    {
        let snapshot = {
            let root = self.store.inner.root.borrow();
            let target = lookup(&root, &self.path).ok_or_else(|| self.missing())?;
            target
                .as_array()
                .ok_or_else(|| StoreError::NotAnArray {
                    path: display(&self.path),
                })?
                .clone()
        };
        let mask: Vec<bool> = snapshot.iter().map(&mut keep).collect();

        self.store.with_array(&self.path, |items| {
            let old_len = items.len();
            let first_removed = mask.iter().position(|kept| !kept);
            let mut flags = mask.iter().copied();
            items.retain(|_| flags.next().unwrap_or(true));
            match first_removed {
                Some(first) if first < old_len => Ok(((), self.index_keys(first..old_len))),
                _ => Ok(((), Vec::new())),
            }
        })
    }

    fn out_of_bounds(&self, index: usize, len: usize) -> StoreError {
        StoreError::IndexOutOfBounds {
            path: display(&self.path),
            index,
            len,
        }
    }
}

impl Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("path", &display(&self.path))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{batch, run_microtasks};
    use crate::reactive::Observer;
    use serde_json::json;
    use std::cell::Cell;

    struct Watcher {
        observer: Observer,
        runs: Rc<Cell<usize>>,
    }

    impl Watcher {
        fn new() -> Self {
            let runs = Rc::new(Cell::new(0));
            let observer = {
                let runs = runs.clone();
                Observer::new(move || runs.set(runs.get() + 1))
            };
            Self { observer, runs }
        }

        fn track<T>(&self, read: impl FnOnce() -> T) -> T {
            let _frame = self.observer.observe();
            read()
        }

        fn runs(&self) -> usize {
            run_microtasks();
            self.runs.get()
        }
    }

    #[test]
    fn reads_outside_tracking_create_no_signals() {
        let store = create_store(json!({ "count": 1 }));
        assert_eq!(store.field("count").get(), Some(json!(1)));
        assert_eq!(store.signal_count(), 0);
    }

    #[test]
    fn write_notifies_reader_once_per_turn() {
        let store = create_store(json!({ "count": 0 }));
        let watcher = Watcher::new();
        watcher.track(|| store.field("count").get());

        store.field("count").set(1).unwrap();
        store.field("count").set(2).unwrap();

        assert_eq!(watcher.runs(), 1);
        assert_eq!(store.field("count").get_as::<i64>().unwrap(), 2);
    }

    #[test]
    fn equal_write_does_not_notify() {
        let store = create_store(json!({ "name": "rask" }));
        let watcher = Watcher::new();
        watcher.track(|| store.field("name").get());

        assert!(!store.field("name").set("rask").unwrap());
        assert_eq!(watcher.runs(), 0);
    }

    #[test]
    fn sibling_leaves_are_independent() {
        let store = create_store(json!({ "user": { "name": "a", "email": "b" } }));
        let watcher = Watcher::new();
        watcher.track(|| store.field("user").field("name").get());

        store.field("user").field("email").set("c").unwrap();
        assert_eq!(watcher.runs(), 0);

        store.field("user").field("name").set("z").unwrap();
        assert_eq!(watcher.runs(), 1);
    }

    #[test]
    fn replacing_a_parent_reaches_nested_readers() {
        let store = create_store(json!({ "user": { "name": "a" } }));
        let watcher = Watcher::new();
        watcher.track(|| store.at(["user", "name"]).get());

        store.field("user").set(json!({ "name": "b" })).unwrap();
        assert_eq!(watcher.runs(), 1);
    }

    #[test]
    fn container_snapshot_tracks_its_contents() {
        let store = create_store(json!({ "user": { "name": "a", "tags": ["x"] } }));
        let watcher = Watcher::new();
        watcher.track(|| store.field("user").get());

        store.at(["user".into(), "tags".into(), PathSegment::Index(0)]).set("y").unwrap();
        assert_eq!(watcher.runs(), 1);
    }

    #[test]
    fn push_notifies_length_reader_but_sibling_write_does_not() {
        let store = create_store(json!({ "items": [], "other": 0 }));
        let watcher = Watcher::new();
        watcher.track(|| store.field("items").len());

        store.field("other").set(5).unwrap();
        assert_eq!(watcher.runs(), 0);

        store.field("items").push("x").unwrap();
        assert_eq!(watcher.runs(), 1);
        assert_eq!(store.field("items").len(), 1);
    }

    #[test]
    fn index_reader_sees_shifts() {
        let store = create_store(json!({ "items": ["a", "b", "c"] }));
        let first = Watcher::new();
        let last = Watcher::new();
        first.track(|| store.field("items").index(0).get());
        last.track(|| store.field("items").index(2).get());

        store.field("items").insert(1, "new").unwrap();
        assert_eq!(first.runs(), 0);
        assert_eq!(last.runs(), 1);

        store.field("items").remove(0).unwrap();
        assert_eq!(first.runs(), 1);
        assert_eq!(
            store.field("items").get_untracked(),
            Some(json!(["new", "b", "c"]))
        );
    }

    #[test]
    fn index_assignment_notifies_structure_readers() {
        let store = create_store(json!({ "items": [1, 2] }));
        let watcher = Watcher::new();
        watcher.track(|| store.field("items").items().len());

        store.field("items").index(1).set(20).unwrap();
        assert_eq!(watcher.runs(), 1);
    }

    #[test]
    fn setting_index_len_appends() {
        let store = create_store(json!([1]));
        store.index(1).set(2).unwrap();
        assert_eq!(store.snapshot(), json!([1, 2]));

        let err = store.index(5).set(9).unwrap_err();
        assert!(matches!(err, StoreError::IndexOutOfBounds { index: 5, len: 2, .. }));
    }

    #[test]
    fn sequence_operations() {
        let store = create_store(json!({ "xs": [3, 1, 2] }));
        let xs = store.field("xs");

        xs.swap(0, 2).unwrap();
        assert_eq!(xs.get_untracked(), Some(json!([2, 1, 3])));

        assert_eq!(xs.pop().unwrap(), Some(json!(3)));
        xs.retain(|v| v.as_i64() != Some(2)).unwrap();
        assert_eq!(xs.get_untracked(), Some(json!([1])));

        xs.clear().unwrap();
        assert!(xs.is_empty());
        assert_eq!(xs.pop().unwrap(), None);
    }

    #[test]
    fn retain_predicate_can_read_the_store() {
        let store = create_store(json!({ "min": 3, "xs": [1, 4, 2, 5] }));
        let watcher = Watcher::new();
        watcher.track(|| store.field("xs").index(0).get());

        let threshold = store.clone();
        store
            .field("xs")
            .retain(|v| v.as_i64() >= threshold.field("min").get_as::<i64>().ok())
            .unwrap();

        assert_eq!(store.field("xs").get_untracked(), Some(json!([4, 5])));
        assert_eq!(watcher.runs(), 1);
    }

    #[test]
    fn store_write_with_tracing_enabled() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let store = create_store(json!({ "user": { "name": "a" } }));
            assert!(store.at(["user", "name"]).set("b").unwrap());
            assert_eq!(store.at(["user", "name"]).get_untracked(), Some(json!("b")));
        });
    }

    #[test]
    fn key_set_readers_follow_adds_and_removes() {
        let store = create_store(json!({ "flags": { "a": true } }));
        let watcher = Watcher::new();
        let keys = watcher.track(|| store.field("flags").keys());
        assert_eq!(keys, vec!["a".to_string()]);

        store.field("flags").field("a").set(false).unwrap();
        assert_eq!(watcher.runs(), 0);

        store.field("flags").field("b").set(true).unwrap();
        assert_eq!(watcher.runs(), 1);

        watcher.track(|| store.field("flags").keys());
        assert_eq!(store.field("flags").remove_key("a").unwrap(), Some(json!(false)));
        assert_eq!(watcher.runs(), 2);
    }

    #[test]
    fn reading_a_missing_key_tracks_its_arrival() {
        let store = create_store(json!({}));
        let watcher = Watcher::new();
        let present = watcher.track(|| store.root().contains_key("token"));
        assert!(!present);

        store.field("token").set("abc").unwrap();
        assert_eq!(watcher.runs(), 1);
    }

    #[test]
    fn batched_writes_notify_once_with_final_value() {
        let store = create_store(json!({ "a": 0, "b": 0 }));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let observer = {
            let store = store.clone();
            let seen = seen.clone();
            Observer::new(move || {
                seen.borrow_mut().push(store.snapshot());
            })
        };
        {
            let _frame = observer.observe();
            store.field("a").get();
            store.field("b").get();
        }

        batch(|| {
            store.field("a").set(1).unwrap();
            store.field("b").set(2).unwrap();
            store.field("a").set(3).unwrap();
        });

        assert_eq!(*seen.borrow(), vec![json!({ "a": 3, "b": 2 })]);
    }

    #[test]
    fn root_replacement_notifies_changed_top_level_keys() {
        let store = create_store(json!({ "a": 1, "b": 2 }));
        let a = Watcher::new();
        let b = Watcher::new();
        a.track(|| store.field("a").get());
        b.track(|| store.field("b").get());

        store.root().set(json!({ "a": 1, "b": 3 })).unwrap();

        assert_eq!(a.runs(), 0);
        assert_eq!(b.runs(), 1);
    }

    #[test]
    fn typed_round_trip_through_serde() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Todo {
            title: String,
            done: bool,
        }

        let store = Store::from_serialize(&json!({ "todos": [] })).unwrap();
        store
            .field("todos")
            .push(Todo {
                title: "write tests".into(),
                done: false,
            })
            .unwrap();
        store.at(["todos".into(), PathSegment::Index(0), "done".into()]).set(true).unwrap();

        let todo: Todo = store.field("todos").index(0).get_as().unwrap();
        assert_eq!(
            todo,
            Todo {
                title: "write tests".into(),
                done: true
            }
        );
    }

    #[test]
    fn write_errors_name_the_path() {
        let store = create_store(json!({ "n": 1, "xs": [] }));

        let err = store.at(["missing", "x"]).set(1).unwrap_err();
        assert_eq!(err.to_string(), "no value at `missing`");

        let err = store.field("n").push(1).unwrap_err();
        assert!(matches!(err, StoreError::NotAnArray { .. }));

        let err = store.field("xs").remove(0).unwrap_err();
        assert!(matches!(err, StoreError::IndexOutOfBounds { index: 0, len: 0, .. }));

        let err = store.at(["n", "deeper"]).set(1).unwrap_err();
        assert!(matches!(err, StoreError::NotAContainer { .. }));
    }
}
