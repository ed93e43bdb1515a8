// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Lists, maps, sets and the iterators range loops drive.
//!
//! Container storage is an `im` persistent collection behind a mutex. Reads
//! take a snapshot (an O(1) clone) and drop the lock before doing any work,
//! so callbacks into other values never run while a container is locked.

use std::sync::Arc;

use im::{OrdMap, OrdSet, Vector};
use parking_lot::Mutex;

use super::{ErrorValue, Value};

// ============================================================================
// HashKey
// ============================================================================

/// A set member: the hashable subset of [`Value`].
///
/// Floats are keyed by their bit pattern, so `1` and `1.0` are distinct
/// members.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashKey {
    Nil,
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(Arc<str>),
}

impl HashKey {
    pub fn to_value(&self) -> Value {
        match self {
            HashKey::Nil => Value::Nil,
            HashKey::Bool(b) => Value::Bool(*b),
            HashKey::Int(n) => Value::Int(*n),
            HashKey::Float(bits) => Value::Float(f64::from_bits(*bits)),
            HashKey::Str(s) => Value::String(s.clone()),
        }
    }
}

impl TryFrom<&Value> for HashKey {
    type Error = ErrorValue;

    fn try_from(value: &Value) -> Result<Self, ErrorValue> {
        Ok(match value {
            Value::Nil => HashKey::Nil,
            Value::Bool(b) => HashKey::Bool(*b),
            Value::Int(n) => HashKey::Int(*n),
            Value::Float(f) => HashKey::Float(f.to_bits()),
            Value::String(s) => HashKey::Str(s.clone()),
            other => {
                return Err(ErrorValue::type_error(format_args!(
                    "unhashable type: {}",
                    other.type_name()
                )));
            }
        })
    }
}

// ============================================================================
// List
// ============================================================================

/// A shared, mutable list.
#[derive(Clone, Default)]
pub struct List(Arc<Mutex<Vector<Value>>>);

impl List {
    pub fn new(items: Vector<Value>) -> Self {
        List(Arc::new(Mutex::new(items)))
    }

    pub fn snapshot(&self) -> Vector<Value> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.lock().get(index).cloned()
    }

    /// Replace the item at `index`. Returns false when out of range.
    pub fn set(&self, index: usize, value: Value) -> bool {
        let mut items = self.0.lock();
        match items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn push(&self, value: Value) {
        self.0.lock().push_back(value);
    }

    pub fn pop(&self) -> Option<Value> {
        self.0.lock().pop_back()
    }

    pub fn ptr_eq(&self, other: &List) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// ============================================================================
// Map
// ============================================================================

/// A shared, mutable map with string keys, iterated in key order.
#[derive(Clone, Default)]
pub struct Map(Arc<Mutex<OrdMap<Arc<str>, Value>>>);

impl Map {
    pub fn new(entries: OrdMap<Arc<str>, Value>) -> Self {
        Map(Arc::new(Mutex::new(entries)))
    }

    pub fn snapshot(&self) -> OrdMap<Arc<str>, Value> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.lock().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.lock().contains_key(key)
    }

    pub fn insert(&self, key: impl Into<Arc<str>>, value: Value) {
        self.0.lock().insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.lock().remove(key)
    }

    pub fn ptr_eq(&self, other: &Map) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// ============================================================================
// Set
// ============================================================================

/// A shared, mutable set of hashable scalars.
#[derive(Clone, Default)]
pub struct Set(Arc<Mutex<OrdSet<HashKey>>>);

impl Set {
    pub fn new(items: OrdSet<HashKey>) -> Self {
        Set(Arc::new(Mutex::new(items)))
    }

    pub fn snapshot(&self) -> OrdSet<HashKey> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn contains(&self, key: &HashKey) -> bool {
        self.0.lock().contains(key)
    }

    pub fn insert(&self, key: HashKey) {
        self.0.lock().insert(key);
    }

    pub fn ptr_eq(&self, other: &Set) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// ============================================================================
// Iter
// ============================================================================

enum IterSource {
    List(Vector<Value>),
    Entries(Vec<(Value, Value)>),
    Chars(Vec<char>),
}

struct IterState {
    source: IterSource,
    pos: usize,
}

/// A snapshot iterator yielding `(key, value)` entries.
///
/// The entries are fixed when the iterator is created; mutating the
/// container afterwards does not affect a loop already running over it.
#[derive(Clone)]
pub struct Iter(Arc<Mutex<IterState>>);

impl Iter {
    fn new(source: IterSource) -> Self {
        Iter(Arc::new(Mutex::new(IterState { source, pos: 0 })))
    }

    /// Advance, returning the next entry or `None` once exhausted.
    pub fn next_entry(&self) -> Option<(Value, Value)> {
        let mut state = self.0.lock();
        let pos = state.pos;
        let entry = match &state.source {
            IterSource::List(items) => items
                .get(pos)
                .map(|item| (Value::Int(pos as i64), item.clone())),
            IterSource::Entries(entries) => entries.get(pos).cloned(),
            IterSource::Chars(chars) => chars
                .get(pos)
                .map(|c| (Value::Int(pos as i64), Value::string(c.to_string()))),
        };
        if entry.is_some() {
            state.pos += 1;
        }
        entry
    }

    pub fn ptr_eq(&self, other: &Iter) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// ============================================================================
// Container operations on Value
// ============================================================================

/// Map a possibly negative index onto `0..size`.
fn resolve_index(index: i64, size: usize) -> Result<usize, ErrorValue> {
    let size = size as i64;
    let resolved = if index < 0 { index + size } else { index };
    if resolved < 0 || resolved >= size {
        return Err(ErrorValue::new(format!(
            "index error: index out of range: {index}"
        )));
    }
    Ok(resolved as usize)
}

/// Resolve `[from:to]` bounds against a sequence of `size` items.
fn resolve_slice(from: &Value, to: &Value, size: usize) -> Result<(usize, usize), ErrorValue> {
    let bound = |value: &Value, which: &str| -> Result<usize, ErrorValue> {
        let Value::Int(n) = value else {
            return Err(ErrorValue::type_error(format_args!(
                "slice {which} index must be an int (got {})",
                value.type_name()
            )));
        };
        let n = if *n < 0 { *n + size as i64 } else { *n };
        if n < 0 || n > size as i64 {
            return Err(ErrorValue::new(format!(
                "slice error: {which} index is out of range"
            )));
        }
        Ok(n as usize)
    };
    let start = bound(from, "start")?;
    let stop = bound(to, "stop")?;
    if start > stop {
        return Err(ErrorValue::new(
            "slice error: start index is greater than stop index",
        ));
    }
    Ok((start, stop))
}

impl Value {
    /// A snapshot iterator, or `None` if the value is not iterable.
    pub fn iter(&self) -> Option<Iter> {
        let source = match self {
            Value::List(list) => IterSource::List(list.snapshot()),
            Value::Map(map) => IterSource::Entries(
                map.snapshot()
                    .into_iter()
                    .map(|(k, v)| (Value::String(k), v))
                    .collect(),
            ),
            Value::Set(set) => IterSource::Entries(
                set.snapshot()
                    .into_iter()
                    .map(|k| (k.to_value(), Value::Bool(true)))
                    .collect(),
            ),
            Value::String(s) => IterSource::Chars(s.chars().collect()),
            Value::Iter(iter) => return Some(iter.clone()),
            _ => return None,
        };
        Some(Iter::new(source))
    }

    /// `self[index]`. Failures come back as error values.
    pub fn get_item(&self, index: &Value) -> Value {
        let result = match (self, index) {
            (Value::List(list), Value::Int(i)) => {
                resolve_index(*i, list.len()).map(|i| list.get(i).unwrap_or_default())
            }
            (Value::List(_), other) => Err(ErrorValue::type_error(format_args!(
                "list index must be an int (got {})",
                other.type_name()
            ))),
            (Value::String(s), Value::Int(i)) => {
                let chars: Vec<char> = s.chars().collect();
                resolve_index(*i, chars.len()).map(|i| Value::string(chars[i].to_string()))
            }
            (Value::String(_), other) => Err(ErrorValue::type_error(format_args!(
                "string index must be an int (got {})",
                other.type_name()
            ))),
            (Value::Map(map), Value::String(key)) => Ok(map.get(key).unwrap_or_default()),
            (Value::Map(_), other) => Err(ErrorValue::type_error(format_args!(
                "map key must be a string (got {})",
                other.type_name()
            ))),
            (Value::Set(set), key) => {
                HashKey::try_from(key).map(|key| Value::Bool(set.contains(&key)))
            }
            (other, _) => Err(ErrorValue::type_error(format_args!(
                "{} object is not subscriptable",
                other.type_name()
            ))),
        };
        result.unwrap_or_else(Value::from)
    }

    /// `self[index] = value`.
    pub fn set_item(&self, index: &Value, value: Value) -> Result<(), ErrorValue> {
        match (self, index) {
            (Value::List(list), Value::Int(i)) => {
                let i = resolve_index(*i, list.len())?;
                if list.set(i, value) {
                    Ok(())
                } else {
                    Err(ErrorValue::new(format!("index error: index out of range: {i}")))
                }
            }
            (Value::List(_), other) => Err(ErrorValue::type_error(format_args!(
                "list index must be an int (got {})",
                other.type_name()
            ))),
            (Value::Map(map), Value::String(key)) => {
                map.insert(key.clone(), value);
                Ok(())
            }
            (Value::Map(_), other) => Err(ErrorValue::type_error(format_args!(
                "map key must be a string (got {})",
                other.type_name()
            ))),
            (other, _) => Err(ErrorValue::type_error(format_args!(
                "set item is unsupported for {}",
                other.type_name()
            ))),
        }
    }

    /// `item in self` as a bool, or an error value.
    pub fn contains(&self, item: &Value) -> Value {
        match self {
            Value::List(list) => Value::Bool(list.snapshot().iter().any(|x| x.equals(item))),
            Value::Map(map) => Value::Bool(item.as_str().is_some_and(|k| map.contains_key(k))),
            Value::Set(set) => Value::Bool(
                HashKey::try_from(item)
                    .map(|key| set.contains(&key))
                    .unwrap_or(false),
            ),
            Value::String(s) => Value::Bool(item.as_str().is_some_and(|sub| s.contains(sub))),
            other => Value::type_error(format_args!(
                "{} object is not a container",
                other.type_name()
            )),
        }
    }

    /// Item count as an int, or an error value.
    pub fn len(&self) -> Value {
        match self {
            Value::List(list) => Value::Int(list.len() as i64),
            Value::Map(map) => Value::Int(map.len() as i64),
            Value::Set(set) => Value::Int(set.len() as i64),
            Value::String(s) => Value::Int(s.chars().count() as i64),
            Value::Chan(chan) => Value::Int(chan.len() as i64),
            other => Value::type_error(format_args!(
                "{} object has no length",
                other.type_name()
            )),
        }
    }

    /// `self[from:to]` for lists and strings.
    pub fn slice(&self, from: &Value, to: &Value) -> Value {
        let result = match self {
            Value::List(list) => {
                let items = list.snapshot();
                resolve_slice(from, to, items.len())
                    .map(|(start, stop)| Value::List(List::new(items.skip(start).take(stop - start))))
            }
            Value::String(s) => {
                let chars: Vec<char> = s.chars().collect();
                resolve_slice(from, to, chars.len())
                    .map(|(start, stop)| Value::string(chars[start..stop].iter().collect::<String>()))
            }
            other => Err(ErrorValue::type_error(format_args!(
                "{} object is not sliceable",
                other.type_name()
            ))),
        };
        result.unwrap_or_else(Value::from)
    }

    /// The items of a list, for unpacking into several names.
    pub(crate) fn to_items(&self) -> Option<Vec<Value>> {
        match self {
            Value::List(list) => Some(list.snapshot().into_iter().collect()),
            _ => None,
        }
    }
}
