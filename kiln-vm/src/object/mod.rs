// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Runtime values and the object contract the VM dispatches through.
//!
//! The VM never looks inside a value directly. It asks for truthiness,
//! equality, operator results, attributes, items and iterators through the
//! methods on [`Value`], and host types join in by implementing
//! [`CustomObject`].

mod attrs;
mod collections;
mod custom;
mod error;
mod function;
mod ops;

use std::fmt;
use std::sync::Arc;

pub use collections::{HashKey, Iter, List, Map, Set};
pub use custom::CustomObject;
pub use error::ErrorValue;
pub use function::{Builtin, Cell, Function, NativeFn, Partial};

pub use crate::concurrency::{Chan, Thread};

/// A Kiln runtime value.
///
/// Scalars are stored inline. Everything else is reference counted, so
/// cloning a value is cheap and clones of a container alias the same
/// storage.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Arc<str>),
    List(List),
    Map(Map),
    Set(Set),
    Function(Arc<Function>),
    Builtin(Arc<Builtin>),
    Partial(Arc<Partial>),
    /// A captured variable. Only ever seen in local slots and closures.
    Cell(Cell),
    /// Iterator state for a range loop. Never visible to scripts.
    Iter(Iter),
    Error(Arc<ErrorValue>),
    Thread(Thread),
    Chan(Chan),
    Custom(Arc<dyn CustomObject>),
}

impl Value {
    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::String(s.into())
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(List::new(items.into_iter().collect()))
    }

    pub fn map<K: Into<Arc<str>>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(Map::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Build a set. Fails on the first item that cannot be hashed.
    pub fn set(items: impl IntoIterator<Item = Value>) -> Result<Self, ErrorValue> {
        let keys = items
            .into_iter()
            .map(|item| HashKey::try_from(&item))
            .collect::<Result<_, _>>()?;
        Ok(Value::Set(Set::new(keys)))
    }

    /// An unraised error value.
    pub fn error(message: impl Into<String>) -> Self {
        Value::Error(Arc::new(ErrorValue::new(message)))
    }

    pub fn function(function: Function) -> Self {
        Value::Function(Arc::new(function))
    }

    pub fn builtin(builtin: Builtin) -> Self {
        Value::Builtin(Arc::new(builtin))
    }

    pub fn custom<T: CustomObject + 'static>(object: T) -> Self {
        Value::Custom(Arc::new(object))
    }

    pub(crate) fn type_error(message: impl fmt::Display) -> Self {
        Value::Error(Arc::new(ErrorValue::type_error(message)))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Ints widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&ErrorValue> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<Function>> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Function(_) | Value::Builtin(_) | Value::Partial(_)
        )
    }

    // =========================================================================
    // Object contract
    // =========================================================================

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
            Value::Function(_) => "function",
            Value::Builtin(_) => "builtin",
            Value::Partial(_) => "partial",
            Value::Cell(_) => "cell",
            Value::Iter(_) => "iterator",
            Value::Error(_) => "error",
            Value::Thread(_) => "thread",
            Value::Chan(_) => "chan",
            Value::Custom(obj) => obj.type_name(),
        }
    }

    /// Source-like representation. Strings are quoted.
    pub fn inspect(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => format!("{f:?}"),
            Value::String(s) => format!("{s:?}"),
            Value::List(list) => {
                let items: Vec<String> = list.snapshot().iter().map(Value::inspect).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Map(map) => {
                let entries: Vec<String> = map
                    .snapshot()
                    .iter()
                    .map(|(k, v)| format!("{k:?}: {}", v.inspect()))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
            Value::Set(set) => {
                let items: Vec<String> = set
                    .snapshot()
                    .iter()
                    .map(|k| k.to_value().inspect())
                    .collect();
                format!("{{{}}}", items.join(", "))
            }
            Value::Function(f) => format!("{f:?}"),
            Value::Builtin(b) => format!("{b:?}"),
            Value::Partial(p) => format!("partial({})", p.callee().inspect()),
            Value::Cell(cell) => format!("{cell:?}"),
            Value::Iter(_) => "iterator".to_string(),
            Value::Error(e) => format!("error({:?})", e.message()),
            Value::Thread(_) => "thread".to_string(),
            Value::Chan(chan) => format!("chan({})", chan.capacity()),
            Value::Custom(obj) => obj.inspect(),
        }
    }

    /// Text used when the value is interpolated into a string: strings and
    /// error messages render raw, everything else as [`Value::inspect`].
    pub fn render(&self) -> String {
        match self {
            Value::String(s) => s.to_string(),
            Value::Error(e) => e.message().to_string(),
            other => other.inspect(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(list) => !list.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Set(set) => !set.is_empty(),
            Value::Error(_) => false,
            Value::Cell(cell) => cell.get().is_truthy(),
            Value::Custom(obj) => obj.is_truthy(),
            _ => true,
        }
    }

    /// Script-level `==`.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let (a, b) = (a.snapshot(), b.snapshot());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Map(a), Value::Map(b)) => {
                if a.ptr_eq(b) {
                    return true;
                }
                let (a, b) = (a.snapshot(), b.snapshot());
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|other| v.equals(other)))
            }
            (Value::Set(a), Value::Set(b)) => a.ptr_eq(b) || a.snapshot() == b.snapshot(),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Arc::ptr_eq(a, b),
            (Value::Partial(a), Value::Partial(b)) => Arc::ptr_eq(a, b),
            (Value::Cell(a), Value::Cell(b)) => a.ptr_eq(b),
            (Value::Iter(a), Value::Iter(b)) => a.ptr_eq(b),
            (Value::Error(a), Value::Error(b)) => a.message() == b.message(),
            (Value::Thread(a), Value::Thread(b)) => a.ptr_eq(b),
            (Value::Chan(a), Value::Chan(b)) => a.ptr_eq(b),
            (Value::Custom(a), other) => a.equals(other),
            _ => false,
        }
    }

    /// Size charged against the context's cost limit when the value is
    /// built by the VM.
    pub fn cost(&self) -> usize {
        match self {
            Value::String(s) => s.len(),
            Value::List(list) => list.len(),
            Value::Map(map) => map.len(),
            Value::Set(set) => set.len(),
            Value::Custom(obj) => obj.cost(),
            _ => 0,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl From<ErrorValue> for Value {
    fn from(err: ErrorValue) -> Self {
        Value::Error(Arc::new(err))
    }
}
