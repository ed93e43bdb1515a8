// kiln-vm - Bytecode compiler and virtual machine for the Kiln scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Host-defined object types.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;

use super::{ErrorValue, Value};
use crate::opcode::BinaryOpType;

/// The object contract for types defined outside this crate.
///
/// Wrap an implementation with [`Value::custom`]. Only `type_name`,
/// `inspect` and `as_any` are required; everything else defaults to the
/// behavior of an opaque, always-truthy object.
///
/// Implementations must be `Send + Sync` because values can cross into
/// spawned workers. Interior mutability belongs behind a lock.
///
/// # Example
///
/// ```rust
/// use std::any::Any;
/// use kiln_vm::object::{CustomObject, Value};
///
/// #[derive(Debug)]
/// struct Meters(f64);
///
/// impl CustomObject for Meters {
///     fn type_name(&self) -> &'static str {
///         "meters"
///     }
///     fn inspect(&self) -> String {
///         format!("{}m", self.0)
///     }
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
///
/// let v = Value::custom(Meters(3.5));
/// assert_eq!(v.type_name(), "meters");
/// assert_eq!(v.to_string(), "3.5m");
/// ```
pub trait CustomObject: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &'static str;

    fn inspect(&self) -> String;

    fn as_any(&self) -> &dyn Any;

    fn equals(&self, _other: &Value) -> bool {
        false
    }

    fn is_truthy(&self) -> bool {
        true
    }

    fn run_operation(&self, op: BinaryOpType, right: &Value) -> Value {
        Value::Error(std::sync::Arc::new(ErrorValue::type_error(format_args!(
            "unsupported operation for {}: {} on type {}",
            self.type_name(),
            op.symbol(),
            right.type_name()
        ))))
    }

    fn compare(&self, other: &Value) -> Result<Ordering, ErrorValue> {
        Err(ErrorValue::type_error(format_args!(
            "unable to compare {} and {}",
            self.type_name(),
            other.type_name()
        )))
    }

    fn cost(&self) -> usize {
        0
    }

    fn get_attr(&self, _name: &str) -> Option<Value> {
        None
    }

    fn set_attr(&self, name: &str, _value: Value) -> Result<(), ErrorValue> {
        Err(ErrorValue::type_error(format_args!(
            "cannot set attribute {name:?} on {} object",
            self.type_name()
        )))
    }
}
