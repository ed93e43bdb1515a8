// kiln-embed - Type conversions between Rust and Kiln
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Type conversion traits for moving values between Rust and Kiln.
//!
//! | Rust Type | Kiln Type |
//! |-----------|-----------|
//! | `()` | `nil` |
//! | `bool` | `bool` |
//! | `i32`, `i64`, `usize` | `int` |
//! | `f32`, `f64` | `float` |
//! | `String`, `&str` | `string` |
//! | `Vec<T>` | `list` |
//! | `HashMap<String, T>` | `map` |
//! | `Option<T>` | `T` or `nil` |
//!
//! Collections convert from a snapshot: later script mutations do not
//! show up in a value already converted to Rust.

use std::collections::HashMap;

use kiln_vm::Value;

use crate::error::{Error, Result};

/// Convert a Rust value into a Kiln value.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Convert a Kiln value into a Rust value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

pub fn to_value<T: IntoValue>(value: T) -> Value {
    value.into_value()
}

pub fn from_value<T: FromValue>(value: &Value) -> Result<T> {
    T::from_value(value)
}

// =============================================================================
// IntoValue
// =============================================================================

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Nil
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl IntoValue for i64 {
    fn into_value(self) -> Value {
        Value::Int(self)
    }
}

impl IntoValue for i32 {
    fn into_value(self) -> Value {
        Value::Int(i64::from(self))
    }
}

impl IntoValue for usize {
    fn into_value(self) -> Value {
        Value::Int(i64::try_from(self).unwrap_or(i64::MAX))
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::string(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::string(self)
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::list(self.into_iter().map(IntoValue::into_value))
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(value) => value.into_value(),
            None => Value::Nil,
        }
    }
}

impl<T: IntoValue> IntoValue for HashMap<String, T> {
    fn into_value(self) -> Value {
        Value::map(self.into_iter().map(|(k, v)| (k, v.into_value())))
    }
}

// =============================================================================
// FromValue
// =============================================================================

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for () {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Nil => Ok(()),
            other => Err(Error::conversion("nil", other)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(Error::conversion("bool", other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(n) => Ok(*n),
            other => Err(Error::conversion("int", other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(n) => i32::try_from(*n).map_err(|_| Error::out_of_range("i32", n)),
            other => Err(Error::conversion("int", other)),
        }
    }
}

impl FromValue for usize {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Int(n) => usize::try_from(*n).map_err(|_| Error::out_of_range("usize", n)),
            other => Err(Error::conversion("non-negative int", other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Float(n) => Ok(*n),
            Value::Int(n) => Ok(*n as f64),
            other => Err(Error::conversion("number", other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self> {
        let n = f64::from_value(value)?;
        let narrowed = n as f32;
        if narrowed.is_infinite() && n.is_finite() {
            return Err(Error::out_of_range("f32", n));
        }
        Ok(narrowed)
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s.to_string()),
            other => Err(Error::conversion("string", other)),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::List(list) => list.snapshot().iter().map(T::from_value).collect(),
            other => Err(Error::conversion("list", other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Nil => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for HashMap<String, T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Map(map) => map
                .snapshot()
                .iter()
                .map(|(k, v)| Ok((k.to_string(), T::from_value(v)?)))
                .collect(),
            other => Err(Error::conversion("map", other)),
        }
    }
}
