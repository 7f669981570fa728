// fable-embed - Type conversion traits
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Type conversion between Rust and script values.
//!
//! This module provides the [`IntoValue`] and [`FromValue`] traits for
//! converting between Rust types and [`Value`].
//!
//! # Built-in Conversions
//!
//! | Rust Type         | Script Type         |
//! |-------------------|---------------------|
//! | `()`              | `Undefined`         |
//! | `bool`            | `Integer` 0/1       |
//! | `i32`             | `Integer`           |
//! | `f32`, `f64`      | `Double`            |
//! | `String`, `&str`  | `String`            |
//! | `Vec<T>`          | `Array`             |
//! | `Option<T>`       | `T` or `Undefined`  |
//!
//! `FromValue` coerces the way scripts do: an `Integer` converts to a
//! requested `String`, a numeric `String` converts to a requested `i32`,
//! and so on. Conversion failures carry the script-side error type so they
//! propagate out of external function calls unchanged.

use fable_vm::error::Result;
use fable_vm::{RuntimeError, Value};

/// Convert a Rust type into a script [`Value`].
pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Convert a script [`Value`] into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

// ============================================================================
// IntoValue implementations
// ============================================================================

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Undefined
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::from_bool(self)
    }
}

impl IntoValue for i32 {
    fn into_value(self) -> Value {
        Value::Integer(self)
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Double(self)
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Double(self as f64)
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::String(self)
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::Array(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(value) => value.into_value(),
            None => Value::Undefined,
        }
    }
}

// ============================================================================
// FromValue implementations
// ============================================================================

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for () {
    fn from_value(_value: &Value) -> Result<Self> {
        Ok(())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.safe_int()? != 0)
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        value.safe_int()
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.safe_double()
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        value.safe_string()
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Array(items) => items.iter().map(T::from_value).collect(),
            other => Err(RuntimeError::TypeMismatch {
                expected: "Array",
                got: other.type_name(),
            }),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Undefined => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}
