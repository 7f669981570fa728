// fable-vm - Runtime error types
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Runtime errors for the interpreter.
//!
//! Errors raised while dispatching bytecode are wrapped in
//! [`RuntimeError::InScene`] with the scene name and program counter before
//! they reach the caller. The interpreter's state after an error is
//! undefined; callers should discard it or call `end_scene` to reset.

use std::fmt;

/// Result type for VM operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Runtime error during interpretation.
#[derive(Debug, Clone)]
pub enum RuntimeError {
    /// Pop or peek on an empty operand stack.
    StackUnderflow,
    /// A value could not be converted to the requested type.
    ValueConversion { from: &'static str, to: &'static str },
    /// An operator is not defined for the operand type.
    InvalidOperator { op: &'static str, ty: &'static str },
    /// An operand had the wrong type for an opcode.
    TypeMismatch { expected: &'static str, got: &'static str },
    /// A local slot index was out of range.
    LocalOutOfRange { index: i32, len: usize },
    /// An operation was attempted in the wrong interpreter state.
    InvalidState { expected: &'static str, actual: &'static str },
    /// An external function was called without a registered handler.
    UnknownFunction(String),
    /// No scene with the given name exists in the image.
    UnknownScene(String),
    /// No definition with the given name exists in the image.
    UnknownDefinition(String),
    /// A required host callback was never registered.
    HostMissing(&'static str),
    /// A flag-backed local was written back before flag initialization.
    UninitializedFlags,
    /// The instruction buffer held a byte that is not an opcode.
    BadOpcode { byte: u8, offset: i32 },
    /// The program counter left the instruction buffer.
    CodeOutOfBounds { offset: i32 },
    /// A string table index was out of range.
    BadStringIndex { index: i32 },
    /// A function id was out of range.
    BadFunctionIndex { index: i32 },
    /// An array access was out of bounds.
    IndexOutOfBounds { index: i32, len: usize },
    /// A choice or choose selection index was out of range.
    BadSelection { index: usize, len: usize },
    /// A choice or choose statement reached its selection with no
    /// candidates collected.
    NoChoices,
    /// An error raised during scene dispatch, annotated with where it
    /// happened.
    InScene {
        scene: String,
        offset: i32,
        source: Box<RuntimeError>,
    },
}

impl RuntimeError {
    /// Wrap an error with the scene and program counter it occurred at.
    /// Already-annotated errors pass through unchanged.
    pub(crate) fn in_scene(self, scene: &str, offset: i32) -> RuntimeError {
        match self {
            RuntimeError::InScene { .. } => self,
            other => RuntimeError::InScene {
                scene: scene.to_string(),
                offset,
                source: Box::new(other),
            },
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::StackUnderflow => write!(f, "Stack underflow"),
            RuntimeError::ValueConversion { from, to } => {
                write!(f, "Cannot convert type {} to {}", from, to)
            }
            RuntimeError::InvalidOperator { op, ty } => {
                write!(f, "Cannot perform '{}' with type {}", op, ty)
            }
            RuntimeError::TypeMismatch { expected, got } => {
                write!(f, "Type mismatch: expected {}, got {}", expected, got)
            }
            RuntimeError::LocalOutOfRange { index, len } => {
                write!(f, "Local slot {} out of range (have {})", index, len)
            }
            RuntimeError::InvalidState { expected, actual } => {
                write!(
                    f,
                    "Invalid interpreter state: expected {}, currently {}",
                    expected, actual
                )
            }
            RuntimeError::UnknownFunction(name) => {
                write!(f, "Unregistered function \"{}\"", name)
            }
            RuntimeError::UnknownScene(name) => write!(f, "Unknown scene \"{}\"", name),
            RuntimeError::UnknownDefinition(name) => {
                write!(f, "Unknown definition \"{}\"", name)
            }
            RuntimeError::HostMissing(slot) => {
                write!(
                    f,
                    "Missing {} handler; register one before using the interpreter",
                    slot
                )
            }
            RuntimeError::UninitializedFlags => {
                write!(f, "Flags not initialized before being used by the interpreter")
            }
            RuntimeError::BadOpcode { byte, offset } => {
                write!(f, "Invalid opcode {:#04x} at offset {}", byte, offset)
            }
            RuntimeError::CodeOutOfBounds { offset } => {
                write!(f, "Program counter {} outside the instruction buffer", offset)
            }
            RuntimeError::BadStringIndex { index } => {
                write!(f, "String table index {} out of range", index)
            }
            RuntimeError::BadFunctionIndex { index } => {
                write!(f, "Function id {} out of range", index)
            }
            RuntimeError::IndexOutOfBounds { index, len } => {
                write!(f, "Array index {} out of bounds (length {})", index, len)
            }
            RuntimeError::BadSelection { index, len } => {
                write!(f, "Selection index {} out of range (have {})", index, len)
            }
            RuntimeError::NoChoices => {
                write!(f, "Choice statement has no choices to present")
            }
            RuntimeError::InScene {
                scene,
                offset,
                source,
            } => {
                write!(
                    f,
                    "Runtime error (scene: {}, offset: {}): {}",
                    scene, offset, source
                )
            }
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::InScene { source, .. } => Some(source),
            _ => None,
        }
    }
}
