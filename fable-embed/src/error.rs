// fable-embed - Unified error type
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! One error type over image loading and scene execution.

use std::fmt;

use fable_image::LoadError;
use fable_vm::RuntimeError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the engine.
#[derive(Debug, Clone)]
pub enum Error {
    /// The image or translation file failed to load.
    Load(LoadError),
    /// A scene, evaluation, or definition failed at runtime.
    Runtime(RuntimeError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Load(e) => write!(f, "{}", e),
            Error::Runtime(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Load(e) => Some(e),
            Error::Runtime(e) => Some(e),
        }
    }
}

impl From<LoadError> for Error {
    fn from(e: LoadError) -> Self {
        Error::Load(e)
    }
}

impl From<RuntimeError> for Error {
    fn from(e: RuntimeError) -> Self {
        Error::Runtime(e)
    }
}
