// fable-image - Error types for image loading
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Error types for loading compiled dialogue images and translation files.

use std::fmt;

/// Result type for image loading.
pub type Result<T> = std::result::Result<T, LoadError>;

/// Errors that can occur while loading a binary image or translation file.
///
/// Loading is all-or-nothing: any of these errors aborts the load with no
/// partial image constructed.
#[derive(Debug, Clone)]
pub enum LoadError {
    /// The file does not start with a recognised magic number.
    NotAnImage,
    /// The format version does not match what this runtime understands.
    UnsupportedVersion { expected: u8, found: u8 },
    /// The compressed payload could not be inflated to the declared size.
    DecompressionFailed,
    /// The byte source ended before a read completed.
    BinaryTruncated,
    /// A translation file's string count does not match the loaded image.
    TranslationMismatch { expected: usize, found: usize },
    /// An I/O error while reading from disk.
    Io { path: String, message: String },
}

impl LoadError {
    /// Build an [`LoadError::Io`] from a path and an `std::io::Error`.
    pub fn io(path: impl Into<String>, err: std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotAnImage => write!(f, "Not a compiled dialogue image (invalid header)"),
            LoadError::UnsupportedVersion { expected, found } => {
                write!(
                    f,
                    "Binary format version {} is not compatible with this runtime (expected {})",
                    found, expected
                )
            }
            LoadError::DecompressionFailed => write!(f, "Image decompression failed"),
            LoadError::BinaryTruncated => write!(f, "Unexpected end of binary data"),
            LoadError::TranslationMismatch { expected, found } => {
                write!(
                    f,
                    "Translation file string count does not match: expected {}, got {}",
                    expected, found
                )
            }
            LoadError::Io { path, message } => {
                write!(f, "I/O error while reading '{}': {}", path, message)
            }
        }
    }
}

impl std::error::Error for LoadError {}
