// fable-image - Binary image loader for the Fable dialogue runtime
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # fable-image
//!
//! Loader and data model for compiled Fable dialogue images.
//!
//! A compiled image contains a string table, an optional translation table,
//! a bytecode instruction buffer, and metadata tables describing scenes,
//! functions and definitions. This crate parses the binary format
//! (decompressing when flagged) into an [`Image`], and loads standalone
//! translation files over it.
//!
//! # Quick Start
//!
//! ```no_run
//! use fable_image::Image;
//!
//! let mut image = Image::from_file("game.dxb").unwrap();
//! println!("{} scenes", image.scenes().len());
//!
//! // Swap in a translation file; cached definition text recomputes lazily.
//! image.load_translation_file("game.fr.dxt").unwrap();
//! ```

pub mod error;
pub mod image;
pub mod models;
pub mod reader;
pub mod writer;

pub use error::{LoadError, Result};
pub use image::{
    FORMAT_VERSION, IMAGE_MAGIC, Image, TRANSLATION_FORMAT_VERSION, TRANSLATION_MAGIC,
};
pub use models::{Definition, Function, Scene};
pub use reader::{BinaryReader, FileReader, SpanReader};
pub use writer::{ImageWriter, translation_file_bytes};
