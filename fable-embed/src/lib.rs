// fable-embed - Embedding API for the Fable dialogue runtime
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # fable-embed
//!
//! A high-level embedding API for the Fable dialogue runtime.
//!
//! This crate wraps the interpreter in an [`Engine`] with typed function
//! registration, ergonomic handler setup, and one error type across
//! loading and execution.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fable_embed::{Engine, State};
//!
//! let mut engine = Engine::from_file("game.dxb").unwrap();
//! engine.text_handler(|text| println!("{}", text));
//! engine.choice_handler(|choices| {
//!     for (i, c) in choices.iter().enumerate() {
//!         println!("  {}. {}", i + 1, c);
//!     }
//! });
//!
//! engine.initialize_flags().unwrap();
//! engine.run_scene("intro").unwrap();
//! while engine.state() == State::InText {
//!     engine.resume_scene().unwrap();
//! }
//! ```
//!
//! ## Registering Native Functions
//!
//! ```no_run
//! # let mut engine = fable_embed::Engine::from_file("game.dxb").unwrap();
//! engine.register_fn("add", |a: i32, b: i32| a + b);
//! engine.register_fn("player_name", || "Player".to_string());
//! ```

mod convert;
mod engine;
mod error;

pub use convert::{FromValue, IntoValue};
pub use engine::{Engine, ExternalFn};
pub use error::{Error, Result};

// Re-export runtime types for convenience
pub use fable_image::{Image, LoadError};
pub use fable_vm::{Interpreter, RuntimeError, State, Value, ValueKind};
