// fable-vm - Virtual machine for the Fable dialogue runtime
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # fable-vm
//!
//! Stack-based virtual machine for compiled Fable dialogue images.
//!
//! The interpreter runs scenes from an [`Image`]: it dispatches bytecode,
//! suspends for text display and choice selection, evaluates named
//! definitions, and calls out to the embedding host for text, choices,
//! variables, flags and external functions.
//!
//! # Quick Start
//!
//! ```no_run
//! use fable_vm::{Image, Interpreter, State};
//!
//! let image = Image::from_file("game.dxb").unwrap();
//! let mut vm = Interpreter::new(image);
//!
//! vm.text_handler(|text| println!("{}", text));
//! vm.choice_handler(|choices| {
//!     for (i, choice) in choices.iter().enumerate() {
//!         println!("{}. {}", i + 1, choice);
//!     }
//! });
//!
//! vm.run_scene("intro").unwrap();
//! while vm.state() == State::InText {
//!     vm.resume_scene().unwrap();
//! }
//! ```

mod definitions;

pub mod error;
pub mod frame;
pub mod hosts;
pub mod interpolate;
pub mod opcode;
pub mod ops;
pub mod random;
pub mod stack;
pub mod value;
pub mod vm;

pub use error::{Result, RuntimeError};
pub use frame::CallFrame;
pub use hosts::{
    ChanceCallback, ChoiceCallback, EndSceneCallback, ExternalFunction, FlagGetCallback,
    FlagSetCallback, TextCallback, UnregisteredFunctionCallback, VariableGetCallback,
    VariableSetCallback, WeightedChanceCallback,
};
pub use interpolate::interpolate;
pub use opcode::Opcode;
pub use ops::BinaryOp;
pub use random::{random_int, random_real};
pub use stack::ValueStack;
pub use value::{Value, ValueKind, type_name};
pub use vm::{Interpreter, State};

// Re-export image types for convenience
pub use fable_image::{Definition, Function, Image, LoadError, Scene};
