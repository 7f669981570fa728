// fable-vm - Call frames
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Call frames for the VM.
//!
//! Each frame owns the operand stack and local slots of its caller: on a
//! call the interpreter's live stack and locals are moved into the new
//! frame, and moved back when the frame pops.

use crate::stack::ValueStack;
use crate::value::Value;

/// A suspended caller on the call stack.
#[derive(Debug)]
pub struct CallFrame {
    /// Where execution resumes when this frame pops.
    pub return_offset: i32,

    /// The caller's operand stack.
    pub stack: ValueStack,

    /// The caller's local slots.
    pub locals: Vec<Value>,

    /// How many of the caller's leading locals are flag-backed.
    pub flag_count: usize,
}
