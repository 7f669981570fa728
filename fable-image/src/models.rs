// fable-image - Data model records
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Scene, function and definition records parsed from an image.

/// A named, linearly-entered dialogue routine with flag-backed locals.
#[derive(Debug, Clone)]
pub struct Scene {
    /// Scene name, as it appears in the string table.
    pub name: String,

    /// Entry offset into the instruction buffer, or `-1` if the scene has
    /// no body.
    pub code_offset: i32,

    /// Paired offsets of flag expressions: `[init_expr, name_expr]` per flag.
    pub flag_offsets: Vec<i32>,

    /// Resolved flag names, one per offset pair. Empty strings until flag
    /// initialization evaluates the name expressions.
    pub flag_names: Vec<String>,
}

/// A subroutine callable from bytecode with an argument count.
///
/// Functions share the scene record layout; the name is carried for
/// diagnostics and future lookup by name.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub code_offset: i32,
    pub flag_offsets: Vec<i32>,
    pub flag_names: Vec<String>,
}

/// A named, possibly interpolated string exposed to the host.
#[derive(Debug, Clone, Copy)]
pub struct Definition {
    /// Index of the base string in the string table (internal) or the
    /// translation table (user-visible).
    pub value_string_index: u32,

    /// Offset of the interpolation expression bytecode, or `-1` for a pure
    /// string definition.
    pub code_offset: i32,

    /// Whether the base string comes from the internal string table rather
    /// than the translation table.
    pub is_internal: bool,
}
