// fable-image - Binary image writer
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Serialization of image data back to the binary format.
//!
//! The runtime itself only reads images, but tools and tests need to
//! assemble them: the writer produces bytes that [`crate::Image`] loads
//! back unchanged.

use std::io::Write;

use crate::image::{FORMAT_VERSION, IMAGE_MAGIC, TRANSLATION_FORMAT_VERSION, TRANSLATION_MAGIC};

/// One scene or function entry to be serialized.
#[derive(Debug, Clone)]
struct RoutineEntry {
    name_idx: u32,
    code_offset: i32,
    flag_offsets: Vec<i32>,
}

/// One definition entry to be serialized.
#[derive(Debug, Clone)]
struct DefinitionEntry {
    name_idx: u32,
    value_string_index: u32,
    code_offset: i32,
    is_internal: bool,
}

/// Builder that assembles a compiled image byte-for-byte.
#[derive(Default)]
pub struct ImageWriter {
    strings: Vec<String>,
    translations: Vec<String>,
    has_translations: bool,
    instructions: Vec<u8>,
    scenes: Vec<RoutineEntry>,
    functions: Vec<RoutineEntry>,
    definitions: Vec<DefinitionEntry>,
    compress: bool,
}

impl ImageWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a string to the internal table, returning its index.
    pub fn add_string(&mut self, s: impl Into<String>) -> u32 {
        self.strings.push(s.into());
        (self.strings.len() - 1) as u32
    }

    /// Append a string to the translation table, returning its index.
    /// Adding any translation marks the image as carrying one.
    pub fn add_translation(&mut self, s: impl Into<String>) -> u32 {
        self.has_translations = true;
        self.translations.push(s.into());
        (self.translations.len() - 1) as u32
    }

    /// Set the instruction buffer.
    pub fn set_instructions(&mut self, code: Vec<u8>) {
        self.instructions = code;
    }

    /// Add a scene entry. `name_idx` must refer to the string table.
    pub fn add_scene(&mut self, name_idx: u32, code_offset: i32, flag_offsets: Vec<i32>) {
        self.scenes.push(RoutineEntry {
            name_idx,
            code_offset,
            flag_offsets,
        });
    }

    /// Add a function entry.
    pub fn add_function(&mut self, name_idx: u32, code_offset: i32, flag_offsets: Vec<i32>) {
        self.functions.push(RoutineEntry {
            name_idx,
            code_offset,
            flag_offsets,
        });
    }

    /// Add a definition entry.
    pub fn add_definition(
        &mut self,
        name_idx: u32,
        value_string_index: u32,
        code_offset: i32,
        is_internal: bool,
    ) {
        self.definitions.push(DefinitionEntry {
            name_idx,
            value_string_index,
            code_offset,
            is_internal,
        });
    }

    /// Store the payload zlib-compressed.
    pub fn compress(&mut self, compress: bool) {
        self.compress = compress;
    }

    /// Serialize to the binary image format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let body = self.body_bytes();

        let mut out = Vec::with_capacity(body.len() + 16);
        out.extend_from_slice(IMAGE_MAGIC);
        out.push(FORMAT_VERSION);

        let mut flags = 0u8;
        if self.compress {
            flags |= 1;
        }
        if self.has_translations {
            flags |= 1 << 1;
        }
        out.push(flags);

        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        if self.compress {
            let mut encoder =
                flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder
                .write_all(&body)
                .expect("writing to an in-memory encoder cannot fail");
            let compressed = encoder
                .finish()
                .expect("finishing an in-memory encoder cannot fail");
            out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
            out.extend_from_slice(&compressed);
        } else {
            out.extend_from_slice(&body);
        }
        out
    }

    fn body_bytes(&self) -> Vec<u8> {
        let mut body = Vec::new();

        write_block(&mut body, &routine_block(&self.scenes));
        write_block(&mut body, &routine_block(&self.functions));
        write_block(&mut body, &definition_block(&self.definitions));
        write_block(&mut body, &self.instructions);
        write_block(&mut body, &string_table(&self.strings));
        if self.has_translations {
            write_block(&mut body, &string_table(&self.translations));
        }
        // Reserved external-function block.
        write_block(&mut body, &[]);

        body
    }
}

/// Serialize a standalone translation file.
pub fn translation_file_bytes(strings: &[String]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(TRANSLATION_MAGIC);
    out.push(TRANSLATION_FORMAT_VERSION);
    out.extend_from_slice(&(strings.len() as u32).to_le_bytes());
    for s in strings {
        out.extend_from_slice(s.as_bytes());
        out.push(0);
    }
    out
}

fn write_block(out: &mut Vec<u8>, content: &[u8]) {
    out.extend_from_slice(&(content.len() as u32).to_le_bytes());
    out.extend_from_slice(content);
}

fn routine_block(entries: &[RoutineEntry]) -> Vec<u8> {
    let mut block = Vec::new();
    block.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for entry in entries {
        block.extend_from_slice(&entry.name_idx.to_le_bytes());
        block.extend_from_slice(&((entry.flag_offsets.len() as u16 + 1).to_le_bytes()));
        block.extend_from_slice(&entry.code_offset.to_le_bytes());
        for offset in &entry.flag_offsets {
            block.extend_from_slice(&offset.to_le_bytes());
        }
    }
    block
}

fn definition_block(entries: &[DefinitionEntry]) -> Vec<u8> {
    let mut block = Vec::new();
    block.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for entry in entries {
        let mut value = entry.value_string_index;
        if entry.is_internal {
            value |= 1 << 31;
        }
        block.extend_from_slice(&entry.name_idx.to_le_bytes());
        block.extend_from_slice(&value.to_le_bytes());
        block.extend_from_slice(&entry.code_offset.to_le_bytes());
    }
    block
}

fn string_table(strings: &[String]) -> Vec<u8> {
    let mut block = Vec::new();
    block.extend_from_slice(&(strings.len() as u32).to_le_bytes());
    for s in strings {
        block.extend_from_slice(s.as_bytes());
        block.push(0);
    }
    block
}
