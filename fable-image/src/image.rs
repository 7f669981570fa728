// fable-image - Compiled image loading
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The [`Image`] type: everything a compiled dialogue binary contains.
//!
//! An image holds the string table, optional translation table, instruction
//! buffer and the scene/function/definition metadata tables. Images are
//! loaded once and then only mutated in narrow ways: a translation-file load
//! replaces the translation table, and flag initialization fills in resolved
//! flag names. A monotonically increasing `cache_id` marks the current
//! translation generation so that cached definition values can notice a
//! swap.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::error::{LoadError, Result};
use crate::models::{Definition, Function, Scene};
use crate::reader::{BinaryReader, FileReader, SpanReader};

/// Magic number of a compiled dialogue image.
pub const IMAGE_MAGIC: &[u8; 3] = b"DNX";

/// Magic number of a standalone translation file.
pub const TRANSLATION_MAGIC: &[u8; 3] = b"DXT";

/// Image format version this runtime understands.
pub const FORMAT_VERSION: u8 = 4;

/// Translation file format version this runtime understands.
pub const TRANSLATION_FORMAT_VERSION: u8 = 0;

const FLAG_COMPRESSED: u8 = 1;
const FLAG_INTERNAL_TRANSLATION: u8 = 1 << 1;

/// A loaded dialogue image.
pub struct Image {
    cache_id: u64,
    strings: Vec<String>,
    translations: Vec<String>,
    original_text: Option<Vec<String>>,
    instructions: Vec<u8>,
    scenes: Vec<Scene>,
    scene_index: HashMap<String, usize>,
    functions: Vec<Function>,
    definitions: HashMap<String, Definition>,
}

impl Image {
    /// Load an image from a file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Image> {
        let mut reader = FileReader::open(path)?;
        Self::load(&mut reader)
    }

    /// Load an image from an in-memory byte buffer.
    pub fn from_bytes(data: &[u8]) -> Result<Image> {
        let mut reader = SpanReader::new(data);
        Self::load(&mut reader)
    }

    fn load<R: BinaryReader>(reader: &mut R) -> Result<Image> {
        let mut magic = [0u8; 3];
        reader.read_exact(&mut magic)?;
        if &magic != IMAGE_MAGIC {
            return Err(LoadError::NotAnImage);
        }

        let version = reader.read_u8()?;
        if version != FORMAT_VERSION {
            return Err(LoadError::UnsupportedVersion {
                expected: FORMAT_VERSION,
                found: version,
            });
        }

        let flags = reader.read_u8()?;
        let has_translations = flags & FLAG_INTERNAL_TRANSLATION != 0;

        if flags & FLAG_COMPRESSED != 0 {
            let decompressed_size = reader.read_u32()? as usize;
            let compressed_size = reader.read_u32()? as usize;
            let mut compressed = vec![0u8; compressed_size];
            reader.read_exact(&mut compressed)?;

            let mut inflated = Vec::with_capacity(decompressed_size);
            flate2::read::ZlibDecoder::new(compressed.as_slice())
                .read_to_end(&mut inflated)
                .map_err(|_| LoadError::DecompressionFailed)?;
            if inflated.len() != decompressed_size {
                return Err(LoadError::DecompressionFailed);
            }

            let mut inner = SpanReader::new(&inflated);
            Self::parse_body(&mut inner, has_translations)
        } else {
            // The decompressed-size field is present but meaningless when
            // the payload is stored raw.
            reader.skip(4)?;
            Self::parse_body(reader, has_translations)
        }
    }

    fn parse_body<R: BinaryReader>(reader: &mut R, has_translations: bool) -> Result<Image> {
        let scene_block = reader.read_block()?;
        let func_block = reader.read_block()?;
        let def_block = reader.read_block()?;
        let instructions = reader.read_block()?;

        // String table: entries are parsed in place, so the block size
        // prefix is redundant.
        reader.skip(4)?;
        let string_count = reader.read_u32()? as usize;
        let mut strings = Vec::with_capacity(string_count);
        for _ in 0..string_count {
            strings.push(reader.read_string()?);
        }

        let mut translations = Vec::new();
        if has_translations {
            reader.skip(4)?;
            let translation_count = reader.read_u32()? as usize;
            translations.reserve(translation_count);
            for _ in 0..translation_count {
                translations.push(reader.read_string()?);
            }
        }

        // Reserved external-function block; unused by the runtime.
        let _ = reader.read_block()?;

        let (scenes, scene_index) = Self::parse_scenes(&scene_block, &strings)?;
        let functions = Self::parse_functions(&func_block, &strings)?;
        let definitions = Self::parse_definitions(&def_block, &strings)?;

        debug!(
            scenes = scenes.len(),
            functions = functions.len(),
            definitions = definitions.len(),
            strings = strings.len(),
            translations = translations.len(),
            code_bytes = instructions.len(),
            "image loaded"
        );

        Ok(Image {
            cache_id: 1,
            strings,
            translations,
            original_text: None,
            instructions,
            scenes,
            scene_index,
            functions,
            definitions,
        })
    }

    fn parse_scenes(block: &[u8], strings: &[String]) -> Result<(Vec<Scene>, HashMap<String, usize>)> {
        let mut reader = SpanReader::new(block);
        let count = reader.read_u32()? as usize;
        let mut scenes = Vec::with_capacity(count);
        let mut index = HashMap::with_capacity(count);
        for _ in 0..count {
            let (name, code_offset, flag_offsets, flag_names) =
                Self::parse_routine_entry(&mut reader, strings)?;
            index.insert(name.clone(), scenes.len());
            scenes.push(Scene {
                name,
                code_offset,
                flag_offsets,
                flag_names,
            });
        }
        Ok((scenes, index))
    }

    fn parse_functions(block: &[u8], strings: &[String]) -> Result<Vec<Function>> {
        let mut reader = SpanReader::new(block);
        let count = reader.read_u32()? as usize;
        let mut functions = Vec::with_capacity(count);
        for _ in 0..count {
            let (name, code_offset, flag_offsets, flag_names) =
                Self::parse_routine_entry(&mut reader, strings)?;
            functions.push(Function {
                name,
                code_offset,
                flag_offsets,
                flag_names,
            });
        }
        Ok(functions)
    }

    /// Scene and function entries share one layout: a name index, a raw
    /// flag count (one greater than the number of flag expression offsets),
    /// the code offset, then the offsets themselves. Flag names start empty
    /// and are resolved by flag initialization.
    fn parse_routine_entry<R: BinaryReader>(
        reader: &mut R,
        strings: &[String],
    ) -> Result<(String, i32, Vec<i32>, Vec<String>)> {
        let name_idx = reader.read_u32()? as usize;
        let name = strings
            .get(name_idx)
            .cloned()
            .ok_or(LoadError::BinaryTruncated)?;
        let flag_count = reader.read_u16()? as i32 - 1;
        let code_offset = reader.read_i32()?;
        let mut flag_offsets = Vec::new();
        let mut flag_names = Vec::new();
        if flag_count > 0 {
            flag_offsets.reserve(flag_count as usize);
            for _ in 0..flag_count {
                flag_offsets.push(reader.read_i32()?);
            }
            flag_names = vec![String::new(); flag_count as usize / 2];
        }
        Ok((name, code_offset, flag_offsets, flag_names))
    }

    fn parse_definitions(block: &[u8], strings: &[String]) -> Result<HashMap<String, Definition>> {
        let mut reader = SpanReader::new(block);
        let count = reader.read_u32()? as usize;
        let mut definitions = HashMap::with_capacity(count);
        for _ in 0..count {
            let name_idx = reader.read_u32()? as usize;
            let name = strings
                .get(name_idx)
                .cloned()
                .ok_or(LoadError::BinaryTruncated)?;
            let mut value_string_index = reader.read_u32()?;
            let code_offset = reader.read_i32()?;

            // The high bit of the value index marks an internal (untranslated)
            // definition.
            let is_internal = value_string_index & (1 << 31) != 0;
            value_string_index &= !(1 << 31);

            definitions.insert(
                name,
                Definition {
                    value_string_index,
                    code_offset,
                    is_internal,
                },
            );
        }
        Ok(definitions)
    }

    /// Replace the translation table from a standalone translation file.
    ///
    /// The built-in translations are preserved as the original text on the
    /// first swap. Bumps the cache id so cached definition values recompute.
    pub fn load_translation_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let mut reader = FileReader::open(path)?;
        self.load_translations(&mut reader)
    }

    /// As [`Image::load_translation_file`], from an in-memory buffer.
    pub fn load_translation_bytes(&mut self, data: &[u8]) -> Result<()> {
        let mut reader = SpanReader::new(data);
        self.load_translations(&mut reader)
    }

    fn load_translations<R: BinaryReader>(&mut self, reader: &mut R) -> Result<()> {
        let mut magic = [0u8; 3];
        reader.read_exact(&mut magic)?;
        if &magic != TRANSLATION_MAGIC {
            return Err(LoadError::NotAnImage);
        }

        let version = reader.read_u8()?;
        if version != TRANSLATION_FORMAT_VERSION {
            return Err(LoadError::UnsupportedVersion {
                expected: TRANSLATION_FORMAT_VERSION,
                found: version,
            });
        }

        let count = reader.read_u32()? as usize;
        if !self.translations.is_empty() && count != self.translations.len() {
            return Err(LoadError::TranslationMismatch {
                expected: self.translations.len(),
                found: count,
            });
        }

        let mut fresh = Vec::with_capacity(count);
        for _ in 0..count {
            fresh.push(reader.read_string()?);
        }

        if self.original_text.is_none() {
            self.original_text = Some(std::mem::take(&mut self.translations));
        }
        self.translations = fresh;
        self.cache_id += 1;

        debug!(count, cache_id = self.cache_id, "translation table replaced");
        Ok(())
    }

    /// Current translation generation. Increments on every load that touches
    /// the translation table.
    pub fn cache_id(&self) -> u64 {
        self.cache_id
    }

    /// Look up an internal string by table index.
    pub fn string(&self, idx: u32) -> Option<&str> {
        self.strings.get(idx as usize).map(String::as_str)
    }

    /// Look up a translated string by table index.
    pub fn translation(&self, idx: u32) -> Option<&str> {
        self.translations.get(idx as usize).map(String::as_str)
    }

    /// The full internal string table.
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// The full translation table.
    pub fn translations(&self) -> &[String] {
        &self.translations
    }

    /// The built-in translations preserved by the first translation swap,
    /// if a swap has happened.
    pub fn original_text(&self) -> Option<&[String]> {
        self.original_text.as_deref()
    }

    /// The bytecode buffer.
    pub fn instructions(&self) -> &[u8] {
        &self.instructions
    }

    /// Look up a scene by name.
    pub fn scene(&self, name: &str) -> Option<&Scene> {
        self.scene_index.get(name).map(|&i| &self.scenes[i])
    }

    /// All scenes, in image order.
    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    /// Mutable access to all scenes, for flag-name resolution.
    pub fn scenes_mut(&mut self) -> &mut [Scene] {
        &mut self.scenes
    }

    /// Look up a function by id.
    pub fn function(&self, idx: u32) -> Option<&Function> {
        self.functions.get(idx as usize)
    }

    /// All functions, in id order.
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Mutable access to all functions, for flag-name resolution.
    pub fn functions_mut(&mut self) -> &mut [Function] {
        &mut self.functions
    }

    /// Look up a definition by name.
    pub fn definition(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(name)
    }

    /// All definition names known to the image.
    pub fn definition_names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }
}
