// fable-image - Sequential binary readers
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Sequential typed reads over a byte source.
//!
//! Two backends are provided: [`SpanReader`] over an in-memory slice and
//! [`FileReader`] over a buffered file stream. All scalar reads are
//! little-endian and unaligned; strings are NUL-terminated; blocks are
//! `{u32 size, bytes}`. Reading past the end of the source fails with
//! [`LoadError::BinaryTruncated`].

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{LoadError, Result};

/// Sequential reader over a binary source.
pub trait BinaryReader {
    /// Fill `buf` completely from the source, advancing past it.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Advance past `count` bytes without reading them.
    fn skip(&mut self, count: usize) -> Result<()>;

    fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    fn read_f64(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }

    /// Read a NUL-terminated string. Invalid UTF-8 is replaced rather than
    /// rejected; string content is trusted compiler output.
    fn read_string(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        loop {
            let b = self.read_u8()?;
            if b == 0 {
                break;
            }
            bytes.push(b);
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read a length-prefixed block: `u32` size followed by that many bytes.
    fn read_block(&mut self) -> Result<Vec<u8>> {
        let size = self.read_u32()? as usize;
        let mut buf = vec![0u8; size];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Reader over an in-memory byte slice.
pub struct SpanReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SpanReader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Number of bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl BinaryReader for SpanReader<'_> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.remaining() < buf.len() {
            return Err(LoadError::BinaryTruncated);
        }
        buf.copy_from_slice(&self.data[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        Ok(())
    }

    fn skip(&mut self, count: usize) -> Result<()> {
        if self.remaining() < count {
            return Err(LoadError::BinaryTruncated);
        }
        self.pos += count;
        Ok(())
    }
}

/// Reader over a buffered file stream.
pub struct FileReader {
    path: String,
    stream: BufReader<File>,
}

impl FileReader {
    /// Open `path` for sequential binary reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let display = path.as_ref().display().to_string();
        let file = File::open(path.as_ref()).map_err(|e| LoadError::io(display.clone(), e))?;
        Ok(Self {
            path: display,
            stream: BufReader::new(file),
        })
    }

    /// The path this reader was opened from.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl BinaryReader for FileReader {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.stream.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                LoadError::BinaryTruncated
            } else {
                LoadError::io(self.path.clone(), e)
            }
        })
    }

    fn skip(&mut self, count: usize) -> Result<()> {
        self.stream
            .seek(SeekFrom::Current(count as i64))
            .map_err(|e| LoadError::io(self.path.clone(), e))?;
        Ok(())
    }
}
