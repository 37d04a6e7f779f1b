//! Extraction of archival/compressed formats: the LZ byte-stream codec and the named-file
//! tree archive every level ships in.

use thiserror::Error;

mod arc;
mod lz;

pub use arc::*;
pub use lz::*;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("expected a valid UTF-8 string at offset {0}")]
    Utf8Error(usize),

    #[error("ran out of data while parsing (wanted {wanted} bytes at offset {offset})")]
    EndOfBuffer { offset: usize, wanted: usize },

    #[error("bad archive magic {0:#010x}")]
    BadMagic(u32),

    #[error("archive node {index} points outside the buffer (offset {offset:#x}, size {size:#x})")]
    BadNode { index: usize, offset: usize, size: usize },

    #[error("encountered multiple files with the same name: {0:?}")]
    DuplicateName(String),

    #[error("compressed payload has unknown tag byte {0:#04x}")]
    UnknownCompressionTag(u8),

    #[error("back-reference at offset {offset} reaches {distance} bytes behind the start of the output")]
    BadBackReference { offset: usize, distance: usize },

    #[error("compressed stream produced {produced} bytes but declared {declared}")]
    BadDeclaredSize { declared: usize, produced: usize },

    #[error("course blob is too short for its block table ({0} bytes)")]
    ShortBlockTable(usize),

    #[error("course block {index} points outside the buffer (offset {offset:#x}, length {length:#x})")]
    BadBlockBounds { index: usize, offset: usize, length: usize },

    #[error("tile recipe at offset {0} has no terminator inside its buffer")]
    UnterminatedRecipe(usize),
}

/// Reads `len` bytes from the given buffer starting at `ptr`, then advances `ptr`.
/// [`ParseError::EndOfBuffer`] is raised if `*ptr + len` exceeds the bounds of the buffer.
#[inline]
pub(crate) fn read<'a>(data: &'a [u8], ptr: &mut usize, len: usize) -> Result<&'a [u8], ParseError> {
    let res = data
        .get(*ptr..*ptr + len)
        .ok_or(ParseError::EndOfBuffer { offset: *ptr, wanted: len })?;
    *ptr += len;
    Ok(res)
}
