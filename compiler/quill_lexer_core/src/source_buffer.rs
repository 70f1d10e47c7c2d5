//! Sentinel-terminated source buffer.
//!
//! The buffer guarantees a `0x00` sentinel byte after the source content,
//! allowing scanners to detect end of input without explicit bounds checks.
//! The allocation is rounded up to a 64-byte boundary with at least one full
//! cache line of zero padding after the sentinel, so `peek()` near the end
//! of the buffer always reads in-bounds zeros.
//!
//! Interior `0x00` bytes in the source are indistinguishable from the
//! sentinel by design: the lexer treats a NUL byte as end of input wherever
//! it appears, matching the language's line-terminator conventions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::Cursor;

/// Cache line size in bytes, used for buffer alignment padding.
const CACHE_LINE: usize = 64;

/// Immutable, sentinel-terminated byte buffer with an optional file path.
///
/// # Layout
///
/// ```text
/// [source_bytes..., 0x00, padding_zeros...]
///  ^                ^     ^
///  0                |     rounded up past the next 64-byte boundary
///              source_len (sentinel)
/// ```
#[derive(Clone, Debug)]
pub struct SourceBuffer {
    /// Owned storage: source bytes, sentinel, zero padding.
    buf: Vec<u8>,
    /// Length of the actual source content.
    source_len: u32,
    /// Path of the file this buffer was read from, if any.
    path: Option<PathBuf>,
}

impl SourceBuffer {
    /// Create a buffer from source bytes, without a path.
    ///
    /// Sources longer than `u32::MAX` bytes are truncated to that length;
    /// positions throughout the front-end are 32-bit.
    pub fn new(source: impl AsRef<[u8]>) -> Self {
        Self::build(source.as_ref(), None)
    }

    /// Create a buffer from source bytes read from `path`.
    pub fn with_path(source: impl AsRef<[u8]>, path: impl Into<PathBuf>) -> Self {
        Self::build(source.as_ref(), Some(path.into()))
    }

    fn build(source: &[u8], path: Option<PathBuf>) -> Self {
        let source_len = source.len().min(u32::MAX as usize);

        // Round up past the next 64-byte boundary, always leaving at least a
        // full cache line of zeros after the sentinel so single-byte peeks
        // never read out of bounds.
        let padded_len = (source_len + 1 + CACHE_LINE) & !(CACHE_LINE - 1);

        let mut buf = vec![0u8; padded_len];
        buf[..source_len].copy_from_slice(&source[..source_len]);

        SourceBuffer {
            buf,
            source_len: source_len as u32,
            path,
        }
    }

    /// The source bytes, without sentinel or padding.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.source_len as usize]
    }

    /// The full storage including sentinel and padding.
    ///
    /// The byte at index [`len()`](Self::len) is the sentinel.
    pub fn as_sentinel_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Length of the source content in bytes.
    pub fn len(&self) -> u32 {
        self.source_len
    }

    /// Whether the source content is empty.
    pub fn is_empty(&self) -> bool {
        self.source_len == 0
    }

    /// The file path this buffer came from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Create a cursor at byte 0 of this buffer.
    pub fn cursor(self: &Arc<Self>) -> Cursor {
        Cursor::new(Arc::clone(self))
    }
}
