//! Raw scanning substrate for the Quill lexer.
//!
//! This crate provides the two lowest-level pieces of the front-end, with
//! zero dependencies on the rest of the compiler:
//!
//! - [`SourceBuffer`]: an immutable, sentinel-terminated byte buffer with an
//!   optional file path. The `0x00` sentinel lets scanners detect end of
//!   input without bounds checks.
//! - [`Cursor`]: a byte cursor over a shared buffer handle, with the
//!   memchr-accelerated skip operations the lexer's hot paths use.
//!
//! Line tracking, token classification, interning, and diagnostics all live
//! upstream in `quill_lexer`; this crate only knows about bytes.

mod cursor;
mod source_buffer;

pub use cursor::Cursor;
pub use source_buffer::SourceBuffer;
