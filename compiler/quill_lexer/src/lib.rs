//! Lexer with integrated preprocessor for the Quill scripting language.
//!
//! Source text goes in as bytes; what comes out of [`Preprocessor::next`]
//! is the fully preprocessed token stream: conditional-compilation
//! directives evaluated, object-like macros expanded, `#include`s spliced
//! in, and comment blocks attributed to the tokens around them.
//!
//! Three concerns share a single pass through the buffer:
//!
//! 1. **Tokenization** - numbers (integer, hex, float with exponent),
//!    character and string literals with escape decoding, identifiers and
//!    labels, multi-character operators, punctuation.
//! 2. **Preprocessing** - `#`-directives recognized at line starts,
//!    `#if`/`#else`/`#endif` regions skipped by re-entering the lexer in a
//!    restricted mode, `#define` bodies captured as token lists,
//!    `#include` switching buffers through the driving preprocessor.
//! 3. **Comment attribution** - front and tail comment blocks collected by
//!    lookahead that never expands macros.
//!
//! # Layers
//!
//! [`Lexer`] produces one token per call against a [`PreprocessorHooks`]
//! implementation; it owns the cursor, the line accounting, and the
//! conditional-compilation stack, but no macro state. [`Preprocessor`]
//! owns a stack of lexers plus the hook state and is the intended entry
//! point:
//!
//! ```
//! use std::sync::Arc;
//! use quill_ir::{CompileContext, TokenKind};
//! use quill_lexer::{LexerOptions, Preprocessor};
//! use quill_lexer_core::SourceBuffer;
//!
//! let cc = CompileContext::new();
//! let buffer = Arc::new(SourceBuffer::new("#define GREETING \"hi\"\nGREETING"));
//! let mut pp = Preprocessor::new(&cc, LexerOptions::default(), &buffer);
//!
//! let tok = pp.next();
//! assert!(matches!(tok.kind, TokenKind::StrLiteral(_)));
//! assert_eq!(pp.next().kind, TokenKind::Eof);
//! ```

mod comments;
mod directives;
mod eval;
mod hooks;
mod keywords;
mod lexer;
mod literals;
mod numbers;
mod options;
mod preprocessor;

pub use eval::{EvalError, EvalErrorKind};
pub use hooks::PreprocessorHooks;
pub use lexer::Lexer;
pub use options::LexerOptions;
pub use preprocessor::{
    Macro, MacroTable, MapResolver, Preprocessor, PreprocessorState, SourceResolver,
};
