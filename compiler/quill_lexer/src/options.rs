//! Per-lexer options.

/// Options controlling a single lexer instance.
///
/// `require_newdecls` is mutable at runtime (`#pragma newdecls`) and is
/// inherited by lexers created for included files; changes made inside an
/// include do not propagate back to the parent.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LexerOptions {
    /// Report front/tail comment blocks through the preprocessor. When off,
    /// comments are consumed silently.
    pub trace_comments: bool,
    /// Whether new-style declarations are required in this file.
    pub require_newdecls: bool,
}
