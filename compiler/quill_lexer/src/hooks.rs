//! The interface the lexer consumes from its preprocessor.
//!
//! The lexer never owns macro state: it asks these hooks. The shipped
//! implementation is [`PreprocessorState`](crate::PreprocessorState), but
//! anything driving a lexer directly can implement the trait.

use std::path::Path;

use quill_ir::{Atom, CommentPos, Span, Token, TokenKind, TokenPos};

use crate::eval::EvalError;

/// Preprocessor services consumed by [`Lexer`](crate::Lexer).
pub trait PreprocessorHooks {
    /// Resolve an interned spelling to a directive keyword, if it is one.
    fn find_keyword(&self, name: Atom) -> Option<TokenKind>;

    /// Whether macro expansion is currently enabled.
    fn macro_expansion(&self) -> bool;

    /// Enable or disable macro expansion, returning the previous setting so
    /// callers can scope the change.
    fn set_macro_expansion(&mut self, enabled: bool) -> bool;

    /// Try to begin expanding `name`. Returns `true` if expansion was
    /// entered; the lexer then yields a `None` token so the driver can
    /// serve the substituted stream.
    fn enter_macro(&mut self, loc: TokenPos, name: Atom) -> bool;

    /// Register an object-like macro.
    fn define_macro(&mut self, name: Atom, loc: TokenPos, body: Vec<Token>);

    /// Remove a macro; `false` if it was not defined.
    fn remove_macro(&mut self, loc: TokenPos, name: Atom) -> bool;

    /// Evaluate a directive condition over its collected (unexpanded)
    /// tokens. `anchor` locates the directive for error reporting. On
    /// success, returns the value and how many tokens the expression
    /// consumed, so the caller can complain about trailing junk.
    fn eval(&mut self, anchor: TokenPos, tokens: &[Token]) -> Result<(i64, usize), EvalError>;

    /// Hand off an `#include`/`#tryinclude`. `origin` is the including
    /// file's path for quoted includes, absent for bracketed ones.
    fn enter_file(
        &mut self,
        directive: TokenKind,
        loc: TokenPos,
        path: &[u8],
        origin: Option<&Path>,
    );

    /// Record a committed comment block.
    fn add_comment(&mut self, pos: CommentPos, range: Span);

    /// Stash the `#pragma deprecated` message for the next declaration.
    fn set_next_deprecation_message(&mut self, message: &[u8]);

    /// The buffer ran out. Returns `true` when another buffer is active
    /// and the lexer should yield `None` instead of `Eof`.
    fn handle_end_of_file(&mut self) -> bool;
}
