//! The lexer proper: cursor policy, operator dispatch, and the `next()`
//! entry point.
//!
//! One `Lexer` is bound to one source buffer for its whole life. The scanner
//! and the preprocessor are deliberately entangled: directives are
//! recognized mid-scan, conditional skipping re-enters the scanner in a
//! restricted mode, and macro expansion surfaces as a `None` token that
//! tells the caller to loop. The directive machinery lives in
//! [`directives`](crate::directives), literal scanning in
//! [`numbers`](crate::numbers) and [`literals`](crate::literals), and
//! comment attribution in [`comments`](crate::comments); this module owns
//! the state they all share.

use std::sync::Arc;

use quill_ir::{CompileContext, DiagKind, NoteKind, Token, TokenKind, TokenPos};
use quill_lexer_core::{Cursor, SourceBuffer};

use crate::directives::IfFrame;
use crate::hooks::PreprocessorHooks;
use crate::LexerOptions;

// Byte classification. The language is 7-bit ASCII; everything else is an
// unexpected character.

#[inline]
pub(crate) fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

#[inline]
pub(crate) fn is_hex_digit(c: u8) -> bool {
    c.is_ascii_hexdigit()
}

/// NUL terminates a line the same way a real line break does.
#[inline]
pub(crate) fn is_line_terminator(c: u8) -> bool {
    matches!(c, b'\n' | b'\r' | 0)
}

#[inline]
pub(crate) fn is_skip_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\x0C')
}

#[inline]
pub(crate) fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

#[inline]
pub(crate) fn is_ident_char(c: u8) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

#[inline]
pub(crate) fn hex_digit_value(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        _ => c - b'A' + 10,
    }
}

/// Lexer for one source buffer.
///
/// Produces one token per [`next()`](Lexer::next) call, interleaving
/// preprocessor work through the [`PreprocessorHooks`] the caller supplies.
pub struct Lexer<'ctx> {
    pub(crate) cc: &'ctx CompileContext,
    pub(crate) options: LexerOptions,
    pub(crate) cursor: Cursor,
    /// Scratch for literal contents and directive spellings, reused across
    /// tokens.
    pub(crate) literal: Vec<u8>,
    /// 1-based current line.
    pub(crate) line_number: u32,
    /// Line terminators become explicit `Eol` tokens instead of being
    /// swallowed.
    pub(crate) lexing_for_directive: bool,
    /// Diagnostics from the lexer itself are dropped.
    pub(crate) suppress_errors: bool,
    /// Whether any non-comment, non-directive token has been produced since
    /// the last line break. A line-first `#` starts a directive exactly when
    /// this is false.
    pub(crate) lexed_tokens_on_line: bool,
    pub(crate) ifstack: Vec<IfFrame>,
}

impl<'ctx> Lexer<'ctx> {
    /// Create a lexer over `buffer`.
    pub fn new(cc: &'ctx CompileContext, options: LexerOptions, buffer: &Arc<SourceBuffer>) -> Self {
        Lexer {
            cc,
            options,
            cursor: buffer.cursor(),
            literal: Vec::new(),
            line_number: 1,
            lexing_for_directive: false,
            suppress_errors: false,
            lexed_tokens_on_line: false,
            ifstack: Vec::new(),
        }
    }

    /// The buffer this lexer reads from.
    pub fn buffer(&self) -> &SourceBuffer {
        self.cursor.buffer()
    }

    /// Current options (a copy; `require_newdecls` may have been changed by
    /// `#pragma newdecls`).
    pub fn options(&self) -> LexerOptions {
        self.options
    }

    /// Current 1-based line number.
    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    /// Whether the cursor sits at the end of the buffer.
    pub(crate) fn at_buffer_end(&self) -> bool {
        self.cursor.at_end()
    }

    // ─── Positions and reporting ─────────────────────────────────────────

    #[inline]
    pub(crate) fn here(&self) -> TokenPos {
        TokenPos::new(self.cursor.pos(), self.line_number)
    }

    /// Position of the most recently consumed byte.
    #[inline]
    pub(crate) fn prev_pos(&self) -> TokenPos {
        TokenPos::new(self.cursor.pos().saturating_sub(1), self.line_number)
    }

    /// Report a diagnostic unless errors are suppressed.
    pub(crate) fn report(&self, loc: TokenPos, kind: DiagKind) {
        if self.suppress_errors {
            return;
        }
        self.cc.report(loc, kind);
    }

    /// Report a diagnostic with a note unless errors are suppressed.
    pub(crate) fn report_with_note(
        &self,
        loc: TokenPos,
        kind: DiagKind,
        note_loc: TokenPos,
        note: NoteKind,
    ) {
        if self.suppress_errors {
            return;
        }
        self.cc.report_with_note(loc, kind, note_loc, note);
    }

    // ─── Character reads ─────────────────────────────────────────────────

    /// Read and consume one byte; `0` (unconsumed) at end of input.
    #[inline]
    pub(crate) fn read_char(&mut self) -> u8 {
        self.cursor.bump()
    }

    /// Consume the next byte if it equals `c`.
    #[inline]
    pub(crate) fn match_char(&mut self, c: u8) -> bool {
        if self.cursor.current() == c && c != 0 {
            self.cursor.advance();
            true
        } else {
            false
        }
    }

    /// Undo the consumption of `c`, if it was actually consumed.
    ///
    /// `read_char` does not move at end of input, so backing up after
    /// reading `0` must not move either.
    #[inline]
    pub(crate) fn retreat_if_consumed(&mut self, c: u8) {
        if c != 0 {
            self.cursor.retreat();
        }
    }

    /// Account for a just-consumed line break `c`, folding CRLF into one.
    pub(crate) fn advance_line(&mut self, c: u8) {
        debug_assert!(c == b'\r' || c == b'\n');
        if c == b'\r' && self.cursor.current() == b'\n' {
            self.cursor.advance();
        }
        self.line_number += 1;
        self.lexed_tokens_on_line = false;
    }

    /// Skip horizontal whitespace (space, tab, form feed).
    #[inline]
    pub(crate) fn skip_spaces(&mut self) {
        self.cursor.eat_while(is_skip_space);
    }

    /// Read and consume bytes until the first non-horizontal-whitespace
    /// byte, returning it. Returns `0` (unconsumed) at end of input.
    pub(crate) fn first_non_space_char(&mut self) -> u8 {
        loop {
            let c = self.read_char();
            if !is_skip_space(c) {
                return c;
            }
        }
    }

    /// Consume whitespace until something scannable is under the cursor.
    ///
    /// Outside a directive this swallows line breaks and advances the line
    /// counter. Inside a directive a line break is left in place so the
    /// scanner can emit an `Eol` token for it.
    fn consume_whitespace(&mut self) {
        loop {
            match self.cursor.current() {
                b' ' | b'\t' | b'\x0C' => self.cursor.advance(),
                c @ (b'\r' | b'\n') => {
                    if self.lexing_for_directive {
                        return;
                    }
                    self.cursor.advance();
                    self.advance_line(c);
                }
                _ => return,
            }
        }
    }

    // ─── Scoped flags ────────────────────────────────────────────────────
    //
    // The save-and-restore discipline for these flags must survive every
    // exit path out of the directive machinery, so the flips are confined
    // to these two helpers rather than scattered through the handlers.

    pub(crate) fn with_directive_lexing<R>(
        &mut self,
        pp: &mut dyn PreprocessorHooks,
        f: impl FnOnce(&mut Self, &mut dyn PreprocessorHooks) -> R,
    ) -> R {
        let saved = std::mem::replace(&mut self.lexing_for_directive, true);
        let result = f(self, pp);
        self.lexing_for_directive = saved;
        result
    }

    pub(crate) fn with_suppressed_errors<R>(
        &mut self,
        pp: &mut dyn PreprocessorHooks,
        f: impl FnOnce(&mut Self, &mut dyn PreprocessorHooks) -> R,
    ) -> R {
        let saved = std::mem::replace(&mut self.suppress_errors, true);
        let result = f(self, pp);
        self.suppress_errors = saved;
        result
    }

    // ─── Scanning ────────────────────────────────────────────────────────

    /// Consume one byte and produce `kind`.
    #[inline]
    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.cursor.advance();
        kind
    }

    /// Scan one raw token. Comments come out as `Comment` tokens; `next()`
    /// layers attribution on top.
    pub(crate) fn scan(&mut self, pp: &mut dyn PreprocessorHooks) -> Token {
        self.consume_whitespace();

        // Directives are only recognized as the first token on a line, and
        // never while we are already inside one (`lexed_tokens_on_line` is
        // forced on for the duration of a directive).
        if self.cursor.current() == b'#' && !self.lexed_tokens_on_line {
            let start = self.here();
            self.enter_preprocessor_directive(pp);
            return Token::new(TokenKind::None, start, self.here());
        }

        let start = self.here();
        let kind = match self.cursor.current() {
            0 => {
                if self.lexing_for_directive {
                    TokenKind::Eol
                } else if pp.handle_end_of_file() {
                    TokenKind::None
                } else {
                    TokenKind::Eof
                }
            }

            // Only reachable in directive mode; consume_whitespace stops at
            // line breaks there. The break stays put for the owner.
            b'\r' | b'\n' => {
                debug_assert!(self.lexing_for_directive);
                TokenKind::Eol
            }

            b';' => self.single(TokenKind::Semicolon),
            b'{' => self.single(TokenKind::LBrace),
            b'}' => self.single(TokenKind::RBrace),
            b'(' => self.single(TokenKind::LParen),
            b')' => self.single(TokenKind::RParen),
            b'[' => self.single(TokenKind::LBracket),
            b']' => self.single(TokenKind::RBracket),
            b'~' => self.single(TokenKind::Tilde),
            b'?' => self.single(TokenKind::Question),
            b':' => self.single(TokenKind::Colon),
            b',' => self.single(TokenKind::Comma),

            b'.' => {
                self.cursor.advance();
                if self.cursor.current() == b'.' && self.cursor.peek() == b'.' {
                    self.cursor.advance();
                    self.cursor.advance();
                    TokenKind::Ellipsis
                } else {
                    TokenKind::Dot
                }
            }

            b'/' => {
                self.cursor.advance();
                match self.cursor.current() {
                    b'=' => self.single(TokenKind::SlashEq),
                    b'/' => {
                        self.cursor.advance();
                        self.line_comment()
                    }
                    b'*' => {
                        self.cursor.advance();
                        self.block_comment(start)
                    }
                    _ => TokenKind::Slash,
                }
            }

            b'*' => {
                self.cursor.advance();
                if self.match_char(b'=') {
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                }
            }

            b'+' => {
                self.cursor.advance();
                if self.match_char(b'=') {
                    TokenKind::PlusEq
                } else if self.match_char(b'+') {
                    TokenKind::PlusPlus
                } else {
                    TokenKind::Plus
                }
            }

            b'&' => {
                self.cursor.advance();
                if self.match_char(b'=') {
                    TokenKind::AmpEq
                } else if self.match_char(b'&') {
                    TokenKind::AmpAmp
                } else {
                    TokenKind::Amp
                }
            }

            b'|' => {
                self.cursor.advance();
                if self.match_char(b'=') {
                    TokenKind::PipeEq
                } else if self.match_char(b'|') {
                    TokenKind::PipePipe
                } else {
                    TokenKind::Pipe
                }
            }

            b'^' => {
                self.cursor.advance();
                if self.match_char(b'=') {
                    TokenKind::CaretEq
                } else {
                    TokenKind::Caret
                }
            }

            b'%' => {
                self.cursor.advance();
                if self.match_char(b'=') {
                    TokenKind::PercentEq
                } else {
                    TokenKind::Percent
                }
            }

            b'-' => {
                self.cursor.advance();
                if self.match_char(b'=') {
                    TokenKind::MinusEq
                } else if self.match_char(b'-') {
                    TokenKind::MinusMinus
                } else {
                    TokenKind::Minus
                }
            }

            b'!' => {
                self.cursor.advance();
                if self.match_char(b'=') {
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }

            b'=' => {
                self.cursor.advance();
                if self.match_char(b'=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Eq
                }
            }

            b'<' => {
                self.cursor.advance();
                if self.match_char(b'=') {
                    TokenKind::LtEq
                } else if self.match_char(b'<') {
                    if self.match_char(b'=') {
                        TokenKind::ShlEq
                    } else {
                        TokenKind::Shl
                    }
                } else {
                    TokenKind::Lt
                }
            }

            b'>' => {
                self.cursor.advance();
                if self.match_char(b'=') {
                    TokenKind::GtEq
                } else if self.match_char(b'>') {
                    if self.match_char(b'>') {
                        if self.match_char(b'=') {
                            TokenKind::UshrEq
                        } else {
                            TokenKind::Ushr
                        }
                    } else {
                        TokenKind::Shr
                    }
                } else {
                    TokenKind::Gt
                }
            }

            b'\'' => {
                self.cursor.advance();
                self.scan_char_literal(start)
            }

            b'"' => {
                self.cursor.advance();
                self.scan_string_literal(start)
            }

            b'0'..=b'9' => self.scan_number(start),

            c if is_ident_start(c) => self.scan_identifier(pp, start),

            c => {
                self.cursor.advance();
                // In directive mode the enclosing handler decides whether a
                // malformed token is worth complaining about.
                if !self.lexing_for_directive {
                    self.report(start, DiagKind::UnexpectedChar { ch: c });
                }
                TokenKind::Unknown
            }
        };

        Token::new(kind, start, self.here())
    }

    /// `//` comment: runs to (not including) the line terminator.
    fn line_comment(&mut self) -> TokenKind {
        self.cursor.eat_to_line_terminator();
        TokenKind::Comment
    }

    /// `/*` comment: runs to `*/`, advancing lines as it crosses them.
    fn block_comment(&mut self, start: TokenPos) -> TokenKind {
        loop {
            let c = self.read_char();
            match c {
                0 => {
                    self.report(start, DiagKind::UnterminatedComment);
                    break;
                }
                b'\r' | b'\n' => self.advance_line(c),
                b'*' => {
                    if self.match_char(b'/') {
                        break;
                    }
                }
                _ => {}
            }
        }
        TokenKind::Comment
    }

    /// Identifier, label, or macro re-entry.
    fn scan_identifier(&mut self, pp: &mut dyn PreprocessorHooks, start: TokenPos) -> TokenKind {
        let begin = self.cursor.pos();
        self.cursor.eat_while(is_ident_char);
        let atom = {
            let spelling = self.cursor.slice(begin, self.cursor.pos());
            self.cc.intern(spelling)
        };

        // Lookahead into directives never expands macros, which makes it
        // safe to expand eagerly here: no caller will want the raw name
        // back once expansion has been entered.
        if pp.macro_expansion() && pp.enter_macro(start, atom) {
            // Even an empty expansion counts as a token on this line.
            self.lexed_tokens_on_line = true;
            return TokenKind::None;
        }

        if let Some(kind) = pp.find_keyword(atom) {
            return kind;
        }

        if self.match_char(b':') {
            return TokenKind::Label(atom);
        }
        TokenKind::Ident(atom)
    }

    /// Read the directive name at a line-leading `#`, folding the `#` into
    /// the looked-up spelling.
    pub(crate) fn directive_keyword(&mut self, pp: &mut dyn PreprocessorHooks) -> Option<TokenKind> {
        debug_assert_eq!(self.cursor.current(), b'#');
        self.literal.clear();
        self.literal.push(b'#');
        self.cursor.advance();

        let begin = self.cursor.pos();
        self.cursor.eat_while(is_ident_char);
        let end = self.cursor.pos();
        self.literal.extend_from_slice(self.cursor.slice(begin, end));

        let atom = self.cc.intern(&self.literal);
        pp.find_keyword(atom)
    }

    // ─── Entry points ────────────────────────────────────────────────────

    /// Produce the next token.
    ///
    /// Returns `None` when the caller should simply loop (a directive was
    /// processed, or a macro expansion was entered), `Eol` only while lexing
    /// for a directive, and `Eof` forever once the buffer is exhausted.
    pub fn next(&mut self, pp: &mut dyn PreprocessorHooks) -> Token {
        let mut tok = self.scan(pp);
        if tok.kind == TokenKind::Comment {
            self.handle_comments(pp, &mut tok);
            debug_assert!(tok.kind != TokenKind::Comment);
        }

        self.lexed_tokens_on_line = tok.kind != TokenKind::None;
        tok
    }

    /// Lex one token while inside a preprocessor directive. Comments are
    /// dropped entirely in this mode.
    pub(crate) fn directive_next(&mut self, pp: &mut dyn PreprocessorHooks) -> Token {
        debug_assert!(self.lexing_for_directive);
        loop {
            let tok = self.scan(pp);
            if tok.kind != TokenKind::Comment {
                return tok;
            }
        }
    }
}
