//! Character and string literals, and the escape decoder they share.

use quill_ir::{DiagKind, TokenKind, TokenPos};

use crate::lexer::{hex_digit_value, is_digit, is_hex_digit, is_line_terminator, Lexer};

impl Lexer<'_> {
    /// Decode one escape code after a consumed `\`.
    ///
    /// Returns `None` for an unknown escape (reported here); callers
    /// substitute `?`. `\x` takes up to two hex digits and `\ddd` any run of
    /// decimal digits folded modulo 256; both optionally swallow a
    /// terminating `;`.
    pub(crate) fn read_escape_code(&mut self) -> Option<u8> {
        let c = self.read_char();
        if c == b'\\' {
            return Some(b'\\');
        }

        match c {
            b'a' => Some(7),
            b'b' => Some(8),
            // \e is non-standard but traditional.
            b'e' => Some(27),
            b'f' => Some(12),
            b'n' => Some(b'\n'),
            b'r' => Some(b'\r'),
            b't' => Some(b'\t'),
            b'v' => Some(11),

            b'x' => {
                let mut value: u8 = 0;
                let mut digits = 0;
                let mut c = self.read_char();
                while is_hex_digit(c) && digits < 2 {
                    value = (value << 4) | hex_digit_value(c);
                    digits += 1;
                    c = self.read_char();
                }
                if c != b';' {
                    self.retreat_if_consumed(c);
                }
                Some(value)
            }

            b'\'' | b'"' | b'%' => Some(c),

            c if is_digit(c) => {
                let mut value: u8 = 0;
                let mut c = c;
                while is_digit(c) {
                    value = value.wrapping_mul(10).wrapping_add(c - b'0');
                    c = self.read_char();
                }
                if c != b';' {
                    self.retreat_if_consumed(c);
                }
                Some(value)
            }

            _ => {
                self.report(self.prev_pos(), DiagKind::UnknownEscapeCode { code: c });
                None
            }
        }
    }

    /// Character literal; the opening `'` has been consumed.
    pub(crate) fn scan_char_literal(&mut self, start: TokenPos) -> TokenKind {
        if self.cursor.current() == b'\'' {
            self.cursor.advance();
            self.report(start, DiagKind::InvalidCharLiteral);
            return TokenKind::Unknown;
        }
        if is_line_terminator(self.cursor.current()) {
            // `'` at end of line; leave the terminator for line accounting.
            self.report(start, DiagKind::BadCharTerminator);
            return TokenKind::Unknown;
        }

        let c = self.read_char();
        let value = if c == b'\\' {
            self.read_escape_code().unwrap_or(b'?')
        } else {
            c
        };

        let closer = self.read_char();
        if closer != b'\'' {
            self.report(start, DiagKind::BadCharTerminator);
            // Something like '5" is probably a typo for '5'; keep the token
            // without backing up. Any other mismatch backs up.
            if closer != b'"' {
                self.retreat_if_consumed(closer);
            }
        }

        TokenKind::CharLiteral(value)
    }

    /// String literal; the opening `"` has been consumed.
    pub(crate) fn scan_string_literal(&mut self, start: TokenPos) -> TokenKind {
        self.literal.clear();

        loop {
            // Bulk-copy ordinary content up to the next delimiter.
            let seg_start = self.cursor.pos();
            let delim = self.cursor.skip_to_string_delim();
            let seg_end = self.cursor.pos();
            self.literal
                .extend_from_slice(self.cursor.slice(seg_start, seg_end));

            match delim {
                b'"' => {
                    self.cursor.advance();
                    break;
                }
                b'\\' => {
                    self.cursor.advance();
                    let code = self.read_escape_code().unwrap_or(b'?');
                    self.literal.push(code);
                }
                // Bare line break or end of buffer: unterminated. The
                // terminator stays put so line accounting is untouched.
                _ => {
                    self.report(start, DiagKind::UnterminatedString);
                    break;
                }
            }
        }

        let atom = self.cc.intern(&self.literal);
        TokenKind::StrLiteral(atom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessor::PreprocessorState;
    use crate::LexerOptions;
    use quill_ir::CompileContext;
    use quill_lexer_core::SourceBuffer;
    use std::sync::Arc;

    fn lex_one(source: &str) -> (TokenKind, Vec<DiagKind>, CompileContext) {
        let cc = CompileContext::new();
        let kind = {
            let buffer = Arc::new(SourceBuffer::new(source));
            let mut state = PreprocessorState::new(&cc);
            let mut lexer = Lexer::new(&cc, LexerOptions::default(), &buffer);
            lexer.next(&mut state).kind
        };
        let kinds = cc.reports().kinds();
        (kind, kinds, cc)
    }

    fn string_contents(source: &str) -> (Vec<u8>, Vec<DiagKind>) {
        let (kind, diags, cc) = lex_one(source);
        let TokenKind::StrLiteral(atom) = kind else {
            panic!("expected string literal, got {kind:?}")
        };
        (cc.lookup(atom).to_vec(), diags)
    }

    // === Char literals ===

    #[test]
    fn plain_char() {
        assert_eq!(lex_one("'a'").0, TokenKind::CharLiteral(b'a'));
    }

    #[test]
    fn escaped_chars() {
        assert_eq!(lex_one(r"'\n'").0, TokenKind::CharLiteral(b'\n'));
        assert_eq!(lex_one(r"'\t'").0, TokenKind::CharLiteral(b'\t'));
        assert_eq!(lex_one(r"'\\'").0, TokenKind::CharLiteral(b'\\'));
        assert_eq!(lex_one(r"'\''").0, TokenKind::CharLiteral(b'\''));
        assert_eq!(lex_one(r"'\e'").0, TokenKind::CharLiteral(27));
    }

    #[test]
    fn hex_escape_char() {
        assert_eq!(lex_one(r"'\x41'").0, TokenKind::CharLiteral(0x41));
        // With the optional ';' terminator.
        assert_eq!(lex_one(r"'\x41;'").0, TokenKind::CharLiteral(0x41));
        // One digit only.
        assert_eq!(lex_one(r"'\xF'").0, TokenKind::CharLiteral(0xF));
    }

    #[test]
    fn decimal_escape_char() {
        assert_eq!(lex_one(r"'\65'").0, TokenKind::CharLiteral(65));
        assert_eq!(lex_one(r"'\65;'").0, TokenKind::CharLiteral(65));
        // Digit runs fold modulo 256: 321 mod 256 = 65.
        assert_eq!(lex_one(r"'\321;'").0, TokenKind::CharLiteral(65));
    }

    #[test]
    fn empty_char_literal() {
        let (kind, diags, _) = lex_one("''");
        assert_eq!(kind, TokenKind::Unknown);
        assert_eq!(diags, vec![DiagKind::InvalidCharLiteral]);
    }

    #[test]
    fn quote_typo_keeps_token() {
        let (kind, diags, _) = lex_one("'5\"");
        assert_eq!(kind, TokenKind::CharLiteral(b'5'));
        assert_eq!(diags, vec![DiagKind::BadCharTerminator]);
    }

    #[test]
    fn bad_terminator_backs_up() {
        let cc = CompileContext::new();
        let buffer = Arc::new(SourceBuffer::new("'ab'"));
        let mut state = PreprocessorState::new(&cc);
        let mut lexer = Lexer::new(&cc, LexerOptions::default(), &buffer);

        let tok = lexer.next(&mut state);
        assert_eq!(tok.kind, TokenKind::CharLiteral(b'a'));
        assert_eq!(cc.reports().kinds(), vec![DiagKind::BadCharTerminator]);

        // The mismatched byte was backed up over and lexes next.
        let tok = lexer.next(&mut state);
        assert!(matches!(tok.kind, TokenKind::Ident(_)));
    }

    #[test]
    fn unknown_escape_in_char_yields_question_mark() {
        let (kind, diags, _) = lex_one(r"'\q'");
        assert_eq!(kind, TokenKind::CharLiteral(b'?'));
        assert_eq!(diags, vec![DiagKind::UnknownEscapeCode { code: b'q' }]);
    }

    // === String literals ===

    #[test]
    fn plain_string() {
        let (contents, diags) = string_contents(r#""hello""#);
        assert_eq!(contents, b"hello");
        assert!(diags.is_empty());
    }

    #[test]
    fn string_escape_round_trip() {
        // "abc\n\x41;" decodes to a b c 0x0A 0x41.
        let (contents, diags) = string_contents(r#""abc\n\x41;""#);
        assert_eq!(contents, &[b'a', b'b', b'c', 0x0A, 0x41]);
        assert!(diags.is_empty());
    }

    #[test]
    fn string_with_percent_and_quotes() {
        let (contents, _) = string_contents(r#""a\%b\"c""#);
        assert_eq!(contents, b"a%b\"c");
    }

    #[test]
    fn unknown_escape_in_string_becomes_question_mark() {
        let (contents, diags) = string_contents(r#""a\qb""#);
        assert_eq!(contents, b"a?b");
        assert_eq!(diags, vec![DiagKind::UnknownEscapeCode { code: b'q' }]);
    }

    #[test]
    fn unterminated_string_at_newline() {
        let cc = CompileContext::new();
        let buffer = Arc::new(SourceBuffer::new("\"abc\ndef"));
        let mut state = PreprocessorState::new(&cc);
        let mut lexer = Lexer::new(&cc, LexerOptions::default(), &buffer);

        let tok = lexer.next(&mut state);
        assert!(matches!(tok.kind, TokenKind::StrLiteral(_)));
        assert_eq!(cc.reports().kinds(), vec![DiagKind::UnterminatedString]);
        assert_eq!(tok.start.line, 1);

        // Line accounting survives: the next token sits on line 2.
        let tok = lexer.next(&mut state);
        assert_eq!(tok.start.line, 2);
    }

    #[test]
    fn unterminated_string_at_eof() {
        let (kind, diags, _) = lex_one("\"abc");
        assert!(matches!(kind, TokenKind::StrLiteral(_)));
        assert_eq!(diags, vec![DiagKind::UnterminatedString]);
    }

    #[test]
    fn string_contents_are_interned() {
        let cc = CompileContext::new();
        let buffer = Arc::new(SourceBuffer::new("\"dup\" \"dup\""));
        let mut state = PreprocessorState::new(&cc);
        let mut lexer = Lexer::new(&cc, LexerOptions::default(), &buffer);

        let a = lexer.next(&mut state).atom();
        let b = lexer.next(&mut state).atom();
        assert!(a.is_some());
        assert_eq!(a, b);
    }
}
