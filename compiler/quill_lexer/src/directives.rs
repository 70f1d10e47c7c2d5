//! Preprocessor directives, the conditional-compilation stack, and the
//! skip engine for inactive regions.
//!
//! A directive is entered only when `#` is the first non-whitespace token on
//! a physical line. The handler runs in directive mode (line breaks become
//! `Eol` tokens) with macro expansion paused, consumes what it needs, and
//! the remainder of the line is chewed with errors suppressed. If the
//! directive left the top if-frame inactive, the skip engine fast-forwards
//! whole lines until the region becomes active again.

use quill_ir::{DiagKind, NoteKind, Token, TokenKind, TokenPos};

use crate::hooks::PreprocessorHooks;
use crate::lexer::{is_line_terminator, Lexer};

/// Conditional-compilation state of one `#if` frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum IfState {
    /// Branch currently selected; tokens pass through.
    Active,
    /// Branch currently unselected, but a sibling was active.
    Inactive,
    /// No branch taken yet; waiting for `#else`.
    Ignoring,
    /// Inside an outer inactive region; this frame tracks nesting only.
    Dead,
}

/// One frame of the `#if` stack.
#[derive(Copy, Clone, Debug)]
pub(crate) struct IfFrame {
    /// Location of the opening `#if`.
    pub(crate) first: TokenPos,
    pub(crate) state: IfState,
    /// Location of the `#else`, once seen.
    pub(crate) elseloc: Option<TokenPos>,
}

impl IfFrame {
    pub(crate) fn new(first: TokenPos, state: IfState) -> Self {
        IfFrame {
            first,
            state,
            elseloc: None,
        }
    }
}

impl<'ctx> Lexer<'ctx> {
    /// Whether the top if-frame, if any, lets tokens through.
    fn top_if_active(&self) -> bool {
        self.ifstack
            .last()
            .map_or(true, |ix| ix.state == IfState::Active)
    }

    /// Process the directive starting at the `#` under the cursor.
    ///
    /// Called from `scan()`; returns no token so the caller can loop, which
    /// matters because an `#include` may hand control to a different buffer
    /// entirely.
    pub(crate) fn enter_preprocessor_directive(&mut self, pp: &mut dyn PreprocessorHooks) {
        // The directive counts as a token on this line; a second `#` on the
        // same line is not a directive.
        self.lexed_tokens_on_line = true;

        self.with_directive_lexing(pp, |lexer, pp| {
            let was_expanding = pp.set_macro_expansion(false);
            let warn = lexer.handle_directive(pp);
            lexer.chew_line_after_directive(pp, warn);
            pp.set_macro_expansion(was_expanding);
        });

        // If the directive put us inside an unselected branch, sweep ahead
        // until the region ends.
        if !self.top_if_active() {
            self.skip_inactive_region(pp);
        }
    }

    /// Dispatch one directive. Returns whether trailing characters on the
    /// line deserve a warning.
    fn handle_directive(&mut self, pp: &mut dyn PreprocessorHooks) -> bool {
        let begin = self.here();
        let directive = self.directive_keyword(pp);

        match directive {
            Some(TokenKind::MDefine) => {
                let tok = self.directive_next(pp);
                let TokenKind::Ident(name) = tok.kind else {
                    self.cc.report(
                        tok.start,
                        DiagKind::BadDirectiveToken {
                            expected: "identifier",
                            found: tok.kind.name(),
                        },
                    );
                    return false;
                };
                if self.cursor.current() == b'(' {
                    self.report(self.here(), DiagKind::MacroFunctionsUnsupported);
                    return false;
                }

                let body = self.collect_line_tokens(pp);
                pp.define_macro(name, tok.start, body);
                false
            }

            Some(TokenKind::MIf) => {
                let tokens = self.collect_line_tokens(pp);
                match pp.eval(begin, &tokens) {
                    Ok((value, consumed)) => {
                        if consumed < tokens.len() {
                            self.cc.report(tokens[consumed].start, DiagKind::PpExtraCharacters);
                        }
                        let state = if value != 0 {
                            IfState::Active
                        } else {
                            IfState::Ignoring
                        };
                        self.ifstack.push(IfFrame::new(begin, state));
                        true
                    }
                    Err(err) => {
                        self.report(err.loc, DiagKind::BadConditionalExpression);
                        self.ifstack.push(IfFrame::new(begin, IfState::Ignoring));
                        false
                    }
                }
            }

            Some(TokenKind::MElse) => {
                let Some(&IfFrame { state, elseloc, .. }) = self.ifstack.last() else {
                    self.report(begin, DiagKind::ElseWithoutIf);
                    return false;
                };
                if let Some(prev) = elseloc {
                    self.report_with_note(
                        begin,
                        DiagKind::ElseDeclaredTwice,
                        prev,
                        NoteKind::PreviousLocation,
                    );
                    return false;
                }
                if let Some(ix) = self.ifstack.last_mut() {
                    ix.elseloc = Some(begin);
                    ix.state = if state == IfState::Ignoring {
                        IfState::Active
                    } else {
                        IfState::Inactive
                    };
                }
                true
            }

            Some(TokenKind::MEndif) => {
                if self.ifstack.pop().is_none() {
                    self.report(begin, DiagKind::EndifWithoutIf);
                    return false;
                }
                true
            }

            Some(TokenKind::MUndef) => {
                let tok = self.directive_next(pp);
                let TokenKind::Ident(name) = tok.kind else {
                    self.cc.report(
                        tok.start,
                        DiagKind::BadDirectiveToken {
                            expected: "identifier",
                            found: tok.kind.name(),
                        },
                    );
                    return false;
                };
                pp.remove_macro(tok.start, name)
            }

            Some(TokenKind::MEndinput) => {
                // Simulate reaching the end of the buffer. The if-stack is
                // purged so the end-of-file check has nothing to complain
                // about.
                self.cursor.seek_end();
                self.ifstack.clear();
                false
            }

            Some(kind @ (TokenKind::MInclude | TokenKind::MTryinclude)) => {
                self.handle_include(pp, kind, begin)
            }

            Some(TokenKind::MPragma) => self.handle_pragma(pp, begin),

            _ => {
                let spelling = String::from_utf8_lossy(&self.literal).into_owned();
                self.report(
                    begin,
                    DiagKind::UnknownDirective {
                        spelling: spelling.into(),
                    },
                );
                false
            }
        }
    }

    fn handle_include(
        &mut self,
        pp: &mut dyn PreprocessorHooks,
        directive: TokenKind,
        begin: TokenPos,
    ) -> bool {
        let c = self.first_non_space_char();
        if c != b'"' && c != b'<' {
            self.retreat_if_consumed(c);
            self.report(self.here(), DiagKind::BadIncludeSyntax);
            return false;
        }
        let closer = if c == b'"' { b'"' } else { b'>' };

        self.literal.clear();
        loop {
            if is_line_terminator(self.cursor.current()) {
                self.report(self.here(), DiagKind::BadIncludeSyntax);
                return false;
            }
            let c = self.read_char();
            if c == closer {
                break;
            }
            self.literal.push(c);
        }

        // Quoted includes search relative to the containing file.
        let origin = if closer == b'"' {
            self.cursor.buffer().path().map(|p| p.to_path_buf())
        } else {
            None
        };

        // Chew the rest of the line now, so no preprocessing state needs to
        // be remembered when control returns to this buffer.
        let path = std::mem::take(&mut self.literal);
        self.chew_line_after_directive(pp, true);
        pp.enter_file(directive, begin, &path, origin.as_deref());
        self.literal = path;
        false
    }

    fn handle_pragma(&mut self, pp: &mut dyn PreprocessorHooks, begin: TokenPos) -> bool {
        let tok = self.directive_next(pp);
        let TokenKind::Ident(name) = tok.kind else {
            self.cc.report(tok.start, DiagKind::PragmaMustHaveName);
            return false;
        };

        match self.cc.lookup(name) {
            b"deprecated" => {
                let message = self.read_rest_of_line_trimmed();
                pp.set_next_deprecation_message(&message);
                true
            }

            b"newdecls" => {
                let tok = self.directive_next(pp);
                let TokenKind::Ident(mode) = tok.kind else {
                    self.cc.report(tok.start, DiagKind::BadPragmaNewdecls);
                    return false;
                };
                match self.cc.lookup(mode) {
                    b"required" => {
                        self.options.require_newdecls = true;
                        true
                    }
                    b"optional" => {
                        self.options.require_newdecls = false;
                        true
                    }
                    _ => {
                        self.cc.report(tok.start, DiagKind::BadPragmaNewdecls);
                        false
                    }
                }
            }

            b"semicolon" => {
                // Semantically ignored; there is a separate top-level mode
                // for enforcing semicolons. The expression still has to be
                // well-formed.
                let tokens = self.collect_line_tokens(pp);
                match pp.eval(begin, &tokens) {
                    Ok(_) => true,
                    Err(err) => {
                        self.report(err.loc, DiagKind::BadConditionalExpression);
                        false
                    }
                }
            }

            b"dynamic" => {
                let tokens = self.collect_line_tokens(pp);
                match pp.eval(begin, &tokens) {
                    Ok((value, _)) => self.cc.change_pragma_dynamic(value),
                    Err(err) => {
                        self.report(err.loc, DiagKind::BadConditionalExpression);
                        false
                    }
                }
            }

            other => {
                let name = String::from_utf8_lossy(other).into_owned();
                self.cc
                    .report(tok.start, DiagKind::UnknownPragma { name: name.into() });
                false
            }
        }
    }

    /// Collect the remaining tokens on the directive line (comments
    /// dropped), up to but not including the end of line.
    pub(crate) fn collect_line_tokens(&mut self, pp: &mut dyn PreprocessorHooks) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.directive_next(pp);
            if tok.kind == TokenKind::Eol {
                break;
            }
            tokens.push(tok);
        }
        tokens
    }

    /// Read the rest of the line as raw text, trimmed of surrounding
    /// whitespace.
    fn read_rest_of_line_trimmed(&mut self) -> Vec<u8> {
        self.skip_spaces();
        let begin = self.cursor.pos();
        self.cursor.eat_to_line_terminator();
        let end = self.cursor.pos();

        let mut bytes = self.cursor.slice(begin, end).to_vec();
        while bytes.last().is_some_and(|b| b.is_ascii_whitespace()) {
            bytes.pop();
        }
        bytes
    }

    /// Consume the remainder of a directive line, warning once about extra
    /// characters when asked to.
    pub(crate) fn chew_line_after_directive(
        &mut self,
        pp: &mut dyn PreprocessorHooks,
        warn_on_extra: bool,
    ) {
        debug_assert!(self.lexing_for_directive);

        self.with_suppressed_errors(pp, |lexer, pp| {
            let mut warned = false;
            loop {
                let tok = lexer.directive_next(pp);
                if tok.kind == TokenKind::Eol {
                    return;
                }
                if warn_on_extra && !warned {
                    // Report through the context directly; only the lexer's
                    // own diagnostics are being suppressed here.
                    lexer.cc.report(tok.start, DiagKind::PpExtraCharacters);
                    warned = true;
                }
            }
        });
    }

    /// Fast-forward through an unselected conditional region.
    ///
    /// Only `#if`, `#else`, and `#endif` mean anything in here; every other
    /// line is skipped wholesale. Exits when the top frame turns active,
    /// the stack empties, or the buffer runs out.
    fn skip_inactive_region(&mut self, pp: &mut dyn PreprocessorHooks) {
        // Chewing the directive line left the cursor at its terminator.
        match self.cursor.current() {
            0 => return,
            c @ (b'\r' | b'\n') => {
                self.cursor.advance();
                self.advance_line(c);
            }
            _ => debug_assert!(false, "skip engine entered mid-line"),
        }

        loop {
            self.skip_spaces();
            if self.cursor.current() == b'#' {
                self.handle_directive_while_inactive(pp);
                if self.top_if_active() {
                    return;
                }
            }

            self.cursor.eat_to_line_terminator();
            match self.cursor.current() {
                0 => return,
                c => {
                    self.cursor.advance();
                    self.advance_line(c);
                }
            }
        }
    }

    /// The restricted directive handler used inside skipped regions.
    fn handle_directive_while_inactive(&mut self, pp: &mut dyn PreprocessorHooks) {
        self.with_directive_lexing(pp, |lexer, pp| {
            let begin = lexer.here();
            match lexer.directive_keyword(pp) {
                Some(TokenKind::MIf) => {
                    // Track nesting so inner #endifs match up; the condition
                    // is irrelevant inside a skipped region.
                    lexer.ifstack.push(IfFrame::new(begin, IfState::Dead));
                }

                Some(TokenKind::MElse) => {
                    let Some(&IfFrame { state, elseloc, .. }) = lexer.ifstack.last() else {
                        return;
                    };
                    if state == IfState::Dead {
                        return;
                    }
                    if let Some(prev) = elseloc {
                        lexer.report_with_note(
                            begin,
                            DiagKind::ElseDeclaredTwice,
                            prev,
                            NoteKind::PreviousLocation,
                        );
                    }
                    if let Some(ix) = lexer.ifstack.last_mut() {
                        ix.elseloc = Some(begin);
                        ix.state = if state == IfState::Ignoring {
                            IfState::Active
                        } else {
                            IfState::Inactive
                        };
                    }
                    lexer.chew_line_after_directive(pp, true);
                }

                Some(TokenKind::MEndif) => {
                    lexer.ifstack.pop();
                    lexer.chew_line_after_directive(pp, true);
                }

                // Unrecognized directives are skipped like any other line.
                _ => {}
            }
        });
    }

    /// Report any conditional blocks still open at the end of the buffer.
    pub fn check_if_stack_at_end_of_file(&mut self) {
        let cc = self.cc;
        for ix in self.ifstack.drain(..) {
            match ix.elseloc {
                Some(loc) => cc.report(loc, DiagKind::UnterminatedElse),
                None => cc.report(ix.first, DiagKind::UnterminatedIf),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessor::PreprocessorState;
    use crate::LexerOptions;
    use quill_ir::{Atom, CompileContext};
    use quill_lexer_core::SourceBuffer;
    use std::sync::Arc;

    fn erase(kind: TokenKind) -> TokenKind {
        match kind {
            TokenKind::Ident(_) => TokenKind::Ident(Atom::EMPTY),
            other => other,
        }
    }

    fn lex_with_diags(source: &str) -> (Vec<TokenKind>, Vec<DiagKind>) {
        let cc = CompileContext::new();
        let buffer = Arc::new(SourceBuffer::new(source));
        let mut state = PreprocessorState::new(&cc);
        let mut lexer = Lexer::new(&cc, LexerOptions::default(), &buffer);

        let mut kinds = Vec::new();
        loop {
            let tok = lexer.next(&mut state);
            match tok.kind {
                TokenKind::Eof => break,
                TokenKind::None => continue,
                kind => kinds.push(erase(kind)),
            }
        }
        lexer.check_if_stack_at_end_of_file();
        (kinds, cc.reports().kinds())
    }

    fn idents(source: &str) -> Vec<String> {
        let cc = CompileContext::new();
        let buffer = Arc::new(SourceBuffer::new(source));
        let mut state = PreprocessorState::new(&cc);
        let mut lexer = Lexer::new(&cc, LexerOptions::default(), &buffer);

        let mut names = Vec::new();
        loop {
            let tok = lexer.next(&mut state);
            match tok.kind {
                TokenKind::Eof => break,
                TokenKind::Ident(a) => {
                    names.push(String::from_utf8_lossy(cc.lookup(a)).into_owned());
                }
                _ => {}
            }
        }
        names
    }

    #[test]
    fn if_zero_selects_else_branch() {
        assert_eq!(idents("#if 0\nX\n#else\nY\n#endif\nZ"), vec!["Y", "Z"]);
    }

    #[test]
    fn if_one_selects_then_branch() {
        assert_eq!(idents("#if 1\nX\n#else\nY\n#endif\nZ"), vec!["X", "Z"]);
    }

    #[test]
    fn nested_if_inside_skipped_region() {
        // The inner #if/#endif pair is dead; its #endif must not close the
        // outer frame.
        let src = "#if 0\n#if 1\nA\n#endif\nB\n#else\nC\n#endif\nD";
        assert_eq!(idents(src), vec!["C", "D"]);
    }

    #[test]
    fn nested_else_inside_dead_region_is_inert() {
        let src = "#if 0\n#if 0\nA\n#else\nB\n#endif\nC\n#endif\nD";
        assert_eq!(idents(src), vec!["D"]);
    }

    #[test]
    fn else_without_if_reports() {
        let (_, diags) = lex_with_diags("#else\nx");
        assert!(diags.contains(&DiagKind::ElseWithoutIf));
    }

    #[test]
    fn endif_without_if_reports() {
        let (_, diags) = lex_with_diags("#endif\nx");
        assert!(diags.contains(&DiagKind::EndifWithoutIf));
    }

    #[test]
    fn else_declared_twice_reports_with_note() {
        let cc = CompileContext::new();
        let buffer = Arc::new(SourceBuffer::new("#if 1\n#else\n#else\n#endif\n"));
        let mut state = PreprocessorState::new(&cc);
        let mut lexer = Lexer::new(&cc, LexerOptions::default(), &buffer);
        loop {
            let tok = lexer.next(&mut state);
            if tok.kind == TokenKind::Eof {
                break;
            }
        }

        let diags = cc.reports().collected();
        let twice: Vec<_> = diags
            .iter()
            .filter(|d| d.kind == DiagKind::ElseDeclaredTwice)
            .collect();
        assert_eq!(twice.len(), 1);
        assert!(twice[0].note.is_some(), "expected a previous-location note");
    }

    #[test]
    fn balanced_if_stack_is_quiet() {
        let (_, diags) = lex_with_diags("#if 1\n#if 1\nx\n#endif\n#endif\ny");
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn unterminated_if_reports_at_eof() {
        let (_, diags) = lex_with_diags("#if 1\nx");
        assert_eq!(diags, vec![DiagKind::UnterminatedIf]);
    }

    #[test]
    fn unterminated_else_reports_at_eof() {
        let (_, diags) = lex_with_diags("#if 1\nx\n#else\ny");
        assert_eq!(diags, vec![DiagKind::UnterminatedElse]);
    }

    #[test]
    fn unterminated_if_inside_skipped_region() {
        let (_, diags) = lex_with_diags("#if 0\nx");
        assert_eq!(diags, vec![DiagKind::UnterminatedIf]);
    }

    #[test]
    fn endinput_stops_the_buffer_and_purges_the_stack() {
        let (kinds, diags) = lex_with_diags("#if 1\nA\n#endinput\nB\n#endif\n");
        assert_eq!(kinds, vec![TokenKind::Ident(Atom::EMPTY)]);
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn hash_mid_line_is_not_a_directive() {
        let (kinds, diags) = lex_with_diags("x #if");
        // `#` after a token is just an unexpected character.
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident(Atom::EMPTY),
                TokenKind::Unknown,
                TokenKind::Ident(Atom::EMPTY),
            ]
        );
        assert!(diags.contains(&DiagKind::UnexpectedChar { ch: b'#' }));
    }

    #[test]
    fn directive_allowed_after_leading_whitespace() {
        assert_eq!(idents("   #if 0\nX\n#endif\nY"), vec!["Y"]);
    }

    #[test]
    fn unknown_directive_reports_spelling() {
        let (_, diags) = lex_with_diags("#frobnicate\nx");
        assert!(diags.iter().any(|d| matches!(
            d,
            DiagKind::UnknownDirective { spelling } if &**spelling == "#frobnicate"
        )));
    }

    #[test]
    fn extra_characters_after_endif_warn_once() {
        let (_, diags) = lex_with_diags("#if 1\nx\n#endif junk junk\ny");
        let count = diags
            .iter()
            .filter(|d| **d == DiagKind::PpExtraCharacters)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn extra_characters_after_if_condition_warn() {
        let (_, diags) = lex_with_diags("#if 1 garbage\nx\n#endif\n");
        assert!(diags.contains(&DiagKind::PpExtraCharacters));
    }

    #[test]
    fn define_rejects_function_like_macros() {
        let (_, diags) = lex_with_diags("#define F(x) 1\ny");
        assert!(diags.contains(&DiagKind::MacroFunctionsUnsupported));
    }

    #[test]
    fn define_requires_a_name() {
        let (_, diags) = lex_with_diags("#define 123\ny");
        assert!(diags.iter().any(|d| matches!(d, DiagKind::BadDirectiveToken { .. })));
    }

    #[test]
    fn pragma_newdecls_toggles_option() {
        let cc = CompileContext::new();
        let buffer = Arc::new(SourceBuffer::new("#pragma newdecls required\nx"));
        let mut state = PreprocessorState::new(&cc);
        let mut lexer = Lexer::new(&cc, LexerOptions::default(), &buffer);
        loop {
            if lexer.next(&mut state).kind == TokenKind::Eof {
                break;
            }
        }
        assert!(lexer.options().require_newdecls);
        assert!(cc.reports().is_empty());
    }

    #[test]
    fn pragma_newdecls_bad_mode_reports() {
        let (_, diags) = lex_with_diags("#pragma newdecls sometimes\nx");
        assert!(diags.contains(&DiagKind::BadPragmaNewdecls));
    }

    #[test]
    fn pragma_dynamic_reaches_the_context() {
        let cc = CompileContext::new();
        let buffer = Arc::new(SourceBuffer::new("#pragma dynamic 4096\nx"));
        let mut state = PreprocessorState::new(&cc);
        let mut lexer = Lexer::new(&cc, LexerOptions::default(), &buffer);
        loop {
            if lexer.next(&mut state).kind == TokenKind::Eof {
                break;
            }
        }
        assert_eq!(cc.pragma_dynamic(), 4096);
    }

    #[test]
    fn pragma_semicolon_is_parsed_but_ignored() {
        let (_, diags) = lex_with_diags("#pragma semicolon 1\nx");
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn unknown_pragma_reports() {
        let (_, diags) = lex_with_diags("#pragma warble\nx");
        assert!(diags.iter().any(|d| matches!(
            d,
            DiagKind::UnknownPragma { name } if &**name == "warble"
        )));
    }

    #[test]
    fn pragma_without_name_reports() {
        let (_, diags) = lex_with_diags("#pragma 12\nx");
        assert!(diags.contains(&DiagKind::PragmaMustHaveName));
    }

    #[test]
    fn bad_include_syntax_reports() {
        let (_, diags) = lex_with_diags("#include foo\nx");
        assert!(diags.contains(&DiagKind::BadIncludeSyntax));
    }

    #[test]
    fn include_with_unclosed_quote_reports() {
        let (_, diags) = lex_with_diags("#include \"foo\nx");
        assert!(diags.contains(&DiagKind::BadIncludeSyntax));
    }

    #[test]
    fn first_token_rule_with_comment_prefix() {
        // Comments do not count as tokens, so a directive may follow one on
        // the same line... but only if the comment came first on the line.
        assert_eq!(idents("/* note */ #if 0\nX\n#endif\nY"), vec!["Y"]);
    }
}
