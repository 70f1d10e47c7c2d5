//! Front and tail comment attribution.
//!
//! `next()` hands every comment token here. Blocks are grown while each
//! following comment starts within one line of the previous one's end; the
//! first non-comment token ends the block and decides whether it survives.
//! Lookahead happens through `scan()`, which never expands macros for
//! comments, so peeking ahead is safe.

use quill_ir::{CommentPos, Token, TokenKind, TokenPos};

use crate::hooks::PreprocessorHooks;
use crate::lexer::Lexer;

impl Lexer<'_> {
    /// Resolve a comment token into zero or more reported blocks, leaving
    /// the first non-comment token in `tok`.
    pub(crate) fn handle_comments(&mut self, pp: &mut dyn PreprocessorHooks, tok: &mut Token) {
        // Comments from directives are dropped, and without tracing nobody
        // wants the attribution work at all.
        if !self.options.trace_comments || self.lexing_for_directive {
            while tok.kind == TokenKind::Comment {
                *tok = self.scan(pp);
            }
            return;
        }

        if self.lexed_tokens_on_line {
            self.tail_comment_block(pp, tok);
        }

        // Whatever follows a committed tail block starts its own line, so
        // any remaining comments open front blocks. There can be several.
        while tok.kind == TokenKind::Comment {
            self.front_comment_block(pp, tok);
        }
    }

    /// A tail block follows a token on its line. Each comment extends the
    /// block while it starts within one line of the previous end; the first
    /// non-comment (or a comment further away) ends it.
    fn tail_comment_block(&mut self, pp: &mut dyn PreprocessorHooks, tok: &mut Token) {
        let start = tok.start;
        let mut end = tok.end;

        loop {
            *tok = self.scan(pp);
            if tok.kind == TokenKind::Comment && tok.start.line <= end.line + 1 {
                end = tok.end;
            } else {
                break;
            }
        }

        pp.add_comment(CommentPos::Tail, start.span_to(end));
    }

    /// A front block precedes a token that starts its own line, with at
    /// most one blank line between the comments and the token.
    fn front_comment_block(&mut self, pp: &mut dyn PreprocessorHooks, tok: &mut Token) {
        let block_start = tok.start;
        let mut committed: Option<TokenPos> = None;
        let mut last_end = tok.end;

        loop {
            *tok = self.scan(pp);

            if tok.kind != TokenKind::Comment {
                if tok.start.line == block_start.line {
                    // Something like `/* ... */ status` - the token was not
                    // first on its line, so the block is inline garbage.
                    return;
                }
                if tok.start.line != last_end.line {
                    // The final comment ended on a line of its own; it
                    // belongs to the block.
                    committed = Some(last_end);
                }
                break;
            }

            committed = Some(last_end);
            if tok.start.line > last_end.line + 1 {
                // Too far away; this comment opens the next block.
                break;
            }
            last_end = tok.end;
        }

        if let Some(end) = committed {
            pp.add_comment(CommentPos::Front, block_start.span_to(end));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::preprocessor::PreprocessorState;
    use crate::{Lexer, LexerOptions};
    use quill_ir::{Comment, CommentPos, CompileContext, TokenKind};
    use quill_lexer_core::SourceBuffer;
    use std::sync::Arc;

    fn lex_traced(source: &str) -> (Vec<TokenKind>, Vec<Comment>) {
        let cc = CompileContext::new();
        let buffer = Arc::new(SourceBuffer::new(source));
        let mut state = PreprocessorState::new(&cc);
        let options = LexerOptions {
            trace_comments: true,
            ..LexerOptions::default()
        };
        let mut lexer = Lexer::new(&cc, options, &buffer);

        let mut kinds = Vec::new();
        loop {
            let tok = lexer.next(&mut state);
            match tok.kind {
                TokenKind::Eof => break,
                TokenKind::None => continue,
                kind => kinds.push(kind),
            }
        }
        (kinds, state.comments().to_vec())
    }

    fn lex_plain(source: &str) -> Vec<TokenKind> {
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
                kind => kinds.push(kind),
            }
        }
        kinds
    }

    #[test]
    fn front_block_spans_adjacent_line_comments() {
        let source = "// a\n// b\nfoo";
        let (kinds, comments) = lex_traced(source);

        assert!(matches!(kinds.as_slice(), [TokenKind::Ident(_)]));
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].pos, CommentPos::Front);
        // Covers both comment lines: from the first `/` through "// b".
        assert_eq!(comments[0].range.start, 0);
        assert_eq!(comments[0].range.end, source.find("foo").unwrap() as u32 - 1);
    }

    #[test]
    fn tail_comment_after_token() {
        let source = "foo /* t */\nbar";
        let (kinds, comments) = lex_traced(source);

        assert!(matches!(
            kinds.as_slice(),
            [TokenKind::Ident(_), TokenKind::Ident(_)]
        ));
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].pos, CommentPos::Tail);
        assert_eq!(comments[0].range.start, 4);
        assert_eq!(comments[0].range.end, 11);
    }

    #[test]
    fn blank_line_splits_front_blocks() {
        let (_, comments) = lex_traced("// a\n\n\n// b\nfoo");
        // The far-away first comment commits alone; the second forms the
        // block attached to foo.
        assert_eq!(comments.len(), 2);
        assert!(comments.iter().all(|c| c.pos == CommentPos::Front));
    }

    #[test]
    fn blank_line_between_comments_splits_blocks() {
        // A comment extends a block only when it starts on the line right
        // after the previous comment's end.
        let (_, comments) = lex_traced("// a\n\n// b\nfoo");
        assert_eq!(comments.len(), 2);
        assert!(comments.iter().all(|c| c.pos == CommentPos::Front));
    }

    #[test]
    fn inline_comment_before_token_is_discarded() {
        // The token shares the block's start line: ill style, no front
        // comment event.
        let (kinds, comments) = lex_traced("/* note */ status");
        assert!(matches!(kinds.as_slice(), [TokenKind::Ident(_)]));
        assert!(comments.is_empty());
    }

    #[test]
    fn tail_block_extends_across_adjacent_comments() {
        let source = "foo // one\n// two\nbar";
        let (_, comments) = lex_traced(source);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].pos, CommentPos::Tail);
        // Block runs from the first comment into the second line.
        assert_eq!(comments[0].range.start, 4);
    }

    #[test]
    fn comment_filtering_is_idempotent() {
        // With tracing off, the token stream equals the traced stream minus
        // comment events.
        let source = "// a\nfoo /* t */ + 1\n// b\nbar";
        let (traced, _) = lex_traced(source);
        let plain = lex_plain(source);
        assert_eq!(traced, plain);
        assert!(!plain.contains(&TokenKind::Comment));
    }

    #[test]
    fn comments_inside_directives_are_not_traced() {
        let (_, comments) = lex_traced("#if 1 // cond\nfoo\n#endif\n");
        assert!(comments.is_empty());
    }

    #[test]
    fn multi_line_block_comment_still_fronts() {
        let source = "/* a\n   b */\nfoo";
        let (kinds, comments) = lex_traced(source);
        assert!(matches!(kinds.as_slice(), [TokenKind::Ident(_)]));
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].pos, CommentPos::Front);
    }
}
