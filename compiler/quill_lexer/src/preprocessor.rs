//! The driving preprocessor: macro table, expansion frames, include
//! handling, and the token loop end users consume.
//!
//! The lexer and this driver are split along a borrow seam: the lexer takes
//! the mutable hook state ([`PreprocessorState`]) while the driver owns the
//! lexer stack. `#include` therefore happens in two steps - the lexer
//! records a pending include through [`PreprocessorHooks::enter_file`], and
//! the driver resolves it and pushes a fresh lexer once the current call
//! unwinds.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use quill_ir::{Atom, Comment, CommentPos, CompileContext, DiagKind, Span, Token, TokenKind, TokenPos};
use quill_lexer_core::SourceBuffer;
use rustc_hash::FxHashMap;

use crate::eval::{eval_condition, EvalError};
use crate::hooks::PreprocessorHooks;
use crate::keywords;
use crate::{Lexer, LexerOptions};

/// An object-like macro definition.
#[derive(Clone, Debug)]
pub struct Macro {
    /// Where the `#define` named it.
    pub loc: TokenPos,
    /// Body token list; shared so expansion never copies it.
    pub body: Arc<[Token]>,
}

/// Macro definitions keyed by interned name.
#[derive(Default)]
pub struct MacroTable {
    map: FxHashMap<Atom, Macro>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a macro. Redefinition silently replaces the old body.
    pub fn define(&mut self, name: Atom, loc: TokenPos, body: Vec<Token>) {
        self.map.insert(
            name,
            Macro {
                loc,
                body: body.into(),
            },
        );
    }

    /// Remove a macro; `false` if it was not defined.
    pub fn remove(&mut self, name: Atom) -> bool {
        self.map.remove(&name).is_some()
    }

    pub fn get(&self, name: Atom) -> Option<&Macro> {
        self.map.get(&name)
    }

    pub fn contains(&self, name: Atom) -> bool {
        self.map.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// One in-flight macro expansion: a virtual sub-buffer of tokens.
struct ExpansionFrame {
    name: Atom,
    tokens: Arc<[Token]>,
    index: usize,
}

/// A recorded `#include`/`#tryinclude`, waiting for the driver.
pub(crate) struct PendingInclude {
    pub(crate) directive: TokenKind,
    pub(crate) loc: TokenPos,
    pub(crate) path: Vec<u8>,
    pub(crate) origin: Option<PathBuf>,
}

/// Mutable preprocessor state handed to the lexer as its hooks.
///
/// Usable on its own for driving a [`Lexer`] directly (the tests do), but
/// macro expansion and includes only come alive under a [`Preprocessor`],
/// which serves expansion frames and opens included buffers.
pub struct PreprocessorState<'ctx> {
    cc: &'ctx CompileContext,
    macros: MacroTable,
    expansion_enabled: bool,
    frames: Vec<ExpansionFrame>,
    comments: Vec<Comment>,
    deprecation_message: Option<Vec<u8>>,
    pending_include: Option<PendingInclude>,
    /// Buffers stacked beneath the active one.
    parent_buffers: usize,
}

impl<'ctx> PreprocessorState<'ctx> {
    pub fn new(cc: &'ctx CompileContext) -> Self {
        PreprocessorState {
            cc,
            macros: MacroTable::new(),
            expansion_enabled: true,
            frames: Vec::new(),
            comments: Vec::new(),
            deprecation_message: None,
            pending_include: None,
            parent_buffers: 0,
        }
    }

    /// The macro table.
    pub fn macros(&self) -> &MacroTable {
        &self.macros
    }

    /// Comment blocks reported so far, in source order.
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// Take the pending `#pragma deprecated` message, if one was set.
    pub fn take_deprecation_message(&mut self) -> Option<Vec<u8>> {
        self.deprecation_message.take()
    }

    /// Whether `name` is currently being expanded.
    fn expanding(&self, name: Atom) -> bool {
        self.frames.iter().any(|f| f.name == name)
    }

    fn take_pending_include(&mut self) -> Option<PendingInclude> {
        self.pending_include.take()
    }
}

impl PreprocessorHooks for PreprocessorState<'_> {
    fn find_keyword(&self, name: Atom) -> Option<TokenKind> {
        keywords::lookup(self.cc.lookup(name))
    }

    fn macro_expansion(&self) -> bool {
        self.expansion_enabled
    }

    fn set_macro_expansion(&mut self, enabled: bool) -> bool {
        std::mem::replace(&mut self.expansion_enabled, enabled)
    }

    fn enter_macro(&mut self, _loc: TokenPos, name: Atom) -> bool {
        let Some(def) = self.macros.get(name) else {
            return false;
        };
        if self.expanding(name) {
            return false;
        }
        let tokens = def.body.clone();
        tracing::trace!(tokens = tokens.len(), "entering macro expansion");
        self.frames.push(ExpansionFrame {
            name,
            tokens,
            index: 0,
        });
        true
    }

    fn define_macro(&mut self, name: Atom, loc: TokenPos, body: Vec<Token>) {
        tracing::debug!(
            name = %String::from_utf8_lossy(self.cc.lookup(name)),
            tokens = body.len(),
            "defining macro"
        );
        self.macros.define(name, loc, body);
    }

    fn remove_macro(&mut self, _loc: TokenPos, name: Atom) -> bool {
        self.macros.remove(name)
    }

    fn eval(&mut self, anchor: TokenPos, tokens: &[Token]) -> Result<(i64, usize), EvalError> {
        eval_condition(self.cc, &self.macros, anchor, tokens)
    }

    fn enter_file(
        &mut self,
        directive: TokenKind,
        loc: TokenPos,
        path: &[u8],
        origin: Option<&Path>,
    ) {
        self.pending_include = Some(PendingInclude {
            directive,
            loc,
            path: path.to_vec(),
            origin: origin.map(Path::to_path_buf),
        });
    }

    fn add_comment(&mut self, pos: CommentPos, range: Span) {
        self.comments.push(Comment::new(pos, range));
    }

    fn set_next_deprecation_message(&mut self, message: &[u8]) {
        self.deprecation_message = Some(message.to_vec());
    }

    fn handle_end_of_file(&mut self) -> bool {
        self.parent_buffers > 0
    }
}

/// Resolves include paths to source buffers.
///
/// File-system search (include directories, extensions) is the
/// implementor's concern; the preprocessor only asks.
pub trait SourceResolver {
    /// Open the buffer for `path`. `origin` is the including file's path
    /// for quoted includes.
    fn resolve(&mut self, path: &[u8], origin: Option<&Path>) -> Option<Arc<SourceBuffer>>;
}

/// In-memory resolver, keyed by exact path. Used by tests and tools that
/// already hold their sources.
#[derive(Default)]
pub struct MapResolver {
    files: FxHashMap<Vec<u8>, Arc<SourceBuffer>>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `source` under `path`.
    pub fn insert(&mut self, path: &str, source: &str) {
        self.files.insert(
            path.as_bytes().to_vec(),
            Arc::new(SourceBuffer::with_path(source, path)),
        );
    }
}

impl SourceResolver for MapResolver {
    fn resolve(&mut self, path: &[u8], _origin: Option<&Path>) -> Option<Arc<SourceBuffer>> {
        self.files.get(path).cloned()
    }
}

/// The preprocessor end users drive: owns the lexer stack and serves the
/// fully preprocessed token stream.
pub struct Preprocessor<'ctx> {
    cc: &'ctx CompileContext,
    state: PreprocessorState<'ctx>,
    lexers: Vec<Lexer<'ctx>>,
    resolver: Option<Box<dyn SourceResolver>>,
    eof_checked: bool,
}

impl<'ctx> Preprocessor<'ctx> {
    /// Create a preprocessor over the main source buffer.
    pub fn new(cc: &'ctx CompileContext, options: LexerOptions, buffer: &Arc<SourceBuffer>) -> Self {
        Preprocessor {
            cc,
            state: PreprocessorState::new(cc),
            lexers: vec![Lexer::new(cc, options, buffer)],
            resolver: None,
            eof_checked: false,
        }
    }

    /// Install the include resolver. Without one, every `#include` fails.
    pub fn set_resolver(&mut self, resolver: Box<dyn SourceResolver>) {
        self.resolver = Some(resolver);
    }

    /// The macro table.
    pub fn macros(&self) -> &MacroTable {
        self.state.macros()
    }

    /// Comment blocks reported so far.
    pub fn comments(&self) -> &[Comment] {
        self.state.comments()
    }

    /// Take the pending `#pragma deprecated` message.
    pub fn take_deprecation_message(&mut self) -> Option<Vec<u8>> {
        self.state.take_deprecation_message()
    }

    /// Produce the next fully preprocessed token.
    ///
    /// Directives, macro re-entry, and buffer switches are resolved
    /// internally; callers only ever see real tokens and a final, sticky
    /// `Eof`.
    pub fn next(&mut self) -> Token {
        loop {
            if let Some(tok) = self.next_expanded() {
                return tok;
            }

            let Some(lexer) = self.lexers.last_mut() else {
                return Token::new(TokenKind::Eof, TokenPos::START, TokenPos::START);
            };
            let tok = lexer.next(&mut self.state);

            match tok.kind {
                TokenKind::None => {
                    if let Some(include) = self.state.take_pending_include() {
                        self.process_include(include);
                    } else if self.active_buffer_finished() {
                        self.pop_finished_buffer();
                    }
                }
                TokenKind::Eof => {
                    if !self.eof_checked {
                        self.eof_checked = true;
                        if let Some(lexer) = self.lexers.last_mut() {
                            lexer.check_if_stack_at_end_of_file();
                        }
                    }
                    return tok;
                }
                _ => return tok,
            }
        }
    }

    /// Serve the next token from the expansion stack, expanding nested
    /// macro names as they stream past.
    fn next_expanded(&mut self) -> Option<Token> {
        loop {
            let frame = self.state.frames.last_mut()?;
            let Some(tok) = frame.tokens.get(frame.index).cloned() else {
                self.state.frames.pop();
                continue;
            };
            frame.index += 1;

            if self.state.expansion_enabled {
                if let TokenKind::Ident(name) = tok.kind {
                    if self.state.enter_macro(tok.start, name) {
                        continue;
                    }
                }
            }
            return Some(tok);
        }
    }

    /// Whether the active lexer has consumed its whole buffer while a
    /// parent is still waiting underneath.
    fn active_buffer_finished(&self) -> bool {
        self.lexers.len() > 1 && self.lexers.last().is_some_and(Lexer::at_buffer_end)
    }

    fn pop_finished_buffer(&mut self) {
        if let Some(mut finished) = self.lexers.pop() {
            finished.check_if_stack_at_end_of_file();
            self.state.parent_buffers = self.state.parent_buffers.saturating_sub(1);
            tracing::debug!(
                depth = self.lexers.len(),
                "include finished, returning to parent buffer"
            );
        }
    }

    fn process_include(&mut self, include: PendingInclude) {
        let resolved = self
            .resolver
            .as_mut()
            .and_then(|r| r.resolve(&include.path, include.origin.as_deref()));

        match resolved {
            Some(buffer) => {
                // The child inherits the current options, including any
                // #pragma newdecls change made so far.
                let options = self
                    .lexers
                    .last()
                    .map_or_else(LexerOptions::default, |lx| lx.options());
                tracing::debug!(
                    path = %String::from_utf8_lossy(&include.path),
                    depth = self.lexers.len() + 1,
                    "entering include file"
                );
                self.lexers.push(Lexer::new(self.cc, options, &buffer));
                self.state.parent_buffers += 1;
            }
            None => {
                if include.directive == TokenKind::MInclude {
                    tracing::warn!(
                        path = %String::from_utf8_lossy(&include.path),
                        "include not found"
                    );
                    self.cc.report(
                        include.loc,
                        DiagKind::IncludeNotFound {
                            path: String::from_utf8_lossy(&include.path).into_owned().into(),
                        },
                    );
                } else {
                    tracing::debug!(
                        path = %String::from_utf8_lossy(&include.path),
                        "tryinclude skipped missing file"
                    );
                }
            }
        }
    }
}
