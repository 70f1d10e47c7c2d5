//! Diagnostics and the accumulating report sink.
//!
//! Diagnostics are non-fatal: the lexer reports and keeps producing
//! best-effort tokens. The sink only accumulates; deciding whether an error
//! count aborts compilation is the caller's business.

use std::fmt;

use crate::TokenPos;

/// What went wrong, with enough payload to render a message.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum DiagKind {
    // Literals
    IntLiteralOverflow,
    ExpectedDigitForFloat { found: u8 },
    InvalidCharLiteral,
    BadCharTerminator,
    UnterminatedString,
    UnterminatedComment,
    UnknownEscapeCode { code: u8 },
    UnexpectedChar { ch: u8 },

    // Directives
    BadDirectiveToken { expected: &'static str, found: &'static str },
    MacroFunctionsUnsupported,
    ElseDeclaredTwice,
    ElseWithoutIf,
    EndifWithoutIf,
    UnknownDirective { spelling: Box<str> },
    UnknownPragma { name: Box<str> },
    BadPragmaNewdecls,
    PpExtraCharacters,
    BadIncludeSyntax,
    PragmaMustHaveName,
    UnterminatedElse,
    UnterminatedIf,
    BadConditionalExpression,
    IncludeNotFound { path: Box<str> },
}

impl fmt::Display for DiagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagKind::IntLiteralOverflow => {
                write!(f, "integer literal does not fit in 64 bits")
            }
            DiagKind::ExpectedDigitForFloat { found } => {
                write!(f, "expected digit in float literal, found `{}`", Printable(*found))
            }
            DiagKind::InvalidCharLiteral => write!(f, "invalid character literal"),
            DiagKind::BadCharTerminator => {
                write!(f, "expected `'` to terminate character literal")
            }
            DiagKind::UnterminatedString => write!(f, "unterminated string literal"),
            DiagKind::UnterminatedComment => write!(f, "unterminated block comment"),
            DiagKind::UnknownEscapeCode { code } => {
                write!(f, "unknown escape code `\\{}`", Printable(*code))
            }
            DiagKind::UnexpectedChar { ch } => {
                write!(f, "unexpected character `{}` (0x{:02X})", Printable(*ch), ch)
            }
            DiagKind::BadDirectiveToken { expected, found } => {
                write!(f, "expected {expected} in directive, found {found}")
            }
            DiagKind::MacroFunctionsUnsupported => {
                write!(f, "function-like macros are not supported")
            }
            DiagKind::ElseDeclaredTwice => write!(f, "#else already declared for this #if"),
            DiagKind::ElseWithoutIf => write!(f, "#else without a matching #if"),
            DiagKind::EndifWithoutIf => write!(f, "#endif without a matching #if"),
            DiagKind::UnknownDirective { spelling } => {
                write!(f, "unknown directive `{spelling}`")
            }
            DiagKind::UnknownPragma { name } => write!(f, "unknown pragma `{name}`"),
            DiagKind::BadPragmaNewdecls => {
                write!(f, "#pragma newdecls expects `required` or `optional`")
            }
            DiagKind::PpExtraCharacters => {
                write!(f, "extra characters after preprocessor directive")
            }
            DiagKind::BadIncludeSyntax => {
                write!(f, "expected \"file\" or <file> after #include")
            }
            DiagKind::PragmaMustHaveName => write!(f, "#pragma must be followed by a name"),
            DiagKind::UnterminatedElse => write!(f, "#else block is never terminated"),
            DiagKind::UnterminatedIf => write!(f, "#if block is never terminated"),
            DiagKind::BadConditionalExpression => {
                write!(f, "could not evaluate #if condition")
            }
            DiagKind::IncludeNotFound { path } => {
                write!(f, "cannot find include file `{path}`")
            }
        }
    }
}

impl std::error::Error for DiagKind {}

/// Render a byte as itself when printable ASCII, `?` otherwise.
struct Printable(u8);

impl fmt::Display for Printable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_ascii_graphic() || self.0 == b' ' {
            write!(f, "{}", self.0 as char)
        } else {
            write!(f, "?")
        }
    }
}

/// The kind of a secondary note attached to a diagnostic.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum NoteKind {
    /// Points at an earlier location the primary message refers to.
    PreviousLocation,
}

/// A reported diagnostic, anchored at a source position.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Diagnostic {
    pub loc: TokenPos,
    pub kind: DiagKind,
    pub note: Option<(TokenPos, NoteKind)>,
}

impl Diagnostic {
    pub fn new(loc: TokenPos, kind: DiagKind) -> Self {
        Diagnostic {
            loc,
            kind,
            note: None,
        }
    }

    /// Attach a secondary note pointing at another location.
    #[must_use]
    pub fn with_note(mut self, loc: TokenPos, kind: NoteKind) -> Self {
        self.note = Some((loc, kind));
        self
    }
}

impl fmt::Debug for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.loc.line, self.kind)?;
        if let Some((loc, NoteKind::PreviousLocation)) = self.note {
            write!(f, " (previous location: line {})", loc.line)?;
        }
        Ok(())
    }
}

/// Accumulating diagnostic sink.
///
/// Interior mutability lets the lexer report through a shared
/// `&CompileContext` while holding `&mut self` for its own state.
#[derive(Default)]
pub struct Reports {
    diags: parking_lot::Mutex<Vec<Diagnostic>>,
}

impl Reports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic.
    pub fn push(&self, diag: Diagnostic) {
        self.diags.lock().push(diag);
    }

    /// Number of diagnostics reported so far.
    pub fn len(&self) -> usize {
        self.diags.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of everything reported so far, in source order.
    pub fn collected(&self) -> Vec<Diagnostic> {
        self.diags.lock().clone()
    }

    /// Snapshot of just the kinds, convenient for assertions.
    pub fn kinds(&self) -> Vec<DiagKind> {
        self.diags.lock().iter().map(|d| d.kind.clone()).collect()
    }
}
