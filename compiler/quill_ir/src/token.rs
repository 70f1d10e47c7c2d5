//! Token model for the Quill lexer.
//!
//! [`TokenKind`] is the closed set of kinds the lexer can produce, payload
//! included. Float values are stored as IEEE bits so tokens stay
//! `Eq + Hash`; use [`TokenKind::float_value`] to recover the `f64`.

use std::fmt;

use crate::{Atom, Span, TokenPos};

/// A token with its start and end positions.
///
/// The byte range is half-open `[start.offset, end.offset)`; `end.line` may
/// be later than `start.line` for tokens that cross line breaks.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Token {
    pub kind: TokenKind,
    pub start: TokenPos,
    pub end: TokenPos,
}

impl Token {
    #[inline]
    pub fn new(kind: TokenKind, start: TokenPos, end: TokenPos) -> Self {
        Token { kind, start, end }
    }

    /// The byte span covered by this token.
    #[inline]
    pub fn span(&self) -> Span {
        self.start.span_to(self.end)
    }

    /// The interned atom carried by name, label, and string tokens.
    #[inline]
    pub fn atom(&self) -> Option<Atom> {
        match self.kind {
            TokenKind::Ident(a) | TokenKind::Label(a) | TokenKind::StrLiteral(a) => Some(a),
            _ => None,
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} @ {:?}..{:?}", self.kind, self.start, self.end)
    }
}

/// The closed set of token kinds.
///
/// Directive tags (`MDefine` and friends) are produced only by the directive
/// keyword table; they never appear in the token stream handed to a parser.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum TokenKind {
    // Punctuation
    Semicolon,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Tilde,
    Question,
    Colon,
    Comma,
    Dot,
    Ellipsis,

    // Operators
    Slash,
    SlashEq,
    Star,
    StarEq,
    Plus,
    PlusEq,
    PlusPlus,
    Amp,
    AmpEq,
    AmpAmp,
    Pipe,
    PipeEq,
    PipePipe,
    Caret,
    CaretEq,
    Percent,
    PercentEq,
    Minus,
    MinusEq,
    MinusMinus,
    Bang,
    NotEq,
    Eq,
    EqEq,
    Lt,
    LtEq,
    Shl,
    ShlEq,
    Gt,
    GtEq,
    Shr,
    Ushr,
    UshrEq,

    // Literals
    IntLiteral(u64),
    HexLiteral(u64),
    /// IEEE-754 bits; see [`TokenKind::float_value`].
    FloatLiteral(u64),
    CharLiteral(u8),
    StrLiteral(Atom),

    // Names
    Ident(Atom),
    Label(Atom),

    // Structure
    Comment,
    Eol,
    Eof,
    None,
    Unknown,

    // Directive tags
    MDefine,
    MIf,
    MElse,
    MEndif,
    MUndef,
    MInclude,
    MTryinclude,
    MPragma,
    MEndinput,
}

impl TokenKind {
    /// Recover the `f64` from a float literal's stored bits.
    #[inline]
    pub fn float_value(&self) -> Option<f64> {
        match self {
            TokenKind::FloatLiteral(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    /// The integer payload of an integer or hex literal.
    #[inline]
    pub fn int_value(&self) -> Option<u64> {
        match self {
            TokenKind::IntLiteral(v) | TokenKind::HexLiteral(v) => Some(*v),
            _ => None,
        }
    }

    /// Whether this kind is one of the directive tags.
    #[inline]
    pub fn is_directive(&self) -> bool {
        matches!(
            self,
            TokenKind::MDefine
                | TokenKind::MIf
                | TokenKind::MElse
                | TokenKind::MEndif
                | TokenKind::MUndef
                | TokenKind::MInclude
                | TokenKind::MTryinclude
                | TokenKind::MPragma
                | TokenKind::MEndinput
        )
    }

    /// A stable human-readable name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Semicolon => ";",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Tilde => "~",
            TokenKind::Question => "?",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Ellipsis => "...",
            TokenKind::Slash => "/",
            TokenKind::SlashEq => "/=",
            TokenKind::Star => "*",
            TokenKind::StarEq => "*=",
            TokenKind::Plus => "+",
            TokenKind::PlusEq => "+=",
            TokenKind::PlusPlus => "++",
            TokenKind::Amp => "&",
            TokenKind::AmpEq => "&=",
            TokenKind::AmpAmp => "&&",
            TokenKind::Pipe => "|",
            TokenKind::PipeEq => "|=",
            TokenKind::PipePipe => "||",
            TokenKind::Caret => "^",
            TokenKind::CaretEq => "^=",
            TokenKind::Percent => "%",
            TokenKind::PercentEq => "%=",
            TokenKind::Minus => "-",
            TokenKind::MinusEq => "-=",
            TokenKind::MinusMinus => "--",
            TokenKind::Bang => "!",
            TokenKind::NotEq => "!=",
            TokenKind::Eq => "=",
            TokenKind::EqEq => "==",
            TokenKind::Lt => "<",
            TokenKind::LtEq => "<=",
            TokenKind::Shl => "<<",
            TokenKind::ShlEq => "<<=",
            TokenKind::Gt => ">",
            TokenKind::GtEq => ">=",
            TokenKind::Shr => ">>",
            TokenKind::Ushr => ">>>",
            TokenKind::UshrEq => ">>>=",
            TokenKind::IntLiteral(_) => "integer literal",
            TokenKind::HexLiteral(_) => "hex literal",
            TokenKind::FloatLiteral(_) => "float literal",
            TokenKind::CharLiteral(_) => "character literal",
            TokenKind::StrLiteral(_) => "string literal",
            TokenKind::Ident(_) => "identifier",
            TokenKind::Label(_) => "label",
            TokenKind::Comment => "comment",
            TokenKind::Eol => "end of line",
            TokenKind::Eof => "end of file",
            TokenKind::None => "<none>",
            TokenKind::Unknown => "<unknown>",
            TokenKind::MDefine => "#define",
            TokenKind::MIf => "#if",
            TokenKind::MElse => "#else",
            TokenKind::MEndif => "#endif",
            TokenKind::MUndef => "#undef",
            TokenKind::MInclude => "#include",
            TokenKind::MTryinclude => "#tryinclude",
            TokenKind::MPragma => "#pragma",
            TokenKind::MEndinput => "#endinput",
        }
    }
}

// Keep the per-token footprint small; tokens are cloned into macro bodies.
// TokenKind: 8-byte payload + discriminant = 16; TokenPos: 8 each.
crate::static_assert_size!(TokenKind, 16);
crate::static_assert_size!(Token, 32);
