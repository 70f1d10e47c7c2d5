//! Directive keyword resolution.
//!
//! The keyword table maps `#`-prefixed spellings to directive tags. The `#`
//! is part of the looked-up spelling: the directive reader folds it into the
//! identifier it collects, so `# define` (with a space) never matches.
//!
//! The lookup uses the spelling's length as a first-pass filter, then
//! matches against the keywords of that length.

use quill_ir::TokenKind;

/// Look up a directive keyword by its full spelling, `#` included.
///
/// Returns `None` for everything that is not a directive keyword, which
/// covers every plain identifier (those never start with `#`).
#[inline]
pub(crate) fn lookup(spelling: &[u8]) -> Option<TokenKind> {
    if spelling.first() != Some(&b'#') {
        return None;
    }

    match spelling.len() {
        3 => match spelling {
            b"#if" => Some(TokenKind::MIf),
            _ => None,
        },
        5 => match spelling {
            b"#else" => Some(TokenKind::MElse),
            _ => None,
        },
        6 => match spelling {
            b"#endif" => Some(TokenKind::MEndif),
            b"#undef" => Some(TokenKind::MUndef),
            _ => None,
        },
        7 => match spelling {
            b"#define" => Some(TokenKind::MDefine),
            b"#pragma" => Some(TokenKind::MPragma),
            _ => None,
        },
        8 => match spelling {
            b"#include" => Some(TokenKind::MInclude),
            _ => None,
        },
        9 => match spelling {
            b"#endinput" => Some(TokenKind::MEndinput),
            _ => None,
        },
        11 => match spelling {
            b"#tryinclude" => Some(TokenKind::MTryinclude),
            _ => None,
        },
        _ => None,
    }
}
