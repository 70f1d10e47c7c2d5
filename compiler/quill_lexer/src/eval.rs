//! Constant-expression evaluation for `#if` and pragma conditions.
//!
//! The directive handler collects the line's tokens with macro expansion
//! off and hands them here, so `defined` still sees unexpanded names. The
//! evaluator does its own substitution through the macro table: a name
//! evaluates to its macro body (which must itself form a complete
//! expression), and an undefined name evaluates to 0.
//!
//! Arithmetic is wrapping 64-bit signed with C precedence; there is no
//! `?:`.

use std::fmt;

use quill_ir::{Atom, CompileContext, Token, TokenKind, TokenPos};

use crate::preprocessor::MacroTable;

/// Why a condition failed to evaluate.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EvalErrorKind {
    /// A token that cannot appear in a constant expression.
    UnexpectedToken { found: &'static str },
    /// The expression ended mid-parse.
    UnexpectedEnd,
    /// `/` or `%` by zero.
    DivisionByZero,
    /// A `(` without its `)`.
    UnbalancedParens,
    /// `defined` not followed by a name.
    BadDefinedOperand,
    /// A macro expanded into itself.
    MacroRecursion,
}

/// Evaluation failure, anchored where it happened.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EvalError {
    pub loc: TokenPos,
    pub kind: EvalErrorKind,
}

impl EvalError {
    fn new(loc: TokenPos, kind: EvalErrorKind) -> Self {
        EvalError { loc, kind }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EvalErrorKind::UnexpectedToken { found } => {
                write!(f, "unexpected {found} in constant expression")
            }
            EvalErrorKind::UnexpectedEnd => write!(f, "constant expression ended unexpectedly"),
            EvalErrorKind::DivisionByZero => write!(f, "division by zero in constant expression"),
            EvalErrorKind::UnbalancedParens => write!(f, "missing `)` in constant expression"),
            EvalErrorKind::BadDefinedOperand => write!(f, "`defined` expects a name"),
            EvalErrorKind::MacroRecursion => write!(f, "macro expands into itself"),
        }
    }
}

impl std::error::Error for EvalError {}

/// Evaluate a directive condition. Returns the value and the number of
/// tokens consumed.
pub(crate) fn eval_condition(
    cc: &CompileContext,
    macros: &MacroTable,
    anchor: TokenPos,
    tokens: &[Token],
) -> Result<(i64, usize), EvalError> {
    let mut cx = EvalCx {
        cc,
        macros,
        active: Vec::new(),
    };
    let mut parser = Parser {
        cx: &mut cx,
        tokens,
        pos: 0,
        anchor,
    };
    let value = parser.expr_bp(0)?;
    let consumed = parser.pos;
    Ok((value, consumed))
}

/// Shared evaluation context, threaded through nested macro bodies.
struct EvalCx<'a> {
    cc: &'a CompileContext,
    macros: &'a MacroTable,
    /// Names currently being expanded, for cycle detection.
    active: Vec<Atom>,
}

struct Parser<'t, 'a, 'cx> {
    cx: &'cx mut EvalCx<'a>,
    tokens: &'t [Token],
    pos: usize,
    anchor: TokenPos,
}

impl<'t> Parser<'t, '_, '_> {
    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&'t Token> {
        let tok = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(tok)
    }

    /// Location for errors at the current position.
    fn loc(&self) -> TokenPos {
        self.peek()
            .map(|t| t.start)
            .or_else(|| self.tokens.last().map(|t| t.end))
            .unwrap_or(self.anchor)
    }

    fn expr_bp(&mut self, min_bp: u8) -> Result<i64, EvalError> {
        let mut lhs = self.unary()?;

        while let Some(tok) = self.peek() {
            let Some(bp) = binding_power(&tok.kind) else {
                break;
            };
            if bp < min_bp {
                break;
            }
            let op = tok.kind.clone();
            let op_loc = tok.start;
            self.pos += 1;

            let rhs = self.expr_bp(bp + 1)?;
            lhs = apply(&op, lhs, rhs, op_loc)?;
        }

        Ok(lhs)
    }

    fn unary(&mut self) -> Result<i64, EvalError> {
        let Some(tok) = self.peek() else {
            return Err(EvalError::new(self.loc(), EvalErrorKind::UnexpectedEnd));
        };
        match tok.kind {
            TokenKind::Bang => {
                self.pos += 1;
                Ok(i64::from(self.unary()? == 0))
            }
            TokenKind::Tilde => {
                self.pos += 1;
                Ok(!self.unary()?)
            }
            TokenKind::Minus => {
                self.pos += 1;
                Ok(self.unary()?.wrapping_neg())
            }
            TokenKind::Plus => {
                self.pos += 1;
                self.unary()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<i64, EvalError> {
        let err_loc = self.loc();
        let Some(tok) = self.bump() else {
            return Err(EvalError::new(err_loc, EvalErrorKind::UnexpectedEnd));
        };

        match tok.kind {
            TokenKind::IntLiteral(v) | TokenKind::HexLiteral(v) => Ok(v as i64),
            TokenKind::CharLiteral(c) => Ok(i64::from(c)),

            TokenKind::LParen => {
                let value = self.expr_bp(0)?;
                match self.bump().map(|t| &t.kind) {
                    Some(TokenKind::RParen) => Ok(value),
                    _ => Err(EvalError::new(self.loc(), EvalErrorKind::UnbalancedParens)),
                }
            }

            TokenKind::Ident(name) => {
                if self.cx.cc.lookup(name) == b"defined" {
                    self.defined_operand(tok.start)
                } else {
                    self.macro_value(name, tok.start)
                }
            }

            ref kind => Err(EvalError::new(
                tok.start,
                EvalErrorKind::UnexpectedToken { found: kind.name() },
            )),
        }
    }

    /// `defined NAME` or `defined(NAME)`.
    fn defined_operand(&mut self, kw_loc: TokenPos) -> Result<i64, EvalError> {
        let parenthesized = matches!(self.peek().map(|t| &t.kind), Some(TokenKind::LParen));
        if parenthesized {
            self.pos += 1;
        }

        let name = match self.bump() {
            Some(tok) => match tok.kind {
                TokenKind::Ident(name) => name,
                _ => return Err(EvalError::new(tok.start, EvalErrorKind::BadDefinedOperand)),
            },
            None => return Err(EvalError::new(kw_loc, EvalErrorKind::BadDefinedOperand)),
        };

        if parenthesized {
            match self.bump().map(|t| &t.kind) {
                Some(TokenKind::RParen) => {}
                _ => return Err(EvalError::new(self.loc(), EvalErrorKind::UnbalancedParens)),
            }
        }

        Ok(i64::from(self.cx.macros.contains(name)))
    }

    /// A name evaluates through the macro table; undefined names are 0.
    fn macro_value(&mut self, name: Atom, loc: TokenPos) -> Result<i64, EvalError> {
        let Some(body) = self.cx.macros.get(name).map(|m| m.body.clone()) else {
            return Ok(0);
        };
        if self.cx.active.contains(&name) {
            return Err(EvalError::new(loc, EvalErrorKind::MacroRecursion));
        }

        self.cx.active.push(name);
        let result = {
            let mut inner = Parser {
                cx: &mut *self.cx,
                tokens: &body,
                pos: 0,
                anchor: loc,
            };
            inner.expr_bp(0).and_then(|value| {
                if inner.pos < body.len() {
                    Err(EvalError::new(
                        body[inner.pos].start,
                        EvalErrorKind::UnexpectedToken {
                            found: body[inner.pos].kind.name(),
                        },
                    ))
                } else {
                    Ok(value)
                }
            })
        };
        self.cx.active.pop();
        result
    }
}

/// Left binding power of a binary operator, C precedence.
fn binding_power(kind: &TokenKind) -> Option<u8> {
    Some(match kind {
        TokenKind::PipePipe => 1,
        TokenKind::AmpAmp => 2,
        TokenKind::Pipe => 3,
        TokenKind::Caret => 4,
        TokenKind::Amp => 5,
        TokenKind::EqEq | TokenKind::NotEq => 6,
        TokenKind::Lt | TokenKind::LtEq | TokenKind::Gt | TokenKind::GtEq => 7,
        TokenKind::Shl | TokenKind::Shr | TokenKind::Ushr => 8,
        TokenKind::Plus | TokenKind::Minus => 9,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => 10,
        _ => return None,
    })
}

fn apply(op: &TokenKind, lhs: i64, rhs: i64, loc: TokenPos) -> Result<i64, EvalError> {
    Ok(match op {
        TokenKind::PipePipe => i64::from(lhs != 0 || rhs != 0),
        TokenKind::AmpAmp => i64::from(lhs != 0 && rhs != 0),
        TokenKind::Pipe => lhs | rhs,
        TokenKind::Caret => lhs ^ rhs,
        TokenKind::Amp => lhs & rhs,
        TokenKind::EqEq => i64::from(lhs == rhs),
        TokenKind::NotEq => i64::from(lhs != rhs),
        TokenKind::Lt => i64::from(lhs < rhs),
        TokenKind::LtEq => i64::from(lhs <= rhs),
        TokenKind::Gt => i64::from(lhs > rhs),
        TokenKind::GtEq => i64::from(lhs >= rhs),
        TokenKind::Shl => lhs.wrapping_shl(rhs as u32 & 63),
        TokenKind::Shr => lhs.wrapping_shr(rhs as u32 & 63),
        TokenKind::Ushr => ((lhs as u64).wrapping_shr(rhs as u32 & 63)) as i64,
        TokenKind::Plus => lhs.wrapping_add(rhs),
        TokenKind::Minus => lhs.wrapping_sub(rhs),
        TokenKind::Star => lhs.wrapping_mul(rhs),
        TokenKind::Slash => {
            if rhs == 0 {
                return Err(EvalError::new(loc, EvalErrorKind::DivisionByZero));
            }
            lhs.wrapping_div(rhs)
        }
        TokenKind::Percent => {
            if rhs == 0 {
                return Err(EvalError::new(loc, EvalErrorKind::DivisionByZero));
            }
            lhs.wrapping_rem(rhs)
        }
        _ => unreachable!("not a binary operator: {op:?}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_ir::Token;

    fn tok(kind: TokenKind) -> Token {
        Token::new(kind, TokenPos::START, TokenPos::START)
    }

    fn eval_kinds(cc: &CompileContext, macros: &MacroTable, kinds: Vec<TokenKind>) -> Result<(i64, usize), EvalError> {
        let tokens: Vec<Token> = kinds.into_iter().map(tok).collect();
        eval_condition(cc, macros, TokenPos::START, &tokens)
    }

    fn eval_simple(kinds: Vec<TokenKind>) -> Result<(i64, usize), EvalError> {
        let cc = CompileContext::new();
        let macros = MacroTable::new();
        eval_kinds(&cc, &macros, kinds)
    }

    use TokenKind::*;

    #[test]
    fn literals_and_precedence() {
        // 1 + 2 * 3 = 7
        let (v, used) = eval_simple(vec![IntLiteral(1), Plus, IntLiteral(2), Star, IntLiteral(3)])
            .unwrap();
        assert_eq!(v, 7);
        assert_eq!(used, 5);
    }

    #[test]
    fn parentheses_override_precedence() {
        // (1 + 2) * 3 = 9
        let (v, _) = eval_simple(vec![
            LParen,
            IntLiteral(1),
            Plus,
            IntLiteral(2),
            RParen,
            Star,
            IntLiteral(3),
        ])
        .unwrap();
        assert_eq!(v, 9);
    }

    #[test]
    fn unary_operators() {
        let (v, _) = eval_simple(vec![Bang, IntLiteral(0)]).unwrap();
        assert_eq!(v, 1);
        let (v, _) = eval_simple(vec![Minus, IntLiteral(5)]).unwrap();
        assert_eq!(v, -5);
        let (v, _) = eval_simple(vec![Tilde, IntLiteral(0)]).unwrap();
        assert_eq!(v, -1);
    }

    #[test]
    fn comparisons_and_logic() {
        let (v, _) = eval_simple(vec![
            IntLiteral(3),
            Lt,
            IntLiteral(4),
            AmpAmp,
            IntLiteral(2),
            EqEq,
            IntLiteral(2),
        ])
        .unwrap();
        assert_eq!(v, 1);
    }

    #[test]
    fn shifts_including_unsigned() {
        let (v, _) = eval_simple(vec![IntLiteral(1), Shl, IntLiteral(4)]).unwrap();
        assert_eq!(v, 16);
        let (v, _) = eval_simple(vec![Minus, IntLiteral(1), Ushr, IntLiteral(60)]).unwrap();
        assert_eq!(v, 15);
    }

    #[test]
    fn division_by_zero_errors() {
        let err = eval_simple(vec![IntLiteral(1), Slash, IntLiteral(0)]).unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::DivisionByZero);
    }

    #[test]
    fn char_literal_is_its_code() {
        let (v, _) = eval_simple(vec![CharLiteral(b'A')]).unwrap();
        assert_eq!(v, 65);
    }

    #[test]
    fn trailing_tokens_are_counted_not_consumed() {
        let (v, used) = eval_simple(vec![IntLiteral(1), IntLiteral(2)]).unwrap();
        assert_eq!(v, 1);
        assert_eq!(used, 1);
    }

    #[test]
    fn empty_input_errors() {
        let err = eval_simple(vec![]).unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::UnexpectedEnd);
    }

    #[test]
    fn unbalanced_parens_error() {
        let err = eval_simple(vec![LParen, IntLiteral(1)]).unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::UnbalancedParens);
    }

    #[test]
    fn undefined_name_is_zero() {
        let cc = CompileContext::new();
        let macros = MacroTable::new();
        let name = cc.intern(b"MISSING");
        let (v, _) = eval_kinds(&cc, &macros, vec![Ident(name)]).unwrap();
        assert_eq!(v, 0);
    }

    #[test]
    fn macro_name_evaluates_to_its_body() {
        let cc = CompileContext::new();
        let mut macros = MacroTable::new();
        let name = cc.intern(b"LIMIT");
        macros.define(name, TokenPos::START, vec![tok(IntLiteral(32))]);

        let (v, _) = eval_kinds(&cc, &macros, vec![Ident(name), Gt, IntLiteral(8)]).unwrap();
        assert_eq!(v, 1);
    }

    #[test]
    fn defined_with_and_without_parens() {
        let cc = CompileContext::new();
        let mut macros = MacroTable::new();
        let yes = cc.intern(b"YES");
        let no = cc.intern(b"NO");
        let defined = cc.intern(b"defined");
        macros.define(yes, TokenPos::START, Vec::new());

        let (v, _) = eval_kinds(&cc, &macros, vec![Ident(defined), Ident(yes)]).unwrap();
        assert_eq!(v, 1);
        let (v, _) = eval_kinds(
            &cc,
            &macros,
            vec![Ident(defined), LParen, Ident(no), RParen],
        )
        .unwrap();
        assert_eq!(v, 0);
    }

    #[test]
    fn defined_requires_a_name() {
        let cc = CompileContext::new();
        let macros = MacroTable::new();
        let defined = cc.intern(b"defined");
        let err = eval_kinds(&cc, &macros, vec![Ident(defined), IntLiteral(1)]).unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::BadDefinedOperand);
    }

    #[test]
    fn recursive_macro_errors() {
        let cc = CompileContext::new();
        let mut macros = MacroTable::new();
        let name = cc.intern(b"SELF");
        macros.define(name, TokenPos::START, vec![tok(Ident(name))]);

        let err = eval_kinds(&cc, &macros, vec![Ident(name)]).unwrap_err();
        assert_eq!(err.kind, EvalErrorKind::MacroRecursion);
    }

    #[test]
    fn float_is_rejected() {
        let err = eval_simple(vec![FloatLiteral(1.5f64.to_bits())]).unwrap_err();
        assert!(matches!(err.kind, EvalErrorKind::UnexpectedToken { .. }));
    }
}
