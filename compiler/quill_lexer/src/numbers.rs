//! Numeric literal scanning: integer, hex, and float with exponent.
//!
//! Digit runs accumulate into the lexer's literal scratch; conversion to a
//! value happens afterwards with checked 64-bit arithmetic. Underscores are
//! permitted between digits of integer and hex literals and are ignored when
//! computing the value.

use quill_ir::{DiagKind, TokenKind, TokenPos};

use crate::lexer::{hex_digit_value, is_digit, is_hex_digit, Lexer};

impl Lexer<'_> {
    /// Scan a number starting at the digit under the cursor.
    pub(crate) fn scan_number(&mut self, start: TokenPos) -> TokenKind {
        self.literal.clear();
        self.eat_separated_digits(is_digit);

        // `0x` / `0X` switches to hex; anything like `00x` or `1x` does not.
        if self.literal == b"0" && matches!(self.cursor.current(), b'x' | b'X') {
            self.cursor.advance();
            return self.scan_hex(start);
        }

        if self.cursor.current() != b'.' {
            return self.integer_value(start);
        }
        self.cursor.advance();
        self.literal.push(b'.');

        // At least one digit must follow the dot.
        if !is_digit(self.cursor.current()) {
            let found = self.cursor.current();
            self.report(self.here(), DiagKind::ExpectedDigitForFloat { found });
            return TokenKind::Unknown;
        }
        self.eat_plain_digits();

        if self.match_char(b'e') {
            self.literal.push(b'e');
            if self.match_char(b'-') {
                self.literal.push(b'-');
            }
            if !is_digit(self.cursor.current()) {
                let found = self.cursor.current();
                self.report(self.here(), DiagKind::ExpectedDigitForFloat { found });
                return TokenKind::Unknown;
            }
            self.eat_plain_digits();
        }

        TokenKind::FloatLiteral(parse_double(&self.literal).to_bits())
    }

    /// Scan hex digits after a consumed `0x` prefix.
    fn scan_hex(&mut self, start: TokenPos) -> TokenKind {
        self.literal.clear();
        self.eat_separated_digits(is_hex_digit);

        let mut value = 0u64;
        for &b in &self.literal {
            if b == b'_' {
                continue;
            }
            let next = value
                .checked_mul(16)
                .and_then(|v| v.checked_add(u64::from(hex_digit_value(b))));
            match next {
                Some(v) => value = v,
                None => {
                    self.report(start, DiagKind::IntLiteralOverflow);
                    break;
                }
            }
        }
        TokenKind::HexLiteral(value)
    }

    /// Convert the accumulated decimal digits, reporting overflow once.
    fn integer_value(&mut self, start: TokenPos) -> TokenKind {
        let mut value = 0u64;
        for &b in &self.literal {
            if b == b'_' {
                continue;
            }
            let next = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(b - b'0')));
            match next {
                Some(v) => value = v,
                None => {
                    self.report(start, DiagKind::IntLiteralOverflow);
                    break;
                }
            }
        }
        TokenKind::IntLiteral(value)
    }

    /// Accumulate a digit run, allowing `_` separators.
    fn eat_separated_digits(&mut self, digit: impl Fn(u8) -> bool) {
        loop {
            let c = self.cursor.current();
            if digit(c) || c == b'_' {
                self.literal.push(c);
                self.cursor.advance();
            } else {
                break;
            }
        }
    }

    /// Accumulate a plain digit run (fractional and exponent parts).
    fn eat_plain_digits(&mut self) {
        loop {
            let c = self.cursor.current();
            if is_digit(c) {
                self.literal.push(c);
                self.cursor.advance();
            } else {
                break;
            }
        }
    }
}

/// Decimal-exact conversion of an accumulated float spelling.
///
/// Integer part folds as `×10 + digit`; the fraction accumulates the same
/// way against a power-of-ten divisor; the optional exponent applies as
/// `10^(±exp)`. Underscores in the integer part are skipped.
fn parse_double(spelling: &[u8]) -> f64 {
    let mut i = 0;

    let mut number = 0.0f64;
    while let Some(&b) = spelling.get(i) {
        match b {
            b'0'..=b'9' => number = number * 10.0 + f64::from(b - b'0'),
            b'_' => {}
            _ => break,
        }
        i += 1;
    }

    debug_assert_eq!(spelling.get(i), Some(&b'.'));
    i += 1;

    let mut fraction = 0.0f64;
    let mut multiplier = 1.0f64;
    while let Some(&b) = spelling.get(i) {
        if !b.is_ascii_digit() {
            break;
        }
        fraction = fraction * 10.0 + f64::from(b - b'0');
        multiplier /= 10.0;
        i += 1;
    }
    number += fraction * multiplier;

    if spelling.get(i) == Some(&b'e') {
        i += 1;
        let mut sign = 1i32;
        if spelling.get(i) == Some(&b'-') {
            sign = -1;
            i += 1;
        }
        let mut exponent = 0i32;
        while let Some(&b) = spelling.get(i) {
            if !b.is_ascii_digit() {
                break;
            }
            exponent = exponent.saturating_mul(10).saturating_add(i32::from(b - b'0'));
            i += 1;
        }
        number *= 10.0f64.powi(exponent.saturating_mul(sign));
    }

    number
}
