//! Incremental G-code lexer.
//!
//! The lexer is a byte-driven state machine: all lexical state lives in
//! [`Lexer`] fields, never in the call stack, so a scan may suspend between
//! any two bytes and resume with the next buffer. Context sensitivity —
//! statement position (line number / command name / arguments) and nesting
//! (command / expression / string) — is encoded in the state set.
//!
//! Arguments scan in three modes: *traditional*, where a key is a single
//! letter followed immediately by its value (`G1 X10`); *extended*
//! (`KEY=VALUE`); and *raw*, where the remainder of the line is one string
//! value. The command name selects the mode. A [`Token::Bridge`] is emitted
//! where segments touch without whitespace (`X1{y}2`) so the parser can
//! build a concatenation.
//!
//! Errors terminate token output until the next statement boundary; if part
//! of the statement was already delivered, the end-of-statement marker is
//! still sent so the parser can realign.
//!
//! A single reusable buffer accumulates token text, growing as needed and
//! never shrinking. Integer values are computed during the scan; float text
//! is handed to the standard library's converter once complete.

use crate::error::GantryError;
use crate::parser::keywords::{self, Keyword};

// ─────────────────────────────────────────────────────────────────────────────
// Token
// ─────────────────────────────────────────────────────────────────────────────

/// One lexical token, pushed into the parser in input order.
///
/// `Identifier` and `Str` own their payload; the parser moves it into the
/// statement tree during a reduction, so a token never outlives one push.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A word or punctuation keyword from the keyword table.
    Keyword(Keyword),
    /// Command name (uppercased) or expression identifier (lowercased).
    Identifier(String),
    /// String literal or textual argument segment, escapes resolved.
    Str(String),
    /// Signed 64-bit integer literal.
    Int(i64),
    /// IEEE-754 double literal.
    Float(f64),
    /// Two adjacent value segments must be concatenated.
    Bridge,
    /// A non-empty statement ended.
    EndOfStatement,
}

/// Receiver for the lexer's output.
///
/// The front end implements this by forwarding tokens into the parser and
/// diagnostics to the consumer; tests implement it with plain collectors.
pub trait TokenSink {
    /// One token, in input order.
    fn token(&mut self, token: Token);
    /// One diagnostic. The lexer has already entered its recovery state.
    fn error(&mut self, diagnostic: GantryError);
}

// ─────────────────────────────────────────────────────────────────────────────
// Character classification
// ─────────────────────────────────────────────────────────────────────────────

/// Intra-line whitespace. `\r` is included so CRLF input works unchanged.
fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | 0x0b | b'\r')
}

/// Bytes that may appear in an expression identifier.
fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// Bytes that open a symbol token inside an expression.
fn is_symbol_byte(b: u8) -> bool {
    matches!(
        b,
        b'`' | b'~'
            | b'!'
            | b'@'
            | b'#'
            | b'%'
            | b'^'
            | b'&'
            | b'*'
            | b'('
            | b')'
            | b'-'
            | b'+'
            | b'='
            | b'{'
            | b'['
            | b'}'
            | b']'
            | b'|'
            | b'\\'
            | b':'
            | b','
            | b'<'
            | b'.'
            | b'>'
            | b'?'
            | b'/'
    )
}

/// Two-character symbols are formed only by these continuations.
fn symbol_continues(first: u8, b: u8) -> bool {
    match first {
        b'*' => b == b'*',
        b'<' | b'>' | b'=' => b == b'=',
        _ => false,
    }
}

fn hex_value(b: u8) -> Option<i64> {
    (b as char).to_digit(16).map(i64::from)
}

// ─────────────────────────────────────────────────────────────────────────────
// States
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Line prefix: awaiting a statement.
    Newline,
    /// Discarding bytes until the next line after an error.
    ScanError,
    /// Inside an `N` line number.
    LineNumber,
    /// Whitespace after a line number.
    AfterLineNumber,
    /// Accumulating the command name.
    CommandName,
    /// Between arguments.
    Args,
    /// Accumulating an extended `KEY`.
    ExtendedKey,
    /// Key done, awaiting `=`.
    AfterExtendedKey,
    /// `=` seen, awaiting the value.
    AfterExtendedSeparator,
    /// Single-letter key done, awaiting the value.
    AfterTraditionalKey,
    /// Accumulating a value segment.
    ArgValue,
    /// `;` comment on a statement line.
    Comment,
    /// `;` comment on an otherwise empty line.
    EmptyLineComment,
    /// Inside `{…}`.
    Expr,
    /// Just left `{…}`, deciding how the segment continues.
    AfterExpr,
    /// Accumulating a punctuation symbol.
    Symbol,
    /// Accumulating an expression identifier.
    Identifier,
    /// Inside `"…"`.
    Str,
    /// Just after a backslash in a string.
    StrEscape,
    /// `\NNN` octal escape.
    StrOctal,
    /// `\xHH…` hex escape.
    StrHex,
    /// `\uHHHH` escape.
    StrLowUnicode,
    /// `\UHHHHHHHH` escape.
    StrHighUnicode,
    /// Seen `0`, base prefix may follow.
    NumberBase,
    /// Decimal integer digits.
    Decimal,
    /// Hex integer digits after `0x`.
    Hex,
    /// Binary digits after `0b`.
    Binary,
    /// Octal digits after a leading `0`.
    Octal,
    /// Seen `.`, digit would make it a float.
    Dot,
    /// Decimal digits past the i64 range.
    DecimalFloat,
    /// Digits after the decimal point.
    DecimalFraction,
    /// Optional `-` after `e`.
    DecimalExponentSign,
    /// Decimal exponent digits.
    DecimalExponent,
    /// Hex digits past the i64 range.
    HexFloat,
    /// Hex digits after the hex point.
    HexFraction,
    /// Optional `-` after `p`.
    HexExponentSign,
    /// Hex-float exponent digits (decimal).
    HexExponent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgMode {
    Traditional,
    Extended,
    Raw,
}

// ─────────────────────────────────────────────────────────────────────────────
// Lexer
// ─────────────────────────────────────────────────────────────────────────────

/// Resumable G-code lexer.
///
/// Feed byte buffers with [`Lexer::scan`]; the token sequence is identical
/// for any chunking of the same input. [`Lexer::finish`] flushes a dangling
/// statement by injecting a virtual newline.
///
/// # Example
///
/// ```
/// use gantry_core::parser::lexer::{Lexer, Token, TokenSink};
/// use gantry_core::GantryError;
///
/// #[derive(Default)]
/// struct Collect(Vec<Token>);
/// impl TokenSink for Collect {
///     fn token(&mut self, token: Token) { self.0.push(token); }
///     fn error(&mut self, _diagnostic: GantryError) {}
/// }
///
/// let mut lexer = Lexer::new();
/// let mut sink = Collect::default();
/// lexer.scan(b"G1 X10\n", &mut sink);
/// assert_eq!(sink.0.len(), 4); // G1, X, 10, end-of-statement
/// ```
pub struct Lexer {
    state: State,
    /// Reusable token accumulation buffer. Cleared between tokens, grown on
    /// demand, never shrunk.
    buf: Vec<u8>,
    /// Integer value accumulated during numeric and escape scanning.
    int_value: i64,
    /// Digits accepted by the current numeric or escape sub-scan.
    digit_count: u8,
    /// 1-based position of the byte being processed.
    line: u32,
    column: u32,
    arg_mode: ArgMode,
    /// State to restore once the current string literal closes.
    after_str: State,
    /// Whether the current argument segment is a value (vs. a key).
    in_arg_value: bool,
    /// Whether the current statement has produced any token yet. Decides
    /// whether an error path still owes the parser an end-of-statement.
    sent_tokens: bool,
}

impl Lexer {
    pub fn new() -> Self {
        Self {
            state: State::Newline,
            buf: Vec::new(),
            int_value: 0,
            digit_count: 0,
            line: 1,
            column: 1,
            arg_mode: ArgMode::Extended,
            after_str: State::Newline,
            in_arg_value: false,
            sent_tokens: false,
        }
    }

    /// Scan one buffer. May be called any number of times with any chunk
    /// sizes; every byte is processed under exactly one state transition.
    pub fn scan(&mut self, buf: &[u8], sink: &mut dyn TokenSink) {
        for &byte in buf {
            // A transition may hand the byte to its successor state, the
            // moral equivalent of backing the input pointer up one byte.
            while !self.dispatch(byte, sink) {}
            if byte == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    /// Flush a dangling statement. A final newline is injected if the
    /// machine is mid-statement; calling this twice is a no-op the second
    /// time.
    pub fn finish(&mut self, sink: &mut dyn TokenSink) {
        if self.state != State::Newline {
            self.scan(b"\n", sink);
        }
    }

    /// Return to the line prefix at position 1:1, discarding any partial
    /// token.
    pub fn reset(&mut self) {
        self.state = State::Newline;
        self.buf.clear();
        self.line = 1;
        self.column = 1;
        self.sent_tokens = false;
    }

    // ── Emission helpers ────────────────────────────────────────────────────

    fn emit(&mut self, sink: &mut dyn TokenSink, token: Token) {
        self.sent_tokens = true;
        sink.token(token);
    }

    /// End the statement and return to the line prefix.
    fn end_statement(&mut self, sink: &mut dyn TokenSink) {
        sink.token(Token::EndOfStatement);
        self.state = State::Newline;
        self.sent_tokens = false;
    }

    /// Report a diagnostic at the current position and stop emitting tokens
    /// until the next line. Callers may override the state afterwards when
    /// the error coincides with the line end.
    fn lex_error(&mut self, sink: &mut dyn TokenSink, message: impl Into<String>) {
        sink.error(GantryError::Lexical {
            message: message.into(),
            line: self.line,
            column: self.column,
        });
        self.state = State::ScanError;
        self.buf.clear();
    }

    /// Error at a newline: report, then close the statement boundary so the
    /// parser's recovery path realigns (only if it got any tokens).
    fn lex_error_at_newline(&mut self, sink: &mut dyn TokenSink, message: impl Into<String>) {
        self.lex_error(sink, message);
        if self.sent_tokens {
            self.end_statement(sink);
        } else {
            self.state = State::Newline;
        }
    }

    fn take_text(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.buf).into_owned();
        self.buf.clear();
        text
    }

    /// Emit the buffer as a string literal (escapes already resolved).
    fn emit_string_literal(&mut self, sink: &mut dyn TokenSink) {
        let text = self.take_text();
        self.emit(sink, Token::Str(text));
    }

    /// Emit the buffer as an argument key.
    fn emit_key(&mut self, sink: &mut dyn TokenSink) {
        let text = self.take_text();
        self.emit(sink, Token::Str(text));
    }

    fn emit_pending_key(&mut self, sink: &mut dyn TokenSink) {
        if !self.buf.is_empty() {
            self.emit_key(sink);
        }
    }

    /// Emit the buffer as a value segment. Traditional and extended values
    /// are classified into integer / float / string tokens; raw segments
    /// stay strings.
    fn emit_value_segment(&mut self, sink: &mut dyn TokenSink) {
        let text = self.take_text();
        let token = if self.arg_mode == ArgMode::Raw {
            Token::Str(text)
        } else {
            classify_value(text)
        };
        self.emit(sink, token);
    }

    fn emit_pending_value_segment(&mut self, sink: &mut dyn TokenSink) {
        if !self.buf.is_empty() {
            self.emit_value_segment(sink);
        }
    }

    /// Emit the buffered float text through the textual-to-double converter.
    fn emit_float(&mut self, sink: &mut dyn TokenSink) {
        let text = self.take_text();
        let value = if text.starts_with("0x") || text.starts_with("0X") {
            parse_hex_float(&text)
        } else {
            text.parse::<f64>().ok()
        };
        match value {
            Some(value) => self.emit(sink, Token::Float(value)),
            None => self.lex_error(sink, format!("Invalid float {text}")),
        }
    }

    /// Look the buffer up in the keyword table and emit the keyword.
    fn emit_symbol(&mut self, sink: &mut dyn TokenSink) -> bool {
        let text = String::from_utf8_lossy(&self.buf).into_owned();
        match keywords::lookup(&text) {
            Some(kw) => {
                self.buf.clear();
                self.emit(sink, Token::Keyword(kw));
                true
            }
            None => {
                self.lex_error(sink, format!("Unknown symbol '{text}'"));
                false
            }
        }
    }

    /// Finish an expression identifier: keyword if the uppercased text is in
    /// the table, identifier (lowercased) otherwise.
    fn finish_expr_identifier(&mut self, sink: &mut dyn TokenSink) {
        let word = self.take_text();
        match keywords::lookup(&word.to_ascii_uppercase()) {
            Some(kw) => self.emit(sink, Token::Keyword(kw)),
            None => self.emit(sink, Token::Identifier(word)),
        }
    }

    /// Select the argument mode from the completed command name, then emit
    /// the name.
    fn enter_args(&mut self, sink: &mut dyn TokenSink) {
        self.state = State::Args;
        self.arg_mode = if self.buf == b"M117" || self.buf == b"ECHO" {
            ArgMode::Raw
        } else if self.buf.len() > 1
            && self.buf[0].is_ascii_uppercase()
            && self.buf[1..].iter().all(|b| b.is_ascii_digit())
        {
            ArgMode::Traditional
        } else {
            ArgMode::Extended
        };
        let name = self.take_text();
        self.emit(sink, Token::Identifier(name));
    }

    /// Emit the command name for a line that ends at the name itself.
    fn emit_command_name(&mut self, sink: &mut dyn TokenSink) {
        let name = self.take_text();
        self.emit(sink, Token::Identifier(name));
    }

    fn enter_expr(&mut self, sink: &mut dyn TokenSink) {
        self.emit(sink, Token::Keyword(Keyword::LeftBrace));
        self.state = State::Expr;
    }

    /// Close the current argument segment on `b` (whitespace, `;`, `\n`, or
    /// the byte after an expression).
    fn end_arg_segment(&mut self, b: u8, sink: &mut dyn TokenSink) {
        match self.arg_mode {
            ArgMode::Traditional => {
                if !self.in_arg_value {
                    // Empty traditional value is legal.
                    self.emit(sink, Token::Str(String::new()));
                }
            }
            ArgMode::Extended => {
                if !self.in_arg_value {
                    self.lex_error(sink, "Expected '=' after parameter name");
                    if b == b'\n' {
                        if self.sent_tokens {
                            self.end_statement(sink);
                        } else {
                            self.state = State::Newline;
                        }
                    }
                    return;
                }
            }
            ArgMode::Raw => {
                if b != b'\r' && b != b'\n' {
                    // Raw values swallow everything to end of line; segments
                    // around an expression are stitched with bridges.
                    self.emit(sink, Token::Bridge);
                    self.buf.push(b);
                    self.state = State::ArgValue;
                    return;
                }
            }
        }
        match b {
            b';' => self.state = State::Comment,
            b'\n' => self.end_statement(sink),
            _ => self.state = State::Args,
        }
    }

    // ── Numeric helpers ─────────────────────────────────────────────────────

    fn would_overflow(&self, digit: i64, base: i64) -> bool {
        self.int_value > (i64::MAX - digit) / base
    }

    fn add_safe_digit(&mut self, digit: i64, base: i64) {
        self.int_value = self.int_value * base + digit;
        self.digit_count += 1;
    }

    /// Accumulate a digit with an upper bound, erroring past it.
    fn add_digit(
        &mut self,
        sink: &mut dyn TokenSink,
        digit: i64,
        base: i64,
        max: i64,
        message: &str,
    ) -> bool {
        if self.int_value > (max - digit) / base {
            self.lex_error(sink, message);
            return false;
        }
        self.add_safe_digit(digit, base);
        true
    }

    /// Append one Unicode scalar as UTF-8, degrading to `?` for values no
    /// encoding exists for (lone surrogates).
    fn push_unicode_scalar(&mut self) {
        match u32::try_from(self.int_value).ok().and_then(char::from_u32) {
            Some(c) => {
                let mut utf8 = [0u8; 4];
                self.buf.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            }
            None => self.buf.push(b'?'),
        }
    }

    // ── The state machine ───────────────────────────────────────────────────

    /// Process one byte in the current state. Returns `false` when the byte
    /// must be re-dispatched in the successor state.
    fn dispatch(&mut self, b: u8, sink: &mut dyn TokenSink) -> bool {
        match self.state {
            State::Newline => match b {
                b'N' | b'n' => self.state = State::LineNumber,
                b';' => self.state = State::EmptyLineComment,
                b'\n' => {}
                _ if is_space(b) => {}
                b'{' => {
                    // A line may open directly with an expression; the rest
                    // of the line then behaves like a raw value.
                    self.arg_mode = ArgMode::Raw;
                    self.in_arg_value = true;
                    self.enter_expr(sink);
                }
                _ => {
                    self.state = State::CommandName;
                    return false;
                }
            },

            State::ScanError => {
                if b == b'\n' {
                    if self.sent_tokens {
                        self.end_statement(sink);
                    } else {
                        self.state = State::Newline;
                    }
                }
            }

            State::LineNumber => match b {
                b'\n' => self.state = State::Newline,
                b';' => self.state = State::EmptyLineComment,
                b'"' => {
                    self.lex_error(sink, "String not allowed in line number");
                    return false;
                }
                b'{' => {
                    self.lex_error(sink, "Expression not allowed in line number");
                    return false;
                }
                b'0'..=b'9' => {}
                _ if is_space(b) => self.state = State::AfterLineNumber,
                _ => {
                    self.lex_error(
                        sink,
                        format!("Invalid character '{}' in line number", b as char),
                    );
                    return false;
                }
            },

            State::AfterLineNumber => match b {
                b'\n' => self.state = State::Newline,
                b';' => self.state = State::EmptyLineComment,
                b'{' => {
                    self.arg_mode = ArgMode::Raw;
                    self.in_arg_value = true;
                    self.enter_expr(sink);
                }
                _ if is_space(b) => {}
                _ => {
                    self.state = State::CommandName;
                    return false;
                }
            },

            State::CommandName => match b {
                b'{' => {
                    self.lex_error(sink, "Expressions not allowed in command name");
                    return false;
                }
                b'"' => {
                    self.lex_error(sink, "Strings not allowed in command name");
                    return false;
                }
                b'\n' => {
                    self.emit_command_name(sink);
                    self.end_statement(sink);
                }
                b';' => {
                    self.emit_command_name(sink);
                    self.state = State::Comment;
                }
                _ if is_space(b) => self.enter_args(sink),
                _ => self.buf.push(b.to_ascii_uppercase()),
            },

            State::Args => match b {
                b'{' => {
                    self.in_arg_value = false;
                    self.enter_expr(sink);
                }
                b'"' => match self.arg_mode {
                    ArgMode::Traditional => {
                        self.after_str = State::AfterTraditionalKey;
                        self.state = State::Str;
                    }
                    ArgMode::Extended => {
                        self.in_arg_value = false;
                        self.after_str = State::AfterExpr;
                        self.state = State::Str;
                    }
                    ArgMode::Raw => {
                        self.after_str = State::AfterExpr;
                        self.state = State::Str;
                    }
                },
                b'\n' => self.end_statement(sink),
                b';' => self.state = State::Comment,
                b'=' => {
                    self.lex_error(sink, "Expected parameter name before '='");
                    return false;
                }
                _ if is_space(b) => {}
                _ => match self.arg_mode {
                    ArgMode::Traditional => {
                        self.buf.push(b.to_ascii_uppercase());
                        self.emit_key(sink);
                        self.in_arg_value = false;
                        self.state = State::AfterTraditionalKey;
                    }
                    ArgMode::Extended => {
                        self.buf.push(b.to_ascii_uppercase());
                        self.in_arg_value = false;
                        self.state = State::ExtendedKey;
                    }
                    ArgMode::Raw => {
                        self.buf.push(b);
                        self.state = State::ArgValue;
                    }
                },
            },

            State::ExtendedKey => match b {
                b'\n' | b';' => {
                    self.buf.clear();
                    self.end_arg_segment(b, sink);
                }
                b'=' => {
                    self.emit_pending_key(sink);
                    self.state = State::AfterExtendedSeparator;
                }
                b'{' => {
                    self.emit_pending_key(sink);
                    self.emit(sink, Token::Bridge);
                    self.enter_expr(sink);
                }
                b'"' => {
                    self.emit_pending_key(sink);
                    self.emit(sink, Token::Bridge);
                    self.after_str = State::AfterExpr;
                    self.state = State::Str;
                }
                _ if is_space(b) => {
                    self.emit_pending_key(sink);
                    self.state = State::AfterExtendedKey;
                }
                _ => self.buf.push(b.to_ascii_uppercase()),
            },

            State::AfterExtendedKey => match b {
                b'=' => self.state = State::AfterExtendedSeparator,
                b'\n' | b';' => self.end_arg_segment(b, sink),
                _ if is_space(b) => {}
                _ => {
                    self.lex_error(sink, "Expected '=' after parameter name");
                    return false;
                }
            },

            State::AfterExtendedSeparator => match b {
                b'\n' | b';' => self.end_arg_segment(b, sink),
                b'"' => {
                    self.in_arg_value = true;
                    self.after_str = State::AfterExpr;
                    self.state = State::Str;
                }
                b'{' => {
                    self.in_arg_value = true;
                    self.enter_expr(sink);
                }
                _ if is_space(b) => {}
                _ => {
                    self.in_arg_value = true;
                    self.state = State::ArgValue;
                    return false;
                }
            },

            State::AfterTraditionalKey => match b {
                // An optional "=" keeps the two key styles uniform.
                b'=' => {}
                b'\n' | b';' => self.end_arg_segment(b, sink),
                b'"' => {
                    self.after_str = State::ArgValue;
                    self.state = State::Str;
                }
                b'{' => {
                    self.in_arg_value = true;
                    self.enter_expr(sink);
                }
                _ if is_space(b) => self.end_arg_segment(b, sink),
                _ => {
                    self.in_arg_value = true;
                    self.state = State::ArgValue;
                    return false;
                }
            },

            State::ArgValue => match b {
                b'\n' => {
                    self.emit_pending_value_segment(sink);
                    self.end_statement(sink);
                }
                b';' => {
                    if self.arg_mode == ArgMode::Raw {
                        self.buf.push(b);
                    } else {
                        self.emit_pending_value_segment(sink);
                        self.state = State::Comment;
                    }
                }
                b'"' => {
                    self.emit_pending_value_segment(sink);
                    self.emit(sink, Token::Bridge);
                    self.after_str = State::AfterExpr;
                    self.state = State::Str;
                }
                b'{' => {
                    self.emit_pending_value_segment(sink);
                    self.emit(sink, Token::Bridge);
                    self.enter_expr(sink);
                }
                _ if is_space(b) => {
                    if self.arg_mode == ArgMode::Raw {
                        self.buf.push(b);
                    } else {
                        self.emit_pending_value_segment(sink);
                        self.state = State::Args;
                    }
                }
                _ => self.buf.push(b),
            },

            State::Comment => {
                if b == b'\n' {
                    self.end_statement(sink);
                }
            }

            State::EmptyLineComment => {
                if b == b'\n' {
                    self.state = State::Newline;
                }
            }

            State::Expr => match b {
                b'\n' => self.lex_error_at_newline(sink, "Unterminated expression"),
                b'(' => self.emit(sink, Token::Keyword(Keyword::LeftParen)),
                b')' => self.emit(sink, Token::Keyword(Keyword::RightParen)),
                b'}' => {
                    self.emit(sink, Token::Keyword(Keyword::RightBrace));
                    self.state = State::AfterExpr;
                }
                b'0' => {
                    self.buf.push(b);
                    self.state = State::NumberBase;
                }
                b'\'' | b'`' => {
                    self.lex_error(sink, format!("Unexpected character '{}'", b as char));
                    return false;
                }
                b'.' => {
                    self.buf.push(b);
                    self.state = State::Dot;
                }
                b'"' => {
                    self.after_str = State::Expr;
                    self.state = State::Str;
                }
                b'1'..=b'9' => {
                    self.buf.push(b);
                    self.int_value = i64::from(b - b'0');
                    self.digit_count = 1;
                    self.state = State::Decimal;
                }
                _ if is_space(b) => {}
                _ if is_symbol_byte(b) => {
                    self.buf.push(b);
                    self.state = State::Symbol;
                }
                _ if is_ident_byte(b) => {
                    self.buf.push(b.to_ascii_lowercase());
                    self.state = State::Identifier;
                }
                _ => {
                    self.lex_error(sink, format!("Unexpected character '{}'", b as char));
                    return false;
                }
            },

            State::AfterExpr => {
                if self.arg_mode == ArgMode::Raw {
                    self.end_arg_segment(b, sink);
                } else {
                    match b {
                        b'\n' | b';' => self.end_arg_segment(b, sink),
                        _ if is_space(b) => {
                            if self.arg_mode == ArgMode::Extended && !self.in_arg_value {
                                self.state = State::AfterExtendedKey;
                            } else {
                                self.end_arg_segment(b, sink);
                            }
                        }
                        _ => {
                            if self.arg_mode == ArgMode::Traditional {
                                if self.in_arg_value {
                                    if b != b'"' && b != b'{' {
                                        self.emit(sink, Token::Bridge);
                                    }
                                    self.state = State::ArgValue;
                                } else {
                                    self.state = State::AfterTraditionalKey;
                                }
                            } else {
                                if b != b'"' && b != b'{' {
                                    self.emit(sink, Token::Bridge);
                                }
                                self.state = if self.in_arg_value {
                                    State::ArgValue
                                } else {
                                    State::ExtendedKey
                                };
                            }
                            return false;
                        }
                    }
                }
            }

            State::Symbol => {
                if self.buf.len() == 1 && symbol_continues(self.buf[0], b) {
                    self.buf.push(b);
                } else {
                    if self.emit_symbol(sink) {
                        self.state = State::Expr;
                    }
                    // On failure the byte drains through the error state, so
                    // a terminating newline still closes the statement.
                    return false;
                }
            }

            State::Identifier => {
                if is_ident_byte(b) {
                    self.buf.push(b.to_ascii_lowercase());
                } else {
                    self.finish_expr_identifier(sink);
                    if b == b'.' {
                        self.buf.push(b);
                        self.state = State::Dot;
                    } else {
                        self.state = State::Expr;
                        return false;
                    }
                }
            }

            State::Str => match b {
                b'\\' => self.state = State::StrEscape,
                b'"' => {
                    self.emit_string_literal(sink);
                    self.state = self.after_str;
                }
                b'\n' => self.lex_error_at_newline(sink, "Unterminated string"),
                _ => self.buf.push(b),
            },

            State::StrEscape => match b {
                b'a' => self.push_escape(0x07),
                b'b' => self.push_escape(0x08),
                b'e' => self.push_escape(0x1b),
                b'f' => self.push_escape(0x0c),
                b'n' => self.push_escape(0x0a),
                b'r' => self.push_escape(0x0d),
                b't' => self.push_escape(0x09),
                b'v' => self.push_escape(0x0b),
                b'\\' => self.push_escape(0x5c),
                b'\'' => self.push_escape(0x27),
                b'"' => self.push_escape(0x22),
                b'?' => self.push_escape(0x3f),
                b'x' => {
                    self.int_value = 0;
                    self.digit_count = 0;
                    self.state = State::StrHex;
                }
                b'u' => {
                    self.int_value = 0;
                    self.digit_count = 0;
                    self.state = State::StrLowUnicode;
                }
                b'U' => {
                    self.int_value = 0;
                    self.digit_count = 0;
                    self.state = State::StrHighUnicode;
                }
                b'\n' => self.lex_error_at_newline(sink, "Unterminated string"),
                b'0'..=b'9' => {
                    self.int_value = 0;
                    self.digit_count = 0;
                    self.state = State::StrOctal;
                    return false;
                }
                _ => {
                    self.lex_error(sink, format!("Illegal string escape \\{}", b as char));
                    return false;
                }
            },

            State::StrOctal => match b {
                b'0'..=b'7' => {
                    if self.add_digit(
                        sink,
                        i64::from(b - b'0'),
                        8,
                        255,
                        "Octal escape (\\nnn) exceeds byte value",
                    ) && self.digit_count == 3
                    {
                        let value = self.int_value as u8;
                        self.buf.push(value);
                        self.state = State::Str;
                    }
                }
                b'8' | b'9' => {
                    self.lex_error(sink, "Illegal digit in octal escape (\\nnn)");
                    return false;
                }
                _ => {
                    let value = self.int_value as u8;
                    self.buf.push(value);
                    self.state = State::Str;
                    return false;
                }
            },

            State::StrHex => match hex_value(b) {
                Some(digit) => {
                    self.add_digit(sink, digit, 16, 255, "Hex escape exceeds byte value");
                }
                None => {
                    if self.digit_count == 0 {
                        self.lex_error(
                            sink,
                            "Hex string escape (\\x) requires at least one digit",
                        );
                    } else {
                        let value = self.int_value as u8;
                        self.buf.push(value);
                        self.state = State::Str;
                    }
                    return false;
                }
            },

            State::StrLowUnicode => match hex_value(b) {
                Some(digit) => {
                    self.add_safe_digit(digit, 16);
                    if self.digit_count == 4 {
                        self.push_unicode_scalar();
                        self.state = State::Str;
                    }
                }
                None => {
                    self.lex_error(
                        sink,
                        "Low unicode escape (\\u) requires exactly four digits",
                    );
                    return false;
                }
            },

            State::StrHighUnicode => match hex_value(b) {
                Some(digit) => {
                    if self.add_digit(
                        sink,
                        digit,
                        16,
                        0x0010_FFFF,
                        "High unicode escape (\\U) exceeds unicode value",
                    ) && self.digit_count == 8
                    {
                        self.push_unicode_scalar();
                        self.state = State::Str;
                    }
                }
                None => {
                    self.lex_error(
                        sink,
                        "High unicode escape (\\U) requires exactly eight digits",
                    );
                    return false;
                }
            },

            State::NumberBase => match b {
                b'b' | b'B' => {
                    self.buf.clear();
                    self.int_value = 0;
                    self.digit_count = 0;
                    self.state = State::Binary;
                }
                b'x' | b'X' => {
                    self.buf.push(b);
                    self.int_value = 0;
                    self.digit_count = 0;
                    self.state = State::Hex;
                }
                b'.' => {
                    self.buf.push(b);
                    self.state = State::DecimalFraction;
                }
                b'e' | b'E' => {
                    self.buf.push(b);
                    self.digit_count = 0;
                    self.state = State::DecimalExponentSign;
                }
                b'0'..=b'9' => {
                    self.buf.clear();
                    self.int_value = 0;
                    self.digit_count = 0;
                    self.state = State::Octal;
                    return false;
                }
                _ => {
                    self.buf.clear();
                    self.emit(sink, Token::Int(0));
                    self.state = State::Expr;
                    return false;
                }
            },

            State::Decimal => match b {
                b'.' => {
                    self.buf.push(b);
                    self.state = State::DecimalFraction;
                }
                b'e' | b'E' => {
                    self.buf.push(b);
                    self.digit_count = 0;
                    self.state = State::DecimalExponentSign;
                }
                b'0'..=b'9' => {
                    self.buf.push(b);
                    let digit = i64::from(b - b'0');
                    if self.would_overflow(digit, 10) {
                        // Out of i64 range: keep scanning as a float, all
                        // digits are still in the buffer.
                        self.state = State::DecimalFloat;
                    } else {
                        self.add_safe_digit(digit, 10);
                    }
                }
                _ => {
                    self.buf.clear();
                    let value = self.int_value;
                    self.emit(sink, Token::Int(value));
                    self.state = State::Expr;
                    return false;
                }
            },

            State::Hex => match b {
                b'.' => {
                    self.buf.push(b);
                    self.state = State::HexFraction;
                }
                b'p' | b'P' => {
                    self.buf.push(b);
                    self.digit_count = 0;
                    self.state = State::HexExponentSign;
                }
                _ => match hex_value(b) {
                    Some(digit) => {
                        self.buf.push(b);
                        if self.would_overflow(digit, 16) {
                            self.state = State::HexFloat;
                        } else {
                            self.add_safe_digit(digit, 16);
                        }
                    }
                    None => {
                        self.buf.clear();
                        let value = self.int_value;
                        self.emit(sink, Token::Int(value));
                        self.state = State::Expr;
                        return false;
                    }
                },
            },

            State::Binary => match b {
                b'0' | b'1' => {
                    self.add_digit(
                        sink,
                        i64::from(b - b'0'),
                        2,
                        i64::MAX,
                        "Binary literal exceeds maximum value",
                    );
                }
                b'.' => {
                    self.lex_error(sink, "Fractional binary literals not allowed");
                    return false;
                }
                b'2'..=b'9' => {
                    self.lex_error(sink, format!("Illegal binary digit '{}'", b as char));
                    return false;
                }
                _ => {
                    let value = self.int_value;
                    self.emit(sink, Token::Int(value));
                    self.state = State::Expr;
                    return false;
                }
            },

            State::Octal => match b {
                b'0'..=b'7' => {
                    self.add_digit(
                        sink,
                        i64::from(b - b'0'),
                        8,
                        i64::MAX,
                        "Octal literal exceeds maximum value",
                    );
                }
                b'.' => {
                    self.lex_error(sink, "Fractional octal literals not allowed");
                    return false;
                }
                b'8' | b'9' => {
                    self.lex_error(sink, format!("Illegal octal digit '{}'", b as char));
                    return false;
                }
                _ => {
                    let value = self.int_value;
                    self.emit(sink, Token::Int(value));
                    self.state = State::Expr;
                    return false;
                }
            },

            State::Dot => match b {
                b'0'..=b'9' => {
                    self.buf.push(b);
                    self.state = State::DecimalFraction;
                }
                _ => {
                    if self.emit_symbol(sink) {
                        self.state = State::Expr;
                        return false;
                    }
                }
            },

            State::DecimalFloat => match b {
                b'.' => {
                    self.buf.push(b);
                    self.state = State::DecimalFraction;
                }
                b'e' | b'E' => {
                    self.buf.push(b);
                    self.digit_count = 0;
                    self.state = State::DecimalExponentSign;
                }
                b'0'..=b'9' => self.buf.push(b),
                _ => {
                    self.emit_float(sink);
                    if self.state != State::ScanError {
                        self.state = State::Expr;
                    }
                    return false;
                }
            },

            State::DecimalFraction => match b {
                b'e' | b'E' => {
                    self.buf.push(b);
                    self.digit_count = 0;
                    self.state = State::DecimalExponentSign;
                }
                b'0'..=b'9' => self.buf.push(b),
                _ => {
                    self.emit_float(sink);
                    if self.state != State::ScanError {
                        self.state = State::Expr;
                    }
                    return false;
                }
            },

            State::DecimalExponentSign => {
                self.state = State::DecimalExponent;
                if b == b'-' {
                    self.buf.push(b);
                } else {
                    return false;
                }
            }

            State::DecimalExponent => match b {
                b'0'..=b'9' => {
                    self.buf.push(b);
                    self.digit_count += 1;
                }
                _ => {
                    if self.digit_count == 0 {
                        self.lex_error(sink, "No digits after decimal exponent delimiter");
                    } else {
                        self.emit_float(sink);
                        if self.state != State::ScanError {
                            self.state = State::Expr;
                        }
                    }
                    return false;
                }
            },

            State::HexFloat => match b {
                b'.' => {
                    self.buf.push(b);
                    self.state = State::HexFraction;
                }
                b'p' | b'P' => {
                    self.buf.push(b);
                    self.digit_count = 0;
                    self.state = State::HexExponentSign;
                }
                _ => {
                    if hex_value(b).is_some() {
                        self.buf.push(b);
                    } else {
                        self.emit_float(sink);
                        if self.state != State::ScanError {
                            self.state = State::Expr;
                        }
                        return false;
                    }
                }
            },

            State::HexFraction => match b {
                b'p' | b'P' => {
                    self.buf.push(b);
                    self.digit_count = 0;
                    self.state = State::HexExponentSign;
                }
                _ => {
                    if hex_value(b).is_some() {
                        self.buf.push(b);
                    } else {
                        self.emit_float(sink);
                        if self.state != State::ScanError {
                            self.state = State::Expr;
                        }
                        return false;
                    }
                }
            },

            State::HexExponentSign => {
                self.state = State::HexExponent;
                if b == b'-' {
                    self.buf.push(b);
                } else {
                    return false;
                }
            }

            State::HexExponent => match b {
                b'0'..=b'9' => {
                    self.buf.push(b);
                    self.digit_count += 1;
                }
                _ => {
                    if self.digit_count == 0 {
                        self.lex_error(sink, "No digits after hex exponent delimiter");
                    } else {
                        self.emit_float(sink);
                        if self.state != State::ScanError {
                            self.state = State::Expr;
                        }
                    }
                    return false;
                }
            },
        }
        true
    }

    fn push_escape(&mut self, value: u8) {
        self.buf.push(value);
        self.state = State::Str;
    }
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value classification
// ─────────────────────────────────────────────────────────────────────────────

/// Type a completed traditional/extended value segment.
///
/// Integer syntax (decimal, hex, binary, octal, optional sign) yields
/// [`Token::Int`]; decimal or hex float syntax yields [`Token::Float`];
/// everything else stays a string. A decimal that overflows i64 falls
/// through to the float reading.
fn classify_value(text: String) -> Token {
    if let Some(value) = parse_integer_value(&text) {
        return Token::Int(value);
    }
    if let Some(value) = parse_float_value(&text) {
        return Token::Float(value);
    }
    Token::Str(text)
}

fn split_sign(text: &str) -> (bool, &str) {
    match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    }
}

fn parse_integer_value(text: &str) -> Option<i64> {
    let (negative, digits) = split_sign(text);
    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2).ok()?
    } else if digits.len() > 1 && digits.starts_with('0') {
        u64::from_str_radix(&digits[1..], 8).ok()?
    } else if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse::<u64>().ok()?
    } else {
        return None;
    };
    if negative {
        // i64::MIN is representable with a leading minus.
        if magnitude > i64::MAX as u64 + 1 {
            return None;
        }
        Some((magnitude as i64).wrapping_neg())
    } else {
        i64::try_from(magnitude).ok()
    }
}

fn parse_float_value(text: &str) -> Option<f64> {
    let (negative, rest) = split_sign(text);
    let magnitude = if rest.starts_with("0x") || rest.starts_with("0X") {
        parse_hex_float(rest)?
    } else {
        // Gate on the leading byte so words like "NAN" stay strings.
        match rest.as_bytes().first() {
            Some(b) if b.is_ascii_digit() || *b == b'.' => rest.parse::<f64>().ok()?,
            _ => return None,
        }
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Convert hexadecimal float text (`0x[hex].[hex]p[-]digits`) to a double.
/// The standard library's converter has no hex form, so the mantissa and
/// binary exponent are assembled here.
fn parse_hex_float(text: &str) -> Option<f64> {
    let rest = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))?;
    let bytes = rest.as_bytes();
    let mut i = 0;
    let mut mantissa = 0f64;
    let mut any_digits = false;

    while i < bytes.len() {
        match hex_value(bytes[i]) {
            Some(d) => {
                mantissa = mantissa * 16.0 + d as f64;
                any_digits = true;
                i += 1;
            }
            None => break,
        }
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let mut scale = 1.0 / 16.0;
        while i < bytes.len() {
            match hex_value(bytes[i]) {
                Some(d) => {
                    mantissa += d as f64 * scale;
                    scale /= 16.0;
                    any_digits = true;
                    i += 1;
                }
                None => break,
            }
        }
    }
    if !any_digits {
        return None;
    }

    let mut exponent = 0i32;
    if i < bytes.len() {
        if bytes[i] != b'p' && bytes[i] != b'P' {
            return None;
        }
        i += 1;
        let negative = i < bytes.len() && bytes[i] == b'-';
        if negative {
            i += 1;
        }
        if i >= bytes.len() {
            return None;
        }
        let mut digits = 0;
        while i < bytes.len() {
            let b = bytes[i];
            if !b.is_ascii_digit() {
                return None;
            }
            exponent = exponent.saturating_mul(10).saturating_add(i32::from(b - b'0'));
            digits += 1;
            i += 1;
        }
        if digits == 0 {
            return None;
        }
        if negative {
            exponent = -exponent;
        }
    }

    Some(mantissa * 2f64.powi(exponent))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect {
        tokens: Vec<Token>,
        errors: Vec<GantryError>,
    }

    impl TokenSink for Collect {
        fn token(&mut self, token: Token) {
            self.tokens.push(token);
        }
        fn error(&mut self, diagnostic: GantryError) {
            self.errors.push(diagnostic);
        }
    }

    fn lex(src: &str) -> Collect {
        let mut lexer = Lexer::new();
        let mut sink = Collect::default();
        lexer.scan(src.as_bytes(), &mut sink);
        lexer.finish(&mut sink);
        sink
    }

    fn kw(k: Keyword) -> Token {
        Token::Keyword(k)
    }

    fn ident(s: &str) -> Token {
        Token::Identifier(s.into())
    }

    fn string(s: &str) -> Token {
        Token::Str(s.into())
    }

    // ── Argument modes ────────────────────────────────────────────────────────

    #[test]
    fn test_traditional_arguments() {
        let out = lex("G1 X10 Y20.5\n");
        assert!(out.errors.is_empty());
        assert_eq!(
            out.tokens,
            vec![
                ident("G1"),
                string("X"),
                Token::Int(10),
                string("Y"),
                Token::Float(20.5),
                Token::EndOfStatement,
            ]
        );
    }

    #[test]
    fn test_traditional_negative_value() {
        let out = lex("G1 X-5 Y-2.5\n");
        assert_eq!(
            out.tokens,
            vec![
                ident("G1"),
                string("X"),
                Token::Int(-5),
                string("Y"),
                Token::Float(-2.5),
                Token::EndOfStatement,
            ]
        );
    }

    #[test]
    fn test_traditional_empty_value() {
        let out = lex("G1 X\n");
        assert_eq!(
            out.tokens,
            vec![ident("G1"), string("X"), string(""), Token::EndOfStatement]
        );
    }

    #[test]
    fn test_traditional_optional_equals() {
        let out = lex("G1 X=10\n");
        assert_eq!(
            out.tokens,
            vec![ident("G1"), string("X"), Token::Int(10), Token::EndOfStatement]
        );
    }

    #[test]
    fn test_extended_arguments() {
        let out = lex("SET_FAN SPEED=0.5\n");
        assert!(out.errors.is_empty());
        assert_eq!(
            out.tokens,
            vec![
                ident("SET_FAN"),
                string("SPEED"),
                Token::Float(0.5),
                Token::EndOfStatement,
            ]
        );
    }

    #[test]
    fn test_extended_key_is_uppercased() {
        let out = lex("set_fan speed=1\n");
        assert_eq!(
            out.tokens,
            vec![
                ident("SET_FAN"),
                string("SPEED"),
                Token::Int(1),
                Token::EndOfStatement,
            ]
        );
    }

    #[test]
    fn test_extended_missing_equals() {
        let out = lex("CMD KEY\n");
        assert_eq!(out.errors.len(), 1);
        assert!(matches!(
            &out.errors[0],
            GantryError::Lexical { message, .. } if message.contains("Expected '='")
        ));
        // The statement boundary still reaches the parser.
        assert_eq!(out.tokens, vec![ident("CMD"), Token::EndOfStatement]);
    }

    #[test]
    fn test_extended_missing_value() {
        // `=` with nothing after it reports the same diagnostic as a bare key.
        let out = lex("CMD KEY=\n");
        assert_eq!(out.errors.len(), 1);
        assert!(matches!(
            &out.errors[0],
            GantryError::Lexical { message, .. } if message.contains("Expected '='")
        ));
    }

    #[test]
    fn test_raw_mode_swallows_line() {
        let out = lex("M117 hello; not a comment\n");
        assert_eq!(
            out.tokens,
            vec![
                ident("M117"),
                string("hello; not a comment"),
                Token::EndOfStatement,
            ]
        );
    }

    #[test]
    fn test_raw_mode_with_expression_bridges() {
        let out = lex("ECHO hello {x} world\n");
        assert_eq!(
            out.tokens,
            vec![
                ident("ECHO"),
                string("hello "),
                Token::Bridge,
                kw(Keyword::LeftBrace),
                ident("x"),
                kw(Keyword::RightBrace),
                Token::Bridge,
                string(" world"),
                Token::EndOfStatement,
            ]
        );
    }

    #[test]
    fn test_raw_mode_quoted_string() {
        let out = lex("M117 \"quoted \\\"str\\\"\"\n");
        assert!(out.errors.is_empty());
        assert_eq!(
            out.tokens,
            vec![ident("M117"), string("quoted \"str\""), Token::EndOfStatement]
        );
    }

    #[test]
    fn test_bridged_value_segments() {
        let out = lex("G1 X1{y}2\n");
        assert_eq!(
            out.tokens,
            vec![
                ident("G1"),
                string("X"),
                Token::Int(1),
                Token::Bridge,
                kw(Keyword::LeftBrace),
                ident("y"),
                kw(Keyword::RightBrace),
                Token::Bridge,
                Token::Int(2),
                Token::EndOfStatement,
            ]
        );
    }

    // ── Line prefix ───────────────────────────────────────────────────────────

    #[test]
    fn test_line_numbers_and_comments_are_skipped() {
        let out = lex("\n\n;comment\nN100 G1\n");
        assert_eq!(out.tokens, vec![ident("G1"), Token::EndOfStatement]);
    }

    #[test]
    fn test_line_number_rejects_garbage() {
        let out = lex("N1x2\nG1\n");
        assert_eq!(out.errors.len(), 1);
        // No tokens were sent for the bad line, so no end-of-statement either.
        assert_eq!(out.tokens, vec![ident("G1"), Token::EndOfStatement]);
    }

    #[test]
    fn test_command_name_only() {
        let out = lex("G28\n");
        assert_eq!(out.tokens, vec![ident("G28"), Token::EndOfStatement]);
    }

    #[test]
    fn test_command_name_is_uppercased() {
        let out = lex("g28 x0\n");
        assert_eq!(
            out.tokens,
            vec![ident("G28"), string("X"), Token::Int(0), Token::EndOfStatement]
        );
    }

    #[test]
    fn test_comment_after_arguments() {
        let out = lex("G1 X1 ; move\n");
        assert_eq!(
            out.tokens,
            vec![ident("G1"), string("X"), Token::Int(1), Token::EndOfStatement]
        );
    }

    #[test]
    fn test_leading_expression_statement() {
        let out = lex("{x}\n");
        assert_eq!(
            out.tokens,
            vec![
                kw(Keyword::LeftBrace),
                ident("x"),
                kw(Keyword::RightBrace),
                Token::EndOfStatement,
            ]
        );
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    #[test]
    fn test_expression_tokens() {
        let out = lex("G1 X{1+2*3}\n");
        assert_eq!(
            out.tokens,
            vec![
                ident("G1"),
                string("X"),
                kw(Keyword::LeftBrace),
                Token::Int(1),
                kw(Keyword::Plus),
                Token::Int(2),
                kw(Keyword::Star),
                Token::Int(3),
                kw(Keyword::RightBrace),
                Token::EndOfStatement,
            ]
        );
    }

    #[test]
    fn test_expression_word_keywords() {
        let out = lex("{1 if true else nan}\n");
        assert_eq!(
            out.tokens,
            vec![
                kw(Keyword::LeftBrace),
                Token::Int(1),
                kw(Keyword::If),
                kw(Keyword::True),
                kw(Keyword::Else),
                kw(Keyword::Nan),
                kw(Keyword::RightBrace),
                Token::EndOfStatement,
            ]
        );
    }

    #[test]
    fn test_expression_identifiers_are_lowercased() {
        let out = lex("{Extruder.Temp}\n");
        assert_eq!(
            out.tokens,
            vec![
                kw(Keyword::LeftBrace),
                ident("extruder"),
                kw(Keyword::Dot),
                ident("temp"),
                kw(Keyword::RightBrace),
                Token::EndOfStatement,
            ]
        );
    }

    #[test]
    fn test_two_char_operators() {
        let out = lex("{1<=2**3}\n");
        assert_eq!(
            out.tokens,
            vec![
                kw(Keyword::LeftBrace),
                Token::Int(1),
                kw(Keyword::LessEqual),
                Token::Int(2),
                kw(Keyword::StarStar),
                Token::Int(3),
                kw(Keyword::RightBrace),
                Token::EndOfStatement,
            ]
        );
    }

    #[test]
    fn test_double_equals_is_unknown() {
        let out = lex("{a == b}\n");
        assert_eq!(out.errors.len(), 1);
        assert!(matches!(
            &out.errors[0],
            GantryError::Lexical { message, .. } if message.contains("Unknown symbol '=='")
        ));
    }

    #[test]
    fn test_unterminated_expression() {
        let out = lex("G1 X{1+\nG2\n");
        assert_eq!(out.errors.len(), 1);
        assert!(matches!(
            &out.errors[0],
            GantryError::Lexical { message, .. } if message == "Unterminated expression"
        ));
        // Tokens were sent before the error, so the boundary is closed; the
        // next line lexes normally.
        assert_eq!(
            out.tokens,
            vec![
                ident("G1"),
                string("X"),
                kw(Keyword::LeftBrace),
                Token::Int(1),
                kw(Keyword::Plus),
                Token::EndOfStatement,
                ident("G2"),
                Token::EndOfStatement,
            ]
        );
    }

    // ── Numeric literals ──────────────────────────────────────────────────────

    #[test]
    fn test_integer_bases() {
        let out = lex("{0x1A} {0b1010} {0755} {0}\n");
        let ints: Vec<i64> = out
            .tokens
            .iter()
            .filter_map(|t| match t {
                Token::Int(v) => Some(*v),
                _ => None,
            })
            .collect();
        assert_eq!(ints, vec![26, 10, 493, 0]);
    }

    #[test]
    fn test_int64_max_round_trip() {
        let out = lex("{9223372036854775807}\n");
        assert!(out.tokens.contains(&Token::Int(i64::MAX)));
    }

    #[test]
    fn test_decimal_overflow_becomes_float() {
        let out = lex("{9223372036854775808}\n");
        assert!(out.errors.is_empty());
        assert!(out.tokens.contains(&Token::Float(9.223372036854776e18)));
    }

    #[test]
    fn test_float_forms() {
        let out = lex("{1.5} {.5} {1.5e-3} {2e4} {0x1.8p1}\n");
        let floats: Vec<f64> = out
            .tokens
            .iter()
            .filter_map(|t| match t {
                Token::Float(v) => Some(*v),
                _ => None,
            })
            .collect();
        assert_eq!(floats, vec![1.5, 0.5, 1.5e-3, 2e4, 3.0]);
    }

    #[test]
    fn test_fractional_binary_rejected() {
        let out = lex("{0b10.1}\n");
        assert!(matches!(
            &out.errors[0],
            GantryError::Lexical { message, .. } if message.contains("Fractional binary")
        ));
    }

    #[test]
    fn test_fractional_octal_rejected() {
        let out = lex("{07.5}\n");
        assert!(matches!(
            &out.errors[0],
            GantryError::Lexical { message, .. } if message.contains("Fractional octal")
        ));
    }

    #[test]
    fn test_empty_exponent_rejected() {
        let out = lex("{1e}\n");
        assert!(matches!(
            &out.errors[0],
            GantryError::Lexical { message, .. } if message.contains("decimal exponent")
        ));
    }

    #[test]
    fn test_hex_float_value_segment() {
        let out = lex("G1 X0x1.8p1\n");
        assert_eq!(
            out.tokens,
            vec![ident("G1"), string("X"), Token::Float(3.0), Token::EndOfStatement]
        );
    }

    // ── String literals ───────────────────────────────────────────────────────

    #[test]
    fn test_string_escapes() {
        let out = lex("M117 \"\\a\\b\\e\\f\\n\\r\\t\\v\\\\\\'\\\"\\?\"\n");
        assert_eq!(
            out.tokens[1],
            string("\x07\x08\x1b\x0c\n\r\t\x0b\\'\"?")
        );
    }

    #[test]
    fn test_string_numeric_escapes() {
        let out = lex("M117 \"\\x41\\102\\u00e9\\U0001F600\"\n");
        assert_eq!(out.tokens[1], string("AB\u{e9}\u{1F600}"));
    }

    #[test]
    fn test_octal_escape_stops_at_three_digits() {
        let out = lex("M117 \"\\1014\"\n");
        assert_eq!(out.tokens[1], string("A4"));
    }

    #[test]
    fn test_hex_escape_stops_at_non_hex() {
        let out = lex("M117 \"\\x41z\"\n");
        assert_eq!(out.tokens[1], string("Az"));
    }

    #[test]
    fn test_octal_escape_overflow() {
        let out = lex("M117 \"\\777\"\n");
        assert!(matches!(
            &out.errors[0],
            GantryError::Lexical { message, .. } if message.contains("Octal escape")
        ));
    }

    #[test]
    fn test_illegal_escape() {
        let out = lex("M117 \"\\q\"\n");
        assert!(matches!(
            &out.errors[0],
            GantryError::Lexical { message, .. } if message.contains("Illegal string escape")
        ));
    }

    #[test]
    fn test_unicode_escape_requires_four_digits() {
        let out = lex("M117 \"\\u12g\"\n");
        assert!(matches!(
            &out.errors[0],
            GantryError::Lexical { message, .. } if message.contains("exactly four digits")
        ));
    }

    #[test]
    fn test_unterminated_string_position() {
        let out = lex("G1 \"abc\nG2\n");
        assert_eq!(
            out.errors,
            vec![GantryError::Lexical {
                message: "Unterminated string".into(),
                line: 1,
                column: 8,
            }]
        );
        assert_eq!(
            out.tokens,
            vec![ident("G1"), Token::EndOfStatement, ident("G2"), Token::EndOfStatement]
        );
    }

    // ── Incremental scanning ──────────────────────────────────────────────────

    #[test]
    fn test_byte_at_a_time_matches_whole_buffer() {
        let src = "N10 G1 X{1+2*max(3,4)} Y\"a\\n\" ;c\nECHO hi {x} bye\nM204 S0x10\n";
        let whole = lex(src);

        let mut lexer = Lexer::new();
        let mut split = Collect::default();
        for b in src.as_bytes() {
            lexer.scan(std::slice::from_ref(b), &mut split);
        }
        lexer.finish(&mut split);

        assert_eq!(whole.tokens, split.tokens);
        assert_eq!(whole.errors, split.errors);
    }

    #[test]
    fn test_finish_flushes_dangling_statement() {
        let mut lexer = Lexer::new();
        let mut sink = Collect::default();
        lexer.scan(b"G1 X1", &mut sink);
        assert!(!sink.tokens.contains(&Token::EndOfStatement));
        lexer.finish(&mut sink);
        assert_eq!(
            sink.tokens,
            vec![
                Token::Identifier("G1".into()),
                Token::Str("X".into()),
                Token::Int(1),
                Token::EndOfStatement,
            ]
        );
        // Finish is idempotent.
        lexer.finish(&mut sink);
        assert_eq!(sink.tokens.len(), 4);
    }

    #[test]
    fn test_reset_discards_partial_token() {
        let mut lexer = Lexer::new();
        let mut sink = Collect::default();
        lexer.scan(b"G1 X\"abc", &mut sink);
        lexer.reset();
        lexer.scan(b"G28\n", &mut sink);
        assert_eq!(
            sink.tokens,
            vec![
                Token::Identifier("G1".into()),
                Token::Str("X".into()),
                Token::Identifier("G28".into()),
                Token::EndOfStatement,
            ]
        );
    }

    // ── Value classification ──────────────────────────────────────────────────

    #[test]
    fn test_classify_value_forms() {
        assert_eq!(classify_value("10".into()), Token::Int(10));
        assert_eq!(classify_value("-5".into()), Token::Int(-5));
        assert_eq!(classify_value("+7".into()), Token::Int(7));
        assert_eq!(classify_value("0x1A".into()), Token::Int(26));
        assert_eq!(classify_value("0b101".into()), Token::Int(5));
        assert_eq!(classify_value("0755".into()), Token::Int(493));
        assert_eq!(classify_value("20.5".into()), Token::Float(20.5));
        assert_eq!(classify_value("1e3".into()), Token::Float(1000.0));
        assert_eq!(classify_value("0x1.8p1".into()), Token::Float(3.0));
        assert_eq!(
            classify_value("-9223372036854775808".into()),
            Token::Int(i64::MIN)
        );
        assert_eq!(classify_value("".into()), Token::Str("".into()));
        assert_eq!(classify_value("ABS".into()), Token::Str("ABS".into()));
        assert_eq!(classify_value("NAN".into()), Token::Str("NAN".into()));
        assert_eq!(classify_value("10mm".into()), Token::Str("10mm".into()));
        assert_eq!(classify_value("-".into()), Token::Str("-".into()));
    }

    #[test]
    fn test_parse_hex_float_forms() {
        assert_eq!(parse_hex_float("0x1.8p1"), Some(3.0));
        assert_eq!(parse_hex_float("0x10"), Some(16.0));
        assert_eq!(parse_hex_float("0x.8"), Some(0.5));
        assert_eq!(parse_hex_float("0x1p-1"), Some(0.5));
        assert_eq!(parse_hex_float("0x"), None);
        assert_eq!(parse_hex_float("0x1p"), None);
        assert_eq!(parse_hex_float("0x1.8q1"), None);
    }
}
