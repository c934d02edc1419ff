//! Push-driven statement and expression parser.
//!
//! The lexer pushes one [`Token`] at a time; the parser shift-reduces it
//! against an operand stack and an operator stack, builds [`Node`] subtrees,
//! and hands each finished statement to the consumer before
//! [`Parser::push`] returns. Statement fields accumulate flat; a
//! [`Token::Bridge`] folds the next field into an [`Op::Concat`] with the
//! previous one.
//!
//! On a mismatch the parser reports one diagnostic, drops every partially
//! built subtree, and silently absorbs tokens until the end-of-statement
//! marker, then resumes at statement start.

use smallvec::SmallVec;

use crate::error::GantryError;
use crate::parser::ast::{Node, Op};
use crate::parser::front_end::Consumer;
use crate::parser::keywords::Keyword;
use crate::parser::lexer::Token;

/// Outcome of one [`Parser::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    /// Token consumed; more input expected.
    More,
    /// A statement was completed and delivered.
    Accept,
    /// The token did not fit the grammar; a diagnostic was delivered and
    /// the parser is resynchronizing at the next statement boundary.
    Error,
}

/// What the expression engine is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    /// A literal, parameter, unary operator, or `(`.
    Operand,
    /// A binary operator, postfix access, or closing delimiter.
    Operator,
    /// Just saw an identifier: `(` makes it a call, anything else makes it
    /// a parameter.
    MaybeCall,
    /// Just saw `.`: only a parameter name is valid.
    AfterDot,
}

/// One entry on the operator stack.
#[derive(Debug)]
enum OpEntry {
    /// Binary operator awaiting its right operand.
    Binary { op: Op, prec: u8 },
    /// Prefix operator awaiting its operand.
    Unary { op: Op, prec: u8 },
    /// `IF` seen; the condition is being parsed. Acts as a reduction
    /// barrier until `ELSE` arrives.
    If,
    /// `ELSE` seen; the alternative is being parsed.
    IfElse,
    /// Open parenthesized group.
    Paren,
    /// Open `[` index of a lookup.
    Bracket,
    /// Open function-call argument list.
    Call { name: String, args: Vec<Node> },
}

/// Ternary and `**` sit between the comparisons and the unaries.
const TERNARY_PREC: u8 = 8;
const NOT_PREC: u8 = 10;
const NEG_PREC: u8 = 11;

/// Binary keyword → (operator, precedence). Lowest binds loosest; all
/// binary operators are left-associative.
fn binary_op(kw: Keyword) -> Option<(Op, u8)> {
    Some(match kw {
        Keyword::Or => (Op::Or, 1),
        Keyword::And => (Op::And, 2),
        Keyword::Equal => (Op::Equals, 3),
        Keyword::Tilde => (Op::Concat, 4),
        Keyword::Plus => (Op::Add, 5),
        Keyword::Minus => (Op::Sub, 5),
        Keyword::Star => (Op::Mul, 6),
        Keyword::Slash => (Op::Div, 6),
        Keyword::Percent => (Op::Mod, 6),
        Keyword::Less => (Op::Lt, 7),
        Keyword::Greater => (Op::Gt, 7),
        Keyword::LessEqual => (Op::Lte, 7),
        Keyword::GreaterEqual => (Op::Gte, 7),
        Keyword::StarStar => (Op::Pow, 9),
        _ => return None,
    })
}

/// The push parser. One instance parses one token stream; independent
/// instances are fully independent.
pub struct Parser {
    /// Completed fields of the statement being built.
    fields: Vec<Node>,
    /// A bridge arrived; the next field concatenates with the last one.
    bridge_pending: bool,
    /// Inside `{…}`.
    in_expr: bool,
    expect: Expect,
    /// Identifier waiting for the call/parameter decision.
    pending_ident: Option<String>,
    operands: SmallVec<[Node; 8]>,
    ops: SmallVec<[OpEntry; 8]>,
    /// Absorbing tokens until the next end-of-statement.
    recovering: bool,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            bridge_pending: false,
            in_expr: false,
            expect: Expect::Operand,
            pending_ident: None,
            operands: SmallVec::new(),
            ops: SmallVec::new(),
            recovering: false,
        }
    }

    /// Process one token. A completed statement is delivered to `consumer`
    /// before this returns.
    pub fn push(&mut self, token: Token, consumer: &mut dyn Consumer) -> PushResult {
        if self.recovering {
            if token == Token::EndOfStatement {
                self.reset();
            }
            return PushResult::More;
        }
        if self.in_expr {
            self.push_expr(token, consumer)
        } else {
            self.push_statement(token, consumer)
        }
    }

    /// The lexer hit an error. If this statement already produced tokens the
    /// lexer still owes us its end-of-statement, so absorb until then;
    /// otherwise there is nothing to recover from.
    pub fn lexer_error(&mut self) {
        if self.mid_statement() {
            self.discard();
        }
    }

    /// Forget everything and return to statement start.
    pub fn reset(&mut self) {
        self.fields.clear();
        self.bridge_pending = false;
        self.in_expr = false;
        self.expect = Expect::Operand;
        self.pending_ident = None;
        self.operands.clear();
        self.ops.clear();
        self.recovering = false;
    }

    fn mid_statement(&self) -> bool {
        self.recovering || self.in_expr || self.bridge_pending || !self.fields.is_empty()
    }

    /// Drop partial subtrees and absorb tokens until end-of-statement.
    fn discard(&mut self) {
        self.reset();
        self.recovering = true;
    }

    fn syntax_error(
        &mut self,
        message: impl Into<String>,
        consumer: &mut dyn Consumer,
    ) -> PushResult {
        consumer.error(&GantryError::Syntax {
            message: message.into(),
        });
        self.discard();
        PushResult::Error
    }

    // ── Statement level ─────────────────────────────────────────────────────

    fn push_statement(&mut self, token: Token, consumer: &mut dyn Consumer) -> PushResult {
        match token {
            Token::Identifier(name) => self.add_field(Node::Str(name), consumer),
            Token::Str(text) => self.add_field(Node::Str(text), consumer),
            Token::Int(value) => self.add_field(Node::Integer(value), consumer),
            Token::Float(value) => self.add_field(Node::Float(value), consumer),
            Token::Bridge => {
                if self.fields.is_empty() {
                    return self.syntax_error("concatenation with no preceding field", consumer);
                }
                self.bridge_pending = true;
                PushResult::More
            }
            Token::Keyword(Keyword::LeftBrace) => {
                self.in_expr = true;
                self.expect = Expect::Operand;
                PushResult::More
            }
            Token::EndOfStatement => {
                if self.bridge_pending {
                    return self.syntax_error("statement ends after concatenation", consumer);
                }
                if self.fields.is_empty() {
                    return PushResult::More;
                }
                let fields = std::mem::take(&mut self.fields);
                consumer.statement(Node::Statement { fields });
                PushResult::Accept
            }
            Token::Keyword(kw) => {
                self.syntax_error(format!("unexpected '{}'", kw.lexeme()), consumer)
            }
        }
    }

    /// Append a completed field, folding it into a concatenation when a
    /// bridge is pending.
    fn add_field(&mut self, node: Node, consumer: &mut dyn Consumer) -> PushResult {
        if self.bridge_pending {
            self.bridge_pending = false;
            match self.fields.pop() {
                Some(left) => self
                    .fields
                    .push(Node::operator(Op::Concat, vec![left, node])),
                None => return self.syntax_error("concatenation with no preceding field", consumer),
            }
        } else {
            self.fields.push(node);
        }
        PushResult::More
    }

    // ── Expression level ────────────────────────────────────────────────────

    fn push_expr(&mut self, token: Token, consumer: &mut dyn Consumer) -> PushResult {
        match self.expect {
            Expect::Operand => self.expr_operand(token, consumer),
            Expect::Operator => self.expr_operator(token, consumer),
            Expect::MaybeCall => match token {
                Token::Keyword(Keyword::LeftParen) => {
                    let name = self.pending_ident.take().unwrap_or_default();
                    self.ops.push(OpEntry::Call {
                        name,
                        args: Vec::new(),
                    });
                    self.expect = Expect::Operand;
                    PushResult::More
                }
                other => {
                    // Not a call: the identifier was a parameter reference.
                    let name = self.pending_ident.take().unwrap_or_default();
                    self.operands.push(Node::Parameter(name));
                    self.expect = Expect::Operator;
                    self.push_expr(other, consumer)
                }
            },
            Expect::AfterDot => match token {
                Token::Identifier(name) => {
                    let Some(target) = self.operands.pop() else {
                        return self.syntax_error("malformed expression", consumer);
                    };
                    self.operands.push(Node::operator(
                        Op::Lookup,
                        vec![target, Node::Parameter(name)],
                    ));
                    self.expect = Expect::Operator;
                    PushResult::More
                }
                _ => self.syntax_error("expected parameter name after '.'", consumer),
            },
        }
    }

    fn expr_operand(&mut self, token: Token, consumer: &mut dyn Consumer) -> PushResult {
        match token {
            Token::Int(value) => self.operand(Node::Integer(value)),
            Token::Float(value) => self.operand(Node::Float(value)),
            Token::Str(text) => self.operand(Node::Str(text)),
            Token::Identifier(name) => {
                self.pending_ident = Some(name);
                self.expect = Expect::MaybeCall;
                PushResult::More
            }
            Token::Keyword(Keyword::True) => self.operand(Node::Bool(true)),
            Token::Keyword(Keyword::False) => self.operand(Node::Bool(false)),
            Token::Keyword(Keyword::Nan) => self.operand(Node::Float(f64::NAN)),
            Token::Keyword(Keyword::Infinity) => self.operand(Node::Float(f64::INFINITY)),
            Token::Keyword(Keyword::LeftParen) => {
                self.ops.push(OpEntry::Paren);
                PushResult::More
            }
            Token::Keyword(Keyword::Bang) => {
                self.ops.push(OpEntry::Unary {
                    op: Op::Not,
                    prec: NOT_PREC,
                });
                PushResult::More
            }
            Token::Keyword(Keyword::Minus) => {
                self.ops.push(OpEntry::Unary {
                    op: Op::Neg,
                    prec: NEG_PREC,
                });
                PushResult::More
            }
            // Unary plus is a no-op.
            Token::Keyword(Keyword::Plus) => PushResult::More,
            Token::Keyword(Keyword::RightParen) => {
                // Only valid as an empty argument list: `f()`.
                let empty_call =
                    matches!(self.ops.last(), Some(OpEntry::Call { args, .. }) if args.is_empty());
                if !empty_call {
                    return self.syntax_error("unexpected ')'", consumer);
                }
                let Some(OpEntry::Call { name, args }) = self.ops.pop() else {
                    return self.syntax_error("malformed expression", consumer);
                };
                self.operands.push(Node::Function { name, args });
                self.expect = Expect::Operator;
                PushResult::More
            }
            Token::Keyword(kw) => self.syntax_error(
                format!("unexpected '{}' in expression", kw.lexeme()),
                consumer,
            ),
            Token::Bridge => self.syntax_error("unexpected concatenation in expression", consumer),
            Token::EndOfStatement => self.syntax_error("unterminated expression", consumer),
        }
    }

    fn operand(&mut self, node: Node) -> PushResult {
        self.operands.push(node);
        self.expect = Expect::Operator;
        PushResult::More
    }

    fn expr_operator(&mut self, token: Token, consumer: &mut dyn Consumer) -> PushResult {
        match token {
            Token::Keyword(kw) => {
                if let Some((op, prec)) = binary_op(kw) {
                    if !self.reduce_to_precedence(prec, false) {
                        return self.syntax_error("malformed expression", consumer);
                    }
                    self.ops.push(OpEntry::Binary { op, prec });
                    self.expect = Expect::Operand;
                    return PushResult::More;
                }
                match kw {
                    Keyword::If => {
                        if !self.reduce_to_precedence(TERNARY_PREC, true) {
                            return self.syntax_error("malformed expression", consumer);
                        }
                        self.ops.push(OpEntry::If);
                        self.expect = Expect::Operand;
                        PushResult::More
                    }
                    Keyword::Else => {
                        if !self.reduce_to_barrier() {
                            return self.syntax_error("malformed expression", consumer);
                        }
                        match self.ops.last() {
                            Some(OpEntry::If) => {
                                self.ops.pop();
                                self.ops.push(OpEntry::IfElse);
                                self.expect = Expect::Operand;
                                PushResult::More
                            }
                            _ => self.syntax_error("ELSE without matching IF", consumer),
                        }
                    }
                    Keyword::Dot => {
                        self.expect = Expect::AfterDot;
                        PushResult::More
                    }
                    Keyword::LeftBracket => {
                        self.ops.push(OpEntry::Bracket);
                        self.expect = Expect::Operand;
                        PushResult::More
                    }
                    Keyword::RightBracket => {
                        if !self.reduce_to_barrier() {
                            return self.syntax_error("malformed expression", consumer);
                        }
                        match self.ops.last() {
                            Some(OpEntry::Bracket) => {
                                self.ops.pop();
                                let (Some(index), Some(target)) =
                                    (self.operands.pop(), self.operands.pop())
                                else {
                                    return self.syntax_error("malformed expression", consumer);
                                };
                                self.operands
                                    .push(Node::operator(Op::Lookup, vec![target, index]));
                                PushResult::More
                            }
                            _ => self.syntax_error("unexpected ']'", consumer),
                        }
                    }
                    Keyword::RightParen => {
                        if !self.reduce_to_barrier() {
                            return self.syntax_error("malformed expression", consumer);
                        }
                        match self.ops.pop() {
                            Some(OpEntry::Paren) => PushResult::More,
                            Some(OpEntry::Call { name, mut args }) => {
                                let Some(last) = self.operands.pop() else {
                                    return self.syntax_error("malformed expression", consumer);
                                };
                                args.push(last);
                                self.operands.push(Node::Function { name, args });
                                PushResult::More
                            }
                            Some(OpEntry::If) => {
                                self.syntax_error("expected ELSE before ')'", consumer)
                            }
                            _ => self.syntax_error("unexpected ')'", consumer),
                        }
                    }
                    Keyword::Comma => {
                        if !self.reduce_to_barrier() {
                            return self.syntax_error("malformed expression", consumer);
                        }
                        let Some(last) = self.operands.pop() else {
                            return self.syntax_error("malformed expression", consumer);
                        };
                        match self.ops.last_mut() {
                            Some(OpEntry::Call { args, .. }) => {
                                args.push(last);
                                self.expect = Expect::Operand;
                                PushResult::More
                            }
                            _ => self.syntax_error(
                                "',' outside a function argument list",
                                consumer,
                            ),
                        }
                    }
                    Keyword::RightBrace => {
                        if !self.reduce_to_barrier() {
                            return self.syntax_error("malformed expression", consumer);
                        }
                        match self.ops.last() {
                            Some(OpEntry::If) => {
                                self.syntax_error("expected ELSE before '}'", consumer)
                            }
                            Some(OpEntry::Paren) | Some(OpEntry::Call { .. }) => {
                                self.syntax_error("unclosed '(' in expression", consumer)
                            }
                            Some(OpEntry::Bracket) => {
                                self.syntax_error("unclosed '[' in expression", consumer)
                            }
                            Some(_) => self.syntax_error("malformed expression", consumer),
                            None => {
                                let Some(node) = self.operands.pop() else {
                                    return self.syntax_error("malformed expression", consumer);
                                };
                                if !self.operands.is_empty() {
                                    return self.syntax_error("malformed expression", consumer);
                                }
                                self.in_expr = false;
                                self.expect = Expect::Operand;
                                self.add_field(node, consumer)
                            }
                        }
                    }
                    other => self.syntax_error(
                        format!("unexpected '{}' in expression", other.lexeme()),
                        consumer,
                    ),
                }
            }
            Token::EndOfStatement => self.syntax_error("unterminated expression", consumer),
            Token::Bridge => self.syntax_error("unexpected concatenation in expression", consumer),
            Token::Int(_) | Token::Float(_) | Token::Str(_) | Token::Identifier(_) => {
                self.syntax_error("expected an operator", consumer)
            }
        }
    }

    // ── Reductions ──────────────────────────────────────────────────────────

    /// Pop and apply the top operator. The caller has checked it is not a
    /// barrier. Returns `false` if the operand stack is inconsistent.
    fn reduce_top(&mut self) -> bool {
        match self.ops.pop() {
            Some(OpEntry::Binary { op, .. }) => {
                let (Some(rhs), Some(lhs)) = (self.operands.pop(), self.operands.pop()) else {
                    return false;
                };
                self.operands.push(Node::operator(op, vec![lhs, rhs]));
                true
            }
            Some(OpEntry::Unary { op, .. }) => {
                let Some(operand) = self.operands.pop() else {
                    return false;
                };
                self.operands.push(Node::operator(op, vec![operand]));
                true
            }
            Some(OpEntry::IfElse) => {
                let (Some(alt), Some(cond), Some(then)) = (
                    self.operands.pop(),
                    self.operands.pop(),
                    self.operands.pop(),
                ) else {
                    return false;
                };
                self.operands
                    .push(Node::operator(Op::IfElse, vec![then, cond, alt]));
                true
            }
            _ => false,
        }
    }

    fn top_precedence(&self) -> Option<u8> {
        match self.ops.last() {
            Some(OpEntry::Binary { prec, .. }) | Some(OpEntry::Unary { prec, .. }) => Some(*prec),
            Some(OpEntry::IfElse) => Some(TERNARY_PREC),
            _ => None,
        }
    }

    /// Reduce while the stacked operator binds at least as tightly as the
    /// incoming one (strictly tighter for a right-associative newcomer).
    fn reduce_to_precedence(&mut self, prec: u8, right_assoc: bool) -> bool {
        while let Some(top) = self.top_precedence() {
            let reduce = if right_assoc { top > prec } else { top >= prec };
            if !reduce {
                break;
            }
            if !self.reduce_top() {
                return false;
            }
        }
        true
    }

    /// Reduce everything down to the nearest barrier (`(`, `[`, call, `IF`)
    /// or to an empty stack.
    fn reduce_to_barrier(&mut self) -> bool {
        while self.top_precedence().is_some() {
            if !self.reduce_top() {
                return false;
            }
        }
        true
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
