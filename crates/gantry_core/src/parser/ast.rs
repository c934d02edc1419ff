//! Statement-tree node definitions.
//!
//! A parsed statement is a [`Node::Statement`] owning a sequence of field
//! nodes; fields are literals, `{…}` expression trees, or
//! [`Op::Concat`] chains produced by whitespace-free adjacency. Ownership is
//! strictly hierarchical — dropping a root drops the whole subtree — and
//! string payloads are immutable once a node is built.

use std::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Operators
// ─────────────────────────────────────────────────────────────────────────────

/// The operator kinds an [`Node::Operator`] node can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Binary `+`.
    Add,
    /// Binary `-`.
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// Unary `-`.
    Neg,
    /// Unary `!`.
    Not,
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `>=`
    Gte,
    /// `=`
    Equals,
    /// `~`, and the implicit concatenation of adjacent field segments.
    Concat,
    /// `a.b` and `a[b]` member access; the right operand is a
    /// [`Node::Parameter`] for the dot form and an arbitrary expression for
    /// the bracket form.
    Lookup,
    /// `a IF cond ELSE b`, operands in the order (a, cond, b).
    IfElse,
}

impl Op {
    /// Number of operands this operator owns.
    pub fn arity(&self) -> usize {
        match self {
            Op::Neg | Op::Not => 1,
            Op::IfElse => 3,
            _ => 2,
        }
    }

    /// Lower-case name used by the [`fmt::Display`] rendering.
    pub fn name(&self) -> &'static str {
        match self {
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Div => "div",
            Op::Mod => "mod",
            Op::Pow => "pow",
            Op::Neg => "neg",
            Op::Not => "not",
            Op::And => "and",
            Op::Or => "or",
            Op::Lt => "lt",
            Op::Gt => "gt",
            Op::Lte => "lte",
            Op::Gte => "gte",
            Op::Equals => "equals",
            Op::Concat => "concat",
            Op::Lookup => "lookup",
            Op::IfElse => "ifelse",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Nodes
// ─────────────────────────────────────────────────────────────────────────────

/// One node of a statement tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Signed 64-bit integer literal.
    Integer(i64),
    /// IEEE-754 double literal (also `NAN` and `INFINITY`).
    Float(f64),
    /// `TRUE` / `FALSE` literal.
    Bool(bool),
    /// String literal or textual field segment, escapes already resolved.
    Str(String),
    /// An identifier resolved at evaluation time by the interpreter.
    Parameter(String),
    /// An operator application; `operands.len() == op.arity()`.
    Operator {
        /// The operator kind.
        op: Op,
        /// Operands in source order.
        operands: Vec<Node>,
    },
    /// A function call; zero or more argument expressions.
    Function {
        /// The function name, lower-cased by the lexer.
        name: String,
        /// Arguments in source order.
        args: Vec<Node>,
    },
    /// One parsed command line: the field sequence handed to the consumer.
    Statement {
        /// Fields in source order.
        fields: Vec<Node>,
    },
}

impl Node {
    /// Build an operator node, checking arity in debug builds.
    pub fn operator(op: Op, operands: Vec<Node>) -> Node {
        debug_assert_eq!(operands.len(), op.arity(), "operand count for {op:?}");
        Node::Operator { op, operands }
    }
}

impl fmt::Display for Node {
    /// Compact s-expression rendering, used by `gcat` and the tests.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Integer(v) => write!(f, "{v}"),
            Node::Float(v) => write!(f, "{v}"),
            Node::Bool(v) => write!(f, "{v}"),
            Node::Str(s) => write!(f, "{s:?}"),
            Node::Parameter(name) => write!(f, "{name}"),
            Node::Operator { op, operands } => {
                write!(f, "({}", op.name())?;
                for operand in operands {
                    write!(f, " {operand}")?;
                }
                write!(f, ")")
            }
            Node::Function { name, args } => {
                write!(f, "({name}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, ")")
            }
            Node::Statement { fields } => {
                write!(f, "(statement")?;
                for field in fields {
                    write!(f, " {field}")?;
                }
                write!(f, ")")
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
