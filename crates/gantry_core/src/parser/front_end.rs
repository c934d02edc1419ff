//! The front-end facade: one lexer bound to one parser.
//!
//! [`FrontEnd`] accepts arbitrary-sized byte chunks, forwards the lexer's
//! tokens into the parser, and routes diagnostics and finished statements to
//! the [`Consumer`]. Everything runs synchronously inside [`FrontEnd::feed`];
//! one instance is a self-contained single-threaded machine, and independent
//! instances share nothing.

use crate::error::GantryError;
use crate::parser::ast::Node;
use crate::parser::grammar::Parser;
use crate::parser::lexer::{Lexer, Token, TokenSink};

/// The capability interface a caller provides when creating a front end.
///
/// `error` is advisory: the front end keeps resynchronizing and parsing
/// regardless of what the consumer does with the diagnostic. `statement`
/// transfers ownership of the subtree; once it returns, the front end holds
/// no reference to any part of it.
pub trait Consumer {
    /// One diagnostic. Render with `Display` for the human-readable text.
    fn error(&mut self, diagnostic: &GantryError);
    /// One finished statement, in input order.
    fn statement(&mut self, statement: Node);
}

/// Streaming G-code front end.
///
/// # Example
///
/// ```
/// use gantry_core::parser::{Consumer, FrontEnd};
/// use gantry_core::parser::ast::Node;
/// use gantry_core::GantryError;
///
/// #[derive(Default)]
/// struct Print;
/// impl Consumer for Print {
///     fn error(&mut self, diagnostic: &GantryError) {
///         eprintln!("{diagnostic}");
///     }
///     fn statement(&mut self, statement: Node) {
///         println!("{statement}");
///     }
/// }
///
/// let mut front_end = FrontEnd::new(Print);
/// front_end.feed(b"G1 X10 Y{1+2}\n");
/// front_end.finish();
/// ```
pub struct FrontEnd<C: Consumer> {
    lexer: Lexer,
    parser: Parser,
    consumer: C,
}

/// Adapter gluing the lexer's token stream to the parser for one `feed`.
struct Feed<'a, C: Consumer> {
    parser: &'a mut Parser,
    consumer: &'a mut C,
}

impl<C: Consumer> TokenSink for Feed<'_, C> {
    fn token(&mut self, token: Token) {
        // The parser reports its own diagnostics and recovers internally;
        // the push outcome needs no handling here.
        let _ = self.parser.push(token, &mut *self.consumer);
    }

    fn error(&mut self, diagnostic: GantryError) {
        self.consumer.error(&diagnostic);
        // Drop whatever the parser built from this statement; the lexer
        // closes the statement boundary when it owes one.
        self.parser.lexer_error();
    }
}

impl<C: Consumer> FrontEnd<C> {
    /// Create a front end delivering to `consumer`.
    pub fn new(consumer: C) -> Self {
        Self {
            lexer: Lexer::new(),
            parser: Parser::new(),
            consumer,
        }
    }

    /// Consume one chunk. Chunk boundaries are invisible: any partition of
    /// an input produces the same statements and diagnostics as the whole.
    pub fn feed(&mut self, bytes: &[u8]) {
        let Self {
            lexer,
            parser,
            consumer,
        } = self;
        lexer.scan(bytes, &mut Feed { parser, consumer });
    }

    /// Flush a dangling statement. Idempotent.
    pub fn finish(&mut self) {
        let Self {
            lexer,
            parser,
            consumer,
        } = self;
        lexer.finish(&mut Feed { parser, consumer });
    }

    /// Return both machines to statement start at position 1:1.
    pub fn reset(&mut self) {
        self.lexer.reset();
        self.parser.reset();
    }

    /// The consumer, for inspection.
    pub fn consumer(&self) -> &C {
        &self.consumer
    }

    /// Tear down and hand the consumer back.
    pub fn into_consumer(self) -> C {
        self.consumer
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::Op;

    #[derive(Default, Debug, PartialEq)]
    struct Collect {
        statements: Vec<Node>,
        diagnostics: Vec<GantryError>,
    }

    impl Consumer for Collect {
        fn error(&mut self, diagnostic: &GantryError) {
            self.diagnostics.push(diagnostic.clone());
        }
        fn statement(&mut self, statement: Node) {
            self.statements.push(statement);
        }
    }

    fn parse(src: &str) -> Collect {
        let mut front_end = FrontEnd::new(Collect::default());
        front_end.feed(src.as_bytes());
        front_end.finish();
        front_end.into_consumer()
    }

    fn stmt(fields: Vec<Node>) -> Node {
        Node::Statement { fields }
    }

    fn s(text: &str) -> Node {
        Node::Str(text.into())
    }

    fn op(o: Op, operands: Vec<Node>) -> Node {
        Node::operator(o, operands)
    }

    // ── The concrete scenarios ────────────────────────────────────────────────

    #[test]
    fn test_traditional_statement() {
        let out = parse("G1 X10 Y20.5\n");
        assert!(out.diagnostics.is_empty());
        assert_eq!(
            out.statements,
            vec![stmt(vec![
                s("G1"),
                s("X"),
                Node::Integer(10),
                s("Y"),
                Node::Float(20.5),
            ])]
        );
    }

    #[test]
    fn test_extended_statement() {
        let out = parse("SET_FAN SPEED=0.5\n");
        assert!(out.diagnostics.is_empty());
        assert_eq!(
            out.statements,
            vec![stmt(vec![s("SET_FAN"), s("SPEED"), Node::Float(0.5)])]
        );
    }

    #[test]
    fn test_expression_value() {
        let out = parse("G1 X{1+2*3}\n");
        assert_eq!(
            out.statements,
            vec![stmt(vec![
                s("G1"),
                s("X"),
                op(
                    Op::Add,
                    vec![
                        Node::Integer(1),
                        op(Op::Mul, vec![Node::Integer(2), Node::Integer(3)]),
                    ]
                ),
            ])]
        );
    }

    #[test]
    fn test_raw_mode_bridging() {
        let out = parse("ECHO hello {x} world\n");
        assert_eq!(
            out.statements,
            vec![stmt(vec![
                s("ECHO"),
                op(
                    Op::Concat,
                    vec![
                        op(Op::Concat, vec![s("hello "), Node::Parameter("x".into())]),
                        s(" world"),
                    ]
                ),
            ])]
        );
    }

    #[test]
    fn test_raw_mode_quoted_string() {
        let out = parse("M117 \"quoted \\\"str\\\"\"\n");
        assert!(out.diagnostics.is_empty());
        assert_eq!(
            out.statements,
            vec![stmt(vec![s("M117"), s("quoted \"str\"")])]
        );
    }

    #[test]
    fn test_empty_traditional_value() {
        let out = parse("G1 X\n");
        assert_eq!(out.statements, vec![stmt(vec![s("G1"), s("X"), s("")])]);
    }

    #[test]
    fn test_bare_ternary_statement() {
        let out = parse("{1 if 2 < 3 else 4}\n");
        assert!(out.diagnostics.is_empty());
        assert_eq!(
            out.statements,
            vec![stmt(vec![op(
                Op::IfElse,
                vec![
                    Node::Integer(1),
                    op(Op::Lt, vec![Node::Integer(2), Node::Integer(3)]),
                    Node::Integer(4),
                ]
            )])]
        );
    }

    #[test]
    fn test_hex_float_value() {
        let out = parse("G1 X0x1.8p1\n");
        assert_eq!(
            out.statements,
            vec![stmt(vec![s("G1"), s("X"), Node::Float(3.0)])]
        );
    }

    #[test]
    fn test_unterminated_string_suppresses_statement() {
        let out = parse("G1 \"abc\nG28\n");
        assert_eq!(out.diagnostics.len(), 1);
        assert!(matches!(
            &out.diagnostics[0],
            GantryError::Lexical { message, .. } if message == "Unterminated string"
        ));
        // No statement for the broken line; the next line parses normally.
        assert_eq!(out.statements, vec![stmt(vec![s("G28")])]);
    }

    #[test]
    fn test_blank_lines_and_comments() {
        let out = parse("\n\n;comment\nG1\n");
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.statements, vec![stmt(vec![s("G1")])]);
    }

    // ── Universal properties ─────────────────────────────────────────────────

    /// Feeding any partition of the input produces the same statements and
    /// diagnostics as feeding it whole.
    #[test]
    fn test_chunk_invariance() {
        let src = "N1 G1 X{1+2*max(3,4)} Y-1.5 ;c\nECHO hi {x ~ \"u\\n\"} bye\nBAD KEY\nM117 {1 if true else 2}%\n";
        let whole = parse(src);
        assert!(!whole.statements.is_empty());
        assert!(!whole.diagnostics.is_empty());

        let bytes = src.as_bytes();
        for split in 0..=bytes.len() {
            let mut front_end = FrontEnd::new(Collect::default());
            front_end.feed(&bytes[..split]);
            front_end.feed(&bytes[split..]);
            front_end.finish();
            let out = front_end.into_consumer();
            assert_eq!(out, whole, "divergence at split {split}");
        }
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut front_end = FrontEnd::new(Collect::default());
        front_end.feed(b"G1 X1");
        front_end.finish();
        front_end.finish();
        let out = front_end.into_consumer();
        assert_eq!(
            out.statements,
            vec![stmt(vec![s("G1"), s("X"), Node::Integer(1)])]
        );
    }

    #[test]
    fn test_error_locality() {
        let out = parse("G1 X{1+}\nG2 Y2\nM117 ok\n");
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(
            out.statements,
            vec![
                stmt(vec![s("G2"), s("Y"), Node::Integer(2)]),
                stmt(vec![s("M117"), s("ok")]),
            ]
        );
    }

    #[test]
    fn test_reset_restarts_cleanly() {
        let mut front_end = FrontEnd::new(Collect::default());
        front_end.feed(b"G1 X{1+");
        front_end.reset();
        front_end.feed(b"G28\n");
        front_end.finish();
        let out = front_end.into_consumer();
        // The aborted statement leaves at most its already-pushed tokens
        // behind; after reset only the fresh line parses.
        assert_eq!(out.statements, vec![stmt(vec![s("G28")])]);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_multiple_statements_in_order() {
        let out = parse("G28\nG1 X1\nM84\n");
        assert_eq!(
            out.statements,
            vec![
                stmt(vec![s("G28")]),
                stmt(vec![s("G1"), s("X"), Node::Integer(1)]),
                stmt(vec![s("M84")]),
            ]
        );
    }

    #[test]
    fn test_independent_instances() {
        let mut a = FrontEnd::new(Collect::default());
        let mut b = FrontEnd::new(Collect::default());
        a.feed(b"G1 ");
        b.feed(b"M117 hi\n");
        a.feed(b"X1\n");
        assert_eq!(a.consumer().statements.len(), 1);
        assert_eq!(b.consumer().statements.len(), 1);
        assert_eq!(
            a.consumer().statements[0],
            stmt(vec![s("G1"), s("X"), Node::Integer(1)])
        );
    }
}
