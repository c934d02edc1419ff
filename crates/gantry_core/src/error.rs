//! Error types for the Gantry front end.

use thiserror::Error;

/// All diagnostics produced by the Gantry front end.
///
/// A diagnostic is delivered to the consumer as a value; its `Display`
/// rendering is the human-readable message. No diagnostic is fatal to the
/// front end — the lexer and parser resynchronize at the next statement
/// boundary and keep going.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GantryError {
    /// A malformed token: unterminated string, illegal escape, numeric
    /// overflow, a disallowed character, and similar. Carries the 1-based
    /// source position where the lexer detected the problem.
    #[error("{message} at {line}:{column}")]
    Lexical {
        /// Short description, including the offending character when known.
        message: String,
        /// 1-based source line.
        line: u32,
        /// 1-based source column.
        column: u32,
    },

    /// A token sequence that violates the statement grammar.
    #[error("G-Code parse error: {message}")]
    Syntax {
        /// Short description of the mismatch.
        message: String,
    },
}
