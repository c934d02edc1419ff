//! G-code front-end infrastructure.
//!
//! - [`lexer`] — incremental state-machine lexer producing a typed token
//!   stream from raw bytes.
//! - [`grammar`] — push-driven statement/expression parser building
//!   statement trees.
//! - [`ast`] — statement-tree node definitions.
//! - [`keywords`] — the keyword table shared by lexer and parser.
//! - [`front_end`] — the facade binding one lexer to one parser.

/// Statement-tree node definitions.
pub mod ast;
/// The front-end facade and consumer interface.
pub mod front_end;
/// Push-driven statement/expression parser.
pub mod grammar;
/// The keyword table.
pub mod keywords;
/// Incremental G-code lexer.
pub mod lexer;

pub use front_end::{Consumer, FrontEnd};
