//! `gantry_core` — streaming front end for an extended G-code dialect.
//!
//! The dialect extends traditional G-code (`N100 G1 X10 Y20`) with `{…}`
//! expressions, `KEY=VALUE` arguments, string literals with C-style escapes,
//! multi-base numeric literals, and identifier-based parameter lookup.
//! Source arrives as arbitrary-sized byte chunks; parsed statement trees and
//! diagnostics leave through the consumer interface.
//!
//! # Crate layout
//!
//! - [`error`] — the diagnostic type.
//! - [`parser`] — lexer, parser, AST, keyword table, and the
//!   [`parser::FrontEnd`] facade.

/// Error types and the diagnostic value.
pub mod error;
/// G-code front-end infrastructure (lexer, parser, AST).
pub mod parser;

pub use error::GantryError;
