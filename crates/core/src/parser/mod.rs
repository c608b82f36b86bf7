//! PDF tokenizing and object parsing.
//!
//! - `lexer`: byte-level tokenizer
//! - `pdf_parser`: object builder with indirect-reference disambiguation

pub mod lexer;
pub mod pdf_parser;

// Re-export main types for convenience
pub use lexer::{Keyword, Lexer, Token};
pub use pdf_parser::{FramingFlags, IndirectObject, ParseContext, Parser};
