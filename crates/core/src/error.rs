//! Error types for the carousel PDF object engine.

use crate::model::objects::ObjectKey;
use thiserror::Error;

/// Primary error type for PDF parsing operations.
#[derive(Error, Debug)]
pub enum PdfError {
    #[error("invalid token at position {pos}: {msg}")]
    TokenError { pos: usize, msg: String },

    #[error("unexpected end of input at position {pos}")]
    UnexpectedEof { pos: usize },

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF object not found: {0}")]
    ObjectNotFound(ObjectKey),

    #[error("circular reference detected while resolving {0}")]
    CircularReference(ObjectKey),

    #[error("startxref not found")]
    StartXRefNotFound,

    #[error("malformed cross-reference section at {pos}: {msg}")]
    XRefError { pos: usize, msg: String },

    #[error("unterminated array starting at {pos}")]
    UnterminatedArray { pos: usize },

    #[error("unterminated dictionary starting at {pos}")]
    UnterminatedDict { pos: usize },

    #[error("PDF syntax error at {pos}: {msg}")]
    SyntaxError { pos: usize, msg: String },

    #[error("{filter} decode error: {msg}")]
    DecodeError { filter: &'static str, msg: String },

    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("missing or invalid %PDF- header")]
    InvalidHeader,

    #[error("no object number left to allocate")]
    ObjectNumbersExhausted,
}

impl PdfError {
    /// Byte offset the error refers to, when one is known.
    pub const fn position(&self) -> Option<usize> {
        match self {
            Self::TokenError { pos, .. }
            | Self::UnexpectedEof { pos }
            | Self::XRefError { pos, .. }
            | Self::UnterminatedArray { pos }
            | Self::UnterminatedDict { pos }
            | Self::SyntaxError { pos, .. } => Some(*pos),
            _ => None,
        }
    }

    pub(crate) fn syntax(pos: usize, msg: impl Into<String>) -> Self {
        Self::SyntaxError {
            pos,
            msg: msg.into(),
        }
    }

    pub(crate) fn xref(pos: usize, msg: impl Into<String>) -> Self {
        Self::XRefError {
            pos,
            msg: msg.into(),
        }
    }
}

/// Convenience Result type alias for PdfError.
pub type Result<T> = std::result::Result<T, PdfError>;
