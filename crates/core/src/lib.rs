//! carousel - lazy reader for the PDF COS object layer.
//!
//! Opens a file through its cross-reference table, parses indirect objects
//! on first use and decodes stream data through a pluggable filter chain.

pub mod codec;
pub mod document;
pub mod error;
pub mod io;
pub mod model;
pub mod parser;

pub use codec::{Filter, FilterPipeline, FilterRegistry};
pub use document::{Document, OpenOptions, SecurityHandler};
pub use error::{PdfError, Result};
pub use model::{Dictionary, ObjectKey, PdfString, Stream, Trailer, Value};

// Short module names used by the tools and tests
pub use document::catalog as pdfdocument;
pub use model::objects as pdftypes;
pub use parser::lexer as psparser;
pub use parser::pdf_parser as pdfparser;
