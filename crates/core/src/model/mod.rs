//! COS data model.
//!
//! - `objects` - value types (`Value`, `Dictionary`, `Stream`, `ObjectKey`)
//! - `display` - PDF syntax rendering of values
//! - `trailer` - trailer dictionaries

pub mod display;
pub mod objects;
pub mod trailer;

// Re-export main types for convenience
pub use objects::{
    Array, Dictionary, HexMeta, Name, ObjectKey, PdfString, Stream, StreamFlags, Value,
};
pub use trailer::Trailer;
