//! Document layer: cross-reference loading, object resolution and caching.
//!
//! This module contains:
//! - `catalog` - the [`Document`] and its resolver
//! - `xref` - cross-reference tables, streams and repair
//! - `objstm` - object streams
//! - `body` - the cache of resolved objects
//! - `header` - `%PDF-` header and `%%EOF` inspection
//! - `options` - the [`OpenOptions`] builder
//! - `security` - the decryption hook

pub mod body;
pub mod catalog;
pub mod header;
pub mod objstm;
pub mod options;
pub mod security;
pub mod xref;

pub use body::ObjectBody;
pub use catalog::Document;
pub use header::Header;
pub use objstm::ObjectStream;
pub use options::OpenOptions;
pub use security::SecurityHandler;
pub use xref::{SectionKind, XRefEntry, XRefKind, XRefSection, XRefTable, find_startxref};
