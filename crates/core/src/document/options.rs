//! Builder for opening documents.
//!
//! # Example
//! ```ignore
//! use carousel_core::document::OpenOptions;
//!
//! let doc = OpenOptions::new()
//!     .repair(true)
//!     .max_depth(64)
//!     .open("broken.pdf")?;
//! ```

use std::fmt;
use std::path::Path;

use bytes::Bytes;

use super::catalog::Document;
use super::security::SecurityHandler;
use crate::codec::{Filter, FilterRegistry};
use crate::error::Result;
use crate::io::PdfBytes;
use crate::parser::pdf_parser::DEFAULT_MAX_DEPTH;

/// How a [`Document`] is opened.
pub struct OpenOptions {
    pub(crate) repair: bool,
    pub(crate) max_depth: usize,
    pub(crate) filters: FilterRegistry,
    pub(crate) security: Option<Box<dyn SecurityHandler>>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            repair: false,
            max_depth: DEFAULT_MAX_DEPTH,
            filters: FilterRegistry::default(),
            security: None,
        }
    }
}

impl fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenOptions")
            .field("repair", &self.repair)
            .field("max_depth", &self.max_depth)
            .field("filters", &self.filters)
            .field("security", &self.security.is_some())
            .finish()
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the cross-reference table by scanning the file when the
    /// stored one cannot be read.
    ///
    /// Off by default: a damaged table is reported as an error.
    pub const fn repair(mut self, repair: bool) -> Self {
        self.repair = repair;
        self
    }

    /// Nesting limit for arrays and dictionaries.
    pub const fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Replace the filter registry.
    pub fn filters(mut self, filters: FilterRegistry) -> Self {
        self.filters = filters;
        self
    }

    /// Add or replace one filter in the registry.
    ///
    /// # Example
    /// ```ignore
    /// let doc = OpenOptions::new().filter(MyJbig2Decode).load(bytes)?;
    /// ```
    pub fn filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.register(filter);
        self
    }

    /// Decrypt strings and streams of an encrypted document.
    pub fn security_handler(mut self, handler: impl SecurityHandler + 'static) -> Self {
        self.security = Some(Box::new(handler));
        self
    }

    /// Memory-map and open the file at `path`.
    pub fn open(self, path: impl AsRef<Path>) -> Result<Document> {
        Document::load_with(PdfBytes::map_file(path)?, self)
    }

    /// Open a document held in memory.
    pub fn load(self, data: impl Into<Bytes>) -> Result<Document> {
        Document::load_with(PdfBytes::Owned(data.into()), self)
    }
}
