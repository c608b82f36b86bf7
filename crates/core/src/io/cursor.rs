//! Byte cursor over PDF data.
//!
//! The document bytes live in a shared `Bytes` buffer (owned memory or a
//! memory-mapped file). Every parser gets its own `ByteCursor` over that
//! buffer, so nested object resolution never disturbs the position of an
//! outer parser.

use crate::error::{PdfError, Result};
use bytes::Bytes;
use memmap2::Mmap;
use std::fs::File;
use std::ops::Range;
use std::path::Path;

/// Backing storage for a document.
#[derive(Clone, Debug)]
pub enum PdfBytes {
    /// Bytes held in memory.
    Owned(Bytes),
    /// Read-only mapping of a file. The file handle itself is closed once
    /// the mapping exists; the mapping is released with the last clone.
    Mapped(Bytes),
}

impl PdfBytes {
    /// Memory-map the file at `path`.
    pub fn map_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and the library never hands out
        // mutable access to it.
        let mmap = unsafe { Mmap::map(&file) }?;
        Ok(Self::Mapped(Bytes::from_owner(mmap)))
    }

    pub const fn as_bytes(&self) -> &Bytes {
        match self {
            Self::Owned(data) | Self::Mapped(data) => data,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        self.as_bytes().as_ref()
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl From<Bytes> for PdfBytes {
    fn from(data: Bytes) -> Self {
        Self::Owned(data)
    }
}

impl From<Vec<u8>> for PdfBytes {
    fn from(data: Vec<u8>) -> Self {
        Self::Owned(Bytes::from(data))
    }
}

/// Seekable, peekable reader with pushback.
#[derive(Clone, Debug)]
pub struct ByteCursor {
    data: Bytes,
    pos: usize,
}

impl ByteCursor {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }

    /// Cursor positioned at `pos` (clamped to the end of data).
    pub fn at(data: Bytes, pos: usize) -> Self {
        let pos = pos.min(data.len());
        Self { data, pos }
    }

    /// Current position.
    pub const fn tell(&self) -> usize {
        self.pos
    }

    /// Move to an absolute position. Positions past the end clamp to EOF.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Shared handle on the whole buffer.
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Unread bytes from the current position.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Peek `offset` bytes ahead of the current position.
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    /// Read one byte and advance.
    pub fn read_byte(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    /// Push back the last `n` bytes read.
    pub fn unread(&mut self, n: usize) {
        self.pos = self.pos.saturating_sub(n);
    }

    /// Advance by up to `n` bytes.
    pub fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.data.len());
    }

    /// Read exactly `n` bytes as a zero-copy slice of the buffer.
    pub fn read_exact(&mut self, n: usize) -> Result<Bytes> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or(PdfError::UnexpectedEof { pos: self.pos })?;
        let out = self.data.slice(self.pos..end);
        self.pos = end;
        Ok(out)
    }

    /// Zero-copy slice of an absolute range, clamped to the buffer.
    pub fn slice(&self, range: Range<usize>) -> Bytes {
        let end = range.end.min(self.data.len());
        let start = range.start.min(end);
        self.data.slice(start..end)
    }

    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.remaining().starts_with(prefix)
    }

    /// Consume `prefix` if the remaining data starts with it.
    pub fn eat(&mut self, prefix: &[u8]) -> bool {
        if self.starts_with(prefix) {
            self.pos += prefix.len();
            true
        } else {
            false
        }
    }

    /// Advance while `pred` holds, returning the number of bytes skipped.
    pub fn skip_while(&mut self, pred: impl Fn(u8) -> bool) -> usize {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !pred(b) {
                break;
            }
            self.pos += 1;
        }
        self.pos - start
    }

    /// Consume a single end-of-line sequence (CR, LF or CRLF).
    pub fn eat_eol(&mut self) -> Option<Eol> {
        match self.peek() {
            Some(b'\r') => {
                self.pos += 1;
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                    Some(Eol::CrLf)
                } else {
                    Some(Eol::Cr)
                }
            }
            Some(b'\n') => {
                self.pos += 1;
                Some(Eol::Lf)
            }
            _ => None,
        }
    }

    /// Absolute position of the first `needle` at or after the cursor.
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        find_bytes(self.remaining(), needle).map(|i| self.pos + i)
    }

    /// Absolute position of the last `needle` in the whole buffer.
    pub fn rfind(&self, needle: &[u8]) -> Option<usize> {
        rfind_bytes(&self.data, needle)
    }
}

/// End-of-line sequence kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eol {
    Cr,
    Lf,
    CrLf,
}

impl Eol {
    pub const fn len(self) -> usize {
        match self {
            Self::Cr | Self::Lf => 1,
            Self::CrLf => 2,
        }
    }
}

pub(crate) fn find_bytes(hay: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    hay.windows(needle.len()).position(|w| w == needle)
}

pub(crate) fn rfind_bytes(hay: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    hay.windows(needle.len()).rposition(|w| w == needle)
}
