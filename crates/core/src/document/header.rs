//! File header and end-of-file inspection.

use crate::io::cursor::{find_bytes, rfind_bytes};

/// Leading garbage tolerated before `%PDF-`.
const HEADER_SEARCH_LIMIT: usize = 1024;

/// Parsed `%PDF-x.y` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: (u8, u8),
    /// Offset of `%PDF-`; non-zero when garbage precedes the header.
    pub offset: usize,
    /// The second line is a comment with at least four further bytes.
    pub binary_marker: bool,
}

impl Header {
    pub fn parse(data: &[u8]) -> Option<Self> {
        let window = &data[..data.len().min(HEADER_SEARCH_LIMIT)];
        let offset = find_bytes(window, b"%PDF-")?;
        let rest = &data[offset + 5..];
        let version = match rest {
            [major @ b'0'..=b'9', b'.', minor @ b'0'..=b'9', ..] => (major - b'0', minor - b'0'),
            _ => return None,
        };

        let line_end = rest
            .iter()
            .position(|&b| b == b'\r' || b == b'\n')
            .unwrap_or(rest.len());
        let mut second = &rest[line_end..];
        second = second.strip_prefix(b"\r").unwrap_or(second);
        second = second.strip_prefix(b"\n").unwrap_or(second);
        let binary_marker = second.first() == Some(&b'%')
            && second[1..]
                .iter()
                .take_while(|&&b| b != b'\r' && b != b'\n')
                .count()
                >= 4;

        Some(Self {
            version,
            offset,
            binary_marker,
        })
    }
}

/// Bytes after the last `%%EOF`, not counting one trailing end-of-line.
pub fn trailing_bytes(data: &[u8]) -> Option<usize> {
    let pos = rfind_bytes(data, b"%%EOF")?;
    let tail = &data[pos + 5..];
    let eol = if tail.starts_with(b"\r\n") {
        2
    } else if tail.starts_with(b"\n") || tail.starts_with(b"\r") {
        1
    } else {
        0
    };
    Some(tail.len() - eol)
}
