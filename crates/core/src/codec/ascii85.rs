//! ASCII85 and ASCIIHex stream filters.

use super::Filter;
use crate::error::{PdfError, Result};
use crate::model::objects::Dictionary;

const A85_EOD: &[u8] = b"~>";

/// Decode ASCII85-encoded data (PDF variant).
/// Handles: z-encoding, <~ ~> markers, whitespace, missing EOD.
pub fn ascii85decode(data: &[u8]) -> Result<Vec<u8>> {
    // Strip <~ prefix if present
    let data = data.strip_prefix(b"<~").unwrap_or(data);

    // Everything from ~ on is the end marker or trailing junk
    let data = match data.iter().position(|&b| b == b'~') {
        Some(pos) => &data[..pos],
        None => data,
    };

    let mut result = Vec::with_capacity(data.len() / 5 * 4 + 4);
    let mut group = [0u8; 5];
    let mut len = 0;

    for &byte in data {
        match byte {
            b'z' if len == 0 => result.extend_from_slice(&[0; 4]),
            b'!'..=b'u' => {
                group[len] = byte;
                len += 1;
                if len == 5 {
                    result.extend_from_slice(&group_value(&group)?.to_be_bytes());
                    len = 0;
                }
            }
            b'z' => {
                return Err(PdfError::DecodeError {
                    filter: "ASCII85Decode",
                    msg: "'z' inside a group".into(),
                });
            }
            // Whitespace and other junk
            _ => {}
        }
    }

    if len > 1 {
        // Pad the partial group with 'u' and keep len - 1 bytes
        group[len..].fill(b'u');
        let bytes = group_value(&group)?.to_be_bytes();
        result.extend_from_slice(&bytes[..len - 1]);
    }

    Ok(result)
}

fn group_value(group: &[u8; 5]) -> Result<u32> {
    let value = group
        .iter()
        .fold(0u64, |acc, &b| acc * 85 + u64::from(b - b'!'));
    u32::try_from(value).map_err(|_| PdfError::DecodeError {
        filter: "ASCII85Decode",
        msg: format!("group value {value} out of range"),
    })
}

/// Encode data as ASCII85 with the `~>` end marker.
pub fn ascii85encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 4 * 5 + 7);
    for chunk in data.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        let mut value = u32::from_be_bytes(word);
        if chunk.len() == 4 && value == 0 {
            out.push(b'z');
            continue;
        }
        let mut digits = [0u8; 5];
        for digit in digits.iter_mut().rev() {
            *digit = (value % 85) as u8 + b'!';
            value /= 85;
        }
        out.extend_from_slice(&digits[..chunk.len() + 1]);
    }
    out.extend_from_slice(A85_EOD);
    out
}

/// Decode ASCIIHex-encoded data.
///
/// Non-hex bytes are skipped; `>` ends the data and an odd final digit is
/// padded with 0.
pub fn asciihexdecode(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;

    for &byte in data {
        if byte == b'>' {
            break;
        }
        if let Some(nibble) = hex_nibble(byte) {
            match pending.take() {
                Some(high) => result.push((high << 4) | nibble),
                None => pending = Some(nibble),
            }
        }
    }

    if let Some(high) = pending {
        result.push(high << 4);
    }

    result
}

/// Encode data as uppercase hex digits followed by `>`.
pub fn asciihexencode(data: &[u8]) -> Vec<u8> {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = Vec::with_capacity(data.len() * 2 + 1);
    for &b in data {
        out.push(DIGITS[usize::from(b >> 4)]);
        out.push(DIGITS[usize::from(b & 0x0f)]);
    }
    out.push(b'>');
    out
}

const fn hex_nibble(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// `ASCIIHexDecode` (`AHx`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AsciiHexDecode;

impl Filter for AsciiHexDecode {
    fn name(&self) -> &'static str {
        "ASCIIHexDecode"
    }

    fn decode(&self, input: &[u8], _params: Option<&Dictionary>) -> Result<Vec<u8>> {
        Ok(asciihexdecode(input))
    }

    fn encode(&self, input: &[u8], _params: Option<&Dictionary>) -> Result<Vec<u8>> {
        Ok(asciihexencode(input))
    }
}

/// `ASCII85Decode` (`A85`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Ascii85Decode;

impl Filter for Ascii85Decode {
    fn name(&self) -> &'static str {
        "ASCII85Decode"
    }

    fn decode(&self, input: &[u8], _params: Option<&Dictionary>) -> Result<Vec<u8>> {
        ascii85decode(input)
    }

    fn encode(&self, input: &[u8], _params: Option<&Dictionary>) -> Result<Vec<u8>> {
        Ok(ascii85encode(input))
    }
}
