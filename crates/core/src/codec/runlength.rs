//! RunLengthDecode filter.

use super::Filter;
use crate::error::Result;
use crate::model::objects::Dictionary;

const EOD: u8 = 128;

/// Decode RunLength-encoded data.
///
/// Format:
/// - Length byte 0-127: Copy next (length + 1) bytes literally
/// - Length byte 128: End of data (EOD marker)
/// - Length byte 129-255: Repeat next byte (257 - length) times
///
/// Truncated input is tolerated: decoding stops at the incomplete run.
pub fn rldecode(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let length = data[i];
        i += 1;

        match length {
            EOD => break,
            0..=127 => {
                let count = usize::from(length) + 1;
                let end = (i + count).min(data.len());
                result.extend_from_slice(&data[i..end]);
                i = end;
            }
            129..=255 => {
                let Some(&byte) = data.get(i) else {
                    break;
                };
                i += 1;
                result.extend(std::iter::repeat_n(byte, 257 - usize::from(length)));
            }
        }
    }

    result
}

/// Encode data with RunLength, ending with the EOD marker.
pub fn rlencode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 128 + 2);
    let mut literal_start = 0;
    let mut i = 0;

    let flush_literal = |out: &mut Vec<u8>, literal: &[u8]| {
        for chunk in literal.chunks(128) {
            out.push((chunk.len() - 1) as u8);
            out.extend_from_slice(chunk);
        }
    };

    while i < data.len() {
        let byte = data[i];
        let run = data[i..]
            .iter()
            .take(128)
            .take_while(|&&b| b == byte)
            .count();
        if run >= 2 {
            flush_literal(&mut out, &data[literal_start..i]);
            out.push((257 - run) as u8);
            out.push(byte);
            i += run;
            literal_start = i;
        } else {
            i += 1;
        }
    }
    flush_literal(&mut out, &data[literal_start..]);
    out.push(EOD);
    out
}

/// `RunLengthDecode` (`RL`).
#[derive(Debug, Clone, Copy, Default)]
pub struct RunLengthDecode;

impl Filter for RunLengthDecode {
    fn name(&self) -> &'static str {
        "RunLengthDecode"
    }

    fn decode(&self, input: &[u8], _params: Option<&Dictionary>) -> Result<Vec<u8>> {
        Ok(rldecode(input))
    }

    fn encode(&self, input: &[u8], _params: Option<&Dictionary>) -> Result<Vec<u8>> {
        Ok(rlencode(input))
    }
}
