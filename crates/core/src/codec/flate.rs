//! FlateDecode (zlib) filter.

use super::Filter;
use super::predictor::PredictorParams;
use crate::error::{PdfError, Result};
use crate::model::objects::Dictionary;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};
use tracing::warn;

/// Inflate zlib data, falling back to partial output on corruption.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::with_capacity(data.len() * 2);
    if let Err(err) = decoder.read_to_end(&mut decompressed) {
        decompressed = decompress_corrupted(data);
        if decompressed.is_empty() && !data.is_empty() {
            return Err(PdfError::DecodeError {
                filter: "FlateDecode",
                msg: err.to_string(),
            });
        }
        warn!(%err, recovered = decompressed.len(), "corrupt Flate data, keeping partial output");
    }
    Ok(decompressed)
}

/// Deflate with zlib framing.
pub fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Best-effort zlib decompression for corrupted streams.
///
/// Returns the output produced up to the point the decoder fails (often a
/// checksum error near the end).
fn decompress_corrupted(data: &[u8]) -> Vec<u8> {
    use flate2::{Decompress, FlushDecompress, Status};
    let mut decoder = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut buf = [0u8; 4096];
    let mut i = 0usize;
    while i < data.len() {
        let before_out = decoder.total_out();
        let before_in = decoder.total_in();
        let res = decoder.decompress(&data[i..i + 1], &mut buf, FlushDecompress::None);
        let produced = (decoder.total_out() - before_out) as usize;
        if produced > 0 {
            out.extend_from_slice(&buf[..produced]);
        }
        let consumed = (decoder.total_in() - before_in) as usize;
        i += consumed.max(1);
        match res {
            Ok(Status::StreamEnd) | Err(_) => break,
            Ok(_) => {}
        }
    }
    out
}

/// `FlateDecode` (`Fl`), with optional predictor.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlateDecode;

impl Filter for FlateDecode {
    fn name(&self) -> &'static str {
        "FlateDecode"
    }

    fn decode(&self, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
        let predictor = PredictorParams::from_params(params)?;
        let inflated = inflate(input)?;
        if predictor.is_identity() {
            return Ok(inflated);
        }
        predictor.decode(&inflated)
    }

    fn encode(&self, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
        let predictor = PredictorParams::from_params(params)?;
        if predictor.is_identity() {
            return deflate(input);
        }
        deflate(&predictor.encode(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::objects::Value;

    #[test]
    fn round_trip() {
        let data = b"BT /F1 12 Tf (Hello) Tj ET".repeat(20);
        let packed = deflate(&data).unwrap();
        assert!(packed.len() < data.len());
        assert_eq!(inflate(&packed).unwrap(), data);
    }

    #[test]
    fn truncated_data_keeps_prefix() {
        let data = (0..4000u32).map(|i| (i % 251) as u8).collect::<Vec<_>>();
        let packed = deflate(&data).unwrap();
        let cut = &packed[..packed.len() - 6];
        let partial = inflate(cut).unwrap();
        assert!(!partial.is_empty());
        assert_eq!(&data[..partial.len()], &partial[..]);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(matches!(
            inflate(b"not zlib at all"),
            Err(PdfError::DecodeError { filter: "FlateDecode", .. })
        ));
    }

    #[test]
    fn predictor_params_apply() {
        let mut parms = Dictionary::new();
        parms.set("Predictor", Value::Int(12));
        parms.set("Columns", Value::Int(4));
        let rows = [1u8, 2, 3, 4, 2, 3, 4, 5];
        let encoded = FlateDecode.encode(&rows, Some(&parms)).unwrap();
        assert_eq!(inflate(&encoded).unwrap(), [2, 1, 2, 3, 4, 2, 1, 1, 1, 1]);
        assert_eq!(FlateDecode.decode(&encoded, Some(&parms)).unwrap(), rows);
    }
}
