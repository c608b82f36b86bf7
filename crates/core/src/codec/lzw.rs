//! LZWDecode filter using the weezl crate.

use super::predictor::PredictorParams;
use super::{Filter, param_int};
use crate::error::{PdfError, Result};
use crate::model::objects::Dictionary;
use tracing::warn;
use weezl::{BitOrder, decode::Decoder, encode::Encoder};

/// Decode LZW-encoded data (PDF variant: MSB first, 8-bit).
///
/// EarlyChange=1 is the PDF default and widens codes one code early, the
/// way TIFF does. Corrupt input keeps whatever was decoded before the error.
pub fn lzwdecode(data: &[u8], early_change: bool) -> Vec<u8> {
    let mut decoder = if early_change {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        Decoder::new(BitOrder::Msb, 8)
    };
    let mut output = Vec::new();
    let result = decoder.into_vec(&mut output).decode(data);
    if let Err(err) = result.status {
        warn!(%err, recovered = output.len(), "corrupt LZW data, keeping partial output");
    }
    output
}

/// Encode data with LZW (PDF variant).
pub fn lzwencode(data: &[u8], early_change: bool) -> Result<Vec<u8>> {
    let mut encoder = if early_change {
        Encoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        Encoder::new(BitOrder::Msb, 8)
    };
    encoder.encode(data).map_err(|err| PdfError::DecodeError {
        filter: "LZWDecode",
        msg: err.to_string(),
    })
}

/// `LZWDecode`, honouring `/EarlyChange` and the predictor parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct LzwDecode;

impl Filter for LzwDecode {
    fn name(&self) -> &'static str {
        "LZWDecode"
    }

    fn decode(&self, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
        let predictor = PredictorParams::from_params(params)?;
        let decoded = lzwdecode(input, param_int(params, "EarlyChange", 1) != 0);
        predictor.decode(&decoded)
    }

    fn encode(&self, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
        let predictor = PredictorParams::from_params(params)?;
        let predicted = predictor.encode(input)?;
        lzwencode(&predicted, param_int(params, "EarlyChange", 1) != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::objects::Value;

    #[test]
    fn pdf_reference_sample() {
        // Example from the PDF reference, section 7.4.4.2
        let encoded = hex::decode("800b6050220c0c8501").unwrap();
        assert_eq!(lzwdecode(&encoded, true), b"-----A---B");
    }

    #[test]
    fn round_trip_both_code_switches() {
        let data = b"TOBEORNOTTOBEORTOBEORNOT#".repeat(50);
        for early in [true, false] {
            let encoded = lzwencode(&data, early).unwrap();
            assert_eq!(lzwdecode(&encoded, early), data);
        }
    }

    #[test]
    fn early_change_param() {
        let mut parms = Dictionary::new();
        parms.set("EarlyChange", Value::Int(0));
        let data = b"abcabcabcabcabcabc".repeat(40);
        let encoded = LzwDecode.encode(&data, Some(&parms)).unwrap();
        assert_eq!(LzwDecode.decode(&encoded, Some(&parms)).unwrap(), data);
    }
}
