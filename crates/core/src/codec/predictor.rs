//! TIFF and PNG predictors.
//!
//! Used after Flate and LZW decoding when `/DecodeParms` carries
//! `/Predictor` greater than 1.

use super::param_int;
use crate::error::{PdfError, Result};
use crate::model::objects::Dictionary;
use tracing::debug;

/// Predictor settings from `/DecodeParms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictorParams {
    pub predictor: i64,
    pub colors: usize,
    pub bits_per_component: usize,
    pub columns: usize,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}

impl PredictorParams {
    pub fn from_params(params: Option<&Dictionary>) -> Result<Self> {
        let to_usize = |key: &'static str, default: i64| {
            usize::try_from(param_int(params, key, default))
                .ok()
                .filter(|&v| v > 0)
                .ok_or_else(|| PdfError::DecodeError {
                    filter: "Predictor",
                    msg: format!("invalid /{key}"),
                })
        };
        let parsed = Self {
            predictor: param_int(params, "Predictor", 1),
            colors: to_usize("Colors", 1)?,
            bits_per_component: to_usize("BitsPerComponent", 8)?,
            columns: to_usize("Columns", 1)?,
        };
        if !matches!(parsed.bits_per_component, 1 | 2 | 4 | 8 | 16) {
            return Err(PdfError::DecodeError {
                filter: "Predictor",
                msg: format!("unsupported /BitsPerComponent {}", parsed.bits_per_component),
            });
        }
        parsed
            .colors
            .checked_mul(parsed.bits_per_component)
            .and_then(|bits| bits.checked_mul(parsed.columns))
            .ok_or_else(|| PdfError::DecodeError {
                filter: "Predictor",
                msg: format!(
                    "row of {} x {} x {} bits overflows",
                    parsed.colors, parsed.bits_per_component, parsed.columns
                ),
            })?;
        Ok(parsed)
    }

    /// A row wider than the whole input comes from bogus parameters.
    fn check_row(&self, data: &[u8]) -> Result<()> {
        if !data.is_empty() && self.row_bytes() > data.len() {
            return Err(PdfError::DecodeError {
                filter: "Predictor",
                msg: format!(
                    "row of {} bytes exceeds {} bytes of data",
                    self.row_bytes(),
                    data.len()
                ),
            });
        }
        Ok(())
    }

    pub const fn is_identity(&self) -> bool {
        self.predictor <= 1
    }

    /// Bytes per row, rounded up.
    pub const fn row_bytes(&self) -> usize {
        self.colors
            .saturating_mul(self.bits_per_component)
            .saturating_mul(self.columns)
            .div_ceil(8)
    }

    /// Bytes per complete pixel, at least 1.
    pub const fn pixel_bytes(&self) -> usize {
        let bpp = self.colors.saturating_mul(self.bits_per_component).div_ceil(8);
        if bpp == 0 { 1 } else { bpp }
    }

    /// Undo the prediction.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<u8>> {
        if self.is_identity() {
            return Ok(data.to_vec());
        }
        self.check_row(data)?;
        match self.predictor {
            ..=1 => Ok(data.to_vec()),
            2 => Ok(self.tiff(data, true)),
            10..=15 => Ok(self.png_decode(data)),
            other => Err(PdfError::DecodeError {
                filter: "Predictor",
                msg: format!("unknown predictor {other}"),
            }),
        }
    }

    /// Apply the prediction.
    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>> {
        if self.is_identity() {
            return Ok(data.to_vec());
        }
        self.check_row(data)?;
        match self.predictor {
            ..=1 => Ok(data.to_vec()),
            2 => Ok(self.tiff(data, false)),
            10..=15 => Ok(self.png_encode(data)),
            other => Err(PdfError::DecodeError {
                filter: "Predictor",
                msg: format!("unknown predictor {other}"),
            }),
        }
    }

    fn png_decode(&self, data: &[u8]) -> Vec<u8> {
        let row_bytes = self.row_bytes();
        let bpp = self.pixel_bytes();
        let row_size = row_bytes + 1; // +1 for filter byte

        let mut result = Vec::with_capacity(data.len());
        let mut prev_row = vec![0u8; row_bytes];
        let mut current_row = vec![0u8; row_bytes];

        for row in data.chunks(row_size) {
            if row.len() < row_size {
                debug!(bytes = row.len() - 1, "incomplete last predictor row");
            }
            let filter_type = row[0];
            let row_data = &row[1..];

            for i in 0..row_data.len() {
                let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                let above = prev_row[i];
                let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
                let delta = match filter_type {
                    1 => left,
                    2 => above,
                    3 => ((u16::from(left) + u16::from(above)) / 2) as u8,
                    4 => paeth_predictor(left, above, upper_left),
                    // None, and unknown filters copy the data
                    _ => 0,
                };
                current_row[i] = row_data[i].wrapping_add(delta);
            }

            result.extend_from_slice(&current_row[..row_data.len()]);
            std::mem::swap(&mut prev_row, &mut current_row);
        }

        result
    }

    /// PNG encoding with one filter type for every row (15 uses Up). A short
    /// last row is written as is.
    fn png_encode(&self, data: &[u8]) -> Vec<u8> {
        let row_bytes = self.row_bytes();
        let bpp = self.pixel_bytes();
        let filter_type = match self.predictor {
            10..=14 => (self.predictor - 10) as u8,
            _ => 2,
        };

        let mut result = Vec::with_capacity(data.len() + data.len() / row_bytes.max(1) + 1);
        let mut prev_row = vec![0u8; row_bytes];
        let mut current_row = vec![0u8; row_bytes];

        for row in data.chunks(row_bytes.max(1)) {
            current_row.fill(0);
            current_row[..row.len()].copy_from_slice(row);
            result.push(filter_type);
            for i in 0..row.len() {
                let left = if i >= bpp { current_row[i - bpp] } else { 0 };
                let above = prev_row[i];
                let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
                let delta = match filter_type {
                    1 => left,
                    2 => above,
                    3 => ((u16::from(left) + u16::from(above)) / 2) as u8,
                    4 => paeth_predictor(left, above, upper_left),
                    _ => 0,
                };
                result.push(current_row[i].wrapping_sub(delta));
            }
            std::mem::swap(&mut prev_row, &mut current_row);
        }

        result
    }

    /// TIFF predictor 2: each sample is stored as the difference to the
    /// same component of the pixel to its left.
    fn tiff(&self, data: &[u8], decode: bool) -> Vec<u8> {
        let row_bytes = self.row_bytes();
        let colors = self.colors;
        let mut out = data.to_vec();

        for row in out.chunks_mut(row_bytes.max(1)) {
            match self.bits_per_component {
                8 => {
                    if decode {
                        for i in colors..row.len() {
                            row[i] = row[i].wrapping_add(row[i - colors]);
                        }
                    } else {
                        for i in (colors..row.len()).rev() {
                            row[i] = row[i].wrapping_sub(row[i - colors]);
                        }
                    }
                }
                16 => {
                    let samples = row.len() / 2;
                    if decode {
                        for i in colors..samples {
                            let v = read_u16(row, i).wrapping_add(read_u16(row, i - colors));
                            row[2 * i..2 * i + 2].copy_from_slice(&v.to_be_bytes());
                        }
                    } else {
                        for i in (colors..samples).rev() {
                            let v = read_u16(row, i).wrapping_sub(read_u16(row, i - colors));
                            row[2 * i..2 * i + 2].copy_from_slice(&v.to_be_bytes());
                        }
                    }
                }
                bits => tiff_sub_byte(row, bits, colors, self.columns, decode),
            }
        }

        out
    }
}

/// TIFF predictor for 1, 2 and 4 bit components, in place.
fn tiff_sub_byte(row: &mut [u8], bits: usize, colors: usize, columns: usize, decode: bool) {
    let mask = (1u16 << bits) - 1;
    let count = colors.saturating_mul(columns).min(row.len() * 8 / bits);

    if decode {
        for i in colors..count {
            let v = sample(row, i, bits) + sample(row, i - colors, bits);
            set_sample(row, i, bits, v & mask);
        }
    } else {
        for i in (colors..count).rev() {
            let v = sample(row, i, bits).wrapping_sub(sample(row, i - colors, bits));
            set_sample(row, i, bits, v & mask);
        }
    }
}

fn read_u16(row: &[u8], i: usize) -> u16 {
    u16::from_be_bytes([row[2 * i], row[2 * i + 1]])
}

fn sample(row: &[u8], i: usize, bits: usize) -> u16 {
    let bit = i * bits;
    let shift = 8 - bits - bit % 8;
    (u16::from(row[bit / 8]) >> shift) & ((1 << bits) - 1)
}

fn set_sample(row: &mut [u8], i: usize, bits: usize, v: u16) {
    let bit = i * bits;
    let shift = 8 - bits - bit % 8;
    let mask = (((1u16 << bits) - 1) << shift) as u8;
    let byte = &mut row[bit / 8];
    *byte = (*byte & !mask) | ((v << shift) as u8 & mask);
}

/// Paeth predictor function used in PNG filtering.
const fn paeth_predictor(left: u8, above: u8, upper_left: u8) -> u8 {
    let a = left as i32;
    let b = above as i32;
    let c = upper_left as i32;
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        above
    } else {
        upper_left
    }
}
