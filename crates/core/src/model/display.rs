//! PDF syntax rendering for COS values.
//!
//! The output tokenizes back to an equal value, which makes it usable for
//! diagnostics and for the dump tool.

use super::objects::{Dictionary, PdfString, Value, name_to_bytes};
use std::fmt::{self, Write};

fn is_regular_name_byte(b: u8) -> bool {
    (0x21..=0x7e).contains(&b)
        && !matches!(
            b,
            b'#' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
        )
}

/// Write `/Name` with `#xx` escapes.
pub fn write_name(out: &mut impl Write, name: &str) -> fmt::Result {
    out.write_char('/')?;
    for b in name_to_bytes(name) {
        if is_regular_name_byte(b) {
            out.write_char(char::from(b))?;
        } else {
            write!(out, "#{b:02X}")?;
        }
    }
    Ok(())
}

/// Write a string in the form it was parsed from.
pub fn write_string(out: &mut impl Write, s: &PdfString) -> fmt::Result {
    if s.is_hex() {
        out.write_char('<')?;
        for b in s.as_bytes() {
            write!(out, "{b:02x}")?;
        }
        return out.write_char('>');
    }
    out.write_char('(')?;
    for &b in s.as_bytes() {
        match b {
            b'(' | b')' | b'\\' => {
                out.write_char('\\')?;
                out.write_char(char::from(b))?;
            }
            b'\n' => out.write_str("\\n")?,
            b'\r' => out.write_str("\\r")?,
            b'\t' => out.write_str("\\t")?,
            0x08 => out.write_str("\\b")?,
            0x0c => out.write_str("\\f")?,
            0x20..=0x7e => out.write_char(char::from(b))?,
            _ => write!(out, "\\{b:03o}")?,
        }
    }
    out.write_char(')')
}

/// Reals always carry a dot so they read back as reals.
pub fn write_real(out: &mut impl Write, n: f64) -> fmt::Result {
    if !n.is_finite() {
        return out.write_str("0.0");
    }
    let text = n.to_string();
    out.write_str(&text)?;
    if !text.contains('.') {
        out.write_str(".0")?;
    }
    Ok(())
}

fn write_dict(out: &mut impl Write, dict: &Dictionary) -> fmt::Result {
    out.write_str("<<")?;
    for (key, value) in dict {
        out.write_char(' ')?;
        write_name(out, key)?;
        write!(out, " {value}")?;
    }
    out.write_str(" >>")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Real(n) => write_real(f, *n),
            Self::Name(name) => write_name(f, name),
            Self::Str(s) => write_string(f, s),
            Self::Array(arr) => {
                f.write_char('[')?;
                for (i, item) in arr.iter().enumerate() {
                    if i > 0 {
                        f.write_char(' ')?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_char(']')
            }
            Self::Dict(dict) => write_dict(f, dict),
            Self::Stream(stream) => {
                write_dict(f, stream.dict())?;
                write!(f, " stream <{} bytes> endstream", stream.raw_data().len())
            }
            Self::Indirect(key) => write!(f, "{key}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::objects::HexMeta;

    #[test]
    fn reals_keep_their_dot() {
        assert_eq!(Value::Real(2.0).to_string(), "2.0");
        assert_eq!(Value::Real(-0.5).to_string(), "-0.5");
        assert_eq!(Value::Real(f64::NAN).to_string(), "0.0");
    }

    #[test]
    fn names_escape_delimiters() {
        assert_eq!(Value::name("A B#").to_string(), "/A#20B#23");
        assert_eq!(Value::name("Type").to_string(), "/Type");
    }

    #[test]
    fn strings_escape() {
        assert_eq!(Value::string(&b"a(b)\\\n\x01"[..]).to_string(), "(a\\(b\\)\\\\\\n\\001)");
        let hex = PdfString::hex(vec![0xab, 0x01], HexMeta::default());
        assert_eq!(Value::Str(hex).to_string(), "<ab01>");
    }

    #[test]
    fn containers() {
        let mut d = Dictionary::new();
        d.set("Type", Value::name("Catalog"));
        d.set("Pages", Value::reference(2, 0));
        insta::assert_snapshot!(Value::Dict(d).to_string(), @"<< /Type /Catalog /Pages 2 0 R >>");
        let arr = Value::Array(vec![Value::Int(1), Value::Null, Value::Bool(false)]);
        assert_eq!(arr.to_string(), "[1 null false]");
        assert_eq!(Value::Dict(Dictionary::new()).to_string(), "<< >>");
    }
}
