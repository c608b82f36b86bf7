//! Filter registry and pipeline tests.

use carousel_core::codec::{
    FilterPipeline, FilterRegistry, ascii85decode, ascii85encode, asciihexdecode, rldecode,
    rlencode,
};
use carousel_core::codec::lzw::{lzwdecode, lzwencode};
use carousel_core::error::PdfError;
use carousel_core::pdftypes::{Dictionary, Value};
use proptest::prelude::*;

fn dict(entries: &[(&str, Value)]) -> Dictionary {
    entries
        .iter()
        .map(|(k, v)| ((*k).into(), v.clone()))
        .collect()
}

#[test]
fn test_empty_filter_list_is_identity() {
    let registry = FilterRegistry::default();
    let pipeline = FilterPipeline::from_dict(&registry, &Dictionary::new()).unwrap();
    assert!(pipeline.is_empty());
    assert_eq!(pipeline.decode(b"as is").unwrap(), b"as is");
}

#[test]
fn test_single_name_and_abbreviation() {
    let registry = FilterRegistry::default();
    let d = dict(&[("Filter", Value::name("AHx"))]);
    let pipeline = FilterPipeline::from_dict(&registry, &d).unwrap();
    assert_eq!(pipeline.stages().len(), 1);
    assert_eq!(pipeline.decode(b"70 64 66>").unwrap(), b"pdf");
}

#[test]
fn test_filter_of_wrong_type() {
    let registry = FilterRegistry::default();
    let d = dict(&[("Filter", Value::Int(3))]);
    assert!(matches!(
        FilterPipeline::from_dict(&registry, &d),
        Err(PdfError::TypeError { .. })
    ));
}

#[test]
fn test_chain_decodes_left_to_right() {
    let registry = FilterRegistry::default();
    let inner = rlencode(b"aaaaaaaaaabcd");
    let outer = ascii85encode(&inner);
    let d = dict(&[(
        "Filter",
        Value::Array(vec![Value::name("ASCII85Decode"), Value::name("RunLengthDecode")]),
    )]);
    let pipeline = FilterPipeline::from_dict(&registry, &d).unwrap();
    assert_eq!(pipeline.decode(&outer).unwrap(), b"aaaaaaaaaabcd");
}

#[test]
fn test_flate_with_png_predictor() {
    let registry = FilterRegistry::default();
    let params = dict(&[
        ("Predictor", Value::Int(12)),
        ("Columns", Value::Int(3)),
    ]);
    let d = dict(&[
        ("Filter", Value::name("FlateDecode")),
        ("DecodeParms", Value::Dict(params)),
    ]);
    let pipeline = FilterPipeline::from_dict(&registry, &d).unwrap();
    let rows = b"abcabdabe".to_vec();
    let encoded = pipeline.encode(&rows).unwrap();
    assert_eq!(pipeline.decode(&encoded).unwrap(), rows);
}

#[test]
fn test_png_up_rows_after_inflate() {
    let registry = FilterRegistry::default();
    // two rows of three bytes, each tagged with filter type 2 (Up)
    let predicted = hex::decode("0201020302010101").unwrap();
    let packed = carousel_core::codec::flate::deflate(&predicted).unwrap();
    let d = dict(&[
        ("Filter", Value::name("Fl")),
        (
            "DecodeParms",
            Value::Dict(dict(&[("Predictor", Value::Int(12)), ("Columns", Value::Int(3))])),
        ),
    ]);
    let pipeline = FilterPipeline::from_dict(&registry, &d).unwrap();
    assert_eq!(pipeline.decode(&packed).unwrap(), hex::decode("010203020304").unwrap());
}

#[test]
fn test_png_short_last_row() {
    let registry = FilterRegistry::default();
    // the second row is one byte short of three columns
    let predicted = hex::decode("02010203020101").unwrap();
    let packed = carousel_core::codec::flate::deflate(&predicted).unwrap();
    let d = dict(&[
        ("Filter", Value::name("FlateDecode")),
        (
            "DecodeParms",
            Value::Dict(dict(&[("Predictor", Value::Int(12)), ("Columns", Value::Int(3))])),
        ),
    ]);
    let pipeline = FilterPipeline::from_dict(&registry, &d).unwrap();
    assert_eq!(pipeline.decode(&packed).unwrap(), hex::decode("0102030203").unwrap());
}

#[test]
fn test_hostile_predictor_params_fail_cleanly() {
    let registry = FilterRegistry::default();
    let packed = carousel_core::codec::flate::deflate(b"\x02abc").unwrap();
    for (colors, bits, columns) in [(1i64 << 32, 16, 1i64 << 32), (1, 8, 1 << 40)] {
        let params = dict(&[
            ("Predictor", Value::Int(12)),
            ("Colors", Value::Int(colors)),
            ("BitsPerComponent", Value::Int(bits)),
            ("Columns", Value::Int(columns)),
        ]);
        assert!(
            matches!(
                registry.decode("FlateDecode", &packed, Some(&params)),
                Err(PdfError::DecodeError { .. })
            ),
            "{colors} x {bits} x {columns}"
        );
    }
}

#[test]
fn test_unknown_filter_fails_at_decode() {
    let registry = FilterRegistry::default();
    let d = dict(&[("Filter", Value::name("JBIG2Decode"))]);
    let pipeline = FilterPipeline::from_dict(&registry, &d).unwrap();
    assert!(matches!(
        pipeline.decode(b"x"),
        Err(PdfError::UnsupportedFilter(_))
    ));
}

#[test]
fn test_custom_registry_alias() {
    let mut registry = FilterRegistry::empty();
    assert!(!registry.alias("Hex", "ASCIIHexDecode"));
    registry.register(carousel_core::codec::AsciiHexDecode);
    assert!(registry.alias("Hex", "ASCIIHexDecode"));
    assert_eq!(registry.decode("Hex", b"41>", None).unwrap(), b"A");
    assert!(!registry.contains("FlateDecode"));
}

#[test]
fn test_ascii85_end_marker_and_whitespace() {
    assert_eq!(ascii85decode(b"87cURD]i,\"Ebo80~>").unwrap(), b"Hello world!");
    assert_eq!(ascii85decode(b"87cUR D]i,\n\"Ebo80~>").unwrap(), b"Hello world!");
    assert_eq!(asciihexdecode(b"4 1\n42>ignored"), b"AB");
}

#[test]
fn test_runlength_stops_at_eod() {
    assert_eq!(rldecode(&[2, b'a', b'b', b'c', 254, b'z', 128, 0, b'q']), b"abczzz");
}

proptest! {
    #[test]
    fn prop_ascii_hex_round_trip(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let registry = FilterRegistry::default();
        let encoded = registry.encode("AHx", &data, None).unwrap();
        prop_assert_eq!(registry.decode("AHx", &encoded, None).unwrap(), data);
    }

    #[test]
    fn prop_ascii85_round_trip(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        prop_assert_eq!(ascii85decode(&ascii85encode(&data)).unwrap(), data);
    }

    #[test]
    fn prop_flate_round_trip(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let registry = FilterRegistry::default();
        let encoded = registry.encode("Fl", &data, None).unwrap();
        prop_assert_eq!(registry.decode("Fl", &encoded, None).unwrap(), data);
    }

    #[test]
    fn prop_runlength_round_trip(data in proptest::collection::vec(0u8..4, 0..1024)) {
        prop_assert_eq!(rldecode(&rlencode(&data)), data);
    }

    #[test]
    fn prop_lzw_round_trip(data in proptest::collection::vec(any::<u8>(), 0..1024), early in any::<bool>()) {
        prop_assert_eq!(lzwdecode(&lzwencode(&data, early).unwrap(), early), data);
    }
}
