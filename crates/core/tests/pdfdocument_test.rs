//! Document tests: resolution, caching, stream data and mutation.

mod common;

use carousel_core::codec::flate::deflate;
use carousel_core::error::PdfError;
use carousel_core::pdfdocument::Document;
use carousel_core::pdftypes::{Dictionary, ObjectKey, Value};
use carousel_core::{OpenOptions, SecurityHandler};
use common::{PdfBuilder, simple_pdf};
use std::rc::Rc;

fn key(number: u64) -> ObjectKey {
    ObjectKey::new(number, 0)
}

fn open(data: Vec<u8>) -> Document {
    Document::from_bytes(data).expect("document opens")
}

#[test]
fn test_root_and_trailer() {
    let doc = open(simple_pdf());
    assert_eq!(doc.trailer().root(), Some(&Value::reference(1, 0)));
    assert_eq!(doc.trailer().size(), Some(5));
    let root = doc.root().unwrap();
    assert_eq!(root.as_dict().unwrap().get_name("Type"), Some("Catalog"));
    assert!(!doc.is_encrypted());
    assert_eq!(doc.object_keys(), [key(1), key(2), key(3), key(4)]);
}

#[test]
fn test_resolve_is_cached() {
    let doc = open(simple_pdf());
    assert!(doc.body().is_empty());
    let first = doc.resolve(key(2)).unwrap();
    let second = doc.resolve(key(2)).unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(doc.body().len(), 1);
    assert_eq!(first.as_dict().unwrap().get_int("Count"), Some(1));
}

#[test]
fn test_free_and_missing_objects() {
    let doc = open(simple_pdf());
    assert!(matches!(
        doc.resolve(key(0)),
        Err(PdfError::ObjectNotFound(k)) if k == key(0)
    ));
    assert!(matches!(doc.resolve(key(9)), Err(PdfError::ObjectNotFound(_))));
    // generation must match too
    assert!(matches!(
        doc.resolve(ObjectKey::new(1, 1)),
        Err(PdfError::ObjectNotFound(_))
    ));
    // dangling /Info reads as null
    let info = doc.deref(doc.trailer().info().unwrap()).unwrap();
    assert!(info.is_null());
}

#[test]
fn test_get_key_and_at_follow_references() {
    let doc = open(simple_pdf());
    let page = Value::reference(3, 0);
    let parent = doc.get_key(&page, "Parent").unwrap();
    assert_eq!(parent.as_dict().unwrap().get_name("Type"), Some("Pages"));

    let kids = doc.get_key(&Value::reference(2, 0), "Kids").unwrap();
    let first_kid = doc.at(&kids, 0).unwrap();
    assert_eq!(first_kid.as_dict().unwrap().get_name("Type"), Some("Page"));
    assert!(doc.at(&kids, 5).unwrap().is_null());
    assert!(doc.get_key(&page, "Missing").unwrap().is_null());
}

#[test]
fn test_stream_data_raw_and_decoded() {
    let content = b"q 1 0 0 1 72 720 cm BT (compressed) Tj ET Q";
    let packed = deflate(content).unwrap();
    let mut b = PdfBuilder::new();
    b.object(1, "<< /Type /Catalog >>")
        .stream(2, "/Filter /FlateDecode", &packed)
        .stream(3, "/Filter 4 0 R", b"48656c6c6f>")
        .object(4, "/AHx");
    b.free(0, 65535);
    let xref = b.xref_table("<< /Size 5 /Root 1 0 R >>");
    let doc = open(b.finish(xref));

    let handle = Value::reference(2, 0);
    assert_eq!(doc.get_data(&handle, false).unwrap().as_ref(), packed.as_slice());
    assert_eq!(doc.get_data(&handle, true).unwrap().as_ref(), content);
    // the filter name itself is an indirect object
    assert_eq!(doc.get_data(&Value::reference(3, 0), true).unwrap().as_ref(), b"Hello");
    assert!(matches!(
        doc.get_data(&Value::reference(1, 0), true),
        Err(PdfError::TypeError { .. })
    ));
}

#[test]
fn test_unknown_filter_is_reported() {
    let mut b = PdfBuilder::new();
    b.object(1, "<< /Type /Catalog >>")
        .stream(2, "/Filter /NoSuchDecode", b"xyz");
    b.free(0, 65535);
    let xref = b.xref_table("<< /Size 3 /Root 1 0 R >>");
    let doc = open(b.finish(xref));
    assert!(matches!(
        doc.get_data(&Value::reference(2, 0), true),
        Err(PdfError::UnsupportedFilter(_))
    ));
    assert_eq!(doc.get_data(&Value::reference(2, 0), false).unwrap().as_ref(), b"xyz");
}

#[test]
fn test_self_referential_length_is_circular() {
    let mut b = PdfBuilder::new();
    b.object(1, "<< /Type /Catalog >>")
        .object(2, "<< /Length 2 0 R >>\nstream\nabc\nendstream");
    b.free(0, 65535);
    let xref = b.xref_table("<< /Size 3 /Root 1 0 R >>");
    let doc = open(b.finish(xref));
    assert!(matches!(
        doc.resolve(key(2)),
        Err(PdfError::CircularReference(k)) if k == key(2)
    ));
    // the failed attempt leaves nothing cached and nothing in progress
    assert!(!doc.body().contains(key(2)));
    assert!(matches!(doc.resolve(key(2)), Err(PdfError::CircularReference(_))));
}

#[test]
fn test_indirect_length_resolves() {
    let mut b = PdfBuilder::new();
    b.object(1, "<< /Type /Catalog >>")
        .object(2, "<< /Length 3 0 R >>\nstream\nabcdef\nendstream")
        .object(3, "6");
    b.free(0, 65535);
    let xref = b.xref_table("<< /Size 4 /Root 1 0 R >>");
    let doc = open(b.finish(xref));
    let stream = doc.resolve(key(2)).unwrap();
    assert_eq!(stream.as_stream().unwrap().raw_data().as_ref(), b"abcdef");
    assert!(!stream.as_stream().unwrap().flags().length_recovered);
}

#[test]
fn test_set_add_and_dirty_keys() {
    let mut doc = open(simple_pdf());
    assert_eq!(doc.dirty_keys().count(), 0);

    let added = doc.add(Value::Int(7)).unwrap();
    assert_eq!(added, key(5));
    assert_eq!(*doc.resolve(added).unwrap(), Value::Int(7));

    doc.set(key(2), Value::name("Replaced"));
    assert_eq!(*doc.resolve(key(2)).unwrap(), Value::name("Replaced"));

    let next = doc.add(Value::Bool(true)).unwrap();
    assert_eq!(next, key(6));
    assert_eq!(doc.dirty_keys().collect::<Vec<_>>(), [key(5), key(2), key(6)]);
    assert!(doc.contains(key(6)));
}

#[test]
fn test_add_after_highest_object_number() {
    let mut doc = open(simple_pdf());
    let last = ObjectKey::new(u64::MAX, 0);
    doc.set(last, Value::Int(1));
    assert!(matches!(
        doc.add(Value::Int(2)),
        Err(PdfError::ObjectNumbersExhausted)
    ));
    assert_eq!(*doc.resolve(last).unwrap(), Value::Int(1));
    assert_eq!(doc.dirty_keys().collect::<Vec<_>>(), [last]);
}

#[test]
fn test_set_key_through_reference() {
    let mut doc = open(simple_pdf());
    let mut handle = Value::reference(1, 0);
    doc.set_key(&mut handle, "Lang", Value::string("en")).unwrap();
    assert_eq!(handle, Value::reference(1, 0));
    let root = doc.root().unwrap();
    assert_eq!(root.get_key("Lang"), Some(&Value::string("en")));
    assert_eq!(root.get_key("Type"), Some(&Value::name("Catalog")));
    assert_eq!(doc.dirty_keys().collect::<Vec<_>>(), [key(1)]);

    let mut direct = Value::Dict(Dictionary::new());
    doc.set_key(&mut direct, "A", Value::Int(1)).unwrap();
    assert_eq!(direct.get_key("A"), Some(&Value::Int(1)));
    assert_eq!(doc.dirty_keys().count(), 1);
}

#[test]
fn test_mark_references_and_owned_streams() {
    let mut doc = open(simple_pdf());
    assert_eq!(doc.mark(&Value::reference(3, 0)).unwrap(), Some(key(3)));
    assert_eq!(doc.mark(&Value::Int(1)).unwrap(), None);

    let mut stream = Value::clone(&doc.resolve(key(4)).unwrap());
    stream.set_key("Marked", Value::Bool(true));
    assert_eq!(doc.mark(&stream).unwrap(), Some(key(4)));
    assert_eq!(
        doc.resolve(key(4)).unwrap().get_key("Marked"),
        Some(&Value::Bool(true))
    );
    assert_eq!(doc.dirty_keys().collect::<Vec<_>>(), [key(3), key(4)]);
}

#[test]
fn test_structural_equality_with_cycles() {
    let mut b = PdfBuilder::new();
    b.object(1, "<< /Type /Catalog >>")
        .object(2, "<< /Next 3 0 R /V 1 >>")
        .object(3, "<< /Next 2 0 R /V 1 >>")
        .object(4, "<< /Next 4 0 R /V 2 >>")
        .object(5, "<< /Next 5 0 R /V 1 >>");
    b.free(0, 65535);
    let xref = b.xref_table("<< /Size 6 /Root 1 0 R >>");
    let doc = open(b.finish(xref));

    let (two, three) = (Value::reference(2, 0), Value::reference(3, 0));
    assert!(doc.structurally_equal(&two, &three).unwrap());
    assert!(doc.structurally_equal(&two, &Value::reference(5, 0)).unwrap());
    assert!(!doc.structurally_equal(&two, &Value::reference(4, 0)).unwrap());
    assert!(doc.structurally_equal(&two, &two).unwrap());

    // a reference against the value it points to
    let direct = Value::clone(&doc.resolve(key(3)).unwrap());
    assert!(doc.structurally_equal(&three, &direct).unwrap());
    assert!(!doc.structurally_equal(&Value::Int(1), &Value::Real(1.0)).unwrap());
}

#[test]
fn test_structural_equality_repeats_reference_against_value() {
    let mut b = PdfBuilder::new();
    b.object(1, "<< /Type /Catalog >>").object(2, "<< /V 1 >>");
    b.free(0, 65535);
    let xref = b.xref_table("<< /Size 3 /Root 1 0 R >>");
    let doc = open(b.finish(xref));

    let mut direct = Dictionary::new();
    direct.set("V", Value::Int(1));
    let direct = Value::Dict(direct);
    let two = Value::reference(2, 0);
    assert!(doc.structurally_equal(&two, &direct).unwrap());

    let refs = Value::Array(vec![two.clone(), two.clone()]);
    let values = Value::Array(vec![direct.clone(), direct.clone()]);
    assert!(doc.structurally_equal(&refs, &values).unwrap());
    assert!(doc.structurally_equal(&values, &refs).unwrap());

    let mut other = Dictionary::new();
    other.set("V", Value::Int(2));
    let mixed = Value::Array(vec![direct, Value::Dict(other)]);
    assert!(!doc.structurally_equal(&refs, &mixed).unwrap());
}

/// Reverses every string and stream.
struct Reverse;

impl SecurityHandler for Reverse {
    fn decrypt_string(&self, _key: ObjectKey, data: &[u8]) -> Vec<u8> {
        data.iter().rev().copied().collect()
    }
}

fn encrypted_pdf() -> Vec<u8> {
    let mut b = PdfBuilder::new();
    b.object(1, "<< /Type /Catalog /Lang (ne-NE) >>")
        .stream(2, "", b"olleh")
        .object(3, "<< /Filter /Standard /O (terces) >>");
    b.free(0, 65535);
    let xref = b.xref_table("<< /Size 4 /Root 1 0 R /Encrypt 3 0 R >>");
    b.finish(xref)
}

#[test]
fn test_security_handler_decrypts_strings_and_streams() {
    let doc = OpenOptions::new()
        .security_handler(Reverse)
        .load(encrypted_pdf())
        .unwrap();
    assert!(doc.is_encrypted());
    let root = doc.root().unwrap();
    assert_eq!(root.get_key("Lang"), Some(&Value::string("EN-en")));

    let stream = Value::reference(2, 0);
    assert_eq!(doc.get_data(&stream, false).unwrap().as_ref(), b"olleh");
    assert_eq!(doc.get_data(&stream, true).unwrap().as_ref(), b"hello");

    // the encryption dictionary is read as stored
    let encrypt = doc.encrypt_dict().unwrap().unwrap();
    assert_eq!(encrypt.get_key("O"), Some(&Value::string("terces")));
}

#[test]
fn test_without_handler_data_is_untouched() {
    let doc = open(encrypted_pdf());
    assert!(doc.is_encrypted());
    assert_eq!(
        doc.root().unwrap().get_key("Lang"),
        Some(&Value::string("ne-NE"))
    );
    assert_eq!(doc.get_data(&Value::reference(2, 0), true).unwrap().as_ref(), b"olleh");
}

#[test]
fn test_header_and_trailing_bytes() {
    let doc = open(simple_pdf());
    let header = doc.header().unwrap();
    assert_eq!(header.version, (1, 7));
    assert_eq!(header.offset, 0);
    assert!(header.binary_marker);
    assert_eq!(doc.trailing_bytes(), Some(0));

    let mut data = simple_pdf();
    data.extend_from_slice(b"junk after the end");
    let doc = open(data);
    assert_eq!(doc.trailing_bytes(), Some(18));
}

#[test]
fn test_missing_header_needs_repair() {
    let mut b = PdfBuilder::with_header(b"");
    b.object(1, "<< /Type /Catalog >>");
    b.free(0, 65535);
    let xref = b.xref_table("<< /Size 2 /Root 1 0 R >>");
    let data = b.finish(xref);
    assert!(matches!(
        Document::from_bytes(data.clone()),
        Err(PdfError::InvalidHeader)
    ));
    let doc = OpenOptions::new().repair(true).load(data).unwrap();
    assert!(doc.header().is_none());
    assert!(doc.root().unwrap().as_dict().is_ok());
}

#[test]
fn test_framing_is_recorded_on_resolve() {
    let doc = open(simple_pdf());
    assert!(doc.framing(key(1)).is_none());
    doc.resolve(key(1)).unwrap();
    let framing = doc.framing(key(1)).unwrap();
    assert!(framing.endobj_present);
    assert!(framing.eol_after_obj);

    doc.resolve(key(4)).unwrap();
    let stream = doc.framing(key(4)).unwrap().stream.unwrap();
    assert!(stream.stream_eol);
    assert!(!stream.length_recovered);
}
