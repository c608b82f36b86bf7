//! COS object types.
//!
//! `Value` is the closed set of PDF object variants. An `Indirect` value is
//! a handle: it names an object owned by a `Document` and must be resolved
//! through that document before its contents can be read.

use crate::error::{PdfError, Result};
use bytes::Bytes;
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::fmt;

/// PDF name (the part after `/`), one char per raw byte.
pub type Name = SmolStr;

/// PDF array. Elements may be direct values or `Indirect` handles.
pub type Array = Vec<Value>;

/// Build a name from raw bytes, mapping each byte to the char with the same
/// code point so that arbitrary `#xx` escapes survive.
pub fn name_from_bytes(bytes: &[u8]) -> Name {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Raw bytes of a name (inverse of [`name_from_bytes`]).
pub fn name_to_bytes(name: &str) -> Vec<u8> {
    name.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Identity of an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub number: u64,
    pub generation: u32,
}

impl ObjectKey {
    pub const fn new(number: u64, generation: u32) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

/// Bookkeeping for hex strings, kept for conformance checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HexMeta {
    /// False when anything besides hex digits and whitespace appeared.
    pub only_hex: bool,
    /// Number of hex digits seen (odd counts were padded with 0).
    pub digits: usize,
}

/// PDF string, literal `( )` or hexadecimal `< >`.
#[derive(Debug, Clone, Default)]
pub struct PdfString {
    bytes: Vec<u8>,
    hex: Option<HexMeta>,
}

impl PdfString {
    pub fn literal(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            hex: None,
        }
    }

    pub fn hex(bytes: impl Into<Vec<u8>>, meta: HexMeta) -> Self {
        Self {
            bytes: bytes.into(),
            hex: Some(meta),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub const fn is_hex(&self) -> bool {
        self.hex.is_some()
    }

    pub const fn hex_meta(&self) -> Option<HexMeta> {
        self.hex
    }

    /// Replace the content, keeping the literal/hex form.
    pub fn set_bytes(&mut self, bytes: Vec<u8>) {
        self.bytes = bytes;
    }
}

impl PartialEq for PdfString {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

/// Insertion-ordered dictionary.
///
/// A `Null` value is never stored: setting a key to `Null` removes it,
/// matching the PDF rule that a null entry is equivalent to no entry.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: IndexMap<Name, Value>,
    duplicates: Vec<Name>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Set `key`; `None` or `Null` removes it. Returns the previous value.
    pub fn set(&mut self, key: impl Into<Name>, value: impl Into<Option<Value>>) -> Option<Value> {
        let key = key.into();
        match value.into() {
            None | Some(Value::Null) => self.entries.shift_remove(&key),
            Some(value) => self.entries.insert(key, value),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    /// Insert while parsing: a repeated key overwrites the earlier value and
    /// is remembered in [`Dictionary::duplicate_keys`].
    pub(crate) fn insert_parsed(&mut self, key: Name, value: Value) -> bool {
        let duplicate = self.entries.contains_key(&key);
        if duplicate {
            self.duplicates.push(key.clone());
        }
        self.set(key, value);
        duplicate
    }

    /// Keys that appeared more than once in the parsed source.
    pub fn duplicate_keys(&self) -> &[Name] {
        &self.duplicates
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Name> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.values()
    }

    /// Direct integer entry.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_int().ok())
    }

    /// Direct name entry.
    pub fn get_name(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_name().ok())
    }

    /// `true` when `/Type` is the given name.
    pub fn is_type(&self, ty: &str) -> bool {
        self.get_name("Type") == Some(ty)
    }
}

impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl FromIterator<(Name, Value)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (Name, Value)>>(iter: I) -> Self {
        let mut dict = Self::new();
        for (k, v) in iter {
            dict.set(k, v);
        }
        dict
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a Name, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, Name, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Compliance observations made while capturing stream content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamFlags {
    /// The `stream` keyword was followed by CR, LF or CRLF.
    pub stream_eol: bool,
    /// An end-of-line preceded `endstream`.
    pub endstream_eol: bool,
    /// `/Length` as written (after resolving an indirect reference).
    pub declared_length: Option<i64>,
    /// The declared length did not land on `endstream`; the content length
    /// was recomputed by scanning.
    pub length_recovered: bool,
}

/// Stream object: dictionary plus undecoded content.
#[derive(Debug, Clone)]
pub struct Stream {
    dict: Dictionary,
    raw: Bytes,
    flags: StreamFlags,
    owner: Option<ObjectKey>,
}

impl Stream {
    pub fn new(dict: Dictionary, raw: impl Into<Bytes>) -> Self {
        Self {
            dict,
            raw: raw.into(),
            flags: StreamFlags::default(),
            owner: None,
        }
    }

    pub(crate) fn with_flags(dict: Dictionary, raw: Bytes, flags: StreamFlags) -> Self {
        Self {
            dict,
            raw,
            flags,
            owner: None,
        }
    }

    pub const fn dict(&self) -> &Dictionary {
        &self.dict
    }

    pub fn dict_mut(&mut self) -> &mut Dictionary {
        &mut self.dict
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.dict.get(key)
    }

    /// Raw (still encoded) content.
    pub const fn raw_data(&self) -> &Bytes {
        &self.raw
    }

    /// Replace the raw content and update `/Length`.
    pub fn set_raw_data(&mut self, raw: impl Into<Bytes>) {
        self.raw = raw.into();
        let len = i64::try_from(self.raw.len()).unwrap_or(i64::MAX);
        self.dict.set("Length", Value::Int(len));
    }

    pub const fn flags(&self) -> StreamFlags {
        self.flags
    }

    /// Indirect object this stream was read from, if any.
    pub const fn owner(&self) -> Option<ObjectKey> {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, key: ObjectKey) {
        self.owner = Some(key);
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.dict == other.dict && self.raw == other.raw
    }
}

/// PDF object value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Name(Name),
    Str(PdfString),
    Array(Array),
    Dict(Dictionary),
    Stream(Box<Stream>),
    Indirect(ObjectKey),
}

impl Value {
    pub fn name(name: impl Into<Name>) -> Self {
        Self::Name(name.into())
    }

    pub fn string(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Str(PdfString::literal(bytes))
    }

    pub const fn reference(number: u64, generation: u32) -> Self {
        Self::Indirect(ObjectKey::new(number, generation))
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub const fn is_indirect(&self) -> bool {
        matches!(self, Self::Indirect(_))
    }

    pub const fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(self.type_error("bool")),
        }
    }

    pub const fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            _ => Err(self.type_error("int")),
        }
    }

    pub const fn as_real(&self) -> Result<f64> {
        match self {
            Self::Real(n) => Ok(*n),
            _ => Err(self.type_error("real")),
        }
    }

    /// Numeric value, int or real, as f64.
    pub const fn as_num(&self) -> Result<f64> {
        match self {
            Self::Int(n) => Ok(*n as f64),
            Self::Real(n) => Ok(*n),
            _ => Err(self.type_error("number")),
        }
    }

    pub fn as_name(&self) -> Result<&str> {
        match self {
            Self::Name(s) => Ok(s),
            _ => Err(self.type_error("name")),
        }
    }

    /// String bytes.
    pub fn as_str(&self) -> Result<&[u8]> {
        match self {
            Self::Str(s) => Ok(s.as_bytes()),
            _ => Err(self.type_error("string")),
        }
    }

    pub const fn as_pdf_string(&self) -> Result<&PdfString> {
        match self {
            Self::Str(s) => Ok(s),
            _ => Err(self.type_error("string")),
        }
    }

    pub const fn as_array(&self) -> Result<&Array> {
        match self {
            Self::Array(arr) => Ok(arr),
            _ => Err(self.type_error("array")),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut Array> {
        match self {
            Self::Array(arr) => Ok(arr),
            _ => Err(self.type_error("array")),
        }
    }

    pub const fn as_dict(&self) -> Result<&Dictionary> {
        match self {
            Self::Dict(d) => Ok(d),
            _ => Err(self.type_error("dict")),
        }
    }

    pub fn as_dict_mut(&mut self) -> Result<&mut Dictionary> {
        match self {
            Self::Dict(d) => Ok(d),
            _ => Err(self.type_error("dict")),
        }
    }

    pub fn as_stream(&self) -> Result<&Stream> {
        match self {
            Self::Stream(s) => Ok(s),
            _ => Err(self.type_error("stream")),
        }
    }

    pub const fn as_reference(&self) -> Result<ObjectKey> {
        match self {
            Self::Indirect(key) => Ok(*key),
            _ => Err(self.type_error("ref")),
        }
    }

    /// Dictionary of a `Dict` or of a `Stream`.
    pub fn dict_view(&self) -> Option<&Dictionary> {
        match self {
            Self::Dict(d) => Some(d),
            Self::Stream(s) => Some(s.dict()),
            _ => None,
        }
    }

    fn dict_view_mut(&mut self) -> Option<&mut Dictionary> {
        match self {
            Self::Dict(d) => Some(d),
            Self::Stream(s) => Some(s.dict_mut()),
            _ => None,
        }
    }

    /// Entry of a dictionary or stream dictionary.
    pub fn get_key(&self, key: &str) -> Option<&Value> {
        self.dict_view().and_then(|d| d.get(key))
    }

    /// Array element.
    pub fn at(&self, index: usize) -> Option<&Value> {
        match self {
            Self::Array(arr) => arr.get(index),
            _ => None,
        }
    }

    /// Number of elements of an array or entries of a dictionary.
    pub fn len(&self) -> usize {
        match self {
            Self::Array(arr) => arr.len(),
            Self::Dict(d) => d.len(),
            Self::Stream(s) => s.dict().len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_bool(&mut self, value: bool) {
        *self = Self::Bool(value);
    }

    pub fn set_int(&mut self, value: i64) {
        *self = Self::Int(value);
    }

    pub fn set_real(&mut self, value: f64) {
        *self = Self::Real(value);
    }

    pub fn set_name(&mut self, value: impl Into<Name>) {
        *self = Self::Name(value.into());
    }

    /// Replace string content. A non-string becomes a literal string.
    pub fn set_string(&mut self, bytes: impl Into<Vec<u8>>) {
        match self {
            Self::Str(s) => s.set_bytes(bytes.into()),
            _ => *self = Self::string(bytes),
        }
    }

    /// Set a dictionary entry; `None`/`Null` removes it.
    ///
    /// On anything but a dictionary or stream the value is replaced by a new
    /// dictionary holding only this entry.
    pub fn set_key(&mut self, key: impl Into<Name>, value: impl Into<Option<Value>>) {
        if let Some(dict) = self.dict_view_mut() {
            dict.set(key, value);
            return;
        }
        let mut dict = Dictionary::new();
        dict.set(key, value);
        *self = Self::Dict(dict);
    }

    /// Set a dictionary entry to an array of integers.
    pub fn set_key_ints(&mut self, key: impl Into<Name>, values: &[i64]) {
        let arr = values.iter().copied().map(Value::Int).collect();
        self.set_key(key, Value::Array(arr));
    }

    /// Set a dictionary entry to an array of reals.
    pub fn set_key_reals(&mut self, key: impl Into<Name>, values: &[f64]) {
        let arr = values.iter().copied().map(Value::Real).collect();
        self.set_key(key, Value::Array(arr));
    }

    /// Set an array slot; `None` removes it. `index == len` appends.
    ///
    /// `Some(Value::Null)` stores a null element: arrays keep positional
    /// nulls (`/DecodeParms [null << ... >>]`), while [`Dictionary::set`]
    /// drops null entries. On a non-array the value is replaced by a
    /// one-element array.
    pub fn set_at(&mut self, index: usize, value: Option<Value>) {
        match self {
            Self::Array(arr) => match value {
                Some(v) if index < arr.len() => arr[index] = v,
                Some(v) if index == arr.len() => arr.push(v),
                Some(_) => {}
                None if index < arr.len() => {
                    arr.remove(index);
                }
                None => {}
            },
            _ => *self = Self::Array(value.into_iter().collect()),
        }
    }

    /// Append to an array; a non-array becomes a one-element array.
    pub fn push(&mut self, value: Value) {
        match self {
            Self::Array(arr) => arr.push(value),
            _ => *self = Self::Array(vec![value]),
        }
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Name(_) => "name",
            Self::Str(_) => "string",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Stream(_) => "stream",
            Self::Indirect(_) => "ref",
        }
    }

    const fn type_error(&self, expected: &'static str) -> PdfError {
        PdfError::TypeError {
            expected,
            got: self.type_name(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Real(n)
    }
}

impl From<ObjectKey> for Value {
    fn from(key: ObjectKey) -> Self {
        Self::Indirect(key)
    }
}

impl From<PdfString> for Value {
    fn from(s: PdfString) -> Self {
        Self::Str(s)
    }
}

impl From<Array> for Value {
    fn from(arr: Array) -> Self {
        Self::Array(arr)
    }
}

impl From<Dictionary> for Value {
    fn from(dict: Dictionary) -> Self {
        Self::Dict(dict)
    }
}

impl From<Stream> for Value {
    fn from(stream: Stream) -> Self {
        Self::Stream(Box::new(stream))
    }
}
