//! Documents: lazy object resolution on top of the cross-reference table.

use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use bytes::Bytes;
use indexmap::IndexSet;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use super::body::ObjectBody;
use super::header::{Header, trailing_bytes};
use super::objstm::ObjectStream;
use super::options::OpenOptions;
use super::security::SecurityHandler;
use super::xref::{SectionKind, XRefKind, XRefLoader, XRefTable};
use crate::codec::{FilterPipeline, FilterRegistry};
use crate::error::{PdfError, Result};
use crate::io::PdfBytes;
use crate::model::objects::{Dictionary, Name, ObjectKey, Stream, Value};
use crate::model::trailer::Trailer;
use crate::parser::{FramingFlags, ParseContext, Parser};

/// Nesting followed when making `/Filter` and `/DecodeParms` direct.
const FILTER_PARAMS_DEPTH: usize = 2;

/// Marks an object as being resolved for as long as it lives.
struct ResolveGuard<'a> {
    resolving: &'a RefCell<FxHashSet<ObjectKey>>,
    key: ObjectKey,
}

impl<'a> ResolveGuard<'a> {
    fn enter(resolving: &'a RefCell<FxHashSet<ObjectKey>>, key: ObjectKey) -> Result<Self> {
        if !resolving.borrow_mut().insert(key) {
            return Err(PdfError::CircularReference(key));
        }
        Ok(Self { resolving, key })
    }
}

impl Drop for ResolveGuard<'_> {
    fn drop(&mut self) {
        self.resolving.borrow_mut().remove(&self.key);
    }
}

/// An opened PDF file.
///
/// Objects are parsed the first time they are resolved and shared
/// afterwards. A `Document` is single-threaded; open one per thread.
pub struct Document {
    data: PdfBytes,
    header: Option<Header>,
    trailing: Option<usize>,
    xref: XRefTable,
    body: ObjectBody,
    object_streams: RefCell<FxHashMap<u64, Rc<ObjectStream>>>,
    resolving: RefCell<FxHashSet<ObjectKey>>,
    dirty: IndexSet<ObjectKey>,
    next_number: u64,
    filters: FilterRegistry,
    security: Option<Box<dyn SecurityHandler>>,
    max_depth: usize,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("len", &self.data.len())
            .field("header", &self.header)
            .field("xref_entries", &self.xref.len())
            .field("resolved", &self.body.len())
            .field("dirty", &self.dirty.len())
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Open the file at `path` with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        OpenOptions::new().open(path)
    }

    /// Open a document held in memory with default options.
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        OpenOptions::new().load(data)
    }

    pub(crate) fn load_with(data: PdfBytes, options: OpenOptions) -> Result<Self> {
        let OpenOptions {
            repair,
            max_depth,
            filters,
            security,
        } = options;
        let bytes = data.as_bytes().clone();

        let header = Header::parse(&bytes);
        match header {
            Some(h) if h.offset > 0 => warn!(offset = h.offset, "data before %PDF- header"),
            Some(_) => {}
            None if repair => warn!("no %PDF- header"),
            None => return Err(PdfError::InvalidHeader),
        }

        let loader = XRefLoader::new(&bytes, &filters, max_depth);
        let xref = match loader.load() {
            Ok(xref) => xref,
            Err(err) if repair => {
                warn!(%err, "cross-reference unreadable, scanning for objects");
                loader.repair()?
            }
            Err(err) => return Err(err),
        };

        let declared = xref
            .trailer()
            .size()
            .and_then(|s| u64::try_from(s).ok())
            .unwrap_or(0);
        let next_number = declared.max(xref.max_number().map_or(1, |n| n.saturating_add(1)));
        debug!(
            objects = xref.len(),
            sections = xref.sections().len(),
            next_number,
            "document loaded"
        );

        Ok(Self {
            trailing: trailing_bytes(&bytes),
            data,
            header,
            xref,
            body: ObjectBody::new(),
            object_streams: RefCell::default(),
            resolving: RefCell::default(),
            dirty: IndexSet::new(),
            next_number,
            filters,
            security,
            max_depth,
        })
    }

    /// The file content.
    pub const fn data(&self) -> &Bytes {
        self.data.as_bytes()
    }

    pub const fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// Bytes after the last `%%EOF`, `None` when there is no `%%EOF`.
    pub const fn trailing_bytes(&self) -> Option<usize> {
        self.trailing
    }

    pub const fn xref(&self) -> &XRefTable {
        &self.xref
    }

    pub const fn body(&self) -> &ObjectBody {
        &self.body
    }

    pub const fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    /// Merged trailer: the newest section's keys, older ones filling gaps.
    pub const fn trailer(&self) -> &Trailer {
        self.xref.trailer()
    }

    /// Trailer of the newest section.
    pub fn first_trailer(&self) -> Option<&Trailer> {
        self.xref.first_trailer()
    }

    /// Trailer of the oldest section.
    pub fn last_trailer(&self) -> Option<&Trailer> {
        self.xref.last_trailer()
    }

    pub fn is_encrypted(&self) -> bool {
        self.trailer().encrypt().is_some()
    }

    /// The `/Encrypt` dictionary, never decrypted.
    pub fn encrypt_dict(&self) -> Result<Option<Rc<Value>>> {
        match self.trailer().encrypt() {
            Some(value) => self.deref(value).map(Some),
            None => Ok(None),
        }
    }

    /// The document catalog, null when `/Root` is missing.
    pub fn root(&self) -> Result<Rc<Value>> {
        match self.trailer().root() {
            Some(root) => self.deref(root),
            None => Ok(Rc::new(Value::Null)),
        }
    }

    /// Whether `key` is defined, by the file or by a caller.
    pub fn contains(&self, key: ObjectKey) -> bool {
        self.body.contains(key) || self.xref.lookup(key).is_some()
    }

    /// Every defined key in number order.
    pub fn object_keys(&self) -> Vec<ObjectKey> {
        let mut keys: Vec<_> = self.xref.object_keys().chain(self.body.keys()).collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    /// Framing of `key` as found in the file. Known once it was resolved;
    /// objects inside object streams have none.
    pub fn framing(&self, key: ObjectKey) -> Option<FramingFlags> {
        self.body.framing(key)
    }

    /// Resolve an indirect object.
    ///
    /// Free and undefined keys are [`PdfError::ObjectNotFound`]. A key that
    /// is reached again while it is being parsed, for instance through its
    /// own `/Length`, is [`PdfError::CircularReference`].
    pub fn resolve(&self, key: ObjectKey) -> Result<Rc<Value>> {
        if let Some(value) = self.body.get(key) {
            return Ok(value);
        }
        let _guard = ResolveGuard::enter(&self.resolving, key)?;

        let entry = *self.xref.lookup(key).ok_or(PdfError::ObjectNotFound(key))?;
        let value = match entry.kind {
            XRefKind::InUse => self.load_at(key, entry.offset)?,
            XRefKind::Compressed { container, index } => {
                self.load_compressed(key, container, index)?
            }
            XRefKind::Free => return Err(PdfError::ObjectNotFound(key)),
        };

        let value = Rc::new(value);
        self.body.set(key, Rc::clone(&value));
        Ok(value)
    }

    fn load_at(&self, key: ObjectKey, offset: u64) -> Result<Value> {
        let pos = usize::try_from(offset)
            .ok()
            .filter(|&pos| pos < self.data.len())
            .ok_or_else(|| PdfError::xref(0, format!("offset {offset} of {key} outside file")))?;
        let object = Parser::new(self.data().clone(), pos)
            .with_context(self)
            .with_max_depth(self.max_depth)
            .read_indirect()?;
        if object.key != key {
            return Err(PdfError::syntax(
                pos,
                format!("expected object {key}, found {}", object.key),
            ));
        }
        self.body.set_framing(key, object.framing);
        Ok(object.value)
    }

    fn load_compressed(&self, key: ObjectKey, container: u64, index: u32) -> Result<Value> {
        let stm = self.object_stream(container)?;
        stm.parse_object(
            key.number,
            usize::try_from(index).ok(),
            Some(self as &dyn ParseContext),
            self.max_depth,
        )
    }

    /// Decoded and indexed object stream, cached per container.
    fn object_stream(&self, container: u64) -> Result<Rc<ObjectStream>> {
        if let Some(stm) = self.object_streams.borrow().get(&container) {
            return Ok(Rc::clone(stm));
        }
        let generation = self.xref.get(container).map_or(0, |e| e.generation);
        let value = self.resolve(ObjectKey::new(container, generation))?;
        let stream = value.as_stream()?;
        if !stream.dict().is_type("ObjStm") {
            debug!(container, "object stream without /Type /ObjStm");
        }
        let n = self.direct_usize(stream.get("N"), "N")?;
        let first = self.direct_usize(stream.get("First"), "First")?;
        let data = self.stream_data(stream, true)?;

        let stm = Rc::new(ObjectStream::new(data, n, first)?);
        self.object_streams
            .borrow_mut()
            .insert(container, Rc::clone(&stm));
        Ok(stm)
    }

    fn direct_usize(&self, value: Option<&Value>, key: &'static str) -> Result<usize> {
        let value = match value {
            Some(value) => self.deref(value)?,
            None => return Err(PdfError::syntax(0, format!("object stream without /{key}"))),
        };
        usize::try_from(value.as_int()?)
            .map_err(|_| PdfError::syntax(0, format!("negative /{key} in object stream")))
    }

    /// Follow `value` when it is a reference. Undefined objects read as
    /// null.
    pub fn deref(&self, value: &Value) -> Result<Rc<Value>> {
        match value {
            Value::Indirect(key) => match self.resolve(*key) {
                Err(PdfError::ObjectNotFound(_)) => Ok(Rc::new(Value::Null)),
                other => other,
            },
            direct => Ok(Rc::new(direct.clone())),
        }
    }

    /// Dictionary entry of `handle`, following references on both ends.
    pub fn get_key(&self, handle: &Value, key: &str) -> Result<Rc<Value>> {
        let target = self.deref(handle)?;
        match target.get_key(key) {
            Some(value) => self.deref(value),
            None => Ok(Rc::new(Value::Null)),
        }
    }

    /// Array element of `handle`, following references on both ends.
    pub fn at(&self, handle: &Value, index: usize) -> Result<Rc<Value>> {
        let target = self.deref(handle)?;
        match target.at(index) {
            Some(value) => self.deref(value),
            None => Ok(Rc::new(Value::Null)),
        }
    }

    /// Set a dictionary entry. On a reference the change is made to the
    /// referenced object, which is stored back and marked dirty.
    pub fn set_key(
        &mut self,
        handle: &mut Value,
        key: impl Into<Name>,
        value: impl Into<Option<Value>>,
    ) -> Result<()> {
        match handle {
            Value::Indirect(target) => {
                let target = *target;
                let mut resolved = Value::clone(&*self.resolve(target)?);
                resolved.set_key(key, value);
                self.set(target, resolved);
            }
            direct => direct.set_key(key, value),
        }
        Ok(())
    }

    /// Replace the object `key`.
    pub fn set(&mut self, key: ObjectKey, value: impl Into<Value>) {
        self.body.set(key, value.into());
        self.dirty.insert(key);
        self.next_number = self.next_number.max(key.number.saturating_add(1));
    }

    /// Store `handle` back under its own key and mark it dirty.
    ///
    /// A reference marks the referenced object as it is now. A stream read
    /// from the file goes back under the key it was read from; other direct
    /// values have no key and are left alone.
    pub fn mark(&mut self, handle: &Value) -> Result<Option<ObjectKey>> {
        match handle {
            Value::Indirect(key) => {
                let value = self.resolve(*key)?;
                self.body.set(*key, value);
                self.dirty.insert(*key);
                Ok(Some(*key))
            }
            Value::Stream(stream) => match stream.owner() {
                Some(owner) => {
                    self.set(owner, handle.clone());
                    Ok(Some(owner))
                }
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    /// Add a new object under a fresh number.
    pub fn add(&mut self, value: impl Into<Value>) -> Result<ObjectKey> {
        let after_body = match self.body.max_number() {
            Some(n) => n.checked_add(1).ok_or(PdfError::ObjectNumbersExhausted)?,
            None => 1,
        };
        let number = self.next_number.max(after_body);
        let key = ObjectKey::new(number, 0);
        // both counters saturate at u64::MAX
        let taken = self.body.contains(key) || self.xref.get(number).is_some_and(|e| !e.is_free());
        if taken {
            return Err(PdfError::ObjectNumbersExhausted);
        }
        self.set(key, value);
        Ok(key)
    }

    /// Keys changed through [`set`](Self::set), [`mark`](Self::mark) or
    /// [`add`](Self::add), in the order they were first changed.
    pub fn dirty_keys(&self) -> impl Iterator<Item = ObjectKey> + '_ {
        self.dirty.iter().copied()
    }

    /// Stream data of `handle`: the bytes as stored, or decrypted and run
    /// through `/Filter`.
    pub fn get_data(&self, handle: &Value, decode: bool) -> Result<Bytes> {
        let value = self.deref(handle)?;
        self.stream_data(value.as_stream()?, decode)
    }

    /// Data of a stream already in hand. See [`get_data`](Self::get_data).
    pub fn stream_data(&self, stream: &Stream, decode: bool) -> Result<Bytes> {
        let raw = stream.raw_data();
        if !decode {
            return Ok(raw.clone());
        }

        let data = match (&self.security, stream.owner()) {
            (Some(handler), Some(owner))
                if self.decrypts(owner) && !stream.dict().is_type("XRef") =>
            {
                Bytes::from(handler.decrypt_stream(owner, raw, stream.dict()))
            }
            _ => raw.clone(),
        };

        let params = self.filter_params(stream.dict())?;
        let pipeline = FilterPipeline::from_dict(&self.filters, &params)?;
        if pipeline.is_empty() {
            return Ok(data);
        }
        Ok(Bytes::from(pipeline.decode(&data)?))
    }

    /// `/Filter` and `/DecodeParms` with references replaced.
    fn filter_params(&self, dict: &Dictionary) -> Result<Dictionary> {
        let mut params = Dictionary::new();
        for key in ["Filter", "DecodeParms"] {
            if let Some(value) = dict.get(key) {
                params.set(key, self.make_direct(value, FILTER_PARAMS_DEPTH)?);
            }
        }
        Ok(params)
    }

    fn make_direct(&self, value: &Value, depth: usize) -> Result<Value> {
        let value = Value::clone(&*self.deref(value)?);
        if depth == 0 {
            return Ok(value);
        }
        Ok(match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| self.make_direct(v, depth - 1))
                    .collect::<Result<_>>()?,
            ),
            Value::Dict(dict) => Value::Dict(
                dict.iter()
                    .map(|(k, v)| Ok((k.clone(), self.make_direct(v, depth - 1)?)))
                    .collect::<Result<Dictionary>>()?,
            ),
            other => other,
        })
    }

    fn encrypt_key(&self) -> Option<ObjectKey> {
        self.trailer().encrypt().and_then(|v| v.as_reference().ok())
    }

    /// Whether strings and streams of `key` go through the handler.
    fn decrypts(&self, key: ObjectKey) -> bool {
        if self.security.is_none() || !self.is_encrypted() || self.encrypt_key() == Some(key) {
            return false;
        }
        let is_xref_stream = self.xref.lookup(key).is_some_and(|entry| {
            entry.kind == XRefKind::InUse
                && self.xref.sections().iter().any(|s| {
                    s.kind == SectionKind::Stream && s.offset as u64 == entry.offset
                })
        });
        !is_xref_stream
    }

    /// Deep comparison following references. Two references to the same
    /// key are equal without being resolved, and a pair of keys met again
    /// further down its own comparison is assumed equal.
    pub fn structurally_equal(&self, a: &Value, b: &Value) -> Result<bool> {
        let mut seen = FxHashSet::default();
        self.equal_inner(a, b, &mut seen)
    }

    fn equal_inner(
        &self,
        a: &Value,
        b: &Value,
        seen: &mut FxHashSet<(Option<ObjectKey>, Option<ObjectKey>)>,
    ) -> Result<bool> {
        match (a, b) {
            (Value::Indirect(x), Value::Indirect(y)) if x == y => return Ok(true),
            (Value::Indirect(x), Value::Indirect(y)) => {
                let pair = (Some(*x), Some(*y));
                if !seen.insert(pair) {
                    return Ok(true);
                }
                let (ra, rb) = (self.deref(a)?, self.deref(b)?);
                let equal = self.equal_inner(&ra, &rb, seen);
                seen.remove(&pair);
                return equal;
            }
            (Value::Indirect(x), _) => {
                // a chain of references that never reaches a value
                let pair = (Some(*x), None);
                if !seen.insert(pair) {
                    return Ok(false);
                }
                let ra = self.deref(a)?;
                let equal = self.equal_inner(&ra, b, seen);
                seen.remove(&pair);
                return equal;
            }
            (_, Value::Indirect(y)) => {
                let pair = (None, Some(*y));
                if !seen.insert(pair) {
                    return Ok(false);
                }
                let rb = self.deref(b)?;
                let equal = self.equal_inner(a, &rb, seen);
                seen.remove(&pair);
                return equal;
            }
            _ => {}
        }

        match (a, b) {
            (Value::Array(x), Value::Array(y)) => {
                if x.len() != y.len() {
                    return Ok(false);
                }
                for (u, v) in x.iter().zip(y) {
                    if !self.equal_inner(u, v, seen)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Value::Dict(x), Value::Dict(y)) => self.dicts_equal(x, y, seen),
            (Value::Stream(x), Value::Stream(y)) => Ok(x.raw_data() == y.raw_data()
                && self.dicts_equal(x.dict(), y.dict(), seen)?),
            _ => Ok(a == b),
        }
    }

    fn dicts_equal(
        &self,
        x: &Dictionary,
        y: &Dictionary,
        seen: &mut FxHashSet<(Option<ObjectKey>, Option<ObjectKey>)>,
    ) -> Result<bool> {
        if x.len() != y.len() {
            return Ok(false);
        }
        for (key, u) in x.iter() {
            let Some(v) = y.get(key) else {
                return Ok(false);
            };
            if !self.equal_inner(u, v, seen)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl ParseContext for Document {
    fn resolve_length(&self, key: ObjectKey) -> Result<Option<i64>> {
        Ok(self.resolve(key)?.as_int().ok())
    }

    fn decrypt_string(&self, key: ObjectKey, bytes: &[u8]) -> Option<Vec<u8>> {
        if !self.decrypts(key) {
            return None;
        }
        self.security
            .as_ref()
            .map(|handler| handler.decrypt_string(key, bytes))
    }
}
