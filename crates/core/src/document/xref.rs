//! Cross-reference tables and streams.
//!
//! Sections are read from the one named by `startxref` backwards along the
//! `/Prev` chain. The newest section wins for every object number, and a
//! free entry in a newer section hides an older in-use definition.

use super::objstm::ObjectStream;
use crate::codec::{FilterPipeline, FilterRegistry};
use crate::error::{PdfError, Result};
use crate::io::cursor::rfind_bytes;
use crate::model::objects::{Dictionary, ObjectKey, Value};
use crate::model::trailer::Trailer;
use crate::parser::{Keyword, Lexer, Parser, Token};
use bytes::Bytes;
use regex::bytes::Regex;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Generation of the head of the free list.
const FREE_HEAD_GENERATION: u32 = 65535;

/// How far to look past an object header for `/ObjStm` while repairing.
const OBJSTM_PROBE: usize = 256;

static OBJECT_HEADER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+(\d+)\s+obj\b").ok());
static CATALOG_TYPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"/Type\s*/Catalog\b").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XRefKind {
    Free,
    InUse,
    /// Stored in the object stream `container`.
    Compressed { container: u64, index: u32 },
}

/// One cross-reference entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XRefEntry {
    /// Byte offset when in use, next free object number when free, index
    /// inside the container when compressed.
    pub offset: u64,
    pub generation: u32,
    pub kind: XRefKind,
}

impl XRefEntry {
    pub const fn free(next: u64, generation: u32) -> Self {
        Self {
            offset: next,
            generation,
            kind: XRefKind::Free,
        }
    }

    pub const fn in_use(offset: u64, generation: u32) -> Self {
        Self {
            offset,
            generation,
            kind: XRefKind::InUse,
        }
    }

    pub const fn compressed(container: u64, index: u32) -> Self {
        Self {
            offset: index as u64,
            generation: 0,
            kind: XRefKind::Compressed { container, index },
        }
    }

    pub const fn is_free(&self) -> bool {
        matches!(self.kind, XRefKind::Free)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// Classic `xref` table.
    Table,
    /// Cross-reference stream.
    Stream,
    /// Rebuilt by scanning for object headers.
    Repaired,
}

/// Where one cross-reference section was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XRefSection {
    pub offset: usize,
    pub kind: SectionKind,
    pub entries: usize,
}

/// Merged cross-reference data of a file.
#[derive(Debug, Clone, Default)]
pub struct XRefTable {
    entries: BTreeMap<u64, XRefEntry>,
    sections: Vec<XRefSection>,
    /// Newest first.
    trailers: Vec<Trailer>,
    merged: Trailer,
}

impl XRefTable {
    /// The effective entry for an object number.
    pub fn get(&self, number: u64) -> Option<&XRefEntry> {
        self.entries.get(&number)
    }

    /// The in-use or compressed entry defining `key`, if any.
    pub fn lookup(&self, key: ObjectKey) -> Option<&XRefEntry> {
        self.entries
            .get(&key.number)
            .filter(|e| !e.is_free() && e.generation == key.generation)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &XRefEntry)> {
        self.entries.iter().map(|(n, e)| (*n, e))
    }

    /// Keys of every object defined in the file, in number order.
    pub fn object_keys(&self) -> impl Iterator<Item = ObjectKey> + '_ {
        self.iter()
            .filter(|(_, e)| !e.is_free())
            .map(|(n, e)| ObjectKey::new(n, e.generation))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_number(&self) -> Option<u64> {
        self.entries.keys().next_back().copied()
    }

    /// Sections in load order, newest first.
    pub fn sections(&self) -> &[XRefSection] {
        &self.sections
    }

    pub fn is_repaired(&self) -> bool {
        self.sections
            .iter()
            .any(|s| s.kind == SectionKind::Repaired)
    }

    /// Trailer dictionaries, newest first.
    pub fn trailers(&self) -> &[Trailer] {
        &self.trailers
    }

    /// The trailer of the newest section, with keys it lacks taken from
    /// older sections.
    pub const fn trailer(&self) -> &Trailer {
        &self.merged
    }

    /// Trailer of the section named by `startxref`.
    pub fn first_trailer(&self) -> Option<&Trailer> {
        self.trailers.first()
    }

    /// Trailer at the end of the `/Prev` chain.
    pub fn last_trailer(&self) -> Option<&Trailer> {
        self.trailers.last()
    }

    /// Add an older revision. Numbers already present keep their entry.
    fn merge_older(&mut self, revision: BTreeMap<u64, XRefEntry>) -> usize {
        let mut added = 0;
        for (number, entry) in revision {
            if let Entry::Vacant(slot) = self.entries.entry(number) {
                slot.insert(entry);
                added += 1;
            }
        }
        added
    }

    fn push_trailer(&mut self, trailer: Trailer) {
        if self.trailers.is_empty() {
            self.merged = trailer.clone();
        } else {
            self.merged.merge_older(&trailer);
        }
        self.trailers.push(trailer);
    }

    fn finish(&mut self) {
        self.entries
            .insert(0, XRefEntry::free(0, FREE_HEAD_GENERATION));
    }
}

/// Offset named by the last `startxref` in the file.
pub fn find_startxref(data: &Bytes) -> Result<usize> {
    let pos = rfind_bytes(data, b"startxref").ok_or(PdfError::StartXRefNotFound)?;
    let mut lexer = Lexer::at(data.clone(), pos + b"startxref".len());
    match lexer.next_token() {
        Some(Ok((_, Token::Int(offset)))) => usize::try_from(offset)
            .ok()
            .filter(|&offset| offset < data.len())
            .ok_or(PdfError::StartXRefNotFound),
        _ => Err(PdfError::StartXRefNotFound),
    }
}

/// One revision's entries and trailer.
struct Section {
    entries: BTreeMap<u64, XRefEntry>,
    trailer: Trailer,
}

/// Reads cross-reference sections out of the raw file.
///
/// Objects are parsed without a document here: indirect `/Length` values
/// fall back to scanning for `endstream`, and nothing is decrypted.
pub(crate) struct XRefLoader<'a> {
    data: &'a Bytes,
    filters: &'a FilterRegistry,
    max_depth: usize,
}

impl<'a> XRefLoader<'a> {
    pub(crate) const fn new(data: &'a Bytes, filters: &'a FilterRegistry, max_depth: usize) -> Self {
        Self {
            data,
            filters,
            max_depth,
        }
    }

    fn parser(&self, pos: usize) -> Parser<'static> {
        Parser::new(self.data.clone(), pos)
            .with_max_depth(self.max_depth)
            .without_decryption()
    }

    /// Follow the chain from `startxref`.
    ///
    /// A broken newest section is an error. A broken older section ends
    /// the chain and keeps what was merged so far.
    pub(crate) fn load(&self) -> Result<XRefTable> {
        let mut table = XRefTable::default();
        let mut visited = FxHashSet::default();
        let mut next = Some(find_startxref(self.data)?);

        while let Some(pos) = next {
            if !visited.insert(pos) {
                warn!(offset = pos, "cross-reference /Prev loop");
                break;
            }
            match self.load_revision(pos, &mut visited, &mut table) {
                Ok(prev) => next = prev,
                Err(err) if table.sections.is_empty() => return Err(err),
                Err(err) => {
                    warn!(offset = pos, %err, "ignoring broken older cross-reference section");
                    break;
                }
            }
        }

        table.finish();
        Ok(table)
    }

    /// Load the revision at `pos`, returning the `/Prev` offset.
    fn load_revision(
        &self,
        pos: usize,
        visited: &mut FxHashSet<usize>,
        table: &mut XRefTable,
    ) -> Result<Option<usize>> {
        let mut lexer = Lexer::at(self.data.clone(), pos);
        lexer.skip_whitespace();

        let section = if lexer.cursor().starts_with(b"xref") {
            let mut section = self.load_table(pos)?;
            table.sections.push(XRefSection {
                offset: pos,
                kind: SectionKind::Table,
                entries: section.entries.len(),
            });
            if let Some(stm) = section
                .trailer
                .xref_stm()
                .and_then(|p| usize::try_from(p).ok())
                .filter(|p| visited.insert(*p))
            {
                self.overlay_hybrid(stm, &mut section, table);
            }
            section
        } else {
            let section = self.load_stream(pos)?;
            table.sections.push(XRefSection {
                offset: pos,
                kind: SectionKind::Stream,
                entries: section.entries.len(),
            });
            section
        };

        let prev = section.trailer.prev().and_then(|p| usize::try_from(p).ok());
        let added = table.merge_older(section.entries);
        debug!(offset = pos, added, ?prev, "merged cross-reference section");
        table.push_trailer(section.trailer);
        Ok(prev)
    }

    /// Hybrid files hide compressed objects from the classic table. The
    /// `/XRefStm` entries fill numbers the table leaves free or omits.
    fn overlay_hybrid(&self, pos: usize, section: &mut Section, table: &mut XRefTable) {
        let stream = match self.load_stream(pos) {
            Ok(stream) => stream,
            Err(err) => {
                warn!(offset = pos, %err, "unreadable /XRefStm");
                return;
            }
        };
        table.sections.push(XRefSection {
            offset: pos,
            kind: SectionKind::Stream,
            entries: stream.entries.len(),
        });
        for (number, entry) in stream.entries {
            match section.entries.entry(number) {
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                }
                Entry::Occupied(mut slot) if slot.get().is_free() => {
                    slot.insert(entry);
                }
                Entry::Occupied(_) => {}
            }
        }
    }

    /// Classic table: `xref`, subsections of `first count` followed by
    /// `offset generation n|f` records, then `trailer << ... >>`.
    fn load_table(&self, pos: usize) -> Result<Section> {
        let mut lexer = Lexer::at(self.data.clone(), pos);
        match lexer.next_token().transpose()? {
            Some((_, Token::Keyword(Keyword::Xref))) => {}
            _ => return Err(PdfError::xref(pos, "expected 'xref'")),
        }

        let mut entries = BTreeMap::new();
        loop {
            let (at, token) = lexer
                .next_token()
                .transpose()?
                .ok_or_else(|| PdfError::xref(lexer.tell(), "missing trailer"))?;
            let first = match token {
                Token::Keyword(Keyword::Trailer) => break,
                Token::Int(first) => first,
                _ => return Err(PdfError::xref(at, "expected subsection or trailer")),
            };
            let count = match lexer.next_token().transpose()? {
                Some((_, Token::Int(count))) => count,
                _ => return Err(PdfError::xref(at, "missing subsection count")),
            };
            let (Ok(mut base), Ok(count)) = (u64::try_from(first), u64::try_from(count)) else {
                return Err(PdfError::xref(at, "negative subsection bounds"));
            };

            for i in 0..count {
                let (offset, generation, marker) = read_record(&mut lexer)?;

                // Subsections that start at 1 but still carry the free
                // head `0000000000 65535 f` are off by one.
                if i == 0 && base == 1 && !marker && offset == 0 && generation == FREE_HEAD_GENERATION
                {
                    debug!(offset = pos, "xref subsection off by one");
                    base = 0;
                }

                let entry = if marker {
                    XRefEntry::in_use(offset, generation)
                } else {
                    XRefEntry::free(offset, generation)
                };
                entries.insert(base + i, entry);
            }
        }

        let trailer = match self.parser(lexer.tell()).parse_object()? {
            Value::Dict(dict) => Trailer::new(dict),
            other => {
                return Err(PdfError::xref(
                    lexer.tell(),
                    format!("trailer is {}", other.type_name()),
                ));
            }
        };
        Ok(Section { entries, trailer })
    }

    /// Cross-reference stream: `/W` field widths over `/Index` ranges.
    fn load_stream(&self, pos: usize) -> Result<Section> {
        let object = self.parser(pos).read_indirect()?;
        let Value::Stream(stream) = object.value else {
            return Err(PdfError::xref(pos, "expected a cross-reference stream"));
        };
        let dict = stream.dict();
        if !dict.is_type("XRef") {
            warn!(offset = pos, "cross-reference stream without /Type /XRef");
        }

        let widths = field_widths(dict).ok_or_else(|| PdfError::xref(pos, "malformed /W"))?;
        let size = dict
            .get_int("Size")
            .and_then(|s| u64::try_from(s).ok())
            .ok_or_else(|| PdfError::xref(pos, "missing /Size"))?;
        let ranges = match dict.get("Index") {
            None => vec![(0, size)],
            Some(index) => index_ranges(index).ok_or_else(|| PdfError::xref(pos, "malformed /Index"))?,
        };

        let data = FilterPipeline::from_dict(self.filters, dict)?.decode(stream.raw_data())?;
        let record_len: usize = widths.iter().sum();
        let mut records = data.chunks_exact(record_len);

        let mut entries = BTreeMap::new();
        'ranges: for (first, count) in ranges {
            for number in first..first.saturating_add(count) {
                let Some(record) = records.next() else {
                    warn!(offset = pos, number, "cross-reference stream data ends early");
                    break 'ranges;
                };
                let (ty, rest) = record.split_at(widths[0]);
                let (f1, f2) = rest.split_at(widths[1]);
                let ty = if widths[0] == 0 { 1 } else { be_int(ty) };
                let (f1, f2) = (be_int(f1), be_int(f2));
                let entry = match ty {
                    0 => XRefEntry::free(f1, u32::try_from(f2).unwrap_or(0)),
                    1 => XRefEntry::in_use(f1, u32::try_from(f2).unwrap_or(0)),
                    2 => match u32::try_from(f2) {
                        Ok(index) => XRefEntry::compressed(f1, index),
                        Err(_) => continue,
                    },
                    // Unknown types are references to the null object.
                    _ => continue,
                };
                entries.insert(number, entry);
            }
        }

        let mut trailer = dict.clone();
        for key in ["Length", "Filter", "DecodeParms", "W", "Index"] {
            trailer.remove(key);
        }
        Ok(Section {
            entries,
            trailer: Trailer::new(trailer),
        })
    }

    /// Rebuild the table by scanning for `N G obj` headers. Later
    /// definitions win. Trailers come from every `trailer` keyword, newest
    /// last in the file first.
    pub(crate) fn repair(&self) -> Result<XRefTable> {
        let pattern = OBJECT_HEADER
            .as_ref()
            .ok_or_else(|| PdfError::xref(0, "object header pattern"))?;
        let data = self.data.as_ref();

        let mut entries = BTreeMap::new();
        for caps in pattern.captures_iter(data) {
            let (Some(whole), Some(number), Some(generation)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };
            let (Some(number), Some(generation)) = (ascii_int::<u64>(number.as_bytes()), ascii_int::<u32>(generation.as_bytes()))
            else {
                continue;
            };
            entries.insert(number, XRefEntry::in_use(whole.start() as u64, generation));
        }
        if entries.is_empty() {
            return Err(PdfError::xref(0, "no objects found while repairing"));
        }

        let mut table = XRefTable::default();
        table.sections.push(XRefSection {
            offset: 0,
            kind: SectionKind::Repaired,
            entries: entries.len(),
        });

        let mut trailers = Vec::new();
        let mut search = data.len();
        while let Some(pos) = rfind_bytes(&data[..search], b"trailer") {
            search = pos;
            if let Ok(Value::Dict(dict)) = self.parser(pos + b"trailer".len()).parse_object() {
                trailers.push(Trailer::new(dict));
            }
        }
        if trailers.is_empty() {
            trailers.push(Trailer::default());
        }
        for trailer in trailers {
            table.push_trailer(trailer);
        }

        self.index_object_streams(&mut entries);
        table.merged = self.repair_trailer(table.merged.clone(), &entries);
        table.merge_older(entries);
        table.finish();
        warn!(objects = table.len(), "cross-reference rebuilt from object headers");
        Ok(table)
    }

    /// Register members of every readable object stream that no scanned
    /// header defines.
    fn index_object_streams(&self, entries: &mut BTreeMap<u64, XRefEntry>) {
        let containers: Vec<(u64, u64)> = entries
            .iter()
            .filter(|(_, e)| {
                let start = e.offset as usize;
                let end = (start + OBJSTM_PROBE).min(self.data.len());
                crate::io::cursor::find_bytes(&self.data[start..end], b"/ObjStm").is_some()
            })
            .map(|(n, e)| (*n, e.offset))
            .collect();

        for (container, offset) in containers {
            let members = match self.object_stream_members(offset as usize) {
                Ok(members) => members,
                Err(err) => {
                    debug!(container, %err, "skipping object stream while repairing");
                    continue;
                }
            };
            for (index, number) in members.into_iter().enumerate() {
                let Ok(index) = u32::try_from(index) else {
                    break;
                };
                entries
                    .entry(number)
                    .or_insert_with(|| XRefEntry::compressed(container, index));
            }
        }
    }

    fn object_stream_members(&self, pos: usize) -> Result<Vec<u64>> {
        let object = self.parser(pos).read_indirect()?;
        let stream = object.value.as_stream()?;
        let dict = stream.dict();
        let (Some(n), Some(first)) = (dict.get_int("N"), dict.get_int("First")) else {
            return Err(PdfError::xref(pos, "object stream without direct /N and /First"));
        };
        let data = FilterPipeline::from_dict(self.filters, dict)?.decode(stream.raw_data())?;
        let stm = ObjectStream::new(
            Bytes::from(data),
            usize::try_from(n).unwrap_or(0),
            usize::try_from(first).unwrap_or(usize::MAX),
        )?;
        Ok(stm.objects().iter().map(|(number, _)| *number).collect())
    }

    /// Fill `/Size` and `/Root` when no usable trailer survived.
    fn repair_trailer(&self, trailer: Trailer, entries: &BTreeMap<u64, XRefEntry>) -> Trailer {
        let mut dict: Dictionary = trailer.dict().clone();
        if dict.get_int("Size").is_none()
            && let Some(max) = entries.keys().next_back()
        {
            dict.set("Size", Value::Int(*max as i64 + 1));
        }
        if !dict.contains_key("Root")
            && let Some(root) = self.find_catalog(entries)
        {
            dict.set("Root", Value::Indirect(root));
        }
        Trailer::new(dict)
    }

    /// The last object whose header precedes a `/Type /Catalog`.
    fn find_catalog(&self, entries: &BTreeMap<u64, XRefEntry>) -> Option<ObjectKey> {
        let pattern = CATALOG_TYPE.as_ref()?;
        let mut by_offset: Vec<(u64, ObjectKey)> = entries
            .iter()
            .filter(|(_, e)| e.kind == XRefKind::InUse)
            .map(|(n, e)| (e.offset, ObjectKey::new(*n, e.generation)))
            .collect();
        by_offset.sort_unstable();

        let hit = pattern.find_iter(self.data).last()?;
        let idx = by_offset.partition_point(|(offset, _)| *offset < hit.start() as u64);
        by_offset.get(idx.checked_sub(1)?).map(|(_, key)| *key)
    }
}

/// Read `offset generation marker`; the marker is `true` for `n`.
fn read_record(lexer: &mut Lexer) -> Result<(u64, u32, bool)> {
    let pos = lexer.tell();
    let mut field = || lexer.next_token().transpose();
    let offset = field()?;
    let generation = field()?;
    let marker = field()?;
    match (offset, generation, marker) {
        (Some((_, Token::Int(offset))), Some((_, Token::Int(generation))), Some((_, Token::Keyword(Keyword::Unknown(m))))) => {
            let marker = match m.as_slice() {
                b"n" => true,
                b"f" => false,
                _ => return Err(PdfError::xref(pos, "record marker must be 'n' or 'f'")),
            };
            match (u64::try_from(offset), u32::try_from(generation)) {
                (Ok(offset), Ok(generation)) => Ok((offset, generation, marker)),
                _ => Err(PdfError::xref(pos, "negative field in record")),
            }
        }
        _ => Err(PdfError::xref(pos, "malformed cross-reference record")),
    }
}

/// `/W`: three non-negative widths of at most eight bytes, not all zero.
fn field_widths(dict: &Dictionary) -> Option<[usize; 3]> {
    let arr = dict.get("W")?.as_array().ok()?;
    let [a, b, c] = arr.as_slice() else {
        return None;
    };
    let width = |v: &Value| {
        v.as_int()
            .ok()
            .and_then(|n| usize::try_from(n).ok())
            .filter(|&n| n <= 8)
    };
    let widths = [width(a)?, width(b)?, width(c)?];
    (widths.iter().sum::<usize>() > 0).then_some(widths)
}

/// `/Index`: pairs of non-negative `first count`.
fn index_ranges(index: &Value) -> Option<Vec<(u64, u64)>> {
    let arr = index.as_array().ok()?;
    if arr.len() % 2 != 0 {
        return None;
    }
    arr.chunks_exact(2)
        .map(|pair| {
            let first = u64::try_from(pair[0].as_int().ok()?).ok()?;
            let count = u64::try_from(pair[1].as_int().ok()?).ok()?;
            Some((first, count))
        })
        .collect()
}

/// Big-endian unsigned integer of up to eight bytes.
fn be_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, &b| (acc << 8) | u64::from(b))
}

fn ascii_int<T: std::str::FromStr>(digits: &[u8]) -> Option<T> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}
