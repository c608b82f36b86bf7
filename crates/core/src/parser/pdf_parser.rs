//! PDF object parser.
//!
//! Builds [`Value`]s from lexer tokens. The only real ambiguity in the
//! grammar is `N G R`: two integers are plain numbers unless the third token
//! is `R`. The parser keeps up to three tokens of pushback to decide, and
//! replays undecided tokens in input order.

use super::lexer::{Keyword, Lexer, Token, is_delimiter, is_whitespace};
use crate::error::{PdfError, Result};
use crate::io::cursor::{Eol, find_bytes};
use crate::model::objects::{Dictionary, ObjectKey, Stream, StreamFlags, Value};
use bytes::Bytes;
use smallvec::SmallVec;
use tracing::{debug, warn};

/// Default nesting limit for arrays and dictionaries.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Callbacks into the owning document while an object is being built.
pub trait ParseContext {
    /// Resolve an indirect `/Length`. `Ok(None)` when it is not an integer.
    fn resolve_length(&self, key: ObjectKey) -> Result<Option<i64>>;

    /// Decrypt a string that belongs to indirect object `key`. `None`
    /// keeps the bytes as parsed.
    fn decrypt_string(&self, _key: ObjectKey, _bytes: &[u8]) -> Option<Vec<u8>> {
        None
    }
}

/// Compliance observations on `N G obj ... endobj` framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FramingFlags {
    /// Exactly one space between number, generation and `obj`.
    pub header_spacing: bool,
    /// An end-of-line follows `obj`.
    pub eol_after_obj: bool,
    /// An end-of-line precedes `endobj`.
    pub eol_before_endobj: bool,
    /// The definition was closed by `endobj`.
    pub endobj_present: bool,
    /// Stream framing, when the object is a stream.
    pub stream: Option<StreamFlags>,
}

/// A complete indirect object definition.
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    pub key: ObjectKey,
    pub value: Value,
    pub framing: FramingFlags,
    /// Offset of the object number.
    pub offset: usize,
}

/// What the parser found at an object position.
enum Item {
    Value(Value),
    /// A keyword that does not start a value (`]`, `>>`, `endobj`, ...).
    Keyword(usize, Keyword),
}

/// Recursive-descent object parser.
pub struct Parser<'a> {
    lexer: Lexer,
    /// Tokens read ahead while disambiguating references, oldest first.
    pending: SmallVec<[(usize, Token); 3]>,
    ctx: Option<&'a dyn ParseContext>,
    max_depth: usize,
    decrypt: bool,
    /// Object whose strings are being built, set inside `read_indirect`.
    current: Option<ObjectKey>,
}

impl<'a> Parser<'a> {
    pub fn new(data: Bytes, pos: usize) -> Self {
        Self::from_lexer(Lexer::at(data, pos))
    }

    pub fn from_lexer(lexer: Lexer) -> Self {
        Self {
            lexer,
            pending: SmallVec::new(),
            ctx: None,
            max_depth: DEFAULT_MAX_DEPTH,
            decrypt: true,
            current: None,
        }
    }

    /// Use `ctx` to resolve indirect stream lengths and decrypt strings.
    pub fn with_context(mut self, ctx: &'a dyn ParseContext) -> Self {
        self.ctx = Some(ctx);
        self
    }

    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Never pass strings to [`ParseContext::decrypt_string`].
    pub const fn without_decryption(mut self) -> Self {
        self.decrypt = false;
        self
    }

    /// Position of the next unread token.
    pub fn tell(&self) -> usize {
        self.pending
            .first()
            .map_or_else(|| self.lexer.tell(), |(pos, _)| *pos)
    }

    pub fn seek(&mut self, pos: usize) {
        self.pending.clear();
        self.lexer.seek(pos);
    }

    pub const fn lexer(&self) -> &Lexer {
        &self.lexer
    }

    pub fn clamped_numbers(&self) -> usize {
        self.lexer.clamped_numbers()
    }

    /// Next token, pushback first.
    pub fn next_token(&mut self) -> Result<Option<(usize, Token)>> {
        if !self.pending.is_empty() {
            return Ok(Some(self.pending.remove(0)));
        }
        self.lexer.next_token().transpose()
    }

    /// Put tokens back in front of the pushback queue, keeping their order.
    fn unread(&mut self, tokens: impl IntoIterator<Item = (usize, Token)>) {
        for (i, tok) in tokens.into_iter().enumerate() {
            self.pending.insert(i, tok);
        }
    }

    /// Parse one complete value.
    pub fn parse_object(&mut self) -> Result<Value> {
        let pos = self.tell();
        match self.next_object()? {
            Some(value) => Ok(value),
            None => Err(PdfError::UnexpectedEof { pos }),
        }
    }

    /// Parse one value, `None` at end of input.
    pub fn next_object(&mut self) -> Result<Option<Value>> {
        match self.next_item(0)? {
            Some(Item::Value(value)) => Ok(Some(value)),
            Some(Item::Keyword(pos, kw)) => Err(PdfError::syntax(
                pos,
                format!(
                    "unexpected keyword '{}'",
                    String::from_utf8_lossy(kw.as_bytes())
                ),
            )),
            None => Ok(None),
        }
    }

    /// Parse `N G obj <value> endobj` at the current position.
    pub fn read_indirect(&mut self) -> Result<IndirectObject> {
        let (start, key) = self.read_header()?;
        let data = self.lexer.cursor().data().clone();

        let mut framing = FramingFlags {
            header_spacing: header_spacing(&data[start..self.lexer.tell()]),
            eol_after_obj: matches!(self.lexer.cursor().peek(), Some(b'\r' | b'\n')),
            ..FramingFlags::default()
        };
        if !framing.header_spacing || !framing.eol_after_obj {
            warn!(%key, offset = start, "non-conforming object header");
        }

        let saved = self.current.replace(key);
        let mut value = self.parse_object();
        self.current = saved;
        if let Ok(Value::Stream(stream)) = &mut value {
            stream.set_owner(key);
            framing.stream = Some(stream.flags());
        }
        let value = value?;

        match self.next_token()? {
            Some((pos, Token::Keyword(Keyword::EndObj))) => {
                framing.endobj_present = true;
                framing.eol_before_endobj =
                    pos > 0 && matches!(data.get(pos - 1), Some(b'\r' | b'\n'));
            }
            other => {
                warn!(%key, "missing endobj");
                self.unread(other);
            }
        }

        Ok(IndirectObject {
            key,
            value,
            framing,
            offset: start,
        })
    }

    /// Read `N G obj`.
    pub fn read_object_header(&mut self) -> Result<ObjectKey> {
        self.read_header().map(|(_, key)| key)
    }

    fn read_header(&mut self) -> Result<(usize, ObjectKey)> {
        let pos = self.tell();
        let number = self.next_token()?;
        let generation = self.next_token()?;
        let keyword = self.next_token()?;
        match (number, generation, keyword) {
            (
                Some((start, Token::Int(n))),
                Some((_, Token::Int(g))),
                Some((_, Token::Keyword(Keyword::Obj))),
            ) => match (u64::try_from(n), u32::try_from(g)) {
                (Ok(n), Ok(g)) => Ok((start, ObjectKey::new(n, g))),
                _ => Err(PdfError::syntax(pos, "invalid object number")),
            },
            _ => Err(PdfError::syntax(pos, "expected 'N G obj'")),
        }
    }

    fn next_item(&mut self, depth: usize) -> Result<Option<Item>> {
        let Some((pos, token)) = self.next_token()? else {
            return Ok(None);
        };
        let value = match token {
            Token::Int(n) => match self.try_reference(n)? {
                Some(key) => Value::Indirect(key),
                None => Value::Int(n),
            },
            Token::Real(n) => Value::Real(n),
            Token::Name(name) => Value::Name(name),
            Token::Str(mut s) => {
                if let (Some(ctx), Some(key), true) = (self.ctx, self.current, self.decrypt)
                    && let Some(plain) = ctx.decrypt_string(key, s.as_bytes())
                {
                    s.set_bytes(plain);
                }
                Value::Str(s)
            }
            Token::Keyword(Keyword::True) => Value::Bool(true),
            Token::Keyword(Keyword::False) => Value::Bool(false),
            Token::Keyword(Keyword::Null) => Value::Null,
            Token::Keyword(Keyword::ArrayStart) => {
                self.check_depth(pos, depth)?;
                Value::Array(self.parse_array(pos, depth + 1)?)
            }
            Token::Keyword(Keyword::DictStart) => {
                self.check_depth(pos, depth)?;
                let dict = self.parse_dict(pos, depth + 1)?;
                self.maybe_stream(dict)?
            }
            Token::Keyword(kw) => return Ok(Some(Item::Keyword(pos, kw))),
        };
        Ok(Some(Item::Value(value)))
    }

    fn check_depth(&self, pos: usize, depth: usize) -> Result<()> {
        if depth >= self.max_depth {
            return Err(PdfError::syntax(pos, "nesting too deep"));
        }
        Ok(())
    }

    /// After an integer `n`: is this `n G R`?
    fn try_reference(&mut self, n: i64) -> Result<Option<ObjectKey>> {
        let Ok(number) = u64::try_from(n) else {
            return Ok(None);
        };
        let second = self.next_token()?;
        let Some((_, Token::Int(g))) = second else {
            self.unread(second);
            return Ok(None);
        };
        let third = self.next_token()?;
        if let (Some((_, Token::Keyword(Keyword::R))), Ok(generation)) = (&third, u32::try_from(g))
        {
            return Ok(Some(ObjectKey::new(number, generation)));
        }
        self.unread(second.into_iter().chain(third));
        Ok(None)
    }

    fn parse_array(&mut self, start: usize, depth: usize) -> Result<Vec<Value>> {
        let mut arr = Vec::new();
        loop {
            match self.next_item(depth)? {
                Some(Item::Value(v)) => arr.push(v),
                Some(Item::Keyword(_, Keyword::ArrayEnd)) => return Ok(arr),
                Some(Item::Keyword(pos, kw)) if !ends_container(&kw) => {
                    debug!(pos, keyword = %String::from_utf8_lossy(kw.as_bytes()), "skipping keyword in array");
                }
                Some(Item::Keyword(pos, kw)) => {
                    self.unread([(pos, Token::Keyword(kw))]);
                    return Err(PdfError::UnterminatedArray { pos: start });
                }
                None => return Err(PdfError::UnterminatedArray { pos: start }),
            }
        }
    }

    fn parse_dict(&mut self, start: usize, depth: usize) -> Result<Dictionary> {
        let mut dict = Dictionary::new();
        loop {
            let key = match self.next_item(depth)? {
                Some(Item::Value(Value::Name(key))) => key,
                Some(Item::Keyword(_, Keyword::DictEnd)) => return Ok(dict),
                Some(Item::Value(other)) => {
                    warn!(pos = start, got = other.type_name(), "non-name dictionary key skipped");
                    continue;
                }
                Some(Item::Keyword(_, kw)) if !ends_container(&kw) => continue,
                Some(Item::Keyword(pos, kw)) => {
                    self.unread([(pos, Token::Keyword(kw))]);
                    return Err(PdfError::UnterminatedDict { pos: start });
                }
                None => return Err(PdfError::UnterminatedDict { pos: start }),
            };
            match self.next_item(depth)? {
                Some(Item::Value(value)) => {
                    if dict.insert_parsed(key.clone(), value) {
                        warn!(pos = start, key = %key, "duplicate dictionary key");
                    }
                }
                Some(Item::Keyword(_, Keyword::DictEnd)) => {
                    warn!(pos = start, key = %key, "dictionary key without value");
                    return Ok(dict);
                }
                Some(Item::Keyword(_, kw)) if !ends_container(&kw) => {
                    warn!(pos = start, key = %key, "dictionary value is not an object");
                }
                Some(Item::Keyword(pos, kw)) => {
                    self.unread([(pos, Token::Keyword(kw))]);
                    return Err(PdfError::UnterminatedDict { pos: start });
                }
                None => return Err(PdfError::UnterminatedDict { pos: start }),
            }
        }
    }

    /// A dictionary directly followed by `stream` becomes a stream.
    fn maybe_stream(&mut self, dict: Dictionary) -> Result<Value> {
        if !self.pending.is_empty() {
            return Ok(Value::Dict(dict));
        }
        let mark = self.lexer.tell();
        self.lexer.skip_whitespace();
        let cursor = self.lexer.cursor();
        if !cursor.starts_with(b"stream")
            || cursor
                .peek_at(6)
                .is_some_and(|b| !is_whitespace(b) && !is_delimiter(b))
        {
            self.lexer.seek(mark);
            return Ok(Value::Dict(dict));
        }
        let keyword_pos = cursor.tell();
        self.lexer.cursor_mut().skip(6);
        let stream = self.read_stream_body(dict, keyword_pos)?;
        Ok(Value::Stream(Box::new(stream)))
    }

    /// Capture stream content after the `stream` keyword.
    fn read_stream_body(&mut self, dict: Dictionary, keyword_pos: usize) -> Result<Stream> {
        let mut flags = StreamFlags {
            stream_eol: self.lexer.cursor_mut().eat_eol().is_some(),
            ..StreamFlags::default()
        };
        if !flags.stream_eol {
            warn!(offset = keyword_pos, "'stream' not followed by end-of-line");
        }
        let start = self.lexer.tell();
        flags.declared_length = self.declared_length(&dict)?;

        let data = self.lexer.cursor().data().clone();
        let declared_end = flags
            .declared_length
            .and_then(|len| usize::try_from(len).ok())
            .and_then(|len| start.checked_add(len))
            .filter(|&end| end <= data.len() && endstream_follows(&data[end..]));

        let (end, endstream_pos) = match declared_end {
            Some(end) => {
                let skipped = data[end..]
                    .iter()
                    .take_while(|&&b| is_whitespace(b))
                    .count();
                flags.endstream_eol = matches!(data.get(end), Some(b'\r' | b'\n'));
                (end, end + skipped)
            }
            None => {
                let Some(found) = find_bytes(&data[start..], b"endstream") else {
                    return Err(PdfError::syntax(start, "missing endstream"));
                };
                let endstream_pos = start + found;
                let (end, eol) = trim_eol(&data[start..endstream_pos]);
                flags.endstream_eol = eol.is_some();
                flags.length_recovered = true;
                warn!(
                    offset = start,
                    declared = ?flags.declared_length,
                    actual = end,
                    "stream /Length does not match endstream, recomputed"
                );
                (start + end, endstream_pos)
            }
        };

        self.lexer.seek(endstream_pos + b"endstream".len());
        let raw = data.slice(start..end);
        Ok(Stream::with_flags(dict, raw, flags))
    }

    fn declared_length(&self, dict: &Dictionary) -> Result<Option<i64>> {
        match dict.get("Length") {
            Some(Value::Int(n)) => Ok(Some(*n)),
            Some(Value::Indirect(key)) => {
                let Some(ctx) = self.ctx else {
                    return Ok(None);
                };
                match ctx.resolve_length(*key) {
                    Ok(len) => Ok(len),
                    Err(err @ PdfError::CircularReference(_)) => Err(err),
                    Err(err) => {
                        debug!(%key, %err, "could not resolve stream length");
                        Ok(None)
                    }
                }
            }
            _ => Ok(None),
        }
    }
}

/// Keywords that cannot appear inside an array or dictionary.
const fn ends_container(kw: &Keyword) -> bool {
    matches!(
        kw,
        Keyword::ArrayEnd
            | Keyword::DictEnd
            | Keyword::Obj
            | Keyword::EndObj
            | Keyword::Stream
            | Keyword::EndStream
            | Keyword::Xref
            | Keyword::Trailer
            | Keyword::StartXref
    )
}

/// `true` when only whitespace separates `data` from `endstream`.
fn endstream_follows(data: &[u8]) -> bool {
    let skipped = data.iter().take_while(|&&b| is_whitespace(b)).count();
    data[skipped..].starts_with(b"endstream")
}

/// Length of `data` without one trailing end-of-line.
fn trim_eol(data: &[u8]) -> (usize, Option<Eol>) {
    let n = data.len();
    if data.ends_with(b"\r\n") {
        (n - 2, Some(Eol::CrLf))
    } else if data.ends_with(b"\n") {
        (n - 1, Some(Eol::Lf))
    } else if data.ends_with(b"\r") {
        (n - 1, Some(Eol::Cr))
    } else {
        (n, None)
    }
}

/// `N G obj` written with single spaces.
fn header_spacing(header: &[u8]) -> bool {
    let mut parts = header.split(|&b| b == b' ');
    let number_like =
        |p: Option<&[u8]>| p.is_some_and(|p| !p.is_empty() && p.iter().all(u8::is_ascii_digit));
    number_like(parts.next())
        && number_like(parts.next())
        && parts.next() == Some(b"obj".as_slice())
        && parts.next().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &'static [u8]) -> Value {
        Parser::new(Bytes::from_static(input), 0)
            .parse_object()
            .unwrap()
    }

    #[test]
    fn reference_needs_both_integers() {
        assert_eq!(parse(b"7 0 R"), Value::reference(7, 0));
        assert_eq!(parse(b"[7 0]"), Value::Array(vec![Value::Int(7), Value::Int(0)]));
        assert_eq!(
            parse(b"[1 2 3 0 R 4]"),
            Value::Array(vec![
                Value::Int(1),
                Value::Int(2),
                Value::reference(3, 0),
                Value::Int(4),
            ])
        );
    }

    #[test]
    fn negative_numbers_are_not_references() {
        assert_eq!(
            parse(b"[-1 0 R]"),
            Value::Array(vec![Value::Int(-1), Value::Int(0)])
        );
    }

    #[test]
    fn header_spacing_rules() {
        assert!(header_spacing(b"1 0 obj"));
        assert!(!header_spacing(b"1  0 obj"));
        assert!(!header_spacing(b"1 0\nobj"));
    }

    #[test]
    fn trim_eol_variants() {
        assert_eq!(trim_eol(b"ab\r\n"), (2, Some(Eol::CrLf)));
        assert_eq!(trim_eol(b"ab\n"), (2, Some(Eol::Lf)));
        assert_eq!(trim_eol(b"ab"), (2, None));
    }
}
