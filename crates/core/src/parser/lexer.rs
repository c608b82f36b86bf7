//! PDF tokenizer.
//!
//! Turns bytes from a [`ByteCursor`] into tokens: numbers, strings, names,
//! delimiters and bare keywords. Malformed numerals never abort tokenizing;
//! they clamp and are counted instead.

use crate::error::{PdfError, Result};
use crate::io::ByteCursor;
use crate::model::objects::{HexMeta, Name, PdfString, name_from_bytes};
use bytes::Bytes;

/// PDF keywords and structural delimiters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Keyword {
    // Structural
    ArrayStart, // [
    ArrayEnd,   // ]
    DictStart,  // <<
    DictEnd,    // >>
    BraceOpen,  // {
    BraceClose, // }

    // Primitives
    True,
    False,
    Null,

    // Object structure
    Obj,
    EndObj,
    R,
    Stream,
    EndStream,
    Xref,
    Trailer,
    StartXref,

    /// Anything else, including a stray `>` or `)`.
    Unknown(Vec<u8>),
}

impl Keyword {
    pub fn from_bytes(b: &[u8]) -> Self {
        match b {
            b"[" => Self::ArrayStart,
            b"]" => Self::ArrayEnd,
            b"<<" => Self::DictStart,
            b">>" => Self::DictEnd,
            b"{" => Self::BraceOpen,
            b"}" => Self::BraceClose,
            b"true" => Self::True,
            b"false" => Self::False,
            b"null" => Self::Null,
            b"obj" => Self::Obj,
            b"endobj" => Self::EndObj,
            b"R" => Self::R,
            b"stream" => Self::Stream,
            b"endstream" => Self::EndStream,
            b"xref" => Self::Xref,
            b"trailer" => Self::Trailer,
            b"startxref" => Self::StartXref,
            _ => Self::Unknown(b.to_vec()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::ArrayStart => b"[",
            Self::ArrayEnd => b"]",
            Self::DictStart => b"<<",
            Self::DictEnd => b">>",
            Self::BraceOpen => b"{",
            Self::BraceClose => b"}",
            Self::True => b"true",
            Self::False => b"false",
            Self::Null => b"null",
            Self::Obj => b"obj",
            Self::EndObj => b"endobj",
            Self::R => b"R",
            Self::Stream => b"stream",
            Self::EndStream => b"endstream",
            Self::Xref => b"xref",
            Self::Trailer => b"trailer",
            Self::StartXref => b"startxref",
            Self::Unknown(bytes) => bytes.as_slice(),
        }
    }
}

/// Lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Real(f64),
    /// Literal `( )` or hex `< >` string.
    Str(PdfString),
    /// Name with `#xx` escapes decoded.
    Name(Name),
    Keyword(Keyword),
}

impl Token {
    pub fn is_keyword(&self, kw: &Keyword) -> bool {
        matches!(self, Self::Keyword(k) if k == kw)
    }
}

pub const fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x00' | b'\x0c')
}

pub const fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

const fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

pub(crate) const fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// PDF tokenizer over a byte cursor.
#[derive(Debug, Clone)]
pub struct Lexer {
    cursor: ByteCursor,
    /// Start of the last token returned
    token_pos: usize,
    clamped: usize,
}

impl Lexer {
    pub const fn new(cursor: ByteCursor) -> Self {
        Self {
            cursor,
            token_pos: 0,
            clamped: 0,
        }
    }

    /// Lexer over `data` starting at `pos`.
    pub fn at(data: Bytes, pos: usize) -> Self {
        Self::new(ByteCursor::at(data, pos))
    }

    /// Current position in data
    pub const fn tell(&self) -> usize {
        self.cursor.tell()
    }

    pub fn seek(&mut self, pos: usize) {
        self.cursor.seek(pos);
        self.token_pos = pos;
    }

    /// Offset where the most recent token started.
    pub const fn token_pos(&self) -> usize {
        self.token_pos
    }

    pub const fn cursor(&self) -> &ByteCursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut ByteCursor {
        &mut self.cursor
    }

    /// Numerals that overflowed or had no digits, and were clamped.
    pub const fn clamped_numbers(&self) -> usize {
        self.clamped
    }

    /// Skip whitespace and comments
    pub fn skip_whitespace(&mut self) {
        loop {
            self.cursor.skip_while(is_whitespace);
            if self.cursor.peek() != Some(b'%') {
                return;
            }
            self.cursor.skip_while(|b| b != b'\r' && b != b'\n');
            self.cursor.eat_eol();
        }
    }

    /// Get next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Option<Result<(usize, Token)>> {
        self.skip_whitespace();
        let b = self.cursor.peek()?;
        self.token_pos = self.cursor.tell();

        let result = match b {
            b'/' => Ok(self.parse_name()),
            b'(' => self.parse_string(),
            b'<' => {
                self.cursor.skip(1);
                if self.cursor.peek() == Some(b'<') {
                    self.cursor.skip(1);
                    Ok(Token::Keyword(Keyword::DictStart))
                } else {
                    self.cursor.unread(1);
                    self.parse_hex_string()
                }
            }
            b'>' => {
                self.cursor.skip(1);
                if self.cursor.peek() == Some(b'>') {
                    self.cursor.skip(1);
                    Ok(Token::Keyword(Keyword::DictEnd))
                } else {
                    Ok(Token::Keyword(Keyword::Unknown(b">".to_vec())))
                }
            }
            b')' => {
                self.cursor.skip(1);
                Ok(Token::Keyword(Keyword::Unknown(b")".to_vec())))
            }
            b'[' | b']' | b'{' | b'}' => {
                self.cursor.skip(1);
                Ok(Token::Keyword(Keyword::from_bytes(&[b])))
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => Ok(self.parse_number()),
            _ => Ok(self.parse_keyword()),
        };

        Some(result.map(|token| (self.token_pos, token)))
    }

    /// Parse a name (/Name)
    fn parse_name(&mut self) -> Token {
        self.cursor.skip(1); // Skip '/'
        let mut name = Vec::new();

        while let Some(b) = self.cursor.peek() {
            if !is_regular(b) {
                break;
            }
            self.cursor.skip(1);
            if b == b'#' {
                let escaped = self
                    .cursor
                    .peek()
                    .and_then(hex_value)
                    .zip(self.cursor.peek_at(1).and_then(hex_value));
                if let Some((hi, lo)) = escaped {
                    self.cursor.skip(2);
                    name.push((hi << 4) | lo);
                    continue;
                }
            }
            // Malformed escapes keep the '#'
            name.push(b);
        }

        Token::Name(name_from_bytes(&name))
    }

    /// Parse a number (integer or real)
    fn parse_number(&mut self) -> Token {
        let start = self.cursor.tell();
        let negative = self.cursor.peek() == Some(b'-');
        if matches!(self.cursor.peek(), Some(b'+' | b'-')) {
            self.cursor.skip(1);
        }

        let mut has_dot = false;
        let mut digits = 0;
        while let Some(b) = self.cursor.peek() {
            if b.is_ascii_digit() {
                digits += 1;
            } else if b == b'.' && !has_dot {
                has_dot = true;
            } else {
                break;
            }
            self.cursor.skip(1);
        }

        let text = self.cursor.slice(start..self.cursor.tell());
        let text = std::str::from_utf8(&text).unwrap_or("");

        if digits == 0 {
            self.clamped += 1;
            return if has_dot {
                Token::Real(0.0)
            } else {
                Token::Int(0)
            };
        }

        if has_dot {
            match text.parse::<f64>() {
                Ok(v) if v.is_finite() => Token::Real(v),
                _ => {
                    self.clamped += 1;
                    Token::Real(if negative { f64::MIN } else { f64::MAX })
                }
            }
        } else {
            match text.parse::<i64>() {
                Ok(v) => Token::Int(v),
                Err(_) => {
                    self.clamped += 1;
                    Token::Int(if negative { i64::MIN } else { i64::MAX })
                }
            }
        }
    }

    /// Parse a literal string (...)
    fn parse_string(&mut self) -> Result<Token> {
        let start = self.cursor.tell();
        self.cursor.skip(1); // Skip '('
        let mut result = Vec::new();
        let mut depth = 1usize;
        let eof = || PdfError::UnexpectedEof { pos: start };

        loop {
            match self.cursor.read_byte().ok_or_else(eof)? {
                b'(' => {
                    depth += 1;
                    result.push(b'(');
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    result.push(b')');
                }
                b'\\' => match self.cursor.read_byte().ok_or_else(eof)? {
                    b'n' => result.push(b'\n'),
                    b'r' => result.push(b'\r'),
                    b't' => result.push(b'\t'),
                    b'b' => result.push(0x08),
                    b'f' => result.push(0x0c),
                    b'\r' => {
                        // Line continuation
                        if self.cursor.peek() == Some(b'\n') {
                            self.cursor.skip(1);
                        }
                    }
                    b'\n' => {}
                    c @ b'0'..=b'7' => {
                        let mut octal = u32::from(c - b'0');
                        for _ in 0..2 {
                            match self.cursor.peek() {
                                Some(d @ b'0'..=b'7') => {
                                    self.cursor.skip(1);
                                    octal = octal * 8 + u32::from(d - b'0');
                                }
                                _ => break,
                            }
                        }
                        result.push((octal & 0xff) as u8);
                    }
                    // `\(`, `\)`, `\\` and unknown escapes keep the character
                    c => result.push(c),
                },
                c => result.push(c),
            }
        }

        Ok(Token::Str(PdfString::literal(result)))
    }

    /// Parse a hex string <...>
    fn parse_hex_string(&mut self) -> Result<Token> {
        let start = self.cursor.tell();
        self.cursor.skip(1); // Skip '<'
        let mut result = Vec::new();
        let mut meta = HexMeta {
            only_hex: true,
            digits: 0,
        };
        let mut pending: Option<u8> = None;

        loop {
            let c = self
                .cursor
                .read_byte()
                .ok_or(PdfError::UnexpectedEof { pos: start })?;
            if c == b'>' {
                break;
            }
            if let Some(nibble) = hex_value(c) {
                meta.digits += 1;
                match pending.take() {
                    Some(high) => result.push((high << 4) | nibble),
                    None => pending = Some(nibble),
                }
            } else if !is_whitespace(c) {
                meta.only_hex = false;
            }
        }

        if let Some(high) = pending {
            result.push(high << 4);
        }

        Ok(Token::Str(PdfString::hex(result, meta)))
    }

    /// Parse a keyword
    fn parse_keyword(&mut self) -> Token {
        let start = self.cursor.tell();
        self.cursor.skip_while(is_regular);
        let end = self.cursor.tell().max(start + 1);
        self.cursor.seek(end);
        let bytes = self.cursor.slice(start..end);
        Token::Keyword(Keyword::from_bytes(&bytes))
    }
}

impl Iterator for Lexer {
    type Item = Result<(usize, Token)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}
