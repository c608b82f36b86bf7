//! Object streams (`/Type /ObjStm`).

use crate::error::{PdfError, Result};
use crate::parser::{Lexer, ParseContext, Parser, Token};
use crate::model::objects::Value;
use bytes::Bytes;
use tracing::warn;

/// Decoded object stream with its header index.
#[derive(Debug, Clone)]
pub struct ObjectStream {
    data: Bytes,
    first: usize,
    /// `(object number, offset from /First)` in header order.
    objects: Vec<(u64, usize)>,
}

impl ObjectStream {
    /// Index decoded stream content holding `n` objects whose bodies start
    /// at byte `first`.
    pub fn new(data: Bytes, n: usize, first: usize) -> Result<Self> {
        if first > data.len() {
            return Err(PdfError::syntax(
                first,
                format!("/First {first} beyond object stream of {} bytes", data.len()),
            ));
        }
        let mut lexer = Lexer::at(data.slice(..first), 0);
        let mut objects = Vec::with_capacity(n.min(4096));
        while objects.len() < n {
            let number = lexer.next_token().transpose()?;
            let offset = lexer.next_token().transpose()?;
            match (number, offset) {
                (Some((_, Token::Int(number))), Some((_, Token::Int(offset)))) => {
                    match (u64::try_from(number), usize::try_from(offset)) {
                        (Ok(number), Ok(offset)) => objects.push((number, offset)),
                        _ => warn!(number, offset, "negative entry in object stream header"),
                    }
                }
                _ => {
                    warn!(expected = n, found = objects.len(), "short object stream header");
                    break;
                }
            }
        }
        Ok(Self {
            data,
            first,
            objects,
        })
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> &[(u64, usize)] {
        &self.objects
    }

    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Absolute position of object `number`. The xref index is tried first
    /// and the header is searched when it names another object.
    pub fn position(&self, number: u64, index: Option<usize>) -> Option<usize> {
        let hinted = index
            .and_then(|i| self.objects.get(i))
            .filter(|(n, _)| *n == number);
        let (_, offset) = hinted.or_else(|| self.objects.iter().find(|(n, _)| *n == number))?;
        self.first.checked_add(*offset)
    }

    /// Parse the object `number`. Strings inside are never decrypted on
    /// their own; the container stream already was.
    pub fn parse_object(
        &self,
        number: u64,
        index: Option<usize>,
        ctx: Option<&dyn ParseContext>,
        max_depth: usize,
    ) -> Result<Value> {
        let pos = self
            .position(number, index)
            .filter(|&pos| pos < self.data.len())
            .ok_or_else(|| PdfError::syntax(self.first, format!("object {number} not in object stream")))?;
        let mut parser = Parser::new(self.data.clone(), pos)
            .with_max_depth(max_depth)
            .without_decryption();
        if let Some(ctx) = ctx {
            parser = parser.with_context(ctx);
        }
        parser.parse_object()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ObjectStream {
        let body = b"11 0 12 6 13 17 (one) << /A 2 >> [1 2 R]";
        ObjectStream::new(Bytes::from_static(body), 3, 16).unwrap()
    }

    #[test]
    fn header_index() {
        let stm = sample();
        assert_eq!(stm.objects(), [(11, 0), (12, 6), (13, 17)]);
        assert_eq!(stm.position(12, Some(1)), Some(22));
        // wrong hint falls back to searching
        assert_eq!(stm.position(12, Some(0)), Some(22));
        assert_eq!(stm.position(99, None), None);
    }

    #[test]
    fn parse_members() {
        let stm = sample();
        assert_eq!(stm.parse_object(11, Some(0), None, 8).unwrap(), Value::string("one"));
        let dict = stm.parse_object(12, Some(1), None, 8).unwrap();
        assert_eq!(dict.get_key("A"), Some(&Value::Int(2)));
        assert_eq!(
            stm.parse_object(13, Some(2), None, 8).unwrap(),
            Value::Array(vec![Value::reference(1, 2)])
        );
        assert!(stm.parse_object(14, None, None, 8).is_err());
    }

    #[test]
    fn short_header_keeps_prefix() {
        let stm = ObjectStream::new(Bytes::from_static(b"5 0 6 (x)"), 3, 6).unwrap();
        assert_eq!(stm.len(), 1);
        assert!(ObjectStream::new(Bytes::from_static(b"1 0"), 1, 10).is_err());
    }
}
