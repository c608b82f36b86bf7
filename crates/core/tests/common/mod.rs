//! Builds small PDF files with correct offsets for the integration tests.

#![allow(dead_code)]

use carousel_core::codec::flate::deflate;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy)]
enum Slot {
    InUse { offset: usize, generation: u32 },
    Free { generation: u32 },
}

/// Appends objects and cross-reference sections to a byte buffer.
pub struct PdfBuilder {
    buf: Vec<u8>,
    /// Objects written since the last section.
    pending: BTreeMap<u64, Slot>,
    /// Every object written, by number.
    all: BTreeMap<u64, usize>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::with_header(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n")
    }

    pub fn with_header(header: &[u8]) -> Self {
        Self {
            buf: header.to_vec(),
            pending: BTreeMap::new(),
            all: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn offset(&self, number: u64) -> usize {
        self.all[&number]
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// `N 0 obj\n<body>\nendobj\n`
    pub fn object(&mut self, number: u64, body: &str) -> &mut Self {
        self.object_gen(number, 0, body.as_bytes())
    }

    pub fn object_gen(&mut self, number: u64, generation: u32, body: &[u8]) -> &mut Self {
        let offset = self.buf.len();
        self.pending
            .insert(number, Slot::InUse { offset, generation });
        self.all.insert(number, offset);
        self.buf
            .extend_from_slice(format!("{number} {generation} obj\n").as_bytes());
        self.buf.extend_from_slice(body);
        self.buf.extend_from_slice(b"\nendobj\n");
        self
    }

    /// A stream object with `/Length` appended to `dict_entries`.
    pub fn stream(&mut self, number: u64, dict_entries: &str, data: &[u8]) -> &mut Self {
        let mut body = format!("<< {dict_entries} /Length {} >>\nstream\n", data.len()).into_bytes();
        body.extend_from_slice(data);
        body.extend_from_slice(b"\nendstream");
        self.object_gen(number, 0, &body)
    }

    /// Mark `number` free in the next section.
    pub fn free(&mut self, number: u64, generation: u32) -> &mut Self {
        self.pending.insert(number, Slot::Free { generation });
        self
    }

    /// An object stream holding `members`, Flate compressed.
    pub fn object_stream(&mut self, number: u64, members: &[(u64, &str)]) -> &mut Self {
        let mut header = String::new();
        let mut bodies = String::new();
        for (member, body) in members {
            header.push_str(&format!("{member} {} ", bodies.len()));
            bodies.push_str(body);
            bodies.push(' ');
        }
        let content = format!("{header}{bodies}");
        let packed = deflate(content.as_bytes()).unwrap();
        self.stream(
            number,
            &format!(
                "/Type /ObjStm /N {} /First {} /Filter /FlateDecode",
                members.len(),
                header.len()
            ),
            &packed,
        )
    }

    /// Write a classic table for the pending objects plus `trailer`.
    /// Returns its offset.
    pub fn xref_table(&mut self, trailer: &str) -> usize {
        let at = self.buf.len();
        let mut out = String::from("xref\n");
        let pending = std::mem::take(&mut self.pending);
        let numbers: Vec<u64> = pending.keys().copied().collect();
        let mut i = 0;
        while i < numbers.len() {
            let mut j = i;
            while j + 1 < numbers.len() && numbers[j + 1] == numbers[j] + 1 {
                j += 1;
            }
            out.push_str(&format!("{} {}\n", numbers[i], j - i + 1));
            for n in &numbers[i..=j] {
                match pending[n] {
                    Slot::InUse { offset, generation } => {
                        out.push_str(&format!("{offset:010} {generation:05} n \n"))
                    }
                    Slot::Free { generation } => {
                        out.push_str(&format!("{:010} {generation:05} f \n", 0))
                    }
                }
            }
            i = j + 1;
        }
        out.push_str(&format!("trailer\n{trailer}\n"));
        self.buf.extend_from_slice(out.as_bytes());
        at
    }

    /// Write object `number` as a cross-reference stream over the pending
    /// objects plus `compressed` entries `(number, container, index)`.
    /// Returns its offset.
    pub fn xref_stream(&mut self, number: u64, extra: &str, compressed: &[(u64, u64, u32)]) -> usize {
        let at = self.buf.len();
        let mut rows: BTreeMap<u64, [u64; 3]> = BTreeMap::new();
        for (n, slot) in std::mem::take(&mut self.pending) {
            let row = match slot {
                Slot::InUse { offset, generation } => [1, offset as u64, u64::from(generation)],
                Slot::Free { generation } => [0, 0, u64::from(generation)],
            };
            rows.insert(n, row);
        }
        for &(n, container, index) in compressed {
            rows.insert(n, [2, container, u64::from(index)]);
        }
        rows.insert(number, [1, at as u64, 0]);

        let mut data = Vec::new();
        let mut index = String::new();
        for (n, [ty, f1, f2]) in &rows {
            index.push_str(&format!("{n} 1 "));
            data.push(*ty as u8);
            data.extend_from_slice(&(*f1 as u32).to_be_bytes());
            data.extend_from_slice(&(*f2 as u16).to_be_bytes());
        }
        let packed = deflate(&data).unwrap();
        let size = rows.keys().next_back().map_or(1, |n| n + 1);
        self.stream(
            number,
            &format!(
                "/Type /XRef /W [1 4 2] /Index [{index}] /Size {size} /Filter /FlateDecode {extra}"
            ),
            &packed,
        );
        self.pending.remove(&number);
        at
    }

    pub fn finish(&mut self, startxref: usize) -> Vec<u8> {
        self.buf
            .extend_from_slice(format!("startxref\n{startxref}\n%%EOF\n").as_bytes());
        self.buf.clone()
    }
}

/// Catalog, page tree and one page with a content stream.
pub fn simple_pdf() -> Vec<u8> {
    let mut b = PdfBuilder::new();
    b.object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>",
        )
        .stream(4, "", b"BT /F1 12 Tf (Hello) Tj ET");
    b.free(0, 65535);
    let xref = b.xref_table("<< /Size 5 /Root 1 0 R /Info 5 0 R >>");
    b.finish(xref)
}
