//! cosdump - dump the COS object structure of a PDF file as XML.
//!
//! Prints trailers, cross-reference entries and objects. Stream data can be
//! written raw, decoded, or decoded and escaped inside the XML.

use anyhow::{Context, Result};
use carousel_core::document::{XRefKind, XRefTable};
use carousel_core::pdftypes::{Dictionary, ObjectKey, Stream, Value};
use carousel_core::{Document, OpenOptions};
use clap::{ArgAction, ArgGroup, Parser};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Escape bytes for XML text and attribute values.
fn escape(s: &[u8]) -> String {
    let mut result = String::with_capacity(s.len());
    for &byte in s {
        match byte {
            b'&' => result.push_str("&amp;"),
            b'<' => result.push_str("&lt;"),
            b'>' => result.push_str("&gt;"),
            b'"' => result.push_str("&quot;"),
            b'\'' => result.push_str("&#39;"),
            b'\\' => result.push_str("&#92;"),
            0..=31 | 127..=255 => result.push_str(&format!("&#{byte};")),
            _ => result.push(char::from(byte)),
        }
    }
    result
}

fn escape_str(s: &str) -> String {
    escape(s.as_bytes())
}

/// How stream data is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamCodec {
    /// Dictionary only.
    None,
    /// Stored bytes, no XML around them.
    Raw,
    /// Decoded bytes, no XML around them.
    Binary,
    /// Dictionary plus decoded bytes escaped as XML text.
    Text,
}

struct Dumper<'a, W: Write> {
    out: &'a mut W,
    doc: &'a Document,
    codec: StreamCodec,
}

impl<W: Write> Dumper<'_, W> {
    fn value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => write!(self.out, "<null />")?,
            Value::Bool(b) => write!(self.out, "<boolean>{b}</boolean>")?,
            Value::Int(n) => write!(self.out, "<number>{n}</number>")?,
            Value::Real(_) => write!(self.out, "<number>{value}</number>")?,
            Value::Str(s) => write!(
                self.out,
                r#"<string size="{}">{}</string>"#,
                s.as_bytes().len(),
                escape(s.as_bytes())
            )?,
            Value::Name(name) => write!(self.out, "<literal>{}</literal>", escape_str(name))?,
            Value::Array(arr) => {
                writeln!(self.out, r#"<list size="{}">"#, arr.len())?;
                for item in arr {
                    self.value(item)?;
                    writeln!(self.out)?;
                }
                write!(self.out, "</list>")?;
            }
            Value::Dict(dict) => self.dict(dict)?,
            Value::Stream(stream) => self.stream(stream)?,
            Value::Indirect(key) => write!(
                self.out,
                r#"<ref id="{}" gen="{}" />"#,
                key.number, key.generation
            )?,
        }
        Ok(())
    }

    fn dict(&mut self, dict: &Dictionary) -> Result<()> {
        writeln!(self.out, r#"<dict size="{}">"#, dict.len())?;
        for (key, value) in dict {
            writeln!(self.out, "<key>{}</key>", escape_str(key))?;
            write!(self.out, "<value>")?;
            self.value(value)?;
            writeln!(self.out, "</value>")?;
        }
        write!(self.out, "</dict>")?;
        Ok(())
    }

    fn stream(&mut self, stream: &Stream) -> Result<()> {
        match self.codec {
            StreamCodec::Raw => self.out.write_all(&self.doc.stream_data(stream, false)?)?,
            StreamCodec::Binary => self.out.write_all(&self.doc.stream_data(stream, true)?)?,
            StreamCodec::Text | StreamCodec::None => {
                writeln!(self.out, "<stream>")?;
                writeln!(self.out, "<props>")?;
                self.dict(stream.dict())?;
                writeln!(self.out)?;
                writeln!(self.out, "</props>")?;
                if self.codec == StreamCodec::Text {
                    match self.doc.stream_data(stream, true) {
                        Ok(data) => writeln!(
                            self.out,
                            r#"<data size="{}">{}</data>"#,
                            data.len(),
                            escape(&data)
                        )?,
                        Err(err) => {
                            warn!(%err, "cannot decode stream");
                            writeln!(self.out, r#"<data error="{}" />"#, escape_str(&err.to_string()))?;
                        }
                    }
                }
                write!(self.out, "</stream>")?;
            }
        }
        Ok(())
    }

    fn object(&mut self, key: ObjectKey) -> Result<()> {
        match self.doc.resolve(key) {
            Ok(value) => {
                if self.codec == StreamCodec::Raw || self.codec == StreamCodec::Binary {
                    return self.value(&value);
                }
                writeln!(
                    self.out,
                    r#"<object id="{}" gen="{}">"#,
                    key.number, key.generation
                )?;
                self.value(&value)?;
                writeln!(self.out)?;
                writeln!(self.out, "</object>")?;
                writeln!(self.out)?;
            }
            Err(err) => warn!(%key, %err, "cannot read object"),
        }
        Ok(())
    }

    fn trailers(&mut self) -> Result<()> {
        let doc = self.doc;
        let trailers = doc.xref().trailers();
        if trailers.is_empty() {
            warn!("no trailer found");
        }
        for trailer in trailers {
            writeln!(self.out, "<trailer>")?;
            self.dict(trailer.dict())?;
            writeln!(self.out)?;
            writeln!(self.out, "</trailer>")?;
            writeln!(self.out)?;
        }
        Ok(())
    }

    fn xref(&mut self, xref: &XRefTable) -> Result<()> {
        for section in xref.sections() {
            writeln!(
                self.out,
                r#"<section offset="{}" kind="{:?}" entries="{}" />"#,
                section.offset, section.kind, section.entries
            )?;
        }
        writeln!(self.out, r#"<xref size="{}">"#, xref.len())?;
        for (number, entry) in xref.iter() {
            match entry.kind {
                XRefKind::Free => writeln!(
                    self.out,
                    r#"<free id="{number}" gen="{}" next="{}" />"#,
                    entry.generation, entry.offset
                )?,
                XRefKind::InUse => writeln!(
                    self.out,
                    r#"<inuse id="{number}" gen="{}" offset="{}" />"#,
                    entry.generation, entry.offset
                )?,
                XRefKind::Compressed { container, index } => writeln!(
                    self.out,
                    r#"<compressed id="{number}" container="{container}" index="{index}" />"#
                )?,
            }
        }
        writeln!(self.out, "</xref>")?;
        Ok(())
    }
}

/// `N` or `N.G`.
fn parse_object_id(text: &str) -> Option<(u64, Option<u32>)> {
    match text.trim().split_once('.') {
        Some((number, generation)) => Some((number.parse().ok()?, Some(generation.parse().ok()?))),
        None => Some((text.trim().parse().ok()?, None)),
    }
}

/// Dump the COS object structure of PDF files as XML.
#[derive(Parser, Debug)]
#[command(name = "cosdump")]
#[command(author, version, about = "Dump PDF object structure as XML", long_about = None)]
#[command(group(
    ArgGroup::new("stream_codec")
        .args(["raw_stream", "binary_stream", "text_stream"])
))]
struct Args {
    /// One or more paths to PDF files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Comma-separated object numbers to dump, `N` or `N.G`
    #[arg(short = 'i', long = "objects", value_delimiter = ',')]
    objects: Vec<String>,

    /// Dump every object in the file
    #[arg(short = 'a', long = "all", action = ArgAction::SetTrue)]
    all: bool,

    /// Dump the cross-reference entries
    #[arg(short = 'x', long = "xref", action = ArgAction::SetTrue)]
    xref: bool,

    /// Rebuild the cross-reference table by scanning when it is unreadable
    #[arg(long, action = ArgAction::SetTrue)]
    repair: bool,

    /// Path to file where output is written, or "-" for stdout
    #[arg(short = 'o', long, default_value = "-")]
    outfile: String,

    /// Write stream objects as stored
    #[arg(short = 'r', long = "raw", action = ArgAction::SetTrue)]
    raw_stream: bool,

    /// Write stream objects decoded
    #[arg(short = 'b', long = "binary", action = ArgAction::SetTrue)]
    binary_stream: bool,

    /// Write stream objects decoded as XML text
    #[arg(short = 't', long = "text", action = ArgAction::SetTrue)]
    text_stream: bool,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn dump_file<W: Write>(out: &mut W, args: &Args, codec: StreamCodec, path: &Path) -> Result<()> {
    let doc = OpenOptions::new()
        .repair(args.repair)
        .open(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    debug!(path = %path.display(), ?doc, "opened");

    let mut dumper = Dumper {
        out,
        doc: &doc,
        codec,
    };
    let markup = codec != StreamCodec::Raw && codec != StreamCodec::Binary;

    if args.all {
        if markup {
            writeln!(dumper.out, "<pdf>")?;
        }
        for key in doc.object_keys() {
            dumper.object(key)?;
        }
        if markup {
            dumper.trailers()?;
            writeln!(dumper.out, "</pdf>")?;
        }
        return Ok(());
    }

    for text in &args.objects {
        let Some((number, generation)) = parse_object_id(text) else {
            warn!(id = %text, "not an object id");
            continue;
        };
        let generation = generation
            .or_else(|| doc.xref().get(number).map(|e| e.generation))
            .unwrap_or(0);
        dumper.object(ObjectKey::new(number, generation))?;
    }
    if args.xref {
        dumper.xref(doc.xref())?;
    }
    if args.objects.is_empty() && !args.xref {
        dumper.trailers()?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let codec = if args.raw_stream {
        StreamCodec::Raw
    } else if args.binary_stream {
        StreamCodec::Binary
    } else if args.text_stream {
        StreamCodec::Text
    } else {
        StreamCodec::None
    };

    let mut output: Box<dyn Write> = if args.outfile == "-" {
        Box::new(BufWriter::new(io::stdout()))
    } else {
        let file = File::create(&args.outfile)
            .with_context(|| format!("cannot create {}", args.outfile))?;
        Box::new(BufWriter::new(file))
    };

    for path in &args.files {
        dump_file(&mut output, &args, codec, path)?;
    }

    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ids() {
        assert_eq!(parse_object_id("12"), Some((12, None)));
        assert_eq!(parse_object_id(" 7.2 "), Some((7, Some(2))));
        assert_eq!(parse_object_id("x"), None);
        assert_eq!(parse_object_id("3.x"), None);
    }

    #[test]
    fn escapes_markup_and_control_bytes() {
        assert_eq!(escape(b"a<b>&\"\n\xff"), "a&lt;b&gt;&amp;&quot;&#10;&#255;");
    }

    #[test]
    fn dumps_dictionary_as_xml() {
        let mut b = b"%PDF-1.4\n".to_vec();
        let obj = b.len();
        b.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /N [1 2.5] >>\nendobj\n");
        let xref = b.len();
        b.extend_from_slice(
            format!("xref\n0 2\n0000000000 65535 f \n{obj:010} 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n")
                .as_bytes(),
        );
        let doc = Document::from_bytes(b).unwrap();
        let mut out = Vec::new();
        Dumper {
            out: &mut out,
            doc: &doc,
            codec: StreamCodec::None,
        }
        .object(ObjectKey::new(1, 0))
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(r#"<object id="1" gen="0">"#));
        assert!(text.contains("<key>Type</key>\n<value><literal>Catalog</literal></value>"));
        assert!(text.contains("<number>2.5</number>"));
    }
}
