//! Stream filters.
//!
//! This module contains:
//! - `ascii85`: ASCII85 and ASCIIHex encoding
//! - `flate`: zlib/deflate
//! - `lzw`: LZW compression
//! - `predictor`: TIFF and PNG predictors shared by Flate and LZW
//! - `runlength`: Run-length encoding
//!
//! Filters are looked up in a [`FilterRegistry`] that the caller owns and
//! hands to the document, so a registry can be extended or replaced
//! without touching global state.

pub mod ascii85;
pub mod flate;
pub mod lzw;
pub mod predictor;
pub mod runlength;

use crate::error::{PdfError, Result};
use crate::model::objects::{Dictionary, Name, Value};
use rustc_hash::FxHashMap;
use std::fmt;
use std::rc::Rc;

pub use ascii85::{Ascii85Decode, AsciiHexDecode, ascii85decode, ascii85encode, asciihexdecode, asciihexencode};
pub use flate::FlateDecode;
pub use lzw::LzwDecode;
pub use predictor::PredictorParams;
pub use runlength::{RunLengthDecode, rldecode, rlencode};

/// A single stream filter stage.
pub trait Filter {
    /// Canonical filter name, e.g. `FlateDecode`.
    fn name(&self) -> &'static str;

    /// Decode `input`. `params` is the matching `/DecodeParms` entry.
    fn decode(&self, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>>;

    /// Encode `input`; the inverse of [`Filter::decode`] for the same params.
    fn encode(&self, _input: &[u8], _params: Option<&Dictionary>) -> Result<Vec<u8>> {
        Err(PdfError::UnsupportedFilter(format!("{} (encode)", self.name())))
    }
}

/// Table of filters keyed by name.
#[derive(Clone)]
pub struct FilterRegistry {
    filters: FxHashMap<Name, Rc<dyn Filter>>,
}

impl FilterRegistry {
    /// Registry without any filter.
    pub fn empty() -> Self {
        Self {
            filters: FxHashMap::default(),
        }
    }

    /// Registry with the built-in filters and their abbreviations.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register_with_alias(AsciiHexDecode, "AHx");
        registry.register_with_alias(Ascii85Decode, "A85");
        registry.register_with_alias(FlateDecode, "Fl");
        registry.register_with_alias(LzwDecode, "LZW");
        registry.register_with_alias(RunLengthDecode, "RL");
        registry
    }

    /// Register `filter` under its canonical name, replacing any previous one.
    pub fn register(&mut self, filter: impl Filter + 'static) -> Rc<dyn Filter> {
        let filter: Rc<dyn Filter> = Rc::new(filter);
        self.filters.insert(filter.name().into(), filter.clone());
        filter
    }

    /// Make `alias` refer to the filter registered as `name`.
    pub fn alias(&mut self, alias: &str, name: &str) -> bool {
        match self.filters.get(name).cloned() {
            Some(filter) => {
                self.filters.insert(alias.into(), filter);
                true
            }
            None => false,
        }
    }

    fn register_with_alias(&mut self, filter: impl Filter + 'static, alias: &str) {
        let filter = self.register(filter);
        self.filters.insert(alias.into(), filter);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Filter> {
        self.filters.get(name).map(|f| f.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Run one decode stage.
    pub fn decode(&self, name: &str, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
        self.lookup(name)?.decode(input, params)
    }

    /// Run one encode stage.
    pub fn encode(&self, name: &str, input: &[u8], params: Option<&Dictionary>) -> Result<Vec<u8>> {
        self.lookup(name)?.encode(input, params)
    }

    fn lookup(&self, name: &str) -> Result<&dyn Filter> {
        self.get(name)
            .ok_or_else(|| PdfError::UnsupportedFilter(name.to_string()))
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.filters.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        f.debug_struct("FilterRegistry").field("filters", &names).finish()
    }
}

/// One stage of a pipeline: filter name and its decode parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStage {
    pub name: Name,
    pub params: Option<Dictionary>,
}

/// Ordered filter chain of one stream.
#[derive(Debug)]
pub struct FilterPipeline<'r> {
    registry: &'r FilterRegistry,
    stages: Vec<FilterStage>,
}

impl<'r> FilterPipeline<'r> {
    pub const fn new(registry: &'r FilterRegistry) -> Self {
        Self {
            registry,
            stages: Vec::new(),
        }
    }

    /// Build the chain from a stream dictionary's `/Filter` and
    /// `/DecodeParms`. Both must already be direct values.
    pub fn from_dict(registry: &'r FilterRegistry, dict: &Dictionary) -> Result<Self> {
        let mut pipeline = Self::new(registry);
        let names: Vec<Name> = match dict.get("Filter") {
            None => Vec::new(),
            Some(Value::Name(name)) => vec![name.clone()],
            Some(Value::Array(arr)) => arr
                .iter()
                .map(|v| v.as_name().map(Name::from))
                .collect::<Result<_>>()?,
            Some(other) => {
                return Err(PdfError::TypeError {
                    expected: "name or array",
                    got: other.type_name(),
                });
            }
        };
        let params: Vec<Option<Dictionary>> = match dict.get("DecodeParms") {
            Some(Value::Dict(d)) => vec![Some(d.clone())],
            Some(Value::Array(arr)) => arr.iter().map(|v| v.as_dict().ok().cloned()).collect(),
            _ => Vec::new(),
        };
        for (i, name) in names.into_iter().enumerate() {
            pipeline.push(name, params.get(i).cloned().flatten());
        }
        Ok(pipeline)
    }

    pub fn push(&mut self, name: impl Into<Name>, params: Option<Dictionary>) -> &mut Self {
        self.stages.push(FilterStage {
            name: name.into(),
            params,
        });
        self
    }

    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Apply the stages left to right.
    pub fn decode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut data = input.to_vec();
        for stage in &self.stages {
            data = self
                .registry
                .decode(&stage.name, &data, stage.params.as_ref())?;
        }
        Ok(data)
    }

    /// Apply the inverse stages right to left.
    pub fn encode(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut data = input.to_vec();
        for stage in self.stages.iter().rev() {
            data = self
                .registry
                .encode(&stage.name, &data, stage.params.as_ref())?;
        }
        Ok(data)
    }
}

/// Integer entry of optional decode parameters.
pub(crate) fn param_int(params: Option<&Dictionary>, key: &str, default: i64) -> i64 {
    params.and_then(|p| p.get_int(key)).unwrap_or(default)
}
