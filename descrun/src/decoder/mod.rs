//! Weight decoders turn the packed weight blob into the flat `f32` sequence
//! that backs the weight arena.
//!
//! A decoder is a pure function of the blob and the allocation table: it
//! returns a fresh vector of exactly `total_size` elements and the runtime
//! copies it into the arena. Decoders are looked up by the descriptor's
//! `weight_encoding` string.

mod eightbit;
mod raw;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::descriptor::WeightAllocation;
use crate::error::{Result, RuntimeError};

pub use eightbit::{encode_eightbit, EightbitDecoder};
pub use raw::{encode_raw, RawDecoder};

pub trait WeightDecoder: Send + Sync {
    fn decode(&self, raw: &[u8], allocation: &WeightAllocation) -> Result<Vec<f32>>;
}

static DEFAULT_DECODERS: Lazy<Vec<(&'static str, Arc<dyn WeightDecoder>)>> = Lazy::new(|| {
    vec![
        ("raw", Arc::new(RawDecoder) as Arc<dyn WeightDecoder>),
        ("eightbit", Arc::new(EightbitDecoder) as Arc<dyn WeightDecoder>),
    ]
});

/// Encoding identifier to decoder table.
#[derive(Clone)]
pub struct DecoderRegistry {
    decoders: HashMap<String, Arc<dyn WeightDecoder>>,
}

impl DecoderRegistry {
    pub fn empty() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Registry holding the built-in `raw` and `eightbit` decoders.
    pub fn with_defaults() -> Self {
        let decoders = DEFAULT_DECODERS
            .iter()
            .map(|(name, decoder)| (name.to_string(), decoder.clone()))
            .collect();
        Self { decoders }
    }

    /// Register a decoder, returning the one it replaced.
    pub fn register(
        &mut self,
        encoding: impl Into<String>,
        decoder: Arc<dyn WeightDecoder>,
    ) -> Option<Arc<dyn WeightDecoder>> {
        self.decoders.insert(encoding.into(), decoder)
    }

    pub fn get(&self, encoding: &str) -> Result<Arc<dyn WeightDecoder>> {
        self.decoders
            .get(encoding)
            .cloned()
            .ok_or_else(|| RuntimeError::UnsupportedEncoding(encoding.to_string()))
    }

    pub fn contains(&self, encoding: &str) -> bool {
        self.decoders.contains_key(encoding)
    }

    pub fn encodings(&self) -> Vec<&str> {
        let mut names = self.decoders.keys().map(String::as_str).collect::<Vec<_>>();
        names.sort_unstable();
        names
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("encodings", &self.encodings())
            .finish()
    }
}

/// Look up a built-in decoder.
pub fn get_weight_decoder(encoding: &str) -> Result<Arc<dyn WeightDecoder>> {
    DEFAULT_DECODERS
        .iter()
        .find(|(name, _)| *name == encoding)
        .map(|(_, decoder)| decoder.clone())
        .ok_or_else(|| RuntimeError::UnsupportedEncoding(encoding.to_string()))
}

pub(crate) fn expected_len(allocation: &WeightAllocation) -> Result<usize> {
    usize::try_from(allocation.total_size).map_err(|_| {
        RuntimeError::decode(format!("invalid total_size {}", allocation.total_size))
    })
}
