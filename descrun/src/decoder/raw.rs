use std::mem::size_of;

use crate::descriptor::WeightAllocation;
use crate::error::{Result, RuntimeError};

use super::{expected_len, WeightDecoder};

/// Little-endian `f32` words, one per arena element.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawDecoder;

impl WeightDecoder for RawDecoder {
    fn decode(&self, raw: &[u8], allocation: &WeightAllocation) -> Result<Vec<f32>> {
        let len = expected_len(allocation)?;
        let nbytes = len
            .checked_mul(size_of::<f32>())
            .ok_or_else(|| RuntimeError::decode("raw weight size overflow"))?;
        if raw.len() != nbytes {
            return Err(RuntimeError::decode(format!(
                "raw weights hold {} bytes, expected {}",
                raw.len(),
                nbytes
            )));
        }
        if cfg!(target_endian = "little") {
            if let Ok(words) = bytemuck::try_cast_slice::<u8, f32>(raw) {
                return Ok(words.to_vec());
            }
        }
        Ok(raw
            .chunks_exact(size_of::<f32>())
            .map(|word| f32::from_le_bytes([word[0], word[1], word[2], word[3]]))
            .collect())
    }
}

/// Pack values in the `raw` encoding.
pub fn encode_raw(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}
