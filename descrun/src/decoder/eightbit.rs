use std::io::{Read, Write};

use anyhow::{anyhow, Context};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use rayon::prelude::*;

use crate::descriptor::WeightAllocation;
use crate::error::{Result, RuntimeError};

use super::{expected_len, WeightDecoder};

// dst_offset: i32, body_size: i32, scale: f32, reserved: u32
const CHUNK_HEADER: usize = 16;
const SIGN_BIT: u8 = 0x80;
const MAGNITUDE_STEPS: f32 = 127.0;

/// Chunked 8-bit quantization with zlib-compressed bodies.
///
/// Each chunk carries its destination offset and a scale; code `c` decodes
/// to `(c & 0x7F) / 127 * scale`, negated when the high bit is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct EightbitDecoder;

struct Chunk<'a> {
    dst_offset: usize,
    scale: f32,
    body: &'a [u8],
}

impl WeightDecoder for EightbitDecoder {
    fn decode(&self, raw: &[u8], allocation: &WeightAllocation) -> Result<Vec<f32>> {
        let len = expected_len(allocation)?;
        let chunks = split_chunks(raw)?;
        let decoded = chunks
            .par_iter()
            .map(|chunk| inflate(chunk.body).map(|codes| (chunk.dst_offset, chunk.scale, codes)))
            .collect::<Result<Vec<_>>>()?;

        let mut dst = vec![0.0f32; len];
        for (dst_offset, scale, codes) in decoded {
            let end = dst_offset
                .checked_add(codes.len())
                .filter(|end| *end <= len)
                .ok_or_else(|| {
                    RuntimeError::decode(format!(
                        "chunk at {} with {} codes overruns arena of {}",
                        dst_offset,
                        codes.len(),
                        len
                    ))
                })?;
            let table = scaled_table(scale);
            for (slot, code) in dst[dst_offset..end].iter_mut().zip(codes) {
                *slot = table[code as usize];
            }
        }
        Ok(dst)
    }
}

fn read_word(raw: &[u8], at: usize) -> [u8; 4] {
    [raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]
}

fn split_chunks(raw: &[u8]) -> Result<Vec<Chunk<'_>>> {
    let mut chunks = Vec::new();
    let mut cursor = 0usize;
    while cursor < raw.len() {
        if raw.len() - cursor < CHUNK_HEADER {
            return Err(RuntimeError::decode(format!(
                "truncated chunk header at byte {}",
                cursor
            )));
        }
        let dst_offset = i32::from_le_bytes(read_word(raw, cursor));
        let body_size = i32::from_le_bytes(read_word(raw, cursor + 4));
        let scale = f32::from_le_bytes(read_word(raw, cursor + 8));
        let dst_offset = usize::try_from(dst_offset).map_err(|_| {
            RuntimeError::decode(format!("negative chunk offset {} at byte {}", dst_offset, cursor))
        })?;
        let body_size = usize::try_from(body_size).map_err(|_| {
            RuntimeError::decode(format!("negative chunk size {} at byte {}", body_size, cursor))
        })?;
        let body_start = cursor + CHUNK_HEADER;
        let body_end = body_start
            .checked_add(body_size)
            .filter(|end| *end <= raw.len())
            .ok_or_else(|| {
                RuntimeError::decode(format!(
                    "chunk body of {} bytes at byte {} overruns blob of {}",
                    body_size,
                    body_start,
                    raw.len()
                ))
            })?;
        chunks.push(Chunk {
            dst_offset,
            scale,
            body: &raw[body_start..body_end],
        });
        cursor = body_end;
    }
    Ok(chunks)
}

fn inflate(body: &[u8]) -> Result<Vec<u8>> {
    let mut codes = Vec::new();
    ZlibDecoder::new(body)
        .read_to_end(&mut codes)
        .map_err(|err| RuntimeError::decode(format!("inflate chunk: {}", err)))?;
    Ok(codes)
}

fn scaled_table(scale: f32) -> [f32; 256] {
    let mut table = [0.0f32; 256];
    for (code, slot) in table.iter_mut().enumerate() {
        let code = code as u8;
        let magnitude = f32::from(code & !SIGN_BIT) / MAGNITUDE_STEPS * scale;
        *slot = if code & SIGN_BIT == 0 { magnitude } else { -magnitude };
    }
    table
}

fn quantize(value: f32, scale: f32) -> u8 {
    if scale == 0.0 {
        return 0;
    }
    let magnitude = (value.abs() / scale * MAGNITUDE_STEPS)
        .round()
        .clamp(0.0, MAGNITUDE_STEPS) as u8;
    if value < 0.0 {
        magnitude | SIGN_BIT
    } else {
        magnitude
    }
}

/// Pack values in the `eightbit` encoding, `chunk_len` elements per chunk.
pub fn encode_eightbit(values: &[f32], chunk_len: usize) -> anyhow::Result<Vec<u8>> {
    if chunk_len == 0 {
        return Err(anyhow!("chunk length must be positive"));
    }
    let mut out = Vec::new();
    for (index, chunk) in values.chunks(chunk_len).enumerate() {
        let dst_offset = i32::try_from(index * chunk_len)
            .map_err(|_| anyhow!("chunk offset {} exceeds i32", index * chunk_len))?;
        let scale = chunk.iter().fold(0.0f32, |acc, value| acc.max(value.abs()));
        let codes = chunk
            .iter()
            .map(|value| quantize(*value, scale))
            .collect::<Vec<_>>();

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&codes).context("deflate chunk")?;
        let body = encoder.finish().context("finish chunk")?;
        let body_size =
            i32::try_from(body.len()).map_err(|_| anyhow!("chunk body exceeds i32"))?;

        out.extend_from_slice(&dst_offset.to_le_bytes());
        out.extend_from_slice(&body_size.to_le_bytes());
        out.extend_from_slice(&scale.to_le_bytes());
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&body);
    }
    Ok(out)
}
