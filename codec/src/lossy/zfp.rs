//! Zfp-style codec for `{i32,i64,f32,f64}` arrays with a 1-3D dimension
//! hint (spec.md §4.3). Writes a full self-describing header so the
//! reader needs no side-channel parameters, and arrays shorter than
//! 1000 elements fall back to `Raw`.

use super::{quantize_block, dequantize_blocks, LossyElement};
use crate::error::{CodecError, CodecResult};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// Flat block length used by the simplified block-quantization transform
/// (see `lossy::mod` doc). 64 == 4^3, matching the reference library's
/// largest (3D) block shape even though blocks here are not laid out
/// along `dims`.
const BLOCK_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum ZfpMode {
    /// Target bits spent per value.
    FixedRate(f32),
    /// Number of bitplanes encoded per block.
    Precision(u32),
    /// Maximum absolute error tolerated per value.
    Accuracy(f64),
}

impl ZfpMode {
    fn wire_tag(&self) -> u8 {
        match self {
            ZfpMode::FixedRate(_) => 0,
            ZfpMode::Precision(_) => 1,
            ZfpMode::Accuracy(_) => 2,
        }
    }
}

/// Outcome of attempting a Zfp encode: either the compressed bytes, or a
/// signal that the caller should fall back to `Raw` per spec.md §4.3
/// ("Arrays shorter than 1000 elements fall back to Raw").
pub enum ZfpOutcome {
    Encoded(Vec<u8>),
    FallbackRaw,
}

pub fn encode<T: LossyElement>(data: &[T], dims: (usize, usize, usize), mode: &ZfpMode) -> ZfpOutcome {
    if data.len() < 1000 {
        return ZfpOutcome::FallbackRaw;
    }

    let mut out = Vec::new();
    out.write_u8(mode.wire_tag()).unwrap();
    match mode {
        ZfpMode::FixedRate(bpv) => out.write_f32::<LittleEndian>(*bpv).unwrap(),
        ZfpMode::Precision(bp) => out.write_u32::<LittleEndian>(*bp).unwrap(),
        ZfpMode::Accuracy(err) => out.write_f64::<LittleEndian>(*err).unwrap(),
    }
    out.write_u32::<LittleEndian>(dims.0 as u32).unwrap();
    out.write_u32::<LittleEndian>(dims.1 as u32).unwrap();
    out.write_u32::<LittleEndian>(dims.2 as u32).unwrap();
    out.write_u32::<LittleEndian>(data.len() as u32).unwrap();
    out.write_u8(T::TAG).unwrap();

    let mode = mode.clone();
    quantize_block(
        data,
        BLOCK_LEN,
        move |block| match &mode {
            ZfpMode::FixedRate(bpv) => (*bpv).round().clamp(1.0, 32.0) as u8,
            ZfpMode::Precision(bp) => (*bp).clamp(1, 32) as u8,
            ZfpMode::Accuracy(abs_err) => {
                let mut min = f64::INFINITY;
                let mut max = f64::NEG_INFINITY;
                for v in block {
                    let f = v.to_f64();
                    min = min.min(f);
                    max = max.max(f);
                }
                let range = (max - min).max(f64::EPSILON);
                let levels_needed = (range / (2.0 * abs_err.max(f64::EPSILON))).max(1.0);
                (levels_needed.log2().ceil() as i64).clamp(1, 32) as u8
            }
        },
        &mut out,
    );

    ZfpOutcome::Encoded(out)
}

pub fn decode<T: LossyElement>(bytes: &[u8]) -> CodecResult<Vec<T>> {
    let mut cursor = Cursor::new(bytes);
    let mode_tag = cursor
        .read_u8()
        .map_err(|e| CodecError::MalformedHeader(e.to_string()))?;
    match mode_tag {
        0 => {
            cursor.read_f32::<LittleEndian>().ok();
        }
        1 => {
            cursor.read_u32::<LittleEndian>().ok();
        }
        2 => {
            cursor.read_f64::<LittleEndian>().ok();
        }
        _ => return Err(CodecError::MalformedHeader(format!("bad zfp mode tag {mode_tag}"))),
    };
    let _sx = cursor.read_u32::<LittleEndian>().unwrap_or(0);
    let _sy = cursor.read_u32::<LittleEndian>().unwrap_or(0);
    let _sz = cursor.read_u32::<LittleEndian>().unwrap_or(0);
    let count = cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| CodecError::MalformedHeader(e.to_string()))? as usize;
    let elem_tag = cursor
        .read_u8()
        .map_err(|e| CodecError::MalformedHeader(e.to_string()))?;
    if elem_tag != T::TAG {
        return Err(CodecError::Failed {
            codec: "zfp",
            reason: format!(
                "element tag mismatch: header says {}, caller requested {}",
                super::tag_to_name(elem_tag),
                super::tag_to_name(T::TAG)
            ),
        });
    }

    let payload_start = cursor.position() as usize;
    Ok(dequantize_blocks::<T>(&bytes[payload_start..], count, BLOCK_LEN))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_below_1000_elements() {
        let data: Vec<f32> = vec![1.0; 500];
        match encode(&data, (500, 1, 1), &ZfpMode::Precision(16)) {
            ZfpOutcome::FallbackRaw => {}
            ZfpOutcome::Encoded(_) => panic!("expected fallback"),
        }
    }

    #[test]
    fn precision_16_round_trip_within_bound() {
        let data: Vec<f32> = (0..2048).map(|i| ((i as f32) * 0.01).sin() * 4.0).collect();
        let encoded = match encode(&data, (2048, 1, 1), &ZfpMode::Precision(16)) {
            ZfpOutcome::Encoded(b) => b,
            ZfpOutcome::FallbackRaw => panic!("should not fall back"),
        };
        let decoded: Vec<f32> = decode(&encoded).unwrap();
        assert_eq!(decoded.len(), data.len());
        let max_err = data
            .iter()
            .zip(decoded.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 2f32.powi(-12), "max_err={max_err}");
    }

    #[test]
    fn accuracy_mode_bounds_error() {
        let data: Vec<f64> = (0..4000).map(|i| i as f64 * 0.001).collect();
        let abs_err = 0.01;
        let encoded = match encode(&data, (4000, 1, 1), &ZfpMode::Accuracy(abs_err)) {
            ZfpOutcome::Encoded(b) => b,
            ZfpOutcome::FallbackRaw => panic!("should not fall back"),
        };
        let decoded: Vec<f64> = decode(&encoded).unwrap();
        for (a, b) in data.iter().zip(decoded.iter()) {
            assert!((a - b).abs() <= abs_err * 1.01);
        }
    }
}
