//! Sz3-style error-bounded codec for `{i32,i64,f32,f64}` arrays with an
//! N-D dimension hint (spec.md §4.3).

use super::{dequantize_blocks, quantize_block, LossyElement};
use crate::error::{CodecError, CodecResult};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

const BLOCK_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum Sz3Mode {
    /// Relative error bound, as a fraction of the block's value range.
    Rel(f64),
    /// Absolute error bound.
    Abs(f64),
    /// Must satisfy both an absolute and a relative bound.
    AbsAndRel { abs: f64, rel: f64 },
    /// Must satisfy either bound.
    AbsOrRel { abs: f64, rel: f64 },
    /// Target PSNR in dB.
    Psnr(f64),
    /// Target global L2-norm error.
    L2(f64),
}

impl Sz3Mode {
    fn wire_tag(&self) -> u8 {
        match self {
            Sz3Mode::Rel(_) => 0,
            Sz3Mode::Abs(_) => 1,
            Sz3Mode::AbsAndRel { .. } => 2,
            Sz3Mode::AbsOrRel { .. } => 3,
            Sz3Mode::Psnr(_) => 4,
            Sz3Mode::L2(_) => 5,
        }
    }
}

/// Picks an absolute error bound for the whole array from `mode` and the
/// array's overall value range / element count, the way the PSNR and L2
/// error-control modes in the reference library derive a pointwise bound
/// from a global target before quantizing.
fn resolve_global_abs_bound<T: LossyElement>(data: &[T], mode: &Sz3Mode) -> f64 {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in data {
        let f = v.to_f64();
        min = min.min(f);
        max = max.max(f);
    }
    let range = (max - min).max(f64::EPSILON);

    match mode {
        Sz3Mode::Abs(e) => *e,
        Sz3Mode::Rel(r) => r * range,
        Sz3Mode::AbsAndRel { abs, rel } => abs.min(rel * range),
        Sz3Mode::AbsOrRel { abs, rel } => abs.max(rel * range),
        Sz3Mode::Psnr(psnr) => {
            // psnr = 20*log10(range) - 10*log10(mse) => mse = range^2 * 10^(-psnr/10)
            let mse = range.powi(2) * 10f64.powf(-psnr / 10.0);
            mse.sqrt()
        }
        Sz3Mode::L2(target_l2) => target_l2 / (data.len() as f64).sqrt(),
    }
}

pub fn encode<T: LossyElement>(data: &[T], dims: &[usize], mode: &Sz3Mode) -> Vec<u8> {
    let abs_bound = resolve_global_abs_bound(data, mode);

    let mut out = Vec::new();
    out.write_u8(mode.wire_tag()).unwrap();
    match mode {
        Sz3Mode::Rel(v) | Sz3Mode::Abs(v) | Sz3Mode::Psnr(v) | Sz3Mode::L2(v) => {
            out.write_f64::<LittleEndian>(*v).unwrap();
            out.write_f64::<LittleEndian>(0.0).unwrap();
        }
        Sz3Mode::AbsAndRel { abs, rel } | Sz3Mode::AbsOrRel { abs, rel } => {
            out.write_f64::<LittleEndian>(*abs).unwrap();
            out.write_f64::<LittleEndian>(*rel).unwrap();
        }
    }
    out.write_u32::<LittleEndian>(dims.len() as u32).unwrap();
    for d in dims {
        out.write_u32::<LittleEndian>(*d as u32).unwrap();
    }
    out.write_u32::<LittleEndian>(data.len() as u32).unwrap();
    out.write_u8(T::TAG).unwrap();

    quantize_block(
        data,
        BLOCK_LEN,
        |block| {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for v in block {
                let f = v.to_f64();
                min = min.min(f);
                max = max.max(f);
            }
            let range = (max - min).max(f64::EPSILON);
            let levels_needed = (range / (2.0 * abs_bound.max(f64::EPSILON))).max(1.0);
            (levels_needed.log2().ceil() as i64).clamp(1, 32) as u8
        },
        &mut out,
    );

    out
}

pub fn decode<T: LossyElement>(bytes: &[u8]) -> CodecResult<Vec<T>> {
    let mut cursor = Cursor::new(bytes);
    let mode_tag = cursor
        .read_u8()
        .map_err(|e| CodecError::MalformedHeader(e.to_string()))?;
    if mode_tag > 5 {
        return Err(CodecError::MalformedHeader(format!("bad sz3 mode tag {mode_tag}")));
    }
    cursor.read_f64::<LittleEndian>().ok();
    cursor.read_f64::<LittleEndian>().ok();
    let ndims = cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| CodecError::MalformedHeader(e.to_string()))? as usize;
    for _ in 0..ndims {
        cursor.read_u32::<LittleEndian>().ok();
    }
    let count = cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| CodecError::MalformedHeader(e.to_string()))? as usize;
    let elem_tag = cursor
        .read_u8()
        .map_err(|e| CodecError::MalformedHeader(e.to_string()))?;
    if elem_tag != T::TAG {
        return Err(CodecError::Failed {
            codec: "sz3",
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
    fn abs_mode_round_trip_within_bound() {
        let data: Vec<f32> = (0..500).map(|i| (i as f32 * 0.37).cos() * 3.0).collect();
        let abs = 0.02;
        let encoded = encode(&data, &[data.len()], &Sz3Mode::Abs(abs as f64));
        let decoded: Vec<f32> = decode(&encoded).unwrap();
        for (a, b) in data.iter().zip(decoded.iter()) {
            assert!((a - b).abs() <= abs * 1.05, "{} vs {}", a, b);
        }
    }

    #[test]
    fn rel_mode_on_integers() {
        let data: Vec<i32> = (0..300).map(|i| i * 10 - 1500).collect();
        let encoded = encode(&data, &[data.len()], &Sz3Mode::Rel(0.01));
        let decoded: Vec<i32> = decode(&encoded).unwrap();
        assert_eq!(decoded.len(), data.len());
    }
}
