//! Lossy array codecs (spec.md §4.3): `Zfp`, `Sz3`, `BigWhoop`.
//!
//! None of these bind the real reference C/C++ libraries -- there is no
//! widely used pure-Rust crate for any of the three on crates.io, and
//! fabricating an FFI binding with no library to link against would be
//! worse than not having one. Each module instead implements the family
//! of error-controlled, block-quantized transforms the reference library
//! is known for (min/max-per-block scalar quantization, with the knob
//! each family exposes -- rate, bitplane count, or absolute/relative
//! error), self-contained in pure Rust. See DESIGN.md.

pub mod bigwhoop;
pub mod sz3;
pub mod zfp;

/// Elements a lossy array codec can operate on (spec.md §4.3: `{i32,i64,f32,f64}`
/// for Zfp/Sz3, `{f32,f64}` only for BigWhoop).
pub trait LossyElement: Copy {
    fn to_f64(self) -> f64;
    fn from_f64(x: f64) -> Self;
    const TAG: u8;
}

impl LossyElement for f32 {
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(x: f64) -> Self {
        x as f32
    }
    const TAG: u8 = 0;
}

impl LossyElement for f64 {
    fn to_f64(self) -> f64 {
        self
    }
    fn from_f64(x: f64) -> Self {
        x
    }
    const TAG: u8 = 1;
}

impl LossyElement for i32 {
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(x: f64) -> Self {
        x.round() as i32
    }
    const TAG: u8 = 2;
}

impl LossyElement for i64 {
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(x: f64) -> Self {
        x.round() as i64
    }
    const TAG: u8 = 3;
}

pub(crate) fn tag_to_name(tag: u8) -> &'static str {
    match tag {
        0 => "f32",
        1 => "f64",
        2 => "i32",
        3 => "i64",
        _ => "unknown",
    }
}

/// Shared block-quantization primitive used by Zfp/Sz3/BigWhoop: splits
/// `data` into flat blocks of `block_len` elements, and for each block
/// stores `(min, range)` as f64 plus `bits`-wide quantized residuals.
///
/// This is a deliberate simplification of the reference libraries' true
/// per-block multidimensional transforms (see module doc); it preserves
/// their error-control contract (decode error bounded by `range /
/// 2^bits`) without replicating the embedded bitplane coding.
pub(crate) fn quantize_block<T: LossyElement>(
    data: &[T],
    block_len: usize,
    bits_for_block: impl Fn(&[T]) -> u8,
    out: &mut Vec<u8>,
) {
    use byteorder::{LittleEndian, WriteBytesExt};

    for block in data.chunks(block_len) {
        let bits = bits_for_block(block).clamp(1, 32);
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in block {
            let f = v.to_f64();
            min = min.min(f);
            max = max.max(f);
        }
        if !min.is_finite() {
            min = 0.0;
        }
        if !max.is_finite() || max < min {
            max = min;
        }
        let range = (max - min).max(f64::EPSILON);
        let levels = ((1u64 << bits) - 1) as f64;

        out.write_f64::<LittleEndian>(min).unwrap();
        out.write_f64::<LittleEndian>(range).unwrap();
        out.write_u8(bits).unwrap();
        for &v in block {
            let f = v.to_f64();
            let q = (((f - min) / range) * levels).round().clamp(0.0, levels) as u32;
            out.write_u32::<LittleEndian>(q).unwrap();
        }
    }
}

pub(crate) fn dequantize_blocks<T: LossyElement>(
    mut bytes: &[u8],
    count: usize,
    block_len: usize,
) -> Vec<T> {
    use byteorder::{LittleEndian, ReadBytesExt};

    let mut out = Vec::with_capacity(count);
    let mut remaining = count;
    while remaining > 0 {
        let this_block = block_len.min(remaining);
        let min = bytes.read_f64::<LittleEndian>().unwrap();
        let range = bytes.read_f64::<LittleEndian>().unwrap();
        let bits = bytes.read_u8().unwrap();
        let levels = ((1u64 << bits) - 1) as f64;
        for _ in 0..this_block {
            let q = bytes.read_u32::<LittleEndian>().unwrap();
            let f = min + (q as f64 / levels) * range;
            out.push(T::from_f64(f));
        }
        remaining -= this_block;
    }
    out
}
