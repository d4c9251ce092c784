// A set of helper structs for common operations
//
// Austin Shafer - 2020
pub mod error;
pub mod timing;
#[macro_use]
pub mod logging;
pub mod fdwatch;
pub mod region;

extern crate anyhow;
pub use anyhow::{anyhow, Context, Error, Result};
pub use error::{CoreError, CoreResult};

/// A borrowed view of a row-major pixel buffer with an explicit stride.
///
/// `stride` is in elements (not bytes) between the start of one row and
/// the next; a stride of 0 means "tightly packed", matching the
/// convention the tile codec and array store both use for dimension
/// hints. Unlike the teacher's original `MemImage` (a raw pointer
/// borrowed from a wayland shm buffer) this is a safe, lifetime-bound
/// slice view: nothing in this workspace needs to smuggle a buffer
/// across an FFI boundary.
#[derive(Debug, Clone, Copy)]
pub struct PixelView<'a, T> {
    data: &'a [T],
    pub width: usize,
    pub height: usize,
    pub stride: usize,
}

impl<'a, T> PixelView<'a, T> {
    pub fn new(data: &'a [T], width: usize, height: usize, stride: usize) -> Self {
        PixelView {
            data,
            width,
            height,
            stride: if stride == 0 { width } else { stride },
        }
    }

    pub fn row(&self, y: usize) -> &[T] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }
}

/// Helper to perform max on PartialOrd types
///
/// We are using PartialOrd so that size and offset can handle
/// floating point types that do not support Ord
pub fn partial_max<T: PartialOrd>(a: T, b: T) -> T {
    if a >= b {
        return a;
    } else {
        return b;
    }
}

/// Helper to perform min on PartialOrd types
pub fn partial_min<T: PartialOrd>(a: T, b: T) -> T {
    if a <= b {
        return a;
    } else {
        return b;
    }
}
