//! The validation framework (spec.md §4.9): a small set of named
//! predicates that raise a `CoreError::ConsistencyError` carrying
//! file/line/value context, the way the teacher's `Damage`/`Region`
//! helpers assert geometric invariants rather than let bad state
//! silently propagate.

use crate::array::{ArrayElement, ArrayRef};
use utils::CoreError;

/// Where a validation predicate was invoked from, captured via
/// `#[track_caller]` so failures point at the call site, not here.
#[derive(Debug, Clone, Copy)]
pub struct Site {
    pub file: &'static str,
    pub line: u32,
}

fn fail(site: Site, summary: impl Into<String>) -> CoreError {
    CoreError::ConsistencyError(format!("{}:{}: {}", site.file, site.line, summary.into()))
}

/// Asserts `obj` is present (a Sub-object predicate: a required
/// object-reference slot must actually be populated).
#[track_caller]
pub fn sub_object<T>(site_label: &str, obj: &Option<T>) -> Result<(), CoreError> {
    let loc = std::panic::Location::caller();
    let site = Site { file: loc.file(), line: loc.line() };
    if obj.is_none() {
        return Err(fail(site, format!("required sub-object '{site_label}' is missing")));
    }
    Ok(())
}

/// Asserts an array's size matches `expected` exactly.
#[track_caller]
pub fn size<T: ArrayElement>(label: &str, array: &ArrayRef<T>, expected: usize) -> Result<(), CoreError> {
    let loc = std::panic::Location::caller();
    let site = Site { file: loc.file(), line: loc.line() };
    let got = array.size();
    if got != expected {
        return Err(fail(site, format!("'{label}' has size {got}, expected {expected}")));
    }
    Ok(())
}

/// Asserts every element of an integer-tagged array lies in `0..count`,
/// as used for connectivity/element-type lists (spec.md §4.9 Enum).
#[track_caller]
pub fn enum_range(label: &str, values: &[u32], count: u32) -> Result<(), CoreError> {
    let loc = std::panic::Location::caller();
    let site = Site { file: loc.file(), line: loc.line() };
    for (i, &v) in values.iter().enumerate() {
        if v >= count {
            return Err(fail(site, format!("'{label}'[{i}] = {v} is outside 0..{count}")));
        }
    }
    Ok(())
}

/// Asserts `value` lies within `[lo, hi]` inclusive.
#[track_caller]
pub fn range(label: &str, value: f64, lo: f64, hi: f64) -> Result<(), CoreError> {
    let loc = std::panic::Location::caller();
    let site = Site { file: loc.file(), line: loc.line() };
    if value < lo || value > hi {
        return Err(fail(site, format!("'{label}' = {value} is outside [{lo}, {hi}]")));
    }
    Ok(())
}

/// Asserts `values` is non-decreasing, as required of an element-list
/// offset array (spec.md §4.9 Monotonic).
#[track_caller]
pub fn monotonic(label: &str, values: &[u32]) -> Result<(), CoreError> {
    let loc = std::panic::Location::caller();
    let site = Site { file: loc.file(), line: loc.line() };
    for pair in values.windows(2) {
        if pair[1] < pair[0] {
            return Err(fail(site, format!("'{label}' is not monotonic at value {} -> {}", pair[0], pair[1])));
        }
    }
    Ok(())
}

/// Asserts `a + b` does not overflow `u32`, as used when summing block
/// sizes or offsets that are serialized as 32-bit wire fields.
#[track_caller]
pub fn overflow_u32(label: &str, a: u32, b: u32) -> Result<u32, CoreError> {
    let loc = std::panic::Location::caller();
    let site = Site { file: loc.file(), line: loc.line() };
    a.checked_add(b).ok_or_else(|| fail(site, format!("'{label}' overflows u32: {a} + {b}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::ArrayStore;

    #[test]
    fn size_predicate_accepts_matching_length() {
        let store = ArrayStore::new("t");
        let a = store.create::<f32>("x", 4).unwrap();
        assert!(size("x", &a, 4).is_ok());
        assert!(size("x", &a, 3).is_err());
    }

    #[test]
    fn enum_range_rejects_out_of_bounds_index() {
        assert!(enum_range("conn", &[0, 1, 2], 3).is_ok());
        assert!(enum_range("conn", &[0, 1, 3], 3).is_err());
    }

    #[test]
    fn monotonic_rejects_decrease() {
        assert!(monotonic("offsets", &[0, 2, 2, 5]).is_ok());
        assert!(monotonic("offsets", &[0, 5, 2]).is_err());
    }

    #[test]
    fn overflow_u32_rejects_wraparound() {
        assert!(overflow_u32("sum", 10, 20).is_ok());
        assert!(overflow_u32("sum", u32::MAX, 1).is_err());
    }

    #[test]
    fn range_predicate_checks_inclusive_bounds() {
        assert!(range("alpha", 0.5, 0.0, 1.0).is_ok());
        assert!(range("alpha", 1.5, 0.0, 1.0).is_err());
    }
}
