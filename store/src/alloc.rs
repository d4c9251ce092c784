//! The allocator seam (SPEC_FULL.md §D, REDESIGN FLAGS): the reference
//! system switches between a process-local heap and a cross-process
//! shared-memory arena behind a compile-time flag. Here that seam is a
//! single trait; only the in-process implementation is provided, per
//! spec.md §9's Non-goal on cross-process shared memory.

use std::alloc::{alloc, dealloc, Layout};
use std::collections::HashMap;
use std::sync::Mutex;

/// A raw byte-arena allocator. The array store does not route its
/// `Vec<T>`-backed typed arrays through this trait -- those use the
/// ordinary global allocator via `Vec` -- but it is kept as the
/// documented seam a future shared-memory backend would implement.
pub trait Allocator: Send + Sync {
    fn alloc(&self, bytes: usize) -> *mut u8;
    fn free(&self, ptr: *mut u8);
    fn handle_from_ptr(&self, ptr: *mut u8) -> Option<usize>;
}

/// Tracks outstanding allocations so `free`/`handle_from_ptr` can look
/// up the layout a raw pointer was allocated with.
pub struct InProcessAllocator {
    live: Mutex<HashMap<usize, Layout>>,
}

impl Default for InProcessAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl InProcessAllocator {
    pub fn new() -> Self {
        InProcessAllocator { live: Mutex::new(HashMap::new()) }
    }
}

impl Allocator for InProcessAllocator {
    fn alloc(&self, bytes: usize) -> *mut u8 {
        if bytes == 0 {
            return std::ptr::null_mut();
        }
        let layout = Layout::from_size_align(bytes, std::mem::align_of::<u64>()).expect("bad layout");
        // SAFETY: `layout` has non-zero size, checked above.
        let ptr = unsafe { alloc(layout) };
        self.live.lock().unwrap().insert(ptr as usize, layout);
        ptr
    }

    fn free(&self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        if let Some(layout) = self.live.lock().unwrap().remove(&(ptr as usize)) {
            // SAFETY: `ptr` was returned by `alloc` with this `layout` and
            // has not been freed before (tracked removed from `live`).
            unsafe { dealloc(ptr, layout) };
        }
    }

    fn handle_from_ptr(&self, ptr: *mut u8) -> Option<usize> {
        self.live.lock().unwrap().get(&(ptr as usize)).map(|_| ptr as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_then_free_round_trips() {
        let a = InProcessAllocator::new();
        let p = a.alloc(64);
        assert!(!p.is_null());
        assert!(a.handle_from_ptr(p).is_some());
        a.free(p);
        assert!(a.handle_from_ptr(p).is_none());
    }

    #[test]
    fn zero_size_alloc_is_null() {
        let a = InProcessAllocator::new();
        assert!(a.alloc(0).is_null());
    }
}
