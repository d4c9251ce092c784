//! Refcounted array and object storage (spec.md §4.1, §4.2, §4.8, §4.9).
//!
//! Both stores key their entities through `lluvia`, the same ECS the
//! teacher uses to track per-client/per-surface state: dropping the
//! last strong handle to an array or object drops its last `lluvia`
//! `Entity` clone, which frees every component slot for that entity
//! with no explicit cleanup code here.

pub mod alloc;
pub mod array;
pub mod catalog;
pub mod object;
pub mod validate;

pub use alloc::{Allocator, InProcessAllocator};
pub use array::{ArrayElement, ArrayRef, ArrayStore};
pub use catalog::{ObjectTypeDescriptor, TypeTag, VecElem};
pub use object::{AnyArrayRef, ObjectMeta, ObjectRef, ObjectStore};
