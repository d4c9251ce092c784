//! Deep save/fetch (spec.md §4.5): bundles an object's transitive closure
//! for out-of-process transport on top of the `archive` wire format, and
//! resolves incoming bundles back against a destination store.

pub mod fetcher;
pub mod saver;

pub use fetcher::DeepFetcher;
pub use saver::{DeepSaver, DirectoryEntry};
