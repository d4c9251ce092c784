//! Archive format (spec.md §4.4): a self-describing byte stream for one
//! object's transitive data, built on top of the codec registry and the
//! object/array stores.

pub mod codecs;
pub mod format;
pub mod reader;
pub mod writer;

pub use format::{RecordKind, CURRENT_VERSION, MAX_SUPPORTED_VERSION, MIN_SUPPORTED_VERSION};
pub use reader::{read_all, DeepFetch};
pub use writer::{ArchiveWriter, WriterPolicy};
