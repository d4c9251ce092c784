// Shared error taxonomy for the core (spec.md §7).
//
// Every subsystem crate (`store`, `codec`, `archive`, `bundle`, `tile`,
// `server`) returns `CoreError` from its fallible public API so that a
// caller can match on the kind without downcasting through `anyhow`.
// Top-level binaries collapse these into `anyhow::Error` at the boundary,
// the way the teacher's `utils` crate re-exports `anyhow::Result` for its
// binaries while library code keeps typed errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("object type {0} is not registered in the catalog")]
    TypeNotRegistered(String),

    #[error("array scalar type mismatch: expected {expected}, found {actual}")]
    ScalarTypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("index overflow: {0}")]
    IndexOverflow(String),

    #[error("consistency error: {0}")]
    ConsistencyError(String),

    #[error("codec {codec} failed: {reason}")]
    CodecFailure { codec: &'static str, reason: String },

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("MAC verification failed")]
    MacVerificationFailed,

    #[error("archive version {found} unsupported (supported range {min}..={max})")]
    ArchiveVersionUnsupported { found: u32, min: u32, max: u32 },
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
