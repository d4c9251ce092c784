use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("codec {codec} failed: {reason}")]
    Failed { codec: &'static str, reason: String },
    #[error("scalar type {0} is not supported by this codec")]
    UnsupportedScalar(&'static str),
    #[error("malformed codec header: {0}")]
    MalformedHeader(String),
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;

impl From<CodecError> for utils::CoreError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Failed { codec, reason } => utils::CoreError::CodecFailure { codec, reason },
            CodecError::UnsupportedScalar(s) => utils::CoreError::CodecFailure {
                codec: "registry",
                reason: format!("unsupported scalar type {s}"),
            },
            CodecError::MalformedHeader(s) => utils::CoreError::CodecFailure {
                codec: "registry",
                reason: s,
            },
        }
    }
}
