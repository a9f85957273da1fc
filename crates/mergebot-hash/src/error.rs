/// Errors produced when parsing commit names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    #[error("invalid hex character at position {position}: '{character}'")]
    InvalidHex { position: usize, character: char },

    #[error("invalid object name length: expected 40 or 64 hex characters, got {actual}")]
    InvalidLength { actual: usize },
}
