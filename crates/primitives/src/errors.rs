//! Errors during parsing/handling/conversion of primitives.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("invalid base58 encoding: {0}")]
    Base58(String),

    #[error("expected {0} bytes, got {1}")]
    WrongLength(usize, usize),

    #[error("malformed request id {0:?}")]
    MalformedRequestId(String),
}
