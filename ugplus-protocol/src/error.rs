use std::{error::Error, fmt::Display};

/// Errors that may occur when encoding a request frame or decoding a reply
/// payload.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CodecError {
    PayloadTooLong { max: usize, got: usize },
    BadReplyLength { needed: usize, got: usize },
    SeriesTooWide { got: usize },
}

impl Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::PayloadTooLong { max, got } => {
                write!(f, "Payload too large! Maximum is {max} bytes, but got {got}")
            }
            CodecError::BadReplyLength { needed, got } => {
                write!(f, "Reply payload has {got} bytes where {needed} were expected")
            }
            CodecError::SeriesTooWide { got } => {
                write!(f, "Series number field of {got} bytes does not fit in 32 bits")
            }
        }
    }
}

impl Error for CodecError {}
