use std::{error::Error as StdError, fmt::Display};

use ugplus_protocol::{Command, ReplyTag, error::CodecError};

/// Errors that may occur while discovering an adapter or exchanging frames
/// with it.
#[derive(Debug)]
pub enum Error {
    /// No candidate device matched during discovery.
    NotFound,
    /// The adapter did not start answering within the configured timeout.
    Timeout,
    /// The adapter stopped sending mid-frame.
    TruncatedReply { received: usize, expected: usize },
    /// The reply opcode did not match the command awaiting an answer.
    UnexpectedReply { expected: Command, received: ReplyTag },
    /// The adapter reported that the addressed instrument did not answer a
    /// bus read.
    InstrumentUnreachable { address: u8 },
    /// A frame could not be encoded or a reply payload not decoded.
    Codec(CodecError),
    /// Any other USB transport error, propagated unmodified.
    Usb(rusb::Error),
}

impl From<CodecError> for Error {
    fn from(value: CodecError) -> Self {
        Error::Codec(value)
    }
}

impl From<rusb::Error> for Error {
    fn from(value: rusb::Error) -> Self {
        Error::Usb(value)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NotFound => write!(f, "No UGPlus GPIB adapter found"),
            Error::Timeout => write!(f, "The adapter did not reply within the timeout"),
            Error::TruncatedReply { received, expected } => {
                write!(f, "The adapter stopped mid-reply: got {received} of {expected} bytes")
            }
            Error::UnexpectedReply { expected, received } => {
                write!(f, "Got {received} while waiting for a reply to {expected:?}")
            }
            Error::InstrumentUnreachable { address } => {
                write!(
                    f,
                    "Cannot read from the GPIB instrument at address {address}. Is the instrument attached?"
                )
            }
            Error::Codec(error) => write!(f, "{error}"),
            Error::Usb(error) => write!(f, "{error}"),
        }
    }
}

impl StdError for Error {}
