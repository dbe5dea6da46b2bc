//! # UGPlus Protocol Library
//!
//! This crate implements the wire protocol spoken by the LQ Electronics
//! UGPlus USB-to-GPIB controller, a vendor-specific command/response protocol
//! carried over USB bulk transfers.
//!
//! ## Overview
//!
//! The adapter understands a small set of single-byte commands. Each request
//! and each reply is one frame:
//!
//! ```text
//! [command:1][length:1][payload:(length - 2) bytes]
//! ```
//!
//! where `length` counts the two header bytes as well as the payload. Replies
//! echo the opcode of the command they answer; there are no request IDs and
//! no pipelining.
//!
//! This library provides:
//!
//! - The [`Command`] opcodes and [`ReplyTag`] classification of observed
//!   reply bytes
//! - Frame encoding and reply payload decoding ([`codec`])
//! - The [`quirks`] table correcting reply lengths misreported by firmware
//!   1.0
//!
//! ## Firmware quirks
//!
//! Firmware 1.0 misreports the length of several replies (see
//! [`quirks::LENGTH_QUIRKS`]). The correction must be applied to the declared
//! length *before* the payload is read from the transport; applying it
//! afterwards leaves stray bytes in the stream and corrupts every following
//! frame.
//!
//! ## Basic Usage
//!
//! ### Encoding a request
//!
//! ```
//! use ugplus_protocol::{codec, Command, ADDRESS_SEPARATOR};
//!
//! // Ask the instrument at bus address 9 for its identity.
//! let mut payload = vec![9, ADDRESS_SEPARATOR];
//! payload.extend_from_slice(b"*IDN?\n");
//! let frame = codec::encode_frame(Command::Write, &payload).expect("payload fits a frame");
//! assert_eq!(&frame[..2], &[0x32, 10]);
//! ```
//!
//! ### Correcting a declared reply length
//!
//! ```
//! use ugplus_protocol::{quirks, Command, FirmwareVersion};
//!
//! // Firmware 1.0 declares 3 bytes for an empty READ reply that is
//! // actually 5 bytes on the wire.
//! assert_eq!(quirks::corrected_length(Command::Read, FirmwareVersion::V1_0, 3), 5);
//! // Fixed firmware passes through unchanged.
//! assert_eq!(quirks::corrected_length(Command::Read, FirmwareVersion::V1_1, 3), 3);
//! ```
//!
//! ### Decoding a reply payload
//!
//! ```
//! use ugplus_protocol::{codec, FirmwareVersion};
//!
//! let (model, series) = codec::decode_series_number(&[0x01, 0x28, 0x7F, 0x7F]).unwrap();
//! assert_eq!(model, 0x01);
//! assert_eq!(series, 2654079);
//! ```
//!
//! ## Error Handling
//!
//! Encoding and decoding report failures through [`error::CodecError`].
//! Transport concerns (timeouts, USB errors, reply correlation) live in the
//! driver crate, not here.

pub mod protocol;
pub use protocol::*;
pub mod codec;
pub mod error;
pub mod quirks;
