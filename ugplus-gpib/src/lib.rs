//! # UGPlus GPIB Driver
//!
//! A Rust driver for the LQ Electronics UGPlus USB-to-GPIB controller,
//! allowing applications to talk to IEEE-488 instruments through the
//! adapter's vendor-specific USB protocol.
//!
//! ## Overview
//!
//! The adapter exposes no standard USB class. It speaks a small
//! length-prefixed command/response protocol over a pair of bulk endpoints,
//! with firmware-dependent quirks in how reply lengths are reported. This
//! crate handles device discovery, the buffered byte stream that turns USB
//! transfer chunks into exact-length protocol frames, command/response
//! correlation and the quirk corrections; the wire format itself lives in the
//! [`ugplus_protocol`](https://docs.rs/ugplus-protocol/) crate.
//!
//! ## Basic Usage
//!
//! ### Connecting to an adapter
//!
//! ```ignore
//! use std::time::Duration;
//! use ugplus_gpib::UgPlusGpib;
//!
//! // Adopt the first adapter that answers.
//! let mut gpib = UgPlusGpib::connect(None, Duration::from_secs(1))?;
//! println!("Adapter firmware: {}", gpib.firmware_version());
//! ```
//!
//! ### Talking to an instrument
//!
//! ```ignore
//! // Ask the instrument at bus address 9 for its identity.
//! gpib.write(9, b"*IDN?\n")?;
//! if let Some(answer) = gpib.read(9, Duration::from_millis(300))? {
//!     println!("ID: {}", String::from_utf8_lossy(&answer));
//! }
//! ```
//!
//! ### Scanning the bus
//!
//! ```ignore
//! for address in gpib.discover_devices()? {
//!     println!("Instrument at address {address}");
//! }
//! ```
//!
//! ## Concurrency
//!
//! The driver is fully synchronous and blocking. The protocol has no request
//! IDs and no pipelining, so a command's reply must be collected before the
//! next command is issued; every session operation therefore takes
//! `&mut self`, which makes the exclusive borrow the mutual-exclusion scope
//! for one write+read round trip.
//!
//! ## Error Handling
//!
//! Failures are reported through [`error::Error`]. A non-responding
//! instrument on a bus read is routine and yields `Ok(None)` instead of an
//! error; everything else propagates. The driver never retries internally.
//!
//! ## Logging
//!
//! This crate uses the `log` facade for diagnostics. Enable logging to see
//! device enumeration, frame traffic and quirk corrections. Configure it
//! with an implementation like `env_logger`:
//!
//! ```ignore
//! env_logger::init();
//! ```

use std::time::Duration;

mod buffer;
pub mod discovery;
pub mod error;
pub mod session;

pub use error::Error;
pub use session::UgPlusGpib;

/// A claimed pair of USB bulk endpoints on one candidate device.
///
/// This is the seam between the protocol session and the USB stack: the
/// session pulls reply bytes in endpoint-sized chunks through
/// [`read_chunk`](BulkPort::read_chunk) and sends each request frame as one
/// transfer through [`write_all`](BulkPort::write_all). Production code uses
/// the [`rusb`]-backed [`discovery::UsbPort`]; tests drive the session
/// against scripted ports.
pub trait BulkPort {
    /// Largest number of bytes a single chunk read can return
    /// (`wMaxPacketSize` of the IN endpoint).
    fn max_chunk_size(&self) -> usize;

    /// Reads one chunk of up to `buf.len()` bytes, blocking for at most
    /// `timeout`.
    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> rusb::Result<usize>;

    /// Writes all of `bytes` as one transfer, blocking for at most `timeout`.
    fn write_all(&mut self, bytes: &[u8], timeout: Duration) -> rusb::Result<()>;
}
