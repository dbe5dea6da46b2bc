/// Frame encoding and reply payload decoding for the UGPlus wire format.
///
/// Every frame is `[opcode, length, payload...]` where `length` counts the
/// two header bytes as well as the payload. The decoders in this module work
/// on the payload alone; stripping the header and fixing up quirky declared
/// lengths is the transport's job (see the `quirks` module).
use crate::{
    error::CodecError,
    protocol::{Command, FirmwareVersion, STATUS_NO_LISTENER},
};

/// Number of header bytes counted by the frame length field.
pub const HEADER_LEN: usize = 2;

/// Largest payload that still fits the one-byte length field.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize - HEADER_LEN;

/// Builds the wire form of a request: `[opcode, payload_len + 2, payload...]`.
pub fn encode_frame(command: Command, payload: &[u8]) -> Result<Vec<u8>, CodecError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLong {
            max: MAX_PAYLOAD_LEN,
            got: payload.len(),
        });
    }
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.push(command.code());
    frame.push((payload.len() + HEADER_LEN) as u8);
    frame.extend_from_slice(payload);
    Ok(frame)
}

#[test]
fn encode_reset_frame() {
    let frame = encode_frame(Command::Reset, &[]).unwrap();
    assert_eq!(frame, vec![0x0F, 0x02]);
}

#[test]
fn encode_write_frame() {
    let frame = encode_frame(Command::Write, &[9, 0x0F, b'*', b'R', b'S', b'T']).unwrap();
    assert_eq!(frame, vec![0x32, 0x08, 9, 0x0F, b'*', b'R', b'S', b'T']);
}

/// Decodes a GET_FIRMWARE_VERSION payload: exactly `[major, minor]`.
pub fn decode_firmware_version(payload: &[u8]) -> Result<FirmwareVersion, CodecError> {
    match payload {
        [major, minor] => Ok(FirmwareVersion::new(*major, *minor)),
        _ => Err(CodecError::BadReplyLength {
            needed: 2,
            got: payload.len(),
        }),
    }
}

/// Decodes a GET_SERIES payload: one model id byte followed by the series
/// number as a big-endian unsigned integer.
pub fn decode_series_number(payload: &[u8]) -> Result<(u8, u32), CodecError> {
    let (model, series_bytes) = payload
        .split_first()
        .ok_or(CodecError::BadReplyLength { needed: 1, got: 0 })?;
    if series_bytes.len() > size_of::<u32>() {
        return Err(CodecError::SeriesTooWide {
            got: series_bytes.len(),
        });
    }
    let series = series_bytes
        .iter()
        .fold(0u32, |acc, &byte| (acc << 8) | u32::from(byte));
    Ok((*model, series))
}

/// Decodes a GET_MANUFACTURER_ID payload as one-byte-per-character text.
/// Firmware 1.0 appends a stray byte (see the length quirks) which is dropped
/// here before decoding.
pub fn decode_manufacturer_id(payload: &[u8], firmware: FirmwareVersion) -> String {
    let text = if firmware == FirmwareVersion::V1_0 {
        &payload[..payload.len().saturating_sub(1)]
    } else {
        payload
    };
    text.iter().map(|&byte| char::from(byte)).collect()
}

/// Decodes a DISCOVER_GPIB_DEVICES payload into the list of bus addresses, in
/// adapter order.
///
/// The final payload byte is not an address and is dropped; its meaning is
/// unknown (observed values 0x0A/0x1E/0x7F for zero/one/two instruments).
/// Firmware 1.0 appends one further stray byte which is dropped as well.
pub fn decode_device_list(payload: &[u8], firmware: FirmwareVersion) -> Vec<u8> {
    let trailing = if firmware == FirmwareVersion::V1_0 { 2 } else { 1 };
    payload[..payload.len().saturating_sub(trailing)].to_vec()
}

/// A decoded READ reply.
#[derive(Debug, Eq, PartialEq)]
pub struct ReadReply<'a> {
    /// The bus address echoed by the adapter.
    pub address: u8,
    /// Adapter status byte, see [`STATUS_NO_LISTENER`].
    pub status: u8,
    /// The instrument's answer.
    pub data: &'a [u8],
}

impl ReadReply<'_> {
    /// True if the adapter flagged that the addressed instrument did not
    /// answer.
    pub fn instrument_unreachable(&self) -> bool {
        self.status == STATUS_NO_LISTENER
    }
}

/// Splits a READ payload into the echoed address, the status byte and the
/// instrument data.
pub fn decode_read_reply(payload: &[u8]) -> Result<ReadReply<'_>, CodecError> {
    match payload {
        [address, status, data @ ..] => Ok(ReadReply {
            address: *address,
            status: *status,
            data,
        }),
        _ => Err(CodecError::BadReplyLength {
            needed: 2,
            got: payload.len(),
        }),
    }
}

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Escapes instrument data to a printable representation.
///
/// Printable ASCII, tab and newline pass through; every other byte, and `=`
/// itself, becomes a quoted-printable style `=XX` hex escape.
pub fn escape_printable(data: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(data.len());
    for &byte in data {
        match byte {
            b'=' => escaped.extend_from_slice(b"=3D"),
            b'\t' | b'\n' | 0x20..=0x7E => escaped.push(byte),
            _ => {
                escaped.push(b'=');
                escaped.push(HEX_DIGITS[usize::from(byte >> 4)]);
                escaped.push(HEX_DIGITS[usize::from(byte & 0x0F)]);
            }
        }
    }
    escaped
}
