//! Driver tests against a scripted adapter double.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use ugplus_gpib::{BulkPort, Error, UgPlusGpib};
use ugplus_protocol::{Command, FirmwareVersion, ReplyTag};

const TIMEOUT: Duration = Duration::from_millis(25);
const NO_DELAY: Duration = Duration::ZERO;

/// Adapter double: scripted reply bytes are handed out in endpoint-sized
/// chunks, everything written is recorded. Clones share the same state so a
/// test can keep inspecting a port after the session consumed it.
#[derive(Clone, Default)]
struct MockPort {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    replies: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
    chunk_reads: usize,
}

impl MockPort {
    fn new() -> MockPort {
        MockPort::default()
    }

    /// Scripts a reply frame with an explicit declared length, which may
    /// disagree with the actual payload the way quirky firmware does.
    fn push_frame(&self, command: Command, declared: u8, payload: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.replies.push_back(command.code());
        state.replies.push_back(declared);
        state.replies.extend(payload);
    }

    /// Scripts a well-formed reply frame for `command`.
    fn push_reply(&self, command: Command, payload: &[u8]) {
        self.push_frame(command, (payload.len() + 2) as u8, payload);
    }

    /// Scripts raw bytes, bypassing any framing.
    fn push_raw(&self, bytes: &[u8]) {
        self.state.lock().unwrap().replies.extend(bytes);
    }

    fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().writes.clone()
    }

    fn chunk_reads(&self) -> usize {
        self.state.lock().unwrap().chunk_reads
    }
}

impl BulkPort for MockPort {
    fn max_chunk_size(&self) -> usize {
        64
    }

    fn read_chunk(&mut self, buf: &mut [u8], _timeout: Duration) -> rusb::Result<usize> {
        let mut state = self.state.lock().unwrap();
        state.chunk_reads += 1;
        if state.replies.is_empty() {
            return Err(rusb::Error::Timeout);
        }
        let count = buf.len().min(state.replies.len());
        for slot in buf[..count].iter_mut() {
            *slot = state.replies.pop_front().unwrap();
        }
        Ok(count)
    }

    fn write_all(&mut self, bytes: &[u8], _timeout: Duration) -> rusb::Result<()> {
        self.state.lock().unwrap().writes.push(bytes.to_vec());
        Ok(())
    }
}

/// Scripts the firmware probe and adopts the port.
fn attach_with_firmware(port: &MockPort, major: u8, minor: u8) -> UgPlusGpib<MockPort> {
    port.push_reply(Command::GetFirmwareVersion, &[major, minor]);
    UgPlusGpib::attach(port.clone(), TIMEOUT).expect("firmware probe should succeed")
}

#[test]
fn manufacturer_id_on_fixed_firmware() {
    let port = MockPort::new();
    let mut gpib = attach_with_firmware(&port, 1, 1);

    port.push_reply(Command::GetManufacturerId, b"LQ Electronics");
    assert_eq!(gpib.get_manufacturer_id().unwrap(), "LQ Electronics");
    // The query frame is a bare header.
    assert_eq!(port.writes()[1], vec![0xFE, 0x02]);
}

#[test]
fn manufacturer_id_quirk_on_v1_0() {
    let port = MockPort::new();
    let mut gpib = attach_with_firmware(&port, 1, 0);

    // Firmware 1.0 sends one byte more than it declares; the stray byte must
    // be read off the wire and dropped from the decoded string.
    let mut payload = b"LQ Electronics".to_vec();
    payload.push(0x7F);
    port.push_frame(Command::GetManufacturerId, 2 + 14, &payload);
    assert_eq!(gpib.get_manufacturer_id().unwrap(), "LQ Electronics");

    // The stream stayed in sync: the next query parses cleanly.
    port.push_reply(Command::GetSeries, &[0x01, 0x28, 0x7F, 0x7F]);
    assert_eq!(gpib.get_series_number().unwrap(), (0x01, 2_654_079));
    assert_eq!(gpib.buffered(), 0);
}

#[test]
fn series_number_is_big_endian() {
    let port = MockPort::new();
    let mut gpib = attach_with_firmware(&port, 1, 1);

    port.push_reply(Command::GetSeries, &[0x02, 0x00, 0x01, 0x2C]);
    assert_eq!(gpib.get_series_number().unwrap(), (0x02, 300));
}

#[test]
fn firmware_requery_does_not_replace_cache() {
    let port = MockPort::new();
    let mut gpib = attach_with_firmware(&port, 1, 0);
    assert_eq!(gpib.firmware_version(), FirmwareVersion::V1_0);

    port.push_reply(Command::GetFirmwareVersion, &[1, 1]);
    assert_eq!(gpib.get_firmware_version().unwrap(), FirmwareVersion::V1_1);
    // The session keeps correcting for the revision it connected to.
    assert_eq!(gpib.firmware_version(), FirmwareVersion::V1_0);
}

#[test]
fn discover_devices_strips_trailer() {
    let port = MockPort::new();
    let mut gpib = attach_with_firmware(&port, 1, 1);

    port.push_reply(Command::DiscoverGpibDevices, &[9, 12, 0x7F]);
    assert_eq!(gpib.discover_devices().unwrap(), vec![9, 12]);
}

#[test]
fn discover_devices_quirk_on_v1_0() {
    let port = MockPort::new();
    let mut gpib = attach_with_firmware(&port, 1, 0);

    // Declared for 3 payload bytes, 4 on the wire; both the undocumented
    // trailer and the stray quirk byte must go.
    port.push_frame(Command::DiscoverGpibDevices, 2 + 3, &[9, 12, 0x7F, 0x0A]);
    assert_eq!(gpib.discover_devices().unwrap(), vec![9, 12]);
    assert_eq!(gpib.buffered(), 0);
}

#[test]
fn write_frames_address_separator_and_data() {
    let port = MockPort::new();
    let mut gpib = attach_with_firmware(&port, 1, 1);

    gpib.write(9, b"*IDN?\n").unwrap();
    let frame = &port.writes()[1];
    assert_eq!(&frame[..4], &[0x32, 0x0A, 9, 0x0F]);
    // The instrument data crosses the separator boundary unmodified.
    assert_eq!(&frame[4..], b"*IDN?\n");
}

#[test]
fn read_strips_echo_and_status() {
    let port = MockPort::new();
    let mut gpib = attach_with_firmware(&port, 1, 1);

    port.push_reply(Command::Read, &[9, 0x01, b'o', b'k']);
    let answer = gpib.read(9, NO_DELAY).unwrap();
    assert_eq!(answer, Some(b"ok".to_vec()));
    // The read request carries address and separator only.
    assert_eq!(port.writes()[1], vec![0x33, 0x04, 9, 0x0F]);
}

#[test]
fn read_escapes_unprintable_bytes() {
    let port = MockPort::new();
    let mut gpib = attach_with_firmware(&port, 1, 1);

    port.push_reply(Command::Read, &[9, 0x01, b'4', 0x00, b'2']);
    assert_eq!(gpib.read(9, NO_DELAY).unwrap(), Some(b"4=002".to_vec()));
}

#[test]
fn read_unreachable_instrument_clears_buffer() {
    let port = MockPort::new();
    let mut gpib = attach_with_firmware(&port, 1, 1);

    port.push_reply(Command::Read, &[9, 0x0A, 0x00]);
    // Stale bytes behind the error frame must not poison the next frame.
    port.push_raw(&[0xDE, 0xAD]);
    match gpib.read(9, NO_DELAY) {
        Err(Error::InstrumentUnreachable { address }) => assert_eq!(address, 9),
        other => panic!("expected InstrumentUnreachable, got {other:?}"),
    }
    assert_eq!(gpib.buffered(), 0);
}

#[test]
fn read_empty_reply_quirk_on_v1_0() {
    let port = MockPort::new();
    let mut gpib = attach_with_firmware(&port, 1, 0);

    // Firmware 1.0 declares 3 bytes for a no-listener reply that is 5 bytes
    // on the wire.
    port.push_frame(Command::Read, 3, &[9, 0x0A, 0x33]);
    match gpib.read(9, NO_DELAY) {
        Err(Error::InstrumentUnreachable { address }) => assert_eq!(address, 9),
        other => panic!("expected InstrumentUnreachable, got {other:?}"),
    }
}

#[test]
fn read_nothing_pending_quirk_keeps_stream_in_sync() {
    let port = MockPort::new();
    let mut gpib = attach_with_firmware(&port, 1, 0);

    // Declared 4 (instrument had nothing to say), 5 bytes on the wire.
    port.push_frame(Command::Read, 4, &[9, 0x01, b'A']);
    assert_eq!(gpib.read(9, NO_DELAY).unwrap(), Some(b"A".to_vec()));

    port.push_reply(Command::GetSeries, &[0x01, 0x00, 0x00, 0x64]);
    assert_eq!(gpib.get_series_number().unwrap(), (0x01, 100));
}

#[test]
fn read_timeout_is_a_silent_instrument() {
    let port = MockPort::new();
    let mut gpib = attach_with_firmware(&port, 1, 1);

    // No reply scripted at all.
    assert!(gpib.read(9, NO_DELAY).unwrap().is_none());
}

#[test]
fn read_truncated_reply_keeps_partial_bytes() {
    let port = MockPort::new();
    let mut gpib = attach_with_firmware(&port, 1, 1);

    // Opcode, declared length 6, then the adapter dies after one payload byte.
    port.push_raw(&[0x33, 0x06, 9]);
    match gpib.read(9, NO_DELAY) {
        Err(Error::TruncatedReply { received, expected }) => {
            assert_eq!(received, 1);
            assert_eq!(expected, 4);
        }
        other => panic!("expected TruncatedReply, got {other:?}"),
    }
    // What did arrive is still buffered, not silently discarded.
    assert_eq!(gpib.buffered(), 1);
}

#[test]
fn read_wrong_opcode_is_a_failed_query() {
    let port = MockPort::new();
    let mut gpib = attach_with_firmware(&port, 1, 1);

    port.push_raw(&[0x99, 0x02]);
    assert!(gpib.read(9, NO_DELAY).unwrap().is_none());
}

#[test]
fn query_wrong_opcode_reports_both_sides() {
    let port = MockPort::new();
    let mut gpib = attach_with_firmware(&port, 1, 1);

    port.push_reply(Command::Reset, &[]);
    match gpib.get_series_number() {
        Err(Error::UnexpectedReply { expected, received }) => {
            assert_eq!(expected, Command::GetSeries);
            assert_eq!(received, ReplyTag::Known(Command::Reset));
        }
        other => panic!("expected UnexpectedReply, got {other:?}"),
    }
}

#[test]
fn connect_selects_target_series() {
    let first = MockPort::new();
    let second = MockPort::new();
    let third = MockPort::new();
    first.push_reply(Command::GetSeries, &[1, 0, 0, 100]);
    second.push_reply(Command::GetSeries, &[1, 0, 0, 200]);
    second.push_reply(Command::GetFirmwareVersion, &[1, 1]);
    third.push_reply(Command::GetSeries, &[1, 0, 1, 44]);

    let ports = vec![first.clone(), second.clone(), third.clone()];
    let gpib = UgPlusGpib::connect_via(ports, Some(200), TIMEOUT).unwrap();
    assert_eq!(gpib.firmware_version(), FirmwareVersion::V1_1);

    // The first candidate saw the series probe and nothing after rejection;
    // the third was never touched.
    assert_eq!(first.writes(), vec![vec![0x0E, 0x02]]);
    assert_eq!(second.writes(), vec![vec![0x0E, 0x02], vec![0x00, 0x02]]);
    assert!(third.writes().is_empty());
    assert_eq!(third.chunk_reads(), 0);
}

#[test]
fn connect_accepts_first_responder_without_target() {
    let dead = MockPort::new();
    let live = MockPort::new();
    live.push_reply(Command::GetSeries, &[1, 0, 0, 100]);
    live.push_reply(Command::GetFirmwareVersion, &[1, 0]);

    let gpib =
        UgPlusGpib::connect_via(vec![dead.clone(), live.clone()], None, TIMEOUT).unwrap();
    assert_eq!(gpib.firmware_version(), FirmwareVersion::V1_0);
    // The dead candidate was probed once and skipped.
    assert_eq!(dead.writes(), vec![vec![0x0E, 0x02]]);
}

#[test]
fn connect_without_match_reports_not_found() {
    let port = MockPort::new();
    port.push_reply(Command::GetSeries, &[1, 0, 0, 100]);

    match UgPlusGpib::connect_via(vec![port.clone()], Some(999), TIMEOUT) {
        Err(Error::NotFound) => {}
        other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
    }
    // Rejected after the probe, no firmware query.
    assert_eq!(port.writes(), vec![vec![0x0E, 0x02]]);
}

#[test]
fn long_reply_spans_multiple_chunks() {
    let port = MockPort::new();
    let mut gpib = attach_with_firmware(&port, 1, 1);

    let text: Vec<u8> = std::iter::repeat(b'x').take(100).collect();
    port.push_reply(Command::GetManufacturerId, &text);
    let id = gpib.get_manufacturer_id().unwrap();
    assert_eq!(id.len(), 100);
    assert!(id.bytes().all(|byte| byte == b'x'));
}
