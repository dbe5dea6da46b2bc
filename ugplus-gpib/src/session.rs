//! The protocol session against one adopted adapter.

use std::{thread, time::Duration};

use ugplus_protocol::{
    ADDRESS_SEPARATOR, Command, FirmwareVersion, ReplyTag, codec, quirks,
};

use crate::{BulkPort, buffer::TransportBuffer, discovery, error::Error};

/// A session with one UGPlus adapter.
///
/// The session owns its port and reply buffer exclusively. All operations
/// take `&mut self`: the protocol has no request IDs, so a command's reply
/// must be collected before the next command goes out, and the exclusive
/// borrow is the mutual-exclusion scope for one round trip.
pub struct UgPlusGpib<P = discovery::UsbPort> {
    port: P,
    buffer: TransportBuffer,
    timeout: Duration,
    firmware: FirmwareVersion,
}

impl UgPlusGpib {
    /// Finds and adopts an adapter.
    ///
    /// Every attached device matching the UGPlus USB signature is probed in
    /// enumeration order with a series query. A candidate whose series number
    /// matches `target_series` is adopted; with no target given, the first
    /// candidate that answers is adopted. Rejected candidates receive no
    /// further traffic.
    pub fn connect(target_series: Option<u32>, timeout: Duration) -> Result<Self, Error> {
        log::info!("Enumerating GPIB USB adapters");
        let context = rusb::Context::new()?;
        let ports = discovery::candidates(&context)?
            .into_iter()
            .filter_map(|device| match discovery::open(&device) {
                Ok(port) => Some(port),
                Err(e) => {
                    log::warn!("Skipping unusable candidate: {e}");
                    None
                }
            });
        Self::connect_via(ports, target_series, timeout)
    }
}

impl<P: BulkPort> UgPlusGpib<P> {
    /// Probes `candidates` in order and adopts the first match, as
    /// [`connect`](UgPlusGpib::connect) does. Ports are consumed lazily; a
    /// rejected or unresponsive port is dropped on the spot.
    pub fn connect_via(
        candidates: impl IntoIterator<Item = P>,
        target_series: Option<u32>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        for port in candidates {
            let mut session = UgPlusGpib {
                port,
                buffer: TransportBuffer::new(),
                timeout,
                // Quirk-free placeholder until the real revision is read on
                // adoption; the series query below is not quirk-affected.
                firmware: FirmwareVersion::latest(),
            };
            let (model, series) = match session.get_series_number() {
                Ok(reply) => reply,
                Err(e) => {
                    log::warn!("Candidate did not answer the series query: {e}");
                    continue;
                }
            };
            log::info!("Adapter found: model {model}, series number {series}");
            if target_series.is_none_or(|target| target == series) {
                log::info!("Connecting to adapter {series}");
                session.firmware = session.get_firmware_version()?;
                log::info!("Adapter firmware version: {}", session.firmware);
                return Ok(session);
            }
        }
        Err(Error::NotFound)
    }

    /// Adopts `port` directly, reading the firmware version immediately.
    pub fn attach(port: P, timeout: Duration) -> Result<Self, Error> {
        let mut session = UgPlusGpib {
            port,
            buffer: TransportBuffer::new(),
            timeout,
            firmware: FirmwareVersion::latest(),
        };
        session.firmware = session.get_firmware_version()?;
        Ok(session)
    }

    /// The firmware version read when the session was established. It drives
    /// the reply length corrections for the whole lifetime of the session.
    pub fn firmware_version(&self) -> FirmwareVersion {
        self.firmware
    }

    /// Number of received reply bytes no operation has consumed yet. Useful
    /// when diagnosing a desynchronized adapter.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Reads the manufacturer id string of the adapter.
    pub fn get_manufacturer_id(&mut self) -> Result<String, Error> {
        let payload = self.query(Command::GetManufacturerId)?;
        Ok(codec::decode_manufacturer_id(&payload, self.firmware))
    }

    /// Reads the model id and series number of the adapter.
    pub fn get_series_number(&mut self) -> Result<(u8, u32), Error> {
        let payload = self.query(Command::GetSeries)?;
        Ok(codec::decode_series_number(&payload)?)
    }

    /// Queries the adapter's firmware version.
    ///
    /// The session keeps using the version cached at connect time; the result
    /// of a later call is handed back without replacing the cache.
    pub fn get_firmware_version(&mut self) -> Result<FirmwareVersion, Error> {
        let payload = self.query(Command::GetFirmwareVersion)?;
        Ok(codec::decode_firmware_version(&payload)?)
    }

    /// Scans the bus and returns the addresses of attached instruments, in
    /// the order the adapter reports them.
    pub fn discover_devices(&mut self) -> Result<Vec<u8>, Error> {
        let payload = self.query(Command::DiscoverGpibDevices)?;
        Ok(codec::decode_device_list(&payload, self.firmware))
    }

    /// Returns the adapter to a known state. The adapter sends no reply;
    /// callers must give it settle time before the next command.
    pub fn reset(&mut self) -> Result<(), Error> {
        log::info!("Resetting GPIB adapter");
        self.device_write(Command::Reset, &[])
    }

    /// Sends `data` to the instrument at bus address `address`.
    /// Fire-and-forget: the adapter sends no reply to a bus write.
    pub fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Error> {
        let mut payload = Vec::with_capacity(data.len() + 2);
        payload.push(address);
        payload.push(ADDRESS_SEPARATOR);
        payload.extend_from_slice(data);
        self.device_write(Command::Write, &payload)
    }

    /// Collects the pending answer of the instrument at bus address
    /// `address`, sleeping `delay` between requesting the read and collecting
    /// the adapter's reply so the instrument has time to respond.
    ///
    /// Returns `Ok(None)` when the adapter never starts answering or answers
    /// with the wrong opcode (a silent instrument is routine, not an adapter
    /// fault), and [`Error::InstrumentUnreachable`] when the adapter reports
    /// that nothing listens at `address`; in that case the reply buffer is
    /// cleared to resynchronize the stream. On success the instrument data is
    /// escaped to a printable representation.
    pub fn read(&mut self, address: u8, delay: Duration) -> Result<Option<Vec<u8>>, Error> {
        self.device_write(Command::Read, &[address, ADDRESS_SEPARATOR])?;

        thread::sleep(delay);

        let payload = match self.device_read(Command::Read) {
            Ok(payload) => payload,
            Err(Error::Timeout) => {
                log::error!("Reading from address {address} timed out");
                return Ok(None);
            }
            // Already logged by device_read.
            Err(Error::UnexpectedReply { .. }) => return Ok(None),
            Err(other) => return Err(other),
        };

        let reply = codec::decode_read_reply(&payload)?;
        if reply.instrument_unreachable() {
            if !self.buffer.is_empty() {
                log::debug!("Clearing the reply buffer to resynchronize");
                self.buffer.clear();
            }
            return Err(Error::InstrumentUnreachable { address });
        }
        Ok(Some(codec::escape_printable(reply.data)))
    }

    fn device_write(&mut self, command: Command, payload: &[u8]) -> Result<(), Error> {
        let frame = codec::encode_frame(command, payload)?;
        log::debug!("Sending {command:?} frame: {frame:02x?}");
        Ok(self.port.write_all(&frame, self.timeout)?)
    }

    fn device_read(&mut self, expected: Command) -> Result<Vec<u8>, Error> {
        let opcode = self.buffer.read_exact(&mut self.port, 1, self.timeout)?[0];
        let tag = ReplyTag::classify(opcode);
        if !tag.answers(expected) {
            log::error!("Got {tag} while waiting for a reply to {expected:?}");
            return Err(Error::UnexpectedReply {
                expected,
                received: tag,
            });
        }
        log::debug!("Got reply to command {expected:?}");

        let declared = self.read_mid_frame(1)?[0];
        let length = quirks::corrected_length(expected, self.firmware, declared);
        if length != declared {
            log::debug!(
                "Correcting declared reply length {declared} -> {length} for {expected:?} on firmware {}",
                self.firmware
            );
        }

        // The length field counts the two header bytes consumed above. The
        // correction has to happen before this read, otherwise the stream
        // desynchronizes for the next frame.
        let payload = self.read_mid_frame(usize::from(length).saturating_sub(codec::HEADER_LEN))?;
        log::trace!("Received {expected:?} payload: {payload:02x?}");
        Ok(payload)
    }

    // Reads everything after the opcode byte: a timeout here means the
    // adapter stopped mid-frame, not that it never answered.
    fn read_mid_frame(&mut self, count: usize) -> Result<Vec<u8>, Error> {
        self.buffer
            .read_exact(&mut self.port, count, self.timeout)
            .map_err(|e| match e {
                Error::Timeout => Error::TruncatedReply {
                    received: 0,
                    expected: count,
                },
                other => other,
            })
    }

    fn query(&mut self, command: Command) -> Result<Vec<u8>, Error> {
        self.device_write(command, &[])?;
        self.device_read(command)
    }
}
