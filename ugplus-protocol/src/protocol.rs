use std::fmt::Display;

/// Commands understood by the UGPlus adapter.
///
/// Every request frame starts with one of these opcodes, and every reply frame
/// echoes the opcode of the command it answers. The adapter offers no request
/// IDs; the echoed opcode is the only means of correlating a reply with its
/// command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Command {
    GetFirmwareVersion = 0x00,
    GetSeries = 0x0E,
    Reset = 0x0F,
    Write = 0x32,
    Read = 0x33,
    DiscoverGpibDevices = 0x34,
    GetManufacturerId = 0xFE,
}

impl Command {
    /// The opcode byte placed on the wire for this command.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Classification of an observed reply opcode.
///
/// The adapter may answer with a byte that maps to no known command, for
/// example after the transport desynchronized mid-frame. Such bytes are kept
/// as [`ReplyTag::Unknown`] and compared by value instead of being rejected
/// outright.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReplyTag {
    Known(Command),
    Unknown(u8),
}

impl ReplyTag {
    /// Classifies a raw opcode byte read off the wire.
    pub fn classify(byte: u8) -> ReplyTag {
        match byte {
            0x00 => ReplyTag::Known(Command::GetFirmwareVersion),
            0x0E => ReplyTag::Known(Command::GetSeries),
            0x0F => ReplyTag::Known(Command::Reset),
            0x32 => ReplyTag::Known(Command::Write),
            0x33 => ReplyTag::Known(Command::Read),
            0x34 => ReplyTag::Known(Command::DiscoverGpibDevices),
            0xFE => ReplyTag::Known(Command::GetManufacturerId),
            other => ReplyTag::Unknown(other),
        }
    }

    /// Whether this tag answers `command`.
    pub fn answers(&self, command: Command) -> bool {
        *self == ReplyTag::Known(command)
    }
}

impl Display for ReplyTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplyTag::Known(command) => write!(f, "{:?} (0x{:02X})", command, command.code()),
            ReplyTag::Unknown(byte) => write!(f, "unknown opcode 0x{byte:02X}"),
        }
    }
}

#[test]
fn classify_round_trip() {
    for command in [
        Command::GetFirmwareVersion,
        Command::GetSeries,
        Command::Reset,
        Command::Write,
        Command::Read,
        Command::DiscoverGpibDevices,
        Command::GetManufacturerId,
    ] {
        assert_eq!(ReplyTag::classify(command.code()), ReplyTag::Known(command));
    }
    assert_eq!(ReplyTag::classify(0x42), ReplyTag::Unknown(0x42));
}

/// The firmware version of an adapter.
/// A version always consists of a major and a minor part.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareVersion {
    major: u8,
    minor: u8,
}

impl FirmwareVersion {
    /// Firmware 1.0, the only revision with known length quirks.
    pub const V1_0: FirmwareVersion = FirmwareVersion { major: 1, minor: 0 };

    /// Firmware 1.1
    pub const V1_1: FirmwareVersion = FirmwareVersion { major: 1, minor: 1 };

    /// Returns the latest known firmware revision
    pub fn latest() -> FirmwareVersion {
        FirmwareVersion::V1_1
    }

    pub const fn new(major: u8, minor: u8) -> FirmwareVersion {
        FirmwareVersion { major, minor }
    }

    /// The major part of the version
    pub fn major(&self) -> u8 {
        self.major
    }

    /// The minor part of the version
    pub fn minor(&self) -> u8 {
        self.minor
    }
}

#[test]
fn version_ordering() {
    assert!(FirmwareVersion::new(1, 0) < FirmwareVersion::new(1, 1));
    assert!(FirmwareVersion::new(2, 0) > FirmwareVersion::new(1, 1));
}

impl Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Separator placed between the GPIB address and the payload in WRITE and
/// READ request frames. Required by the adapter's frame format.
pub const ADDRESS_SEPARATOR: u8 = 0x0F;

/// Status byte of a READ reply marking that the addressed instrument did not
/// answer. Any other value means the read succeeded.
pub const STATUS_NO_LISTENER: u8 = 0x0A;
