//! Firmware-dependent corrections of the declared reply length.
//!
//! Some UGPlus firmware revisions report reply lengths that do not match the
//! number of bytes the adapter actually places on the wire. The deviations
//! were found empirically and look like out-of-bounds reads in the firmware.
//! They must be corrected *before* the payload is pulled from the transport,
//! otherwise the byte stream desynchronizes and every following frame is
//! misread.

use crate::protocol::{Command, FirmwareVersion};

/// How a declared reply length must be adjusted before it can be trusted.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LengthCorrection {
    /// The firmware sends this many more bytes than it declares.
    Add(u8),
    /// The firmware declares lengths below this floor for replies that are
    /// actually this long.
    AtLeast(u8),
}

/// A single firmware-specific length deviation.
#[derive(Copy, Clone, Debug)]
pub struct LengthQuirk {
    pub command: Command,
    pub firmware: FirmwareVersion,
    pub correction: LengthCorrection,
}

/// All known length deviations.
///
/// Firmware 1.0 appends one undeclared byte to GET_MANUFACTURER_ID and
/// DISCOVER_GPIB_DEVICES replies, and declares READ replies of 3 or 4 bytes
/// that are 5 bytes on the wire (3 means no instrument answered, 4 means the
/// instrument had nothing to say; the fifth byte repeats a byte of the
/// previous payload). Firmware 1.1 and later report correct lengths.
pub const LENGTH_QUIRKS: [LengthQuirk; 3] = [
    LengthQuirk {
        command: Command::GetManufacturerId,
        firmware: FirmwareVersion::V1_0,
        correction: LengthCorrection::Add(1),
    },
    LengthQuirk {
        command: Command::DiscoverGpibDevices,
        firmware: FirmwareVersion::V1_0,
        correction: LengthCorrection::Add(1),
    },
    LengthQuirk {
        command: Command::Read,
        firmware: FirmwareVersion::V1_0,
        correction: LengthCorrection::AtLeast(5),
    },
];

/// Returns the number of bytes actually on the wire for a reply to `command`
/// that declares `declared` bytes, given the adapter's firmware revision.
/// Passes `declared` through unchanged when no quirk applies.
pub fn corrected_length(command: Command, firmware: FirmwareVersion, declared: u8) -> u8 {
    for quirk in &LENGTH_QUIRKS {
        if quirk.command == command && quirk.firmware == firmware {
            return match quirk.correction {
                LengthCorrection::Add(extra) => declared.saturating_add(extra),
                LengthCorrection::AtLeast(floor) => declared.max(floor),
            };
        }
    }
    declared
}
