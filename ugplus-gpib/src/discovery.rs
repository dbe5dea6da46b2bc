//! USB device discovery for the UGPlus adapter.
//!
//! The adapter enumerates as a Microchip PIC18 controller with an
//! iSerialNumber of zero, so candidates cannot be told apart by USB
//! descriptors alone. Every attached device matching the vendor/product pair
//! and the vendor-specific interface signature is a candidate; which one is
//! the wanted adapter can only be decided by probing it over the protocol
//! (see [`UgPlusGpib::connect`](crate::UgPlusGpib::connect)).

use std::time::Duration;

use rusb::{Context, Device, DeviceHandle, Direction, TransferType, UsbContext};

use crate::{BulkPort, error::Error};

/// Microchip Technology's USB vendor id.
pub const VENDOR_ID: u16 = 0x04D8;

/// Product id assigned to the UGPlus.
pub const PRODUCT_ID: u16 = 0x000C;

// Class, subclass and protocol of the adapter's vendor-specific interface.
const VENDOR_SPECIFIC: u8 = 0xFF;

/// Timeout for draining stale bytes left behind by a previous session.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Returns all attached devices matching the UGPlus USB signature, in
/// enumeration order.
pub fn candidates(context: &Context) -> Result<Vec<Device<Context>>, Error> {
    let mut matches = Vec::new();
    for device in context.devices()?.iter() {
        let descriptor = match device.device_descriptor() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                log::debug!("Skipping device without a readable descriptor: {e}");
                continue;
            }
        };
        if descriptor.vendor_id() == VENDOR_ID
            && descriptor.product_id() == PRODUCT_ID
            && has_vendor_specific_interface(&device, descriptor.num_configurations())
        {
            log::debug!(
                "Candidate adapter on bus {:03} device {:03}",
                device.bus_number(),
                device.address()
            );
            matches.push(device);
        }
    }
    Ok(matches)
}

fn has_vendor_specific_interface(device: &Device<Context>, num_configurations: u8) -> bool {
    (0..num_configurations)
        .filter_map(|index| device.config_descriptor(index).ok())
        .any(|config| {
            config.interfaces().any(|interface| {
                interface.descriptors().any(|alternate| {
                    alternate.class_code() == VENDOR_SPECIFIC
                        && alternate.sub_class_code() == VENDOR_SPECIFIC
                        && alternate.protocol_code() == VENDOR_SPECIFIC
                })
            })
        })
}

/// An open UGPlus port: one claimed interface with one bulk IN and one bulk
/// OUT endpoint.
///
/// Dropping the port releases the interface; no protocol traffic is possible
/// afterwards.
pub struct UsbPort {
    handle: DeviceHandle<Context>,
    read_address: u8,
    write_address: u8,
    max_packet_size: usize,
}

/// Opens a candidate device and resolves its endpoints.
///
/// The configuration is only set when the device has none active, since
/// setting it again would reset the USB state. Stale bytes left in the IN
/// endpoint by a previous session are drained before the port is handed out.
pub fn open(device: &Device<Context>) -> Result<UsbPort, Error> {
    let mut handle = device.open()?;
    // Not supported on every platform; where it isn't, no kernel driver
    // binds to a vendor-specific interface either.
    let _ = handle.set_auto_detach_kernel_driver(true);
    if handle.active_configuration().unwrap_or(0) == 0 {
        handle.set_active_configuration(1)?;
    }

    let config = device.active_config_descriptor()?;
    let Some(interface) = config.interfaces().next() else {
        log::error!(
            "Candidate on bus {:03} device {:03} has no interface",
            device.bus_number(),
            device.address()
        );
        return Err(Error::Usb(rusb::Error::NotFound));
    };

    let mut read_endpoint = None;
    let mut write_endpoint = None;
    for alternate in interface.descriptors() {
        for endpoint in alternate.endpoint_descriptors() {
            if endpoint.transfer_type() != TransferType::Bulk {
                continue;
            }
            match endpoint.direction() {
                Direction::In if read_endpoint.is_none() => {
                    read_endpoint =
                        Some((endpoint.address(), usize::from(endpoint.max_packet_size())));
                }
                Direction::Out if write_endpoint.is_none() => {
                    write_endpoint = Some(endpoint.address());
                }
                _ => {}
            }
        }
    }
    let (Some((read_address, max_packet_size)), Some(write_address)) =
        (read_endpoint, write_endpoint)
    else {
        log::error!(
            "Candidate on bus {:03} device {:03} has no bulk endpoint pair",
            device.bus_number(),
            device.address()
        );
        return Err(Error::Usb(rusb::Error::NotFound));
    };

    handle.claim_interface(interface.number())?;

    let mut port = UsbPort {
        handle,
        read_address,
        write_address,
        max_packet_size,
    };
    port.drain()?;
    Ok(port)
}

impl UsbPort {
    // Discards whatever a previous session left in the IN endpoint, so the
    // first reply frame starts on a clean stream.
    fn drain(&mut self) -> Result<(), Error> {
        let mut scratch = vec![0u8; self.max_packet_size];
        loop {
            match self
                .handle
                .read_bulk(self.read_address, &mut scratch, DRAIN_TIMEOUT)
            {
                Ok(0) | Err(rusb::Error::Timeout) => return Ok(()),
                Ok(received) => log::debug!("Drained {received} stale bytes"),
                Err(other) => return Err(Error::Usb(other)),
            }
        }
    }
}

impl BulkPort for UsbPort {
    fn max_chunk_size(&self) -> usize {
        self.max_packet_size
    }

    fn read_chunk(&mut self, buf: &mut [u8], timeout: Duration) -> rusb::Result<usize> {
        self.handle.read_bulk(self.read_address, buf, timeout)
    }

    fn write_all(&mut self, bytes: &[u8], timeout: Duration) -> rusb::Result<()> {
        let written = self.handle.write_bulk(self.write_address, bytes, timeout)?;
        if written != bytes.len() {
            log::error!(
                "Short bulk write: {written} of {} bytes transferred",
                bytes.len()
            );
            return Err(rusb::Error::Io);
        }
        Ok(())
    }
}
