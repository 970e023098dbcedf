//! Error type shared by the protocol handler and the main loop.
//!
//! All variants are fieldless so the enum stays `Copy` and cheap to log.

use usb_device::UsbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The interrupt-IN endpoint still holds a frame the host has not fetched.
    EndpointBusy,

    /// The frame does not fit into one interrupt-IN packet.
    FrameTooLarge,

    /// The USB stack reported any other failure.
    Usb,
}

impl From<UsbError> for Error {
    fn from(e: UsbError) -> Self {
        match e {
            UsbError::WouldBlock => Error::EndpointBusy,
            UsbError::BufferOverflow => Error::FrameTooLarge,
            _ => Error::Usb,
        }
    }
}
