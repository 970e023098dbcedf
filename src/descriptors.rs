//! Device and configuration descriptors for a USB MIDI 1.0 device.
//!
//! Both blobs are served verbatim from flash. The configuration exposes an
//! AudioControl interface with no functions, and a MIDIStreaming interface
//! with one embedded/external jack pair per direction and one interrupt
//! endpoint per direction.

use crate::config::*;

// Descriptor types
pub const DEVICE: u8 = 0x01;
pub const CONFIGURATION: u8 = 0x02;
pub const STRING: u8 = 0x03;
pub const INTERFACE: u8 = 0x04;
pub const ENDPOINT: u8 = 0x05;
pub const CS_INTERFACE: u8 = 0x24;
pub const CS_ENDPOINT: u8 = 0x25;

// USB Class
pub const AUDIO_CLASS: u8 = 0x01;

// USB Subclass
pub const AUDIO_CONTROL: u8 = 0x01;
pub const MIDI_STREAMING: u8 = 0x03;

// Class-specific subtypes
pub const AC_HEADER: u8 = 0x01;
pub const MS_HEADER: u8 = 0x01;
pub const MIDI_IN_JACK: u8 = 0x02;
pub const MIDI_OUT_JACK: u8 = 0x03;
pub const MS_GENERAL: u8 = 0x01;

// MIDI jack types
pub const EMBEDDED: u8 = 0x01;
pub const EXTERNAL: u8 = 0x02;

// Jack ids
const EMBEDDED_IN_JACK: u8 = 1;
const EXTERNAL_IN_JACK: u8 = 2;
const EMBEDDED_OUT_JACK: u8 = 3;
const EXTERNAL_OUT_JACK: u8 = 4;

const INTERRUPT: u8 = 0x03;

const BUS_POWERED: u8 = 0x80;
const SELF_POWERED: u8 = 0xc0;

pub const DEVICE_DESCRIPTOR_LEN: usize = 18;

/// Total of everything following the AC standard interface header.
const AC_TOTAL_LENGTH: u16 = 9;

/// Total of the class-specific MS descriptors, header included.
pub const MS_TOTAL_LENGTH: u16 = 65;

/// wTotalLength of the configuration descriptor.
pub const CONFIG_TOTAL_LENGTH: u16 = 101;

const fn lo(v: u16) -> u8 {
    (v & 0xff) as u8
}

const fn hi(v: u16) -> u8 {
    (v >> 8) as u8
}

pub static DEVICE_DESCRIPTOR: [u8; DEVICE_DESCRIPTOR_LEN] = [
    18,     // bLength
    DEVICE, // bDescriptorType
    0x10,
    0x01, // bcdUSB 1.10
    0x00, // bDeviceClass, defined at interface level
    0x00, // bDeviceSubClass
    0x00, // bDeviceProtocol
    CONTROL_PACKET_SIZE,
    lo(USB_VID),
    hi(USB_VID),
    lo(USB_PID),
    hi(USB_PID),
    lo(USB_DEVICE_VERSION),
    hi(USB_DEVICE_VERSION),
    1, // iManufacturer
    2, // iProduct
    0, // iSerialNumber
    1, // bNumConfigurations
];

// Sized by the declared total, so a descriptor added or dropped without
// updating CONFIG_TOTAL_LENGTH fails to compile.
pub static CONFIG_DESCRIPTOR: [u8; CONFIG_TOTAL_LENGTH as usize] = [
    // Configuration
    9,
    CONFIGURATION,
    lo(CONFIG_TOTAL_LENGTH),
    hi(CONFIG_TOTAL_LENGTH),
    2, // bNumInterfaces
    1, // bConfigurationValue
    0, // iConfiguration
    if USB_SELF_POWERED {
        SELF_POWERED
    } else {
        BUS_POWERED
    },
    USB_MAX_POWER_MA / 2, // 2 mA units
    // Standard AC interface
    9,
    INTERFACE,
    0, // bInterfaceNumber
    0, // bAlternateSetting
    0, // bNumEndpoints
    AUDIO_CLASS,
    AUDIO_CONTROL,
    0, // bInterfaceProtocol
    0, // iInterface
    // Class-specific AC header
    9,
    CS_INTERFACE,
    AC_HEADER,
    0x00,
    0x01, // bcdADC 1.00
    lo(AC_TOTAL_LENGTH),
    hi(AC_TOTAL_LENGTH),
    1, // bInCollection
    1, // baInterfaceNr(1)
    // Standard MS interface
    9,
    INTERFACE,
    1, // bInterfaceNumber
    0, // bAlternateSetting
    2, // bNumEndpoints
    AUDIO_CLASS,
    MIDI_STREAMING,
    0, // bInterfaceProtocol
    0, // iInterface
    // Class-specific MS header
    7,
    CS_INTERFACE,
    MS_HEADER,
    0x00,
    0x01, // bcdMSC 1.00
    lo(MS_TOTAL_LENGTH),
    hi(MS_TOTAL_LENGTH),
    // MIDI IN jack (embedded)
    6,
    CS_INTERFACE,
    MIDI_IN_JACK,
    EMBEDDED,
    EMBEDDED_IN_JACK,
    0, // iJack
    // MIDI IN jack (external)
    6,
    CS_INTERFACE,
    MIDI_IN_JACK,
    EXTERNAL,
    EXTERNAL_IN_JACK,
    0, // iJack
    // MIDI OUT jack (embedded), fed by the external IN jack
    9,
    CS_INTERFACE,
    MIDI_OUT_JACK,
    EMBEDDED,
    EMBEDDED_OUT_JACK,
    1, // bNrInputPins
    EXTERNAL_IN_JACK,
    1, // baSourcePin
    0, // iJack
    // MIDI OUT jack (external), fed by the embedded IN jack
    9,
    CS_INTERFACE,
    MIDI_OUT_JACK,
    EXTERNAL,
    EXTERNAL_OUT_JACK,
    1, // bNrInputPins
    EMBEDDED_IN_JACK,
    1, // baSourcePin
    0, // iJack
    // OUT endpoint
    9,
    ENDPOINT,
    MIDI_OUT_ENDPOINT,
    INTERRUPT,
    MIDI_PACKET_SIZE as u8,
    0,
    MIDI_POLL_INTERVAL_MS,
    0, // bRefresh
    0, // bSynchAddress
    // Class-specific MS OUT endpoint
    5,
    CS_ENDPOINT,
    MS_GENERAL,
    1, // bNumEmbMIDIJack
    EMBEDDED_IN_JACK,
    // IN endpoint
    9,
    ENDPOINT,
    MIDI_IN_ENDPOINT,
    INTERRUPT,
    MIDI_PACKET_SIZE as u8,
    0,
    MIDI_POLL_INTERVAL_MS,
    0, // bRefresh
    0, // bSynchAddress
    // Class-specific MS IN endpoint
    5,
    CS_ENDPOINT,
    MS_GENERAL,
    1, // bNumEmbMIDIJack
    EMBEDDED_OUT_JACK,
];

/// Look up a descriptor by the high byte of a GET_DESCRIPTOR `wValue`.
///
/// Anything that is not a device request gets the configuration descriptor.
pub fn descriptor_for(descriptor_type: u8) -> &'static [u8] {
    if descriptor_type == DEVICE {
        &DEVICE_DESCRIPTOR
    } else {
        &CONFIG_DESCRIPTOR
    }
}

/// Walk the descriptors packed into `blob`.
pub fn walk(blob: &[u8]) -> Descriptors<'_> {
    Descriptors { rest: blob }
}

/// Iterator over `(bDescriptorType, descriptor)` pairs of a packed blob.
///
/// Stops at the first descriptor whose `bLength` is zero or runs past the
/// end of the blob.
pub struct Descriptors<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Descriptors<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let len = *self.rest.first()? as usize;
        if len < 2 || len > self.rest.len() {
            self.rest = &[];
            return None;
        }
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Some((head[1], head))
    }
}
