//! Build-time configuration.
//!
//! The device has no runtime settings. USB identity, endpoint layout, pin
//! assignments and timing all live here.

// USB identity

/// Shared obdev VID/PID pair for MIDI class devices.
pub const USB_VID: u16 = 0x16c0;
pub const USB_PID: u16 = 0x05e4;

/// bcdDevice, 1.00.
pub const USB_DEVICE_VERSION: u16 = 0x0100;

/// String descriptors, served by the USB stack at indices 1 and 2.
pub const USB_MANUFACTURER: &str = "f103-midikeys";
pub const USB_PRODUCT: &str = "MIDI Keys";

/// Bus current draw, in mA.
pub const USB_MAX_POWER_MA: u8 = 100;

/// Bus powered. Flip to advertise self power in the configuration descriptor.
pub const USB_SELF_POWERED: bool = false;

// Endpoints

/// Control endpoint packet size.
pub const CONTROL_PACKET_SIZE: u8 = 8;

/// Packet size of both MIDI data endpoints. Two event packets fill it.
pub const MIDI_PACKET_SIZE: usize = 8;

/// Interrupt endpoint polling interval (ms).
pub const MIDI_POLL_INTERVAL_MS: u8 = 10;

/// Host to device MIDI data endpoint.
pub const MIDI_OUT_ENDPOINT: u8 = 0x01;

/// Device to host MIDI data endpoint.
pub const MIDI_IN_ENDPOINT: u8 = 0x81;

/// Payload returned by the inert control read responder.
pub const CONTROL_READ_LEN: usize = 7;

// Keys
//
//   Key 0 -> PA0 -> C4 (60)
//   Key 1 -> PA1 -> D4 (62)
//   Key 2 -> PA2 -> E4 (64)
//   Key 3 -> PA3 -> F4 (65)
//   Key 4 -> PA4 -> G4 (67)
//   Key 5 -> PA5 -> A4 (69)
//
// All inputs are active low with internal pull-ups.

/// Number of scanned key inputs.
pub const KEY_COUNT: usize = 6;

/// Note number per key bit, lowest bit first.
pub const KEY_NOTES: [u8; KEY_COUNT] = [60, 62, 64, 65, 67, 69];

/// Velocity sent with every Note On.
pub const NOTE_ON_VELOCITY: u8 = 0x7f;

/// Velocity sent with every Note Off.
pub const NOTE_OFF_VELOCITY: u8 = 0x00;

// Indicators
//
//   PB10 setup, PB11 control read, PB12 control write, PB13 MIDI out,
//   PB14 key event. PB15 is reserved.

// Timing

/// Independent watchdog period (ms). A stalled main loop resets the MCU.
pub const WATCHDOG_TIMEOUT_MS: u32 = 1_000;

/// System clock (Hz), required for the USB peripheral.
pub const SYSCLK_HZ: u32 = 48_000_000;
