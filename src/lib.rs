//! Firmware core of a six-key monophonic USB MIDI keyboard.
//!
//! The keys are scanned in a cooperative loop; every change becomes a Note
//! Off and/or Note On event sent to the host over the interrupt-IN endpoint
//! of a class-compliant USB MIDI device.
//!
//! Everything except the `embedded` runtime glue builds on the host, so the
//! protocol logic is tested with plain `cargo test`. The firmware image is
//! `src/bin/midi_keys.rs`:
//!
//! ```text
//! DEFMT_LOG=info cargo rrb midi_keys
//! ```

#![cfg_attr(not(test), no_std)]

// must come first, the logging macros are textually scoped
mod fmt;

pub mod config;
pub mod descriptors;
mod error;
pub mod indicator;
pub mod keys;
pub mod packet;
pub mod protocol;
pub mod scheduler;
pub mod usb;

pub use error::Error;
pub use indicator::{Indicator, Indicators, NoIndicators};
pub use keys::{KeyPort, KeyState, KeyTracker, Transition};
pub use packet::{Note, UsbMidiEventPacket};
pub use protocol::{
    BusEngine, EndpointTransferState, MidiProtocol, SetupRequest, SetupResponse,
    UsbDeviceCallbacks, WriteStatus,
};
pub use scheduler::{DeviceState, MidiKeyboard, Watchdog};

// global logger + panicking-behavior
#[cfg(feature = "embedded")]
mod rt {
    use defmt_rtt as _;
    use panic_probe as _;

    // same panicking *behavior* as `panic-probe` but doesn't print a panic message
    // this prevents the panic message being printed *twice* when `defmt::panic` is invoked
    #[defmt::panic_handler]
    fn panic() -> ! {
        cortex_m::asm::udf()
    }
}
