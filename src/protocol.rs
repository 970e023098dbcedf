//! Device side of the USB MIDI protocol.
//!
//! The bus engine owns the wire. It hands control traffic and host MIDI data
//! to a [`UsbDeviceCallbacks`] implementation and accepts frames for the
//! interrupt-IN endpoint through [`BusEngine`]. [`MidiProtocol`] is the
//! callback side for this keyboard.

use crate::config::{CONTROL_READ_LEN, MIDI_PACKET_SIZE};
use crate::descriptors;
use crate::indicator::{Indicator, Indicators};
use crate::packet::{self, UsbMidiEventPacket};
use crate::Error;

/// Standard GET_DESCRIPTOR request code.
pub const GET_DESCRIPTOR: u8 = 0x06;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    HostToDevice,
    DeviceToHost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestKind {
    Standard,
    Class,
    Vendor,
    Reserved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Recipient {
    Device,
    Interface,
    Endpoint,
    Other,
    Reserved,
}

/// An 8-byte SETUP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetupRequest {
    /// bmRequestType
    pub request_type: u8,
    /// bRequest
    pub request: u8,
    /// wValue
    pub value: u16,
    /// wIndex
    pub index: u16,
    /// wLength
    pub length: u16,
}

impl SetupRequest {
    pub const SIZE: usize = 8;

    pub fn from_bytes(data: &[u8; Self::SIZE]) -> Self {
        SetupRequest {
            request_type: data[0],
            request: data[1],
            value: u16::from_le_bytes([data[2], data[3]]),
            index: u16::from_le_bytes([data[4], data[5]]),
            length: u16::from_le_bytes([data[6], data[7]]),
        }
    }

    pub fn direction(&self) -> Direction {
        if self.request_type & 0x80 == 0 {
            Direction::HostToDevice
        } else {
            Direction::DeviceToHost
        }
    }

    pub fn kind(&self) -> RequestKind {
        match (self.request_type >> 5) & 0x03 {
            0 => RequestKind::Standard,
            1 => RequestKind::Class,
            2 => RequestKind::Vendor,
            _ => RequestKind::Reserved,
        }
    }

    pub fn recipient(&self) -> Recipient {
        match self.request_type & 0x1f {
            0 => Recipient::Device,
            1 => Recipient::Interface,
            2 => Recipient::Endpoint,
            3 => Recipient::Other,
            _ => Recipient::Reserved,
        }
    }

    /// Descriptor type of a GET_DESCRIPTOR request, the high byte of wValue.
    pub fn descriptor_type(&self) -> u8 {
        (self.value >> 8) as u8
    }

    /// GET_DESCRIPTOR for the device or configuration descriptor.
    pub fn is_descriptor_request(&self) -> bool {
        self.kind() == RequestKind::Standard
            && self.request == GET_DESCRIPTOR
            && matches!(
                self.descriptor_type(),
                descriptors::DEVICE | descriptors::CONFIGURATION
            )
    }
}

/// Answer to a SETUP packet.
///
/// [`MidiProtocol`] defers everything. `Unhandled` and [`WriteStatus::Stall`]
/// are part of the engine contract for callback sets that refuse requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetupResponse {
    /// The data stage goes through `on_control_read` / `on_control_write`.
    Deferred,
    /// Not handled; the engine applies its own default, which stalls class
    /// and vendor requests.
    Unhandled,
}

/// Outcome of one control write chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteStatus {
    /// Consumed, no more chunks expected.
    Complete,
    /// Refused; the engine stalls the data stage.
    Stall,
}

/// Callbacks the bus engine invokes while polling.
///
/// Called from inside [`BusEngine::poll`], on the same thread of control as
/// the main loop. Implementations must not block.
pub trait UsbDeviceCallbacks {
    /// Class and vendor SETUP packets.
    fn on_setup(&mut self, request: &SetupRequest) -> SetupResponse;

    /// Standard GET_DESCRIPTOR for the device or configuration descriptor.
    fn on_descriptor(&mut self, request: &SetupRequest) -> &'static [u8];

    /// Fill `buf` with the data stage of a device-to-host request.
    fn on_control_read(&mut self, buf: &mut [u8]) -> usize;

    /// One chunk of the data stage of a host-to-device request.
    fn on_control_write(&mut self, data: &[u8]) -> WriteStatus;

    /// MIDI event packets from the host.
    fn on_interrupt_out(&mut self, data: &[u8]);
}

/// The external USB device controller.
pub trait BusEngine {
    /// Service pending bus activity, dispatching into `callbacks`.
    fn poll(&mut self, callbacks: &mut dyn UsbDeviceCallbacks);

    /// Whether the interrupt-IN endpoint can take another frame.
    fn interrupt_in_ready(&self) -> bool;

    /// Queue `frame` on the interrupt-IN endpoint.
    fn set_interrupt(&mut self, frame: &[u8]) -> Result<(), Error>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EndpointTransferState {
    /// The interrupt-IN endpoint can accept a submission.
    pub in_ready: bool,
    /// An empty frame has to terminate the current transfer.
    ///
    /// Set by a host-to-device class request. Every reported transition
    /// re-derives it: true when the submission exactly filled the endpoint,
    /// false when nothing had to be sent. Tracked only; nothing sends the
    /// frame.
    pub pending_empty_frame: bool,
}

/// Callback side of the MIDI keyboard.
///
/// Borrows the transfer state and indicators for the span of one engine poll.
pub struct MidiProtocol<'s, L> {
    transfer: &'s mut EndpointTransferState,
    indicators: &'s mut L,
}

impl<'s, L: Indicators> MidiProtocol<'s, L> {
    pub fn new(transfer: &'s mut EndpointTransferState, indicators: &'s mut L) -> Self {
        MidiProtocol {
            transfer,
            indicators,
        }
    }
}

impl<L: Indicators> UsbDeviceCallbacks for MidiProtocol<'_, L> {
    fn on_setup(&mut self, request: &SetupRequest) -> SetupResponse {
        self.indicators.toggle(Indicator::Setup);
        debug!(
            "setup: type {=u8:#x} request {=u8:#x} value {=u16:#x} length {=u16}",
            request.request_type,
            request.request,
            request.value,
            request.length
        );

        if request.kind() == RequestKind::Class && request.direction() == Direction::HostToDevice
        {
            // the OUT transfer may end early; be ready to close it
            self.transfer.pending_empty_frame = true;
        }

        SetupResponse::Deferred
    }

    fn on_descriptor(&mut self, request: &SetupRequest) -> &'static [u8] {
        trace!("descriptor: type {=u8}", request.descriptor_type());
        descriptors::descriptor_for(request.descriptor_type())
    }

    fn on_control_read(&mut self, buf: &mut [u8]) -> usize {
        self.indicators.toggle(Indicator::ControlRead);
        let len = CONTROL_READ_LEN.min(buf.len());
        buf[..len].fill(0);
        len
    }

    fn on_control_write(&mut self, data: &[u8]) -> WriteStatus {
        self.indicators.toggle(Indicator::ControlWrite);
        trace!("control write: {=usize} bytes dropped", data.len());
        WriteStatus::Complete
    }

    fn on_interrupt_out(&mut self, data: &[u8]) {
        self.indicators.toggle(Indicator::MidiOut);
        for chunk in data.chunks(UsbMidiEventPacket::SIZE) {
            match UsbMidiEventPacket::from_bytes(chunk) {
                Some(packet) => trace!("host MIDI ignored: {}", packet),
                None => trace!("short MIDI packet ignored"),
            }
        }
    }
}

/// Whether a new frame may be submitted on the interrupt-IN endpoint.
pub fn is_interrupt_in_ready<E: BusEngine>(engine: &E) -> bool {
    engine.interrupt_in_ready()
}

/// Send `packets` as one interrupt-IN frame, returning the bytes queued.
///
/// Callers check [`is_interrupt_in_ready`] first. A busy endpoint is
/// reported as [`Error::EndpointBusy`] and nothing is queued.
pub fn submit_interrupt_in<E: BusEngine>(
    engine: &mut E,
    transfer: &mut EndpointTransferState,
    packets: &[UsbMidiEventPacket],
) -> Result<usize, Error> {
    if !engine.interrupt_in_ready() {
        return Err(Error::EndpointBusy);
    }
    let frame = packet::frame(packets).ok_or(Error::FrameTooLarge)?;
    engine.set_interrupt(&frame)?;

    transfer.in_ready = false;
    transfer.pending_empty_frame = frame.len() == MIDI_PACKET_SIZE;
    Ok(frame.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::NoIndicators;
    use crate::packet::Note;

    #[derive(Default)]
    struct Leds([u8; Indicator::COUNT]);

    impl Indicators for Leds {
        fn toggle(&mut self, indicator: Indicator) {
            self.0[indicator.index()] += 1;
        }
    }

    struct Engine {
        ready: bool,
        sent: heapless::Vec<u8, 8>,
    }

    impl BusEngine for Engine {
        fn poll(&mut self, _callbacks: &mut dyn UsbDeviceCallbacks) {}

        fn interrupt_in_ready(&self) -> bool {
            self.ready
        }

        fn set_interrupt(&mut self, frame: &[u8]) -> Result<(), Error> {
            self.sent = heapless::Vec::from_slice(frame).map_err(|_| Error::FrameTooLarge)?;
            self.ready = false;
            Ok(())
        }
    }

    fn setup(bytes: [u8; 8]) -> SetupRequest {
        SetupRequest::from_bytes(&bytes)
    }

    #[test]
    fn setup_fields_decode_little_endian() {
        let req = setup([0x80, 0x06, 0x00, 0x02, 0x00, 0x00, 0xff, 0x00]);
        assert_eq!(req.direction(), Direction::DeviceToHost);
        assert_eq!(req.kind(), RequestKind::Standard);
        assert_eq!(req.recipient(), Recipient::Device);
        assert_eq!(req.descriptor_type(), descriptors::CONFIGURATION);
        assert_eq!(req.length, 255);
        assert!(req.is_descriptor_request());

        let string = setup([0x80, 0x06, 0x01, 0x03, 0x09, 0x04, 0xff, 0x00]);
        assert!(!string.is_descriptor_request());

        let class = setup([0x21, 0x0a, 0, 0, 1, 0, 0, 0]);
        assert_eq!(class.kind(), RequestKind::Class);
        assert_eq!(class.recipient(), Recipient::Interface);
        assert_eq!(class.direction(), Direction::HostToDevice);
        assert_eq!(class.index, 1);
    }

    #[test]
    fn class_out_request_requires_empty_frame() {
        let mut transfer = EndpointTransferState::default();
        let mut leds = Leds::default();
        let mut handler = MidiProtocol::new(&mut transfer, &mut leds);

        let response = handler.on_setup(&setup([0x21, 0x0a, 0, 0, 1, 0, 0, 0]));
        assert_eq!(response, SetupResponse::Deferred);
        assert!(transfer.pending_empty_frame);
        assert_eq!(leds.0[Indicator::Setup.index()], 1);
    }

    #[test]
    fn other_requests_leave_empty_frame_alone() {
        let mut transfer = EndpointTransferState::default();
        let mut leds = NoIndicators;
        let mut handler = MidiProtocol::new(&mut transfer, &mut leds);

        // class IN, vendor OUT, vendor IN
        for request_type in [0xa1, 0x41, 0xc0] {
            let response = handler.on_setup(&setup([request_type, 0x01, 0, 0, 0, 0, 0, 0]));
            assert_eq!(response, SetupResponse::Deferred);
        }
        assert!(!transfer.pending_empty_frame);
    }

    #[test]
    fn control_read_returns_seven_zero_bytes() {
        let mut transfer = EndpointTransferState::default();
        let mut leds = Leds::default();
        let mut handler = MidiProtocol::new(&mut transfer, &mut leds);

        let mut buf = [0xaa; 8];
        assert_eq!(handler.on_control_read(&mut buf), 7);
        assert_eq!(buf, [0, 0, 0, 0, 0, 0, 0, 0xaa]);

        let mut short = [0xaa; 3];
        assert_eq!(handler.on_control_read(&mut short), 3);
        assert_eq!(short, [0; 3]);
        assert_eq!(leds.0[Indicator::ControlRead.index()], 2);
    }

    #[test]
    fn writes_and_host_midi_are_consumed() {
        let mut transfer = EndpointTransferState::default();
        let mut leds = Leds::default();
        let mut handler = MidiProtocol::new(&mut transfer, &mut leds);

        assert_eq!(handler.on_control_write(&[1, 2, 3]), WriteStatus::Complete);
        assert_eq!(handler.on_control_write(&[]), WriteStatus::Complete);
        handler.on_interrupt_out(&[0x09, 0x90, 60, 0x40, 0x08]);
        assert_eq!(leds.0[Indicator::ControlWrite.index()], 2);
        assert_eq!(leds.0[Indicator::MidiOut.index()], 1);
        assert_eq!(transfer, EndpointTransferState::default());
    }

    #[test]
    fn descriptor_lookup_follows_wvalue_high_byte() {
        let mut transfer = EndpointTransferState::default();
        let mut leds = NoIndicators;
        let mut handler = MidiProtocol::new(&mut transfer, &mut leds);

        let device = handler.on_descriptor(&setup([0x80, 0x06, 0, 1, 0, 0, 18, 0]));
        assert_eq!(device, &descriptors::DEVICE_DESCRIPTOR[..]);
        let config = handler.on_descriptor(&setup([0x80, 0x06, 0, 2, 0, 0, 101, 0]));
        assert_eq!(config.len(), 101);
    }

    #[test]
    fn submit_refuses_busy_endpoint() {
        let mut engine = Engine {
            ready: false,
            sent: heapless::Vec::new(),
        };
        let mut transfer = EndpointTransferState::default();
        let packets = packet::build(None, Some(Note::new(60)));

        assert!(!is_interrupt_in_ready(&engine));
        assert_eq!(
            submit_interrupt_in(&mut engine, &mut transfer, &packets),
            Err(Error::EndpointBusy)
        );
        assert!(engine.sent.is_empty());
    }

    #[test]
    fn full_frame_requires_empty_frame() {
        let mut engine = Engine {
            ready: true,
            sent: heapless::Vec::new(),
        };
        let mut transfer = EndpointTransferState {
            in_ready: true,
            pending_empty_frame: false,
        };

        let both = packet::build(Some(Note::new(60)), Some(Note::new(62)));
        assert_eq!(submit_interrupt_in(&mut engine, &mut transfer, &both), Ok(8));
        assert!(transfer.pending_empty_frame);
        assert!(!transfer.in_ready);
        assert_eq!(&engine.sent[..], &[0x08, 0x80, 60, 0, 0x09, 0x90, 62, 0x7f]);

        engine.ready = true;
        let one = packet::build(None, Some(Note::new(64)));
        assert_eq!(submit_interrupt_in(&mut engine, &mut transfer, &one), Ok(4));
        assert!(!transfer.pending_empty_frame);
    }
}
