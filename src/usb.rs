//! [`BusEngine`] on top of `usb-device`.
//!
//! `usb-device` consults classes before its own standard request handling,
//! so the class below answers GET_DESCRIPTOR for the device and configuration
//! descriptors with the fixed blobs from [`descriptors`](crate::descriptors)
//! and leaves everything else standard (addressing, configuration, strings)
//! to the stack. Class and vendor requests go to the callbacks.

use usb_device::class_prelude::*;
use usb_device::control::Request;
use usb_device::prelude::*;

use crate::config::*;
use crate::protocol::{
    BusEngine, RequestKind, SetupRequest, SetupResponse, UsbDeviceCallbacks, WriteStatus,
};
use crate::Error;

impl From<&Request> for SetupRequest {
    fn from(req: &Request) -> Self {
        SetupRequest {
            request_type: req.direction as u8 | (req.request_type as u8) << 5 | req.recipient as u8,
            request: req.request,
            value: req.value,
            index: req.index,
            length: req.length,
        }
    }
}

/// Endpoints of the MIDI function.
///
/// Allocated at the addresses the configuration descriptor names.
/// Alternate settings need no handling here, usb-device accepts alternate
/// setting 0 on every interface by itself.
pub struct MidiEndpoints<'a, B: UsbBus> {
    out_ep: EndpointOut<'a, B>,
    in_ep: EndpointIn<'a, B>,
    in_busy: bool,
}

impl<'a, B: UsbBus> MidiEndpoints<'a, B> {
    pub fn new(alloc: &'a UsbBusAllocator<B>) -> usb_device::Result<Self> {
        // interface numbers 0 (audio control) and 1 (MIDI streaming)
        let audio_if = alloc.interface();
        let midi_if = alloc.interface();
        trace!(
            "interfaces {=u8} and {=u8}",
            u8::from(audio_if),
            u8::from(midi_if)
        );

        Ok(MidiEndpoints {
            out_ep: alloc.alloc(
                Some(EndpointAddress::from(MIDI_OUT_ENDPOINT)),
                EndpointType::Interrupt,
                MIDI_PACKET_SIZE as u16,
                MIDI_POLL_INTERVAL_MS,
            )?,
            in_ep: alloc.alloc(
                Some(EndpointAddress::from(MIDI_IN_ENDPOINT)),
                EndpointType::Interrupt,
                MIDI_PACKET_SIZE as u16,
                MIDI_POLL_INTERVAL_MS,
            )?,
            in_busy: false,
        })
    }
}

/// Per-poll adapter from [`UsbClass`] events to [`UsbDeviceCallbacks`].
struct CallbackClass<'c, 'd, 'a, B: UsbBus> {
    endpoints: &'c mut MidiEndpoints<'a, B>,
    callbacks: &'c mut (dyn UsbDeviceCallbacks + 'd),
}

impl<B: UsbBus> UsbClass<B> for CallbackClass<'_, '_, '_, B> {
    fn reset(&mut self) {
        self.endpoints.in_busy = false;
    }

    fn control_in(&mut self, xfer: ControlIn<B>) {
        let setup = SetupRequest::from(xfer.request());

        if setup.is_descriptor_request() {
            let blob = self.callbacks.on_descriptor(&setup);
            let len = blob.len().min(setup.length as usize);
            if xfer.accept_with_static(&blob[..len]).is_err() {
                warn!("descriptor {=u8} not accepted", setup.descriptor_type());
            }
            return;
        }
        if setup.kind() == RequestKind::Standard {
            return;
        }

        match self.callbacks.on_setup(&setup) {
            SetupResponse::Deferred => {
                let mut buf = [0u8; CONTROL_PACKET_SIZE as usize];
                let n = self.callbacks.on_control_read(&mut buf);
                let len = n.min(setup.length as usize);
                if xfer.accept_with(&buf[..len]).is_err() {
                    warn!("control read not accepted");
                }
            }
            SetupResponse::Unhandled => {}
        }
    }

    fn control_out(&mut self, xfer: ControlOut<B>) {
        let setup = SetupRequest::from(xfer.request());
        if setup.kind() == RequestKind::Standard {
            return;
        }

        match self.callbacks.on_setup(&setup) {
            SetupResponse::Deferred => {
                let accepted = match self.callbacks.on_control_write(xfer.data()) {
                    WriteStatus::Complete => xfer.accept(),
                    WriteStatus::Stall => xfer.reject(),
                };
                if accepted.is_err() {
                    warn!("control write not acknowledged");
                }
            }
            SetupResponse::Unhandled => {}
        }
    }

    fn endpoint_out(&mut self, addr: EndpointAddress) {
        if addr != self.endpoints.out_ep.address() {
            return;
        }
        let mut buf = [0u8; MIDI_PACKET_SIZE];
        match self.endpoints.out_ep.read(&mut buf) {
            Ok(n) => self.callbacks.on_interrupt_out(&buf[..n]),
            Err(UsbError::WouldBlock) => {}
            Err(_) => warn!("MIDI OUT read failed"),
        }
    }

    fn endpoint_in_complete(&mut self, addr: EndpointAddress) {
        if addr == self.endpoints.in_ep.address() {
            self.endpoints.in_busy = false;
        }
    }
}

/// A configured `UsbDevice` plus the MIDI endpoints.
pub struct UsbDeviceEngine<'a, B: UsbBus> {
    device: UsbDevice<'a, B>,
    endpoints: MidiEndpoints<'a, B>,
}

impl<'a, B: UsbBus> UsbDeviceEngine<'a, B> {
    /// Allocate the MIDI function and build the device on `alloc`.
    pub fn new(alloc: &'a UsbBusAllocator<B>) -> usb_device::Result<Self> {
        let endpoints = MidiEndpoints::new(alloc)?;
        let device = UsbDeviceBuilder::new(alloc, UsbVidPid(USB_VID, USB_PID))
            .manufacturer(USB_MANUFACTURER)
            .product(USB_PRODUCT)
            .device_class(0)
            .device_release(USB_DEVICE_VERSION)
            .self_powered(USB_SELF_POWERED)
            .max_power(USB_MAX_POWER_MA as usize)
            .max_packet_size_0(CONTROL_PACKET_SIZE)
            .build();
        Ok(UsbDeviceEngine { device, endpoints })
    }

    pub fn state(&self) -> UsbDeviceState {
        self.device.state()
    }
}

impl<B: UsbBus> BusEngine for UsbDeviceEngine<'_, B> {
    fn poll(&mut self, callbacks: &mut dyn UsbDeviceCallbacks) {
        let mut class = CallbackClass {
            endpoints: &mut self.endpoints,
            callbacks,
        };
        while self.device.poll(&mut [&mut class]) {}
    }

    fn interrupt_in_ready(&self) -> bool {
        self.device.state() == UsbDeviceState::Configured && !self.endpoints.in_busy
    }

    fn set_interrupt(&mut self, frame: &[u8]) -> Result<(), Error> {
        self.endpoints.in_ep.write(frame)?;
        self.endpoints.in_busy = true;
        Ok(())
    }
}
