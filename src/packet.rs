//! USB MIDI Event Packets.
//!
//! A packet is four bytes: a header holding the cable number and the Code
//! Index Number (CIN), followed by the three bytes of the MIDI message.
//! See section 4 of the USB MIDI 1.0 class definition.

use heapless::Vec;

use crate::config::{MIDI_PACKET_SIZE, NOTE_OFF_VELOCITY, NOTE_ON_VELOCITY};

/// Packets produced for one key transition, Note Off first.
pub type EventPackets = Vec<UsbMidiEventPacket, 2>;

/// Bytes handed to the interrupt-IN endpoint in one submission.
pub type Frame = Vec<u8, MIDI_PACKET_SIZE>;

/// A MIDI note number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Note(u8);

impl Note {
    /// Wrap a note number, dropping the high bit like any 7-bit MIDI data byte.
    pub const fn new(number: u8) -> Self {
        Note(number & 0x7f)
    }

    pub const fn number(self) -> u8 {
        self.0
    }
}

impl From<Note> for u8 {
    fn from(note: Note) -> u8 {
        note.0
    }
}

/// Code Index Numbers this device produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CodeIndex {
    NoteOff = 0x8,
    NoteOn = 0x9,
}

impl CodeIndex {
    fn status(self) -> u8 {
        match self {
            CodeIndex::NoteOff => 0x80,
            CodeIndex::NoteOn => 0x90,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UsbMidiEventPacket {
    /// `cable << 4 | CIN`
    pub header: u8,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl UsbMidiEventPacket {
    pub const SIZE: usize = 4;

    /// Build a channel voice message on cable 0, channel 0.
    fn voice(cin: CodeIndex, note: Note, velocity: u8) -> Self {
        UsbMidiEventPacket {
            header: cin as u8,
            status: cin.status(),
            data1: note.number(),
            data2: velocity & 0x7f,
        }
    }

    pub fn note_on(note: Note) -> Self {
        Self::voice(CodeIndex::NoteOn, note, NOTE_ON_VELOCITY)
    }

    pub fn note_off(note: Note) -> Self {
        Self::voice(CodeIndex::NoteOff, note, NOTE_OFF_VELOCITY)
    }

    /// Virtual cable the packet travels on.
    pub fn cable(&self) -> u8 {
        self.header >> 4
    }

    /// Raw Code Index Number of the header.
    pub fn code_index(&self) -> u8 {
        self.header & 0x0f
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        [self.header, self.status, self.data1, self.data2]
    }

    /// Parse one packet; `None` unless exactly four bytes are given.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match *bytes {
            [header, status, data1, data2] => Some(UsbMidiEventPacket {
                header,
                status,
                data1,
                data2,
            }),
            _ => None,
        }
    }
}

/// Turn a key transition into event packets.
///
/// The released note is always switched off before the new one is switched
/// on, so a host never sees two notes sounding from this monophonic source.
/// Returns no packets when neither side holds a note.
pub fn build(previous: Option<Note>, current: Option<Note>) -> EventPackets {
    let mut packets = EventPackets::new();
    // capacity is two and at most two packets are pushed
    if let Some(note) = previous {
        let _ = packets.push(UsbMidiEventPacket::note_off(note));
    }
    if let Some(note) = current {
        let _ = packets.push(UsbMidiEventPacket::note_on(note));
    }
    packets
}

/// Concatenate packets into one endpoint payload.
pub fn frame(packets: &[UsbMidiEventPacket]) -> Option<Frame> {
    let mut out = Frame::new();
    for packet in packets {
        out.extend_from_slice(&packet.to_bytes()).ok()?;
    }
    Some(out)
}
