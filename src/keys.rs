//! Monophonic key scanning and edge tracking.
//!
//! The keyboard is a row of momentary switches on one GPIO port, active
//! low. Only one key sounds at a time: when several are held, the lowest
//! input wins.

use crate::config::{KEY_COUNT, KEY_NOTES};
use crate::packet::Note;

/// Source of raw key levels, one bit per input, bit 0 first.
///
/// A cleared bit means the key is held.
pub trait KeyPort {
    fn read(&mut self) -> u8;
}

/// Map an active-low input mask to the note of the lowest held key.
pub fn note_for(levels: u8) -> Option<Note> {
    let held = !levels;
    (0..KEY_COUNT)
        .find(|bit| held & (1 << bit) != 0)
        .map(|bit| Note::new(KEY_NOTES[bit]))
}

pub struct KeyTracker<P> {
    port: P,
}

impl<P: KeyPort> KeyTracker<P> {
    pub fn new(port: P) -> Self {
        KeyTracker { port }
    }

    /// Read the port and return the held note, if any. No debouncing.
    pub fn sample(&mut self) -> Option<Note> {
        note_for(self.port.read())
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }
}

/// A change waiting to be reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transition {
    pub from: Option<Note>,
    pub to: Option<Note>,
}

/// Edge detection against the last key the host was told about.
///
/// `changed` is sticky: once set it stays set until [`KeyState::commit`],
/// while later samples keep overwriting `current`. A key that comes and goes
/// while the endpoint is busy is therefore folded into whatever is held when
/// the endpoint frees up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyState {
    pub last_reported: Option<Note>,
    pub current: Option<Note>,
    pub changed: bool,
}

impl KeyState {
    /// Record a fresh sample.
    pub fn observe(&mut self, sampled: Option<Note>) {
        self.current = sampled;
        if sampled != self.last_reported {
            self.changed = true;
        }
    }

    pub fn pending(&self) -> Option<Transition> {
        self.changed.then_some(Transition {
            from: self.last_reported,
            to: self.current,
        })
    }

    /// The pending transition reached the host.
    pub fn commit(&mut self) {
        self.last_reported = self.current;
        self.changed = false;
    }
}
