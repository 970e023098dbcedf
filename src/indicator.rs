//! Diagnostic LEDs.
//!
//! Each protocol event flips one LED so bus traffic can be watched on the
//! bench. They carry no protocol meaning.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Indicator {
    Setup = 0,
    ControlRead = 1,
    ControlWrite = 2,
    MidiOut = 3,
    KeyEvent = 4,
}

impl Indicator {
    pub const COUNT: usize = 5;

    pub fn index(self) -> usize {
        self as usize
    }
}

pub trait Indicators {
    fn toggle(&mut self, indicator: Indicator);
}

/// For boards without LEDs.
pub struct NoIndicators;

impl Indicators for NoIndicators {
    fn toggle(&mut self, _indicator: Indicator) {}
}
