//! The cooperative main loop.
//!
//! Every pass: feed the watchdog, let the bus engine run (which may call back
//! into [`MidiProtocol`]), sample the keys, and report a pending transition
//! when the interrupt-IN endpoint is free. Nothing here blocks.

use crate::indicator::{Indicator, Indicators};
use crate::keys::{KeyPort, KeyState, KeyTracker};
use crate::packet;
use crate::protocol::{self, BusEngine, EndpointTransferState, MidiProtocol};
use crate::Error;

/// Hardware reset timer. Must be fed more often than its period.
pub trait Watchdog {
    fn feed(&mut self);
}

/// All mutable device state, owned by the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceState {
    pub keys: KeyState,
    pub transfer: EndpointTransferState,
}

pub struct MidiKeyboard<E, P, W, L> {
    engine: E,
    keys: KeyTracker<P>,
    watchdog: W,
    indicators: L,
    state: DeviceState,
}

impl<E, P, W, L> MidiKeyboard<E, P, W, L>
where
    E: BusEngine,
    P: KeyPort,
    W: Watchdog,
    L: Indicators,
{
    pub fn new(engine: E, keys: P, watchdog: W, indicators: L) -> Self {
        MidiKeyboard {
            engine,
            keys: KeyTracker::new(keys),
            watchdog,
            indicators,
            state: DeviceState::default(),
        }
    }

    /// One loop iteration. Returns the number of bytes submitted.
    ///
    /// The reported key only advances once its packets were accepted by the
    /// engine; on error the transition is retried on the next call.
    pub fn poll(&mut self) -> Result<usize, Error> {
        self.watchdog.feed();

        self.engine.poll(&mut MidiProtocol::new(
            &mut self.state.transfer,
            &mut self.indicators,
        ));

        let sampled = self.keys.sample();
        self.state.keys.observe(sampled);

        self.state.transfer.in_ready = protocol::is_interrupt_in_ready(&self.engine);
        if !self.state.transfer.in_ready {
            return Ok(0);
        }
        let Some(transition) = self.state.keys.pending() else {
            return Ok(0);
        };

        let packets = packet::build(transition.from, transition.to);
        if packets.is_empty() {
            // back at the reported key, an empty report
            self.state.transfer.pending_empty_frame = false;
            self.state.keys.commit();
            return Ok(0);
        }

        self.indicators.toggle(Indicator::KeyEvent);
        let sent =
            protocol::submit_interrupt_in(&mut self.engine, &mut self.state.transfer, &packets)?;
        debug!("sent {=usize} bytes for {}", sent, transition);
        self.state.keys.commit();
        Ok(sent)
    }

    /// Run forever. Only a watchdog reset ends this.
    pub fn run(&mut self) -> ! {
        info!("main loop started");
        loop {
            if let Err(e) = self.poll() {
                warn!("key event deferred: {}", e);
            }
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn keys_mut(&mut self) -> &mut P {
        self.keys.port_mut()
    }
}
