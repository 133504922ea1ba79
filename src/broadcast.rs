//! Presence broadcast over the connectionless datagram layer (ESP-NOW).
//!
//! Once per interval the anchor sends a single byte, a rolling sequence
//! number, to the wildcard broadcast address. Listeners use the frames both
//! as a presence beacon and as a CSI source.
//!
//! Send failures are logged and dropped: there is no acknowledgment and no
//! retry within a tick. The next scheduled send is the retry.

use crate::identity::MacAddress;
use crate::radio::{Interface, RadioDriver, RadioError, RadioReady};
use log::{info, warn};
use std::time::Duration;

/// Default broadcast rate in sends per second.
pub const DEFAULT_SEND_FREQUENCY_HZ: u32 = 1;

/// Interval between sends for a frequency in Hz.
///
/// `frequency_hz` must be non-zero (see [`crate::config::AnchorConfig::validate`]).
pub fn send_interval(frequency_hz: u32) -> Duration {
    Duration::from_secs(1) / frequency_hz
}

/// Registered broadcast destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerEntry {
    /// Destination address.
    pub addr: MacAddress,
    /// Channel, always the radio's operating channel.
    pub channel: u8,
    /// Interface frames are sent from.
    pub iface: Interface,
    /// Whether frames are encrypted.
    pub encrypt: bool,
}

impl PeerEntry {
    /// The wildcard peer on the station interface, unencrypted.
    pub fn broadcast(ready: &RadioReady) -> Self {
        Self {
            addr: MacAddress::BROADCAST,
            channel: ready.channel(),
            iface: Interface::Sta,
            encrypt: false,
        }
    }
}

/// Rolling one-byte sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequenceCounter(u8);

impl SequenceCounter {
    pub fn new(initial: u8) -> Self {
        Self(initial)
    }

    /// Current value.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Advance by one, wrapping after 255.
    pub fn advance(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

/// Suspension point of the send loop.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Blocks the current thread (a FreeRTOS task delay on ESP-IDF).
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Result of one send attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The driver accepted the datagram.
    Sent { seq: u8 },
    /// The driver rejected the datagram.
    Failed { seq: u8, error: RadioError },
}

impl SendOutcome {
    /// Sequence number carried by the attempt.
    pub fn seq(&self) -> u8 {
        match self {
            Self::Sent { seq } | Self::Failed { seq, .. } => *seq,
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

/// The perpetual broadcast loop.
pub struct BroadcastMessenger<'d, D: RadioDriver> {
    driver: &'d D,
    peer: PeerEntry,
    counter: SequenceCounter,
    interval: Duration,
}

impl<'d, D: RadioDriver> BroadcastMessenger<'d, D> {
    /// Initialize the broadcast layer and register the wildcard peer.
    pub fn new(
        driver: &'d mut D,
        ready: &RadioReady,
        interval: Duration,
    ) -> Result<Self, RadioError> {
        let peer = PeerEntry::broadcast(ready);
        driver.init_broadcast()?;
        driver.add_peer(&peer)?;

        Ok(Self {
            driver,
            peer,
            counter: SequenceCounter::default(),
            interval,
        })
    }

    /// The registered peer.
    pub fn peer(&self) -> &PeerEntry {
        &self.peer
    }

    /// Sequence number the next attempt will carry.
    pub fn next_seq(&self) -> u8 {
        self.counter.value()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One send attempt without the trailing sleep.
    ///
    /// The counter advances whether or not the driver accepted the frame.
    pub fn tick(&mut self) -> SendOutcome {
        let seq = self.counter.value();
        let payload = [seq];

        let outcome = match self.driver.send(&self.peer.addr, &payload) {
            Ok(()) => {
                info!("send csi success (seq {})", seq);
                SendOutcome::Sent { seq }
            }
            Err(error) => {
                warn!("<{}> ESP-NOW send error (seq {})", error.name, seq);
                SendOutcome::Failed { seq, error }
            }
        };

        self.counter.advance();
        outcome
    }

    /// Run `iterations` send-and-sleep cycles.
    pub fn run_for<S: Sleeper>(&mut self, iterations: usize, sleeper: &mut S) -> Vec<SendOutcome> {
        let mut outcomes = Vec::with_capacity(iterations);
        for _ in 0..iterations {
            outcomes.push(self.tick());
            sleeper.sleep(self.interval);
        }
        outcomes
    }

    /// Send forever.
    pub fn run<S: Sleeper>(mut self, sleeper: &mut S) -> ! {
        loop {
            self.tick();
            sleeper.sleep(self.interval);
        }
    }
}
