//! Station connection state machine.
//!
//! The driver delivers station events from its own event task. The monitor
//! only touches its own atomics and the reconnect call, so the broadcast loop
//! never has to synchronize with it.
//!
//! ```text
//!                 Connected
//!  Disconnected ─────────────► Connected
//!       ▲                          │
//!       └──────────────────────────┘
//!        Disconnected (+ one reconnect request if enabled)
//! ```

use crate::identity::MacAddress;
use crate::radio::StationControl;
use log::{debug, info, warn};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether the station role is associated with an upstream network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// A station event delivered by the radio driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The station associated with an access point.
    Connected {
        ssid: String,
        bssid: MacAddress,
        channel: u8,
    },
    /// The station lost (or failed) its association.
    Disconnected {
        /// IEEE 802.11 reason code.
        reason: u16,
    },
}

impl ConnectionEvent {
    /// Build a connected event from raw driver fields.
    ///
    /// The driver hands over the SSID as bytes; anything that is not valid
    /// UTF-8 is replaced rather than rejected.
    pub fn connected(ssid: &[u8], bssid: [u8; 6], channel: u8) -> Self {
        Self::Connected {
            ssid: String::from_utf8_lossy(ssid).into_owned(),
            bssid: MacAddress::new(bssid),
            channel,
        }
    }
}

/// Tracks the station connection and drives reconnect attempts.
///
/// Reconnects are requested only in response to a disconnect event, at most
/// once per event. There is no timer-based retry.
#[derive(Debug)]
pub struct ConnectionMonitor {
    connected: AtomicBool,
    reconnect: AtomicBool,
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMonitor {
    /// Start in [`ConnectionState::Disconnected`] with reconnect enabled.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            reconnect: AtomicBool::new(true),
        }
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        if self.connected.load(Ordering::Acquire) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Whether a disconnect triggers a reconnect request.
    pub fn reconnect_enabled(&self) -> bool {
        self.reconnect.load(Ordering::Acquire)
    }

    /// Enable or disable reconnect-on-disconnect.
    pub fn set_reconnect(&self, enabled: bool) {
        self.reconnect.store(enabled, Ordering::Release);
    }

    /// Apply one event.
    ///
    /// Never fails: a rejected reconnect request is logged and the next
    /// disconnect event will try again.
    pub fn handle_event(&self, event: &ConnectionEvent, station: &dyn StationControl) {
        match event {
            ConnectionEvent::Connected {
                ssid,
                bssid,
                channel,
            } => {
                info!(
                    "Connected to {} (BSSID: {}, Channel: {})",
                    ssid, bssid, channel
                );
                self.connected.store(true, Ordering::Release);
            }
            ConnectionEvent::Disconnected { reason } => {
                if self.reconnect_enabled() {
                    info!("sta disconnect (reason {}), reconnecting...", reason);
                    if let Err(e) = station.reconnect() {
                        warn!("Reconnect request rejected: {}", e);
                    }
                } else {
                    info!("sta disconnect (reason {})", reason);
                }
                self.connected.store(false, Ordering::Release);
            }
        }
        debug!("Station {}", self.state());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::{RadioError, RadioStep};
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingStation {
        calls: AtomicUsize,
        fail: bool,
    }

    impl StationControl for CountingStation {
        fn reconnect(&self) -> Result<(), RadioError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(RadioError::new(RadioStep::Reconnect, 0x3001, "ESP_ERR_WIFI_NOT_INIT"))
            } else {
                Ok(())
            }
        }
    }

    fn connected() -> ConnectionEvent {
        ConnectionEvent::Connected {
            ssid: "upstream".to_string(),
            bssid: MacAddress::new([0x24, 0x0A, 0xC4, 0x00, 0x00, 0x01]),
            channel: 11,
        }
    }

    fn disconnected() -> ConnectionEvent {
        ConnectionEvent::Disconnected { reason: 8 }
    }

    #[test]
    fn test_connected_from_driver_fields() {
        let event = ConnectionEvent::connected(b"upstream", [0x24, 0x0A, 0xC4, 0x00, 0x00, 0x01], 11);
        assert_eq!(event, connected());

        // Raw SSIDs are arbitrary octets.
        let event = ConnectionEvent::connected(&[b'a', 0xFF, b'b'], [0; 6], 6);
        assert!(matches!(
            event,
            ConnectionEvent::Connected { ref ssid, channel: 6, .. } if ssid == "a\u{FFFD}b"
        ));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
        assert_eq!(ConnectionState::Disconnected.to_string(), "disconnected");
    }

    #[test]
    fn test_initial_state() {
        let monitor = ConnectionMonitor::new();
        assert_eq!(monitor.state(), ConnectionState::Disconnected);
        assert!(monitor.reconnect_enabled());
    }

    #[test]
    fn test_connect_then_disconnect_with_reconnect() {
        let monitor = ConnectionMonitor::new();
        let station = CountingStation::default();

        monitor.handle_event(&connected(), &station);
        assert_eq!(monitor.state(), ConnectionState::Connected);
        assert_eq!(station.calls.load(Ordering::SeqCst), 0);

        monitor.handle_event(&disconnected(), &station);
        assert_eq!(monitor.state(), ConnectionState::Disconnected);
        assert_eq!(station.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disconnect_without_reconnect() {
        let monitor = ConnectionMonitor::new();
        monitor.set_reconnect(false);
        let station = CountingStation::default();

        monitor.handle_event(&connected(), &station);
        monitor.handle_event(&disconnected(), &station);
        assert_eq!(monitor.state(), ConnectionState::Disconnected);
        assert_eq!(station.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_one_reconnect_per_disconnect_event() {
        let monitor = ConnectionMonitor::new();
        let station = CountingStation::default();

        for _ in 0..3 {
            monitor.handle_event(&disconnected(), &station);
        }
        assert_eq!(station.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failed_reconnect_is_absorbed() {
        let monitor = ConnectionMonitor::new();
        let station = CountingStation {
            fail: true,
            ..Default::default()
        };

        monitor.handle_event(&connected(), &station);
        monitor.handle_event(&disconnected(), &station);
        assert_eq!(monitor.state(), ConnectionState::Disconnected);
        assert_eq!(station.calls.load(Ordering::SeqCst), 1);
    }
}
