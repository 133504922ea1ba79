//! WiFi radio parameters, driver seam and bring-up.
//!
//! This module contains:
//! - Fixed radio parameters ([`RadioConfig`], [`Bandwidth`], [`SecondaryChannel`], [`TxRate`])
//! - [`RadioDriver`]: the calls the anchor makes into the WiFi driver
//! - [`RadioBringUp`]: the one-shot radio initialization sequence
//! - [`host`]: in-memory simulated driver (host only)
//! - [`esp`]: ESP-IDF driver (ESP32 only)

mod bringup;

#[cfg(not(feature = "esp32"))]
pub mod host;

#[cfg(feature = "esp32")]
pub mod esp;

pub use bringup::{RadioBringUp, RadioReady};

#[cfg(not(feature = "esp32"))]
pub use host::{SentFrame, SimStation, SimulatedRadio};

#[cfg(feature = "esp32")]
pub use esp::{EspRadio, EspStation};

use crate::ap::ApProfile;
use crate::broadcast::PeerEntry;
use crate::connection::ConnectionMonitor;
use crate::identity::MacAddress;
use std::fmt;
use std::sync::Arc;

/// Operating channel (2.4 GHz channel 11 sees the least interference in the
/// deployment sites).
pub const DEFAULT_CHANNEL: u8 = 11;

/// Highest 2.4 GHz channel number.
pub const MAX_CHANNEL: u8 = 14;

/// Radio interface the driver call applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interface {
    /// Station (client) role.
    Sta,
    /// Access point role.
    Ap,
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sta => write!(f, "STA"),
            Self::Ap => write!(f, "AP"),
        }
    }
}

/// Channel width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bandwidth {
    /// HT20, 20 MHz.
    Ht20,
    /// HT40, 40 MHz (primary bonded with a secondary channel).
    Ht40,
}

impl Bandwidth {
    /// Width in MHz.
    pub fn mhz(&self) -> u8 {
        match self {
            Self::Ht20 => 20,
            Self::Ht40 => 40,
        }
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}MHz", self.mhz())
    }
}

/// Which adjacent channel is bonded with the primary for HT40.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecondaryChannel {
    /// No secondary channel.
    None,
    /// Secondary channel above the primary.
    Above,
    /// Secondary channel below the primary.
    Below,
}

/// Fixed PHY rate for outgoing broadcast datagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxRate {
    /// 802.11b DSSS 1 Mbps, long preamble.
    Dsss1M,
    /// HT MCS0, long guard interval.
    Mcs0Lgi,
    /// HT MCS0, short guard interval.
    Mcs0Sgi,
}

/// Process-wide radio parameters, applied once during bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioConfig {
    /// Primary channel.
    pub channel: u8,
    /// Channel width for both roles.
    pub bandwidth: Bandwidth,
    /// Secondary channel placement.
    pub secondary: SecondaryChannel,
    /// Broadcast transmit rate on the station role.
    pub tx_rate: TxRate,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL,
            bandwidth: Bandwidth::Ht40,
            secondary: SecondaryChannel::Below,
            tx_rate: TxRate::Mcs0Sgi,
        }
    }
}

/// A driver operation, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RadioStep {
    TakeModem,
    InitNetif,
    CreateEventLoop,
    InitWifi,
    RegisterHandlers,
    SetStorage,
    SetMode,
    SetBandwidth(Interface),
    GetBandwidth(Interface),
    Start,
    SetBroadcastRate,
    SetChannel,
    ReadBaseMac,
    SetMac(Interface),
    ApplyApConfig,
    Reconnect,
    InitBroadcast,
    AddPeer,
    Send,
}

impl fmt::Display for RadioStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TakeModem => write!(f, "modem acquisition"),
            Self::InitNetif => write!(f, "netif init"),
            Self::CreateEventLoop => write!(f, "event loop creation"),
            Self::InitWifi => write!(f, "WiFi init"),
            Self::RegisterHandlers => write!(f, "event handler registration"),
            Self::SetStorage => write!(f, "storage mode"),
            Self::SetMode => write!(f, "operating mode"),
            Self::SetBandwidth(iface) => write!(f, "{} bandwidth", iface),
            Self::GetBandwidth(iface) => write!(f, "{} bandwidth query", iface),
            Self::Start => write!(f, "WiFi start"),
            Self::SetBroadcastRate => write!(f, "broadcast rate"),
            Self::SetChannel => write!(f, "channel"),
            Self::ReadBaseMac => write!(f, "base MAC read"),
            Self::SetMac(iface) => write!(f, "{} MAC override", iface),
            Self::ApplyApConfig => write!(f, "AP configuration"),
            Self::Reconnect => write!(f, "station reconnect"),
            Self::InitBroadcast => write!(f, "broadcast layer init"),
            Self::AddPeer => write!(f, "peer registration"),
            Self::Send => write!(f, "broadcast send"),
        }
    }
}

/// A failed driver call.
///
/// Carries the operation and the driver's error code with its symbolic name
/// (e.g. `ESP_ERR_ESPNOW_NO_MEM`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioError {
    /// The operation that failed.
    pub step: RadioStep,
    /// Driver error code.
    pub code: i32,
    /// Symbolic name of `code`.
    pub name: &'static str,
}

impl RadioError {
    /// Create an error for a failed step.
    pub fn new(step: RadioStep, code: i32, name: &'static str) -> Self {
        Self { step, code, name }
    }
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {} ({})", self.step, self.name, self.code)
    }
}

impl std::error::Error for RadioError {}

/// Reconnect handle for the station role.
///
/// Invoked from the driver's event context, so it must be callable from any
/// thread.
pub trait StationControl: Send + Sync {
    /// Ask the driver to (re)associate the station with its upstream network.
    fn reconnect(&self) -> Result<(), RadioError>;
}

/// The WiFi driver calls the anchor depends on.
///
/// Methods taking `&mut self` are configuration calls made from the startup
/// path; [`RadioDriver::send`] and [`RadioDriver::bandwidth`] only need
/// shared access and may run while event callbacks are being delivered.
pub trait RadioDriver {
    /// Initialize the network abstraction layer.
    fn init_netif(&mut self) -> Result<(), RadioError>;

    /// Create the default event loop.
    fn create_event_loop(&mut self) -> Result<(), RadioError>;

    /// Initialize the WiFi driver with default resources.
    fn init_wifi(&mut self) -> Result<(), RadioError>;

    /// Deliver station connected/disconnected events to `monitor`.
    fn subscribe_connection_events(
        &mut self,
        monitor: Arc<ConnectionMonitor>,
    ) -> Result<(), RadioError>;

    /// Keep WiFi configuration in RAM only.
    fn set_storage_ram(&mut self) -> Result<(), RadioError>;

    /// Run access point and station roles simultaneously.
    fn set_mode_ap_sta(&mut self) -> Result<(), RadioError>;

    /// Set the channel width of one interface.
    fn set_bandwidth(&mut self, iface: Interface, bandwidth: Bandwidth)
        -> Result<(), RadioError>;

    /// Read back the channel width of one interface.
    fn bandwidth(&self, iface: Interface) -> Result<Bandwidth, RadioError>;

    /// Start the radio.
    fn start(&mut self) -> Result<(), RadioError>;

    /// Fix the PHY rate used for broadcast datagrams on `iface`.
    fn set_broadcast_rate(&mut self, iface: Interface, rate: TxRate) -> Result<(), RadioError>;

    /// Fix the primary channel and secondary channel placement.
    fn set_channel(&mut self, channel: u8, secondary: SecondaryChannel)
        -> Result<(), RadioError>;

    /// Read the permanent base hardware address.
    fn base_mac(&self) -> Result<MacAddress, RadioError>;

    /// Override the hardware address of one interface.
    fn set_mac(&mut self, iface: Interface, mac: MacAddress) -> Result<(), RadioError>;

    /// Apply an access point profile.
    fn apply_ap_profile(&mut self, profile: &ApProfile) -> Result<(), RadioError>;

    /// Initialize the connectionless broadcast layer.
    fn init_broadcast(&mut self) -> Result<(), RadioError>;

    /// Register a broadcast destination.
    fn add_peer(&mut self, peer: &PeerEntry) -> Result<(), RadioError>;

    /// Transmit one datagram to a registered peer.
    fn send(&self, dest: &MacAddress, payload: &[u8]) -> Result<(), RadioError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_radio_config() {
        let config = RadioConfig::default();
        assert_eq!(config.channel, 11);
        assert_eq!(config.bandwidth, Bandwidth::Ht40);
        assert_eq!(config.secondary, SecondaryChannel::Below);
        assert_eq!(config.tx_rate, TxRate::Mcs0Sgi);
    }

    #[test]
    fn test_bandwidth_display() {
        assert_eq!(Bandwidth::Ht20.to_string(), "20MHz");
        assert_eq!(Bandwidth::Ht40.to_string(), "40MHz");
    }

    #[test]
    fn test_radio_error_display() {
        let err = RadioError::new(RadioStep::SetBandwidth(Interface::Ap), -1, "ESP_FAIL");
        assert_eq!(err.to_string(), "AP bandwidth failed: ESP_FAIL (-1)");

        let err = RadioError::new(RadioStep::TakeModem, 0x103, "ESP_ERR_INVALID_STATE");
        assert_eq!(
            err.to_string(),
            "modem acquisition failed: ESP_ERR_INVALID_STATE (259)"
        );
    }
}
