//! Simulated WiFi driver for the host.
//!
//! Keeps every call in memory so the startup sequence and the broadcast loop
//! can run (and be inspected) without ESP32 hardware. The simulator enforces
//! the driver preconditions the firmware relies on: WiFi calls before
//! `init_wifi` fail with `ESP_ERR_WIFI_NOT_INIT`, broadcast calls before
//! `init_broadcast` fail with `ESP_ERR_ESPNOW_NOT_INIT`, and sends to an
//! unregistered peer fail with `ESP_ERR_ESPNOW_NOT_FOUND`.

use super::{
    Bandwidth, Interface, RadioDriver, RadioError, RadioStep, SecondaryChannel, StationControl,
    TxRate,
};
use crate::ap::ApProfile;
use crate::broadcast::PeerEntry;
use crate::connection::{ConnectionEvent, ConnectionMonitor};
use crate::identity::MacAddress;
use log::debug;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

const ESP_FAIL: (i32, &str) = (-1, "ESP_FAIL");
const ESP_ERR_WIFI_NOT_INIT: (i32, &str) = (0x3001, "ESP_ERR_WIFI_NOT_INIT");
const ESP_ERR_ESPNOW_NOT_INIT: (i32, &str) = (0x3065, "ESP_ERR_ESPNOW_NOT_INIT");
const ESP_ERR_ESPNOW_NO_MEM: (i32, &str) = (0x3067, "ESP_ERR_ESPNOW_NO_MEM");
const ESP_ERR_ESPNOW_NOT_FOUND: (i32, &str) = (0x3069, "ESP_ERR_ESPNOW_NOT_FOUND");

/// Base MAC reported when none is configured.
pub const DEFAULT_SIM_MAC: MacAddress = MacAddress::new([0x24, 0x6F, 0x28, 0x00, 0x00, 0x01]);

/// A datagram handed to the simulated driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    /// When the send call was made.
    pub at: Instant,
    pub dest: MacAddress,
    pub payload: Vec<u8>,
    /// Whether the call was accepted.
    pub delivered: bool,
}

#[derive(Debug)]
struct SimState {
    base_mac: MacAddress,
    calls: Vec<RadioStep>,
    failing_steps: HashSet<RadioStep>,
    failing_sends: HashSet<usize>,
    wifi_initialized: bool,
    started: bool,
    ap_bandwidth: Bandwidth,
    sta_bandwidth: Bandwidth,
    channel: Option<(u8, SecondaryChannel)>,
    broadcast_rate: Option<TxRate>,
    sta_mac: Option<MacAddress>,
    ap_profile: Option<ApProfile>,
    broadcast_initialized: bool,
    peers: Vec<PeerEntry>,
    frames: Vec<SentFrame>,
    reconnects: usize,
    monitor: Option<Arc<ConnectionMonitor>>,
}

impl SimState {
    fn new(base_mac: MacAddress) -> Self {
        Self {
            base_mac,
            calls: Vec::new(),
            failing_steps: HashSet::new(),
            failing_sends: HashSet::new(),
            wifi_initialized: false,
            started: false,
            ap_bandwidth: Bandwidth::Ht20,
            sta_bandwidth: Bandwidth::Ht20,
            channel: None,
            broadcast_rate: None,
            sta_mac: None,
            ap_profile: None,
            broadcast_initialized: false,
            peers: Vec::new(),
            frames: Vec::new(),
            reconnects: 0,
            monitor: None,
        }
    }

    /// Record a call and return the injected failure for it, if any.
    fn enter(&mut self, step: RadioStep) -> Result<(), RadioError> {
        self.calls.push(step);
        if self.failing_steps.contains(&step) {
            return Err(error(step, ESP_FAIL));
        }
        Ok(())
    }

    fn require_wifi(&self, step: RadioStep) -> Result<(), RadioError> {
        if self.wifi_initialized {
            Ok(())
        } else {
            Err(error(step, ESP_ERR_WIFI_NOT_INIT))
        }
    }

    fn require_broadcast(&self, step: RadioStep) -> Result<(), RadioError> {
        if self.broadcast_initialized {
            Ok(())
        } else {
            Err(error(step, ESP_ERR_ESPNOW_NOT_INIT))
        }
    }
}

fn error(step: RadioStep, (code, name): (i32, &'static str)) -> RadioError {
    RadioError::new(step, code, name)
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory [`RadioDriver`].
///
/// Clones share the same simulated radio.
#[derive(Debug, Clone)]
pub struct SimulatedRadio {
    state: Arc<Mutex<SimState>>,
}

impl Default for SimulatedRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedRadio {
    /// A radio with [`DEFAULT_SIM_MAC`] as base address.
    pub fn new() -> Self {
        Self::with_base_mac(DEFAULT_SIM_MAC)
    }

    /// A radio reporting `mac` as its base hardware address.
    pub fn with_base_mac(mac: MacAddress) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new(mac))),
        }
    }

    /// Make every call of `step` fail with `ESP_FAIL`.
    pub fn fail_step(&self, step: RadioStep) {
        lock(&self.state).failing_steps.insert(step);
    }

    /// Make the send attempt with index `attempt` (0-based) fail with
    /// `ESP_ERR_ESPNOW_NO_MEM`.
    pub fn fail_send_at(&self, attempt: usize) {
        lock(&self.state).failing_sends.insert(attempt);
    }

    /// Reconnect handle sharing this radio's state.
    pub fn station(&self) -> SimStation {
        SimStation {
            state: Arc::clone(&self.state),
        }
    }

    /// Deliver a station event to the subscribed monitor.
    ///
    /// Returns `false` when nothing is subscribed.
    pub fn inject_event(&self, event: &ConnectionEvent) -> bool {
        let monitor = lock(&self.state).monitor.clone();
        match monitor {
            Some(monitor) => {
                monitor.handle_event(event, &self.station());
                true
            }
            None => false,
        }
    }

    /// Every driver call so far, in order.
    pub fn calls(&self) -> Vec<RadioStep> {
        lock(&self.state).calls.clone()
    }

    /// How many times `step` was called.
    pub fn count(&self, step: RadioStep) -> usize {
        lock(&self.state).calls.iter().filter(|s| **s == step).count()
    }

    pub fn is_started(&self) -> bool {
        lock(&self.state).started
    }

    pub fn has_subscriber(&self) -> bool {
        lock(&self.state).monitor.is_some()
    }

    pub fn channel(&self) -> Option<(u8, SecondaryChannel)> {
        lock(&self.state).channel
    }

    pub fn broadcast_rate(&self) -> Option<TxRate> {
        lock(&self.state).broadcast_rate
    }

    /// Station MAC override, if one was applied.
    pub fn station_mac(&self) -> Option<MacAddress> {
        lock(&self.state).sta_mac
    }

    pub fn ap_profile(&self) -> Option<ApProfile> {
        lock(&self.state).ap_profile.clone()
    }

    pub fn peers(&self) -> Vec<PeerEntry> {
        lock(&self.state).peers.clone()
    }

    pub fn sent_frames(&self) -> Vec<SentFrame> {
        lock(&self.state).frames.clone()
    }

    /// Reconnect requests received.
    pub fn reconnects(&self) -> usize {
        lock(&self.state).reconnects
    }
}

impl RadioDriver for SimulatedRadio {
    fn init_netif(&mut self) -> Result<(), RadioError> {
        lock(&self.state).enter(RadioStep::InitNetif)
    }

    fn create_event_loop(&mut self) -> Result<(), RadioError> {
        lock(&self.state).enter(RadioStep::CreateEventLoop)
    }

    fn init_wifi(&mut self) -> Result<(), RadioError> {
        let mut state = lock(&self.state);
        state.enter(RadioStep::InitWifi)?;
        state.wifi_initialized = true;
        Ok(())
    }

    fn subscribe_connection_events(
        &mut self,
        monitor: Arc<ConnectionMonitor>,
    ) -> Result<(), RadioError> {
        let mut state = lock(&self.state);
        state.enter(RadioStep::RegisterHandlers)?;
        state.monitor = Some(monitor);
        Ok(())
    }

    fn set_storage_ram(&mut self) -> Result<(), RadioError> {
        let mut state = lock(&self.state);
        state.enter(RadioStep::SetStorage)?;
        state.require_wifi(RadioStep::SetStorage)
    }

    fn set_mode_ap_sta(&mut self) -> Result<(), RadioError> {
        let mut state = lock(&self.state);
        state.enter(RadioStep::SetMode)?;
        state.require_wifi(RadioStep::SetMode)
    }

    fn set_bandwidth(
        &mut self,
        iface: Interface,
        bandwidth: Bandwidth,
    ) -> Result<(), RadioError> {
        let step = RadioStep::SetBandwidth(iface);
        let mut state = lock(&self.state);
        state.enter(step)?;
        state.require_wifi(step)?;
        match iface {
            Interface::Ap => state.ap_bandwidth = bandwidth,
            Interface::Sta => state.sta_bandwidth = bandwidth,
        }
        Ok(())
    }

    fn bandwidth(&self, iface: Interface) -> Result<Bandwidth, RadioError> {
        let step = RadioStep::GetBandwidth(iface);
        let mut state = lock(&self.state);
        state.enter(step)?;
        state.require_wifi(step)?;
        Ok(match iface {
            Interface::Ap => state.ap_bandwidth,
            Interface::Sta => state.sta_bandwidth,
        })
    }

    fn start(&mut self) -> Result<(), RadioError> {
        let mut state = lock(&self.state);
        state.enter(RadioStep::Start)?;
        state.require_wifi(RadioStep::Start)?;
        state.started = true;
        Ok(())
    }

    fn set_broadcast_rate(&mut self, _iface: Interface, rate: TxRate) -> Result<(), RadioError> {
        let mut state = lock(&self.state);
        state.enter(RadioStep::SetBroadcastRate)?;
        state.require_wifi(RadioStep::SetBroadcastRate)?;
        state.broadcast_rate = Some(rate);
        Ok(())
    }

    fn set_channel(
        &mut self,
        channel: u8,
        secondary: SecondaryChannel,
    ) -> Result<(), RadioError> {
        let mut state = lock(&self.state);
        state.enter(RadioStep::SetChannel)?;
        state.require_wifi(RadioStep::SetChannel)?;
        state.channel = Some((channel, secondary));
        Ok(())
    }

    fn base_mac(&self) -> Result<MacAddress, RadioError> {
        let mut state = lock(&self.state);
        state.enter(RadioStep::ReadBaseMac)?;
        Ok(state.base_mac)
    }

    fn set_mac(&mut self, iface: Interface, mac: MacAddress) -> Result<(), RadioError> {
        let step = RadioStep::SetMac(iface);
        let mut state = lock(&self.state);
        state.enter(step)?;
        state.require_wifi(step)?;
        if iface == Interface::Sta {
            state.sta_mac = Some(mac);
        }
        Ok(())
    }

    fn apply_ap_profile(&mut self, profile: &ApProfile) -> Result<(), RadioError> {
        let mut state = lock(&self.state);
        state.enter(RadioStep::ApplyApConfig)?;
        state.require_wifi(RadioStep::ApplyApConfig)?;
        state.ap_profile = Some(profile.clone());
        Ok(())
    }

    fn init_broadcast(&mut self) -> Result<(), RadioError> {
        let mut state = lock(&self.state);
        state.enter(RadioStep::InitBroadcast)?;
        state.require_wifi(RadioStep::InitBroadcast)?;
        state.broadcast_initialized = true;
        Ok(())
    }

    fn add_peer(&mut self, peer: &PeerEntry) -> Result<(), RadioError> {
        let mut state = lock(&self.state);
        state.enter(RadioStep::AddPeer)?;
        state.require_broadcast(RadioStep::AddPeer)?;
        state.peers.push(*peer);
        Ok(())
    }

    fn send(&self, dest: &MacAddress, payload: &[u8]) -> Result<(), RadioError> {
        let at = Instant::now();
        let mut state = lock(&self.state);
        let attempt = state.frames.len();

        let result = state
            .enter(RadioStep::Send)
            .and_then(|_| state.require_broadcast(RadioStep::Send))
            .and_then(|_| {
                if !state.peers.iter().any(|p| p.addr == *dest) {
                    Err(error(RadioStep::Send, ESP_ERR_ESPNOW_NOT_FOUND))
                } else if state.failing_sends.contains(&attempt) {
                    Err(error(RadioStep::Send, ESP_ERR_ESPNOW_NO_MEM))
                } else {
                    Ok(())
                }
            });

        state.frames.push(SentFrame {
            at,
            dest: *dest,
            payload: payload.to_vec(),
            delivered: result.is_ok(),
        });
        result
    }
}

/// Reconnect handle of a [`SimulatedRadio`].
#[derive(Debug, Clone)]
pub struct SimStation {
    state: Arc<Mutex<SimState>>,
}

impl StationControl for SimStation {
    fn reconnect(&self) -> Result<(), RadioError> {
        let mut state = lock(&self.state);
        state.enter(RadioStep::Reconnect)?;
        state.require_wifi(RadioStep::Reconnect)?;
        state.reconnects += 1;
        debug!("Simulated station reconnect #{}", state.reconnects);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wifi_calls_require_init() {
        let mut radio = SimulatedRadio::new();
        let err = radio.set_mode_ap_sta().unwrap_err();
        assert_eq!(err.name, "ESP_ERR_WIFI_NOT_INIT");

        radio.init_wifi().unwrap();
        assert!(radio.set_mode_ap_sta().is_ok());
    }

    #[test]
    fn test_send_requires_registered_peer() {
        let mut radio = SimulatedRadio::new();
        radio.init_wifi().unwrap();

        let err = radio.send(&MacAddress::BROADCAST, &[0]).unwrap_err();
        assert_eq!(err.name, "ESP_ERR_ESPNOW_NOT_INIT");

        radio.init_broadcast().unwrap();
        let err = radio.send(&MacAddress::BROADCAST, &[0]).unwrap_err();
        assert_eq!(err.name, "ESP_ERR_ESPNOW_NOT_FOUND");

        radio
            .add_peer(&PeerEntry {
                addr: MacAddress::BROADCAST,
                channel: 11,
                iface: Interface::Sta,
                encrypt: false,
            })
            .unwrap();
        assert!(radio.send(&MacAddress::BROADCAST, &[0]).is_ok());

        let frames = radio.sent_frames();
        assert_eq!(frames.len(), 3);
        assert!(!frames[0].delivered);
        assert!(frames[2].delivered);
    }

    #[test]
    fn test_injected_step_failure() {
        let mut radio = SimulatedRadio::new();
        radio.fail_step(RadioStep::InitWifi);
        let err = radio.init_wifi().unwrap_err();
        assert_eq!(err, RadioError::new(RadioStep::InitWifi, -1, "ESP_FAIL"));
        assert_eq!(radio.count(RadioStep::InitWifi), 1);
    }

    #[test]
    fn test_inject_event_without_subscriber() {
        let radio = SimulatedRadio::new();
        assert!(!radio.inject_event(&ConnectionEvent::Disconnected { reason: 8 }));
    }

    #[test]
    fn test_clones_share_state() {
        let mut radio = SimulatedRadio::new();
        let observer = radio.clone();
        radio.init_wifi().unwrap();
        radio.start().unwrap();
        assert!(observer.is_started());
    }
}
