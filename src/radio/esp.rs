//! ESP-IDF WiFi driver.
//!
//! Uses `esp-idf-svc` for the event loop, the WiFi driver lifecycle and
//! ESP-NOW, and raw `esp-idf-sys` calls for the knobs the safe wrappers do
//! not expose (bandwidth, secondary channel, ESP-NOW PHY rate, FTM responder).

use super::{
    Bandwidth, Interface, RadioDriver, RadioError, RadioStep, SecondaryChannel, StationControl,
    TxRate,
};
use crate::ap::{ApProfile, AuthMode};
use crate::broadcast::PeerEntry;
use crate::connection::{ConnectionEvent, ConnectionMonitor};
use crate::identity::MacAddress;
use esp_idf_hal::modem::Modem;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::espnow::{EspNow, PeerInfo};
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::wifi::{WifiDriver, WifiEvent};
use esp_idf_sys::{self as sys, esp_err_t, EspError};
use log::debug;
use std::ffi::CStr;
use std::sync::Arc;

/// Symbolic name of an ESP-IDF error code.
pub(crate) fn error_name(code: esp_err_t) -> &'static str {
    // SAFETY: esp_err_to_name returns a pointer into a static string table.
    unsafe { CStr::from_ptr(sys::esp_err_to_name(code)) }
        .to_str()
        .unwrap_or("UNKNOWN")
}

fn radio_error(step: RadioStep, e: EspError) -> RadioError {
    RadioError::new(step, e.code(), error_name(e.code()))
}

fn check(step: RadioStep, code: esp_err_t) -> Result<(), RadioError> {
    EspError::convert(code).map_err(|e| radio_error(step, e))
}

fn invalid_state(step: RadioStep) -> RadioError {
    let code = sys::ESP_ERR_INVALID_STATE as esp_err_t;
    RadioError::new(step, code, error_name(code))
}

fn interface_id(iface: Interface) -> sys::wifi_interface_t {
    match iface {
        Interface::Sta => sys::wifi_interface_t_WIFI_IF_STA,
        Interface::Ap => sys::wifi_interface_t_WIFI_IF_AP,
    }
}

fn bandwidth_id(bandwidth: Bandwidth) -> sys::wifi_bandwidth_t {
    match bandwidth {
        Bandwidth::Ht20 => sys::wifi_bandwidth_t_WIFI_BW_HT20,
        Bandwidth::Ht40 => sys::wifi_bandwidth_t_WIFI_BW_HT40,
    }
}

fn secondary_id(secondary: SecondaryChannel) -> sys::wifi_second_chan_t {
    match secondary {
        SecondaryChannel::None => sys::wifi_second_chan_t_WIFI_SECOND_CHAN_NONE,
        SecondaryChannel::Above => sys::wifi_second_chan_t_WIFI_SECOND_CHAN_ABOVE,
        SecondaryChannel::Below => sys::wifi_second_chan_t_WIFI_SECOND_CHAN_BELOW,
    }
}

fn rate_id(rate: TxRate) -> sys::wifi_phy_rate_t {
    match rate {
        TxRate::Dsss1M => sys::wifi_phy_rate_t_WIFI_PHY_RATE_1M_L,
        TxRate::Mcs0Lgi => sys::wifi_phy_rate_t_WIFI_PHY_RATE_MCS0_LGI,
        TxRate::Mcs0Sgi => sys::wifi_phy_rate_t_WIFI_PHY_RATE_MCS0_SGI,
    }
}

/// WiFi radio of an ESP32.
///
/// Resources are acquired step by step as [`super::RadioBringUp`] walks the
/// sequence and are kept alive for the rest of the process.
pub struct EspRadio {
    modem: Option<Modem>,
    sysloop: Option<EspSystemEventLoop>,
    wifi: Option<WifiDriver<'static>>,
    subscription: Option<EspSubscription<'static, System>>,
    espnow: Option<EspNow<'static>>,
}

impl EspRadio {
    /// Claim the modem from the board peripherals.
    pub fn take() -> Result<Self, RadioError> {
        let peripherals = Peripherals::take().map_err(|e| radio_error(RadioStep::TakeModem, e))?;
        Ok(Self::new(peripherals.modem))
    }

    /// Wrap the modem peripheral. Nothing is initialized yet.
    pub fn new(modem: Modem) -> Self {
        Self {
            modem: Some(modem),
            sysloop: None,
            wifi: None,
            subscription: None,
            espnow: None,
        }
    }
}

impl RadioDriver for EspRadio {
    fn init_netif(&mut self) -> Result<(), RadioError> {
        check(RadioStep::InitNetif, unsafe { sys::esp_netif_init() })
    }

    fn create_event_loop(&mut self) -> Result<(), RadioError> {
        let sysloop =
            EspSystemEventLoop::take().map_err(|e| radio_error(RadioStep::CreateEventLoop, e))?;
        self.sysloop = Some(sysloop);
        Ok(())
    }

    fn init_wifi(&mut self) -> Result<(), RadioError> {
        let step = RadioStep::InitWifi;
        let sysloop = self.sysloop.clone().ok_or_else(|| invalid_state(step))?;
        let modem = self.modem.take().ok_or_else(|| invalid_state(step))?;

        // No NVS handle: the driver keeps its configuration in RAM.
        let wifi = WifiDriver::new(modem, sysloop, None).map_err(|e| radio_error(step, e))?;
        self.wifi = Some(wifi);
        Ok(())
    }

    fn subscribe_connection_events(
        &mut self,
        monitor: Arc<ConnectionMonitor>,
    ) -> Result<(), RadioError> {
        let step = RadioStep::RegisterHandlers;
        let sysloop = self.sysloop.as_ref().ok_or_else(|| invalid_state(step))?;

        let subscription = sysloop
            .subscribe::<WifiEvent, _>(move |event| match event {
                WifiEvent::StaConnected(info) => monitor.handle_event(
                    &ConnectionEvent::connected(info.ssid(), info.bssid(), info.channel()),
                    &EspStation,
                ),
                WifiEvent::StaDisconnected(info) => monitor.handle_event(
                    &ConnectionEvent::Disconnected {
                        reason: info.reason(),
                    },
                    &EspStation,
                ),
                _ => {}
            })
            .map_err(|e| radio_error(step, e))?;

        self.subscription = Some(subscription);
        Ok(())
    }

    fn set_storage_ram(&mut self) -> Result<(), RadioError> {
        check(RadioStep::SetStorage, unsafe {
            sys::esp_wifi_set_storage(sys::wifi_storage_t_WIFI_STORAGE_RAM)
        })
    }

    fn set_mode_ap_sta(&mut self) -> Result<(), RadioError> {
        check(RadioStep::SetMode, unsafe {
            sys::esp_wifi_set_mode(sys::wifi_mode_t_WIFI_MODE_APSTA)
        })
    }

    fn set_bandwidth(
        &mut self,
        iface: Interface,
        bandwidth: Bandwidth,
    ) -> Result<(), RadioError> {
        check(RadioStep::SetBandwidth(iface), unsafe {
            sys::esp_wifi_set_bandwidth(interface_id(iface), bandwidth_id(bandwidth))
        })
    }

    fn bandwidth(&self, iface: Interface) -> Result<Bandwidth, RadioError> {
        let mut bw: sys::wifi_bandwidth_t = sys::wifi_bandwidth_t_WIFI_BW_HT20;
        check(RadioStep::GetBandwidth(iface), unsafe {
            sys::esp_wifi_get_bandwidth(interface_id(iface), &mut bw)
        })?;
        if bw == sys::wifi_bandwidth_t_WIFI_BW_HT20 {
            Ok(Bandwidth::Ht20)
        } else {
            Ok(Bandwidth::Ht40)
        }
    }

    fn start(&mut self) -> Result<(), RadioError> {
        check(RadioStep::Start, unsafe { sys::esp_wifi_start() })
    }

    fn set_broadcast_rate(&mut self, iface: Interface, rate: TxRate) -> Result<(), RadioError> {
        check(RadioStep::SetBroadcastRate, unsafe {
            sys::esp_wifi_config_espnow_rate(interface_id(iface), rate_id(rate))
        })
    }

    fn set_channel(
        &mut self,
        channel: u8,
        secondary: SecondaryChannel,
    ) -> Result<(), RadioError> {
        check(RadioStep::SetChannel, unsafe {
            sys::esp_wifi_set_channel(channel, secondary_id(secondary))
        })
    }

    fn base_mac(&self) -> Result<MacAddress, RadioError> {
        let mut mac = [0u8; 6];
        check(RadioStep::ReadBaseMac, unsafe {
            sys::esp_base_mac_addr_get(mac.as_mut_ptr())
        })?;
        Ok(MacAddress::new(mac))
    }

    fn set_mac(&mut self, iface: Interface, mac: MacAddress) -> Result<(), RadioError> {
        let bytes = mac.bytes();
        check(RadioStep::SetMac(iface), unsafe {
            sys::esp_wifi_set_mac(interface_id(iface), bytes.as_ptr())
        })
    }

    fn apply_ap_profile(&mut self, profile: &ApProfile) -> Result<(), RadioError> {
        // SAFETY: wifi_config_t is a plain C union; all-zero is its documented
        // "unset" value and only the `ap` variant is written below.
        let mut config: sys::wifi_config_t = unsafe { std::mem::zeroed() };
        let ssid = profile.ssid().as_bytes();
        let password = profile.password().as_bytes();

        unsafe {
            let ap = &mut config.ap;
            ap.ssid[..ssid.len()].copy_from_slice(ssid);
            ap.ssid_len = ssid.len() as u8;
            ap.password[..password.len()].copy_from_slice(password);
            ap.channel = profile.channel();
            ap.max_connection = profile.max_connections();
            ap.authmode = match profile.auth_mode() {
                AuthMode::Open => sys::wifi_auth_mode_t_WIFI_AUTH_OPEN,
                AuthMode::Wpa2Psk => sys::wifi_auth_mode_t_WIFI_AUTH_WPA2_PSK,
            };
            ap.ftm_responder = profile.ftm_responder();
        }

        check(RadioStep::ApplyApConfig, unsafe {
            sys::esp_wifi_set_config(interface_id(Interface::Ap), &mut config)
        })
    }

    fn init_broadcast(&mut self) -> Result<(), RadioError> {
        let espnow = EspNow::take().map_err(|e| radio_error(RadioStep::InitBroadcast, e))?;
        self.espnow = Some(espnow);
        Ok(())
    }

    fn add_peer(&mut self, peer: &PeerEntry) -> Result<(), RadioError> {
        let step = RadioStep::AddPeer;
        let espnow = self.espnow.as_ref().ok_or_else(|| invalid_state(step))?;
        espnow
            .add_peer(PeerInfo {
                peer_addr: peer.addr.bytes(),
                channel: peer.channel,
                ifidx: interface_id(peer.iface),
                encrypt: peer.encrypt,
                ..Default::default()
            })
            .map_err(|e| radio_error(step, e))?;
        debug!("ESP-NOW peer {} registered on channel {}", peer.addr, peer.channel);
        Ok(())
    }

    fn send(&self, dest: &MacAddress, payload: &[u8]) -> Result<(), RadioError> {
        let step = RadioStep::Send;
        let espnow = self.espnow.as_ref().ok_or_else(|| invalid_state(step))?;
        espnow
            .send(dest.bytes(), payload)
            .map_err(|e| radio_error(step, e))
    }
}

/// Station reconnect through `esp_wifi_connect`.
///
/// The call is thread-safe, so the event task can use it while the main task
/// is sending.
#[derive(Debug, Clone, Copy, Default)]
pub struct EspStation;

impl StationControl for EspStation {
    fn reconnect(&self) -> Result<(), RadioError> {
        check(RadioStep::Reconnect, unsafe { sys::esp_wifi_connect() })
    }
}
