//! Access point profile.
//!
//! The anchor hosts a network named after its hardware address with the
//! fine timing measurement (FTM) responder enabled, so peers can range
//! against it.

use crate::connection::ConnectionMonitor;
use crate::radio::{RadioDriver, RadioError, RadioReady};
use log::info;
use std::fmt;

/// Maximum SSID length per IEEE 802.11.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum WPA2 pass-phrase length.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Pass-phrase shared by every anchor.
pub const DEFAULT_PASSPHRASE: &str = "ftmftmftmftm";

/// Simultaneous clients accepted by the access point.
pub const DEFAULT_MAX_CONNECTIONS: u8 = 4;

/// Authentication mode advertised by the access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// No authentication.
    Open,
    /// WPA2 pre-shared key.
    Wpa2Psk,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Wpa2Psk => write!(f, "WPA2-PSK"),
        }
    }
}

/// Access point settings, built once and applied once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApProfile {
    ssid: String,
    password: String,
    auth_mode: AuthMode,
    channel: u8,
    max_connections: u8,
    ftm_responder: bool,
}

impl ApProfile {
    /// Build a profile for the brought-up radio.
    ///
    /// SSID and pass-phrase are cut to their maximum lengths. An empty
    /// pass-phrase selects open authentication.
    pub fn new(ready: &RadioReady, ssid: &str, password: &str, max_connections: u8) -> Self {
        let password = truncate(password, MAX_PASSWORD_LEN);
        let auth_mode = if password.is_empty() {
            AuthMode::Open
        } else {
            AuthMode::Wpa2Psk
        };

        Self {
            ssid: truncate(ssid, MAX_SSID_LEN).to_string(),
            password: password.to_string(),
            auth_mode,
            channel: ready.channel(),
            max_connections,
            ftm_responder: true,
        }
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// Visible SSID length in bytes.
    pub fn ssid_len(&self) -> usize {
        self.ssid.len()
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth_mode
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn max_connections(&self) -> u8 {
        self.max_connections
    }

    /// Whether peers may range against this access point.
    pub fn ftm_responder(&self) -> bool {
        self.ftm_responder
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Apply `profile` to the access point role.
///
/// The node acts as a server from here on, so station reconnects are
/// switched off first.
pub fn configure_access_point<D: RadioDriver>(
    driver: &mut D,
    monitor: &ConnectionMonitor,
    profile: &ApProfile,
) -> Result<(), RadioError> {
    monitor.set_reconnect(false);
    driver.apply_ap_profile(profile)?;
    info!(
        "AP configured: SSID {}, auth {}, channel {}, max {} clients, FTM responder {}",
        profile.ssid(),
        profile.auth_mode(),
        profile.channel(),
        profile.max_connections(),
        profile.ftm_responder()
    );
    Ok(())
}

#[cfg(all(test, not(feature = "esp32")))]
mod tests {
    use super::*;
    use crate::radio::{RadioBringUp, RadioConfig, RadioStep, SimulatedRadio};
    use std::sync::Arc;

    fn ready_radio() -> (SimulatedRadio, Arc<ConnectionMonitor>, RadioReady) {
        let mut radio = SimulatedRadio::new();
        let monitor = Arc::new(ConnectionMonitor::new());
        let ready = RadioBringUp::new(RadioConfig::default())
            .run(&mut radio, &monitor)
            .unwrap();
        (radio, monitor, ready)
    }

    #[test]
    fn test_empty_passphrase_is_open() {
        let (_, _, ready) = ready_radio();
        let profile = ApProfile::new(&ready, "ftm_000000000001", "", 4);
        assert_eq!(profile.auth_mode(), AuthMode::Open);
        assert_eq!(profile.password(), "");
    }

    #[test]
    fn test_passphrase_selects_wpa2() {
        let (_, _, ready) = ready_radio();
        let profile = ApProfile::new(&ready, "ftm_000000000001", "ftmftmftmftm", 4);
        assert_eq!(profile.auth_mode(), AuthMode::Wpa2Psk);
        assert_eq!(profile.password(), "ftmftmftmftm");
    }

    #[test]
    fn test_profile_fixed_fields() {
        let (_, _, ready) = ready_radio();
        let profile = ApProfile::new(&ready, "ftm_1A2B3C4D5E6F", DEFAULT_PASSPHRASE, 4);
        assert_eq!(profile.ssid(), "ftm_1A2B3C4D5E6F");
        assert_eq!(profile.ssid_len(), 16);
        assert_eq!(profile.channel(), 11);
        assert_eq!(profile.max_connections(), 4);
        assert!(profile.ftm_responder());
    }

    #[test]
    fn test_long_values_are_bounded() {
        let (_, _, ready) = ready_radio();
        let ssid = "s".repeat(40);
        let password = "p".repeat(70);
        let profile = ApProfile::new(&ready, &ssid, &password, 4);
        assert_eq!(profile.ssid_len(), MAX_SSID_LEN);
        assert_eq!(profile.password().len(), MAX_PASSWORD_LEN);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        // 'é' is two bytes; 31 ASCII + 'é' would straddle the limit.
        let ssid = format!("{}é", "a".repeat(31));
        assert_eq!(truncate(&ssid, MAX_SSID_LEN), "a".repeat(31));
    }

    #[test]
    fn test_configure_disables_reconnect_and_applies() {
        let (mut radio, monitor, ready) = ready_radio();
        let profile = ApProfile::new(&ready, "ftm_1A2B3C4D5E6F", DEFAULT_PASSPHRASE, 4);

        assert!(monitor.reconnect_enabled());
        configure_access_point(&mut radio, &monitor, &profile).unwrap();
        assert!(!monitor.reconnect_enabled());
        assert_eq!(radio.ap_profile(), Some(profile));
    }

    #[test]
    fn test_configure_failure_is_reported() {
        let (mut radio, monitor, ready) = ready_radio();
        radio.fail_step(RadioStep::ApplyApConfig);
        let profile = ApProfile::new(&ready, "ftm_1A2B3C4D5E6F", DEFAULT_PASSPHRASE, 4);

        let err = configure_access_point(&mut radio, &monitor, &profile).unwrap_err();
        assert_eq!(err.step, RadioStep::ApplyApConfig);
        assert_eq!(radio.ap_profile(), None);
    }
}
