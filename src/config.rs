//! Anchor configuration.
//!
//! All parameters are fixed at build time; [`AnchorConfig::default`] is what
//! the firmware runs with. The host binary may override the send frequency
//! from the environment.
//!
//! # Example
//!
//! ```
//! use ftm_anchor_esp32::config::AnchorConfig;
//! use std::time::Duration;
//!
//! let config = AnchorConfig::default();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.send_interval(), Duration::from_secs(1));
//! ```

use crate::ap::{DEFAULT_MAX_CONNECTIONS, DEFAULT_PASSPHRASE, MAX_PASSWORD_LEN};
use crate::broadcast::{send_interval, DEFAULT_SEND_FREQUENCY_HZ};
use crate::radio::{Bandwidth, RadioConfig, SecondaryChannel, MAX_CHANNEL};
use std::fmt;
use std::time::Duration;

/// Minimum WPA2 pass-phrase length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Upper bound for simultaneous AP clients accepted by the driver.
pub const MAX_AP_CONNECTIONS: u8 = 10;

/// Environment variable overriding the send frequency (host only).
pub const ENV_SEND_HZ: &str = "ANCHOR_SEND_HZ";

/// Anchor parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorConfig {
    /// Radio parameters applied at bring-up.
    pub radio: RadioConfig,
    /// Broadcast datagrams per second.
    pub send_frequency_hz: u32,
    /// AP pass-phrase (empty for an open network).
    pub passphrase: String,
    /// Simultaneous AP clients.
    pub max_connections: u8,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            radio: RadioConfig::default(),
            send_frequency_hz: DEFAULT_SEND_FREQUENCY_HZ,
            passphrase: DEFAULT_PASSPHRASE.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl AnchorConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let channel = self.radio.channel;
        if channel == 0 || channel > MAX_CHANNEL {
            return Err(ConfigError::InvalidChannel(channel));
        }

        if self.radio.bandwidth == Bandwidth::Ht40 {
            let bonded = match self.radio.secondary {
                SecondaryChannel::Below => channel >= 5,
                SecondaryChannel::Above => channel <= 9,
                SecondaryChannel::None => false,
            };
            if !bonded {
                return Err(ConfigError::NoSecondaryChannel {
                    channel,
                    secondary: self.radio.secondary,
                });
            }
        }

        if self.send_frequency_hz == 0 {
            return Err(ConfigError::ZeroSendFrequency);
        }

        let len = self.passphrase.len();
        if len > 0 && len < MIN_PASSWORD_LEN {
            return Err(ConfigError::PassphraseTooShort {
                len,
                min: MIN_PASSWORD_LEN,
            });
        }
        if len > MAX_PASSWORD_LEN {
            return Err(ConfigError::PassphraseTooLong {
                len,
                max: MAX_PASSWORD_LEN,
            });
        }

        if self.max_connections == 0 || self.max_connections > MAX_AP_CONNECTIONS {
            return Err(ConfigError::InvalidMaxConnections(self.max_connections));
        }

        Ok(())
    }

    /// Delay between broadcast sends.
    pub fn send_interval(&self) -> Duration {
        send_interval(self.send_frequency_hz.max(1))
    }

    /// Apply overrides looked up by variable name, then validate.
    ///
    /// Only [`ENV_SEND_HZ`] is recognized.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_SEND_HZ) {
            self.send_frequency_hz =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidOverride {
                        name: ENV_SEND_HZ,
                        value: value.clone(),
                    })?;
        }
        self.validate()?;
        Ok(self)
    }
}

/// Errors in anchor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Channel outside 1..=14.
    InvalidChannel(u8),
    /// HT40 requested without an adjacent channel to bond with.
    NoSecondaryChannel {
        channel: u8,
        secondary: SecondaryChannel,
    },
    /// Send frequency of zero.
    ZeroSendFrequency,
    /// Pass-phrase too short for WPA2.
    PassphraseTooShort { len: usize, min: usize },
    /// Pass-phrase exceeds maximum length.
    PassphraseTooLong { len: usize, max: usize },
    /// Client limit of zero or above the driver maximum.
    InvalidMaxConnections(u8),
    /// An override value could not be parsed.
    InvalidOverride { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChannel(ch) => write!(f, "invalid channel {} (1-{})", ch, MAX_CHANNEL),
            Self::NoSecondaryChannel { channel, secondary } => write!(
                f,
                "channel {} has no secondary channel {:?} for HT40",
                channel, secondary
            ),
            Self::ZeroSendFrequency => write!(f, "send frequency must be > 0"),
            Self::PassphraseTooShort { len, min } => {
                write!(f, "pass-phrase too short: {} bytes (min {})", len, min)
            }
            Self::PassphraseTooLong { len, max } => {
                write!(f, "pass-phrase too long: {} bytes (max {})", len, max)
            }
            Self::InvalidMaxConnections(n) => write!(
                f,
                "invalid max connections {} (1-{})",
                n, MAX_AP_CONNECTIONS
            ),
            Self::InvalidOverride { name, value } => {
                write!(f, "invalid value for {}: {:?}", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnchorConfig::default();
        assert_eq!(config.radio.channel, 11);
        assert_eq!(config.send_frequency_hz, 1);
        assert_eq!(config.passphrase, "ftmftmftmftm");
        assert_eq!(config.max_connections, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_channel() {
        for channel in [0, 15] {
            let mut config = AnchorConfig::default();
            config.radio.channel = channel;
            assert_eq!(config.validate(), Err(ConfigError::InvalidChannel(channel)));
        }
    }

    #[test]
    fn test_ht40_needs_room_below() {
        let mut config = AnchorConfig::default();
        config.radio.channel = 3;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoSecondaryChannel { channel: 3, .. })
        ));

        config.radio.secondary = SecondaryChannel::Above;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ht40_needs_room_above() {
        let mut config = AnchorConfig::default();
        config.radio.secondary = SecondaryChannel::Above;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoSecondaryChannel { channel: 11, .. })
        ));
    }

    #[test]
    fn test_ht20_ignores_secondary() {
        let mut config = AnchorConfig::default();
        config.radio.bandwidth = Bandwidth::Ht20;
        config.radio.secondary = SecondaryChannel::None;
        config.radio.channel = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_frequency() {
        let config = AnchorConfig {
            send_frequency_hz: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroSendFrequency));
    }

    #[test]
    fn test_passphrase_bounds() {
        let open = AnchorConfig {
            passphrase: String::new(),
            ..Default::default()
        };
        assert!(open.validate().is_ok());

        let short = AnchorConfig {
            passphrase: "ftm".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            short.validate(),
            Err(ConfigError::PassphraseTooShort { len: 3, .. })
        ));

        let long = AnchorConfig {
            passphrase: "x".repeat(65),
            ..Default::default()
        };
        assert!(matches!(
            long.validate(),
            Err(ConfigError::PassphraseTooLong { len: 65, .. })
        ));
    }

    #[test]
    fn test_max_connections_bounds() {
        for n in [0, 11] {
            let config = AnchorConfig {
                max_connections: n,
                ..Default::default()
            };
            assert_eq!(config.validate(), Err(ConfigError::InvalidMaxConnections(n)));
        }
    }

    #[test]
    fn test_send_interval() {
        let config = AnchorConfig {
            send_frequency_hz: 10,
            ..Default::default()
        };
        assert_eq!(config.send_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_overrides() {
        let config = AnchorConfig::default()
            .with_overrides(|name| (name == ENV_SEND_HZ).then(|| " 5 ".to_string()))
            .unwrap();
        assert_eq!(config.send_frequency_hz, 5);

        let unchanged = AnchorConfig::default().with_overrides(|_| None).unwrap();
        assert_eq!(unchanged, AnchorConfig::default());
    }

    #[test]
    fn test_invalid_overrides() {
        let err = AnchorConfig::default()
            .with_overrides(|_| Some("fast".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOverride { name: ENV_SEND_HZ, .. }));

        let err = AnchorConfig::default()
            .with_overrides(|_| Some("0".to_string()))
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroSendFrequency);
    }
}
