//! Node identity derived from the permanent hardware address.
//!
//! The anchor advertises itself under an SSID built from its base MAC so
//! that peers can tell anchors apart without any extra configuration.
//!
//! # Example
//!
//! ```
//! use ftm_anchor_esp32::identity::{MacAddress, NodeIdentity};
//!
//! let mac = MacAddress::new([0x1A, 0x2B, 0x3C, 0x4D, 0x5E, 0x6F]);
//! let identity = NodeIdentity::derive(mac);
//! assert_eq!(identity.ssid(), "ftm_1A2B3C4D5E6F");
//! ```

use std::fmt;
use std::str::FromStr;

/// Prefix of every anchor SSID.
pub const SSID_PREFIX: &str = "ftm_";

/// A 6-byte IEEE 802 hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// The all-ones address, delivered to every listener on the channel.
    pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);

    /// Wrap raw address bytes (most significant first).
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Raw address bytes.
    pub fn bytes(&self) -> [u8; 6] {
        self.0
    }

    /// Check whether this is the wildcard broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Error parsing a textual MAC address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMacError(String);

impl fmt::Display for ParseMacError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid MAC address: {}", self.0)
    }
}

impl std::error::Error for ParseMacError {}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    /// Parse `AA:BB:CC:DD:EE:FF` (also accepts `-` as separator).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.trim().split([':', '-']);

        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or_else(|| ParseMacError(s.to_string()))?;
            if part.len() != 2 {
                return Err(ParseMacError(s.to_string()));
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| ParseMacError(s.to_string()))?;
        }

        if parts.next().is_some() {
            return Err(ParseMacError(s.to_string()));
        }
        Ok(Self(bytes))
    }
}

/// Format the SSID for a hardware address: `ftm_` followed by 12 uppercase
/// hex digits, most significant byte first.
pub fn ssid_for(mac: &MacAddress) -> String {
    let mut ssid = String::with_capacity(SSID_PREFIX.len() + 12);
    ssid.push_str(SSID_PREFIX);
    for byte in mac.0 {
        ssid.push_str(&format!("{:02X}", byte));
    }
    ssid
}

/// The anchor's hardware address and the network name derived from it.
///
/// Created once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    mac: MacAddress,
    ssid: String,
}

impl NodeIdentity {
    /// Derive the identity for a hardware address.
    pub fn derive(mac: MacAddress) -> Self {
        Self {
            ssid: ssid_for(&mac),
            mac,
        }
    }

    /// The base hardware address.
    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    /// The advertised network name.
    pub fn ssid(&self) -> &str {
        &self.ssid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssid_example_address() {
        let mac = MacAddress::new([0x1A, 0x2B, 0x3C, 0x4D, 0x5E, 0x6F]);
        assert_eq!(ssid_for(&mac), "ftm_1A2B3C4D5E6F");
    }

    #[test]
    fn test_ssid_uses_uppercase_and_leading_zeros() {
        let mac = MacAddress::new([0x00, 0x0a, 0xbc, 0x01, 0xff, 0x10]);
        assert_eq!(ssid_for(&mac), "ftm_000ABC01FF10");
    }

    #[test]
    fn test_ssid_shape_for_many_addresses() {
        for seed in 0u8..=255 {
            let mac = MacAddress::new([
                seed,
                seed.wrapping_mul(7),
                seed.wrapping_add(13),
                !seed,
                seed.rotate_left(3),
                seed ^ 0x5A,
            ]);
            let ssid = ssid_for(&mac);
            let digits = ssid.strip_prefix("ftm_").unwrap();
            assert_eq!(digits.len(), 12);
            assert!(digits
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));

            for (i, byte) in mac.bytes().iter().enumerate() {
                let pair = &digits[i * 2..i * 2 + 2];
                assert_eq!(u8::from_str_radix(pair, 16).unwrap(), *byte);
            }
        }
    }

    #[test]
    fn test_identity_keeps_mac() {
        let mac = MacAddress::new([1, 2, 3, 4, 5, 6]);
        let identity = NodeIdentity::derive(mac);
        assert_eq!(identity.mac(), mac);
        assert_eq!(identity.ssid(), "ftm_010203040506");
    }

    #[test]
    fn test_broadcast_address() {
        assert!(MacAddress::BROADCAST.is_broadcast());
        assert!(!MacAddress::new([0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE]).is_broadcast());
        assert_eq!(MacAddress::BROADCAST.to_string(), "FF:FF:FF:FF:FF:FF");
    }

    #[test]
    fn test_parse_mac() {
        let mac: MacAddress = "1a:2B:3c:4D:5e:6F".parse().unwrap();
        assert_eq!(mac.bytes(), [0x1A, 0x2B, 0x3C, 0x4D, 0x5E, 0x6F]);

        let dashed: MacAddress = "1A-2B-3C-4D-5E-6F".parse().unwrap();
        assert_eq!(dashed, mac);
    }

    #[test]
    fn test_parse_mac_rejects_bad_input() {
        assert!("1A:2B:3C:4D:5E".parse::<MacAddress>().is_err());
        assert!("1A:2B:3C:4D:5E:6F:70".parse::<MacAddress>().is_err());
        assert!("1A:2B:3C:4D:5E:GG".parse::<MacAddress>().is_err());
        assert!("1A2:B:3C:4D:5E:6F".parse::<MacAddress>().is_err());
        assert!("".parse::<MacAddress>().is_err());
    }
}
