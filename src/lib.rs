//! FTM anchor firmware library.
//!
//! An anchor hosts a WiFi access point named after its hardware address with
//! the FTM responder enabled, and broadcasts a one-byte sequence number over
//! ESP-NOW once per interval so peers can range against it and sense its
//! presence.
//!
//! Everything except the ESP-IDF bindings ([`radio::esp`], the NVS store) is
//! platform-independent and tested on the host against
//! [`radio::SimulatedRadio`].

pub mod anchor;
pub mod ap;
pub mod broadcast;
pub mod config;
pub mod connection;
pub mod identity;
pub mod radio;
pub mod storage;

// Re-export commonly used items
pub use anchor::{start, AnchorContext, AnchorError, RunningAnchor};
pub use ap::{ApProfile, AuthMode};
pub use broadcast::{BroadcastMessenger, PeerEntry, SendOutcome, SequenceCounter, Sleeper, ThreadSleeper};
pub use config::{AnchorConfig, ConfigError};
pub use connection::{ConnectionEvent, ConnectionMonitor, ConnectionState};
pub use identity::{MacAddress, NodeIdentity};
pub use radio::{Bandwidth, RadioConfig, RadioDriver, RadioError, RadioStep};
pub use storage::{SettingsStore, StoreError};

#[cfg(not(feature = "esp32"))]
pub use radio::SimulatedRadio;
#[cfg(not(feature = "esp32"))]
pub use storage::MemorySettingsStore;
