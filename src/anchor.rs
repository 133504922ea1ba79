//! Anchor startup sequence.
//!
//! ```text
//! settings store recovery → radio bring-up → identity → station MAC
//!   → access point → bandwidth report → broadcast peer → send loop (forever)
//! ```
//!
//! All process-wide mutable state (bring-up latch, connection state,
//! reconnect flag) lives in [`AnchorContext`], created by the entry point and
//! passed down explicitly.

use crate::ap::{configure_access_point, ApProfile};
use crate::broadcast::{BroadcastMessenger, Sleeper};
use crate::config::{AnchorConfig, ConfigError};
use crate::connection::ConnectionMonitor;
use crate::identity::NodeIdentity;
use crate::radio::{Interface, RadioBringUp, RadioDriver, RadioError, RadioReady};
use crate::storage::{init_with_recovery, SettingsStore, StoreError};
use log::info;
use std::fmt;
use std::sync::Arc;

/// State shared between the startup path, the event handler and the loop.
#[derive(Debug)]
pub struct AnchorContext {
    config: AnchorConfig,
    bring_up: RadioBringUp,
    connection: Arc<ConnectionMonitor>,
}

impl AnchorContext {
    pub fn new(config: AnchorConfig) -> Self {
        Self {
            bring_up: RadioBringUp::new(config.radio),
            config,
            connection: Arc::new(ConnectionMonitor::new()),
        }
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    /// Station connection state machine.
    pub fn connection(&self) -> &Arc<ConnectionMonitor> {
        &self.connection
    }

    /// Bring up the radio (once; later calls are no-ops).
    pub fn bring_up_radio<D: RadioDriver>(&mut self, driver: &mut D) -> Result<RadioReady, RadioError> {
        self.bring_up.run(driver, &self.connection)
    }
}

/// A fully configured anchor, ready to broadcast.
pub struct RunningAnchor<'d, D: RadioDriver> {
    pub identity: NodeIdentity,
    pub messenger: BroadcastMessenger<'d, D>,
}

impl<'d, D: RadioDriver> RunningAnchor<'d, D> {
    /// Enter the send loop. Never returns.
    pub fn run<S: Sleeper>(self, sleeper: &mut S) -> ! {
        self.messenger.run(sleeper)
    }
}

/// Run the startup sequence up to (not including) the send loop.
///
/// Every failure here is fatal to the caller.
pub fn start<'d, D, S>(
    ctx: &mut AnchorContext,
    driver: &'d mut D,
    store: &mut S,
) -> Result<RunningAnchor<'d, D>, AnchorError>
where
    D: RadioDriver,
    S: SettingsStore,
{
    let config = ctx.config.clone();
    config.validate()?;

    init_with_recovery(store)?;

    let ready = ctx.bring_up_radio(driver)?;

    let identity = NodeIdentity::derive(driver.base_mac()?);
    driver.set_mac(Interface::Sta, identity.mac())?;

    let profile = ApProfile::new(
        &ready,
        identity.ssid(),
        &config.passphrase,
        config.max_connections,
    );
    configure_access_point(driver, &ctx.connection, &profile)?;

    let bandwidth = driver.bandwidth(Interface::Ap)?;
    info!("BW = {}", bandwidth);
    info!(
        "Started SoftAP with FTM responder support, SSID: {}",
        identity.ssid()
    );

    let messenger = BroadcastMessenger::new(driver, &ready, config.send_interval())?;

    info!("================ CSI SEND ================");
    info!(
        "wifi_channel: {}, send_frequency: {}, mac: {}",
        ready.channel(),
        config.send_frequency_hz,
        identity.mac()
    );

    Ok(RunningAnchor {
        identity,
        messenger,
    })
}

/// Fatal startup errors.
#[derive(Debug)]
pub enum AnchorError {
    /// Invalid configuration.
    Config(ConfigError),
    /// The settings store could not be initialized.
    Store(StoreError),
    /// A driver call failed.
    Radio(RadioError),
}

impl fmt::Display for AnchorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration error: {}", e),
            Self::Store(e) => write!(f, "{}", e),
            Self::Radio(e) => write!(f, "radio error: {}", e),
        }
    }
}

impl std::error::Error for AnchorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Store(e) => Some(e),
            Self::Radio(e) => Some(e),
        }
    }
}

impl From<ConfigError> for AnchorError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StoreError> for AnchorError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<RadioError> for AnchorError {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}
