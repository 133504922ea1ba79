//! One-shot radio bring-up.
//!
//! Channel and bandwidth must be fixed before the access point or the
//! broadcast layer is activated. [`RadioBringUp::run`] performs the whole
//! sequence once and hands out a [`RadioReady`] token; everything that
//! activates a role takes that token, so the ordering holds by construction.

use super::{Interface, RadioConfig, RadioDriver, RadioError};
use crate::connection::ConnectionMonitor;
use log::{debug, info};
use std::sync::Arc;

/// Proof that the radio has been brought up with a given configuration.
///
/// Only [`RadioBringUp::run`] creates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioReady {
    config: RadioConfig,
}

impl RadioReady {
    /// The configuration that was applied.
    pub fn config(&self) -> &RadioConfig {
        &self.config
    }

    /// The operating channel every role must use.
    pub fn channel(&self) -> u8 {
        self.config.channel
    }
}

/// Bring-up latch and sequence.
#[derive(Debug)]
pub struct RadioBringUp {
    config: RadioConfig,
    ready: Option<RadioReady>,
}

impl RadioBringUp {
    /// Create a latch that will apply `config`.
    pub fn new(config: RadioConfig) -> Self {
        Self {
            config,
            ready: None,
        }
    }

    /// Run the bring-up sequence.
    ///
    /// Only the first successful call touches the driver; later calls return
    /// the same token without doing anything. A failed step aborts the
    /// sequence and leaves the latch open, but callers treat that as fatal.
    pub fn run<D: RadioDriver>(
        &mut self,
        driver: &mut D,
        monitor: &Arc<ConnectionMonitor>,
    ) -> Result<RadioReady, RadioError> {
        if let Some(ready) = self.ready {
            debug!("Radio already initialized");
            return Ok(ready);
        }

        let config = self.config;
        info!(
            "Bringing up radio: channel {}, {}, secondary {:?}",
            config.channel, config.bandwidth, config.secondary
        );

        driver.init_netif()?;
        driver.create_event_loop()?;
        driver.init_wifi()?;
        driver.subscribe_connection_events(Arc::clone(monitor))?;

        // Frequent reconfiguration must not wear the flash.
        driver.set_storage_ram()?;
        driver.set_mode_ap_sta()?;

        driver.set_bandwidth(Interface::Ap, config.bandwidth)?;
        driver.set_bandwidth(Interface::Sta, config.bandwidth)?;

        driver.start()?;

        driver.set_broadcast_rate(Interface::Sta, config.tx_rate)?;
        driver.set_channel(config.channel, config.secondary)?;

        let ready = RadioReady { config };
        self.ready = Some(ready);
        info!("Radio started");
        Ok(ready)
    }
}

#[cfg(all(test, not(feature = "esp32")))]
mod tests {
    use super::*;
    use crate::radio::{Bandwidth, RadioStep, SecondaryChannel, SimulatedRadio, TxRate};

    #[test]
    fn test_bring_up_sequence_order() {
        let mut radio = SimulatedRadio::new();
        let monitor = Arc::new(ConnectionMonitor::new());
        let mut bring_up = RadioBringUp::new(RadioConfig::default());

        let ready = bring_up.run(&mut radio, &monitor).unwrap();
        assert_eq!(ready.channel(), 11);

        assert_eq!(
            radio.calls(),
            vec![
                RadioStep::InitNetif,
                RadioStep::CreateEventLoop,
                RadioStep::InitWifi,
                RadioStep::RegisterHandlers,
                RadioStep::SetStorage,
                RadioStep::SetMode,
                RadioStep::SetBandwidth(Interface::Ap),
                RadioStep::SetBandwidth(Interface::Sta),
                RadioStep::Start,
                RadioStep::SetBroadcastRate,
                RadioStep::SetChannel,
            ]
        );
    }

    #[test]
    fn test_bring_up_applies_parameters() {
        let mut radio = SimulatedRadio::new();
        let monitor = Arc::new(ConnectionMonitor::new());
        let mut bring_up = RadioBringUp::new(RadioConfig::default());
        bring_up.run(&mut radio, &monitor).unwrap();

        assert_eq!(radio.bandwidth(Interface::Ap).unwrap(), Bandwidth::Ht40);
        assert_eq!(radio.bandwidth(Interface::Sta).unwrap(), Bandwidth::Ht40);
        assert_eq!(radio.channel(), Some((11, SecondaryChannel::Below)));
        assert_eq!(radio.broadcast_rate(), Some(TxRate::Mcs0Sgi));
        assert!(radio.is_started());
        assert!(radio.has_subscriber());
    }

    #[test]
    fn test_bring_up_is_idempotent() {
        let mut radio = SimulatedRadio::new();
        let monitor = Arc::new(ConnectionMonitor::new());
        let mut bring_up = RadioBringUp::new(RadioConfig::default());

        let first = bring_up.run(&mut radio, &monitor).unwrap();
        let calls_after_first = radio.calls().len();

        let second = bring_up.run(&mut radio, &monitor).unwrap();
        assert_eq!(first, second);
        assert_eq!(radio.calls().len(), calls_after_first);
        assert_eq!(radio.count(RadioStep::InitWifi), 1);
        assert_eq!(radio.count(RadioStep::Start), 1);
    }

    #[test]
    fn test_bring_up_aborts_on_failed_step() {
        let mut radio = SimulatedRadio::new();
        radio.fail_step(RadioStep::Start);
        let monitor = Arc::new(ConnectionMonitor::new());
        let mut bring_up = RadioBringUp::new(RadioConfig::default());

        let err = bring_up.run(&mut radio, &monitor).unwrap_err();
        assert_eq!(err.step, RadioStep::Start);

        // Nothing after the failed step was attempted.
        assert_eq!(radio.count(RadioStep::SetBroadcastRate), 0);
        assert_eq!(radio.count(RadioStep::SetChannel), 0);

        // The latch stays open: a later call runs the sequence again.
        assert!(bring_up.run(&mut radio, &monitor).is_err());
        assert_eq!(radio.count(RadioStep::InitNetif), 2);
    }
}
