//! Host-based anchor for development.
//!
//! Runs the full startup sequence and the broadcast loop against the
//! simulated radio, logging exactly what the firmware would log.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin host-anchor
//! ANCHOR_SEND_HZ=5 ANCHOR_MAC=1A:2B:3C:4D:5E:6F cargo run --bin host-anchor
//! ```

#[cfg(not(feature = "esp32"))]
fn main() {
    use ftm_anchor_esp32::radio::host::DEFAULT_SIM_MAC;
    use ftm_anchor_esp32::{
        start, AnchorConfig, AnchorContext, MacAddress, MemorySettingsStore, SimulatedRadio,
        ThreadSleeper,
    };
    use log::{error, info};

    /// Environment variable overriding the simulated base MAC.
    const ENV_MAC: &str = "ANCHOR_MAC";

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("=== FTM anchor starting (host simulation) ===");

    let config = match AnchorConfig::default().with_overrides(|name| std::env::var(name).ok()) {
        Ok(config) => config,
        Err(e) => {
            error!("Fatal: {}", e);
            std::process::exit(1);
        }
    };

    let mac = match std::env::var(ENV_MAC) {
        Ok(value) => match value.parse::<MacAddress>() {
            Ok(mac) => mac,
            Err(e) => {
                error!("Fatal: {}: {}", ENV_MAC, e);
                std::process::exit(1);
            }
        },
        Err(_) => DEFAULT_SIM_MAC,
    };

    let mut ctx = AnchorContext::new(config);
    let mut radio = SimulatedRadio::with_base_mac(mac);
    let mut store = MemorySettingsStore::new();

    match start(&mut ctx, &mut radio, &mut store) {
        Ok(anchor) => {
            info!("Entering send loop (Ctrl+C to exit)...");
            anchor.run(&mut ThreadSleeper)
        }
        Err(e) => {
            error!("Fatal: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "esp32")]
fn main() {
    println!("host-anchor runs against the simulated radio; build it without the 'esp32' feature.");
}
