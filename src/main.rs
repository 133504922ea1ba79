//! FTM anchor firmware binary.
//!
//! Flash with `cargo espflash flash --bin anchor --features esp32 --release`.

#[cfg(feature = "esp32")]
fn main() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("=== FTM anchor starting ===");

    // Fatal errors panic so the IDF panic handler reboots the device.
    if let Err(e) = run() {
        log::error!("Fatal: {}", e);
        panic!("{}", e);
    }
}

#[cfg(feature = "esp32")]
fn run() -> Result<std::convert::Infallible, ftm_anchor_esp32::AnchorError> {
    use ftm_anchor_esp32::radio::EspRadio;
    use ftm_anchor_esp32::storage::EspSettingsStore;
    use ftm_anchor_esp32::{start, AnchorConfig, AnchorContext, ThreadSleeper};

    let mut ctx = AnchorContext::new(AnchorConfig::default());
    let mut radio = EspRadio::take()?;
    let mut store = EspSettingsStore;

    let anchor = start(&mut ctx, &mut radio, &mut store)?;
    anchor.run(&mut ThreadSleeper)
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin host-anchor' to run the anchor against the simulated radio.");
}
