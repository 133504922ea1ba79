//! Settings store bootstrap.
//!
//! The WiFi driver needs the default NVS partition to be usable before it is
//! initialized, even though the anchor keeps its own WiFi configuration in
//! RAM. A partition that is full or was written by a newer NVS version is
//! erased and initialized once more; anything else is fatal.

#[cfg(feature = "esp32")]
mod esp;

#[cfg(feature = "esp32")]
pub use esp::EspSettingsStore;

use log::{info, warn};
use std::fmt;

/// Why the store refused to initialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The partition has no free pages (`ESP_ERR_NVS_NO_FREE_PAGES`).
    NoFreePages,
    /// The partition holds data from a newer format (`ESP_ERR_NVS_NEW_VERSION_FOUND`).
    NewVersionFound,
    /// Any other failure.
    Other,
}

/// A failed settings store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    /// Driver error code.
    pub code: i32,
    /// Symbolic name of `code`.
    pub name: &'static str,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, code: i32, name: &'static str) -> Self {
        Self { kind, code, name }
    }

    /// Whether erasing the partition can fix this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.kind,
            StoreErrorKind::NoFreePages | StoreErrorKind::NewVersionFound
        )
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "settings store error: {} ({})", self.name, self.code)
    }
}

impl std::error::Error for StoreError {}

/// Non-volatile key-value store backing the WiFi driver.
pub trait SettingsStore {
    /// Initialize the default partition.
    fn init(&mut self) -> Result<(), StoreError>;

    /// Erase the default partition.
    fn erase(&mut self) -> Result<(), StoreError>;
}

/// Initialize `store`, erasing it once if its contents are unusable.
pub fn init_with_recovery<S: SettingsStore>(store: &mut S) -> Result<(), StoreError> {
    match store.init() {
        Ok(()) => Ok(()),
        Err(e) if e.is_recoverable() => {
            warn!("NVS unusable ({}), erasing partition", e.name);
            store.erase()?;
            store.init()?;
            info!("NVS erased and reinitialized");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// In-memory store replaying scripted `init` results (host only).
///
/// Once the script runs out, `init` succeeds.
#[cfg(not(feature = "esp32"))]
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    init_results: std::collections::VecDeque<Result<(), StoreError>>,
    erase_result: Option<StoreError>,
    init_calls: usize,
    erase_calls: usize,
}

#[cfg(not(feature = "esp32"))]
impl MemorySettingsStore {
    /// A store whose `init` always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose first `init` calls return `results` in order.
    pub fn with_init_results(results: Vec<Result<(), StoreError>>) -> Self {
        Self {
            init_results: results.into(),
            ..Self::default()
        }
    }

    /// Make `erase` fail with `error`.
    pub fn failing_erase(mut self, error: StoreError) -> Self {
        self.erase_result = Some(error);
        self
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls
    }

    pub fn erase_calls(&self) -> usize {
        self.erase_calls
    }
}

#[cfg(not(feature = "esp32"))]
impl SettingsStore for MemorySettingsStore {
    fn init(&mut self) -> Result<(), StoreError> {
        self.init_calls += 1;
        self.init_results.pop_front().unwrap_or(Ok(()))
    }

    fn erase(&mut self) -> Result<(), StoreError> {
        self.erase_calls += 1;
        match &self.erase_result {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}
