//! NVS flash bootstrap on ESP32.

use super::{SettingsStore, StoreError, StoreErrorKind};
use crate::radio::esp::error_name;
use esp_idf_sys::{self as sys, esp_err_t, EspError};

/// The default NVS partition.
#[derive(Debug, Default)]
pub struct EspSettingsStore;

fn store_error(code: esp_err_t) -> StoreError {
    let kind = match code as u32 {
        sys::ESP_ERR_NVS_NO_FREE_PAGES => StoreErrorKind::NoFreePages,
        sys::ESP_ERR_NVS_NEW_VERSION_FOUND => StoreErrorKind::NewVersionFound,
        _ => StoreErrorKind::Other,
    };
    StoreError::new(kind, code, error_name(code))
}

fn check(code: esp_err_t) -> Result<(), StoreError> {
    EspError::convert(code).map_err(|e| store_error(e.code()))
}

impl SettingsStore for EspSettingsStore {
    fn init(&mut self) -> Result<(), StoreError> {
        check(unsafe { sys::nvs_flash_init() })
    }

    fn erase(&mut self) -> Result<(), StoreError> {
        check(unsafe { sys::nvs_flash_erase() })
    }
}
