//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the AC bridge.
//!
//! | Namespace   | Key          | Contents                        |
//! |-------------|--------------|---------------------------------|
//! | `accontrol` | `syscfg`     | postcard [`SystemConfig`]       |
//! | `accontrol` | `settings`   | postcard last known AC settings |
//! | `auth`      | `wifi_ssid`  | station SSID (UTF-8)            |
//! | `auth`      | `wifi_pass`  | station passphrase (UTF-8)      |
//!
//! - Config validation: all fields are range-checked before persistence
//!   and again after loading.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//! - The simulation backend is an in-memory map (dev/test only).

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::{SystemConfig, HTTPD_SOCKET_LIMIT};
use crate::pins::CAN_CAPABLE_GPIOS;
use crate::protocol::frame::MAX_EXTENDED_ID;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "accontrol";
const CONFIG_KEY: &str = "syscfg";

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 4000;
const CRED_NAMESPACE: &str = "auth";
const WIFI_SSID_KEY: &str = "wifi_ssid";
const WIFI_PASS_KEY: &str = "wifi_pass";

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called from the single main-task context before any
            // concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32 || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK as i32 {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// NUL-terminated copy of an NVS name (max 15 chars).
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns_buf = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(namespace: &str, key: &str) -> Result<Vec<u8>, i32> {
        Self::with_nvs_handle(namespace, false, |handle| {
            let key_buf = Self::c_name(key);
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH as i32);
            }
            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(buf)
        })
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(namespace: &str, key: &str, data: &[u8]) -> Result<(), i32> {
        Self::with_nvs_handle(namespace, true, |handle| {
            let key_buf = Self::c_name(key);
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    data.as_ptr() as *const _,
                    data.len(),
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(())
        })
    }
}

/// Range-check every field. Invalid values are rejected, never clamped.
pub fn validate_config(cfg: &SystemConfig) -> Result<(), ConfigError> {
    if !CAN_CAPABLE_GPIOS.contains(&cfg.can_tx_gpio) {
        return Err(ConfigError::ValidationFailed(
            "can_tx_gpio is not a usable TWAI pin",
        ));
    }
    if !CAN_CAPABLE_GPIOS.contains(&cfg.can_rx_gpio) {
        return Err(ConfigError::ValidationFailed(
            "can_rx_gpio is not a usable TWAI pin",
        ));
    }
    if cfg.can_tx_gpio == cfg.can_rx_gpio {
        return Err(ConfigError::ValidationFailed(
            "can_tx_gpio and can_rx_gpio must differ",
        ));
    }
    if cfg.http_port == 0 {
        return Err(ConfigError::ValidationFailed("http_port must be non-zero"));
    }
    if cfg.max_ws_clients == 0 {
        return Err(ConfigError::ValidationFailed("max_ws_clients must be at least 1"));
    }
    if cfg.http_open_sockets() > HTTPD_SOCKET_LIMIT {
        return Err(ConfigError::ValidationFailed(
            "max_ws_clients leaves no httpd sockets for /api",
        ));
    }
    if !(1..=1000).contains(&cfg.control_loop_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "control_loop_interval_ms must be 1–1000",
        ));
    }
    if !(5..=3600).contains(&cfg.status_interval_secs) {
        return Err(ConfigError::ValidationFailed(
            "status_interval_secs must be 5–3600",
        ));
    }
    if cfg.sweep_interval_secs != 0 && !(5..=3600).contains(&cfg.sweep_interval_secs) {
        return Err(ConfigError::ValidationFailed(
            "sweep_interval_secs must be 0 or 5–3600",
        ));
    }
    let ids = &cfg.frame_ids;
    let too_large = [ids.status, ids.set_temp, ids.fan_speed, ids.mode]
        .iter()
        .chain(ids.zones.iter())
        .chain(ids.power.iter())
        .any(|&id| id > MAX_EXTENDED_ID);
    if too_large {
        return Err(ConfigError::ValidationFailed(
            "frame identifiers must fit in 29 bits",
        ));
    }
    if ids.has_duplicates() {
        return Err(ConfigError::ValidationFailed(
            "frame identifiers must be unique",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        let stored = self
            .store
            .borrow()
            .get(&Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY))
            .cloned();

        #[cfg(target_os = "espidf")]
        let stored = match Self::read_blob(CONFIG_NAMESPACE, CONFIG_KEY) {
            Ok(bytes) => Some(bytes),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => None,
            Err(e) => {
                warn!("NvsAdapter: NVS read error {}, using defaults", e);
                None
            }
        };

        let Some(bytes) = stored else {
            info!("NvsAdapter: no stored config, using defaults");
            return Ok(SystemConfig::default());
        };
        let cfg: SystemConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        validate_config(&cfg)?;
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY), bytes);
            info!("NvsAdapter: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            match Self::write_blob(CONFIG_NAMESPACE, CONFIG_KEY, &bytes) {
                Ok(()) => {
                    info!("NvsAdapter: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE as i32 => Err(ConfigError::StorageFull),
                Err(e) => {
                    warn!("NvsAdapter: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            match self.store.borrow().get(&Self::composite_key(namespace, key)) {
                Some(data) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(len)
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let key_buf = Self::c_name(key);
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_buf.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Err(StorageError::NotFound),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(Self::composite_key(namespace, key), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            match Self::write_blob(namespace, key, data) {
                Ok(()) => Ok(()),
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE as i32 => Err(StorageError::Full),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .remove(&Self::composite_key(namespace, key));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let key_buf = Self::c_name(key);
                let ret = unsafe { nvs_erase_key(handle, key_buf.as_ptr() as *const _) };
                if ret != ESP_OK as i32 && ret != ESP_ERR_NVS_NOT_FOUND as i32 {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|_| StorageError::IoError)
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow()
                .contains_key(&Self::composite_key(namespace, key))
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let key_buf = Self::c_name(key);
                let ret = unsafe {
                    nvs_find_key(handle, key_buf.as_ptr() as *const _, core::ptr::null_mut())
                };
                Ok(ret == ESP_OK as i32)
            });
            result.unwrap_or(false)
        }
    }
}

impl Default for NvsAdapter {
    /// Adapter without flash initialisation. Only a fallback when
    /// [`NvsAdapter::new`] failed; every call may then report an error.
    fn default() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        }
    }
}

// ── WiFi credentials ───────────────────────────────────────────────
//
// Kept in the "auth" namespace so a factory reset can wipe them
// without touching the bus configuration.
impl NvsAdapter {
    /// Persist station credentials.
    pub fn store_wifi_credentials(&mut self, ssid: &str, password: &str) -> Result<(), StorageError> {
        self.write(CRED_NAMESPACE, WIFI_SSID_KEY, ssid.as_bytes())?;
        self.write(CRED_NAMESPACE, WIFI_PASS_KEY, password.as_bytes())
    }

    /// Stored station credentials, if both halves are present and UTF-8.
    pub fn wifi_credentials(&self) -> Option<(heapless::String<32>, heapless::String<64>)> {
        let mut buf = [0u8; 64];
        let len = self.read(CRED_NAMESPACE, WIFI_SSID_KEY, &mut buf).ok()?;
        let ssid = core::str::from_utf8(&buf[..len]).ok()?.try_into().ok()?;
        let len = self.read(CRED_NAMESPACE, WIFI_PASS_KEY, &mut buf).ok()?;
        let password = core::str::from_utf8(&buf[..len]).ok()?.try_into().ok()?;
        Some((ssid, password))
    }

    /// Whether a config blob has ever been saved (false on first boot).
    pub fn has_stored_config(&self) -> bool {
        self.exists(CONFIG_NAMESPACE, CONFIG_KEY)
    }

    /// Remove stored station credentials (factory reset).
    pub fn erase_wifi_credentials(&mut self) -> Result<(), StorageError> {
        self.delete(CRED_NAMESPACE, WIFI_SSID_KEY)?;
        self.delete(CRED_NAMESPACE, WIFI_PASS_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameIds;

    fn rejected(cfg: SystemConfig) -> bool {
        matches!(validate_config(&cfg), Err(ConfigError::ValidationFailed(_)))
    }

    #[test]
    fn default_config_passes_validation() {
        assert!(validate_config(&SystemConfig::default()).is_ok());
    }

    #[test]
    fn rejects_shared_can_pins() {
        assert!(rejected(SystemConfig {
            can_tx_gpio: 4,
            can_rx_gpio: 4,
            ..Default::default()
        }));
    }

    #[test]
    fn rejects_non_twai_pin() {
        assert!(rejected(SystemConfig {
            can_tx_gpio: 6,
            ..Default::default()
        }));
    }

    #[test]
    fn ws_clients_fit_the_httpd_socket_budget() {
        assert!(!rejected(SystemConfig {
            max_ws_clients: 10,
            ..Default::default()
        }));
        assert!(rejected(SystemConfig {
            max_ws_clients: 11,
            ..Default::default()
        }));
        assert!(rejected(SystemConfig {
            max_ws_clients: 0,
            ..Default::default()
        }));
    }

    #[test]
    fn sweep_interval_zero_or_in_range() {
        assert!(!rejected(SystemConfig {
            sweep_interval_secs: 30,
            ..Default::default()
        }));
        assert!(rejected(SystemConfig {
            sweep_interval_secs: 1,
            ..Default::default()
        }));
    }

    #[test]
    fn rejects_bad_identifiers() {
        let mut ids = FrameIds::default();
        ids.power = Some(0x2000_0000);
        assert!(rejected(SystemConfig {
            frame_ids: ids,
            ..Default::default()
        }));

        let mut ids = FrameIds::default();
        ids.mode = ids.fan_speed;
        assert!(rejected(SystemConfig {
            frame_ids: ids,
            ..Default::default()
        }));
    }

    #[test]
    fn config_save_load_round_trip() {
        let nvs = NvsAdapter::new().unwrap();
        let cfg = SystemConfig {
            log_raw_frames: true,
            sweep_interval_secs: 30,
            ..Default::default()
        };
        nvs.save(&cfg).unwrap();
        assert_eq!(nvs.load().unwrap(), cfg);
    }

    #[test]
    fn invalid_config_is_not_saved() {
        let nvs = NvsAdapter::new().unwrap();
        let cfg = SystemConfig {
            http_port: 0,
            ..Default::default()
        };
        assert!(nvs.save(&cfg).is_err());
        assert_eq!(nvs.load().unwrap(), SystemConfig::default());
    }

    #[test]
    fn corrupted_config_is_reported() {
        let mut nvs = NvsAdapter::new().unwrap();
        nvs.write(CONFIG_NAMESPACE, CONFIG_KEY, &[0xFF; 3]).unwrap();
        assert_eq!(nvs.load(), Err(ConfigError::Corrupted));
    }

    #[test]
    fn storage_round_trip() {
        let mut nvs = NvsAdapter::new().unwrap();
        nvs.write("test_ns", "greeting", b"hello NVS").unwrap();
        assert!(nvs.exists("test_ns", "greeting"));

        let mut buf = [0u8; 64];
        let len = nvs.read("test_ns", "greeting", &mut buf).unwrap();
        assert_eq!(&buf[..len], b"hello NVS");

        nvs.delete("test_ns", "greeting").unwrap();
        assert!(!nvs.exists("test_ns", "greeting"));
        assert_eq!(
            nvs.read("test_ns", "greeting", &mut buf),
            Err(StorageError::NotFound)
        );
    }

    #[test]
    fn wifi_credentials_round_trip() {
        let mut nvs = NvsAdapter::new().unwrap();
        assert!(nvs.wifi_credentials().is_none());
        nvs.store_wifi_credentials("HomeNet", "hunter22").unwrap();
        let (ssid, pass) = nvs.wifi_credentials().unwrap();
        assert_eq!(ssid.as_str(), "HomeNet");
        assert_eq!(pass.as_str(), "hunter22");
        nvs.erase_wifi_credentials().unwrap();
        assert!(nvs.wifi_credentials().is_none());
    }
}
