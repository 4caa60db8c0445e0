//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to              |
//! |----------------|--------------------|--------------------------|
//! | `twai`         | BusPort            | ESP32 TWAI controller    |
//! | `log_sink`     | EventSink          | Serial log output        |
//! | `ws_push`      | EventSink          | `/ws` WebSocket clients  |
//! | `http_server`  |                    | ESP-IDF httpd (`/api`)   |
//! | `nvs`          | ConfigPort         | NVS / in-memory store    |
//! |                | StoragePort        |                          |
//! | `wifi`         | ConnectivityPort   | ESP-IDF WiFi STA         |
//! | `mdns`         |                    | mDNS responder           |
//! | `device_id`    |                    | eFuse factory MAC        |
//! | `time`         |                    | ESP32 system timer       |

pub mod device_id;
#[cfg(target_os = "espidf")]
pub mod http_server;
pub mod log_sink;
pub mod mdns;
pub mod nvs;
pub mod time;
pub mod twai;
pub(super) mod utils;
pub mod wifi;
pub mod ws_push;
