//! mDNS advertisement of the web API.
//!
//! The bridge answers as `accontrol-xxyyzz.local` and publishes one
//! `_http._tcp` service. Its TXT record carries the device id, firmware
//! version and the paths of the JSON API and the push socket, so a
//! browsing client can connect without knowing the URL layout.
//!
//! Advertising follows WiFi: started on connect, withdrawn on disconnect.

use log::{info, warn};

use super::device_id::DeviceIdentity;

pub const SERVICE_TYPE: &str = "_http";
pub const SERVICE_PROTO: &str = "_tcp";

/// Everything published for one bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub hostname: String,
    pub instance: String,
    pub port: u16,
    pub txt: Vec<(&'static str, String)>,
}

impl Advertisement {
    pub fn for_device(device: &DeviceIdentity, port: u16) -> Self {
        Self {
            hostname: device.hostname().to_string(),
            instance: format!("AC Control {device}"),
            port,
            txt: vec![
                ("id", device.id().to_string()),
                ("ver", env!("CARGO_PKG_VERSION").to_string()),
                ("api", "/api".to_string()),
                ("ws", "/ws".to_string()),
            ],
        }
    }

    pub fn txt(&self, key: &str) -> Option<&str> {
        self.txt
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

pub struct MdnsAdapter {
    ad: Advertisement,
    active: bool,
}

impl MdnsAdapter {
    pub fn new(device: &DeviceIdentity, port: u16) -> Self {
        Self {
            ad: Advertisement::for_device(device, port),
            active: false,
        }
    }

    pub fn advertisement(&self) -> &Advertisement {
        &self.ad
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Publish the service. A failure leaves the adapter inactive, so the
    /// next WiFi check tries again.
    pub fn start(&mut self) {
        if self.active {
            return;
        }
        match publish(&self.ad) {
            Ok(()) => {
                self.active = true;
                info!(
                    "mDNS | {}.local: {}.{} port {} ({})",
                    self.ad.hostname, SERVICE_TYPE, SERVICE_PROTO, self.ad.port, self.ad.instance
                );
            }
            Err(e) => warn!("mDNS | advertisement failed: {}", e),
        }
    }

    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        withdraw();
        self.active = false;
        info!("mDNS | withdrawn");
    }
}

#[cfg(target_os = "espidf")]
fn publish(ad: &Advertisement) -> anyhow::Result<()> {
    use std::ffi::CString;

    use esp_idf_svc::sys::{
        esp, mdns_free, mdns_hostname_set, mdns_init, mdns_instance_name_set, mdns_service_add,
        mdns_txt_item_t,
    };

    let hostname = CString::new(ad.hostname.as_str())?;
    let instance = CString::new(ad.instance.as_str())?;
    let service = CString::new(SERVICE_TYPE)?;
    let proto = CString::new(SERVICE_PROTO)?;
    let txt = ad
        .txt
        .iter()
        .map(|(k, v)| Ok((CString::new(*k)?, CString::new(v.as_str())?)))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let mut items: Vec<mdns_txt_item_t> = txt
        .iter()
        .map(|(k, v)| mdns_txt_item_t {
            key: k.as_ptr(),
            value: v.as_ptr(),
        })
        .collect();

    // SAFETY: the strings and items outlive every call below; the
    // responder copies what it keeps.
    esp!(unsafe { mdns_init() })?;
    let configured = esp!(unsafe { mdns_hostname_set(hostname.as_ptr()) })
        .and_then(|()| esp!(unsafe { mdns_instance_name_set(instance.as_ptr()) }))
        .and_then(|()| {
            esp!(unsafe {
                mdns_service_add(
                    instance.as_ptr(),
                    service.as_ptr(),
                    proto.as_ptr(),
                    ad.port,
                    items.as_mut_ptr(),
                    items.len(),
                )
            })
        });
    if configured.is_err() {
        unsafe { mdns_free() };
    }
    configured.map_err(anyhow::Error::from)
}

#[cfg(target_os = "espidf")]
fn withdraw() {
    // SAFETY: only called after a successful `publish`.
    unsafe { esp_idf_svc::sys::mdns_free() };
}

#[cfg(not(target_os = "espidf"))]
fn publish(ad: &Advertisement) -> anyhow::Result<()> {
    log::debug!("mDNS(sim) | would publish {:?}", ad.txt);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
fn withdraw() {}
