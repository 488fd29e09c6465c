//! Picking the physical adapter to bind

use crate::config::PassthroughConfig;
use crate::hci::constants::*;

/// Which USB devices may be used as the adapter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    /// Exact vendor/product pair; bypasses the interface class check
    pub override_ids: Option<(u16, u16)>,
}

impl DeviceFilter {
    pub fn from_config(config: &PassthroughConfig) -> Self {
        Self {
            override_ids: config.device_override(),
        }
    }
}

/// Whether the device matches the configured vendor/product, if any
pub fn is_wanted_device(vendor_id: u16, product_id: u16, filter: &DeviceFilter) -> bool {
    match filter.override_ids {
        Some(ids) => ids == (vendor_id, product_id),
        None => true,
    }
}

/// Whether an interface looks like a Bluetooth primary controller
pub fn is_bluetooth_interface(class: u8, subclass: u8, protocol: u8, filter: &DeviceFilter) -> bool {
    if filter.override_ids.is_some() {
        return true;
    }
    class == USB_CLASS_WIRELESS && subclass == USB_SUBCLASS_RF && protocol == USB_PROTOCOL_BLUETOOTH
}

/// Whether the adapter is the first-party module, which keeps its link keys
/// across resets and understands the vendor pairing commands
pub fn is_first_party(vendor_id: u16, product_id: u16) -> bool {
    vendor_id == FIRST_PARTY_VENDOR_ID && product_id == FIRST_PARTY_PRODUCT_ID
}
