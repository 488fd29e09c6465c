//! btpassthrough - Bluetooth HCI passthrough for emulated host controllers
//!
//! This library bridges a virtual machine's emulated Bluetooth USB host
//! controller to a real USB Bluetooth adapter. Guest commands and data are
//! forwarded to the adapter, while a few are intercepted so the guest sees a
//! well-behaved controller: buffer sizes are reported as fixed figures,
//! vendor pairing commands are answered locally for third-party adapters,
//! and pairing keys are restored after the adapter forgets them on reset.

pub mod config;
pub mod error;
pub mod guest;
pub mod hci;
pub mod keys;
pub mod latch;
pub mod session;
pub mod sync_button;
pub mod transfer;
pub mod usb;

#[cfg(test)]
pub(crate) mod testing;

// Re-export common types for convenience
pub use config::PassthroughConfig;
pub use error::{PassthroughError, Result};
pub use guest::{
    ControlRequest, DataRequest, GuestBindings, GuestMemory, GuestRequest, Notifier, ReplySink,
    RequestHandle,
};
pub use hci::{HciCommand, HciEvent};
pub use keys::{BdAddr, LinkKey, LinkKeyStore, SharedLinkKeys};
pub use session::{PassthroughSession, SavedState};
pub use sync_button::{SyncButton, SyncButtonEvent, SyncButtonState};
pub use transfer::{Dispatch, RetryPolicy, TransferManager};
pub use usb::{RusbTransport, UsbTransport};
