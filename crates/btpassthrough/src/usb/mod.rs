//! USB side of the bridge
//!
//! This module provides the transport trait the transfer manager talks to,
//! its rusb implementation and adapter discovery.

pub mod backend;
pub mod discovery;
pub mod transport;

pub use backend::{AdapterInfo, RusbTransport};
pub use discovery::{is_bluetooth_interface, is_first_party, is_wanted_device, DeviceFilter};
pub use transport::{
    Completion, ControlSetup, PendingRequest, PumpEvent, Rejected, RequestType, Transfer,
    TransferKind, TransferStatus, UsbTransport, TRANSFER_TIMEOUT,
};
