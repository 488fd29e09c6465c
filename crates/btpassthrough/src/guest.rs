//! Guest-facing boundary
//!
//! The virtual machine side of the bridge: the requests the emulated host
//! controller receives, guest memory access, reply delivery and operator
//! notices. The virtual machine implements these traits.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Opaque handle identifying one guest request for reply delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestHandle(pub u32);

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Control message: an HCI command for the adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRequest {
    pub handle: RequestHandle,
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
    pub data_address: u32,
}

/// Bulk or interrupt message: ACL data or an inbound HCI event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    pub handle: RequestHandle,
    pub endpoint: u8,
    pub length: u16,
    pub data_address: u32,
}

impl DataRequest {
    pub fn is_inbound(&self) -> bool {
        self.endpoint & 0x80 != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestRequest {
    Control(ControlRequest),
    Bulk(DataRequest),
    Interrupt(DataRequest),
}

impl GuestRequest {
    pub fn handle(&self) -> RequestHandle {
        match self {
            Self::Control(request) => request.handle,
            Self::Bulk(request) | Self::Interrupt(request) => request.handle,
        }
    }
}

/// Read/write access to guest physical memory
pub trait GuestMemory: Send + Sync {
    fn read(&self, address: u32, buf: &mut [u8]);
    fn write(&self, address: u32, data: &[u8]);
}

/// Delivers the single reply owed for each accepted request
pub trait ReplySink: Send + Sync {
    /// `length` is the number of bytes transferred; 0 signals no data
    fn reply(&self, handle: RequestHandle, length: u32);
}

/// Operator-facing notices
pub trait Notifier: Send + Sync {
    /// Transient on-screen message
    fn notice(&self, text: &str, duration: Duration);

    /// Blocking alert that needs the operator's attention
    fn alert(&self, text: &str);

    /// Ask the owning system to stop emulation
    fn request_stop(&self) {}
}

/// The collaborators a session talks to on the guest side
#[derive(Clone)]
pub struct GuestBindings {
    pub memory: Arc<dyn GuestMemory>,
    pub replies: Arc<dyn ReplySink>,
    pub notifier: Arc<dyn Notifier>,
}

impl GuestBindings {
    pub fn new(
        memory: Arc<dyn GuestMemory>,
        replies: Arc<dyn ReplySink>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            memory,
            replies,
            notifier,
        }
    }
}
