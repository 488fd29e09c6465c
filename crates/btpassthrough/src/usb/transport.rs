//! Transport boundary between the transfer manager and the USB adapter
//!
//! Guest requests that reach the adapter are wrapped in a [`Transfer`] which
//! owns the [`PendingRequest`] until the transport hands it back inside a
//! [`Completion`]. The completion is consumed by exactly one callback on the
//! event pump thread.

use crate::error::Result;
use crate::guest::RequestHandle;
use bitflags::bitflags;
use std::time::Duration;

/// Timeout for transfers submitted on behalf of the guest
pub const TRANSFER_TIMEOUT: Duration = Duration::from_millis(200);

bitflags! {
    /// `bmRequestType` of a USB control setup packet
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RequestType: u8 {
        const DEVICE_TO_HOST = 0x80;
        const VENDOR = 0x40;
        const CLASS = 0x20;
        const ENDPOINT = 0x02;
        const INTERFACE = 0x01;
    }
}

impl RequestType {
    /// Request type used to send an HCI command to a primary controller
    pub const HCI_COMMAND: Self = Self::CLASS.union(Self::INTERFACE);

    pub fn is_inbound(self) -> bool {
        self.contains(Self::DEVICE_TO_HOST)
    }
}

/// Setup fields of a control transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSetup {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
}

impl ControlSetup {
    pub fn is_inbound(&self) -> bool {
        RequestType::from_bits_retain(self.request_type).is_inbound()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Control(ControlSetup),
    Bulk,
    Interrupt,
}

/// A guest request that has been handed to the transport
///
/// Deliberately neither `Clone` nor `Copy`: exactly one value exists per
/// request, and replying consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct PendingRequest {
    pub handle: RequestHandle,
    pub kind: TransferKind,
    pub endpoint: u8,
    pub data_address: u32,
    pub length: u16,
}

impl PendingRequest {
    pub fn is_inbound(&self) -> bool {
        match self.kind {
            TransferKind::Control(setup) => setup.is_inbound(),
            TransferKind::Bulk | TransferKind::Interrupt => self.endpoint & 0x80 != 0,
        }
    }
}

/// A submission: the pending request plus the buffer the transport fills or drains
#[derive(Debug)]
pub struct Transfer {
    pub request: PendingRequest,
    pub buffer: Vec<u8>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Completed,
    TimedOut,
    Stall,
    Overflow,
    Cancelled,
    NoDevice,
    Error,
}

impl TransferStatus {
    /// Classify the outcome of a synchronous rusb call
    pub fn from_usb(result: &std::result::Result<usize, rusb::Error>) -> (Self, usize) {
        match result {
            Ok(length) => (Self::Completed, *length),
            Err(rusb::Error::Timeout) => (Self::TimedOut, 0),
            Err(rusb::Error::Pipe) => (Self::Stall, 0),
            Err(rusb::Error::Overflow) => (Self::Overflow, 0),
            Err(rusb::Error::Interrupted) => (Self::Cancelled, 0),
            Err(rusb::Error::NoDevice) => (Self::NoDevice, 0),
            Err(_) => (Self::Error, 0),
        }
    }
}

/// A finished transfer handed back to the transfer manager
#[derive(Debug)]
pub struct Completion {
    pub transfer: Transfer,
    pub status: TransferStatus,
    pub actual_length: usize,
}

impl Completion {
    /// Bytes the transport actually moved
    pub fn data(&self) -> &[u8] {
        let end = self.actual_length.min(self.transfer.buffer.len());
        &self.transfer.buffer[..end]
    }
}

/// What the event pump saw while waiting for completions
#[derive(Debug)]
pub enum PumpEvent {
    Completed(Completion),
    Idle,
    /// No more completions will ever arrive
    Closed,
}

/// A transfer the transport refused to accept
#[derive(Debug)]
pub struct Rejected(pub Transfer);

/// The physical adapter as seen by the transfer manager
pub trait UsbTransport: Send + Sync + 'static {
    /// Queue an asynchronous transfer. Its completion is later returned by
    /// [`UsbTransport::next_completion`].
    fn submit(&self, transfer: Transfer) -> std::result::Result<(), Rejected>;

    /// Wait up to `timeout` for the next finished transfer
    fn next_completion(&self, timeout: Duration) -> PumpEvent;

    /// Synchronously send an HCI command packet over the control endpoint
    fn write_command(&self, packet: &[u8], timeout: Duration) -> Result<usize>;

    /// Synchronously read one packet from the HCI event endpoint
    fn read_event(&self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    fn release_interface(&self);

    /// Stop accepting transfers. Anything still queued completes with
    /// [`TransferStatus::NoDevice`], after which the pump sees `Closed`.
    fn shutdown(&self);
}
