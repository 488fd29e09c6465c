//! Test doubles for the guest and USB boundaries

use crate::error::{PassthroughError, Result};
use crate::guest::{GuestBindings, GuestMemory, Notifier, ReplySink, RequestHandle};
use crate::hci::constants::EVT_CMD_COMPLETE;
use crate::usb::{Completion, PumpEvent, Rejected, Transfer, TransferStatus, UsbTransport};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const GUEST_MEMORY_SIZE: usize = 0x1_0000;

/// Flat guest memory that records every reply and notice
pub struct RecordingGuest {
    memory: Mutex<Vec<u8>>,
    replies: Mutex<Vec<(RequestHandle, u32)>>,
    notices: Mutex<Vec<String>>,
    alerts: Mutex<Vec<String>>,
    stop_requested: AtomicBool,
}

impl RecordingGuest {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            memory: Mutex::new(vec![0; GUEST_MEMORY_SIZE]),
            replies: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
            alerts: Mutex::new(Vec::new()),
            stop_requested: AtomicBool::new(false),
        })
    }

    pub fn bindings(self: &Arc<Self>) -> GuestBindings {
        GuestBindings::new(self.clone(), self.clone(), self.clone())
    }

    pub fn poke(&self, address: u32, data: &[u8]) {
        GuestMemory::write(self, address, data);
    }

    pub fn peek(&self, address: u32, len: usize) -> Vec<u8> {
        let mut buf = vec![0; len];
        GuestMemory::read(self, address, &mut buf);
        buf
    }

    pub fn replies(&self) -> Vec<(RequestHandle, u32)> {
        self.replies.lock().clone()
    }

    pub fn replies_for(&self, handle: RequestHandle) -> Vec<u32> {
        self.replies
            .lock()
            .iter()
            .filter(|(h, _)| *h == handle)
            .map(|(_, len)| *len)
            .collect()
    }

    /// Wait until at least `count` replies have arrived
    pub fn wait_for_replies(&self, count: usize, timeout: Duration) -> Vec<(RequestHandle, u32)> {
        let deadline = Instant::now() + timeout;
        while self.replies.lock().len() < count && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        self.replies()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().clone()
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }
}

impl GuestMemory for RecordingGuest {
    fn read(&self, address: u32, buf: &mut [u8]) {
        let start = address as usize;
        buf.copy_from_slice(&self.memory.lock()[start..start + buf.len()]);
    }

    fn write(&self, address: u32, data: &[u8]) {
        let start = address as usize;
        self.memory.lock()[start..start + data.len()].copy_from_slice(data);
    }
}

impl ReplySink for RecordingGuest {
    fn reply(&self, handle: RequestHandle, length: u32) {
        self.replies.lock().push((handle, length));
    }
}

impl Notifier for RecordingGuest {
    fn notice(&self, text: &str, _duration: Duration) {
        self.notices.lock().push(text.to_string());
    }

    fn alert(&self, text: &str) {
        self.alerts.lock().push(text.to_string());
    }

    fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }
}

/// What the adapter saw, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Submitted(RequestHandle),
    Command(Vec<u8>),
}

struct MockInner {
    log: Mutex<Vec<Op>>,
    pending: Mutex<Vec<Transfer>>,
    completion_tx: Mutex<Option<Sender<Completion>>>,
    completion_rx: Receiver<Completion>,
    events: Mutex<VecDeque<Vec<u8>>>,
    auto_complete_commands: bool,
    closed: AtomicBool,
    released: AtomicBool,
}

/// In-memory adapter. Clones share state, so a test can keep one while the
/// session owns another.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

impl MockTransport {
    /// An adapter that answers every command with Command Complete
    pub fn new() -> Self {
        Self::build(true)
    }

    /// An adapter that never answers commands
    pub fn unresponsive() -> Self {
        Self::build(false)
    }

    fn build(auto_complete_commands: bool) -> Self {
        let (tx, rx) = channel::unbounded();
        Self {
            inner: Arc::new(MockInner {
                log: Mutex::new(Vec::new()),
                pending: Mutex::new(Vec::new()),
                completion_tx: Mutex::new(Some(tx)),
                completion_rx: rx,
                events: Mutex::new(VecDeque::new()),
                auto_complete_commands,
                closed: AtomicBool::new(false),
                released: AtomicBool::new(false),
            }),
        }
    }

    pub fn log(&self) -> Vec<Op> {
        self.inner.log.lock().clone()
    }

    pub fn commands(&self) -> Vec<Vec<u8>> {
        self.log()
            .into_iter()
            .filter_map(|op| match op {
                Op::Command(packet) => Some(packet),
                Op::Submitted(_) => None,
            })
            .collect()
    }

    pub fn command_opcodes(&self) -> Vec<u16> {
        self.commands()
            .iter()
            .map(|packet| u16::from_le_bytes([packet[0], packet[1]]))
            .collect()
    }

    pub fn pending_handles(&self) -> Vec<RequestHandle> {
        self.inner
            .pending
            .lock()
            .iter()
            .map(|t| t.request.handle)
            .collect()
    }

    /// Remove a submitted transfer so the test can complete it by hand
    pub fn take(&self, handle: RequestHandle) -> Option<Transfer> {
        let mut pending = self.inner.pending.lock();
        let index = pending.iter().position(|t| t.request.handle == handle)?;
        Some(pending.remove(index))
    }

    /// Complete a submitted transfer through the pump channel
    ///
    /// Returns `false` if the transfer is no longer pending, e.g. because
    /// the transport was shut down first.
    pub fn finish(&self, handle: RequestHandle, status: TransferStatus, data: &[u8]) -> bool {
        let tx = self.inner.completion_tx.lock();
        let (Some(tx), Some(transfer)) = (tx.as_ref(), self.take(handle)) else {
            return false;
        };
        tx.send(completion(transfer, status, data)).is_ok()
    }

    pub fn push_event(&self, event: &[u8]) {
        self.inner.events.lock().push_back(event.to_vec());
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

/// Build the completion the adapter would report for `transfer`
pub fn completion(mut transfer: Transfer, status: TransferStatus, data: &[u8]) -> Completion {
    let len = data.len().min(transfer.buffer.len());
    transfer.buffer[..len].copy_from_slice(&data[..len]);
    Completion {
        transfer,
        status,
        actual_length: len,
    }
}

/// Command Complete event for `opcode` with a success status
pub fn command_complete_event(opcode: u16) -> Vec<u8> {
    let [lo, hi] = opcode.to_le_bytes();
    vec![EVT_CMD_COMPLETE, 4, 1, lo, hi, 0x00]
}

impl UsbTransport for MockTransport {
    fn submit(&self, transfer: Transfer) -> std::result::Result<(), Rejected> {
        if self.is_closed() {
            return Err(Rejected(transfer));
        }
        self.inner
            .log
            .lock()
            .push(Op::Submitted(transfer.request.handle));
        self.inner.pending.lock().push(transfer);
        Ok(())
    }

    fn next_completion(&self, timeout: Duration) -> PumpEvent {
        match self.inner.completion_rx.recv_timeout(timeout) {
            Ok(completion) => PumpEvent::Completed(completion),
            Err(RecvTimeoutError::Timeout) => PumpEvent::Idle,
            Err(RecvTimeoutError::Disconnected) => PumpEvent::Closed,
        }
    }

    fn write_command(&self, packet: &[u8], _timeout: Duration) -> Result<usize> {
        if self.is_closed() {
            return Err(PassthroughError::TransportClosed);
        }
        self.inner.log.lock().push(Op::Command(packet.to_vec()));
        if self.inner.auto_complete_commands {
            let opcode = u16::from_le_bytes([packet[0], packet[1]]);
            self.push_event(&command_complete_event(opcode));
        }
        Ok(packet.len())
    }

    fn read_event(&self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if self.is_closed() {
            return Err(PassthroughError::TransportClosed);
        }
        match self.inner.events.lock().pop_front() {
            Some(event) => {
                let len = event.len().min(buf.len());
                buf[..len].copy_from_slice(&event[..len]);
                Ok(len)
            }
            None => Err(PassthroughError::Usb(rusb::Error::Timeout)),
        }
    }

    fn release_interface(&self) {
        self.inner.released.store(true, Ordering::Release);
    }

    fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let mut tx = self.inner.completion_tx.lock();
        let pending: Vec<_> = self.inner.pending.lock().drain(..).collect();
        if let Some(tx) = tx.take() {
            for transfer in pending {
                let _ = tx.send(completion(transfer, TransferStatus::NoDevice, &[]));
            }
        }
    }
}
