//! Transfer lifecycle manager
//!
//! Every guest request passes through [`TransferManager::submit`]. It is
//! either answered on the spot with a fabricated reply, or wrapped in a
//! [`Transfer`] and handed to the transport, which gives it back to
//! [`TransferManager::complete`] on the event pump thread. Either way the
//! guest receives exactly one reply per request.
//!
//! The one completion that does not run on the pump is for a transfer the
//! transport refuses (it is closed): the pump will never see it, so it is
//! completed with `NoDevice` on the submitting thread before `submit` returns.

use super::fake_reply::FakeReply;
use super::retry::{wait_for_command_complete, RetryPolicy};
use super::routing::{route_control, ControlRoute};
use super::state::SessionState;
use crate::guest::{ControlRequest, DataRequest, GuestBindings, GuestRequest, RequestHandle};
use crate::hci::constants::*;
use crate::hci::{HciCommand, HciEvent, LinkKeyNotification};
use crate::keys::BdAddr;
use crate::sync_button::SyncButtonEvent;
use crate::usb::{
    Completion, ControlSetup, PendingRequest, Rejected, Transfer, TransferKind, TransferStatus,
    UsbTransport, TRANSFER_TIMEOUT,
};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;

const FAILURE_NOTICE_DURATION: Duration = Duration::from_secs(10);
const SYNC_NOTICE_DURATION: Duration = Duration::from_secs(2);

/// How a submitted request was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Replied to before `submit` returned
    Answered,
    /// Handed to the transport; the reply follows from the completion
    Deferred,
}

pub struct TransferManager<T: UsbTransport> {
    transport: Arc<T>,
    guest: GuestBindings,
    state: Arc<SessionState>,
    is_first_party: bool,
    retry: RetryPolicy,
}

impl<T: UsbTransport> TransferManager<T> {
    pub fn new(
        transport: Arc<T>,
        guest: GuestBindings,
        state: Arc<SessionState>,
        is_first_party: bool,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            guest,
            state,
            is_first_party,
            retry,
        }
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }

    /// Accept one guest request
    pub fn submit(&self, request: GuestRequest) -> Dispatch {
        // Done before any more data moves so the guest never sees the adapter
        // without its keys
        self.resync_link_keys_if_needed();

        match request {
            GuestRequest::Control(request) => self.submit_control(request),
            GuestRequest::Bulk(request) => self.submit_data(request, TransferKind::Bulk),
            GuestRequest::Interrupt(request) => {
                if let Some(fake) = self.state.take_interrupt_fake(request.length as usize) {
                    self.answer_with_fake(&request, fake);
                    return Dispatch::Answered;
                }
                self.submit_data(request, TransferKind::Interrupt)
            }
        }
    }

    fn submit_control(&self, request: ControlRequest) -> Dispatch {
        let mut raw_opcode = [0u8; 2];
        self.guest.memory.read(request.data_address, &mut raw_opcode);
        let opcode = u16::from_le_bytes(raw_opcode);

        match route_control(opcode, self.is_first_party) {
            ControlRoute::FakeReadBufferSize => {
                debug!("Holding back Read Buffer Size for a fabricated reply");
                self.state.fake_read_buffer_size.set();
                self.reply(request.handle, request.length as u32);
                return Dispatch::Answered;
            }
            ControlRoute::FakeVendorReply(opcode) => {
                debug!("Holding back vendor command 0x{:04x} for a fabricated reply", opcode);
                self.state.fake_vendor_reply.set(opcode);
                self.reply(request.handle, request.length as u32);
                return Dispatch::Answered;
            }
            ControlRoute::DeleteStoredLinkKey => self.mirror_delete_stored_link_key(&request),
            ControlRoute::Forward => {}
        }

        let mut buffer = vec![0u8; request.length as usize];
        self.guest.memory.read(request.data_address, &mut buffer);

        let setup = ControlSetup {
            request_type: request.request_type,
            request: request.request,
            value: request.value,
            index: request.index,
        };
        let transfer = Transfer {
            request: PendingRequest {
                handle: request.handle,
                kind: TransferKind::Control(setup),
                endpoint: 0,
                data_address: request.data_address,
                length: request.length,
            },
            buffer,
            timeout: TRANSFER_TIMEOUT,
        };
        self.dispatch(transfer)
    }

    fn submit_data(&self, request: DataRequest, kind: TransferKind) -> Dispatch {
        let mut buffer = vec![0u8; request.length as usize];
        if !request.is_inbound() {
            self.guest.memory.read(request.data_address, &mut buffer);
        }

        let transfer = Transfer {
            request: PendingRequest {
                handle: request.handle,
                kind,
                endpoint: request.endpoint,
                data_address: request.data_address,
                length: request.length,
            },
            buffer,
            timeout: TRANSFER_TIMEOUT,
        };
        self.dispatch(transfer)
    }

    fn dispatch(&self, transfer: Transfer) -> Dispatch {
        match self.transport.submit(transfer) {
            Ok(()) => Dispatch::Deferred,
            Err(Rejected(transfer)) => {
                warn!(
                    "Transport refused request {}; replying with no data",
                    transfer.request.handle
                );
                self.complete(Completion {
                    transfer,
                    status: TransferStatus::NoDevice,
                    actual_length: 0,
                });
                Dispatch::Answered
            }
        }
    }

    fn answer_with_fake(&self, request: &DataRequest, fake: FakeReply) {
        match fake {
            FakeReply::SyncButton(SyncButtonEvent::Pressed) => self
                .guest
                .notifier
                .notice("Sync button pressed: scanning for remotes", SYNC_NOTICE_DURATION),
            FakeReply::SyncButton(SyncButtonEvent::Held) => self.guest.notifier.notice(
                "Sync button held: resetting saved remote pairings",
                SYNC_NOTICE_DURATION,
            ),
            _ => debug!("Answering event poll {} with {:?}", request.handle, fake),
        }

        let length = fake.write_to(self.guest.memory.as_ref(), request.data_address);
        self.reply(request.handle, length as u32);
    }

    /// Apply the guest's Delete Stored Link Key to our own copy of the keys
    fn mirror_delete_stored_link_key(&self, request: &ControlRequest) {
        let mut params = [0u8; BD_ADDR_LEN + 1];
        if (request.length as usize) < HCI_COMMAND_HEADER_SIZE + params.len() {
            warn!(
                "Delete Stored Link Key {} is too short to mirror ({} bytes)",
                request.handle, request.length
            );
            return;
        }
        self.guest.memory.read(
            request.data_address + HCI_COMMAND_HEADER_SIZE as u32,
            &mut params,
        );

        let mut keys = self.state.link_keys.lock();
        if params[BD_ADDR_LEN] != 0 {
            info!("Guest deleted all stored link keys");
            keys.delete_all();
        } else if let Some(bd_addr) = BdAddr::from_slice(&params) {
            if keys.delete(&bd_addr).is_some() {
                info!("Guest deleted the stored link key for {}", bd_addr);
            }
        }
    }

    /// Handle a finished transfer. Runs on the event pump thread.
    pub fn complete(&self, completion: Completion) {
        self.track_failures(&completion);

        let data = completion.data();
        let request = &completion.transfer.request;
        if request.is_inbound() && !data.is_empty() {
            self.guest.memory.write(request.data_address, data);
        }

        if completion.status == TransferStatus::Completed
            && request.kind == TransferKind::Interrupt
            && request.endpoint == HCI_EVENT_ENDPOINT
        {
            self.inspect_event(data);
        }

        self.reply(request.handle, completion.actual_length as u32);
    }

    fn track_failures(&self, completion: &Completion) {
        let is_control = matches!(completion.transfer.request.kind, TransferKind::Control(_));
        let failed = match completion.status {
            TransferStatus::Completed | TransferStatus::NoDevice => false,
            TransferStatus::TimedOut => is_control,
            _ => true,
        };

        if !failed {
            self.state.failure_noticed.clear();
            return;
        }

        error!(
            "USB {} transfer {} failed, status: {:?}",
            if is_control { "command" } else { "data" },
            completion.transfer.request.handle,
            completion.status
        );
        if self.state.failure_noticed.set() {
            let notifier = &self.guest.notifier;
            if is_control {
                notifier.notice(
                    "Failed to send a command to the Bluetooth adapter.",
                    FAILURE_NOTICE_DURATION,
                );
            } else {
                notifier.notice(
                    "Failed to transfer to or from to the Bluetooth adapter.",
                    FAILURE_NOTICE_DURATION,
                );
            }
            notifier.notice(
                "It may not be compatible with passthrough mode.",
                FAILURE_NOTICE_DURATION,
            );
        }
    }

    fn inspect_event(&self, data: &[u8]) {
        let Some(event) = HciEvent::parse(data) else {
            return;
        };

        if let Some(notification) = LinkKeyNotification::from_event(&event) {
            info!("Storing link key for {}", notification.bd_addr);
            self.state
                .link_keys
                .lock()
                .upsert(notification.bd_addr, notification.key);
        } else if event.is_command_complete(HCI_CMD_RESET) {
            debug!("Adapter reset completed; stored link keys need restoring");
            self.state.need_key_resync.set();
        }
    }

    /// Restore the adapter's stored link keys after it has been reset
    ///
    /// Only third-party adapters lose their keys on reset.
    pub fn resync_link_keys_if_needed(&self) {
        if self.is_first_party || !self.state.need_key_resync.test_and_clear() {
            return;
        }

        info!("Adapter was reset; restoring stored link keys");
        self.send_command_and_wait(&HciCommand::DeleteStoredLinkKey {
            bd_addr: BdAddr::default(),
            delete_all: true,
        });

        let entries = self.state.link_keys.lock().entries();
        for batch in entries.chunks(MAX_KEYS_PER_WRITE) {
            self.send_command_and_wait(&HciCommand::WriteStoredLinkKey {
                keys: batch.to_vec(),
            });
        }
        if !entries.is_empty() {
            info!("Restored {} link keys to the adapter", entries.len());
        }
    }

    /// Send a command on the owning thread and wait a bounded time for it
    /// to complete. Returns whether the completion was seen.
    pub fn send_command_and_wait(&self, command: &HciCommand) -> bool {
        let Some(packet) = command.to_packet() else {
            warn!("HCI command 0x{:04x} is too large to send", command.opcode());
            return false;
        };

        if let Err(e) = self.transport.write_command(&packet, TRANSFER_TIMEOUT) {
            warn!("Failed to send HCI command 0x{:04x}: {}", command.opcode(), e);
            return false;
        }
        debug!("Sent HCI command 0x{:04x} to adapter", command.opcode());

        wait_for_command_complete(self.transport.as_ref(), command.opcode(), self.retry)
    }

    fn reply(&self, handle: RequestHandle, length: u32) {
        self.guest.replies.reply(handle, length);
    }
}
