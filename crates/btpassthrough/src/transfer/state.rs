//! State shared between the owning thread and the event pump

use super::fake_reply::FakeReply;
use crate::keys::SharedLinkKeys;
use crate::latch::{Latch, OpcodeLatch};
use crate::sync_button::SyncButton;
use parking_lot::Mutex;

#[derive(Debug)]
pub struct SessionState {
    pub link_keys: SharedLinkKeys,
    pub sync_button: Mutex<SyncButton>,
    /// Raised by a Read Buffer Size command, consumed by the next event poll
    pub fake_read_buffer_size: Latch,
    /// Raised by a vendor pairing command on a third-party adapter
    pub fake_vendor_reply: OpcodeLatch,
    /// Raised when the adapter reports a completed reset
    pub need_key_resync: Latch,
    /// Set while a failed transfer has been reported and nothing has succeeded since
    pub failure_noticed: Latch,
}

impl SessionState {
    pub fn new(link_keys: SharedLinkKeys) -> Self {
        Self {
            link_keys,
            sync_button: Mutex::new(SyncButton::new()),
            fake_read_buffer_size: Latch::new(),
            fake_vendor_reply: OpcodeLatch::new(),
            need_key_resync: Latch::new(),
            failure_noticed: Latch::new(),
        }
    }

    /// Pick the event to fabricate for an interrupt poll with room for
    /// `capacity` bytes, consuming its trigger
    ///
    /// Checked in order: sync button, Read Buffer Size, vendor command. When
    /// the first pending event does not fit, nothing is consumed and the poll
    /// goes to the adapter.
    pub fn take_interrupt_fake(&self, capacity: usize) -> Option<FakeReply> {
        {
            let mut button = self.sync_button.lock();
            if let Some(event) = button.pending_event() {
                let fake = FakeReply::SyncButton(event);
                if fake.encoded_len() > capacity {
                    return None;
                }
                button.take_event();
                return Some(fake);
            }
        }

        if self.fake_read_buffer_size.is_set() {
            let fits = FakeReply::ReadBufferSize.encoded_len() <= capacity;
            return (fits && self.fake_read_buffer_size.test_and_clear())
                .then_some(FakeReply::ReadBufferSize);
        }

        if self.fake_vendor_reply.is_set() {
            if FakeReply::VendorCommand(0).encoded_len() > capacity {
                return None;
            }
            return self
                .fake_vendor_reply
                .test_and_clear()
                .map(FakeReply::VendorCommand);
        }
        None
    }
}
