//! Fabricated HCI events
//!
//! Some events the guest expects cannot, or must not, come from the physical
//! adapter. They are written straight into the guest's pending interrupt
//! buffer, reusing the header already in that buffer as a template.

use crate::guest::GuestMemory;
use crate::hci::constants::*;
use crate::hci::packet::{CommandCompleteHeader, ReadBufferSizeReply, COMMAND_COMPLETE_HEADER_SIZE};
use crate::sync_button::SyncButtonEvent;
use log::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeReply {
    SyncButton(SyncButtonEvent),
    /// Command Complete for Read Buffer Size with fixed figures. The guest's
    /// stack underflows its packet accounting if told the controller buffers
    /// more than a handful of ACL packets, so the adapter's answer is never used.
    ReadBufferSize,
    /// Bare Command Complete for a vendor command the adapter never saw
    VendorCommand(u16),
}

impl FakeReply {
    /// Number of bytes `write_to` produces
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::SyncButton(_) => HCI_EVENT_HEADER_SIZE + 1,
            Self::ReadBufferSize => COMMAND_COMPLETE_HEADER_SIZE + ReadBufferSizeReply::SIZE,
            Self::VendorCommand(_) => COMMAND_COMPLETE_HEADER_SIZE,
        }
    }

    /// Write the event into guest memory at `address`, returning its length
    ///
    /// The caller must have checked that the buffer holds `encoded_len` bytes.
    pub fn write_to(&self, memory: &dyn GuestMemory, address: u32) -> usize {
        match *self {
            Self::SyncButton(event) => write_sync_button_event(memory, address, event),
            Self::ReadBufferSize => {
                let reply = ReadBufferSizeReply::fixed().to_bytes();
                let header_len = write_command_complete(
                    memory,
                    address,
                    HCI_CMD_READ_BUFFER_SIZE,
                    reply.len(),
                );
                memory.write(address + header_len as u32, &reply);
                header_len + reply.len()
            }
            Self::VendorCommand(opcode) => write_command_complete(memory, address, opcode, 0),
        }
    }
}

fn write_command_complete(
    memory: &dyn GuestMemory,
    address: u32,
    opcode: u16,
    return_len: usize,
) -> usize {
    let mut raw = [0u8; COMMAND_COMPLETE_HEADER_SIZE];
    memory.read(address, &mut raw);

    let mut header = CommandCompleteHeader::parse(&raw);
    header.event_code = EVT_CMD_COMPLETE;
    header.parameter_total_length =
        (COMMAND_COMPLETE_HEADER_SIZE - HCI_EVENT_HEADER_SIZE + return_len) as u8;
    header.num_hci_command_packets = 0x01;
    header.opcode = opcode;

    memory.write(address, &header.to_bytes());
    COMMAND_COMPLETE_HEADER_SIZE
}

fn write_sync_button_event(
    memory: &dyn GuestMemory,
    address: u32,
    event: SyncButtonEvent,
) -> usize {
    let payload = match event {
        SyncButtonEvent::Pressed => SYNC_BUTTON_PRESSED_PAYLOAD,
        SyncButtonEvent::Held => SYNC_BUTTON_HELD_PAYLOAD,
    };
    info!("Faking sync button {:?} (0x{:02x}) event packet", event, payload);

    let mut header = [0u8; HCI_EVENT_HEADER_SIZE];
    memory.read(address, &mut header);
    header[0] = EVT_VENDOR;
    header[1] = 1;
    memory.write(address, &header);
    memory.write(address + HCI_EVENT_HEADER_SIZE as u32, &[payload]);
    HCI_EVENT_HEADER_SIZE + 1
}
