//! Decisions taken on a guest command before anything reaches the adapter

use crate::hci::constants::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRoute {
    /// Swallow the command; the next event poll gets fixed buffer figures
    FakeReadBufferSize,
    /// Swallow the command; the next event poll gets a bare Command Complete
    FakeVendorReply(u16),
    /// Mirror the deletion in the link key store, then forward
    DeleteStoredLinkKey,
    Forward,
}

/// Route an HCI command by opcode and adapter identity
pub fn route_control(opcode: u16, is_first_party: bool) -> ControlRoute {
    match opcode {
        HCI_CMD_READ_BUFFER_SIZE => ControlRoute::FakeReadBufferSize,
        HCI_CMD_VENDOR_PAIRING_A | HCI_CMD_VENDOR_PAIRING_B if !is_first_party => {
            ControlRoute::FakeVendorReply(opcode)
        }
        HCI_CMD_DELETE_STORED_LINK_KEY => ControlRoute::DeleteStoredLinkKey,
        _ => ControlRoute::Forward,
    }
}
