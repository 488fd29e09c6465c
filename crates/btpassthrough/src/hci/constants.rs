//! HCI protocol constants
//!
//! This module contains the HCI opcodes, event codes and USB framing values
//! the passthrough layer inspects or fabricates.

// Sizes of the fixed headers (USB framing carries no packet-type indicator)
pub const HCI_COMMAND_HEADER_SIZE: usize = 3;
pub const HCI_EVENT_HEADER_SIZE: usize = 2;

// Maximum size of HCI command parameters
pub const HCI_MAX_PARAM_LEN: usize = 255;

// Common OGF (Opcode Group Field) values
pub const OGF_HOST_CTL: u8 = 0x03;
pub const OGF_INFO_PARAM: u8 = 0x04;
pub const OGF_VENDOR: u8 = 0x3F;

// Host Controller Commands (OGF: 0x03)
pub const OCF_RESET: u16 = 0x0003;
pub const OCF_WRITE_STORED_LINK_KEY: u16 = 0x0011;
pub const OCF_DELETE_STORED_LINK_KEY: u16 = 0x0012;

// Informational Parameters (OGF: 0x04)
pub const OCF_READ_BUFFER_SIZE: u16 = 0x0005;

/// Build a 16-bit opcode from its group and command fields
pub const fn opcode(ogf: u8, ocf: u16) -> u16 {
    ((ogf as u16) << 10) | (ocf & 0x03ff)
}

pub const HCI_CMD_RESET: u16 = opcode(OGF_HOST_CTL, OCF_RESET);
pub const HCI_CMD_WRITE_STORED_LINK_KEY: u16 = opcode(OGF_HOST_CTL, OCF_WRITE_STORED_LINK_KEY);
pub const HCI_CMD_DELETE_STORED_LINK_KEY: u16 = opcode(OGF_HOST_CTL, OCF_DELETE_STORED_LINK_KEY);
pub const HCI_CMD_READ_BUFFER_SIZE: u16 = opcode(OGF_INFO_PARAM, OCF_READ_BUFFER_SIZE);

// Vendor pairing commands understood only by the first-party module
pub const HCI_CMD_VENDOR_PAIRING_A: u16 = 0xFC4C;
pub const HCI_CMD_VENDOR_PAIRING_B: u16 = 0xFC4F;

// HCI Events
pub const EVT_CMD_COMPLETE: u8 = 0x0E;
pub const EVT_LINK_KEY_NOTIFICATION: u8 = 0x18;
pub const EVT_VENDOR: u8 = 0xFF;

// Vendor event payloads emitted by the sync button
pub const SYNC_BUTTON_PRESSED_PAYLOAD: u8 = 0x08;
pub const SYNC_BUTTON_HELD_PAYLOAD: u8 = 0x09;

// Figures reported in place of the adapter's own buffer sizes
pub const ACL_PKT_SIZE: u16 = 339;
pub const ACL_PKT_NUM: u16 = 10;
pub const SCO_PKT_SIZE: u8 = 64;
pub const SCO_PKT_NUM: u16 = 0;

pub const BD_ADDR_LEN: usize = 6;
pub const LINK_KEY_LEN: usize = 16;

// Write Stored Link Key carries a count byte then (address, key) pairs
pub const MAX_KEYS_PER_WRITE: usize = (HCI_MAX_PARAM_LEN - 1) / (BD_ADDR_LEN + LINK_KEY_LEN);

// USB endpoints of a Bluetooth primary controller
pub const HCI_EVENT_ENDPOINT: u8 = 0x81;
pub const ACL_DATA_IN_ENDPOINT: u8 = 0x82;
pub const ACL_DATA_OUT_ENDPOINT: u8 = 0x02;
pub const BLUETOOTH_INTERFACE: u8 = 0;

// Interface class triple of a Bluetooth primary controller
pub const USB_CLASS_WIRELESS: u8 = 0xE0;
pub const USB_SUBCLASS_RF: u8 = 0x01;
pub const USB_PROTOCOL_BLUETOOTH: u8 = 0x01;

// First-party module identity
pub const FIRST_PARTY_VENDOR_ID: u16 = 0x057E;
pub const FIRST_PARTY_PRODUCT_ID: u16 = 0x0305;
