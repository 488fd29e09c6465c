//! HCI packet structures and parsing
//!
//! This module contains structures and methods for the HCI commands the
//! passthrough layer issues on its own and the events it inspects on the way
//! back to the guest. Packets are framed as on the USB transport: commands go
//! out over the control endpoint and events arrive on the interrupt endpoint,
//! neither carrying a packet-type indicator byte.

use crate::hci::constants::*;
use crate::keys::{BdAddr, LinkKey};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

/// HCI command header structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HciCommandHeader {
    pub opcode: u16,
    pub param_len: u8,
}

impl HciCommandHeader {
    /// Parse a command header from the start of a command packet
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < HCI_COMMAND_HEADER_SIZE {
            return None;
        }

        let mut cursor = Cursor::new(data);
        let opcode = cursor.read_u16::<LittleEndian>().ok()?;
        let param_len = cursor.read_u8().ok()?;

        Some(Self { opcode, param_len })
    }
}

/// Commands the passthrough layer sends to the adapter itself
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum HciCommand {
    Reset,
    DeleteStoredLinkKey { bd_addr: BdAddr, delete_all: bool },
    WriteStoredLinkKey { keys: Vec<(BdAddr, LinkKey)> },
}

impl HciCommand {
    /// Get the 16-bit opcode for this command
    pub fn opcode(&self) -> u16 {
        match self {
            Self::Reset => HCI_CMD_RESET,
            Self::DeleteStoredLinkKey { .. } => HCI_CMD_DELETE_STORED_LINK_KEY,
            Self::WriteStoredLinkKey { .. } => HCI_CMD_WRITE_STORED_LINK_KEY,
        }
    }

    /// Convert the command to its raw parameter bytes
    fn parameters(&self) -> Vec<u8> {
        match self {
            Self::Reset => vec![],

            Self::DeleteStoredLinkKey { bd_addr, delete_all } => {
                let mut params = Vec::with_capacity(BD_ADDR_LEN + 1);
                params.extend_from_slice(bd_addr.as_slice());
                params.push(*delete_all as u8);
                params
            }

            Self::WriteStoredLinkKey { keys } => {
                let mut params =
                    Vec::with_capacity(1 + keys.len() * (BD_ADDR_LEN + LINK_KEY_LEN));
                params.push(keys.len() as u8);
                for (bd_addr, key) in keys {
                    params.extend_from_slice(bd_addr.as_slice());
                    params.extend_from_slice(key.as_slice());
                }
                params
            }
        }
    }

    /// Convert the command to a raw HCI command packet
    ///
    /// Returns `None` when the parameters do not fit the one-byte length field.
    pub fn to_packet(&self) -> Option<Vec<u8>> {
        let params = self.parameters();
        if params.len() > HCI_MAX_PARAM_LEN {
            return None;
        }

        let mut packet = Vec::with_capacity(HCI_COMMAND_HEADER_SIZE + params.len());
        packet.write_u16::<LittleEndian>(self.opcode()).ok()?;
        packet.push(params.len() as u8);
        packet.extend_from_slice(&params);
        Some(packet)
    }
}

/// HCI Event packet
#[derive(Debug, Clone)]
pub struct HciEvent {
    pub event_code: u8,
    pub parameter_total_length: u8,
    pub parameters: Vec<u8>,
}

impl HciEvent {
    /// Parse an HCI event from raw bytes
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < HCI_EVENT_HEADER_SIZE {
            return None;
        }

        let event_code = data[0];
        let parameter_total_length = data[1];

        if data.len() < (parameter_total_length as usize + HCI_EVENT_HEADER_SIZE) {
            return None;
        }

        let parameters = data[HCI_EVENT_HEADER_SIZE
            ..(parameter_total_length as usize + HCI_EVENT_HEADER_SIZE)]
            .to_vec();

        Some(HciEvent {
            event_code,
            parameter_total_length,
            parameters,
        })
    }

    /// Opcode completed by this event, if it is a Command Complete event
    pub fn command_complete_opcode(&self) -> Option<u16> {
        if self.event_code != EVT_CMD_COMPLETE || self.parameters.len() < 3 {
            return None;
        }
        Some(u16::from_le_bytes([self.parameters[1], self.parameters[2]]))
    }

    /// Check if this is a Command Complete event for the given opcode
    pub fn is_command_complete(&self, opcode: u16) -> bool {
        self.command_complete_opcode() == Some(opcode)
    }
}

/// Link Key Notification event parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkKeyNotification {
    pub bd_addr: BdAddr,
    pub key: LinkKey,
}

impl LinkKeyNotification {
    /// Parse the notification out of a generic event
    pub fn from_event(event: &HciEvent) -> Option<Self> {
        if event.event_code != EVT_LINK_KEY_NOTIFICATION {
            return None;
        }
        let params = &event.parameters;
        if params.len() < BD_ADDR_LEN + LINK_KEY_LEN {
            return None;
        }

        let bd_addr = BdAddr::from_slice(&params[..BD_ADDR_LEN])?;
        let key = LinkKey::from_slice(&params[BD_ADDR_LEN..BD_ADDR_LEN + LINK_KEY_LEN])?;
        Some(Self { bd_addr, key })
    }
}

/// Size of a Command Complete event up to and including the opcode
pub const COMMAND_COMPLETE_HEADER_SIZE: usize = HCI_EVENT_HEADER_SIZE + 3;

/// Command Complete event header, laid out as on the wire:
/// event code, parameter length, allowed command packets, opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandCompleteHeader {
    pub event_code: u8,
    pub parameter_total_length: u8,
    pub num_hci_command_packets: u8,
    pub opcode: u16,
}

impl CommandCompleteHeader {
    pub fn parse(data: &[u8; COMMAND_COMPLETE_HEADER_SIZE]) -> Self {
        Self {
            event_code: data[0],
            parameter_total_length: data[1],
            num_hci_command_packets: data[2],
            opcode: u16::from_le_bytes([data[3], data[4]]),
        }
    }

    pub fn to_bytes(&self) -> [u8; COMMAND_COMPLETE_HEADER_SIZE] {
        let [lo, hi] = self.opcode.to_le_bytes();
        [
            self.event_code,
            self.parameter_total_length,
            self.num_hci_command_packets,
            lo,
            hi,
        ]
    }
}

/// Return parameters of Read Buffer Size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadBufferSizeReply {
    pub status: u8,
    pub max_acl_size: u16,
    pub max_sco_size: u8,
    pub num_acl_pkts: u16,
    pub num_sco_pkts: u16,
}

impl ReadBufferSizeReply {
    pub const SIZE: usize = 8;

    /// The fixed figures reported to the guest
    pub fn fixed() -> Self {
        Self {
            status: 0x00,
            max_acl_size: ACL_PKT_SIZE,
            max_sco_size: SCO_PKT_SIZE,
            num_acl_pkts: ACL_PKT_NUM,
            num_sco_pkts: SCO_PKT_NUM,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut result = Vec::with_capacity(Self::SIZE);
        result.push(self.status);
        result.extend_from_slice(&self.max_acl_size.to_le_bytes());
        result.push(self.max_sco_size);
        result.extend_from_slice(&self.num_acl_pkts.to_le_bytes());
        result.extend_from_slice(&self.num_sco_pkts.to_le_bytes());

        let mut bytes = [0u8; Self::SIZE];
        bytes.copy_from_slice(&result);
        bytes
    }
}
