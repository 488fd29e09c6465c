use crate::hci::constants::{BD_ADDR_LEN, LINK_KEY_LEN};
use std::fmt;

/// Bluetooth device address, stored in on-the-wire (little-endian) order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BdAddr {
    pub bytes: [u8; BD_ADDR_LEN],
}

impl BdAddr {
    pub fn new(bytes: [u8; BD_ADDR_LEN]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() >= BD_ADDR_LEN {
            let mut bytes = [0u8; BD_ADDR_LEN];
            bytes.copy_from_slice(&slice[0..BD_ADDR_LEN]);
            Some(Self { bytes })
        } else {
            None
        }
    }

    /// Parse an address written in display order, e.g. `AA:BB:CC:DD:EE:FF`
    ///
    /// Octets may be separated by `:` or `-`, or written as twelve contiguous
    /// hex digits. The result is in wire order, so the first displayed octet
    /// ends up last.
    pub fn parse_display(text: &str) -> Option<Self> {
        let text = text.trim();
        let digits: String = if text.contains([':', '-']) {
            let parts: Vec<&str> = text.split([':', '-']).collect();
            if parts.len() != BD_ADDR_LEN || parts.iter().any(|part| part.len() != 2) {
                return None;
            }
            parts.concat()
        } else {
            text.to_string()
        };

        let mut bytes: [u8; BD_ADDR_LEN] = hex::decode(digits).ok()?.try_into().ok()?;
        bytes.reverse();
        Some(Self { bytes })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

/// Lowercase display order, the form written to the configuration
impl fmt::LowerHex for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

/// 16-byte BR/EDR link key
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LinkKey {
    pub bytes: [u8; LINK_KEY_LEN],
}

impl LinkKey {
    pub fn new(bytes: [u8; LINK_KEY_LEN]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes = slice.get(..LINK_KEY_LEN)?.try_into().ok()?;
        Some(Self { bytes })
    }

    /// Decode a key from hex, two digits per byte
    ///
    /// Digits beyond the sixteenth byte are ignored; anything shorter or
    /// containing non-hex characters is rejected.
    pub fn parse_hex(text: &str) -> Option<Self> {
        let text = text.trim();
        let needed = LINK_KEY_LEN * 2;
        let digits = text.get(..needed)?;
        let decoded = hex::decode(digits).ok()?;
        Self::from_slice(&decoded)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

// Keys are secrets; keep them out of debug logs
impl fmt::Debug for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LinkKey(..)")
    }
}
