//! Shadow copy of the pairing keys held by the physical adapter
//!
//! Some adapters forget every stored link key when they are reset, which
//! breaks pairings that the guest expects the controller to remember. The
//! store keeps its own copy so the keys can be written back after a reset.

use super::types::{BdAddr, LinkKey};
use crate::error::LinkKeyParseError;
use log::warn;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Link key store shared between the owning thread and the event pump
pub type SharedLinkKeys = Arc<Mutex<LinkKeyStore>>;

/// Ordered map of device address to link key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkKeyStore {
    keys: BTreeMap<BdAddr, LinkKey>,
}

impl LinkKeyStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the persisted `address=hexkey,address=hexkey` form
    ///
    /// Malformed entries are logged and skipped.
    pub fn load(text: &str) -> Self {
        let mut store = Self::new();
        for entry in text.split(',').filter(|entry| !entry.trim().is_empty()) {
            match parse_entry(entry) {
                Ok((bd_addr, key)) => store.upsert(bd_addr, key),
                Err(e) => warn!("Skipping stored link key: {}", e),
            }
        }
        store
    }

    /// Serialize back to the persisted form, addresses in display order
    pub fn save(&self) -> String {
        self.keys
            .iter()
            .map(|(bd_addr, key)| format!("{:x}={}", bd_addr, key.to_hex()))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Insert or replace the key for an address
    pub fn upsert(&mut self, bd_addr: BdAddr, key: LinkKey) {
        self.keys.insert(bd_addr, key);
    }

    /// Remove the key for an address, returning it if present
    pub fn delete(&mut self, bd_addr: &BdAddr) -> Option<LinkKey> {
        self.keys.remove(bd_addr)
    }

    pub fn delete_all(&mut self) {
        self.keys.clear();
    }

    pub fn get(&self, bd_addr: &BdAddr) -> Option<&LinkKey> {
        self.keys.get(bd_addr)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BdAddr, &LinkKey)> {
        self.keys.iter()
    }

    /// Copy the entries out in serialization order
    pub fn entries(&self) -> Vec<(BdAddr, LinkKey)> {
        self.keys.iter().map(|(a, k)| (*a, *k)).collect()
    }

    /// Wrap the store for sharing with the event pump
    pub fn into_shared(self) -> SharedLinkKeys {
        Arc::new(Mutex::new(self))
    }
}

fn parse_entry(entry: &str) -> Result<(BdAddr, LinkKey), LinkKeyParseError> {
    let (address, key) = entry
        .split_once('=')
        .ok_or_else(|| LinkKeyParseError::MissingSeparator(entry.to_string()))?;
    let bd_addr = BdAddr::parse_display(address)
        .ok_or_else(|| LinkKeyParseError::InvalidAddress(address.to_string()))?;
    let key = LinkKey::parse_hex(key)
        .ok_or_else(|| LinkKeyParseError::InvalidKey(bd_addr.to_string()))?;
    Ok((bd_addr, key))
}
