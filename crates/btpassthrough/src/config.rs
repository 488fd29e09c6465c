//! Passthrough configuration
//!
//! Device selection overrides and the persisted link keys, stored as TOML.

use crate::error::Result;
use crate::keys::LinkKeyStore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassthroughConfig {
    /// Stored link keys, `aa:bb:cc:dd:ee:ff=<32 hex digits>` separated by commas
    #[serde(default)]
    pub link_keys: String,

    /// Vendor ID of the adapter to use
    #[serde(default)]
    pub vid: Option<u16>,

    /// Product ID of the adapter to use
    #[serde(default)]
    pub pid: Option<u16>,
}

impl PassthroughConfig {
    /// Loads configuration from `path`, or defaults if the file does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Saves the configuration to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// The vendor/product pair to bind, only when both are configured
    pub fn device_override(&self) -> Option<(u16, u16)> {
        self.vid.zip(self.pid)
    }

    pub fn link_key_store(&self) -> LinkKeyStore {
        LinkKeyStore::load(&self.link_keys)
    }

    pub fn store_link_keys(&mut self, store: &LinkKeyStore) {
        self.link_keys = store.save();
    }
}
