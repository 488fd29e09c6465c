//! Link key storage
//!
//! This module provides the address and key types and the persistent store
//! of pairing keys that survives adapter resets.

pub mod store;
pub mod types;


pub use store::{LinkKeyStore, SharedLinkKeys};
pub use types::{BdAddr, LinkKey};
