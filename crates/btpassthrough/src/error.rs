//! Error types for the btpassthrough library
//!
//! This module defines the error types used throughout the library.

use thiserror::Error;

/// Errors that can occur while bridging a guest to a physical adapter
#[derive(Error, Debug)]
pub enum PassthroughError {
    #[error("No usable Bluetooth USB device was found")]
    NotFound,

    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("Failed to open Bluetooth device: {0}")]
    OpenFailed(rusb::Error),

    #[error("Failed to detach kernel driver: {0}")]
    DetachFailed(rusb::Error),

    #[error("Failed to claim interface {interface}: {source}")]
    ClaimFailed {
        interface: u8,
        #[source]
        source: rusb::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Transport has been shut down")]
    TransportClosed,

    #[error("Saved state cannot be restored while Bluetooth passthrough is active")]
    StateRestoreRejected,
}

/// Errors for a single malformed `address=key` entry in the persisted link keys
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LinkKeyParseError {
    #[error("missing '=' separator in {0:?}")]
    MissingSeparator(String),

    #[error("invalid Bluetooth address {0:?}")]
    InvalidAddress(String),

    #[error("invalid link key for {0}")]
    InvalidKey(String),
}

/// Convenience type alias for Results with `PassthroughError`.
pub type Result<T> = std::result::Result<T, PassthroughError>;
