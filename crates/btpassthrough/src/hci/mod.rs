//! Bluetooth HCI (Host Controller Interface) framing
//!
//! This module provides the HCI constants and the packet structures the
//! passthrough layer builds or inspects.

pub mod constants;
pub mod packet;


pub use packet::{
    CommandCompleteHeader, HciCommand, HciCommandHeader, HciEvent, LinkKeyNotification,
    ReadBufferSizeReply,
};
