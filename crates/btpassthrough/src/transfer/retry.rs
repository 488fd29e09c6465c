//! Bounded waits for Command Complete events

use crate::error::PassthroughError;
use crate::hci::HciEvent;
use crate::usb::UsbTransport;
use log::{debug, warn};
use std::time::Duration;

/// How long to keep polling the event endpoint for a command to complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub per_attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 100,
            per_attempt_timeout: Duration::from_millis(20),
        }
    }
}

/// Poll the event endpoint until a Command Complete for `opcode` arrives
///
/// Gives up after `policy.attempts` reads, or immediately once the adapter is
/// gone. Returns whether the completion was seen.
pub fn wait_for_command_complete<T: UsbTransport + ?Sized>(
    transport: &T,
    opcode: u16,
    policy: RetryPolicy,
) -> bool {
    let mut buffer = vec![0u8; 1024];
    for attempt in 0..policy.attempts {
        match transport.read_event(&mut buffer, policy.per_attempt_timeout) {
            Ok(length) => {
                let completed = HciEvent::parse(&buffer[..length])
                    .is_some_and(|event| event.is_command_complete(opcode));
                if completed {
                    debug!(
                        "Command 0x{:04x} completed after {} reads",
                        opcode,
                        attempt + 1
                    );
                    return true;
                }
            }
            Err(PassthroughError::Usb(rusb::Error::NoDevice))
            | Err(PassthroughError::TransportClosed) => break,
            Err(_) => {}
        }
    }

    warn!("Gave up waiting for command 0x{:04x} to complete", opcode);
    false
}
