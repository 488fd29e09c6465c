//! Example: Binding a USB Bluetooth adapter
//!
//! Opens the first usable adapter (or the one named in the configuration),
//! forwards a Read Local Version Information command through the session and
//! prints the event the adapter answers with. The stored link keys are
//! written back to the configuration on exit.
//!
//! Usage: cargo run --example probe_adapter -- [config.toml]

use btpassthrough::{
    ControlRequest, DataRequest, GuestBindings, GuestMemory, GuestRequest, Notifier,
    PassthroughConfig, PassthroughSession, ReplySink, RequestHandle,
};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

const COMMAND_ADDRESS: u32 = 0x000;
const EVENT_ADDRESS: u32 = 0x100;

/// A tiny stand-in for the virtual machine
struct DemoGuest {
    memory: Mutex<Vec<u8>>,
    replies: Mutex<Vec<(RequestHandle, u32)>>,
    replied: Condvar,
}

impl DemoGuest {
    fn wait_for(&self, handle: RequestHandle, timeout: Duration) -> Option<u32> {
        let mut replies = self.replies.lock();
        loop {
            if let Some(&(_, length)) = replies.iter().find(|(h, _)| *h == handle) {
                return Some(length);
            }
            if self.replied.wait_for(&mut replies, timeout).timed_out() {
                return None;
            }
        }
    }
}

impl GuestMemory for DemoGuest {
    fn read(&self, address: u32, buf: &mut [u8]) {
        let start = address as usize;
        buf.copy_from_slice(&self.memory.lock()[start..start + buf.len()]);
    }

    fn write(&self, address: u32, data: &[u8]) {
        let start = address as usize;
        self.memory.lock()[start..start + data.len()].copy_from_slice(data);
    }
}

impl ReplySink for DemoGuest {
    fn reply(&self, handle: RequestHandle, length: u32) {
        self.replies.lock().push((handle, length));
        self.replied.notify_all();
    }
}

impl Notifier for DemoGuest {
    fn notice(&self, text: &str, _duration: Duration) {
        println!("[notice] {}", text);
    }

    fn alert(&self, text: &str) {
        eprintln!("[alert] {}", text);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "btpassthrough.toml".to_string());
    let mut config = PassthroughConfig::load(&config_path)?;
    println!(
        "Loaded {} stored link keys from {}",
        config.link_key_store().len(),
        config_path
    );

    let guest = Arc::new(DemoGuest {
        memory: Mutex::new(vec![0; 0x1000]),
        replies: Mutex::new(Vec::new()),
        replied: Condvar::new(),
    });
    let bindings = GuestBindings::new(guest.clone(), guest.clone(), guest.clone());

    let mut session =
        PassthroughSession::open(&config, config.link_key_store().into_shared(), bindings)?;
    println!(
        "Adapter bound ({})",
        if session.is_first_party() {
            "first-party module"
        } else {
            "third-party adapter"
        }
    );

    // Read Local Version Information
    let command = [0x01, 0x10, 0x00];
    guest.write(COMMAND_ADDRESS, &command);
    session.submit(GuestRequest::Control(ControlRequest {
        handle: RequestHandle(1),
        request_type: 0x21,
        request: 0,
        value: 0,
        index: 0,
        length: command.len() as u16,
        data_address: COMMAND_ADDRESS,
    }));

    // Poll the event endpoint until the adapter answers
    for attempt in 0..25 {
        let handle = RequestHandle(100 + attempt);
        session.submit(GuestRequest::Interrupt(DataRequest {
            handle,
            endpoint: 0x81,
            length: 64,
            data_address: EVENT_ADDRESS,
        }));

        match guest.wait_for(handle, Duration::from_secs(1)) {
            Some(0) | None => continue,
            Some(length) => {
                let mut event = vec![0; length as usize];
                guest.read(EVENT_ADDRESS, &mut event);
                println!("Received event: {}", hex::encode(&event));
                break;
            }
        }
    }

    session.shutdown(&mut config);
    config.save(&config_path)?;
    println!("Saved link keys to {}", config_path);
    Ok(())
}
