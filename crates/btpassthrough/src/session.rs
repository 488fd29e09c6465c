//! Passthrough session
//!
//! A session binds one physical adapter to the guest: it owns the transport,
//! the transfer manager and the background event pump, and tears them down
//! in an order that never leaves a completion without a receiver.

use crate::config::PassthroughConfig;
use crate::error::{PassthroughError, Result};
use crate::guest::{GuestBindings, GuestRequest};
use crate::hci::HciCommand;
use crate::keys::SharedLinkKeys;
use crate::sync_button::SyncButtonState;
use crate::transfer::{Dispatch, RetryPolicy, SessionState, TransferManager};
use crate::usb::{AdapterInfo, DeviceFilter, PumpEvent, RusbTransport, UsbTransport};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const PUMP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Marker written into saved state while passthrough is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedState {
    pub passthrough_bluetooth: bool,
}

pub struct PassthroughSession<T: UsbTransport> {
    transport: Arc<T>,
    manager: Arc<TransferManager<T>>,
    state: Arc<SessionState>,
    guest: GuestBindings,
    is_first_party: bool,
    running: Arc<AtomicBool>,
    pump: Option<JoinHandle<()>>,
    torn_down: bool,
}

impl PassthroughSession<RusbTransport> {
    /// Bind the first matching USB adapter
    pub fn open(
        config: &PassthroughConfig,
        link_keys: SharedLinkKeys,
        guest: GuestBindings,
    ) -> Result<Self> {
        Self::open_with(config, link_keys, guest, RusbTransport::open)
    }
}

impl<T: UsbTransport> PassthroughSession<T> {
    /// Bind the adapter returned by `opener` for the configured filter
    ///
    /// When no usable adapter exists the operator is alerted and the owning
    /// system is asked to stop; the error is not retried.
    pub fn open_with<F>(
        config: &PassthroughConfig,
        link_keys: SharedLinkKeys,
        guest: GuestBindings,
        opener: F,
    ) -> Result<Self>
    where
        F: FnOnce(&DeviceFilter) -> Result<(T, AdapterInfo)>,
    {
        let filter = DeviceFilter::from_config(config);
        let (transport, adapter) = match opener(&filter) {
            Ok(opened) => opened,
            Err(e) => {
                warn!("Could not open a Bluetooth adapter: {}", e);
                guest.notifier.alert(
                    "Bluetooth passthrough mode is enabled, but no usable Bluetooth USB device \
                     was found. Aborting.",
                );
                guest.notifier.request_stop();
                return Err(e);
            }
        };

        Self::start(
            transport,
            adapter.is_first_party,
            link_keys,
            guest,
            RetryPolicy::default(),
        )
    }

    /// Start a session over an already opened transport
    pub fn start(
        transport: T,
        is_first_party: bool,
        link_keys: SharedLinkKeys,
        guest: GuestBindings,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let transport = Arc::new(transport);
        let state = Arc::new(SessionState::new(link_keys));
        let manager = Arc::new(TransferManager::new(
            Arc::clone(&transport),
            guest.clone(),
            Arc::clone(&state),
            is_first_party,
            retry,
        ));

        let mut session = Self {
            transport,
            manager,
            state,
            guest,
            is_first_party,
            running: Arc::new(AtomicBool::new(false)),
            pump: None,
            torn_down: false,
        };
        session.start_event_pump()?;
        Ok(session)
    }

    fn start_event_pump(&mut self) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let transport = Arc::clone(&self.transport);
        let manager = Arc::clone(&self.manager);
        let pump = thread::Builder::new()
            .name("BT USB Thread".into())
            .spawn(move || run_event_pump(transport.as_ref(), &manager))?;
        self.pump = Some(pump);
        Ok(())
    }

    /// Stop the transport and wait for the pump to deliver what is left
    fn stop_event_pump(&mut self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }

        self.transport.shutdown();
        if let Some(pump) = self.pump.take() {
            if pump.join().is_err() {
                warn!("Bluetooth event pump panicked");
            }
        }
    }

    pub fn is_first_party(&self) -> bool {
        self.is_first_party
    }

    pub fn is_active(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn link_keys(&self) -> &SharedLinkKeys {
        &self.state.link_keys
    }

    /// Hand a guest request to the transfer manager
    pub fn submit(&self, request: GuestRequest) -> Dispatch {
        if !self.is_active() {
            debug!("Request {} arrived after close", request.handle());
        }
        self.manager.submit(request)
    }

    /// Feed a sample of the physical sync button
    pub fn update_sync_button(&self, is_held: bool) -> SyncButtonState {
        self.state.sync_button.lock().update(is_held)
    }

    pub fn trigger_sync_button_pressed(&self) {
        self.state.sync_button.lock().trigger_pressed();
    }

    pub fn trigger_sync_button_held(&self) {
        self.state.sync_button.lock().trigger_held();
    }

    pub fn save_state(&self) -> SavedState {
        SavedState {
            passthrough_bluetooth: true,
        }
    }

    /// Refuse to restore saved state: the adapter's live state cannot be rewound
    pub fn load_state(&self, saved: &SavedState) -> Result<()> {
        let notifier = &self.guest.notifier;
        if saved.passthrough_bluetooth {
            notifier.alert("Attempted to load a state. Bluetooth passthrough cannot be restored.");
        } else {
            notifier.notice(
                "State needs Bluetooth passthrough to be disabled. Aborting load.",
                Duration::from_secs(4),
            );
        }
        warn!("Rejected state restore while Bluetooth passthrough is active");
        Err(PassthroughError::StateRestoreRejected)
    }

    /// Guest-initiated close: release the adapter without resetting it
    pub fn close(&mut self) {
        if !self.is_active() {
            return;
        }
        self.transport.release_interface();
        self.stop_event_pump();
        info!("Bluetooth passthrough closed");
    }

    /// Final teardown: reset the adapter, close, and persist the link keys
    pub fn shutdown(&mut self, config: &mut PassthroughConfig) {
        self.teardown();
        config.store_link_keys(&self.state.link_keys.lock());
    }

    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if self.is_active() {
            if !self.manager.send_command_and_wait(&HciCommand::Reset) {
                warn!("Adapter did not confirm the reset before shutdown");
            }
            self.close();
        }
    }
}

impl<T: UsbTransport> Drop for PassthroughSession<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn run_event_pump<T: UsbTransport>(transport: &T, manager: &TransferManager<T>) {
    debug!("Bluetooth event pump started");
    loop {
        match transport.next_completion(PUMP_POLL_INTERVAL) {
            PumpEvent::Completed(completion) => manager.complete(completion),
            PumpEvent::Idle => {}
            PumpEvent::Closed => break,
        }
    }
    debug!("Bluetooth event pump stopped");
}
