//! rusb implementation of the adapter transport
//!
//! rusb only exposes blocking transfers, so every pipe (the control endpoint,
//! the event endpoint and each ACL direction) gets a worker lane that performs
//! its transfers in submission order and posts the results to a completion
//! channel. A pending ACL read never holds up an ACL write. The session's event pump drains that channel, which
//! keeps every completion callback on a single thread.

use super::discovery::{is_bluetooth_interface, is_first_party, is_wanted_device, DeviceFilter};
use super::transport::*;
use crate::error::{PassthroughError, Result};
use crate::hci::constants::{BLUETOOTH_INTERFACE, HCI_EVENT_ENDPOINT};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rusb::{Context, Device, DeviceHandle, UsbContext};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Identity of the bound adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    pub is_first_party: bool,
    pub manufacturer: String,
    pub product: String,
    pub serial_number: String,
}

/// The pipe a transfer is queued on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lane {
    Control,
    Event,
    AclIn,
    AclOut,
}

impl Lane {
    const ALL: [Lane; 4] = [Lane::Control, Lane::Event, Lane::AclIn, Lane::AclOut];

    fn for_request(request: &PendingRequest) -> Self {
        match request.kind {
            TransferKind::Control(_) => Self::Control,
            TransferKind::Interrupt => Self::Event,
            TransferKind::Bulk if request.is_inbound() => Self::AclIn,
            TransferKind::Bulk => Self::AclOut,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Event => "event",
            Self::AclIn => "acl-in",
            Self::AclOut => "acl-out",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

struct Lanes {
    senders: [Sender<Transfer>; 4],
}

impl Lanes {
    fn get(&self, lane: Lane) -> &Sender<Transfer> {
        &self.senders[lane.index()]
    }
}

pub struct RusbTransport {
    handle: Arc<DeviceHandle<Context>>,
    interface: u8,
    lanes: Mutex<Option<Lanes>>,
    completions: Receiver<Completion>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    closed: Arc<AtomicBool>,
}

impl RusbTransport {
    /// Find, open and claim the first adapter accepted by `filter`
    pub fn open(filter: &DeviceFilter) -> Result<(Self, AdapterInfo)> {
        let context = Context::new()?;
        let devices = context.devices()?;

        for device in devices.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    warn!("Failed to get device descriptor: {}", e);
                    continue;
                }
            };
            let (vendor_id, product_id) = (descriptor.vendor_id(), descriptor.product_id());

            let config = match device.active_config_descriptor() {
                Ok(config) => config,
                Err(e) => {
                    error!(
                        "Failed to get config descriptor for device {:04x}:{:04x}: {}",
                        vendor_id, product_id, e
                    );
                    continue;
                }
            };

            let matches = config
                .interfaces()
                .find(|interface| interface.number() == BLUETOOTH_INTERFACE)
                .and_then(|interface| interface.descriptors().next())
                .is_some_and(|alt| {
                    is_bluetooth_interface(
                        alt.class_code(),
                        alt.sub_class_code(),
                        alt.protocol_code(),
                        filter,
                    )
                });
            if !matches || !is_wanted_device(vendor_id, product_id, filter) {
                continue;
            }

            let handle = match open_device(&device) {
                Ok(handle) => handle,
                Err(e) => {
                    error!("{}", e);
                    continue;
                }
            };

            let info = AdapterInfo {
                vendor_id,
                product_id,
                is_first_party: is_first_party(vendor_id, product_id),
                manufacturer: handle
                    .read_manufacturer_string_ascii(&descriptor)
                    .unwrap_or_default(),
                product: handle.read_product_string_ascii(&descriptor).unwrap_or_default(),
                serial_number: handle
                    .read_serial_number_string_ascii(&descriptor)
                    .unwrap_or_default(),
            };
            let version = descriptor.device_version();
            info!(
                "Using device {:04x}:{:04x} (rev {}.{}.{}) for Bluetooth: {} {} {}",
                vendor_id,
                product_id,
                version.major(),
                version.minor(),
                version.sub_minor(),
                info.manufacturer,
                info.product,
                info.serial_number
            );

            return Ok((Self::start(handle, BLUETOOTH_INTERFACE)?, info));
        }

        Err(PassthroughError::NotFound)
    }

    fn start(handle: DeviceHandle<Context>, interface: u8) -> Result<Self> {
        let handle = Arc::new(handle);
        let closed = Arc::new(AtomicBool::new(false));
        let (completion_tx, completions) = channel::unbounded();

        let mut workers = Vec::with_capacity(Lane::ALL.len());
        let mut spawn_lane = |lane: Lane| -> Result<Sender<Transfer>> {
            let (tx, rx) = channel::unbounded();
            let handle = Arc::clone(&handle);
            let completion_tx = completion_tx.clone();
            let closed = Arc::clone(&closed);
            let worker = thread::Builder::new()
                .name(format!("bt-usb-{}", lane.name()))
                .spawn(move || run_lane(&handle, &rx, &completion_tx, &closed))?;
            workers.push(worker);
            Ok(tx)
        };

        let lanes = Lanes {
            senders: [
                spawn_lane(Lane::Control)?,
                spawn_lane(Lane::Event)?,
                spawn_lane(Lane::AclIn)?,
                spawn_lane(Lane::AclOut)?,
            ],
        };

        Ok(Self {
            handle,
            interface,
            lanes: Mutex::new(Some(lanes)),
            completions,
            workers: Mutex::new(workers),
            closed,
        })
    }
}

fn open_device(device: &Device<Context>) -> Result<DeviceHandle<Context>> {
    let handle = device.open().map_err(PassthroughError::OpenFailed)?;

    match handle.detach_kernel_driver(BLUETOOTH_INTERFACE) {
        Ok(()) | Err(rusb::Error::NotFound) | Err(rusb::Error::NotSupported) => {}
        Err(e) => return Err(PassthroughError::DetachFailed(e)),
    }

    handle
        .claim_interface(BLUETOOTH_INTERFACE)
        .map_err(|source| PassthroughError::ClaimFailed {
            interface: BLUETOOTH_INTERFACE,
            source,
        })?;

    Ok(handle)
}

fn run_lane(
    handle: &DeviceHandle<Context>,
    queue: &Receiver<Transfer>,
    completions: &Sender<Completion>,
    closed: &AtomicBool,
) {
    for mut transfer in queue.iter() {
        let result = if closed.load(Ordering::Acquire) {
            Err(rusb::Error::NoDevice)
        } else {
            execute(handle, &mut transfer)
        };

        let (status, actual_length) = TransferStatus::from_usb(&result);
        let completion = Completion {
            transfer,
            status,
            actual_length,
        };
        if completions.send(completion).is_err() {
            break;
        }
    }
}

fn execute(handle: &DeviceHandle<Context>, transfer: &mut Transfer) -> rusb::Result<usize> {
    let Transfer {
        request,
        buffer,
        timeout,
    } = transfer;
    let (endpoint, timeout) = (request.endpoint, *timeout);

    match request.kind {
        TransferKind::Control(setup) if setup.is_inbound() => handle.read_control(
            setup.request_type,
            setup.request,
            setup.value,
            setup.index,
            buffer,
            timeout,
        ),
        TransferKind::Control(setup) => handle.write_control(
            setup.request_type,
            setup.request,
            setup.value,
            setup.index,
            buffer,
            timeout,
        ),
        TransferKind::Bulk if request.is_inbound() => handle.read_bulk(endpoint, buffer, timeout),
        TransferKind::Bulk => handle.write_bulk(endpoint, buffer, timeout),
        TransferKind::Interrupt if request.is_inbound() => {
            handle.read_interrupt(endpoint, buffer, timeout)
        }
        TransferKind::Interrupt => handle.write_interrupt(endpoint, buffer, timeout),
    }
}

impl UsbTransport for RusbTransport {
    fn submit(&self, transfer: Transfer) -> std::result::Result<(), Rejected> {
        let lanes = self.lanes.lock();
        let Some(lanes) = lanes.as_ref() else {
            return Err(Rejected(transfer));
        };

        let lane = Lane::for_request(&transfer.request);
        lanes
            .get(lane)
            .send(transfer)
            .map_err(|e| Rejected(e.into_inner()))
    }

    fn next_completion(&self, timeout: Duration) -> PumpEvent {
        match self.completions.recv_timeout(timeout) {
            Ok(completion) => PumpEvent::Completed(completion),
            Err(RecvTimeoutError::Timeout) => PumpEvent::Idle,
            Err(RecvTimeoutError::Disconnected) => PumpEvent::Closed,
        }
    }

    fn write_command(&self, packet: &[u8], timeout: Duration) -> Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PassthroughError::TransportClosed);
        }
        Ok(self
            .handle
            .write_control(RequestType::HCI_COMMAND.bits(), 0, 0, 0, packet, timeout)?)
    }

    fn read_event(&self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PassthroughError::TransportClosed);
        }
        Ok(self.handle.read_interrupt(HCI_EVENT_ENDPOINT, buf, timeout)?)
    }

    fn release_interface(&self) {
        if let Err(e) = self.handle.release_interface(self.interface) {
            warn!("Failed to release interface {}: {}", self.interface, e);
        }
    }

    fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        // Dropping the senders lets each lane drain its queue and exit
        drop(self.lanes.lock().take());

        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.join().is_err() {
                error!("USB transfer worker panicked");
            }
        }
        debug!("USB transport shut down");
    }
}

impl Drop for RusbTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guest::RequestHandle;
    use crate::hci::constants::{ACL_DATA_IN_ENDPOINT, ACL_DATA_OUT_ENDPOINT};

    fn request(kind: TransferKind, endpoint: u8) -> PendingRequest {
        PendingRequest {
            handle: RequestHandle(1),
            kind,
            endpoint,
            data_address: 0,
            length: 16,
        }
    }

    #[test]
    fn test_each_pipe_has_its_own_lane() {
        let command = ControlSetup {
            request_type: RequestType::HCI_COMMAND.bits(),
            request: 0,
            value: 0,
            index: 0,
        };
        assert_eq!(
            Lane::for_request(&request(TransferKind::Control(command), 0)),
            Lane::Control
        );
        assert_eq!(
            Lane::for_request(&request(TransferKind::Interrupt, HCI_EVENT_ENDPOINT)),
            Lane::Event
        );
        assert_eq!(
            Lane::for_request(&request(TransferKind::Bulk, ACL_DATA_IN_ENDPOINT)),
            Lane::AclIn
        );
        assert_eq!(
            Lane::for_request(&request(TransferKind::Bulk, ACL_DATA_OUT_ENDPOINT)),
            Lane::AclOut
        );
    }

    #[test]
    fn test_lane_indices_match_spawn_order() {
        for (index, lane) in Lane::ALL.iter().enumerate() {
            assert_eq!(lane.index(), index);
        }
    }
}
