//! The client facade: one handle representing "connected to hub X".
//!
//! Owns the transport, the RPC engine, the registry of open devices, and
//! the last-error slot, and exposes the typed management operations. The
//! facade also owns teardown ordering: [`HubClient::shutdown`] closes
//! every open device (stopping its dispatcher first) before terminating
//! the connection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tracing::{info, warn};

use virthub_core::protocol::messages::{DeviceInfo, HubInfo};
use virthub_core::HubMessage;

use crate::config::{ClientConfig, HubAddr};
use crate::device::DeviceHandle;
use crate::rpc::{RpcEngine, RpcError};
use crate::transport::{ConnectionError, ErrorSlot, Transport};

/// Hub-assigned bus identifier.
pub type BusId = u32;

/// Options for [`HubClient::create_bus`].
#[derive(Debug, Clone, Default)]
pub struct BusCreateOptions {
    /// Ask the hub for a specific bus number; `None` lets the hub choose.
    pub requested_id: Option<BusId>,
}

/// Options for [`HubClient::create_device`]. Absent ids mean the hub
/// default for the device class.
#[derive(Debug, Clone, Default)]
pub struct DeviceCreateOptions {
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
}

/// Result of [`HubClient::choose_or_create_bus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChosenBus {
    pub bus_id: BusId,
    /// `true` when no bus existed and this call created one; callers that
    /// clean up after themselves remove only buses they created.
    pub created: bool,
}

/// A connected hub client.
///
/// One client owns one connection to one hub. After a connection-level
/// failure every operation keeps failing; reconnect by building a new
/// client.
pub struct HubClient {
    transport: Arc<Transport>,
    rpc: RpcEngine,
    devices: StdMutex<HashMap<String, DeviceHandle>>,
    errors: ErrorSlot,
}

impl HubClient {
    /// Connects with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] when the hub is unreachable.
    pub async fn connect(addr: &HubAddr) -> Result<Self, ConnectionError> {
        Self::connect_with_config(addr, ClientConfig::default()).await
    }

    /// Connects with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] when the hub is unreachable.
    pub async fn connect_with_config(
        addr: &HubAddr,
        config: ClientConfig,
    ) -> Result<Self, ConnectionError> {
        let errors = ErrorSlot::new();
        let transport = Transport::connect(addr, &config, errors.clone()).await?;
        let rpc = RpcEngine::new(Arc::clone(&transport), config.call_timeout());
        info!("hub client connected to {addr}");
        Ok(Self {
            transport,
            rpc,
            devices: StdMutex::new(HashMap::new()),
            errors,
        })
    }

    /// Human-readable text of the most recent failure on this client, or
    /// `None` if nothing failed yet. Overwritten by each failing call;
    /// the structured error each call returns is the primary surface.
    pub fn last_error(&self) -> Option<String> {
        self.errors.get()
    }

    // ── Hub operations ───────────────────────────────────────────────────────

    /// Asks the hub for its identity.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] on any call failure.
    pub async fn ping(&self) -> Result<HubInfo, RpcError> {
        let result = match self.rpc.call(HubMessage::Ping).await {
            Ok(HubMessage::Pong(info)) => Ok(info),
            Ok(other) => Err(unexpected(&other)),
            Err(e) => Err(e),
        };
        self.note(result)
    }

    // ── Bus operations ───────────────────────────────────────────────────────

    /// Lists all bus ids currently known to the hub. An empty list is a
    /// valid answer.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] on any call failure.
    pub async fn list_buses(&self) -> Result<Vec<BusId>, RpcError> {
        let result = match self.rpc.call(HubMessage::BusList).await {
            Ok(HubMessage::BusListOk { buses }) => Ok(buses),
            Ok(other) => Err(unexpected(&other)),
            Err(e) => Err(e),
        };
        self.note(result)
    }

    /// Asks the hub to allocate a bus and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Remote`] when a requested id is already taken.
    pub async fn create_bus(&self, options: BusCreateOptions) -> Result<BusId, RpcError> {
        let request = HubMessage::BusCreate {
            requested_id: options.requested_id,
        };
        let result = match self.rpc.call(request).await {
            Ok(HubMessage::BusCreateOk { bus_id }) => Ok(bus_id),
            Ok(other) => Err(unexpected(&other)),
            Err(e) => Err(e),
        };
        self.note(result)
    }

    /// Removes a bus.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Remote`] while devices remain on the bus; that
    /// is an expected, recoverable outcome, not a defect.
    pub async fn remove_bus(&self, bus_id: BusId) -> Result<(), RpcError> {
        let result = match self.rpc.call(HubMessage::BusRemove { bus_id }).await {
            Ok(HubMessage::BusRemoveOk { .. }) => Ok(()),
            Ok(other) => Err(unexpected(&other)),
            Err(e) => Err(e),
        };
        self.note(result)
    }

    /// Picks the lowest existing bus id, or creates a bus when none exist.
    /// Deterministic for a given hub state: ties break by numeric minimum.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when listing or creating fails.
    pub async fn choose_or_create_bus(&self) -> Result<ChosenBus, RpcError> {
        let buses = self.list_buses().await?;
        match buses.iter().min().copied() {
            Some(bus_id) => Ok(ChosenBus {
                bus_id,
                created: false,
            }),
            None => {
                let bus_id = self.create_bus(BusCreateOptions::default()).await?;
                Ok(ChosenBus {
                    bus_id,
                    created: true,
                })
            }
        }
    }

    // ── Device operations ────────────────────────────────────────────────────

    /// Lists the devices on one bus.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Remote`] for an unknown bus.
    pub async fn list_devices(&self, bus_id: BusId) -> Result<Vec<DeviceInfo>, RpcError> {
        let result = match self.rpc.call(HubMessage::DeviceList { bus_id }).await {
            Ok(HubMessage::DeviceListOk { devices }) => Ok(devices),
            Ok(other) => Err(unexpected(&other)),
            Err(e) => Err(e),
        };
        self.note(result)
    }

    /// Registers a device of `device_type` on a bus. The returned
    /// [`DeviceInfo`] identifies the device but carries no open stream;
    /// call [`connect_device`] before exchanging reports.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Remote`] for an unknown bus or device type.
    ///
    /// [`connect_device`]: HubClient::connect_device
    pub async fn create_device(
        &self,
        bus_id: BusId,
        device_type: &str,
        options: DeviceCreateOptions,
    ) -> Result<DeviceInfo, RpcError> {
        let request = HubMessage::DeviceCreate {
            bus_id,
            device_type: device_type.to_string(),
            vendor_id: options.vendor_id,
            product_id: options.product_id,
        };
        let result = match self.rpc.call(request).await {
            Ok(HubMessage::DeviceCreateOk(info)) => Ok(info),
            Ok(other) => Err(unexpected(&other)),
            Err(e) => Err(e),
        };
        self.note(result)
    }

    /// Opens the streaming channel of an existing device and returns a
    /// live handle.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] when the attach call fails; no resources stay
    /// registered in that case.
    pub async fn connect_device(&self, info: &DeviceInfo) -> Result<DeviceHandle, RpcError> {
        // Route first: output frames can start flowing the instant the
        // hub accepts the attach, before our response arrives.
        let output_rx = match self.transport.register_reader(&info.dev_id) {
            Ok(rx) => rx,
            Err(e) => return self.note(Err(RpcError::Transport(e))),
        };

        let attach = HubMessage::DeviceAttach {
            bus_id: info.bus_id,
            dev_id: info.dev_id.clone(),
        };
        let result = match self.rpc.call(attach).await {
            Ok(HubMessage::DeviceAttachOk { .. }) => {
                let handle = DeviceHandle::new(
                    info.clone(),
                    Arc::clone(&self.transport),
                    self.rpc.clone(),
                    output_rx,
                );
                self.devices
                    .lock()
                    .unwrap()
                    .insert(info.dev_id.clone(), handle.clone());
                Ok(handle)
            }
            Ok(other) => {
                self.transport.unregister_reader(&info.dev_id);
                Err(unexpected(&other))
            }
            Err(e) => {
                self.transport.unregister_reader(&info.dev_id);
                Err(e)
            }
        };
        self.note(result)
    }

    /// Creates a device and opens its streaming channel in one call,
    /// atomic from the caller's perspective: either a usable handle comes
    /// back, or the half-created device is released again.
    ///
    /// When the attach step fails, a best-effort [`release_device`] runs
    /// before the error is returned. If the connection itself died between
    /// the two steps, that compensation can fail too and the device may
    /// linger hub-side until removed explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] from whichever step failed.
    ///
    /// [`release_device`]: HubClient::release_device
    pub async fn create_and_connect(
        &self,
        bus_id: BusId,
        device_type: &str,
        options: DeviceCreateOptions,
    ) -> Result<(DeviceInfo, DeviceHandle), RpcError> {
        let info = self.create_device(bus_id, device_type, options).await?;
        match self.connect_device(&info).await {
            Ok(handle) => Ok((info, handle)),
            Err(e) => {
                if let Err(cleanup) = self.release_device(&info).await {
                    warn!(
                        "failed to release device {} after connect failure: {cleanup}",
                        info.dev_id
                    );
                }
                Err(e)
            }
        }
    }

    /// Removes a device from its bus. Closes the local handle first when
    /// one is open.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Remote`] for an unknown device.
    pub async fn release_device(&self, info: &DeviceInfo) -> Result<(), RpcError> {
        let open_handle = self.devices.lock().unwrap().remove(&info.dev_id);
        if let Some(handle) = open_handle {
            handle.close().await;
        }

        let request = HubMessage::DeviceRemove {
            bus_id: info.bus_id,
            dev_id: info.dev_id.clone(),
        };
        let result = match self.rpc.call(request).await {
            Ok(HubMessage::DeviceRemoveOk { .. }) => Ok(()),
            Ok(other) => Err(unexpected(&other)),
            Err(e) => Err(e),
        };
        self.note(result)
    }

    // ── Teardown ─────────────────────────────────────────────────────────────

    /// Closes every open device, then terminates the connection.
    /// Idempotent.
    pub async fn shutdown(&self) {
        let handles: Vec<DeviceHandle> = {
            let mut devices = self.devices.lock().unwrap();
            devices.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            handle.close().await;
        }
        self.transport.close().await;
        info!("hub client shut down");
    }

    /// Records failing results in the last-error slot on their way out.
    fn note<T>(&self, result: Result<T, RpcError>) -> Result<T, RpcError> {
        if let Err(e) = &result {
            self.errors.record(e.to_string());
        }
        result
    }
}

fn unexpected(msg: &HubMessage) -> RpcError {
    RpcError::Protocol(format!(
        "unexpected response type {:?}",
        msg.message_type()
    ))
}
