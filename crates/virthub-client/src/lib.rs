//! # virthub-client
//!
//! Client protocol engine for a remote virtual device hub.
//!
//! The hub is a service that hosts numbered *buses* and, on each bus,
//! virtual HID-class *devices* (keyboards, game pads). This crate owns one
//! TCP connection to one hub and gives callers:
//!
//! 1. Correlated management calls: list/create/remove buses, create,
//!    attach, detach, and remove devices. Every call returns a typed
//!    result; hub-reported failures (like removing a non-empty bus) are
//!    ordinary [`RpcError::Remote`] values, not crashes.
//! 2. A persistent streaming channel per attached device: input reports
//!    pushed with [`DeviceHandle::send`], output reports (LED state,
//!    rumble) delivered asynchronously through an [`OutputStream`] or a
//!    registered callback.
//!
//! # Architecture
//!
//! ```text
//! HubClient (facade, teardown ordering, last-error slot)
//!  ├─ RpcEngine        -- token draw, send, await correlated response
//!  │   └─ Transport    -- one TCP connection, framing, demux
//!  │        ├─ pending table  (token → parked caller)
//!  │        └─ device routes  (device id → output queue)
//!  └─ DeviceHandle     -- send path + per-device output dispatcher
//! ```
//!
//! A single background reader task decodes inbound frames and routes them:
//! management responses wake the caller parked on the matching token,
//! output reports land in the owning device's queue. A slow output
//! consumer can therefore never stall a management call, and sends never
//! wait on deliveries.
//!
//! Connection loss poisons the transport: every pending call fails, every
//! device stream ends, and the failure text lands in the client's
//! last-error slot. The [`HubClient`] is then dead; reconnecting means
//! building a new one.

pub mod client;
pub mod config;
pub mod device;
pub mod rpc;
pub mod transport;

pub use client::{BusCreateOptions, BusId, ChosenBus, DeviceCreateOptions, HubClient};
pub use config::{ClientConfig, ConfigError, HubAddr};
pub use device::{DeviceError, DeviceHandle, OutputStream};
pub use rpc::{RpcEngine, RpcError};
pub use transport::{ConnectionError, ErrorSlot, Transport, TransportError};

// The hub's view of a device is shared with the wire layer.
pub use virthub_core::protocol::messages::DeviceInfo;
