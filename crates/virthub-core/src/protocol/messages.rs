//! All virthub protocol message types.
//!
//! Management requests occupy type codes 0x01–0x1F, management responses
//! 0x21–0x3F, and the per-device report channel 0x40–0x4F. Responses echo
//! the correlation token of the request they answer; device-channel frames
//! are unsolicited and carry token 0.

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Current protocol version byte.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Total size of the common frame header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Correlation token carried by unsolicited device-channel frames.
pub const UNSOLICITED_TOKEN: u64 = 0;

// ── Message type codes ────────────────────────────────────────────────────────

/// All message type codes defined by the hub protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Management requests (0x01–0x1F)
    Ping = 0x01,
    BusList = 0x02,
    BusCreate = 0x03,
    BusRemove = 0x04,
    DeviceList = 0x05,
    DeviceCreate = 0x06,
    DeviceAttach = 0x07,
    DeviceDetach = 0x08,
    DeviceRemove = 0x09,
    // Management responses (0x21–0x3F)
    Pong = 0x21,
    BusListOk = 0x22,
    BusCreateOk = 0x23,
    BusRemoveOk = 0x24,
    DeviceListOk = 0x25,
    DeviceCreateOk = 0x26,
    DeviceAttachOk = 0x27,
    DeviceDetachOk = 0x28,
    DeviceRemoveOk = 0x29,
    Error = 0x3F,
    // Device report channel (0x40–0x4F)
    InputReport = 0x40,
    OutputReport = 0x41,
    DeviceGone = 0x42,
}

impl TryFrom<u8> for MessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(MessageType::Ping),
            0x02 => Ok(MessageType::BusList),
            0x03 => Ok(MessageType::BusCreate),
            0x04 => Ok(MessageType::BusRemove),
            0x05 => Ok(MessageType::DeviceList),
            0x06 => Ok(MessageType::DeviceCreate),
            0x07 => Ok(MessageType::DeviceAttach),
            0x08 => Ok(MessageType::DeviceDetach),
            0x09 => Ok(MessageType::DeviceRemove),
            0x21 => Ok(MessageType::Pong),
            0x22 => Ok(MessageType::BusListOk),
            0x23 => Ok(MessageType::BusCreateOk),
            0x24 => Ok(MessageType::BusRemoveOk),
            0x25 => Ok(MessageType::DeviceListOk),
            0x26 => Ok(MessageType::DeviceCreateOk),
            0x27 => Ok(MessageType::DeviceAttachOk),
            0x28 => Ok(MessageType::DeviceDetachOk),
            0x29 => Ok(MessageType::DeviceRemoveOk),
            0x3F => Ok(MessageType::Error),
            0x40 => Ok(MessageType::InputReport),
            0x41 => Ok(MessageType::OutputReport),
            0x42 => Ok(MessageType::DeviceGone),
            _ => Err(()),
        }
    }
}

impl MessageType {
    /// Returns `true` for management response codes (including `Error`).
    pub fn is_response(self) -> bool {
        (self as u8) >= 0x21 && (self as u8) <= 0x3F
    }
}

// ── Payload structs ───────────────────────────────────────────────────────────

/// PONG (0x21): hub identity returned for a `Ping`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubInfo {
    /// Human-readable server name.
    pub server: String,
    /// Server version string.
    pub version: String,
}

/// A device as the hub describes it: returned by `DeviceCreateOk` and
/// listed by `DeviceListOk`.
///
/// The device id is hub-assigned and opaque to the client (e.g. `"1-1"`).
/// Vendor and product ids echo the creation hints, or the hub defaults for
/// the device class when no hint was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Bus the device lives on.
    pub bus_id: u32,
    /// Hub-assigned device identifier.
    pub dev_id: String,
    /// Device class tag (e.g. `"keyboard"`, `"xbox360"`).
    pub device_type: String,
    /// USB vendor id.
    pub vendor_id: u16,
    /// USB product id.
    pub product_id: u16,
}

// ── Top-level message enum ────────────────────────────────────────────────────

/// All valid hub protocol messages, discriminated by type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HubMessage {
    /// PING (0x01): liveness and identity probe.
    Ping,
    /// PONG (0x21): answer to `Ping`.
    Pong(HubInfo),
    /// BUS_LIST (0x02): request all known bus ids.
    BusList,
    /// BUS_LIST_OK (0x22): every bus currently hosted by the hub. An empty
    /// list is a valid answer.
    BusListOk { buses: Vec<u32> },
    /// BUS_CREATE (0x03): allocate a bus. `requested_id` asks the hub for a
    /// specific number; `None` lets the hub choose.
    BusCreate { requested_id: Option<u32> },
    /// BUS_CREATE_OK (0x23): the assigned bus id.
    BusCreateOk { bus_id: u32 },
    /// BUS_REMOVE (0x04): delete a bus. The hub refuses with `Error` while
    /// devices remain attached to it.
    BusRemove { bus_id: u32 },
    /// BUS_REMOVE_OK (0x24): echo of the removed bus id.
    BusRemoveOk { bus_id: u32 },
    /// DEVICE_LIST (0x05): request the devices on one bus.
    DeviceList { bus_id: u32 },
    /// DEVICE_LIST_OK (0x25): the bus's devices.
    DeviceListOk { devices: Vec<DeviceInfo> },
    /// DEVICE_CREATE (0x06): register a device of `device_type` on a bus.
    /// Vendor/product ids are optional hints; absent means hub default.
    DeviceCreate {
        bus_id: u32,
        device_type: String,
        vendor_id: Option<u16>,
        product_id: Option<u16>,
    },
    /// DEVICE_CREATE_OK (0x26): the created device.
    DeviceCreateOk(DeviceInfo),
    /// DEVICE_ATTACH (0x07): open the device's streaming sub-channel on
    /// this connection. Must precede any report exchange.
    DeviceAttach { bus_id: u32, dev_id: String },
    /// DEVICE_ATTACH_OK (0x27): the sub-channel is open.
    DeviceAttachOk { dev_id: String },
    /// DEVICE_DETACH (0x08): close the streaming sub-channel without
    /// removing the device from its bus.
    DeviceDetach { dev_id: String },
    /// DEVICE_DETACH_OK (0x28): echo of the detached device id.
    DeviceDetachOk { dev_id: String },
    /// DEVICE_REMOVE (0x09): delete the device from its bus.
    DeviceRemove { bus_id: u32, dev_id: String },
    /// DEVICE_REMOVE_OK (0x29): echo of the removed device.
    DeviceRemoveOk { bus_id: u32, dev_id: String },
    /// ERROR (0x3F): hub-reported failure for the correlated request.
    /// `status` follows HTTP conventions (404 unknown bus, 409 bus not
    /// empty, ...); the message is human-readable.
    Error { status: u16, message: String },
    /// INPUT_REPORT (0x40): one opaque device report, client → hub.
    InputReport { dev_id: String, data: Vec<u8> },
    /// OUTPUT_REPORT (0x41): opaque device output bytes, hub → client.
    /// A single frame may carry several logical fixed-size records
    /// concatenated; receivers split records themselves.
    OutputReport { dev_id: String, data: Vec<u8> },
    /// DEVICE_GONE (0x42): the hub ended the device's sub-channel (device
    /// removed on the hub side, or its bus torn down).
    DeviceGone { dev_id: String },
}

impl HubMessage {
    /// Returns the [`MessageType`] discriminant for this message.
    pub fn message_type(&self) -> MessageType {
        match self {
            HubMessage::Ping => MessageType::Ping,
            HubMessage::Pong(_) => MessageType::Pong,
            HubMessage::BusList => MessageType::BusList,
            HubMessage::BusListOk { .. } => MessageType::BusListOk,
            HubMessage::BusCreate { .. } => MessageType::BusCreate,
            HubMessage::BusCreateOk { .. } => MessageType::BusCreateOk,
            HubMessage::BusRemove { .. } => MessageType::BusRemove,
            HubMessage::BusRemoveOk { .. } => MessageType::BusRemoveOk,
            HubMessage::DeviceList { .. } => MessageType::DeviceList,
            HubMessage::DeviceListOk { .. } => MessageType::DeviceListOk,
            HubMessage::DeviceCreate { .. } => MessageType::DeviceCreate,
            HubMessage::DeviceCreateOk(_) => MessageType::DeviceCreateOk,
            HubMessage::DeviceAttach { .. } => MessageType::DeviceAttach,
            HubMessage::DeviceAttachOk { .. } => MessageType::DeviceAttachOk,
            HubMessage::DeviceDetach { .. } => MessageType::DeviceDetach,
            HubMessage::DeviceDetachOk { .. } => MessageType::DeviceDetachOk,
            HubMessage::DeviceRemove { .. } => MessageType::DeviceRemove,
            HubMessage::DeviceRemoveOk { .. } => MessageType::DeviceRemoveOk,
            HubMessage::Error { .. } => MessageType::Error,
            HubMessage::InputReport { .. } => MessageType::InputReport,
            HubMessage::OutputReport { .. } => MessageType::OutputReport,
            HubMessage::DeviceGone { .. } => MessageType::DeviceGone,
        }
    }
}
