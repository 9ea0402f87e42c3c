//! # virthub-core
//!
//! Shared library for the virthub client containing the hub wire protocol
//! codec and the per-class device report encodings.
//!
//! This crate has zero dependencies on sockets, OS APIs, or async runtimes;
//! everything here operates on byte slices and plain structs.
//!
//! A virtual device hub hosts numbered *buses*, and each bus hosts virtual
//! HID-class *devices* (keyboards, game pads). A client connects over TCP,
//! manages buses and devices through correlated request/response calls, and
//! exchanges binary *reports* with each device it has attached: input
//! reports flow client → hub, output reports (LED state, rumble) flow
//! hub → client.
//!
//! This crate defines:
//!
//! - **`protocol`** – How bytes travel over the connection. Every frame is
//!   a 16-byte header plus payload; the header carries a correlation token
//!   that pairs each management response with its request.
//!
//! - **`devices`** – The report encodings of the supported device classes.
//!   The protocol layer treats reports as opaque bytes; these modules are
//!   the collaborator layer that gives them shape.

pub mod devices;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `virthub_core::HubMessage` instead of the full path.
pub use protocol::codec::{decode_message, encode_message, ProtocolError};
pub use protocol::messages::{DeviceInfo, HubMessage, MessageType};
pub use protocol::token::TokenCounter;
