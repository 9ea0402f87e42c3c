//! Binary codec for encoding and decoding virthub protocol messages.
//!
//! Wire format:
//! ```text
//! [version:1][msg_type:1][reserved:2][payload_len:4][token:8][payload:N]
//! ```
//! Total header size: 16 bytes. All multi-byte integers are big-endian.
//! Strings are length-prefixed (u16 length + UTF-8 bytes); optional u16
//! fields are gated by a flags byte.

use crate::protocol::messages::{
    DeviceInfo, HubInfo, HubMessage, MessageType, HEADER_SIZE, PROTOCOL_VERSION,
};
use thiserror::Error;

/// Errors that can occur during message encoding or decoding.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    /// For a streaming reader this means "wait for more bytes", not that
    /// the stream is corrupt.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The message type byte in the header is not a recognized value.
    #[error("unknown message type: 0x{0:02X}")]
    UnknownMessageType(u8),

    /// The protocol version in the header is not supported.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// The payload could not be parsed (field out of range, UTF-8 error, etc.).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`HubMessage`] into a byte vector including the 16-byte header.
///
/// The correlation token is **not** chosen by this function – pass a fresh
/// value from a [`crate::protocol::TokenCounter`] for requests, the echoed
/// request token for responses, and
/// [`crate::protocol::messages::UNSOLICITED_TOKEN`] for device frames.
///
/// # Errors
///
/// Returns [`ProtocolError`] if serialization fails.
///
/// # Examples
///
/// ```rust
/// use virthub_core::protocol::{decode_message, encode_message};
/// use virthub_core::protocol::messages::HubMessage;
///
/// let msg = HubMessage::BusRemove { bus_id: 7 };
/// let bytes = encode_message(&msg, 3).unwrap();
/// let (decoded, token, consumed) = decode_message(&bytes).unwrap();
/// assert_eq!(decoded, msg);
/// assert_eq!(token, 3);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_message(msg: &HubMessage, token: u64) -> Result<Vec<u8>, ProtocolError> {
    let payload = encode_payload(msg)?;
    let payload_len = payload.len() as u32;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());

    // Header: version (1) + msg_type (1) + reserved (2) + payload_len (4) +
    //         token (8) = 16 bytes
    buf.push(PROTOCOL_VERSION);
    buf.push(msg.message_type() as u8);
    buf.push(0x00); // reserved
    buf.push(0x00); // reserved
    buf.extend_from_slice(&payload_len.to_be_bytes());
    buf.extend_from_slice(&token.to_be_bytes());

    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decodes one [`HubMessage`] from the beginning of `bytes`.
///
/// Returns the decoded message, its correlation token, and the total number
/// of bytes consumed (header + payload), so a streaming caller can advance
/// its read cursor. A buffer holding only part of a frame yields
/// [`ProtocolError::InsufficientData`] – accumulate more bytes and retry.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are malformed.
pub fn decode_message(bytes: &[u8]) -> Result<(HubMessage, u64, usize), ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let version = bytes[0];
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(version));
    }

    let msg_type_byte = bytes[1];
    let msg_type = MessageType::try_from(msg_type_byte)
        .map_err(|_| ProtocolError::UnknownMessageType(msg_type_byte))?;

    // bytes[2..4] are reserved – ignored on decode

    let payload_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let token = u64::from_be_bytes([
        bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    ]);

    let total_needed = HEADER_SIZE + payload_len;
    if bytes.len() < total_needed {
        return Err(ProtocolError::InsufficientData {
            needed: total_needed,
            available: bytes.len(),
        });
    }

    let payload = &bytes[HEADER_SIZE..total_needed];
    let msg = decode_payload(msg_type, payload)?;
    Ok((msg, token, total_needed))
}

// ── Payload encoding ──────────────────────────────────────────────────────────

fn encode_payload(msg: &HubMessage) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    match msg {
        HubMessage::Ping | HubMessage::BusList => {} // empty payload
        HubMessage::Pong(info) => {
            write_string(&mut buf, &info.server);
            write_string(&mut buf, &info.version);
        }
        HubMessage::BusListOk { buses } => {
            buf.extend_from_slice(&(buses.len() as u16).to_be_bytes());
            for id in buses {
                buf.extend_from_slice(&id.to_be_bytes());
            }
        }
        HubMessage::BusCreate { requested_id } => match requested_id {
            Some(id) => {
                buf.push(0x01);
                buf.extend_from_slice(&id.to_be_bytes());
            }
            None => buf.push(0x00),
        },
        HubMessage::BusCreateOk { bus_id }
        | HubMessage::BusRemove { bus_id }
        | HubMessage::BusRemoveOk { bus_id }
        | HubMessage::DeviceList { bus_id } => {
            buf.extend_from_slice(&bus_id.to_be_bytes());
        }
        HubMessage::DeviceListOk { devices } => {
            buf.extend_from_slice(&(devices.len() as u16).to_be_bytes());
            for dev in devices {
                encode_device_info(&mut buf, dev);
            }
        }
        HubMessage::DeviceCreate {
            bus_id,
            device_type,
            vendor_id,
            product_id,
        } => {
            buf.extend_from_slice(&bus_id.to_be_bytes());
            write_string(&mut buf, device_type);
            let mut flags = 0u8;
            if vendor_id.is_some() {
                flags |= 0x01;
            }
            if product_id.is_some() {
                flags |= 0x02;
            }
            buf.push(flags);
            if let Some(vid) = vendor_id {
                buf.extend_from_slice(&vid.to_be_bytes());
            }
            if let Some(pid) = product_id {
                buf.extend_from_slice(&pid.to_be_bytes());
            }
        }
        HubMessage::DeviceCreateOk(info) => encode_device_info(&mut buf, info),
        HubMessage::DeviceAttach { bus_id, dev_id }
        | HubMessage::DeviceRemove { bus_id, dev_id }
        | HubMessage::DeviceRemoveOk { bus_id, dev_id } => {
            buf.extend_from_slice(&bus_id.to_be_bytes());
            write_string(&mut buf, dev_id);
        }
        HubMessage::DeviceAttachOk { dev_id }
        | HubMessage::DeviceDetach { dev_id }
        | HubMessage::DeviceDetachOk { dev_id }
        | HubMessage::DeviceGone { dev_id } => {
            write_string(&mut buf, dev_id);
        }
        HubMessage::Error { status, message } => {
            buf.extend_from_slice(&status.to_be_bytes());
            write_string(&mut buf, message);
        }
        HubMessage::InputReport { dev_id, data } | HubMessage::OutputReport { dev_id, data } => {
            write_string(&mut buf, dev_id);
            buf.extend_from_slice(data);
        }
    }
    Ok(buf)
}

fn encode_device_info(buf: &mut Vec<u8>, dev: &DeviceInfo) {
    buf.extend_from_slice(&dev.bus_id.to_be_bytes());
    write_string(buf, &dev.dev_id);
    write_string(buf, &dev.device_type);
    buf.extend_from_slice(&dev.vendor_id.to_be_bytes());
    buf.extend_from_slice(&dev.product_id.to_be_bytes());
}

// ── Payload decoding ──────────────────────────────────────────────────────────

fn decode_payload(msg_type: MessageType, p: &[u8]) -> Result<HubMessage, ProtocolError> {
    match msg_type {
        MessageType::Ping => Ok(HubMessage::Ping),
        MessageType::BusList => Ok(HubMessage::BusList),
        MessageType::Pong => {
            let (server, off) = read_string(p, 0)?;
            let (version, _) = read_string(p, off)?;
            Ok(HubMessage::Pong(HubInfo { server, version }))
        }
        MessageType::BusListOk => {
            require_len(p, 2, "BusListOk")?;
            let count = u16::from_be_bytes([p[0], p[1]]) as usize;
            require_len(p, 2 + count * 4, "BusListOk ids")?;
            let mut buses = Vec::with_capacity(count);
            let mut off = 2;
            for _ in 0..count {
                buses.push(read_u32(p, off)?);
                off += 4;
            }
            Ok(HubMessage::BusListOk { buses })
        }
        MessageType::BusCreate => {
            require_len(p, 1, "BusCreate")?;
            let requested_id = if p[0] & 0x01 != 0 {
                Some(read_u32(p, 1)?)
            } else {
                None
            };
            Ok(HubMessage::BusCreate { requested_id })
        }
        MessageType::BusCreateOk => Ok(HubMessage::BusCreateOk {
            bus_id: read_u32(p, 0)?,
        }),
        MessageType::BusRemove => Ok(HubMessage::BusRemove {
            bus_id: read_u32(p, 0)?,
        }),
        MessageType::BusRemoveOk => Ok(HubMessage::BusRemoveOk {
            bus_id: read_u32(p, 0)?,
        }),
        MessageType::DeviceList => Ok(HubMessage::DeviceList {
            bus_id: read_u32(p, 0)?,
        }),
        MessageType::DeviceListOk => {
            require_len(p, 2, "DeviceListOk")?;
            let count = u16::from_be_bytes([p[0], p[1]]) as usize;
            let mut devices = Vec::with_capacity(count);
            let mut off = 2;
            for _ in 0..count {
                let (dev, next) = decode_device_info(p, off)?;
                devices.push(dev);
                off = next;
            }
            Ok(HubMessage::DeviceListOk { devices })
        }
        MessageType::DeviceCreate => {
            let bus_id = read_u32(p, 0)?;
            let (device_type, mut off) = read_string(p, 4)?;
            require_len(p, off + 1, "DeviceCreate flags")?;
            let flags = p[off];
            off += 1;
            let vendor_id = if flags & 0x01 != 0 {
                let v = read_u16(p, off)?;
                off += 2;
                Some(v)
            } else {
                None
            };
            let product_id = if flags & 0x02 != 0 {
                Some(read_u16(p, off)?)
            } else {
                None
            };
            Ok(HubMessage::DeviceCreate {
                bus_id,
                device_type,
                vendor_id,
                product_id,
            })
        }
        MessageType::DeviceCreateOk => {
            let (dev, _) = decode_device_info(p, 0)?;
            Ok(HubMessage::DeviceCreateOk(dev))
        }
        MessageType::DeviceAttach => {
            let bus_id = read_u32(p, 0)?;
            let (dev_id, _) = read_string(p, 4)?;
            Ok(HubMessage::DeviceAttach { bus_id, dev_id })
        }
        MessageType::DeviceAttachOk => {
            let (dev_id, _) = read_string(p, 0)?;
            Ok(HubMessage::DeviceAttachOk { dev_id })
        }
        MessageType::DeviceDetach => {
            let (dev_id, _) = read_string(p, 0)?;
            Ok(HubMessage::DeviceDetach { dev_id })
        }
        MessageType::DeviceDetachOk => {
            let (dev_id, _) = read_string(p, 0)?;
            Ok(HubMessage::DeviceDetachOk { dev_id })
        }
        MessageType::DeviceRemove => {
            let bus_id = read_u32(p, 0)?;
            let (dev_id, _) = read_string(p, 4)?;
            Ok(HubMessage::DeviceRemove { bus_id, dev_id })
        }
        MessageType::DeviceRemoveOk => {
            let bus_id = read_u32(p, 0)?;
            let (dev_id, _) = read_string(p, 4)?;
            Ok(HubMessage::DeviceRemoveOk { bus_id, dev_id })
        }
        MessageType::Error => {
            let status = read_u16(p, 0)?;
            let (message, _) = read_string(p, 2)?;
            Ok(HubMessage::Error { status, message })
        }
        MessageType::InputReport => {
            let (dev_id, off) = read_string(p, 0)?;
            Ok(HubMessage::InputReport {
                dev_id,
                data: p[off..].to_vec(),
            })
        }
        MessageType::OutputReport => {
            let (dev_id, off) = read_string(p, 0)?;
            Ok(HubMessage::OutputReport {
                dev_id,
                data: p[off..].to_vec(),
            })
        }
        MessageType::DeviceGone => {
            let (dev_id, _) = read_string(p, 0)?;
            Ok(HubMessage::DeviceGone { dev_id })
        }
    }
}

fn decode_device_info(p: &[u8], offset: usize) -> Result<(DeviceInfo, usize), ProtocolError> {
    let bus_id = read_u32(p, offset)?;
    let (dev_id, off) = read_string(p, offset + 4)?;
    let (device_type, off) = read_string(p, off)?;
    let vendor_id = read_u16(p, off)?;
    let product_id = read_u16(p, off + 2)?;
    Ok((
        DeviceInfo {
            bus_id,
            dev_id,
            device_type,
            vendor_id,
            product_id,
        },
        off + 4,
    ))
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn require_len(buf: &[u8], needed: usize, context: &str) -> Result<(), ProtocolError> {
    if buf.len() < needed {
        Err(ProtocolError::MalformedPayload(format!(
            "{context}: need {needed} bytes, got {}",
            buf.len()
        )))
    } else {
        Ok(())
    }
}

fn read_u16(buf: &[u8], offset: usize) -> Result<u16, ProtocolError> {
    require_len(buf, offset + 2, "u16")?;
    Ok(u16::from_be_bytes([buf[offset], buf[offset + 1]]))
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32, ProtocolError> {
    require_len(buf, offset + 4, "u32")?;
    Ok(u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ]))
}

/// Writes a 2-byte length prefix followed by the UTF-8 string bytes.
fn write_string(buf: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    let len = bytes.len().min(u16::MAX as usize) as u16;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&bytes[..len as usize]);
}

/// Reads a 2-byte length prefix and then that many UTF-8 bytes.
/// Returns the string and the offset of the byte after it.
fn read_string(buf: &[u8], offset: usize) -> Result<(String, usize), ProtocolError> {
    if buf.len() < offset + 2 {
        return Err(ProtocolError::MalformedPayload(format!(
            "need 2 bytes for string length at offset {offset}"
        )));
    }
    let len = u16::from_be_bytes([buf[offset], buf[offset + 1]]) as usize;
    let start = offset + 2;
    if buf.len() < start + len {
        return Err(ProtocolError::MalformedPayload(format!(
            "string of length {len} at offset {start} exceeds buffer"
        )));
    }
    let s = std::str::from_utf8(&buf[start..start + len])
        .map_err(|e| ProtocolError::MalformedPayload(format!("invalid UTF-8: {e}")))?
        .to_string();
    Ok((s, start + len))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::*;

    fn round_trip(msg: &HubMessage) -> HubMessage {
        let encoded = encode_message(msg, 5).expect("encode failed");
        let (decoded, token, consumed) = decode_message(&encoded).expect("decode failed");
        assert_eq!(token, 5, "token must survive the round trip");
        assert_eq!(
            consumed,
            encoded.len(),
            "consumed bytes should equal total encoded size"
        );
        decoded
    }

    fn sample_device() -> DeviceInfo {
        DeviceInfo {
            bus_id: 1,
            dev_id: "1-1".to_string(),
            device_type: "keyboard".to_string(),
            vendor_id: 0x16C0,
            product_id: 0x27DB,
        }
    }

    // ── Management requests ──────────────────────────────────────────────────

    #[test]
    fn test_ping_round_trip() {
        assert_eq!(round_trip(&HubMessage::Ping), HubMessage::Ping);
    }

    #[test]
    fn test_pong_round_trip() {
        let msg = HubMessage::Pong(HubInfo {
            server: "virthub".to_string(),
            version: "1.2.3".to_string(),
        });
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_bus_list_round_trip() {
        assert_eq!(round_trip(&HubMessage::BusList), HubMessage::BusList);
    }

    #[test]
    fn test_bus_list_ok_round_trip() {
        let msg = HubMessage::BusListOk {
            buses: vec![1, 2, 7, 42],
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_bus_list_ok_empty_round_trip() {
        let msg = HubMessage::BusListOk { buses: vec![] };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_bus_create_without_requested_id_round_trip() {
        let msg = HubMessage::BusCreate { requested_id: None };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_bus_create_with_requested_id_round_trip() {
        let msg = HubMessage::BusCreate {
            requested_id: Some(9),
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_bus_remove_round_trip() {
        let msg = HubMessage::BusRemove { bus_id: 3 };
        assert_eq!(round_trip(&msg), msg);
    }

    // ── Device management ────────────────────────────────────────────────────

    #[test]
    fn test_device_create_with_hints_round_trip() {
        let msg = HubMessage::DeviceCreate {
            bus_id: 1,
            device_type: "xbox360".to_string(),
            vendor_id: Some(0x045E),
            product_id: Some(0x028E),
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_device_create_without_hints_round_trip() {
        let msg = HubMessage::DeviceCreate {
            bus_id: 2,
            device_type: "keyboard".to_string(),
            vendor_id: None,
            product_id: None,
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_device_create_with_only_vendor_hint_round_trip() {
        let msg = HubMessage::DeviceCreate {
            bus_id: 2,
            device_type: "keyboard".to_string(),
            vendor_id: Some(0x1234),
            product_id: None,
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_device_create_ok_round_trip() {
        let msg = HubMessage::DeviceCreateOk(sample_device());
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_device_list_ok_round_trip() {
        let mut second = sample_device();
        second.dev_id = "1-2".to_string();
        second.device_type = "xbox360".to_string();
        let msg = HubMessage::DeviceListOk {
            devices: vec![sample_device(), second],
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_device_list_ok_empty_round_trip() {
        let msg = HubMessage::DeviceListOk { devices: vec![] };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_device_attach_round_trip() {
        let msg = HubMessage::DeviceAttach {
            bus_id: 1,
            dev_id: "1-1".to_string(),
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_device_detach_round_trip() {
        let msg = HubMessage::DeviceDetach {
            dev_id: "1-1".to_string(),
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_device_remove_round_trip() {
        let msg = HubMessage::DeviceRemove {
            bus_id: 1,
            dev_id: "1-1".to_string(),
        };
        assert_eq!(round_trip(&msg), msg);
    }

    // ── Error ────────────────────────────────────────────────────────────────

    #[test]
    fn test_error_round_trip() {
        let msg = HubMessage::Error {
            status: 409,
            message: "bus 1 has attached devices".to_string(),
        };
        assert_eq!(round_trip(&msg), msg);
    }

    // ── Device channel ───────────────────────────────────────────────────────

    #[test]
    fn test_input_report_round_trip() {
        let msg = HubMessage::InputReport {
            dev_id: "1-1".to_string(),
            data: vec![0x02, 0x01, 0x0B],
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_input_report_empty_payload_round_trip() {
        let msg = HubMessage::InputReport {
            dev_id: "1-1".to_string(),
            data: vec![],
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_output_report_round_trip() {
        let msg = HubMessage::OutputReport {
            dev_id: "2-1".to_string(),
            data: vec![0x01, 0x00, 0x02],
        };
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_device_gone_round_trip() {
        let msg = HubMessage::DeviceGone {
            dev_id: "1-1".to_string(),
        };
        assert_eq!(round_trip(&msg), msg);
    }

    // ── Error conditions ─────────────────────────────────────────────────────

    #[test]
    fn test_decode_empty_bytes_returns_insufficient_data() {
        let result = decode_message(&[]);
        assert!(matches!(
            result,
            Err(ProtocolError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_decode_truncated_header_returns_insufficient_data() {
        let result = decode_message(&[0x01, 0x02]); // only 2 bytes
        assert!(matches!(
            result,
            Err(ProtocolError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_decode_unknown_message_type_returns_error() {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes[0] = PROTOCOL_VERSION;
        bytes[1] = 0xFF; // unknown type
        let result = decode_message(&bytes);
        assert!(matches!(
            result,
            Err(ProtocolError::UnknownMessageType(0xFF))
        ));
    }

    #[test]
    fn test_decode_wrong_version_returns_error() {
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes[0] = 0x99; // wrong version
        bytes[1] = MessageType::Ping as u8;
        let result = decode_message(&bytes);
        assert!(matches!(
            result,
            Err(ProtocolError::UnsupportedVersion(0x99))
        ));
    }

    #[test]
    fn test_decode_partial_payload_returns_insufficient_data() {
        // Declare 100 bytes of payload but provide none: a streaming reader
        // must treat this as "wait for more bytes".
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes[0] = PROTOCOL_VERSION;
        bytes[1] = MessageType::BusRemove as u8;
        bytes[4..8].copy_from_slice(&100u32.to_be_bytes());
        let result = decode_message(&bytes);
        assert!(matches!(
            result,
            Err(ProtocolError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_decode_truncated_string_returns_malformed() {
        // DeviceDetach whose string length prefix promises more bytes than
        // the payload carries.
        let mut bytes = vec![0u8; HEADER_SIZE + 2];
        bytes[0] = PROTOCOL_VERSION;
        bytes[1] = MessageType::DeviceDetach as u8;
        bytes[4..8].copy_from_slice(&2u32.to_be_bytes());
        bytes[HEADER_SIZE..HEADER_SIZE + 2].copy_from_slice(&100u16.to_be_bytes());
        let result = decode_message(&bytes);
        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn test_header_has_correct_version_byte() {
        let bytes = encode_message(&HubMessage::Ping, 1).unwrap();
        assert_eq!(bytes[0], PROTOCOL_VERSION);
    }

    #[test]
    fn test_header_encodes_token_correctly() {
        let token = 0x1234_5678_9ABC_DEF0u64;
        let bytes = encode_message(&HubMessage::Ping, token).unwrap();
        let decoded = u64::from_be_bytes(bytes[8..16].try_into().unwrap());
        assert_eq!(decoded, token);
    }

    #[test]
    fn test_header_size_is_16_bytes() {
        // Ping has an empty payload so total = HEADER_SIZE.
        let bytes = encode_message(&HubMessage::Ping, 0).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
    }

    #[test]
    fn test_trailing_bytes_are_not_consumed() {
        let mut bytes = encode_message(&HubMessage::BusList, 1).unwrap();
        let frame_len = bytes.len();
        bytes.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        let (_, _, consumed) = decode_message(&bytes).unwrap();
        assert_eq!(consumed, frame_len);
    }
}
