//! In-process mock hub for integration tests.
//!
//! Listens on an ephemeral loopback port and speaks the real wire
//! protocol, so tests exercise the client engine end to end: framing,
//! correlation, demultiplexing, and delivery. Tests can inject output
//! report frames and sever the connection to provoke failure paths.

#![allow(dead_code)] // each integration test binary uses a subset

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::Mutex as AsyncMutex;

use virthub_client::HubAddr;
use virthub_core::protocol::messages::{DeviceInfo, HubInfo, UNSOLICITED_TOKEN};
use virthub_core::{decode_message, encode_message, HubMessage, ProtocolError};

/// Default vendor/product ids the mock hub assigns when a create request
/// carries no hints.
pub const DEFAULT_VENDOR_ID: u16 = 0x16C0;
pub const DEFAULT_PRODUCT_ID: u16 = 0x27DB;

#[derive(Default)]
struct HubState {
    next_bus: u32,
    next_dev: u32,
    buses: BTreeMap<u32, BTreeMap<String, DeviceInfo>>,
    attached: BTreeSet<String>,
    reports: Vec<(String, Vec<u8>)>,
}

pub struct MockHub {
    addr: HubAddr,
    state: Arc<Mutex<HubState>>,
    writer: Arc<AsyncMutex<Option<OwnedWriteHalf>>>,
}

impl MockHub {
    /// Starts a hub that answers every management request.
    pub async fn spawn() -> Self {
        Self::start(false).await
    }

    /// Starts a hub that accepts connections but never responds, for
    /// exercising call timeouts.
    pub async fn spawn_silent() -> Self {
        Self::start(true).await
    }

    async fn start(silent: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock hub");
        let port = listener.local_addr().expect("local addr").port();
        let state = Arc::new(Mutex::new(HubState {
            next_bus: 1,
            next_dev: 1,
            ..Default::default()
        }));
        let writer: Arc<AsyncMutex<Option<OwnedWriteHalf>>> = Arc::new(AsyncMutex::new(None));

        let accept_state = Arc::clone(&state);
        let accept_writer = Arc::clone(&writer);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let (read_half, write_half) = stream.into_split();
                *accept_writer.lock().await = Some(write_half);
                tokio::spawn(serve(
                    read_half,
                    Arc::clone(&accept_state),
                    Arc::clone(&accept_writer),
                    silent,
                ));
            }
        });

        Self {
            addr: HubAddr::new("127.0.0.1", port),
            state,
            writer,
        }
    }

    pub fn addr(&self) -> HubAddr {
        self.addr.clone()
    }

    /// Injects one output report frame onto the active connection. The
    /// payload may concatenate several logical records.
    pub async fn push_output(&self, dev_id: &str, data: &[u8]) {
        let frame = HubMessage::OutputReport {
            dev_id: dev_id.to_string(),
            data: data.to_vec(),
        };
        self.write_frame(&frame).await;
    }

    /// Writes raw bytes onto the active connection, bypassing the codec.
    /// Used to provoke the client's malformed-frame handling.
    pub async fn push_raw(&self, bytes: &[u8]) {
        let mut guard = self.writer.lock().await;
        if let Some(writer) = guard.as_mut() {
            writer.write_all(bytes).await.expect("write raw bytes");
        }
    }

    /// Announces that a device's stream ended hub-side.
    pub async fn push_device_gone(&self, dev_id: &str) {
        let frame = HubMessage::DeviceGone {
            dev_id: dev_id.to_string(),
        };
        self.write_frame(&frame).await;
    }

    /// Closes the hub side of the active connection so the client
    /// observes EOF.
    pub async fn drop_connection(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
    }

    /// Input reports received for `dev_id`, in arrival order.
    pub fn received_reports(&self, dev_id: &str) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .reports
            .iter()
            .filter(|(d, _)| d == dev_id)
            .map(|(_, report)| report.clone())
            .collect()
    }

    async fn write_frame(&self, frame: &HubMessage) {
        let bytes = encode_message(frame, UNSOLICITED_TOKEN).expect("encode frame");
        let mut guard = self.writer.lock().await;
        if let Some(writer) = guard.as_mut() {
            writer.write_all(&bytes).await.expect("write frame");
        }
    }
}

async fn serve(
    mut reader: OwnedReadHalf,
    state: Arc<Mutex<HubState>>,
    writer: Arc<AsyncMutex<Option<OwnedWriteHalf>>>,
    silent: bool,
) {
    let mut recv_buf: Vec<u8> = Vec::with_capacity(4096);
    let mut read_tmp = vec![0u8; 4096];
    loop {
        let n = match reader.read(&mut read_tmp).await {
            Ok(0) => return,
            Ok(n) => n,
            Err(_) => return,
        };
        recv_buf.extend_from_slice(&read_tmp[..n]);

        loop {
            match decode_message(&recv_buf) {
                Ok((msg, token, consumed)) => {
                    recv_buf.drain(..consumed);
                    if silent {
                        continue;
                    }
                    if let Some(reply) = handle_request(&state, msg) {
                        let bytes = encode_message(&reply, token).expect("encode reply");
                        let mut guard = writer.lock().await;
                        if let Some(w) = guard.as_mut() {
                            if w.write_all(&bytes).await.is_err() {
                                return;
                            }
                        }
                    }
                }
                Err(ProtocolError::InsufficientData { .. }) => break,
                Err(_) => return,
            }
        }
    }
}

fn handle_request(state: &Mutex<HubState>, msg: HubMessage) -> Option<HubMessage> {
    let mut s = state.lock().unwrap();
    let reply = match msg {
        HubMessage::Ping => HubMessage::Pong(HubInfo {
            server: "mock-hub".to_string(),
            version: "0.0.0".to_string(),
        }),
        HubMessage::BusList => HubMessage::BusListOk {
            buses: s.buses.keys().copied().collect(),
        },
        HubMessage::BusCreate { requested_id } => {
            let id = match requested_id {
                Some(id) => id,
                None => {
                    while s.buses.contains_key(&s.next_bus) {
                        s.next_bus += 1;
                    }
                    s.next_bus
                }
            };
            if s.buses.contains_key(&id) {
                HubMessage::Error {
                    status: 409,
                    message: format!("bus {id} already exists"),
                }
            } else {
                s.buses.insert(id, BTreeMap::new());
                HubMessage::BusCreateOk { bus_id: id }
            }
        }
        HubMessage::BusRemove { bus_id } => match s.buses.get(&bus_id) {
            None => HubMessage::Error {
                status: 404,
                message: format!("no such bus {bus_id}"),
            },
            Some(devices) if !devices.is_empty() => HubMessage::Error {
                status: 409,
                message: format!("bus {bus_id} has attached devices"),
            },
            Some(_) => {
                s.buses.remove(&bus_id);
                HubMessage::BusRemoveOk { bus_id }
            }
        },
        HubMessage::DeviceList { bus_id } => match s.buses.get(&bus_id) {
            None => HubMessage::Error {
                status: 404,
                message: format!("no such bus {bus_id}"),
            },
            Some(devices) => HubMessage::DeviceListOk {
                devices: devices.values().cloned().collect(),
            },
        },
        HubMessage::DeviceCreate {
            bus_id,
            device_type,
            vendor_id,
            product_id,
        } => {
            if !s.buses.contains_key(&bus_id) {
                HubMessage::Error {
                    status: 404,
                    message: format!("no such bus {bus_id}"),
                }
            } else {
                let dev_id = format!("{bus_id}-{}", s.next_dev);
                s.next_dev += 1;
                let info = DeviceInfo {
                    bus_id,
                    dev_id: dev_id.clone(),
                    device_type,
                    vendor_id: vendor_id.unwrap_or(DEFAULT_VENDOR_ID),
                    product_id: product_id.unwrap_or(DEFAULT_PRODUCT_ID),
                };
                s.buses
                    .get_mut(&bus_id)
                    .expect("bus checked above")
                    .insert(dev_id, info.clone());
                HubMessage::DeviceCreateOk(info)
            }
        }
        HubMessage::DeviceAttach { bus_id, dev_id } => {
            let exists = s
                .buses
                .get(&bus_id)
                .map(|devices| devices.contains_key(&dev_id))
                .unwrap_or(false);
            if exists {
                s.attached.insert(dev_id.clone());
                HubMessage::DeviceAttachOk { dev_id }
            } else {
                HubMessage::Error {
                    status: 404,
                    message: format!("no such device {dev_id} on bus {bus_id}"),
                }
            }
        }
        HubMessage::DeviceDetach { dev_id } => {
            s.attached.remove(&dev_id);
            HubMessage::DeviceDetachOk { dev_id }
        }
        HubMessage::DeviceRemove { bus_id, dev_id } => {
            let removed = s
                .buses
                .get_mut(&bus_id)
                .and_then(|devices| devices.remove(&dev_id));
            match removed {
                Some(_) => {
                    s.attached.remove(&dev_id);
                    HubMessage::DeviceRemoveOk { bus_id, dev_id }
                }
                None => HubMessage::Error {
                    status: 404,
                    message: format!("no such device {dev_id} on bus {bus_id}"),
                },
            }
        }
        HubMessage::InputReport { dev_id, data } => {
            if s.attached.contains(&dev_id) {
                s.reports.push((dev_id, data));
            }
            return None; // fire-and-forget, no acknowledgement
        }
        other => HubMessage::Error {
            status: 400,
            message: format!("unsupported request {:?}", other.message_type()),
        },
    };
    Some(reply)
}
