//! The single TCP connection to the hub: framing, demultiplexing, and
//! failure propagation.
//!
//! # Binary streaming protocol
//!
//! TCP is a stream protocol: a single `read()` call may return less than
//! one complete frame, or more than one. The background reader task
//! accumulates incoming bytes and uses [`virthub_core::decode_message`] to
//! extract complete frames one at a time, then routes each frame:
//!
//! - Management responses wake the caller parked on the frame's
//!   correlation token (the *pending table*).
//! - `OutputReport` frames land in the owning device's queue (the
//!   *device routes*). Queues are unbounded so a slow output consumer can
//!   never stall the reader, and with it every other device and every
//!   management call.
//! - `DeviceGone` drops the device's queue sender, ending its stream.
//!
//! # Poisoning
//!
//! A frame whose payload fails to decode is logged and skipped; the
//! length-prefixed framing still delimits it, so one bad frame never ends
//! delivery for unrelated devices. A connection-level failure (EOF, I/O
//! error, corrupt framing) poisons the transport instead: the failure
//! text is recorded in the shared [`ErrorSlot`],
//! every pending call is failed, every device queue is dropped, and all
//! subsequent operations return [`TransportError::Closed`] until the
//! caller reconnects with a fresh client.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

use virthub_core::protocol::messages::{HEADER_SIZE, UNSOLICITED_TOKEN};
use virthub_core::{decode_message, encode_message, HubMessage, ProtocolError};

use crate::config::{ClientConfig, HubAddr};

/// Errors establishing the connection. Fatal to the client; the engine
/// never retries internally, the caller decides whether to reconnect.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// TCP connect failed (refused, unreachable, resolution failure).
    #[error("failed to connect to hub at {addr}: {source}")]
    ConnectFailed {
        addr: HubAddr,
        #[source]
        source: io::Error,
    },

    /// TCP connect did not complete within the dial timeout.
    #[error("connection to hub at {addr} timed out after {timeout:?}")]
    Timeout { addr: HubAddr, timeout: Duration },
}

/// Stream-level failures on an established connection.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection is gone (closed locally, by the hub, or poisoned by
    /// an earlier failure). Every later operation fails the same way.
    #[error("connection closed")]
    Closed,

    /// A frame violated the wire format.
    #[error("malformed frame: {0}")]
    Malformed(#[from] ProtocolError),

    /// An I/O error occurred on the established connection.
    #[error("connection I/O error: {0}")]
    Io(#[from] io::Error),
}

// ── Last-error slot ───────────────────────────────────────────────────────────

/// Shared slot holding the text of the most recent failure, overwritten on
/// each failing operation.
///
/// Structured errors in return values are the primary surface; this slot
/// is the retained diagnostic convenience, synchronized so the reader task
/// and caller threads never race on it.
#[derive(Debug, Clone, Default)]
pub struct ErrorSlot {
    inner: Arc<StdMutex<Option<String>>>,
}

impl ErrorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the slot with `message`.
    pub fn record(&self, message: impl Into<String>) {
        *self.inner.lock().unwrap() = Some(message.into());
    }

    /// Returns the most recent failure text, if any operation failed yet.
    pub fn get(&self) -> Option<String> {
        self.inner.lock().unwrap().clone()
    }
}

// ── Transport ─────────────────────────────────────────────────────────────────

/// State shared between the [`Transport`] handle and its reader task.
struct Shared {
    /// Correlation token → caller awaiting the response.
    pending: StdMutex<HashMap<u64, oneshot::Sender<HubMessage>>>,
    /// Device id → queue feeding that device's output dispatcher.
    routes: StdMutex<HashMap<String, mpsc::UnboundedSender<Vec<u8>>>>,
    closed: AtomicBool,
    errors: ErrorSlot,
}

/// One TCP connection to the hub, shared by the RPC engine and every
/// device handle.
pub struct Transport {
    writer: Mutex<Option<OwnedWriteHalf>>,
    shared: Arc<Shared>,
    reader: StdMutex<Option<JoinHandle<()>>>,
    write_timeout: Duration,
}

impl Transport {
    /// Dials the hub and spawns the background reader task.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError`] when the TCP connection cannot be
    /// established within the configured dial timeout.
    pub async fn connect(
        addr: &HubAddr,
        config: &ClientConfig,
        errors: ErrorSlot,
    ) -> Result<Arc<Self>, ConnectionError> {
        let connect = TcpStream::connect((addr.host.as_str(), addr.port));
        let stream = match time::timeout(config.dial_timeout(), connect).await {
            Err(_) => {
                return Err(ConnectionError::Timeout {
                    addr: addr.clone(),
                    timeout: config.dial_timeout(),
                })
            }
            Ok(Err(source)) => {
                return Err(ConnectionError::ConnectFailed {
                    addr: addr.clone(),
                    source,
                })
            }
            Ok(Ok(stream)) => stream,
        };

        // Reports are small and latency-sensitive; don't let Nagle batch them.
        if let Err(e) = stream.set_nodelay(true) {
            warn!("failed to set TCP_NODELAY: {e}");
        }

        debug!("connected to hub at {addr}");
        let (read_half, write_half) = stream.into_split();

        let shared = Arc::new(Shared {
            pending: StdMutex::new(HashMap::new()),
            routes: StdMutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
            errors,
        });

        let reader = tokio::spawn(read_loop(read_half, Arc::clone(&shared)));

        Ok(Arc::new(Self {
            writer: Mutex::new(Some(write_half)),
            shared,
            reader: StdMutex::new(Some(reader)),
            write_timeout: config.write_timeout(),
        }))
    }

    /// Encodes and writes one frame.
    ///
    /// Writes are serialized on the connection, so frames for one device
    /// reach the hub in send-call order.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the transport is closed or the
    /// write fails; a failed write poisons the transport.
    pub async fn send_frame(&self, msg: &HubMessage, token: u64) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let bytes = encode_message(msg, token)?;

        // Scope the write-half lock so poisoning below never contends on it.
        let written = {
            let mut guard = self.writer.lock().await;
            let writer = guard.as_mut().ok_or(TransportError::Closed)?;
            time::timeout(self.write_timeout, writer.write_all(&bytes)).await
        };
        match written {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                poison(&self.shared, &format!("write error: {e}"));
                Err(TransportError::Io(e))
            }
            Err(_) => {
                poison(&self.shared, "write timed out");
                Err(TransportError::Io(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "write timed out",
                )))
            }
        }
    }

    /// Parks a response waiter under `token`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] when the transport is already
    /// gone, so the caller fails fast instead of waiting out a timeout.
    pub fn add_pending(
        &self,
        token: u64,
        tx: oneshot::Sender<HubMessage>,
    ) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.shared.pending.lock().unwrap().insert(token, tx);
        // The reader may have poisoned between the check and the insert;
        // re-checking closes that window.
        if self.is_closed() {
            self.shared.pending.lock().unwrap().remove(&token);
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    /// Forgets the waiter for `token` (call abandoned or timed out). A
    /// response arriving later is logged and discarded by the reader.
    pub fn remove_pending(&self, token: u64) {
        self.shared.pending.lock().unwrap().remove(&token);
    }

    /// Opens the inbound channel for a device's output frames. Frames for
    /// `dev_id` are delivered to the returned receiver until the route is
    /// unregistered, the hub reports the device gone, or the transport
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] when the transport is gone.
    pub fn register_reader(
        &self,
        dev_id: &str,
    ) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared
            .routes
            .lock()
            .unwrap()
            .insert(dev_id.to_string(), tx);
        if self.is_closed() {
            self.shared.routes.lock().unwrap().remove(dev_id);
            return Err(TransportError::Closed);
        }
        Ok(rx)
    }

    /// Closes a device's inbound channel. Idempotent.
    pub fn unregister_reader(&self, dev_id: &str) {
        self.shared.routes.lock().unwrap().remove(dev_id);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Terminates the connection. Idempotent; any blocked operation fails
    /// with [`TransportError::Closed`].
    pub async fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        let reader = self.reader.lock().unwrap().take();
        if let Some(handle) = reader {
            handle.abort();
        }
        self.shared.pending.lock().unwrap().clear();
        self.shared.routes.lock().unwrap().clear();
    }
}

// ── Reader task ───────────────────────────────────────────────────────────────

/// Upper bound on a frame's declared payload length. A header claiming
/// more than this is treated as stream corruption rather than waited out.
const MAX_FRAME_PAYLOAD: usize = 16 * 1024 * 1024;

/// Reads frames from the hub and routes them until the connection dies.
///
/// A frame whose payload fails to decode is logged and skipped: its
/// length field still delimits it, so one bad frame must not end delivery
/// for unrelated devices. Only corruption of the framing itself (a version
/// byte we cannot trust, an absurd length) is connection-fatal.
async fn read_loop(mut reader: OwnedReadHalf, shared: Arc<Shared>) {
    // Streaming receive buffer: accumulates bytes across read() calls
    // because one read may deliver a partial frame or several frames.
    let mut recv_buf: Vec<u8> = Vec::with_capacity(4096);
    let mut read_tmp = vec![0u8; 4096];

    let reason = 'conn: loop {
        let n = match reader.read(&mut read_tmp).await {
            Ok(0) => break "connection closed by hub".to_string(),
            Ok(n) => n,
            Err(e) => break format!("read error: {e}"),
        };
        recv_buf.extend_from_slice(&read_tmp[..n]);

        loop {
            match decode_message(&recv_buf) {
                Ok((msg, token, consumed)) => {
                    recv_buf.drain(..consumed);
                    dispatch(&shared, msg, token);
                }
                Err(ProtocolError::InsufficientData { .. }) => break,
                Err(e @ ProtocolError::UnknownMessageType(_))
                | Err(e @ ProtocolError::MalformedPayload(_)) => {
                    // The header survived decoding, so its length field
                    // still tells us where this frame ends.
                    let payload_len =
                        u32::from_be_bytes([recv_buf[4], recv_buf[5], recv_buf[6], recv_buf[7]])
                            as usize;
                    if payload_len > MAX_FRAME_PAYLOAD {
                        break 'conn format!("unreasonable frame length {payload_len}: {e}");
                    }
                    let total = HEADER_SIZE + payload_len;
                    if recv_buf.len() < total {
                        break; // skip once the whole frame has arrived
                    }
                    warn!("skipping malformed frame: {e}");
                    recv_buf.drain(..total);
                }
                Err(e) => break 'conn format!("malformed frame from hub: {e}"),
            }
        }
    };

    debug!("transport reader stopping: {reason}");
    poison(&shared, &reason);
}

/// Routes one decoded frame to its consumer.
fn dispatch(shared: &Shared, msg: HubMessage, token: u64) {
    match msg {
        HubMessage::OutputReport { dev_id, data } => {
            let routes = shared.routes.lock().unwrap();
            match routes.get(&dev_id) {
                // A send error means the receiver is gone, which only
                // happens while the device is closing; the frame is moot.
                Some(tx) => {
                    let _ = tx.send(data);
                }
                None => debug!("dropping output report for unknown device {dev_id}"),
            }
        }
        HubMessage::DeviceGone { dev_id } => {
            if shared.routes.lock().unwrap().remove(&dev_id).is_some() {
                debug!("hub ended the stream for device {dev_id}");
            }
        }
        response if token != UNSOLICITED_TOKEN && response.message_type().is_response() => {
            let waiter = shared.pending.lock().unwrap().remove(&token);
            match waiter {
                Some(tx) => {
                    let _ = tx.send(response);
                }
                // The caller gave up (timeout) before the hub answered.
                None => warn!(
                    "discarding {:?} response with unclaimed token {token}",
                    response.message_type()
                ),
            }
        }
        other => warn!(
            "ignoring unexpected unsolicited frame {:?}",
            other.message_type()
        ),
    }
}

/// Marks the transport dead and wakes everything waiting on it.
fn poison(shared: &Shared, reason: &str) {
    if !shared.closed.swap(true, Ordering::SeqCst) {
        shared.errors.record(reason);
    }
    // Dropping the parked senders fails every in-flight call; dropping the
    // route senders ends every device's output stream.
    shared.pending.lock().unwrap().clear();
    shared.routes.lock().unwrap().clear();
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_slot_starts_empty() {
        let slot = ErrorSlot::new();
        assert_eq!(slot.get(), None);
    }

    #[test]
    fn test_error_slot_keeps_most_recent_message() {
        let slot = ErrorSlot::new();
        slot.record("first failure");
        slot.record("second failure");
        assert_eq!(slot.get(), Some("second failure".to_string()));
    }

    #[test]
    fn test_error_slot_clones_share_state() {
        // The reader task and the client facade hold clones of one slot;
        // a record through either must be visible through both.
        let slot = ErrorSlot::new();
        let clone = slot.clone();
        clone.record("connection closed by hub");
        assert_eq!(slot.get(), Some("connection closed by hub".to_string()));
    }

    #[tokio::test]
    async fn test_connect_to_refused_port_fails() {
        // Port 1 is essentially never listening; the dial must surface
        // ConnectFailed, not hang.
        let addr = HubAddr::new("127.0.0.1", 1);
        let result = Transport::connect(&addr, &ClientConfig::default(), ErrorSlot::new()).await;
        assert!(matches!(
            result,
            Err(ConnectionError::ConnectFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_operations_on_closed_transport_fail_with_closed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = HubAddr::new("127.0.0.1", listener.local_addr().unwrap().port());

        let transport = Transport::connect(&addr, &ClientConfig::default(), ErrorSlot::new())
            .await
            .expect("connect");
        transport.close().await;

        assert!(transport.is_closed());
        assert!(matches!(
            transport.send_frame(&HubMessage::Ping, 1).await,
            Err(TransportError::Closed)
        ));
        assert!(matches!(
            transport.register_reader("1-1"),
            Err(TransportError::Closed)
        ));
        let (tx, _rx) = oneshot::channel();
        assert!(matches!(
            transport.add_pending(7, tx),
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = HubAddr::new("127.0.0.1", listener.local_addr().unwrap().port());

        let transport = Transport::connect(&addr, &ClientConfig::default(), ErrorSlot::new())
            .await
            .expect("connect");
        transport.close().await;
        transport.close().await;
        assert!(transport.is_closed());
    }
}
