//! Device handles: the outbound report path and the streaming output
//! dispatcher.
//!
//! # Output delivery
//!
//! Each attached device owns one inbound queue fed by the transport's
//! reader. Exactly one consumer may claim it:
//!
//! - [`DeviceHandle::take_output_stream`] hands the queue to the caller as
//!   an [`OutputStream`] of owned byte buffers to drain at its own pace.
//! - [`DeviceHandle::register_output`] spawns the per-device dispatcher
//!   task, which invokes the callback synchronously with each delivery.
//!
//! Either way, one delivery may carry **zero or more whole records
//! concatenated** (several 1-byte LED updates that arrived back-to-back,
//! for instance). Record splitting is the device-class layer's job; the
//! dispatcher never drops or reorders bytes.
//!
//! # Close semantics
//!
//! The dispatcher's lifecycle per device is
//! `Unregistered -> Listening -> Stopped`. [`DeviceHandle::close`] blocks
//! until any in-flight callback invocation returns, and no invocation
//! happens afterwards. `close` must therefore not be called from inside
//! the callback itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use virthub_core::protocol::messages::{DeviceInfo, UNSOLICITED_TOKEN};
use virthub_core::HubMessage;

use crate::rpc::RpcEngine;
use crate::transport::{Transport, TransportError};

/// Device-scoped failures.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device was closed; sending and receiving are over.
    #[error("device is closed")]
    Closed,

    /// The device's output queue was already claimed by a stream or a
    /// callback registration.
    #[error("device output already claimed")]
    OutputClaimed,

    /// The underlying connection failed.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}

type OutputCallback = Box<dyn FnMut(&[u8]) + Send>;

/// The inbound side of a device's streaming channel.
///
/// Each [`recv`] yields one delivery as an owned buffer. The stream ends
/// (`None`) when the device is closed, the hub reports it gone, or the
/// transport fails; deliveries already queued before a close remain
/// receivable first. The queue is unbounded: a slow consumer delays only
/// itself, never the connection.
///
/// [`recv`]: OutputStream::recv
pub struct OutputStream {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl OutputStream {
    /// Waits for the next delivery.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    /// Returns a queued delivery without waiting, if one is ready.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }
}

struct DeviceShared {
    info: DeviceInfo,
    transport: Arc<Transport>,
    rpc: RpcEngine,
    closed: AtomicBool,
    /// Inbound queue, parked here until a stream or callback claims it.
    output_rx: StdMutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    /// Callback slot; the dispatcher holds this lock for the duration of
    /// every invocation, so replacing the callback never races a delivery.
    callback: StdMutex<Option<OutputCallback>>,
    dispatcher: StdMutex<Option<JoinHandle<()>>>,
}

/// A live, attached device. Cheap to clone; all clones refer to the same
/// device and close together.
///
/// Valid only while its owning client is alive and the device has not
/// been closed.
#[derive(Clone)]
pub struct DeviceHandle {
    shared: Arc<DeviceShared>,
}

impl DeviceHandle {
    pub(crate) fn new(
        info: DeviceInfo,
        transport: Arc<Transport>,
        rpc: RpcEngine,
        output_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        Self {
            shared: Arc::new(DeviceShared {
                info,
                transport,
                rpc,
                closed: AtomicBool::new(false),
                output_rx: StdMutex::new(Some(output_rx)),
                callback: StdMutex::new(None),
                dispatcher: StdMutex::new(None),
            }),
        }
    }

    /// The hub's description of this device.
    pub fn info(&self) -> &DeviceInfo {
        &self.shared.info
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Sends one input report, fire-and-forget: the bytes are handed to
    /// the connection and no acknowledgement is implied. Reports reach the
    /// hub in send-call order.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Closed`] after [`close`], or
    /// [`DeviceError::Transport`] when the connection failed.
    ///
    /// [`close`]: DeviceHandle::close
    pub async fn send(&self, report: &[u8]) -> Result<(), DeviceError> {
        if self.is_closed() {
            return Err(DeviceError::Closed);
        }
        let frame = HubMessage::InputReport {
            dev_id: self.shared.info.dev_id.clone(),
            data: report.to_vec(),
        };
        self.shared
            .transport
            .send_frame(&frame, UNSOLICITED_TOKEN)
            .await?;
        Ok(())
    }

    /// Claims the device's output queue as an [`OutputStream`].
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Closed`] after [`close`], or
    /// [`DeviceError::OutputClaimed`] when a stream was already taken or a
    /// callback is registered.
    ///
    /// [`close`]: DeviceHandle::close
    pub fn take_output_stream(&self) -> Result<OutputStream, DeviceError> {
        if self.is_closed() {
            return Err(DeviceError::Closed);
        }
        let rx = self
            .shared
            .output_rx
            .lock()
            .unwrap()
            .take()
            .ok_or(DeviceError::OutputClaimed)?;
        Ok(OutputStream { rx })
    }

    /// Installs `callback` for output deliveries and starts the device's
    /// dispatcher task. At most one callback is active; registering again
    /// replaces the previous one without racing an in-flight delivery.
    ///
    /// The callback runs on the dispatcher task with an owned buffer per
    /// delivery and must not call [`close`] on this handle.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Closed`] after [`close`], or
    /// [`DeviceError::OutputClaimed`] when the queue was already taken as
    /// a stream.
    ///
    /// [`close`]: DeviceHandle::close
    pub fn register_output<F>(&self, callback: F) -> Result<(), DeviceError>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        if self.is_closed() {
            return Err(DeviceError::Closed);
        }

        let mut slot = self.shared.callback.lock().unwrap();
        if slot.is_some() {
            // Replacement: the dispatcher keeps running; swapping under
            // the slot lock serializes with any in-flight invocation.
            *slot = Some(Box::new(callback));
            return Ok(());
        }

        let rx = self
            .shared
            .output_rx
            .lock()
            .unwrap()
            .take()
            .ok_or(DeviceError::OutputClaimed)?;
        *slot = Some(Box::new(callback));
        drop(slot);

        let task = tokio::spawn(dispatch_loop(Arc::clone(&self.shared), rx));
        *self.shared.dispatcher.lock().unwrap() = Some(task);
        Ok(())
    }

    /// Closes the device. Idempotent and safe to call concurrently with a
    /// delivery: it stops the dispatcher, waiting for any in-flight
    /// callback invocation to return, tells the hub to detach the stream
    /// (best effort), and releases the device's route. No callback runs
    /// after `close` returns.
    ///
    /// Must not be called from inside the output callback: the dispatcher
    /// cannot wait for itself.
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("closing device {}", self.shared.info.dev_id);

        // Stop routing first so nothing new enters the queue.
        self.shared
            .transport
            .unregister_reader(&self.shared.info.dev_id);

        // Tell the hub, best effort; the connection may already be gone.
        if !self.shared.transport.is_closed() {
            let detach = HubMessage::DeviceDetach {
                dev_id: self.shared.info.dev_id.clone(),
            };
            if let Err(e) = self.shared.rpc.call(detach).await {
                debug!("detach of device {} failed: {e}", self.shared.info.dev_id);
            }
        }

        // Wait for the dispatcher; once it has joined, the in-flight
        // invocation (if any) has returned and no further one can start.
        let task = self.shared.dispatcher.lock().unwrap().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!(
                        "output callback for device {} panicked",
                        self.shared.info.dev_id
                    );
                }
            }
        }
    }
}

/// Per-device delivery loop: `Listening` until the queue ends or the
/// device closes.
async fn dispatch_loop(shared: Arc<DeviceShared>, mut rx: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(frame) = rx.recv().await {
        let mut slot = shared.callback.lock().unwrap();
        // Checked under the slot lock: a concurrent close() waits for this
        // invocation via the join handle, and nothing runs after it.
        if shared.closed.load(Ordering::SeqCst) {
            break;
        }
        if let Some(callback) = slot.as_mut() {
            callback(&frame);
        }
    }
    debug!("output dispatcher for device {} stopped", shared.info.dev_id);
}
