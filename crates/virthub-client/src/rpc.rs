//! Management RPC engine: one logical call per request, with the response
//! paired by correlation token.
//!
//! Several calls may be outstanding at once; each draws a fresh token from
//! the shared counter and parks a oneshot in the transport's pending
//! table. Responses therefore pair per-token only — the protocol makes no
//! cross-request ordering promise between concurrent calls.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time;
use tracing::debug;

use virthub_core::{HubMessage, TokenCounter};

use crate::transport::{Transport, TransportError};

/// Management call failures.
///
/// `Remote` is a normal, expected outcome (the hub refusing to remove a
/// non-empty bus, for instance), not a crash condition; callers inspect it
/// and decide how to proceed.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The response decoded but had an unexpected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The hub reported an application-level failure.
    #[error("hub error {status}: {message}")]
    Remote { status: u16, message: String },

    /// No response arrived within the call timeout. The connection should
    /// be treated as suspect; repeated timeouts mean reconnect.
    #[error("no response from hub within {0:?}")]
    Timeout(Duration),

    /// The underlying connection failed.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}

/// Issues management requests over the shared transport.
#[derive(Clone)]
pub struct RpcEngine {
    transport: Arc<Transport>,
    tokens: Arc<TokenCounter>,
    call_timeout: Duration,
}

impl RpcEngine {
    pub fn new(transport: Arc<Transport>, call_timeout: Duration) -> Self {
        Self {
            transport,
            tokens: Arc::new(TokenCounter::new()),
            call_timeout,
        }
    }

    /// Sends `request` and waits for the correlated response.
    ///
    /// A hub `Error` response is surfaced as [`RpcError::Remote`]; any
    /// other response is returned as-is for the caller to destructure.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError`] on transport failure, hub-reported failure, or
    /// timeout. After a timeout the pending entry is dropped, so a late
    /// response is discarded by the reader instead of pairing with a
    /// different call.
    pub async fn call(&self, request: HubMessage) -> Result<HubMessage, RpcError> {
        let token = self.tokens.next();
        debug!("-> {:?} (token {token})", request.message_type());

        let (tx, rx) = oneshot::channel();
        self.transport.add_pending(token, tx)?;

        if let Err(e) = self.transport.send_frame(&request, token).await {
            self.transport.remove_pending(token);
            return Err(RpcError::Transport(e));
        }

        let response = match time::timeout(self.call_timeout, rx).await {
            // Timer fired before the hub answered.
            Err(_) => {
                self.transport.remove_pending(token);
                return Err(RpcError::Timeout(self.call_timeout));
            }
            // Sender dropped: the transport was poisoned while we waited.
            Ok(Err(_)) => return Err(RpcError::Transport(TransportError::Closed)),
            Ok(Ok(msg)) => msg,
        };

        debug!("<- {:?} (token {token})", response.message_type());
        match response {
            HubMessage::Error { status, message } => Err(RpcError::Remote { status, message }),
            other => Ok(other),
        }
    }
}
