//! Thread-safe counter for RPC correlation tokens.
//!
//! Every management request carries a token that the hub echoes in its
//! response, letting the client pair responses with requests even when
//! several calls are outstanding at once. Token 0 is reserved for
//! unsolicited device-channel frames, so the counter starts at 1.
//!
//! The counter uses an `AtomicU64` internally: two tasks can both draw a
//! token simultaneously without locking and without ever receiving the
//! same value.

use std::sync::atomic::{AtomicU64, Ordering};

/// A thread-safe, monotonically increasing source of correlation tokens.
///
/// Tokens start at 1 and increment by 1 with each call to [`next`].
///
/// # Examples
///
/// ```rust
/// use virthub_core::protocol::TokenCounter;
///
/// let counter = TokenCounter::new();
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.next(), 2);
/// ```
///
/// [`next`]: TokenCounter::next
pub struct TokenCounter {
    inner: AtomicU64,
}

impl TokenCounter {
    /// Creates a new counter whose first token will be 1.
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(1),
        }
    }

    /// Returns the next token and atomically advances the counter.
    ///
    /// `Ordering::Relaxed` is sufficient: tokens only need to be unique,
    /// they are not used to synchronise memory between threads.
    pub fn next(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}
