//! Live connection handles owned by sessions.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use log::debug;
use tokio::sync::mpsc;

/// Size of the per-connection send buffer.
pub const CONNECTION_BUFFER_SIZE: usize = 64;

/// Process-unique connection identifier.
pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh connection id.
pub fn next_connection_id() -> ConnectionId {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// A transport-specific handle to one live client connection.
///
/// Implementations must not block in [`send`](ConnectionHandle::send): the
/// broadcaster calls it for every open connection of a user in turn.
pub trait ConnectionHandle: Send + Sync + fmt::Debug {
    /// Identifier used to detach the handle later.
    fn id(&self) -> ConnectionId;

    /// Whether the connection is open (or still connecting).
    fn is_open(&self) -> bool;

    /// Queue a serialized payload. Returns false if it was dropped.
    fn send(&self, payload: &str) -> bool;
}

/// Connection backed by a bounded channel drained by a socket writer task.
#[derive(Debug)]
pub struct ChannelConnection {
    id: ConnectionId,
    tx: mpsc::Sender<String>,
    closed: AtomicBool,
}

impl ChannelConnection {
    /// Create a connection and the receiver its writer task should drain.
    pub fn new() -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(CONNECTION_BUFFER_SIZE);
        let conn = Self {
            id: next_connection_id(),
            tx,
            closed: AtomicBool::new(false),
        };
        (conn, rx)
    }

    /// Mark the connection as closing; later sends are refused.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl ConnectionHandle for ChannelConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    fn send(&self, payload: &str) -> bool {
        if !self.is_open() {
            return false;
        }
        match self.tx.try_send(payload.to_string()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("connection {} send buffer full, dropping payload", self.id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}
