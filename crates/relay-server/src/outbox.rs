//! Per-connection outbound queue.

use std::sync::Arc;

use tokio::sync::mpsc;

/// Why a frame could not be queued for a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    #[error("send queue full")]
    Full,
    #[error("connection closed")]
    Closed,
}

/// Sending half of a connection's bounded write queue.
///
/// Pushing never waits: a slow client fills its own queue and starts
/// dropping frames without holding up anyone else.
#[derive(Clone, Debug)]
pub struct Outbox {
    tx: mpsc::Sender<Arc<str>>,
}

impl Outbox {
    /// Create an outbox and the receiver its writer task drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn push(&self, frame: Arc<str>) -> Result<(), PushError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PushError::Full,
            mpsc::error::TrySendError::Closed(_) => PushError::Closed,
        })
    }
}
