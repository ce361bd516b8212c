//! Cooperative cancellation for tree traversals.
//!
//! A [`CancelToken`] is only checked at sibling boundaries within a page
//! and before each descent or search emission. A search blocked on a slow
//! consumer wakes up as soon as the token is cancelled or its deadline
//! passes.

use crate::error::{GistError, GistResult};
use crossbeam_channel::{select, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cloneable cancellation handle with an optional deadline.
///
/// Cancelling disconnects an internal channel that nobody ever sends on,
/// which wakes every `select!` waiting on it. Clones share the same state.
#[derive(Clone)]
pub struct CancelToken {
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    done: Receiver<()>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        Self {
            trigger: Arc::new(Mutex::new(Some(tx))),
            done: rx,
            deadline: None,
        }
    }

    /// A token sharing this one's cancellation that also expires at
    /// `deadline` (or earlier, if this token already has a sooner one).
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        };
        Self {
            deadline: Some(deadline),
            ..self.clone()
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancels this token and every clone of it. Idempotent.
    pub fn cancel(&self) {
        if self.trigger.lock().take().is_some() {
            log::debug!("cancel token fired");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// `Ok(())` while the token is live, otherwise the cancellation error.
    pub fn check(&self) -> GistResult<()> {
        match self.reason() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Hands `item` to `sink`, blocking until the consumer takes it or the
    /// token fires.
    pub fn send<T>(&self, sink: &Sender<T>, item: T) -> GistResult<()> {
        self.check()?;

        let expiry = match self.deadline {
            Some(deadline) => crossbeam_channel::at(deadline),
            None => crossbeam_channel::never(),
        };

        select! {
            send(sink, item) -> res => res.map_err(|_| GistError::SinkClosed),
            recv(self.done) -> _ => Err(GistError::Cancelled),
            recv(expiry) -> _ => Err(GistError::DeadlineExceeded),
        }
    }

    fn reason(&self) -> Option<GistError> {
        if let Err(TryRecvError::Disconnected) = self.done.try_recv() {
            return Some(GistError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(GistError::DeadlineExceeded),
            _ => None,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.deadline)
            .finish()
    }
}
