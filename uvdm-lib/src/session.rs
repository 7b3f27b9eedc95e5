//! Per-transfer state shared between a blocked `send`/`receive` call and the
//! dispatch path that feeds it.

use crate::error::UvdmError;
use crate::header::Direction;
use crate::message::UvdmMessage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

#[derive(Debug)]
pub(crate) struct SessionState {
    direction: Direction,
    first_chunk: AtomicBool,
}

impl SessionState {
    pub(crate) fn direction(&self) -> Direction {
        self.direction
    }

    pub(crate) fn is_first_chunk(&self) -> bool {
        self.first_chunk.load(Ordering::Acquire)
    }

    pub(crate) fn clear_first_chunk(&self) {
        self.first_chunk.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
struct ActiveSession {
    state: Arc<SessionState>,
    tx: mpsc::Sender<UvdmMessage>,
}

/// Holds the session of the transfer in flight, if any.
#[derive(Debug, Default)]
pub(crate) struct SessionSlot {
    active: Mutex<Option<ActiveSession>>,
}

impl SessionSlot {
    fn lock(&self) -> MutexGuard<'_, Option<ActiveSession>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new session; it is removed again when the returned value drops.
    pub(crate) fn open(&self, direction: Direction, depth: usize) -> Session<'_> {
        let (tx, rx) = mpsc::channel(depth.max(1));
        let state = Arc::new(SessionState {
            direction,
            first_chunk: AtomicBool::new(true),
        });
        *self.lock() = Some(ActiveSession {
            state: state.clone(),
            tx,
        });
        Session { slot: self, state, rx }
    }

    pub(crate) fn current(&self) -> Option<(Arc<SessionState>, mpsc::Sender<UvdmMessage>)> {
        self.lock()
            .as_ref()
            .map(|active| (active.state.clone(), active.tx.clone()))
    }

    /// Drop the active session's sender so its waiter wakes up with `Closed`.
    pub(crate) fn close(&self) -> bool {
        self.lock().take().is_some()
    }

    fn release(&self, state: &Arc<SessionState>) {
        let mut active = self.lock();
        if active.as_ref().is_some_and(|a| Arc::ptr_eq(&a.state, state)) {
            *active = None;
        }
    }
}

pub(crate) struct Session<'a> {
    slot: &'a SessionSlot,
    state: Arc<SessionState>,
    rx: mpsc::Receiver<UvdmMessage>,
}

impl Session<'_> {
    pub(crate) fn state(&self) -> &SessionState {
        &self.state
    }

    /// Wait for the next message routed to this session.
    pub(crate) async fn wait(&mut self, wait: Duration) -> Result<UvdmMessage, UvdmError> {
        match timeout(wait, self.rx.recv()).await? {
            Some(message) => Ok(message),
            None => Err(UvdmError::Closed),
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.slot.release(&self.state);
    }
}
