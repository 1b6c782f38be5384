//! Shared desk state
//!
//! The cached device, the connection status and the motion flag live behind
//! one mutex. The lock is only held to read or update these fields and is
//! never held across radio I/O.

use crate::domain::models::ConnectionStatus;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A cached device together with the connection generation it belongs to
#[derive(Debug, Clone)]
pub struct DeskLink<D> {
    pub device: D,
    pub generation: u64,
}

struct DeskState<D> {
    link: Option<DeskLink<D>>,
    generation: u64,
    status: ConnectionStatus,
    moving: bool,
}

pub struct SharedState<D> {
    inner: Arc<Mutex<DeskState<D>>>,
}

impl<D> Clone for SharedState<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D> Default for SharedState<D> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(DeskState {
                link: None,
                generation: 0,
                status: ConnectionStatus::NotConnected,
                moving: false,
            })),
        }
    }
}

impl<D> SharedState<D> {
    fn lock(&self) -> MutexGuard<'_, DeskState<D>> {
        // Plain flags: a panic elsewhere cannot leave them half-written
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> ConnectionStatus {
        self.lock().status
    }

    pub fn is_moving(&self) -> bool {
        self.lock().moving
    }

    /// Drop the cached link if it still belongs to `generation`.
    ///
    /// Returns whether anything was evicted.
    pub fn invalidate(&self, generation: u64) -> bool {
        let mut state = self.lock();
        match &state.link {
            Some(link) if link.generation == generation => {
                state.link = None;
                state.status = ConnectionStatus::NotConnected;
                true
            }
            _ => false,
        }
    }

    /// Claim the motion flag, or `None` if a move is already in flight
    pub fn try_begin_motion(&self) -> Option<MotionGuard<D>> {
        let mut state = self.lock();
        if state.moving {
            return None;
        }
        state.moving = true;
        Some(MotionGuard {
            state: self.clone(),
        })
    }
}

impl<D: Clone> SharedState<D> {
    pub fn cached_link(&self) -> Option<DeskLink<D>> {
        self.lock().link.clone()
    }

    /// Cache a freshly connected device, replacing any earlier one
    pub fn store_link(&self, device: D) -> DeskLink<D> {
        let mut state = self.lock();
        state.generation += 1;
        let link = DeskLink {
            device,
            generation: state.generation,
        };
        state.link = Some(link.clone());
        state.status = ConnectionStatus::Connected;
        link
    }
}

/// Holds the motion flag; clears it when dropped
pub struct MotionGuard<D> {
    state: SharedState<D>,
}

impl<D> Drop for MotionGuard<D> {
    fn drop(&mut self) {
        self.state.lock().moving = false;
    }
}
