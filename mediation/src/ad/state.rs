//! Ad handle lifecycle.
//!
//! ```text
//! Created --fetch_assets--> AssetsPending --all slots resolved--> Ready
//! Created --mark_ready--> Ready
//! Ready | Idle --start_tracking--> Tracking
//! Tracking --stop_tracking--> Idle
//! any (except Destroyed) --destroy--> Destroyed
//! ```

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdState {
    /// Loaded by a provider, assets not fetched yet.
    Created,
    /// Asset downloads in flight.
    AssetsPending,
    /// Assets resolved; ready to be bound to a surface.
    Ready,
    /// Bound to a surface; impression and click signals are armed.
    Tracking,
    /// Unbound after tracking; may be bound again.
    Idle,
    /// Provider resources released. Terminal.
    Destroyed,
}

impl AdState {
    pub fn name(&self) -> &'static str {
        match self {
            AdState::Created => "created",
            AdState::AssetsPending => "assets_pending",
            AdState::Ready => "ready",
            AdState::Tracking => "tracking",
            AdState::Idle => "idle",
            AdState::Destroyed => "destroyed",
        }
    }

    pub fn can_fetch_assets(&self) -> bool {
        matches!(self, AdState::Created)
    }

    pub fn can_start_tracking(&self) -> bool {
        matches!(self, AdState::Ready | AdState::Idle)
    }

    pub fn can_stop_tracking(&self) -> bool {
        matches!(self, AdState::Tracking)
    }

    /// Whether the ad can be shown (assets resolved, not torn down).
    pub fn is_usable(&self) -> bool {
        matches!(self, AdState::Ready | AdState::Tracking | AdState::Idle)
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self, AdState::Destroyed)
    }
}

impl fmt::Display for AdState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An operation was invoked in a state that does not allow it.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("cannot {operation} while {state}")]
pub struct LifecycleError {
    pub operation: &'static str,
    pub state: AdState,
}
