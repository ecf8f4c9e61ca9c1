//! # DuskCore
//!
//! Session coordination for the Duskfall ambient-video presentation.
//!
//! The core decides how many playback sessions exist, which surfaces share
//! one, and how a session advances to the next video when its current item
//! ends, fails or stalls — while surfaces come and go at arbitrary times
//! (monitor hot-plug, preview pane open/close, live activation).
//!
//! Structure:
//!
//! - [`SessionCoordinator`] resolves a session for every surface the host
//!   attaches, per the sharing policy, and owns the coordination context.
//! - [`AdvanceController`] reacts to a session's terminal item signals by
//!   pulling a fresh locator from the catalog, swapping the item, and
//!   fanning the session reference out to every bound surface.
//! - [`SurfaceRegistry`] is the insertion-ordered fan-out list.
//! - [`PlaybackSession`] wraps one engine session and its current item.
//! - [`QuoteRotator`] drives each surface's overlay text. Auxiliary.
//!
//! Decoding and rendering stay behind the `duskengine` traits; video
//! selection stays behind the `duskcatalog` trait.

mod advance;
mod coordinator;
mod errors;
mod events;
mod quotes;
mod registry;
mod session;
mod surface;

use std::fmt;

use uuid::Uuid;

pub use advance::{AdvanceController, AdvanceState};
pub use coordinator::{SessionCoordinator, SharingPolicy};
pub use errors::CoreError;
pub use events::{CoordinatorEvent, CoordinatorEventBus};
pub use quotes::{DEFAULT_QUOTES, QuoteDeck, QuoteRotator};
pub use registry::SurfaceRegistry;
pub use session::{PlaybackSession, SessionKind};
pub use surface::{OverlayText, Surface, SurfaceSpec};

/// Identifies one rendering surface (a display or a preview pane).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub String);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one playback session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
