use std::sync::Arc;

use crossbeam_channel::Receiver;

use crate::errors::EngineError;
use crate::locator::VideoLocator;

/// Identifies one loaded item within an engine for the process lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ItemId(pub u64);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

/// Per-item lifecycle signals delivered asynchronously by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemEvent {
    /// The item played through to its end.
    EndOfStream,
    /// Unrecoverable playback failure.
    Failed { reason: String },
    /// Playback stalled waiting for media data.
    Stalled,
    /// Non-fatal decoder diagnostic. Log-only, never a transport trigger.
    ErrorLog { entry: String },
}

/// A signal tagged with the item it belongs to.
///
/// The tag lets consumers discard signals from an item they already
/// detached from, so a swap can never double-deliver a terminal event.
#[derive(Clone, Debug)]
pub struct ItemSignal {
    pub item: ItemId,
    pub event: ItemEvent,
}

/// One engine-side playback session.
///
/// The coordination core calls exactly three transport operations on a
/// session and consumes its signal channel; everything else the engine does
/// internally is opaque.
pub trait EngineSession: Send + Sync {
    /// Replace the current item with one built from `locator`.
    ///
    /// The previous item, if any, is discarded by the engine. Returns the
    /// id of the freshly loaded item.
    fn load_item(&self, locator: &VideoLocator) -> Result<ItemId, EngineError>;

    /// Drop the current item without loading a replacement.
    fn clear_item(&self);

    fn set_rate(&self, rate: f64);

    fn rate(&self) -> f64;

    /// The session's signal channel. Single consumer; signals carry the id
    /// of the item they were emitted for.
    fn signals(&self) -> Receiver<ItemSignal>;
}

/// Factory for engine sessions.
pub trait MediaEngine: Send + Sync {
    fn create_session(&self) -> Result<Arc<dyn EngineSession>, EngineError>;
}
