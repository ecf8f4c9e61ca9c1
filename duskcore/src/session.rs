use std::fmt;
use std::sync::{Arc, Mutex};

use crossbeam_channel::Receiver;
use tracing::debug;

use duskengine::{EngineError, EngineSession, ItemId, ItemSignal, MediaEngine, VideoLocator};

use crate::SessionId;

/// Role a session was created for. The preview session can additionally be
/// adopted as the shared session later; roles are tracked by the
/// coordination context, not by the session itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionKind {
    Preview,
    Shared,
    Dedicated,
}

struct CurrentItem {
    item: ItemId,
    locator: VideoLocator,
}

/// One playback session: an engine session plus its current item.
///
/// The current item is replaced, never mutated in place. The item record
/// doubles as the observer bookkeeping: while it is `None`, no signal can
/// match and the session is effectively detached.
pub struct PlaybackSession {
    id: SessionId,
    engine: Arc<dyn EngineSession>,
    current: Mutex<Option<CurrentItem>>,
}

impl PlaybackSession {
    pub(crate) fn create(engine: &dyn MediaEngine) -> Result<Arc<Self>, EngineError> {
        let engine_session = engine.create_session()?;
        Ok(Arc::new(Self {
            id: SessionId::new(),
            engine: engine_session,
            current: Mutex::new(None),
        }))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn current_item(&self) -> Option<ItemId> {
        self.current
            .lock()
            .expect("session item mutex poisoned")
            .as_ref()
            .map(|current| current.item)
    }

    pub fn current_locator(&self) -> Option<VideoLocator> {
        self.current
            .lock()
            .expect("session item mutex poisoned")
            .as_ref()
            .map(|current| current.locator.clone())
    }

    pub fn rate(&self) -> f64 {
        self.engine.rate()
    }

    pub(crate) fn signals(&self) -> Receiver<ItemSignal> {
        self.engine.signals()
    }

    /// Forget the current item. The engine keeps whatever it was playing;
    /// only the observer bookkeeping is cleared, so no further signal for
    /// that item will be honoured.
    pub(crate) fn detach_item(&self) {
        *self.current.lock().expect("session item mutex poisoned") = None;
    }

    /// Swap the current item for one built from `locator`.
    ///
    /// The outgoing item is detached before the new one exists. Playback is
    /// started when the session was not already running.
    pub(crate) fn swap_item(&self, locator: VideoLocator) -> Result<ItemId, EngineError> {
        let mut current = self.current.lock().expect("session item mutex poisoned");
        *current = None;
        let item = self.engine.load_item(&locator)?;
        *current = Some(CurrentItem {
            item,
            locator: locator.clone(),
        });
        if self.engine.rate() == 0.0 {
            self.engine.set_rate(1.0);
        }
        debug!(session = %self.id, item = %item, video = locator.label(), "item swapped");
        Ok(item)
    }

    /// Halt playback and drop the current item.
    pub(crate) fn stop(&self) {
        self.engine.set_rate(0.0);
        self.engine.clear_item();
        *self.current.lock().expect("session item mutex poisoned") = None;
        debug!(session = %self.id, "session stopped");
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("id", &self.id)
            .field("current_item", &self.current_item())
            .field("rate", &self.rate())
            .finish()
    }
}
