use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};

use duskengine::VideoLocator;

use crate::session::SessionKind;
use crate::{SessionId, SurfaceId};

/// Coordination happenings, for log loops and tests.
#[derive(Clone, Debug)]
pub enum CoordinatorEvent {
    SurfaceAttached {
        surface: SurfaceId,
        session: SessionId,
    },
    SurfaceDetached {
        surface: SurfaceId,
    },
    SessionCreated {
        session: SessionId,
        kind: SessionKind,
    },
    /// A session swapped to a new item and its surfaces were re-bound.
    ItemAdvanced {
        session: SessionId,
        locator: VideoLocator,
    },
    /// An advance cycle was aborted (empty catalog or item construction
    /// failure); the session waits for the next trigger.
    AdvanceMissed {
        session: SessionId,
    },
}

#[derive(Clone, Default)]
pub struct CoordinatorEventBus {
    subscribers: Arc<Mutex<Vec<Sender<CoordinatorEvent>>>>,
}

impl CoordinatorEventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> Receiver<CoordinatorEvent> {
        let (tx, rx) = unbounded::<CoordinatorEvent>();
        {
            let mut subscribers = self.subscribers.lock().expect("event bus mutex poisoned");
            subscribers.push(tx);
        }
        rx
    }

    pub(crate) fn broadcast(&self, event: CoordinatorEvent) {
        let mut subscribers = self.subscribers.lock().expect("event bus mutex poisoned");
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
