//! Headless engine used by tests and the demo binary.
//!
//! `VirtualEngine` performs no decoding. Loaded items either reach
//! end-of-stream on a timer (when the profile sets a duration) or when a
//! test drives them with [`VirtualSession::finish_current`],
//! [`VirtualSession::fail_current`] or [`VirtualSession::stall_current`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::debug;

use crate::errors::EngineError;
use crate::locator::VideoLocator;
use crate::session::{EngineSession, ItemEvent, ItemId, ItemSignal, MediaEngine};

/// Behaviour profile applied to every session of a [`VirtualEngine`].
#[derive(Clone, Debug, Default)]
pub struct EngineProfile {
    /// When set, every loaded item reaches end-of-stream this long after
    /// loading. When unset, items only terminate on demand.
    pub item_duration: Option<Duration>,
}

struct EngineState {
    sessions: Vec<Arc<VirtualSession>>,
    fail_next_create: bool,
}

pub struct VirtualEngine {
    profile: EngineProfile,
    item_ids: Arc<AtomicU64>,
    inner: Mutex<EngineState>,
}

impl VirtualEngine {
    pub fn new() -> Arc<Self> {
        Self::with_profile(EngineProfile::default())
    }

    pub fn with_profile(profile: EngineProfile) -> Arc<Self> {
        Arc::new(Self {
            profile,
            item_ids: Arc::new(AtomicU64::new(0)),
            inner: Mutex::new(EngineState {
                sessions: Vec::new(),
                fail_next_create: false,
            }),
        })
    }

    /// Makes the next `create_session` call fail, once.
    pub fn fail_next_create(&self) {
        self.inner.lock().expect("engine mutex poisoned").fail_next_create = true;
    }

    /// Every session created so far, in creation order.
    pub fn sessions(&self) -> Vec<Arc<VirtualSession>> {
        self.inner.lock().expect("engine mutex poisoned").sessions.clone()
    }
}

impl MediaEngine for VirtualEngine {
    fn create_session(&self) -> Result<Arc<dyn EngineSession>, EngineError> {
        let mut inner = self.inner.lock().expect("engine mutex poisoned");
        if inner.fail_next_create {
            inner.fail_next_create = false;
            return Err(EngineError::SessionConstruction(
                "virtual engine was told to refuse".to_string(),
            ));
        }

        let (tx, rx) = unbounded::<ItemSignal>();
        let session = Arc::new(VirtualSession {
            profile: self.profile.clone(),
            item_ids: Arc::clone(&self.item_ids),
            tx,
            rx,
            state: Arc::new(Mutex::new(SessionState {
                current: None,
                rate: 0.0,
                loaded: Vec::new(),
                fail_next_load: false,
            })),
        });
        inner.sessions.push(Arc::clone(&session));
        Ok(session)
    }
}

struct SessionState {
    current: Option<ItemId>,
    rate: f64,
    loaded: Vec<VideoLocator>,
    fail_next_load: bool,
}

pub struct VirtualSession {
    profile: EngineProfile,
    item_ids: Arc<AtomicU64>,
    tx: Sender<ItemSignal>,
    rx: Receiver<ItemSignal>,
    state: Arc<Mutex<SessionState>>,
}

impl VirtualSession {
    pub fn current_item(&self) -> Option<ItemId> {
        self.state.lock().expect("session mutex poisoned").current
    }

    /// Every locator this session has loaded, in load order.
    pub fn loaded(&self) -> Vec<VideoLocator> {
        self.state.lock().expect("session mutex poisoned").loaded.clone()
    }

    pub fn finish_current(&self) {
        self.emit_for_current(ItemEvent::EndOfStream);
    }

    pub fn fail_current(&self, reason: &str) {
        self.emit_for_current(ItemEvent::Failed {
            reason: reason.to_string(),
        });
    }

    pub fn stall_current(&self) {
        self.emit_for_current(ItemEvent::Stalled);
    }

    pub fn log_error(&self, entry: &str) {
        self.emit_for_current(ItemEvent::ErrorLog {
            entry: entry.to_string(),
        });
    }

    /// Emit an arbitrary signal, including for items no longer current.
    pub fn emit(&self, item: ItemId, event: ItemEvent) {
        let _ = self.tx.send(ItemSignal { item, event });
    }

    /// Makes the next `load_item` call fail, once.
    pub fn fail_next_load(&self) {
        self.state.lock().expect("session mutex poisoned").fail_next_load = true;
    }

    fn emit_for_current(&self, event: ItemEvent) {
        let current = self.current_item();
        match current {
            Some(item) => self.emit(item, event),
            None => debug!("virtual session has no current item; signal dropped"),
        }
    }
}

impl EngineSession for VirtualSession {
    fn load_item(&self, locator: &VideoLocator) -> Result<ItemId, EngineError> {
        let item = ItemId(self.item_ids.fetch_add(1, Ordering::SeqCst) + 1);
        {
            let mut state = self.state.lock().expect("session mutex poisoned");
            if state.fail_next_load {
                state.fail_next_load = false;
                return Err(EngineError::item_load(
                    &locator.uri,
                    "virtual session was told to refuse",
                ));
            }
            state.current = Some(item);
            state.loaded.push(locator.clone());
        }

        if let Some(duration) = self.profile.item_duration {
            let tx = self.tx.clone();
            let state = Arc::clone(&self.state);
            thread::Builder::new()
                .name(format!("virtual-{item}"))
                .spawn(move || {
                    thread::sleep(duration);
                    let still_current =
                        state.lock().expect("session mutex poisoned").current == Some(item);
                    if still_current {
                        let _ = tx.send(ItemSignal {
                            item,
                            event: ItemEvent::EndOfStream,
                        });
                    }
                })
                .expect("failed to spawn virtual item thread");
        }

        debug!(item = %item, uri = locator.uri.as_str(), "virtual item loaded");
        Ok(item)
    }

    fn clear_item(&self) {
        self.state.lock().expect("session mutex poisoned").current = None;
    }

    fn set_rate(&self, rate: f64) {
        self.state.lock().expect("session mutex poisoned").rate = rate;
    }

    fn rate(&self) -> f64 {
        self.state.lock().expect("session mutex poisoned").rate
    }

    fn signals(&self) -> Receiver<ItemSignal> {
        self.rx.clone()
    }
}
