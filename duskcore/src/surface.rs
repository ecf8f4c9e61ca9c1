use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::SurfaceId;
use crate::quotes::QuoteRotator;
use crate::session::PlaybackSession;

/// How the host describes a surface it is about to attach.
#[derive(Clone, Debug)]
pub struct SurfaceSpec {
    pub id: SurfaceId,
    pub is_preview: bool,
}

impl SurfaceSpec {
    pub fn display(id: impl Into<String>) -> Self {
        Self {
            id: SurfaceId(id.into()),
            is_preview: false,
        }
    }

    pub fn preview(id: impl Into<String>) -> Self {
        Self {
            id: SurfaceId(id.into()),
            is_preview: true,
        }
    }
}

/// Overlay-text slot owned by a surface. Cloned into the rotator thread;
/// the host reads whatever was last published.
#[derive(Clone, Default)]
pub struct OverlayText {
    text: Arc<Mutex<Option<String>>>,
}

impl OverlayText {
    pub fn publish(&self, text: String) {
        *self.text.lock().expect("overlay mutex poisoned") = Some(text);
    }

    pub fn current(&self) -> Option<String> {
        self.text.lock().expect("overlay mutex poisoned").clone()
    }
}

/// One rendering target: a display or the preview pane.
pub struct Surface {
    id: SurfaceId,
    is_preview: bool,
    bound: Mutex<Option<Arc<PlaybackSession>>>,
    overlay: OverlayText,
    rotator: Mutex<Option<QuoteRotator>>,
}

impl Surface {
    pub(crate) fn new(spec: SurfaceSpec) -> Arc<Self> {
        Arc::new(Self {
            id: spec.id,
            is_preview: spec.is_preview,
            bound: Mutex::new(None),
            overlay: OverlayText::default(),
            rotator: Mutex::new(None),
        })
    }

    pub fn id(&self) -> &SurfaceId {
        &self.id
    }

    pub fn is_preview(&self) -> bool {
        self.is_preview
    }

    /// The session this surface currently renders, if setup completed.
    pub fn bound_session(&self) -> Option<Arc<PlaybackSession>> {
        self.bound.lock().expect("surface binding mutex poisoned").clone()
    }

    pub fn overlay(&self) -> &OverlayText {
        &self.overlay
    }

    pub(crate) fn bind(&self, session: Arc<PlaybackSession>) {
        *self.bound.lock().expect("surface binding mutex poisoned") = Some(session);
    }

    pub(crate) fn clear_binding(&self) {
        *self.bound.lock().expect("surface binding mutex poisoned") = None;
    }

    pub(crate) fn start_rotator(&self, quotes: Vec<String>, interval: Duration) {
        let rotator = QuoteRotator::start(self.id.clone(), self.overlay.clone(), quotes, interval);
        *self.rotator.lock().expect("rotator mutex poisoned") = Some(rotator);
    }

    /// Stops and joins the rotator thread. Safe to call twice.
    pub(crate) fn stop_rotator(&self) {
        self.rotator.lock().expect("rotator mutex poisoned").take();
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("id", &self.id)
            .field("is_preview", &self.is_preview)
            .field("bound", &self.bound_session().map(|s| s.id()))
            .finish()
    }
}
