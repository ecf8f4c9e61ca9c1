//! Session resolution and surface lifecycle.
//!
//! The coordinator owns the process-wide [`CoordinationContext`] and
//! decides, per attached surface, whether it joins an existing session or
//! gets a fresh one. Resolution precedence, first match wins:
//!
//! 1. Very first surface, nothing exists yet, sharing disabled → a
//!    brand-new dedicated session.
//! 2. Preview surface → designate/reuse *the* preview session (under
//!    sharing, an already-running shared session is designated instead of
//!    creating a second one).
//! 3. Sharing enabled → adopt an existing preview session as the shared
//!    session, or set the shared session up exactly once.
//! 4. Sharing disabled, non-preview → always a fresh session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::Receiver;
use tracing::{error, info};

use duskcatalog::VideoCatalog;
use duskengine::MediaEngine;

use crate::advance::AdvanceController;
use crate::errors::CoreError;
use crate::events::{CoordinatorEvent, CoordinatorEventBus};
use crate::quotes::{DEFAULT_QUOTES, QuoteRotator};
use crate::registry::SurfaceRegistry;
use crate::session::{PlaybackSession, SessionKind};
use crate::surface::{Surface, SurfaceSpec};
use crate::{SessionId, SurfaceId};

/// Sharing policy for one coordination epoch. Fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SharingPolicy {
    pub sharing_enabled: bool,
}

impl SharingPolicy {
    /// All live displays render the same session.
    pub fn shared() -> Self {
        Self {
            sharing_enabled: true,
        }
    }

    /// Every display runs its own session.
    pub fn independent() -> Self {
        Self {
            sharing_enabled: false,
        }
    }
}

/// Process-wide coordination state: the fan-out registry, the two
/// designated sessions, and the one-time setup guard. Explicitly owned by
/// the coordinator; mutated only by it and its advance controllers.
pub(crate) struct CoordinationContext {
    pub(crate) registry: SurfaceRegistry,
    preview_surface: Option<Arc<Surface>>,
    preview_session: Option<Arc<PlaybackSession>>,
    shared_session: Option<Arc<PlaybackSession>>,
    /// Guards duplicate first-time setup of the shared session. Set
    /// exactly once per epoch.
    shared_setup_done: bool,
    first_surface_seen: bool,
    controllers: HashMap<SessionId, Arc<AdvanceController>>,
}

impl CoordinationContext {
    fn new() -> Self {
        Self {
            registry: SurfaceRegistry::new(),
            preview_surface: None,
            preview_session: None,
            shared_session: None,
            shared_setup_done: false,
            first_surface_seen: false,
            controllers: HashMap::new(),
        }
    }

    pub(crate) fn is_preview_session(&self, id: SessionId) -> bool {
        self.preview_session
            .as_ref()
            .map(|session| session.id() == id)
            .unwrap_or(false)
    }

    fn is_shared_session(&self, id: SessionId) -> bool {
        self.shared_session
            .as_ref()
            .map(|session| session.id() == id)
            .unwrap_or(false)
    }

    pub(crate) fn preview_surface(&self) -> Option<Arc<Surface>> {
        self.preview_surface.clone()
    }
}

struct SessionResolution {
    session: Arc<PlaybackSession>,
    /// Set when the session was created by this resolution; such sessions
    /// get their one-time setup (controller + catalog ready trigger).
    created: Option<SessionKind>,
}

pub struct SessionCoordinator {
    engine: Arc<dyn MediaEngine>,
    catalog: Arc<dyn VideoCatalog>,
    policy: SharingPolicy,
    quotes: Vec<String>,
    quote_interval: Duration,
    bus: CoordinatorEventBus,
    context: Arc<Mutex<CoordinationContext>>,
}

impl SessionCoordinator {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        catalog: Arc<dyn VideoCatalog>,
        policy: SharingPolicy,
    ) -> Self {
        Self {
            engine,
            catalog,
            policy,
            quotes: DEFAULT_QUOTES.iter().map(|q| q.to_string()).collect(),
            quote_interval: QuoteRotator::DEFAULT_INTERVAL,
            bus: CoordinatorEventBus::new(),
            context: Arc::new(Mutex::new(CoordinationContext::new())),
        }
    }

    /// Replace the overlay quote set and rotation interval.
    pub fn with_quote_rotation(mut self, quotes: Vec<String>, interval: Duration) -> Self {
        self.quotes = quotes;
        self.quote_interval = interval;
        self
    }

    pub fn policy(&self) -> SharingPolicy {
        self.policy
    }

    pub fn subscribe(&self) -> Receiver<CoordinatorEvent> {
        self.bus.subscribe()
    }

    /// Host hook: a new surface exists. Resolves its session, registers it
    /// for fan-out and starts its quote rotator.
    ///
    /// A session-construction failure is fatal to this surface only: the
    /// error is returned, nothing is registered, and every other surface
    /// keeps running.
    pub fn attach_surface(&self, spec: SurfaceSpec) -> Result<Arc<Surface>, CoreError> {
        let surface = Surface::new(spec);
        let mut context = self
            .context
            .lock()
            .expect("coordination context mutex poisoned");

        if context.registry.contains(surface.id()) {
            return Err(CoreError::SurfaceAlreadyAttached(surface.id().to_string()));
        }

        let resolution = match self.resolve_session(&mut context, &surface) {
            Ok(resolution) => resolution,
            Err(err) => {
                error!(surface = %surface.id(), error = %err, "surface left unbound");
                return Err(err);
            }
        };

        let session = resolution.session;
        surface.bind(Arc::clone(&session));
        context.registry.register(Arc::clone(&surface), session.id());
        context.first_surface_seen = true;

        if let Some(kind) = resolution.created {
            let controller = AdvanceController::spawn(
                Arc::clone(&session),
                Arc::clone(&self.catalog),
                Arc::clone(&self.context),
                self.bus.clone(),
            );
            context.controllers.insert(session.id(), Arc::clone(&controller));
            self.bus.broadcast(CoordinatorEvent::SessionCreated {
                session: session.id(),
                kind,
            });

            // First advance waits for the catalog; consumed once per
            // session setup.
            self.catalog
                .on_ready(Box::new(move || controller.request_advance()));
        }

        surface.start_rotator(self.quotes.clone(), self.quote_interval);
        info!(
            surface = %surface.id(),
            session = %session.id(),
            preview = surface.is_preview(),
            "surface attached"
        );
        self.bus.broadcast(CoordinatorEvent::SurfaceAttached {
            surface: surface.id().clone(),
            session: session.id(),
        });
        Ok(surface)
    }

    /// Host hook: a surface is going away. Unknown surfaces are a no-op.
    ///
    /// The surface's timer and registry membership go before its resources;
    /// a session orphaned by the departure is stopped unless it is the
    /// designated preview or shared session, which persist.
    pub fn detach_surface(&self, id: &SurfaceId) {
        let mut stopped: Option<(Arc<PlaybackSession>, Option<Arc<AdvanceController>>)> = None;
        let surface = {
            let mut context = self
                .context
                .lock()
                .expect("coordination context mutex poisoned");
            let Some(surface) = context.registry.unregister(id) else {
                return;
            };
            let is_recorded_preview = context
                .preview_surface
                .as_ref()
                .map(|recorded| recorded.id() == id)
                .unwrap_or(false);
            if is_recorded_preview {
                context.preview_surface = None;
            }
            if let Some(session) = surface.bound_session() {
                let session_id = session.id();
                let orphaned = context.registry.members_of(session_id).is_empty();
                let persistent =
                    context.is_preview_session(session_id) || context.is_shared_session(session_id);
                if orphaned && !persistent {
                    let controller = context.controllers.remove(&session_id);
                    stopped = Some((session, controller));
                }
            }
            surface
        };

        surface.stop_rotator();
        surface.clear_binding();

        if let Some((session, controller)) = stopped {
            if let Some(controller) = controller {
                controller.stop();
            }
            session.stop();
            info!(session = %session.id(), "orphaned session stopped");
        }

        info!(surface = %id, "surface detached");
        self.bus
            .broadcast(CoordinatorEvent::SurfaceDetached { surface: id.clone() });
    }

    pub fn shared_session(&self) -> Option<Arc<PlaybackSession>> {
        self.context
            .lock()
            .expect("coordination context mutex poisoned")
            .shared_session
            .clone()
    }

    pub fn preview_session(&self) -> Option<Arc<PlaybackSession>> {
        self.context
            .lock()
            .expect("coordination context mutex poisoned")
            .preview_session
            .clone()
    }

    /// Registered surfaces, in registration order.
    pub fn surfaces(&self) -> Vec<Arc<Surface>> {
        self.context
            .lock()
            .expect("coordination context mutex poisoned")
            .registry
            .surfaces()
    }

    /// Fan-out list of `session`, in registration order.
    pub fn members_of(&self, session: SessionId) -> Vec<Arc<Surface>> {
        self.context
            .lock()
            .expect("coordination context mutex poisoned")
            .registry
            .members_of(session)
    }

    pub fn controller_for(&self, session: SessionId) -> Option<Arc<AdvanceController>> {
        self.context
            .lock()
            .expect("coordination context mutex poisoned")
            .controllers
            .get(&session)
            .cloned()
    }

    /// Number of sessions created so far this epoch.
    pub fn session_count(&self) -> usize {
        self.context
            .lock()
            .expect("coordination context mutex poisoned")
            .controllers
            .len()
    }

    /// Stop every rotator, controller and session. Idempotent.
    pub fn shutdown(&self) {
        let (surfaces, controllers, sessions) = {
            let mut context = self
                .context
                .lock()
                .expect("coordination context mutex poisoned");
            let surfaces = context.registry.surfaces();
            let controllers: Vec<_> = context.controllers.drain().map(|(_, c)| c).collect();

            let mut sessions: Vec<Arc<PlaybackSession>> = Vec::new();
            let mut remember = |session: Option<Arc<PlaybackSession>>| {
                if let Some(session) = session {
                    if !sessions.iter().any(|known| known.id() == session.id()) {
                        sessions.push(session);
                    }
                }
            };
            remember(context.preview_session.take());
            remember(context.shared_session.take());
            for surface in &surfaces {
                remember(surface.bound_session());
            }

            context.registry.clear();
            context.preview_surface = None;
            (surfaces, controllers, sessions)
        };

        for surface in &surfaces {
            surface.stop_rotator();
            surface.clear_binding();
        }
        for controller in controllers {
            controller.stop();
        }
        for session in sessions {
            session.stop();
        }
        info!("coordination shut down");
    }

    fn resolve_session(
        &self,
        context: &mut CoordinationContext,
        surface: &Arc<Surface>,
    ) -> Result<SessionResolution, CoreError> {
        let sharing = self.policy.sharing_enabled;

        // Rule 1: very first surface, nothing exists yet, sharing disabled.
        if !context.first_surface_seen
            && context.preview_session.is_none()
            && context.shared_session.is_none()
            && !sharing
        {
            let session = self.create_session(surface)?;
            return Ok(SessionResolution {
                session,
                created: Some(SessionKind::Dedicated),
            });
        }

        // Rule 2: preview surfaces own the single preview session.
        if surface.is_preview() {
            context.preview_surface = Some(Arc::clone(surface));
            if let Some(existing) = &context.preview_session {
                return Ok(SessionResolution {
                    session: Arc::clone(existing),
                    created: None,
                });
            }
            if sharing {
                if let Some(shared) = &context.shared_session {
                    let session = Arc::clone(shared);
                    context.preview_session = Some(Arc::clone(&session));
                    return Ok(SessionResolution {
                        session,
                        created: None,
                    });
                }
            }
            let session = self.create_session(surface)?;
            context.preview_session = Some(Arc::clone(&session));
            return Ok(SessionResolution {
                session,
                created: Some(SessionKind::Preview),
            });
        }

        // Rule 3: sharing — adopt the preview session, or set the shared
        // session up exactly once.
        if sharing {
            if let Some(preview) = &context.preview_session {
                let session = Arc::clone(preview);
                if context.shared_session.is_none() {
                    context.shared_session = Some(Arc::clone(&session));
                }
                if !context.shared_setup_done {
                    context.shared_setup_done = true;
                }
                return Ok(SessionResolution {
                    session,
                    created: None,
                });
            }
            if let Some(shared) = &context.shared_session {
                return Ok(SessionResolution {
                    session: Arc::clone(shared),
                    created: None,
                });
            }
            let session = self.create_session(surface)?;
            context.shared_session = Some(Arc::clone(&session));
            context.shared_setup_done = true;
            return Ok(SessionResolution {
                session,
                created: Some(SessionKind::Shared),
            });
        }

        // Rule 4: sharing disabled, non-preview: always a fresh session.
        let session = self.create_session(surface)?;
        Ok(SessionResolution {
            session,
            created: Some(SessionKind::Dedicated),
        })
    }

    fn create_session(&self, surface: &Arc<Surface>) -> Result<Arc<PlaybackSession>, CoreError> {
        PlaybackSession::create(self.engine.as_ref())
            .map_err(|err| CoreError::SessionConstruction(surface.id().to_string(), err))
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use duskcatalog::StaticCatalog;
    use duskengine::{EngineSession as _, VideoLocator, VirtualEngine};

    /// Coordinator over an empty catalog: sessions exist but never load an
    /// item, which keeps resolution tests free of advance timing.
    fn coordinator(policy: SharingPolicy) -> (SessionCoordinator, Arc<VirtualEngine>) {
        let engine = VirtualEngine::new();
        let coordinator = SessionCoordinator::new(
            engine.clone(),
            Arc::new(StaticCatalog::empty()),
            policy,
        );
        (coordinator, engine)
    }

    #[test]
    fn sharing_unifies_every_live_surface() {
        let (coordinator, _engine) = coordinator(SharingPolicy::shared());
        let surfaces: Vec<_> = (0..3)
            .map(|i| {
                coordinator
                    .attach_surface(SurfaceSpec::display(format!("display-{i}")))
                    .expect("attach")
            })
            .collect();

        assert_eq!(coordinator.session_count(), 1);
        let shared = coordinator.shared_session().expect("shared session");
        for surface in &surfaces {
            assert_eq!(surface.bound_session().expect("bound").id(), shared.id());
        }
    }

    #[test]
    fn live_surfaces_adopt_an_existing_preview_session() {
        let (coordinator, _engine) = coordinator(SharingPolicy::shared());
        coordinator
            .attach_surface(SurfaceSpec::preview("preview"))
            .expect("attach preview");
        let preview_session = coordinator.preview_session().expect("preview session");

        let live = coordinator
            .attach_surface(SurfaceSpec::display("display-0"))
            .expect("attach live");

        assert_eq!(coordinator.session_count(), 1);
        assert_eq!(live.bound_session().expect("bound").id(), preview_session.id());
        assert_eq!(
            coordinator.shared_session().expect("shared").id(),
            preview_session.id()
        );
    }

    #[test]
    fn a_late_preview_designates_the_running_shared_session() {
        let (coordinator, _engine) = coordinator(SharingPolicy::shared());
        coordinator
            .attach_surface(SurfaceSpec::display("display-0"))
            .expect("attach live");
        let shared = coordinator.shared_session().expect("shared session");

        let preview = coordinator
            .attach_surface(SurfaceSpec::preview("preview"))
            .expect("attach preview");

        assert_eq!(coordinator.session_count(), 1);
        assert_eq!(preview.bound_session().expect("bound").id(), shared.id());
        assert_eq!(coordinator.preview_session().expect("preview").id(), shared.id());
    }

    #[test]
    fn a_second_preview_surface_reuses_the_preview_session() {
        let (coordinator, _engine) = coordinator(SharingPolicy::shared());
        let first = coordinator
            .attach_surface(SurfaceSpec::preview("pane-a"))
            .expect("attach");
        let second = coordinator
            .attach_surface(SurfaceSpec::preview("pane-b"))
            .expect("attach");

        assert_eq!(coordinator.session_count(), 1);
        assert_eq!(
            first.bound_session().expect("bound").id(),
            second.bound_session().expect("bound").id()
        );
    }

    #[test]
    fn the_very_first_surface_takes_the_dedicated_path_without_sharing() {
        let (coordinator, _engine) = coordinator(SharingPolicy::independent());
        let preview = coordinator
            .attach_surface(SurfaceSpec::preview("preview"))
            .expect("attach");

        // First-surface precedence wins over preview designation.
        assert!(preview.bound_session().is_some());
        assert!(coordinator.preview_session().is_none());
        assert_eq!(coordinator.session_count(), 1);
    }

    #[test]
    fn independent_surfaces_get_independent_sessions() {
        let (coordinator, _engine) = coordinator(SharingPolicy::independent());
        let a = coordinator
            .attach_surface(SurfaceSpec::display("display-0"))
            .expect("attach");
        let b = coordinator
            .attach_surface(SurfaceSpec::display("display-1"))
            .expect("attach");

        assert_eq!(coordinator.session_count(), 2);
        assert_ne!(
            a.bound_session().expect("bound").id(),
            b.bound_session().expect("bound").id()
        );
    }

    #[test]
    fn construction_failure_is_fatal_to_that_surface_only() {
        let (coordinator, engine) = coordinator(SharingPolicy::independent());
        engine.fail_next_create();

        let refused = coordinator.attach_surface(SurfaceSpec::display("display-0"));
        assert!(matches!(refused, Err(CoreError::SessionConstruction(..))));
        assert!(coordinator.surfaces().is_empty());

        let accepted = coordinator.attach_surface(SurfaceSpec::display("display-1"));
        assert!(accepted.is_ok());
        assert_eq!(coordinator.session_count(), 1);
    }

    #[test]
    fn duplicate_surface_ids_are_rejected() {
        let (coordinator, _engine) = coordinator(SharingPolicy::shared());
        coordinator
            .attach_surface(SurfaceSpec::display("display-0"))
            .expect("attach");
        let duplicate = coordinator.attach_surface(SurfaceSpec::display("display-0"));
        assert!(matches!(duplicate, Err(CoreError::SurfaceAlreadyAttached(_))));
    }

    #[test]
    fn detached_surfaces_leave_the_fan_out_list() {
        let (coordinator, _engine) = coordinator(SharingPolicy::shared());
        coordinator
            .attach_surface(SurfaceSpec::preview("preview"))
            .expect("attach");
        let live = coordinator
            .attach_surface(SurfaceSpec::display("display-0"))
            .expect("attach");
        let shared = coordinator.shared_session().expect("shared");

        coordinator.detach_surface(&SurfaceId("display-0".to_string()));

        let members: Vec<String> = coordinator
            .members_of(shared.id())
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        assert_eq!(members, ["preview"]);
        assert!(live.bound_session().is_none());

        // Detaching a stranger is a no-op.
        coordinator.detach_surface(&SurfaceId("ghost".to_string()));
        assert_eq!(coordinator.surfaces().len(), 1);
    }

    #[test]
    fn orphaned_dedicated_sessions_are_stopped() {
        let engine = VirtualEngine::new();
        let coordinator = SessionCoordinator::new(
            engine.clone(),
            Arc::new(StaticCatalog::new(vec![VideoLocator::new("a.mov")])),
            SharingPolicy::independent(),
        );
        coordinator
            .attach_surface(SurfaceSpec::display("display-0"))
            .expect("attach");

        coordinator.detach_surface(&SurfaceId("display-0".to_string()));

        let sessions = engine.sessions();
        assert_eq!(sessions[0].rate(), 0.0);
        assert_eq!(sessions[0].current_item(), None);
        assert_eq!(coordinator.session_count(), 0);
    }

    #[test]
    fn the_shared_session_outlives_its_surfaces() {
        let (coordinator, _engine) = coordinator(SharingPolicy::shared());
        coordinator
            .attach_surface(SurfaceSpec::display("display-0"))
            .expect("attach");
        coordinator
            .attach_surface(SurfaceSpec::display("display-1"))
            .expect("attach");

        coordinator.detach_surface(&SurfaceId("display-0".to_string()));
        coordinator.detach_surface(&SurfaceId("display-1".to_string()));

        assert!(coordinator.surfaces().is_empty());
        assert!(coordinator.shared_session().is_some());
        assert_eq!(coordinator.session_count(), 1);
    }
}
