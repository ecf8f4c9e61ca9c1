//! Advance state machine: one dispatch thread per session, reacting to the
//! session's terminal item signals by swapping in the next catalog video
//! and fanning the session reference out to every bound surface.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, select, unbounded};
use tracing::{debug, error, info, warn};

use duskcatalog::VideoCatalog;
use duskengine::{ItemEvent, ItemSignal};

use crate::coordinator::CoordinationContext;
use crate::events::{CoordinatorEvent, CoordinatorEventBus};
use crate::session::PlaybackSession;

/// Where the advance machine stands for one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdvanceState {
    /// Nothing armed. Entered before the first advance and after an
    /// aborted cycle; leaves only on the next trigger.
    Idle,
    /// Observers attached to the current item.
    Armed,
    /// Between items: outgoing observers detached, new item under
    /// construction.
    Advancing,
}

enum AdvanceCommand {
    Advance,
    Stop,
}

/// Handle to one session's advance machine.
pub struct AdvanceController {
    control_tx: Sender<AdvanceCommand>,
    state: Arc<Mutex<AdvanceState>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AdvanceController {
    pub(crate) fn spawn(
        session: Arc<PlaybackSession>,
        catalog: Arc<dyn VideoCatalog>,
        context: Arc<Mutex<CoordinationContext>>,
        bus: CoordinatorEventBus,
    ) -> Arc<Self> {
        let (control_tx, control_rx) = unbounded::<AdvanceCommand>();
        let state = Arc::new(Mutex::new(AdvanceState::Idle));
        let worker = AdvanceWorker {
            signals: session.signals(),
            session,
            catalog,
            context,
            bus,
            state: Arc::clone(&state),
            control_rx,
        };
        let handle = thread::Builder::new()
            .name(format!("advance-{}", worker.session.id()))
            .spawn(move || worker.dispatch_loop())
            .expect("failed to spawn advance dispatch thread");
        Arc::new(Self {
            control_tx,
            state,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// External advance trigger. Used by the catalog ready-callback for the
    /// first video, and by hosts to retry after an aborted cycle.
    pub fn request_advance(&self) {
        let _ = self.control_tx.send(AdvanceCommand::Advance);
    }

    pub fn state(&self) -> AdvanceState {
        *self.state.lock().expect("advance state mutex poisoned")
    }

    /// Stop the dispatch thread and wait for it to exit.
    pub(crate) fn stop(&self) {
        let _ = self.control_tx.send(AdvanceCommand::Stop);
        let handle = self
            .handle
            .lock()
            .expect("advance handle mutex poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

impl Drop for AdvanceController {
    fn drop(&mut self) {
        self.stop();
    }
}

struct AdvanceWorker {
    session: Arc<PlaybackSession>,
    catalog: Arc<dyn VideoCatalog>,
    context: Arc<Mutex<CoordinationContext>>,
    bus: CoordinatorEventBus,
    state: Arc<Mutex<AdvanceState>>,
    control_rx: Receiver<AdvanceCommand>,
    signals: Receiver<ItemSignal>,
}

impl AdvanceWorker {
    fn dispatch_loop(self) {
        debug!(session = %self.session.id(), "advance dispatch started");
        loop {
            select! {
                recv(self.control_rx) -> command => match command {
                    Ok(AdvanceCommand::Advance) => self.run_cycle("external request"),
                    Ok(AdvanceCommand::Stop) | Err(_) => break,
                },
                recv(self.signals) -> signal => match signal {
                    Ok(signal) => self.handle_signal(signal),
                    Err(_) => break,
                },
            }
        }
        debug!(session = %self.session.id(), "advance dispatch exiting");
    }

    fn handle_signal(&self, signal: ItemSignal) {
        if let ItemEvent::ErrorLog { entry } = &signal.event {
            warn!(
                session = %self.session.id(),
                item = %signal.item,
                entry = entry.as_str(),
                "playback error log entry"
            );
            return;
        }

        let state = self.state();
        let armed_item = self.session.current_item();
        match state {
            AdvanceState::Armed if armed_item == Some(signal.item) => {}
            AdvanceState::Idle => {
                // An aborted cycle left nothing armed; any late terminal
                // signal retries the locator fetch.
                debug!(
                    session = %self.session.id(),
                    item = %signal.item,
                    "terminal signal while idle, retrying advance"
                );
                self.run_cycle("idle retry");
                return;
            }
            _ => {
                debug!(
                    session = %self.session.id(),
                    item = %signal.item,
                    "stale item signal dropped"
                );
                return;
            }
        }

        match &signal.event {
            ItemEvent::EndOfStream => {
                info!(session = %self.session.id(), "item played to end")
            }
            ItemEvent::Failed { reason } => warn!(
                session = %self.session.id(),
                reason = reason.as_str(),
                "item failed, advancing"
            ),
            // Stalls are not distinguished from failures: advancing beats
            // wedging on an item that may never resume.
            ItemEvent::Stalled => {
                warn!(session = %self.session.id(), "item stalled, advancing")
            }
            ItemEvent::ErrorLog { .. } => return,
        }
        self.run_cycle("terminal signal");
    }

    fn run_cycle(&self, trigger: &str) {
        self.set_state(AdvanceState::Advancing);

        // Ordering invariant: the outgoing item's observers are gone
        // before the new item can exist.
        self.session.detach_item();

        let Some(locator) = self.catalog.next_video_locator() else {
            warn!(
                session = %self.session.id(),
                trigger,
                "catalog returned no video, advance cycle aborted"
            );
            self.set_state(AdvanceState::Idle);
            self.bus.broadcast(CoordinatorEvent::AdvanceMissed {
                session: self.session.id(),
            });
            return;
        };

        match self.session.swap_item(locator.clone()) {
            Ok(_) => {
                self.set_state(AdvanceState::Armed);
                self.fan_out();
                debug!(
                    session = %self.session.id(),
                    video = locator.label(),
                    trigger,
                    "session advanced"
                );
                self.bus.broadcast(CoordinatorEvent::ItemAdvanced {
                    session: self.session.id(),
                    locator,
                });
            }
            Err(err) => {
                error!(
                    session = %self.session.id(),
                    error = %err,
                    "cannot build playback item, advance cycle aborted"
                );
                self.set_state(AdvanceState::Idle);
                self.bus.broadcast(CoordinatorEvent::AdvanceMissed {
                    session: self.session.id(),
                });
            }
        }
    }

    /// Push the session reference to every bound surface, after the item
    /// swap is complete. The preview surface is re-pointed explicitly so
    /// preview identity tracks the session even when the fan-out list does
    /// not carry it.
    fn fan_out(&self) {
        let session_id = self.session.id();
        let context = self
            .context
            .lock()
            .expect("coordination context mutex poisoned");
        for surface in context.registry.members_of(session_id) {
            surface.bind(Arc::clone(&self.session));
        }
        if context.is_preview_session(session_id) {
            if let Some(preview) = context.preview_surface() {
                preview.bind(Arc::clone(&self.session));
            }
        }
    }

    fn state(&self) -> AdvanceState {
        *self.state.lock().expect("advance state mutex poisoned")
    }

    fn set_state(&self, next: AdvanceState) {
        *self.state.lock().expect("advance state mutex poisoned") = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use duskcatalog::StaticCatalog;
    use duskengine::{VideoLocator, VirtualEngine, VirtualSession};

    use crate::SessionId;
    use crate::coordinator::{SessionCoordinator, SharingPolicy};
    use crate::surface::SurfaceSpec;

    const WAIT: Duration = Duration::from_secs(2);
    const SETTLE: Duration = Duration::from_millis(150);

    struct Rig {
        coordinator: SessionCoordinator,
        engine: Arc<VirtualEngine>,
        catalog: Arc<StaticCatalog>,
        events: Receiver<CoordinatorEvent>,
    }

    fn rig(videos: &[&str]) -> Rig {
        let engine = VirtualEngine::new();
        let catalog = Arc::new(StaticCatalog::new(
            videos.iter().map(|v| VideoLocator::new(*v)).collect(),
        ));
        let coordinator = SessionCoordinator::new(
            engine.clone(),
            catalog.clone(),
            SharingPolicy::shared(),
        );
        let events = coordinator.subscribe();
        Rig {
            coordinator,
            engine,
            catalog,
            events,
        }
    }

    impl Rig {
        /// Attach one display and wait for its first video.
        fn armed(&self) -> (Arc<VirtualSession>, SessionId) {
            self.coordinator
                .attach_surface(SurfaceSpec::display("main"))
                .expect("attach");
            let session = wait_advanced(&self.events);
            (self.engine.sessions()[0].clone(), session)
        }
    }

    fn wait_advanced(events: &Receiver<CoordinatorEvent>) -> SessionId {
        loop {
            match events.recv_timeout(WAIT).expect("no advance before timeout") {
                CoordinatorEvent::ItemAdvanced { session, .. } => return session,
                _ => continue,
            }
        }
    }

    fn wait_missed(events: &Receiver<CoordinatorEvent>) -> SessionId {
        loop {
            match events.recv_timeout(WAIT).expect("no miss before timeout") {
                CoordinatorEvent::AdvanceMissed { session } => return session,
                _ => continue,
            }
        }
    }

    fn assert_no_cycle(events: &Receiver<CoordinatorEvent>) {
        std::thread::sleep(SETTLE);
        for event in events.try_iter() {
            match event {
                CoordinatorEvent::ItemAdvanced { .. } | CoordinatorEvent::AdvanceMissed { .. } => {
                    panic!("unexpected cycle: {event:?}")
                }
                _ => {}
            }
        }
    }

    #[test]
    fn terminal_event_runs_exactly_one_cycle() {
        let rig = rig(&["a.mov", "b.mov"]);
        let (virtual_session, session_id) = rig.armed();
        let first = virtual_session.current_item().expect("armed item");

        virtual_session.finish_current();
        wait_advanced(&rig.events);

        let second = virtual_session.current_item().expect("new item");
        assert_ne!(first, second);
        assert_eq!(virtual_session.loaded().len(), 2);

        let controller = rig.coordinator.controller_for(session_id).expect("controller");
        assert_eq!(controller.state(), AdvanceState::Armed);
        // Observers sit on exactly the new item.
        let session = rig.coordinator.shared_session().expect("shared");
        assert_eq!(session.current_item(), Some(second));
        assert_no_cycle(&rig.events);
    }

    #[test]
    fn failures_and_stalls_advance_like_end_of_stream() {
        let rig = rig(&["a.mov", "b.mov"]);
        let (virtual_session, _) = rig.armed();

        virtual_session.fail_current("demuxer gave up");
        wait_advanced(&rig.events);

        virtual_session.stall_current();
        wait_advanced(&rig.events);

        assert_eq!(virtual_session.loaded().len(), 3);
    }

    #[test]
    fn error_log_entries_never_advance() {
        let rig = rig(&["a.mov", "b.mov"]);
        let (virtual_session, _) = rig.armed();

        virtual_session.log_error("dropped frames");
        assert_no_cycle(&rig.events);
        assert_eq!(virtual_session.loaded().len(), 1);
    }

    #[test]
    fn stale_item_signals_are_dropped() {
        let rig = rig(&["a.mov", "b.mov"]);
        let (virtual_session, _) = rig.armed();
        let first = virtual_session.current_item().expect("armed item");

        virtual_session.finish_current();
        wait_advanced(&rig.events);

        // A late terminal signal from the swapped-out item must not start
        // a second cycle.
        virtual_session.emit(first, ItemEvent::EndOfStream);
        assert_no_cycle(&rig.events);
        assert_eq!(virtual_session.loaded().len(), 2);
    }

    #[test]
    fn catalog_miss_parks_the_session_until_the_next_trigger() {
        let rig = rig(&["a.mov"]);
        let (virtual_session, session_id) = rig.armed();
        let stranded = virtual_session.current_item().expect("armed item");

        rig.catalog.clear();
        virtual_session.finish_current();
        wait_missed(&rig.events);

        let controller = rig.coordinator.controller_for(session_id).expect("controller");
        assert_eq!(controller.state(), AdvanceState::Idle);
        let session = rig.coordinator.shared_session().expect("shared");
        assert_eq!(session.current_item(), None);

        // The next externally delivered terminal event retries the fetch.
        rig.catalog.push(VideoLocator::new("b.mov"));
        virtual_session.emit(stranded, ItemEvent::EndOfStream);
        wait_advanced(&rig.events);
        assert_eq!(controller.state(), AdvanceState::Armed);
        assert!(session.current_item().is_some());
    }

    #[test]
    fn item_construction_failure_aborts_the_cycle() {
        let rig = rig(&["a.mov", "b.mov"]);
        let (virtual_session, session_id) = rig.armed();

        virtual_session.fail_next_load();
        virtual_session.finish_current();
        wait_missed(&rig.events);

        let controller = rig.coordinator.controller_for(session_id).expect("controller");
        assert_eq!(controller.state(), AdvanceState::Idle);

        controller.request_advance();
        wait_advanced(&rig.events);
        assert_eq!(controller.state(), AdvanceState::Armed);
    }
}
