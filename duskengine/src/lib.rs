//! # DuskEngine
//!
//! Media-engine seam for Duskfall.
//!
//! The decode/render engine is an external collaborator. Duskfall only ever
//! talks to it through the two traits in this crate:
//!
//! - [`MediaEngine`] creates playback sessions.
//! - [`EngineSession`] exposes the three transport operations the
//!   coordination core calls (`load_item`, `clear_item`, `set_rate`) and
//!   delivers the four per-item lifecycle signals it consumes
//!   (end-of-stream, failure, stall, error-log entry).
//!
//! [`VirtualEngine`] is a headless implementation used by the demo binary
//! and by tests: items either finish on a timer or are finished, failed and
//! stalled on demand.

pub mod errors;
pub mod locator;
pub mod session;
pub mod virtual_engine;

pub use errors::EngineError;
pub use locator::VideoLocator;
pub use session::{EngineSession, ItemEvent, ItemId, ItemSignal, MediaEngine};
pub use virtual_engine::{EngineProfile, VirtualEngine, VirtualSession};
