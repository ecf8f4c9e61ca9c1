use thiserror::Error;

use duskengine::EngineError;

#[derive(Error, Debug)]
pub enum CoreError {
    // Fatal to the affected surface only; other surfaces keep running.
    #[error("cannot construct a playback session for surface '{0}': {1}")]
    SessionConstruction(String, EngineError),
    #[error("surface '{0}' is already attached")]
    SurfaceAlreadyAttached(String),
}
