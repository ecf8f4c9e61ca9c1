use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine refused to create a playback session: {0}")]
    SessionConstruction(String),
    #[error("cannot load item from '{uri}': {reason}")]
    ItemLoad { uri: String, reason: String },
}

impl EngineError {
    pub fn item_load(uri: &str, reason: &str) -> Self {
        EngineError::ItemLoad {
            uri: uri.to_string(),
            reason: reason.to_string(),
        }
    }
}
