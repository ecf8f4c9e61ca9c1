use serde::{Deserialize, Serialize};

/// Locator for one playable video, as handed out by a catalog.
///
/// A locator is an opaque pointer into the catalog's collection; the engine
/// resolves the URI, the core never inspects it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoLocator {
    pub uri: String,
    pub title: Option<String>,
}

impl VideoLocator {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            title: None,
        }
    }

    pub fn with_title(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            title: Some(title.into()),
        }
    }

    /// Human-readable label for logs: the title when known, the URI otherwise.
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.uri)
    }
}
