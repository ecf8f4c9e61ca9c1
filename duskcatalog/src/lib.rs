//! # DuskCatalog
//!
//! Catalog seam for Duskfall.
//!
//! A catalog supplies one randomly chosen [`VideoLocator`] per request from
//! a larger collection. Selection fairness is the catalog's own business;
//! the coordination core only relies on the contract: a request may come
//! back empty (catalog not loaded yet, or genuinely empty), and a
//! ready-callback can be registered to avoid racing an empty catalog at
//! first session setup.
//!
//! Two implementations ship here: [`StaticCatalog`] over a fixed in-memory
//! set, and [`DirectoryCatalog`], which scans local folders for video files
//! on a background thread.

mod directory;
mod static_catalog;

pub use directory::DirectoryCatalog;
pub use static_catalog::StaticCatalog;

use thiserror::Error;

use duskengine::VideoLocator;

/// Callback invoked once a catalog has finished loading.
pub type ReadyCallback = Box<dyn FnOnce() + Send>;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("no video sources configured")]
    NoSources,
    #[error("invalid scan pattern '{0}': {1}")]
    BadPattern(String, glob::PatternError),
}

/// Supplier of video locators.
pub trait VideoCatalog: Send + Sync {
    /// One randomly chosen locator, or `None` while the catalog is empty or
    /// not loaded yet. A `None` is a recoverable miss, never an error.
    fn next_video_locator(&self) -> Option<VideoLocator>;

    /// Run `callback` once the catalog has loaded. Fires immediately when
    /// the catalog is already loaded; fires exactly once either way.
    fn on_ready(&self, callback: ReadyCallback);
}
