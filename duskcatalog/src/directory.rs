use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use rand::Rng;
use tracing::{info, warn};

use duskengine::VideoLocator;

use crate::{CatalogError, ReadyCallback, VideoCatalog};

/// Catalog built by scanning local folders for video files.
///
/// The scan runs on a background thread; until it completes,
/// `next_video_locator` reports a miss and ready-callbacks queue up.
pub struct DirectoryCatalog {
    inner: Arc<Mutex<CatalogState>>,
}

struct CatalogState {
    videos: Vec<VideoLocator>,
    loaded: bool,
    pending: Vec<ReadyCallback>,
}

impl DirectoryCatalog {
    pub const DEFAULT_EXTENSIONS: &'static [&'static str] =
        &["mov", "mp4", "m4v", "webm", "mkv"];

    /// Start a background scan of `sources` for files with the given
    /// extensions (defaults apply when `extensions` is empty).
    pub fn scan(
        sources: Vec<PathBuf>,
        extensions: Vec<String>,
    ) -> Result<Arc<Self>, CatalogError> {
        if sources.is_empty() {
            return Err(CatalogError::NoSources);
        }

        let extensions = if extensions.is_empty() {
            Self::DEFAULT_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect()
        } else {
            extensions
        };

        let patterns = build_patterns(&sources, &extensions)?;

        let catalog = Arc::new(Self {
            inner: Arc::new(Mutex::new(CatalogState {
                videos: Vec::new(),
                loaded: false,
                pending: Vec::new(),
            })),
        });

        let state = Arc::clone(&catalog.inner);
        thread::Builder::new()
            .name("catalog-scan".to_string())
            .spawn(move || {
                let videos = collect_videos(&patterns);
                info!(count = videos.len(), "video catalog loaded");
                let pending = {
                    let mut state = state.lock().expect("catalog mutex poisoned");
                    state.videos = videos;
                    state.loaded = true;
                    std::mem::take(&mut state.pending)
                };
                for callback in pending {
                    callback();
                }
            })
            .expect("failed to spawn catalog scan thread");

        Ok(catalog)
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.lock().expect("catalog mutex poisoned").loaded
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("catalog mutex poisoned").videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VideoCatalog for DirectoryCatalog {
    fn next_video_locator(&self) -> Option<VideoLocator> {
        let state = self.inner.lock().expect("catalog mutex poisoned");
        if !state.loaded || state.videos.is_empty() {
            return None;
        }
        let index = rand::rng().random_range(0..state.videos.len());
        Some(state.videos[index].clone())
    }

    fn on_ready(&self, callback: ReadyCallback) {
        {
            let mut state = self.inner.lock().expect("catalog mutex poisoned");
            if !state.loaded {
                state.pending.push(callback);
                return;
            }
        }
        callback();
    }
}

fn build_patterns(
    sources: &[PathBuf],
    extensions: &[String],
) -> Result<Vec<String>, CatalogError> {
    let mut patterns = Vec::new();
    for source in sources {
        for extension in extensions {
            let pattern = format!("{}/**/*.{}", source.display(), extension);
            glob::Pattern::new(&pattern)
                .map_err(|err| CatalogError::BadPattern(pattern.clone(), err))?;
            patterns.push(pattern);
        }
    }
    Ok(patterns)
}

fn collect_videos(patterns: &[String]) -> Vec<VideoLocator> {
    let mut videos = Vec::new();
    for pattern in patterns {
        match glob::glob(pattern) {
            Ok(paths) => {
                for path in paths.flatten() {
                    videos.push(locator_for(&path));
                }
            }
            Err(err) => warn!(pattern = pattern.as_str(), error = %err, "scan pattern rejected"),
        }
    }
    videos.sort_by(|a, b| a.uri.cmp(&b.uri));
    videos.dedup_by(|a, b| a.uri == b.uri);
    videos
}

fn locator_for(path: &Path) -> VideoLocator {
    match path.file_stem().and_then(|stem| stem.to_str()) {
        Some(stem) => VideoLocator::with_title(path.display().to_string(), stem),
        None => VideoLocator::new(path.display().to_string()),
    }
}
