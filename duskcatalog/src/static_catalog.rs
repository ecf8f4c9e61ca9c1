use std::sync::Mutex;

use rand::Rng;

use duskengine::VideoLocator;

use crate::{ReadyCallback, VideoCatalog};

/// Catalog over a fixed in-memory set of locators. Always ready.
///
/// The set can be grown at runtime, which tests use to model a catalog
/// that starts out empty and fills up later.
#[derive(Default)]
pub struct StaticCatalog {
    videos: Mutex<Vec<VideoLocator>>,
}

impl StaticCatalog {
    pub fn new(videos: Vec<VideoLocator>) -> Self {
        Self {
            videos: Mutex::new(videos),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn push(&self, locator: VideoLocator) {
        self.videos.lock().expect("catalog mutex poisoned").push(locator);
    }

    pub fn clear(&self) {
        self.videos.lock().expect("catalog mutex poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.videos.lock().expect("catalog mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl VideoCatalog for StaticCatalog {
    fn next_video_locator(&self) -> Option<VideoLocator> {
        let videos = self.videos.lock().expect("catalog mutex poisoned");
        if videos.is_empty() {
            return None;
        }
        let index = rand::rng().random_range(0..videos.len());
        Some(videos[index].clone())
    }

    fn on_ready(&self, callback: ReadyCallback) {
        callback();
    }
}
