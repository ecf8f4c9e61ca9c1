//! Overlay quote rotation. Auxiliary surface state, not part of the
//! coordination core.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use rand::Rng;

use crate::SurfaceId;
use crate::surface::OverlayText;

pub const DEFAULT_QUOTES: &[&str] = &[
    "The mountains are calling and I must go",
    "Somewhere, something incredible is waiting to be known",
    "Not all those who wander are lost",
    "The world is quiet here",
    "Night does not fall, it rises",
];

/// Draw state over a fixed set of quotes.
///
/// Never yields the same entry twice in a row while more than one entry
/// exists; a matching draw is simply re-drawn.
#[derive(Debug)]
pub struct QuoteDeck {
    quotes: Vec<String>,
    last: Option<usize>,
}

impl QuoteDeck {
    pub fn new(quotes: Vec<String>) -> Self {
        Self { quotes, last: None }
    }

    pub fn draw<R: Rng>(&mut self, rng: &mut R) -> Option<&str> {
        if self.quotes.is_empty() {
            return None;
        }
        let mut index = rng.random_range(0..self.quotes.len());
        while self.quotes.len() > 1 && Some(index) == self.last {
            index = rng.random_range(0..self.quotes.len());
        }
        self.last = Some(index);
        Some(&self.quotes[index])
    }
}

/// Periodic quote publisher for one surface's overlay.
///
/// Publishes one quote immediately on start, then one per interval.
/// Dropping the rotator stops and joins its thread.
pub struct QuoteRotator {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl QuoteRotator {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

    pub(crate) fn start(
        surface: SurfaceId,
        overlay: OverlayText,
        quotes: Vec<String>,
        interval: Duration,
    ) -> Self {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name(format!("quotes-{surface}"))
            .spawn(move || {
                let mut deck = QuoteDeck::new(quotes);
                let mut rng = rand::rng();
                if let Some(quote) = deck.draw(&mut rng) {
                    overlay.publish(quote.to_string());
                }
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if let Some(quote) = deck.draw(&mut rng) {
                                overlay.publish(quote.to_string());
                            }
                        }
                        _ => break,
                    }
                }
            })
            .expect("failed to spawn quote rotator thread");
        Self {
            stop_tx,
            handle: Some(handle),
        }
    }
}

impl Drop for QuoteRotator {
    fn drop(&mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
