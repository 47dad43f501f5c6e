use std::fmt;
use std::sync::mpsc::Sender;
use std::sync::Arc;

use tracing::debug;

use crate::quote::QuoteSource;
use crate::runtime::AppEvent;

/// Runs quote fetches on worker threads. Every request gets a fresh
/// generation and only the newest one is ever accepted, so a slow response
/// can't overwrite a quote the user already moved past.
pub struct QuoteLoader {
    source: Arc<dyn QuoteSource>,
    events: Sender<AppEvent>,
    generation: u64,
    pending: bool,
}

impl QuoteLoader {
    pub fn new(source: Arc<dyn QuoteSource>, events: Sender<AppEvent>) -> Self {
        Self {
            source,
            events,
            generation: 0,
            pending: false,
        }
    }

    pub fn request(&mut self, min_length: usize, max_length: usize) -> u64 {
        self.generation += 1;
        self.pending = true;

        let generation = self.generation;
        let source = Arc::clone(&self.source);
        let events = self.events.clone();
        debug!(generation, "quote requested");

        std::thread::spawn(move || {
            let result = source.fetch_quote(min_length, max_length);
            // receiver gone means we're shutting down
            let _ = events.send(AppEvent::QuoteFetched { generation, result });
        });

        generation
    }

    /// Invalidate whatever is in flight.
    pub fn cancel(&mut self) {
        if self.pending {
            debug!(generation = self.generation, "quote request cancelled");
        }
        self.generation += 1;
        self.pending = false;
    }

    /// True once for the newest generation, false for anything stale.
    pub fn accept(&mut self, generation: u64) -> bool {
        if self.pending && generation == self.generation {
            self.pending = false;
            true
        } else {
            debug!(generation, current = self.generation, "dropping stale quote");
            false
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for QuoteLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuoteLoader")
            .field("generation", &self.generation)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}
