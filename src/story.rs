use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::quote::Quote;
use crate::storage::ProgressStore;

pub const PROGRESS_KEY: &str = "type50.storyProgress";

/// Scripted quotes, served in order once story mode unlocks.
pub const STORY_QUOTES: &[(&str, &str)] = &[
    (
        "You finished one. Most people quit before the first full stop. You did not, so the keyboard has decided to tell you a story, one line at a time.",
        "the keyboard",
    ),
    (
        "Every key on this board remembers the first hand that pressed it. The space bar remembers the most, because everyone leans on it when they are not sure what comes next.",
        "the keyboard",
    ),
    (
        "Fifty words a minute was the old benchmark for a good typist. Nobody remembers who set it, only that the number stuck, and that people kept trying to beat it.",
        "the keyboard",
    ),
    (
        "The fastest typists do not look faster. They look calm. Their hands stop thinking about letters and start thinking about words, then whole phrases.",
        "the keyboard",
    ),
    (
        "That is the end of the story for now. The quotes go back to being random, but you know a secret: somewhere under every key there is a tally of your mistakes.",
        "the keyboard",
    ),
];

/// Persisted story position. `next_index` only ever grows and `unlocked`
/// never flips back once set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryProgress {
    pub next_index: usize,
    pub current_index: Option<usize>,
    pub unlocked: bool,
}

impl StoryProgress {
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Encode(e.to_string()))
    }
}

/// Overwrite stored progress with a fresh, locked story.
pub fn reset_progress<S: ProgressStore>(store: &mut S) -> Result<()> {
    let raw = StoryProgress::default().encode()?;
    store.set(PROGRESS_KEY, &raw)?;
    Ok(())
}

/// What to show after a restart request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextQuote {
    /// A scripted quote is on screen and unfinished
    Refused,
    Story { index: usize, quote: Quote },
    Random,
}

/// Decides between the script and the quote source, and keeps the store in sync.
#[derive(Debug)]
pub struct StoryController<S: ProgressStore> {
    script: Vec<Quote>,
    progress: StoryProgress,
    store: S,
}

impl<S: ProgressStore> StoryController<S> {
    pub fn new(store: S) -> Self {
        let script = STORY_QUOTES
            .iter()
            .map(|(text, author)| Quote::new(*text, *author))
            .collect();
        Self::with_script(store, script)
    }

    pub fn with_script(store: S, script: Vec<Quote>) -> Self {
        Self {
            script,
            progress: StoryProgress::default(),
            store,
        }
    }

    /// Read stored progress and decide what the first screen shows. Returns the
    /// scripted quote to resume, or `None` when a random quote should be fetched.
    pub fn load_on_startup(&mut self) -> Option<(usize, Quote)> {
        self.progress = match self.store.get(PROGRESS_KEY) {
            Some(raw) => StoryProgress::parse(&raw).unwrap_or_else(|e| {
                debug!("{e}; starting story from scratch");
                StoryProgress::default()
            }),
            None => StoryProgress::default(),
        };

        if self.progress.unlocked {
            if let Some(index) = self.progress.current_index {
                if let Some(quote) = self.script.get(index) {
                    info!(index, "resuming story quote");
                    return Some((index, quote.clone()));
                }
            }
        }

        self.progress.current_index = None;
        self.persist();
        None
    }

    pub fn request_next(&mut self, session_finished: bool) -> NextQuote {
        if self.is_story_quote_and_unfinished(session_finished) {
            return NextQuote::Refused;
        }

        if session_finished && !self.progress.unlocked {
            info!("story mode unlocked");
            self.progress.unlocked = true;
        }

        if self.progress.unlocked {
            let index = self.progress.next_index;
            if let Some(quote) = self.script.get(index).cloned() {
                self.progress.current_index = Some(index);
                self.progress.next_index = index + 1;
                self.persist();
                return NextQuote::Story { index, quote };
            }
        }

        self.progress.current_index = None;
        self.persist();
        NextQuote::Random
    }

    pub fn on_random_quote_served(&mut self) {
        self.progress.current_index = None;
        self.persist();
    }

    pub fn is_story_quote_and_unfinished(&self, session_finished: bool) -> bool {
        self.progress.current_index.is_some() && !session_finished
    }

    pub fn progress(&self) -> StoryProgress {
        self.progress
    }

    pub fn script_len(&self) -> usize {
        self.script.len()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn persist(&mut self) {
        let raw = match self.progress.encode() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("{e}");
                return;
            }
        };
        if let Err(e) = self.store.set(PROGRESS_KEY, &raw) {
            warn!("could not persist story progress: {e}");
        }
    }
}
