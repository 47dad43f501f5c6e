use std::sync::mpsc::Sender;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::FetchError;
use crate::loader::QuoteLoader;
use crate::quote::{Quote, QuoteSource};
use crate::runtime::AppEvent;
use crate::session::{Metrics, SessionPhase, TypingSession};
use crate::storage::ProgressStore;
use crate::story::{NextQuote, StoryController};

pub const LOADING_MESSAGE: &str = "Loading quote…";
pub const ERROR_MESSAGE: &str = "Unable to load quote. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteOrigin {
    Random,
    Story { index: usize },
}

/// What the typing area currently holds
#[derive(Debug)]
pub enum Prompt<C: Clock> {
    Loading,
    Unavailable,
    Ready {
        quote: Quote,
        origin: QuoteOrigin,
        session: TypingSession<C>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// Owns the current attempt and routes terminal events into it.
#[derive(Debug)]
pub struct App<S: ProgressStore, C: Clock> {
    config: Config,
    clock: C,
    loader: QuoteLoader,
    story: Option<StoryController<S>>,
    prompt: Prompt<C>,
    focused: bool,
}

impl<S: ProgressStore, C: Clock> App<S, C> {
    pub fn new(
        config: Config,
        source: Arc<dyn QuoteSource>,
        store: S,
        clock: C,
        events: Sender<AppEvent>,
    ) -> Self {
        let story = config.story_mode.then(|| StoryController::new(store));
        Self {
            config,
            clock,
            loader: QuoteLoader::new(source, events),
            story,
            prompt: Prompt::Loading,
            focused: true,
        }
    }

    /// Show a resumed story quote, or kick off the first fetch.
    pub fn start(&mut self) {
        let resumed = self.story.as_mut().and_then(|story| story.load_on_startup());
        match resumed {
            Some((index, quote)) => self.show_quote(quote, QuoteOrigin::Story { index }),
            None => self.fetch_random(),
        }
    }

    pub fn handle(&mut self, event: AppEvent) -> Control {
        match event {
            AppEvent::Key(key) => return self.on_key(key),
            AppEvent::FocusGained => self.on_focus_change(true),
            AppEvent::FocusLost => self.on_focus_change(false),
            AppEvent::QuoteFetched { generation, result } => {
                self.on_quote_fetched(generation, result)
            }
            AppEvent::Resize | AppEvent::Tick => {}
        }
        Control::Continue
    }

    fn on_key(&mut self, key: KeyEvent) -> Control {
        match key.code {
            KeyCode::Esc => return Control::Quit,
            KeyCode::Char('c') if key.modifiers == KeyModifiers::CONTROL => return Control::Quit,
            KeyCode::Tab if !self.is_finished() => {
                self.restart();
            }
            KeyCode::Enter if self.is_finished() || self.is_unavailable() => {
                self.restart();
            }
            KeyCode::Char(c) => self.type_char(c),
            _ => {}
        }
        Control::Continue
    }

    /// A keystroke is proof of focus, even if the terminal never said so.
    pub fn type_char(&mut self, c: char) {
        if let Prompt::Ready { session, .. } = &mut self.prompt {
            self.focused = true;
            session.push_char(c);
            if session.is_finished() {
                let m = session.metrics();
                info!(wpm = m.wpm, accuracy = m.accuracy, secs = m.elapsed_secs, "quote finished");
            }
        }
    }

    pub fn on_focus_change(&mut self, focused: bool) {
        self.focused = focused;
        if let Prompt::Ready { session, .. } = &mut self.prompt {
            session.on_focus_change(focused);
        }
    }

    /// Returns false when the restart was refused.
    pub fn restart(&mut self) -> bool {
        let finished = self.is_finished();
        let next = match self.story.as_mut() {
            Some(story) => story.request_next(finished),
            None => NextQuote::Random,
        };

        match next {
            NextQuote::Refused => {
                debug!("restart refused, story quote unfinished");
                return false;
            }
            NextQuote::Story { index, quote } => {
                self.loader.cancel();
                info!(index, "serving story quote");
                self.show_quote(quote, QuoteOrigin::Story { index });
            }
            NextQuote::Random => self.fetch_random(),
        }
        true
    }

    fn fetch_random(&mut self) {
        self.prompt = Prompt::Loading;
        self.loader
            .request(self.config.min_length, self.config.max_length);
    }

    fn on_quote_fetched(&mut self, generation: u64, result: Result<Quote, FetchError>) {
        if !self.loader.accept(generation) {
            return;
        }

        match result {
            Ok(quote) => {
                info!(author = %quote.author, len = quote.text.chars().count(), "quote loaded");
                self.show_quote(quote, QuoteOrigin::Random);
                if let Some(story) = self.story.as_mut() {
                    story.on_random_quote_served();
                }
            }
            Err(e) => {
                warn!("failed to fetch quote: {e}");
                self.prompt = Prompt::Unavailable;
            }
        }
    }

    fn show_quote(&mut self, quote: Quote, origin: QuoteOrigin) {
        match TypingSession::with_clock(&quote.text, self.clock.clone()) {
            Ok(mut session) => {
                if !self.focused {
                    session.on_focus_change(false);
                }
                self.prompt = Prompt::Ready {
                    quote,
                    origin,
                    session,
                };
            }
            Err(e) => {
                error!(?origin, "cannot start session: {e}");
                self.prompt = Prompt::Unavailable;
            }
        }
    }

    pub fn prompt(&self) -> &Prompt<C> {
        &self.prompt
    }

    pub fn session(&self) -> Option<&TypingSession<C>> {
        match &self.prompt {
            Prompt::Ready { session, .. } => Some(session),
            _ => None,
        }
    }

    pub fn quote(&self) -> Option<&Quote> {
        match &self.prompt {
            Prompt::Ready { quote, .. } => Some(quote),
            _ => None,
        }
    }

    pub fn origin(&self) -> Option<QuoteOrigin> {
        match &self.prompt {
            Prompt::Ready { origin, .. } => Some(*origin),
            _ => None,
        }
    }

    pub fn metrics(&self) -> Option<Metrics> {
        self.session().map(TypingSession::metrics)
    }

    pub fn phase(&self) -> Option<SessionPhase> {
        self.session().map(TypingSession::phase)
    }

    pub fn is_finished(&self) -> bool {
        self.session().is_some_and(TypingSession::is_finished)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.prompt, Prompt::Loading)
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self.prompt, Prompt::Unavailable)
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// False while a scripted quote is on screen and unfinished.
    pub fn can_restart(&self) -> bool {
        !self.is_story_quote_and_unfinished()
    }

    pub fn is_story_quote_and_unfinished(&self) -> bool {
        let finished = self.is_finished();
        self.story
            .as_ref()
            .is_some_and(|story| story.is_story_quote_and_unfinished(finished))
    }

    /// 1-based position in the script when a story quote is shown
    pub fn story_position(&self) -> Option<(usize, usize)> {
        match (self.origin(), self.story.as_ref()) {
            (Some(QuoteOrigin::Story { index }), Some(story)) => {
                Some((index + 1, story.script_len()))
            }
            _ => None,
        }
    }

    pub fn story(&self) -> Option<&StoryController<S>> {
        self.story.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use crate::story::STORY_QUOTES;
    use std::sync::mpsc::{self, Receiver};
    use std::time::Duration;

    type TestApp = App<MemoryStore, ManualClock>;

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn app_with(
        source: Arc<dyn QuoteSource>,
        config: Config,
    ) -> (TestApp, Receiver<AppEvent>, ManualClock) {
        let (tx, rx) = mpsc::channel();
        let clock = ManualClock::new();
        let app = App::new(config, source, MemoryStore::new(), clock.clone(), tx);
        (app, rx, clock)
    }

    fn fixed(text: &'static str) -> Arc<dyn QuoteSource> {
        Arc::new(move |_: usize, _: usize| -> Result<Quote, FetchError> {
            Ok(Quote::new(text, "Tester"))
        })
    }

    fn pump(app: &mut TestApp, rx: &Receiver<AppEvent>) {
        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        app.handle(event);
    }

    fn type_str(app: &mut TestApp, text: &str) {
        for c in text.chars() {
            app.handle(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_start_loads_random_quote() {
        let (mut app, rx, _) = app_with(fixed("hi there"), Config::default());

        app.start();
        assert!(app.is_loading());

        pump(&mut app, &rx);
        assert_eq!(app.quote().unwrap().text, "hi there");
        assert_eq!(app.origin(), Some(QuoteOrigin::Random));
        assert_eq!(app.phase(), Some(SessionPhase::Idle));
    }

    #[test]
    fn test_fetch_failure_shows_unavailable_and_retry_works() {
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let source: Arc<dyn QuoteSource> =
            Arc::new(move |_: usize, _: usize| -> Result<Quote, FetchError> {
                let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if n == 0 {
                    Err(FetchError::Transport("offline".into()))
                } else {
                    Ok(Quote::new("back online", "Net"))
                }
            });
        let (mut app, rx, _) = app_with(source, Config::default());

        app.start();
        pump(&mut app, &rx);
        assert!(app.is_unavailable());
        assert!(app.metrics().is_none());

        app.handle(key(KeyCode::Tab));
        assert!(app.is_loading());
        pump(&mut app, &rx);
        assert_eq!(app.quote().unwrap().text, "back online");
    }

    #[test]
    fn test_typing_updates_metrics() {
        let (mut app, rx, clock) = app_with(fixed("cat sat"), Config::default());
        app.start();
        pump(&mut app, &rx);

        app.handle(key(KeyCode::Char('c')));
        clock.advance_ms(30_000);
        type_str(&mut app, "as sat");

        assert!(app.is_finished());
        let m = app.metrics().unwrap();
        assert_eq!(m.mistakes, 1);
        assert_eq!(m.accuracy, 86);
        assert_eq!(m.elapsed_secs, 30);
    }

    #[test]
    fn test_altgr_chars_are_typed() {
        let (mut app, rx, _) = app_with(fixed("@{"), Config::default());
        app.start();
        pump(&mut app, &rx);

        // windows reports AltGr as Ctrl+Alt
        let altgr = KeyModifiers::CONTROL | KeyModifiers::ALT;
        app.handle(AppEvent::Key(KeyEvent::new(KeyCode::Char('@'), altgr)));
        app.handle(AppEvent::Key(KeyEvent::new(KeyCode::Char('{'), altgr)));

        assert_eq!(app.session().unwrap().typed(), "@{");
        assert!(app.is_finished());
    }

    #[test]
    fn test_typing_after_focus_loss_restores_focus() {
        let (mut app, rx, _) = app_with(fixed("hello"), Config::default());
        app.start();
        pump(&mut app, &rx);

        type_str(&mut app, "h");
        app.handle(AppEvent::FocusLost);
        assert!(!app.is_focused());
        type_str(&mut app, "e");

        assert_eq!(app.phase(), Some(SessionPhase::Running));
        assert!(app.is_focused());
        assert_eq!(app.is_focused(), app.session().unwrap().is_focused());

        // the next quote starts focused too
        app.handle(key(KeyCode::Tab));
        pump(&mut app, &rx);
        assert!(app.session().unwrap().is_focused());
    }

    #[test]
    fn test_escape_and_ctrl_c_quit() {
        let (mut app, _rx, _) = app_with(fixed("abc"), Config::default());

        assert_eq!(app.handle(key(KeyCode::Esc)), Control::Quit);
        assert_eq!(
            app.handle(AppEvent::Key(KeyEvent::new(
                KeyCode::Char('c'),
                KeyModifiers::CONTROL
            ))),
            Control::Quit
        );
        assert_eq!(app.handle(AppEvent::Tick), Control::Continue);
    }

    #[test]
    fn test_finishing_unlocks_story_and_enter_serves_first_story_quote() {
        let (mut app, rx, _) = app_with(fixed("ab"), Config::default());
        app.start();
        pump(&mut app, &rx);

        type_str(&mut app, "ab");
        assert!(app.is_finished());

        app.handle(key(KeyCode::Enter));

        assert_eq!(app.origin(), Some(QuoteOrigin::Story { index: 0 }));
        assert_eq!(app.quote().unwrap().text, STORY_QUOTES[0].0);
        assert_eq!(app.story_position(), Some((1, STORY_QUOTES.len())));
        assert!(app.story().unwrap().progress().unlocked);
        assert!(!app.is_loading());
    }

    #[test]
    fn test_restart_refused_on_unfinished_story_quote() {
        let (mut app, rx, _) = app_with(fixed("ab"), Config::default());
        app.start();
        pump(&mut app, &rx);
        type_str(&mut app, "ab");
        app.handle(key(KeyCode::Enter));
        type_str(&mut app, "You");

        assert!(!app.can_restart());
        assert!(!app.restart());
        app.handle(key(KeyCode::Tab));

        assert_eq!(app.origin(), Some(QuoteOrigin::Story { index: 0 }));
        assert_eq!(app.session().unwrap().typed(), "You");
        assert_eq!(app.story().unwrap().progress().next_index, 1);
    }

    #[test]
    fn test_tab_before_finishing_fetches_new_random_quote() {
        let (mut app, rx, _) = app_with(fixed("abc"), Config::default());
        app.start();
        pump(&mut app, &rx);
        type_str(&mut app, "a");

        app.handle(key(KeyCode::Tab));
        assert!(app.is_loading());
        pump(&mut app, &rx);

        assert_eq!(app.session().unwrap().typed(), "");
        assert_eq!(app.phase(), Some(SessionPhase::Idle));
        assert!(!app.story().unwrap().progress().unlocked);
    }

    #[test]
    fn test_stale_fetch_is_ignored() {
        let (mut app, rx, _) = app_with(fixed("abc"), Config::default());
        app.start();
        let first = app.loader.generation();
        app.restart();

        app.handle(AppEvent::QuoteFetched {
            generation: first,
            result: Ok(Quote::new("stale", "old")),
        });
        assert!(app.is_loading());

        // drain the two real responses; only the newest lands
        pump(&mut app, &rx);
        pump(&mut app, &rx);
        assert_eq!(app.quote().unwrap().text, "abc");
    }

    #[test]
    fn test_story_quote_cancels_in_flight_fetch() {
        let (mut app, rx, _) = app_with(fixed("ab"), Config::default());
        app.start();
        pump(&mut app, &rx);
        type_str(&mut app, "ab");

        // a late random quote from before the restart must not replace the story
        let stale = app.loader.generation();
        app.handle(key(KeyCode::Enter));
        app.handle(AppEvent::QuoteFetched {
            generation: stale,
            result: Ok(Quote::new("late", "old")),
        });

        assert_eq!(app.origin(), Some(QuoteOrigin::Story { index: 0 }));
    }

    #[test]
    fn test_focus_pauses_session_and_is_carried_into_next_quote() {
        let (mut app, rx, clock) = app_with(fixed("hello"), Config::default());
        app.start();
        pump(&mut app, &rx);

        type_str(&mut app, "he");
        clock.advance_ms(2_000);
        app.handle(AppEvent::FocusLost);
        assert_eq!(app.phase(), Some(SessionPhase::Paused));
        clock.advance_ms(10_000);
        assert_eq!(app.metrics().unwrap().elapsed_secs, 2);

        app.handle(AppEvent::FocusGained);
        assert_eq!(app.phase(), Some(SessionPhase::Running));
        assert!(app.is_focused());

        app.handle(AppEvent::FocusLost);
        app.handle(key(KeyCode::Tab));
        pump(&mut app, &rx);
        assert!(!app.session().unwrap().is_focused());
    }

    #[test]
    fn test_story_mode_disabled_never_unlocks() {
        let config = Config {
            story_mode: false,
            ..Config::default()
        };
        let (mut app, rx, _) = app_with(fixed("ab"), config);
        app.start();
        pump(&mut app, &rx);
        type_str(&mut app, "ab");

        app.handle(key(KeyCode::Enter));
        assert!(app.is_loading());
        assert!(app.story().is_none());
        pump(&mut app, &rx);
        assert_eq!(app.origin(), Some(QuoteOrigin::Random));
    }

    #[test]
    fn test_empty_quote_is_unavailable_not_a_panic() {
        let (mut app, rx, _) = app_with(fixed(""), Config::default());
        app.start();
        pump(&mut app, &rx);
        assert!(app.is_unavailable());
    }
}
