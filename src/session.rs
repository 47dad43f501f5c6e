use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};

/// Characters per word for WPM
pub const CHARS_PER_WORD: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SessionPhase {
    Idle,
    Running,
    Paused,
    Finished,
}

/// Pause/resume bookkeeping: time banked so far plus the start of the live span.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveTimer {
    pub accumulated: Duration,
    pub since: Option<Instant>,
}

impl ActiveTimer {
    fn start(&mut self, now: Instant) {
        if self.since.is_none() {
            self.since = Some(now);
        }
    }

    /// Fold the live span into the accumulated total.
    fn stop(&mut self, now: Instant) {
        if let Some(since) = self.since.take() {
            self.accumulated += now.saturating_duration_since(since);
        }
    }

    pub fn is_running(&self) -> bool {
        self.since.is_some()
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        let live = self
            .since
            .map_or(Duration::ZERO, |since| now.saturating_duration_since(since));
        self.accumulated + live
    }
}

/// Derived results for the stats bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub elapsed_secs: u64,
    pub wpm: u32,
    pub accuracy: u32,
    pub mistakes: usize,
    pub net_correct: usize,
    pub typed_chars: usize,
}

/// One attempt at typing a reference text.
///
/// Input is append-only: every character beyond the previous input length is
/// compared against the reference, and a position is recorded as a mistake at
/// most once. Time only accrues while the session is [`SessionPhase::Running`].
#[derive(Debug, Clone)]
pub struct TypingSession<C: Clock = SystemClock> {
    clock: C,
    reference: Vec<char>,
    typed: String,
    typed_len: usize,
    mistake_positions: HashSet<usize>,
    high_water_mark: usize,
    timer: ActiveTimer,
    phase: SessionPhase,
    focused: bool,
}

impl TypingSession<SystemClock> {
    pub fn new(reference: &str) -> Result<Self> {
        Self::with_clock(reference, SystemClock)
    }
}

impl<C: Clock> TypingSession<C> {
    pub fn with_clock(reference: &str, clock: C) -> Result<Self> {
        let mut session = Self {
            clock,
            reference: Vec::new(),
            typed: String::new(),
            typed_len: 0,
            mistake_positions: HashSet::new(),
            high_water_mark: 0,
            timer: ActiveTimer::default(),
            phase: SessionPhase::Idle,
            focused: true,
        };
        session.begin(reference)?;
        Ok(session)
    }

    /// Reset everything and start over on `reference`. Focus is left as is,
    /// it belongs to the terminal, not to the attempt.
    pub fn begin(&mut self, reference: &str) -> Result<()> {
        if reference.is_empty() {
            return Err(Error::Precondition("reference text must not be empty"));
        }

        self.reference = reference.chars().collect();
        self.typed.clear();
        self.typed_len = 0;
        self.mistake_positions.clear();
        self.high_water_mark = 0;
        self.timer = ActiveTimer::default();
        self.phase = SessionPhase::Idle;
        Ok(())
    }

    pub fn on_input(&mut self, new_input: &str) {
        if self.phase == SessionPhase::Finished {
            return;
        }

        let now = self.clock.now();
        if matches!(self.phase, SessionPhase::Idle | SessionPhase::Paused) {
            // keystrokes only arrive while the input has focus
            self.focused = true;
            self.timer.start(now);
            self.phase = SessionPhase::Running;
        }

        let mut new_len = 0;
        for (pos, c) in new_input.chars().enumerate() {
            new_len = pos + 1;
            if pos < self.typed_len {
                continue;
            }
            if self.reference.get(pos) != Some(&c) {
                self.mistake_positions.insert(pos);
            }
        }

        self.high_water_mark = self.high_water_mark.max(new_len);
        self.typed.clear();
        self.typed.push_str(new_input);
        self.typed_len = new_len;

        if self.typed_len >= self.reference.len() {
            self.timer.stop(now);
            self.phase = SessionPhase::Finished;
        }
    }

    /// Convenience for key-at-a-time input.
    pub fn push_char(&mut self, c: char) {
        let mut next = String::with_capacity(self.typed.len() + c.len_utf8());
        next.push_str(&self.typed);
        next.push(c);
        self.on_input(&next);
    }

    pub fn on_focus_change(&mut self, focused: bool) {
        self.focused = focused;
        let now = self.clock.now();

        match (self.phase, focused) {
            (SessionPhase::Running, false) => {
                self.timer.stop(now);
                self.phase = SessionPhase::Paused;
            }
            (SessionPhase::Paused, true) if self.high_water_mark > 0 => {
                self.timer.start(now);
                self.phase = SessionPhase::Running;
            }
            _ => {}
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.timer.elapsed(self.clock.now())
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed().as_secs()
    }

    pub fn metrics(&self) -> Metrics {
        let elapsed_secs = self.elapsed_seconds();
        let typed = self.high_water_mark;
        let mistakes = self.mistake_positions.len();
        let net_correct = typed.saturating_sub(mistakes);

        let minutes = elapsed_secs as f64 / 60.0;
        let wpm = if minutes > 0.0 {
            ((typed as f64 / CHARS_PER_WORD) / minutes).round() as u32
        } else {
            0
        };
        let accuracy = if typed > 0 {
            ((net_correct as f64 / typed as f64) * 100.0).round() as u32
        } else {
            100
        };

        Metrics {
            elapsed_secs,
            wpm,
            accuracy,
            mistakes,
            net_correct,
            typed_chars: typed,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == SessionPhase::Finished
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn reference(&self) -> &[char] {
        &self.reference
    }

    pub fn typed(&self) -> &str {
        &self.typed
    }

    /// Input length in characters
    pub fn cursor_pos(&self) -> usize {
        self.typed_len
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    pub fn mistakes(&self) -> usize {
        self.mistake_positions.len()
    }

    pub fn mistake_positions(&self) -> &HashSet<usize> {
        &self.mistake_positions
    }

    pub fn timer(&self) -> ActiveTimer {
        self.timer
    }
}
