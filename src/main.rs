use std::{
    error::Error,
    io::{self, stdin},
    sync::Arc,
    time::Duration,
};

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{DisableFocusChange, EnableFocusChange},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use tracing::{error, info};

use type50::{
    app::{App, Control},
    app_dirs::AppDirs,
    clock::{Clock, SystemClock},
    config::{Config, ConfigStore, FileConfigStore, RuntimeSettings},
    logging::init_logging,
    quote::{HttpQuoteSource, OfflineQuoteSource, QuoteSource},
    runtime::{AppEventSource, CrosstermEventSource, FixedTicker, Runner, Ticker},
    storage::{FileStore, MemoryStore, ProgressStore},
    story::reset_progress,
};

/// typing speed test with live wpm, accuracy and a short story mode
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Type a random quote as fast and as accurately as you can. Finish one and a short scripted story unlocks for the rest of this terminal session."
)]
pub struct Cli {
    /// shortest quote to request, in characters
    #[clap(long)]
    min_length: Option<usize>,

    /// longest quote to request, in characters
    #[clap(long)]
    max_length: Option<usize>,

    /// quote service url
    #[clap(long)]
    endpoint: Option<String>,

    /// use the bundled quotes instead of the quote service
    #[clap(long)]
    offline: bool,

    /// never switch to story quotes
    #[clap(long)]
    no_story: bool,

    /// keep story progress in memory only
    #[clap(long)]
    no_persist: bool,

    /// start the story over for this terminal session
    #[clap(long)]
    reset_progress: bool,
}

impl Cli {
    fn to_runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            min_length: self.min_length,
            max_length: self.max_length,
            endpoint: self.endpoint.clone(),
            offline: self.offline,
            no_story: self.no_story,
        }
    }

    fn progress_store(&self) -> Box<dyn ProgressStore> {
        if self.no_persist {
            Box::new(MemoryStore::new())
        } else {
            Box::new(FileStore::for_terminal_session())
        }
    }
}

fn quote_source(config: &Config) -> Arc<dyn QuoteSource> {
    if config.offline {
        Arc::new(OfflineQuoteSource)
    } else {
        Arc::new(HttpQuoteSource::new(config.endpoint.clone()))
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let config = FileConfigStore::new()
        .load()
        .merged(&cli.to_runtime_settings());
    if let Err(e) = config.validate() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::InvalidValue, e.to_string()).exit();
    }

    let _log_guard = init_logging(&AppDirs::state_dir())?;
    info!(?config, "configuration loaded");

    let mut store = cli.progress_store();
    if cli.reset_progress {
        reset_progress(&mut store)?;
        info!("story progress reset");
    }

    let event_source = CrosstermEventSource::new();
    let ticker = FixedTicker::new(Duration::from_millis(config.tick_rate_ms));
    let runner = Runner::new(event_source, ticker);

    let mut app = App::new(
        config.clone(),
        quote_source(&config),
        store,
        SystemClock,
        runner.sender(),
    );

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.start();
    let result = start_tui(&mut terminal, &mut app, &runner);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableFocusChange,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        error!("terminal loop failed: {e}");
    }
    result
}

fn start_tui<B, S, C, E, T>(
    terminal: &mut Terminal<B>,
    app: &mut App<S, C>,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>>
where
    B: Backend,
    S: ProgressStore,
    C: Clock,
    E: AppEventSource,
    T: Ticker,
{
    terminal.draw(|f| f.render_widget(&*app, f.area()))?;

    loop {
        // ticks just repaint; the clock is read fresh on every draw
        if app.handle(runner.step()) == Control::Quit {
            break;
        }
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;
    }

    Ok(())
}
