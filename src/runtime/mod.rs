use std::env;

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{error, info, warn};

use crate::app::App;
use crate::audio::RodioEngine;
use crate::catalog::{CatalogWorker, Gateway};
use crate::config::resolve_config_path;
use crate::error::Result;
use crate::logging;
use crate::player::Player;

mod event_loop;
mod settings;

pub fn run() -> Result<()> {
    let (settings, settings_error) = settings::load_settings();

    if let Err(e) = logging::init(&settings.logging) {
        eprintln!("riffle: logging disabled: {e}");
    }
    if let Some(e) = settings_error {
        warn!(error = %e, "using default settings");
    }
    info!(config = ?resolve_config_path(), "starting");

    let engine = RodioEngine::new(settings.audio.volume)
        .inspect_err(|e| error!(error = %e, "audio output unavailable"))?;
    let mut player = Player::new(engine, settings.audio.volume);

    let gateway = Gateway::new(settings.catalog.clone())
        .inspect_err(|e| error!(error = %e, "catalog client setup failed"))?;
    let mut catalog = CatalogWorker::spawn(move |query| gateway.fetch(query))?;

    let mut app = App::new();

    // Anything on the command line is an initial search.
    let term = env::args().skip(1).collect::<Vec<_>>().join(" ");
    if !term.trim().is_empty() {
        app.query = term;
        if let Some(query) = app.submit_query() {
            catalog.submit(query.clone());
            app.start_fetch(query);
        }
    }

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run_result = (|| {
        let mut state = event_loop::EventLoopState::new(&player.state());
        event_loop::run(
            &mut terminal,
            &settings,
            &mut app,
            &mut player,
            &mut catalog,
            &mut state,
        )
    })();

    player.shutdown();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    info!("bye");
    run_result
}
