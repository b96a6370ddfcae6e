use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use ratatui::{backend::CrosstermBackend, Terminal};
use reqwest::Url;
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};
use woeplanet_map::{
    api::ResourceProvider,
    app::{App, Task},
    cli::CliArgs,
    config::Config,
    events::{Event, EventHandler},
    location::Geolocator,
    logging, ui,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Instrumentation and safety
    let _log_guard = logging::initialize_logging(&args.log_dir, args.debug);
    color_eyre::install()?;
    install_panic_hook();

    let config = Config::load(&args.config);

    let href = args.url.clone().unwrap_or_else(|| config.page.url.clone());
    let url = Url::parse(&href).wrap_err_with(|| format!("invalid page URL '{}'", href))?;
    info!("Opening {}", url);

    let resources = Arc::new(ResourceProvider::new()?);
    let geolocator = Geolocator::from_config(&config.location);

    // Ready terminal and state
    let mut terminal = setup_terminal()?;
    let mut app = App::new(config, url, terminal.size()?, geolocator);
    let mut events = EventHandler::new(150);

    // Main loop
    while !app.should_quit {
        for task in app.take_tasks() {
            spawn_task(task, events.tx.clone(), Arc::clone(&resources));
        }

        terminal.draw(|f| ui::render(f, &app))?;

        match events.next().await {
            Some(event) => app.handle_event(event),
            None => break,
        }
    }

    restore_terminal(terminal)?;
    Ok(())
}

/// Runs page-load work in the background. Results come back through the event
/// channel tagged with the page generation that asked for them.
fn spawn_task(task: Task, tx: UnboundedSender<Event>, resources: Arc<ResourceProvider>) {
    match task {
        Task::FetchPlaceholder {
            generation,
            pane,
            url,
        } => {
            debug!("Fetching {} for the {} map", url, pane);
            tokio::spawn(async move {
                let result = resources
                    .fetch_geojson(&url)
                    .await
                    .map_err(|e| format!("{:#}", e));
                let _ = tx.send(Event::PlaceholderLoaded {
                    generation,
                    pane,
                    result,
                });
            });
        }
        Task::Geolocate {
            generation,
            geolocator,
        } => {
            debug!("Asking for the current position");
            tokio::spawn(async move {
                let result = geolocator.current_position().await;
                let _ = tx.send(Event::Geolocated { generation, result });
            });
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(
        stdout,
        crossterm::terminal::EnterAlternateScreen,
        EnableMouseCapture,
        crossterm::cursor::Hide
    )?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::cursor::Show
    )?;
    Ok(())
}

fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Force terminal cleanup!
        crossterm::terminal::disable_raw_mode().ok();
        crossterm::execute!(
            std::io::stdout(),
            DisableMouseCapture,
            crossterm::terminal::LeaveAlternateScreen,
            crossterm::cursor::Show
        )
        .ok();
        original_hook(panic_info);
    }));
}
