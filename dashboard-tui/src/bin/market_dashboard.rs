/// Market Dashboard
///
/// Bond spreads, ETF holdings, option chains and short-sell activity from the dashboard API,
/// one tab each. Configuration comes from `DASHBOARD_*` environment variables, logs go to
/// `DASHBOARD_LOG_FILE` since the terminal belongs to the UI.
use std::{
    error::Error,
    fs::OpenOptions,
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use dashboard_data::{ApiClient, DashboardConfig};
use dashboard_tui::{App, Control};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::info;

/// Upper bound on the wait for terminal input, so deliveries are drawn promptly.
const TICK_RATE: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = DashboardConfig::from_env();
    init_logging(&config.log_file)?;

    let api = ApiClient::new(&config)?;

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config, Arc::new(api));
    let size = terminal.size()?;
    app.dashboard.resize_all(size.width, size.height);
    app.dashboard.start();

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    info!("market dashboard stopped");
    res
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn Error>> {
    loop {
        app.dashboard.pump();
        terminal.draw(|f| app.render(f))?;

        if event::poll(TICK_RATE)? {
            match event::read()? {
                Event::Key(key) => {
                    if app.handle_key(key) == Control::Quit {
                        return Ok(());
                    }
                }
                Event::Resize(width, height) => app.dashboard.resize_all(width, height),
                _ => {}
            }
        }
    }
}

/// Initialize logging into `path`, filtered by `RUST_LOG` (default: info)
fn init_logging(path: &str) -> Result<(), Box<dyn Error>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}
