// Module declarations
pub mod action;
pub mod app;
pub mod error;
pub mod focus;
pub mod keys;
pub mod renderer;
pub mod viewport;

#[cfg(test)]
pub mod testing;

pub use action::Action;
pub use app::App;
pub use error::{TuiError, TuiResult};
pub use focus::{FocusCommand, FocusManager, FocusState};
pub use keys::key_to_action;
pub use renderer::RenderCoordinator;
pub use viewport::{RowCommand, RowCursor};

use std::future::Future;
use std::io;
use std::time::Duration;

use crossterm::{
    cursor::Show,
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::scheduler::Scheduler;
use crate::widget::WidgetSet;

/// Main entry point for TUI mode
pub async fn run(config: &Config, widgets: WidgetSet) -> TuiResult<()> {
    with_terminal(setup_terminal, dashboard(config, widgets), restore_terminal).await
}

/// Run `body` between `enter` and `restore`
///
/// `restore` runs on every path, including a failed `enter`. The first error wins.
async fn with_terminal<F>(
    enter: impl FnOnce() -> TuiResult<()>,
    body: F,
    restore: impl FnOnce() -> TuiResult<()>,
) -> TuiResult<()>
where
    F: Future<Output = TuiResult<()>>,
{
    if let Err(e) = enter() {
        if let Err(restore_err) = restore() {
            tracing::warn!("TUI: terminal restore failed: {}", restore_err);
        }
        return Err(e);
    }

    let result = body.await;
    let restored = restore();
    result.and(restored)
}

fn setup_terminal() -> TuiResult<()> {
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
    Ok(())
}

fn restore_terminal() -> TuiResult<()> {
    let raw = disable_raw_mode();
    let screen = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture, Show);
    raw.and(screen)?;
    Ok(())
}

async fn dashboard(config: &Config, widgets: WidgetSet) -> TuiResult<()> {
    let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
    let renderer = RenderCoordinator::new(terminal, config.grid.clone(), config.colors.clone())?;

    let (render_tx, mut render_rx) = mpsc::unbounded_channel();
    let mut scheduler = Scheduler::new(widgets.instances, config.fetch_timeout(), render_tx);
    scheduler.start();
    let mut app = App::new(scheduler, renderer);

    let result = event_loop(&mut app, &mut render_rx);
    app.shutdown().await;
    result
}

fn event_loop(
    app: &mut App<CrosstermBackend<io::Stdout>>,
    render_rx: &mut mpsc::UnboundedReceiver<usize>,
) -> TuiResult<()> {
    let mut dirty = true;

    loop {
        // Collapse queued render requests into a single paint
        let mut pending = 0;
        while render_rx.try_recv().is_ok() {
            pending += 1;
        }
        if pending > 0 {
            tracing::trace!("LOOP: {} render request(s)", pending);
            dirty = true;
        }

        if dirty {
            app.paint()?;
            dirty = false;
        }

        // Poll for terminal events
        if !event::poll(Duration::from_millis(100))? {
            continue;
        }

        match event::read()? {
            Event::Key(key) => {
                let Some(action) = key_to_action(key) else {
                    continue;
                };
                if action == Action::Quit {
                    tracing::debug!("ACTION: Quitting application");
                    break;
                }
                dirty |= app.handle(action)?;
            }
            Event::Mouse(mouse) => dirty |= app.handle_mouse(mouse),
            Event::Resize(width, height) => {
                tracing::debug!("LOOP: terminal resized to {}x{}", width, height);
                app.renderer_mut().resize()?;
                dirty = true;
            }
            _ => {}
        }
    }

    Ok(())
}
