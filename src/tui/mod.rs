pub mod app;
pub mod input;
pub mod ui;

use anyhow::Result;
use flume::Receiver;
use ratatui::{backend::CrosstermBackend, prelude::*};
use std::io::{self, Stdout};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    core::{Bus, CoreToUi, SharedLogBuffer, StoreEvent, UiToCore},
    protocol::{service::ConnectionTracker, simulator::UptimeCounter, Store},
    tui::input::{map_key, Action},
};
use app::App;

const LOG_TAIL: usize = 8;

/// Live facts about the running slave shown in the status bar.
#[derive(Clone)]
pub struct SlaveStatus {
    pub listen: SocketAddr,
    pub unit_id: u8,
    pub clients: ConnectionTracker,
    pub uptime: Arc<UptimeCounter>,
    pub simulating: bool,
}

/// Everything the dashboard needs from the slave runner.
pub struct Dashboard {
    pub store: Arc<Store>,
    pub events: Receiver<StoreEvent>,
    pub logs: SharedLogBuffer,
    pub bus: Bus,
    pub status: SlaveStatus,
}

/// Run the dashboard on the current thread until the user quits or the
/// runner reports that the slave stopped.
pub fn run(dashboard: Dashboard) -> Result<()> {
    log::info!("dashboard starting");

    let mut stdout = io::stdout();
    crossterm::terminal::enable_raw_mode()?;
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(&mut stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, dashboard);

    let mut stdout = io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::LeaveAlternateScreen)?;
    crossterm::terminal::disable_raw_mode()?;

    res
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<&mut Stdout>>,
    dashboard: Dashboard,
) -> Result<()> {
    let Dashboard {
        store,
        events,
        logs,
        bus,
        status,
    } = dashboard;
    let mut app = App::new(&store.snapshot(), status.simulating);

    loop {
        for event in events.try_iter() {
            app.apply(&event);
        }
        for message in bus.core_rx.try_iter() {
            match message {
                CoreToUi::SimulationChanged(running) => app.simulating = running,
                CoreToUi::Stopped => return Ok(()),
            }
        }

        let tail = logs.lock().tail(LOG_TAIL).to_vec();
        terminal.draw(|f| ui::render(f, &app, &status, &tail))?;

        if !crossterm::event::poll(Duration::from_millis(200))? {
            continue;
        }
        let crossterm::event::Event::Key(key) = crossterm::event::read()? else {
            continue;
        };
        // A physical key press maps to exactly one action.
        if key.kind != crossterm::event::KeyEventKind::Press {
            continue;
        }

        match map_key(key) {
            Action::Quit => {
                let _ = bus.ui_tx.send(UiToCore::Quit);
                return Ok(());
            }
            Action::ToggleSimulation => {
                if bus.ui_tx.send(UiToCore::ToggleSimulation).is_err() {
                    log::warn!("slave runner is gone, toggle ignored");
                }
            }
            Action::NextTable => app.next(),
            Action::PrevTable => app.prev(),
            Action::ScrollUp => app.scroll_up(),
            Action::ScrollDown => app.scroll_down(),
            Action::None => {}
        }
    }
}
