mod app;
mod ui;

pub use app::{PARENT_KEY, QUIT_KEY, SelectOption, SelectorApp};

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SelectError {
    #[error("terminal error: {0}")]
    Io(#[from] io::Error),
    #[error("selection task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Lets the user pick one of `options`; the quit entry is always offered.
#[allow(async_fn_in_trait)]
pub trait Selector {
    async fn select(
        &self,
        prompt: &str,
        options: Vec<SelectOption>,
    ) -> Result<SelectOption, SelectError>;
}

/// Full-screen list with a type-to-filter line
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalSelector;

impl Selector for TerminalSelector {
    async fn select(
        &self,
        prompt: &str,
        options: Vec<SelectOption>,
    ) -> Result<SelectOption, SelectError> {
        let prompt = prompt.to_string();
        // crossterm input is blocking
        let choice = tokio::task::spawn_blocking(move || run_select(&prompt, options)).await??;
        debug!(key = %choice.key, "selection made");
        Ok(choice)
    }
}

pub fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);
}

/// Install a panic hook that gives the terminal back before printing.
pub fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        restore_terminal();
        original_hook(panic_info);
    }));
}

fn run_select(prompt: &str, options: Vec<SelectOption>) -> io::Result<SelectOption> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = SelectorApp::new(prompt, options);
    let result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result.map(|()| app.into_choice())
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut SelectorApp,
) -> io::Result<()> {
    while !app.should_quit {
        terminal.draw(|f| ui::draw(f, app))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let page = ui::page_size(terminal.size()?.height);
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.cancel(),
            KeyCode::Esc => app.cancel(),
            KeyCode::Enter => app.confirm(),
            KeyCode::Up => app.select_previous(),
            KeyCode::Down => app.select_next(page),
            KeyCode::Backspace => app.pop_char(),
            KeyCode::Char(c) => app.push_char(c),
            _ => {}
        }
    }
    Ok(())
}
