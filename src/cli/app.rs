use anyhow::Result;
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::cli::controller::{Controller, Effect};
use crate::cli::events::{self, AppEvent, EventReceiver, EventSender};
use crate::cli::launch::LaunchUrl;
use crate::cli::state::Screen;
use crate::cli::ui;
use crate::clients::HttpApiClient;
use crate::config::Config;
use crate::formatter::CurrencyFormatter;
use crate::session::{FileAccountStore, SessionContext};

pub struct App {
    pub controller: Controller,
    pub config: Config,
    pub should_quit: bool,
    pub last_ctrl_c: Option<Instant>,
    money: CurrencyFormatter,
    tx: EventSender,
    rx: EventReceiver,
}

impl App {
    pub fn new(config: Config, launch_url: Option<&str>) -> Result<Self> {
        let api = Arc::new(HttpApiClient::new(&config)?);
        let store = Arc::new(FileAccountStore::new(&config.state_file));
        let session = SessionContext::new(api, store);

        let location = match launch_url {
            Some(raw) => LaunchUrl::parse(raw)?,
            None => LaunchUrl::default(),
        };

        let (tx, rx) = events::channel();
        let controller = Controller::new(session, location, tx.clone(), config.callback_fallback);

        Ok(Self {
            controller,
            money: CurrencyFormatter::new(config.locale),
            config,
            should_quit: false,
            last_ctrl_c: None,
            tx,
            rx,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        // Clear screen and enter alternate screen
        let mut stdout = io::stdout();
        execute!(stdout, Clear(ClearType::All), EnterAlternateScreen)?;

        enable_raw_mode()?;

        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let res = self.run_app(&mut terminal).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            Clear(ClearType::All)
        )?;
        terminal.show_cursor()?;

        res
    }

    async fn run_app<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        info!(api = %self.config.api_url, "starting dashboard");
        events::spawn_input_reader(self.tx.clone());

        let effect = self.controller.mount();
        info!(location = self.controller.location().as_str(), "routed launch location");
        self.execute(terminal, effect).await?;

        while !self.should_quit {
            self.draw(terminal)?;

            let Some(event) = self.rx.recv().await else {
                break;
            };
            let effect = match event {
                AppEvent::Input(key) => self.handle_key(key),
                AppEvent::Resize => Effect::None,
                other => self.controller.handle_event(other),
            };
            self.execute(terminal, effect).await?;
        }

        Ok(())
    }

    fn draw<B: ratatui::backend::Backend>(&self, terminal: &mut Terminal<B>) -> Result<()> {
        terminal.draw(|f| ui::render(f, self.controller.state(), &self.money))?;
        Ok(())
    }

    /// Run an effect chain to completion, redrawing before each await so
    /// the screen shows what is in flight.
    async fn execute<B: ratatui::backend::Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        mut effect: Effect,
    ) -> Result<()> {
        loop {
            effect = match effect {
                Effect::None => return Ok(()),
                Effect::OpenBrowser(url) => {
                    if let Err(e) = open::that(&url) {
                        warn!(error = %e, "could not open browser");
                        self.controller.browser_failed(&e.to_string());
                    }
                    Effect::None
                }
                Effect::Schedule { after, event } => {
                    events::schedule(after, event, self.tx.clone());
                    Effect::None
                }
                pending => {
                    self.draw(terminal)?;

                    let mut deferred = Vec::new();
                    let finished = tokio::select! {
                        next = self.controller.run(pending) => Some(next),
                        _ = wait_for_quit(&mut self.rx, &mut deferred) => None,
                    };
                    for event in deferred {
                        let _ = self.tx.send(event);
                    }

                    match finished {
                        Some(next) => next,
                        None => {
                            info!("quit while a request was in flight");
                            self.should_quit = true;
                            Effect::None
                        }
                    }
                }
            };
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Effect {
        // Handle Ctrl+C for graceful exit
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            let now = Instant::now();
            if let Some(last_ctrl_c) = self.last_ctrl_c {
                if now.duration_since(last_ctrl_c).as_secs() < 2 {
                    self.should_quit = true;
                    return Effect::None;
                }
            }
            self.last_ctrl_c = Some(now);
            self.controller.log("Press Ctrl+C again within 2 seconds to exit");
            return Effect::None;
        }

        if self.controller.state().show_help {
            if matches!(key.code, KeyCode::Char('h') | KeyCode::Esc) {
                self.controller.close_help();
            }
            return Effect::None;
        }

        // Paste mode takes every key until submitted or cancelled
        if self.controller.is_pasting() {
            match key.code {
                KeyCode::Esc => self.controller.cancel_paste(),
                KeyCode::Enter => return self.controller.submit_paste(),
                KeyCode::Backspace => self.controller.paste_backspace(),
                KeyCode::Char(c) => self.controller.paste_char(c),
                _ => {}
            }
            return Effect::None;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                return Effect::None;
            }
            KeyCode::Char('h') => {
                self.controller.toggle_help();
                return Effect::None;
            }
            _ => {}
        }

        match self.controller.screen() {
            Screen::Pin(_) => match key.code {
                KeyCode::Char(c) if c.is_ascii_digit() => self.controller.press_digit(c),
                KeyCode::Backspace | KeyCode::Delete => {
                    self.controller.delete_digit();
                    Effect::None
                }
                KeyCode::Up => {
                    self.controller.move_cursor(-1, 0);
                    Effect::None
                }
                KeyCode::Down => {
                    self.controller.move_cursor(1, 0);
                    Effect::None
                }
                KeyCode::Left => {
                    self.controller.move_cursor(0, -1);
                    Effect::None
                }
                KeyCode::Right => {
                    self.controller.move_cursor(0, 1);
                    Effect::None
                }
                KeyCode::Enter => self.controller.press_selected_key(),
                _ => Effect::None,
            },
            Screen::Connect(_) => match key.code {
                KeyCode::Enter | KeyCode::Char('c') => self.controller.request_auth(),
                KeyCode::Char('r') => {
                    self.controller.retry_auth();
                    Effect::None
                }
                KeyCode::Char('p') => {
                    self.controller.begin_paste();
                    Effect::None
                }
                _ => Effect::None,
            },
            Screen::Dashboard(_) => match key.code {
                KeyCode::Char('r') => self.controller.request_refresh(),
                _ => Effect::None,
            },
            Screen::Loading | Screen::Callback(_) => Effect::None,
        }
    }
}

fn is_quit_key(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        KeyCode::Char('q') | KeyCode::Esc => true,
        _ => false,
    }
}

/// Resolves on a quit key while a request is in flight. Everything else
/// is collected into `deferred` for replay once the request settles.
async fn wait_for_quit(rx: &mut EventReceiver, deferred: &mut Vec<AppEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            AppEvent::Input(key) if is_quit_key(&key) => return,
            other => deferred.push(other),
        }
    }
    // Channel closed; let the request finish
    std::future::pending::<()>().await
}
