// Terminal dashboard - Periodic redraw loop, runs on a blocking thread
use crate::domain::link::LinkStatus;
use crate::domain::sample::{Sample, SampleBuffer};
use crate::infrastructure::config::DisplayConfig;
use crate::presentation::chart_view::{self, FrameData};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use std::io;
use std::panic::PanicHookInfo;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

const INPUT_POLL: Duration = Duration::from_millis(50);

type PanicHook = dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static;

/// Run `body` with a panic hook that restores the terminal before the
/// previous hook prints the message. The previous hook is reinstated after.
fn with_terminal_restore_hook<T>(body: impl FnOnce() -> T) -> T {
    let previous: Arc<PanicHook> = Arc::from(std::panic::take_hook());
    let chained = Arc::clone(&previous);
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
        chained(info);
    }));

    let result = body();

    std::panic::set_hook(Box::new(move |info| previous(info)));
    result
}

pub struct Dashboard {
    buffer: Arc<SampleBuffer>,
    status: watch::Receiver<LinkStatus>,
    display: DisplayConfig,
    redraw_interval: Duration,
    samples: Vec<Sample>,
    link: LinkStatus,
    running: bool,
}

impl Dashboard {
    pub fn new(
        buffer: Arc<SampleBuffer>,
        status: watch::Receiver<LinkStatus>,
        display: DisplayConfig,
        redraw_interval: Duration,
    ) -> Self {
        Self {
            buffer,
            status,
            display,
            redraw_interval,
            samples: Vec::new(),
            link: LinkStatus::default(),
            running: true,
        }
    }

    /// Take over the terminal until the user closes the display.
    pub fn run(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = with_terminal_restore_hook(|| self.run_loop(&mut terminal));

        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            crossterm::cursor::Show
        )?;

        result
    }

    fn run_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
        self.refresh();
        let mut last_refresh = Instant::now();
        let mut dirty = true;

        while self.running {
            if dirty {
                let data = FrameData {
                    display: &self.display,
                    status: &self.link,
                    samples: &self.samples,
                    capacity: self.buffer.capacity(),
                };
                terminal.draw(|f| chart_view::draw(f, &data))?;
                dirty = false;
            }

            if event::poll(INPUT_POLL)? {
                match event::read()? {
                    Event::Key(key) => self.handle_key(key),
                    Event::Resize(_, _) => dirty = true,
                    _ => {}
                }
            }

            if last_refresh.elapsed() >= self.redraw_interval {
                self.refresh();
                last_refresh = Instant::now();
                dirty = true;
            }
        }

        Ok(())
    }

    fn refresh(&mut self) {
        self.samples = self.buffer.snapshot();
        self.link = self.status.borrow().clone();
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.running = false
            }
            _ => {}
        }
    }
}
