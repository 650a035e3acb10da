use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyModifiers};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use aquario_core::io::{Notice, NoticeReceiver};
use aquario_core::settings::SettingsController;
use aquario_core::types::{PollSnapshot, TemperatureBounds};
use aquario_client::Ack;

use crate::event::AppEvent;
use crate::widgets;

/// Notices kept on screen.
pub const NOTICE_LINES: usize = 3;

/// Which bound the editor is focused on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Min,
    Max,
}

impl Field {
    fn other(self) -> Self {
        match self {
            Self::Min => Self::Max,
            Self::Max => Self::Min,
        }
    }
}

/// Dashboard state.
pub struct App {
    pub feed: PollSnapshot,
    pub capacity: usize,
    pub bounds: TemperatureBounds,
    pub focus: Field,
    pub min_input: String,
    pub max_input: String,
    pub notices: VecDeque<Notice>,
    /// Saves spawned but not yet answered.
    saves: JoinSet<Option<Ack>>,
    pub anim_frame: usize,
    pub endpoint: String,
    pub should_exit: bool,
}

impl App {
    pub fn new(bounds: TemperatureBounds, capacity: usize, endpoint: String) -> Self {
        Self {
            feed: PollSnapshot::default(),
            capacity,
            bounds,
            focus: Field::Min,
            min_input: format_bound(bounds.min),
            max_input: format_bound(bounds.max),
            notices: VecDeque::with_capacity(NOTICE_LINES + 1),
            saves: JoinSet::new(),
            anim_frame: 0,
            endpoint,
            should_exit: false,
        }
    }

    pub fn input(&self, field: Field) -> &str {
        match field {
            Field::Min => &self.min_input,
            Field::Max => &self.max_input,
        }
    }

    fn input_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Min => &mut self.min_input,
            Field::Max => &mut self.max_input,
        }
    }

    /// Value typed into `field`, if it reads as a finite number.
    pub fn parsed(&self, field: Field) -> Option<f64> {
        parse_bound(self.input(field))
    }

    fn focus_next(&mut self) {
        self.focus = self.focus.other();
    }

    /// Bounds the focused input asks for, if it parses.
    fn edited_bounds(&self) -> Option<TemperatureBounds> {
        let value = self.parsed(self.focus)?;
        Some(match self.focus {
            Field::Min => TemperatureBounds { min: value, ..self.bounds },
            Field::Max => TemperatureBounds { max: value, ..self.bounds },
        })
    }

    /// Type into the focused field. Anything but a number character is ignored.
    fn insert_char(&mut self, c: char) -> Option<TemperatureBounds> {
        if !(c.is_ascii_digit() || matches!(c, '.' | ',' | '-')) {
            return None;
        }
        let focus = self.focus;
        self.input_mut(focus).push(c);
        self.edited_bounds()
    }

    fn delete_char(&mut self) -> Option<TemperatureBounds> {
        let focus = self.focus;
        self.input_mut(focus).pop()?;
        self.edited_bounds()
    }

    /// Drop half-typed input and show the bounds as they stand.
    fn commit(&mut self) {
        self.min_input = format_bound(self.bounds.min);
        self.max_input = format_bound(self.bounds.max);
    }

    /// Adopt new bounds. An input that already reads as the new value is left
    /// alone so live typing is not reformatted under the cursor.
    pub fn sync_bounds(&mut self, bounds: TemperatureBounds) {
        self.bounds = bounds;
        if self.parsed(Field::Min) != Some(bounds.min) {
            self.min_input = format_bound(bounds.min);
        }
        if self.parsed(Field::Max) != Some(bounds.max) {
            self.max_input = format_bound(bounds.max);
        }
    }

    pub fn saving(&self) -> usize {
        self.saves.len()
    }

    fn start_save(&mut self, save: impl Future<Output = Option<Ack>> + Send + 'static) {
        self.saves.spawn(save);
    }

    /// A save finished. Its outcome reaches the operator as a notice.
    fn finish_save(&mut self, joined: Result<Option<Ack>, JoinError>) {
        if let Err(e) = joined {
            tracing::warn!(error = %e, "save task failed");
        }
    }

    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push_back(notice);
        while self.notices.len() > NOTICE_LINES {
            self.notices.pop_front();
        }
    }
}

fn parse_bound(text: &str) -> Option<f64> {
    text.trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn format_bound(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// Run the dashboard. Returns when the operator quits or `token` is cancelled.
pub async fn run_app(
    settings: SettingsController,
    mut feed_rx: watch::Receiver<PollSnapshot>,
    mut notices: NoticeReceiver,
    token: CancellationToken,
    endpoint: String,
    capacity: usize,
) -> anyhow::Result<()> {
    terminal::enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let stop = Arc::new(AtomicBool::new(false));
    let mut event_rx = crate::event::spawn(stop.clone());

    let mut bounds_rx = settings.subscribe();
    let mut app = App::new(*bounds_rx.borrow_and_update(), capacity, endpoint);
    app.feed = feed_rx.borrow_and_update().clone();

    let mut anim_interval = tokio::time::interval(std::time::Duration::from_millis(80));
    anim_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    terminal.draw(|f| widgets::draw(f, &app))?;

    loop {
        if app.should_exit {
            break;
        }
        tokio::select! {
            _ = token.cancelled() => {
                break;
            }
            evt = event_rx.recv() => {
                let Some(evt) = evt else { break };
                match evt {
                    AppEvent::Key(key) => handle_key(&mut app, key, &settings),
                    AppEvent::Resize => {}
                }
            }
            Some(notice) = notices.recv() => {
                app.push_notice(notice);
            }
            Ok(()) = bounds_rx.changed() => {
                app.sync_bounds(*bounds_rx.borrow_and_update());
            }
            Some(joined) = app.saves.join_next() => {
                app.finish_save(joined);
            }
            Ok(()) = feed_rx.changed() => {
                app.feed = feed_rx.borrow_and_update().clone();
            }
            _ = anim_interval.tick() => {
                if app.saving() > 0 {
                    app.anim_frame = app.anim_frame.wrapping_add(1);
                }
            }
        }
        terminal.draw(|f| widgets::draw(f, &app))?;
    }

    stop.store(true, Ordering::Relaxed);
    terminal::disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}

fn apply(settings: &SettingsController, bounds: Option<TemperatureBounds>) {
    let Some(bounds) = bounds else { return };
    if let Err(e) = settings.update_bounds(bounds) {
        tracing::warn!(error = %e, "bounds edit rejected");
    }
}

fn handle_key(app: &mut App, key: crossterm::event::KeyEvent, settings: &SettingsController) {
    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) | (_, KeyCode::Esc) | (_, KeyCode::Char('q')) => {
            app.should_exit = true;
        }
        (_, KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down) => {
            app.focus_next();
        }
        (_, KeyCode::Enter) => {
            apply(settings, app.edited_bounds());
            app.commit();
        }
        (_, KeyCode::Backspace) => {
            let edited = app.delete_char();
            apply(settings, edited);
        }
        (_, KeyCode::Char('s')) => {
            app.start_save(settings.save());
        }
        (_, KeyCode::Char(c)) => {
            let edited = app.insert_char(c);
            apply(settings, edited);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquario_client::{MockRemoteClient, RemoteClient};
    use aquario_core::io::{notice, Operation, ReportSink};

    fn app() -> App {
        App::new(TemperatureBounds::new(22.0, 28.0), 20, "http://localhost:3000".into())
    }

    fn type_str(app: &mut App, text: &str) -> Option<TemperatureBounds> {
        text.chars().fold(None, |_, c| app.insert_char(c))
    }

    #[test]
    fn starts_from_bounds() {
        let app = app();
        assert_eq!(app.input(Field::Min), "22");
        assert_eq!(app.input(Field::Max), "28");
        assert_eq!(app.focus, Field::Min);
    }

    #[test]
    fn typing_edits_focused_field_live() {
        let mut app = app();
        app.delete_char();
        app.delete_char();
        assert_eq!(type_str(&mut app, "20,5"), Some(TemperatureBounds::new(20.5, 28.0)));

        app.focus_next();
        app.delete_char();
        assert_eq!(app.delete_char(), None, "empty input is not a number");
        assert_eq!(type_str(&mut app, "26"), Some(TemperatureBounds::new(22.0, 26.0)));
    }

    #[test]
    fn ignores_non_numeric_keys() {
        let mut app = app();
        assert_eq!(app.insert_char('x'), None);
        assert_eq!(app.input(Field::Min), "22");
    }

    #[test]
    fn sync_leaves_matching_input_alone() {
        let mut app = app();
        app.delete_char();
        app.delete_char();
        type_str(&mut app, "21.0");
        app.sync_bounds(TemperatureBounds::new(21.0, 28.0));
        assert_eq!(app.input(Field::Min), "21.0");

        app.sync_bounds(TemperatureBounds::new(20.0, 26.5));
        assert_eq!(app.input(Field::Min), "20");
        assert_eq!(app.input(Field::Max), "26.5");
    }

    #[test]
    fn commit_discards_partial_input() {
        let mut app = app();
        app.delete_char();
        app.delete_char();
        app.insert_char('-');
        assert_eq!(app.parsed(Field::Min), None);
        app.commit();
        assert_eq!(app.input(Field::Min), "22");
    }

    #[test]
    fn notice_panel_keeps_newest() {
        let mut app = app();
        for i in 0..5 {
            app.push_notice(Notice::error(Operation::FetchSample, format!("fetch {i} failed")));
        }
        assert_eq!(app.notices.len(), NOTICE_LINES);
        assert_eq!(app.notices.back().map(|n| n.content.as_str()), Some("fetch 4 failed"));
    }

    #[tokio::test]
    async fn save_clears_even_when_its_notice_is_dropped() {
        let mock = Arc::new(MockRemoteClient::new());
        let (tx, mut rx) = notice::channel(1);
        tx.try_send(Notice::error(Operation::FetchSample, "fetch sample failed")).unwrap();
        let settings = SettingsController::new(
            Arc::clone(&mock) as Arc<dyn RemoteClient>,
            TemperatureBounds::default(),
            ReportSink::new(tx),
        );

        let mut app = app();
        app.start_save(settings.save());
        assert_eq!(app.saving(), 1);
        let joined = app.saves.join_next().await.unwrap();
        app.finish_save(joined);

        assert_eq!(app.saving(), 0);
        assert_eq!(mock.written(), vec![TemperatureBounds::default()]);
        assert_eq!(rx.try_recv().unwrap().operation, Operation::FetchSample);
        assert!(rx.try_recv().is_err(), "save notice was dropped on the full channel");
    }
}
