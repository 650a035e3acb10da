use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use tokio::sync::mpsc;

/// Terminal events consumed by the dashboard loop.
#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Resize,
}

/// Spawn the crossterm event reader in a dedicated thread.
/// Returns a receiver of `AppEvent`. The thread exits when `stop` is set to true.
pub fn spawn(stop: Arc<AtomicBool>) -> mpsc::UnboundedReceiver<AppEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            // short poll so `stop` is noticed quickly
            if !event::poll(Duration::from_millis(50)).unwrap_or(false) {
                continue;
            }
            let evt = match event::read() {
                // key release events are reported on some platforms; only presses edit
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => AppEvent::Key(key),
                Ok(Event::Resize(..)) => AppEvent::Resize,
                _ => continue,
            };
            if tx.send(evt).is_err() {
                break;
            }
        }
    });
    rx
}
