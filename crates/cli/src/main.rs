mod event;
mod tui;
mod widgets;

use std::sync::Arc;

use aquario_core::config::MonitorCfg;
use aquario_core::runtime::Monitor;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Panic hook: restore terminal even on panic in raw mode
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = crossterm::terminal::disable_raw_mode();
        let _ = crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen);
        default_hook(info);
    }));

    // Tracing: write to file when RUST_LOG is set (raw mode breaks stderr)
    if std::env::var("RUST_LOG").is_ok() {
        let file = std::fs::File::create(std::env::temp_dir().join("aquario.log"))?;
        tracing_subscriber::registry()
            .with(EnvFilter::from_default_env())
            .with(fmt::layer().json().with_target(true).with_writer(file))
            .init();
    }

    let cfg = Arc::new(MonitorCfg::from_env());
    let (mut monitor, notices) = Monitor::connect(Arc::clone(&cfg))?;
    tracing::info!(base_url = %cfg.base_url, interval_ms = cfg.poll_interval_ms, "dashboard starting");
    let token = monitor.token();
    let settings = monitor.settings().clone();
    let feed_rx = monitor.subscribe();

    // If the dashboard exits first, cancel the monitor and wait for the poller to stop.
    // If the monitor exits first (SIGTERM), cancel the dashboard and wait for terminal cleanup.
    let runtime_fut = monitor.run();
    let tui_fut = tui::run_app(
        settings,
        feed_rx,
        notices,
        token.clone(),
        cfg.base_url.clone(),
        cfg.history_capacity,
    );
    tokio::pin!(runtime_fut);
    tokio::pin!(tui_fut);

    let mut runtime_done = false;
    let mut tui_result: Option<anyhow::Result<()>> = None;

    loop {
        tokio::select! {
            _ = &mut runtime_fut, if !runtime_done => {
                runtime_done = true;
                token.cancel();
                if tui_result.is_none() {
                    tui_result = Some((&mut tui_fut).await);
                }
            }
            result = &mut tui_fut, if tui_result.is_none() => {
                tui_result = Some(result);
                token.cancel();
            }
        }

        if runtime_done && tui_result.is_some() {
            break;
        }
    }

    tui_result.unwrap_or(Ok(()))
}
