use std::io;
use std::sync::Arc;

use aquario_core::config::MonitorCfg;
use aquario_core::io::{Notice, NoticeReceiver};
use aquario_core::runtime::Monitor;
use aquario_core::settings::SettingsController;
use aquario_core::types::{PollSnapshot, Sample, SampleRow, TemperatureBounds};
use rustyline::ExternalPrinter;
use rustyline::error::ReadlineError;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
commands:
  min <°C>            set the minimum bound locally
  max <°C>            set the maximum bound locally
  bounds <min> <max>  set both bounds locally
  save                write the current bounds to the controller
  show [json]         print the sample history
  status              poll counters and current bounds
  config [json]       effective configuration
  quit                exit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().compact().with_writer(io::stderr))
        .init();

    let cfg = Arc::new(MonitorCfg::from_env());
    let (mut monitor, notices) = Monitor::connect(Arc::clone(&cfg))?;
    let token = monitor.token();
    spawn_sigint_canceler(token.clone());

    let console = Console {
        cfg,
        settings: monitor.settings().clone(),
        feed: monitor.subscribe(),
    };

    let runtime_fut = monitor.run();
    let repl_fut = run_repl(console, notices, token.clone());
    tokio::pin!(runtime_fut);
    tokio::pin!(repl_fut);

    tokio::select! {
        _ = &mut runtime_fut => {
            token.cancel();
            (&mut repl_fut).await
        }
        result = &mut repl_fut => {
            token.cancel();
            (&mut runtime_fut).await;
            result
        }
    }
}

/// What the console needs from the running monitor.
struct Console {
    cfg: Arc<MonitorCfg>,
    settings: SettingsController,
    feed: watch::Receiver<PollSnapshot>,
}

/// Operator command parsed from one input line.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Min(f64),
    Max(f64),
    Bounds(f64, f64),
    Save,
    /// `true` prints JSON.
    Show(bool),
    Status,
    Config(bool),
    Help,
    Quit,
}

fn parse_number(word: Option<&str>, what: &str) -> Result<f64, String> {
    let word = word.ok_or_else(|| format!("missing {what}"))?;
    word.replace(',', ".")
        .parse::<f64>()
        .map_err(|_| format!("not a number: {word}"))
}

fn parse_json_flag(word: Option<&str>) -> Result<bool, String> {
    match word {
        None => Ok(false),
        Some(w) if w.eq_ignore_ascii_case("json") => Ok(true),
        Some(other) => Err(format!("unexpected argument: {other}")),
    }
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Err("empty command".into());
    };
    let cmd = match head.to_ascii_lowercase().as_str() {
        "min" => Command::Min(parse_number(words.next(), "minimum")?),
        "max" => Command::Max(parse_number(words.next(), "maximum")?),
        "bounds" => {
            let min = parse_number(words.next(), "minimum")?;
            let max = parse_number(words.next(), "maximum")?;
            Command::Bounds(min, max)
        }
        "save" => Command::Save,
        "show" | "history" => Command::Show(parse_json_flag(words.next())?),
        "status" => Command::Status,
        "config" => Command::Config(parse_json_flag(words.next())?),
        "help" | "?" => Command::Help,
        "quit" | "exit" | "/q" => Command::Quit,
        other => return Err(format!("unknown command: {other} (try `help`)")),
    };
    if let Some(extra) = words.next() {
        return Err(format!("unexpected argument: {extra}"));
    }
    Ok(cmd)
}

fn format_sample(s: &Sample) -> String {
    let row = s.row();
    let heater = if row.status_aquecedor { "on" } else { "off" };
    format!("{}  {:>5.1} °C  heater {heater}", row.time, row.temperature)
}

fn format_notice(n: &Notice) -> String {
    if n.is_error() {
        format!("! {}", n.content)
    } else {
        format!("✓ {}", n.content)
    }
}

/// Prints through rustyline's external printer so async output does not
/// garble the prompt. Falls back to stdout.
struct Out {
    printer: Option<Box<dyn ExternalPrinter + Send>>,
}

impl Out {
    fn line(&mut self, text: impl Into<String>) {
        let text = text.into();
        if let Some(printer) = self.printer.as_mut() {
            if printer.print(text.clone()).is_ok() {
                return;
            }
            self.printer = None;
        }
        println!("{text}");
    }
}

async fn run_repl(
    mut console: Console,
    mut notices: NoticeReceiver,
    token: CancellationToken,
) -> anyhow::Result<()> {
    let (line_tx, mut line_rx) = mpsc::unbounded_channel::<InputEvent>();
    let (printer_tx, printer_rx) = oneshot::channel();
    spawn_input_thread(line_tx, printer_tx);
    let mut out = Out {
        printer: printer_rx.await.ok().flatten(),
    };

    out.line(format!(
        "aquario: polling {} every {} ms (type `help`)",
        console.cfg.base_url, console.cfg.poll_interval_ms
    ));

    let mut printed = console.feed.borrow_and_update().appended;
    let mut feed_open = true;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            event = line_rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                match event {
                    InputEvent::Line(line) => {
                        let text = line.trim();
                        if text.is_empty() {
                            continue;
                        }
                        match parse_command(text) {
                            Ok(Command::Quit) => break,
                            Ok(cmd) => handle_command(cmd, &console, &mut out),
                            Err(e) => out.line(e),
                        }
                    }
                    InputEvent::Interrupted => {
                        token.cancel();
                        break;
                    }
                    InputEvent::Eof => break,
                    InputEvent::Error(err) => {
                        eprintln!("input error: {err}");
                        break;
                    }
                }
            }
            Some(notice) = notices.recv() => out.line(format_notice(&notice)),
            changed = console.feed.changed(), if feed_open => {
                if changed.is_err() {
                    feed_open = false;
                    continue;
                }
                let snap = console.feed.borrow_and_update().clone();
                let fresh = (snap.appended.saturating_sub(printed) as usize).min(snap.samples.len());
                for s in &snap.samples[snap.samples.len() - fresh..] {
                    out.line(format_sample(s));
                }
                printed = snap.appended;
            }
        }
    }
    Ok(())
}

fn handle_command(cmd: Command, console: &Console, out: &mut Out) {
    let settings = &console.settings;
    let edited = match cmd {
        Command::Min(v) => Some(settings.set_min(v)),
        Command::Max(v) => Some(settings.set_max(v)),
        Command::Bounds(min, max) => Some(settings.update_bounds(TemperatureBounds::new(min, max))),
        Command::Save => {
            out.line(format!("saving {}…", settings.bounds()));
            tokio::spawn(settings.save());
            None
        }
        Command::Show(true) => {
            let rows: Vec<SampleRow> = console.feed.borrow().samples.iter().map(Sample::row).collect();
            out.line(to_json(&rows));
            None
        }
        Command::Show(false) => {
            let snap = console.feed.borrow().clone();
            if snap.samples.is_empty() {
                out.line("no samples yet");
            }
            for s in &snap.samples {
                out.line(format_sample(s));
            }
            None
        }
        Command::Status => {
            let snap = console.feed.borrow().clone();
            out.line(format!(
                "bounds {}  |  ticks {}  samples {}/{}  failures {}",
                settings.bounds(),
                snap.ticks,
                snap.samples.len(),
                console.cfg.history_capacity,
                snap.failures
            ));
            None
        }
        Command::Config(true) => {
            out.line(to_json(&*console.cfg));
            None
        }
        Command::Config(false) => {
            for (key, value, desc) in console.cfg.to_entries() {
                out.line(format!("{key:<22} {value:<24} {desc}"));
            }
            None
        }
        Command::Help => {
            out.line(HELP);
            None
        }
        Command::Quit => None,
    };

    match edited {
        Some(Ok(())) => {
            let bounds = settings.bounds();
            out.line(format!("bounds {bounds} (not saved)"));
            if !bounds.is_ordered() {
                out.line("warning: minimum is above maximum");
            }
        }
        Some(Err(e)) => out.line(e.to_string()),
        None => {}
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("json error: {e}"))
}

fn spawn_input_thread(
    line_tx: mpsc::UnboundedSender<InputEvent>,
    printer_tx: oneshot::Sender<Option<Box<dyn ExternalPrinter + Send>>>,
) {
    std::thread::spawn(move || {
        let mut editor = match rustyline::DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                let _ = printer_tx.send(None);
                let _ = line_tx.send(InputEvent::Error(e.to_string()));
                return;
            }
        };
        let printer = editor
            .create_external_printer()
            .ok()
            .map(|p| Box::new(p) as Box<dyn ExternalPrinter + Send>);
        let _ = printer_tx.send(printer);

        loop {
            match editor.readline("aquario> ") {
                Ok(line) => {
                    let _ = editor.add_history_entry(line.as_str());
                    if line_tx.send(InputEvent::Line(line)).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    let _ = line_tx.send(InputEvent::Interrupted);
                    break;
                }
                Err(ReadlineError::Eof) => {
                    let _ = line_tx.send(InputEvent::Eof);
                    break;
                }
                Err(e) => {
                    let _ = line_tx.send(InputEvent::Error(e.to_string()));
                    break;
                }
            }
        }
    });
}

enum InputEvent {
    Line(String),
    Interrupted,
    Eof,
    Error(String),
}

fn spawn_sigint_canceler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
}
