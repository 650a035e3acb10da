//! Recurring fetch of the current reading into a bounded history.
//!
//! The timer runs in its own task. Each tick spawns its fetch into a `JoinSet`
//! owned by that task, so a slow request never delays the next tick and results
//! land in completion order. History lives with whichever task applies results
//! and is published to observers through a `watch` channel.

mod history;

pub use history::{HISTORY_CAPACITY, History};

use std::sync::Arc;
use std::time::Duration;

use aquario_client::{RawReading, RemoteClient, RemoteError};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::MonitorCfg;
use crate::io::{Operation, ReportSink};
use crate::types::{PollSnapshot, PollState, Sample};

type Fetch = Result<RawReading, RemoteError>;

/// Poller knobs.
#[derive(Debug, Clone, Copy)]
pub struct PollerOptions {
    pub interval: Duration,
    pub capacity: usize,
    /// Apply fetches still in flight at `stop()` instead of discarding them.
    pub accept_late_samples: bool,
}

impl PollerOptions {
    pub fn from_cfg(cfg: &MonitorCfg) -> Self {
        Self {
            interval: cfg.poll_interval(),
            capacity: cfg.history_capacity,
            accept_late_samples: cfg.accept_late_samples,
        }
    }
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self::from_cfg(&MonitorCfg::default())
    }
}

/// History and counters, moved into the task that applies fetch results.
struct Feed {
    history: History,
    ticks: u64,
    appended: u64,
    failures: u64,
    tx: watch::Sender<PollSnapshot>,
    sink: ReportSink,
}

impl Feed {
    fn publish(&self) {
        self.tx.send_replace(PollSnapshot {
            samples: self.history.to_vec(),
            ticks: self.ticks,
            appended: self.appended,
            failures: self.failures,
        });
    }

    fn apply(&mut self, fetched: Fetch) {
        match fetched {
            Ok(raw) => {
                let sample = Sample::from_reading(&raw);
                let evicted = self.history.push(sample);
                self.appended += 1;
                tracing::debug!(
                    temperature = sample.temperature,
                    heater_on = sample.heater_on,
                    observed_at = %sample.observed_at,
                    evicted = evicted.is_some(),
                    "sample appended"
                );
            }
            Err(e) => {
                self.failures += 1;
                self.sink.failure(Operation::FetchSample, &e);
            }
        }
        self.publish();
    }

    fn settle(&mut self, joined: Result<Fetch, JoinError>) {
        match joined {
            Ok(fetched) => self.apply(fetched),
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                self.failures += 1;
                tracing::error!(error = %e, "fetch task panicked");
                self.publish();
            }
        }
    }
}

/// Keeps history as a live, bounded window onto the remote sensor.
///
/// `Idle → Running → Stopped`. Stopped is terminal.
pub struct SamplePoller {
    client: Arc<dyn RemoteClient>,
    options: PollerOptions,
    state: PollState,
    cancel: CancellationToken,
    feed: Option<Feed>,
    rx: watch::Receiver<PollSnapshot>,
    timer: Option<JoinHandle<(Feed, JoinSet<Fetch>)>>,
    drain: Option<JoinHandle<()>>,
}

impl SamplePoller {
    pub fn new(client: Arc<dyn RemoteClient>, options: PollerOptions, sink: ReportSink) -> Self {
        let (tx, rx) = watch::channel(PollSnapshot::default());
        let feed = Feed {
            history: History::new(options.capacity),
            ticks: 0,
            appended: 0,
            failures: 0,
            tx,
            sink,
        };
        Self {
            client,
            options,
            state: PollState::Idle,
            cancel: CancellationToken::new(),
            feed: Some(feed),
            rx,
            timer: None,
            drain: None,
        }
    }

    /// Fetch immediately, then every `interval`. No-op unless idle.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) {
        match self.state {
            PollState::Idle => {}
            PollState::Running => {
                tracing::debug!("sample poller already running");
                return;
            }
            PollState::Stopped => {
                tracing::warn!("sample poller was stopped, start ignored");
                return;
            }
        }
        let Some(feed) = self.feed.take() else {
            return;
        };

        self.timer = Some(tokio::spawn(run_timer(
            Arc::clone(&self.client),
            self.options.interval,
            self.cancel.clone(),
            feed,
        )));
        self.state = PollState::Running;
        tracing::info!(
            client = self.client.name(),
            interval_ms = self.options.interval.as_millis() as u64,
            capacity = self.options.capacity,
            "sample poller started"
        );
    }

    /// Disarm the timer. Once this returns no new fetch will be issued.
    ///
    /// Fetches already in flight either still land in history or are aborted,
    /// depending on `accept_late_samples`.
    pub async fn stop(&mut self) {
        if self.state == PollState::Stopped {
            return;
        }
        self.state = PollState::Stopped;
        self.cancel.cancel();

        let Some(timer) = self.timer.take() else {
            return;
        };
        let (feed, in_flight) = match timer.await {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!(error = %e, "poller timer task failed");
                return;
            }
        };

        let pending = in_flight.len();
        if pending == 0 {
            tracing::info!(ticks = feed.ticks, "sample poller stopped");
        } else if self.options.accept_late_samples {
            tracing::info!(ticks = feed.ticks, pending, "sample poller stopped, in-flight fetches may still land");
            self.drain = Some(tokio::spawn(drain(feed, in_flight)));
        } else {
            tracing::info!(ticks = feed.ticks, pending, "sample poller stopped, in-flight fetches discarded");
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Current history, oldest first.
    pub fn history(&self) -> Vec<Sample> {
        self.rx.borrow().samples.clone()
    }

    pub fn snapshot(&self) -> PollSnapshot {
        self.rx.borrow().clone()
    }

    /// Watch every history change.
    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.rx.clone()
    }
}

impl Drop for SamplePoller {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(drain) = &self.drain {
            drain.abort();
        }
    }
}

async fn run_timer(
    client: Arc<dyn RemoteClient>,
    interval: Duration,
    cancel: CancellationToken,
    mut feed: Feed,
) -> (Feed, JoinSet<Fetch>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight: JoinSet<Fetch> = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(joined) = in_flight.join_next() => feed.settle(joined),
            _ = ticker.tick() => {
                feed.ticks += 1;
                // the call is made here, on the timer, so stop() bounds it
                let fetch = client.get_current_sample();
                let span = tracing::debug_span!("tick", n = feed.ticks);
                in_flight.spawn(fetch.instrument(span));
                feed.publish();
            }
        }
    }
    (feed, in_flight)
}

async fn drain(mut feed: Feed, mut in_flight: JoinSet<Fetch>) {
    while let Some(joined) = in_flight.join_next().await {
        feed.settle(joined);
    }
}
