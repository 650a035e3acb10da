use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::fmt;

pub use aquario_client::{RawReading, TemperatureBounds};

// ── Samples ─────────────────────────────────────────────────────

/// One sensor reading plus heater status, as kept in history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Sensor-side timestamp. Never the local clock.
    pub observed_at: DateTime<Utc>,
    pub temperature: f64,
    pub heater_on: bool,
}

impl Sample {
    pub fn from_reading(raw: &RawReading) -> Self {
        Self {
            observed_at: raw.horario,
            temperature: raw.temperatura,
            heater_on: raw.status_aquecedor,
        }
    }

    /// Projection consumed by the chart and table.
    pub fn row(&self) -> SampleRow {
        SampleRow {
            time: self.observed_at.with_timezone(&Local).format("%H:%M:%S").to_string(),
            temperature: self.temperature,
            status_aquecedor: self.heater_on,
        }
    }
}

impl From<RawReading> for Sample {
    fn from(raw: RawReading) -> Self {
        Self::from_reading(&raw)
    }
}

/// Display form of a sample: local wall-clock time, temperature, heater flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleRow {
    pub time: String,
    pub temperature: f64,
    pub status_aquecedor: bool,
}

// ── Poller state ────────────────────────────────────────────────

/// Lifecycle of the sample poller. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollState {
    #[default]
    Idle,
    Running,
    Stopped,
}

impl PollState {
    /// A timer is armed only while running.
    pub fn timer_armed(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
        })
    }
}

/// What observers of the poller receive after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollSnapshot {
    /// History contents, oldest first.
    pub samples: Vec<Sample>,
    /// Fetches issued by the timer.
    pub ticks: u64,
    /// Successful fetches appended to history.
    pub appended: u64,
    /// Failed fetches.
    pub failures: u64,
}

impl PollSnapshot {
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.last()
    }
}

// ── Bounds editing ──────────────────────────────────────────────

/// Rejected operator input.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum BoundsError {
    #[error("minimum temperature must be a finite number, got {0}")]
    MinNotFinite(f64),
    #[error("maximum temperature must be a finite number, got {0}")]
    MaxNotFinite(f64),
}

/// Check the finite-values invariant. Ordering is left to the caller.
pub fn validate_bounds(bounds: TemperatureBounds) -> Result<TemperatureBounds, BoundsError> {
    if !bounds.min.is_finite() {
        return Err(BoundsError::MinNotFinite(bounds.min));
    }
    if !bounds.max.is_finite() {
        return Err(BoundsError::MaxNotFinite(bounds.max));
    }
    Ok(bounds)
}
