use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Acceptable temperature range configured by the operator.
///
/// Serializes to the controller's `{minTemperatura, maxTemperatura}` body.
/// No ordering between `min` and `max` is enforced here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureBounds {
    #[serde(rename = "minTemperatura")]
    pub min: f64,
    #[serde(rename = "maxTemperatura")]
    pub max: f64,
}

impl TemperatureBounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Both ends are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// True when `min <= max`. Callers decide whether to enforce it.
    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }

    /// True when `temperature` lies inside the range (inclusive).
    pub fn contains(&self, temperature: f64) -> bool {
        temperature >= self.min && temperature <= self.max
    }
}

impl Default for TemperatureBounds {
    /// Values shown before the controller's settings arrive.
    fn default() -> Self {
        Self::new(22.0, 28.0)
    }
}

impl fmt::Display for TemperatureBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}..{:.1} °C", self.min, self.max)
    }
}

/// Current reading as reported by the sensor, `GET /temperatura/current`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReading {
    /// Sensor-side timestamp of the reading.
    #[serde(deserialize_with = "de_timestamp")]
    pub horario: DateTime<Utc>,
    pub temperatura: f64,
    pub status_aquecedor: bool,
}

impl RawReading {
    pub fn new(horario: DateTime<Utc>, temperatura: f64, status_aquecedor: bool) -> Self {
        Self { horario, temperatura, status_aquecedor }
    }
}

/// Parse the controller's `horario` field.
///
/// Accepts RFC 3339 with any offset. A timestamp without offset is read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn de_timestamp<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(de)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid horario timestamp: {raw:?}")))
}

/// Controller acknowledgment of a settings write. The body is implementation-defined,
/// so it is kept as loose JSON.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ack(pub serde_json::Value);

impl Ack {
    /// Empty body → `null`; non-JSON body → the raw text as a string.
    pub fn from_body(body: &str) -> Self {
        let body = body.trim();
        if body.is_empty() {
            return Self(serde_json::Value::Null);
        }
        Self(
            serde_json::from_str(body)
                .unwrap_or_else(|_| serde_json::Value::String(body.to_owned())),
        )
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            serde_json::Value::Null => f.write_str("ok"),
            serde_json::Value::String(s) => f.write_str(s),
            other => write!(f, "{other}"),
        }
    }
}

/// Any failure talking to the controller. Callers treat every variant the same way;
/// the split only makes log lines more useful.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RemoteError {
    #[error("controller unreachable: {0}")]
    Transport(String),
    #[error("controller returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// Boxed future returned by [`RemoteClient`] operations.
///
/// Owns everything it needs: the call is made when the method runs, and the
/// future can be awaited on any task.
pub type RemoteFuture<T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'static>>;

/// Read/write access to the heater controller.
pub trait RemoteClient: Send + Sync {
    /// Label used in log lines.
    fn name(&self) -> &str;

    fn get_settings(&self) -> RemoteFuture<TemperatureBounds>;

    /// Persist new bounds. Repeating the same call has no further effect.
    fn put_settings(&self, bounds: TemperatureBounds) -> RemoteFuture<Ack>;

    fn get_current_sample(&self) -> RemoteFuture<RawReading>;
}

/// Scripted client for tests. Replays queued results in call order.
///
/// With nothing scripted, `get_settings` and `get_current_sample` fail with a
/// transport error and `put_settings` answers with an empty ack.
#[derive(Debug, Default)]
pub struct MockRemoteClient {
    settings: Mutex<VecDeque<Result<TemperatureBounds, RemoteError>>>,
    writes: Mutex<VecDeque<Result<Ack, RemoteError>>>,
    readings: Mutex<VecDeque<(Duration, Result<RawReading, RemoteError>)>>,
    written: Mutex<Vec<TemperatureBounds>>,
    reading_calls: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockRemoteClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the result of the next `get_settings` call.
    pub fn push_settings(&self, result: Result<TemperatureBounds, RemoteError>) -> &Self {
        lock(&self.settings).push_back(result);
        self
    }

    /// Queue the result of the next `put_settings` call.
    pub fn push_write(&self, result: Result<Ack, RemoteError>) -> &Self {
        lock(&self.writes).push_back(result);
        self
    }

    /// Queue the result of the next `get_current_sample` call.
    pub fn push_reading(&self, result: Result<RawReading, RemoteError>) -> &Self {
        self.push_delayed_reading(Duration::ZERO, result)
    }

    /// Like [`push_reading`](Self::push_reading), but the call only completes after `delay`.
    pub fn push_delayed_reading(
        &self,
        delay: Duration,
        result: Result<RawReading, RemoteError>,
    ) -> &Self {
        lock(&self.readings).push_back((delay, result));
        self
    }

    /// Every body passed to `put_settings`, in call order.
    pub fn written(&self) -> Vec<TemperatureBounds> {
        lock(&self.written).clone()
    }

    /// Number of `get_current_sample` calls issued so far.
    pub fn reading_calls(&self) -> usize {
        self.reading_calls.load(Ordering::SeqCst)
    }

    fn unscripted(op: &str) -> RemoteError {
        RemoteError::Transport(format!("no scripted response for {op}"))
    }
}

impl RemoteClient for MockRemoteClient {
    fn name(&self) -> &str {
        "mock"
    }

    fn get_settings(&self) -> RemoteFuture<TemperatureBounds> {
        let result = lock(&self.settings)
            .pop_front()
            .unwrap_or_else(|| Err(Self::unscripted("get_settings")));
        Box::pin(async move { result })
    }

    fn put_settings(&self, bounds: TemperatureBounds) -> RemoteFuture<Ack> {
        lock(&self.written).push(bounds);
        let result = lock(&self.writes).pop_front().unwrap_or_else(|| Ok(Ack::default()));
        Box::pin(async move { result })
    }

    fn get_current_sample(&self) -> RemoteFuture<RawReading> {
        self.reading_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, result) = lock(&self.readings)
            .pop_front()
            .unwrap_or_else(|| (Duration::ZERO, Err(Self::unscripted("get_current_sample"))));
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bounds_use_controller_field_names() {
        let json = serde_json::to_value(TemperatureBounds::new(21.0, 27.5)).unwrap();
        assert_eq!(json, serde_json::json!({"minTemperatura": 21.0, "maxTemperatura": 27.5}));

        let back: TemperatureBounds =
            serde_json::from_str(r#"{"minTemperatura": 20, "maxTemperatura": 26}"#).unwrap();
        assert_eq!(back, TemperatureBounds::new(20.0, 26.0));
    }

    #[test]
    fn bounds_ordering_is_only_reported() {
        let inverted = TemperatureBounds::new(30.0, 20.0);
        assert!(inverted.is_finite());
        assert!(!inverted.is_ordered());
        assert!(!TemperatureBounds::new(f64::NAN, 20.0).is_finite());
        assert!(TemperatureBounds::default().contains(25.0));
    }

    #[test]
    fn reading_parses_offset_timestamp() {
        let raw: RawReading = serde_json::from_str(
            r#"{"horario": "2024-05-01T12:30:00-03:00", "temperatura": 24.5, "statusAquecedor": true}"#,
        )
        .unwrap();
        assert_eq!(raw.horario, Utc.with_ymd_and_hms(2024, 5, 1, 15, 30, 0).unwrap());
        assert_eq!(raw.temperatura, 24.5);
        assert!(raw.status_aquecedor);
    }

    #[test]
    fn naive_timestamp_is_utc() {
        let ts = parse_timestamp("2024-05-01T12:30:00.250").unwrap();
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(ts, base + chrono::TimeDelta::milliseconds(250));
        assert!(parse_timestamp("2024-05-01 12:30:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn reading_rejects_garbage_timestamp() {
        let err = serde_json::from_str::<RawReading>(
            r#"{"horario": "noon", "temperatura": 24.5, "statusAquecedor": false}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("horario"));
    }

    #[test]
    fn ack_accepts_any_body() {
        assert_eq!(Ack::from_body("").0, serde_json::Value::Null);
        assert_eq!(Ack::from_body("saved").to_string(), "saved");
        let ack = Ack::from_body(r#"{"message": "ok"}"#);
        assert_eq!(ack.0["message"], "ok");
    }

    #[tokio::test]
    async fn mock_replays_script_in_order() {
        let mock = MockRemoteClient::new();
        mock.push_settings(Ok(TemperatureBounds::new(20.0, 26.0)))
            .push_settings(Err(RemoteError::Status { status: 500, body: "boom".into() }));

        assert_eq!(mock.get_settings().await.unwrap(), TemperatureBounds::new(20.0, 26.0));
        assert!(matches!(mock.get_settings().await, Err(RemoteError::Status { status: 500, .. })));
        assert!(matches!(mock.get_settings().await, Err(RemoteError::Transport(_))));
    }

    #[tokio::test]
    async fn mock_records_writes_even_when_they_fail() {
        let mock = MockRemoteClient::new();
        mock.push_write(Err(RemoteError::Transport("refused".into())));

        let bounds = TemperatureBounds::new(21.0, 27.0);
        assert!(mock.put_settings(bounds).await.is_err());
        assert!(mock.put_settings(bounds).await.is_ok());
        assert_eq!(mock.written(), vec![bounds, bounds]);
    }

    #[tokio::test(start_paused = true)]
    async fn mock_delays_readings() {
        let mock = MockRemoteClient::new();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        mock.push_delayed_reading(Duration::from_secs(3), Ok(RawReading::new(at, 24.0, true)));

        let started = tokio::time::Instant::now();
        let reading = mock.get_current_sample().await.unwrap();
        assert_eq!(reading.temperatura, 24.0);
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(mock.reading_calls(), 1);
    }
}
