//! End-to-end tests for the monitor against a scripted controller.
//!
//! Time is paused, so the 7 s poll period costs nothing and tick timing is exact.

use std::sync::Arc;
use std::time::Duration;

use aquario_client::{Ack, MockRemoteClient, RawReading, RemoteClient, RemoteError};
use aquario_core::config::MonitorCfg;
use aquario_core::io::{Notice, NoticeReceiver, Operation};
use aquario_core::runtime::Monitor;
use aquario_core::types::{PollState, TemperatureBounds};
use chrono::{TimeZone, Utc};

fn monitor(mock: &Arc<MockRemoteClient>, cfg: MonitorCfg) -> (Monitor, NoticeReceiver) {
    Monitor::new(Arc::new(cfg), Arc::clone(mock) as Arc<dyn RemoteClient>)
}

fn reading(i: i64, temperature: f64) -> RawReading {
    let at = Utc.timestamp_opt(1_714_560_000 + i * 7, 0).unwrap();
    RawReading::new(at, temperature, temperature < 24.0)
}

fn notices_for(rx: &mut NoticeReceiver, op: Operation) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        if n.operation == op {
            out.push(n);
        }
    }
    out
}

/// Controller holds 20/26, operator moves to 21/27 and saves.
#[tokio::test(start_paused = true)]
async fn operator_edits_and_saves_loaded_settings() {
    let mock = Arc::new(MockRemoteClient::new());
    mock.push_settings(Ok(TemperatureBounds::new(20.0, 26.0)));
    mock.push_write(Ok(Ack::from_body(r#""Configurações salvas""#)));
    let (mut monitor, mut notices) = monitor(&mock, MonitorCfg::default());
    let settings = monitor.settings().clone();
    let token = monitor.token();

    let operator = async {
        let mut bounds = settings.subscribe();
        bounds
            .wait_for(|b| *b == TemperatureBounds::new(20.0, 26.0))
            .await
            .unwrap();
        settings.set_min(21.0).unwrap();
        settings.set_max(27.0).unwrap();
        let ack = settings.save().await;
        token.cancel();
        ack
    };
    let ((), ack) = tokio::join!(monitor.run(), operator);

    assert!(ack.is_some());
    assert_eq!(mock.written(), vec![TemperatureBounds::new(21.0, 27.0)]);
    let saved = notices_for(&mut notices, Operation::SaveSettings);
    assert_eq!(saved.len(), 1);
    assert!(!saved[0].is_error());
    assert!(saved[0].content.contains("Configurações salvas"));
}

#[tokio::test(start_paused = true)]
async fn failed_save_keeps_edits_and_reports() {
    let mock = Arc::new(MockRemoteClient::new());
    mock.push_settings(Ok(TemperatureBounds::new(20.0, 26.0)));
    mock.push_write(Err(RemoteError::Status {
        status: 500,
        body: "disk full".into(),
    }));
    let (mut monitor, mut notices) = monitor(&mock, MonitorCfg::default());
    let settings = monitor.settings().clone();
    let token = monitor.token();

    let operator = async {
        let mut bounds = settings.subscribe();
        bounds
            .wait_for(|b| *b == TemperatureBounds::new(20.0, 26.0))
            .await
            .unwrap();
        settings.update_bounds(TemperatureBounds::new(21.0, 27.0)).unwrap();
        let ack = settings.save().await;
        token.cancel();
        ack
    };
    let ((), ack) = tokio::join!(monitor.run(), operator);

    assert!(ack.is_none());
    assert_eq!(settings.bounds(), TemperatureBounds::new(21.0, 27.0));
    assert_eq!(mock.written().len(), 1, "failed write is not retried");
    let saved = notices_for(&mut notices, Operation::SaveSettings);
    assert_eq!(saved.len(), 1);
    assert!(saved[0].is_error());
    assert!(saved[0].content.starts_with("save settings failed"));
}

#[tokio::test(start_paused = true)]
async fn polls_until_cancelled_then_stays_quiet() {
    let mock = Arc::new(MockRemoteClient::new());
    for (i, t) in [23.5, 24.0, 24.5].into_iter().enumerate() {
        mock.push_reading(Ok(reading(i as i64, t)));
    }
    let (mut monitor, mut notices) = monitor(&mock, MonitorCfg::default());
    let mut feed = monitor.subscribe();
    let token = monitor.token();

    let watcher = async {
        feed.wait_for(|s| s.appended == 3).await.unwrap();
        token.cancel();
    };
    tokio::join!(monitor.run(), watcher);

    assert_eq!(monitor.poll_state(), PollState::Stopped);
    let snap = feed.borrow().clone();
    let temps: Vec<f64> = snap.samples.iter().map(|s| s.temperature).collect();
    assert_eq!(temps, vec![23.5, 24.0, 24.5]);
    assert!(snap.samples[0].heater_on);
    assert_eq!(snap.failures, 0);

    let calls = mock.reading_calls();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(mock.reading_calls(), calls, "no fetch after stop");

    // nothing scripted for settings, so the defaults stay
    assert_eq!(monitor.settings().bounds(), TemperatureBounds::new(22.0, 28.0));
    let load = notices_for(&mut notices, Operation::LoadSettings);
    assert_eq!(load.len(), 1);
    assert!(load[0].is_error());
}

#[tokio::test(start_paused = true)]
async fn env_config_shapes_the_monitor() {
    let cfg = MonitorCfg::from_vars([
        ("AQUARIO_HISTORY_CAPACITY".to_owned(), "2".to_owned()),
        ("AQUARIO_POLL_INTERVAL_MS".to_owned(), "1000".to_owned()),
        ("AQUARIO_DEFAULT_MIN".to_owned(), "19.5".to_owned()),
    ]);
    let mock = Arc::new(MockRemoteClient::new());
    mock.push_settings(Err(RemoteError::Transport("connection refused".into())));
    for (i, t) in [24.0, 25.0, 26.0].into_iter().enumerate() {
        mock.push_reading(Ok(reading(i as i64, t)));
    }
    let (mut monitor, _notices) = monitor(&mock, cfg);
    let mut feed = monitor.subscribe();
    let token = monitor.token();

    let start = tokio::time::Instant::now();
    let watcher = async {
        feed.wait_for(|s| s.appended == 3).await.unwrap();
        token.cancel();
    };
    tokio::join!(monitor.run(), watcher);

    // ticks at 0 s, 1 s and 2 s
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
    let temps: Vec<f64> = feed.borrow().samples.iter().map(|s| s.temperature).collect();
    assert_eq!(temps, vec![25.0, 26.0]);
    assert_eq!(monitor.settings().bounds(), TemperatureBounds::new(19.5, 28.0));
}
