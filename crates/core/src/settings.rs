use std::future::Future;
use std::sync::Arc;

use aquario_client::{Ack, RemoteClient, RemoteError};
use tokio::sync::watch;

use crate::io::{Operation, ReportSink};
use crate::types::{BoundsError, TemperatureBounds, validate_bounds};

/// Owns the operator-visible temperature bounds and keeps them in step with the
/// controller.
///
/// Cheap to clone; clones share the same bounds. Edits are local and immediate,
/// writes happen only on [`save`](Self::save).
#[derive(Clone)]
pub struct SettingsController {
    client: Arc<dyn RemoteClient>,
    bounds: Arc<watch::Sender<TemperatureBounds>>,
    sink: ReportSink,
}

impl SettingsController {
    pub fn new(client: Arc<dyn RemoteClient>, initial: TemperatureBounds, sink: ReportSink) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self {
            client,
            bounds: Arc::new(tx),
            sink,
        }
    }

    /// Current bounds.
    pub fn bounds(&self) -> TemperatureBounds {
        *self.bounds.borrow()
    }

    /// Watch bounds changes.
    pub fn subscribe(&self) -> watch::Receiver<TemperatureBounds> {
        self.bounds.subscribe()
    }

    /// Fetch the controller's settings once and adopt them wholesale.
    ///
    /// On failure the current bounds stay as they are and the failure goes to the
    /// sink. Never retries. Returns whether remote settings were applied.
    pub async fn load_initial(&self) -> bool {
        let result = self
            .client
            .get_settings()
            .await
            .and_then(|remote| {
                validate_bounds(remote).map_err(|e| RemoteError::Decode(e.to_string()))
            });

        match result {
            Ok(remote) => {
                self.bounds.send_replace(remote);
                tracing::info!(
                    client = self.client.name(),
                    min = remote.min,
                    max = remote.max,
                    "settings loaded"
                );
                true
            }
            Err(e) => {
                self.sink.failure(Operation::LoadSettings, &e);
                false
            }
        }
    }

    /// Replace the bounds locally. Does not contact the controller.
    pub fn update_bounds(&self, new: TemperatureBounds) -> Result<(), BoundsError> {
        let new = validate_bounds(new)?;
        self.bounds.send_replace(new);
        Ok(())
    }

    pub fn set_min(&self, min: f64) -> Result<(), BoundsError> {
        self.update_bounds(TemperatureBounds { min, ..self.bounds() })
    }

    pub fn set_max(&self, max: f64) -> Result<(), BoundsError> {
        self.update_bounds(TemperatureBounds { max, ..self.bounds() })
    }

    /// Write the current bounds to the controller.
    ///
    /// At most once: a failure is reported and nothing is retried. Local bounds are
    /// kept either way. The returned future owns everything it needs, so a UI can
    /// spawn it instead of waiting.
    pub fn save(&self) -> impl Future<Output = Option<Ack>> + Send + use<> {
        let client = Arc::clone(&self.client);
        let sink = self.sink.clone();
        let bounds = self.bounds();

        async move {
            match client.put_settings(bounds).await {
                Ok(ack) => {
                    sink.info(Operation::SaveSettings, format!("settings saved ({bounds}): {ack}"));
                    Some(ack)
                }
                Err(e) => {
                    sink.failure(Operation::SaveSettings, &e);
                    None
                }
            }
        }
    }
}
