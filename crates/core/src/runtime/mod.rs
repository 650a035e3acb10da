mod shutdown;

pub use shutdown::ShutdownGuard;

use std::sync::Arc;

use aquario_client::{HttpRemoteClient, RemoteClient, RemoteError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::MonitorCfg;
use crate::io::notice::{self, NoticeReceiver};
use crate::io::ReportSink;
use crate::poller::{PollerOptions, SamplePoller};
use crate::settings::SettingsController;
use crate::types::{PollSnapshot, PollState};

/// Wires the settings controller and the sample poller to one controller client
/// and one shutdown token.
pub struct Monitor {
    cfg: Arc<MonitorCfg>,
    client: Arc<dyn RemoteClient>,
    settings: SettingsController,
    poller: SamplePoller,
    shutdown: ShutdownGuard,
}

impl Monitor {
    /// Create a monitor around `client`. Returns the monitor and the receiver of
    /// operator notices (failures and save acknowledgments).
    pub fn new(cfg: Arc<MonitorCfg>, client: Arc<dyn RemoteClient>) -> (Self, NoticeReceiver) {
        let (notice_tx, notice_rx) = notice::channel(cfg.notice_buffer);
        let sink = ReportSink::new(notice_tx);
        let settings = SettingsController::new(Arc::clone(&client), cfg.default_bounds(), sink.clone());
        let poller = SamplePoller::new(Arc::clone(&client), PollerOptions::from_cfg(&cfg), sink);
        let monitor = Self {
            cfg,
            client,
            settings,
            poller,
            shutdown: ShutdownGuard::new(),
        };
        (monitor, notice_rx)
    }

    /// Create a monitor talking HTTP to `cfg.base_url`.
    pub fn connect(cfg: Arc<MonitorCfg>) -> Result<(Self, NoticeReceiver), RemoteError> {
        let client = HttpRemoteClient::new(Some(cfg.base_url.clone()), cfg.request_timeout())?;
        Ok(Self::new(cfg, Arc::new(client)))
    }

    pub fn cfg(&self) -> &MonitorCfg {
        &self.cfg
    }

    /// Handle for reading and editing bounds. Clones share state.
    pub fn settings(&self) -> &SettingsController {
        &self.settings
    }

    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.poller.subscribe()
    }

    pub fn poll_state(&self) -> PollState {
        self.poller.state()
    }

    /// Cancelling this token ends [`run`](Self::run).
    pub fn token(&self) -> CancellationToken {
        self.shutdown.token()
    }

    /// Start polling, load settings alongside it, and block until shutdown.
    /// Stops the poller before returning.
    pub async fn run(&mut self) {
        self.shutdown.spawn_signal_listener();
        let token = self.shutdown.token();

        tracing::info!(client = self.client.name(), "aquario monitor started");
        self.poller.start();

        let settings = self.settings.clone();
        let load = tokio::spawn(async move { settings.load_initial().await });

        token.cancelled().await;
        if !load.is_finished() {
            tracing::debug!("settings load still pending at shutdown, abandoning it");
            load.abort();
        }
        self.poller.stop().await;
        tracing::info!("aquario monitor stopped");
    }
}
