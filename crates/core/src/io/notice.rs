use std::fmt;

use aquario_client::RemoteError;
use tokio::sync::mpsc;

/// Which remote interaction a notice is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    LoadSettings,
    SaveSettings,
    FetchSample,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::LoadSettings => "load settings",
            Self::SaveSettings => "save settings",
            Self::FetchSample => "fetch sample",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A message for the operator.
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub operation: Operation,
    pub content: String,
}

impl Notice {
    pub fn info(operation: Operation, content: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            operation,
            content: content.into(),
        }
    }

    pub fn error(operation: Operation, content: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            operation,
            content: content.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

/// Sending half, held by the sink.
pub type NoticeSender = mpsc::Sender<Notice>;
/// Receiving half, drained by a frontend.
pub type NoticeReceiver = mpsc::Receiver<Notice>;

/// Create a notice channel with the given buffer size.
pub fn channel(buffer: usize) -> (NoticeSender, NoticeReceiver) {
    mpsc::channel(buffer.max(1))
}

/// Where remote-call outcomes are reported.
///
/// Everything goes to `tracing`; when a channel is attached, a copy is forwarded
/// to it. Reporting never blocks: a full or closed channel drops the notice.
#[derive(Debug, Clone, Default)]
pub struct ReportSink {
    tx: Option<NoticeSender>,
}

impl ReportSink {
    pub fn new(tx: NoticeSender) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that only logs.
    pub fn log_only() -> Self {
        Self::default()
    }

    pub fn failure(&self, operation: Operation, err: &RemoteError) {
        tracing::warn!(%operation, error = %err, "remote call failed");
        self.forward(Notice::error(operation, format!("{operation} failed: {err}")));
    }

    pub fn info(&self, operation: Operation, content: impl Into<String>) {
        let content = content.into();
        tracing::info!(%operation, "{content}");
        self.forward(Notice::info(operation, content));
    }

    fn forward(&self, notice: Notice) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(e) = tx.try_send(notice) {
            tracing::debug!(error = %e, "notice dropped");
        }
    }
}
