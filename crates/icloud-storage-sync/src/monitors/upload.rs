//! Upload progress monitor.
//!
//! Watches the single index item at the upload destination and reports its
//! upload progress until it reaches 100%, fails, or stalls.
//!
//! ## Stall fallback
//!
//! Some index implementations stop sending progress notifications just short
//! of 100% even though the item finished uploading. The first progress
//! report arms a one-shot deadline proportional to the source size; if the
//! deadline passes before the natural completion, the channel is completed
//! anyway. The deadline lives inside the monitor task, so cancelling the task
//! disarms it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use icloud_storage_core::domain::{ChannelEvent, IndexRecord, Progress, StorageError};
use icloud_storage_core::ports::{ISyncIndex, QueryScope};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{records_of, Flow};
use crate::registry::ChannelSink;
use crate::session::{QuerySession, SessionEvent};

enum Step {
    Cancelled,
    Stalled,
    Event(Option<SessionEvent>),
}

/// Monitor for one upload
#[derive(Debug)]
pub struct UploadMonitor {
    sink: ChannelSink,
    session: QuerySession,
    token: CancellationToken,
    /// Delay to arm at the first progress report; taken once armed
    stall_delay: Option<Duration>,
    deadline: Option<Instant>,
}

impl UploadMonitor {
    /// Creates a monitor for the item at `cloud_path`
    ///
    /// `stall_delay` is `None` when the stall fallback is disabled.
    pub fn new(
        sink: ChannelSink,
        cloud_path: &Path,
        token: CancellationToken,
        stall_delay: Option<Duration>,
    ) -> Self {
        Self {
            sink,
            session: QuerySession::new(QueryScope::exact(cloud_path)),
            token,
            stall_delay,
            deadline: None,
        }
    }

    /// Runs the monitor on a new task
    pub fn spawn(self, index: Arc<dyn ISyncIndex>) -> JoinHandle<()> {
        tokio::spawn(self.run(index))
    }

    /// Runs the monitor until the channel finishes or is cancelled
    pub async fn run(mut self, index: Arc<dyn ISyncIndex>) {
        let channel = self.sink.channel().clone();
        info!(channel = %channel, anchor = %self.session.scope().anchor().display(), "Upload monitor started");

        tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                debug!(channel = %channel, "Upload cancelled before monitoring began");
                return;
            }
            _ = self.session.start(index.as_ref()) => {}
        }

        loop {
            let deadline = self.deadline;
            let step = tokio::select! {
                biased;
                _ = self.token.cancelled() => Step::Cancelled,
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => Step::Stalled,
                event = self.session.next() => Step::Event(event),
            };

            match step {
                Step::Cancelled => {
                    debug!(channel = %channel, "Upload monitor cancelled");
                    break;
                }
                Step::Stalled => {
                    info!(channel = %channel, "Upload progress stalled, forcing completion");
                    self.sink.complete();
                    break;
                }
                Step::Event(None) => {
                    warn!(channel = %channel, "Index watch ended before the upload completed");
                    self.sink.fail(StorageError::Native(
                        "index watch ended before the upload completed".to_string(),
                    ));
                    break;
                }
                Step::Event(Some(event)) => match records_of(event) {
                    Ok(records) => {
                        if self.on_records(&records) == Flow::Finished {
                            break;
                        }
                    }
                    Err(e) => {
                        self.sink.fail(e);
                        break;
                    }
                },
            }
        }

        self.session.stop();
    }

    fn on_records(&mut self, records: &[IndexRecord]) -> Flow {
        let Some(record) = records.first() else {
            debug!(channel = %self.sink.channel(), "Upload destination not indexed yet");
            return Flow::Continue;
        };

        if let Some(message) = &record.upload_error {
            warn!(channel = %self.sink.channel(), error = %message, "Upload failed");
            self.sink.fail(StorageError::Native(message.clone()));
            return Flow::Finished;
        }

        let Some(percent) = record.percent_uploaded else {
            return Flow::Continue;
        };
        let progress = Progress::new(percent);
        self.sink.emit(ChannelEvent::Progress(progress));

        if progress.is_complete() {
            info!(channel = %self.sink.channel(), "Upload completed");
            self.sink.complete();
            return Flow::Finished;
        }

        if let Some(delay) = self.stall_delay.take() {
            debug!(channel = %self.sink.channel(), delay_ms = delay.as_millis() as u64, "Stall fallback armed");
            self.deadline = Some(Instant::now() + delay);
        }
        Flow::Continue
    }
}
