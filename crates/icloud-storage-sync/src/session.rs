//! Query session over one continuous index watch.
//!
//! A [`QuerySession`] turns an [`IndexWatch`] into a pull-based sequence:
//! exactly one [`SessionEvent::Snapshot`] first, then one
//! [`SessionEvent::Update`] per index notification, until the session is
//! stopped or the index closes the watch. Sessions are never restarted.

use icloud_storage_core::domain::{IndexRecord, StorageError};
use icloud_storage_core::ports::{ISyncIndex, IndexNotification, IndexWatch, QueryScope};
use tracing::{debug, warn};

/// Lifecycle of a [`QuerySession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopped,
}

/// One item yielded by [`QuerySession::next`]
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The initial result set, or the reason the watch could not be opened
    Snapshot(Result<Vec<IndexRecord>, StorageError>),
    /// The full result set after a change
    Update(Vec<IndexRecord>),
}

/// A continuous watch over the index, scoped by a query predicate
#[derive(Debug)]
pub struct QuerySession {
    scope: QueryScope,
    state: SessionState,
    watch: Option<IndexWatch>,
    start_error: Option<StorageError>,
    snapshot_delivered: bool,
}

impl QuerySession {
    pub fn new(scope: QueryScope) -> Self {
        Self {
            scope,
            state: SessionState::Idle,
            watch: None,
            start_error: None,
            snapshot_delivered: false,
        }
    }

    pub fn scope(&self) -> &QueryScope {
        &self.scope
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Opens the index watch
    ///
    /// A failure is not returned here; it becomes the first item of
    /// [`next`](Self::next). Calling `start` on a session that is not idle
    /// does nothing.
    pub async fn start(&mut self, index: &dyn ISyncIndex) {
        if self.state != SessionState::Idle {
            warn!(state = ?self.state, "Ignoring start on a session that is not idle");
            return;
        }
        self.state = SessionState::Running;

        match index.watch(&self.scope).await {
            Ok(watch) => {
                debug!(anchor = %self.scope.anchor().display(), "Query session started");
                self.watch = Some(watch);
            }
            Err(e) => {
                warn!(
                    anchor = %self.scope.anchor().display(),
                    error = %e,
                    "Failed to open index watch"
                );
                self.start_error = Some(StorageError::from(e));
            }
        }
    }

    /// Waits for the next snapshot or update
    ///
    /// Returns `None` once the session is stopped or the index closed the
    /// watch. Cancel-safe: dropping the future loses no notification.
    pub async fn next(&mut self) -> Option<SessionEvent> {
        if self.state != SessionState::Running {
            return None;
        }
        if let Some(err) = self.start_error.take() {
            self.snapshot_delivered = true;
            self.stop();
            return Some(SessionEvent::Snapshot(Err(err)));
        }

        loop {
            let watch = self.watch.as_mut()?;
            match watch.notifications.recv().await {
                Some(IndexNotification::FinishedGathering(records)) => {
                    if self.snapshot_delivered {
                        return Some(SessionEvent::Update(records));
                    }
                    self.snapshot_delivered = true;
                    return Some(SessionEvent::Snapshot(Ok(records)));
                }
                Some(IndexNotification::Updated(records)) => {
                    if self.snapshot_delivered {
                        return Some(SessionEvent::Update(records));
                    }
                    debug!(
                        records = records.len(),
                        "Dropping update received before initial gathering finished"
                    );
                }
                None => {
                    debug!(anchor = %self.scope.anchor().display(), "Index closed the watch");
                    self.stop();
                    return None;
                }
            }
        }
    }

    /// Waits for the initial result set
    ///
    /// Intended for a freshly started session. Fails with
    /// `StorageError::Native` if the index ends the watch first.
    pub async fn snapshot(&mut self) -> Result<Vec<IndexRecord>, StorageError> {
        loop {
            match self.next().await {
                Some(SessionEvent::Snapshot(result)) => return result,
                Some(SessionEvent::Update(_)) => continue,
                None => {
                    return Err(StorageError::Native(
                        "index watch ended before the initial gathering finished".to_string(),
                    ))
                }
            }
        }
    }

    /// Detaches from the index. Idempotent.
    pub fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        self.state = SessionState::Stopped;
        if let Some(watch) = self.watch.take() {
            debug!(anchor = %self.scope.anchor().display(), "Query session stopped");
            watch.handle.stop();
        }
    }
}

impl Drop for QuerySession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use icloud_storage_core::ports::WatchHandle;
    use tokio::sync::mpsc;

    use super::*;

    /// Hands out one pre-built watch, or fails
    struct OneShotIndex {
        watch: Mutex<Option<IndexWatch>>,
    }

    #[async_trait::async_trait]
    impl ISyncIndex for OneShotIndex {
        async fn query(&self, _scope: &QueryScope) -> anyhow::Result<Vec<IndexRecord>> {
            Ok(Vec::new())
        }

        async fn watch(&self, _scope: &QueryScope) -> anyhow::Result<IndexWatch> {
            self.watch
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| anyhow::anyhow!("index unavailable"))
        }

        async fn start_downloading(&self, _path: &Path) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn index_with_watch() -> (
        OneShotIndex,
        mpsc::UnboundedSender<IndexNotification>,
        Arc<AtomicBool>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stopped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopped);
        let watch = IndexWatch {
            notifications: rx,
            handle: WatchHandle::new(move || flag.store(true, Ordering::SeqCst)),
        };
        let index = OneShotIndex {
            watch: Mutex::new(Some(watch)),
        };
        (index, tx, stopped)
    }

    #[tokio::test]
    async fn test_snapshot_then_updates_in_order() {
        let (index, tx, _) = index_with_watch();
        let mut session = QuerySession::new(QueryScope::prefix("/c"));
        session.start(&index).await;
        assert_eq!(session.state(), SessionState::Running);

        tx.send(IndexNotification::FinishedGathering(vec![IndexRecord::new("/c/a")]))
            .unwrap();
        tx.send(IndexNotification::Updated(vec![IndexRecord::new("/c/b")]))
            .unwrap();
        tx.send(IndexNotification::Updated(vec![IndexRecord::new("/c/c")]))
            .unwrap();

        assert_eq!(
            session.next().await,
            Some(SessionEvent::Snapshot(Ok(vec![IndexRecord::new("/c/a")])))
        );
        assert_eq!(
            session.next().await,
            Some(SessionEvent::Update(vec![IndexRecord::new("/c/b")]))
        );
        assert_eq!(
            session.next().await,
            Some(SessionEvent::Update(vec![IndexRecord::new("/c/c")]))
        );
    }

    #[tokio::test]
    async fn test_updates_before_gathering_are_dropped() {
        let (index, tx, _) = index_with_watch();
        let mut session = QuerySession::new(QueryScope::prefix("/c"));
        session.start(&index).await;

        tx.send(IndexNotification::Updated(vec![IndexRecord::new("/c/early")]))
            .unwrap();
        tx.send(IndexNotification::FinishedGathering(vec![]))
            .unwrap();

        assert_eq!(session.next().await, Some(SessionEvent::Snapshot(Ok(vec![]))));
    }

    #[tokio::test]
    async fn test_start_failure_surfaces_as_first_item() {
        let index = OneShotIndex {
            watch: Mutex::new(None),
        };
        let mut session = QuerySession::new(QueryScope::exact("/c/a"));
        session.start(&index).await;

        match session.next().await {
            Some(SessionEvent::Snapshot(Err(e))) => assert_eq!(e.code(), "E_NAT"),
            other => panic!("expected failed snapshot, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(session.next().await, None);
    }

    #[tokio::test]
    async fn test_closed_watch_stops_session() {
        let (index, tx, stopped) = index_with_watch();
        let mut session = QuerySession::new(QueryScope::prefix("/c"));
        session.start(&index).await;
        drop(tx);

        assert_eq!(session.next().await, None);
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_stop_releases_watch_and_is_idempotent() {
        let (index, _tx, stopped) = index_with_watch();
        let mut session = QuerySession::new(QueryScope::prefix("/c"));
        session.start(&index).await;

        session.stop();
        session.stop();
        assert!(stopped.load(Ordering::SeqCst));
        assert_eq!(session.next().await, None);
    }

    #[tokio::test]
    async fn test_drop_releases_watch() {
        let (index, _tx, stopped) = index_with_watch();
        let mut session = QuerySession::new(QueryScope::prefix("/c"));
        session.start(&index).await;

        drop(session);
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_idle_session_yields_nothing() {
        let mut session = QuerySession::new(QueryScope::prefix("/c"));
        assert_eq!(session.next().await, None);
    }
}
