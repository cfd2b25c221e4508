//! In-memory adapters shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail};
use icloud_storage_core::config::StallFallbackConfig;
use icloud_storage_core::domain::{
    ChannelEvent, ContainerId, ContainerRoot, DownloadStatus, IndexRecord, StorageError,
};
use icloud_storage_core::ports::{
    CoordinationGuard, IContainerResolver, IFileCoordinator, ISyncIndex, IndexNotification,
    IndexWatch, QueryScope, WatchHandle,
};
use icloud_storage_sync::{EventStream, StorageService};
use tokio::sync::mpsc;

pub const CONTAINER: &str = "iCloud.test";
pub const ROOT: &str = "/c";

// ============================================================================
// ScriptedIndex
// ============================================================================

struct OpenWatch {
    scope: QueryScope,
    tx: mpsc::UnboundedSender<IndexNotification>,
}

#[derive(Default)]
struct IndexState {
    records: Vec<IndexRecord>,
    watches: Vec<OpenWatch>,
    stop_flags: Vec<Arc<AtomicBool>>,
    defer_gathering: bool,
    fail_watch: bool,
    reject_downloads: bool,
    download_requests: Vec<PathBuf>,
}

/// Index whose contents and notifications are driven by the test
#[derive(Default)]
pub struct ScriptedIndex {
    state: Mutex<IndexState>,
}

fn matching(scope: &QueryScope, records: &[IndexRecord]) -> Vec<IndexRecord> {
    records
        .iter()
        .filter(|r| scope.matches(&r.path))
        .cloned()
        .collect()
}

impl ScriptedIndex {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replaces the indexed records without notifying anyone
    pub fn set_records(&self, records: Vec<IndexRecord>) {
        self.state.lock().unwrap().records = records;
    }

    /// Replaces the indexed records and notifies every open watch
    pub fn push(&self, records: Vec<IndexRecord>) {
        let mut state = self.state.lock().unwrap();
        state.records = records;
        for watch in &state.watches {
            let _ = watch
                .tx
                .send(IndexNotification::Updated(matching(&watch.scope, &state.records)));
        }
    }

    /// New watches wait for [`finish_gathering`](Self::finish_gathering)
    pub fn defer_gathering(&self) {
        self.state.lock().unwrap().defer_gathering = true;
    }

    pub fn finish_gathering(&self) {
        let state = self.state.lock().unwrap();
        for watch in &state.watches {
            let _ = watch.tx.send(IndexNotification::FinishedGathering(matching(
                &watch.scope,
                &state.records,
            )));
        }
    }

    pub fn fail_watches(&self) {
        self.state.lock().unwrap().fail_watch = true;
    }

    pub fn reject_downloads(&self) {
        self.state.lock().unwrap().reject_downloads = true;
    }

    /// Ends every open watch from the index side
    pub fn close_watches(&self) {
        self.state.lock().unwrap().watches.clear();
    }

    pub fn watches_opened(&self) -> usize {
        self.state.lock().unwrap().stop_flags.len()
    }

    pub fn watches_stopped(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .stop_flags
            .iter()
            .filter(|flag| flag.load(Ordering::SeqCst))
            .count()
    }

    pub fn download_requests(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().download_requests.clone()
    }

    /// Yields until `count` watches have been opened
    pub async fn wait_for_watches(&self, count: usize) {
        for _ in 0..10_000 {
            if self.watches_opened() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {count} watches, saw {}", self.watches_opened());
    }

    /// Yields until `count` watches have been stopped
    pub async fn wait_for_stopped(&self, count: usize) {
        for _ in 0..10_000 {
            if self.watches_stopped() >= count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("expected {count} stopped watches, saw {}", self.watches_stopped());
    }
}

#[async_trait::async_trait]
impl ISyncIndex for ScriptedIndex {
    async fn query(&self, scope: &QueryScope) -> anyhow::Result<Vec<IndexRecord>> {
        Ok(matching(scope, &self.state.lock().unwrap().records))
    }

    async fn watch(&self, scope: &QueryScope) -> anyhow::Result<IndexWatch> {
        let mut state = self.state.lock().unwrap();
        if state.fail_watch {
            bail!("index unavailable");
        }

        let (tx, rx) = mpsc::unbounded_channel();
        if !state.defer_gathering {
            tx.send(IndexNotification::FinishedGathering(matching(
                scope,
                &state.records,
            )))?;
        }

        let stopped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stopped);
        state.stop_flags.push(stopped);
        state.watches.push(OpenWatch {
            scope: scope.clone(),
            tx,
        });

        Ok(IndexWatch {
            notifications: rx,
            handle: WatchHandle::new(move || flag.store(true, Ordering::SeqCst)),
        })
    }

    async fn start_downloading(&self, path: &Path) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.download_requests.push(path.to_path_buf());
        if state.reject_downloads {
            bail!("download request rejected for {}", path.display());
        }
        Ok(())
    }
}

// ============================================================================
// MemoryCoordinator
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Dir,
    File(Vec<u8>),
}

/// In-memory filesystem
#[derive(Default)]
pub struct MemoryCoordinator {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
    removes: AtomicUsize,
    copies: AtomicUsize,
}

impl MemoryCoordinator {
    pub fn new() -> Arc<Self> {
        let fs = Self::default();
        fs.mkdir(Path::new(ROOT));
        Arc::new(fs)
    }

    pub fn mkdir(&self, path: &Path) {
        let mut nodes = self.nodes.lock().unwrap();
        for ancestor in path.ancestors() {
            if ancestor.parent().is_some() {
                nodes.entry(ancestor.to_path_buf()).or_insert(Node::Dir);
            }
        }
    }

    /// Writes a file, creating its parent directories
    pub fn write(&self, path: impl AsRef<Path>, content: &[u8]) {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.mkdir(parent);
        }
        self.nodes
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), Node::File(content.to_vec()));
    }

    pub fn read(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.nodes.lock().unwrap().get(path.as_ref()) {
            Some(Node::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    pub fn is_dir(&self, path: impl AsRef<Path>) -> bool {
        matches!(self.nodes.lock().unwrap().get(path.as_ref()), Some(Node::Dir))
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.nodes.lock().unwrap().contains_key(path.as_ref())
    }

    pub fn remove_calls(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }

    pub fn copy_calls(&self) -> usize {
        self.copies.load(Ordering::SeqCst)
    }
}

fn parent_exists(nodes: &BTreeMap<PathBuf, Node>, path: &Path) -> bool {
    match path.parent() {
        Some(parent) if parent.parent().is_some() => {
            matches!(nodes.get(parent), Some(Node::Dir))
        }
        _ => true,
    }
}

#[async_trait::async_trait]
impl IFileCoordinator for MemoryCoordinator {
    async fn exists(&self, path: &Path) -> anyhow::Result<bool> {
        Ok(path.parent().is_none() || self.nodes.lock().unwrap().contains_key(path))
    }

    async fn file_size(&self, path: &Path) -> anyhow::Result<u64> {
        match self.nodes.lock().unwrap().get(path) {
            Some(Node::File(content)) => Ok(content.len() as u64),
            Some(Node::Dir) => Ok(0),
            None => Err(anyhow!("no such file: {}", path.display())),
        }
    }

    async fn copy(&self, from: &Path, to: &Path) -> anyhow::Result<()> {
        self.copies.fetch_add(1, Ordering::SeqCst);
        let mut nodes = self.nodes.lock().unwrap();
        let Some(Node::File(content)) = nodes.get(from).cloned() else {
            bail!("no such file: {}", from.display());
        };
        if nodes.contains_key(to) {
            bail!("destination exists: {}", to.display());
        }
        if !parent_exists(&nodes, to) {
            bail!("parent directory missing: {}", to.display());
        }
        nodes.insert(to.to_path_buf(), Node::File(content));
        Ok(())
    }

    async fn remove(&self, path: &Path) -> anyhow::Result<()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        let mut nodes = self.nodes.lock().unwrap();
        if !nodes.contains_key(path) {
            bail!("no such item: {}", path.display());
        }
        nodes.retain(|key, _| !key.starts_with(path));
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> anyhow::Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        if !nodes.contains_key(from) {
            bail!("no such item: {}", from.display());
        }
        if !parent_exists(&nodes, to) {
            bail!("parent directory missing: {}", to.display());
        }
        let moved: Vec<(PathBuf, Node)> = nodes
            .iter()
            .filter(|(key, _)| key.starts_with(from))
            .map(|(key, node)| (key.clone(), node.clone()))
            .collect();
        for (key, node) in moved {
            nodes.remove(&key);
            let suffix = key.strip_prefix(from)?;
            let target = if suffix.as_os_str().is_empty() {
                to.to_path_buf()
            } else {
                to.join(suffix)
            };
            nodes.insert(target, node);
        }
        Ok(())
    }

    async fn create_dir_all(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(Node::File(_)) = self.nodes.lock().unwrap().get(path) {
            bail!("a file exists at {}", path.display());
        }
        self.mkdir(path);
        Ok(())
    }

    async fn coordinate(&self, _paths: &[PathBuf]) -> anyhow::Result<CoordinationGuard> {
        Ok(CoordinationGuard::none())
    }
}

// ============================================================================
// FixedResolver
// ============================================================================

/// Resolves [`CONTAINER`] to [`ROOT`] and nothing else
pub struct FixedResolver {
    roots: HashMap<String, ContainerRoot>,
}

impl FixedResolver {
    pub fn new() -> Arc<Self> {
        let mut roots = HashMap::new();
        roots.insert(CONTAINER.to_string(), ContainerRoot::new(ROOT).unwrap());
        Arc::new(Self { roots })
    }
}

impl IContainerResolver for FixedResolver {
    fn resolve(&self, id: &ContainerId) -> Result<ContainerRoot, StorageError> {
        self.roots
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| StorageError::Container(id.to_string()))
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub struct Harness {
    pub index: Arc<ScriptedIndex>,
    pub fs: Arc<MemoryCoordinator>,
    pub service: StorageService,
}

pub fn harness() -> Harness {
    harness_with(StallFallbackConfig::default())
}

pub fn harness_with(policy: StallFallbackConfig) -> Harness {
    let index = ScriptedIndex::new();
    let fs = MemoryCoordinator::new();
    let service = StorageService::new(index.clone(), FixedResolver::new(), fs.clone())
        .with_stall_fallback(policy);
    Harness { index, fs, service }
}

pub fn container() -> ContainerId {
    ContainerId::new(CONTAINER).unwrap()
}

pub fn cloud(path: &str) -> PathBuf {
    Path::new(ROOT).join(path)
}

pub fn file_record(path: &str, size: u64) -> IndexRecord {
    let mut record = IndexRecord::new(cloud(path).to_string_lossy().into_owned());
    record.size = Some(size);
    record
}

pub fn dir_record(path: &str) -> IndexRecord {
    let location = cloud(path).to_string_lossy().into_owned();
    IndexRecord::new(format!("{}/", location.trim_end_matches('/')))
}

pub fn uploading(path: &str, percent: f64) -> IndexRecord {
    let mut record = file_record(path, 0);
    record.is_uploading = percent < 100.0;
    record.is_uploaded = percent >= 100.0;
    record.percent_uploaded = Some(percent);
    record
}

pub fn downloading(path: &str, percent: f64) -> IndexRecord {
    let mut record = file_record(path, 0);
    record.is_downloading = true;
    record.percent_downloaded = Some(percent);
    record
}

pub fn downloaded(path: &str) -> IndexRecord {
    let mut record = file_record(path, 0);
    record.download_status = DownloadStatus::Current;
    record.percent_downloaded = Some(100.0);
    record
}

/// Drains a stream until it closes
pub async fn collect(stream: &mut EventStream) -> Vec<ChannelEvent> {
    let mut events = Vec::new();
    while let Some(event) = stream.recv().await {
        events.push(event);
    }
    events
}

/// Number of terminal events in `events`
pub fn terminals(events: &[ChannelEvent]) -> usize {
    events.iter().filter(|e| e.is_terminal()).count()
}
