//! In-memory port implementations for unit tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use pixsync_core::domain::{BlobPath, RenderingJobRecord};
use pixsync_core::ports::{BlobStoreError, IBlobStore, IRenderQueue, ProgressFn};

/// Number of progress callbacks per transfer
const PROGRESS_STEPS: u64 = 4;

/// Blob store backed by a map, with call accounting and optional latency
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Bytes>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    gets: AtomicUsize,
    puts: AtomicUsize,
    deletes: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: AtomicUsize,
    fail_listings: AtomicBool,
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every get and put sleeps for `delay` before touching the map
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert(&self, path: &BlobPath, data: Bytes) {
        self.blobs.insert(path.as_str().to_string(), data);
    }

    pub fn get(&self, path: &BlobPath) -> Option<Bytes> {
        self.blobs.get(path.as_str()).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, path: &BlobPath) -> bool {
        self.blobs.contains_key(path.as_str())
    }

    /// Calls of any kind, including failed ones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Reads attempted
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Writes that completed
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Highest number of gets and puts observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Makes every listing fail with a transport error
    pub fn fail_listings(&self, fail: bool) {
        self.fail_listings.store(fail, Ordering::SeqCst);
    }

    async fn enter(&self) -> InFlight {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(Arc::clone(&self.in_flight));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        guard
    }
}

fn report(progress: &Option<ProgressFn>, total: u64) {
    if let Some(progress) = progress {
        for step in 0..=PROGRESS_STEPS {
            progress(total * step / PROGRESS_STEPS, total);
        }
    }
}

#[async_trait::async_trait]
impl IBlobStore for MemoryBlobStore {
    async fn list_files(&self, prefix: &str) -> Result<Vec<BlobPath>, BlobStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listings.load(Ordering::SeqCst) {
            return Err(BlobStoreError::Transport("listing disabled".into()));
        }
        let mut paths: Vec<BlobPath> = self
            .blobs
            .iter()
            .filter_map(|entry| BlobPath::new(entry.key().clone()).ok())
            .filter(|path| path.starts_with(prefix))
            .collect();
        paths.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(paths)
    }

    async fn get_bytes(
        &self,
        path: &BlobPath,
        progress: Option<ProgressFn>,
    ) -> Result<Bytes, BlobStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gets.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter().await;
        let data = self
            .get(path)
            .ok_or_else(|| BlobStoreError::NotFound(path.to_string()))?;
        report(&progress, data.len() as u64);
        Ok(data)
    }

    async fn put_bytes(
        &self,
        path: &BlobPath,
        data: Bytes,
        progress: Option<ProgressFn>,
    ) -> Result<(), BlobStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _guard = self.enter().await;
        report(&progress, data.len() as u64);
        self.insert(path, data);
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_file(&self, path: &BlobPath) -> Result<bool, BlobStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(self.blobs.remove(path.as_str()).is_some())
    }
}

/// Render queue that records every submission
#[derive(Default)]
pub struct MemoryRenderQueue {
    submitted: Mutex<Vec<RenderingJobRecord>>,
    reject: AtomicBool,
}

impl MemoryRenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the queue answer every submission with `false`
    pub fn reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn submitted(&self) -> Vec<RenderingJobRecord> {
        self.submitted
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl IRenderQueue for MemoryRenderQueue {
    async fn submit(&self, record: &RenderingJobRecord) -> Result<bool, BlobStoreError> {
        if let Ok(mut records) = self.submitted.lock() {
            records.push(record.clone());
        }
        Ok(!self.reject.load(Ordering::SeqCst))
    }
}
