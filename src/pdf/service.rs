//! Render service - manages worker pool and cache

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use flume::{Receiver, Sender};

use super::cache::PageCache;
use super::request::{CancelFlag, PageLookup, RenderEvent, RenderJob, WorkerMessage};
use super::types::{DocumentId, PageKey, quantize_zoom};
use super::worker::{RasterizerFactory, render_worker};
use super::{DEFAULT_CACHE_SIZE, DEFAULT_WORKERS};

/// Everything guarded by the service mutex.
///
/// Workers and callers of [`RenderService::get`] share this so the
/// "one in-flight job per key" check and the cache insert are atomic.
pub(crate) struct CacheState {
    pub(crate) cache: PageCache,
    pub(crate) in_flight: HashMap<PageKey, CancelFlag>,
    pub(crate) failed: HashMap<PageKey, Arc<str>>,
}

pub(crate) fn lock_state(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Worker pool and cache sizing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderConfig {
    pub workers: usize,
    pub cache_size: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

/// Rasterizes pages of one document in the background and caches the results
pub struct RenderService {
    document: DocumentId,
    page_count: usize,
    state: Arc<Mutex<CacheState>>,
    request_tx: Sender<WorkerMessage>,
    event_rx: Receiver<RenderEvent>,
    num_workers: usize,
    stopped: AtomicBool,
}

impl RenderService {
    /// Create a new render service with default configuration
    #[must_use]
    pub fn new(document: DocumentId, page_count: usize, open: RasterizerFactory) -> Self {
        Self::with_config(document, page_count, open, RenderConfig::default())
    }

    /// Create a new render service with custom configuration
    #[must_use]
    pub fn with_config(
        document: DocumentId,
        page_count: usize,
        open: RasterizerFactory,
        config: RenderConfig,
    ) -> Self {
        let state = Arc::new(Mutex::new(CacheState {
            cache: PageCache::new(config.cache_size),
            in_flight: HashMap::new(),
            failed: HashMap::new(),
        }));

        // flume gives us MPMC: every worker pulls from the same queue.
        let (request_tx, request_rx) = flume::unbounded();
        let (event_tx, event_rx) = flume::unbounded();

        let num_workers = config.workers.max(1);
        for i in 0..num_workers {
            let open = Arc::clone(&open);
            let rx = request_rx.clone();
            let tx = event_tx.clone();
            let state = Arc::clone(&state);

            let spawned = std::thread::Builder::new()
                .name(format!("render-{i}"))
                .spawn(move || render_worker(open, rx, tx, state));
            if let Err(e) = spawned {
                log::error!("Failed to spawn render worker {i}: {e}");
            }
        }

        log::debug!(
            "Render service for document {} started with {num_workers} workers, cache size {}",
            document.raw(),
            config.cache_size
        );

        Self {
            document,
            page_count,
            state,
            request_tx,
            event_rx,
            num_workers,
            stopped: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn document(&self) -> DocumentId {
        self.document
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Key for a page of this service's document
    #[must_use]
    pub fn key(&self, page: usize, zoom: f32) -> PageKey {
        PageKey::new(self.document, page, zoom)
    }

    /// Look up a page, scheduling a render on a miss.
    ///
    /// Never blocks on rendering. A `Pending` result is always followed by
    /// exactly one [`RenderEvent`] for the key.
    pub fn get(&self, key: PageKey) -> PageLookup {
        if key.document != self.document {
            return PageLookup::Failed(Arc::from("Page belongs to another document"));
        }
        if key.page >= self.page_count {
            return PageLookup::Failed(Arc::from(format!(
                "Page {} is out of range (document has {} pages)",
                key.page + 1,
                self.page_count
            )));
        }
        if key.zoom_fixed == 0 {
            return PageLookup::Failed(Arc::from("Zoom factor must be positive"));
        }
        if self.stopped.load(Ordering::Acquire) {
            return PageLookup::Failed(Arc::from("Render workers have stopped"));
        }

        let mut state = lock_state(&self.state);
        if let Some(bitmap) = state.cache.get(&key) {
            return PageLookup::Ready(bitmap);
        }
        if let Some(reason) = state.failed.get(&key) {
            return PageLookup::Failed(Arc::clone(reason));
        }
        if let Some(flag) = state.in_flight.get(&key) {
            // Page came back into view before a worker dropped the job
            flag.reset();
            return PageLookup::Pending;
        }

        let cancel = CancelFlag::default();
        state.in_flight.insert(key, cancel.clone());
        drop(state);

        log::debug!("Scheduling render of page {} at zoom {}", key.page, key.zoom());
        if self
            .request_tx
            .send(WorkerMessage::Render(RenderJob { key, cancel }))
            .is_err()
        {
            let reason: Arc<str> = Arc::from("Render workers have stopped");
            let mut state = lock_state(&self.state);
            state.in_flight.remove(&key);
            state.failed.insert(key, Arc::clone(&reason));
            return PageLookup::Failed(reason);
        }

        PageLookup::Pending
    }

    /// Request the pages around `center` so scrolling finds them ready
    pub fn prefetch(&self, center: usize, radius: usize, zoom: f32) {
        if self.page_count == 0 {
            return;
        }
        for offset in 1..=radius {
            if center + offset < self.page_count {
                let _ = self.get(self.key(center + offset, zoom));
            }
            if center >= offset {
                let _ = self.get(self.key(center - offset, zoom));
            }
        }
    }

    /// Drop queued jobs for pages outside `keep` and for any zoom other than
    /// `zoom`.
    ///
    /// Jobs already running finish normally. Returns how many jobs were flagged.
    pub fn cancel_outside(&self, keep: RangeInclusive<usize>, zoom: f32) -> usize {
        let zoom_fixed = quantize_zoom(zoom);
        let cancelled = self.cancel_where(|key| {
            !keep.contains(&key.page) || key.zoom_fixed != zoom_fixed
        });
        if cancelled > 0 {
            log::debug!("Cancelled {cancelled} queued renders outside {keep:?} at zoom {zoom:.3}");
        }
        cancelled
    }

    fn cancel_where(&self, stale: impl Fn(&PageKey) -> bool) -> usize {
        let state = lock_state(&self.state);
        let mut cancelled = 0;
        for (key, flag) in &state.in_flight {
            if stale(key) && !flag.is_cancelled() {
                flag.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Drain completion events without blocking
    pub fn poll_events(&self) -> Vec<RenderEvent> {
        self.event_rx.try_iter().collect()
    }

    /// Completion channel, for callers that want to block or select on it
    #[must_use]
    pub fn events(&self) -> &Receiver<RenderEvent> {
        &self.event_rx
    }

    #[must_use]
    pub fn is_cached(&self, key: &PageKey) -> bool {
        lock_state(&self.state).cache.contains(key)
    }

    #[must_use]
    pub fn cached_len(&self) -> usize {
        lock_state(&self.state).cache.len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        lock_state(&self.state).cache.capacity()
    }

    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        lock_state(&self.state).in_flight.len()
    }

    /// Forget all bitmaps and failure marks, e.g. after the file changed on disk
    pub fn invalidate_all(&self) {
        let mut state = lock_state(&self.state);
        state.cache.invalidate_all();
        state.failed.clear();
    }

    /// Stop all workers.
    ///
    /// Queued jobs are cancelled first so workers reach the shutdown message
    /// without rendering the rest of the queue.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        let cancelled = self.cancel_where(|_| true);
        log::debug!(
            "Stopping render service for document {} ({cancelled} queued jobs cancelled)",
            self.document.raw()
        );
        for _ in 0..self.num_workers {
            let _ = self.request_tx.send(WorkerMessage::Shutdown);
        }
    }
}

impl Drop for RenderService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
