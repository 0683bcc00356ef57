//! Background update queue.
//!
//! A single consumer thread owns a FIFO of pending items. Enqueues wake
//! the worker, which waits out a short debounce window and then applies
//! items through the engine's `add` path in bounded batches until the
//! queue drains. Queries keep running against the engine in the
//! meantime; only the brief `add` call itself takes the write lock.

use crate::config;
use crate::engine::SearchEngine;
use crate::error::SearchError;
use crate::item::Item;
use crossbeam_channel::{bounded, unbounded, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Invoked once per item of a failed batch, with the error that failed it.
pub type ErrorCallback = Box<dyn Fn(&Item, &SearchError) + Send + Sync>;

/// Updater tuning parameters.
pub struct UpdaterConfig {
    /// Quiet period after the last enqueue before a batch is processed.
    pub batch_delay: Duration,
    /// Maximum items applied per engine `add` call.
    pub max_batch_size: usize,
    /// Receives per-item failure reports from the worker.
    pub on_error: Option<ErrorCallback>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            batch_delay: Duration::from_millis(config::DEFAULT_BATCH_DELAY_MS),
            max_batch_size: config::DEFAULT_MAX_BATCH_SIZE,
            on_error: None,
        }
    }
}

/// Point-in-time queue counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdaterStats {
    pub total_processed: u64,
    pub pending_count: usize,
    pub batch_count: u64,
    pub avg_batch_size: f32,
    pub is_processing: bool,
}

enum Command {
    Wake,
    Flush(Sender<()>),
    Shutdown,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<VecDeque<Item>>,
    processing: AtomicBool,
    total_processed: AtomicU64,
    batch_count: AtomicU64,
}

/// Batches item insertions off the caller's critical path.
///
/// Holds a back-reference to the engine, not ownership; dropping the
/// updater shuts the worker down after draining the queue.
pub struct BackgroundUpdater {
    shared: Arc<Shared>,
    commands: Sender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundUpdater {
    /// Spawns the consumer thread for the given engine.
    pub fn new(engine: Arc<RwLock<SearchEngine>>, config: UpdaterConfig) -> Self {
        let shared = Arc::new(Shared::default());
        let (commands, receiver) = unbounded::<Command>();

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("hybridsearch-updater".into())
            .spawn(move || {
                let batch_delay = config.batch_delay;
                loop {
                    match receiver.recv_timeout(batch_delay) {
                        // Debounce: an enqueue restarts the wait.
                        Ok(Command::Wake) => continue,
                        Ok(Command::Flush(ack)) => {
                            drain(&worker_shared, &engine, &config);
                            let _ = ack.send(());
                        }
                        Ok(Command::Shutdown) => {
                            drain(&worker_shared, &engine, &config);
                            break;
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            drain(&worker_shared, &engine, &config);
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .expect("failed to spawn updater thread");

        Self {
            shared,
            commands,
            worker: Some(worker),
        }
    }

    /// Appends items to the queue and schedules processing.
    pub fn enqueue(&self, items: Vec<Item>) {
        if items.is_empty() {
            return;
        }
        self.shared.queue.lock().extend(items);
        let _ = self.commands.send(Command::Wake);
    }

    /// Cancels the debounce and processes everything queued right now.
    /// Returns once the queue is drained.
    pub fn flush(&self) {
        let (ack, done) = bounded(1);
        if self.commands.send(Command::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }

    /// Polls until the queue is empty and no batch is in flight.
    pub fn wait_for_completion(&self) {
        loop {
            let idle = self.shared.queue.lock().is_empty()
                && !self.shared.processing.load(Ordering::Acquire);
            if idle {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    /// Current queue counters.
    pub fn stats(&self) -> UpdaterStats {
        let total_processed = self.shared.total_processed.load(Ordering::Relaxed);
        let batch_count = self.shared.batch_count.load(Ordering::Relaxed);
        UpdaterStats {
            total_processed,
            pending_count: self.shared.queue.lock().len(),
            batch_count,
            avg_batch_size: if batch_count == 0 {
                0.0
            } else {
                total_processed as f32 / batch_count as f32
            },
            is_processing: self.shared.processing.load(Ordering::Acquire),
        }
    }
}

impl Drop for BackgroundUpdater {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Applies queued items in bounded batches until the queue is empty.
fn drain(shared: &Shared, engine: &Arc<RwLock<SearchEngine>>, config: &UpdaterConfig) {
    loop {
        let batch: Vec<Item> = {
            let mut queue = shared.queue.lock();
            if queue.is_empty() {
                shared.processing.store(false, Ordering::Release);
                return;
            }
            shared.processing.store(true, Ordering::Release);
            let take = queue.len().min(config.max_batch_size);
            queue.drain(..take).collect()
        };

        let batch_len = batch.len() as u64;
        let result = engine.write().add(batch.clone());
        shared.batch_count.fetch_add(1, Ordering::Relaxed);
        shared.total_processed.fetch_add(batch_len, Ordering::Relaxed);
        if let Err(error) = result {
            tracing::warn!(%error, batch = batch_len, "updater batch failed");
            if let Some(on_error) = &config.on_error {
                for item in &batch {
                    on_error(item, &error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::{Embedder, HashEmbedder};
    use crate::engine::EngineConfig;
    use crate::error::Result;
    use std::sync::atomic::AtomicUsize;

    fn shared_engine() -> Arc<RwLock<SearchEngine>> {
        Arc::new(RwLock::new(SearchEngine::new(
            Arc::new(HashEmbedder::new(32)),
            EngineConfig::default(),
        )))
    }

    fn items(range: std::ops::Range<usize>) -> Vec<Item> {
        range
            .map(|i| Item::new(format!("id{i}"), format!("item number {i}")))
            .collect()
    }

    #[test]
    fn test_enqueue_then_wait_applies_items() {
        let engine = shared_engine();
        let updater = BackgroundUpdater::new(
            Arc::clone(&engine),
            UpdaterConfig {
                batch_delay: Duration::from_millis(10),
                ..UpdaterConfig::default()
            },
        );
        updater.enqueue(items(0..20));
        updater.wait_for_completion();
        assert_eq!(engine.read().len(), 20);
        let stats = updater.stats();
        assert_eq!(stats.total_processed, 20);
        assert_eq!(stats.pending_count, 0);
        assert!(!stats.is_processing);
    }

    #[test]
    fn test_flush_processes_immediately() {
        let engine = shared_engine();
        let updater = BackgroundUpdater::new(
            Arc::clone(&engine),
            UpdaterConfig {
                batch_delay: Duration::from_secs(60),
                ..UpdaterConfig::default()
            },
        );
        updater.enqueue(items(0..5));
        updater.flush();
        assert_eq!(engine.read().len(), 5);
    }

    #[test]
    fn test_batches_are_bounded() {
        let engine = shared_engine();
        let updater = BackgroundUpdater::new(
            Arc::clone(&engine),
            UpdaterConfig {
                batch_delay: Duration::from_millis(5),
                max_batch_size: 8,
                on_error: None,
            },
        );
        updater.enqueue(items(0..30));
        updater.wait_for_completion();
        let stats = updater.stats();
        assert_eq!(stats.total_processed, 30);
        assert!(stats.batch_count >= 4, "30 items / max 8 needs >= 4 batches");
        assert!(stats.avg_batch_size <= 8.0);
    }

    #[test]
    fn test_error_callback_reports_each_item() {
        struct FailingEmbedder;
        impl Embedder for FailingEmbedder {
            fn model_id(&self) -> &str {
                "failing"
            }
            fn dim(&self) -> usize {
                4
            }
            fn embed(&self, _text: &str) -> Result<Vec<f32>> {
                Err(SearchError::Embedding("model offline".into()))
            }
        }
        let engine = Arc::new(RwLock::new(SearchEngine::new(
            Arc::new(FailingEmbedder),
            EngineConfig::default(),
        )));
        let reported = Arc::new(AtomicUsize::new(0));
        let reported_clone = Arc::clone(&reported);
        let updater = BackgroundUpdater::new(
            Arc::clone(&engine),
            UpdaterConfig {
                batch_delay: Duration::from_millis(5),
                max_batch_size: 4,
                on_error: Some(Box::new(move |_item, _error| {
                    reported_clone.fetch_add(1, Ordering::Relaxed);
                })),
            },
        );
        updater.enqueue(items(0..6));
        updater.wait_for_completion();
        assert_eq!(reported.load(Ordering::Relaxed), 6);
        assert_eq!(engine.read().len(), 0);
    }

    #[test]
    fn test_drop_drains_queue() {
        let engine = shared_engine();
        {
            let updater = BackgroundUpdater::new(
                Arc::clone(&engine),
                UpdaterConfig {
                    batch_delay: Duration::from_secs(60),
                    ..UpdaterConfig::default()
                },
            );
            updater.enqueue(items(0..7));
            // Dropped before the debounce elapses.
        }
        assert_eq!(engine.read().len(), 7);
    }
}
