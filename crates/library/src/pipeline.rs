//! Bounded producer/consumer queue between a scan and the playlist store.
//!
//! The scanner enqueues [`ScanQueueItem`]s; one consumer task appends them to
//! the store. A full queue blocks [`ScanPipeline::enqueue`], so a fast scan
//! never outruns the store by more than the queue capacity.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trove_archive::ModuleInfo;
use trove_playlist::{PlaylistItem, StoreHandle};
use trove_vfs::Identifier;

/// Identity of a module for duplicate detection.
///
/// Derived from the outer file's content and the module's subpath, not from
/// its location: the same tune found again elsewhere is a duplicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModuleKey {
    /// CRC32 of the outer content followed by `#` and the subpath.
    pub checksum: u32,
    /// Length of the outer content.
    pub size: u64,
}

/// A found module on its way to the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanQueueItem {
    pub id: Identifier,
    pub title: String,
    pub author: String,
    pub duration: Duration,
    /// Items with equal keys are stored once.
    pub key: ModuleKey,
}

impl ScanQueueItem {
    pub fn new(id: Identifier, info: ModuleInfo, key: ModuleKey) -> Self {
        Self {
            id,
            title: info.title,
            author: info.author,
            duration: info.duration,
            key,
        }
    }
}

impl From<ScanQueueItem> for PlaylistItem {
    fn from(item: ScanQueueItem) -> Self {
        PlaylistItem {
            location: item.id,
            title: item.title,
            author: item.author,
            duration: item.duration,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PipelineOptions {
    /// Items queued before `enqueue` blocks.
    pub capacity: usize,
    /// First progress notification, counted from the first item.
    pub notify_delay: Duration,
    pub notify_period: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            capacity: 100,
            notify_delay: Duration::from_millis(100),
            notify_period: Duration::from_millis(2000),
        }
    }
}

/// Told how many items have been stored so far.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, persisted: usize);
}

impl<F: Fn(usize) + Send + Sync> ProgressObserver for F {
    fn on_progress(&self, persisted: usize) {
        self(persisted)
    }
}

#[derive(Debug)]
enum Message {
    Item(ScanQueueItem),
    /// Everything sent before has been queued; stop after storing it.
    Flush,
}

pub struct ScanPipeline {
    sender: mpsc::Sender<Message>,
    cancel: CancellationToken,
    persisted: Arc<AtomicUsize>,
    consumer: JoinHandle<()>,
}

impl ScanPipeline {
    /// Spawn the consumer. Cancelling `cancel` stops it without draining the
    /// queue and unblocks pending [`enqueue`](Self::enqueue) calls.
    pub fn start(
        store: StoreHandle,
        options: &PipelineOptions,
        observer: Arc<dyn ProgressObserver>,
        cancel: CancellationToken,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(options.capacity.max(1));
        let persisted = Arc::new(AtomicUsize::new(0));
        let consumer = Consumer {
            store,
            observer,
            cancel: cancel.clone(),
            persisted: persisted.clone(),
            seen: HashSet::new(),
            timer: None,
            notify_delay: options.notify_delay,
            notify_period: options.notify_period,
        };
        Self {
            sender,
            cancel,
            persisted,
            consumer: tokio::spawn(consumer.run(receiver)),
        }
    }

    /// Queue one item, waiting for room. `Ok(false)` if the pipeline was
    /// cancelled before the item got in.
    pub async fn enqueue(&self, item: ScanQueueItem) -> Result<bool> {
        if self.cancel.is_cancelled() {
            return Ok(false);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Ok(false),
            sent = self.sender.send(Message::Item(item)) => {
                sent.or_raise(|| ErrorKind::Pipeline)?;
                Ok(true)
            },
        }
    }

    /// Store everything queued so far and stop. Returns the number of items
    /// stored over the pipeline's lifetime.
    pub async fn flush(self) -> Result<usize> {
        if !self.cancel.is_cancelled() {
            self.sender.send(Message::Flush).await.or_raise(|| ErrorKind::Pipeline)?;
        }
        self.consumer.await.or_raise(|| ErrorKind::Pipeline)?;
        Ok(self.persisted.load(Ordering::SeqCst))
    }

    /// Stop without draining the queue.
    pub async fn cancel(self) -> usize {
        self.cancel.cancel();
        if let Err(err) = self.consumer.await {
            warn!(error = ?err, "Pipeline consumer did not stop cleanly");
        }
        self.persisted.load(Ordering::SeqCst)
    }

    pub fn persisted(&self) -> usize {
        self.persisted.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && !self.consumer.is_finished()
    }
}

struct Consumer {
    store: StoreHandle,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
    persisted: Arc<AtomicUsize>,
    seen: HashSet<ModuleKey>,
    /// Started by the first item.
    timer: Option<Interval>,
    notify_delay: Duration,
    notify_period: Duration,
}

impl Consumer {
    async fn run(mut self, mut receiver: mpsc::Receiver<Message>) {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Pipeline cancelled");
                    break;
                },
                message = receiver.recv() => match message {
                    Some(Message::Item(item)) => {
                        if !self.persist(item).await {
                            break;
                        }
                    },
                    Some(Message::Flush) | None => break,
                },
                _ = tick(&mut self.timer) => self.notify(),
            }
        }
        if self.timer.is_some() {
            self.notify();
        }
        info!(persisted = self.persisted.load(Ordering::SeqCst), "Pipeline stopped");
    }

    /// Returns `false` if cancelled while storing.
    async fn persist(&mut self, item: ScanQueueItem) -> bool {
        if self.timer.is_none() {
            let mut timer = tokio::time::interval_at(Instant::now() + self.notify_delay, self.notify_period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.timer = Some(timer);
        }
        if !self.seen.insert(item.key) {
            debug!(id = %item.id, "Duplicate module, skipped");
            return true;
        }
        let id = item.id.clone();
        let items = [PlaylistItem::from(item)];
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            stored = self.store.append(&items) => {
                match stored {
                    Ok(count) => {
                        self.persisted.fetch_add(count, Ordering::SeqCst);
                    },
                    Err(err) => warn!(%id, error = ?err, "Failed to store item"),
                }
                true
            },
        }
    }

    fn notify(&self) {
        self.observer.on_progress(self.persisted.load(Ordering::SeqCst));
    }
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        },
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::Semaphore;
    use tokio::time::{sleep, timeout};
    use trove_playlist::{MemoryStore, PlaylistStore, StoredItem};

    fn item(n: u32) -> ScanQueueItem {
        let id = Identifier::parse(&format!("mock:/song{n}.mod")).unwrap();
        let key = ModuleKey { checksum: n, size: 100 };
        ScanQueueItem::new(id, ModuleInfo::new(format!("Song {n}"), "", Duration::from_secs(60)), key)
    }

    /// Each append waits for a permit.
    struct Gated {
        inner: MemoryStore,
        permits: Semaphore,
    }

    #[async_trait]
    impl PlaylistStore for Gated {
        async fn append(&self, items: &[PlaylistItem]) -> trove_playlist::error::Result<usize> {
            self.permits.acquire().await.unwrap().forget();
            self.inner.append(items).await
        }

        async fn enumerate(&self) -> trove_playlist::error::Result<Vec<StoredItem>> {
            self.inner.enumerate().await
        }
    }

    fn silent() -> Arc<dyn ProgressObserver> {
        Arc::new(|_: usize| {})
    }

    #[tokio::test]
    async fn test_flush_persists_everything_in_order() {
        let store = Arc::new(MemoryStore::default());
        let pipeline = ScanPipeline::start(store.clone(), &PipelineOptions::default(), silent(), CancellationToken::new());
        for n in 1..=5 {
            assert!(pipeline.enqueue(item(n)).await.unwrap());
        }
        assert_eq!(pipeline.flush().await.unwrap(), 5);
        let titles: Vec<_> = store.enumerate().await.unwrap().into_iter().map(|stored| stored.item.title).collect();
        assert_eq!(titles, ["Song 1", "Song 2", "Song 3", "Song 4", "Song 5"]);
    }

    #[tokio::test]
    async fn test_duplicates_are_stored_once() {
        let store = Arc::new(MemoryStore::default());
        let pipeline = ScanPipeline::start(store.clone(), &PipelineOptions::default(), silent(), CancellationToken::new());
        pipeline.enqueue(item(1)).await.unwrap();
        pipeline.enqueue(item(1)).await.unwrap();
        pipeline.enqueue(item(2)).await.unwrap();
        assert_eq!(pipeline.flush().await.unwrap(), 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_equal_checksums_of_different_sizes_are_distinct() {
        let store = Arc::new(MemoryStore::default());
        let pipeline = ScanPipeline::start(store.clone(), &PipelineOptions::default(), silent(), CancellationToken::new());
        let mut longer = item(1);
        longer.key.size += 1;
        pipeline.enqueue(item(1)).await.unwrap();
        pipeline.enqueue(longer).await.unwrap();
        assert_eq!(pipeline.flush().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_full_queue_blocks_until_drained() {
        let store = Arc::new(Gated {
            inner: MemoryStore::default(),
            permits: Semaphore::new(0),
        });
        let options = PipelineOptions {
            capacity: 1,
            ..PipelineOptions::default()
        };
        let pipeline = ScanPipeline::start(store.clone(), &options, silent(), CancellationToken::new());
        // One item held by the consumer, one in the queue.
        pipeline.enqueue(item(1)).await.unwrap();
        pipeline.enqueue(item(2)).await.unwrap();
        sleep(Duration::from_millis(20)).await;
        assert!(timeout(Duration::from_millis(50), pipeline.enqueue(item(3))).await.is_err());

        store.permits.add_permits(1);
        let queued = timeout(Duration::from_secs(5), pipeline.enqueue(item(3))).await.unwrap();
        assert!(queued.unwrap());
        store.permits.add_permits(10);
        assert_eq!(pipeline.flush().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_cancel_unblocks_producer() {
        let store = Arc::new(Gated {
            inner: MemoryStore::default(),
            permits: Semaphore::new(0),
        });
        let options = PipelineOptions {
            capacity: 1,
            ..PipelineOptions::default()
        };
        let cancel = CancellationToken::new();
        let pipeline = ScanPipeline::start(store.clone(), &options, silent(), cancel.clone());
        pipeline.enqueue(item(1)).await.unwrap();
        pipeline.enqueue(item(2)).await.unwrap();

        let (queued, ()) = timeout(Duration::from_secs(5), async {
            tokio::join!(pipeline.enqueue(item(3)), async {
                sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            })
        })
        .await
        .unwrap();
        assert!(!queued.unwrap());
        assert!(!pipeline.is_active());
        assert_eq!(timeout(Duration::from_secs(5), pipeline.cancel()).await.unwrap(), 0);
        assert!(store.inner.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_starts_with_the_first_item() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let observer: Arc<dyn ProgressObserver> = {
            let calls = calls.clone();
            Arc::new(move |persisted: usize| calls.lock().unwrap().push(persisted))
        };
        let store = Arc::new(MemoryStore::default());
        let pipeline = ScanPipeline::start(store, &PipelineOptions::default(), observer, CancellationToken::new());

        sleep(Duration::from_secs(10)).await;
        assert!(calls.lock().unwrap().is_empty());

        pipeline.enqueue(item(1)).await.unwrap();
        sleep(Duration::from_millis(150)).await;
        assert_eq!(*calls.lock().unwrap(), [1]);

        pipeline.enqueue(item(2)).await.unwrap();
        sleep(Duration::from_millis(2000)).await;
        assert_eq!(*calls.lock().unwrap(), [1, 2]);

        assert_eq!(pipeline.flush().await.unwrap(), 2);
        // Final notification on stop.
        assert_eq!(*calls.lock().unwrap(), [1, 2, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_pipeline_never_notifies() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let observer: Arc<dyn ProgressObserver> = {
            let calls = calls.clone();
            Arc::new(move |persisted: usize| calls.lock().unwrap().push(persisted))
        };
        let store = Arc::new(MemoryStore::default());
        let pipeline = ScanPipeline::start(store, &PipelineOptions::default(), observer, CancellationToken::new());
        sleep(Duration::from_secs(10)).await;
        assert_eq!(pipeline.flush().await.unwrap(), 0);
        assert!(calls.lock().unwrap().is_empty());
    }
}
