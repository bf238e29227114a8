//! One scan run: inputs in, playlist rows out.

use crate::error::{Error, ErrorKind, Result};
use crate::pipeline::{ModuleKey, PipelineOptions, ProgressObserver, ScanPipeline, ScanQueueItem};
use crate::scan::{Discovered, ScanCallback, ScanOutcome, Scanner};
use async_trait::async_trait;
use crc32fast::Hasher;
use exn::ResultExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use trove_archive::ArchiveService;
use trove_playlist::StoreHandle;
use trove_vfs::{File, Identifier, Url};

/// What a finished [`ScanSession::run`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub outcome: ScanOutcome,
    /// Rows appended to the store.
    pub persisted: usize,
    /// Objects skipped because of an error, in the order they failed.
    pub errors: Vec<Url>,
}

/// Scans inputs into a playlist store.
///
/// Each run gets its own pipeline. Dropping a clone of
/// [`cancel_token`](Self::cancel_token) does nothing; cancelling it stops
/// the current run, which then reports [`ScanOutcome::Canceled`].
pub struct ScanSession {
    archives: Arc<ArchiveService>,
    store: StoreHandle,
    options: PipelineOptions,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
}

impl ScanSession {
    pub fn new(archives: Arc<ArchiveService>, store: StoreHandle, options: PipelineOptions) -> Self {
        Self {
            archives,
            store,
            options,
            observer: Arc::new(|persisted: usize| debug!(persisted, "Scan progress")),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Scan `inputs` in order.
    ///
    /// A failing input is logged and the next one is scanned; once everything
    /// queued has been stored, the first such failure is returned.
    #[instrument(skip_all, fields(inputs = inputs.len()))]
    pub async fn run(&self, inputs: &[Identifier]) -> Result<ScanReport> {
        let pipeline = ScanPipeline::start(
            self.store.clone(),
            &self.options,
            self.observer.clone(),
            self.cancel.clone(),
        );
        let scanner = Scanner::new(self.archives.clone(), self.cancel.clone());
        let mut callback = SessionCallback {
            pipeline: &pipeline,
            checksums: HashMap::new(),
            errors: Vec::new(),
        };

        let mut outcome = ScanOutcome::Completed;
        let mut first_error = None;
        for id in inputs {
            match scanner.scan(id, &mut callback).await {
                Ok(ScanOutcome::Completed) => {},
                Ok(ScanOutcome::Canceled) => {
                    outcome = ScanOutcome::Canceled;
                    break;
                },
                Err(err) => {
                    warn!(%id, error = ?err, "Input failed");
                    callback.errors.push(id.to_uri());
                    first_error.get_or_insert(err);
                },
            }
        }
        let errors = callback.errors;

        let persisted = match outcome {
            ScanOutcome::Completed => pipeline.flush().await?,
            ScanOutcome::Canceled => pipeline.cancel().await,
        };
        info!(persisted, errors = errors.len(), ?outcome, "Scan finished");
        if let Some(err) = first_error {
            return Err(err);
        }
        Ok(ScanReport {
            outcome,
            persisted,
            errors,
        })
    }
}

struct SessionCallback<'a> {
    pipeline: &'a ScanPipeline,
    /// Checksum state and length of each outer file's content.
    checksums: HashMap<Url, (Hasher, u64)>,
    errors: Vec<Url>,
}

impl SessionCallback<'_> {
    async fn key(&mut self, found: &Discovered) -> Result<ModuleKey> {
        let location = found.id.location();
        let (mut hasher, size) = match self.checksums.get(location) {
            Some((hasher, size)) => (hasher.clone(), *size),
            None => {
                let content = found.file.content().await.or_raise(|| ErrorKind::Vfs)?;
                let mut hasher = Hasher::new();
                hasher.update(&content);
                let size = content.len() as u64;
                self.checksums.insert(location.clone(), (hasher.clone(), size));
                (hasher, size)
            },
        };
        hasher.update(b"#");
        hasher.update(found.id.subpath_string().as_bytes());
        Ok(ModuleKey {
            checksum: hasher.finalize(),
            size,
        })
    }
}

#[async_trait]
impl ScanCallback for SessionCallback<'_> {
    async fn on_module(&mut self, found: Discovered) -> Result<()> {
        let key = self.key(&found).await?;
        let item = ScanQueueItem::new(found.id, found.info, key);
        if !self.pipeline.enqueue(item).await? {
            debug!("Pipeline no longer accepts items");
        }
        Ok(())
    }

    fn on_error(&mut self, uri: &Url, error: Error) {
        warn!(%uri, error = ?error, "Skipped while scanning");
        self.errors.push(uri.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trove_archive::MockCodec;
    use std::time::Duration;
    use trove_backends::{MockRoot, PlaylistRoot};
    use trove_playlist::{MemoryStore, PlaylistItem, PlaylistStore};
    use trove_vfs::{CompositeRoot, RootHandle};

    const XSPF: &[u8] = br#"<playlist><trackList>
<track><location>../sibling.mod</location></track>
</trackList></playlist>"#;

    struct Fixture {
        mock: Arc<MockRoot>,
        store: Arc<MemoryStore>,
        session: ScanSession,
    }

    fn fixture() -> Fixture {
        let mock = MockRoot::builder("mock")
            .file("sibling.mod", b"sibling".to_vec())
            .file("scan/pack.zip", b"pack".to_vec())
            .file("scan/a.xspf", XSPF.to_vec())
            .file("scan/demos/song.ay", b"song".to_vec())
            .build();
        let codec = MockCodec::default()
            .titled(b"song", "", "Song", 60)
            .titled(b"sibling", "", "Sibling", 90)
            .titled(b"pack", "#1", "One", 10)
            .titled(b"pack", "#2", "Two", 20)
            .titled(b"pack", "#3", "Three", 30);
        let vfs: RootHandle = CompositeRoot::new(vec![mock.clone() as RootHandle]);
        let archives = ArchiveService::new(Arc::new(codec), vfs);
        let store = Arc::new(MemoryStore::default());
        let session = ScanSession::new(archives, store.clone(), PipelineOptions::default());
        Fixture { mock, store, session }
    }

    async fn titles(store: &MemoryStore) -> Vec<String> {
        store.enumerate().await.unwrap().into_iter().map(|stored| stored.item.title).collect()
    }

    #[tokio::test]
    async fn test_scenario_is_persisted() {
        let f = fixture();
        let report = f
            .session
            .run(&[Identifier::for_location(f.mock.uri("scan"))])
            .await
            .unwrap();
        assert_eq!(report.outcome, ScanOutcome::Completed);
        assert_eq!(report.persisted, 5);
        assert!(report.errors.is_empty());
        assert_eq!(titles(&f.store).await, ["Song", "Sibling", "One", "Two", "Three"]);
        let stored = f.store.enumerate().await.unwrap();
        assert_eq!(stored[3].item.location.to_string(), "mock:/scan/pack.zip#%232");
        assert_eq!(stored[3].item.duration, std::time::Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_rescanning_the_same_module_stores_it_once() {
        let f = fixture();
        let song = Identifier::for_location(f.mock.uri("scan/demos/song.ay"));
        let report = f.session.run(&[song.clone(), song]).await.unwrap();
        assert_eq!(report.persisted, 1);
    }

    #[tokio::test]
    async fn test_same_content_elsewhere_is_a_duplicate() {
        let mock = MockRoot::builder("mock")
            .file("a/song.ay", b"song".to_vec())
            .file("b/copy.ay", b"song".to_vec())
            .build();
        let codec = MockCodec::default().titled(b"song", "", "Song", 60);
        let vfs: RootHandle = CompositeRoot::new(vec![mock.clone() as RootHandle]);
        let store = Arc::new(MemoryStore::default());
        let session = ScanSession::new(ArchiveService::new(Arc::new(codec), vfs), store.clone(), PipelineOptions::default());

        let inputs = [Identifier::for_location(mock.uri("a")), Identifier::for_location(mock.uri("b"))];
        let report = session.run(&inputs).await.unwrap();
        assert_eq!(report.persisted, 1);
        let stored = store.enumerate().await.unwrap();
        assert_eq!(stored[0].item.location.to_string(), "mock:/a/song.ay");
    }

    #[tokio::test]
    async fn test_failed_input_does_not_stop_the_others() {
        let f = fixture();
        let inputs = [
            Identifier::for_location(f.mock.uri("nothing.mod")),
            Identifier::for_location(f.mock.uri("scan/demos")),
        ];
        let err = f.session.run(&inputs).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Archive));
        assert_eq!(titles(&f.store).await, ["Song"]);
    }

    #[tokio::test]
    async fn test_canceled_run() {
        let f = fixture();
        f.session.cancel_token().cancel();
        let report = f
            .session
            .run(&[Identifier::for_location(f.mock.uri("scan"))])
            .await
            .unwrap();
        assert_eq!(report.outcome, ScanOutcome::Canceled);
        assert_eq!(report.persisted, 0);
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_playlist_rows_are_scanned_at_their_own_location() {
        let mock = MockRoot::builder("mock").file("scan/pack.zip", b"pack".to_vec()).build();
        let codec = MockCodec::default()
            .titled(b"pack", "#1", "One", 10)
            .titled(b"pack", "#2", "Two", 20);
        let rows = Arc::new(MemoryStore::default());
        rows.append(&[PlaylistItem {
            location: Identifier::parse("mock:/scan/pack.zip#%232").unwrap(),
            title: "Two".to_string(),
            author: String::new(),
            duration: Duration::from_secs(20),
        }])
        .await
        .unwrap();
        let source: StoreHandle = rows;
        let vfs = CompositeRoot::new_cyclic(|weak| {
            vec![
                mock.clone() as RootHandle,
                Arc::new(PlaylistRoot::new(source, weak.clone())) as RootHandle,
            ]
        });
        let archives = ArchiveService::new(Arc::new(codec), vfs);
        let store = Arc::new(MemoryStore::default());
        let session = ScanSession::new(archives, store.clone(), PipelineOptions::default());

        let playlist = Identifier::parse("playlist:/").unwrap();
        let report = session.run(&[playlist]).await.unwrap();
        assert_eq!(report.persisted, 1);
        assert!(report.errors.is_empty());
        let stored = store.enumerate().await.unwrap();
        let rows: Vec<_> = stored
            .iter()
            .map(|stored| (stored.item.title.as_str(), stored.item.location.to_string()))
            .collect();
        assert_eq!(rows, [("Two", "mock:/scan/pack.zip#%232".to_string())]);
    }
}
