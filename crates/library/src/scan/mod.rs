//! Discovery of playable modules.
//!
//! [`Scanner::scan`] accepts any identifier and normalizes what it points at
//! into one stream of [`Discovered`] modules:
//!
//! - directories are listed, sorted (the directory's own comparator, or
//!   natural order) and walked depth-first, subdirectories before files;
//! - playlist files (`.xspf`, `.ayl`) are walked reference by reference,
//!   each resolved against the playlist's location;
//! - files holding several tracks are walked like directories;
//! - anything else is handed to the codec, one report per detected module.
//!
//! A failure below the input is passed to [`ScanCallback::on_error`] and the
//! walk carries on with the siblings. A failure on the input itself is
//! returned.

mod walk;

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use trove_archive::{ArchiveService, ModuleInfo};
use trove_vfs::{File, Identifier, Url};

/// A module found by the scanner.
pub struct Discovered {
    /// Outer location plus the module's subpath.
    pub id: Identifier,
    pub info: ModuleInfo,
    /// The file the module was found in. Its content is the outer file's.
    pub file: Arc<dyn File>,
}

/// Receives the scanner's findings.
#[async_trait]
pub trait ScanCallback: Send {
    async fn on_module(&mut self, found: Discovered) -> Result<()>;

    /// A failure that did not stop the scan.
    fn on_error(&mut self, uri: &Url, error: Error) {
        warn!(%uri, error = ?error, "Skipped while scanning");
    }
}

/// How a scan ended. Cancellation is a normal ending, not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed,
    Canceled,
}

pub struct Scanner {
    archives: Arc<ArchiveService>,
    cancel: CancellationToken,
}

impl Scanner {
    /// The token is checked before every file and every report.
    pub fn new(archives: Arc<ArchiveService>, cancel: CancellationToken) -> Self {
        Self { archives, cancel }
    }

    #[instrument(skip(self, callback), fields(id = %id))]
    pub async fn scan(&self, id: &Identifier, callback: &mut dyn ScanCallback) -> Result<ScanOutcome> {
        info!("Scanning");
        let mut walk = walk::Walk::new(&self.archives, &self.cancel, callback);
        walk.identifier(id).await?;
        if self.cancel.is_cancelled() {
            info!("Scan canceled");
            return Ok(ScanOutcome::Canceled);
        }
        Ok(ScanOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rstest::rstest;
    use std::time::Duration;
    use trove_archive::MockCodec;
    use trove_backends::MockRoot;
    use trove_vfs::capability::Comparator;
    use trove_vfs::{CompositeRoot, Entry, RootHandle};

    const XSPF: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<playlist version="1" xmlns="http://xspf.org/ns/0/">
  <trackList>
    <track><location>../sibling.mod</location></track>
    <track><location>C:\Music\windows.mod</location></track>
    <track><location>missing.mod</location></track>
  </trackList>
</playlist>"#;

    #[derive(Default)]
    struct Recorder {
        found: Vec<(String, String)>,
        errors: Vec<String>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl ScanCallback for Recorder {
        async fn on_module(&mut self, found: Discovered) -> Result<()> {
            if self.fail_on.as_deref() == Some(&found.info.title) {
                exn::bail!(ErrorKind::Pipeline);
            }
            self.found.push((found.id.to_string(), found.info.title));
            Ok(())
        }

        fn on_error(&mut self, uri: &Url, _error: Error) {
            self.errors.push(uri.to_string());
        }
    }

    fn codec() -> MockCodec {
        MockCodec::default()
            .titled(b"song", "", "Song", 60)
            .titled(b"sibling", "", "Sibling", 60)
            .titled(b"pack", "#1", "One", 60)
            .titled(b"pack", "#2", "Two", 60)
            .titled(b"pack", "#3", "Three", 60)
            .titled(b"b", "", "B", 1)
            .titled(b"a", "", "A", 1)
    }

    fn scanner(builder: trove_backends::MockRootBuilder) -> (Arc<MockRoot>, Scanner, CancellationToken) {
        let mock = builder.build();
        let vfs: RootHandle = CompositeRoot::new(vec![mock.clone() as RootHandle]);
        let archives = ArchiveService::new(Arc::new(codec()), vfs);
        let cancel = CancellationToken::new();
        (mock, Scanner::new(archives, cancel.clone()), cancel)
    }

    fn scenario() -> trove_backends::MockRootBuilder {
        MockRoot::builder("mock")
            .file("sibling.mod", b"sibling".to_vec())
            .file("scan/pack.zip", b"pack".to_vec())
            .file("scan/a.xspf", XSPF.to_vec())
            .file("scan/demos/song.ay", b"song".to_vec())
    }

    #[tokio::test]
    async fn test_scenario() {
        let (mock, scanner, _) = scanner(scenario());
        let mut recorder = Recorder::default();
        let id = Identifier::for_location(mock.uri("scan"));
        assert_eq!(scanner.scan(&id, &mut recorder).await.unwrap(), ScanOutcome::Completed);
        let titles: Vec<_> = recorder.found.iter().map(|(_, title)| title.as_str()).collect();
        assert_eq!(titles, vec!["Song", "Sibling", "One", "Two", "Three"]);
        assert_eq!(recorder.found[0].0, "mock:/scan/demos/song.ay");
        assert_eq!(recorder.found[1].0, "mock:/sibling.mod");
        assert_eq!(recorder.found[3].0, "mock:/scan/pack.zip#%232");
        // The Windows path is skipped silently, the dangling one is reported.
        assert_eq!(recorder.errors, vec!["mock:/scan/a.xspf"]);
    }

    #[tokio::test]
    async fn test_archived_identifier_is_walked_like_a_directory() {
        let (mock, scanner, _) = scanner(scenario());
        let mut recorder = Recorder::default();
        let id = Identifier::new(mock.uri("scan/pack.zip"), ["#3"]).unwrap();
        scanner.scan(&id, &mut recorder).await.unwrap();
        assert_eq!(recorder.found, vec![("mock:/scan/pack.zip#%233".to_string(), "Three".to_string())]);
    }

    #[tokio::test]
    async fn test_failures_below_the_input_are_reported() {
        let (mock, scanner, _) = scanner(scenario().broken_dir("scan/broken"));
        let mut recorder = Recorder {
            fail_on: Some("Two".into()),
            ..Recorder::default()
        };
        let id = Identifier::for_location(mock.uri("scan"));
        scanner.scan(&id, &mut recorder).await.unwrap();
        let titles: Vec<_> = recorder.found.iter().map(|(_, title)| title.as_str()).collect();
        assert_eq!(titles, vec!["Song", "Sibling", "One", "Three"]);
        assert_eq!(
            recorder.errors,
            vec!["mock:/scan/broken", "mock:/scan/a.xspf", "mock:/scan/pack.zip#%232"]
        );
    }

    #[rstest]
    #[case::missing("nothing", ErrorKind::Archive)]
    #[case::unreadable("scan/broken", ErrorKind::Vfs)]
    #[tokio::test]
    async fn test_failure_on_the_input_is_returned(#[case] path: &str, #[case] expected: ErrorKind) {
        let (mock, scanner, _) = scanner(scenario().broken_dir("scan/broken"));
        let mut recorder = Recorder::default();
        let err = scanner
            .scan(&Identifier::for_location(mock.uri(path)), &mut recorder)
            .await
            .unwrap_err();
        assert_eq!(*err, expected);
        assert!(recorder.found.is_empty());
    }

    #[tokio::test]
    async fn test_directory_comparator_wins() {
        let reverse: Comparator = Arc::new(|lh: &Entry, rh: &Entry| rh.name().cmp(&lh.name()));
        let builder = MockRoot::builder("mock")
            .file("dir/a.mod", b"a".to_vec())
            .file("dir/b.mod", b"b".to_vec())
            .comparator("dir", reverse);
        let (mock, scanner, _) = scanner(builder);
        let mut recorder = Recorder::default();
        scanner
            .scan(&Identifier::for_location(mock.uri("dir")), &mut recorder)
            .await
            .unwrap();
        let titles: Vec<_> = recorder.found.iter().map(|(_, title)| title.as_str()).collect();
        assert_eq!(titles, vec!["B", "A"]);
    }

    #[tokio::test]
    async fn test_canceled() {
        let (mock, scanner, cancel) = scanner(scenario());
        cancel.cancel();
        let mut recorder = Recorder::default();
        let outcome = scanner
            .scan(&Identifier::for_location(mock.uri("scan")), &mut recorder)
            .await
            .unwrap();
        assert_eq!(outcome, ScanOutcome::Canceled);
        assert!(recorder.found.is_empty());
    }

    #[tokio::test]
    async fn test_self_referencing_playlist() {
        let xspf = br#"<playlist><trackList><track><location>loop.xspf</location></track><track><location>song.ay</location></track></trackList></playlist>"#;
        let builder = MockRoot::builder("mock")
            .file("dir/loop.xspf", xspf.to_vec())
            .file("dir/song.ay", b"song".to_vec());
        let (mock, scanner, _) = scanner(builder);
        let mut recorder = Recorder::default();
        let id = Identifier::for_location(mock.uri("dir/loop.xspf"));
        tokio::time::timeout(Duration::from_secs(5), scanner.scan(&id, &mut recorder))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recorder.found.len(), 1);
    }
}
