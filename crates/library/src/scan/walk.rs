use super::{Discovered, ScanCallback};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use trove_archive::{ArchiveService, DetectedModule};
use trove_playlist::PlaylistFormat;
use trove_vfs::{Dir, Entry, File, Identifier, Listing, Object, Url, capability, is_windows_absolute, natural};

/// State of one [`Scanner::scan`](super::Scanner::scan) call.
pub(super) struct Walk<'a> {
    archives: &'a ArchiveService,
    cancel: &'a CancellationToken,
    callback: &'a mut dyn ScanCallback,
    /// Playlists and references being followed, outermost first.
    following: Vec<Url>,
}

impl<'a> Walk<'a> {
    pub(super) fn new(
        archives: &'a ArchiveService,
        cancel: &'a CancellationToken,
        callback: &'a mut dyn ScanCallback,
    ) -> Self {
        Self {
            archives,
            cancel,
            callback,
            following: Vec::new(),
        }
    }

    pub(super) fn identifier<'s>(&'s mut self, id: &'s Identifier) -> BoxFuture<'s, Result<()>> {
        async move {
            let entry = self.archives.resolve(id).await.or_raise(|| ErrorKind::Archive)?;
            self.entry(entry).await
        }
        .boxed()
    }

    fn entry(&mut self, entry: Entry) -> BoxFuture<'_, Result<()>> {
        async move {
            match entry {
                Entry::Dir(dir) => self.dir(dir).await,
                Entry::File(file) => self.file(file).await,
                Entry::Object(object) => {
                    debug!(uri = %object.uri(), "Neither a file nor a directory");
                    Ok(())
                },
            }
        }
        .boxed()
    }

    async fn dir(&mut self, dir: Arc<dyn Dir>) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        let listing = Listing::of(dir.as_ref()).await.or_raise(|| ErrorKind::Vfs)?;
        let mut entries = listing.entries;
        match capability::COMPARATOR.get(dir.as_ref()) {
            Some(comparator) => entries.sort_by(|lh, rh| comparator(lh, rh)),
            None => entries.sort_by(natural::compare_entries),
        }
        let (dirs, files): (Vec<_>, Vec<_>) = entries.into_iter().partition(Entry::is_dir);
        for entry in dirs.into_iter().chain(files) {
            if self.cancel.is_cancelled() {
                break;
            }
            let uri = entry.uri();
            if let Err(err) = self.entry(entry).await {
                self.callback.on_error(&uri, err);
            }
        }
        Ok(())
    }

    async fn file(&mut self, file: Arc<dyn File>) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Ok(());
        }
        let uri = file.uri();
        if let Some(target) = capability::REFERENCE.get(file.as_ref()) {
            return self.reference(uri, target).await;
        }
        if uri.fragment().is_some() {
            return self.archived_track(file).await;
        }
        if let Some(format) = PlaylistFormat::from_name(&file.name()) {
            return self.playlist(format, file).await;
        }

        let detected = self
            .archives
            .detect_modules(file.as_ref())
            .await
            .or_raise(|| ErrorKind::Archive)?;
        if self.archives.cached_analysis(&uri).is_some_and(|index| index.is_archive()) {
            drop(detected);
            let entry = self.archives.browse(file).await.or_raise(|| ErrorKind::Archive)?;
            return self.entry(entry).await;
        }
        if detected.is_empty() {
            debug!(%uri, "No modules found");
        }
        for DetectedModule { subpath, module } in detected {
            if self.cancel.is_cancelled() {
                break;
            }
            let id = if subpath.is_empty() {
                Identifier::for_location(uri.clone())
            } else {
                Identifier::for_file_in_archive(uri.clone(), &subpath).or_raise(|| ErrorKind::Vfs)?
            };
            let info = module.info();
            drop(module);
            self.report(Discovered {
                id,
                info,
                file: file.clone(),
            })
            .await;
        }
        Ok(())
    }

    async fn archived_track(&mut self, file: Arc<dyn File>) -> Result<()> {
        let id = Identifier::parse(file.uri().as_str()).or_raise(|| ErrorKind::Vfs)?;
        let info = self.archives.track_info(&id).unwrap_or_default();
        self.report(Discovered { id, info, file }).await;
        Ok(())
    }

    /// A file standing for another identifier is scanned as that identifier,
    /// so stored rows keep the location they were found at.
    async fn reference(&mut self, uri: Url, target: Identifier) -> Result<()> {
        if self.following.contains(&uri) {
            warn!(%uri, "Reference loops back on itself, skipped");
            return Ok(());
        }
        debug!(%uri, %target, "Following reference");
        self.following.push(uri);
        let result = self.identifier(&target).await;
        self.following.pop();
        result
    }

    async fn playlist(&mut self, format: PlaylistFormat, file: Arc<dyn File>) -> Result<()> {
        let uri = file.uri();
        if self.following.contains(&uri) {
            warn!(%uri, "Playlist refers to itself, skipped");
            return Ok(());
        }
        let content = file.content().await.or_raise(|| ErrorKind::Vfs)?;
        let references = format.parse(&content).or_raise(|| ErrorKind::Playlist)?;
        let base = Identifier::parse(uri.as_str()).or_raise(|| ErrorKind::Vfs)?;
        debug!(%uri, %format, references = references.len(), "Walking playlist");

        self.following.push(uri.clone());
        for reference in references {
            if self.cancel.is_cancelled() {
                break;
            }
            if is_windows_absolute(&reference.location) {
                debug!(location = %reference.location, "Windows paths are not supported");
                continue;
            }
            let result = match base.resolve_reference(&reference.location) {
                Ok(id) => self.identifier(&id).await,
                Err(err) => Err(err).or_raise(|| ErrorKind::Vfs),
            };
            if let Err(err) = result {
                self.callback.on_error(&uri, err);
            }
        }
        self.following.pop();
        Ok(())
    }

    async fn report(&mut self, found: Discovered) {
        if self.cancel.is_cancelled() {
            return;
        }
        let uri = found.id.to_uri();
        if let Err(err) = self.callback.on_module(found).await {
            self.callback.on_error(&uri, err);
        }
    }
}
