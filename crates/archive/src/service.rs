//! Browsing files as containers of tracks.
//!
//! Every file goes through the same states: unknown until analyzed, then
//! either a plain file (fewer than two modules) or an archive root that
//! enumerates its tracks. Analyses are memoized per service instance, keyed
//! by the file's URI; a scan session owns one service for its lifetime.
//!
//! Archive entries never hold on to the file they came from. Their parent
//! and content are re-resolved from the identifier whenever asked for.

use crate::codec::{CodecHandle, Module, ModuleInfo};
use crate::error::{ErrorKind, Result};
use crate::index::{ArchiveIndex, NodeKind};
use crate::resolver::AdditionalFilesResolver;
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, instrument, warn};
use trove_vfs::capability::Extension;
use trove_vfs::{Dir, Entry, File, Identifier, Object, RootHandle, Url, Visitor, format};
use trove_vfs::ErrorKind as VfsErrorKind;

/// A module reported by [`ArchiveService::detect_modules`], additional files
/// already supplied.
pub struct DetectedModule {
    /// `/`-separated subpath inside the file, empty for the file itself.
    pub subpath: String,
    pub module: Box<dyn Module>,
}

pub struct ArchiveService {
    codec: CodecHandle,
    vfs: RootHandle,
    this: Weak<ArchiveService>,
    analyses: Mutex<HashMap<Url, Arc<ArchiveIndex>>>,
}

impl ArchiveService {
    /// `vfs` resolves outer locations and sibling files, normally the
    /// composite root.
    pub fn new(codec: CodecHandle, vfs: RootHandle) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            codec,
            vfs,
            this: this.clone(),
            analyses: Mutex::new(HashMap::new()),
        })
    }

    pub fn codec(&self) -> &CodecHandle {
        &self.codec
    }

    pub fn vfs(&self) -> &RootHandle {
        &self.vfs
    }

    /// Resolve any identifier.
    ///
    /// Plain identifiers go to the VFS; a file already known to be an archive
    /// comes back as its archive root. Archived identifiers are looked up in
    /// the analysis of their outer file, analyzing it first on a miss. A
    /// second miss is final.
    #[instrument(level = "debug", skip(self), fields(id = %id))]
    pub async fn resolve(&self, id: &Identifier) -> Result<Entry> {
        if !id.is_archived() {
            let entry = self.resolve_location(id.location()).await?;
            return Ok(match entry {
                Entry::File(file) => self.browse_cached(file),
                other => other,
            });
        }
        if let Some(entry) = self.lookup(id) {
            return Ok(entry);
        }
        debug!("Not analyzed yet, resolving outer file");
        let outer = self.resolve_location(id.location()).await?;
        let file = outer
            .as_file()
            .ok_or_raise(|| ErrorKind::NotFound(id.to_string()))?;
        self.analyze(file.as_ref()).await?;
        self.lookup(id).ok_or_raise(|| ErrorKind::NotFound(id.to_string()))
    }

    async fn resolve_location(&self, uri: &Url) -> Result<Entry> {
        let not_found = || ErrorKind::NotFound(uri.to_string());
        self.vfs.resolve(uri).await.or_raise(not_found)?.ok_or_raise(not_found)
    }

    /// Probe `file` for modules, once per URI.
    #[instrument(level = "debug", skip_all, fields(uri = %file.uri()))]
    pub async fn analyze(&self, file: &dyn File) -> Result<Arc<ArchiveIndex>> {
        let uri = file.uri();
        if uri.fragment().is_some() {
            // Tracks inside an archive are leaves.
            return Ok(Arc::new(ArchiveIndex::default()));
        }
        if let Some(index) = self.cached_analysis(&uri) {
            return Ok(index);
        }
        let failed = || ErrorKind::ArchiveAnalysisFailed(uri.to_string());
        let content = file.content().await.or_raise(failed)?;
        let mut modules = Vec::new();
        self.codec
            .detect_all(&content, &mut |subpath, module| modules.push((split(subpath), module.info())))
            .or_raise(failed)?;
        Ok(self.remember(&uri, &file.name(), modules))
    }

    fn remember(&self, uri: &Url, name: &str, modules: Vec<(Vec<String>, ModuleInfo)>) -> Arc<ArchiveIndex> {
        let index = Arc::new(ArchiveIndex::build(name, modules));
        debug!(%uri, tracks = index.tracks_count(), "Analyzed");
        self.with_analyses(|analyses| analyses.insert(uri.clone(), index.clone()));
        index
    }

    /// The analysis of `uri`, if it has been done.
    pub fn cached_analysis(&self, uri: &Url) -> Option<Arc<ArchiveIndex>> {
        self.with_analyses(|analyses| analyses.get(uri).cloned())
    }

    /// Analyze `file` and return it as a directory if it holds several tracks.
    pub async fn browse(&self, file: Arc<dyn File>) -> Result<Entry> {
        let index = self.analyze(file.as_ref()).await?;
        Ok(self.wrap(file, index))
    }

    /// Like [`browse`](Self::browse) but never analyzes.
    pub fn browse_cached(&self, file: Arc<dyn File>) -> Entry {
        match self.cached_analysis(&file.uri()) {
            Some(index) => self.wrap(file, index),
            None => Entry::File(file),
        }
    }

    fn wrap(&self, file: Arc<dyn File>, index: Arc<ArchiveIndex>) -> Entry {
        if !index.is_archive() {
            return Entry::File(file);
        }
        Entry::Dir(Arc::new(ArchiveRoot {
            service: self.this.clone(),
            file,
            index,
        }))
    }

    /// `true` for the directory view of an analyzed multi-track file.
    pub fn is_archive_root(&self, entry: &Entry) -> bool {
        let uri = entry.uri();
        entry.is_dir() && uri.fragment().is_none() && self.cached_analysis(&uri).is_some_and(|index| index.is_archive())
    }

    /// Metadata of an archived track, from an earlier analysis.
    pub fn track_info(&self, id: &Identifier) -> Option<ModuleInfo> {
        let index = self.cached_analysis(id.location())?;
        match &index.node(id.subpath())?.kind {
            NodeKind::Track(info) => Some(info.clone()),
            NodeKind::Dir => None,
        }
    }

    /// Every playable module in `file`.
    ///
    /// Modules at the top of the file get their additional files resolved;
    /// nested ones must have been completed by the codec itself. Modules that
    /// stay incomplete are skipped with a warning. The analysis cache is
    /// filled as a side effect.
    #[instrument(level = "debug", skip_all, fields(uri = %file.uri()))]
    pub async fn detect_modules(&self, file: &dyn File) -> Result<Vec<DetectedModule>> {
        let uri = file.uri();
        let failed = || ErrorKind::ArchiveAnalysisFailed(uri.to_string());
        let content = file.content().await.or_raise(failed)?;
        let mut found: Vec<(String, Box<dyn Module>)> = Vec::new();
        self.codec
            .detect_all(&content, &mut |subpath, module| found.push((subpath.to_string(), module)))
            .or_raise(failed)?;
        if uri.fragment().is_none() {
            let modules = found.iter().map(|(subpath, module)| (split(subpath), module.info())).collect();
            self.remember(&uri, &file.name(), modules);
        }

        let mut resolver = None;
        let mut detected = Vec::with_capacity(found.len());
        for (subpath, mut module) in found {
            let missing = module.additional_files();
            if missing.is_empty() {
                detected.push(DetectedModule { subpath, module });
                continue;
            }
            if !subpath.is_empty() {
                debug!(subpath = %subpath, ?missing, "Nested module left incomplete by the codec");
                continue;
            }
            if resolver.is_none() {
                resolver = Some(AdditionalFilesResolver::for_file(&self.vfs, file).await);
            }
            let Some(active) = resolver.as_mut() else {
                continue;
            };
            match active.resolve(module.as_mut(), missing).await {
                Ok(()) => detected.push(DetectedModule { subpath, module }),
                Err(err) => warn!(%uri, subpath = %subpath, error = ?err, "Skipping module"),
            }
        }
        Ok(detected)
    }

    /// Open the module at `id`, supplying additional files when it sits at
    /// the top of its file.
    #[instrument(level = "debug", skip(self), fields(id = %id))]
    pub async fn open_module(&self, id: &Identifier) -> Result<Box<dyn Module>> {
        let outer = self.resolve_location(id.location()).await?;
        let file = outer.as_file().ok_or_raise(|| ErrorKind::NotFound(id.to_string()))?;
        let content = file
            .content()
            .await
            .or_raise(|| ErrorKind::ArchiveAnalysisFailed(id.location().to_string()))?;
        let subpath = id.subpath_string();
        let mut module = self
            .codec
            .open(&content, &subpath)
            .or_raise(|| ErrorKind::CodecOpenFailed(id.to_string()))?;
        let missing = module.additional_files();
        if missing.is_empty() {
            return Ok(module);
        }
        if !subpath.is_empty() {
            exn::bail!(ErrorKind::AdditionalFileUnresolved(missing));
        }
        let mut resolver = AdditionalFilesResolver::for_file(&self.vfs, file.as_ref()).await;
        resolver.resolve(module.as_mut(), missing).await?;
        Ok(module)
    }

    fn lookup(&self, id: &Identifier) -> Option<Entry> {
        let index = self.cached_analysis(id.location())?;
        node_entry(&self.this, &index, id.location(), id.subpath())
    }

    async fn parent_of(&self, id: &Identifier) -> Result<Option<Entry>> {
        let parent = self
            .cached_analysis(id.location())
            .and_then(|index| index.node(id.subpath()).and_then(|node| node.parent.clone()));
        match parent {
            Some(parent) => {
                let parent = Identifier::new(id.location().clone(), parent)
                    .or_raise(|| ErrorKind::NotFound(id.to_string()))?;
                Ok(self.lookup(&parent))
            },
            None => self.resolve(&id.archive_location()).await.map(Some),
        }
    }

    async fn outer_content(&self, id: &Identifier) -> trove_vfs::Result<Vec<u8>> {
        let uri = id.location();
        let Some(entry) = self.vfs.resolve(uri).await? else {
            exn::bail!(VfsErrorKind::not_found(uri));
        };
        let Some(file) = entry.as_file() else {
            exn::bail!(VfsErrorKind::WrongKind(format!("{uri} is a {}", entry.kind())));
        };
        file.content().await
    }

    fn with_analyses<T>(&self, f: impl FnOnce(&mut HashMap<Url, Arc<ArchiveIndex>>) -> T) -> T {
        let mut analyses = self.analyses.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut analyses)
    }
}

fn split(subpath: &str) -> Vec<String> {
    subpath
        .split('/')
        .filter(|component| !component.is_empty())
        .map(str::to_string)
        .collect()
}

fn node_entry(
    service: &Weak<ArchiveService>,
    index: &Arc<ArchiveIndex>,
    location: &Url,
    subpath: &[String],
) -> Option<Entry> {
    let node = index.node(subpath)?;
    let id = Identifier::new(location.clone(), subpath.iter().cloned()).ok()?;
    Some(match &node.kind {
        NodeKind::Dir => Entry::Dir(Arc::new(ArchiveDir {
            service: service.clone(),
            id,
            name: node.name.clone(),
            index: index.clone(),
        })),
        NodeKind::Track(info) => Entry::File(Arc::new(ArchiveFile {
            service: service.clone(),
            id,
            name: node.name.clone(),
            info: info.clone(),
        })),
    })
}

fn enumerate_nodes(
    service: &Weak<ArchiveService>,
    index: &Arc<ArchiveIndex>,
    location: &Url,
    subpath: &[String],
    visitor: &mut dyn Visitor,
) {
    let children = index.children(subpath);
    visitor.on_items_count(children.len());
    for child in children {
        match node_entry(service, index, location, child) {
            Some(Entry::Dir(dir)) => visitor.on_dir(dir),
            Some(Entry::File(file)) => visitor.on_file(file),
            _ => {},
        }
    }
}

fn gone() -> VfsErrorKind {
    VfsErrorKind::Backend("archive service dropped".to_string())
}

/// Lift an archive failure into the VFS error a node operation returns.
fn lifted<T>(result: Result<T>, id: &Identifier) -> trove_vfs::Result<T> {
    result.or_raise(|| VfsErrorKind::Backend(format!("archive entry {id}")))
}

/// Directory view of a multi-track file.
struct ArchiveRoot {
    service: Weak<ArchiveService>,
    file: Arc<dyn File>,
    index: Arc<ArchiveIndex>,
}

#[async_trait]
impl Object for ArchiveRoot {
    fn uri(&self) -> Url {
        self.file.uri()
    }

    fn name(&self) -> String {
        self.file.name()
    }

    fn description(&self) -> String {
        self.file.description()
    }

    async fn parent(&self) -> trove_vfs::Result<Option<Entry>> {
        self.file.parent().await
    }

    fn extension(&self, id: &str) -> Option<Extension> {
        self.file.extension(id)
    }
}

#[async_trait]
impl Dir for ArchiveRoot {
    async fn enumerate(&self, visitor: &mut dyn Visitor) -> trove_vfs::Result<()> {
        enumerate_nodes(&self.service, &self.index, &self.file.uri(), &[], visitor);
        Ok(())
    }
}

struct ArchiveDir {
    service: Weak<ArchiveService>,
    id: Identifier,
    name: String,
    index: Arc<ArchiveIndex>,
}

#[async_trait]
impl Object for ArchiveDir {
    fn uri(&self) -> Url {
        self.id.to_uri()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    async fn parent(&self) -> trove_vfs::Result<Option<Entry>> {
        let service = self.service.upgrade().ok_or_raise(gone)?;
        lifted(service.parent_of(&self.id).await, &self.id)
    }
}

#[async_trait]
impl Dir for ArchiveDir {
    async fn enumerate(&self, visitor: &mut dyn Visitor) -> trove_vfs::Result<()> {
        enumerate_nodes(&self.service, &self.index, self.id.location(), self.id.subpath(), visitor);
        Ok(())
    }
}

/// A track inside a container. Its content is the whole outer file; the
/// subpath in its URI tells the codec which module to open.
struct ArchiveFile {
    service: Weak<ArchiveService>,
    id: Identifier,
    name: String,
    info: ModuleInfo,
}

#[async_trait]
impl Object for ArchiveFile {
    fn uri(&self) -> Url {
        self.id.to_uri()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        self.info.description()
    }

    async fn parent(&self) -> trove_vfs::Result<Option<Entry>> {
        let service = self.service.upgrade().ok_or_raise(gone)?;
        lifted(service.parent_of(&self.id).await, &self.id)
    }
}

#[async_trait]
impl File for ArchiveFile {
    fn size(&self) -> String {
        format::duration(self.info.duration)
    }

    async fn content(&self) -> trove_vfs::Result<Vec<u8>> {
        let service = self.service.upgrade().ok_or_raise(gone)?;
        service.outer_content(&self.id).await
    }
}
